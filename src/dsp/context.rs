//! Processing context for signal-chain units.

/// Runtime information handed to every unit for each processed block.
#[derive(Clone, Copy, Debug)]
pub struct ProcessContext {
    /// Audio sample rate in Hz.
    pub sample_rate: f32,
    /// Number of samples in the current block.
    pub block_size: usize,
}

impl ProcessContext {
    /// Creates a new processing context.
    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        Self {
            sample_rate,
            block_size,
        }
    }

    /// Duration of one block in seconds.
    pub fn block_duration(&self) -> f32 {
        self.block_size as f32 / self.sample_rate
    }
}

impl Default for ProcessContext {
    fn default() -> Self {
        Self::new(44100.0, 256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_creation() {
        let ctx = ProcessContext::new(48000.0, 128);
        assert_eq!(ctx.sample_rate, 48000.0);
        assert_eq!(ctx.block_size, 128);
    }

    #[test]
    fn test_block_duration() {
        let ctx = ProcessContext::new(44100.0, 441);
        assert!((ctx.block_duration() - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_default_context() {
        let ctx = ProcessContext::default();
        assert_eq!(ctx.sample_rate, 44100.0);
        assert_eq!(ctx.block_size, 256);
    }
}
