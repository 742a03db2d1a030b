//! Lock-free parameter bridge between the control surface and the audio
//! callback.
//!
//! The control side pushes small plain-data updates; the audio side drains
//! them at the top of each block and applies them in order, so the last
//! update for a given parameter wins. Pushing never blocks: when the ring is
//! full the update is dropped and the authoritative model value is delivered
//! by the next rebuild.

use rtrb::{Consumer, Producer, RingBuffer};

/// Default ring capacity. Generous for knob sweeps at UI rates.
pub const DEFAULT_BRIDGE_CAPACITY: usize = 1024;

/// A single parameter change addressed by stage and parameter index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamUpdate {
    pub stage: usize,
    pub param: usize,
    pub value: f32,
}

/// Control-side endpoint.
pub struct BridgeSender {
    producer: Producer<ParamUpdate>,
}

/// Audio-side endpoint. Drained inside the callback; every operation is
/// wait-free.
pub struct BridgeReceiver {
    consumer: Consumer<ParamUpdate>,
}

/// Creates a connected sender/receiver pair.
pub fn channel(capacity: usize) -> (BridgeSender, BridgeReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity);
    (BridgeSender { producer }, BridgeReceiver { consumer })
}

impl BridgeSender {
    /// Pushes an update, returning whether it was accepted. A full ring is
    /// not an error; the update is simply dropped.
    pub fn send(&mut self, update: ParamUpdate) -> bool {
        self.producer.push(update).is_ok()
    }
}

impl BridgeReceiver {
    /// Pops the next pending update, if any.
    pub fn recv(&mut self) -> Option<ParamUpdate> {
        self.consumer.pop().ok()
    }
}
