use std::fmt;
use std::sync::Arc;

// ---

use spq_sim::Store;

// ---

use super::error::{Result, SpqError};
use super::packet::Packet;

// ---------------------------------------------------------------------------
// Element
// ---------------------------------------------------------------------------

/// Anything a scheduling element can forward packets to: another element,
/// or a terminal sink.
///
/// `put` never suspends. `bridge` is present only when the sender keeps the
/// packet in its own buffer (it has a zero-buffer downstream) and expects
/// the receiver to release it from there once the receiver drains it.
pub trait Element: Send + Sync {
    // ---
    fn put(&self, packet: Packet, bridge: Option<Bridge>) -> Result<()>;
}

/// Convenience alias for a shared downstream element.
pub type ElementPtr = Arc<dyn Element>;

// ---------------------------------------------------------------------------
// Queued
// ---------------------------------------------------------------------------

/// Queue slot holding one admitted packet together with its bridge entry.
///
/// Keeping the bridge in the slot ties it to the packet without a side
/// table keyed by packet identity.
#[derive(Debug)]
pub struct Queued {
    // ---
    pub packet: Packet,
    pub bridge: Option<Bridge>,
}

// ---

impl Queued {
    // ---
    pub fn new(packet: Packet, bridge: Option<Bridge>) -> Self {
        Self { packet, bridge }
    }
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

/// Callback that runs the upstream element's drain accounting for a slot
/// taken out of its buffer.
pub type DrainHook = Arc<dyn Fn(Queued) -> Result<()> + Send + Sync>;

/// Zero-buffer handshake: where an upstream element actually holds a packet,
/// and how to tell it the packet has left.
///
/// Consumed exactly once, by [`Bridge::release`].
pub struct Bridge {
    // ---
    upstream_queue: Store<Queued>,
    upstream_update: DrainHook,
}

// ---

impl Bridge {
    // ---
    pub fn new(upstream_queue: Store<Queued>, upstream_update: DrainHook) -> Self {
        Self {
            upstream_queue,
            upstream_update,
        }
    }

    // ---

    /// Take `packet` out of the upstream buffer and run the upstream drain
    /// accounting for it.
    ///
    /// The packet is found by identity, not position: a downstream stage
    /// with its own priorities may drain upstream packets out of order.
    pub fn release(self, packet: &Packet) -> Result<()> {
        // ---
        let held = self
            .upstream_queue
            .remove_first(|held| held.packet.same_packet(packet))
            .ok_or(SpqError::NotHeldUpstream {
                flow_id: packet.flow_id,
                packet_id: packet.id,
            })?;

        (self.upstream_update)(held)
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("upstream_queued", &self.upstream_queue.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use std::sync::Mutex;

    use super::*;

    // ---

    fn recording_hook() -> (DrainHook, Arc<Mutex<Vec<u64>>>) {
        // ---
        let drained = Arc::new(Mutex::new(Vec::new()));
        let hook: DrainHook = {
            let drained = Arc::clone(&drained);
            Arc::new(move |slot: Queued| -> Result<()> {
                drained.lock().unwrap().push(slot.packet.id);
                Ok(())
            })
        };
        (hook, drained)
    }

    // ---

    #[test]
    fn release_takes_the_packet_wherever_it_is_queued() {
        // ---
        let queue = Store::new();
        for id in 1..=3 {
            queue.put(Queued::new(Packet::new(id, 0, 100, 0.0), None));
        }

        let (hook, drained) = recording_hook();
        Bridge::new(queue.clone(), hook.clone())
            .release(&Packet::new(2, 0, 100, 0.0))
            .unwrap();
        Bridge::new(queue.clone(), hook)
            .release(&Packet::new(1, 0, 100, 0.0))
            .unwrap();

        assert_eq!(*drained.lock().unwrap(), vec![2, 1]);
        assert_eq!(queue.try_get().map(|q| q.packet.id), Some(3));
        assert!(queue.is_empty());
    }

    // ---

    #[test]
    fn release_of_absent_packet_is_an_accounting_error() {
        // ---
        let queue = Store::new();
        queue.put(Queued::new(Packet::new(5, 1, 100, 0.0), None));

        let (hook, drained) = recording_hook();
        let err = Bridge::new(queue.clone(), hook.clone())
            .release(&Packet::new(6, 1, 100, 0.0))
            .unwrap_err();
        assert_eq!(err, SpqError::NotHeldUpstream { flow_id: 1, packet_id: 6 });
        assert!(err.is_accounting());

        let err = Bridge::new(Store::new(), hook)
            .release(&Packet::new(9, 0, 10, 0.0))
            .unwrap_err();
        assert_eq!(err, SpqError::NotHeldUpstream { flow_id: 0, packet_id: 9 });

        assert!(drained.lock().unwrap().is_empty());
        assert_eq!(queue.len(), 1);
    }
}
