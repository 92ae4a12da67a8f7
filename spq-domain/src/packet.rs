use super::priority::Priority;

// ---

/// Identifier of a logical stream of packets sharing one priority.
pub type FlowId = u64;

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// A simulated packet.
///
/// `id`, `flow_id` and `size_bytes` never change in transit. `priority` is
/// stamped by each scheduling element just before the packet goes into
/// service and is advisory for downstream observers only.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    // ---
    pub id: u64,
    pub flow_id: FlowId,
    pub size_bytes: u64,

    /// Simulated time at which the packet was generated.
    pub created_at: f64,

    /// Priority under which the most recent element served this packet.
    pub priority: Option<Priority>,
}

// ---

impl Packet {
    // ---
    pub fn new(id: u64, flow_id: FlowId, size_bytes: u64, created_at: f64) -> Self {
        Self {
            id,
            flow_id,
            size_bytes,
            created_at,
            priority: None,
        }
    }

    /// Serialization delay on a link of `rate` bits per simulated unit.
    pub fn transmission_time(&self, rate: f64) -> f64 {
        self.size_bytes as f64 * 8.0 / rate
    }

    /// `true` if both values describe the same packet, ignoring the
    /// priority tag.
    pub fn same_packet(&self, other: &Packet) -> bool {
        self.flow_id == other.flow_id && self.id == other.id
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn transmission_time_converts_bytes_to_bits() {
        // ---
        let pkt = Packet::new(0, 0, 1_000, 0.0);
        assert_eq!(pkt.transmission_time(100.0), 80.0);

        let small = Packet::new(1, 1, 100, 0.1);
        assert_eq!(small.transmission_time(100.0), 8.0);
    }

    // ---

    #[test]
    fn identity_ignores_priority_tag() {
        // ---
        let a = Packet::new(3, 1, 64, 2.0);
        let mut b = a.clone();
        b.priority = Some(Priority::new(7));

        assert!(a.same_packet(&b));
        assert!(!a.same_packet(&Packet::new(3, 2, 64, 2.0)));
    }
}
