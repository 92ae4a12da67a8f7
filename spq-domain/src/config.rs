use super::priority::PrioritySpec;

// ---------------------------------------------------------------------------
// SpConfig
// ---------------------------------------------------------------------------

/// Configuration of one static-priority element.
///
/// Validated by [`crate::SpServer::new`]; an invalid rate or an empty
/// priority specification is rejected there.
#[derive(Debug, Clone)]
pub struct SpConfig {
    // ---
    /// Label used in diagnostics; distinguishes the stages of a chain.
    pub name: String,

    /// Outgoing link rate in bits per simulated unit.
    pub rate: f64,

    /// Flow → priority assignment.
    pub priorities: PrioritySpec,

    /// The element keeps no buffer of its own; packets it admits stay
    /// accounted in the upstream element that bridged them here.
    pub zero_buffer: bool,

    /// The downstream element keeps no buffer; this element stays the
    /// queueing point and forwards packets with a bridge back to itself.
    pub zero_downstream_buffer: bool,

    /// Emit per-packet diagnostics.
    pub debug: bool,
}

// ---

impl SpConfig {
    // ---
    /// A plain buffered element.
    pub fn new(rate: f64, priorities: PrioritySpec) -> Self {
        // ---
        Self {
            name: "sp".to_string(),
            rate,
            priorities,
            zero_buffer: false,
            zero_downstream_buffer: false,
            debug: false,
        }
    }

    // ---

    /// First stage of a composite element: buffers for a zero-buffer
    /// successor.
    pub fn feeding_zero_buffer(rate: f64, priorities: PrioritySpec) -> Self {
        Self {
            zero_downstream_buffer: true,
            ..Self::new(rate, priorities)
        }
    }

    /// Later stage of a composite element: relies on the upstream buffer.
    pub fn zero_buffer(rate: f64, priorities: PrioritySpec) -> Self {
        Self {
            zero_buffer: true,
            ..Self::new(rate, priorities)
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
