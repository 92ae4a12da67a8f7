use thiserror::Error;

// ---

use super::packet::FlowId;
use super::priority::Priority;

// ---

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpqError {
    // ---
    // --- configuration
    #[error("configuration error: priority specification is empty")]
    EmptyPriorities,

    #[error("configuration error: link rate must be positive and finite, got {0}")]
    InvalidRate(f64),

    #[error("configuration error: flow {flow_id} has no priority assigned")]
    UnmappedFlow { flow_id: FlowId },

    #[error("configuration error: cannot parse priority specification {spec:?}: {reason}")]
    InvalidPrioritySpec { spec: String, reason: String },

    #[error("configuration error: zero-buffer bridge offered to an element with its own buffer")]
    UnexpectedBridge,

    // --- accounting
    #[error("accounting error: packet {packet_id} drained from unrecorded flow {flow_id}")]
    UnrecordedFlow { flow_id: FlowId, packet_id: u64 },

    #[error("accounting error: drain of priority {priority} with no packets queued")]
    EmptyPriority { priority: Priority },

    #[error("accounting error: flow {flow_id} holds {queued} bytes, cannot drain {size}")]
    ByteUnderflow {
        flow_id: FlowId,
        queued: u64,
        size: u64,
    },

    #[error("accounting error: upstream buffer does not hold flow {flow_id} packet {packet_id}")]
    NotHeldUpstream { flow_id: FlowId, packet_id: u64 },

    #[error("accounting error: flow {flow_id} packet {packet_id} drained as bridged, none waiting")]
    UnrecordedBridge { flow_id: FlowId, packet_id: u64 },
}

// ---

impl SpqError {
    // ---
    /// Malformed or unresolvable configuration. Fix the setup before reuse.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::EmptyPriorities
                | Self::InvalidRate(_)
                | Self::UnmappedFlow { .. }
                | Self::InvalidPrioritySpec { .. }
                | Self::UnexpectedBridge
        )
    }

    /// Broken ledger invariant. Always a logic defect, never transient.
    pub fn is_accounting(&self) -> bool {
        !self.is_configuration()
    }
}

// ---

pub type Result<T> = std::result::Result<T, SpqError>;
