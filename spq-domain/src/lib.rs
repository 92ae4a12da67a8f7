//! Static-priority egress scheduling on top of the `spq-sim` substrate.
//!
//! A [`SpServer`] holds one FIFO per priority class and transmits the head
//! of the most urgent non-empty class at a fixed link rate. Elements are
//! chained through the [`Element`] trait; a chain ends in a [`Sink`].
//!
//! Two elements can form a composite with a single logical buffer: the first
//! is built with [`SpConfig::feeding_zero_buffer`], the second with
//! [`SpConfig::zero_buffer`]. Packets then stay in the first element until
//! the second drains them, released through a [`Bridge`].
//!
//! # Structure
//!
//! - [`error`]     — [`SpqError`] and [`Result<T>`] alias
//! - [`priority`]  — [`Priority`], [`PrioritySpec`], [`PriorityTable`]
//! - [`packet`]    — [`Packet`] and [`FlowId`]
//! - [`element`]   — [`Element`] trait, [`Queued`] slots, [`Bridge`] handshake
//! - [`config`]    — [`SpConfig`]
//! - [`scheduler`] — [`SpServer`] and [`LedgerSnapshot`]
//! - [`sink`]      — [`Sink`] and [`Arrival`]

mod config;
mod element;
mod error;
mod packet;
mod priority;
mod scheduler;
mod sink;

// --- error
pub use error::{Result, SpqError};

// --- priority
pub use priority::{Priority, PrioritySpec, PriorityTable};

// --- packet
pub use packet::{FlowId, Packet};

// --- element
pub use element::{
    // ---
    Bridge,
    DrainHook,
    Element,
    ElementPtr,
    Queued,
};

// --- config
pub use config::SpConfig;

// --- scheduler
pub use scheduler::{LedgerSnapshot, SpServer};

// --- sink
pub use sink::{Arrival, Sink};
