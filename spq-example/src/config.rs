//! CLI configuration for `spq-example`.
//!
//! Run modes:
//!   spq-example [--rate 100] [--priorities 1,100] [--until 20]
//!   spq-example --priorities 0=10,1=1 --chain --debug

use clap::Parser;

use spq_domain::PrioritySpec;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(
    name = "spq-example",
    about = "Two flows through a static-priority egress element"
)]
pub struct Config {
    // ---
    /// Outgoing link rate in bits per simulated unit.
    #[arg(long, default_value_t = 100.0)]
    pub rate: f64,

    /// Flow priorities, lower value served first.
    ///
    /// Either a list indexed by flow id (`1,100`) or explicit
    /// `flow=priority` pairs (`0=10,1=1`).
    #[arg(long, default_value = "1,100")]
    pub priorities: PrioritySpec,

    /// Simulated time at which the generators start.
    #[arg(long, default_value_t = 0.0)]
    pub start: f64,

    /// Simulated time at which the run stops.
    #[arg(long, default_value_t = 20.0)]
    pub until: f64,

    /// Mean packet size in bytes (exponentially distributed).
    #[arg(long, default_value_t = 100.0)]
    pub mean_size: f64,

    /// Seed for the packet size draws.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Route packets through a two-stage zero-buffer chain instead of a
    /// single element.
    #[arg(long, default_value_t = false)]
    pub chain: bool,

    /// Log every admission, transmission, and arrival.
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}
