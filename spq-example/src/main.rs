//! Static-priority scheduler demo.
//!
//! Two flows feed one SP element at a fixed link rate: flow 0 every 1.5
//! simulated units, flow 1 every 2.0, packet sizes exponential around
//! `--mean-size` bytes. The run stops at `--until` and prints what the sink
//! received per flow.
//!
//! Run with:
//!   cargo run -p spq-example
//!   cargo run -p spq-example -- --priorities 0=10,1=1 --debug
//!   cargo run -p spq-example -- --chain --rate 200 --until 100

use clap::Parser;
use tracing::Level;

mod config;
mod demo;
mod generator;

use config::Config;

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // ---
    let cfg = Config::parse();

    let no_color = std::env::var("EMACS").is_ok()
        || std::env::var("NO_COLOR").is_ok()
        || std::env::var("CARGO_TERM_COLOR").as_deref() == Ok("never")
        || !std::io::IsTerminal::is_terminal(&std::io::stdout());

    tracing_subscriber::fmt()
        .with_target(false)
        .without_time()
        .with_ansi(!no_color)
        .with_max_level(if cfg.debug { Level::DEBUG } else { Level::INFO })
        .init();

    // Simulated time: the paused clock jumps to the next timer whenever
    // every process is waiting.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()?;

    let report = runtime.block_on(demo::run(&cfg))?;
    report.print();

    Ok(())
}
