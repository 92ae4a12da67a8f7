//! The two-flow demo: constant arrivals, exponential sizes, one SP element
//! (or a zero-buffer chain of two) feeding a sink.

use std::sync::Arc;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Exp;
use tracing::info;

// ---

use spq_domain::{ElementPtr, FlowId, Sink, SpConfig, SpServer};
use spq_sim::SimClock;

// ---

use super::config::Config;
use super::generator::{Constant, PacketGenerator};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FlowReport {
    // ---
    pub flow_id: FlowId,
    pub packets: u64,
    pub bytes: u64,
    pub mean_delay: Option<f64>,
    pub arrival_times: Vec<f64>,
}

/// Outcome of one run, read off the sink and the elements.
#[derive(Debug)]
pub struct Report {
    // ---
    pub until: f64,
    pub flows: Vec<FlowReport>,
    /// Packets still accounted in each element at the end of the run.
    pub backlog: Vec<(String, usize)>,
}

impl Report {
    pub fn print(&self) {
        // ---
        println!("=== Static-priority run until t={} ===", self.until);
        for flow in &self.flows {
            let delay = flow
                .mean_delay
                .map_or_else(|| "-".to_string(), |d| format!("{d:.3}"));
            println!(
                "  flow {}: {} packets, {} bytes, mean delay {delay}",
                flow.flow_id, flow.packets, flow.bytes,
            );
            let times: Vec<String> = flow
                .arrival_times
                .iter()
                .map(|t| format!("{t:.3}"))
                .collect();
            println!("    arrivals: [{}]", times.join(", "));
        }
        for (name, queued) in &self.backlog {
            println!("  element {name}: {queued} packets still queued");
        }
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

const FLOW_GAPS: [(FlowId, f64); 2] = [(0, 1.5), (1, 2.0)];

/// Build the topology, run it until `cfg.until`, and report.
///
/// Must run on a runtime with a paused clock so simulated time advances
/// only when every process is waiting.
pub async fn run(cfg: &Config) -> anyhow::Result<Report> {
    // ---
    if !(cfg.until.is_finite() && cfg.until > 0.0) {
        anyhow::bail!("--until must be a positive simulated time, got {}", cfg.until);
    }

    let clock = SimClock::start();
    let sink = Arc::new(Sink::new(clock).with_debug(cfg.debug));

    let (entry, elements) = build_elements(cfg, clock, sink.clone())?;
    let services: Vec<_> = elements.iter().map(SpServer::spawn).collect();

    let sizes = Exp::new(1.0 / cfg.mean_size).context("mean packet size must be positive")?;
    let generators: Vec<_> = FLOW_GAPS
        .into_iter()
        .map(|(flow_id, gap)| {
            let rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(flow_id));
            PacketGenerator::new(flow_id, clock, entry.clone(), Constant(gap), sizes, rng)
                .with_initial_delay(cfg.start)
                .with_finish(cfg.until)
                .with_debug(cfg.debug)
                .spawn()
        })
        .collect();

    clock.sleep_until(cfg.until).await;

    // A service loop only stops on an error; a generator stops early on a
    // rejected packet.
    for service in services {
        if service.is_finished() {
            service.await??;
        }
    }
    for generator in generators {
        if generator.is_finished() {
            generator.await?.context("packet generator stopped")?;
        }
    }

    let flows = sink
        .flows()
        .into_iter()
        .map(|flow_id| FlowReport {
            flow_id,
            packets: sink.packets_received(flow_id),
            bytes: sink.bytes_received(flow_id),
            mean_delay: sink.mean_delay(flow_id),
            arrival_times: sink
                .arrivals()
                .iter()
                .filter(|a| a.packet.flow_id == flow_id)
                .map(|a| a.time)
                .collect(),
        })
        .collect();
    let backlog = elements
        .iter()
        .map(|e| (e.name().to_string(), e.total_packets()))
        .collect();

    info!(until = cfg.until, chain = cfg.chain, "run complete");
    Ok(Report {
        until: cfg.until,
        flows,
        backlog,
    })
}

// ---

/// Returns the entry element and every element built, upstream first.
fn build_elements(
    cfg: &Config,
    clock: SimClock,
    sink: ElementPtr,
) -> anyhow::Result<(ElementPtr, Vec<SpServer>)> {
    // ---
    let priorities = cfg.priorities.clone();

    if !cfg.chain {
        let config = SpConfig::new(cfg.rate, priorities).with_debug(cfg.debug);
        let server = SpServer::new(config, clock, sink)?;
        return Ok((Arc::new(server.clone()), vec![server]));
    }

    let second = SpServer::new(
        SpConfig::zero_buffer(cfg.rate, priorities.clone())
            .with_name("sp-2")
            .with_debug(cfg.debug),
        clock,
        sink,
    )?;
    let first = SpServer::new(
        SpConfig::feeding_zero_buffer(cfg.rate, priorities)
            .with_name("sp-1")
            .with_debug(cfg.debug),
        clock,
        Arc::new(second.clone()),
    )?;
    Ok((Arc::new(first.clone()), vec![first, second]))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use clap::Parser;

    use super::*;

    fn config(args: &[&str]) -> Config {
        Config::parse_from(std::iter::once("spq-example").chain(args.iter().copied()))
    }

    // A fast link drains every packet well before the next arrival.
    const FAST: [&str; 2] = ["--rate", "100000"];

    #[tokio::test(start_paused = true)]
    async fn fast_link_delivers_every_packet() {
        // ---
        let report = run(&config(&[FAST[0], FAST[1], "--until", "19.9"]))
            .await
            .unwrap();

        // Flow 0 emits every 1.5 units, flow 1 every 2.0.
        let counts: Vec<(FlowId, u64)> =
            report.flows.iter().map(|f| (f.flow_id, f.packets)).collect();
        assert_eq!(counts, vec![(0, 13), (1, 9)]);
        assert_eq!(report.flows[1].arrival_times.len(), 9);
        assert!(report.flows.iter().all(|f| f.mean_delay.unwrap() < 0.1));
        assert_eq!(report.backlog, vec![("sp".to_string(), 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn chained_run_drains_both_stages() {
        // ---
        let report = run(&config(&[FAST[0], FAST[1], "--chain", "--until", "199.9"]))
            .await
            .unwrap();

        let counts: Vec<(FlowId, u64)> =
            report.flows.iter().map(|f| (f.flow_id, f.packets)).collect();
        assert_eq!(counts, vec![(0, 133), (1, 99)]);
        assert_eq!(
            report.backlog,
            vec![("sp-1".to_string(), 0), ("sp-2".to_string(), 0)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_link_starves_the_low_priority_flow() {
        // ---
        let report = run(&config(&["--rate", "10", "--until", "50"])).await.unwrap();

        // Flow 0 always has a packet waiting once its second one arrives.
        let low = report
            .flows
            .iter()
            .find(|f| f.flow_id == 1)
            .map_or(0, |f| f.packets);
        assert!(low <= 1);
        assert!(report.backlog[0].1 > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_run_is_refused() {
        // ---
        let err = run(&config(&["--until", "inf"])).await.unwrap_err();
        assert!(err.to_string().contains("--until"));
    }

    #[tokio::test(start_paused = true)]
    async fn unmapped_flow_fails_the_run() {
        // ---
        // Flow 1 has no priority.
        let err = run(&config(&["--priorities", "0=1", "--until", "10"]))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("flow 1"), "{err:#}");
    }

    #[test]
    fn cli_accepts_both_priority_forms() {
        // ---
        assert!(Config::try_parse_from(["spq-example", "--priorities", "0=10,1=1"]).is_ok());
        assert!(Config::try_parse_from(["spq-example", "--priorities", "1,100"]).is_ok());
        assert!(Config::try_parse_from(["spq-example", "--priorities", "1,0=2"]).is_err());
    }
}
