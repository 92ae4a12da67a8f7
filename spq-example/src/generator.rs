//! Packet source for one flow.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::Distribution;
use tokio::task::JoinHandle;

// ---

use spq_domain::{ElementPtr, FlowId, Packet, Result};
use spq_sim::SimClock;

// ---------------------------------------------------------------------------
// Constant
// ---------------------------------------------------------------------------

/// Degenerate distribution: every draw is the same value.
#[derive(Debug, Clone, Copy)]
pub struct Constant(pub f64);

impl Distribution<f64> for Constant {
    fn sample<R: Rng + ?Sized>(&self, _rng: &mut R) -> f64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// PacketGenerator
// ---------------------------------------------------------------------------

/// Emits the packets of one flow into an element.
///
/// After `initial_delay`, and for as long as the clock reads less than
/// `finish`, the generator sleeps one interarrival draw, then sends a packet
/// whose size is one size draw (truncated to whole bytes). Packets are
/// numbered from 1.
pub struct PacketGenerator<A, S> {
    // ---
    flow_id: FlowId,
    clock: SimClock,
    out: ElementPtr,
    interarrival: A,
    size: S,
    rng: StdRng,
    initial_delay: f64,
    finish: f64,
    debug: bool,
}

// ---

impl<A, S> PacketGenerator<A, S>
where
    A: Distribution<f64> + Send + 'static,
    S: Distribution<f64> + Send + 'static,
{
    // ---
    pub fn new(
        flow_id: FlowId,
        clock: SimClock,
        out: ElementPtr,
        interarrival: A,
        size: S,
        rng: StdRng,
    ) -> Self {
        Self {
            flow_id,
            clock,
            out,
            interarrival,
            size,
            rng,
            initial_delay: 0.0,
            finish: f64::INFINITY,
            debug: false,
        }
    }

    pub fn with_initial_delay(mut self, initial_delay: f64) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    pub fn with_finish(mut self, finish: f64) -> Self {
        self.finish = finish;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    // ---

    /// Start generating on the current runtime.
    pub fn spawn(self) -> JoinHandle<Result<u64>> {
        tokio::spawn(self.run())
    }

    /// Generate until `finish`; returns the number of packets sent.
    pub async fn run(mut self) -> Result<u64> {
        // ---
        self.clock.sleep(self.initial_delay).await;

        let mut sent = 0;
        while self.clock.now() < self.finish {
            let gap = self.interarrival.sample(&mut self.rng);
            self.clock.sleep(gap).await;

            sent += 1;
            let size = self.size.sample(&mut self.rng).max(0.0) as u64;
            let packet = Packet::new(sent, self.flow_id, size, self.clock.now());
            self.out.put(packet, None)?;
        }

        if self.debug {
            tracing::debug!(
                flow_id = self.flow_id,
                time = self.clock.now(),
                sent,
                "generator finished",
            );
        }
        Ok(sent)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
