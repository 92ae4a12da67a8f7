use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

// ---

use spq_sim::SimClock;

// ---

use super::element::{Bridge, Element};
use super::error::Result;
use super::packet::{FlowId, Packet};

// ---------------------------------------------------------------------------
// Arrival
// ---------------------------------------------------------------------------

/// One packet delivered to a [`Sink`].
#[derive(Debug, Clone, PartialEq)]
pub struct Arrival {
    // ---
    /// Simulated delivery time.
    pub time: f64,
    pub packet: Packet,
}

// ---

impl Arrival {
    /// Time from generation to delivery.
    pub fn delay(&self) -> f64 {
        self.time - self.packet.created_at
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct FlowTally {
    packets: u64,
    bytes: u64,
    delay_sum: f64,
}

#[derive(Debug, Default)]
struct SinkState {
    arrivals: Vec<Arrival>,
    flows: BTreeMap<FlowId, FlowTally>,
}

/// Terminal element that consumes and records every packet it is given.
///
/// A bridged packet is released from its upstream buffer on arrival: a sink
/// admits and drains in the same instant.
#[derive(Debug)]
pub struct Sink {
    // ---
    clock: SimClock,
    debug: bool,
    state: Mutex<SinkState>,
}

// ---

impl Sink {
    // ---
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            debug: false,
            state: Mutex::new(SinkState::default()),
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    // ---

    /// Every arrival so far, in delivery order.
    pub fn arrivals(&self) -> Vec<Arrival> {
        self.lock().arrivals.clone()
    }

    /// `(flow_id, packet_id)` of every arrival, in delivery order.
    pub fn received_ids(&self) -> Vec<(FlowId, u64)> {
        self.lock()
            .arrivals
            .iter()
            .map(|a| (a.packet.flow_id, a.packet.id))
            .collect()
    }

    pub fn packets_received(&self, flow_id: FlowId) -> u64 {
        self.lock().flows.get(&flow_id).map_or(0, |t| t.packets)
    }

    pub fn bytes_received(&self, flow_id: FlowId) -> u64 {
        self.lock().flows.get(&flow_id).map_or(0, |t| t.bytes)
    }

    /// Mean generation-to-delivery delay of `flow_id`, if anything arrived.
    pub fn mean_delay(&self, flow_id: FlowId) -> Option<f64> {
        self.lock()
            .flows
            .get(&flow_id)
            .filter(|t| t.packets > 0)
            .map(|t| t.delay_sum / t.packets as f64)
    }

    /// Flows that delivered at least one packet, ascending.
    pub fn flows(&self) -> Vec<FlowId> {
        self.lock().flows.keys().copied().collect()
    }

    // ---

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---

impl Element for Sink {
    // ---
    fn put(&self, packet: Packet, bridge: Option<Bridge>) -> Result<()> {
        // ---
        if let Some(bridge) = bridge {
            bridge.release(&packet)?;
        }

        let arrival = Arrival {
            time: self.clock.now(),
            packet,
        };
        if self.debug {
            tracing::debug!(
                time = arrival.time,
                flow_id = arrival.packet.flow_id,
                packet_id = arrival.packet.id,
                delay = arrival.delay(),
                "sink: packet arrived",
            );
        }

        let mut state = self.lock();
        let tally = state.flows.entry(arrival.packet.flow_id).or_default();
        tally.packets += 1;
        tally.bytes += arrival.packet.size_bytes;
        tally.delay_sum += arrival.delay();
        state.arrivals.push(arrival);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    // ---
    use std::sync::Arc;

    use spq_sim::Store;

    use super::*;
    use crate::element::{DrainHook, Queued};

    // ---

    #[tokio::test(start_paused = true)]
    async fn records_arrivals_per_flow() {
        // ---
        let clock = SimClock::start();
        let sink = Sink::new(clock);

        clock.sleep(2.0).await;
        sink.put(Packet::new(0, 1, 300, 0.5), None).unwrap();
        clock.sleep(1.0).await;
        sink.put(Packet::new(1, 1, 100, 2.0), None).unwrap();
        sink.put(Packet::new(0, 4, 50, 3.0), None).unwrap();

        assert_eq!(sink.received_ids(), vec![(1, 0), (1, 1), (4, 0)]);
        assert_eq!(sink.packets_received(1), 2);
        assert_eq!(sink.bytes_received(1), 400);
        assert_eq!(sink.mean_delay(1), Some(1.25));
        assert_eq!(sink.mean_delay(4), Some(0.0));
        assert_eq!(sink.mean_delay(9), None);
        assert_eq!(sink.flows(), vec![1, 4]);
        assert_eq!(sink.arrivals()[0].time, 2.0);
    }

    // ---

    #[tokio::test(start_paused = true)]
    async fn bridged_arrival_releases_upstream() {
        // ---
        let clock = SimClock::start();
        let sink = Sink::new(clock);

        let upstream = Store::new();
        let pkt = Packet::new(3, 0, 10, 0.0);
        upstream.put(Queued::new(pkt.clone(), None));

        let released = Arc::new(Mutex::new(0));
        let hook: DrainHook = {
            let released = Arc::clone(&released);
            Arc::new(move |_slot: Queued| -> Result<()> {
                *released.lock().unwrap() += 1;
                Ok(())
            })
        };

        sink.put(pkt, Some(Bridge::new(upstream.clone(), hook)))
            .unwrap();

        assert!(upstream.is_empty());
        assert_eq!(*released.lock().unwrap(), 1);
        assert_eq!(sink.packets_received(0), 1);
    }
}
