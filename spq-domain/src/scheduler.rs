use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// ---

use spq_sim::{SimClock, Store, WorkSignal};
use tokio::task::JoinHandle;

// ---

use super::config::SpConfig;
use super::element::{Bridge, DrainHook, Element, ElementPtr, Queued};
use super::error::{Result, SpqError};
use super::packet::{FlowId, Packet};
use super::priority::{Priority, PriorityTable};

// ---------------------------------------------------------------------------
// Internal types
// ---------------------------------------------------------------------------

/// Buffers of one priority class.
#[derive(Debug, Clone)]
struct ClassQueues {
    // ---
    /// Owns the admitted packets. Drained by this element, or by the
    /// downstream element through a bridge.
    real: Store<Queued>,

    /// Transmission gate, present only with a zero-buffer downstream.
    /// Carries copies of the packets in `real` that have not been sent yet.
    mirror: Option<Store<Packet>>,
}

impl ClassQueues {
    fn new(mirrored: bool) -> Self {
        Self {
            real: Store::new(),
            mirror: mirrored.then(Store::new),
        }
    }
}

#[derive(Debug, Default)]
struct Ledger {
    // ---
    packets_per_priority: BTreeMap<Priority, usize>,
    bytes_per_flow: BTreeMap<FlowId, u64>,
    total_packets: usize,
    packets_received: u64,
    /// Bridged packets waiting here; still accounted by the upstream owner.
    bridged: usize,
    queues: BTreeMap<Priority, ClassQueues>,
    in_service: Option<Packet>,
}

impl Ledger {
    // ---
    /// Packets admitted and not yet picked for transmission.
    ///
    /// With a zero-buffer downstream, sent packets stay accounted here
    /// until released, so only the gates tell what still needs service.
    fn awaiting_service(&self, mirrored: bool) -> usize {
        if mirrored {
            self.queues
                .values()
                .filter_map(|q| q.mirror.as_ref())
                .map(Store::len)
                .sum()
        } else {
            self.total_packets + self.bridged
        }
    }

    fn count(&self, priority: Priority) -> usize {
        self.packets_per_priority
            .get(&priority)
            .copied()
            .unwrap_or(0)
    }
}

struct Inner {
    // ---
    name: String,
    rate: f64,
    zero_buffer: bool,
    zero_downstream_buffer: bool,
    debug: bool,
    table: PriorityTable,
    clock: SimClock,
    out: ElementPtr,
    work: WorkSignal,
    ledger: Mutex<Ledger>,
}

// ---------------------------------------------------------------------------
// LedgerSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time copy of an element's accounting, for monitors.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSnapshot {
    // ---
    pub in_service: Option<Packet>,
    pub total_packets: usize,
    pub packets_received: u64,
    pub bridged_packets: usize,
    pub packets_per_priority: BTreeMap<Priority, usize>,
    pub bytes_per_flow: BTreeMap<FlowId, u64>,
}

// ---------------------------------------------------------------------------
// SpServer
// ---------------------------------------------------------------------------

/// Static-priority egress element.
///
/// Packets are admitted with [`SpServer::put`] into one FIFO per priority
/// class. A single service loop ([`SpServer::run`]) repeatedly picks the
/// head of the most urgent non-empty class, holds the link for
/// `size_bytes * 8 / rate` simulated units, then hands the packet to the
/// downstream element. A packet in transmission is never preempted.
///
/// The handle is cheap to clone; all clones share one element.
///
/// # Zero-buffer chains
///
/// An element built with [`SpConfig::feeding_zero_buffer`] keeps every
/// packet it sends in its own buffer and forwards it with a [`Bridge`].
/// The downstream element (built with [`SpConfig::zero_buffer`]) queues the
/// bridged packet without accounting it: counts and bytes stay with the
/// upstream owner until the downstream element drains the packet and
/// releases it there. Bridged packets waiting downstream are visible through
/// [`SpServer::bridged_packets`] only, so summing `total_packets` over the
/// stages counts every packet once.
#[derive(Clone)]
pub struct SpServer {
    inner: Arc<Inner>,
}

// ---

impl SpServer {
    // ---
    /// Validate `config` and build an idle element feeding `out`.
    ///
    /// The service loop is not started; see [`SpServer::spawn`].
    pub fn new(config: SpConfig, clock: SimClock, out: ElementPtr) -> Result<Self> {
        // ---
        if !(config.rate.is_finite() && config.rate > 0.0) {
            return Err(SpqError::InvalidRate(config.rate));
        }
        let table = PriorityTable::new(&config.priorities)?;

        let inner = Inner {
            name: config.name,
            rate: config.rate,
            zero_buffer: config.zero_buffer,
            zero_downstream_buffer: config.zero_downstream_buffer,
            debug: config.debug,
            table,
            clock,
            out,
            work: WorkSignal::new(),
            ledger: Mutex::new(Ledger::default()),
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    // ---

    /// Start the service loop on the current runtime.
    ///
    /// The task only finishes if an accounting or configuration error
    /// surfaces while draining; that error is logged and returned.
    pub fn spawn(&self) -> JoinHandle<Result<()>> {
        // ---
        let server = self.clone();
        tokio::spawn(async move {
            let name = server.inner.name.clone();
            let result = server.run().await;
            if let Err(e) = &result {
                tracing::error!(element = %name, "service loop stopped: {e}");
            }
            result
        })
    }

    /// The service loop: select, transmit, and wait for work when idle.
    pub async fn run(self) -> Result<()> {
        // ---
        loop {
            if let Some((priority, queues)) = self.select() {
                self.transmit(priority, queues).await?;
            }
            if self.is_idle() {
                self.inner.work.wait().await;
            }
        }
    }

    // ---

    /// Admit `packet` into the buffer of its flow's priority class.
    ///
    /// Never suspends. `bridge` is accepted only by a zero-buffer element.
    /// A rejected packet leaves the ledger untouched.
    pub fn put(&self, packet: Packet, bridge: Option<Bridge>) -> Result<()> {
        // ---
        let priority = self.inner.table.resolve(packet.flow_id)?;
        if bridge.is_some() && !self.inner.zero_buffer {
            return Err(SpqError::UnexpectedBridge);
        }

        let mirrored = self.inner.zero_downstream_buffer;
        let was_idle = {
            let mut ledger = self.lock();
            let was_idle = ledger.awaiting_service(mirrored) == 0;

            ledger.packets_received += 1;
            if bridge.is_some() {
                ledger.bridged += 1;
                ledger.bytes_per_flow.entry(packet.flow_id).or_insert(0);
            } else {
                ledger.total_packets += 1;
                *ledger.packets_per_priority.entry(priority).or_insert(0) += 1;
                *ledger.bytes_per_flow.entry(packet.flow_id).or_insert(0) += packet.size_bytes;
            }

            if self.inner.debug {
                tracing::debug!(
                    element = %self.inner.name,
                    time = self.inner.clock.now(),
                    flow_id = packet.flow_id,
                    packet_id = packet.id,
                    %priority,
                    queued = ledger.count(priority),
                    bridged = bridge.is_some(),
                    "packet admitted",
                );
            }

            let queues = ledger
                .queues
                .entry(priority)
                .or_insert_with(|| ClassQueues::new(mirrored));
            if let Some(mirror) = &queues.mirror {
                mirror.put(packet.clone());
            }
            queues.real.put(Queued::new(packet, bridge));
            was_idle
        };

        if was_idle {
            self.inner.work.signal();
        }
        Ok(())
    }

    /// Drain accounting for a packet that has left this element's buffer.
    ///
    /// A bridged packet is released upstream, where it is accounted; here
    /// only the bridged count drops. Fails without touching the ledger if
    /// the packet was never accounted here.
    pub fn update(&self, packet: &Packet, bridge: Option<Bridge>) -> Result<()> {
        // ---
        if let Some(bridge) = bridge {
            return self.release_bridged(packet, bridge);
        }

        let unrecorded = || SpqError::UnrecordedFlow {
            flow_id: packet.flow_id,
            packet_id: packet.id,
        };

        let mut ledger = self.lock();
        let queued = ledger
            .bytes_per_flow
            .get(&packet.flow_id)
            .copied()
            .ok_or_else(unrecorded)?;
        let priority = self
            .inner
            .table
            .resolve(packet.flow_id)
            .map_err(|_| unrecorded())?;

        if ledger.count(priority) == 0 {
            return Err(SpqError::EmptyPriority { priority });
        }
        if queued < packet.size_bytes {
            return Err(SpqError::ByteUnderflow {
                flow_id: packet.flow_id,
                queued,
                size: packet.size_bytes,
            });
        }

        ledger.total_packets -= 1;
        if let Some(count) = ledger.packets_per_priority.get_mut(&priority) {
            *count -= 1;
        }
        if let Some(bytes) = ledger.bytes_per_flow.get_mut(&packet.flow_id) {
            *bytes -= packet.size_bytes;
        }
        Ok(())
    }

    fn release_bridged(&self, packet: &Packet, bridge: Bridge) -> Result<()> {
        // ---
        let unrecorded = || SpqError::UnrecordedBridge {
            flow_id: packet.flow_id,
            packet_id: packet.id,
        };

        if self.lock().bridged == 0 {
            return Err(unrecorded());
        }
        bridge.release(packet)?;

        let mut ledger = self.lock();
        ledger.bridged = ledger.bridged.checked_sub(1).ok_or_else(unrecorded)?;
        Ok(())
    }

    // ---

    /// The packet currently holding the link, if any.
    pub fn packet_in_service(&self) -> Option<Packet> {
        self.lock().in_service.clone()
    }

    /// Bytes of `flow_id` still accounted in this element.
    pub fn byte_size(&self, flow_id: FlowId) -> u64 {
        self.lock()
            .bytes_per_flow
            .get(&flow_id)
            .copied()
            .unwrap_or(0)
    }

    /// Packets of class `priority` still accounted in this element.
    pub fn size(&self, priority: Priority) -> usize {
        self.lock().count(priority)
    }

    /// Every flow ever admitted, ascending.
    pub fn all_flows(&self) -> Vec<FlowId> {
        self.lock().bytes_per_flow.keys().copied().collect()
    }

    pub fn total_packets(&self) -> usize {
        self.lock().total_packets
    }

    pub fn packets_received(&self) -> u64 {
        self.lock().packets_received
    }

    /// Bridged packets queued here and not yet drained. The upstream owner
    /// still accounts them.
    pub fn bridged_packets(&self) -> usize {
        self.lock().bridged
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        // ---
        let ledger = self.lock();
        LedgerSnapshot {
            in_service: ledger.in_service.clone(),
            total_packets: ledger.total_packets,
            packets_received: ledger.packets_received,
            bridged_packets: ledger.bridged,
            packets_per_priority: ledger.packets_per_priority.clone(),
            bytes_per_flow: ledger.bytes_per_flow.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn rate(&self) -> f64 {
        self.inner.rate
    }

    pub fn priority_table(&self) -> &PriorityTable {
        &self.inner.table
    }

    // ---

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.inner
            .ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_idle(&self) -> bool {
        self.lock()
            .awaiting_service(self.inner.zero_downstream_buffer)
            == 0
    }

    /// Most urgent class with a packet awaiting service.
    ///
    /// With a zero-buffer downstream a class qualifies only while its gate
    /// holds a packet: the rest of its buffer is already in flight.
    fn select(&self) -> Option<(Priority, ClassQueues)> {
        // ---
        let ledger = self.lock();
        self.inner.table.order().iter().find_map(|&priority| {
            let queues = ledger.queues.get(&priority)?;
            let waiting = match &queues.mirror {
                Some(mirror) => !mirror.is_empty(),
                None => !queues.real.is_empty(),
            };
            waiting.then(|| (priority, queues.clone()))
        })
    }

    async fn transmit(&self, priority: Priority, queues: ClassQueues) -> Result<()> {
        // ---
        let (mut packet, bridge) = match &queues.mirror {
            Some(mirror) => {
                let packet = mirror.get().await;
                let bridge = Bridge::new(queues.real.clone(), self.drain_hook());
                (packet, Some(bridge))
            }
            None => {
                let Queued { packet, bridge } = queues.real.get().await;
                self.update(&packet, bridge)?;
                (packet, None)
            }
        };
        packet.priority = Some(priority);

        self.lock().in_service = Some(packet.clone());

        let duration = packet.transmission_time(self.inner.rate);
        if self.inner.debug {
            tracing::debug!(
                element = %self.inner.name,
                time = self.inner.clock.now(),
                flow_id = packet.flow_id,
                packet_id = packet.id,
                %priority,
                duration,
                "transmission started",
            );
        }
        self.inner.clock.sleep(duration).await;

        let sent = self.inner.out.put(packet, bridge);
        self.lock().in_service = None;
        sent
    }

    /// Drain accounting handed downstream inside a [`Bridge`].
    fn drain_hook(&self) -> DrainHook {
        let server = self.clone();
        Arc::new(move |slot: Queued| -> Result<()> { server.update(&slot.packet, slot.bridge) })
    }
}

// ---

impl Element for SpServer {
    fn put(&self, packet: Packet, bridge: Option<Bridge>) -> Result<()> {
        SpServer::put(self, packet, bridge)
    }
}

impl std::fmt::Debug for SpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpServer")
            .field("name", &self.inner.name)
            .field("rate", &self.inner.rate)
            .field("zero_buffer", &self.inner.zero_buffer)
            .field("zero_downstream_buffer", &self.inner.zero_downstream_buffer)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
