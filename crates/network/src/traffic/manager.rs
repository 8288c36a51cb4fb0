//! The traffic manager: per-cycle driver of the fabric.
//!
//! This is the central state machine of the simulator. It provides:
//! 1. **Packet assembly:** `generate_packet` lays out head/body/tail flits
//!    into the per-(node, class) partial-packet queues.
//! 2. **Injection:** Per (subnet, node) per cycle, a class is arbitrated, a
//!    head flit gets an output VC, and at most one flit enters the network.
//! 3. **Step driver:** The fixed phase order — watchdog, eject & credit,
//!    inject, retire, network evaluate — executed once per `step`.
//! 4. **Retirement:** Ejected flits leave the in-flight sets; tails complete
//!    packets, record latency statistics, and are reported to the caller for
//!    callback dispatch.
//!
//! The phase order is load-bearing: injecting before ejecting would lose a
//! cycle of buffer availability, and evaluating before reading inputs would
//! stall every channel by one cycle.

use std::collections::{HashMap, HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace, warn};

use super::buffer_state::BufferState;
use crate::common::flit::{Credit, Flit, FlitId, FlitKind, PacketId};
use crate::common::{NocError, Result};
use crate::config::{Config, PriorityMode};
use crate::net::NetworkAdapter;
use crate::routing::mesh::PORT_LOCAL;
use crate::routing::{OutputSet, RoutingContext, RoutingFunction};
use crate::stats::{ClassStats, OverallStats};

/// Completion record pushed when a request-type tail retires; consumed by an
/// optional reply generator at the destination.
#[derive(Clone, Copy, Debug)]
pub struct ReplyInfo {
    /// Node that sent the request.
    pub source: usize,
    /// Cycle the request's tail arrived.
    pub time: u64,
    /// Whether the request was measured.
    pub record: bool,
    /// Request type to reply to.
    pub kind: FlitKind,
}

/// The per-cycle traffic driver.
///
/// Owns all flit bookkeeping between admission and retirement. The host
/// facade calls [`TrafficManager::generate_packet`] and
/// [`TrafficManager::step`]; everything else is internal state.
pub struct TrafficManager {
    nodes: usize,
    subnets: usize,
    classes: usize,

    rf: RoutingFunction,
    ctx: RoutingContext,
    lookahead_routing: bool,
    noq: bool,
    hold_switch_for_packet: bool,
    pri_mode: PriorityMode,
    class_priority: Vec<i64>,
    /// Subnet per typed packet kind, indexed by [`FlitKind`] discriminant
    /// order (read req, read reply, write req, write reply).
    subnet_map: [usize; 4],

    time: u64,
    cur_id: u64,
    cur_pid: u64,

    deadlock_timer: u64,
    deadlock_warn_timeout: u64,
    deadlock_warnings: u64,

    /// Downstream buffer mirrors, indexed `[node][subnet]`.
    buf_states: Vec<Vec<BufferState>>,
    /// Last class injected, indexed `[node][subnet]`.
    last_class: Vec<Vec<usize>>,
    /// Last VC claimed, indexed `[node][subnet][class]`.
    last_vc: Vec<Vec<Vec<Option<usize>>>>,

    /// Flits awaiting injection, indexed `[node][class]`.
    partial_packets: Vec<Vec<VecDeque<Flit>>>,
    /// Ids of all generated, not-yet-retired flits, per class.
    in_flight_flits: Vec<HashSet<FlitId>>,
    /// Subset of `in_flight_flits` with the record flag, per class.
    measured_in_flight_flits: Vec<HashSet<FlitId>>,
    /// Head flits kept alive from head-retirement to tail-retirement, per
    /// class, keyed by packet.
    retired_heads: Vec<HashMap<PacketId, Flit>>,

    /// Flits generated at a node and not yet ejected anywhere, indexed
    /// `[subnet][node]`; gates per-cycle injection work.
    outstanding_flits: Vec<Vec<u64>>,
    /// Flits headed for a node and not yet ejected there, indexed
    /// `[subnet][node]`; gates per-cycle ejection reads.
    expected_flits: Vec<Vec<u64>>,

    packet_seq_no: Vec<u64>,
    replies_pending: Vec<Vec<ReplyInfo>>,
    requests_outstanding: Vec<i64>,

    watch_flits: HashSet<u64>,
    watch_packets: HashSet<u64>,

    class_stats: Vec<ClassStats>,
    overall: OverallStats,

    rng: StdRng,
}

impl TrafficManager {
    /// Creates a traffic manager for the given configuration and routing
    /// function.
    pub fn new(config: &Config, rf: RoutingFunction, ctx: RoutingContext) -> Self {
        let nodes = config.nodes();
        let subnets = config.network.subnets;
        let classes = config.traffic.classes;
        let num_vcs = config.network.num_vcs;
        let vc_buf = config.network.vc_buf_size;
        Self {
            nodes,
            subnets,
            classes,
            rf,
            ctx,
            lookahead_routing: config.timing.routing_delay == 0,
            noq: config.sim.noq,
            hold_switch_for_packet: config.traffic.hold_switch_for_packet,
            pri_mode: config.traffic.priority,
            class_priority: (0..classes)
                .map(|c| config.traffic.class_priority_for(c))
                .collect(),
            subnet_map: [
                config.traffic.read_request_subnet,
                config.traffic.read_reply_subnet,
                config.traffic.write_request_subnet,
                config.traffic.write_reply_subnet,
            ],
            time: 0,
            cur_id: 0,
            cur_pid: 0,
            deadlock_timer: 0,
            deadlock_warn_timeout: config.sim.deadlock_warn_timeout,
            deadlock_warnings: 0,
            buf_states: (0..nodes)
                .map(|_| (0..subnets).map(|_| BufferState::new(num_vcs, vc_buf)).collect())
                .collect(),
            last_class: vec![vec![0; subnets]; nodes],
            last_vc: vec![vec![vec![None; classes]; subnets]; nodes],
            partial_packets: (0..nodes)
                .map(|_| (0..classes).map(|_| VecDeque::new()).collect())
                .collect(),
            in_flight_flits: vec![HashSet::new(); classes],
            measured_in_flight_flits: vec![HashSet::new(); classes],
            retired_heads: vec![HashMap::new(); classes],
            outstanding_flits: vec![vec![0; nodes]; subnets],
            expected_flits: vec![vec![0; nodes]; subnets],
            packet_seq_no: vec![0; nodes],
            replies_pending: (0..nodes).map(|_| Vec::new()).collect(),
            requests_outstanding: vec![0; nodes],
            watch_flits: config.stats.watch_flits.iter().copied().collect(),
            watch_packets: config.stats.watch_packets.iter().copied().collect(),
            class_stats: (0..classes)
                .map(|_| ClassStats::new(nodes, config.stats.pair_stats))
                .collect(),
            overall: OverallStats::new(classes),
            rng: StdRng::seed_from_u64(config.sim.seed),
        }
    }

    /// The current cycle.
    #[inline]
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Advances the cycle counter without simulating; used by the skip-step
    /// fast path.
    #[inline]
    pub fn incr_time(&mut self) {
        self.time += 1;
    }

    /// Deadlock warnings emitted so far.
    #[inline]
    pub fn deadlock_warnings(&self) -> u64 {
        self.deadlock_warnings
    }

    /// Ids of measured in-flight flits for one class.
    pub fn measured_in_flight(&self, class: usize) -> &HashSet<FlitId> {
        &self.measured_in_flight_flits[class]
    }

    /// Total flits generated and not yet retired, across classes.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight_flits.iter().map(HashSet::len).sum()
    }

    /// Flits queued for injection at a node (all classes).
    pub fn queued_at(&self, node: usize) -> usize {
        self.partial_packets[node].iter().map(VecDeque::len).sum()
    }

    /// Reply records accumulated at a node.
    pub fn replies_pending(&self, node: usize) -> &[ReplyInfo] {
        &self.replies_pending[node]
    }

    /// Drains the reply records accumulated at a node.
    pub fn take_replies(&mut self, node: usize) -> Vec<ReplyInfo> {
        std::mem::take(&mut self.replies_pending[node])
    }

    /// Requests admitted at a node minus replies retired there.
    pub fn requests_outstanding(&self, node: usize) -> i64 {
        self.requests_outstanding[node]
    }

    /// Current-period statistics per class.
    pub fn class_stats(&self) -> &[ClassStats] {
        &self.class_stats
    }

    /// Roll-up accumulators across sample periods.
    pub fn overall_stats(&self) -> &OverallStats {
        &self.overall
    }

    /// Records the shortest credit round-trip for a (node, subnet) channel
    /// pair; debug sanity only.
    pub fn set_min_latency(&mut self, node: usize, subnet: usize, cycles: u64) {
        self.buf_states[node][subnet].set_min_latency(cycles);
    }

    /// Read-only view of one buffer mirror, for harnesses asserting credit
    /// balance.
    pub fn buffer_state(&self, node: usize, subnet: usize) -> &BufferState {
        &self.buf_states[node][subnet]
    }

    /// Folds the current sample period into the overall accumulators and
    /// starts a fresh period.
    pub fn update_stats(&mut self) {
        self.overall.fold(&self.class_stats);
        for stats in &mut self.class_stats {
            stats.clear();
        }
    }

    /// Lays out a packet of `size` flits and queues it for injection.
    ///
    /// The head flit carries the destination; body flits carry none; the
    /// last flit is the tail (for `size == 1` one flit is both). Flit ids
    /// are contiguous, head first. A `ctime` of `None` means the current
    /// cycle; a future `ctime` is legal and holds the packet in the queue
    /// until the clock catches up.
    ///
    /// # Arguments
    ///
    /// * `source` - Injecting node.
    /// * `dest` - Destination node.
    /// * `size` - Packet length in flits; must be at least 1.
    /// * `kind` - Packet type; picks the subnet (random for `Any`).
    /// * `class` - Traffic class.
    /// * `ctime` - Host-side issue cycle, or `None` for "now".
    ///
    /// # Returns
    ///
    /// The fresh packet id.
    pub fn generate_packet(
        &mut self,
        source: usize,
        dest: usize,
        size: usize,
        kind: FlitKind,
        class: usize,
        ctime: Option<u64>,
    ) -> Result<PacketId> {
        if size == 0 {
            return Err(NocError::InvalidArgument("packet size must be >= 1".into()));
        }
        if source >= self.nodes || dest >= self.nodes {
            return Err(NocError::InvalidArgument(format!(
                "nodes ({source}, {dest}) out of range 0..{}",
                self.nodes
            )));
        }
        if class >= self.classes {
            return Err(NocError::InvalidArgument(format!(
                "class {class} out of range 0..{}",
                self.classes
            )));
        }
        let ctime = ctime.unwrap_or(self.time);
        let subnet = match kind {
            FlitKind::ReadRequest => self.subnet_map[0],
            FlitKind::ReadReply => self.subnet_map[1],
            FlitKind::WriteRequest => self.subnet_map[2],
            FlitKind::WriteReply => self.subnet_map[3],
            FlitKind::Any => self.rng.gen_range(0..self.subnets),
        };
        self.packet_seq_no[source] += 1;
        self.requests_outstanding[source] += 1;

        let pid = PacketId(self.cur_pid);
        self.cur_pid += 1;
        let pri = match self.pri_mode {
            PriorityMode::Class => self.class_priority[class],
            PriorityMode::Age | PriorityMode::LocalAge => i64::MAX - ctime as i64,
            PriorityMode::Sequence => i64::MAX - self.packet_seq_no[source] as i64,
            _ => 0,
        };
        let watch_packet = self.watch_packets.contains(&pid.0);

        for i in 0..size {
            let id = FlitId(self.cur_id);
            self.cur_id += 1;
            let mut f = Flit::new(id, pid);
            f.head = i == 0;
            f.tail = i == size - 1;
            f.src = source;
            f.dest = f.head.then_some(dest);
            f.subnet = subnet;
            f.class = class;
            f.kind = kind;
            f.ctime = ctime;
            f.record = true;
            f.watch = watch_packet || self.watch_flits.contains(&id.0);
            f.pri = pri;
            if f.watch {
                trace!(
                    cycle = self.time,
                    flit = id.0,
                    packet = pid.0,
                    src = source,
                    "generated flit"
                );
            }
            let _ = self.in_flight_flits[class].insert(id);
            let _ = self.measured_in_flight_flits[class].insert(id);
            self.partial_packets[source][class].push_back(f);
        }
        self.outstanding_flits[subnet][source] += size as u64;
        self.expected_flits[subnet][dest] += size as u64;
        Ok(pid)
    }

    /// Executes one cycle: watchdog, eject & credit, inject, retire, network
    /// evaluate; then advances the clock.
    ///
    /// # Arguments
    ///
    /// * `nets` - One network per subnet, in subnet order.
    ///
    /// # Returns
    ///
    /// Packet ids whose tails retired this cycle, for callback dispatch.
    pub fn step(&mut self, nets: &mut [Box<dyn NetworkAdapter>]) -> Result<Vec<PacketId>> {
        // Phase 1: deadlock watchdog.
        let flits_in_flight = self.in_flight_flits.iter().any(|s| !s.is_empty());
        if flits_in_flight {
            self.deadlock_timer += 1;
            if self.deadlock_timer >= self.deadlock_warn_timeout {
                self.deadlock_timer = 0;
                self.deadlock_warnings += 1;
                warn!(cycle = self.time, "possible network deadlock");
            }
        }

        // Phase 2: eject flits and consume credits, then let channels settle.
        let mut ejected: Vec<(usize, usize, Flit)> = Vec::new();
        for (subnet, net) in nets.iter_mut().enumerate() {
            for node in 0..self.nodes {
                if self.expected_flits[subnet][node] > 0 {
                    if let Some(flit) = net.read_flit(node) {
                        if flit.watch {
                            debug!(
                                cycle = self.time,
                                flit = flit.id.0,
                                packet = flit.pid.0,
                                node,
                                "ejecting flit"
                            );
                        }
                        self.class_stats[flit.class].accepted_flits[node] += 1;
                        if flit.tail {
                            self.class_stats[flit.class].accepted_packets[node] += 1;
                        }
                        self.expected_flits[subnet][node] -= 1;
                        self.outstanding_flits[subnet][flit.src] =
                            self.outstanding_flits[subnet][flit.src].saturating_sub(1);
                        ejected.push((subnet, node, flit));
                    }
                }
                if let Some(credit) = net.read_credit(node) {
                    self.buf_states[node][subnet].process_credit(&credit)?;
                }
            }
            net.read_inputs()?;
        }

        // Phase 3: injection, at most one flit per (subnet, node).
        for (subnet, net) in nets.iter_mut().enumerate() {
            for node in 0..self.nodes {
                self.inject_one(subnet, node, net.as_mut())?;
            }
        }

        // Phase 4: retire ejected flits; manufacture their credits first so
        // the upstream buffer sees the freed slot.
        let mut completed = Vec::new();
        for (subnet, node, mut flit) in ejected {
            flit.atime = self.time;
            let vc = flit.vc.ok_or_else(|| {
                NocError::InternalInvariant(format!("flit {:?} ejected with no VC", flit.id))
            })?;
            nets[subnet].write_credit(Credit::for_vc(vc), node);
            if let Some(pid) = self.retire_flit(flit, node)? {
                completed.push(pid);
            }
        }

        // Phase 5: one router cycle, then publish channel outputs.
        for net in nets.iter_mut() {
            net.evaluate()?;
            net.write_outputs()?;
        }

        self.time += 1;
        Ok(completed)
    }

    /// Injects at most one flit for (subnet, node): class arbitration, VC
    /// selection for fresh heads, and the commit into the network.
    fn inject_one(
        &mut self,
        subnet: usize,
        node: usize,
        net: &mut dyn NetworkAdapter,
    ) -> Result<()> {
        if self.outstanding_flits[subnet][node] == 0 {
            return Ok(());
        }

        let last_class = self.last_class[node][subnet];
        let mut class_limit = self.classes;
        let mut winner: Option<usize> = None;
        let mut winner_pri = 0i64;

        // Hold the switch for the in-progress packet: keep draining body
        // flits of the last class while its VC has room.
        if self.hold_switch_for_packet {
            if let Some(front) = self.partial_packets[node][last_class].front() {
                if !front.head && front.subnet == subnet {
                    if let Some(vc) = front.vc {
                        if !self.buf_states[node][subnet].is_full_for(vc) {
                            winner = Some(last_class);
                            winner_pri = front.pri;
                            class_limit -= 1;
                        }
                    }
                }
            }
        }

        // Round-robin over classes from the one after the last injected;
        // a candidate is replaced only by strictly greater priority.
        for i in 1..=class_limit {
            let c = (last_class + i) % self.classes;
            let Some(front) = self.partial_packets[node][c].front() else {
                continue;
            };
            if front.subnet != subnet {
                continue;
            }
            if winner.is_some() && winner_pri >= front.pri {
                continue;
            }
            if front.ctime > self.time {
                // Future-dated packets wait in the queue.
                continue;
            }
            if front.head && front.vc.is_none() {
                self.select_output_vc(subnet, node, c)?;
            }
            let Some(front) = self.partial_packets[node][c].front() else {
                continue;
            };
            let Some(vc) = front.vc else {
                // No free output VC this cycle.
                continue;
            };
            if self.buf_states[node][subnet].is_full_for(vc) {
                continue;
            }
            winner_pri = front.pri;
            winner = Some(c);
        }

        let Some(class) = winner else {
            return Ok(());
        };
        let Some(mut f) = self.partial_packets[node][class].pop_front() else {
            return Ok(());
        };
        let vc = f.vc.ok_or_else(|| {
            NocError::InternalInvariant(format!("flit {:?} selected without a VC", f.id))
        })?;

        if f.head {
            if self.lookahead_routing {
                if !self.noq {
                    // Precompute the first-hop route; with NOQ it was already
                    // generated during VC selection.
                    let mut la = OutputSet::new();
                    (self.rf)(&self.ctx, Some(node), &f, Some(PORT_LOCAL), &mut la, false);
                    f.la_route_set = la;
                }
            } else {
                f.la_route_set.clear();
            }
            self.buf_states[node][subnet].take_buffer(vc, f.pid)?;
            self.last_vc[node][subnet][class] = Some(vc);
        }
        self.last_class[node][subnet] = class;

        f.itime = self.time;
        self.buf_states[node][subnet].sending_flit(&f)?;
        if self.pri_mode == PriorityMode::NetworkAge {
            f.pri = i64::MAX - self.time as i64;
        }

        // Pass the selected VC on to the next flit of the same packet.
        if !f.tail {
            if let Some(next) = self.partial_packets[node][class].front_mut() {
                next.vc = Some(vc);
            }
        }

        self.class_stats[class].sent_flits[node] += 1;
        if f.head {
            self.class_stats[class].sent_packets[node] += 1;
        }
        if f.watch {
            debug!(
                cycle = self.time,
                flit = f.id.0,
                packet = f.pid.0,
                subnet,
                vc,
                pri = f.pri,
                "injecting flit"
            );
        }
        net.write_flit(f, node);
        Ok(())
    }

    /// Finds an output VC for the head flit at the front of
    /// `partial_packets[node][class]`, assigning it on success and leaving
    /// it unassigned when every candidate is owned or full.
    fn select_output_vc(&mut self, subnet: usize, node: usize, class: usize) -> Result<()> {
        let mut route_set = OutputSet::new();
        {
            let Some(front) = self.partial_packets[node][class].front() else {
                return Ok(());
            };
            (self.rf)(&self.ctx, None, front, None, &mut route_set, true);
        }
        let range = route_set.single()?;
        if range.port.is_some() {
            return Err(NocError::InternalInvariant(
                "injection-phase routing produced an output port".into(),
            ));
        }
        let mut vc_start = range.vc_start;
        let mut vc_end = range.vc_end;

        if self.noq {
            // The lookahead targets the first hop, not the injection, so the
            // head needs a temporary VC for the routing call.
            let next_output = {
                let Some(front) = self.partial_packets[node][class].front_mut() else {
                    return Ok(());
                };
                front.vc = Some(vc_start);
                let mut la = OutputSet::new();
                (self.rf)(&self.ctx, Some(node), front, Some(PORT_LOCAL), &mut la, false);
                front.vc = None;
                let port = la.single()?.port.ok_or_else(|| {
                    NocError::InternalInvariant("lookahead routing produced no port".into())
                })?;
                front.la_route_set = la;
                port
            };
            let chunk = (vc_end - vc_start + 1) / self.ctx.num_ports;
            if chunk > 0 {
                vc_start += next_output * chunk;
                vc_end = vc_start + chunk - 1;
            }
        }

        let vc_count = vc_end - vc_start + 1;
        let start_offset = match self.last_vc[node][subnet][class] {
            Some(lvc) if (vc_start..=vc_end).contains(&lvc) => (lvc - vc_start + 1) % vc_count,
            _ => 0,
        };
        let buf = &self.buf_states[node][subnet];
        let mut chosen = None;
        for i in 0..vc_count {
            let vc = vc_start + (start_offset + i) % vc_count;
            if buf.is_available_for(vc) && !buf.is_full_for(vc) {
                chosen = Some(vc);
                break;
            }
        }
        if let Some(vc) = chosen {
            if let Some(front) = self.partial_packets[node][class].front_mut() {
                front.vc = Some(vc);
            }
        }
        Ok(())
    }

    /// Retires one ejected flit at `dest`, returning the packet id when the
    /// flit was a tail (the packet is then complete).
    fn retire_flit(&mut self, f: Flit, dest: usize) -> Result<Option<PacketId>> {
        self.deadlock_timer = 0;
        let class = f.class;

        if !self.in_flight_flits[class].remove(&f.id) {
            return Err(NocError::InternalInvariant(format!(
                "flit {:?} retired twice",
                f.id
            )));
        }
        if f.record {
            let _ = self.measured_in_flight_flits[class].remove(&f.id);
        }
        if f.watch {
            debug!(
                cycle = self.time,
                flit = f.id.0,
                packet = f.pid.0,
                node = dest,
                hops = f.hops,
                flat = f.atime - f.itime,
                "retiring flit"
            );
        }

        if f.head && f.dest != Some(dest) {
            return Err(NocError::RoutingViolation {
                flit: f.id,
                arrived: dest,
                expected: f.dest.unwrap_or(usize::MAX),
            });
        }

        let flat = (f.atime - f.itime) as f64;
        let stats = &mut self.class_stats[class];
        if stats.slowest_flit.is_none() || stats.flat.max() < flat {
            stats.slowest_flit = Some(f.id);
        }
        stats.flat.add_sample(flat);
        if let Some(pair) = stats.pair_flat.as_mut() {
            pair[f.src * self.nodes + dest].add_sample(flat);
        }

        let mut completed = None;
        if f.tail {
            let head = if f.head {
                None
            } else {
                Some(self.retired_heads[class].remove(&f.pid).ok_or_else(|| {
                    NocError::InternalInvariant(format!(
                        "tail of {:?} retired with no recorded head",
                        f.pid
                    ))
                })?)
            };
            let head_ref = head.as_ref().unwrap_or(&f);
            let plat = (f.atime - head_ref.ctime) as f64;
            let nlat = (f.atime - head_ref.itime) as f64;
            // Flit ids are contiguous within a packet, so the id spread is
            // the packet length minus one.
            let frag =
                ((f.atime - head_ref.atime) as i64 - (f.id.0 - head_ref.id.0) as i64) as f64;
            if f.watch {
                debug!(
                    cycle = self.time,
                    packet = f.pid.0,
                    plat,
                    nlat,
                    frag,
                    "retiring packet"
                );
            }
            if f.record {
                let stats = &mut self.class_stats[class];
                if stats.slowest_packet.is_none() || stats.plat.max() < plat {
                    stats.slowest_packet = Some(f.pid);
                }
                stats.plat.add_sample(plat);
                stats.nlat.add_sample(nlat);
                stats.frag.add_sample(frag);
                stats.hops.add_sample(f64::from(f.hops));
                if let Some(pair) = stats.pair_plat.as_mut() {
                    pair[f.src * self.nodes + dest].add_sample(plat);
                }
            }
            match f.kind {
                FlitKind::ReadRequest | FlitKind::WriteRequest => {
                    self.replies_pending[dest].push(ReplyInfo {
                        source: f.src,
                        time: f.atime,
                        record: f.record,
                        kind: f.kind,
                    });
                }
                FlitKind::ReadReply | FlitKind::WriteReply => {
                    self.requests_outstanding[dest] -= 1;
                }
                FlitKind::Any => {
                    self.requests_outstanding[f.src] -= 1;
                }
            }
            completed = Some(f.pid);
            // The retained head (when distinct from the tail) drops here.
        } else if f.head {
            let _ = self.retired_heads[class].insert(f.pid, f);
        }
        Ok(completed)
    }
}
