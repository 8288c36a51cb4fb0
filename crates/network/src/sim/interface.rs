//! Host-facing interconnect interface.
//!
//! This is the boundary an embedding simulator talks to. It provides:
//! 1. **Admission:** `admit` turns a (source, dest, size, issue-cycle,
//!    handle) request into queued flits and returns the packet id.
//! 2. **Callbacks:** Completion callbacks registered per opaque handle; the
//!    tail ejection fires `read_done(0, pid, 1)` synchronously from `step`.
//! 3. **Step pump:** One `step` call per cycle, with a skip-step fast path
//!    when nothing is in flight and an optional latency-only empty-step
//!    calibration mode.
//! 4. **Queries and statistics:** Cycle counter, fabric parameters embedders
//!    need for clock conversion, periodic roll-ups, and report writers.
//!
//! Mutual exclusion between `admit`, `step`, and callback delivery on one
//! instance is enforced statically: everything takes `&mut self`, and the
//! callbacks run inside `step`'s borrow.

use std::collections::HashMap;
use std::io::{self, Write};

use tracing::warn;

use crate::common::flit::{FlitKind, HandleTag, PacketId};
use crate::common::{NocError, Result};
use crate::config::Config;
use crate::net::NetworkAdapter;
use crate::net::mesh::MeshNetwork;
use crate::routing::mesh::distance;
use crate::routing::{RoutingContext, RoutingRegistry};
use crate::stats;
use crate::traffic::TrafficManager;

/// A host completion callback: `(source_id, packet_id, status)`; status `1`
/// means success.
pub type CompletionFn = Box<dyn FnMut(u32, u64, u64)>;

/// The two callbacks a host registers per opaque handle.
struct HostCallbacks {
    read_done: CompletionFn,
    /// Registered for interface compatibility; completions currently flow
    /// through the read path, like the embedding simulators expect.
    #[allow(dead_code)]
    write_done: CompletionFn,
}

/// The embedding surface: traffic manager, per-subnet networks, callback
/// registry, and the step pump.
pub struct NocInterface {
    config: Config,
    manager: TrafficManager,
    nets: Vec<Box<dyn NetworkAdapter>>,

    callbacks: HashMap<HandleTag, HostCallbacks>,
    /// Packet → handle mapping established at admission, consumed at tail
    /// ejection.
    in_flight_packets: HashMap<PacketId, HandleTag>,
    outstanding_packets: u64,

    hop_delay: u64,
    step_calls: u64,
    skipped_steps: u64,
    non_skipped_steps: u64,
    steps_since_update: u64,

    /// Zero-load countdowns per packet, used only in empty-step mode.
    zll_countdown: HashMap<PacketId, u64>,
    /// Packet ids for empty-step mode, which never touches the manager.
    empty_next_pid: u64,
}

impl NocInterface {
    /// Builds the interface with one behavioral mesh network per subnet.
    ///
    /// # Arguments
    ///
    /// * `config` - Validated against structural limits; the routing
    ///   function name must resolve in the registry.
    ///
    /// # Returns
    ///
    /// The ready interface, or [`NocError::InvalidConfig`].
    pub fn new(config: Config) -> Result<Self> {
        let hop_delay = config.hop_delay();
        let nets: Vec<Box<dyn NetworkAdapter>> = {
            let registry = RoutingRegistry::with_builtins();
            let key = format!(
                "{}_{}",
                config.topology.routing_function, config.topology.topology
            );
            let rf = registry.resolve(&key)?;
            (0..config.network.subnets)
                .map(|_| {
                    Box::new(MeshNetwork::new(
                        config.topology.k,
                        config.network.num_vcs,
                        hop_delay,
                        rf,
                    )) as Box<dyn NetworkAdapter>
                })
                .collect()
        };
        Self::with_networks(config, nets)
    }

    /// Builds the interface around caller-provided networks, one per subnet.
    ///
    /// This is the seam for full router models and for test stubs.
    pub fn with_networks(config: Config, nets: Vec<Box<dyn NetworkAdapter>>) -> Result<Self> {
        config.validate()?;
        if nets.len() != config.network.subnets {
            return Err(NocError::InvalidConfig(format!(
                "{} networks provided for {} subnets",
                nets.len(),
                config.network.subnets
            )));
        }
        for net in &nets {
            if net.num_nodes() != config.nodes() {
                return Err(NocError::InvalidConfig(format!(
                    "network has {} nodes, topology implies {}",
                    net.num_nodes(),
                    config.nodes()
                )));
            }
        }

        let registry = RoutingRegistry::with_builtins();
        let key = format!(
            "{}_{}",
            config.topology.routing_function, config.topology.topology
        );
        let rf = registry.resolve(&key)?;
        let ctx = RoutingContext::mesh(config.topology.k, config.network.num_vcs);
        let mut manager = TrafficManager::new(&config, rf, ctx);

        // Shortest possible credit round-trip per injection channel, kept as
        // a debug sanity bound.
        let hop_delay = config.hop_delay();
        let t = &config.timing;
        let router_latency = t.routing_delay
            + if t.speculative {
                t.vc_alloc_delay.max(t.sw_alloc_delay)
            } else {
                t.vc_alloc_delay + t.sw_alloc_delay
            };
        for (subnet, net) in nets.iter().enumerate() {
            for node in 0..config.nodes() {
                let min = 1
                    + net.inject_latency(node)
                    + router_latency
                    + net.inject_credit_latency(node);
                manager.set_min_latency(node, subnet, min);
            }
        }

        Ok(Self {
            config,
            manager,
            nets,
            callbacks: HashMap::new(),
            in_flight_packets: HashMap::new(),
            outstanding_packets: 0,
            hop_delay,
            step_calls: 0,
            skipped_steps: 0,
            non_skipped_steps: 0,
            steps_since_update: 0,
            zll_countdown: HashMap::new(),
            empty_next_pid: 0,
        })
    }

    /// Registers the completion callbacks for an opaque handle.
    ///
    /// The core calls `read_done(0, pid, 1)` when the packet's tail ejects;
    /// write completions currently reuse the same path.
    pub fn register_callback(
        &mut self,
        handle: HandleTag,
        read_done: CompletionFn,
        write_done: CompletionFn,
    ) {
        let _ = self.callbacks.insert(
            handle,
            HostCallbacks {
                read_done,
                write_done,
            },
        );
    }

    /// Admits an untyped packet (see [`Self::admit_typed`]).
    pub fn admit(
        &mut self,
        source: usize,
        dest: usize,
        size: usize,
        ctime: Option<u64>,
        handle: HandleTag,
    ) -> Result<PacketId> {
        self.admit_typed(source, dest, size, FlitKind::Any, 0, ctime, handle)
    }

    /// Admits a packet of `size` flits from `source` to `dest`.
    ///
    /// The flits are queued for injection (or, in empty-step mode, a
    /// zero-load countdown is armed). The registered callback for `handle`
    /// fires when the tail flit ejects at `dest`.
    ///
    /// # Arguments
    ///
    /// * `source` - Injecting node.
    /// * `dest` - Destination node.
    /// * `size` - Packet length in flits; must be at least 1.
    /// * `kind` - Packet type; picks the subnet (random for `Any`).
    /// * `class` - Traffic class.
    /// * `ctime` - Issue cycle; `None` means the current cycle, a future
    ///   value holds the packet until the clock catches up.
    /// * `handle` - Opaque host handle the completion is keyed on.
    ///
    /// # Returns
    ///
    /// The fresh packet id, or [`NocError::InvalidArgument`].
    pub fn admit_typed(
        &mut self,
        source: usize,
        dest: usize,
        size: usize,
        kind: FlitKind,
        class: usize,
        ctime: Option<u64>,
        handle: HandleTag,
    ) -> Result<PacketId> {
        let pid = if self.config.sim.empty_step {
            if size == 0 {
                return Err(NocError::InvalidArgument("packet size must be >= 1".into()));
            }
            let nodes = self.config.nodes();
            if source >= nodes || dest >= nodes {
                return Err(NocError::InvalidArgument(format!(
                    "nodes ({source}, {dest}) out of range 0..{nodes}"
                )));
            }
            let pid = PacketId(self.empty_next_pid);
            self.empty_next_pid += 1;
            let hops = distance(source, dest, self.config.topology.k) as u64;
            let zll = (hops + 1) * self.hop_delay + (size as u64 - 1);
            let _ = self.zll_countdown.insert(pid, zll.max(1));
            pid
        } else {
            self.manager
                .generate_packet(source, dest, size, kind, class, ctime)?
        };
        let _ = self.in_flight_packets.insert(pid, handle);
        self.outstanding_packets += 1;
        Ok(pid)
    }

    /// Advances the simulator by one cycle.
    ///
    /// With no packets outstanding (and the fast path enabled), only the
    /// cycle counter and the skipped-step statistic advance. Otherwise one
    /// full traffic-manager cycle runs and every completed packet's callback
    /// fires before this call returns.
    pub fn step(&mut self) -> Result<()> {
        if self.config.sim.skip_idle_steps && self.outstanding_packets == 0 {
            self.skipped_steps += 1;
            self.manager.incr_time();
            return Ok(());
        }
        self.non_skipped_steps += 1;
        self.step_calls += 1;

        if self.config.sim.empty_step {
            let mut fired = Vec::new();
            for (pid, countdown) in &mut self.zll_countdown {
                *countdown -= 1;
                if *countdown == 0 {
                    fired.push(*pid);
                }
            }
            for pid in fired {
                let _ = self.zll_countdown.remove(&pid);
                self.dispatch_completion(pid);
            }
            self.manager.incr_time();
            return Ok(());
        }

        let completed = self.manager.step(&mut self.nets)?;
        for pid in completed {
            self.dispatch_completion(pid);
        }

        self.steps_since_update += 1;
        if self.steps_since_update >= self.config.sim.step_cnt_update {
            self.steps_since_update = 0;
            self.update_stats();
        }
        Ok(())
    }

    /// Fires the registered callback for a completed packet.
    fn dispatch_completion(&mut self, pid: PacketId) {
        self.outstanding_packets = self.outstanding_packets.saturating_sub(1);
        let Some(handle) = self.in_flight_packets.remove(&pid) else {
            warn!(packet = pid.0, "completed packet has no registered handle");
            return;
        };
        if let Some(cbs) = self.callbacks.get_mut(&handle) {
            (cbs.read_done)(0, pid.0, 1);
        } else {
            warn!(packet = pid.0, handle = handle.0, "no callback sent");
        }
    }

    /// The core's monotonically increasing cycle counter.
    #[inline]
    pub fn current_cycle(&self) -> u64 {
        self.manager.time()
    }

    /// Number of terminal nodes.
    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.config.nodes()
    }

    /// Cycles one router adds to a flit's journey.
    #[inline]
    pub fn hop_delay(&self) -> u64 {
        self.hop_delay
    }

    /// Configured base packet size (first size of class 0), reported to
    /// embedders for zero-load estimates.
    pub fn packet_size(&self) -> usize {
        let (sizes, _) = self.config.traffic.packet_sizes_for(0);
        sizes.first().copied().unwrap_or(1)
    }

    /// Fabric clock frequency in MHz.
    #[inline]
    pub fn noc_frequency_mhz(&self) -> u64 {
        self.config.timing.noc_frequency_mhz
    }

    /// Packets admitted and not yet completed.
    #[inline]
    pub fn outstanding_packets(&self) -> u64 {
        self.outstanding_packets
    }

    /// Full (non-skipped) step calls so far.
    #[inline]
    pub fn step_calls(&self) -> u64 {
        self.step_calls
    }

    /// Steps short-circuited by the idle fast path.
    #[inline]
    pub fn skipped_steps(&self) -> u64 {
        self.skipped_steps
    }

    /// Steps that ran the full per-cycle machinery.
    #[inline]
    pub fn non_skipped_steps(&self) -> u64 {
        self.non_skipped_steps
    }

    /// The traffic manager, for inspection by harnesses and embedders.
    pub fn manager(&self) -> &TrafficManager {
        &self.manager
    }

    /// Mutable access to the traffic manager (reply-record draining).
    pub fn manager_mut(&mut self) -> &mut TrafficManager {
        &mut self.manager
    }

    /// Folds the current sample period into the overall accumulators.
    pub fn update_stats(&mut self) {
        self.manager.update_stats();
    }

    /// Writes the current-period per-class statistics as text.
    pub fn display_stats(&self, w: &mut impl Write) -> io::Result<()> {
        for (class, class_stats) in self.manager.class_stats().iter().enumerate() {
            stats::display_class(w, class, class_stats)?;
        }
        Ok(())
    }

    /// Writes the overall roll-up plus the step-skipping summary.
    pub fn display_overall_stats(&self, w: &mut impl Write) -> io::Result<()> {
        stats::display_overall(w, self.manager.overall_stats())?;
        let total = self.skipped_steps + self.non_skipped_steps;
        let pct = if total == 0 {
            0.0
        } else {
            100.0 * self.skipped_steps as f64 / total as f64
        };
        writeln!(w, "Number of non-skipped steps = {}", self.non_skipped_steps)?;
        writeln!(
            w,
            "Number of skipped steps = {} ( {:.2} % )",
            self.skipped_steps, pct
        )?;
        writeln!(w, "Total steps = {total}")?;
        Ok(())
    }

    /// Writes per-class histograms in matlab-assignment format.
    pub fn write_matlab_stats(&self, w: &mut impl Write) -> io::Result<()> {
        stats::write_matlab(w, self.manager.class_stats())
    }
}
