//! Configuration system for the NoC simulator.
//!
//! This module defines all configuration structures and enums used to
//! parameterize the simulator. It provides:
//! 1. **Defaults:** Baseline fabric constants (topology, VCs, buffers, delays).
//! 2. **Structures:** Hierarchical config for topology, channel resources,
//!    router timing, traffic shaping, and simulation control.
//! 3. **Enums:** Priority arbitration modes and simulation types.
//!
//! Configuration is supplied as JSON (typical when embedding) or use
//! `Config::default()` for the standalone stress driver. Structural
//! validation happens once in [`Config::validate`]; unknown priority or
//! simulation-type names already fail during deserialization.

use serde::Deserialize;
use std::path::PathBuf;

use crate::common::{NocError, Result};

/// Default configuration constants for the simulator.
///
/// These values define the baseline fabric when not explicitly overridden in
/// the JSON configuration.
mod defaults {
    /// Mesh radix (k×k nodes).
    pub const MESH_K: usize = 4;

    /// Number of parallel subnets.
    pub const SUBNETS: usize = 1;

    /// Virtual channels per physical port.
    pub const NUM_VCS: usize = 4;

    /// Buffer depth per virtual channel, in flits.
    pub const VC_BUF_SIZE: usize = 8;

    /// Router input buffer depth, in flits.
    pub const INPUT_BUFFER_SIZE: usize = 9;

    /// Interface boundary buffer depth, in packets.
    pub const BOUNDARY_BUFFER_SIZE: usize = 16;

    /// Flit payload size in bytes.
    pub const FLIT_SIZE: usize = 16;

    /// Traffic classes per subnet.
    pub const CLASSES: usize = 1;

    /// Default packet length in flits.
    pub const PACKET_SIZE: usize = 5;

    /// Route computation delay in cycles.
    pub const ROUTING_DELAY: u64 = 0;

    /// Virtual-channel allocation delay in cycles.
    pub const VC_ALLOC_DELAY: u64 = 1;

    /// Switch allocation delay in cycles.
    pub const SW_ALLOC_DELAY: u64 = 1;

    /// Switch traversal preparation delay in cycles.
    pub const ST_PREPARE_DELAY: u64 = 0;

    /// Final switch traversal delay in cycles.
    pub const ST_FINAL_DELAY: u64 = 0;

    /// Link traversal delay in cycles. Fixed by the channel model.
    pub const LINK_DELAY: u64 = 1;

    /// Cycles of continuous in-flight traffic before the watchdog warns.
    pub const DEADLOCK_WARN_TIMEOUT: u64 = 4096;

    /// Statistics sample period in cycles.
    pub const SAMPLE_PERIOD: u64 = 1000;

    /// Maximum number of sample periods before roll-up stops.
    pub const MAX_SAMPLES: u64 = 10;

    /// Sample periods treated as warm-up (excluded from overall stats).
    pub const WARMUP_PERIODS: u64 = 0;

    /// Non-skipped steps between periodic statistics roll-ups.
    pub const STEP_CNT_UPDATE: u64 = 1000;

    /// Fabric clock frequency in MHz, reported to embedders.
    pub const NOC_FREQUENCY_MHZ: u64 = 1000;

    /// Deterministic seed for subnet draws and stress traffic.
    pub const SEED: u64 = 1;

    /// Per-class injection rate (packets per node per cycle) for the
    /// standalone stress driver.
    pub const INJECTION_RATE: f64 = 0.1;
}

/// Priority arbitration mode applied at injection.
///
/// Selects how the per-flit priority is computed; larger priorities win
/// strict-greater comparisons in the injection class scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityMode {
    /// Priority taken from the per-class `class_priority` table.
    Class,
    /// Older creation time wins.
    Age,
    /// Older injection time wins; rewritten when the flit enters the network.
    NetworkAge,
    /// Older queueing time at the local node wins.
    LocalAge,
    /// Longer source queue wins.
    QueueLength,
    /// More hops travelled wins.
    HopCount,
    /// Lower per-source sequence number wins.
    Sequence,
    /// All packets tie; round-robin order decides.
    #[default]
    None,
}

/// Simulation type.
///
/// `Latency` and `Throughput` select what the measured statistics emphasize;
/// `Batch` is accepted for config compatibility but selects no distinct
/// behavior in this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimType {
    /// Measure packet latency under the offered load.
    #[default]
    Latency,
    /// Measure accepted throughput.
    Throughput,
    /// Batch mode; parsed, no distinct semantics here.
    Batch,
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// Creating a default configuration:
///
/// ```
/// use noc_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.topology.k, 4);
/// assert_eq!(config.network.num_vcs, 4);
/// ```
///
/// Deserializing from JSON (typical embedding usage):
///
/// ```
/// use noc_core::config::{Config, PriorityMode};
///
/// let json = r#"{
///     "topology": { "topology": "mesh", "k": 8, "routing_function": "dor" },
///     "network": { "subnets": 2, "num_vcs": 8, "vc_buf_size": 4 },
///     "timing": { "routing_delay": 1, "speculative": true },
///     "traffic": { "priority": "network_age" },
///     "sim": { "deadlock_warn_timeout": 100 }
/// }"#;
///
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.topology.k, 8);
/// assert_eq!(config.network.subnets, 2);
/// assert_eq!(config.traffic.priority, PriorityMode::NetworkAge);
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Topology and routing selection.
    #[serde(default)]
    pub topology: TopologyConfig,
    /// Channel resources: subnets, VCs, buffers.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Router pipeline timing.
    #[serde(default)]
    pub timing: TimingConfig,
    /// Traffic shaping: classes, sizes, priorities, subnets per type.
    #[serde(default)]
    pub traffic: TrafficConfig,
    /// Simulation control: seed, watchdog, statistics cadence, step modes.
    #[serde(default)]
    pub sim: SimConfig,
    /// Statistics and diagnostics options.
    #[serde(default)]
    pub stats: StatsConfig,
}

impl Config {
    /// Number of nodes implied by the topology.
    #[inline]
    pub fn nodes(&self) -> usize {
        self.topology.k * self.topology.k
    }

    /// Cycles one router adds to a flit's journey: route computation plus
    /// allocation (overlapped when speculative) plus switch and link
    /// traversal.
    pub fn hop_delay(&self) -> u64 {
        let t = &self.timing;
        let alloc = if t.speculative {
            t.vc_alloc_delay.max(t.sw_alloc_delay)
        } else {
            t.vc_alloc_delay + t.sw_alloc_delay
        };
        t.routing_delay + alloc + t.st_prepare_delay + t.st_final_delay + defaults::LINK_DELAY
    }

    /// Ejection buffer capacity; falls back to the VC buffer depth when not
    /// explicitly configured.
    #[inline]
    pub fn ejection_buffer_capacity(&self) -> usize {
        if self.network.ejection_buffer_size == 0 {
            self.network.vc_buf_size
        } else {
            self.network.ejection_buffer_size
        }
    }

    /// Validates structural parameters, failing fast with
    /// [`NocError::InvalidConfig`].
    ///
    /// Routing-function resolution happens separately when the interface is
    /// constructed, against the routing registry.
    pub fn validate(&self) -> Result<()> {
        if self.topology.k == 0 {
            return Err(NocError::InvalidConfig("mesh radix k must be >= 1".into()));
        }
        if self.network.subnets == 0 {
            return Err(NocError::InvalidConfig("subnets must be >= 1".into()));
        }
        if self.network.num_vcs == 0 {
            return Err(NocError::InvalidConfig("num_vcs must be >= 1".into()));
        }
        if self.network.vc_buf_size == 0 {
            return Err(NocError::InvalidConfig("vc_buf_size must be >= 1".into()));
        }
        if self.traffic.classes == 0 {
            return Err(NocError::InvalidConfig("classes must be >= 1".into()));
        }
        let subnets = self.network.subnets;
        for (name, subnet) in [
            ("read_request_subnet", self.traffic.read_request_subnet),
            ("read_reply_subnet", self.traffic.read_reply_subnet),
            ("write_request_subnet", self.traffic.write_request_subnet),
            ("write_reply_subnet", self.traffic.write_reply_subnet),
        ] {
            if subnet >= subnets {
                return Err(NocError::InvalidConfig(format!(
                    "{name} = {subnet} exceeds subnet count {subnets}"
                )));
            }
        }
        if self.sim.noq && self.timing.routing_delay != 0 {
            return Err(NocError::InvalidConfig(
                "next-output queueing requires lookahead routing (routing_delay = 0)".into(),
            ));
        }
        Ok(())
    }
}

/// Topology and routing-function selection.
#[derive(Debug, Clone, Deserialize)]
pub struct TopologyConfig {
    /// Topology name; combined with `routing_function` to pick the routing
    /// implementation (e.g. `"dor"` + `"mesh"` → `dor_mesh`).
    #[serde(default = "TopologyConfig::default_topology")]
    pub topology: String,

    /// Mesh radix: the fabric is a k×k grid.
    #[serde(default = "TopologyConfig::default_k")]
    pub k: usize,

    /// Routing function name.
    #[serde(default = "TopologyConfig::default_routing_function")]
    pub routing_function: String,
}

impl TopologyConfig {
    fn default_topology() -> String {
        "mesh".into()
    }

    fn default_k() -> usize {
        defaults::MESH_K
    }

    fn default_routing_function() -> String {
        "dor".into()
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            topology: Self::default_topology(),
            k: defaults::MESH_K,
            routing_function: Self::default_routing_function(),
        }
    }
}

/// Channel resources: subnets, virtual channels, and buffer depths.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Number of parallel copies of the network.
    #[serde(default = "NetworkConfig::default_subnets")]
    pub subnets: usize,

    /// Virtual channels per physical port.
    #[serde(default = "NetworkConfig::default_num_vcs")]
    pub num_vcs: usize,

    /// Buffer depth per VC, in flits.
    #[serde(default = "NetworkConfig::default_vc_buf_size")]
    pub vc_buf_size: usize,

    /// Router input buffer depth, in flits.
    #[serde(default = "NetworkConfig::default_input_buffer_size")]
    pub input_buffer_size: usize,

    /// Ejection buffer depth; 0 means "use `vc_buf_size`".
    #[serde(default)]
    pub ejection_buffer_size: usize,

    /// Interface boundary buffer depth, in packets.
    #[serde(default = "NetworkConfig::default_boundary_buffer_size")]
    pub boundary_buffer_size: usize,

    /// Flit payload size in bytes (reported to embedders; does not affect
    /// cycle behavior).
    #[serde(default = "NetworkConfig::default_flit_size")]
    pub flit_size: usize,
}

impl NetworkConfig {
    fn default_subnets() -> usize {
        defaults::SUBNETS
    }

    fn default_num_vcs() -> usize {
        defaults::NUM_VCS
    }

    fn default_vc_buf_size() -> usize {
        defaults::VC_BUF_SIZE
    }

    fn default_input_buffer_size() -> usize {
        defaults::INPUT_BUFFER_SIZE
    }

    fn default_boundary_buffer_size() -> usize {
        defaults::BOUNDARY_BUFFER_SIZE
    }

    fn default_flit_size() -> usize {
        defaults::FLIT_SIZE
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            subnets: defaults::SUBNETS,
            num_vcs: defaults::NUM_VCS,
            vc_buf_size: defaults::VC_BUF_SIZE,
            input_buffer_size: defaults::INPUT_BUFFER_SIZE,
            ejection_buffer_size: 0,
            boundary_buffer_size: defaults::BOUNDARY_BUFFER_SIZE,
            flit_size: defaults::FLIT_SIZE,
        }
    }
}

/// Router pipeline timing parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    /// Route computation delay in cycles; 0 enables lookahead routing.
    #[serde(default = "TimingConfig::default_routing_delay")]
    pub routing_delay: u64,

    /// VC allocation delay in cycles.
    #[serde(default = "TimingConfig::default_vc_alloc_delay")]
    pub vc_alloc_delay: u64,

    /// Switch allocation delay in cycles.
    #[serde(default = "TimingConfig::default_sw_alloc_delay")]
    pub sw_alloc_delay: u64,

    /// Switch traversal preparation delay in cycles.
    #[serde(default = "TimingConfig::default_st_prepare_delay")]
    pub st_prepare_delay: u64,

    /// Final switch traversal delay in cycles.
    #[serde(default = "TimingConfig::default_st_final_delay")]
    pub st_final_delay: u64,

    /// Speculative allocation: VC and switch allocation overlap, so the hop
    /// pays the maximum of the two delays instead of their sum.
    #[serde(default)]
    pub speculative: bool,

    /// Fabric clock frequency in MHz; reported to embedders for clock-domain
    /// conversion, no effect on cycle behavior.
    #[serde(default = "TimingConfig::default_noc_frequency_mhz")]
    pub noc_frequency_mhz: u64,
}

impl TimingConfig {
    fn default_routing_delay() -> u64 {
        defaults::ROUTING_DELAY
    }

    fn default_vc_alloc_delay() -> u64 {
        defaults::VC_ALLOC_DELAY
    }

    fn default_sw_alloc_delay() -> u64 {
        defaults::SW_ALLOC_DELAY
    }

    fn default_st_prepare_delay() -> u64 {
        defaults::ST_PREPARE_DELAY
    }

    fn default_st_final_delay() -> u64 {
        defaults::ST_FINAL_DELAY
    }

    fn default_noc_frequency_mhz() -> u64 {
        defaults::NOC_FREQUENCY_MHZ
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            routing_delay: defaults::ROUTING_DELAY,
            vc_alloc_delay: defaults::VC_ALLOC_DELAY,
            sw_alloc_delay: defaults::SW_ALLOC_DELAY,
            st_prepare_delay: defaults::ST_PREPARE_DELAY,
            st_final_delay: defaults::ST_FINAL_DELAY,
            speculative: false,
            noc_frequency_mhz: defaults::NOC_FREQUENCY_MHZ,
        }
    }
}

/// Traffic shaping: classes, packet sizes, priorities, and the
/// packet-type-to-subnet mapping.
///
/// Per-class vectors shorter than `classes` are extended with their last
/// element, matching the usual configuration shorthand of writing one value
/// for all classes.
#[derive(Debug, Clone, Deserialize)]
pub struct TrafficConfig {
    /// Traffic classes per subnet.
    #[serde(default = "TrafficConfig::default_classes")]
    pub classes: usize,

    /// Per-class packet size mixture: candidate sizes in flits.
    #[serde(default = "TrafficConfig::default_packet_size")]
    pub packet_size: Vec<Vec<usize>>,

    /// Per-class selection weights matching `packet_size`.
    #[serde(default = "TrafficConfig::default_packet_size_rate")]
    pub packet_size_rate: Vec<Vec<u64>>,

    /// Per-class injection rate in packets per node per cycle (stress driver
    /// only; embedders admit packets explicitly).
    #[serde(default = "TrafficConfig::default_injection_rate")]
    pub injection_rate: Vec<f64>,

    /// Read request packet size in flits.
    #[serde(default = "TrafficConfig::default_request_size")]
    pub read_request_size: usize,

    /// Read reply packet size in flits.
    #[serde(default = "TrafficConfig::default_reply_size")]
    pub read_reply_size: usize,

    /// Write request packet size in flits.
    #[serde(default = "TrafficConfig::default_reply_size")]
    pub write_request_size: usize,

    /// Write reply packet size in flits.
    #[serde(default = "TrafficConfig::default_request_size")]
    pub write_reply_size: usize,

    /// Subnet carrying read requests.
    #[serde(default)]
    pub read_request_subnet: usize,

    /// Subnet carrying read replies.
    #[serde(default)]
    pub read_reply_subnet: usize,

    /// Subnet carrying write requests.
    #[serde(default)]
    pub write_request_subnet: usize,

    /// Subnet carrying write replies.
    #[serde(default)]
    pub write_reply_subnet: usize,

    /// Priority arbitration mode.
    #[serde(default)]
    pub priority: PriorityMode,

    /// Per-class priority values for [`PriorityMode::Class`].
    #[serde(default = "TrafficConfig::default_class_priority")]
    pub class_priority: Vec<i64>,

    /// Keep injecting body flits of the last packet before considering other
    /// classes.
    #[serde(default)]
    pub hold_switch_for_packet: bool,
}

impl TrafficConfig {
    fn default_classes() -> usize {
        defaults::CLASSES
    }

    fn default_packet_size() -> Vec<Vec<usize>> {
        vec![vec![defaults::PACKET_SIZE]]
    }

    fn default_packet_size_rate() -> Vec<Vec<u64>> {
        vec![vec![1]]
    }

    fn default_injection_rate() -> Vec<f64> {
        vec![defaults::INJECTION_RATE]
    }

    fn default_request_size() -> usize {
        1
    }

    fn default_reply_size() -> usize {
        defaults::PACKET_SIZE
    }

    fn default_class_priority() -> Vec<i64> {
        vec![0]
    }

    /// The packet size mixture for a class, with the last configured class
    /// standing in for any class beyond the list.
    pub fn packet_sizes_for(&self, class: usize) -> (&[usize], &[u64]) {
        let sizes = self
            .packet_size
            .get(class)
            .or_else(|| self.packet_size.last())
            .map_or(&[][..], Vec::as_slice);
        let rates = self
            .packet_size_rate
            .get(class)
            .or_else(|| self.packet_size_rate.last())
            .map_or(&[][..], Vec::as_slice);
        (sizes, rates)
    }

    /// Class priority value, extended with the last entry.
    pub fn class_priority_for(&self, class: usize) -> i64 {
        self.class_priority
            .get(class)
            .or_else(|| self.class_priority.last())
            .copied()
            .unwrap_or(0)
    }

    /// Injection rate for a class, extended with the last entry.
    pub fn injection_rate_for(&self, class: usize) -> f64 {
        self.injection_rate
            .get(class)
            .or_else(|| self.injection_rate.last())
            .copied()
            .unwrap_or(0.0)
    }
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            classes: defaults::CLASSES,
            packet_size: Self::default_packet_size(),
            packet_size_rate: Self::default_packet_size_rate(),
            injection_rate: Self::default_injection_rate(),
            read_request_size: 1,
            read_reply_size: defaults::PACKET_SIZE,
            write_request_size: defaults::PACKET_SIZE,
            write_reply_size: 1,
            read_request_subnet: 0,
            read_reply_subnet: 0,
            write_request_subnet: 0,
            write_reply_subnet: 0,
            priority: PriorityMode::default(),
            class_priority: Self::default_class_priority(),
            hold_switch_for_packet: false,
        }
    }
}

/// Simulation control: seed, watchdog, statistics cadence, step modes.
#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    /// Simulation type.
    #[serde(default)]
    pub sim_type: SimType,

    /// Deterministic seed for all stochastic choices.
    #[serde(default = "SimConfig::default_seed")]
    pub seed: u64,

    /// Statistics sample period in cycles.
    #[serde(default = "SimConfig::default_sample_period")]
    pub sample_period: u64,

    /// Maximum sample periods to roll up.
    #[serde(default = "SimConfig::default_max_samples")]
    pub max_samples: u64,

    /// Sample periods treated as warm-up.
    #[serde(default = "SimConfig::default_warmup_periods")]
    pub warmup_periods: u64,

    /// Cycles of continuous in-flight traffic before the deadlock watchdog
    /// warns (and resets).
    #[serde(default = "SimConfig::default_deadlock_warn_timeout")]
    pub deadlock_warn_timeout: u64,

    /// Non-skipped steps between periodic statistics roll-ups.
    #[serde(default = "SimConfig::default_step_cnt_update")]
    pub step_cnt_update: u64,

    /// Next-output queueing: narrow the injection VC range to the slice
    /// matching the first-hop output port. Requires lookahead routing.
    #[serde(default)]
    pub noq: bool,

    /// Skip full simulation on cycles with no packets in flight (fast path
    /// for embedders that tick the NoC unconditionally).
    #[serde(default = "SimConfig::default_skip_idle_steps")]
    pub skip_idle_steps: bool,

    /// Latency-only calibration mode: completions fire after a precomputed
    /// zero-load latency and the network is never simulated.
    #[serde(default)]
    pub empty_step: bool,
}

impl SimConfig {
    fn default_seed() -> u64 {
        defaults::SEED
    }

    fn default_sample_period() -> u64 {
        defaults::SAMPLE_PERIOD
    }

    fn default_max_samples() -> u64 {
        defaults::MAX_SAMPLES
    }

    fn default_warmup_periods() -> u64 {
        defaults::WARMUP_PERIODS
    }

    fn default_deadlock_warn_timeout() -> u64 {
        defaults::DEADLOCK_WARN_TIMEOUT
    }

    fn default_step_cnt_update() -> u64 {
        defaults::STEP_CNT_UPDATE
    }

    fn default_skip_idle_steps() -> bool {
        true
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            sim_type: SimType::default(),
            seed: defaults::SEED,
            sample_period: defaults::SAMPLE_PERIOD,
            max_samples: defaults::MAX_SAMPLES,
            warmup_periods: defaults::WARMUP_PERIODS,
            deadlock_warn_timeout: defaults::DEADLOCK_WARN_TIMEOUT,
            step_cnt_update: defaults::STEP_CNT_UPDATE,
            noq: false,
            skip_idle_steps: true,
            empty_step: false,
        }
    }
}

/// Statistics and diagnostics options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsConfig {
    /// Collect per-(source, destination) latency histograms. Quadratic in
    /// node count; off by default.
    #[serde(default)]
    pub pair_stats: bool,

    /// Write statistics in matlab-assignment format to this path when set.
    #[serde(default)]
    pub stats_out: Option<PathBuf>,

    /// Flit ids to emit per-event diagnostics for.
    #[serde(default)]
    pub watch_flits: Vec<u64>,

    /// Packet ids to emit per-event diagnostics for.
    #[serde(default)]
    pub watch_packets: Vec<u64>,
}
