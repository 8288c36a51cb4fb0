//! Simulation statistics collection and reporting.
//!
//! This module tracks performance metrics for the NoC simulator. It provides:
//! 1. **Histograms:** Fixed-bin sample accumulators for latencies, fragmentation, and hops.
//! 2. **Per-class tracking:** Packet/network/flit latency, fragmentation, hop count,
//!    per-node sent/accepted counters, and slowest flit/packet ids.
//! 3. **Roll-ups:** Periodic min/avg/max accumulation across sample periods.
//! 4. **Reporting:** Sectioned text output and an optional matlab-assignment dump.
//!
//! Statistics are best-effort bookkeeping: nothing here participates in
//! functional correctness of the simulation.

use std::io::{self, Write};

use crate::common::flit::{FlitId, PacketId};

/// Fixed-bin histogram with sample count, sum, and extrema.
///
/// Bin width is one cycle; samples beyond the last bin are clamped into it
/// so the count always balances.
#[derive(Clone, Debug)]
pub struct Stats {
    num_samples: u64,
    sample_sum: f64,
    min: f64,
    max: f64,
    bins: Vec<u64>,
}

impl Stats {
    /// Creates a histogram with `num_bins` one-cycle bins.
    pub fn new(num_bins: usize) -> Self {
        Self {
            num_samples: 0,
            sample_sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            bins: vec![0; num_bins],
        }
    }

    /// Adds one sample.
    pub fn add_sample(&mut self, value: f64) {
        self.num_samples += 1;
        self.sample_sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        if !self.bins.is_empty() {
            let bin = (value.max(0.0) as usize).min(self.bins.len() - 1);
            self.bins[bin] += 1;
        }
    }

    /// Number of samples recorded.
    #[inline]
    pub fn num_samples(&self) -> u64 {
        self.num_samples
    }

    /// Mean of all samples, or 0 when empty.
    pub fn average(&self) -> f64 {
        if self.num_samples == 0 {
            0.0
        } else {
            self.sample_sum / self.num_samples as f64
        }
    }

    /// Smallest sample, or 0 when empty.
    pub fn min(&self) -> f64 {
        if self.num_samples == 0 { 0.0 } else { self.min }
    }

    /// Largest sample, or 0 when empty.
    pub fn max(&self) -> f64 {
        if self.num_samples == 0 { 0.0 } else { self.max }
    }

    /// The raw bin counts.
    pub fn bins(&self) -> &[u64] {
        &self.bins
    }

    /// Resets the histogram to empty.
    pub fn clear(&mut self) {
        self.num_samples = 0;
        self.sample_sum = 0.0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
        self.bins.fill(0);
    }
}

/// Bin counts mirroring the historical tooling: latency histograms get 1000
/// bins, fragmentation 100, hops 20.
const LATENCY_BINS: usize = 1000;
const FRAG_BINS: usize = 100;
const HOP_BINS: usize = 20;

/// All measured quantities for one traffic class.
#[derive(Clone, Debug)]
pub struct ClassStats {
    /// Packet latency: tail arrival minus head creation.
    pub plat: Stats,
    /// Network latency: tail arrival minus head injection.
    pub nlat: Stats,
    /// Flit latency: arrival minus injection, per flit.
    pub flat: Stats,
    /// Fragmentation: spread of a packet's flits beyond its length.
    pub frag: Stats,
    /// Hops travelled per packet.
    pub hops: Stats,
    /// Flits sent per source node.
    pub sent_flits: Vec<u64>,
    /// Flits accepted per destination node.
    pub accepted_flits: Vec<u64>,
    /// Packets sent per source node (counted at head injection).
    pub sent_packets: Vec<u64>,
    /// Packets accepted per destination node (counted at tail ejection).
    pub accepted_packets: Vec<u64>,
    /// Slowest flit observed so far.
    pub slowest_flit: Option<FlitId>,
    /// Slowest packet observed so far.
    pub slowest_packet: Option<PacketId>,
    /// Per-(src, dst) packet latency histograms, when pair stats are on.
    pub pair_plat: Option<Vec<Stats>>,
    /// Per-(src, dst) flit latency histograms, when pair stats are on.
    pub pair_flat: Option<Vec<Stats>>,
}

impl ClassStats {
    /// Creates empty statistics for one class over `nodes` nodes.
    pub fn new(nodes: usize, pair_stats: bool) -> Self {
        let pair = |bins: usize| {
            pair_stats.then(|| (0..nodes * nodes).map(|_| Stats::new(bins)).collect::<Vec<_>>())
        };
        Self {
            plat: Stats::new(LATENCY_BINS),
            nlat: Stats::new(LATENCY_BINS),
            flat: Stats::new(LATENCY_BINS),
            frag: Stats::new(FRAG_BINS),
            hops: Stats::new(HOP_BINS),
            sent_flits: vec![0; nodes],
            accepted_flits: vec![0; nodes],
            sent_packets: vec![0; nodes],
            accepted_packets: vec![0; nodes],
            slowest_flit: None,
            slowest_packet: None,
            pair_plat: pair(250),
            pair_flat: pair(250),
        }
    }

    /// Clears all histograms and counters.
    pub fn clear(&mut self) {
        self.plat.clear();
        self.nlat.clear();
        self.flat.clear();
        self.frag.clear();
        self.hops.clear();
        self.sent_flits.fill(0);
        self.accepted_flits.fill(0);
        self.sent_packets.fill(0);
        self.accepted_packets.fill(0);
        self.slowest_flit = None;
        self.slowest_packet = None;
        for pair in self.pair_plat.iter_mut().chain(self.pair_flat.iter_mut()) {
            for s in pair.iter_mut() {
                s.clear();
            }
        }
    }
}

/// Min/avg/max accumulated over completed sample periods, per class.
#[derive(Clone, Debug, Default)]
pub struct OverallStats {
    /// Sample periods folded in so far.
    pub samples: u64,
    /// Accumulated packet latency (min, avg, max) per class.
    pub plat: Vec<(f64, f64, f64)>,
    /// Accumulated network latency (min, avg, max) per class.
    pub nlat: Vec<(f64, f64, f64)>,
    /// Accumulated flit latency (min, avg, max) per class.
    pub flat: Vec<(f64, f64, f64)>,
    /// Accumulated fragmentation (min, avg, max) per class.
    pub frag: Vec<(f64, f64, f64)>,
    /// Accumulated average hop count per class.
    pub hops: Vec<f64>,
}

impl OverallStats {
    /// Creates accumulators for `classes` classes.
    pub fn new(classes: usize) -> Self {
        Self {
            samples: 0,
            plat: vec![(f64::INFINITY, 0.0, 0.0); classes],
            nlat: vec![(f64::INFINITY, 0.0, 0.0); classes],
            flat: vec![(f64::INFINITY, 0.0, 0.0); classes],
            frag: vec![(f64::INFINITY, 0.0, 0.0); classes],
            hops: vec![0.0; classes],
        }
    }

    /// Folds one sample period of per-class statistics into the accumulators.
    pub fn fold(&mut self, per_class: &[ClassStats]) {
        self.samples += 1;
        for (c, stats) in per_class.iter().enumerate() {
            let fold_one = |acc: &mut (f64, f64, f64), s: &Stats| {
                if s.num_samples() > 0 {
                    acc.0 = acc.0.min(s.min());
                    acc.2 = acc.2.max(s.max());
                }
                // Running average over periods, weighted equally like the
                // historical roll-up.
                acc.1 += (s.average() - acc.1) / self.samples as f64;
            };
            fold_one(&mut self.plat[c], &stats.plat);
            fold_one(&mut self.nlat[c], &stats.nlat);
            fold_one(&mut self.flat[c], &stats.flat);
            fold_one(&mut self.frag[c], &stats.frag);
            self.hops[c] += (stats.hops.average() - self.hops[c]) / self.samples as f64;
        }
    }
}

/// Writes one class's current-period statistics as a text section.
pub fn display_class(w: &mut impl Write, class: usize, stats: &ClassStats) -> io::Result<()> {
    let sent: u64 = stats.sent_flits.iter().sum();
    let accepted: u64 = stats.accepted_flits.iter().sum();
    writeln!(w, "Class {class}:")?;
    writeln!(
        w,
        "  plat                   avg {:.4} (min {:.0}, max {:.0}, n {})",
        stats.plat.average(),
        stats.plat.min(),
        stats.plat.max(),
        stats.plat.num_samples()
    )?;
    writeln!(
        w,
        "  nlat                   avg {:.4} (min {:.0}, max {:.0})",
        stats.nlat.average(),
        stats.nlat.min(),
        stats.nlat.max()
    )?;
    writeln!(
        w,
        "  flat                   avg {:.4} (min {:.0}, max {:.0})",
        stats.flat.average(),
        stats.flat.min(),
        stats.flat.max()
    )?;
    writeln!(w, "  frag                   avg {:.4}", stats.frag.average())?;
    writeln!(w, "  hops                   avg {:.4}", stats.hops.average())?;
    writeln!(w, "  flits.sent             {sent}")?;
    writeln!(w, "  flits.accepted         {accepted}")?;
    if let Some(id) = stats.slowest_flit {
        writeln!(w, "  slowest_flit           {}", id.0)?;
    }
    if let Some(pid) = stats.slowest_packet {
        writeln!(w, "  slowest_packet         {}", pid.0)?;
    }
    Ok(())
}

/// Writes the overall roll-up as a text report.
pub fn display_overall(w: &mut impl Write, overall: &OverallStats) -> io::Result<()> {
    writeln!(w, "\n==========================================================")?;
    writeln!(w, "NOC SIMULATION OVERALL STATISTICS")?;
    writeln!(w, "==========================================================")?;
    writeln!(w, "sample_periods           {}", overall.samples)?;
    for c in 0..overall.plat.len() {
        let (pmin, pavg, pmax) = overall.plat[c];
        let (nmin, navg, nmax) = overall.nlat[c];
        let (fmin, favg, fmax) = overall.flat[c];
        let (_, gavg, _) = overall.frag[c];
        writeln!(w, "Class {c}:")?;
        writeln!(
            w,
            "  plat                   avg {:.4} (min {:.0}, max {:.0})",
            pavg,
            if pmin.is_finite() { pmin } else { 0.0 },
            pmax
        )?;
        writeln!(
            w,
            "  nlat                   avg {:.4} (min {:.0}, max {:.0})",
            navg,
            if nmin.is_finite() { nmin } else { 0.0 },
            nmax
        )?;
        writeln!(
            w,
            "  flat                   avg {:.4} (min {:.0}, max {:.0})",
            favg,
            if fmin.is_finite() { fmin } else { 0.0 },
            fmax
        )?;
        writeln!(w, "  frag                   avg {gavg:.4}")?;
        writeln!(w, "  hops                   avg {:.4}", overall.hops[c])?;
    }
    writeln!(w, "----------------------------------------------------------")?;
    Ok(())
}

/// Writes per-class histograms in matlab-assignment format
/// (`plat(c,:) = [...]`) for offline analysis tooling.
pub fn write_matlab(w: &mut impl Write, per_class: &[ClassStats]) -> io::Result<()> {
    let write_hist = |w: &mut dyn Write, name: &str, class: usize, s: &Stats| -> io::Result<()> {
        write!(w, "{name}({},:) = [", class + 1)?;
        for (i, count) in s.bins().iter().enumerate() {
            if i > 0 {
                write!(w, " ")?;
            }
            write!(w, "{count}")?;
        }
        writeln!(w, "];")
    };
    for (c, stats) in per_class.iter().enumerate() {
        write_hist(w, "plat", c, &stats.plat)?;
        write_hist(w, "nlat", c, &stats.nlat)?;
        write_hist(w, "flat", c, &stats.flat)?;
        write_hist(w, "frag", c, &stats.frag)?;
        write_hist(w, "hops", c, &stats.hops)?;
    }
    Ok(())
}
