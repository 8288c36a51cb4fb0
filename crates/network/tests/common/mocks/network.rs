//! Programmable network stub.
//!
//! Implements the adapter contract with two behaviors:
//! - **Loopback:** Every injected flit is delivered to its packet's
//!   destination after a fixed delay, one flit per node per cycle, with a
//!   credit returned to the source the cycle after injection.
//! - **Black hole:** Flits are swallowed and never ejected or credited —
//!   used to starve the fabric for watchdog tests.
//!
//! Every injection is logged with its cycle into a shared, cloneable log, so
//! tests can box the stub into the interface and still assert the
//! single-injection-per-port-per-cycle and VC-serialization properties
//! afterwards.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use noc_core::common::Result;
use noc_core::common::flit::{Credit, Flit};
use noc_core::net::NetworkAdapter;

/// Shared injection log: one `(cycle, node, flit)` entry per `write_flit`.
pub type InjectionLog = Rc<RefCell<Vec<(u64, usize, Flit)>>>;

/// A programmable [`NetworkAdapter`] stub.
pub struct StubNetwork {
    nodes: usize,
    time: u64,
    black_hole: bool,
    delay: u64,
    /// Destination per packet, learned from head flits.
    dest_by_packet: HashMap<u64, usize>,
    injected: InjectionLog,
    ejection_credits: Rc<RefCell<u64>>,
    in_transit: Vec<(u64, usize, Flit)>,
    eject_q: Vec<VecDeque<Flit>>,
    credit_q: Vec<VecDeque<(u64, Credit)>>,
}

impl StubNetwork {
    /// A stub that delivers each flit to its destination after `delay`
    /// cycles.
    pub fn loopback(nodes: usize, delay: u64) -> Self {
        Self::build(nodes, delay, false)
    }

    /// A stub that swallows every flit and never ejects or credits.
    pub fn black_hole(nodes: usize) -> Self {
        Self::build(nodes, 0, true)
    }

    fn build(nodes: usize, delay: u64, black_hole: bool) -> Self {
        Self {
            nodes,
            time: 0,
            black_hole,
            delay,
            dest_by_packet: HashMap::new(),
            injected: Rc::new(RefCell::new(Vec::new())),
            ejection_credits: Rc::new(RefCell::new(0)),
            in_transit: Vec::new(),
            eject_q: (0..nodes).map(|_| VecDeque::new()).collect(),
            credit_q: (0..nodes).map(|_| VecDeque::new()).collect(),
        }
    }

    /// A handle on the injection log that stays valid after the stub is
    /// boxed into the interface.
    pub fn injection_log(&self) -> InjectionLog {
        Rc::clone(&self.injected)
    }

    /// A handle on the count of credits the core wrote for ejected flits.
    pub fn ejection_credit_count(&self) -> Rc<RefCell<u64>> {
        Rc::clone(&self.ejection_credits)
    }
}

/// Groups an injection log by (cycle, node), for per-cycle assertions.
pub fn injections_per_cycle(log: &InjectionLog) -> HashMap<(u64, usize), usize> {
    let mut counts = HashMap::new();
    for (cycle, node, _) in log.borrow().iter() {
        *counts.entry((*cycle, *node)).or_insert(0) += 1;
    }
    counts
}

impl NetworkAdapter for StubNetwork {
    fn read_flit(&mut self, node: usize) -> Option<Flit> {
        self.eject_q[node].pop_front()
    }

    fn read_credit(&mut self, node: usize) -> Option<Credit> {
        match self.credit_q[node].front() {
            Some(&(ready, _)) if ready <= self.time => {
                self.credit_q[node].pop_front().map(|(_, c)| c)
            }
            _ => None,
        }
    }

    fn write_flit(&mut self, flit: Flit, node: usize) {
        self.injected.borrow_mut().push((self.time, node, flit.clone()));
        if self.black_hole {
            return;
        }
        let dest = match flit.dest {
            Some(d) => {
                let _ = self.dest_by_packet.insert(flit.pid.0, d);
                d
            }
            None => self.dest_by_packet[&flit.pid.0],
        };
        if let Some(vc) = flit.vc {
            self.credit_q[node].push_back((self.time + 1, Credit::for_vc(vc)));
        }
        self.in_transit.push((self.time + self.delay, dest, flit));
    }

    fn write_credit(&mut self, _credit: Credit, _node: usize) {
        *self.ejection_credits.borrow_mut() += 1;
    }

    fn read_inputs(&mut self) -> Result<()> {
        Ok(())
    }

    fn evaluate(&mut self) -> Result<()> {
        // Deliver matured flits, at most one per node per cycle, preserving
        // injection order.
        let mut delivered: HashSet<usize> = HashSet::new();
        let mut remaining = Vec::with_capacity(self.in_transit.len());
        for (ready, dest, flit) in self.in_transit.drain(..) {
            if ready <= self.time && !delivered.contains(&dest) {
                let _ = delivered.insert(dest);
                self.eject_q[dest].push_back(flit);
            } else {
                remaining.push((ready, dest, flit));
            }
        }
        self.in_transit = remaining;
        Ok(())
    }

    fn write_outputs(&mut self) -> Result<()> {
        self.time += 1;
        Ok(())
    }

    fn inject_latency(&self, _node: usize) -> u64 {
        1
    }

    fn inject_credit_latency(&self, _node: usize) -> u64 {
        1
    }

    fn num_nodes(&self) -> usize {
        self.nodes
    }

    fn num_routers(&self) -> usize {
        self.nodes
    }
}
