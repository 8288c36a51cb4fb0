//! Behavioral k×k mesh network.
//!
//! A store-and-forward model of a wormhole mesh that honors the adapter
//! contract without modeling allocator microarchitecture:
//! 1. **Channels:** Injection goes through a one-cycle delay channel; a
//!    credit returns to the source when the injected flit leaves the first
//!    router's input buffer.
//! 2. **Routers:** Per-(input port, VC) FIFOs; a flit becomes eligible to
//!    leave `hop_delay` cycles after entering a router; one flit per output
//!    port per cycle.
//! 3. **Wormhole:** The head locks its output VC per input port and claims a
//!    route; body flits follow the lock; the tail releases both, so packets
//!    never interleave on a VC.
//!
//! Transfers are staged in `evaluate` and committed in `write_outputs`, so a
//! flit moved between routers is never processed twice in one cycle.

use std::collections::VecDeque;

use super::NetworkAdapter;
use crate::common::flit::{Credit, Flit};
use crate::common::{NocError, Result};
use crate::routing::mesh::{NUM_PORTS, PORT_LOCAL, neighbor, opposite};
use crate::routing::{OutputSet, RoutingContext, RoutingFunction};

/// A flit waiting inside a router input buffer.
#[derive(Debug)]
struct Queued {
    /// Cycle from which the flit may leave the router.
    eligible_at: u64,
    flit: Flit,
}

/// One mesh router: input FIFOs plus wormhole locks.
#[derive(Debug)]
struct Router {
    /// Input FIFOs, indexed `[in_port][vc]`.
    inputs: Vec<Vec<VecDeque<Queued>>>,
    /// Output VC ownership, indexed `[out_port][vc]` → holding input port.
    out_locks: Vec<Vec<Option<usize>>>,
    /// Locked route of the packet in flight, indexed `[in_port][vc]`.
    routes: Vec<Vec<Option<usize>>>,
}

impl Router {
    fn new(num_vcs: usize) -> Self {
        Self {
            inputs: (0..NUM_PORTS)
                .map(|_| (0..num_vcs).map(|_| VecDeque::new()).collect())
                .collect(),
            out_locks: vec![vec![None; num_vcs]; NUM_PORTS],
            routes: vec![vec![None; num_vcs]; NUM_PORTS],
        }
    }
}

/// A transfer decided in `evaluate`, committed in `write_outputs`.
#[derive(Debug)]
enum Transfer {
    /// Deliver to a neighboring router's input buffer.
    Forward {
        to: usize,
        in_port: usize,
        flit: Flit,
    },
    /// Hand to the node's ejection queue.
    Eject { node: usize, flit: Flit },
}

/// Behavioral mesh network implementing [`NetworkAdapter`].
pub struct MeshNetwork {
    k: usize,
    nodes: usize,
    num_vcs: usize,
    hop_delay: u64,
    rf: RoutingFunction,
    ctx: RoutingContext,
    time: u64,
    /// Per-node injection channel: (ready cycle, flit).
    inject: Vec<VecDeque<(u64, Flit)>>,
    /// Per-node credits owed to the traffic core.
    credits: Vec<VecDeque<Credit>>,
    /// Per-node ejected flits awaiting pickup.
    eject: Vec<VecDeque<Flit>>,
    routers: Vec<Router>,
    staged: Vec<Transfer>,
    /// Credits the core returned for ejected flits; the ejection buffer is
    /// not backpressured in this model, so they are only counted.
    ejection_credits: u64,
    scratch_route: OutputSet,
}

impl MeshNetwork {
    /// Creates a k×k behavioral mesh.
    ///
    /// # Arguments
    ///
    /// * `k` - Mesh radix.
    /// * `num_vcs` - Virtual channels per port.
    /// * `hop_delay` - Cycles one router adds to a flit's journey.
    /// * `rf` - Routing function used for in-network route computation.
    pub fn new(k: usize, num_vcs: usize, hop_delay: u64, rf: RoutingFunction) -> Self {
        let nodes = k * k;
        Self {
            k,
            nodes,
            num_vcs,
            hop_delay,
            rf,
            ctx: RoutingContext::mesh(k, num_vcs),
            time: 0,
            inject: (0..nodes).map(|_| VecDeque::new()).collect(),
            credits: (0..nodes).map(|_| VecDeque::new()).collect(),
            eject: (0..nodes).map(|_| VecDeque::new()).collect(),
            routers: (0..nodes).map(|_| Router::new(num_vcs)).collect(),
            staged: Vec::new(),
            ejection_credits: 0,
            scratch_route: OutputSet::new(),
        }
    }

    /// The network's internal cycle counter.
    #[inline]
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Credits returned by the core for ejected flits so far.
    #[inline]
    pub fn ejection_credits(&self) -> u64 {
        self.ejection_credits
    }

    /// Resolves the output port for the flit at the front of `(router,
    /// in_port, vc)`; heads are routed, body flits follow the lock.
    fn output_port_for(&mut self, router: usize, in_port: usize, vc: usize) -> Result<Option<usize>> {
        let front = match self.routers[router].inputs[in_port][vc].front() {
            Some(q) if q.eligible_at <= self.time => &q.flit,
            _ => return Ok(None),
        };
        if front.head {
            self.scratch_route.clear();
            (self.rf)(
                &self.ctx,
                Some(router),
                front,
                Some(in_port),
                &mut self.scratch_route,
                false,
            );
            let range = self.scratch_route.single()?;
            let port = range.port.ok_or_else(|| {
                NocError::InternalInvariant(format!(
                    "routing produced no output port at router {router}"
                ))
            })?;
            Ok(Some(port))
        } else {
            Ok(self.routers[router].routes[in_port][vc])
        }
    }
}

impl NetworkAdapter for MeshNetwork {
    fn read_flit(&mut self, node: usize) -> Option<Flit> {
        self.eject[node].pop_front()
    }

    fn read_credit(&mut self, node: usize) -> Option<Credit> {
        self.credits[node].pop_front()
    }

    fn write_flit(&mut self, flit: Flit, node: usize) {
        // One-cycle injection channel.
        self.inject[node].push_back((self.time + 1, flit));
    }

    fn write_credit(&mut self, credit: Credit, node: usize) {
        let _ = (credit, node);
        self.ejection_credits += 1;
    }

    fn read_inputs(&mut self) -> Result<()> {
        for node in 0..self.nodes {
            while let Some(&(ready, _)) = self.inject[node].front() {
                if ready > self.time {
                    break;
                }
                let Some((_, flit)) = self.inject[node].pop_front() else {
                    break;
                };
                let vc = flit.vc.ok_or_else(|| {
                    NocError::InternalInvariant(format!(
                        "flit {:?} injected with no VC assigned",
                        flit.id
                    ))
                })?;
                let eligible_at = self.time + self.hop_delay;
                self.routers[node].inputs[PORT_LOCAL][vc].push_back(Queued { eligible_at, flit });
            }
        }
        Ok(())
    }

    fn evaluate(&mut self) -> Result<()> {
        for router in 0..self.nodes {
            let mut used = [false; NUM_PORTS];
            for in_port in 0..NUM_PORTS {
                for vc in 0..self.num_vcs {
                    let Some(out) = self.output_port_for(router, in_port, vc)? else {
                        continue;
                    };
                    if used[out] {
                        continue;
                    }
                    // Wormhole VC ownership at the output.
                    let is_head = self.routers[router].inputs[in_port][vc]
                        .front()
                        .is_some_and(|q| q.flit.head);
                    let lock = self.routers[router].out_locks[out][vc];
                    if is_head {
                        if lock.is_some() {
                            continue;
                        }
                    } else if lock != Some(in_port) {
                        continue;
                    }
                    let Some(Queued { flit, .. }) =
                        self.routers[router].inputs[in_port][vc].pop_front()
                    else {
                        continue;
                    };
                    used[out] = true;
                    if flit.head {
                        self.routers[router].out_locks[out][vc] = Some(in_port);
                        self.routers[router].routes[in_port][vc] = Some(out);
                    }
                    if flit.tail {
                        self.routers[router].out_locks[out][vc] = None;
                        self.routers[router].routes[in_port][vc] = None;
                    }
                    if in_port == PORT_LOCAL {
                        // The injected flit freed its slot in the first
                        // router; credit the source's buffer mirror.
                        self.credits[router].push_back(Credit::for_vc(vc));
                    }
                    if out == PORT_LOCAL {
                        self.staged.push(Transfer::Eject { node: router, flit });
                    } else {
                        let to = neighbor(router, self.k, out).ok_or_else(|| {
                            NocError::InternalInvariant(format!(
                                "routing sends flit {:?} off the mesh edge at router {router}",
                                flit.id
                            ))
                        })?;
                        self.staged.push(Transfer::Forward {
                            to,
                            in_port: opposite(out),
                            flit,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn write_outputs(&mut self) -> Result<()> {
        for transfer in self.staged.drain(..) {
            match transfer {
                Transfer::Forward { to, in_port, mut flit } => {
                    flit.hops += 1;
                    let vc = flit.vc.ok_or_else(|| {
                        NocError::InternalInvariant(format!(
                            "flit {:?} in flight with no VC assigned",
                            flit.id
                        ))
                    })?;
                    let eligible_at = self.time + self.hop_delay;
                    self.routers[to].inputs[in_port][vc].push_back(Queued { eligible_at, flit });
                }
                Transfer::Eject { node, flit } => {
                    self.eject[node].push_back(flit);
                }
            }
        }
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
