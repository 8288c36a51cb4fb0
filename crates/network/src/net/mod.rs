//! Network adapter contract.
//!
//! This module defines the `NetworkAdapter` trait implemented by every
//! network the traffic core can drive (one instance per subnet). It provides:
//! 1. **Port access:** Flit injection/ejection and credit exchange per node.
//! 2. **Lifecycle:** The three-phase per-cycle contract
//!    (`read_inputs` → `evaluate` → `write_outputs`).
//! 3. **Latency queries:** Injection channel latencies for credit round-trip
//!    sanity bounds.
//!
//! The traffic core never looks inside a network: router microarchitecture
//! lives entirely behind this trait. The bundled [`mesh::MeshNetwork`] is a
//! behavioral model sufficient for embedding and testing; a full router
//! model plugs in the same way.

/// Behavioral k×k mesh network.
pub mod mesh;

use crate::common::Result;
use crate::common::flit::{Credit, Flit};

/// One subnet's network, as seen by the traffic core.
///
/// Phase order per cycle is fixed by the step driver: ejection and credit
/// reads, then `read_inputs`, then injections, then `evaluate` and
/// `write_outputs`. Implementations may assume this order.
pub trait NetworkAdapter {
    /// Reads one ejected flit from `node`'s ejection port, if any.
    fn read_flit(&mut self, node: usize) -> Option<Flit>;

    /// Reads one credit returned toward `node`'s injection port, if any.
    fn read_credit(&mut self, node: usize) -> Option<Credit>;

    /// Writes a flit into `node`'s injection port. Called at most once per
    /// node per cycle.
    fn write_flit(&mut self, flit: Flit, node: usize);

    /// Returns a credit upstream for a flit ejected at `node`.
    fn write_credit(&mut self, credit: Credit, node: usize);

    /// Propagates channel-delay queues into router inputs.
    fn read_inputs(&mut self) -> Result<()>;

    /// Runs one router cycle (routing, allocation, traversal).
    fn evaluate(&mut self) -> Result<()>;

    /// Publishes outgoing channel state and advances the network clock.
    fn write_outputs(&mut self) -> Result<()>;

    /// Latency of `node`'s injection channel, in cycles.
    fn inject_latency(&self, node: usize) -> u64;

    /// Latency of `node`'s injection credit channel, in cycles.
    fn inject_credit_latency(&self, node: usize) -> u64;

    /// Number of terminal nodes.
    fn num_nodes(&self) -> usize;

    /// Number of routers.
    fn num_routers(&self) -> usize;
}
