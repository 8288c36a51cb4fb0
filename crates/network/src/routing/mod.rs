//! Pluggable routing functions.
//!
//! This module defines the seam between the traffic core and
//! topology-specific routing. It provides:
//! 1. **Output sets:** The result of a route computation — one or more
//!    (output port, VC range) candidates.
//! 2. **Context:** Per-core topology parameters handed to every routing call,
//!    replacing process-global routing state.
//! 3. **Registry:** A name-keyed table resolving `"<function>_<topology>"`
//!    strings to implementations at startup; unknown names fail construction.
//!
//! A routing function is a plain `fn` value: given the router it runs at
//! (`None` during injection), the flit, and the input channel, it fills an
//! [`OutputSet`]. Routing functions are pure with respect to the core.

/// Dimension-order routing on a k×k mesh, plus the mesh port geometry.
pub mod mesh;

use std::collections::HashMap;

use crate::common::flit::Flit;
use crate::common::{NocError, Result};

/// One candidate output: a port (or `None` at injection, where the only
/// "port" is the injection channel itself) and an inclusive VC range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputRange {
    /// Output port at the router; `None` when routing the injection step.
    pub port: Option<usize>,
    /// First virtual channel of the admissible range.
    pub vc_start: usize,
    /// Last virtual channel of the admissible range (inclusive).
    pub vc_end: usize,
}

impl OutputRange {
    /// Number of VCs in the range.
    #[inline]
    pub fn vc_count(&self) -> usize {
        self.vc_end - self.vc_start + 1
    }
}

/// The set of outputs a routing function proposes for one flit.
///
/// Deterministic routing functions produce exactly one element; the
/// container form keeps the seam open for adaptive functions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputSet {
    ranges: Vec<OutputRange>,
}

impl OutputSet {
    /// Creates an empty output set.
    pub fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    /// Removes all proposed outputs.
    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Adds a candidate output.
    pub fn add_range(&mut self, port: Option<usize>, vc_start: usize, vc_end: usize) {
        self.ranges.push(OutputRange {
            port,
            vc_start,
            vc_end,
        });
    }

    /// All proposed outputs.
    pub fn ranges(&self) -> &[OutputRange] {
        &self.ranges
    }

    /// The unique proposed output, or an invariant error when the function
    /// produced zero or several (deterministic callers rely on exactly one).
    pub fn single(&self) -> Result<OutputRange> {
        match self.ranges.as_slice() {
            [only] => Ok(*only),
            other => Err(NocError::InternalInvariant(format!(
                "routing function produced {} outputs, expected exactly 1",
                other.len()
            ))),
        }
    }
}

/// Per-core topology parameters available to every routing call.
///
/// Carried explicitly instead of through process globals so that several
/// simulator instances can coexist in one host process.
#[derive(Clone, Copy, Debug)]
pub struct RoutingContext {
    /// Mesh radix; the fabric is a k×k grid.
    pub k: usize,
    /// Total node count.
    pub nodes: usize,
    /// Virtual channels per port.
    pub num_vcs: usize,
    /// Output ports per router, ejection included.
    pub num_ports: usize,
}

impl RoutingContext {
    /// Builds the context for a k×k mesh.
    pub fn mesh(k: usize, num_vcs: usize) -> Self {
        Self {
            k,
            nodes: k * k,
            num_vcs,
            num_ports: mesh::NUM_PORTS,
        }
    }
}

/// A routing function: fills `output` with the admissible (port, VC range)
/// candidates for `flit`.
///
/// `router` is `None` while the flit is still at its source node (injection
/// phase, `inject = true` — the result then carries the admissible VC range
/// with no port); otherwise it is the index of the router performing the
/// route computation and `in_channel` names the input port the flit sits on.
pub type RoutingFunction = fn(
    ctx: &RoutingContext,
    router: Option<usize>,
    flit: &Flit,
    in_channel: Option<usize>,
    output: &mut OutputSet,
    inject: bool,
);

/// Name-keyed registry of routing functions.
///
/// Keys follow the `"<routing_function>_<topology>"` convention, so a config
/// of `routing_function = "dor"`, `topology = "mesh"` resolves `"dor_mesh"`.
pub struct RoutingRegistry {
    map: HashMap<String, RoutingFunction>,
}

impl RoutingRegistry {
    /// Creates a registry pre-populated with the built-in functions.
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            map: HashMap::new(),
        };
        registry.register("dor_mesh", mesh::dim_order_mesh);
        registry
    }

    /// Registers (or replaces) a routing function under the given key.
    pub fn register(&mut self, key: &str, rf: RoutingFunction) {
        drop(self.map.insert(key.to_owned(), rf));
    }

    /// Resolves a key, failing with [`NocError::InvalidConfig`] on a miss.
    pub fn resolve(&self, key: &str) -> Result<RoutingFunction> {
        self.map
            .get(key)
            .copied()
            .ok_or_else(|| NocError::InvalidConfig(format!("invalid routing function: {key}")))
    }
}

impl Default for RoutingRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
