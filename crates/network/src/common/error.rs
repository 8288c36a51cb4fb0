//! Error definitions for the simulator core.
//!
//! This module defines the error handling surface of the crate. It provides:
//! 1. **Construction failures:** Invalid configuration detected before the first cycle.
//! 2. **Admission failures:** Malformed packet-admission arguments.
//! 3. **Simulation failures:** Routing violations and internal invariant breaches
//!    detected mid-cycle; these abort the offending `step` with a typed error.
//!
//! A suspected deadlock is deliberately *not* an error: the watchdog emits a
//! `tracing` warning and keeps simulating (the host decides when to give up).

use thiserror::Error;

use super::flit::FlitId;

/// Convenience alias for results carrying a [`NocError`].
pub type Result<T> = std::result::Result<T, NocError>;

/// Fatal errors surfaced to the embedding simulator.
#[derive(Debug, Error)]
pub enum NocError {
    /// The configuration names an unknown priority mode or routing function,
    /// or carries out-of-range structural parameters. Fatal at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// `admit` was called with a zero-size packet or out-of-range nodes.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A head flit was ejected at a node other than its destination.
    ///
    /// This indicates a bug in the routing function or the network adapter,
    /// never in host code.
    #[error("flit {flit:?} arrived at node {arrived}, destined for node {expected}")]
    RoutingViolation {
        /// The misdelivered head flit.
        flit: FlitId,
        /// The node that ejected it.
        arrived: usize,
        /// The destination the header named.
        expected: usize,
    },

    /// Internal bookkeeping went out of sync (credit underflow, double
    /// retirement, VC double-allocation). Always a programming error in a
    /// collaborator, surfaced rather than silently corrupting statistics.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}
