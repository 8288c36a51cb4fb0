//! Simulation front end.
//!
//! This module hosts the embedding surface of the crate:
//! 1. **Interface:** [`interface::NocInterface`] — packet admission, callback
//!    registration, the step pump, and statistics entry points.

/// Host-facing interconnect interface.
pub mod interface;

pub use interface::{CompletionFn, NocInterface};
