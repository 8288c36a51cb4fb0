//! Cycle-accurate NoC simulator library.
//!
//! This crate implements a credit-based, virtual-channel, wormhole-routed
//! on-chip network simulator meant to be embedded in a larger architectural
//! simulator. It provides:
//! 1. **Traffic core:** Packet assembly, injection VC selection, the
//!    per-cycle step driver, retirement, and the deadlock watchdog.
//! 2. **Host interface:** Packet admission, per-handle completion callbacks,
//!    the step pump, and idle-cycle fast paths.
//! 3. **Network seam:** A `NetworkAdapter` trait hiding router
//!    microarchitecture, with a behavioral mesh model included.
//! 4. **Routing:** A registry of pluggable routing functions
//!    (dimension-order mesh built in).
//! 5. **Statistics:** Per-class latency/throughput histograms with periodic
//!    roll-ups and text/matlab reporting.

/// Common types and errors (flits, credits, identifiers).
pub mod common;
/// Simulator configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// Network adapter contract and the behavioral mesh model.
pub mod net;
/// Pluggable routing functions and the routing registry.
pub mod routing;
/// Simulation front end: the host-facing interface.
pub mod sim;
/// Statistics collection and reporting.
pub mod stats;
/// Traffic management: buffer mirror, injection, step driver, retirement.
pub mod traffic;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Typed error surfaced to the host.
pub use crate::common::NocError;
/// Host-facing interface; construct with `NocInterface::new`.
pub use crate::sim::NocInterface;
/// The per-cycle traffic driver, for embedders wiring their own networks.
pub use crate::traffic::TrafficManager;
