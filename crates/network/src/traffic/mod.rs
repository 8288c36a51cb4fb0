//! Traffic management: the per-cycle driver of the simulator.
//!
//! This module owns everything between packet admission and completion:
//! 1. **Buffer mirror:** Per-(node, subnet) downstream buffer state for
//!    injection flow control.
//! 2. **Manager:** Partial-packet queues, the injection VC selector, the
//!    fixed-order step driver, retirement, and the deadlock watchdog.

/// Downstream buffer mirror for injection flow control.
pub mod buffer_state;
/// The traffic manager and its per-cycle step driver.
pub mod manager;

pub use buffer_state::BufferState;
pub use manager::{ReplyInfo, TrafficManager};
