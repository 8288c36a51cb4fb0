//! Common types shared across the simulator.
//!
//! This module defines the leaf records every other component consumes:
//! 1. **Flits and credits:** The unit of transport and its credit feedback token.
//! 2. **Identifiers:** Newtypes for flit, packet, and opaque host handles.
//! 3. **Errors:** The typed error enum surfaced to the embedding simulator.

/// Typed errors surfaced to the host.
pub mod error;
/// Flit and credit records plus identifier newtypes.
pub mod flit;

pub use error::{NocError, Result};
pub use flit::{Credit, Flit, FlitId, FlitKind, HandleTag, PacketId};
