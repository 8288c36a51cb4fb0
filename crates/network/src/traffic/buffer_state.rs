//! Downstream buffer mirror for injection flow control.
//!
//! One `BufferState` exists per (source node, subnet). It tracks, for every
//! output VC of the injection channel, which packet owns the VC, how many
//! flits occupy the downstream buffer, and the credit limit. It provides:
//! 1. **Availability:** Whether a VC can be claimed by a new head flit.
//! 2. **Occupancy:** Whether the downstream buffer has room for one more flit.
//! 3. **Accounting:** Occupancy goes up per flit sent and down per credited
//!    VC; a VC is owned from the head's claim until its tail departs.
//!
//! Credits and sends must balance exactly; an imbalance is a bug in the
//! network adapter and surfaces as [`NocError::InternalInvariant`].

use crate::common::flit::{Credit, Flit, PacketId};
use crate::common::{NocError, Result};

/// Per-VC slice of the mirror.
#[derive(Clone, Copy, Debug, Default)]
struct VcState {
    /// Packet currently holding the VC, if any.
    in_use_by: Option<PacketId>,
    /// Flits sent and not yet credited back.
    occupancy: usize,
}

/// Mirror of one downstream buffer: per-VC ownership and occupancy.
#[derive(Clone, Debug)]
pub struct BufferState {
    vcs: Vec<VcState>,
    capacity: usize,
    /// Shortest possible credit round-trip, kept for debug sanity checks.
    min_latency: u64,
}

impl BufferState {
    /// Creates a mirror for `num_vcs` virtual channels of `capacity` flits
    /// each.
    pub fn new(num_vcs: usize, capacity: usize) -> Self {
        Self {
            vcs: vec![VcState::default(); num_vcs],
            capacity,
            min_latency: 0,
        }
    }

    /// True iff no packet currently owns `vc`.
    #[inline]
    pub fn is_available_for(&self, vc: usize) -> bool {
        self.vcs[vc].in_use_by.is_none()
    }

    /// True iff the downstream buffer for `vc` has no free slot.
    #[inline]
    pub fn is_full_for(&self, vc: usize) -> bool {
        self.vcs[vc].occupancy >= self.capacity
    }

    /// Flits currently counted against `vc`.
    #[inline]
    pub fn occupancy_for(&self, vc: usize) -> usize {
        self.vcs[vc].occupancy
    }

    /// The packet owning `vc`, if any.
    #[inline]
    pub fn owner_of(&self, vc: usize) -> Option<PacketId> {
        self.vcs[vc].in_use_by
    }

    /// Claims `vc` for a packet; applied exactly once, on head injection.
    pub fn take_buffer(&mut self, vc: usize, pid: PacketId) -> Result<()> {
        let state = &mut self.vcs[vc];
        if let Some(owner) = state.in_use_by {
            return Err(NocError::InternalInvariant(format!(
                "VC {vc} taken for {pid:?} while still owned by {owner:?}"
            )));
        }
        state.in_use_by = Some(pid);
        Ok(())
    }

    /// Counts one flit against its VC; the tail releases ownership.
    pub fn sending_flit(&mut self, flit: &Flit) -> Result<()> {
        let vc = flit.vc.ok_or_else(|| {
            NocError::InternalInvariant(format!("flit {:?} sent with no VC assigned", flit.id))
        })?;
        let state = &mut self.vcs[vc];
        if state.occupancy >= self.capacity {
            return Err(NocError::InternalInvariant(format!(
                "VC {vc} occupancy would exceed capacity {}",
                self.capacity
            )));
        }
        state.occupancy += 1;
        if flit.tail {
            state.in_use_by = None;
        }
        Ok(())
    }

    /// Frees one slot per VC named in the credit.
    pub fn process_credit(&mut self, credit: &Credit) -> Result<()> {
        for &vc in &credit.vcs {
            let state = self.vcs.get_mut(vc).ok_or_else(|| {
                NocError::InternalInvariant(format!("credit names unknown VC {vc}"))
            })?;
            if state.occupancy == 0 {
                return Err(NocError::InternalInvariant(format!(
                    "credit for VC {vc} with zero occupancy"
                )));
            }
            state.occupancy -= 1;
        }
        Ok(())
    }

    /// Records the shortest credit round-trip for this channel.
    pub fn set_min_latency(&mut self, cycles: u64) {
        self.min_latency = cycles;
    }

    /// The recorded shortest credit round-trip.
    #[inline]
    pub fn min_latency(&self) -> u64 {
        self.min_latency
    }
}
