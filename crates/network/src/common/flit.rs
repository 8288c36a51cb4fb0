//! Flit and credit records.
//!
//! A *flit* is the smallest unit that moves across one channel per cycle; a
//! *packet* is an ordered run of flits sharing a [`PacketId`], with the head
//! carrying the header (destination) and the tail marking completion. A
//! *credit* flows the opposite way and frees a downstream buffer slot.
//!
//! Flits are owned values: they are built at admission, queued per
//! (node, class), moved into the network on injection, handed back by the
//! ejection port, and consumed at retirement. All id-keyed bookkeeping holds
//! plain ids, so no aliasing of the record itself ever exists.

use crate::routing::OutputSet;

/// Unique identifier of a single flit.
///
/// Ids increase monotonically and are contiguous within one packet, head
/// first — fragmentation accounting relies on this.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FlitId(pub u64);

/// Unique identifier of a packet (shared by all of its flits).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PacketId(pub u64);

/// Opaque host handle identifying which registered caller receives the
/// completion callback for a packet.
///
/// The core only ever stores and compares the tag; it never interprets it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct HandleTag(pub u64);

/// Transport-level packet type.
///
/// Typed packets are pinned to a configured subnet to avoid protocol
/// deadlock between requests and replies; [`FlitKind::Any`] packets pick a
/// subnet at random.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum FlitKind {
    /// Read request travelling toward a memory node.
    ReadRequest,
    /// Read reply travelling back to the requester.
    ReadReply,
    /// Write request travelling toward a memory node.
    WriteRequest,
    /// Write reply (acknowledgement) travelling back to the requester.
    WriteReply,
    /// Untyped traffic; subnet chosen randomly at admission.
    #[default]
    Any,
}

impl FlitKind {
    /// Returns true for request types that elicit a reply at the destination.
    #[inline]
    pub fn is_request(self) -> bool {
        matches!(self, Self::ReadRequest | Self::WriteRequest)
    }
}

/// One unit of transport.
///
/// Created once at admission and immutable afterwards except for the fields
/// the lifecycle stamps exactly once: the virtual channel (set by VC
/// selection), `itime` (set at injection), `atime` (set at ejection), `hops`
/// (incremented per router-to-router traversal), and the priority (rewritten
/// at injection under network-age arbitration).
#[derive(Clone, Debug)]
pub struct Flit {
    /// Unique flit id.
    pub id: FlitId,
    /// Packet this flit belongs to.
    pub pid: PacketId,
    /// First flit of the packet; carries the header.
    pub head: bool,
    /// Last flit of the packet; completion fires when it ejects.
    pub tail: bool,
    /// Source node.
    pub src: usize,
    /// Destination node. `Some` on head flits only: the destination is part
    /// of the head's header, body flits carry no routing information.
    pub dest: Option<usize>,
    /// Virtual channel. `None` until output-VC selection commits, then fixed
    /// for the life of the flit.
    pub vc: Option<usize>,
    /// Subnet the packet travels on.
    pub subnet: usize,
    /// Traffic class, for arbitration and statistics segregation.
    pub class: usize,
    /// Packet type.
    pub kind: FlitKind,
    /// Creation cycle supplied by the host; may lie in the future, in which
    /// case injection holds the flit until the clock catches up.
    pub ctime: u64,
    /// Injection cycle: when the flit left the partial-packet queue.
    pub itime: u64,
    /// Arrival cycle: when the flit was read off the ejection port.
    pub atime: u64,
    /// Routers traversed so far.
    pub hops: u32,
    /// Emit per-event diagnostics for this flit.
    pub watch: bool,
    /// Counted in measured statistics.
    pub record: bool,
    /// Arbitration priority; larger wins strict-greater comparisons.
    pub pri: i64,
    /// Lookahead route, precomputed at injection when lookahead routing is on.
    pub la_route_set: OutputSet,
}

impl Flit {
    /// Creates a blank flit with the given identity; lifecycle fields start
    /// at their sentinels.
    pub fn new(id: FlitId, pid: PacketId) -> Self {
        Self {
            id,
            pid,
            head: false,
            tail: false,
            src: 0,
            dest: None,
            vc: None,
            subnet: 0,
            class: 0,
            kind: FlitKind::Any,
            ctime: 0,
            itime: 0,
            atime: 0,
            hops: 0,
            watch: false,
            record: false,
            pri: 0,
            la_route_set: OutputSet::new(),
        }
    }
}

/// A credit freeing one or more virtual-channel buffer slots downstream.
///
/// The wire format allows a set of VCs per credit; this core only ever puts
/// one VC in a credit (one per ejected flit), but the tracker consumes the
/// full set.
#[derive(Clone, Debug, Default)]
pub struct Credit {
    /// Virtual channels being freed.
    pub vcs: Vec<usize>,
}

impl Credit {
    /// Creates a credit freeing a single VC.
    pub fn for_vc(vc: usize) -> Self {
        Self { vcs: vec![vc] }
    }
}
