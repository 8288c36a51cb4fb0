//! Traffic manager tests: packet assembly, injection discipline, and
//! retirement bookkeeping.

use noc_core::common::flit::FlitKind;
use noc_core::common::{HandleTag, NocError};
use noc_core::{Config, NocInterface};
use pretty_assertions::assert_eq;

use crate::common::harness::{mesh_config, record_completions, step_until};
use crate::common::mocks::{StubNetwork, injections_per_cycle};

/// Interface over a loopback stub, returning the shared injection log.
fn stub_interface(config: Config, delay: u64) -> (NocInterface, crate::common::mocks::InjectionLog) {
    let stub = StubNetwork::loopback(config.nodes(), delay);
    let log = stub.injection_log();
    let noc = NocInterface::with_networks(config, vec![Box::new(stub)]).unwrap();
    (noc, log)
}

// ══════════════════════════════════════════════════════════
// 1. Admission validation
// ══════════════════════════════════════════════════════════

#[test]
fn zero_size_packet_is_rejected() {
    let mut noc = NocInterface::new(mesh_config()).unwrap();
    let err = noc.admit(0, 1, 0, None, HandleTag(1)).unwrap_err();
    assert!(matches!(err, NocError::InvalidArgument(_)));
}

#[test]
fn out_of_range_nodes_are_rejected() {
    let mut noc = NocInterface::new(mesh_config()).unwrap();
    assert!(noc.admit(16, 1, 5, None, HandleTag(1)).is_err());
    assert!(noc.admit(0, 99, 5, None, HandleTag(1)).is_err());
}

#[test]
fn admit_returns_fresh_increasing_pids() {
    let mut noc = NocInterface::new(mesh_config()).unwrap();
    let a = noc.admit(0, 1, 5, None, HandleTag(1)).unwrap();
    let b = noc.admit(2, 3, 5, None, HandleTag(1)).unwrap();
    assert!(b > a);
}

// ══════════════════════════════════════════════════════════
// 2. Partial packet layout
// ══════════════════════════════════════════════════════════

#[test]
fn packet_flit_ids_are_contiguous() {
    let mut noc = NocInterface::new(mesh_config()).unwrap();
    // Future-dated, so all five flits stay queued and observable.
    let _ = noc.admit(2, 7, 5, Some(100), HandleTag(1)).unwrap();
    let ids: Vec<u64> = noc
        .manager()
        .measured_in_flight(0)
        .iter()
        .map(|id| id.0)
        .collect();
    assert_eq!(ids.len(), 5);
    let min = ids.iter().min().copied().unwrap();
    let max = ids.iter().max().copied().unwrap();
    assert_eq!(max - min, 4);
}

#[test]
fn head_carries_destination_body_flits_do_not() {
    let (mut noc, log) = stub_interface(mesh_config(), 3);
    let done = record_completions(&mut noc, HandleTag(1));
    let _ = noc.admit(0, 9, 4, None, HandleTag(1)).unwrap();
    let _ = step_until(&mut noc, 100, |_| !done.borrow().is_empty());

    let log = log.borrow();
    assert_eq!(log.len(), 4);
    let flits: Vec<_> = log.iter().map(|(_, _, f)| f).collect();
    assert!(flits[0].head);
    assert_eq!(flits[0].dest, Some(9));
    for body in &flits[1..] {
        assert!(!body.head);
        assert_eq!(body.dest, None);
    }
    assert!(flits[3].tail);
    assert!(!flits[0].tail && !flits[1].tail && !flits[2].tail);
}

#[test]
fn single_flit_packet_is_both_head_and_tail() {
    let (mut noc, log) = stub_interface(mesh_config(), 2);
    let done = record_completions(&mut noc, HandleTag(9));
    let pid = noc.admit(4, 11, 1, None, HandleTag(9)).unwrap();
    let _ = step_until(&mut noc, 50, |_| !done.borrow().is_empty());
    assert_eq!(done.borrow().as_slice(), &[(0, pid.0, 1)]);

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert!(log[0].2.head && log[0].2.tail);
}

// ══════════════════════════════════════════════════════════
// 3. Injection discipline
// ══════════════════════════════════════════════════════════

#[test]
fn body_flits_inherit_the_heads_vc_and_itime_advances() {
    let (mut noc, log) = stub_interface(mesh_config(), 3);
    let done = record_completions(&mut noc, HandleTag(1));
    let _ = noc.admit(0, 15, 5, None, HandleTag(1)).unwrap();
    let _ = step_until(&mut noc, 100, |_| !done.borrow().is_empty());

    let log = log.borrow();
    assert_eq!(log.len(), 5);
    let head_vc = log[0].2.vc;
    assert!(head_vc.is_some());
    assert!(log.iter().all(|(_, _, f)| f.vc == head_vc));
    // One flit per cycle, back to back.
    for pair in log.windows(2) {
        assert_eq!(pair[1].0, pair[0].0 + 1);
        assert_eq!(pair[1].2.itime, pair[0].2.itime + 1);
    }
}

#[test]
fn at_most_one_injection_per_node_per_cycle() {
    let (mut noc, log) = stub_interface(mesh_config(), 3);
    let done = record_completions(&mut noc, HandleTag(1));
    // Three packets queued at the same node, plus one elsewhere.
    for _ in 0..3 {
        let _ = noc.admit(0, 12, 5, None, HandleTag(1)).unwrap();
    }
    let _ = noc.admit(7, 2, 5, None, HandleTag(1)).unwrap();
    let _ = step_until(&mut noc, 200, |_| done.borrow().len() == 4);

    for ((_, _), count) in injections_per_cycle(&log) {
        assert!(count <= 1);
    }
}

#[test]
fn one_vc_serializes_packets_from_different_classes() {
    let mut config = mesh_config();
    config.traffic.classes = 2;
    config.network.num_vcs = 1;
    let (mut noc, log) = stub_interface(config, 3);
    let done = record_completions(&mut noc, HandleTag(1));
    let a = noc
        .admit_typed(0, 12, 4, FlitKind::Any, 0, None, HandleTag(1))
        .unwrap();
    let b = noc
        .admit_typed(0, 8, 4, FlitKind::Any, 1, None, HandleTag(1))
        .unwrap();
    let _ = step_until(&mut noc, 200, |_| done.borrow().len() == 2);

    // With a single VC the second head cannot claim the channel until the
    // first packet's tail has left: injection intervals must not overlap.
    let log = log.borrow();
    let span = |pid: u64| {
        let cycles: Vec<u64> = log
            .iter()
            .filter(|(_, _, f)| f.pid.0 == pid)
            .map(|(c, _, _)| *c)
            .collect();
        (
            cycles.iter().min().copied().unwrap(),
            cycles.iter().max().copied().unwrap(),
        )
    };
    let (a_first, a_last) = span(a.0);
    let (b_first, b_last) = span(b.0);
    assert!(a_last < b_first || b_last < a_first);
}

#[test]
fn future_dated_packets_wait_for_the_clock() {
    let mut noc = NocInterface::new(mesh_config()).unwrap();
    let done = record_completions(&mut noc, HandleTag(5));
    let _ = noc.admit(2, 7, 3, Some(100), HandleTag(5)).unwrap();
    for _ in 0..50 {
        noc.step().unwrap();
    }
    assert!(done.borrow().is_empty());
    assert_eq!(noc.manager().measured_in_flight(0).len(), 3);
    assert_eq!(noc.manager().queued_at(2), 3);
    let sent: u64 = noc.manager().class_stats()[0].sent_flits.iter().sum();
    assert_eq!(sent, 0, "nothing may inject before ctime");

    // Once the clock passes ctime the packet flows normally.
    let _ = step_until(&mut noc, 200, |_| !done.borrow().is_empty());
    assert_eq!(noc.manager().queued_at(2), 0);
}

#[test]
fn hold_switch_for_packet_still_completes_mixed_classes() {
    let mut config = mesh_config();
    config.traffic.classes = 2;
    config.traffic.hold_switch_for_packet = true;
    let (mut noc, _log) = stub_interface(config, 3);
    let done = record_completions(&mut noc, HandleTag(1));
    let _ = noc
        .admit_typed(3, 9, 5, FlitKind::Any, 0, None, HandleTag(1))
        .unwrap();
    let _ = noc
        .admit_typed(3, 10, 5, FlitKind::Any, 1, None, HandleTag(1))
        .unwrap();
    let _ = step_until(&mut noc, 300, |_| done.borrow().len() == 2);
}

// ══════════════════════════════════════════════════════════
// 4. Retirement bookkeeping
// ══════════════════════════════════════════════════════════

#[test]
fn request_tails_leave_reply_records_at_the_destination() {
    let (mut noc, _log) = stub_interface(mesh_config(), 3);
    let done = record_completions(&mut noc, HandleTag(1));
    let _ = noc
        .admit_typed(1, 6, 5, FlitKind::ReadRequest, 0, None, HandleTag(1))
        .unwrap();
    let _ = step_until(&mut noc, 100, |_| !done.borrow().is_empty());

    let replies = noc.manager_mut().take_replies(6);
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].source, 1);
    assert_eq!(replies[0].kind, FlitKind::ReadRequest);
    assert!(noc.manager().replies_pending(6).is_empty());
}

#[test]
fn untyped_tail_retires_the_source_request_counter() {
    let (mut noc, _log) = stub_interface(mesh_config(), 3);
    let done = record_completions(&mut noc, HandleTag(1));
    let _ = noc.admit(4, 13, 5, None, HandleTag(1)).unwrap();
    assert_eq!(noc.manager().requests_outstanding(4), 1);
    let _ = step_until(&mut noc, 100, |_| !done.borrow().is_empty());
    assert_eq!(noc.manager().requests_outstanding(4), 0);
}

#[test]
fn conservation_all_flits_eject_and_nothing_stays_in_flight() {
    let (mut noc, log) = stub_interface(mesh_config(), 3);
    let done = record_completions(&mut noc, HandleTag(1));
    let sizes = [5usize, 1, 3, 5];
    let pairs = [(0usize, 15usize), (3, 3), (7, 8), (12, 1)];
    for (&size, &(src, dst)) in sizes.iter().zip(&pairs) {
        let _ = noc.admit(src, dst, size, None, HandleTag(1)).unwrap();
    }
    let _ = step_until(&mut noc, 300, |_| done.borrow().len() == 4);

    assert_eq!(noc.manager().in_flight_count(), 0);
    let total: usize = sizes.iter().sum();
    assert_eq!(log.borrow().len(), total);
    let accepted: u64 = noc.manager().class_stats()[0].accepted_flits.iter().sum();
    assert_eq!(accepted as usize, total);
}
