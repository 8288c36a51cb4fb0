//! Host-facing interface tests: the end-to-end scenarios, the idle fast
//! path, the empty-step calibration mode, and the deadlock watchdog.

use noc_core::NocInterface;
use noc_core::common::HandleTag;
use pretty_assertions::assert_eq;

use crate::common::harness::{init_tracing, mesh_config, record_completions, step_until};
use crate::common::mocks::StubNetwork;

// ══════════════════════════════════════════════════════════
// 1. Single packet, same node
// ══════════════════════════════════════════════════════════

#[test]
fn same_node_packet_completes_quickly() {
    let mut noc = NocInterface::new(mesh_config()).unwrap();
    let done = record_completions(&mut noc, HandleTag(1));
    let pid = noc.admit(5, 5, 5, Some(0), HandleTag(1)).unwrap();

    let steps = step_until(&mut noc, 20, |_| !done.borrow().is_empty());
    assert_eq!(done.borrow().as_slice(), &[(0, pid.0, 1)]);
    assert!(steps <= 12, "took {steps} steps");
    assert_eq!(noc.current_cycle(), steps);
    assert_eq!(noc.outstanding_packets(), 0);
}

// ══════════════════════════════════════════════════════════
// 2. Single packet, diagonal
// ══════════════════════════════════════════════════════════

#[test]
fn diagonal_packet_pays_zero_load_latency_and_six_hops() {
    let mut noc = NocInterface::new(mesh_config()).unwrap();
    let hop_delay = noc.hop_delay();
    let done = record_completions(&mut noc, HandleTag(2));
    let pid = noc.admit(0, 15, 5, Some(0), HandleTag(2)).unwrap();

    let steps = step_until(&mut noc, 80, |_| !done.borrow().is_empty());
    assert_eq!(done.borrow().as_slice(), &[(0, pid.0, 1)]);
    // ZLL bound: (|dx| + |dy| + 1) * hop_delay + (size - 1).
    assert!(steps >= 7 * hop_delay + 4, "took only {steps} steps");

    let hops = &noc.manager().class_stats()[0].hops;
    assert_eq!(hops.num_samples(), 1);
    assert_eq!(hops.max(), 6.0);
    assert_eq!(hops.min(), 6.0);
}

// ══════════════════════════════════════════════════════════
// 3. Two colliding packets
// ══════════════════════════════════════════════════════════

#[test]
fn colliding_packets_both_complete_with_sane_fragmentation() {
    let mut noc = NocInterface::new(mesh_config()).unwrap();
    let done = record_completions(&mut noc, HandleTag(3));
    let a = noc.admit(0, 3, 5, Some(0), HandleTag(3)).unwrap();
    let b = noc.admit(1, 3, 5, Some(0), HandleTag(3)).unwrap();

    let _ = step_until(&mut noc, 300, |_| done.borrow().len() == 2);
    let mut pids: Vec<u64> = done.borrow().iter().map(|&(_, pid, _)| pid).collect();
    pids.sort_unstable();
    assert_eq!(pids, vec![a.0, b.0]);

    let frag = &noc.manager().class_stats()[0].frag;
    assert_eq!(frag.num_samples(), 2);
    assert!(frag.min() >= 0.0);
}

// ══════════════════════════════════════════════════════════
// 4. Skip-step idle fast path
// ══════════════════════════════════════════════════════════

#[test]
fn idle_steps_are_skipped_but_still_advance_the_clock() {
    let mut noc = NocInterface::new(mesh_config()).unwrap();
    let done = record_completions(&mut noc, HandleTag(4));
    for _ in 0..1000 {
        noc.step().unwrap();
    }
    assert_eq!(noc.current_cycle(), 1000);
    assert_eq!(noc.skipped_steps(), 1000);
    assert_eq!(noc.non_skipped_steps(), 0);
    assert!(done.borrow().is_empty());
}

#[test]
fn skip_step_can_be_disabled() {
    let mut config = mesh_config();
    config.sim.skip_idle_steps = false;
    let mut noc = NocInterface::new(config).unwrap();
    for _ in 0..10 {
        noc.step().unwrap();
    }
    assert_eq!(noc.current_cycle(), 10);
    assert_eq!(noc.skipped_steps(), 0);
    assert_eq!(noc.non_skipped_steps(), 10);
}

// ══════════════════════════════════════════════════════════
// 5. Deadlock watchdog
// ══════════════════════════════════════════════════════════

#[test]
fn watchdog_warns_once_per_threshold_and_resets() {
    init_tracing();
    let mut config = mesh_config();
    config.sim.deadlock_warn_timeout = 100;
    let stub = StubNetwork::black_hole(config.nodes());
    let mut noc = NocInterface::with_networks(config, vec![Box::new(stub)]).unwrap();
    let _ = noc.admit(0, 15, 5, Some(0), HandleTag(1)).unwrap();

    for _ in 0..100 {
        noc.step().unwrap();
    }
    assert_eq!(noc.manager().deadlock_warnings(), 1);

    for _ in 0..50 {
        noc.step().unwrap();
    }
    assert_eq!(noc.manager().deadlock_warnings(), 1, "warned again too early");

    for _ in 0..50 {
        noc.step().unwrap();
    }
    assert_eq!(noc.manager().deadlock_warnings(), 2);
}

// ══════════════════════════════════════════════════════════
// 6. Empty-step calibration mode
// ══════════════════════════════════════════════════════════

#[test]
fn empty_step_fires_after_exactly_the_zero_load_latency() {
    let mut config = mesh_config();
    config.sim.empty_step = true;
    let hop_delay = config.hop_delay();
    let mut noc = NocInterface::new(config).unwrap();
    let done = record_completions(&mut noc, HandleTag(7));
    let pid = noc.admit(0, 15, 5, None, HandleTag(7)).unwrap();

    let zll = 7 * hop_delay + 4;
    for _ in 0..zll - 1 {
        noc.step().unwrap();
    }
    assert!(done.borrow().is_empty());
    noc.step().unwrap();
    assert_eq!(done.borrow().as_slice(), &[(0, pid.0, 1)]);
    // The manager never saw the packet.
    assert_eq!(noc.manager().in_flight_count(), 0);
}

// ══════════════════════════════════════════════════════════
// 7. Callback registry
// ══════════════════════════════════════════════════════════

#[test]
fn completions_route_to_the_admitting_handle() {
    let mut noc = NocInterface::new(mesh_config()).unwrap();
    let log_a = record_completions(&mut noc, HandleTag(10));
    let log_b = record_completions(&mut noc, HandleTag(20));
    let pa = noc.admit(0, 5, 5, Some(0), HandleTag(10)).unwrap();
    let pb = noc.admit(9, 2, 5, Some(0), HandleTag(20)).unwrap();

    let _ = step_until(&mut noc, 300, |_| {
        !log_a.borrow().is_empty() && !log_b.borrow().is_empty()
    });
    assert_eq!(log_a.borrow().as_slice(), &[(0, pa.0, 1)]);
    assert_eq!(log_b.borrow().as_slice(), &[(0, pb.0, 1)]);
}

// ══════════════════════════════════════════════════════════
// 8. Statistics surfaces
// ══════════════════════════════════════════════════════════

#[test]
fn overall_stats_report_is_written() {
    let mut noc = NocInterface::new(mesh_config()).unwrap();
    let done = record_completions(&mut noc, HandleTag(1));
    let _ = noc.admit(0, 15, 5, Some(0), HandleTag(1)).unwrap();
    let _ = step_until(&mut noc, 80, |_| !done.borrow().is_empty());

    noc.update_stats();
    let mut out = Vec::new();
    noc.display_overall_stats(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("OVERALL STATISTICS"));
    assert!(text.contains("skipped steps"));
}

#[test]
fn matlab_stats_land_in_a_file() {
    let mut noc = NocInterface::new(mesh_config()).unwrap();
    let done = record_completions(&mut noc, HandleTag(1));
    let _ = noc.admit(1, 2, 5, Some(0), HandleTag(1)).unwrap();
    let _ = step_until(&mut noc, 80, |_| !done.borrow().is_empty());

    let mut file = tempfile::tempfile().unwrap();
    noc.write_matlab_stats(&mut file).unwrap();
    use std::io::{Read, Seek};
    let mut text = String::new();
    file.rewind().unwrap();
    let _ = file.read_to_string(&mut text).unwrap();
    assert!(text.contains("plat(1,:) = ["));
}

#[test]
fn embedder_queries_reflect_the_config() {
    let noc = NocInterface::new(mesh_config()).unwrap();
    assert_eq!(noc.num_nodes(), 16);
    assert_eq!(noc.hop_delay(), 2);
    assert_eq!(noc.packet_size(), 5);
    assert_eq!(noc.noc_frequency_mhz(), 1000);
}
