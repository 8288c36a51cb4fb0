//! Configuration unit tests.
//!
//! Verifies defaults, JSON deserialization, hop-delay derivation, and
//! fail-fast validation.

use noc_core::config::{Config, PriorityMode, SimType};
use noc_core::{NocError, NocInterface};
use pretty_assertions::assert_eq;
use rstest::rstest;

// ══════════════════════════════════════════════════════════
// 1. Defaults
// ══════════════════════════════════════════════════════════

#[test]
fn default_config_is_valid() {
    let config = Config::default();
    config.validate().unwrap();
    assert_eq!(config.topology.k, 4);
    assert_eq!(config.nodes(), 16);
    assert_eq!(config.network.num_vcs, 4);
    assert_eq!(config.network.input_buffer_size, 9);
    assert_eq!(config.traffic.priority, PriorityMode::None);
    assert_eq!(config.sim.sim_type, SimType::Latency);
    assert!(config.sim.skip_idle_steps);
    assert!(!config.sim.empty_step);
}

#[test]
fn ejection_buffer_falls_back_to_vc_buf_size() {
    let mut config = Config::default();
    config.network.vc_buf_size = 6;
    config.network.ejection_buffer_size = 0;
    assert_eq!(config.ejection_buffer_capacity(), 6);
    config.network.ejection_buffer_size = 12;
    assert_eq!(config.ejection_buffer_capacity(), 12);
}

// ══════════════════════════════════════════════════════════
// 2. Hop delay derivation
// ══════════════════════════════════════════════════════════

#[test]
fn hop_delay_sums_allocators_when_not_speculative() {
    let mut config = Config::default();
    config.timing.routing_delay = 1;
    config.timing.vc_alloc_delay = 1;
    config.timing.sw_alloc_delay = 2;
    config.timing.st_prepare_delay = 1;
    config.timing.st_final_delay = 1;
    config.timing.speculative = false;
    // 1 + (1 + 2) + 1 + 1 + 1 link
    assert_eq!(config.hop_delay(), 7);
}

#[rstest]
#[case(1, 1, 2, 4)] // 1 + max(1, 2) + 1 link
#[case(0, 1, 1, 2)]
#[case(2, 3, 3, 6)]
fn hop_delay_overlaps_allocators_when_speculative(
    #[case] routing: u64,
    #[case] vc_alloc: u64,
    #[case] sw_alloc: u64,
    #[case] expected: u64,
) {
    let mut config = Config::default();
    config.timing.routing_delay = routing;
    config.timing.vc_alloc_delay = vc_alloc;
    config.timing.sw_alloc_delay = sw_alloc;
    config.timing.speculative = true;
    assert_eq!(config.hop_delay(), expected);
}

// ══════════════════════════════════════════════════════════
// 3. JSON deserialization
// ══════════════════════════════════════════════════════════

#[test]
fn json_overrides_and_defaults_compose() {
    let json = r#"{
        "topology": { "k": 8 },
        "network": { "subnets": 2, "num_vcs": 8 },
        "traffic": { "priority": "network_age", "classes": 2 },
        "sim": { "deadlock_warn_timeout": 100, "sim_type": "throughput" }
    }"#;
    let config: Config = serde_json::from_str(json).unwrap();
    config.validate().unwrap();
    assert_eq!(config.topology.k, 8);
    assert_eq!(config.network.subnets, 2);
    assert_eq!(config.network.vc_buf_size, 8); // default survives
    assert_eq!(config.traffic.priority, PriorityMode::NetworkAge);
    assert_eq!(config.sim.deadlock_warn_timeout, 100);
    assert_eq!(config.sim.sim_type, SimType::Throughput);
}

#[test]
fn unknown_priority_name_fails_deserialization() {
    let json = r#"{ "traffic": { "priority": "fifo" } }"#;
    assert!(serde_json::from_str::<Config>(json).is_err());
}

#[test]
fn per_class_vectors_extend_with_last_entry() {
    let json = r#"{
        "traffic": {
            "classes": 3,
            "class_priority": [5, 7],
            "injection_rate": [0.25]
        }
    }"#;
    let config: Config = serde_json::from_str(json).unwrap();
    assert_eq!(config.traffic.class_priority_for(0), 5);
    assert_eq!(config.traffic.class_priority_for(1), 7);
    assert_eq!(config.traffic.class_priority_for(2), 7);
    assert_eq!(config.traffic.injection_rate_for(2), 0.25);
}

// ══════════════════════════════════════════════════════════
// 4. Fail-fast validation
// ══════════════════════════════════════════════════════════

#[test]
fn zero_subnets_is_invalid() {
    let mut config = Config::default();
    config.network.subnets = 0;
    assert!(matches!(
        config.validate(),
        Err(NocError::InvalidConfig(_))
    ));
}

#[test]
fn typed_subnet_out_of_range_is_invalid() {
    let mut config = Config::default();
    config.traffic.write_reply_subnet = 3;
    assert!(matches!(
        config.validate(),
        Err(NocError::InvalidConfig(_))
    ));
}

#[test]
fn noq_without_lookahead_routing_is_invalid() {
    let mut config = Config::default();
    config.sim.noq = true;
    config.timing.routing_delay = 2;
    assert!(matches!(
        config.validate(),
        Err(NocError::InvalidConfig(_))
    ));
}

#[test]
fn unknown_routing_function_fails_construction() {
    let mut config = Config::default();
    config.topology.routing_function = "valiant".into();
    assert!(matches!(
        NocInterface::new(config),
        Err(NocError::InvalidConfig(_))
    ));
}
