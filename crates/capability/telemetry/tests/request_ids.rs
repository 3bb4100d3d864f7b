use hioto_telemetry::{metrics, new_request_ids, record_rules_generated};

#[test]
fn request_ids_are_distinct() {
    let first = new_request_ids();
    let second = new_request_ids();
    assert!(!first.request_id.is_empty());
    assert!(!first.trace_id.is_empty());
    assert_ne!(first.request_id, second.request_id);
}

#[test]
fn rules_generated_counter_accumulates() {
    let before = metrics().snapshot().rules_generated;
    record_rules_generated(8);
    let after = metrics().snapshot().rules_generated;
    assert!(after >= before + 8);
}
