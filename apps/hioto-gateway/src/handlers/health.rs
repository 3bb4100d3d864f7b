//! 健康检查与计数器快照。
//!
//! - GET /health

use crate::AppState;
use crate::utils::response::ok;
use api_contract::{HealthDto, MetricsSnapshotDto};
use axum::{extract::State, response::Response};
use hioto_telemetry::metrics;

pub async fn health(State(state): State<AppState>) -> Response {
    let snapshot = metrics().snapshot();
    ok(HealthDto {
        ok: true,
        node: state.node_identity().to_string(),
        metrics: MetricsSnapshotDto {
            messages_received: snapshot.messages_received,
            messages_dropped: snapshot.messages_dropped,
            rules_generated: snapshot.rules_generated,
            rule_evaluations: snapshot.rule_evaluations,
            rule_rows_applied: snapshot.rule_rows_applied,
            rule_rows_skipped: snapshot.rule_rows_skipped,
            actuator_commands: snapshot.actuator_commands,
            publish_success: snapshot.publish_success,
            publish_failure: snapshot.publish_failure,
        },
    })
}
