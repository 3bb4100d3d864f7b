//! 本地控制 handler
//!
//! - POST /api/control - `{type, message: "guid#value"}`，不校验节点标识

use crate::AppState;
use crate::utils::response::{control_error, ok};
use api_contract::{ControlDto, RuleEvaluationDto};
use axum::{
    Json,
    extract::State,
    response::Response,
};
use hioto_control::ControlOutcome;
use hioto_sync::device_to_dto;

pub async fn control_device(
    State(state): State<AppState>,
    Json(req): Json<ControlDto>,
) -> Response {
    match state.control.control_local(&req).await {
        Ok(ControlOutcome::Actuated(device)) => ok(device_to_dto(&device)),
        Ok(ControlOutcome::Evaluated { reading, report }) => ok(RuleEvaluationDto {
            sensor_guid: reading.guid,
            value: reading.value,
            matched: report.matched,
            applied: report.applied,
            skipped: report.skipped,
        }),
        Err(err) => control_error(err),
    }
}
