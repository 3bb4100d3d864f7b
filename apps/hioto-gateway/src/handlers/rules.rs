//! 规则 handlers
//!
//! - POST /api/rules - 生成规则（1..=8 个执行器）
//! - GET /api/rules/:guid - 该设备作为输入或输出的规则
//! - DELETE /api/rules/sensor/:guid - 删除传感器的全部规则

use crate::AppState;
use crate::utils::response::{bad_request_error, ok, rule_error, rule_to_dto};
use api_contract::{CreateRuleDto, RuleDto};
use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};

pub async fn create_rules(
    State(state): State<AppState>,
    Json(req): Json<CreateRuleDto>,
) -> Response {
    if let Err(err) = req.validate() {
        return bad_request_error(err.to_string());
    }
    match state.rules.create_rules(&req.input_guid, &req.output_guid).await {
        Ok(rows) => ok(to_dtos(&state, rows)),
        Err(err) => rule_error(err),
    }
}

pub async fn get_rules(State(state): State<AppState>, Path(guid): Path<String>) -> Response {
    match state.rules.rules_for_device(&guid).await {
        Ok(rows) => ok(to_dtos(&state, rows)),
        Err(err) => rule_error(err),
    }
}

pub async fn delete_sensor_rules(
    State(state): State<AppState>,
    Path(guid): Path<String>,
) -> Response {
    match state.rules.delete_rules_for_sensor(&guid).await {
        Ok(deleted) => ok(serde_json::json!({ "guid": guid, "deleted": deleted })),
        Err(err) => rule_error(err),
    }
}

fn to_dtos(state: &AppState, rows: Vec<hioto_storage::RuleRecord>) -> Vec<RuleDto> {
    rows.into_iter()
        .map(|row| rule_to_dto(row, state.node_identity()))
        .collect()
}
