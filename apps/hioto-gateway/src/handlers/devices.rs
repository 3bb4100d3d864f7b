//! 设备 handlers
//!
//! - GET /api/devices?type=&room_id=&floor_id= - 列出设备
//! - POST /api/devices - 本地注册（成功后上报云端）
//! - GET /api/devices/:guid - 设备详情
//! - PUT /api/devices/:guid - 更新设备（成功后上报云端）
//! - DELETE /api/devices/:guid - 删除设备并级联规则

use crate::AppState;
use crate::utils::response::{bad_request_error, control_error, ok};
use api_contract::{DeviceDto, RegistrationDto, UpdateDeviceDto};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::Response,
};
use domain::DeviceType;
use hioto_storage::DeviceFilter;
use hioto_sync::device_to_dto;

#[derive(Debug, Default, serde::Deserialize)]
pub struct DeviceQuery {
    #[serde(rename = "type")]
    device_type: Option<String>,
    room_id: Option<i64>,
    floor_id: Option<i64>,
}

pub async fn list_devices(
    State(state): State<AppState>,
    Query(query): Query<DeviceQuery>,
) -> Response {
    let device_type = match query.device_type.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(value) => match value.parse::<DeviceType>() {
            Ok(device_type) => Some(device_type),
            Err(err) => return bad_request_error(err.to_string()),
        },
    };
    let filter = DeviceFilter {
        device_type,
        room_id: query.room_id,
        floor_id: query.floor_id,
    };
    match state.devices.list(&filter).await {
        Ok(items) => {
            let data: Vec<DeviceDto> = items.iter().map(device_to_dto).collect();
            ok(data)
        }
        Err(err) => control_error(err),
    }
}

pub async fn create_device(
    State(state): State<AppState>,
    Json(req): Json<RegistrationDto>,
) -> Response {
    match state.devices.register_local(&req).await {
        Ok(device) => ok(device_to_dto(&device)),
        Err(err) => control_error(err),
    }
}

pub async fn get_device(State(state): State<AppState>, Path(guid): Path<String>) -> Response {
    match state.devices.get(&guid).await {
        Ok(device) => ok(device_to_dto(&device)),
        Err(err) => control_error(err),
    }
}

/// 更新设备：路径中的 guid 优先于请求体。
pub async fn update_device(
    State(state): State<AppState>,
    Path(guid): Path<String>,
    Json(mut req): Json<UpdateDeviceDto>,
) -> Response {
    req.guid = guid;
    match state.devices.update(&req).await {
        Ok(device) => ok(device_to_dto(&device)),
        Err(err) => control_error(err),
    }
}

pub async fn delete_device(State(state): State<AppState>, Path(guid): Path<String>) -> Response {
    match state.devices.delete(&guid).await {
        Ok(removal) => ok(serde_json::json!({
            "guid": removal.device.guid,
            "rules_removed": removal.rules_removed,
        })),
        Err(err) => control_error(err),
    }
}
