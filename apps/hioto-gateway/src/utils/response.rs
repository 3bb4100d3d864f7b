//! HTTP 响应辅助函数和 DTO 转换
//!
//! - 错误响应：bad_request_error, not_found_error, storage_error, control_error, rule_error
//! - DTO 转换：rule_to_dto, floor_to_dto, room_to_dto（设备转换复用 `hioto_sync::device_to_dto`）
//!
//! 所有错误返回统一的 ApiResponse 格式，HTTP 状态码与错误码对应。

use api_contract::{ApiResponse, FloorDto, RoomDto, RuleDto};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hioto_control::ControlError;
use hioto_rules::RuleError;
use hioto_storage::{FloorRecord, RoomRecord, RuleRecord, StorageError};
use serde::Serialize;

/// 成功响应
pub fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("INVALID.REQUEST", message.into())),
    )
        .into_response()
}

/// 资源未找到错误响应
pub fn not_found_error(message: impl Into<String>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::<()>::error("RESOURCE.NOT_FOUND", message.into())),
    )
        .into_response()
}

fn foreign_origin_error(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse::<()>::error("ORIGIN.FOREIGN", message.into())),
    )
        .into_response()
}

fn internal_error(message: impl Into<String>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::error("INTERNAL.ERROR", message.into())),
    )
        .into_response()
}

/// 存储错误响应
pub fn storage_error(err: StorageError) -> Response {
    internal_error(err.to_string())
}

/// 规则错误响应
pub fn rule_error(err: RuleError) -> Response {
    match err {
        RuleError::Validation(message) => bad_request_error(message),
        RuleError::NotFound(message) => not_found_error(message),
        RuleError::Storage(message) => internal_error(message),
    }
}

/// 控制/设备错误响应
pub fn control_error(err: ControlError) -> Response {
    match err {
        ControlError::Validation(message) => bad_request_error(message),
        ControlError::NotFound(message) => not_found_error(message),
        ControlError::ForeignOrigin(message) => foreign_origin_error(message),
        ControlError::Storage(message) => internal_error(message),
        ControlError::Rule(err) => rule_error(err),
    }
}

/// RuleRecord 转 RuleDto
pub fn rule_to_dto(record: RuleRecord, node_identity: &str) -> RuleDto {
    RuleDto {
        mac_server: node_identity.to_string(),
        input_guid: record.input_guid,
        input_value: record.input_value,
        output_guid: record.output_guid,
        output_value: record.output_value,
        created_at: record.created_at_ms,
        updated_at: record.updated_at_ms,
    }
}

/// FloorRecord 转 FloorDto
pub fn floor_to_dto(record: FloorRecord) -> FloorDto {
    FloorDto {
        id: record.id,
        name: record.name,
        created_at: record.created_at_ms,
        updated_at: record.updated_at_ms,
    }
}

/// RoomRecord 转 RoomDto
pub fn room_to_dto(record: RoomRecord) -> RoomDto {
    RoomDto {
        id: record.id,
        name: record.name,
        floor_id: record.floor_id,
        created_at: record.created_at_ms,
        updated_at: record.updated_at_ms,
    }
}
