//! 稳定的 DTO 与 API 响应契约。
//!
//! 消息体字段名与设备固件、云端服务保持一致（snake_case，`type` 字段）。
//! 云端下发的消息携带 `mac_server`，用于判定是否属于本网关。

use domain::{ConnectivityStatus, DeviceType};
use serde::{Deserialize, Serialize};

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 字段校验错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field} {reason}")]
pub struct FieldError {
    pub field: &'static str,
    pub reason: &'static str,
}

fn require(value: &str, field: &'static str) -> Result<(), FieldError> {
    if value.trim().is_empty() {
        return Err(FieldError {
            field,
            reason: "required",
        });
    }
    Ok(())
}

// ============================================================================
// 设备注册 / 更新 / 删除
// ============================================================================

/// 设备注册消息（本地队列或 REST）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationDto {
    pub guid: String,
    pub mac: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub quantity: i32,
    pub name: String,
    pub version: String,
    pub minor: String,
    #[serde(default)]
    pub room_id: Option<i64>,
}

impl RegistrationDto {
    pub fn validate(&self) -> Result<(), FieldError> {
        require(&self.guid, "guid")?;
        require(&self.mac, "mac")?;
        require(&self.name, "name")?;
        require(&self.version, "version")?;
        require(&self.minor, "minor")?;
        if self.quantity < 1 {
            return Err(FieldError {
                field: "quantity",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

/// 云端下发的设备注册消息。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudRegistrationDto {
    #[serde(flatten)]
    pub registration: RegistrationDto,
    pub mac_server: String,
}

/// 设备更新消息（REST 或云端）。
///
/// 字段与注册一致，按 guid 定位设备。
pub type UpdateDeviceDto = RegistrationDto;

/// 云端下发的设备更新消息。
pub type CloudUpdateDeviceDto = CloudRegistrationDto;

/// 云端下发的设备删除消息。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteDeviceDto {
    pub guid: String,
    #[serde(default)]
    pub mac_server: Option<String>,
}

/// 设备删除后上报云端的通知。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteNoticeDto {
    pub guid: String,
    pub mac_server: String,
}

/// 设备详情（REST 返回与云端快照共用）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDto {
    pub id: i64,
    pub guid: String,
    pub mac: String,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub quantity: i32,
    pub name: String,
    pub version: String,
    pub minor: String,
    pub status: String,
    pub status_device: ConnectivityStatus,
    pub last_seen: i64,
    pub created_at: i64,
    pub updated_at: i64,
    pub room_id: Option<i64>,
}

/// 上报云端的设备快照。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSnapshotDto {
    #[serde(flatten)]
    pub device: DeviceDto,
    pub mac_server: String,
}

// ============================================================================
// 规则
// ============================================================================

/// 规则创建请求：一个传感器 + 1..8 个执行器（顺序即位序）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRuleDto {
    pub input_guid: String,
    pub output_guid: Vec<String>,
}

impl CreateRuleDto {
    pub fn validate(&self) -> Result<(), FieldError> {
        require(&self.input_guid, "input_guid")?;
        if self.output_guid.iter().any(|guid| guid.trim().is_empty()) {
            return Err(FieldError {
                field: "output_guid",
                reason: "must not contain empty guid",
            });
        }
        Ok(())
    }
}

/// 规则行（REST 返回与云端批量上报共用）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDto {
    pub mac_server: String,
    pub input_guid: String,
    pub input_value: String,
    pub output_guid: String,
    pub output_value: String,
    pub created_at: i64,
    pub updated_at: i64,
}

// ============================================================================
// 控制
// ============================================================================

/// 控制消息：`message` 为 `guid#value`。
///
/// 本地（REST/本地队列）不带 `mac_server`；云端下发必须携带。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlDto {
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub message: String,
    #[serde(default)]
    pub mac_server: Option<String>,
}

// ============================================================================
// 日志批量上报
// ============================================================================

/// 规则触发日志。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleLogDto {
    pub id: i64,
    pub input_guid: String,
    pub input_name: String,
    pub input_value: String,
    pub output_guid: String,
    pub output_value: String,
    pub time: i64,
    pub mac_server: String,
}

/// 执行器直接控制日志。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActuatorLogDto {
    pub id: i64,
    pub guid: String,
    pub name: String,
    pub value: String,
    pub time: i64,
    pub mac_server: String,
}

/// 监测历史。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringDto {
    pub id: i64,
    pub device_guid: String,
    pub device_name: String,
    pub device_type: DeviceType,
    pub value: String,
    pub time: i64,
    pub mac_server: String,
}

// ============================================================================
// 楼层 / 房间
// ============================================================================

/// 楼层创建请求体。
#[derive(Debug, Deserialize)]
pub struct CreateFloorRequest {
    pub name: String,
}

/// 房间创建请求体。
#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub floor_id: i64,
}

/// 楼层返回结构。
#[derive(Debug, Serialize)]
pub struct FloorDto {
    pub id: i64,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// 房间返回结构。
#[derive(Debug, Serialize)]
pub struct RoomDto {
    pub id: i64,
    pub name: String,
    pub floor_id: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

// ============================================================================
// 控制结果 / 运行状态
// ============================================================================

/// 传感器控制触发规则求值后的统计。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEvaluationDto {
    pub sensor_guid: String,
    pub value: String,
    pub matched: usize,
    pub applied: usize,
    pub skipped: usize,
}

/// 进程计数器快照。
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshotDto {
    pub messages_received: u64,
    pub messages_dropped: u64,
    pub rules_generated: u64,
    pub rule_evaluations: u64,
    pub rule_rows_applied: u64,
    pub rule_rows_skipped: u64,
    pub actuator_commands: u64,
    pub publish_success: u64,
    pub publish_failure: u64,
}

/// 健康检查返回。
#[derive(Debug, Clone, Serialize)]
pub struct HealthDto {
    pub ok: bool,
    pub node: String,
    pub metrics: MetricsSnapshotDto,
}
