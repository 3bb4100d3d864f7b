//! 数据模型
//!
//! - 设备：DeviceRecord, DeviceUpdate, DeviceFilter
//! - 规则：RuleRecord
//! - 日志：RuleLogRecord, ActuatorLogRecord, MonitoringRecord
//! - 位置：FloorRecord, RoomRecord
//!
//! 时间字段统一为 Unix 毫秒；`id` 由存储分配，写入时忽略传入值。

use domain::{ConnectivityStatus, DeviceType};

/// 设备注册记录（表 `registrations`），以 guid 唯一定位。
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub id: i64,
    pub guid: String,
    pub mac: String,
    pub device_type: DeviceType,
    pub quantity: i32,
    pub name: String,
    pub version: String,
    pub minor: String,
    /// 最近一次写入的值（执行器为开关量 "0"/"1"）。
    pub status: String,
    pub status_device: ConnectivityStatus,
    pub last_seen_ms: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
    pub room_id: Option<i64>,
}

/// 设备更新输入（整体替换可编辑字段）。
#[derive(Debug, Clone)]
pub struct DeviceUpdate {
    pub mac: String,
    pub device_type: DeviceType,
    pub quantity: i32,
    pub name: String,
    pub version: String,
    pub minor: String,
    pub room_id: Option<i64>,
    pub updated_at_ms: i64,
}

/// 设备列表过滤条件。
#[derive(Debug, Clone, Default)]
pub struct DeviceFilter {
    pub device_type: Option<DeviceType>,
    pub room_id: Option<i64>,
    pub floor_id: Option<i64>,
}

/// 规则行（表 `rule_devices`）：一个传感器模式对应一个执行器输出。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRecord {
    pub id: i64,
    pub input_guid: String,
    pub input_value: String,
    pub output_guid: String,
    pub output_value: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// 规则触发日志（表 `logs`）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleLogRecord {
    pub id: i64,
    pub input_guid: String,
    pub input_name: String,
    pub input_value: String,
    pub output_guid: String,
    pub output_value: String,
    pub time_ms: i64,
}

/// 执行器直接控制日志（表 `log_aktuators`）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuatorLogRecord {
    pub id: i64,
    pub guid: String,
    pub name: String,
    pub value: String,
    pub time_ms: i64,
}

/// 监测历史（表 `monitoring_histories`）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringRecord {
    pub id: i64,
    pub device_guid: String,
    pub device_name: String,
    pub device_type: DeviceType,
    pub value: String,
    pub time_ms: i64,
}

/// 楼层记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloorRecord {
    pub id: i64,
    pub name: String,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// 房间记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRecord {
    pub id: i64,
    pub name: String,
    pub floor_id: i64,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}
