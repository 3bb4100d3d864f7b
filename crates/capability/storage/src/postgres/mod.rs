//! # PostgreSQL 存储实现模块
//!
//! `PgStore` 持有连接池并实现全部存储接口，生产环境使用。
//!
//! ## 依赖的表
//!
//! - `registrations`：设备注册表（guid 唯一）
//! - `rule_devices`：规则行（`(input_guid, input_value)` 索引）
//! - `logs` / `log_aktuators` / `monitoring_histories`：待上报日志
//! - `floors` / `rooms`：位置
//!
//! 表结构见 [`crate::connection::ensure_schema`]。时间列均为 Unix 毫秒（bigint）。
//!
//! ## 事务
//!
//! [`PgTransaction`] 包装 `sqlx::Transaction`，未提交即丢弃时由 sqlx 自动回滚。

pub mod device;
pub mod location;
pub mod log;
pub mod rule;
pub mod transaction;

use crate::error::StorageError;
use crate::models::{DeviceRecord, RuleRecord};
use domain::{ConnectivityStatus, DeviceType};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

pub use transaction::PgTransaction;

pub(crate) const DEVICE_COLUMNS: &str = "id, guid, mac, type, quantity, name, version, minor, \
     status, status_device, last_seen, created_at, updated_at, room_id";

pub(crate) const RULE_COLUMNS: &str =
    "id, input_guid, input_value, output_guid, output_value, created_at, updated_at";

/// Postgres 存储
#[derive(Clone)]
pub struct PgStore {
    pub pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

pub(crate) fn device_from_row(row: &PgRow) -> Result<DeviceRecord, StorageError> {
    let device_type: String = row.try_get("type")?;
    let status_device: String = row.try_get("status_device")?;
    Ok(DeviceRecord {
        id: row.try_get("id")?,
        guid: row.try_get("guid")?,
        mac: row.try_get("mac")?,
        device_type: device_type.parse::<DeviceType>()?,
        quantity: row.try_get("quantity")?,
        name: row.try_get("name")?,
        version: row.try_get("version")?,
        minor: row.try_get("minor")?,
        status: row.try_get("status")?,
        status_device: ConnectivityStatus::from_db(&status_device),
        last_seen_ms: row.try_get("last_seen")?,
        created_at_ms: row.try_get("created_at")?,
        updated_at_ms: row.try_get("updated_at")?,
        room_id: row.try_get("room_id")?,
    })
}

pub(crate) fn rule_from_row(row: &PgRow) -> Result<RuleRecord, StorageError> {
    Ok(RuleRecord {
        id: row.try_get("id")?,
        input_guid: row.try_get("input_guid")?,
        input_value: row.try_get("input_value")?,
        output_guid: row.try_get("output_guid")?,
        output_value: row.try_get("output_value")?,
        created_at_ms: row.try_get("created_at")?,
        updated_at_ms: row.try_get("updated_at")?,
    })
}
