//! Postgres 日志存储实现

use super::PgStore;
use crate::error::StorageError;
use crate::models::{ActuatorLogRecord, MonitoringRecord, RuleLogRecord};
use crate::traits::LogStore;
use domain::DeviceType;
use sqlx::Row;

#[async_trait::async_trait]
impl LogStore for PgStore {
    async fn create_rule_log(&self, record: RuleLogRecord) -> Result<RuleLogRecord, StorageError> {
        let row = sqlx::query(
            "insert into logs (input_guid, input_name, input_value, output_guid, output_value, time) \
             values ($1, $2, $3, $4, $5, $6) returning id",
        )
        .bind(&record.input_guid)
        .bind(&record.input_name)
        .bind(&record.input_value)
        .bind(&record.output_guid)
        .bind(&record.output_value)
        .bind(record.time_ms)
        .fetch_one(&self.pool)
        .await?;
        Ok(RuleLogRecord {
            id: row.try_get("id")?,
            ..record
        })
    }

    async fn list_rule_logs(&self) -> Result<Vec<RuleLogRecord>, StorageError> {
        let rows = sqlx::query(
            "select id, input_guid, input_name, input_value, output_guid, output_value, time \
             from logs order by id",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(RuleLogRecord {
                id: row.try_get("id")?,
                input_guid: row.try_get("input_guid")?,
                input_name: row.try_get("input_name")?,
                input_value: row.try_get("input_value")?,
                output_guid: row.try_get("output_guid")?,
                output_value: row.try_get("output_value")?,
                time_ms: row.try_get("time")?,
            });
        }
        Ok(items)
    }

    async fn delete_rule_logs_through(&self, max_id: i64) -> Result<u64, StorageError> {
        let result = sqlx::query("delete from logs where id <= $1")
            .bind(max_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_actuator_logs(&self) -> Result<Vec<ActuatorLogRecord>, StorageError> {
        let rows = sqlx::query("select id, guid, name, value, time from log_aktuators order by id")
            .fetch_all(&self.pool)
            .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(ActuatorLogRecord {
                id: row.try_get("id")?,
                guid: row.try_get("guid")?,
                name: row.try_get("name")?,
                value: row.try_get("value")?,
                time_ms: row.try_get("time")?,
            });
        }
        Ok(items)
    }

    async fn delete_actuator_logs_through(&self, max_id: i64) -> Result<u64, StorageError> {
        let result = sqlx::query("delete from log_aktuators where id <= $1")
            .bind(max_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn list_monitoring(&self) -> Result<Vec<MonitoringRecord>, StorageError> {
        let rows = sqlx::query(
            "select id, device_guid, device_name, device_type, value, time \
             from monitoring_histories order by id",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let device_type: String = row.try_get("device_type")?;
            items.push(MonitoringRecord {
                id: row.try_get("id")?,
                device_guid: row.try_get("device_guid")?,
                device_name: row.try_get("device_name")?,
                device_type: device_type.parse::<DeviceType>()?,
                value: row.try_get("value")?,
                time_ms: row.try_get("time")?,
            });
        }
        Ok(items)
    }

    async fn delete_monitoring_through(&self, max_id: i64) -> Result<u64, StorageError> {
        let result = sqlx::query("delete from monitoring_histories where id <= $1")
            .bind(max_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
