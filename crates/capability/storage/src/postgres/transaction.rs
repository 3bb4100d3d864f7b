//! Postgres 事务实现

use super::{DEVICE_COLUMNS, PgStore, device_from_row};
use crate::error::StorageError;
use crate::models::{ActuatorLogRecord, DeviceRecord, MonitoringRecord};
use crate::traits::{StoreTransaction, TransactionalStore};
use sqlx::{Postgres, Transaction};

/// Postgres 事务句柄（丢弃未提交的事务即回滚）。
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait::async_trait]
impl TransactionalStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StorageError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

#[async_trait::async_trait]
impl StoreTransaction for PgTransaction {
    async fn find_device(&mut self, guid: &str) -> Result<Option<DeviceRecord>, StorageError> {
        let sql = format!("select {DEVICE_COLUMNS} from registrations where guid = $1 for update");
        let row = sqlx::query(&sql)
            .bind(guid)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(device_from_row).transpose()
    }

    async fn update_device_status(
        &mut self,
        guid: &str,
        status: &str,
        updated_at_ms: i64,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        let sql = format!(
            "update registrations set status = $2, updated_at = $3 \
             where guid = $1 returning {DEVICE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(guid)
            .bind(status)
            .bind(updated_at_ms)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(device_from_row).transpose()
    }

    async fn create_actuator_log(&mut self, record: ActuatorLogRecord) -> Result<(), StorageError> {
        sqlx::query("insert into log_aktuators (guid, name, value, time) values ($1, $2, $3, $4)")
            .bind(&record.guid)
            .bind(&record.name)
            .bind(&record.value)
            .bind(record.time_ms)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn create_monitoring(&mut self, record: MonitoringRecord) -> Result<(), StorageError> {
        sqlx::query(
            "insert into monitoring_histories (device_guid, device_name, device_type, value, time) \
             values ($1, $2, $3, $4, $5)",
        )
        .bind(&record.device_guid)
        .bind(&record.device_name)
        .bind(record.device_type.as_str())
        .bind(&record.value)
        .bind(record.time_ms)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_device(&mut self, guid: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("delete from registrations where guid = $1")
            .bind(guid)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_rules_by_input(&mut self, input_guid: &str) -> Result<u64, StorageError> {
        let result = sqlx::query("delete from rule_devices where input_guid = $1")
            .bind(input_guid)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_rules_by_output(&mut self, output_guid: &str) -> Result<u64, StorageError> {
        let result = sqlx::query("delete from rule_devices where output_guid = $1")
            .bind(output_guid)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let PgTransaction { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        let PgTransaction { tx } = *self;
        tx.rollback().await?;
        Ok(())
    }
}
