//! Postgres 设备存储实现

use super::{DEVICE_COLUMNS, PgStore, device_from_row};
use crate::error::StorageError;
use crate::models::{DeviceFilter, DeviceRecord, DeviceUpdate};
use crate::traits::DeviceStore;
use domain::ConnectivityStatus;

#[async_trait::async_trait]
impl DeviceStore for PgStore {
    async fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>, StorageError> {
        let sql = format!(
            "select {DEVICE_COLUMNS} from registrations \
             where ($1::text is null or type = $1) \
             and ($2::bigint is null or room_id = $2) \
             and ($3::bigint is null or room_id in (select id from rooms where floor_id = $3)) \
             order by id"
        );
        let rows = sqlx::query(&sql)
            .bind(filter.device_type.map(|device_type| device_type.as_str()))
            .bind(filter.room_id)
            .bind(filter.floor_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(device_from_row).collect()
    }

    async fn find_device(&self, guid: &str) -> Result<Option<DeviceRecord>, StorageError> {
        let sql = format!("select {DEVICE_COLUMNS} from registrations where guid = $1");
        let row = sqlx::query(&sql)
            .bind(guid)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(device_from_row).transpose()
    }

    async fn create_device(&self, record: DeviceRecord) -> Result<DeviceRecord, StorageError> {
        let sql = format!(
            "insert into registrations \
             (guid, mac, type, quantity, name, version, minor, status, status_device, \
              last_seen, created_at, updated_at, room_id) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             returning {DEVICE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&record.guid)
            .bind(&record.mac)
            .bind(record.device_type.as_str())
            .bind(record.quantity)
            .bind(&record.name)
            .bind(&record.version)
            .bind(&record.minor)
            .bind(&record.status)
            .bind(record.status_device.as_str())
            .bind(record.last_seen_ms)
            .bind(record.created_at_ms)
            .bind(record.updated_at_ms)
            .bind(record.room_id)
            .fetch_one(&self.pool)
            .await?;
        device_from_row(&row)
    }

    async fn update_device(
        &self,
        guid: &str,
        update: DeviceUpdate,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        let sql = format!(
            "update registrations set mac = $2, type = $3, quantity = $4, name = $5, \
             version = $6, minor = $7, room_id = $8, updated_at = $9 \
             where guid = $1 returning {DEVICE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(guid)
            .bind(&update.mac)
            .bind(update.device_type.as_str())
            .bind(update.quantity)
            .bind(&update.name)
            .bind(&update.version)
            .bind(&update.minor)
            .bind(update.room_id)
            .bind(update.updated_at_ms)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(device_from_row).transpose()
    }

    async fn update_device_status(
        &self,
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
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(device_from_row).transpose()
    }

    async fn touch_device(
        &self,
        guid: &str,
        status: &str,
        seen_at_ms: i64,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        let sql = format!(
            "update registrations set status = $2, status_device = $3, last_seen = $4, updated_at = $4 \
             where guid = $1 returning {DEVICE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(guid)
            .bind(status)
            .bind(ConnectivityStatus::On.as_str())
            .bind(seen_at_ms)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(device_from_row).transpose()
    }

    async fn mark_inactive(&self, cutoff_ms: i64, updated_at_ms: i64) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "update registrations set status_device = $1, updated_at = $2 \
             where status_device = $3 and last_seen < $4",
        )
        .bind(ConnectivityStatus::Off.as_str())
        .bind(updated_at_ms)
        .bind(ConnectivityStatus::On.as_str())
        .bind(cutoff_ms)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
