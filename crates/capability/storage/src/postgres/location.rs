//! Postgres 楼层与房间存储实现

use super::PgStore;
use crate::error::StorageError;
use crate::models::{FloorRecord, RoomRecord};
use crate::traits::LocationStore;
use sqlx::Row;
use sqlx::postgres::PgRow;

fn floor_from_row(row: &PgRow) -> Result<FloorRecord, StorageError> {
    Ok(FloorRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        created_at_ms: row.try_get("created_at")?,
        updated_at_ms: row.try_get("updated_at")?,
    })
}

fn room_from_row(row: &PgRow) -> Result<RoomRecord, StorageError> {
    Ok(RoomRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        floor_id: row.try_get("floor_id")?,
        created_at_ms: row.try_get("created_at")?,
        updated_at_ms: row.try_get("updated_at")?,
    })
}

#[async_trait::async_trait]
impl LocationStore for PgStore {
    async fn list_floors(&self) -> Result<Vec<FloorRecord>, StorageError> {
        let rows = sqlx::query("select id, name, created_at, updated_at from floors order by id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(floor_from_row).collect()
    }

    async fn find_floor(&self, id: i64) -> Result<Option<FloorRecord>, StorageError> {
        let row = sqlx::query("select id, name, created_at, updated_at from floors where id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(floor_from_row).transpose()
    }

    async fn create_floor(&self, record: FloorRecord) -> Result<FloorRecord, StorageError> {
        let row = sqlx::query(
            "insert into floors (name, created_at, updated_at) values ($1, $2, $3) \
             returning id, name, created_at, updated_at",
        )
        .bind(&record.name)
        .bind(record.created_at_ms)
        .bind(record.updated_at_ms)
        .fetch_one(&self.pool)
        .await?;
        floor_from_row(&row)
    }

    async fn delete_floor(&self, id: i64) -> Result<bool, StorageError> {
        let result = sqlx::query("delete from floors where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_rooms(&self, floor_id: Option<i64>) -> Result<Vec<RoomRecord>, StorageError> {
        let rows = sqlx::query(
            "select id, name, floor_id, created_at, updated_at from rooms \
             where ($1::bigint is null or floor_id = $1) order by id",
        )
        .bind(floor_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(room_from_row).collect()
    }

    async fn find_room(&self, id: i64) -> Result<Option<RoomRecord>, StorageError> {
        let row = sqlx::query(
            "select id, name, floor_id, created_at, updated_at from rooms where id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(room_from_row).transpose()
    }

    async fn create_room(&self, record: RoomRecord) -> Result<RoomRecord, StorageError> {
        let row = sqlx::query(
            "insert into rooms (name, floor_id, created_at, updated_at) values ($1, $2, $3, $4) \
             returning id, name, floor_id, created_at, updated_at",
        )
        .bind(&record.name)
        .bind(record.floor_id)
        .bind(record.created_at_ms)
        .bind(record.updated_at_ms)
        .fetch_one(&self.pool)
        .await?;
        room_from_row(&row)
    }

    async fn delete_room(&self, id: i64) -> Result<bool, StorageError> {
        let result = sqlx::query("delete from rooms where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
