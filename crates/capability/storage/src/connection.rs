//! 数据库连接与表结构初始化
//!
//! - connect_pool：建立 Postgres 连接池（最大连接数 8）
//! - ensure_schema：按需创建网关所需的表

use crate::error::StorageError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// 建立 Postgres 连接池
pub async fn connect_pool(database_url: &str) -> Result<PgPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(database_url)
        .await?;
    Ok(pool)
}

const SCHEMA: &[&str] = &[
    "create table if not exists floors (\
        id bigserial primary key, \
        name text not null, \
        created_at bigint not null, \
        updated_at bigint not null)",
    "create table if not exists rooms (\
        id bigserial primary key, \
        name text not null, \
        floor_id bigint not null references floors(id) on delete cascade, \
        created_at bigint not null, \
        updated_at bigint not null)",
    "create table if not exists registrations (\
        id bigserial primary key, \
        guid text not null unique, \
        mac text not null, \
        type text not null, \
        quantity integer not null, \
        name text not null, \
        version text not null, \
        minor text not null, \
        status text not null default '', \
        status_device text not null default 'on', \
        last_seen bigint not null, \
        created_at bigint not null, \
        updated_at bigint not null, \
        room_id bigint references rooms(id) on delete set null)",
    "create table if not exists rule_devices (\
        id bigserial primary key, \
        input_guid text not null, \
        input_value text not null, \
        output_guid text not null, \
        output_value text not null, \
        created_at bigint not null, \
        updated_at bigint not null)",
    "create index if not exists idx_rule_devices_input on rule_devices (input_guid, input_value)",
    "create index if not exists idx_rule_devices_output on rule_devices (output_guid)",
    "create table if not exists logs (\
        id bigserial primary key, \
        input_guid text not null, \
        input_name text not null, \
        input_value text not null, \
        output_guid text not null, \
        output_value text not null, \
        time bigint not null)",
    "create table if not exists log_aktuators (\
        id bigserial primary key, \
        guid text not null, \
        name text not null, \
        value text not null, \
        time bigint not null)",
    "create table if not exists monitoring_histories (\
        id bigserial primary key, \
        device_guid text not null, \
        device_name text not null, \
        device_type text not null, \
        value text not null, \
        time bigint not null)",
];

/// 创建缺失的表与索引（幂等）。
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StorageError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
