//! # 网关存储模块
//!
//! 关系型存储拥有全部状态（设备、规则、日志、位置），引擎本身不做缓存。
//!
//! ## 结构
//!
//! - [`models`]：存储记录（时间字段为 Unix 毫秒）
//! - [`traits`]：按资源划分的异步存储接口 + 事务接口
//! - [`error`]：统一的 `StorageError`
//! - [`connection`]：连接池与表结构初始化
//! - [`in_memory`]：`RwLock` 内存实现（测试与本地演示）
//! - [`postgres`]：sqlx 实现（生产环境）
//!
//! ## 事务
//!
//! 执行器控制、监测写入、设备删除（含规则级联）通过
//! [`TransactionalStore::begin`] 获取 [`StoreTransaction`]，提交前的写入对外不可见，
//! 丢弃未提交的事务等同回滚。

pub mod connection;
pub mod error;
pub mod in_memory;
pub mod models;
pub mod postgres;
pub mod traits;

pub use connection::*;
pub use error::*;
pub use models::*;
pub use traits::*;

pub use in_memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PgStore, PgTransaction};
