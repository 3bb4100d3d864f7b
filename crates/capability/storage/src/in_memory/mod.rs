//! 内存存储实现模块
//!
//! 仅用于本地演示和测试。所有接口共享一份 `RwLock` 保护的状态，
//! 事务在提交时一次性写入。

pub mod device;
pub mod location;
pub mod log;
pub mod rule;
pub mod transaction;

use crate::error::StorageError;
use crate::models::{
    ActuatorLogRecord, DeviceRecord, FloorRecord, MonitoringRecord, RoomRecord, RuleLogRecord,
    RuleRecord,
};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use transaction::InMemoryTransaction;

#[derive(Debug, Default)]
pub(crate) struct MemoryState {
    pub(crate) devices: BTreeMap<String, DeviceRecord>,
    pub(crate) rules: Vec<RuleRecord>,
    pub(crate) rule_logs: Vec<RuleLogRecord>,
    pub(crate) actuator_logs: Vec<ActuatorLogRecord>,
    pub(crate) monitoring: Vec<MonitoringRecord>,
    pub(crate) floors: BTreeMap<i64, FloorRecord>,
    pub(crate) rooms: BTreeMap<i64, RoomRecord>,
    last_id: i64,
}

impl MemoryState {
    pub(crate) fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// 内存存储
///
/// 实现全部存储接口；克隆后共享同一份数据。
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, StorageError> {
        self.state
            .read()
            .map_err(|_| StorageError::new("lock failed"))
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, StorageError> {
        self.state
            .write()
            .map_err(|_| StorageError::new("lock failed"))
    }
}
