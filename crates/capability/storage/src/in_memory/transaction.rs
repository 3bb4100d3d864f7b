//! 内存事务
//!
//! 写操作先暂存，提交时在一次写锁内按顺序应用；丢弃即回滚。

use super::InMemoryStore;
use crate::error::StorageError;
use crate::models::{ActuatorLogRecord, DeviceRecord, MonitoringRecord};
use crate::traits::{StoreTransaction, TransactionalStore};
use std::collections::HashMap;

#[derive(Debug)]
enum StagedOp {
    DeviceStatus {
        guid: String,
        status: String,
        updated_at_ms: i64,
    },
    ActuatorLog(ActuatorLogRecord),
    Monitoring(MonitoringRecord),
    DeleteDevice(String),
    DeleteRulesByInput(String),
    DeleteRulesByOutput(String),
}

/// 内存事务句柄
pub struct InMemoryTransaction {
    store: InMemoryStore,
    /// 本事务内可见的设备视图：`None` 表示已删除。
    devices: HashMap<String, Option<DeviceRecord>>,
    ops: Vec<StagedOp>,
}

impl InMemoryTransaction {
    fn current_device(&self, guid: &str) -> Result<Option<DeviceRecord>, StorageError> {
        if let Some(staged) = self.devices.get(guid) {
            return Ok(staged.clone());
        }
        Ok(self.store.read()?.devices.get(guid).cloned())
    }
}

#[async_trait::async_trait]
impl TransactionalStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StorageError> {
        Ok(Box::new(InMemoryTransaction {
            store: self.clone(),
            devices: HashMap::new(),
            ops: Vec::new(),
        }))
    }
}

#[async_trait::async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn find_device(&mut self, guid: &str) -> Result<Option<DeviceRecord>, StorageError> {
        self.current_device(guid)
    }

    async fn update_device_status(
        &mut self,
        guid: &str,
        status: &str,
        updated_at_ms: i64,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        let Some(mut device) = self.current_device(guid)? else {
            return Ok(None);
        };
        device.status = status.to_string();
        device.updated_at_ms = updated_at_ms;
        self.devices.insert(guid.to_string(), Some(device.clone()));
        self.ops.push(StagedOp::DeviceStatus {
            guid: guid.to_string(),
            status: status.to_string(),
            updated_at_ms,
        });
        Ok(Some(device))
    }

    async fn create_actuator_log(&mut self, record: ActuatorLogRecord) -> Result<(), StorageError> {
        self.ops.push(StagedOp::ActuatorLog(record));
        Ok(())
    }

    async fn create_monitoring(&mut self, record: MonitoringRecord) -> Result<(), StorageError> {
        self.ops.push(StagedOp::Monitoring(record));
        Ok(())
    }

    async fn delete_device(&mut self, guid: &str) -> Result<bool, StorageError> {
        if self.current_device(guid)?.is_none() {
            return Ok(false);
        }
        self.devices.insert(guid.to_string(), None);
        self.ops.push(StagedOp::DeleteDevice(guid.to_string()));
        Ok(true)
    }

    async fn delete_rules_by_input(&mut self, input_guid: &str) -> Result<u64, StorageError> {
        let count = self
            .store
            .read()?
            .rules
            .iter()
            .filter(|rule| rule.input_guid == input_guid)
            .count();
        self.ops.push(StagedOp::DeleteRulesByInput(input_guid.to_string()));
        Ok(count as u64)
    }

    async fn delete_rules_by_output(&mut self, output_guid: &str) -> Result<u64, StorageError> {
        let count = self
            .store
            .read()?
            .rules
            .iter()
            .filter(|rule| rule.output_guid == output_guid)
            .count();
        self.ops.push(StagedOp::DeleteRulesByOutput(output_guid.to_string()));
        Ok(count as u64)
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let InMemoryTransaction { store, ops, .. } = *self;
        let mut state = store.write()?;
        for op in ops {
            match op {
                StagedOp::DeviceStatus {
                    guid,
                    status,
                    updated_at_ms,
                } => {
                    if let Some(device) = state.devices.get_mut(&guid) {
                        device.status = status;
                        device.updated_at_ms = updated_at_ms;
                    }
                }
                StagedOp::ActuatorLog(mut record) => {
                    record.id = state.next_id();
                    state.actuator_logs.push(record);
                }
                StagedOp::Monitoring(mut record) => {
                    record.id = state.next_id();
                    state.monitoring.push(record);
                }
                StagedOp::DeleteDevice(guid) => {
                    state.devices.remove(&guid);
                }
                StagedOp::DeleteRulesByInput(guid) => {
                    state.rules.retain(|rule| rule.input_guid != guid);
                }
                StagedOp::DeleteRulesByOutput(guid) => {
                    state.rules.retain(|rule| rule.output_guid != guid);
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}
