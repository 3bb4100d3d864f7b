//! 日志内存存储实现

use super::InMemoryStore;
use crate::error::StorageError;
use crate::models::{ActuatorLogRecord, MonitoringRecord, RuleLogRecord};
use crate::traits::LogStore;

#[async_trait::async_trait]
impl LogStore for InMemoryStore {
    async fn create_rule_log(&self, mut record: RuleLogRecord) -> Result<RuleLogRecord, StorageError> {
        let mut state = self.write()?;
        record.id = state.next_id();
        state.rule_logs.push(record.clone());
        Ok(record)
    }

    async fn list_rule_logs(&self) -> Result<Vec<RuleLogRecord>, StorageError> {
        Ok(self.read()?.rule_logs.clone())
    }

    async fn delete_rule_logs_through(&self, max_id: i64) -> Result<u64, StorageError> {
        let mut state = self.write()?;
        let before = state.rule_logs.len();
        state.rule_logs.retain(|item| item.id > max_id);
        Ok((before - state.rule_logs.len()) as u64)
    }

    async fn list_actuator_logs(&self) -> Result<Vec<ActuatorLogRecord>, StorageError> {
        Ok(self.read()?.actuator_logs.clone())
    }

    async fn delete_actuator_logs_through(&self, max_id: i64) -> Result<u64, StorageError> {
        let mut state = self.write()?;
        let before = state.actuator_logs.len();
        state.actuator_logs.retain(|item| item.id > max_id);
        Ok((before - state.actuator_logs.len()) as u64)
    }

    async fn list_monitoring(&self) -> Result<Vec<MonitoringRecord>, StorageError> {
        Ok(self.read()?.monitoring.clone())
    }

    async fn delete_monitoring_through(&self, max_id: i64) -> Result<u64, StorageError> {
        let mut state = self.write()?;
        let before = state.monitoring.len();
        state.monitoring.retain(|item| item.id > max_id);
        Ok((before - state.monitoring.len()) as u64)
    }
}
