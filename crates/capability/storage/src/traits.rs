//! 存储接口 Trait 定义
//!
//! - DeviceStore：设备注册表
//! - RuleStore：规则表
//! - LogStore：规则日志、执行器日志、监测历史
//! - LocationStore：楼层与房间
//! - TransactionalStore / StoreTransaction：跨表原子写入
//!
//! 所有接口返回 StorageError，使用 async_trait 支持动态分发。

use crate::error::StorageError;
use crate::models::{
    ActuatorLogRecord, DeviceFilter, DeviceRecord, DeviceUpdate, FloorRecord, MonitoringRecord,
    RoomRecord, RuleLogRecord, RuleRecord,
};
use async_trait::async_trait;

/// 设备存储接口
#[async_trait]
pub trait DeviceStore: Send + Sync {
    /// 按条件列出设备
    async fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>, StorageError>;

    /// 按 guid 查找设备
    async fn find_device(&self, guid: &str) -> Result<Option<DeviceRecord>, StorageError>;

    /// 创建设备（guid 已存在时报错）
    async fn create_device(&self, record: DeviceRecord) -> Result<DeviceRecord, StorageError>;

    /// 更新设备可编辑字段
    async fn update_device(
        &self,
        guid: &str,
        update: DeviceUpdate,
    ) -> Result<Option<DeviceRecord>, StorageError>;

    /// 写入设备状态值（立即持久化，不开事务）
    async fn update_device_status(
        &self,
        guid: &str,
        status: &str,
        updated_at_ms: i64,
    ) -> Result<Option<DeviceRecord>, StorageError>;

    /// 心跳：写入状态值、刷新 last_seen 并标记在线
    async fn touch_device(
        &self,
        guid: &str,
        status: &str,
        seen_at_ms: i64,
    ) -> Result<Option<DeviceRecord>, StorageError>;

    /// 将 last_seen 早于 `cutoff_ms` 的在线设备标记为离线，返回影响行数
    async fn mark_inactive(&self, cutoff_ms: i64, updated_at_ms: i64) -> Result<u64, StorageError>;
}

/// 规则存储接口
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// 批量写入规则行（单个事务）
    async fn create_rules(&self, rules: Vec<RuleRecord>) -> Result<Vec<RuleRecord>, StorageError>;

    /// 查找与传感器读数精确匹配的规则行
    async fn find_matching_rules(
        &self,
        input_guid: &str,
        input_value: &str,
    ) -> Result<Vec<RuleRecord>, StorageError>;

    /// 列出 guid 作为输入或输出的所有规则行
    async fn list_rules_for_guid(&self, guid: &str) -> Result<Vec<RuleRecord>, StorageError>;

    /// 删除以该传感器为输入的规则行
    async fn delete_rules_by_input(&self, input_guid: &str) -> Result<u64, StorageError>;
}

/// 日志存储接口
///
/// 清理任务先读取、上报，再按最大 id 删除，期间新写入的行保留到下一轮。
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn create_rule_log(&self, record: RuleLogRecord) -> Result<RuleLogRecord, StorageError>;

    async fn list_rule_logs(&self) -> Result<Vec<RuleLogRecord>, StorageError>;

    async fn delete_rule_logs_through(&self, max_id: i64) -> Result<u64, StorageError>;

    async fn list_actuator_logs(&self) -> Result<Vec<ActuatorLogRecord>, StorageError>;

    async fn delete_actuator_logs_through(&self, max_id: i64) -> Result<u64, StorageError>;

    async fn list_monitoring(&self) -> Result<Vec<MonitoringRecord>, StorageError>;

    async fn delete_monitoring_through(&self, max_id: i64) -> Result<u64, StorageError>;
}

/// 楼层与房间存储接口
#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn list_floors(&self) -> Result<Vec<FloorRecord>, StorageError>;

    async fn find_floor(&self, id: i64) -> Result<Option<FloorRecord>, StorageError>;

    async fn create_floor(&self, record: FloorRecord) -> Result<FloorRecord, StorageError>;

    /// 删除楼层（级联删除房间）
    async fn delete_floor(&self, id: i64) -> Result<bool, StorageError>;

    async fn list_rooms(&self, floor_id: Option<i64>) -> Result<Vec<RoomRecord>, StorageError>;

    async fn find_room(&self, id: i64) -> Result<Option<RoomRecord>, StorageError>;

    async fn create_room(&self, record: RoomRecord) -> Result<RoomRecord, StorageError>;

    /// 删除房间（设备的 room_id 置空）
    async fn delete_room(&self, id: i64) -> Result<bool, StorageError>;
}

/// 开启事务的入口
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StorageError>;
}

/// 进行中的事务
///
/// 未提交即丢弃等同回滚；事务内读取可见本事务的写入。
#[async_trait]
pub trait StoreTransaction: Send {
    async fn find_device(&mut self, guid: &str) -> Result<Option<DeviceRecord>, StorageError>;

    async fn update_device_status(
        &mut self,
        guid: &str,
        status: &str,
        updated_at_ms: i64,
    ) -> Result<Option<DeviceRecord>, StorageError>;

    async fn create_actuator_log(&mut self, record: ActuatorLogRecord) -> Result<(), StorageError>;

    async fn create_monitoring(&mut self, record: MonitoringRecord) -> Result<(), StorageError>;

    async fn delete_device(&mut self, guid: &str) -> Result<bool, StorageError>;

    async fn delete_rules_by_input(&mut self, input_guid: &str) -> Result<u64, StorageError>;

    async fn delete_rules_by_output(&mut self, output_guid: &str) -> Result<u64, StorageError>;

    async fn commit(self: Box<Self>) -> Result<(), StorageError>;

    async fn rollback(self: Box<Self>) -> Result<(), StorageError>;
}
