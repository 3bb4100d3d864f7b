//! 应用状态与服务装配。

use hioto_config::AppConfig;
use hioto_control::{ControlService, DeviceService};
use hioto_rules::RuleService;
use hioto_storage::{DeviceStore, LocationStore, LogStore, RuleStore, TransactionalStore};
use hioto_sync::{CloudSync, SyncTargets};
use std::sync::Arc;

/// 共享状态：REST handlers、消费者与定时任务共用同一组服务。
#[derive(Clone)]
pub struct AppState {
    pub devices: DeviceService,
    pub rules: RuleService,
    pub control: ControlService,
    pub sync: CloudSync,
    pub logs: Arc<dyn LogStore>,
    pub locations: Arc<dyn LocationStore>,
}

impl AppState {
    /// 基于一个实现全部存储接口的后端装配服务。
    pub fn new<S>(store: S, sync: CloudSync) -> Self
    where
        S: DeviceStore + RuleStore + LogStore + LocationStore + TransactionalStore + Clone + 'static,
    {
        let devices: Arc<dyn DeviceStore> = Arc::new(store.clone());
        let transactions: Arc<dyn TransactionalStore> = Arc::new(store.clone());
        let logs: Arc<dyn LogStore> = Arc::new(store.clone());
        let rules = RuleService::new(
            devices.clone(),
            Arc::new(store.clone()),
            logs.clone(),
            sync.clone(),
        );
        Self {
            devices: DeviceService::new(devices, transactions.clone(), sync.clone()),
            control: ControlService::new(transactions, rules.clone(), sync.clone()),
            rules,
            sync,
            logs,
            locations: Arc::new(store),
        }
    }

    pub fn node_identity(&self) -> &str {
        self.sync.node_identity()
    }
}

/// 出站目的地（本地执行器 topic + 云端上报队列）。
pub fn sync_targets(config: &AppConfig) -> SyncTargets {
    SyncTargets {
        local_mqtt_instance: config.mqtt_local.instance_name.clone(),
        actuator_topic: config.topics.actuator.clone(),
        cloud_amqp_instance: config.amqp_cloud.instance_name.clone(),
        exchange: config.exchange.clone(),
        register_queue: config.outbound_queues.register_response.clone(),
        update_queue: config.outbound_queues.update_response.clone(),
        delete_queue: config.outbound_queues.delete_response.clone(),
        rules_queue: config.outbound_queues.rules_response.clone(),
        logs_queue: config.outbound_queues.logs.clone(),
        actuator_logs_queue: config.outbound_queues.actuator_logs.clone(),
        monitoring_queue: config.outbound_queues.monitoring.clone(),
    }
}
