//! 出站同步：本地执行器命令与云端上报。
//!
//! 云端上报是尽力而为的通道：发布失败只记录日志（发布器内计数），
//! 不影响已提交的本地状态。需要可靠投递时在 `send_queue` 处接入 outbox。

use api_contract::{
    ActuatorLogDto, DeleteNoticeDto, DeviceDto, DeviceSnapshotDto, MonitoringDto, RuleDto,
    RuleLogDto,
};
use domain::DeviceCommand;
use hioto_broker::MessagePublisher;
use hioto_storage::{ActuatorLogRecord, DeviceRecord, MonitoringRecord, RuleLogRecord, RuleRecord};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// 出站目的地。
#[derive(Debug, Clone)]
pub struct SyncTargets {
    /// 本地 MQTT 实例（执行器命令）。
    pub local_mqtt_instance: String,
    pub actuator_topic: String,
    /// 云端 AMQP 实例（上报队列）。
    pub cloud_amqp_instance: String,
    pub exchange: String,
    pub register_queue: String,
    pub update_queue: String,
    pub delete_queue: String,
    pub rules_queue: String,
    pub logs_queue: String,
    pub actuator_logs_queue: String,
    pub monitoring_queue: String,
}

/// 本地命令下发与云端同步。
#[derive(Clone)]
pub struct CloudSync {
    publisher: Arc<dyn MessagePublisher>,
    targets: SyncTargets,
    node_identity: String,
}

impl CloudSync {
    pub fn new(
        publisher: Arc<dyn MessagePublisher>,
        targets: SyncTargets,
        node_identity: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            targets,
            node_identity: node_identity.into(),
        }
    }

    /// 本节点标识（云端消息中的 `mac_server`）。
    pub fn node_identity(&self) -> &str {
        &self.node_identity
    }

    pub fn targets(&self) -> &SyncTargets {
        &self.targets
    }

    /// 下发 `guid#value` 到本地执行器 topic。
    pub async fn command_actuator(&self, command: &DeviceCommand) {
        let _ = self
            .publisher
            .publish_topic(
                &self.targets.local_mqtt_instance,
                &self.targets.actuator_topic,
                command.to_wire().as_bytes(),
            )
            .await;
    }

    /// 本地注册后上报设备快照。
    pub async fn device_registered(&self, device: &DeviceRecord) {
        self.send_queue(&self.targets.register_queue, &self.snapshot(device)).await;
    }

    /// 设备状态或属性变更后上报快照。
    pub async fn device_updated(&self, device: &DeviceRecord) {
        self.send_queue(&self.targets.update_queue, &self.snapshot(device)).await;
    }

    /// 设备删除通知。
    pub async fn device_deleted(&self, guid: &str) {
        let notice = DeleteNoticeDto {
            guid: guid.to_string(),
            mac_server: self.node_identity.clone(),
        };
        self.send_queue(&self.targets.delete_queue, &notice).await;
    }

    /// 整批规则上报。
    pub async fn rules_created(&self, rules: &[RuleRecord]) {
        let batch: Vec<RuleDto> = rules
            .iter()
            .map(|rule| RuleDto {
                mac_server: self.node_identity.clone(),
                input_guid: rule.input_guid.clone(),
                input_value: rule.input_value.clone(),
                output_guid: rule.output_guid.clone(),
                output_value: rule.output_value.clone(),
                created_at: rule.created_at_ms,
                updated_at: rule.updated_at_ms,
            })
            .collect();
        self.send_queue(&self.targets.rules_queue, &batch).await;
    }

    pub async fn rule_logs(&self, logs: &[RuleLogRecord]) {
        let batch: Vec<RuleLogDto> = logs
            .iter()
            .map(|log| RuleLogDto {
                id: log.id,
                input_guid: log.input_guid.clone(),
                input_name: log.input_name.clone(),
                input_value: log.input_value.clone(),
                output_guid: log.output_guid.clone(),
                output_value: log.output_value.clone(),
                time: log.time_ms,
                mac_server: self.node_identity.clone(),
            })
            .collect();
        self.send_queue(&self.targets.logs_queue, &batch).await;
    }

    pub async fn actuator_logs(&self, logs: &[ActuatorLogRecord]) {
        let batch: Vec<ActuatorLogDto> = logs
            .iter()
            .map(|log| ActuatorLogDto {
                id: log.id,
                guid: log.guid.clone(),
                name: log.name.clone(),
                value: log.value.clone(),
                time: log.time_ms,
                mac_server: self.node_identity.clone(),
            })
            .collect();
        self.send_queue(&self.targets.actuator_logs_queue, &batch).await;
    }

    pub async fn monitoring(&self, records: &[MonitoringRecord]) {
        let batch: Vec<MonitoringDto> = records
            .iter()
            .map(|record| MonitoringDto {
                id: record.id,
                device_guid: record.device_guid.clone(),
                device_name: record.device_name.clone(),
                device_type: record.device_type,
                value: record.value.clone(),
                time: record.time_ms,
                mac_server: self.node_identity.clone(),
            })
            .collect();
        self.send_queue(&self.targets.monitoring_queue, &batch).await;
    }

    fn snapshot(&self, device: &DeviceRecord) -> DeviceSnapshotDto {
        DeviceSnapshotDto {
            device: device_to_dto(device),
            mac_server: self.node_identity.clone(),
        }
    }

    async fn send_queue<T: Serialize + ?Sized>(&self, queue: &str, body: &T) {
        let payload = match serde_json::to_vec(body) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target: "hioto.sync", queue = %queue, error = %err, "sync_encode_failed");
                return;
            }
        };
        let _ = self
            .publisher
            .publish_queue(
                &self.targets.cloud_amqp_instance,
                &payload,
                queue,
                &self.targets.exchange,
            )
            .await;
    }
}

/// 存储记录转换为对外 DTO。
pub fn device_to_dto(device: &DeviceRecord) -> DeviceDto {
    DeviceDto {
        id: device.id,
        guid: device.guid.clone(),
        mac: device.mac.clone(),
        device_type: device.device_type,
        quantity: device.quantity,
        name: device.name.clone(),
        version: device.version.clone(),
        minor: device.minor.clone(),
        status: device.status.clone(),
        status_device: device.status_device,
        last_seen: device.last_seen_ms,
        created_at: device.created_at_ms,
        updated_at: device.updated_at_ms,
        room_id: device.room_id,
    }
}
