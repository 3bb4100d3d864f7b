use crate::{ControlError, ensure_origin, finish};
use api_contract::ControlDto;
use domain::{DeviceCommand, now_epoch_ms};
use hioto_rules::{EvaluationReport, RuleService};
use hioto_storage::{ActuatorLogRecord, DeviceRecord, StoreTransaction, TransactionalStore};
use hioto_sync::CloudSync;
use hioto_telemetry::record_actuator_command;
use std::sync::Arc;
use tracing::{info, warn};

/// 控制结果。
#[derive(Debug, Clone)]
pub enum ControlOutcome {
    /// 传感器读数已交给规则引擎。
    Evaluated {
        reading: DeviceCommand,
        report: EvaluationReport,
    },
    /// 执行器状态已提交（返回更新后的设备）。
    Actuated(DeviceRecord),
}

/// 控制消息分发器。
#[derive(Clone)]
pub struct ControlService {
    store: Arc<dyn TransactionalStore>,
    rules: RuleService,
    sync: CloudSync,
}

impl ControlService {
    pub fn new(store: Arc<dyn TransactionalStore>, rules: RuleService, sync: CloudSync) -> Self {
        Self { store, rules, sync }
    }

    /// 本地控制（REST / 本地队列），不校验节点标识。
    pub async fn control_local(&self, request: &ControlDto) -> Result<ControlOutcome, ControlError> {
        self.dispatch(request, "local").await
    }

    /// 云端控制：`mac_server` 必须等于本节点标识，否则丢弃。
    pub async fn control_from_cloud(
        &self,
        request: &ControlDto,
    ) -> Result<ControlOutcome, ControlError> {
        if let Err(err) = ensure_origin(self.sync.node_identity(), request.mac_server.as_deref()) {
            warn!(target: "hioto.control", error = %err, "control_foreign_origin");
            return Err(err);
        }
        self.dispatch(request, "cloud").await
    }

    async fn dispatch(
        &self,
        request: &ControlDto,
        origin: &'static str,
    ) -> Result<ControlOutcome, ControlError> {
        let command: DeviceCommand = request.message.parse()?;
        if request.device_type.is_rule_sensor() {
            let report = self.rules.evaluate(&command).await?;
            return Ok(ControlOutcome::Evaluated {
                reading: command,
                report,
            });
        }

        let device = self.actuate(&command).await?;
        record_actuator_command();
        info!(
            target: "hioto.control",
            guid = %device.guid,
            name = %device.name,
            value = %command.value,
            origin = origin,
            "actuator_committed"
        );
        self.sync.command_actuator(&command).await;
        self.sync.device_updated(&device).await;
        Ok(ControlOutcome::Actuated(device))
    }

    async fn actuate(&self, command: &DeviceCommand) -> Result<DeviceRecord, ControlError> {
        let mut tx = self.store.begin().await?;
        let outcome = write_actuator(tx.as_mut(), command).await;
        if let Err(err) = &outcome {
            warn!(target: "hioto.control", guid = %command.guid, error = %err, "actuator_aborted");
        }
        finish(tx, outcome, &command.guid).await
    }
}

async fn write_actuator(
    tx: &mut dyn StoreTransaction,
    command: &DeviceCommand,
) -> Result<DeviceRecord, ControlError> {
    let device = tx
        .find_device(&command.guid)
        .await?
        .ok_or_else(|| ControlError::NotFound(format!("device {} not found", command.guid)))?;
    let now = now_epoch_ms();
    let updated = tx
        .update_device_status(&command.guid, &command.value, now)
        .await?
        .ok_or_else(|| ControlError::NotFound(format!("device {} not found", command.guid)))?;
    tx.create_actuator_log(ActuatorLogRecord {
        id: 0,
        guid: device.guid,
        name: device.name,
        value: command.value.clone(),
        time_ms: now,
    })
    .await?;
    Ok(updated)
}
