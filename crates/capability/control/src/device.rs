//! 设备生命周期：注册、更新、删除与状态上报。

use crate::{ControlError, ensure_origin, finish};
use api_contract::{
    CloudRegistrationDto, CloudUpdateDeviceDto, DeleteDeviceDto, RegistrationDto, UpdateDeviceDto,
};
use domain::{ConnectivityStatus, DeviceCommand, DeviceType, now_epoch_ms};
use hioto_storage::{
    DeviceFilter, DeviceRecord, DeviceStore, DeviceUpdate, MonitoringRecord, StoreTransaction,
    TransactionalStore,
};
use hioto_sync::CloudSync;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// 删除结果。
#[derive(Debug, Clone)]
pub struct DeviceRemoval {
    pub device: DeviceRecord,
    pub rules_removed: u64,
}

/// 设备服务。
#[derive(Clone)]
pub struct DeviceService {
    devices: Arc<dyn DeviceStore>,
    store: Arc<dyn TransactionalStore>,
    sync: CloudSync,
}

impl DeviceService {
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        store: Arc<dyn TransactionalStore>,
        sync: CloudSync,
    ) -> Self {
        Self {
            devices,
            store,
            sync,
        }
    }

    pub async fn list(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>, ControlError> {
        Ok(self.devices.list_devices(filter).await?)
    }

    pub async fn get(&self, guid: &str) -> Result<DeviceRecord, ControlError> {
        self.devices
            .find_device(guid)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("device {guid} not found")))
    }

    /// 本地注册，成功后向云端上报快照。
    pub async fn register_local(&self, request: &RegistrationDto) -> Result<DeviceRecord, ControlError> {
        let device = self.register(request, "local").await?;
        self.sync.device_registered(&device).await;
        Ok(device)
    }

    /// 云端下发的注册：校验节点标识，不回传云端。
    pub async fn register_from_cloud(
        &self,
        request: &CloudRegistrationDto,
    ) -> Result<DeviceRecord, ControlError> {
        ensure_origin(self.sync.node_identity(), Some(request.mac_server.as_str()))?;
        self.register(&request.registration, "cloud").await
    }

    /// 本地更新，成功后向云端上报快照。
    pub async fn update(&self, request: &UpdateDeviceDto) -> Result<DeviceRecord, ControlError> {
        let device = self.apply_update(request, "local").await?;
        self.sync.device_updated(&device).await;
        Ok(device)
    }

    /// 云端下发的更新：校验节点标识，不回传云端。
    pub async fn update_from_cloud(
        &self,
        request: &CloudUpdateDeviceDto,
    ) -> Result<DeviceRecord, ControlError> {
        ensure_origin(self.sync.node_identity(), Some(request.mac_server.as_str()))?;
        self.apply_update(&request.registration, "cloud").await
    }

    /// 删除设备并级联规则：SENSOR 删除其输入规则，AKTUATOR 删除其输出规则。
    ///
    /// 设备与规则在同一事务内删除，提交后发送删除通知。
    pub async fn delete(&self, guid: &str) -> Result<DeviceRemoval, ControlError> {
        let mut tx = self.store.begin().await?;
        let outcome = remove_device(tx.as_mut(), guid).await;
        let removal = finish(tx, outcome, guid).await?;
        info!(
            target: "hioto.device",
            guid = %guid,
            device_type = %removal.device.device_type,
            rules_removed = removal.rules_removed,
            "device_deleted"
        );
        self.sync.device_deleted(guid).await;
        Ok(removal)
    }

    /// 云端下发的删除：校验节点标识。
    pub async fn delete_from_cloud(
        &self,
        request: &DeleteDeviceDto,
    ) -> Result<DeviceRemoval, ControlError> {
        ensure_origin(self.sync.node_identity(), request.mac_server.as_deref())?;
        self.delete(&request.guid).await
    }

    /// 监测数据：事务内写入状态值并追加监测历史。
    pub async fn record_monitoring(&self, reading: &DeviceCommand) -> Result<DeviceRecord, ControlError> {
        let mut tx = self.store.begin().await?;
        let outcome = write_monitoring(tx.as_mut(), reading).await;
        let device = finish(tx, outcome, &reading.guid).await?;
        info!(
            target: "hioto.device",
            guid = %device.guid,
            name = %device.name,
            value = %reading.value,
            "monitoring_recorded"
        );
        Ok(device)
    }

    /// 心跳：写入状态值并刷新在线时间。
    pub async fn heartbeat(&self, reading: &DeviceCommand) -> Result<DeviceRecord, ControlError> {
        self.devices
            .touch_device(&reading.guid, &reading.value, now_epoch_ms())
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("device {} not found", reading.guid)))
    }

    /// 超过 `threshold` 未上报的设备标记为离线。
    pub async fn mark_inactive(&self, threshold: Duration) -> Result<u64, ControlError> {
        let now = now_epoch_ms();
        let cutoff = now - threshold.as_millis() as i64;
        Ok(self.devices.mark_inactive(cutoff, now).await?)
    }

    async fn register(
        &self,
        request: &RegistrationDto,
        origin: &'static str,
    ) -> Result<DeviceRecord, ControlError> {
        request
            .validate()
            .map_err(|err| ControlError::Validation(err.to_string()))?;
        let now = now_epoch_ms();
        let record = DeviceRecord {
            id: 0,
            guid: request.guid.trim().to_string(),
            mac: request.mac.clone(),
            device_type: request.device_type,
            quantity: request.quantity,
            name: request.name.clone(),
            version: request.version.clone(),
            minor: request.minor.clone(),
            status: request.device_type.initial_status().to_string(),
            status_device: ConnectivityStatus::On,
            last_seen_ms: now,
            created_at_ms: now,
            updated_at_ms: now,
            room_id: request.room_id,
        };
        let device = self.devices.create_device(record).await.map_err(|err| {
            warn!(target: "hioto.device", guid = %request.guid, error = %err, "device_register_failed");
            ControlError::Validation(err.to_string())
        })?;
        info!(
            target: "hioto.device",
            guid = %device.guid,
            name = %device.name,
            device_type = %device.device_type,
            origin = origin,
            "device_registered"
        );
        Ok(device)
    }

    async fn apply_update(
        &self,
        request: &UpdateDeviceDto,
        origin: &'static str,
    ) -> Result<DeviceRecord, ControlError> {
        request
            .validate()
            .map_err(|err| ControlError::Validation(err.to_string()))?;
        let update = DeviceUpdate {
            mac: request.mac.clone(),
            device_type: request.device_type,
            quantity: request.quantity,
            name: request.name.clone(),
            version: request.version.clone(),
            minor: request.minor.clone(),
            room_id: request.room_id,
            updated_at_ms: now_epoch_ms(),
        };
        let device = self
            .devices
            .update_device(&request.guid, update)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("device {} not found", request.guid)))?;
        info!(
            target: "hioto.device",
            guid = %device.guid,
            name = %device.name,
            origin = origin,
            "device_updated"
        );
        Ok(device)
    }
}

async fn remove_device(
    tx: &mut dyn StoreTransaction,
    guid: &str,
) -> Result<DeviceRemoval, ControlError> {
    let device = tx
        .find_device(guid)
        .await?
        .ok_or_else(|| ControlError::NotFound(format!("device {guid} not found")))?;
    if !tx.delete_device(guid).await? {
        return Err(ControlError::NotFound(format!("device {guid} not found")));
    }
    let rules_removed = match device.device_type {
        DeviceType::Sensor => tx.delete_rules_by_input(guid).await?,
        DeviceType::Aktuator => tx.delete_rules_by_output(guid).await?,
        _ => 0,
    };
    Ok(DeviceRemoval {
        device,
        rules_removed,
    })
}

async fn write_monitoring(
    tx: &mut dyn StoreTransaction,
    reading: &DeviceCommand,
) -> Result<DeviceRecord, ControlError> {
    let now = now_epoch_ms();
    let device = tx
        .update_device_status(&reading.guid, &reading.value, now)
        .await?
        .ok_or_else(|| ControlError::NotFound(format!("device {} not found", reading.guid)))?;
    tx.create_monitoring(MonitoringRecord {
        id: 0,
        device_guid: device.guid.clone(),
        device_name: device.name.clone(),
        device_type: device.device_type,
        value: reading.value.clone(),
        time_ms: now,
    })
    .await?;
    Ok(device)
}
