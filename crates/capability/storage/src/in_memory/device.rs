//! 设备内存存储实现

use super::InMemoryStore;
use crate::error::StorageError;
use crate::models::{DeviceFilter, DeviceRecord, DeviceUpdate};
use crate::traits::DeviceStore;
use domain::ConnectivityStatus;

#[async_trait::async_trait]
impl DeviceStore for InMemoryStore {
    async fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<DeviceRecord>, StorageError> {
        let state = self.read()?;
        let items = state
            .devices
            .values()
            .filter(|item| {
                filter
                    .device_type
                    .is_none_or(|device_type| item.device_type == device_type)
            })
            .filter(|item| filter.room_id.is_none_or(|room_id| item.room_id == Some(room_id)))
            .filter(|item| {
                filter.floor_id.is_none_or(|floor_id| {
                    item.room_id
                        .and_then(|room_id| state.rooms.get(&room_id))
                        .is_some_and(|room| room.floor_id == floor_id)
                })
            })
            .cloned()
            .collect();
        Ok(items)
    }

    async fn find_device(&self, guid: &str) -> Result<Option<DeviceRecord>, StorageError> {
        Ok(self.read()?.devices.get(guid).cloned())
    }

    async fn create_device(&self, mut record: DeviceRecord) -> Result<DeviceRecord, StorageError> {
        let mut state = self.write()?;
        if state.devices.contains_key(&record.guid) {
            return Err(StorageError::new("device exists"));
        }
        record.id = state.next_id();
        state.devices.insert(record.guid.clone(), record.clone());
        Ok(record)
    }

    async fn update_device(
        &self,
        guid: &str,
        update: DeviceUpdate,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        let mut state = self.write()?;
        let Some(device) = state.devices.get_mut(guid) else {
            return Ok(None);
        };
        device.mac = update.mac;
        device.device_type = update.device_type;
        device.quantity = update.quantity;
        device.name = update.name;
        device.version = update.version;
        device.minor = update.minor;
        device.room_id = update.room_id;
        device.updated_at_ms = update.updated_at_ms;
        Ok(Some(device.clone()))
    }

    async fn update_device_status(
        &self,
        guid: &str,
        status: &str,
        updated_at_ms: i64,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        let mut state = self.write()?;
        let Some(device) = state.devices.get_mut(guid) else {
            return Ok(None);
        };
        device.status = status.to_string();
        device.updated_at_ms = updated_at_ms;
        Ok(Some(device.clone()))
    }

    async fn touch_device(
        &self,
        guid: &str,
        status: &str,
        seen_at_ms: i64,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        let mut state = self.write()?;
        let Some(device) = state.devices.get_mut(guid) else {
            return Ok(None);
        };
        device.status = status.to_string();
        device.status_device = ConnectivityStatus::On;
        device.last_seen_ms = seen_at_ms;
        device.updated_at_ms = seen_at_ms;
        Ok(Some(device.clone()))
    }

    async fn mark_inactive(&self, cutoff_ms: i64, updated_at_ms: i64) -> Result<u64, StorageError> {
        let mut state = self.write()?;
        let mut affected = 0;
        for device in state.devices.values_mut() {
            if device.status_device == ConnectivityStatus::On && device.last_seen_ms < cutoff_ms {
                device.status_device = ConnectivityStatus::Off;
                device.updated_at_ms = updated_at_ms;
                affected += 1;
            }
        }
        Ok(affected)
    }
}
