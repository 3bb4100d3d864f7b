//! 楼层与房间内存存储实现

use super::InMemoryStore;
use crate::error::StorageError;
use crate::models::{FloorRecord, RoomRecord};
use crate::traits::LocationStore;

#[async_trait::async_trait]
impl LocationStore for InMemoryStore {
    async fn list_floors(&self) -> Result<Vec<FloorRecord>, StorageError> {
        Ok(self.read()?.floors.values().cloned().collect())
    }

    async fn find_floor(&self, id: i64) -> Result<Option<FloorRecord>, StorageError> {
        Ok(self.read()?.floors.get(&id).cloned())
    }

    async fn create_floor(&self, mut record: FloorRecord) -> Result<FloorRecord, StorageError> {
        let mut state = self.write()?;
        record.id = state.next_id();
        state.floors.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete_floor(&self, id: i64) -> Result<bool, StorageError> {
        let mut state = self.write()?;
        if state.floors.remove(&id).is_none() {
            return Ok(false);
        }
        let removed: Vec<i64> = state
            .rooms
            .values()
            .filter(|room| room.floor_id == id)
            .map(|room| room.id)
            .collect();
        for room_id in removed {
            state.rooms.remove(&room_id);
            detach_room(&mut state.devices, room_id);
        }
        Ok(true)
    }

    async fn list_rooms(&self, floor_id: Option<i64>) -> Result<Vec<RoomRecord>, StorageError> {
        let items = self
            .read()?
            .rooms
            .values()
            .filter(|room| floor_id.is_none_or(|floor_id| room.floor_id == floor_id))
            .cloned()
            .collect();
        Ok(items)
    }

    async fn find_room(&self, id: i64) -> Result<Option<RoomRecord>, StorageError> {
        Ok(self.read()?.rooms.get(&id).cloned())
    }

    async fn create_room(&self, mut record: RoomRecord) -> Result<RoomRecord, StorageError> {
        let mut state = self.write()?;
        if !state.floors.contains_key(&record.floor_id) {
            return Err(StorageError::new("floor not found"));
        }
        record.id = state.next_id();
        state.rooms.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete_room(&self, id: i64) -> Result<bool, StorageError> {
        let mut state = self.write()?;
        if state.rooms.remove(&id).is_none() {
            return Ok(false);
        }
        detach_room(&mut state.devices, id);
        Ok(true)
    }
}

fn detach_room(
    devices: &mut std::collections::BTreeMap<String, crate::models::DeviceRecord>,
    room_id: i64,
) {
    for device in devices.values_mut() {
        if device.room_id == Some(room_id) {
            device.room_id = None;
        }
    }
}
