//! 楼层 / 房间 handlers
//!
//! - GET|POST /api/floors，GET|DELETE /api/floors/:id（删除楼层级联删除房间）
//! - GET|POST /api/rooms（`?floor_id=`），GET|DELETE /api/rooms/:id

use crate::AppState;
use crate::utils::response::{
    bad_request_error, floor_to_dto, not_found_error, ok, room_to_dto, storage_error,
};
use api_contract::{CreateFloorRequest, CreateRoomRequest, FloorDto, RoomDto};
use axum::{
    Json,
    extract::{Path, Query, State},
    response::Response,
};
use domain::now_epoch_ms;
use hioto_storage::{FloorRecord, RoomRecord};

#[derive(Debug, Default, serde::Deserialize)]
pub struct RoomQuery {
    floor_id: Option<i64>,
}

pub async fn list_floors(State(state): State<AppState>) -> Response {
    match state.locations.list_floors().await {
        Ok(items) => {
            let data: Vec<FloorDto> = items.into_iter().map(floor_to_dto).collect();
            ok(data)
        }
        Err(err) => storage_error(err),
    }
}

pub async fn create_floor(
    State(state): State<AppState>,
    Json(req): Json<CreateFloorRequest>,
) -> Response {
    let name = req.name.trim();
    if name.is_empty() {
        return bad_request_error("name is required");
    }
    let now = now_epoch_ms();
    let record = FloorRecord {
        id: 0,
        name: name.to_string(),
        created_at_ms: now,
        updated_at_ms: now,
    };
    match state.locations.create_floor(record).await {
        Ok(floor) => ok(floor_to_dto(floor)),
        Err(err) => storage_error(err),
    }
}

pub async fn get_floor(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.locations.find_floor(id).await {
        Ok(Some(floor)) => ok(floor_to_dto(floor)),
        Ok(None) => not_found_error("floor not found"),
        Err(err) => storage_error(err),
    }
}

pub async fn delete_floor(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.locations.delete_floor(id).await {
        Ok(true) => ok(serde_json::json!({ "id": id })),
        Ok(false) => not_found_error("floor not found"),
        Err(err) => storage_error(err),
    }
}

pub async fn list_rooms(
    State(state): State<AppState>,
    Query(query): Query<RoomQuery>,
) -> Response {
    match state.locations.list_rooms(query.floor_id).await {
        Ok(items) => {
            let data: Vec<RoomDto> = items.into_iter().map(room_to_dto).collect();
            ok(data)
        }
        Err(err) => storage_error(err),
    }
}

pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Response {
    let name = req.name.trim();
    if name.is_empty() {
        return bad_request_error("name is required");
    }
    match state.locations.find_floor(req.floor_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return bad_request_error("floor not found"),
        Err(err) => return storage_error(err),
    }
    let now = now_epoch_ms();
    let record = RoomRecord {
        id: 0,
        name: name.to_string(),
        floor_id: req.floor_id,
        created_at_ms: now,
        updated_at_ms: now,
    };
    match state.locations.create_room(record).await {
        Ok(room) => ok(room_to_dto(room)),
        Err(err) => storage_error(err),
    }
}

pub async fn get_room(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.locations.find_room(id).await {
        Ok(Some(room)) => ok(room_to_dto(room)),
        Ok(None) => not_found_error("room not found"),
        Err(err) => storage_error(err),
    }
}

pub async fn delete_room(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.locations.delete_room(id).await {
        Ok(true) => ok(serde_json::json!({ "id": id })),
        Ok(false) => not_found_error("room not found"),
        Err(err) => storage_error(err),
    }
}
