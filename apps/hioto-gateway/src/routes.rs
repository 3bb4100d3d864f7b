//! 路由定义
//!
//! 集中管理所有 API 路由：
//! - 健康检查：/health
//! - 设备：/api/devices/*
//! - 规则：/api/rules/*
//! - 控制：/api/control
//! - 楼层/房间：/api/floors/*, /api/rooms/*

use crate::AppState;
use crate::handlers::*;
use crate::middleware::request_context;
use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

/// 创建 /api 下的路由。
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/devices", get(list_devices).post(create_device))
        .route(
            "/devices/:guid",
            get(get_device).put(update_device).delete(delete_device),
        )
        .route("/rules", post(create_rules))
        .route("/rules/:guid", get(get_rules))
        .route("/rules/sensor/:guid", delete(delete_sensor_rules))
        .route("/control", post(control_device))
        .route("/floors", get(list_floors).post(create_floor))
        .route("/floors/:id", get(get_floor).delete(delete_floor))
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/:id", get(get_room).delete(delete_room))
}

/// 完整应用：健康检查 + /api 路由 + 追踪中间件。
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", create_api_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // 注入 request_id/trace_id
        .layer(middleware::from_fn(request_context))
}
