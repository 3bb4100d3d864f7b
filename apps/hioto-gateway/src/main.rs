//! 本地网关服务：消息消费 + REST API + 定时任务。

mod consumers;
mod handlers;
mod housekeeping;
mod middleware;
mod routes;
mod state;
mod utils;

pub use state::AppState;

use hioto_broker::{BrokerPublisher, BrokerRegistry, MqttInstanceConfig, RetryPolicy};
use hioto_config::{AppConfig, MqttEndpoint};
use hioto_storage::{PgStore, connect_pool, ensure_schema};
use hioto_sync::CloudSync;
use hioto_telemetry::init_tracing;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // Postgres 存储（启动时补齐表结构）
    let pool = connect_pool(&config.database_url).await?;
    ensure_schema(&pool).await?;
    let store = PgStore::new(pool);

    // 连接注册表：后台建立并维持全部命名连接，退出时统一关闭
    let policy = RetryPolicy::new(
        config.consumer.connect_attempts,
        Duration::from_secs(config.consumer.connect_delay_seconds),
    );
    let registry = Arc::new(BrokerRegistry::new(policy));
    let cancel = CancellationToken::new();
    let mut tasks = spawn_broker_connections(&config, &registry, &cancel);

    let publisher = Arc::new(BrokerPublisher::new(
        registry.clone(),
        config.consumer.message_ttl_ms,
    ));
    let sync = CloudSync::new(
        publisher,
        state::sync_targets(&config),
        config.node_identity.clone(),
    );
    let state = AppState::new(store, sync);

    if config.consumers_enabled {
        tasks.extend(consumers::spawn_consumers(
            &config,
            registry.clone(),
            state.clone(),
            cancel.clone(),
        ));
    } else {
        info!(target: "hioto.consumer", "consumers_disabled");
    }
    if config.housekeeping_enabled {
        tasks.extend(housekeeping::spawn_housekeeping(
            state.clone(),
            &config.housekeeping,
            cancel.clone(),
        ));
    } else {
        info!(target: "hioto.housekeeping", "housekeeping_disabled");
    }

    let app = routes::build_app(state);
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(addr = %config.http_addr, node = %config.node_identity, "http_listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    // 停止消费与定时任务，等待处理中的消息
    cancel.cancel();
    for task in tasks {
        if let Err(err) = task.await {
            warn!(error = %err, "background_task_failed");
        }
    }
    registry.close_all().await;
    info!("shutdown_complete");
    Ok(())
}

/// 为每个命名连接启动维持任务：连不上时按间隔持续重试，连上即登记。
///
/// 登记前依赖该实例的订阅与发布返回实例不存在，订阅由消费者按间隔重试。
fn spawn_broker_connections(
    config: &AppConfig,
    registry: &Arc<BrokerRegistry>,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();
    for endpoint in [&config.amqp_local, &config.amqp_cloud] {
        let registry = registry.clone();
        let cancel = cancel.clone();
        let name = endpoint.instance_name.clone();
        let uri = endpoint.uri.clone();
        handles.push(tokio::spawn(async move {
            registry.maintain_amqp(&name, &uri, cancel).await;
        }));
    }
    let reconnect_interval = Duration::from_secs(config.consumer.reconnect_delay_seconds);
    for endpoint in [&config.mqtt_local, &config.mqtt_cloud] {
        let registry = registry.clone();
        let cancel = cancel.clone();
        let instance = mqtt_instance(endpoint, reconnect_interval);
        handles.push(tokio::spawn(async move {
            registry.maintain_mqtt(instance, cancel).await;
        }));
    }
    handles
}

fn mqtt_instance(endpoint: &MqttEndpoint, reconnect_interval: Duration) -> MqttInstanceConfig {
    MqttInstanceConfig {
        instance_name: endpoint.instance_name.clone(),
        host: endpoint.host.clone(),
        port: endpoint.port,
        username: endpoint.username.clone(),
        password: endpoint.password.clone(),
        client_id: endpoint.client_id.clone(),
        reconnect_interval,
    }
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                warn!(error = %err, "shutdown_signal_failed");
            }
        }
        _ = cancel.cancelled() => {}
    }
    info!("shutdown_requested");
}
