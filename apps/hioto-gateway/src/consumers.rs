//! 消费路由装配
//!
//! 每条路由对应一个入站消息种类：
//! - 本地 AMQP 队列（队列模式）：注册、规则、控制
//! - 本地 MQTT topic（topic 模式）：传感器读数、监测数据、心跳、执行器回显
//! - 云端 MQTT topic `<routing_key>/<mac>`（topic 模式）：控制、注册、更新、删除
//!
//! 全部 topic 路由作为一组按刷新间隔整体重建。

use crate::AppState;
use api_contract::{
    CloudRegistrationDto, CloudUpdateDeviceDto, ControlDto, CreateRuleDto, DeleteDeviceDto,
    RegistrationDto,
};
use async_trait::async_trait;
use domain::DeviceCommand;
use hioto_broker::{
    AmqpQueueTransport, BrokerError, BrokerRegistry, MessageHandler, NamedTopicTransport,
    QueueConsumerConfig, QueueTransport, TopicTransport, TopicTransportSource,
    run_queue_consumer, run_topic_consumer, run_with_refresh,
};
use hioto_config::AppConfig;
use hioto_control::ControlOutcome;
use hioto_telemetry::record_message_dropped;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// 入站消息种类（决定解码方式与调用的服务）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    LocalRegistration,
    Rules,
    LocalControl,
    Sensor,
    Monitoring,
    Status,
    ActuatorEcho,
    CloudControl,
    CloudRegistration,
    CloudUpdate,
    CloudDelete,
}

impl InboundKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InboundKind::LocalRegistration => "local_registration",
            InboundKind::Rules => "rules",
            InboundKind::LocalControl => "local_control",
            InboundKind::Sensor => "sensor",
            InboundKind::Monitoring => "monitoring",
            InboundKind::Status => "status",
            InboundKind::ActuatorEcho => "actuator_echo",
            InboundKind::CloudControl => "cloud_control",
            InboundKind::CloudRegistration => "cloud_registration",
            InboundKind::CloudUpdate => "cloud_update",
            InboundKind::CloudDelete => "cloud_delete",
        }
    }
}

/// 队列路由。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRoute {
    pub queue: String,
    pub kind: InboundKind,
}

/// Topic 路由。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRoute {
    pub instance: String,
    pub topic: String,
    pub kind: InboundKind,
}

pub fn local_queue_routes(config: &AppConfig) -> Vec<QueueRoute> {
    let queues = &config.inbound_queues;
    vec![
        QueueRoute {
            queue: queues.registration.clone(),
            kind: InboundKind::LocalRegistration,
        },
        QueueRoute {
            queue: queues.rules.clone(),
            kind: InboundKind::Rules,
        },
        QueueRoute {
            queue: queues.control.clone(),
            kind: InboundKind::LocalControl,
        },
    ]
}

pub fn local_topic_routes(config: &AppConfig) -> Vec<TopicRoute> {
    let instance = &config.mqtt_local.instance_name;
    let topics = &config.topics;
    [
        (&topics.sensor, InboundKind::Sensor),
        (&topics.monitoring, InboundKind::Monitoring),
        (&topics.status, InboundKind::Status),
        (&topics.actuator, InboundKind::ActuatorEcho),
    ]
    .into_iter()
    .map(|(topic, kind)| TopicRoute {
        instance: instance.clone(),
        topic: topic.clone(),
        kind,
    })
    .collect()
}

pub fn cloud_topic_routes(config: &AppConfig) -> Vec<TopicRoute> {
    let instance = &config.mqtt_cloud.instance_name;
    let keys = &config.routing_keys;
    [
        (&keys.control, InboundKind::CloudControl),
        (&keys.registration, InboundKind::CloudRegistration),
        (&keys.update_device, InboundKind::CloudUpdate),
        (&keys.delete_device, InboundKind::CloudDelete),
    ]
    .into_iter()
    .map(|(key, kind)| TopicRoute {
        instance: instance.clone(),
        topic: config.cloud_topic(key),
        kind,
    })
    .collect()
}

/// 按刷新间隔整体重建的 topic 路由：本地在前，云端在后。
pub fn topic_routes(config: &AppConfig) -> Vec<TopicRoute> {
    let mut routes = local_topic_routes(config);
    routes.extend(cloud_topic_routes(config));
    routes
}

/// 入站消息处理器：解码后调用对应服务，失败计入丢弃并返回错误（由消费者记录日志）。
pub struct InboundHandler {
    kind: InboundKind,
    state: AppState,
}

impl InboundHandler {
    pub fn new(kind: InboundKind, state: AppState) -> Self {
        Self { kind, state }
    }

    async fn dispatch(&self, payload: &[u8]) -> Result<(), BrokerError> {
        let state = &self.state;
        match self.kind {
            InboundKind::LocalRegistration => {
                let request: RegistrationDto = decode(payload)?;
                state.devices.register_local(&request).await.map_err(failed)?;
            }
            InboundKind::CloudRegistration => {
                let request: CloudRegistrationDto = decode(payload)?;
                state
                    .devices
                    .register_from_cloud(&request)
                    .await
                    .map_err(failed)?;
            }
            InboundKind::CloudUpdate => {
                let request: CloudUpdateDeviceDto = decode(payload)?;
                state
                    .devices
                    .update_from_cloud(&request)
                    .await
                    .map_err(failed)?;
            }
            InboundKind::CloudDelete => {
                let request: DeleteDeviceDto = decode(payload)?;
                state
                    .devices
                    .delete_from_cloud(&request)
                    .await
                    .map_err(failed)?;
            }
            InboundKind::Rules => {
                let request: CreateRuleDto = decode(payload)?;
                request.validate().map_err(failed)?;
                state
                    .rules
                    .create_rules(&request.input_guid, &request.output_guid)
                    .await
                    .map_err(failed)?;
            }
            InboundKind::LocalControl => {
                let request: ControlDto = decode(payload)?;
                let outcome = state.control.control_local(&request).await.map_err(failed)?;
                log_outcome(self.kind, &outcome);
            }
            InboundKind::CloudControl => {
                let request: ControlDto = decode(payload)?;
                let outcome = state
                    .control
                    .control_from_cloud(&request)
                    .await
                    .map_err(failed)?;
                log_outcome(self.kind, &outcome);
            }
            InboundKind::Sensor => {
                let reading = parse_command(payload)?;
                state.rules.evaluate(&reading).await.map_err(failed)?;
            }
            InboundKind::Monitoring => {
                let reading = parse_command(payload)?;
                state
                    .devices
                    .record_monitoring(&reading)
                    .await
                    .map_err(failed)?;
            }
            InboundKind::Status => {
                let reading = parse_command(payload)?;
                state.devices.heartbeat(&reading).await.map_err(failed)?;
            }
            InboundKind::ActuatorEcho => {
                info!(
                    target: "hioto.consumer",
                    payload = %String::from_utf8_lossy(payload),
                    "actuator_echo"
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MessageHandler for InboundHandler {
    async fn handle(&self, payload: Vec<u8>) -> Result<(), BrokerError> {
        let result = self.dispatch(&payload).await;
        if result.is_err() {
            record_message_dropped();
        }
        result
    }
}

fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, BrokerError> {
    serde_json::from_slice(payload).map_err(|err| BrokerError::Handler(format!("decode: {err}")))
}

fn parse_command(payload: &[u8]) -> Result<DeviceCommand, BrokerError> {
    DeviceCommand::from_payload(payload).map_err(|err| BrokerError::Handler(format!("decode: {err}")))
}

fn failed(err: impl std::fmt::Display) -> BrokerError {
    BrokerError::Handler(err.to_string())
}

fn log_outcome(kind: InboundKind, outcome: &ControlOutcome) {
    match outcome {
        ControlOutcome::Actuated(device) => info!(
            target: "hioto.consumer",
            route = kind.as_str(),
            guid = %device.guid,
            status = %device.status,
            "control_applied"
        ),
        ControlOutcome::Evaluated { reading, report } => info!(
            target: "hioto.consumer",
            route = kind.as_str(),
            sensor_guid = %reading.guid,
            matched = report.matched,
            applied = report.applied,
            "control_evaluated"
        ),
    }
}

/// 启动全部消费路由，返回各路由任务句柄（取消 `cancel` 后全部退出）。
pub fn spawn_consumers(
    config: &AppConfig,
    registry: Arc<BrokerRegistry>,
    state: AppState,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let settings = &config.consumer;
    let queue_config = QueueConsumerConfig {
        workers: settings.workers,
        buffer: settings.buffer,
        reconnect_delay: Duration::from_secs(settings.reconnect_delay_seconds),
    };
    let retry_delay = Duration::from_secs(settings.reconnect_delay_seconds);
    let drain_timeout = Duration::from_secs(settings.drain_timeout_seconds);
    let mut handles = Vec::new();

    let transport: Arc<dyn QueueTransport> = Arc::new(AmqpQueueTransport::new(
        config.amqp_local.instance_name.clone(),
        config.amqp_local.uri.clone(),
        settings.message_ttl_ms,
        *registry.policy(),
    ));
    for route in local_queue_routes(config) {
        info!(target: "hioto.consumer", queue = %route.queue, route = route.kind.as_str(), "queue_route_spawned");
        handles.push(tokio::spawn(run_queue_consumer(
            transport.clone(),
            route.queue,
            Arc::new(InboundHandler::new(route.kind, state.clone())),
            queue_config,
            cancel.clone(),
        )));
    }

    // 本地与云端 topic 路由作为一组，按刷新间隔整体重建
    let refresh = match settings.route_refresh_seconds {
        0 => None,
        seconds => Some(Duration::from_secs(seconds)),
    };
    let routes = topic_routes(config);
    let source: Arc<dyn TopicTransportSource> = registry;
    handles.push(tokio::spawn(async move {
        run_with_refresh(cancel, refresh, move |cycle| {
            spawn_topic_routes(
                &source,
                routes.clone(),
                &state,
                retry_delay,
                drain_timeout,
                &cycle,
            )
        })
        .await;
    }));
    handles
}

/// 为每条 topic 路由启动消费任务；实例在订阅时解析，未连上时由消费者重试。
fn spawn_topic_routes(
    source: &Arc<dyn TopicTransportSource>,
    routes: Vec<TopicRoute>,
    state: &AppState,
    retry_delay: Duration,
    drain_timeout: Duration,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    routes
        .into_iter()
        .map(|route| {
            let transport: Arc<dyn TopicTransport> =
                Arc::new(NamedTopicTransport::new(source.clone(), route.instance.clone()));
            info!(target: "hioto.consumer", instance = %route.instance, topic = %route.topic, route = route.kind.as_str(), "topic_route_spawned");
            tokio::spawn(run_topic_consumer(
                transport,
                route.topic,
                Arc::new(InboundHandler::new(route.kind, state.clone())),
                retry_delay,
                drain_timeout,
                cancel.clone(),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hioto_broker::RecordingPublisher;
    use hioto_storage::{DeviceStore, InMemoryStore, LogStore};
    use hioto_sync::CloudSync;

    const NODE: &str = "aa:bb:cc:dd:ee:ff";

    fn state() -> (InMemoryStore, Arc<RecordingPublisher>, AppState) {
        let store = InMemoryStore::new();
        let publisher = Arc::new(RecordingPublisher::new());
        let targets = hioto_sync::SyncTargets {
            local_mqtt_instance: "mqtt-local".to_string(),
            actuator_topic: "aktuator".to_string(),
            cloud_amqp_instance: "rmq-cloud".to_string(),
            exchange: "amq.direct".to_string(),
            register_queue: "register_res_cloud".to_string(),
            update_queue: "update_res_cloud".to_string(),
            delete_queue: "delete_res_cloud".to_string(),
            rules_queue: "rules_response_queue".to_string(),
            logs_queue: "logs_queue".to_string(),
            actuator_logs_queue: "logs_aktuator_queue".to_string(),
            monitoring_queue: "monitoring_response_queue".to_string(),
        };
        let sync = CloudSync::new(publisher.clone(), targets, NODE);
        (store.clone(), publisher, AppState::new(store, sync))
    }

    fn registration(guid: &str, device_type: &str) -> serde_json::Value {
        serde_json::json!({
            "guid": guid,
            "mac": format!("mac-{guid}"),
            "type": device_type,
            "quantity": 1,
            "name": format!("name-{guid}"),
            "version": "1",
            "minor": "0"
        })
    }

    async fn deliver(state: &AppState, kind: InboundKind, payload: impl Into<Vec<u8>>) -> Result<(), BrokerError> {
        InboundHandler::new(kind, state.clone())
            .handle(payload.into())
            .await
    }

    #[tokio::test]
    async fn registration_rules_and_sensor_routes() {
        let (store, publisher, state) = state();
        for (guid, device_type) in [("s1", "SENSOR"), ("a1", "AKTUATOR")] {
            deliver(&state, InboundKind::LocalRegistration, registration(guid, device_type).to_string())
                .await
                .expect("registration");
        }
        deliver(
            &state,
            InboundKind::Rules,
            serde_json::json!({ "input_guid": "s1", "output_guid": ["a1"] }).to_string(),
        )
        .await
        .expect("rules");
        deliver(&state, InboundKind::Sensor, "s1#1").await.expect("sensor");

        let actuator = store.find_device("a1").await.expect("find").expect("a1");
        assert_eq!(actuator.status, "0");
        assert!(publisher
            .published()
            .iter()
            .any(|message| message.is_topic("aktuator") && message.payload_text() == "a1#0"));
    }

    #[tokio::test]
    async fn malformed_payloads_are_rejected() {
        let (_, _, state) = state();
        assert!(deliver(&state, InboundKind::Sensor, "s1").await.is_err());
        assert!(deliver(&state, InboundKind::Monitoring, "a#b#c").await.is_err());
        assert!(deliver(&state, InboundKind::LocalRegistration, "{not json").await.is_err());
        assert!(deliver(&state, InboundKind::ActuatorEcho, "anything").await.is_ok());
    }

    #[tokio::test]
    async fn cloud_routes_drop_foreign_messages() {
        let (store, publisher, state) = state();
        let mut foreign = registration("a1", "AKTUATOR");
        foreign["mac_server"] = serde_json::json!("other");
        assert!(deliver(&state, InboundKind::CloudRegistration, foreign.to_string()).await.is_err());
        assert!(store.find_device("a1").await.expect("find").is_none());

        let mut own = registration("a1", "AKTUATOR");
        own["mac_server"] = serde_json::json!(NODE);
        deliver(&state, InboundKind::CloudRegistration, own.to_string())
            .await
            .expect("registration");

        let control = serde_json::json!({ "type": "AKTUATOR", "message": "a1#1", "mac_server": "other" });
        assert!(deliver(&state, InboundKind::CloudControl, control.to_string()).await.is_err());
        let control = serde_json::json!({ "type": "AKTUATOR", "message": "a1#1", "mac_server": NODE });
        deliver(&state, InboundKind::CloudControl, control.to_string())
            .await
            .expect("control");
        assert_eq!(store.find_device("a1").await.expect("find").expect("a1").status, "1");
        assert_eq!(store.list_actuator_logs().await.expect("logs").len(), 1);

        let delete = serde_json::json!({ "guid": "a1", "mac_server": NODE });
        deliver(&state, InboundKind::CloudDelete, delete.to_string())
            .await
            .expect("delete");
        assert!(store.find_device("a1").await.expect("find").is_none());
        // 云端注册不回传；删除发送一次通知
        let published = publisher.published();
        assert!(!published.iter().any(|message| message.is_queue("register_res_cloud")));
        assert_eq!(
            published
                .iter()
                .filter(|message| message.is_queue("delete_res_cloud"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn monitoring_and_status_routes() {
        let (store, _, state) = state();
        deliver(&state, InboundKind::LocalRegistration, registration("w1", "SENSOR_WATER_TANK").to_string())
            .await
            .expect("registration");
        deliver(&state, InboundKind::Monitoring, "w1#55").await.expect("monitoring");
        deliver(&state, InboundKind::Status, "w1#56").await.expect("status");
        let device = store.find_device("w1").await.expect("find").expect("w1");
        assert_eq!(device.status, "56");
        assert_eq!(store.list_monitoring().await.expect("history").len(), 1);
        assert!(deliver(&state, InboundKind::Status, "ghost#1").await.is_err());
    }

    #[test]
    fn route_table_covers_every_inbound_channel() {
        // 环境变量只在本测试中设置
        unsafe {
            std::env::set_var("HIOTO_DATABASE_URL", "postgres://localhost/hioto");
            std::env::set_var("HIOTO_MAC_ADDRESS", NODE);
        }
        let config = AppConfig::from_env().expect("config");

        let queues: Vec<String> = local_queue_routes(&config)
            .into_iter()
            .map(|route| route.queue)
            .collect();
        assert_eq!(queues, vec!["registration_queue", "rules_queue", "control_queue"]);

        let local = local_topic_routes(&config);
        assert!(local.iter().all(|route| route.instance == "mqtt-local"));
        assert_eq!(local.len(), 4);

        let cloud: Vec<(String, InboundKind)> = cloud_topic_routes(&config)
            .into_iter()
            .map(|route| (route.topic, route.kind))
            .collect();
        assert_eq!(
            cloud,
            vec![
                (format!("control/{NODE}"), InboundKind::CloudControl),
                (format!("registration/{NODE}"), InboundKind::CloudRegistration),
                (format!("update_device/{NODE}"), InboundKind::CloudUpdate),
                (format!("delete_device/{NODE}"), InboundKind::CloudDelete),
            ]
        );

        let refreshed: Vec<InboundKind> = topic_routes(&config)
            .into_iter()
            .map(|route| route.kind)
            .collect();
        assert_eq!(
            refreshed,
            vec![
                InboundKind::Sensor,
                InboundKind::Monitoring,
                InboundKind::Status,
                InboundKind::ActuatorEcho,
                InboundKind::CloudControl,
                InboundKind::CloudRegistration,
                InboundKind::CloudUpdate,
                InboundKind::CloudDelete,
            ]
        );
    }
}
