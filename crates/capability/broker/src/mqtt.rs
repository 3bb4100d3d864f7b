//! MQTT 传输（rumqttc）：共享连接 + 订阅表，重连后自动重新订阅。

use crate::consumer::{MessageHandler, TopicTransport};
use crate::error::BrokerError;
use async_trait::async_trait;
use dashmap::DashMap;
use hioto_telemetry::record_message_received;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// MQTT 实例配置。
#[derive(Debug, Clone)]
pub struct MqttInstanceConfig {
    pub instance_name: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    /// 断线后重连间隔上限。
    pub reconnect_interval: Duration,
}

struct Subscription {
    handler: Arc<dyn MessageHandler>,
    tracker: TaskTracker,
}

/// 已连接的 MQTT 客户端句柄。
///
/// 订阅表独立于底层连接，重连后全部重新订阅。
#[derive(Clone)]
pub struct MqttClient {
    name: String,
    client: AsyncClient,
    subscriptions: Arc<DashMap<String, Subscription>>,
    shutdown: CancellationToken,
}

impl MqttClient {
    /// 单次连接：收到 ConnAck 后启动事件循环任务。
    pub async fn open(config: MqttInstanceConfig) -> Result<Self, BrokerError> {
        let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) =
            (config.username.as_ref(), config.password.as_ref())
        {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 10);
        wait_for_connack(&mut eventloop).await?;

        let handle = Self {
            name: config.instance_name.clone(),
            client,
            subscriptions: Arc::new(DashMap::new()),
            shutdown: CancellationToken::new(),
        };
        tokio::spawn(drive(
            handle.clone(),
            eventloop,
            config.reconnect_interval,
        ));
        info!(target: "hioto.broker", instance = %config.instance_name, host = %config.host, port = config.port, "mqtt_connected");
        Ok(handle)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// QoS 0 发布，等待请求写入本地发送队列。
    pub async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .await
            .map_err(|err| BrokerError::Publish(err.to_string()))
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// 断开连接并停止事件循环。
    pub async fn disconnect(&self) {
        if let Err(err) = self.client.disconnect().await {
            warn!(target: "hioto.broker", instance = %self.name, error = %err, "mqtt_disconnect_failed");
        }
        self.shutdown.cancel();
        info!(target: "hioto.broker", instance = %self.name, "mqtt_closed");
    }

    fn dispatch(&self, topic: &str, payload: &[u8]) {
        let mut matched = false;
        for entry in self.subscriptions.iter() {
            if !rumqttc::mqttbytes::matches(topic, entry.key()) {
                continue;
            }
            matched = true;
            record_message_received();
            let handler = entry.value().handler.clone();
            let payload = payload.to_vec();
            let topic = topic.to_string();
            entry.value().tracker.spawn(async move {
                if let Err(err) = handler.handle(payload).await {
                    warn!(target: "hioto.broker", topic = %topic, error = %err, "topic_message_failed");
                }
            });
        }
        if !matched {
            warn!(target: "hioto.broker", instance = %self.name, topic = %topic, "mqtt_message_unrouted");
        }
    }

    fn subscribed_topics(&self) -> Vec<String> {
        self.subscriptions
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }
}

/// 订阅请求通道（rumqttc 客户端的请求队列）。
#[async_trait]
pub(crate) trait SubscribeRequests: Send + Sync {
    /// 写入一条订阅请求；队列满时等待。
    async fn request_subscribe(&self, topic: &str) -> Result<(), BrokerError>;
}

#[async_trait]
impl SubscribeRequests for AsyncClient {
    async fn request_subscribe(&self, topic: &str) -> Result<(), BrokerError> {
        self.subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|err| BrokerError::Subscribe(err.to_string()))
    }
}

/// 重连后逐个重新订阅，返回成功写入的数量。
///
/// 请求队列可能被断线期间积压的发布占满，这里按序等待而不是丢弃。
pub(crate) async fn resubscribe_topics(
    instance: &str,
    requests: &dyn SubscribeRequests,
    topics: Vec<String>,
) -> usize {
    let total = topics.len();
    let mut restored = 0;
    for topic in topics {
        match requests.request_subscribe(&topic).await {
            Ok(()) => restored += 1,
            Err(err) => {
                warn!(target: "hioto.broker", instance = %instance, topic = %topic, error = %err, "mqtt_resubscribe_failed");
            }
        }
    }
    info!(target: "hioto.broker", instance = %instance, restored = restored, total = total, "mqtt_resubscribed");
    restored
}

#[async_trait]
impl TopicTransport for MqttClient {
    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<TaskTracker, BrokerError> {
        let tracker = TaskTracker::new();
        self.subscriptions.insert(
            topic.to_string(),
            Subscription {
                handler,
                tracker: tracker.clone(),
            },
        );
        if let Err(err) = self.client.subscribe(topic, QoS::AtMostOnce).await {
            self.subscriptions.remove(topic);
            return Err(BrokerError::Subscribe(err.to_string()));
        }
        info!(target: "hioto.broker", instance = %self.name, topic = %topic, "mqtt_subscribed");
        Ok(tracker)
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), BrokerError> {
        self.subscriptions.remove(topic);
        self.client
            .unsubscribe(topic)
            .await
            .map_err(|err| BrokerError::Subscribe(err.to_string()))?;
        info!(target: "hioto.broker", instance = %self.name, topic = %topic, "mqtt_unsubscribed");
        Ok(())
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), BrokerError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(_) => {}
            Err(err) => return Err(BrokerError::Connect(err.to_string())),
        }
    }
}

async fn drive(handle: MqttClient, mut eventloop: EventLoop, reconnect_interval: Duration) {
    loop {
        tokio::select! {
            _ = handle.shutdown.cancelled() => break,
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    handle.dispatch(&publish.topic, &publish.payload);
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!(target: "hioto.broker", instance = %handle.name, "mqtt_reconnected");
                    // 事件循环必须继续 poll 才能腾出请求队列，订阅放到独立任务里等待。
                    let topics = handle.subscribed_topics();
                    if !topics.is_empty() {
                        let client = handle.client.clone();
                        let instance = handle.name.clone();
                        tokio::spawn(async move {
                            resubscribe_topics(&instance, &client, topics).await;
                        });
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(target: "hioto.broker", instance = %handle.name, error = %err, "mqtt_connection_lost");
                    tokio::select! {
                        _ = handle.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(reconnect_interval) => {}
                    }
                }
            }
        }
    }
}
