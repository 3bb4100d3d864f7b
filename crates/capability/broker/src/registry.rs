use crate::amqp;
use crate::consumer::{MessageHandler, TopicTransport};
use crate::error::BrokerError;
use crate::mqtt::{MqttClient, MqttInstanceConfig};
use crate::retry::{RetryPolicy, connect_until_cancelled};
use async_trait::async_trait;
use lapin::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// 按实例名索引的句柄表。
pub struct NamedRegistry<H> {
    entries: Mutex<HashMap<String, H>>,
}

impl<H: Clone> NamedRegistry<H> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, name: impl Into<String>, handle: H) -> Result<(), BrokerError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| BrokerError::Registry("lock failed".to_string()))?;
        guard.insert(name.into(), handle);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<H, BrokerError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| BrokerError::Registry("lock failed".to_string()))?;
        guard
            .get(name)
            .cloned()
            .ok_or_else(|| BrokerError::InstanceNotFound(name.to_string()))
    }

    pub fn names(&self) -> Vec<String> {
        match self.entries.lock() {
            Ok(guard) => guard.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// 取出全部句柄并清空。
    pub fn take_all(&self) -> Vec<(String, H)> {
        match self.entries.lock() {
            Ok(mut guard) => guard.drain().collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl<H: Clone> Default for NamedRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// 连接注册表：启动时创建、关闭时统一释放，由调用方显式持有。
pub struct BrokerRegistry {
    policy: RetryPolicy,
    amqp: NamedRegistry<Arc<Connection>>,
    mqtt: NamedRegistry<MqttClient>,
}

impl BrokerRegistry {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            amqp: NamedRegistry::new(),
            mqtt: NamedRegistry::new(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 后台维持 AMQP 连接：缺失或已断开时持续重连并登记，直到取消。
    pub async fn maintain_amqp(&self, name: &str, uri: &str, cancel: CancellationToken) {
        loop {
            let healthy = self
                .amqp
                .get(name)
                .map(|connection| connection.status().connected())
                .unwrap_or(false);
            if !healthy {
                let Some(connection) =
                    connect_until_cancelled(name, &self.policy, &cancel, |_| amqp::open(uri)).await
                else {
                    break;
                };
                if let Err(err) = self.amqp.insert(name, Arc::new(connection)) {
                    warn!(target: "hioto.broker", instance = %name, error = %err, "amqp_register_failed");
                } else {
                    info!(target: "hioto.broker", instance = %name, "amqp_registered");
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
        }
    }

    /// 持续尝试建立 MQTT 连接直到成功登记或取消。
    ///
    /// 登记之后的断线由客户端事件循环自行重连。
    pub async fn maintain_mqtt(&self, config: MqttInstanceConfig, cancel: CancellationToken) {
        let name = config.instance_name.clone();
        if self.mqtt.get(&name).is_ok() {
            return;
        }
        let Some(client) =
            connect_until_cancelled(&name, &self.policy, &cancel, |_| MqttClient::open(config.clone()))
                .await
        else {
            return;
        };
        match self.mqtt.insert(name.clone(), client.clone()) {
            Ok(()) => info!(target: "hioto.broker", instance = %name, "mqtt_registered"),
            Err(err) => {
                warn!(target: "hioto.broker", instance = %name, error = %err, "mqtt_register_failed");
                client.disconnect().await;
            }
        }
    }

    pub fn amqp(&self, name: &str) -> Result<Arc<Connection>, BrokerError> {
        self.amqp.get(name)
    }

    pub fn mqtt(&self, name: &str) -> Result<MqttClient, BrokerError> {
        self.mqtt.get(name)
    }

    /// 关闭所有仍处于连接状态的句柄并清空注册表。
    pub async fn close_all(&self) {
        for (name, connection) in self.amqp.take_all() {
            if !connection.status().connected() {
                continue;
            }
            match connection.close(200, "OK").await {
                Ok(()) => info!(target: "hioto.broker", instance = %name, "amqp_closed"),
                Err(err) => {
                    warn!(target: "hioto.broker", instance = %name, error = %err, "amqp_close_failed")
                }
            }
        }
        for (_, client) in self.mqtt.take_all() {
            client.disconnect().await;
        }
    }
}

/// 按实例名解析 topic 传输。
pub trait TopicTransportSource: Send + Sync {
    fn topic_transport(&self, instance: &str) -> Result<Arc<dyn TopicTransport>, BrokerError>;
}

impl TopicTransportSource for BrokerRegistry {
    fn topic_transport(&self, instance: &str) -> Result<Arc<dyn TopicTransport>, BrokerError> {
        let transport: Arc<dyn TopicTransport> = Arc::new(self.mqtt(instance)?);
        Ok(transport)
    }
}

/// 每次订阅时才解析实例的 topic 传输。
///
/// 实例尚未连上时订阅返回 `InstanceNotFound`，由 topic 消费者按间隔重试。
pub struct NamedTopicTransport {
    source: Arc<dyn TopicTransportSource>,
    instance: String,
}

impl NamedTopicTransport {
    pub fn new(source: Arc<dyn TopicTransportSource>, instance: impl Into<String>) -> Self {
        Self {
            source,
            instance: instance.into(),
        }
    }
}

#[async_trait]
impl TopicTransport for NamedTopicTransport {
    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<TaskTracker, BrokerError> {
        self.source
            .topic_transport(&self.instance)?
            .subscribe(topic, handler)
            .await
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), BrokerError> {
        self.source
            .topic_transport(&self.instance)?
            .unsubscribe(topic)
            .await
    }
}
