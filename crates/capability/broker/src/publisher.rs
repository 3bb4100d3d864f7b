use crate::amqp;
use crate::error::BrokerError;
use crate::registry::BrokerRegistry;
use async_trait::async_trait;
use hioto_telemetry::{record_publish_failure, record_publish_success};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// 出站发布抽象。
///
/// 返回值仅供调用方记录；云端同步失败不回滚本地状态。
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// 发布到队列（幂等声明，带 TTL）。
    async fn publish_queue(
        &self,
        instance: &str,
        payload: &[u8],
        queue: &str,
        exchange: &str,
    ) -> Result<(), BrokerError>;

    /// 发布到 topic 交换机的路由键。
    async fn publish_routing_key(
        &self,
        instance: &str,
        payload: &[u8],
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError>;

    /// MQTT QoS 0 发布。
    async fn publish_topic(
        &self,
        instance: &str,
        topic: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError>;
}

/// 基于连接注册表的发布器。
pub struct BrokerPublisher {
    registry: Arc<BrokerRegistry>,
    message_ttl_ms: i32,
}

impl BrokerPublisher {
    pub fn new(registry: Arc<BrokerRegistry>, message_ttl_ms: i32) -> Self {
        Self {
            registry,
            message_ttl_ms,
        }
    }
}

fn report(kind: &'static str, instance: &str, destination: &str, size: usize, result: &Result<(), BrokerError>) {
    match result {
        Ok(()) => {
            record_publish_success();
            info!(
                target: "hioto.broker",
                kind = kind,
                instance = %instance,
                destination = %destination,
                payload_size = size,
                "message_published"
            );
        }
        Err(err) => {
            record_publish_failure();
            warn!(
                target: "hioto.broker",
                kind = kind,
                instance = %instance,
                destination = %destination,
                error = %err,
                "message_publish_failed"
            );
        }
    }
}

#[async_trait]
impl MessagePublisher for BrokerPublisher {
    async fn publish_queue(
        &self,
        instance: &str,
        payload: &[u8],
        queue: &str,
        exchange: &str,
    ) -> Result<(), BrokerError> {
        let result = match self.registry.amqp(instance) {
            Ok(connection) => {
                amqp::publish_to_queue(&connection, payload, queue, exchange, self.message_ttl_ms).await
            }
            Err(err) => Err(err),
        };
        report("queue", instance, queue, payload.len(), &result);
        result
    }

    async fn publish_routing_key(
        &self,
        instance: &str,
        payload: &[u8],
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        let result = match self.registry.amqp(instance) {
            Ok(connection) => {
                amqp::publish_to_routing_key(&connection, payload, exchange, routing_key).await
            }
            Err(err) => Err(err),
        };
        report("routing_key", instance, routing_key, payload.len(), &result);
        result
    }

    async fn publish_topic(
        &self,
        instance: &str,
        topic: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        let result = match self.registry.mqtt(instance) {
            Ok(client) => client.publish(topic, payload).await,
            Err(err) => Err(err),
        };
        report("topic", instance, topic, payload.len(), &result);
        result
    }
}

/// 发布目标类型。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishTarget {
    Queue { queue: String, exchange: String },
    RoutingKey { exchange: String, routing_key: String },
    Topic { topic: String },
}

/// 一条已记录的发布。
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub instance: String,
    pub target: PublishTarget,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    pub fn is_topic(&self, topic: &str) -> bool {
        matches!(&self.target, PublishTarget::Topic { topic: current } if current == topic)
    }

    pub fn is_queue(&self, queue: &str) -> bool {
        matches!(&self.target, PublishTarget::Queue { queue: current, .. } if current == queue)
    }
}

/// 记录型发布器（用于接线与测试）。
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        match self.messages.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => Vec::new(),
        }
    }

    fn push(&self, instance: &str, target: PublishTarget, payload: &[u8]) -> Result<(), BrokerError> {
        let mut guard = self
            .messages
            .lock()
            .map_err(|_| BrokerError::Publish("lock failed".to_string()))?;
        guard.push(PublishedMessage {
            instance: instance.to_string(),
            target,
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

#[async_trait]
impl MessagePublisher for RecordingPublisher {
    async fn publish_queue(
        &self,
        instance: &str,
        payload: &[u8],
        queue: &str,
        exchange: &str,
    ) -> Result<(), BrokerError> {
        self.push(
            instance,
            PublishTarget::Queue {
                queue: queue.to_string(),
                exchange: exchange.to_string(),
            },
            payload,
        )
    }

    async fn publish_routing_key(
        &self,
        instance: &str,
        payload: &[u8],
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        self.push(
            instance,
            PublishTarget::RoutingKey {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
            },
            payload,
        )
    }

    async fn publish_topic(
        &self,
        instance: &str,
        topic: &str,
        payload: &[u8],
    ) -> Result<(), BrokerError> {
        self.push(
            instance,
            PublishTarget::Topic {
                topic: topic.to_string(),
            },
            payload,
        )
    }
}
