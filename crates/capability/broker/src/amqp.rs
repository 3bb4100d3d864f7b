//! AMQP 传输（lapin）。

use crate::consumer::{QueueSession, QueueTransport};
use crate::error::BrokerError;
use crate::retry::{RetryPolicy, connect_with_retry};
use async_trait::async_trait;
use futures::StreamExt;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::{info, warn};

/// 队列声明参数：带消息 TTL。
pub fn queue_arguments(message_ttl_ms: i32) -> FieldTable {
    let mut arguments = FieldTable::default();
    arguments.insert("x-message-ttl".into(), AMQPValue::LongInt(message_ttl_ms));
    arguments
}

/// 单次建立 AMQP 连接。
pub async fn open(uri: &str) -> Result<Connection, BrokerError> {
    Connection::connect(uri, ConnectionProperties::default())
        .await
        .map_err(|err| BrokerError::Connect(err.to_string()))
}

/// 带重试地建立 AMQP 连接。
pub async fn connect(label: &str, uri: &str, policy: &RetryPolicy) -> Result<Connection, BrokerError> {
    connect_with_retry(label, policy, |_| open(uri)).await
}

/// 幂等声明持久队列（带 TTL）。
pub async fn declare_queue(
    channel: &Channel,
    queue: &str,
    message_ttl_ms: i32,
) -> Result<(), BrokerError> {
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            queue_arguments(message_ttl_ms),
        )
        .await
        .map_err(|err| BrokerError::Declare(err.to_string()))?;
    Ok(())
}

/// 发布到队列：声明队列后经交换机按队列名路由，非持久、无确认。
pub async fn publish_to_queue(
    connection: &Connection,
    payload: &[u8],
    queue: &str,
    exchange: &str,
    message_ttl_ms: i32,
) -> Result<(), BrokerError> {
    let channel = connection.create_channel().await?;
    declare_queue(&channel, queue, message_ttl_ms).await?;
    // 默认交换机按队列名直连；具名交换机需要绑定后才能路由到队列。
    if !exchange.is_empty() {
        channel
            .queue_bind(
                queue,
                exchange,
                queue,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|err| BrokerError::Declare(err.to_string()))?;
    }
    channel
        .basic_publish(
            exchange,
            queue,
            BasicPublishOptions::default(),
            payload,
            BasicProperties::default(),
        )
        .await
        .map_err(|err| BrokerError::Publish(err.to_string()))?;
    close_publish_channel(&channel).await;
    Ok(())
}

/// 发布到 topic 交换机（幂等声明）。
pub async fn publish_to_routing_key(
    connection: &Connection,
    payload: &[u8],
    exchange: &str,
    routing_key: &str,
) -> Result<(), BrokerError> {
    let channel = connection.create_channel().await?;
    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|err| BrokerError::Declare(err.to_string()))?;
    channel
        .basic_publish(
            exchange,
            routing_key,
            BasicPublishOptions::default(),
            payload,
            BasicProperties::default(),
        )
        .await
        .map_err(|err| BrokerError::Publish(err.to_string()))?;
    close_publish_channel(&channel).await;
    Ok(())
}

async fn close_publish_channel(channel: &Channel) {
    if let Err(err) = channel.close(200, "OK").await {
        warn!(target: "hioto.broker", error = %err, "amqp_channel_close_failed");
    }
}

/// 队列消费传输：每个会话独立建立连接。
#[derive(Debug, Clone)]
pub struct AmqpQueueTransport {
    label: String,
    uri: String,
    message_ttl_ms: i32,
    policy: RetryPolicy,
}

impl AmqpQueueTransport {
    pub fn new(
        label: impl Into<String>,
        uri: impl Into<String>,
        message_ttl_ms: i32,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            label: label.into(),
            uri: uri.into(),
            message_ttl_ms,
            policy,
        }
    }
}

#[async_trait]
impl QueueTransport for AmqpQueueTransport {
    async fn open(&self, queue: &str) -> Result<Box<dyn QueueSession>, BrokerError> {
        let connection = connect(&self.label, &self.uri, &self.policy).await?;
        let channel = connection.create_channel().await?;
        declare_queue(&channel, queue, self.message_ttl_ms).await?;
        let consumer_tag = format!("hioto-{}", uuid::Uuid::new_v4());
        let consumer = channel
            .basic_consume(
                queue,
                &consumer_tag,
                BasicConsumeOptions {
                    no_ack: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|err| BrokerError::Consume(err.to_string()))?;
        info!(target: "hioto.broker", label = %self.label, queue = %queue, consumer_tag = %consumer_tag, "amqp_consume_started");
        Ok(Box::new(AmqpQueueSession {
            connection,
            channel,
            consumer,
        }))
    }
}

struct AmqpQueueSession {
    connection: Connection,
    channel: Channel,
    consumer: lapin::Consumer,
}

#[async_trait]
impl QueueSession for AmqpQueueSession {
    async fn next(&mut self) -> Option<Result<Vec<u8>, BrokerError>> {
        let delivery = self.consumer.next().await?;
        Some(
            delivery
                .map(|delivery| delivery.data)
                .map_err(|err| BrokerError::Consume(err.to_string())),
        )
    }

    async fn close(self: Box<Self>) {
        if let Err(err) = self.channel.close(200, "OK").await {
            warn!(target: "hioto.broker", error = %err, "amqp_channel_close_failed");
        }
        if self.connection.status().connected() {
            if let Err(err) = self.connection.close(200, "OK").await {
                warn!(target: "hioto.broker", error = %err, "amqp_connection_close_failed");
            }
        }
    }
}
