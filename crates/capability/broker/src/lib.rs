//! 消息代理能力：连接注册表、重试、AMQP/MQTT 传输、消费者与发布器。
//!
//! - 队列模式：固定 worker 池 + 有界缓冲，取消后排空并按间隔重连
//! - Topic 模式：每条消息一个任务，按订阅分组跟踪，关闭时带超时等待
//! - 发布：对调用方只记录日志，不回滚本地状态

pub mod amqp;
pub mod consumer;
pub mod error;
pub mod mqtt;
pub mod publisher;
pub mod registry;
pub mod retry;
pub mod supervisor;

pub use amqp::{AmqpQueueTransport, queue_arguments};
pub use consumer::{
    MessageHandler, QueueConsumerConfig, QueueSession, QueueTransport, TopicTransport,
    run_queue_consumer, run_topic_consumer,
};
pub use error::BrokerError;
pub use mqtt::{MqttClient, MqttInstanceConfig};
pub use publisher::{
    BrokerPublisher, MessagePublisher, PublishTarget, PublishedMessage, RecordingPublisher,
};
pub use registry::{BrokerRegistry, NamedRegistry, NamedTopicTransport, TopicTransportSource};
pub use retry::{RetryPolicy, connect_until_cancelled, connect_with_retry};
pub use supervisor::run_with_refresh;
