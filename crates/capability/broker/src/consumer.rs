use crate::error::BrokerError;
use async_trait::async_trait;
use hioto_telemetry::record_message_received;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// 消息处理器（队列与 topic 共用）。
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, payload: Vec<u8>) -> Result<(), BrokerError>;
}

/// 一次队列消费会话（连接 + 通道 + 消费流）。
#[async_trait]
pub trait QueueSession: Send {
    /// 下一条消息；`None` 表示流已结束。
    async fn next(&mut self) -> Option<Result<Vec<u8>, BrokerError>>;
    async fn close(self: Box<Self>);
}

/// 队列传输：建立消费会话。
#[async_trait]
pub trait QueueTransport: Send + Sync {
    async fn open(&self, queue: &str) -> Result<Box<dyn QueueSession>, BrokerError>;
}

/// Topic 传输：订阅返回该订阅的任务组。
#[async_trait]
pub trait TopicTransport: Send + Sync {
    async fn subscribe(
        &self,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<TaskTracker, BrokerError>;
    async fn unsubscribe(&self, topic: &str) -> Result<(), BrokerError>;
}

/// 队列消费参数。
#[derive(Debug, Clone, Copy)]
pub struct QueueConsumerConfig {
    pub workers: usize,
    pub buffer: usize,
    pub reconnect_delay: Duration,
}

impl Default for QueueConsumerConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            buffer: 100,
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// 队列模式消费：会话结束后若未取消则等待并重连。
pub async fn run_queue_consumer(
    transport: Arc<dyn QueueTransport>,
    queue: String,
    handler: Arc<dyn MessageHandler>,
    config: QueueConsumerConfig,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            break;
        }
        match transport.open(&queue).await {
            Ok(session) => {
                info!(target: "hioto.broker", queue = %queue, workers = config.workers, "queue_consumer_started");
                consume_session(session, &queue, handler.clone(), config, &cancel).await;
            }
            Err(err) => {
                warn!(target: "hioto.broker", queue = %queue, error = %err, "queue_consumer_setup_failed");
            }
        }
        if cancel.is_cancelled() {
            break;
        }
        warn!(
            target: "hioto.broker",
            queue = %queue,
            retry_in_ms = config.reconnect_delay.as_millis() as u64,
            "queue_consumer_reconnect"
        );
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }
    info!(target: "hioto.broker", queue = %queue, "queue_consumer_stopped");
}

async fn consume_session(
    mut session: Box<dyn QueueSession>,
    queue: &str,
    handler: Arc<dyn MessageHandler>,
    config: QueueConsumerConfig,
    cancel: &CancellationToken,
) {
    let (sender, receiver) = mpsc::channel::<Vec<u8>>(config.buffer.max(1));
    let receiver = Arc::new(Mutex::new(receiver));
    let workers = TaskTracker::new();
    for worker_id in 0..config.workers.max(1) {
        let receiver = receiver.clone();
        let handler = handler.clone();
        let queue = queue.to_string();
        workers.spawn(async move {
            loop {
                let payload = { receiver.lock().await.recv().await };
                let Some(payload) = payload else {
                    break;
                };
                if let Err(err) = handler.handle(payload).await {
                    warn!(
                        target: "hioto.broker",
                        queue = %queue,
                        worker_id = worker_id,
                        error = %err,
                        "queue_message_failed"
                    );
                }
            }
        });
    }
    workers.close();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            delivery = session.next() => match delivery {
                Some(Ok(payload)) => {
                    record_message_received();
                    if sender.send(payload).await.is_err() {
                        break;
                    }
                }
                Some(Err(err)) => {
                    warn!(target: "hioto.broker", queue = %queue, error = %err, "queue_delivery_failed");
                    break;
                }
                None => {
                    warn!(target: "hioto.broker", queue = %queue, "queue_stream_closed");
                    break;
                }
            }
        }
    }

    // 关闭缓冲，worker 处理完剩余消息后退出。
    drop(sender);
    workers.wait().await;
    session.close().await;
}

/// Topic 模式消费：订阅失败按间隔重试；取消后退订并等待处理中的消息。
pub async fn run_topic_consumer(
    transport: Arc<dyn TopicTransport>,
    topic: String,
    handler: Arc<dyn MessageHandler>,
    retry_delay: Duration,
    drain_timeout: Duration,
    cancel: CancellationToken,
) {
    let tracker = loop {
        match transport.subscribe(&topic, handler.clone()).await {
            Ok(tracker) => break tracker,
            Err(err) => {
                warn!(target: "hioto.broker", topic = %topic, error = %err, "topic_subscribe_failed");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(retry_delay) => {}
                }
            }
        }
    };
    info!(target: "hioto.broker", topic = %topic, "topic_consumer_started");

    cancel.cancelled().await;

    if let Err(err) = transport.unsubscribe(&topic).await {
        warn!(target: "hioto.broker", topic = %topic, error = %err, "topic_unsubscribe_failed");
    }
    tracker.close();
    if tokio::time::timeout(drain_timeout, tracker.wait()).await.is_err() {
        warn!(
            target: "hioto.broker",
            topic = %topic,
            in_flight = tracker.len(),
            "topic_drain_timeout"
        );
    }
    info!(target: "hioto.broker", topic = %topic, "topic_consumer_stopped");
}
