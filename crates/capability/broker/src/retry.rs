use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 固定间隔的连接重试策略。
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// 按策略重试建立连接，返回首个成功结果或最后一次错误。
///
/// 最后一次失败后不再等待。
pub async fn connect_with_retry<T, E, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut current = 1;
    loop {
        match attempt(current).await {
            Ok(value) => {
                info!(target: "hioto.broker", label = %label, attempt = current, "broker_connected");
                return Ok(value);
            }
            Err(err) if current >= max_attempts => {
                warn!(
                    target: "hioto.broker",
                    label = %label,
                    attempt = current,
                    max_attempts = max_attempts,
                    error = %err,
                    "broker_connect_exhausted"
                );
                return Err(err);
            }
            Err(err) => {
                warn!(
                    target: "hioto.broker",
                    label = %label,
                    attempt = current,
                    max_attempts = max_attempts,
                    retry_in_ms = policy.delay.as_millis() as u64,
                    error = %err,
                    "broker_connect_retry"
                );
                tokio::time::sleep(policy.delay).await;
                current += 1;
            }
        }
    }
}

/// 长期重连：每轮按策略重试，整轮失败后等待一个间隔再开始下一轮。
///
/// 取消时返回 `None`。
pub async fn connect_until_cancelled<T, E, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut round: u64 = 1;
    loop {
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return None,
            outcome = connect_with_retry(label, policy, &mut attempt) => outcome,
        };
        if let Ok(value) = outcome {
            return Some(value);
        }
        warn!(
            target: "hioto.broker",
            label = %label,
            round = round,
            retry_in_ms = policy.delay.as_millis() as u64,
            "broker_reconnect_scheduled"
        );
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(policy.delay) => {}
        }
        round += 1;
    }
}
