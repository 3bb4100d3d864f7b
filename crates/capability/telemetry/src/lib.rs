//! 追踪初始化、请求 ID 生成与进程级计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub messages_dropped: u64,
    pub rules_generated: u64,
    pub rule_evaluations: u64,
    pub rule_rows_applied: u64,
    pub rule_rows_skipped: u64,
    pub actuator_commands: u64,
    pub publish_success: u64,
    pub publish_failure: u64,
}

/// 进程级计数器。
pub struct TelemetryMetrics {
    messages_received: AtomicU64,
    messages_dropped: AtomicU64,
    rules_generated: AtomicU64,
    rule_evaluations: AtomicU64,
    rule_rows_applied: AtomicU64,
    rule_rows_skipped: AtomicU64,
    actuator_commands: AtomicU64,
    publish_success: AtomicU64,
    publish_failure: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            rules_generated: AtomicU64::new(0),
            rule_evaluations: AtomicU64::new(0),
            rule_rows_applied: AtomicU64::new(0),
            rule_rows_skipped: AtomicU64::new(0),
            actuator_commands: AtomicU64::new(0),
            publish_success: AtomicU64::new(0),
            publish_failure: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            rules_generated: self.rules_generated.load(Ordering::Relaxed),
            rule_evaluations: self.rule_evaluations.load(Ordering::Relaxed),
            rule_rows_applied: self.rule_rows_applied.load(Ordering::Relaxed),
            rule_rows_skipped: self.rule_rows_skipped.load(Ordering::Relaxed),
            actuator_commands: self.actuator_commands.load(Ordering::Relaxed),
            publish_success: self.publish_success.load(Ordering::Relaxed),
            publish_failure: self.publish_failure.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info，可用 RUST_LOG 覆盖）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录收到的消息（队列或 topic）。
pub fn record_message_received() {
    metrics().messages_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录因解码/校验/来源不符而丢弃的消息。
pub fn record_message_dropped() {
    metrics().messages_dropped.fetch_add(1, Ordering::Relaxed);
}

/// 记录生成的规则行数。
pub fn record_rules_generated(count: u64) {
    metrics().rules_generated.fetch_add(count, Ordering::Relaxed);
}

/// 记录一次传感器规则求值。
pub fn record_rule_evaluation() {
    metrics().rule_evaluations.fetch_add(1, Ordering::Relaxed);
}

/// 记录成功应用的规则行。
pub fn record_rule_row_applied() {
    metrics().rule_rows_applied.fetch_add(1, Ordering::Relaxed);
}

/// 记录被跳过的规则行（执行器缺失或写入失败）。
pub fn record_rule_row_skipped() {
    metrics().rule_rows_skipped.fetch_add(1, Ordering::Relaxed);
}

/// 记录执行器直接控制次数（事务提交成功）。
pub fn record_actuator_command() {
    metrics().actuator_commands.fetch_add(1, Ordering::Relaxed);
}

/// 记录发布成功。
pub fn record_publish_success() {
    metrics().publish_success.fetch_add(1, Ordering::Relaxed);
}

/// 记录发布失败（仅记日志，不重试）。
pub fn record_publish_failure() {
    metrics().publish_failure.fetch_add(1, Ordering::Relaxed);
}
