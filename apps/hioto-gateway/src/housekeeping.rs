//! 定时任务
//!
//! - 日志上报：定期读取规则日志、执行器日志与监测历史，非空批次上报云端后按最大 id 清理
//! - 离线巡检：定期将超过阈值未上报的设备标记为离线

use crate::AppState;
use hioto_config::HousekeepingSettings;
use hioto_storage::StorageError;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 一轮日志上报的行数。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub rule_logs: usize,
    pub actuator_logs: usize,
    pub monitoring: usize,
}

/// 上报并清理三类日志。
///
/// 只删除本轮读到的最大 id 及之前的行，上报期间新写入的行留到下一轮。
pub async fn drain_logs(state: &AppState) -> Result<DrainSummary, StorageError> {
    let mut summary = DrainSummary::default();

    let rule_logs = state.logs.list_rule_logs().await?;
    if let Some(max_id) = rule_logs.iter().map(|log| log.id).max() {
        state.sync.rule_logs(&rule_logs).await;
        state.logs.delete_rule_logs_through(max_id).await?;
        summary.rule_logs = rule_logs.len();
    }

    let actuator_logs = state.logs.list_actuator_logs().await?;
    if let Some(max_id) = actuator_logs.iter().map(|log| log.id).max() {
        state.sync.actuator_logs(&actuator_logs).await;
        state.logs.delete_actuator_logs_through(max_id).await?;
        summary.actuator_logs = actuator_logs.len();
    }

    let monitoring = state.logs.list_monitoring().await?;
    if let Some(max_id) = monitoring.iter().map(|record| record.id).max() {
        state.sync.monitoring(&monitoring).await;
        state.logs.delete_monitoring_through(max_id).await?;
        summary.monitoring = monitoring.len();
    }

    Ok(summary)
}

/// 启动日志上报与离线巡检任务。
pub fn spawn_housekeeping(
    state: AppState,
    settings: &HousekeepingSettings,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let drain_every = Duration::from_secs(settings.log_drain_seconds.max(1));
    let sweep_every = Duration::from_secs(settings.inactive_sweep_seconds.max(1));
    let threshold = Duration::from_secs(settings.inactive_threshold_seconds);

    let drain_state = state.clone();
    let drain_cancel = cancel.clone();
    let drain = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(drain_every);
        // 首次 tick 立即返回，跳过以免启动即上报
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = drain_cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match drain_logs(&drain_state).await {
                Ok(summary) => info!(
                    target: "hioto.housekeeping",
                    rule_logs = summary.rule_logs,
                    actuator_logs = summary.actuator_logs,
                    monitoring = summary.monitoring,
                    "logs_drained"
                ),
                Err(err) => warn!(target: "hioto.housekeeping", error = %err, "logs_drain_failed"),
            }
        }
    });

    let sweep = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match state.devices.mark_inactive(threshold).await {
                Ok(marked) => info!(target: "hioto.housekeeping", marked = marked, "inactive_devices_marked"),
                Err(err) => warn!(target: "hioto.housekeeping", error = %err, "inactive_sweep_failed"),
            }
        }
    });

    vec![drain, sweep]
}
