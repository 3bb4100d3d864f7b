use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 周期性重建一组消费路由。
///
/// 每个周期派生子 token 启动路由；到达刷新间隔后取消并等待全部退出再重建。
/// `refresh` 为 `None` 时只运行一个周期直到外部取消。
pub async fn run_with_refresh<F>(cancel: CancellationToken, refresh: Option<Duration>, spawn_routes: F)
where
    F: Fn(CancellationToken) -> Vec<JoinHandle<()>>,
{
    let mut cycle_no: u64 = 0;
    loop {
        cycle_no += 1;
        let cycle = cancel.child_token();
        let handles = spawn_routes(cycle.clone());
        info!(target: "hioto.broker", cycle = cycle_no, routes = handles.len(), "routes_started");

        let restart = match refresh {
            Some(interval) => tokio::select! {
                _ = cancel.cancelled() => false,
                _ = tokio::time::sleep(interval) => true,
            },
            None => {
                cancel.cancelled().await;
                false
            }
        };

        cycle.cancel();
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(target: "hioto.broker", error = %err, "route_task_failed");
            }
        }
        if !restart {
            break;
        }
        warn!(target: "hioto.broker", cycle = cycle_no, "routes_refreshing");
    }
    info!(target: "hioto.broker", "routes_stopped");
}
