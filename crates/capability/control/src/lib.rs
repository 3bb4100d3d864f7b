//! 设备控制与设备生命周期。
//!
//! - [`ControlService`]：控制消息分发（SENSOR 走规则求值，其余走事务化执行器写入）
//! - [`DeviceService`]：注册、更新、删除（含规则级联）、监测与心跳

pub mod device;
pub mod dispatch;

pub use device::{DeviceRemoval, DeviceService};
pub use dispatch::{ControlOutcome, ControlService};

use domain::CommandParseError;
use hioto_rules::RuleError;
use hioto_storage::{StorageError, StoreTransaction};
use tracing::warn;

/// 控制链路错误。
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("foreign origin: {0}")]
    ForeignOrigin(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error(transparent)]
    Rule(#[from] RuleError),
}

impl From<StorageError> for ControlError {
    fn from(err: StorageError) -> Self {
        ControlError::Storage(err.to_string())
    }
}

impl From<CommandParseError> for ControlError {
    fn from(err: CommandParseError) -> Self {
        ControlError::Validation(err.to_string())
    }
}

/// 云端消息必须携带本节点标识。
pub(crate) fn ensure_origin(node_identity: &str, mac_server: Option<&str>) -> Result<(), ControlError> {
    match mac_server {
        Some(mac) if mac == node_identity => Ok(()),
        Some(mac) => Err(ControlError::ForeignOrigin(format!("mac_server {mac} does not match"))),
        None => Err(ControlError::ForeignOrigin("mac_server is missing".to_string())),
    }
}

/// `outcome` 成功时提交，否则回滚。
pub(crate) async fn finish<T>(
    tx: Box<dyn StoreTransaction>,
    outcome: Result<T, ControlError>,
    target_guid: &str,
) -> Result<T, ControlError> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(
                    target: "hioto.control",
                    guid = %target_guid,
                    error = %rollback_err,
                    "transaction_rollback_failed"
                );
            }
            Err(err)
        }
    }
}
