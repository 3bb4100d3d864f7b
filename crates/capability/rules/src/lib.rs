//! 规则引擎：真值表生成与传感器读数求值。
//!
//! 一个传感器绑定 N 个执行器（1..=8）时生成 2^N × N 行规则。
//! 模式串第 i 位为 `'1'` 时第 i 个执行器输出 `"0"`，否则输出 `"1"`（反相表）。

pub mod evaluate;
pub mod generate;

pub use evaluate::EvaluationReport;
pub use generate::{MAX_RULE_ACTUATORS, generate_patterns, generate_rule_rows, output_level};

use hioto_storage::{DeviceStore, LogStore, RuleStore};
use hioto_sync::CloudSync;
use std::sync::Arc;

/// 规则错误。
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// 规则服务（生成、查询、删除、求值）。
#[derive(Clone)]
pub struct RuleService {
    devices: Arc<dyn DeviceStore>,
    rules: Arc<dyn RuleStore>,
    logs: Arc<dyn LogStore>,
    sync: CloudSync,
}

impl RuleService {
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        rules: Arc<dyn RuleStore>,
        logs: Arc<dyn LogStore>,
        sync: CloudSync,
    ) -> Self {
        Self {
            devices,
            rules,
            logs,
            sync,
        }
    }

    pub fn node_identity(&self) -> &str {
        self.sync.node_identity()
    }
}
