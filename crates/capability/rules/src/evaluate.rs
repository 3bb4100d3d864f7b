use crate::{RuleError, RuleService};
use domain::{DeviceCommand, now_epoch_ms};
use hioto_storage::{RuleLogRecord, RuleRecord};
use hioto_telemetry::{record_rule_evaluation, record_rule_row_applied, record_rule_row_skipped};
use tracing::{info, warn};

/// 一次传感器求值的结果统计。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationReport {
    pub matched: usize,
    pub applied: usize,
    pub skipped: usize,
}

impl RuleService {
    /// 对传感器读数求值并驱动执行器。
    ///
    /// 每一行独立处理：执行器缺失或写入失败时跳过该行，继续下一行。
    pub async fn evaluate(&self, reading: &DeviceCommand) -> Result<EvaluationReport, RuleError> {
        record_rule_evaluation();
        let matched = self
            .rules
            .find_matching_rules(&reading.guid, &reading.value)
            .await
            .map_err(|err| RuleError::Storage(err.to_string()))?;
        let mut report = EvaluationReport {
            matched: matched.len(),
            ..EvaluationReport::default()
        };
        if matched.is_empty() {
            info!(
                target: "hioto.rules",
                sensor_guid = %reading.guid,
                value = %reading.value,
                "rule_no_match"
            );
            return Ok(report);
        }

        let sensor_name = match self.devices.find_device(&reading.guid).await {
            Ok(Some(sensor)) => sensor.name,
            _ => reading.guid.clone(),
        };

        for rule in &matched {
            if self.apply_row(reading, &sensor_name, rule).await {
                record_rule_row_applied();
                report.applied += 1;
            } else {
                record_rule_row_skipped();
                report.skipped += 1;
            }
        }
        info!(
            target: "hioto.rules",
            sensor_guid = %reading.guid,
            value = %reading.value,
            matched = report.matched,
            applied = report.applied,
            skipped = report.skipped,
            "rule_evaluated"
        );
        Ok(report)
    }

    async fn apply_row(&self, reading: &DeviceCommand, sensor_name: &str, rule: &RuleRecord) -> bool {
        match self.devices.find_device(&rule.output_guid).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(target: "hioto.rules", rule_id = rule.id, actuator_guid = %rule.output_guid, "rule_actuator_missing");
                return false;
            }
            Err(err) => {
                warn!(target: "hioto.rules", rule_id = rule.id, actuator_guid = %rule.output_guid, error = %err, "rule_actuator_lookup_failed");
                return false;
            }
        }

        let now = now_epoch_ms();
        let actuator = match self
            .devices
            .update_device_status(&rule.output_guid, &rule.output_value, now)
            .await
        {
            Ok(Some(actuator)) => actuator,
            Ok(None) => {
                warn!(target: "hioto.rules", rule_id = rule.id, actuator_guid = %rule.output_guid, "rule_actuator_missing");
                return false;
            }
            Err(err) => {
                warn!(target: "hioto.rules", rule_id = rule.id, actuator_guid = %rule.output_guid, error = %err, "rule_status_update_failed");
                return false;
            }
        };

        let log = RuleLogRecord {
            id: 0,
            input_guid: reading.guid.clone(),
            input_name: sensor_name.to_string(),
            input_value: reading.value.clone(),
            output_guid: actuator.guid.clone(),
            output_value: rule.output_value.clone(),
            time_ms: now,
        };
        if let Err(err) = self.logs.create_rule_log(log).await {
            warn!(target: "hioto.rules", rule_id = rule.id, actuator_guid = %actuator.guid, error = %err, "rule_log_failed");
            return false;
        }

        self.sync
            .command_actuator(&DeviceCommand::new(
                actuator.guid.clone(),
                rule.output_value.clone(),
            ))
            .await;
        info!(
            target: "hioto.rules",
            actuator_guid = %actuator.guid,
            actuator_name = %actuator.name,
            value = %rule.output_value,
            "rule_applied"
        );
        self.sync.device_updated(&actuator).await;
        true
    }
}
