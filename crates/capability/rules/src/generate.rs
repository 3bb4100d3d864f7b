use crate::{RuleError, RuleService};
use domain::now_epoch_ms;
use hioto_storage::RuleRecord;
use hioto_telemetry::record_rules_generated;
use tracing::{info, warn};

/// 单个传感器最多绑定的执行器数量。
pub const MAX_RULE_ACTUATORS: usize = 8;

/// 生成 `width` 位、左侧补零的全部二进制模式（升序）。
pub fn generate_patterns(width: usize) -> Vec<String> {
    (0..1usize << width)
        .map(|value| format!("{value:0width$b}"))
        .collect()
}

/// 模式位对应的执行器输出（反相）。
pub fn output_level(bit: u8) -> &'static str {
    if bit == b'1' { "0" } else { "1" }
}

/// 按模式 × 执行器展开规则行（未落库，`id` 为 0）。
pub fn generate_rule_rows(
    sensor_guid: &str,
    actuator_guids: &[String],
    created_at_ms: i64,
) -> Vec<RuleRecord> {
    let patterns = generate_patterns(actuator_guids.len());
    let mut rows = Vec::with_capacity(patterns.len() * actuator_guids.len());
    for pattern in &patterns {
        let bits = pattern.as_bytes();
        for (index, actuator_guid) in actuator_guids.iter().enumerate() {
            rows.push(RuleRecord {
                id: 0,
                input_guid: sensor_guid.to_string(),
                input_value: pattern.clone(),
                output_guid: actuator_guid.clone(),
                output_value: output_level(bits[index]).to_string(),
                created_at_ms,
                updated_at_ms: created_at_ms,
            });
        }
    }
    rows
}

impl RuleService {
    /// 校验设备存在后生成、持久化并整批上报规则。
    ///
    /// 重复调用会追加新行，不去重。
    pub async fn create_rules(
        &self,
        sensor_guid: &str,
        actuator_guids: &[String],
    ) -> Result<Vec<RuleRecord>, RuleError> {
        if actuator_guids.is_empty() || actuator_guids.len() > MAX_RULE_ACTUATORS {
            return Err(RuleError::Validation(format!(
                "output_guid must contain 1..={} actuators, got {}",
                MAX_RULE_ACTUATORS,
                actuator_guids.len()
            )));
        }

        let sensor = self
            .devices
            .find_device(sensor_guid)
            .await
            .map_err(|err| RuleError::Storage(err.to_string()))?;
        if sensor.is_none() {
            warn!(target: "hioto.rules", sensor_guid = %sensor_guid, "rule_sensor_not_found");
            return Err(RuleError::NotFound("sensor is not found".to_string()));
        }
        for actuator_guid in actuator_guids {
            let actuator = self
                .devices
                .find_device(actuator_guid)
                .await
                .map_err(|err| RuleError::Storage(err.to_string()))?;
            if actuator.is_none() {
                warn!(target: "hioto.rules", actuator_guid = %actuator_guid, "rule_actuator_not_found");
                return Err(RuleError::NotFound(format!(
                    "actuator {actuator_guid} is not found"
                )));
            }
        }

        let rows = generate_rule_rows(sensor_guid, actuator_guids, now_epoch_ms());
        let created = self
            .rules
            .create_rules(rows)
            .await
            .map_err(|err| RuleError::Storage(err.to_string()))?;
        record_rules_generated(created.len() as u64);
        info!(
            target: "hioto.rules",
            sensor_guid = %sensor_guid,
            actuators = actuator_guids.len(),
            rows = created.len(),
            "rules_created"
        );

        self.sync.rules_created(&created).await;
        Ok(created)
    }

    /// 列出 guid 作为输入或输出的规则；一条都没有时返回 NotFound。
    pub async fn rules_for_device(&self, guid: &str) -> Result<Vec<RuleRecord>, RuleError> {
        let rules = self
            .rules
            .list_rules_for_guid(guid)
            .await
            .map_err(|err| RuleError::Storage(err.to_string()))?;
        if rules.is_empty() {
            return Err(RuleError::NotFound("rules not found".to_string()));
        }
        Ok(rules)
    }

    /// 删除传感器的全部规则（设备必须是 SENSOR）。
    pub async fn delete_rules_for_sensor(&self, guid: &str) -> Result<u64, RuleError> {
        let device = self
            .devices
            .find_device(guid)
            .await
            .map_err(|err| RuleError::Storage(err.to_string()))?
            .ok_or_else(|| RuleError::NotFound("sensor not found".to_string()))?;
        if !device.device_type.is_rule_sensor() {
            return Err(RuleError::Validation(format!(
                "device {} is not a sensor",
                device.guid
            )));
        }
        let deleted = self
            .rules
            .delete_rules_by_input(guid)
            .await
            .map_err(|err| RuleError::Storage(err.to_string()))?;
        info!(target: "hioto.rules", sensor_guid = %guid, deleted = deleted, "rules_deleted");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_are_zero_padded_and_ascending() {
        assert_eq!(generate_patterns(2), vec!["00", "01", "10", "11"]);
        assert_eq!(generate_patterns(3)[5], "101");
    }

    #[test]
    fn output_is_complement_of_pattern_bit() {
        assert_eq!(output_level(b'1'), "0");
        assert_eq!(output_level(b'0'), "1");
    }
}
