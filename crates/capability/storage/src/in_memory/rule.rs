//! 规则内存存储实现

use super::InMemoryStore;
use crate::error::StorageError;
use crate::models::RuleRecord;
use crate::traits::RuleStore;

#[async_trait::async_trait]
impl RuleStore for InMemoryStore {
    async fn create_rules(&self, rules: Vec<RuleRecord>) -> Result<Vec<RuleRecord>, StorageError> {
        let mut state = self.write()?;
        let mut created = Vec::with_capacity(rules.len());
        for mut rule in rules {
            rule.id = state.next_id();
            state.rules.push(rule.clone());
            created.push(rule);
        }
        Ok(created)
    }

    async fn find_matching_rules(
        &self,
        input_guid: &str,
        input_value: &str,
    ) -> Result<Vec<RuleRecord>, StorageError> {
        let items = self
            .read()?
            .rules
            .iter()
            .filter(|rule| rule.input_guid == input_guid && rule.input_value == input_value)
            .cloned()
            .collect();
        Ok(items)
    }

    async fn list_rules_for_guid(&self, guid: &str) -> Result<Vec<RuleRecord>, StorageError> {
        let items = self
            .read()?
            .rules
            .iter()
            .filter(|rule| rule.input_guid == guid || rule.output_guid == guid)
            .cloned()
            .collect();
        Ok(items)
    }

    async fn delete_rules_by_input(&self, input_guid: &str) -> Result<u64, StorageError> {
        let mut state = self.write()?;
        let before = state.rules.len();
        state.rules.retain(|rule| rule.input_guid != input_guid);
        Ok((before - state.rules.len()) as u64)
    }
}
