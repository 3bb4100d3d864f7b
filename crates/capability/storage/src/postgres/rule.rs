//! Postgres 规则存储实现

use super::{PgStore, RULE_COLUMNS, rule_from_row};
use crate::error::StorageError;
use crate::models::RuleRecord;
use crate::traits::RuleStore;

#[async_trait::async_trait]
impl RuleStore for PgStore {
    async fn create_rules(&self, rules: Vec<RuleRecord>) -> Result<Vec<RuleRecord>, StorageError> {
        if rules.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "insert into rule_devices \
             (input_guid, input_value, output_guid, output_value, created_at, updated_at) \
             values ($1, $2, $3, $4, $5, $6) returning {RULE_COLUMNS}"
        );
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(rules.len());
        for rule in &rules {
            let row = sqlx::query(&sql)
                .bind(&rule.input_guid)
                .bind(&rule.input_value)
                .bind(&rule.output_guid)
                .bind(&rule.output_value)
                .bind(rule.created_at_ms)
                .bind(rule.updated_at_ms)
                .fetch_one(&mut *tx)
                .await?;
            created.push(rule_from_row(&row)?);
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn find_matching_rules(
        &self,
        input_guid: &str,
        input_value: &str,
    ) -> Result<Vec<RuleRecord>, StorageError> {
        let sql = format!(
            "select {RULE_COLUMNS} from rule_devices \
             where input_guid = $1 and input_value = $2 order by id"
        );
        let rows = sqlx::query(&sql)
            .bind(input_guid)
            .bind(input_value)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(rule_from_row).collect()
    }

    async fn list_rules_for_guid(&self, guid: &str) -> Result<Vec<RuleRecord>, StorageError> {
        let sql = format!(
            "select {RULE_COLUMNS} from rule_devices \
             where input_guid = $1 or output_guid = $1 order by id"
        );
        let rows = sqlx::query(&sql).bind(guid).fetch_all(&self.pool).await?;
        rows.iter().map(rule_from_row).collect()
    }

    async fn delete_rules_by_input(&self, input_guid: &str) -> Result<u64, StorageError> {
        let result = sqlx::query("delete from rule_devices where input_guid = $1")
            .bind(input_guid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
