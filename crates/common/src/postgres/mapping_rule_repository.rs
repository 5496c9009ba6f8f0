use crate::domain::{
    DomainError, DomainResult, MappingRule, MappingRuleRepository, UpsertMappingRuleRepoInput,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::Utc;
use tokio_postgres::Row;
use tracing::{debug, info};

fn row_to_rule(row: &Row) -> MappingRule {
    MappingRule {
        external_name: row.get(0),
        internal_name: row.get(1),
        updated_at: row.get(2),
    }
}

#[derive(Clone)]
pub struct PostgresMappingRuleRepository {
    client: PostgresClient,
}

impl PostgresMappingRuleRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MappingRuleRepository for PostgresMappingRuleRepository {
    async fn list_all_rules(&self) -> DomainResult<Vec<MappingRule>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                "SELECT external_name, internal_name, updated_at
                 FROM mapping_rules
                 ORDER BY id",
                &[],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(rule_count = rows.len(), "Loaded mapping rules");
        Ok(rows.iter().map(row_to_rule).collect())
    }

    async fn get_rule_by_external_name(
        &self,
        external_name: &str,
    ) -> DomainResult<Option<MappingRule>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT external_name, internal_name, updated_at
                 FROM mapping_rules
                 WHERE LOWER(external_name) = LOWER($1)",
                &[&external_name],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.as_ref().map(row_to_rule))
    }

    async fn upsert_rule(&self, input: UpsertMappingRuleRepoInput) -> DomainResult<MappingRule> {
        debug!(external_name = %input.external_name, internal_name = %input.internal_name, "Upserting mapping rule");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();

        let row = conn
            .query_one(
                "INSERT INTO mapping_rules (external_name, internal_name, updated_at)
                 VALUES ($1, $2, $3)
                 ON CONFLICT ((LOWER(external_name)))
                 DO UPDATE SET internal_name = EXCLUDED.internal_name, updated_at = EXCLUDED.updated_at
                 RETURNING external_name, internal_name, updated_at",
                &[&input.external_name, &input.internal_name, &now],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let rule = row_to_rule(&row);
        info!(external_name = %rule.external_name, internal_name = %rule.internal_name, "Mapping rule saved");
        Ok(rule)
    }

    async fn remove_rule(&self, external_name: &str) -> DomainResult<bool> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows_affected = conn
            .execute(
                "DELETE FROM mapping_rules WHERE LOWER(external_name) = LOWER($1)",
                &[&external_name],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if rows_affected > 0 {
            info!(external_name = %external_name, "Mapping rule removed");
        }
        Ok(rows_affected > 0)
    }
}
