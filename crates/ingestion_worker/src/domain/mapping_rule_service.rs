use common::domain::{
    DomainError, DomainResult, MappingRule, MappingRuleRepository, UpsertMappingRuleRepoInput,
    DEFAULT_MAPPING_RULES,
};
use common::garde::validate_struct;
use garde::Validate;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Request to add or replace a rule. Names are trimmed before validation.
#[derive(Debug, Clone, Validate)]
pub struct UpsertMappingRuleRequest {
    #[garde(length(min = 1, max = 128))]
    pub external_name: String,
    #[garde(length(min = 1, max = 128))]
    pub internal_name: String,
}

impl UpsertMappingRuleRequest {
    pub fn new(external_name: impl Into<String>, internal_name: impl Into<String>) -> Self {
        Self {
            external_name: external_name.into(),
            internal_name: internal_name.into(),
        }
    }

    fn trimmed(self) -> Self {
        Self {
            external_name: self.external_name.trim().to_string(),
            internal_name: self.internal_name.trim().to_string(),
        }
    }
}

/// Management operations over the mapping rule store
pub struct MappingRuleService {
    repository: Arc<dyn MappingRuleRepository>,
}

impl MappingRuleService {
    pub fn new(repository: Arc<dyn MappingRuleRepository>) -> Self {
        Self { repository }
    }

    pub async fn list_rules(&self) -> DomainResult<Vec<MappingRule>> {
        self.repository.list_all_rules().await
    }

    pub async fn get_rule(&self, external_name: &str) -> DomainResult<MappingRule> {
        self.repository
            .get_rule_by_external_name(external_name.trim())
            .await?
            .ok_or_else(|| DomainError::MappingRuleNotFound(external_name.to_string()))
    }

    #[instrument(skip(self, request), fields(external_name = %request.external_name))]
    pub async fn upsert_rule(&self, request: UpsertMappingRuleRequest) -> DomainResult<MappingRule> {
        let request = request.trimmed();
        validate_struct(&request)?;

        debug!(internal_name = %request.internal_name, "upserting mapping rule");

        self.repository
            .upsert_rule(UpsertMappingRuleRepoInput {
                external_name: request.external_name,
                internal_name: request.internal_name,
            })
            .await
    }

    /// Removing a rule that does not exist is not an error; returns whether one was removed
    #[instrument(skip(self))]
    pub async fn remove_rule(&self, external_name: &str) -> DomainResult<bool> {
        let removed = self.repository.remove_rule(external_name.trim()).await?;
        debug!(removed, "remove mapping rule");
        Ok(removed)
    }

    /// Install the default rules when the store holds none. Returns how many were written.
    pub async fn seed_default_rules(&self) -> DomainResult<usize> {
        if !self.repository.list_all_rules().await?.is_empty() {
            debug!("mapping rules already present, skipping seed");
            return Ok(0);
        }

        for (external_name, internal_name) in DEFAULT_MAPPING_RULES {
            self.repository
                .upsert_rule(UpsertMappingRuleRepoInput {
                    external_name: external_name.to_string(),
                    internal_name: internal_name.to_string(),
                })
                .await?;
        }

        info!(
            rule_count = DEFAULT_MAPPING_RULES.len(),
            "Seeded default mapping rules"
        );
        Ok(DEFAULT_MAPPING_RULES.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::memory::InMemoryMappingRuleRepository;
    use common::MockMappingRuleRepository;

    fn service() -> (MappingRuleService, Arc<InMemoryMappingRuleRepository>) {
        let repo = Arc::new(InMemoryMappingRuleRepository::new());
        (MappingRuleService::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn test_upsert_trims_and_stores() {
        let (service, repo) = service();

        let rule = service
            .upsert_rule(UpsertMappingRuleRequest::new("  usr ", " ActorId"))
            .await
            .unwrap();

        assert_eq!(rule.external_name, "usr");
        assert_eq!(rule.internal_name, "ActorId");
        assert_eq!(repo.list_all_rules().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_blank_and_long_names() {
        let (service, repo) = service();

        let blank = service
            .upsert_rule(UpsertMappingRuleRequest::new("   ", "ActorId"))
            .await;
        assert!(matches!(blank, Err(DomainError::ValidationError(_))));

        let long = service
            .upsert_rule(UpsertMappingRuleRequest::new("usr", "x".repeat(129)))
            .await;
        assert!(matches!(long, Err(DomainError::ValidationError(_))));

        assert!(repo.list_all_rules().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_rule_not_found() {
        let (service, _repo) = service();
        let result = service.get_rule("missing").await;
        assert!(matches!(result, Err(DomainError::MappingRuleNotFound(name)) if name == "missing"));
    }

    #[tokio::test]
    async fn test_remove_rule_reports_whether_removed() {
        let (service, _repo) = service();
        service
            .upsert_rule(UpsertMappingRuleRequest::new("amt", "Amount"))
            .await
            .unwrap();

        assert!(service.remove_rule("AMT").await.unwrap());
        assert!(!service.remove_rule("amt").await.unwrap());
    }

    #[tokio::test]
    async fn test_seed_only_when_empty() {
        let (service, repo) = service();

        assert_eq!(service.seed_default_rules().await.unwrap(), 5);
        assert_eq!(service.seed_default_rules().await.unwrap(), 0);

        let rules = repo.list_all_rules().await.unwrap();
        let pairs: Vec<(&str, &str)> = rules
            .iter()
            .map(|r| (r.external_name.as_str(), r.internal_name.as_str()))
            .collect();
        assert_eq!(pairs, DEFAULT_MAPPING_RULES.to_vec());
    }

    #[tokio::test]
    async fn test_seed_skips_populated_store() {
        let mut repo = MockMappingRuleRepository::new();
        repo.expect_list_all_rules().times(1).returning(|| {
            Ok(vec![MappingRule {
                external_name: "player".to_string(),
                internal_name: "ActorId".to_string(),
                updated_at: Utc::now(),
            }])
        });
        repo.expect_upsert_rule().times(0);

        let service = MappingRuleService::new(Arc::new(repo));
        assert_eq!(service.seed_default_rules().await.unwrap(), 0);
    }
}
