use crate::domain::default_internal_name;
use common::domain::{DomainResult, MappingRule, MappingRuleRepository};
use std::collections::HashMap;
use tracing::debug;

/// Point-in-time view of the mapping rules used for one ingestion attempt.
///
/// Lookups ignore case. Names without a rule fall back to
/// [`default_internal_name`].
#[derive(Debug, Clone, Default)]
pub struct MappingRuleResolver {
    rules: HashMap<String, String>,
}

impl MappingRuleResolver {
    pub fn from_rules(rules: impl IntoIterator<Item = MappingRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| (rule.external_name.to_lowercase(), rule.internal_name))
            .collect();
        Self { rules }
    }

    /// Read a full snapshot from the store
    pub async fn load(repository: &dyn MappingRuleRepository) -> DomainResult<Self> {
        let rules = repository.list_all_rules().await?;
        debug!(rule_count = rules.len(), "Loaded mapping rule snapshot");
        Ok(Self::from_rules(rules))
    }

    pub fn resolve(&self, external_name: &str) -> String {
        match self.rules.get(&external_name.to_lowercase()) {
            Some(internal_name) => internal_name.clone(),
            None => default_internal_name(external_name),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::memory::InMemoryMappingRuleRepository;
    use common::domain::DomainError;
    use common::MockMappingRuleRepository;

    fn rule(external: &str, internal: &str) -> MappingRule {
        MappingRule {
            external_name: external.to_string(),
            internal_name: internal.to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolves_rule_ignoring_case() {
        let resolver = MappingRuleResolver::from_rules(vec![rule("usr", "ActorId")]);
        assert_eq!(resolver.resolve("usr"), "ActorId");
        assert_eq!(resolver.resolve("USR"), "ActorId");
        assert_eq!(resolver.resolve("Usr"), "ActorId");
    }

    #[test]
    fn test_unmatched_name_uses_default_transform() {
        let resolver = MappingRuleResolver::from_rules(vec![rule("usr", "ActorId")]);
        assert_eq!(resolver.resolve("foo"), "Foo");
        assert_eq!(resolver.resolve(""), "");
    }

    #[tokio::test]
    async fn test_load_snapshot_from_store() {
        let repo = InMemoryMappingRuleRepository::with_rules([("amt", "Amount"), ("ts", "OccurredAt")]);
        let resolver = MappingRuleResolver::load(&repo).await.unwrap();

        assert_eq!(resolver.len(), 2);
        assert_eq!(resolver.resolve("AMT"), "Amount");
    }

    #[tokio::test]
    async fn test_load_propagates_store_error() {
        let mut repo = MockMappingRuleRepository::new();
        repo.expect_list_all_rules()
            .times(1)
            .returning(|| Err(DomainError::RepositoryError(anyhow::anyhow!("db down"))));

        let result = MappingRuleResolver::load(&repo).await;
        assert!(matches!(result, Err(DomainError::RepositoryError(_))));
    }
}
