use crate::domain::{
    DomainResult, MappingRule, MappingRuleRepository, UpsertMappingRuleRepoInput,
};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of MappingRuleRepository.
///
/// Rules are kept in insertion order; external names are compared ignoring case.
pub struct InMemoryMappingRuleRepository {
    rules: Arc<RwLock<Vec<MappingRule>>>,
}

impl InMemoryMappingRuleRepository {
    pub fn new() -> Self {
        Self {
            rules: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Build a repository pre-populated with `(external, internal)` pairs
    pub fn with_rules<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let now = Utc::now();
        let mut rules: Vec<MappingRule> = Vec::new();
        for (external, internal) in pairs {
            match rules
                .iter_mut()
                .find(|r| r.external_name.eq_ignore_ascii_case(external))
            {
                Some(rule) => rule.internal_name = internal.to_string(),
                None => rules.push(MappingRule {
                    external_name: external.to_string(),
                    internal_name: internal.to_string(),
                    updated_at: now,
                }),
            }
        }
        Self {
            rules: Arc::new(RwLock::new(rules)),
        }
    }
}

impl Default for InMemoryMappingRuleRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MappingRuleRepository for InMemoryMappingRuleRepository {
    async fn list_all_rules(&self) -> DomainResult<Vec<MappingRule>> {
        let rules = self.rules.read().await;
        Ok(rules.clone())
    }

    async fn get_rule_by_external_name(
        &self,
        external_name: &str,
    ) -> DomainResult<Option<MappingRule>> {
        let rules = self.rules.read().await;
        Ok(rules
            .iter()
            .find(|r| r.external_name.eq_ignore_ascii_case(external_name))
            .cloned())
    }

    async fn upsert_rule(&self, input: UpsertMappingRuleRepoInput) -> DomainResult<MappingRule> {
        let mut rules = self.rules.write().await;
        let now = Utc::now();

        if let Some(rule) = rules
            .iter_mut()
            .find(|r| r.external_name.eq_ignore_ascii_case(&input.external_name))
        {
            rule.internal_name = input.internal_name;
            rule.updated_at = now;
            return Ok(rule.clone());
        }

        let rule = MappingRule {
            external_name: input.external_name,
            internal_name: input.internal_name,
            updated_at: now,
        };
        rules.push(rule.clone());
        Ok(rule)
    }

    async fn remove_rule(&self, external_name: &str) -> DomainResult<bool> {
        let mut rules = self.rules.write().await;
        let before = rules.len();
        rules.retain(|r| !r.external_name.eq_ignore_ascii_case(external_name));
        Ok(rules.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_inserts_then_overwrites_ignoring_case() {
        let repo = InMemoryMappingRuleRepository::new();

        let first = repo
            .upsert_rule(UpsertMappingRuleRepoInput {
                external_name: "usr".to_string(),
                internal_name: "ActorId".to_string(),
            })
            .await
            .unwrap();

        let second = repo
            .upsert_rule(UpsertMappingRuleRepoInput {
                external_name: "USR".to_string(),
                internal_name: "PlayerId".to_string(),
            })
            .await
            .unwrap();

        let rules = repo.list_all_rules().await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].external_name, "usr");
        assert_eq!(rules[0].internal_name, "PlayerId");
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn test_get_by_external_name_ignores_case() {
        let repo = InMemoryMappingRuleRepository::with_rules([("amt", "Amount")]);

        let rule = repo.get_rule_by_external_name("AMT").await.unwrap();
        assert_eq!(rule.unwrap().internal_name, "Amount");

        let missing = repo.get_rule_by_external_name("other").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_remove_rule() {
        let repo = InMemoryMappingRuleRepository::with_rules([("ts", "OccurredAt")]);

        assert!(repo.remove_rule("Ts").await.unwrap());
        assert!(!repo.remove_rule("ts").await.unwrap());
        assert!(repo.list_all_rules().await.unwrap().is_empty());
    }
}
