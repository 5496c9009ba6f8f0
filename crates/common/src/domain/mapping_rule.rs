use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// External field name → internal field name association
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRule {
    pub external_name: String,
    pub internal_name: String,
    pub updated_at: DateTime<Utc>,
}

/// Input for inserting or updating a rule by external name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertMappingRuleRepoInput {
    pub external_name: String,
    pub internal_name: String,
}

/// Rules seeded into an empty store at first run
pub const DEFAULT_MAPPING_RULES: [(&str, &str); 5] = [
    ("usr", "ActorId"),
    ("amt", "Amount"),
    ("curr", "Currency"),
    ("ts", "OccurredAt"),
    ("etype", "EventType"),
];

/// Repository trait for mapping rule storage.
///
/// External names are unique ignoring case. Lookups, upserts and removals
/// all match case-insensitively.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MappingRuleRepository: Send + Sync {
    /// Full snapshot of every rule
    async fn list_all_rules(&self) -> DomainResult<Vec<MappingRule>>;

    async fn get_rule_by_external_name(&self, external_name: &str)
        -> DomainResult<Option<MappingRule>>;

    /// Insert, or overwrite the internal name of an existing rule and bump `updated_at`
    async fn upsert_rule(&self, input: UpsertMappingRuleRepoInput) -> DomainResult<MappingRule>;

    /// Returns false when no rule matched
    async fn remove_rule(&self, external_name: &str) -> DomainResult<bool>;
}
