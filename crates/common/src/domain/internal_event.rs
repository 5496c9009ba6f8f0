use crate::domain::payload::CanonicalMap;
use crate::domain::result::{DomainError, DomainResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

pub const ACTOR_ID_FIELD: &str = "ActorId";
pub const AMOUNT_FIELD: &str = "Amount";
pub const CURRENCY_FIELD: &str = "Currency";
pub const OCCURRED_AT_FIELD: &str = "OccurredAt";
pub const EVENT_TYPE_FIELD: &str = "EventType";

/// Canonical fields with a fixed slot on the internal event
pub const FIXED_FIELDS: [&str; 5] = [
    ACTOR_ID_FIELD,
    AMOUNT_FIELD,
    CURRENCY_FIELD,
    OCCURRED_AT_FIELD,
    EVENT_TYPE_FIELD,
];

pub const DEFAULT_CURRENCY: &str = "GEL";

/// Routing label used when an event carries no type
pub const GENERIC_EVENT_LABEL: &str = "generic";

/// Canonical event handed to the message bus.
///
/// Serializes to the wire payload: the fixed fields in camelCase followed by
/// the flattened extension map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalEvent {
    pub actor_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub occurred_at: DateTime<Utc>,
    pub event_type: Option<String>,
    #[serde(flatten)]
    pub extensions: CanonicalMap,
}

impl InternalEvent {
    pub fn is_fixed_field(name: &str) -> bool {
        FIXED_FIELDS.iter().any(|f| f.eq_ignore_ascii_case(name))
    }

    /// Lower-cased event type usable as one subject token, or `generic`.
    ///
    /// Whitespace and the NATS separator and wildcard characters become `_`.
    pub fn routing_label(&self) -> String {
        let label = self.event_type.as_deref().map(str::trim).unwrap_or_default();
        if label.is_empty() {
            return GENERIC_EVENT_LABEL.to_string();
        }

        label
            .to_lowercase()
            .chars()
            .map(|c| match c {
                '.' | '*' | '>' => '_',
                c if c.is_whitespace() || c.is_control() => '_',
                c => c,
            })
            .collect()
    }

    /// Dot-delimited routing key, e.g. `events.deposit`
    pub fn routing_key(&self, prefix: &str) -> String {
        format!("{}.{}", prefix, self.routing_label())
    }

    pub fn to_payload_json(&self) -> DomainResult<String> {
        serde_json::to_string(self).map_err(|e| DomainError::RepositoryError(e.into()))
    }
}

/// Trait for delivering internal events to the message bus
///
/// Implementations should:
/// - Serialize the event to its wire payload
/// - Address it by the routing key derived from the event type
/// - Return `PublishFailure` (or another error) if delivery fails
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &InternalEvent) -> DomainResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payload::FieldValue;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn sample_event(event_type: Option<&str>) -> InternalEvent {
        let mut extensions = CanonicalMap::new();
        extensions.insert("Foo", FieldValue::from("bar"));
        extensions.insert("Level", FieldValue::from(3_i64));

        InternalEvent {
            actor_id: "p1".to_string(),
            amount: Decimal::from_str("10.50").unwrap(),
            currency: "USD".to_string(),
            occurred_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            event_type: event_type.map(str::to_string),
            extensions,
        }
    }

    #[test]
    fn test_routing_key_lowercases_event_type() {
        let event = sample_event(Some("Deposit"));
        assert_eq!(event.routing_key("events"), "events.deposit");
    }

    #[test]
    fn test_routing_key_defaults_to_generic() {
        let event = sample_event(None);
        assert_eq!(event.routing_key("events"), "events.generic");
    }

    #[test]
    fn test_routing_key_blank_type_is_generic() {
        assert_eq!(sample_event(Some("")).routing_key("events"), "events.generic");
        assert_eq!(sample_event(Some("   ")).routing_key("events"), "events.generic");
    }

    #[test]
    fn test_routing_key_is_single_subject_token() {
        assert_eq!(
            sample_event(Some("Bet Placed")).routing_key("events"),
            "events.bet_placed"
        );
        assert_eq!(
            sample_event(Some("promo.bonus")).routing_key("events"),
            "events.promo_bonus"
        );
        assert_eq!(
            sample_event(Some(" *>Cash\tOut ")).routing_key("events"),
            "events.__cash_out"
        );
    }

    #[test]
    fn test_fixed_field_match_ignores_case() {
        assert!(InternalEvent::is_fixed_field("actorid"));
        assert!(InternalEvent::is_fixed_field("EVENTTYPE"));
        assert!(!InternalEvent::is_fixed_field("Foo"));
    }

    #[test]
    fn test_payload_json_flattens_extensions() {
        let event = sample_event(Some("Deposit"));
        let json: serde_json::Value =
            serde_json::from_str(&event.to_payload_json().unwrap()).unwrap();

        assert_eq!(json["actorId"], "p1");
        assert_eq!(json["amount"], "10.50");
        assert_eq!(json["currency"], "USD");
        assert_eq!(json["occurredAt"], "2024-01-01T00:00:00Z");
        assert_eq!(json["eventType"], "Deposit");
        assert_eq!(json["Foo"], "bar");
        assert_eq!(json["Level"], 3);
    }
}
