use crate::domain::MappingRuleResolver;
use common::domain::{CanonicalMap, RawPayload};

/// Rename every raw field to its internal name, in submission order.
///
/// When two external keys resolve to the same internal name the later key
/// wins; the entry keeps the position of the first one.
pub fn map_fields(payload: &RawPayload, resolver: &MappingRuleResolver) -> CanonicalMap {
    let mut canonical = CanonicalMap::new();
    for (external_name, value) in payload.iter() {
        canonical.insert(resolver.resolve(external_name), value.clone());
    }
    canonical
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::domain::{FieldValue, MappingRule};

    fn resolver(pairs: &[(&str, &str)]) -> MappingRuleResolver {
        MappingRuleResolver::from_rules(pairs.iter().map(|(e, i)| MappingRule {
            external_name: e.to_string(),
            internal_name: i.to_string(),
            updated_at: Utc::now(),
        }))
    }

    #[test]
    fn test_maps_known_and_unknown_fields_in_order() {
        let payload = RawPayload::new()
            .with_field("usr", "p1")
            .with_field("foo", "bar")
            .with_field("amt", "10.5");

        let canonical = map_fields(&payload, &resolver(&[("usr", "ActorId"), ("amt", "Amount")]));

        let keys: Vec<&str> = canonical.keys().collect();
        assert_eq!(keys, vec!["ActorId", "Foo", "Amount"]);
        assert_eq!(canonical.get("foo"), Some(&FieldValue::from("bar")));
    }

    #[test]
    fn test_colliding_keys_last_write_wins() {
        let payload = RawPayload::new()
            .with_field("usr", "first")
            .with_field("player", "second");

        let canonical = map_fields(
            &payload,
            &resolver(&[("usr", "ActorId"), ("player", "ActorId")]),
        );

        assert_eq!(canonical.len(), 1);
        assert_eq!(canonical.get("ActorId"), Some(&FieldValue::from("second")));
    }

    #[test]
    fn test_default_name_colliding_with_rule_target() {
        // "actorId" defaults to "ActorId", the same key "usr" maps to
        let payload = RawPayload::new()
            .with_field("actorId", "direct")
            .with_field("usr", "mapped");

        let canonical = map_fields(&payload, &resolver(&[("usr", "ActorId")]));

        assert_eq!(canonical.len(), 1);
        assert_eq!(canonical.keys().next(), Some("ActorId"));
        assert_eq!(canonical.get("ACTORID"), Some(&FieldValue::from("mapped")));
    }

    #[test]
    fn test_values_keep_their_type() {
        let payload = RawPayload::from_json_str(r#"{"level":3,"vip":true,"tags":["a"]}"#).unwrap();
        let canonical = map_fields(&payload, &resolver(&[]));

        assert!(matches!(canonical.get("Level"), Some(FieldValue::Number(_))));
        assert_eq!(canonical.get("Vip"), Some(&FieldValue::Bool(true)));
        assert!(matches!(canonical.get("Tags"), Some(FieldValue::Structured(_))));
    }

    #[test]
    fn test_empty_payload_maps_to_empty_map() {
        let canonical = map_fields(&RawPayload::new(), &resolver(&[("usr", "ActorId")]));
        assert!(canonical.is_empty());
    }
}
