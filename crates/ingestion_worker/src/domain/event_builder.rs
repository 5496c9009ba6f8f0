use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use common::domain::{
    CanonicalMap, DomainError, DomainResult, InternalEvent, ACTOR_ID_FIELD, AMOUNT_FIELD,
    CURRENCY_FIELD, DEFAULT_CURRENCY, EVENT_TYPE_FIELD, OCCURRED_AT_FIELD,
};
use rust_decimal::Decimal;
use std::str::FromStr;

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Culture-invariant decimal parsing.
///
/// Accepts surrounding whitespace, a leading sign, `,` thousands separators
/// and exponent notation.
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let cleaned: String = text.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }

    if cleaned.contains(['e', 'E']) {
        Decimal::from_scientific(&cleaned.to_lowercase()).ok()
    } else {
        Decimal::from_str(&cleaned).ok()
    }
}

/// Parse a timestamp and normalize it to UTC.
///
/// Values without an offset are taken as UTC; a bare date is midnight UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn required_text(map: &CanonicalMap, field: &str) -> DomainResult<String> {
    map.get(field)
        .and_then(|value| value.as_text())
        .ok_or_else(|| DomainError::MissingField(field.to_string()))
}

/// Turn a canonical map into an internal event.
///
/// Required fields are checked in order ActorId, Amount, OccurredAt, each one
/// present then parsed, and the first failure is returned. Null counts as absent.
pub fn build_internal_event(map: &CanonicalMap) -> DomainResult<InternalEvent> {
    let actor_id = required_text(map, ACTOR_ID_FIELD)?;
    if actor_id.trim().is_empty() {
        return Err(DomainError::MissingField(ACTOR_ID_FIELD.to_string()));
    }

    let amount_text = required_text(map, AMOUNT_FIELD)?;
    let amount = parse_amount(&amount_text).ok_or_else(|| DomainError::InvalidType {
        field: AMOUNT_FIELD.to_string(),
        value: amount_text.clone(),
    })?;

    let occurred_at_text = required_text(map, OCCURRED_AT_FIELD)?;
    let occurred_at =
        parse_timestamp(&occurred_at_text).ok_or_else(|| DomainError::InvalidType {
            field: OCCURRED_AT_FIELD.to_string(),
            value: occurred_at_text.clone(),
        })?;

    let currency = map
        .get(CURRENCY_FIELD)
        .and_then(|value| value.as_text())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    let event_type = map.get(EVENT_TYPE_FIELD).and_then(|value| value.as_text());

    let mut extensions = CanonicalMap::new();
    for (key, value) in map.iter() {
        if !InternalEvent::is_fixed_field(key) {
            extensions.insert(key, value.clone());
        }
    }

    Ok(InternalEvent {
        actor_id,
        amount,
        currency,
        occurred_at,
        event_type,
        extensions,
    })
}
