//! Domain transforms: batch-shaped mappings from raw source records to
//! canonical rows, one module per data domain. The logistics transform is
//! the only stateful one and lives with the vessel tracker.

pub mod commodities;
pub mod geopolitics;
pub mod logistics;
pub mod macro_econ;
pub mod markets;
pub mod news;
pub mod policy;
pub mod trade;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

use tradewinds_core::{RawItem, Row, Value};

/// Batch transform signature; adapters present single items as one-element
/// slices through the factory's transform override.
pub type BatchTransform = fn(&[RawItem]) -> Vec<Row>;

/// Closed lookup of transform references accepted by the registry. Unknown
/// references fail at factory-construction time.
pub fn lookup(name: &str) -> Option<BatchTransform> {
    match name {
        "macro" => Some(macro_econ::transform),
        "markets" => Some(markets::transform),
        "commodities" => Some(commodities::transform),
        "policy" => Some(policy::transform),
        "cb_statements" => Some(policy::map_cb_statement),
        "policy_events" => Some(policy::map_policy_event),
        "sanctions" => Some(policy::map_sanction_update),
        "bis_entities" => Some(policy::map_bis_entity),
        "geopolitics" => Some(geopolitics::transform),
        "news" => Some(news::transform),
        "trade" => Some(trade::transform),
        _ => None,
    }
}

/// Deterministic identifier for records whose source offers no stable id.
pub(crate) fn stable_id(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Source date fields arrive as `YYYY`, `YYYYMM`, `YYYYMMDD`, ISO dates, or
/// full timestamps. Anything recognizable becomes a UTC timestamp; the rest
/// passes through as text.
pub(crate) fn date_value(raw: &str) -> Value {
    let raw = raw.trim();
    let date = match raw.len() {
        4 => raw
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
        6 => NaiveDate::parse_from_str(&format!("{raw}01"), "%Y%m%d").ok(),
        8 => NaiveDate::parse_from_str(raw, "%Y%m%d").ok(),
        10 => NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok(),
        _ => None,
    };
    if let Some(date) = date {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Value::Timestamp(Utc.from_utc_datetime(&ts));
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Value::Timestamp(ts.with_timezone(&Utc));
    }
    Value::Text(raw.to_string())
}

pub(crate) fn str_field(rec: &RawItem, key: &str) -> Option<String> {
    match rec.get(key) {
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn num_field(rec: &RawItem, key: &str) -> Value {
    match rec.get(key) {
        Some(JsonValue::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        _ => Value::Null,
    }
}

pub(crate) fn f64_field(rec: &RawItem, key: &str) -> Option<f64> {
    rec.get(key).and_then(JsonValue::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn date_value_handles_source_period_formats() {
        for (raw, expected) in [
            ("2023", "2023-01-01"),
            ("202401", "2024-01-01"),
            ("20240115", "2024-01-15"),
            ("2024-02-29", "2024-02-29"),
        ] {
            match date_value(raw) {
                Value::Timestamp(ts) => {
                    assert_eq!(ts.format("%Y-%m-%d").to_string(), expected, "for {raw}")
                }
                other => panic!("expected timestamp for {raw}, got {other:?}"),
            }
        }
    }

    #[test]
    fn date_value_parses_full_timestamps_and_passes_junk_through() {
        match date_value("2024-01-01T04:30:00Z") {
            Value::Timestamp(ts) => assert_eq!(ts.year(), 2024),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(date_value("Q1-2024"), Value::Text("Q1-2024".to_string()));
    }

    #[test]
    fn stable_ids_are_deterministic() {
        assert_eq!(stable_id("a:b"), stable_id("a:b"));
        assert_ne!(stable_id("a:b"), stable_id("a:c"));
    }

    #[test]
    fn unknown_transform_references_are_rejected() {
        assert!(lookup("macro").is_some());
        assert!(lookup("cb_statements").is_some());
        assert!(lookup("does_not_exist").is_none());
    }
}
