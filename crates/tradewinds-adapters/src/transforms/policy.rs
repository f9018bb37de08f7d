//! Policy and central-bank communications into `cb_statements` and
//! `policy_events` rows.

use tradewinds_core::{RawItem, Row, Value};

use super::{date_value, stable_id, str_field};

/// Best-effort classification of central bank communications. First match
/// wins: minutes > speech > statement > decision.
fn classify_statement(title: &str, url: &str) -> &'static str {
    let haystack = format!("{title} {url}").to_lowercase();
    if haystack.contains("minutes") {
        "minutes"
    } else if haystack.contains("speech") {
        "speech"
    } else if haystack.contains("statement") {
        "statement"
    } else {
        "decision"
    }
}

fn cb_name(source: &str) -> String {
    match source {
        "fed" => "Fed".to_string(),
        "ecb" => "ECB".to_string(),
        "boe" => "BoE".to_string(),
        other => other.to_string(),
    }
}

fn jurisdiction(source: &str) -> Value {
    match source {
        "federal_register" => Value::Text("US".to_string()),
        "eurlex" => Value::Text("EU".to_string()),
        "uk" => Value::Text("UK".to_string()),
        _ => Value::Null,
    }
}

fn published_value(rec: &RawItem) -> Value {
    str_field(rec, "published_at")
        .map(|s| date_value(&s))
        .unwrap_or(Value::Null)
}

pub fn map_cb_statement(records: &[RawItem]) -> Vec<Row> {
    records
        .iter()
        .map(|rec| {
            let url = str_field(rec, "url").unwrap_or_default();
            let title = str_field(rec, "title").unwrap_or_default();
            let source = str_field(rec, "source").unwrap_or_default();
            Row::new()
                .set("statement_id", stable_id(&url))
                .set("central_bank", cb_name(&source))
                .set("published_at", published_value(rec))
                .set("type", classify_statement(&title, &url))
                .set("title", title)
                .set("url", url)
                .set("text_excerpt", str_field(rec, "summary"))
                .set("hawkish_dovish_score", Value::Null)
                .set("next_meeting_date", Value::Null)
                .set("raw", rec.clone())
        })
        .collect()
}

pub fn map_policy_event(records: &[RawItem]) -> Vec<Row> {
    records
        .iter()
        .map(|rec| {
            let source = str_field(rec, "source").unwrap_or_default();
            let src_id = str_field(rec, "id")
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| stable_id(&rec.to_string()));
            Row::new()
                .set("event_id", format!("{source}:{src_id}"))
                .set("jurisdiction", jurisdiction(&source))
                .set("source", source)
                .set("source_id", src_id)
                .set("published_at", published_value(rec))
                .set("title", str_field(rec, "title"))
                .set("summary", str_field(rec, "summary"))
                .set("url", str_field(rec, "url"))
                .set("topics", Value::Null)
                .set("affected_countries", Value::Null)
                .set("affected_sectors", Value::Null)
                .set("affected_entities", Value::Null)
                .set("severity", Value::Null)
                .set("raw", rec.clone())
        })
        .collect()
}

pub fn map_sanction_update(records: &[RawItem]) -> Vec<Row> {
    records
        .iter()
        .map(|rec| {
            let name = str_field(rec, "name")
                .or_else(|| str_field(rec, "entity"))
                .unwrap_or_else(|| "unknown".to_string());
            let source = str_field(rec, "source").unwrap_or_else(|| "sanctions".to_string());
            let src_id = str_field(rec, "id").unwrap_or_else(|| stable_id(&name));
            Row::new()
                .set("event_id", format!("{source}:{src_id}"))
                .set("jurisdiction", str_field(rec, "jurisdiction"))
                .set("source", source)
                .set("source_id", src_id)
                .set("published_at", published_value(rec))
                .set("title", name.clone())
                .set(
                    "summary",
                    str_field(rec, "program").or_else(|| str_field(rec, "remarks")),
                )
                .set("url", str_field(rec, "url"))
                .set("topics", Value::Null)
                .set("affected_countries", str_field(rec, "country"))
                .set("affected_sectors", Value::Null)
                .set("affected_entities", name)
                .set("severity", Value::Null)
                .set("raw", rec.clone())
        })
        .collect()
}

pub fn map_bis_entity(records: &[RawItem]) -> Vec<Row> {
    records
        .iter()
        .map(|rec| {
            let name = str_field(rec, "name").unwrap_or_default();
            let src_id = str_field(rec, "id").unwrap_or_else(|| stable_id(&name));
            Row::new()
                .set("event_id", format!("bis:{src_id}"))
                .set("jurisdiction", "US")
                .set("source", "bis")
                .set("source_id", src_id)
                .set("published_at", published_value(rec))
                .set("title", name.clone())
                .set("summary", str_field(rec, "summary"))
                .set("url", str_field(rec, "url"))
                .set("topics", Value::Null)
                .set("affected_countries", str_field(rec, "country"))
                .set("affected_sectors", Value::Null)
                .set("affected_entities", name)
                .set("severity", Value::Null)
                .set("raw", rec.clone())
        })
        .collect()
}

/// Auto-detecting wrapper kept for registry entries that predate the split
/// transform references.
pub fn transform(records: &[RawItem]) -> Vec<Row> {
    let mut rows = Vec::new();
    for rec in records {
        let source = str_field(rec, "source").unwrap_or_default();
        let mapped = if matches!(source.as_str(), "fed" | "ecb" | "boe") {
            map_cb_statement(std::slice::from_ref(rec))
        } else {
            map_policy_event(std::slice::from_ref(rec))
        };
        rows.extend(mapped);
    }
    rows
}
