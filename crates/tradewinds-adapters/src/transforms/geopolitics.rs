//! Geopolitical feeds (GDELT events and mentions, ReliefWeb disasters) into
//! `geo_events` and `geo_mentions` rows.

use serde_json::Value as JsonValue;

use tradewinds_core::{RawItem, Row, Value};

use super::{date_value, f64_field, num_field, stable_id, str_field};

fn actor_roles(rec: &RawItem) -> Value {
    let roles: Vec<JsonValue> = [
        "Actor1Type1Code",
        "Actor1Type2Code",
        "Actor2Type1Code",
        "Actor2Type2Code",
    ]
    .iter()
    .filter_map(|key| str_field(rec, key))
    .filter(|code| !code.is_empty())
    .map(JsonValue::String)
    .collect();
    if roles.is_empty() {
        Value::Null
    } else {
        Value::Json(JsonValue::Array(roles))
    }
}

fn gdelt_event_row(rec: &RawItem) -> Row {
    let mentions = f64_field(rec, "NumMentions").unwrap_or(0.0);
    let sources = f64_field(rec, "NumSources").unwrap_or(0.0);
    let articles = f64_field(rec, "NumArticles").unwrap_or(0.0);
    let event_id = str_field(rec, "GLOBALEVENTID").unwrap_or_default();
    let ts = str_field(rec, "DATEADDED")
        .or_else(|| str_field(rec, "SQLDATE"))
        .unwrap_or_default();

    Row::new()
        .set("event_id", event_id.clone())
        .set("source", "gdelt_events")
        .set("source_id", event_id)
        .set("ts", date_value(&ts))
        .set("event_type", str_field(rec, "EventType"))
        .set("country", str_field(rec, "ActionGeo_CountryCode"))
        .set("lat", num_field(rec, "ActionGeo_Lat"))
        .set("lon", num_field(rec, "ActionGeo_Long"))
        .set("actor1", str_field(rec, "Actor1Name"))
        .set("actor2", str_field(rec, "Actor2Name"))
        .set("actor_roles", actor_roles(rec))
        .set("goldstein", num_field(rec, "GoldsteinScale"))
        .set("people_impacted", Value::Null)
        .set("importance", (mentions + sources + articles).ln_1p())
        .set("url", Value::Null)
        .set("raw", rec.clone())
}

fn gdelt_mention_row(rec: &RawItem) -> Row {
    let gid = str_field(rec, "GLOBALEVENTID").unwrap_or_default();
    let mid = str_field(rec, "MentionIdentifier").unwrap_or_default();
    let mention_id = stable_id(&format!("{gid}:{mid}"));
    let published = str_field(rec, "MentionTimeDate").unwrap_or_default();

    Row::new()
        .set("mention_id", mention_id.clone())
        .set("source", "gdelt_mentions")
        .set("source_id", mention_id)
        .set("event_source_id", gid)
        .set("url", str_field(rec, "MentionURL"))
        .set("published_at", date_value(&published))
        .set("language", str_field(rec, "MentionDocLanguage"))
        .set("source_country", str_field(rec, "MentionDocCountryCode"))
        .set("snippet", str_field(rec, "MentionText"))
        .set("raw", rec.clone())
}

fn reliefweb_row(rec: &RawItem) -> Row {
    let people = f64_field(rec, "people_impacted");
    let importance = match people {
        Some(p) if p > 0.0 => Value::Float(p.ln_1p()),
        _ => Value::Null,
    };
    let id = str_field(rec, "id").unwrap_or_default();
    let ts = str_field(rec, "date").unwrap_or_default();

    Row::new()
        .set("event_id", format!("reliefweb:{id}"))
        .set("source", "reliefweb")
        .set("source_id", id)
        .set("ts", date_value(&ts))
        .set("event_type", str_field(rec, "type"))
        .set("country", str_field(rec, "country"))
        .set("lat", num_field(rec, "lat"))
        .set("lon", num_field(rec, "lon"))
        .set("actor1", Value::Null)
        .set("actor2", Value::Null)
        .set("actor_roles", Value::Null)
        .set("goldstein", Value::Null)
        .set("people_impacted", num_field(rec, "people_impacted"))
        .set("importance", importance)
        .set("url", str_field(rec, "url"))
        .set("raw", rec.clone())
}

pub fn transform(records: &[RawItem]) -> Vec<Row> {
    let mut rows = Vec::new();
    for rec in records {
        match str_field(rec, "source").as_deref() {
            Some("gdelt_events") => rows.push(gdelt_event_row(rec)),
            Some("gdelt_mentions") => rows.push(gdelt_mention_row(rec)),
            Some("reliefweb") => rows.push(reliefweb_row(rec)),
            _ => {}
        }
    }
    rows
}
