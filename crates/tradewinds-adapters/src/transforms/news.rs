//! RSS news items into `news_mentions` rows; these feed the evidence-density
//! aggregate recomputed after each news ingestion.

use tradewinds_core::{RawItem, Row, Value};

use super::{date_value, stable_id, str_field};

pub fn transform(records: &[RawItem]) -> Vec<Row> {
    records
        .iter()
        .map(|rec| {
            let url = str_field(rec, "link").or_else(|| str_field(rec, "url"));
            let mention_id = stable_id(url.as_deref().unwrap_or_default());
            let published = str_field(rec, "published_at")
                .map(|s| date_value(&s))
                .unwrap_or(Value::Null);
            Row::new()
                .set("mention_id", mention_id.clone())
                .set("factor_id", str_field(rec, "factor_id"))
                .set("source", str_field(rec, "source").unwrap_or_else(|| "rss".to_string()))
                .set("source_id", mention_id)
                .set("url", url)
                .set("title", str_field(rec, "title"))
                .set("published_at", published)
                .set("snippet", str_field(rec, "summary"))
                .set("raw", rec.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mention_ids_hash_the_url() {
        let rec = json!({"url": "https://news.example/a", "title": "Canal closure",
                         "source": "reuters", "published_at": "2024-01-01T00:00:00Z",
                         "summary": "Traffic halted."});
        let rows = transform(std::slice::from_ref(&rec));
        assert_eq!(
            rows[0].get("mention_id"),
            Some(&Value::Text(stable_id("https://news.example/a")))
        );
        assert_eq!(rows[0].get("source"), Some(&Value::Text("reuters".to_string())));
        assert!(matches!(rows[0].get("published_at"), Some(Value::Timestamp(_))));
    }

    #[test]
    fn link_field_wins_over_url_and_missing_dates_stay_null() {
        let rec = json!({"link": "https://news.example/b", "title": "Strike"});
        let rows = transform(std::slice::from_ref(&rec));
        assert_eq!(rows[0].get("url"), Some(&Value::Text("https://news.example/b".to_string())));
        assert_eq!(rows[0].get("published_at"), Some(&Value::Null));
        assert_eq!(rows[0].get("source"), Some(&Value::Text("rss".to_string())));
    }
}
