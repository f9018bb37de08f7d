//! FRED rates and FX series into `metrics_ts` rows.

use tradewinds_core::{RawItem, Row, Value};

use super::{date_value, num_field, str_field};

fn fred_series(series: &str) -> Option<&'static str> {
    match series {
        "DGS10" => Some("us_10y_yield"),
        "EFFR" => Some("effr"),
        "DEXUSEU" => Some("usd_eur"),
        "DEXJPUS" => Some("usd_jpy"),
        "DEXUSUK" => Some("usd_gbp"),
        "DEXCAUS" => Some("usd_cad"),
        "DEXCHUS" => Some("usd_cny"),
        "DEXMXUS" => Some("usd_mxn"),
        "DEXBZUS" => Some("usd_brl"),
        "DEXINUS" => Some("usd_inr"),
        _ => None,
    }
}

pub fn transform(records: &[RawItem]) -> Vec<Row> {
    let mut rows = Vec::new();
    for rec in records {
        let series = str_field(rec, "series").unwrap_or_default();
        let Some(metric) = fred_series(&series) else {
            continue;
        };
        let date = str_field(rec, "date").unwrap_or_default();
        rows.push(
            Row::new()
                .set("series_id", metric)
                .set("entity_type", "macro")
                .set("entity_id", "macro")
                .set("metric", metric)
                .set("ts", date_value(&date))
                .set("value", num_field(rec, "value"))
                .set("unit", str_field(rec, "unit"))
                .set("source", str_field(rec, "source").unwrap_or_else(|| "fred".to_string()))
                .set("attrs", Value::Null),
        );
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_series_map_to_canonical_metrics() {
        let records = vec![
            json!({"source": "fred", "series": "DGS10", "date": "2024-01-02",
                   "value": 4.0, "unit": "percent"}),
            json!({"source": "fred", "series": "DEXUSEU", "date": "2024-01-02",
                   "value": 1.1, "unit": "rate"}),
        ];
        let rows = transform(&records);
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].get("series_id"),
            Some(&Value::Text("us_10y_yield".to_string()))
        );
        assert_eq!(rows[1].get("metric"), Some(&Value::Text("usd_eur".to_string())));
    }

    #[test]
    fn unknown_series_are_dropped() {
        let records = vec![json!({"source": "fred", "series": "NOPE", "date": "2024-01-02", "value": 1.0})];
        assert!(transform(&records).is_empty());
    }
}
