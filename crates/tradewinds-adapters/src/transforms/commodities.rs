//! Commodity spot prices into `commodities_ts`; the Baltic Dry Index feed
//! routes to `freight_indices`.

use tradewinds_core::{RawItem, Row};

use super::{date_value, num_field, str_field};

fn commodity_code(code: &str) -> Option<&'static str> {
    match code {
        "WTI" => Some("WTI"),
        "BRENT" => Some("BRENT"),
        "HENRY_HUB" => Some("HENRY_HUB"),
        "DIESEL_US" => Some("DIESEL_US"),
        "GASOLINE_US" => Some("GASOLINE_US"),
        "JET_US" => Some("JET_US"),
        "COPPER" => Some("COPPER"),
        "ALUMINUM" => Some("ALUMINUM"),
        "GOLD" => Some("GOLD"),
        "SILVER" => Some("SILVER"),
        "WHEAT" => Some("WHEAT"),
        "CORN" => Some("CORN"),
        "SOY" => Some("SOY"),
        _ => None,
    }
}

pub fn transform(records: &[RawItem]) -> Vec<Row> {
    let mut rows = Vec::new();
    for rec in records {
        let source = str_field(rec, "source").unwrap_or_default();
        let date = str_field(rec, "date").unwrap_or_default();

        if source == "bdi" {
            rows.push(
                Row::new()
                    .set("index_code", "BDI")
                    .set("ts", date_value(&date))
                    .set("value", num_field(rec, "value"))
                    .set("source", source),
            );
            continue;
        }

        let commodity = str_field(rec, "commodity").unwrap_or_default();
        let Some(code) = commodity_code(&commodity) else {
            continue;
        };
        rows.push(
            Row::new()
                .set("commodity_code", code)
                .set("series_id", code)
                .set("ts", date_value(&date))
                .set("price", num_field(rec, "value"))
                .set("unit", str_field(rec, "unit"))
                .set("source", source),
        );
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tradewinds_core::Value;

    #[test]
    fn commodities_and_freight_route_to_their_shapes() {
        let records = vec![
            json!({"source": "eia", "commodity": "WTI", "date": "2024-01-01",
                   "value": 80.0, "unit": "USD/bbl"}),
            json!({"source": "bdi", "date": "2024-01-01", "value": 1800}),
            json!({"source": "eia", "commodity": "UNOBTANIUM", "date": "2024-01-01", "value": 1.0}),
        ];
        let rows = transform(&records);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("commodity_code"), Some(&Value::Text("WTI".to_string())));
        assert_eq!(rows[0].get("price"), Some(&Value::Float(80.0)));
        assert_eq!(rows[1].get("index_code"), Some(&Value::Text("BDI".to_string())));
        assert!(rows[1].get("commodity_code").is_none());
    }
}
