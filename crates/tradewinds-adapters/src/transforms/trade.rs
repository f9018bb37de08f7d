//! Trade statistics (UN Comtrade) into `trade_flows`; GDELT transport
//! disruptions become `logistics_events` rows.

use tradewinds_core::{RawItem, Row, Value};

use super::{date_value, num_field, str_field};

fn comtrade_row(rec: &RawItem) -> Row {
    let period = str_field(rec, "period").unwrap_or_default();
    Row::new()
        .set("reporter_iso2", str_field(rec, "reporter"))
        .set("partner_iso2", str_field(rec, "partner"))
        .set("hs_code", str_field(rec, "hs_code"))
        .set("flow", str_field(rec, "flow"))
        .set("period", date_value(&period))
        .set("value_usd", num_field(rec, "value"))
        .set("quantity", num_field(rec, "quantity"))
        .set("quantity_unit", str_field(rec, "quantity_unit"))
        .set("source", "un_comtrade")
        .set(
            "meta",
            rec.get("meta").cloned().map(Value::Json).unwrap_or(Value::Null),
        )
}

fn transport_disruption_row(rec: &RawItem) -> Row {
    let gid = str_field(rec, "GLOBALEVENTID").unwrap_or_default();
    let ts = str_field(rec, "DATEADDED").unwrap_or_default();
    Row::new()
        .set("event_type", "transport_disruption")
        .set("ts", date_value(&ts))
        .set("mmsi", Value::Null)
        .set("port_id", Value::Null)
        .set("chokepoint_id", Value::Null)
        .set("lat", num_field(rec, "ActionGeo_Lat"))
        .set("lon", num_field(rec, "ActionGeo_Long"))
        .set("channel", Value::Null)
        .set("attrs", Value::Null)
        .set("dedupe_key", format!("gdelt_transport:{gid}"))
}

pub fn transform(records: &[RawItem]) -> Vec<Row> {
    let mut rows = Vec::new();
    for rec in records {
        match str_field(rec, "source").as_deref() {
            Some("un_comtrade") => rows.push(comtrade_row(rec)),
            Some("gdelt_transport") => rows.push(transport_disruption_row(rec)),
            _ => {}
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn comtrade_periods_parse_to_month_start_timestamps() {
        let records = vec![json!({"source": "un_comtrade", "reporter": "US", "partner": "CN",
                                  "hs_code": "0101", "flow": "import", "period": "202401",
                                  "value": 1000, "quantity": 10, "quantity_unit": "kg",
                                  "meta": {"foo": "bar"}})];
        let rows = transform(&records);
        assert_eq!(rows.len(), 1);
        match rows[0].get("period") {
            Some(Value::Timestamp(ts)) => {
                assert_eq!(ts.format("%Y-%m-%d").to_string(), "2024-01-01")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(rows[0].get("meta"), Some(&Value::Json(json!({"foo": "bar"}))));
    }

    #[test]
    fn transport_disruptions_carry_replay_safe_dedupe_keys() {
        let rec = json!({"source": "gdelt_transport", "GLOBALEVENTID": "2",
                         "DATEADDED": "20240102", "ActionGeo_Lat": 10.0, "ActionGeo_Long": 20.0});
        let rows = transform(std::slice::from_ref(&rec));
        assert_eq!(
            rows[0].get("dedupe_key"),
            Some(&Value::Text("gdelt_transport:2".to_string()))
        );
        assert_eq!(
            rows[0].get("event_type"),
            Some(&Value::Text("transport_disruption".to_string()))
        );
    }
}
