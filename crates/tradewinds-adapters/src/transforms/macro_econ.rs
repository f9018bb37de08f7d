//! Macroeconomic indicators (World Bank, IMF) into `metrics_ts` rows.

use tradewinds_core::{RawItem, Row, Value};

use super::{date_value, num_field, str_field};

fn world_bank_indicator(code: &str) -> Option<(&'static str, &'static str)> {
    match code {
        "NY.GDP.MKTP.CD" => Some(("gdp_current_usd", "USD")),
        "FP.CPI.TOTL.ZG" => Some(("cpi_yoy_percent", "percent")),
        "SL.UEM.TOTL.ZS" => Some(("unemployment_percent", "percent")),
        "FR.INR.RINR" => Some(("policy_rate_percent", "percent")),
        _ => None,
    }
}

fn imf_indicator(code: &str) -> Option<(&'static str, &'static str)> {
    match code {
        "NGDP_RPCH" => Some(("real_gdp_growth_percent", "percent")),
        "GGXWDG_NGDP" => Some(("gov_debt_gdp_percent", "percent")),
        "PCPI_IX" => Some(("cpi_index", "index")),
        "TXGOFXD_USD" => Some(("fx_reserves_usd", "USD")),
        "BCA_NGDPD" => Some(("current_account_gdp_percent", "percent")),
        _ => None,
    }
}

pub fn transform(records: &[RawItem]) -> Vec<Row> {
    let mut rows = Vec::new();
    for rec in records {
        let source = str_field(rec, "source").unwrap_or_default();
        let indicator = str_field(rec, "indicator").unwrap_or_default();
        let country = str_field(rec, "country_iso3").or_else(|| str_field(rec, "country"));
        let date = str_field(rec, "date");

        let mapping = match source.as_str() {
            "worldbank" => world_bank_indicator(&indicator),
            "imf" => imf_indicator(&indicator),
            _ => None,
        };

        let (Some((metric, unit)), Some(country), Some(date)) = (mapping, country, date) else {
            continue;
        };

        rows.push(
            Row::new()
                .set("series_id", format!("{country}_{metric}"))
                .set("entity_type", "country")
                .set("entity_id", country)
                .set("metric", metric)
                .set("ts", date_value(&date))
                .set("value", num_field(rec, "value"))
                .set("unit", unit)
                .set("source", source)
                .set("attrs", Value::Null),
        );
    }
    rows
}
