//! AIS stream consumer. Each buffered position message lands in `ais_raw`,
//! refreshes the vessel profile, and feeds the stateful logistics
//! derivation, whose rows fan out across three tables.

use async_trait::async_trait;

use tradewinds_core::{Cursor, RawItem, Row, RunStatus, Value};

use crate::transforms::logistics::{DerivedRow, VesselTracker};
use crate::transforms::{date_value, num_field, str_field};
use crate::{AdapterError, RunContext, SourceAdapter};

const VESSEL_PROFILE_FIELDS: &[&str] = &[
    "imo",
    "call_sign",
    "name",
    "ship_type_code",
    "ship_type_group",
    "length_m",
    "width_m",
    "draught_m",
];

pub struct AisStreamAdapter {
    name: String,
    messages: Vec<RawItem>,
    tracker: VesselTracker,
}

impl AisStreamAdapter {
    pub fn new(name: &str, messages: Vec<RawItem>, tracker: VesselTracker) -> Self {
        Self {
            name: name.to_string(),
            messages,
            tracker,
        }
    }

    fn raw_row(&self, msg: &RawItem) -> Vec<Row> {
        let Some(msg_id) = str_field(msg, "msg_id") else {
            return Vec::new();
        };
        let ts = str_field(msg, "ts").unwrap_or_default();
        vec![Row::new()
            .set("msg_id", msg_id)
            .set("ts", date_value(&ts))
            .set("mmsi", str_field(msg, "mmsi"))
            .set("lat", num_field(msg, "lat"))
            .set("lon", num_field(msg, "lon"))
            .set("sog_kn", num_field(msg, "sog_kn"))
            .set("cog_deg", num_field(msg, "cog_deg"))
            .set("nav_status", str_field(msg, "nav_status"))
            .set("msg_type", str_field(msg, "msg_type"))
            .set("channel", str_field(msg, "channel"))
            .set(
                "payload",
                msg.get("raw").cloned().map(Value::Json).unwrap_or(Value::Null),
            )]
    }

    /// Static vessel data piggybacking on a position message, if any.
    fn vessel_profile_row(msg: &RawItem) -> Option<Row> {
        let mmsi = str_field(msg, "mmsi")?;
        let mut row = Row::new().set("mmsi", mmsi);
        let mut populated = false;
        for field in VESSEL_PROFILE_FIELDS {
            match msg.get(*field) {
                Some(value) if !value.is_null() => {
                    row = row.set(field, Value::from_json(value));
                    populated = true;
                }
                _ => {}
            }
        }
        populated.then_some(row)
    }
}

fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl SourceAdapter for AisStreamAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&mut self, _cursor: Option<&Cursor>) -> Result<Vec<RawItem>, AdapterError> {
        Ok(self.messages.clone())
    }

    fn transform(&mut self, item: &RawItem) -> Vec<Row> {
        self.raw_row(item)
    }

    async fn run(
        &mut self,
        ctx: &RunContext<'_>,
        cursor: Option<&Cursor>,
    ) -> Result<u64, AdapterError> {
        let run_id = ctx.runs.open(ctx.dataset_id).await?;
        let mut ingested: u64 = 0;

        let result = async {
            let messages = self.fetch(cursor).await?;
            for msg in messages {
                let raw_rows = self.raw_row(&msg);
                if !raw_rows.is_empty() {
                    ingested += ctx
                        .loader
                        .upsert("ais_raw", &raw_rows, &keys(&["msg_id"]))
                        .await?;
                }

                if let Some(profile) = Self::vessel_profile_row(&msg) {
                    ingested += ctx
                        .loader
                        .upsert("vessels", &[profile], &keys(&["mmsi"]))
                        .await?;
                }

                for derived in self.tracker.observe(&msg) {
                    ingested += match derived {
                        DerivedRow::Event(row) => {
                            ctx.loader
                                .upsert("logistics_events", &[row], &keys(&["dedupe_key"]))
                                .await?
                        }
                        DerivedRow::PortSnapshot(row) => {
                            ctx.loader
                                .upsert(
                                    "port_congestion_ts",
                                    &[row],
                                    &keys(&["port_id", "vessel_class", "ts"]),
                                )
                                .await?
                        }
                        DerivedRow::ChokepointSnapshot(row) => {
                            ctx.loader
                                .upsert(
                                    "chokepoint_ts",
                                    &[row],
                                    &keys(&["chokepoint_id", "vessel_class", "ts"]),
                                )
                                .await?
                        }
                    };
                }
            }
            Ok::<(), AdapterError>(())
        }
        .await;

        match result {
            Ok(()) => {
                ctx.runs
                    .close(run_id, RunStatus::Success, ingested as i64, None)
                    .await?;
                Ok(ingested)
            }
            Err(err) => {
                ctx.runs
                    .close(run_id, RunStatus::Failed, ingested as i64, Some(&err.to_string()))
                    .await?;
                Err(err)
            }
        }
    }
}
