//! Vessel-stream derivation: discrete logistics events and rolling queue /
//! transit snapshots from an ordered AIS position stream.
//!
//! The tracker owns only set membership (port queues, chokepoint transits);
//! the per-vessel state lives behind `VesselStateStore` so a caller can swap
//! the in-memory map for a persisted one. State is process-lifetime-scoped:
//! sessions that began before a restart will not emit matching exit events.

use std::collections::{HashMap, HashSet};

use tradewinds_core::{RawItem, Row, Value};

use super::{date_value, f64_field, num_field, str_field};

/// Last observed values for one vessel, keyed by `mmsi`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VesselState {
    pub nav_status: Option<String>,
    pub port_id: Option<String>,
    pub chokepoint_id: Option<String>,
    pub draught: Option<f64>,
}

pub trait VesselStateStore: Send {
    fn get(&self, mmsi: &str) -> Option<VesselState>;
    fn put(&mut self, mmsi: &str, state: VesselState);
}

#[derive(Debug, Default)]
pub struct MemoryVesselStates {
    states: HashMap<String, VesselState>,
}

impl MemoryVesselStates {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VesselStateStore for MemoryVesselStates {
    fn get(&self, mmsi: &str) -> Option<VesselState> {
        self.states.get(mmsi).cloned()
    }

    fn put(&mut self, mmsi: &str, state: VesselState) {
        self.states.insert(mmsi.to_string(), state);
    }
}

/// A derived row, tagged with the table family it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivedRow {
    Event(Row),
    PortSnapshot(Row),
    ChokepointSnapshot(Row),
}

impl DerivedRow {
    pub fn row(&self) -> &Row {
        match self {
            DerivedRow::Event(row)
            | DerivedRow::PortSnapshot(row)
            | DerivedRow::ChokepointSnapshot(row) => row,
        }
    }
}

pub struct VesselTracker {
    states: Box<dyn VesselStateStore>,
    port_queues: HashMap<String, HashSet<String>>,
    chokepoint_transits: HashMap<String, HashSet<String>>,
}

struct Observation {
    mmsi: String,
    ts_raw: String,
    nav_status: Option<String>,
    port_id: Option<String>,
    chokepoint_id: Option<String>,
    draught: Option<f64>,
    lat: Value,
    lon: Value,
}

impl VesselTracker {
    pub fn new(states: Box<dyn VesselStateStore>) -> Self {
        Self {
            states,
            port_queues: HashMap::new(),
            chokepoint_transits: HashMap::new(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryVesselStates::new()))
    }

    /// Evaluate one position message against the vessel's previous state.
    /// Transitions run in a fixed order and several may fire for one
    /// message; the stored state is replaced unconditionally afterwards.
    pub fn observe(&mut self, msg: &RawItem) -> Vec<DerivedRow> {
        let Some(obs) = parse_observation(msg) else {
            return Vec::new();
        };
        let prev = self.states.get(&obs.mmsi).unwrap_or_default();
        let mut out = Vec::new();

        let at_anchor = obs.nav_status.as_deref() == Some("at_anchor");
        let was_at_anchor = prev.nav_status.as_deref() == Some("at_anchor");

        if !was_at_anchor && at_anchor {
            if let Some(port) = obs.port_id.clone() {
                self.port_queues
                    .entry(port.clone())
                    .or_default()
                    .insert(obs.mmsi.clone());
                out.push(DerivedRow::Event(event_row(
                    &obs,
                    "AnchorageQueueEnter",
                    Some(port.as_str()),
                    None,
                    Value::Null,
                )));
                out.push(DerivedRow::PortSnapshot(self.port_snapshot(&port, &obs)));
            }
        }

        if was_at_anchor && !at_anchor {
            if let Some(port) = obs.port_id.clone() {
                let queued = self
                    .port_queues
                    .get(&port)
                    .map(|q| q.contains(&obs.mmsi))
                    .unwrap_or(false);
                if queued {
                    if let Some(queue) = self.port_queues.get_mut(&port) {
                        queue.remove(&obs.mmsi);
                    }
                    out.push(DerivedRow::Event(event_row(
                        &obs,
                        "AnchorageQueueExit",
                        Some(port.as_str()),
                        None,
                        Value::Null,
                    )));
                    out.push(DerivedRow::PortSnapshot(self.port_snapshot(&port, &obs)));
                }
            }
        }

        if obs.nav_status.as_deref() == Some("moored")
            && prev.nav_status.as_deref() != Some("moored")
        {
            if let Some(port) = obs.port_id.as_deref() {
                out.push(DerivedRow::Event(event_row(
                    &obs,
                    "PortCall",
                    Some(port),
                    None,
                    Value::Null,
                )));
            }
        }

        if let Some(prev_port) = prev.port_id.as_deref() {
            if obs.port_id.is_none() && obs.nav_status.as_deref() == Some("under_way") {
                out.push(DerivedRow::Event(event_row(
                    &obs,
                    "PortDepart",
                    Some(prev_port),
                    None,
                    Value::Null,
                )));
            }
        }

        if prev.chokepoint_id.is_none() {
            if let Some(cp) = obs.chokepoint_id.clone() {
                self.chokepoint_transits
                    .entry(cp.clone())
                    .or_default()
                    .insert(obs.mmsi.clone());
                out.push(DerivedRow::Event(event_row(
                    &obs,
                    "TransitStart",
                    None,
                    Some(cp.as_str()),
                    Value::Null,
                )));
                out.push(DerivedRow::ChokepointSnapshot(
                    self.chokepoint_snapshot(&cp, &obs),
                ));
            }
        }

        if let Some(prev_cp) = prev.chokepoint_id.clone() {
            if obs.chokepoint_id.is_none() {
                let in_transit = self
                    .chokepoint_transits
                    .get(&prev_cp)
                    .map(|t| t.contains(&obs.mmsi))
                    .unwrap_or(false);
                if in_transit {
                    if let Some(transits) = self.chokepoint_transits.get_mut(&prev_cp) {
                        transits.remove(&obs.mmsi);
                    }
                    out.push(DerivedRow::Event(event_row(
                        &obs,
                        "TransitEnd",
                        None,
                        Some(prev_cp.as_str()),
                        Value::Null,
                    )));
                    out.push(DerivedRow::ChokepointSnapshot(
                        self.chokepoint_snapshot(&prev_cp, &obs),
                    ));
                }
            }
        }

        if let (Some(from), Some(to)) = (prev.draught, obs.draught) {
            if from != to {
                out.push(DerivedRow::Event(event_row(
                    &obs,
                    "DraftChange",
                    obs.port_id.as_deref(),
                    None,
                    Value::Json(serde_json::json!({"from": from, "to": to})),
                )));
            }
        }

        self.states.put(
            &obs.mmsi,
            VesselState {
                nav_status: obs.nav_status,
                port_id: obs.port_id,
                chokepoint_id: obs.chokepoint_id,
                draught: obs.draught,
            },
        );
        out
    }

    fn port_snapshot(&self, port: &str, obs: &Observation) -> Row {
        let queue_length = self.port_queues.get(port).map(HashSet::len).unwrap_or(0);
        Row::new()
            .set("port_id", port)
            .set("vessel_class", "all")
            .set("ts", date_value(&obs.ts_raw))
            .set("queue_length", queue_length as i64)
            .set("avg_wait_hours", Value::Null)
            .set("throughput_departures", Value::Null)
            .set("congestion_index", Value::Null)
            .set("source", "aisstream")
    }

    fn chokepoint_snapshot(&self, chokepoint: &str, obs: &Observation) -> Row {
        let active = self
            .chokepoint_transits
            .get(chokepoint)
            .map(HashSet::len)
            .unwrap_or(0);
        Row::new()
            .set("chokepoint_id", chokepoint)
            .set("vessel_class", "all")
            .set("ts", date_value(&obs.ts_raw))
            .set("active_transits", active as i64)
            .set("avg_transit_minutes", Value::Null)
            .set("transit_delay_index", Value::Null)
            .set("source", "aisstream")
    }
}

fn parse_observation(msg: &RawItem) -> Option<Observation> {
    let mmsi = str_field(msg, "mmsi")?;
    Some(Observation {
        mmsi,
        ts_raw: str_field(msg, "ts").unwrap_or_default(),
        nav_status: str_field(msg, "nav_status"),
        port_id: str_field(msg, "port_id"),
        chokepoint_id: str_field(msg, "chokepoint_id"),
        draught: f64_field(msg, "draught_m"),
        lat: num_field(msg, "lat"),
        lon: num_field(msg, "lon"),
    })
}

fn event_row(
    obs: &Observation,
    event_type: &str,
    port_id: Option<&str>,
    chokepoint_id: Option<&str>,
    attrs: Value,
) -> Row {
    Row::new()
        .set("event_type", event_type)
        .set("ts", date_value(&obs.ts_raw))
        .set("mmsi", obs.mmsi.as_str())
        .set("port_id", port_id)
        .set("chokepoint_id", chokepoint_id)
        .set("lat", obs.lat.clone())
        .set("lon", obs.lon.clone())
        .set("channel", Value::Null)
        .set("attrs", attrs)
        .set(
            "dedupe_key",
            format!("{}:{event_type}:{}", obs.mmsi, obs.ts_raw),
        )
}
