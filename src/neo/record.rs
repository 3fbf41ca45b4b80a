use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

pub const DEFAULT_VELOCITY: f64 = 10000.0;
pub const DEFAULT_MISS_DISTANCE: f64 = 500000.0;
pub const DEFAULT_MAGNITUDE: f64 = 21.0;

/// One near-Earth object close approach, already cleaned up.
///
/// Numeric fields are always finite: anything missing or malformed in the
/// source falls back to the `DEFAULT_*` constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeoRecord {
    pub name: String,
    pub hazardous: bool,
    /// km/s
    pub velocity: f64,
    /// km
    pub miss_distance: f64,
    pub magnitude: f64,
    /// Close approach time (UTC); midnight when only the date is known.
    pub approach_time: Option<NaiveDateTime>,
}

impl Default for NeoRecord {
    fn default() -> Self {
        Self {
            name: String::new(),
            hazardous: false,
            velocity: DEFAULT_VELOCITY,
            miss_distance: DEFAULT_MISS_DISTANCE,
            magnitude: DEFAULT_MAGNITUDE,
            approach_time: None,
        }
    }
}

impl NeoRecord {
    /// Map one NeoWs-style object. Never fails; see the type docs for defaults.
    pub fn from_raw(raw: &Value) -> Self {
        let approach = raw
            .get("close_approach_data")
            .and_then(Value::as_array)
            .and_then(|list| list.first());

        let velocity = approach
            .and_then(|a| a.pointer("/relative_velocity/kilometers_per_second"))
            .and_then(finite_number)
            .unwrap_or(DEFAULT_VELOCITY);
        let miss_distance = approach
            .and_then(|a| a.pointer("/miss_distance/kilometers"))
            .and_then(finite_number)
            .unwrap_or(DEFAULT_MISS_DISTANCE);
        let approach_time = approach.and_then(parse_approach_time);

        Self {
            name: raw
                .get("name")
                .and_then(Value::as_str)
                .map(str::trim)
                .unwrap_or_default()
                .to_string(),
            hazardous: raw
                .get("is_potentially_hazardous_asteroid")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            velocity,
            miss_distance,
            magnitude: raw
                .get("absolute_magnitude_h")
                .and_then(finite_number)
                .unwrap_or(DEFAULT_MAGNITUDE),
            approach_time,
        }
    }

    /// Name used for hashing and labels; falls back to the source index.
    pub fn label(&self, index: usize) -> String {
        if self.name.is_empty() {
            index.to_string()
        } else {
            self.name.clone()
        }
    }
}

/// NeoWs encodes most numbers as strings; accept both.
fn finite_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn parse_approach_time(approach: &Value) -> Option<NaiveDateTime> {
    // e.g. "2024-Jan-05 12:34"
    let full = approach.get("close_approach_date_full").and_then(Value::as_str);
    if let Some(full) = full {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(full.trim(), "%Y-%b-%d %H:%M") {
            return Some(parsed);
        }
    }

    approach
        .get("close_approach_date")
        .and_then(Value::as_str)
        .and_then(|date| NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok())
        .or_else(|| {
            full.and_then(|full| full.split_whitespace().next())
                .and_then(|date| NaiveDate::parse_from_str(date, "%Y-%b-%d").ok())
        })
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Flatten a NeoWs feed (`near_earth_objects` keyed by date) or a plain array
/// of objects into records ordered by approach time. Undated records keep
/// their source order after all dated ones.
pub fn parse_feed(data: &Value) -> Vec<NeoRecord> {
    let raw_objects: Vec<&Value> = match data {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.get("near_earth_objects") {
            Some(Value::Object(days)) => days
                .values()
                .filter_map(Value::as_array)
                .flatten()
                .collect(),
            Some(Value::Array(items)) => items.iter().collect(),
            _ => {
                warn!("Feed has no near_earth_objects; treating as empty");
                Vec::new()
            }
        },
        _ => {
            warn!("Unrecognized feed shape; treating as empty");
            Vec::new()
        }
    };

    let mut records: Vec<NeoRecord> = raw_objects.into_iter().map(NeoRecord::from_raw).collect();
    records.sort_by_key(|r| (r.approach_time.is_none(), r.approach_time));
    records
}

/// Read a feed file from disk.
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<NeoRecord>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read NEO data {}", path.display()))?;
    let data: Value = serde_json::from_str(&json)
        .with_context(|| format!("NEO data {} is not valid JSON", path.display()))?;
    let records = parse_feed(&data);
    info!("Loaded {} NEO records from {}", records.len(), path.display());
    Ok(records)
}
