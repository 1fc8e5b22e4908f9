//! ==============================================================================
//! domain.rs - sensor reading data contracts
//! ==============================================================================
//!
//! purpose:
//!     the validated `SensorReading` every other module works with, and the
//!     loose `RawSensorRecord` it is parsed from.
//!
//! wire format:
//!     upstream records use the legacy field names `pollution_level` (severity)
//!     and `microplastics` (concentration, older feeds: `microalgae`, some send
//!     both). readings are serialized back out
//!     under the same names so the browser sees the shape it always did.
//!
//! relationships:
//!     - used by: refresh.rs (parse_readings on every fetched batch)
//!     - used by: registry.rs, hotspot.rs, insights.rs (read-only views)
//!     - uses: classifier.rs (clamp_level)
//!
//! ==============================================================================

use crate::classifier::clamp_level;
use crate::error::ReadingError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// operational state reported by the sensor, independent of its level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    Active,
    Warning,
    Critical,
    Unknown,
}

impl SensorStatus {
    pub fn from_wire(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "warning" => Self::Warning,
            "critical" => Self::Critical,
            _ => Self::Unknown,
        }
    }

    /// status for records that arrive without one
    pub fn from_level(level: f64) -> Self {
        if level > 8.0 {
            Self::Critical
        } else if level > 6.0 {
            Self::Warning
        } else {
            Self::Active
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

/// one validated observation from one monitoring point
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SensorReading {
    /// stable identifier; uniqueness is assumed, not enforced
    pub id: String,
    /// place name, display only
    pub location: String,
    pub lat: f64,
    pub lng: f64,
    /// always within [0, 10]
    #[serde(rename = "pollution_level")]
    pub severity_level: f64,
    /// always >= 0
    #[serde(rename = "microplastics")]
    pub concentration: f64,
    pub status: SensorStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turbidity: Option<f64>,
}

impl SensorReading {
    pub fn position(&self) -> LatLng {
        LatLng { lat: self.lat, lng: self.lng }
    }
}

/// a record as it arrives on the wire, every field optional
///
/// the required numbers (`lat`, `lng`, `pollution_level`) are typed; everything
/// else is kept as raw json so one oddly typed display field only loses itself.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawSensorRecord {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub location: Option<Value>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub pollution_level: Option<f64>,
    #[serde(default)]
    pub microplastics: Option<Value>,
    /// older feeds send the concentration under this name, some send both
    #[serde(default)]
    pub microalgae: Option<Value>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub temperature: Option<Value>,
    #[serde(default)]
    pub turbidity: Option<Value>,
}

fn finite_number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|v| v.is_finite())
}

fn text(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

impl RawSensorRecord {
    pub fn from_value(value: Value) -> Result<Self, ReadingError> {
        serde_json::from_value(value).map_err(|e| ReadingError::Undecodable(e.to_string()))
    }

    /// validate and normalize into a `SensorReading`
    pub fn into_reading(self) -> Result<SensorReading, ReadingError> {
        let id = match self.id {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(ReadingError::MissingField("id")),
        };

        let lat = require_finite(self.lat, "lat")?;
        let lng = require_finite(self.lng, "lng")?;
        let level = require_finite(self.pollution_level, "pollution_level")?;

        if !(-90.0..=90.0).contains(&lat) {
            return Err(ReadingError::OutOfRange { field: "lat", value: lat });
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(ReadingError::OutOfRange { field: "lng", value: lng });
        }

        let severity_level = clamp_level(level);
        // records without a concentration get the level-derived estimate
        let concentration = finite_number(self.microplastics.as_ref())
            .or_else(|| finite_number(self.microalgae.as_ref()))
            .unwrap_or(severity_level * 1000.0)
            .max(0.0);
        let status = text(self.status)
            .as_deref()
            .map(SensorStatus::from_wire)
            .unwrap_or_else(|| SensorStatus::from_level(severity_level));

        Ok(SensorReading {
            id,
            location: text(self.location).unwrap_or_else(|| "Unknown".to_string()),
            lat,
            lng,
            severity_level,
            concentration,
            status,
            timestamp: text(self.timestamp),
            temperature: finite_number(self.temperature.as_ref()),
            turbidity: finite_number(self.turbidity.as_ref()),
        })
    }
}

fn require_finite(value: Option<f64>, field: &'static str) -> Result<f64, ReadingError> {
    match value {
        None => Err(ReadingError::MissingField(field)),
        Some(v) if !v.is_finite() => Err(ReadingError::NonFinite(field)),
        Some(v) => Ok(v),
    }
}

/// result of parsing one fetched batch
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub readings: Vec<SensorReading>,
    /// (index in the batch, reason) for each record that was dropped
    pub skipped: Vec<(usize, ReadingError)>,
}

/// parse a fetched batch, skipping malformed records individually
pub fn parse_readings(values: Vec<Value>) -> ParsedBatch {
    let mut batch = ParsedBatch::default();
    for (index, value) in values.into_iter().enumerate() {
        match RawSensorRecord::from_value(value).and_then(RawSensorRecord::into_reading) {
            Ok(reading) => batch.readings.push(reading),
            Err(e) => batch.skipped.push((index, e)),
        }
    }
    batch
}

#[cfg(test)]
pub(crate) fn sample_reading(id: &str, level: f64, lat: f64, lng: f64) -> SensorReading {
    SensorReading {
        id: id.to_string(),
        location: format!("loc-{id}"),
        lat,
        lng,
        severity_level: level,
        concentration: level * 1000.0,
        status: SensorStatus::from_level(level),
        timestamp: None,
        temperature: None,
        turbidity: None,
    }
}
