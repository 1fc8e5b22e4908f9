//! ==============================================================================
//! hotspot.rs - hotspot filter and derived list views
//! ==============================================================================
//!
//! purpose:
//!     the hotspot subset (level >= HOTSPOT_THRESHOLD), the hotspot detection
//!     alerts built on it, and the concentration ranking for the analytics
//!     panel. marker styling in registry.rs goes through `is_hotspot` too, so
//!     the map and the lists can never disagree on what a hotspot is.
//!
//! ==============================================================================

use crate::domain::{LatLng, SensorReading, SensorStatus};
use serde::Serialize;

pub const HOTSPOT_THRESHOLD: f64 = 7.0;

/// above this a hotspot is high priority and gets two cleanup units
pub const CRITICAL_LEVEL: f64 = 8.0;

pub fn is_hotspot(reading: &SensorReading) -> bool {
    reading.severity_level >= HOTSPOT_THRESHOLD
}

/// hotspots in input order
pub fn hotspot_filter(readings: &[SensorReading]) -> Vec<&SensorReading> {
    readings.iter().filter(|r| is_hotspot(r)).collect()
}

/// all readings, highest concentration first; ties keep input order
pub fn rank_by_concentration(readings: &[SensorReading]) -> Vec<&SensorReading> {
    let mut ranked: Vec<&SensorReading> = readings.iter().collect();
    // sort_by is stable
    ranked.sort_by(|a, b| b.concentration.total_cmp(&a.concentration));
    ranked
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HotspotAlert {
    pub id: String,
    pub location: String,
    pub coordinates: LatLng,
    pub pollution_level: f64,
    pub microplastics: f64,
    pub status: SensorStatus,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_at: Option<String>,
    pub cleanup_units_dispatched: u8,
}

pub fn detect_hotspots(readings: &[SensorReading]) -> Vec<HotspotAlert> {
    hotspot_filter(readings)
        .into_iter()
        .map(|r| {
            let priority = if r.severity_level > CRITICAL_LEVEL {
                Priority::High
            } else {
                Priority::Medium
            };
            HotspotAlert {
                id: r.id.clone(),
                location: r.location.clone(),
                coordinates: r.position(),
                pollution_level: r.severity_level,
                microplastics: r.concentration,
                status: r.status,
                priority,
                detected_at: r.timestamp.clone(),
                cleanup_units_dispatched: match priority {
                    Priority::High => 2,
                    Priority::Medium => 1,
                },
            }
        })
        .collect()
}
