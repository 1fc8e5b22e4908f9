//! regional insights for the analytics panel
//!
//! network-wide counts and a per-location summary (average / max level, trend
//! and cleanup priority), recomputed from the current readings on request.

use crate::domain::{SensorReading, SensorStatus};
use crate::hotspot::{hotspot_filter, CRITICAL_LEVEL};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

const INCREASING_AVERAGE: f64 = 7.0;
const IMPROVING_AVERAGE: f64 = 4.0;
const HIGH_PRIORITY_MAX: f64 = 6.0;

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
    pub total_sensors: usize,
    pub active_sensors: usize,
    pub critical_alerts: usize,
    pub locations_monitored: usize,
    pub hotspots: usize,
}

pub fn network_stats(readings: &[SensorReading]) -> NetworkStats {
    let locations: HashSet<&str> = readings.iter().map(|r| r.location.as_str()).collect();
    NetworkStats {
        total_sensors: readings.len(),
        active_sensors: readings.iter().filter(|r| r.status == SensorStatus::Active).count(),
        critical_alerts: readings.iter().filter(|r| r.status == SensorStatus::Critical).count(),
        locations_monitored: locations.len(),
        hotspots: hotspot_filter(readings).len(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Stable,
    Improving,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionPriority {
    Medium,
    High,
    Critical,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RegionSummary {
    pub location: String,
    pub readings: usize,
    pub average_level: f64,
    pub max_level: f64,
    pub trend: Trend,
    pub priority: RegionPriority,
}

/// per-location summaries, worst region first
pub fn region_summaries(readings: &[SensorReading]) -> Vec<RegionSummary> {
    // first-seen order so equal maxima stay deterministic
    let mut order: Vec<&str> = Vec::new();
    let mut levels: HashMap<&str, Vec<f64>> = HashMap::new();
    for r in readings {
        let entry = levels.entry(r.location.as_str()).or_default();
        if entry.is_empty() {
            order.push(r.location.as_str());
        }
        entry.push(r.severity_level);
    }

    let mut summaries: Vec<RegionSummary> = order
        .into_iter()
        .filter_map(|location| {
            let values = levels.get(location)?;
            let average_level = values.iter().sum::<f64>() / values.len() as f64;
            let max_level = values.iter().copied().fold(f64::MIN, f64::max);

            let trend = if average_level > INCREASING_AVERAGE {
                Trend::Increasing
            } else if average_level < IMPROVING_AVERAGE {
                Trend::Improving
            } else {
                Trend::Stable
            };
            let priority = if max_level > CRITICAL_LEVEL {
                RegionPriority::Critical
            } else if max_level > HIGH_PRIORITY_MAX {
                RegionPriority::High
            } else {
                RegionPriority::Medium
            };

            // bands use the raw values, the summary reports one decimal
            Some(RegionSummary {
                location: location.to_string(),
                readings: values.len(),
                average_level: round_tenth(average_level),
                max_level: round_tenth(max_level),
                trend,
                priority,
            })
        })
        .collect();

    summaries.sort_by(|a, b| b.max_level.total_cmp(&a.max_level));
    summaries
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Insights {
    pub statistics: NetworkStats,
    pub regions: Vec<RegionSummary>,
}

pub fn insights(readings: &[SensorReading]) -> Insights {
    Insights {
        statistics: network_stats(readings),
        regions: region_summaries(readings),
    }
}
