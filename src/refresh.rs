//! ==============================================================================
//! refresh.rs - the fetch-then-replace refresh cycle
//! ==============================================================================
//!
//! purpose:
//!     one refresh cycle = take a sequence number, fetch, parse, apply.
//!     the timed loop and the manual refresh endpoint both go through
//!     `Refresher::refresh_once`, so they may overlap freely.
//!
//! consistency rules:
//!     - the write lock is only taken for the apply step, never across a fetch
//!     - a result older than what is displayed is dropped (last issued wins,
//!       no flicker back to older data)
//!     - a failed fetch leaves markers and readings exactly as they were
//!     - malformed records are skipped one by one, the rest still render
//!
//! relationships:
//!     - used by: main.rs (timed loop), server.rs (POST /api/refresh)
//!     - uses: source.rs, domain.rs (parse_readings), registry.rs (replace_all)
//!
//! ==============================================================================

use crate::domain::{parse_readings, SensorReading};
use crate::hotspot::hotspot_filter;
use crate::registry::MarkerRegistry;
use crate::source::ReadingSource;
use crate::surface::MapSurface;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

// ==============================================================================
// shared state
// ==============================================================================
// written by the refresh cycle, read by every http handler.

pub struct DashboardState<S: MapSurface> {
    pub registry: MarkerRegistry<S>,
    /// readings of the displayed cycle, in fetch order
    pub readings: Vec<SensorReading>,
    /// sequence number of the displayed cycle (0 = nothing yet)
    pub generation: u64,
    /// records dropped as malformed in the displayed cycle
    pub skipped: usize,
    pub last_update: Option<DateTime<Utc>>,
}

impl<S: MapSurface> DashboardState<S> {
    pub fn new(surface: S) -> Self {
        Self {
            registry: MarkerRegistry::new(surface),
            readings: Vec::new(),
            generation: 0,
            skipped: 0,
            last_update: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RefreshOutcome {
    Applied {
        generation: u64,
        markers: usize,
        hotspots: usize,
        skipped: usize,
    },
    /// a newer cycle was already displayed when this one finished
    Stale { sequence: u64, displayed: u64 },
    Failed { sequence: u64, error: String },
}

pub struct Refresher<R: ReadingSource, S: MapSurface> {
    source: R,
    state: Arc<RwLock<DashboardState<S>>>,
    issued: AtomicU64,
    show_sensor_data: bool,
}

impl<R: ReadingSource, S: MapSurface> Refresher<R, S> {
    pub fn new(source: R, state: Arc<RwLock<DashboardState<S>>>) -> Self {
        Self {
            source,
            state,
            issued: AtomicU64::new(0),
            show_sensor_data: false,
        }
    }

    pub fn with_sensor_logging(mut self, show: bool) -> Self {
        self.show_sensor_data = show;
        self
    }

    pub fn state(&self) -> &Arc<RwLock<DashboardState<S>>> {
        &self.state
    }

    pub fn source(&self) -> &R {
        &self.source
    }

    /// reserve the next sequence number
    pub fn begin(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub async fn refresh_once(&self) -> RefreshOutcome {
        let sequence = self.begin();
        let fetched = self.source.fetch().await;
        self.apply(sequence, fetched).await
    }

    /// apply the result of fetch number `sequence`
    pub async fn apply(&self, sequence: u64, fetched: Result<Vec<Value>>) -> RefreshOutcome {
        let records = match fetched {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(sequence, "sensor fetch failed, keeping last good markers: {:#}", e);
                return RefreshOutcome::Failed { sequence, error: format!("{:#}", e) };
            }
        };

        // parse outside the lock
        let batch = parse_readings(records);
        for (index, reason) in &batch.skipped {
            tracing::debug!(sequence, index, "skipping sensor record: {}", reason);
        }

        let mut state = self.state.write().await;
        if sequence <= state.generation {
            tracing::debug!(sequence, displayed = state.generation, "discarding stale refresh");
            return RefreshOutcome::Stale { sequence, displayed: state.generation };
        }

        let markers = state.registry.replace_all(&batch.readings);
        let hotspots = hotspot_filter(&batch.readings).len();
        let skipped = batch.skipped.len();

        if self.show_sensor_data {
            for r in &batch.readings {
                tracing::info!(
                    "[SENSOR] {} @ {} | level {:.1} | concentration {:.0} | {:?}",
                    r.id, r.location, r.severity_level, r.concentration, r.status
                );
            }
        }

        state.readings = batch.readings;
        state.generation = sequence;
        state.skipped = skipped;
        state.last_update = Some(Utc::now());

        tracing::info!(generation = sequence, markers, hotspots, skipped, "refresh applied");
        RefreshOutcome::Applied { generation: sequence, markers, hotspots, skipped }
    }

    /// timed refresh loop; never returns
    pub async fn run(self: Arc<Self>, interval: Duration) {
        tracing::info!(
            "[RUNTIME] Refreshing from {} every {}s",
            self.source.describe(),
            interval.as_secs()
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.refresh_once().await;
        }
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::HeadlessSurface;
    use anyhow::anyhow;
    use serde_json::json;
    use std::sync::Mutex;

    /// hands out queued responses in order, then errors
    struct ScriptedSource {
        responses: Mutex<Vec<Result<Vec<Value>>>>,
    }

    impl ScriptedSource {
        fn new(mut responses: Vec<Result<Vec<Value>>>) -> Self {
            responses.reverse();
            Self { responses: Mutex::new(responses) }
        }
    }

    impl ReadingSource for ScriptedSource {
        async fn fetch(&self) -> Result<Vec<Value>> {
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(anyhow!("script exhausted")))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn record(id: &str, level: f64, lat: f64, lng: f64) -> Value {
        json!({"id": id, "location": "Test Sea", "lat": lat, "lng": lng, "pollution_level": level})
    }

    fn refresher(responses: Vec<Result<Vec<Value>>>) -> Refresher<ScriptedSource, HeadlessSurface> {
        let state = Arc::new(RwLock::new(DashboardState::new(HeadlessSurface::new())));
        Refresher::new(ScriptedSource::new(responses), state)
    }

    #[tokio::test]
    async fn applied_refresh_populates_markers_and_readings() {
        let r = refresher(vec![Ok(vec![
            record("s1", 8.0, 10.0, 20.0),
            record("s2", 5.0, 0.0, 0.0),
            record("s3", 7.0, 5.0, 5.0),
        ])]);

        let outcome = r.refresh_once().await;
        assert_eq!(
            outcome,
            RefreshOutcome::Applied { generation: 1, markers: 3, hotspots: 2, skipped: 0 }
        );

        let state = r.state().read().await;
        assert_eq!(state.registry.len(), 3);
        assert_eq!(state.readings.len(), 3);
        assert_eq!(state.generation, 1);
        assert!(state.last_update.is_some());
    }

    #[tokio::test]
    async fn failed_fetch_keeps_last_good_markers() {
        let r = refresher(vec![
            Ok(vec![record("a", 1.0, 0.0, 0.0), record("b", 9.0, 1.0, 1.0)]),
            Err(anyhow!("connection refused")),
        ]);
        r.refresh_once().await;
        let outcome = r.refresh_once().await;
        assert!(matches!(outcome, RefreshOutcome::Failed { sequence: 2, .. }));

        let state = r.state().read().await;
        assert_eq!(state.registry.len(), 2);
        assert_eq!(state.registry.surface().visible_count(), 2);
        assert_eq!(state.readings.len(), 2);
        assert_eq!(state.generation, 1);
    }

    #[tokio::test]
    async fn malformed_records_do_not_blank_the_map() {
        let r = refresher(vec![Ok(vec![
            record("good", 4.0, 1.0, 1.0),
            json!({"id": "no-coords", "pollution_level": 9.0}),
            record("bad-lat", 4.0, 95.0, 1.0),
            record("also-good", 9.5, 2.0, 2.0),
        ])]);

        let outcome = r.refresh_once().await;
        assert_eq!(
            outcome,
            RefreshOutcome::Applied { generation: 1, markers: 2, hotspots: 1, skipped: 2 }
        );
        assert_eq!(r.state().read().await.skipped, 2);
    }

    #[tokio::test]
    async fn older_result_finishing_late_is_discarded() {
        let r = refresher(vec![]);
        let slow = r.begin();
        let fast = r.begin();

        let applied = r.apply(fast, Ok(vec![record("new", 2.0, 0.0, 0.0)])).await;
        assert!(matches!(applied, RefreshOutcome::Applied { generation: 2, .. }));

        let late = r
            .apply(slow, Ok(vec![record("old-1", 2.0, 0.0, 0.0), record("old-2", 2.0, 0.0, 0.0)]))
            .await;
        assert_eq!(late, RefreshOutcome::Stale { sequence: 1, displayed: 2 });

        let state = r.state().read().await;
        assert_eq!(state.registry.len(), 1);
        assert_eq!(state.readings[0].id, "new");
    }

    #[tokio::test]
    async fn consecutive_refreshes_leave_only_latest_markers() {
        let r = refresher(vec![
            Ok(vec![record("a1", 1.0, 0.0, 0.0), record("a2", 2.0, 0.0, 0.0)]),
            Ok(vec![record("b1", 3.0, 0.0, 0.0)]),
            Ok(vec![]),
        ]);
        r.refresh_once().await;
        r.refresh_once().await;
        {
            let state = r.state().read().await;
            let layer = state.registry.surface().layer();
            assert_eq!(layer.len(), 1);
            assert_eq!(layer[0].sensor_id, "b1");
        }

        // an empty but successful fetch is a real (empty) cycle
        r.refresh_once().await;
        let state = r.state().read().await;
        assert!(state.registry.is_empty());
        assert_eq!(state.registry.surface().visible_count(), 0);
    }
}
