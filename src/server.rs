//! ==============================================================================
//! server.rs - dashboard and json api
//! ==============================================================================
//!
//! routes:
//!     GET  /                          html dashboard (svg map, hotspot + region tables)
//!     GET  /api/sensor-data           readings of the displayed cycle
//!     GET  /api/markers               marker layer for the browser map
//!     GET  /api/markers/:id           detail card for one marker (read only)
//!     POST /api/markers/:id/click     click: opens the detail view on the surface
//!     POST /api/markers/:id/hover     ?active=true|false, label overlay
//!     GET  /api/detail                detail view currently open (null if none)
//!     GET  /api/hotspots              readings at or above the hotspot threshold
//!     GET  /api/hotspot-detection     hotspot alerts with priority / dispatch
//!     GET  /api/ranked                readings by concentration, highest first
//!     GET  /api/insights              network stats and region summaries
//!     GET  /api/status                generation, counts, last update
//!     POST /api/refresh               manual refresh cycle
//!
//! every GET takes the read lock briefly and clones out what it serves; click
//! and hover are POSTs and take the write lock because they touch the surface.
//!
//! ==============================================================================

use crate::domain::SensorReading;
use crate::hotspot::{detect_hotspots, hotspot_filter, rank_by_concentration, HotspotAlert};
use crate::insights::{insights, Insights, RegionSummary};
use crate::refresh::{RefreshOutcome, Refresher};
use crate::registry::{DetailCard, MarkerId};
use crate::source::ReadingSource;
use crate::surface::{HeadlessSurface, LayerEntry, MapSurface};

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

type Shared<R> = Arc<Refresher<R, HeadlessSurface>>;

pub fn router<R: ReadingSource>(refresher: Shared<R>) -> Router {
    Router::new()
        .route("/", get(dashboard_handler::<R>))
        .route("/api/sensor-data", get(sensor_data_handler::<R>))
        .route("/api/markers", get(markers_handler::<R>))
        .route("/api/markers/:id", get(marker_handler::<R>))
        .route("/api/markers/:id/click", post(marker_click_handler::<R>))
        .route("/api/markers/:id/hover", post(marker_hover_handler::<R>))
        .route("/api/detail", get(detail_handler::<R>))
        .route("/api/hotspots", get(hotspots_handler::<R>))
        .route("/api/hotspot-detection", get(hotspot_detection_handler::<R>))
        .route("/api/ranked", get(ranked_handler::<R>))
        .route("/api/insights", get(insights_handler::<R>))
        .route("/api/status", get(status_handler::<R>))
        .route("/api/refresh", post(refresh_handler::<R>))
        .layer(CorsLayer::permissive())
        .with_state(refresher)
}

pub async fn run_server<R: ReadingSource>(bind: &str, refresher: Shared<R>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    tracing::info!("[STARTUP] ✓ Dashboard live at http://{}", bind);
    axum::serve(listener, router(refresher)).await?;
    Ok(())
}

// ==============================================================================
// json api
// ==============================================================================

async fn sensor_data_handler<R: ReadingSource>(
    State(refresher): State<Shared<R>>,
) -> Json<Vec<SensorReading>> {
    let state = refresher.state().read().await;
    Json(state.readings.clone())
}

async fn markers_handler<R: ReadingSource>(
    State(refresher): State<Shared<R>>,
) -> Json<Vec<LayerEntry>> {
    let state = refresher.state().read().await;
    Json(state.registry.surface().layer())
}

async fn marker_handler<R: ReadingSource>(
    State(refresher): State<Shared<R>>,
    Path(id): Path<u64>,
) -> Result<Json<DetailCard>, StatusCode> {
    let state = refresher.state().read().await;
    state
        .registry
        .marker(MarkerId(id))
        .map(|m| Json(m.detail()))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn marker_click_handler<R: ReadingSource>(
    State(refresher): State<Shared<R>>,
    Path(id): Path<u64>,
) -> Result<Json<DetailCard>, StatusCode> {
    let mut state = refresher.state().write().await;
    state
        .registry
        .click(MarkerId(id))
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// the open detail view; cleared when its marker is replaced
async fn detail_handler<R: ReadingSource>(
    State(refresher): State<Shared<R>>,
) -> Json<Option<DetailCard>> {
    let state = refresher.state().read().await;
    Json(state.registry.surface().detail().cloned())
}

#[derive(Deserialize)]
struct HoverParams {
    active: bool,
}

async fn marker_hover_handler<R: ReadingSource>(
    State(refresher): State<Shared<R>>,
    Path(id): Path<u64>,
    Query(params): Query<HoverParams>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let mut state = refresher.state().write().await;
    if !state.registry.hover(MarkerId(id), params.active) {
        return Err(StatusCode::NOT_FOUND);
    }
    let label = state
        .registry
        .surface()
        .entry(MarkerId(id))
        .map(|e| e.label.clone())
        .unwrap_or_default();
    Ok(Json(serde_json::json!({
        "id": id,
        "label": label,
        "label_visible": params.active,
    })))
}

async fn hotspots_handler<R: ReadingSource>(
    State(refresher): State<Shared<R>>,
) -> Json<Vec<SensorReading>> {
    let state = refresher.state().read().await;
    Json(hotspot_filter(&state.readings).into_iter().cloned().collect())
}

async fn hotspot_detection_handler<R: ReadingSource>(
    State(refresher): State<Shared<R>>,
) -> Json<Vec<HotspotAlert>> {
    let state = refresher.state().read().await;
    Json(detect_hotspots(&state.readings))
}

async fn ranked_handler<R: ReadingSource>(
    State(refresher): State<Shared<R>>,
) -> Json<Vec<SensorReading>> {
    let state = refresher.state().read().await;
    Json(rank_by_concentration(&state.readings).into_iter().cloned().collect())
}

async fn insights_handler<R: ReadingSource>(State(refresher): State<Shared<R>>) -> Json<Insights> {
    let state = refresher.state().read().await;
    Json(insights(&state.readings))
}

#[derive(Serialize)]
struct StatusBody {
    source: String,
    generation: u64,
    markers: usize,
    drawn: usize,
    readings: usize,
    skipped: usize,
    last_update: Option<DateTime<Utc>>,
}

async fn status_handler<R: ReadingSource>(State(refresher): State<Shared<R>>) -> Json<StatusBody> {
    let state = refresher.state().read().await;
    Json(StatusBody {
        source: refresher.source().describe(),
        generation: state.generation,
        markers: state.registry.len(),
        drawn: state.registry.surface().visible_count(),
        readings: state.readings.len(),
        skipped: state.skipped,
        last_update: state.last_update,
    })
}

async fn refresh_handler<R: ReadingSource>(
    State(refresher): State<Shared<R>>,
) -> Json<RefreshOutcome> {
    Json(refresher.refresh_once().await)
}

// ==============================================================================
// html dashboard
// ==============================================================================

const MAP_WIDTH: f64 = 720.0;
const MAP_HEIGHT: f64 = 360.0;

async fn dashboard_handler<R: ReadingSource>(State(refresher): State<Shared<R>>) -> Html<String> {
    let state = refresher.state().read().await;
    let layer = state.registry.surface().layer();
    let hotspots = detect_hotspots(&state.readings);
    let summary = insights(&state.readings);
    let updated = state
        .last_update
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "waiting for first refresh".to_string());
    Html(render_dashboard(&layer, &hotspots, &summary.regions, &updated))
}

fn render_dashboard(
    layer: &[LayerEntry],
    hotspots: &[HotspotAlert],
    regions: &[RegionSummary],
    updated: &str,
) -> String {
    let mut markers = String::new();
    for m in layer {
        // equirectangular projection onto the svg viewbox
        let x = (m.lng + 180.0) / 360.0 * MAP_WIDTH;
        let y = (90.0 - m.lat) / 180.0 * MAP_HEIGHT;
        let _ = write!(
            markers,
            r#"<a href="/api/markers/{id}"><circle cx="{x:.2}" cy="{y:.2}" r="{r:.2}" fill="{fill}" fill-opacity="0.8"><title>{label}</title></circle></a>"#,
            id = m.id.0,
            r = m.size / 2.0,
            fill = m.fill,
            label = html_escape(&m.label),
        );
    }

    let mut hotspot_rows = String::new();
    for h in hotspots {
        let _ = write!(
            hotspot_rows,
            "<tr><td>{}</td><td>{}</td><td>{:.1}</td><td>{:.0}</td><td>{:?}</td><td>{}</td></tr>",
            html_escape(&h.id),
            html_escape(&h.location),
            h.pollution_level,
            h.microplastics,
            h.priority,
            h.cleanup_units_dispatched,
        );
    }

    let mut region_rows = String::new();
    for r in regions {
        let _ = write!(
            region_rows,
            "<tr><td>{}</td><td>{}</td><td>{:.1}</td><td>{:.1}</td><td>{:?}</td><td>{:?}</td></tr>",
            html_escape(&r.location),
            r.readings,
            r.average_level,
            r.max_level,
            r.trend,
            r.priority,
        );
    }

    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="30">
<title>AquaPulse</title>
<style>
body {{ font-family: system-ui; padding: 1.5rem; background: #0f172a; color: #e2e8f0; }}
svg {{ background: #1e293b; border-radius: 8px; width: 100%; max-width: 960px; }}
table {{ border-collapse: collapse; margin-top: 1rem; }}
td, th {{ padding: 0.25rem 0.75rem; border-bottom: 1px solid #334155; text-align: left; }}
</style>
</head>
<body>
<h1>AquaPulse</h1>
<p>{count} sensors &middot; {hot} hotspots &middot; updated {updated}</p>
<svg viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">{markers}</svg>
<h2>Hotspots</h2>
<table><tr><th>Sensor</th><th>Location</th><th>Level</th><th>Concentration</th><th>Priority</th><th>Units</th></tr>{hotspot_rows}</table>
<h2>Regions</h2>
<table><tr><th>Region</th><th>Sensors</th><th>Average</th><th>Max</th><th>Trend</th><th>Priority</th></tr>{region_rows}</table>
</body>
</html>"#,
        count = layer.len(),
        hot = hotspots.len(),
        updated = html_escape(updated),
        w = MAP_WIDTH,
        h = MAP_HEIGHT,
    )
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
     .replace('<', "&lt;")
     .replace('>', "&gt;")
     .replace('"', "&quot;")
}
