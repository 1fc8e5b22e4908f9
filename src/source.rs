//! ==============================================================================
//! source.rs - where sensor readings come from
//! ==============================================================================
//!
//! purpose:
//!     one pull per refresh cycle. a source returns the raw json records; it
//!     does not validate them (refresh.rs does, record by record).
//!
//! sources:
//!     - HttpSource: GETs a json array from an upstream endpoint
//!     - SimulatedSource: a demo network of sensors spread over ten seas whose
//!       levels drift between pulls
//!
//! relationships:
//!     - used by: refresh.rs (Refresher::refresh_once)
//!     - configured by: config.rs ([source] section)
//!
//! ==============================================================================

use crate::config::{SourceConfig, SourceKind};
use crate::domain::SensorStatus;
use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

pub trait ReadingSource: Send + Sync + 'static {
    /// fetch the current sensor list as raw json records
    fn fetch(&self) -> impl Future<Output = Result<Vec<Value>>> + Send;

    /// short description for logs
    fn describe(&self) -> String;
}

// ==============================================================================
// http source
// ==============================================================================

pub struct HttpSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self { client, url: url.into() })
    }
}

impl ReadingSource for HttpSource {
    async fn fetch(&self) -> Result<Vec<Value>> {
        let records = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", self.url))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", self.url))?
            .json::<Vec<Value>>()
            .await
            .with_context(|| format!("{} did not return a json array", self.url))?;
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("http {}", self.url)
    }
}

// ==============================================================================
// simulated source
// ==============================================================================

struct Region {
    name: &'static str,
    lat: f64,
    lng: f64,
    lat_spread: f64,
    lng_spread: f64,
}

static REGIONS: [Region; 10] = [
    Region { name: "Pacific Ocean", lat: 35.0, lng: 140.0, lat_spread: 10.0, lng_spread: 20.0 },
    Region { name: "Atlantic Ocean", lat: 40.0, lng: -50.0, lat_spread: 10.0, lng_spread: 20.0 },
    Region { name: "Mediterranean Sea", lat: 40.0, lng: 15.0, lat_spread: 5.0, lng_spread: 10.0 },
    Region { name: "Indian Ocean", lat: -20.0, lng: 80.0, lat_spread: 10.0, lng_spread: 20.0 },
    Region { name: "Arctic Ocean", lat: 75.0, lng: 0.0, lat_spread: 5.0, lng_spread: 178.0 },
    Region { name: "Baltic Sea", lat: 58.0, lng: 20.0, lat_spread: 3.0, lng_spread: 5.0 },
    Region { name: "North Sea", lat: 55.0, lng: 3.0, lat_spread: 3.0, lng_spread: 5.0 },
    Region { name: "Caribbean Sea", lat: 15.0, lng: -75.0, lat_spread: 5.0, lng_spread: 10.0 },
    Region { name: "South China Sea", lat: 15.0, lng: 115.0, lat_spread: 5.0, lng_spread: 10.0 },
    Region { name: "Gulf of Mexico", lat: 25.0, lng: -90.0, lat_spread: 5.0, lng_spread: 10.0 },
];

struct SimSensor {
    id: String,
    region: &'static Region,
    lat: f64,
    lng: f64,
    level: f64,
}

struct SimState {
    rng: StdRng,
    sensors: Vec<SimSensor>,
}

pub struct SimulatedSource {
    state: Mutex<SimState>,
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

impl SimulatedSource {
    pub fn new(count: usize, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let sensors = (0..count)
            .map(|i| {
                let region = &REGIONS[rng.gen_range(0..REGIONS.len())];
                let lat = region.lat + rng.gen_range(-region.lat_spread..=region.lat_spread);
                let lng = region.lng + rng.gen_range(-region.lng_spread..=region.lng_spread);
                SimSensor {
                    id: format!("sensor_{i:03}"),
                    region,
                    lat: round_to(lat.clamp(-90.0, 90.0), 4),
                    lng: round_to(lng.clamp(-180.0, 180.0), 4),
                    level: round_to(rng.gen_range(2.0..=10.0), 1),
                }
            })
            .collect();
        Self { state: Mutex::new(SimState { rng, sensors }) }
    }

    fn next_batch(&self) -> Result<Vec<Value>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow!("simulated source state poisoned"))?;
        let SimState { rng, sensors } = &mut *state;
        let timestamp = chrono::Utc::now().to_rfc3339();

        let batch = sensors
            .iter_mut()
            .map(|sensor| {
                // levels drift by up to one point per pull
                sensor.level = round_to((sensor.level + rng.gen_range(-1.0..=1.0)).clamp(0.1, 10.0), 1);
                let level = sensor.level;
                json!({
                    "id": sensor.id,
                    "location": sensor.region.name,
                    "lat": sensor.lat,
                    "lng": sensor.lng,
                    "pollution_level": level,
                    "status": SensorStatus::from_level(level),
                    "timestamp": timestamp,
                    "microplastics": (level * 1000.0).floor() + rng.gen_range(0..=500) as f64,
                    "temperature": round_to(15.0 + rng.gen_range(-5.0..=15.0), 1),
                    "turbidity": round_to(level * 10.0 + rng.gen_range(0..=50) as f64, 1),
                })
            })
            .collect();
        Ok(batch)
    }
}

impl ReadingSource for SimulatedSource {
    async fn fetch(&self) -> Result<Vec<Value>> {
        self.next_batch()
    }

    fn describe(&self) -> String {
        let count = self.state.lock().map(|s| s.sensors.len()).unwrap_or(0);
        format!("simulated ({count} sensors)")
    }
}

// ==============================================================================
// configured source
// ==============================================================================

pub enum Source {
    Http(HttpSource),
    Simulated(SimulatedSource),
}

impl Source {
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        match config.kind {
            SourceKind::Http => {
                let url = config
                    .url
                    .clone()
                    .ok_or_else(|| anyhow!("http source needs a url"))?;
                let timeout = Duration::from_secs(config.request_timeout_seconds);
                Ok(Self::Http(HttpSource::new(url, timeout)?))
            }
            SourceKind::Simulated => Ok(Self::Simulated(SimulatedSource::new(
                config.sensor_count,
                config.seed,
            ))),
        }
    }
}

impl ReadingSource for Source {
    async fn fetch(&self) -> Result<Vec<Value>> {
        match self {
            Self::Http(s) => s.fetch().await,
            Self::Simulated(s) => s.fetch().await,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Http(s) => s.describe(),
            Self::Simulated(s) => s.describe(),
        }
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::parse_readings;
    use axum::http::StatusCode;
    use axum::{routing::get, Json, Router};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn simulated_readings_are_valid_and_reproducible() {
        let a = SimulatedSource::new(40, Some(7)).fetch().await.unwrap();
        let b = SimulatedSource::new(40, Some(7)).fetch().await.unwrap();
        assert_eq!(a.len(), 40);

        let pa = parse_readings(a);
        let pb = parse_readings(b);
        assert!(pa.skipped.is_empty(), "{:?}", pa.skipped);
        assert_eq!(pa.readings[0].id, "sensor_000");
        assert_eq!(pa.readings[39].id, "sensor_039");
        for (x, y) in pa.readings.iter().zip(&pb.readings) {
            assert_eq!((x.lat, x.lng, x.severity_level), (y.lat, y.lng, y.severity_level));
            assert!((0.1..=10.0).contains(&x.severity_level));
            assert_eq!(x.status, SensorStatus::from_level(x.severity_level));
        }
    }

    #[tokio::test]
    async fn simulated_levels_drift_but_sensors_stay_put() {
        let source = SimulatedSource::new(10, Some(1));
        let first = parse_readings(source.fetch().await.unwrap()).readings;
        let second = parse_readings(source.fetch().await.unwrap()).readings;
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.position(), b.position());
            // drift of one point plus rounding to one decimal
            assert!((a.severity_level - b.severity_level).abs() <= 1.05 + 1e-9);
        }
    }

    #[tokio::test]
    async fn http_source_returns_records() {
        let app = Router::new().route(
            "/api/sensor-data",
            get(|| async {
                Json(serde_json::json!([
                    {"id": "s1", "location": "North Sea", "lat": 55.0, "lng": 3.0, "pollution_level": 8.0},
                    {"id": "s2", "location": "Baltic Sea", "lat": 58.0, "lng": 20.0, "pollution_level": 2.0}
                ]))
            }),
        );
        let base = serve(app).await;
        let source = HttpSource::new(format!("{base}/api/sensor-data"), Duration::from_secs(5)).unwrap();

        let records = source.fetch().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], "s1");
    }

    #[tokio::test]
    async fn http_error_status_is_an_error() {
        let app = Router::new().route(
            "/api/sensor-data",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base = serve(app).await;
        let source = HttpSource::new(format!("{base}/api/sensor-data"), Duration::from_secs(5)).unwrap();
        assert!(source.fetch().await.is_err());
    }

    #[test]
    fn config_selects_source() {
        let sim = Source::from_config(&SourceConfig::default()).unwrap();
        assert!(sim.describe().starts_with("simulated (120"));

        let http = SourceConfig {
            kind: SourceKind::Http,
            url: Some("http://127.0.0.1:9/api/sensor-data".into()),
            ..SourceConfig::default()
        };
        assert!(matches!(Source::from_config(&http).unwrap(), Source::Http(_)));

        let missing = SourceConfig { kind: SourceKind::Http, ..SourceConfig::default() };
        assert!(Source::from_config(&missing).is_err());
    }
}
