//! ==============================================================================
//! registry.rs - marker registry
//! ==============================================================================
//!
//! purpose:
//!     owns the markers currently on the map. every refresh cycle replaces the
//!     whole set; there is no diffing, so a sensor that disappeared simply has
//!     no marker and nothing from an older cycle can linger.
//!
//! swap order:
//!     new markers are attached before the old ones are detached, so the
//!     surface never draws an empty layer between two non-empty cycles.
//!
//! marker ids:
//!     monotonic for the life of the registry. an id handed out in one cycle
//!     never resolves in a later one, so a late click on a replaced marker
//!     finds nothing instead of the wrong sensor.
//!
//! relationships:
//!     - used by: refresh.rs (replace_all on every applied fetch)
//!     - used by: server.rs (hover / click / layer)
//!     - uses: classifier.rs (tier, colour, size), hotspot.rs (is_hotspot)
//!     - uses: surface.rs (MapSurface)
//!
//! ==============================================================================

use crate::classifier::{self, SeverityTier, VisualEncoding};
use crate::domain::{LatLng, SensorReading};
use crate::hotspot::is_hotspot;
use crate::surface::MapSurface;
use serde::Serialize;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MarkerId(pub u64);

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// ephemeral visual for one reading, rebuilt every cycle
#[derive(Clone, Debug)]
pub struct Marker {
    id: MarkerId,
    encoding: VisualEncoding,
    fill: &'static str,
    hotspot: bool,
    label: String,
    label_visible: bool,
    /// captured at construction; clicks never look the sensor up again
    reading: SensorReading,
}

impl Marker {
    fn build(id: MarkerId, reading: &SensorReading) -> Self {
        let encoding = classifier::encode(reading.severity_level);
        let hotspot = is_hotspot(reading);
        // hotspots are drawn in the high colour even at the medium tier edge
        let fill = if hotspot {
            SeverityTier::High.color()
        } else {
            encoding.color
        };
        Self {
            id,
            encoding,
            fill,
            hotspot,
            label: format!("{}: {:.1}", reading.location, reading.severity_level),
            label_visible: false,
            reading: reading.clone(),
        }
    }

    pub fn id(&self) -> MarkerId {
        self.id
    }

    pub fn position(&self) -> LatLng {
        self.reading.position()
    }

    pub fn fill(&self) -> &'static str {
        self.fill
    }

    pub fn size(&self) -> f64 {
        self.encoding.size
    }

    pub fn tier(&self) -> SeverityTier {
        self.encoding.tier
    }

    pub fn is_hotspot(&self) -> bool {
        self.hotspot
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn label_visible(&self) -> bool {
        self.label_visible
    }

    pub fn reading(&self) -> &SensorReading {
        &self.reading
    }

    pub fn detail(&self) -> DetailCard {
        DetailCard {
            marker: self.id,
            reading: self.reading.clone(),
            tier: self.encoding.tier,
            color: self.fill,
            hotspot: self.hotspot,
        }
    }
}

/// what the detail view shows for a clicked marker
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetailCard {
    pub marker: MarkerId,
    pub reading: SensorReading,
    pub tier: SeverityTier,
    pub color: &'static str,
    pub hotspot: bool,
}

pub struct MarkerRegistry<S: MapSurface> {
    surface: S,
    markers: Vec<Marker>,
    next_id: u64,
}

impl<S: MapSurface> MarkerRegistry<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            markers: Vec::new(),
            next_id: 1,
        }
    }

    /// replace every owned marker with one fresh marker per reading
    ///
    /// duplicate sensor ids are not merged; each reading gets its own marker.
    /// returns the number of markers now owned.
    pub fn replace_all(&mut self, readings: &[SensorReading]) -> usize {
        let fresh: Vec<Marker> = readings
            .iter()
            .map(|reading| {
                let id = MarkerId(self.next_id);
                self.next_id += 1;
                Marker::build(id, reading)
            })
            .collect();

        for marker in &fresh {
            self.surface.attach(marker);
        }
        let stale = std::mem::replace(&mut self.markers, fresh);
        for marker in &stale {
            self.surface.detach(marker.id);
        }

        tracing::debug!(
            added = self.markers.len(),
            removed = stale.len(),
            "marker set replaced"
        );
        self.markers.len()
    }

    /// hover enter / leave; false when the id is not current
    pub fn hover(&mut self, id: MarkerId, active: bool) -> bool {
        match self.markers.iter_mut().find(|m| m.id == id) {
            Some(marker) => {
                marker.label_visible = active;
                self.surface.set_label_visible(id, active);
                true
            }
            None => false,
        }
    }

    /// open the detail view bound to the marker's own reading
    pub fn click(&mut self, id: MarkerId) -> Option<DetailCard> {
        let card = self.marker(id)?.detail();
        self.surface.show_detail(&card);
        Some(card)
    }

    pub fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.iter().find(|m| m.id == id)
    }

    #[allow(dead_code)]
    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{AMBER, GREEN, RED};
    use crate::domain::sample_reading as reading;
    use crate::surface::HeadlessSurface;

    /// records how many markers were drawn after every surface call
    #[derive(Default)]
    struct RecordingSurface {
        drawn: Vec<MarkerId>,
        counts: Vec<usize>,
        details: Vec<DetailCard>,
    }

    impl MapSurface for RecordingSurface {
        fn attach(&mut self, marker: &Marker) {
            self.drawn.push(marker.id());
            self.counts.push(self.drawn.len());
        }
        fn detach(&mut self, id: MarkerId) {
            self.drawn.retain(|m| *m != id);
            self.counts.push(self.drawn.len());
        }
        fn set_label_visible(&mut self, _id: MarkerId, _visible: bool) {}
        fn show_detail(&mut self, card: &DetailCard) {
            self.details.push(card.clone());
        }
        fn visible_count(&self) -> usize {
            self.drawn.len()
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn scenario_styles_each_marker() {
        let mut registry = MarkerRegistry::new(HeadlessSurface::new());
        let readings = vec![
            reading("s1", 8.0, 10.0, 20.0),
            reading("s2", 5.0, 0.0, 0.0),
            reading("s3", 7.0, 5.0, 5.0),
        ];
        assert_eq!(registry.replace_all(&readings), 3);

        let m = registry.markers();
        assert_eq!(m[0].fill(), RED);
        assert!(close(m[0].size(), 9.6));
        assert_eq!(m[1].fill(), AMBER);
        assert!(close(m[1].size(), 6.0));
        assert_eq!(m[2].fill(), RED);
        assert!(close(m[2].size(), 8.4));
        // tier stays the classifier's; only the fill marks the hotspot
        assert_eq!(m[2].tier(), SeverityTier::Medium);
        assert!(m[2].is_hotspot());
        assert!(!m[1].is_hotspot());
    }

    #[test]
    fn low_readings_are_green() {
        let mut registry = MarkerRegistry::new(HeadlessSurface::new());
        registry.replace_all(&[reading("calm", 3.0, 0.0, 0.0)]);
        assert_eq!(registry.markers()[0].fill(), GREEN);
        assert_eq!(registry.markers()[0].tier(), SeverityTier::Low);
    }

    #[test]
    fn replace_with_empty_owns_nothing() {
        let mut registry = MarkerRegistry::new(HeadlessSurface::new());
        registry.replace_all(&[reading("a", 1.0, 0.0, 0.0)]);
        assert_eq!(registry.replace_all(&[]), 0);
        assert!(registry.is_empty());
        assert_eq!(registry.surface().visible_count(), 0);
    }

    #[test]
    fn one_marker_per_reading_at_its_position() {
        let mut registry = MarkerRegistry::new(HeadlessSurface::new());
        let readings: Vec<_> = (0..25)
            .map(|i| reading(&format!("s{i}"), i as f64 / 2.5, i as f64, -(i as f64) * 2.0))
            .collect();
        assert_eq!(registry.replace_all(&readings), readings.len());
        assert_eq!(registry.surface().visible_count(), readings.len());
        for (marker, r) in registry.markers().iter().zip(&readings) {
            assert_eq!(marker.position(), r.position());
            let entry = registry.surface().entry(marker.id()).unwrap();
            assert_eq!((entry.lat, entry.lng), (r.lat, r.lng));
        }
    }

    #[test]
    fn second_replace_leaves_only_second_set() {
        let mut registry = MarkerRegistry::new(HeadlessSurface::new());
        registry.replace_all(&[reading("a1", 1.0, 0.0, 0.0), reading("a2", 9.0, 1.0, 1.0)]);
        let first_ids: Vec<MarkerId> = registry.markers().iter().map(Marker::id).collect();

        registry.replace_all(&[reading("b1", 4.0, 2.0, 2.0)]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.markers()[0].reading().id, "b1");
        let layer = registry.surface().layer();
        assert_eq!(layer.len(), 1);
        assert_eq!(layer[0].sensor_id, "b1");
        for id in first_ids {
            assert!(registry.marker(id).is_none());
            assert!(registry.surface().entry(id).is_none());
        }
    }

    #[test]
    fn swap_never_draws_an_empty_layer() {
        let mut registry = MarkerRegistry::new(RecordingSurface::default());
        registry.replace_all(&[reading("a", 1.0, 0.0, 0.0), reading("b", 2.0, 0.0, 0.0)]);
        let before = registry.surface().counts.len();

        registry.replace_all(&[reading("c", 3.0, 0.0, 0.0)]);

        let during = &registry.surface().counts[before..];
        assert!(during.iter().all(|&n| n > 0), "empty frame in {during:?}");
        assert_eq!(registry.surface().visible_count(), 1);
    }

    #[test]
    fn duplicate_ids_multiply_markers() {
        let mut registry = MarkerRegistry::new(HeadlessSurface::new());
        let n = registry.replace_all(&[reading("dup", 2.0, 0.0, 0.0), reading("dup", 8.0, 1.0, 1.0)]);
        assert_eq!(n, 2);
        assert_ne!(registry.markers()[0].id(), registry.markers()[1].id());
    }

    #[test]
    fn hover_toggles_label_overlay() {
        let mut registry = MarkerRegistry::new(HeadlessSurface::new());
        registry.replace_all(&[reading("s1", 8.0, 10.0, 20.0)]);
        let id = registry.markers()[0].id();
        assert_eq!(registry.markers()[0].label(), "loc-s1: 8.0");
        assert!(!registry.surface().entry(id).unwrap().label_visible);

        assert!(registry.hover(id, true));
        assert!(registry.surface().entry(id).unwrap().label_visible);
        assert!(registry.marker(id).unwrap().label_visible());

        assert!(registry.hover(id, false));
        assert!(!registry.surface().entry(id).unwrap().label_visible);

        assert!(!registry.hover(MarkerId(9999), true));
    }

    #[test]
    fn click_is_bound_to_the_captured_reading() {
        let mut registry = MarkerRegistry::new(HeadlessSurface::new());
        registry.replace_all(&[reading("s1", 8.0, 10.0, 20.0)]);
        let old = registry.markers()[0].id();

        let card = registry.click(old).unwrap();
        assert_eq!(card.reading.id, "s1");
        assert_eq!(card.tier, SeverityTier::High);
        assert_eq!(registry.surface().detail(), Some(&card));

        // same sensor, new data: the old marker id no longer resolves
        registry.replace_all(&[reading("s1", 2.0, 10.0, 20.0)]);
        assert!(registry.click(old).is_none());
        assert!(registry.surface().detail().is_none());

        let new = registry.markers()[0].id();
        let card = registry.click(new).unwrap();
        assert_eq!(card.reading.severity_level, 2.0);
        assert_eq!(card.tier, SeverityTier::Low);
    }

    #[test]
    fn click_reports_to_the_detail_surface() {
        let mut registry = MarkerRegistry::new(RecordingSurface::default());
        registry.replace_all(&[reading("x", 5.0, 0.0, 0.0)]);
        let id = registry.markers()[0].id();
        registry.click(id);
        assert_eq!(registry.surface().details.len(), 1);
        assert_eq!(registry.surface().details[0].marker, id);
    }
}
