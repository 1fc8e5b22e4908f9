//! ==============================================================================
//! surface.rs - map rendering surface abstraction
//! ==============================================================================
//!
//! purpose:
//!     the boundary between marker computation and whatever actually draws the
//!     map. the registry only talks to `MapSurface`; it never knows whether the
//!     markers end up in a browser widget, a test recorder or the in-process
//!     layer below.
//!
//! implementations:
//!     - HeadlessSurface: keeps the attached layer in memory. the web server
//!       serves it as json and the browser map draws from that.
//!
//! relationships:
//!     - used by: registry.rs (attach / detach / label / detail)
//!     - used by: server.rs (layer snapshot, last opened detail)
//!
//! ==============================================================================

use crate::classifier::SeverityTier;
use crate::registry::{DetailCard, Marker, MarkerId};
use serde::Serialize;
use std::collections::BTreeMap;

pub trait MapSurface: Send + Sync {
    /// put a marker on the map
    fn attach(&mut self, marker: &Marker);
    /// take a marker off the map; unknown ids are ignored
    fn detach(&mut self, id: MarkerId);
    /// show or hide the hover label overlay of one marker
    fn set_label_visible(&mut self, id: MarkerId, visible: bool);
    /// open the detail view for a clicked marker
    fn show_detail(&mut self, card: &DetailCard);
    /// number of markers currently drawn
    fn visible_count(&self) -> usize;
}

/// one drawn marker as the browser map consumes it
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayerEntry {
    pub id: MarkerId,
    pub sensor_id: String,
    pub lat: f64,
    pub lng: f64,
    pub fill: &'static str,
    pub size: f64,
    pub tier: SeverityTier,
    pub hotspot: bool,
    pub label: String,
    pub label_visible: bool,
}

#[derive(Debug, Default)]
pub struct HeadlessSurface {
    layer: BTreeMap<MarkerId, LayerEntry>,
    detail: Option<DetailCard>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// drawn markers in id order (creation order)
    pub fn layer(&self) -> Vec<LayerEntry> {
        self.layer.values().cloned().collect()
    }

    pub fn entry(&self, id: MarkerId) -> Option<&LayerEntry> {
        self.layer.get(&id)
    }

    /// last detail view opened by a click
    pub fn detail(&self) -> Option<&DetailCard> {
        self.detail.as_ref()
    }
}

impl MapSurface for HeadlessSurface {
    fn attach(&mut self, marker: &Marker) {
        let position = marker.position();
        self.layer.insert(
            marker.id(),
            LayerEntry {
                id: marker.id(),
                sensor_id: marker.reading().id.clone(),
                lat: position.lat,
                lng: position.lng,
                fill: marker.fill(),
                size: marker.size(),
                tier: marker.tier(),
                hotspot: marker.is_hotspot(),
                label: marker.label().to_string(),
                label_visible: marker.label_visible(),
            },
        );
        tracing::trace!(marker = %marker.id(), "attached");
    }

    fn detach(&mut self, id: MarkerId) {
        self.layer.remove(&id);
        // a detail view for a marker that is gone would show replaced data
        if self.detail.as_ref().is_some_and(|d| d.marker == id) {
            self.detail = None;
        }
    }

    fn set_label_visible(&mut self, id: MarkerId, visible: bool) {
        if let Some(entry) = self.layer.get_mut(&id) {
            entry.label_visible = visible;
        }
    }

    fn show_detail(&mut self, card: &DetailCard) {
        self.detail = Some(card.clone());
    }

    fn visible_count(&self) -> usize {
        self.layer.len()
    }
}
