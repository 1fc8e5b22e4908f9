//! ==============================================================================
//! classifier.rs - severity tier and visual encoding
//! ==============================================================================
//!
//! purpose:
//!     maps a severity reading to a discrete tier (low / medium / high), a fill
//!     colour and a marker size. pure, total over every f64.
//!
//! tiers (upper bound inclusive):
//!     level <= 3        low     #10b981
//!     3 < level <= 7    medium  #f59e0b
//!     level > 7         high    #ef4444
//!
//! size:
//!     clamp(level * 1.2, 6, 14)
//!
//! relationships:
//!     - used by: registry.rs (marker styling), domain.rs (clamp_level)
//!
//! ==============================================================================

use serde::Serialize;

pub const MIN_LEVEL: f64 = 0.0;
pub const MAX_LEVEL: f64 = 10.0;

pub const LOW_UPPER: f64 = 3.0;
pub const MEDIUM_UPPER: f64 = 7.0;

pub const MIN_MARKER_SIZE: f64 = 6.0;
pub const MAX_MARKER_SIZE: f64 = 14.0;
const SIZE_PER_LEVEL: f64 = 1.2;

pub const GREEN: &str = "#10b981";
pub const AMBER: &str = "#f59e0b";
pub const RED: &str = "#ef4444";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityTier {
    Low,
    Medium,
    High,
}

impl SeverityTier {
    pub fn color(self) -> &'static str {
        match self {
            Self::Low => GREEN,
            Self::Medium => AMBER,
            Self::High => RED,
        }
    }
}

/// colour, size and tier for one level
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct VisualEncoding {
    pub tier: SeverityTier,
    pub color: &'static str,
    pub size: f64,
}

/// clamp into [0, 10]; NaN reads as 0
pub fn clamp_level(level: f64) -> f64 {
    if level.is_nan() {
        MIN_LEVEL
    } else {
        level.clamp(MIN_LEVEL, MAX_LEVEL)
    }
}

pub fn classify(level: f64) -> SeverityTier {
    let level = clamp_level(level);
    if level <= LOW_UPPER {
        SeverityTier::Low
    } else if level <= MEDIUM_UPPER {
        SeverityTier::Medium
    } else {
        SeverityTier::High
    }
}

pub fn marker_size(level: f64) -> f64 {
    (clamp_level(level) * SIZE_PER_LEVEL).clamp(MIN_MARKER_SIZE, MAX_MARKER_SIZE)
}

pub fn encode(level: f64) -> VisualEncoding {
    let tier = classify(level);
    VisualEncoding {
        tier,
        color: tier.color(),
        size: marker_size(level),
    }
}
