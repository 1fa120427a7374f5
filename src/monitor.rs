//! Zone monitoring
//!
//! Classifies a heart-rate reading against the target zone bounds. Both bounds
//! are inclusive, so a degenerate zone (min == max) still has an in-target value.

use crate::types::{FeedbackState, HeartRateZone};

/// Classifier for heart-rate readings against a target zone
pub struct ZoneMonitor;

impl ZoneMonitor {
    /// Classify a reading against the zone bounds
    pub fn classify(bpm: i32, zone: &HeartRateZone) -> FeedbackState {
        Self::classify_bounds(bpm, zone.min_bpm, zone.max_bpm)
    }

    /// Classify a reading against raw bounds
    pub fn classify_bounds(bpm: i32, min_bpm: i32, max_bpm: i32) -> FeedbackState {
        if bpm < min_bpm {
            FeedbackState::BelowTarget
        } else if bpm > max_bpm {
            FeedbackState::AboveTarget
        } else {
            FeedbackState::InTarget
        }
    }
}
