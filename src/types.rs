//! Core types for CardioZone
//!
//! This module defines the data that flows between the zone calculator, the
//! workout session controller and the presentation layer: zones, feedback
//! states, the mutable simulation state and the read-only snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use uuid::Uuid;

use crate::clock::SessionClock;

/// Biological sex used by the max heart rate formula
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M", alias = "m")]
    Male,
    #[serde(rename = "F", alias = "f")]
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }
}

impl std::str::FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m" | "male" => Ok(Gender::Male),
            "f" | "female" => Ok(Gender::Female),
            other => Err(format!("unknown gender '{}' (expected m or f)", other)),
        }
    }
}

/// A heart-rate training zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateZone {
    /// Stable identifier (e.g. "aerobic")
    pub id: String,
    /// Display label
    pub name: String,
    /// Lower bound as a fraction of max heart rate
    pub min_percent: f64,
    /// Upper bound as a fraction of max heart rate
    pub max_percent: f64,
    /// Lower bound (bpm, inclusive)
    pub min_bpm: i32,
    /// Upper bound (bpm, inclusive)
    pub max_bpm: i32,
    /// What the zone trains
    #[serde(default)]
    pub description: String,
    /// Recommended time to spend in the zone
    #[serde(default)]
    pub duration: String,
    /// Training goal
    #[serde(default)]
    pub goal: String,
    /// Whether this is the zone a guided workout should aim for
    #[serde(default)]
    pub is_target: bool,
}

impl HeartRateZone {
    /// Percentage range label, e.g. "60-80%"
    pub fn range_label(&self) -> String {
        format!(
            "{}-{}%",
            (self.min_percent * 100.0).round() as i32,
            (self.max_percent * 100.0).round() as i32
        )
    }
}

/// Where the current heart rate sits relative to the target zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackState {
    BelowTarget,
    InTarget,
    AboveTarget,
}

impl FeedbackState {
    /// Human-readable coaching message
    pub fn message(&self) -> &'static str {
        match self {
            FeedbackState::BelowTarget => "Increase pace!",
            FeedbackState::InTarget => "Good work, maintain!",
            FeedbackState::AboveTarget => "Slow down, rate too high!",
        }
    }

    /// Display color category
    pub fn color(&self) -> ColorCategory {
        match self {
            FeedbackState::BelowTarget => ColorCategory::Info,
            FeedbackState::InTarget => ColorCategory::Success,
            FeedbackState::AboveTarget => ColorCategory::Warning,
        }
    }

    /// Whether the user is outside the target zone
    pub fn is_off_target(&self) -> bool {
        !matches!(self, FeedbackState::InTarget)
    }
}

/// Display color category for a feedback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorCategory {
    Info,
    Success,
    Warning,
}

/// Feedback state flattened for rendering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackReport {
    pub state: FeedbackState,
    pub message: String,
    pub color: ColorCategory,
}

impl From<FeedbackState> for FeedbackReport {
    fn from(state: FeedbackState) -> Self {
        Self {
            state,
            message: state.message().to_string(),
            color: state.color(),
        }
    }
}

/// Lifecycle phase of a workout session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Idle,
    Active,
    Paused,
    Closed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Active => "active",
            SessionPhase::Paused => "paused",
            SessionPhase::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable state of one workout session, owned by its controller
#[derive(Debug, Clone)]
pub struct SimulationState {
    /// Simulated heart rate (bpm)
    pub current_bpm: i32,
    /// Operator-controlled effort (0-100)
    pub effort_level: u8,
    /// Suppresses voice feedback
    pub is_muted: bool,
    /// Monotonic time of the last attempted announcement
    pub last_announcement_at: Option<Instant>,
    /// Elapsed-time counter
    pub clock: SessionClock,
}

impl SimulationState {
    pub fn new(resting_bpm: i32, effort_level: u8) -> Self {
        Self {
            current_bpm: resting_bpm,
            effort_level: effort_level.min(100),
            is_muted: false,
            last_announcement_at: None,
            clock: SessionClock::new(),
        }
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.clock.elapsed_seconds()
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    /// Shift effort by `delta`, clamped to 0-100
    pub fn adjust_effort(&mut self, delta: i32) -> u8 {
        let level = i32::from(self.effort_level).saturating_add(delta).clamp(0, 100);
        self.effort_level = level as u8;
        self.effort_level
    }
}

/// Ticks spent below, inside and above the target zone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneTally {
    pub below: u64,
    pub in_target: u64,
    pub above: u64,
}

impl ZoneTally {
    pub fn record(&mut self, state: FeedbackState) {
        match state {
            FeedbackState::BelowTarget => self.below += 1,
            FeedbackState::InTarget => self.in_target += 1,
            FeedbackState::AboveTarget => self.above += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.below + self.in_target + self.above
    }

    /// Share of ticks spent in the target zone (0-1)
    pub fn in_target_ratio(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.in_target as f64 / total as f64,
        }
    }
}

/// Target zone bounds as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetZoneView {
    pub id: String,
    pub name: String,
    pub min_bpm: i32,
    pub max_bpm: i32,
}

impl From<&HeartRateZone> for TargetZoneView {
    fn from(zone: &HeartRateZone) -> Self {
        Self {
            id: zone.id.clone(),
            name: zone.name.clone(),
            min_bpm: zone.min_bpm,
            max_bpm: zone.max_bpm,
        }
    }
}

/// A voice announcement decided by the announcer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub state: FeedbackState,
    pub text: String,
    pub locale: String,
    /// Session time at which it was spoken
    pub elapsed_seconds: u64,
    /// Whether the speech capability accepted it
    pub delivered: bool,
}

/// Result of one session tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub elapsed_seconds: u64,
    pub bpm: i32,
    pub feedback: FeedbackState,
    pub announcement: Option<Announcement>,
}

/// Read-only view of a session for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub started_at: Option<DateTime<Utc>>,
    pub phase: SessionPhase,
    pub elapsed_seconds: u64,
    /// Elapsed time as mm:ss
    pub elapsed_display: String,
    pub current_bpm: i32,
    pub effort_level: u8,
    pub is_running: bool,
    pub is_muted: bool,
    /// None until the first tick (warm-up)
    pub feedback: Option<FeedbackReport>,
    pub target_zone: Option<TargetZoneView>,
    pub max_heart_rate: Option<i32>,
    /// Current bpm as a share of max heart rate, clamped to 0-100
    pub gauge_percent: f64,
    pub time_in_zone: ZoneTally,
}

/// Format seconds as mm:ss (minutes keep counting past 59)
pub fn format_elapsed(total_seconds: u64) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Gauge fill for a bpm reading against max heart rate
pub fn gauge_percent(bpm: i32, max_heart_rate: i32) -> f64 {
    if max_heart_rate <= 0 {
        return 0.0;
    }
    (f64::from(bpm) / f64::from(max_heart_rate) * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_feedback_messages_and_colors() {
        assert_eq!(FeedbackState::BelowTarget.color(), ColorCategory::Info);
        assert_eq!(FeedbackState::InTarget.color(), ColorCategory::Success);
        assert_eq!(FeedbackState::AboveTarget.color(), ColorCategory::Warning);
        assert!(FeedbackState::AboveTarget.message().starts_with("Slow down"));
        assert!(!FeedbackState::InTarget.is_off_target());
    }

    #[test]
    fn test_adjust_effort_clamps() {
        let mut state = SimulationState::new(70, 30);
        assert_eq!(state.adjust_effort(1000), 100);
        assert_eq!(state.adjust_effort(-1000), 0);
        assert_eq!(state.adjust_effort(i32::MAX), 100);
        assert_eq!(state.adjust_effort(i32::MIN), 0);
        assert_eq!(state.adjust_effort(10), 10);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(75), "01:15");
        assert_eq!(format_elapsed(3600), "60:00");
    }

    #[test]
    fn test_gauge_percent() {
        assert_eq!(gauge_percent(95, 190), 50.0);
        assert_eq!(gauge_percent(250, 190), 100.0);
        assert_eq!(gauge_percent(-5, 190), 0.0);
        assert_eq!(gauge_percent(120, 0), 0.0);
    }

    #[test]
    fn test_zone_tally_ratio() {
        let mut tally = ZoneTally::default();
        assert_eq!(tally.in_target_ratio(), 0.0);
        tally.record(FeedbackState::InTarget);
        tally.record(FeedbackState::InTarget);
        tally.record(FeedbackState::AboveTarget);
        tally.record(FeedbackState::BelowTarget);
        assert_eq!(tally.total(), 4);
        assert!((tally.in_target_ratio() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_gender_from_str() {
        assert_eq!("m".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!(" Female ".parse::<Gender>().unwrap(), Gender::Female);
        assert!("x".parse::<Gender>().is_err());
    }

    #[test]
    fn test_gender_serde() {
        let gender: Gender = serde_json::from_str("\"F\"").unwrap();
        assert_eq!(gender, Gender::Female);
        assert_eq!(serde_json::to_string(&Gender::Male).unwrap(), "\"M\"");
    }
}
