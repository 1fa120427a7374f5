//! Session configuration
//!
//! Tunables for the biometric simulator, the feedback announcer and the tick
//! cadence. Every field has a default, so a partial JSON document is a valid
//! configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::WorkoutError;

/// Heart rate a session starts from (bpm)
pub const DEFAULT_RESTING_BPM: i32 = 70;

/// Effort level a session starts with (0-100)
pub const DEFAULT_EFFORT_LEVEL: u8 = 30;

/// Simulated heart rate at zero effort (bpm)
pub const DEFAULT_EFFORT_FLOOR_BPM: f64 = 60.0;

/// Fraction of the gap to the target closed on every tick
pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.1;

/// Half-width of the uniform jitter applied on every tick (bpm)
pub const DEFAULT_JITTER_BPM: f64 = 2.0;

/// Minimum time between two voice announcements
pub const DEFAULT_ANNOUNCE_GAP_SECS: u64 = 10;

/// Chance of announcing while inside the target zone
pub const DEFAULT_IN_TARGET_PROBABILITY: f64 = 0.3;

pub const DEFAULT_LOCALE: &str = "en-US";

pub const DEFAULT_TICK_PERIOD_MS: u64 = 1000;

/// Effort change applied by one press of the more/less controls
pub const EFFORT_STEP: i32 = 10;

/// Highest heart rate accepted for resting and floor values (bpm)
pub const MAX_CONFIG_BPM: f64 = 300.0;

/// Largest accepted jitter half-width (bpm)
pub const MAX_JITTER_BPM: f64 = 50.0;

/// Longest accepted tick period (one hour)
pub const MAX_TICK_PERIOD_MS: u64 = 3_600_000;

/// Biometric simulator tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub resting_bpm: i32,
    pub initial_effort: u8,
    pub effort_floor_bpm: f64,
    pub smoothing_factor: f64,
    pub jitter_bpm: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            resting_bpm: DEFAULT_RESTING_BPM,
            initial_effort: DEFAULT_EFFORT_LEVEL,
            effort_floor_bpm: DEFAULT_EFFORT_FLOOR_BPM,
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            jitter_bpm: DEFAULT_JITTER_BPM,
        }
    }
}

/// Feedback announcer tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnouncerConfig {
    pub min_gap_secs: u64,
    pub in_target_probability: f64,
    pub locale: String,
}

impl Default for AnnouncerConfig {
    fn default() -> Self {
        Self {
            min_gap_secs: DEFAULT_ANNOUNCE_GAP_SECS,
            in_target_probability: DEFAULT_IN_TARGET_PROBABILITY,
            locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

impl AnnouncerConfig {
    pub fn min_gap(&self) -> Duration {
        Duration::from_secs(self.min_gap_secs)
    }
}

/// Full configuration of a workout session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub simulator: SimulatorConfig,
    pub announcer: AnnouncerConfig,
    /// Tick cadence of the async runner
    pub tick_period_ms: u64,
    /// Seed for the random source; entropy when absent
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            simulator: SimulatorConfig::default(),
            announcer: AnnouncerConfig::default(),
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            seed: None,
        }
    }
}

impl SessionConfig {
    /// Default configuration with a fixed seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Check that every tunable is in range
    pub fn validate(&self) -> Result<(), WorkoutError> {
        let sim = &self.simulator;
        if !(0.0..=MAX_CONFIG_BPM).contains(&f64::from(sim.resting_bpm)) {
            return Err(WorkoutError::InvalidConfig(format!(
                "resting_bpm must be 0-{}, got {}",
                MAX_CONFIG_BPM, sim.resting_bpm
            )));
        }
        if sim.initial_effort > 100 {
            return Err(WorkoutError::InvalidConfig(format!(
                "initial_effort must be 0-100, got {}",
                sim.initial_effort
            )));
        }
        if !(sim.smoothing_factor > 0.0 && sim.smoothing_factor <= 1.0) {
            return Err(WorkoutError::InvalidConfig(format!(
                "smoothing_factor must be in (0, 1], got {}",
                sim.smoothing_factor
            )));
        }
        if !(0.0..=MAX_JITTER_BPM).contains(&sim.jitter_bpm) {
            return Err(WorkoutError::InvalidConfig(format!(
                "jitter_bpm must be 0-{}, got {}",
                MAX_JITTER_BPM, sim.jitter_bpm
            )));
        }
        if !(0.0..=MAX_CONFIG_BPM).contains(&sim.effort_floor_bpm) {
            return Err(WorkoutError::InvalidConfig(format!(
                "effort_floor_bpm must be 0-{}, got {}",
                MAX_CONFIG_BPM, sim.effort_floor_bpm
            )));
        }

        let ann = &self.announcer;
        if !(0.0..=1.0).contains(&ann.in_target_probability) {
            return Err(WorkoutError::InvalidConfig(format!(
                "in_target_probability must be in [0, 1], got {}",
                ann.in_target_probability
            )));
        }
        if ann.locale.trim().is_empty() {
            return Err(WorkoutError::InvalidConfig("locale must not be empty".to_string()));
        }

        if self.tick_period_ms == 0 || self.tick_period_ms > MAX_TICK_PERIOD_MS {
            return Err(WorkoutError::InvalidConfig(format!(
                "tick_period_ms must be 1-{}, got {}",
                MAX_TICK_PERIOD_MS, self.tick_period_ms
            )));
        }

        Ok(())
    }

    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, WorkoutError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, WorkoutError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
