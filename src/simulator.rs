//! Biometric simulation
//!
//! Produces a synthetic heart rate that drifts toward an effort-dependent
//! target with exponential smoothing plus uniform jitter. The result is not
//! clamped to a physiological range.

use rand::Rng;

use crate::config::SimulatorConfig;
use crate::types::SimulationState;

/// Synthetic heart-rate source driven by the effort level
#[derive(Debug, Clone)]
pub struct BiometricSimulator {
    config: SimulatorConfig,
}

impl Default for BiometricSimulator {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

impl BiometricSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Heart rate the simulation converges to for an effort level.
    ///
    /// Effort 0 maps to the floor (60 bpm by default), effort 100 to max HR.
    pub fn target_bpm(&self, max_heart_rate: i32, effort_level: u8) -> f64 {
        let floor = self.config.effort_floor_bpm;
        floor + (f64::from(max_heart_rate) - floor) * (f64::from(effort_level) / 100.0)
    }

    /// Advance the simulated heart rate by one step.
    ///
    /// No-op while the session clock is not running. Returns the current bpm.
    pub fn tick<R: Rng + ?Sized>(
        &self,
        state: &mut SimulationState,
        max_heart_rate: i32,
        rng: &mut R,
    ) -> i32 {
        if !state.is_running() {
            return state.current_bpm;
        }

        let target = self.target_bpm(max_heart_rate, state.effort_level);
        let current = f64::from(state.current_bpm);
        let drift = (target - current) * self.config.smoothing_factor;
        let jitter = self.jitter(rng);

        state.current_bpm = (current + drift + jitter).round() as i32;
        state.current_bpm
    }

    fn jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let spread = self.config.jitter_bpm;
        if spread <= 0.0 {
            return 0.0;
        }
        rng.gen_range(-spread..=spread)
    }
}
