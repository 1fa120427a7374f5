//! Session clock
//!
//! Counts whole seconds of workout time. Ticks only advance the counter while
//! the clock is running, so pausing freezes the elapsed time.

use serde::{Deserialize, Serialize};

use crate::error::WorkoutError;
use crate::types::SessionPhase;

/// Clock run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockState {
    Stopped,
    Running,
    Paused,
}

/// Elapsed-time counter for a workout session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClock {
    state: ClockState,
    elapsed_seconds: u64,
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            state: ClockState::Stopped,
            elapsed_seconds: 0,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    /// Start or resume counting
    pub fn start(&mut self) {
        self.state = ClockState::Running;
    }

    /// Suspend counting; no-op unless running
    pub fn pause(&mut self) {
        if self.state == ClockState::Running {
            self.state = ClockState::Paused;
        }
    }

    /// Stop counting, keeping the elapsed time for a final readout
    pub fn stop(&mut self) {
        self.state = ClockState::Stopped;
    }

    /// Back to zero. Not allowed while running.
    pub fn reset(&mut self) -> Result<(), WorkoutError> {
        if self.is_running() {
            return Err(WorkoutError::InvalidTransition {
                operation: "reset clock",
                phase: SessionPhase::Active,
            });
        }
        self.state = ClockState::Stopped;
        self.elapsed_seconds = 0;
        Ok(())
    }

    /// Advance one second if running; returns the elapsed time
    pub fn tick(&mut self) -> u64 {
        if self.is_running() {
            self.elapsed_seconds += 1;
        }
        self.elapsed_seconds
    }
}
