//! CardioZone - Heart-rate training zones and a guided workout simulator
//!
//! CardioZone computes age- and gender-based heart-rate zones and runs a guided
//! workout over a simulated heart rate. Each one-second tick runs a fixed
//! sequence: session clock → biometric simulator → zone monitor → feedback
//! announcer.
//!
//! ## Modules
//!
//! - **Zones**: max heart rate formula and the four training zones
//! - **Session**: the synchronous workout controller and its components
//! - **Runner**: a tokio task that owns a session and ticks it once per period
//! - **FFI**: C bindings so a host UI can drive a session from its own timer

pub mod announcer;
pub mod clock;
pub mod config;
pub mod error;
pub mod monitor;
pub mod runner;
pub mod session;
pub mod simulator;
pub mod types;
pub mod zones;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use announcer::{FeedbackAnnouncer, SilentSpeech, SpeechSink};
pub use config::SessionConfig;
pub use error::{SpeechError, WorkoutError};
pub use runner::{ChannelSpeech, SessionHandle, Utterance};
pub use session::WorkoutSession;
pub use types::{
    FeedbackState, Gender, HeartRateZone, SessionPhase, SessionSnapshot, TickReport,
};
pub use zones::{calculate_zones, max_heart_rate, select_target_zone};

/// CardioZone version
pub const CARDIOZONE_VERSION: &str = env!("CARGO_PKG_VERSION");
