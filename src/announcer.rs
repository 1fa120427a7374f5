//! Voice feedback
//!
//! The announcer decides whether a feedback state is worth speaking and hands
//! the text to a [`SpeechSink`]. Announcements are throttled to one per
//! `min_gap_secs`, suppressed while muted, and in-target praise is only spoken
//! with `in_target_probability` so it does not repeat every few seconds.

use rand::Rng;
use std::fmt;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::AnnouncerConfig;
use crate::error::SpeechError;
use crate::types::{Announcement, FeedbackState, SimulationState};

/// Speech output capability (text-to-speech or equivalent).
///
/// Implementations must not block: the tick loop calls `speak` inline.
pub trait SpeechSink: Send {
    fn speak(&self, text: &str, locale: &str) -> Result<(), SpeechError>;
}

/// Sink used when no speech output exists
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentSpeech;

impl SpeechSink for SilentSpeech {
    fn speak(&self, _text: &str, _locale: &str) -> Result<(), SpeechError> {
        Ok(())
    }
}

/// Decides when to speak feedback and dispatches it to a sink
pub struct FeedbackAnnouncer {
    config: AnnouncerConfig,
    sink: Box<dyn SpeechSink>,
}

impl fmt::Debug for FeedbackAnnouncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedbackAnnouncer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FeedbackAnnouncer {
    pub fn new(config: AnnouncerConfig) -> Self {
        Self {
            config,
            sink: Box::new(SilentSpeech),
        }
    }

    pub fn with_sink(config: AnnouncerConfig, sink: Box<dyn SpeechSink>) -> Self {
        Self { config, sink }
    }

    pub fn config(&self) -> &AnnouncerConfig {
        &self.config
    }

    pub fn set_sink(&mut self, sink: Box<dyn SpeechSink>) {
        self.sink = sink;
    }

    /// Speak the feedback if the mute flag, the throttle and the draw allow it.
    ///
    /// Records `now` as the last announcement time for every attempted
    /// announcement, including ones the sink failed to deliver.
    pub fn maybe_announce<R: Rng + ?Sized>(
        &self,
        feedback: FeedbackState,
        state: &mut SimulationState,
        now: Instant,
        rng: &mut R,
    ) -> Option<Announcement> {
        if state.is_muted {
            return None;
        }

        if let Some(last) = state.last_announcement_at {
            if now.saturating_duration_since(last) < self.config.min_gap() {
                return None;
            }
        }

        if feedback == FeedbackState::InTarget
            && !rng.gen_bool(self.config.in_target_probability)
        {
            return None;
        }

        let text = feedback.message();
        let delivered = match self.sink.speak(text, &self.config.locale) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "speech output failed, continuing without voice feedback");
                false
            }
        };
        state.last_announcement_at = Some(now);

        debug!(?feedback, delivered, "announced feedback");

        Some(Announcement {
            state: feedback,
            text: text.to_string(),
            locale: self.config.locale.clone(),
            elapsed_seconds: state.elapsed_seconds(),
            delivered,
        })
    }
}
