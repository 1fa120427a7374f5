//! Workout session controller
//!
//! A [`WorkoutSession`] is the sole owner of the simulation state. It exposes
//! the operations the presentation layer may call (start, pause/resume, effort,
//! mute, close) and a `tick` that runs one ordered step:
//! clock → simulator → monitor → announcer.
//!
//! The session itself never schedules anything. A host timer, the async
//! [`runner`](crate::runner) or the FFI caller invokes `tick` once per period.

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::announcer::{FeedbackAnnouncer, SpeechSink};
use crate::config::SessionConfig;
use crate::error::WorkoutError;
use crate::monitor::ZoneMonitor;
use crate::simulator::BiometricSimulator;
use crate::types::{
    format_elapsed, gauge_percent, FeedbackReport, FeedbackState, HeartRateZone, SessionPhase,
    SessionSnapshot, SimulationState, TargetZoneView, TickReport, ZoneTally,
};

/// Guided workout session over a simulated heart rate
#[derive(Debug)]
pub struct WorkoutSession<R = ChaCha8Rng> {
    id: Uuid,
    config: SessionConfig,
    phase: SessionPhase,
    state: SimulationState,
    zone: Option<HeartRateZone>,
    max_heart_rate: Option<i32>,
    feedback: Option<FeedbackState>,
    tally: ZoneTally,
    started_at: Option<DateTime<Utc>>,
    simulator: BiometricSimulator,
    announcer: FeedbackAnnouncer,
    rng: R,
}

impl WorkoutSession<ChaCha8Rng> {
    /// Create an idle session, seeding ChaCha8 from `config.seed` or entropy
    pub fn new(config: SessionConfig) -> Result<Self, WorkoutError> {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> WorkoutSession<R> {
    /// Create an idle session with a caller-supplied random source
    pub fn with_rng(config: SessionConfig, rng: R) -> Result<Self, WorkoutError> {
        config.validate()?;

        let state = SimulationState::new(
            config.simulator.resting_bpm,
            config.simulator.initial_effort,
        );

        Ok(Self {
            id: Uuid::new_v4(),
            simulator: BiometricSimulator::new(config.simulator.clone()),
            announcer: FeedbackAnnouncer::new(config.announcer.clone()),
            config,
            phase: SessionPhase::Idle,
            state,
            zone: None,
            max_heart_rate: None,
            feedback: None,
            tally: ZoneTally::default(),
            started_at: None,
            rng,
        })
    }

    /// Route announcements to a speech capability
    pub fn with_speech(mut self, sink: impl SpeechSink + 'static) -> Self {
        self.announcer.set_sink(Box::new(sink));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.state.elapsed_seconds()
    }

    pub fn current_bpm(&self) -> i32 {
        self.state.current_bpm
    }

    pub fn effort_level(&self) -> u8 {
        self.state.effort_level
    }

    pub fn is_running(&self) -> bool {
        self.phase == SessionPhase::Active
    }

    pub fn is_muted(&self) -> bool {
        self.state.is_muted
    }

    /// Feedback from the latest tick; None before the first tick
    pub fn feedback(&self) -> Option<FeedbackState> {
        self.feedback
    }

    pub fn target_zone(&self) -> Option<&HeartRateZone> {
        self.zone.as_ref()
    }

    pub fn time_in_zone(&self) -> ZoneTally {
        self.tally
    }

    /// Begin the workout against a target zone.
    ///
    /// Rejected, leaving the session idle, when the zone is missing or the max
    /// heart rate is not positive.
    pub fn start(
        &mut self,
        zone: Option<HeartRateZone>,
        max_heart_rate: i32,
    ) -> Result<(), WorkoutError> {
        if self.phase != SessionPhase::Idle {
            return Err(self.invalid("start"));
        }

        let zone = match zone {
            Some(zone) => zone,
            None => {
                warn!(session_id = %self.id, "start rejected: no target zone");
                return Err(WorkoutError::InvalidZone);
            }
        };
        if max_heart_rate <= 0 {
            warn!(
                session_id = %self.id,
                max_heart_rate,
                "start rejected: non-positive max heart rate"
            );
            return Err(WorkoutError::InvalidMaxHeartRate(max_heart_rate));
        }

        info!(
            session_id = %self.id,
            zone = %zone.id,
            min_bpm = zone.min_bpm,
            max_bpm = zone.max_bpm,
            max_heart_rate,
            "workout session started"
        );

        self.zone = Some(zone);
        self.max_heart_rate = Some(max_heart_rate);
        self.started_at = Some(Utc::now());
        self.state.clock.start();
        self.phase = SessionPhase::Active;
        Ok(())
    }

    /// Pause an active session or resume a paused one
    pub fn toggle_running(&mut self) -> Result<SessionPhase, WorkoutError> {
        self.phase = match self.phase {
            SessionPhase::Active => {
                self.state.clock.pause();
                SessionPhase::Paused
            }
            SessionPhase::Paused => {
                self.state.clock.start();
                SessionPhase::Active
            }
            SessionPhase::Idle => return Err(self.invalid("pause or resume")),
            SessionPhase::Closed => return Err(WorkoutError::SessionClosed),
        };

        info!(session_id = %self.id, phase = %self.phase, "workout session toggled");
        Ok(self.phase)
    }

    /// Shift the effort level; takes effect on the next tick
    pub fn adjust_effort(&mut self, delta: i32) -> Result<u8, WorkoutError> {
        self.ensure_open()?;
        let level = self.state.adjust_effort(delta);
        debug!(session_id = %self.id, delta, effort = level, "effort adjusted");
        Ok(level)
    }

    pub fn set_muted(&mut self, muted: bool) -> Result<(), WorkoutError> {
        self.ensure_open()?;
        self.state.is_muted = muted;
        debug!(session_id = %self.id, muted, "mute changed");
        Ok(())
    }

    /// End the session. Safe to call more than once.
    pub fn close(&mut self) {
        if self.phase == SessionPhase::Closed {
            return;
        }

        self.state.clock.stop();
        self.phase = SessionPhase::Closed;
        info!(
            session_id = %self.id,
            elapsed_seconds = self.state.elapsed_seconds(),
            in_target_ratio = self.tally.in_target_ratio(),
            "workout session closed"
        );
    }

    /// Run one step using the current monotonic time
    pub fn tick(&mut self) -> Option<TickReport> {
        self.tick_at(Instant::now())
    }

    /// Run one step at `now`; None unless the session is active.
    ///
    /// Feedback is always derived from the bpm computed in this same step.
    pub fn tick_at(&mut self, now: Instant) -> Option<TickReport> {
        if self.phase != SessionPhase::Active {
            return None;
        }
        let zone = self.zone.as_ref()?;
        let max_heart_rate = self.max_heart_rate?;

        let elapsed_seconds = self.state.clock.tick();
        let bpm = self
            .simulator
            .tick(&mut self.state, max_heart_rate, &mut self.rng);
        let feedback = ZoneMonitor::classify(bpm, zone);
        let announcement =
            self.announcer
                .maybe_announce(feedback, &mut self.state, now, &mut self.rng);

        self.feedback = Some(feedback);
        self.tally.record(feedback);

        debug!(
            session_id = %self.id,
            elapsed_seconds,
            bpm,
            effort = self.state.effort_level,
            ?feedback,
            "tick"
        );

        Some(TickReport {
            elapsed_seconds,
            bpm,
            feedback,
            announcement,
        })
    }

    /// Everything the presentation layer renders
    pub fn snapshot(&self) -> SessionSnapshot {
        let elapsed_seconds = self.state.elapsed_seconds();
        SessionSnapshot {
            session_id: self.id,
            started_at: self.started_at,
            phase: self.phase,
            elapsed_seconds,
            elapsed_display: format_elapsed(elapsed_seconds),
            current_bpm: self.state.current_bpm,
            effort_level: self.state.effort_level,
            is_running: self.is_running(),
            is_muted: self.state.is_muted,
            feedback: self.feedback.map(FeedbackReport::from),
            target_zone: self.zone.as_ref().map(TargetZoneView::from),
            max_heart_rate: self.max_heart_rate,
            gauge_percent: self
                .max_heart_rate
                .map(|max| gauge_percent(self.state.current_bpm, max))
                .unwrap_or(0.0),
            time_in_zone: self.tally,
        }
    }

    fn ensure_open(&self) -> Result<(), WorkoutError> {
        if self.phase == SessionPhase::Closed {
            return Err(WorkoutError::SessionClosed);
        }
        Ok(())
    }

    fn invalid(&self, operation: &'static str) -> WorkoutError {
        if self.phase == SessionPhase::Closed {
            return WorkoutError::SessionClosed;
        }
        WorkoutError::InvalidTransition {
            operation,
            phase: self.phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulatorConfig;
    use crate::error::SpeechError;
    use crate::types::Gender;
    use crate::zones::{calculate_zones, select_target_zone};
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct RecordingSpeech {
        spoken: Arc<Mutex<Vec<String>>>,
    }

    impl SpeechSink for RecordingSpeech {
        fn speak(&self, text: &str, _locale: &str) -> Result<(), SpeechError> {
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn target_zone() -> HeartRateZone {
        let zones = calculate_zones(30, Gender::Male).unwrap();
        select_target_zone(&zones).unwrap().clone()
    }

    fn session(seed: u64) -> WorkoutSession {
        WorkoutSession::new(SessionConfig::seeded(seed)).unwrap()
    }

    fn run_ticks(
        session: &mut WorkoutSession,
        base: Instant,
        from: u64,
        count: u64,
    ) -> Vec<Option<TickReport>> {
        (from..from + count)
            .map(|i| session.tick_at(base + Duration::from_secs(i)))
            .collect()
    }

    #[test]
    fn test_new_session_is_idle() {
        let s = session(1);
        let snapshot = s.snapshot();

        assert_eq!(s.phase(), SessionPhase::Idle);
        assert_eq!(snapshot.current_bpm, 70);
        assert_eq!(snapshot.effort_level, 30);
        assert_eq!(snapshot.elapsed_display, "00:00");
        assert!(snapshot.feedback.is_none());
        assert!(!snapshot.is_running);
        assert_eq!(snapshot.gauge_percent, 0.0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = SessionConfig::default();
        config.announcer.in_target_probability = -0.1;
        assert!(WorkoutSession::new(config).is_err());
    }

    #[test]
    fn test_start_rejects_missing_zone() {
        let mut s = session(1);
        assert!(matches!(s.start(None, 190), Err(WorkoutError::InvalidZone)));
        assert_eq!(s.phase(), SessionPhase::Idle);
    }

    #[test]
    fn test_start_rejects_non_positive_max_hr() {
        let mut s = session(1);
        assert!(matches!(
            s.start(Some(target_zone()), 0),
            Err(WorkoutError::InvalidMaxHeartRate(0))
        ));
        assert!(s.start(Some(target_zone()), -5).is_err());
        assert_eq!(s.phase(), SessionPhase::Idle);
        assert!(s.target_zone().is_none());
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut s = session(1);
        s.start(Some(target_zone()), 190).unwrap();
        assert!(matches!(
            s.start(Some(target_zone()), 190),
            Err(WorkoutError::InvalidTransition { .. })
        ));
        assert_eq!(s.phase(), SessionPhase::Active);
    }

    #[test]
    fn test_idle_session_does_not_tick() {
        let mut s = session(1);
        assert!(s.tick().is_none());
        assert_eq!(s.elapsed_seconds(), 0);
        assert_eq!(s.current_bpm(), 70);
    }

    #[test]
    fn test_toggle_requires_started_session() {
        let mut s = session(1);
        assert!(matches!(
            s.toggle_running(),
            Err(WorkoutError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_pause_suppresses_increments() {
        let mut s = session(1);
        let base = Instant::now();
        s.start(Some(target_zone()), 190).unwrap();

        run_ticks(&mut s, base, 0, 5);
        assert_eq!(s.toggle_running().unwrap(), SessionPhase::Paused);

        let bpm_at_pause = s.current_bpm();
        let paused = run_ticks(&mut s, base, 5, 5);
        assert!(paused.iter().all(Option::is_none));
        assert_eq!(s.current_bpm(), bpm_at_pause);

        assert_eq!(s.toggle_running().unwrap(), SessionPhase::Active);
        run_ticks(&mut s, base, 10, 5);

        assert_eq!(s.elapsed_seconds(), 10);
    }

    #[test]
    fn test_adjust_effort_clamps() {
        let mut s = session(1);
        assert_eq!(s.adjust_effort(1000).unwrap(), 100);
        assert_eq!(s.effort_level(), 100);
        assert_eq!(s.adjust_effort(-1000).unwrap(), 0);
        assert_eq!(s.effort_level(), 0);
    }

    #[test]
    fn test_operations_rejected_after_close() {
        let mut s = session(1);
        s.start(Some(target_zone()), 190).unwrap();
        s.close();

        assert!(matches!(s.adjust_effort(10), Err(WorkoutError::SessionClosed)));
        assert!(matches!(s.set_muted(true), Err(WorkoutError::SessionClosed)));
        assert!(matches!(s.toggle_running(), Err(WorkoutError::SessionClosed)));
        assert!(matches!(
            s.start(Some(target_zone()), 190),
            Err(WorkoutError::SessionClosed)
        ));
    }

    #[test]
    fn test_close_is_idempotent_and_stops_ticks() {
        let mut s = session(1);
        let base = Instant::now();
        s.start(Some(target_zone()), 190).unwrap();
        run_ticks(&mut s, base, 0, 3);

        s.close();
        s.close();

        assert_eq!(s.phase(), SessionPhase::Closed);
        assert!(run_ticks(&mut s, base, 3, 5).iter().all(Option::is_none));
        assert_eq!(s.elapsed_seconds(), 3);
    }

    #[test]
    fn test_feedback_uses_same_tick_bpm() {
        let mut s = session(11);
        let base = Instant::now();
        s.start(Some(target_zone()), 190).unwrap();
        s.adjust_effort(70).unwrap();

        for i in 0..90 {
            let report = s.tick_at(base + Duration::from_secs(i)).unwrap();
            let zone = s.target_zone().unwrap();
            assert_eq!(report.bpm, s.current_bpm());
            assert_eq!(report.feedback, ZoneMonitor::classify(report.bpm, zone));
            assert_eq!(s.feedback(), Some(report.feedback));
        }
    }

    #[test]
    fn test_exact_sequence_without_jitter() {
        let config = SessionConfig {
            simulator: SimulatorConfig {
                jitter_bpm: 0.0,
                initial_effort: 100,
                ..SimulatorConfig::default()
            },
            ..SessionConfig::seeded(0)
        };
        let mut s = WorkoutSession::new(config).unwrap();
        let base = Instant::now();
        s.start(Some(target_zone()), 190).unwrap();

        let bpms: Vec<i32> = run_ticks(&mut s, base, 0, 3)
            .into_iter()
            .map(|r| r.unwrap().bpm)
            .collect();

        // 70 + 12 = 82; 82 + 10.8 = 92.8; 93 + 9.7 = 102.7
        assert_eq!(bpms, vec![82, 93, 103]);
    }

    #[test]
    fn test_muted_session_never_speaks() {
        let speech = RecordingSpeech::default();
        let mut s = session(3).with_speech(speech.clone());
        let base = Instant::now();
        s.start(Some(target_zone()), 190).unwrap();
        s.set_muted(true).unwrap();

        let reports = run_ticks(&mut s, base, 0, 120);

        assert!(reports
            .iter()
            .all(|r| r.as_ref().unwrap().announcement.is_none()));
        assert!(speech.spoken.lock().unwrap().is_empty());
    }

    #[test]
    fn test_announcements_spaced_by_gap() {
        let speech = RecordingSpeech::default();
        let mut s = session(4).with_speech(speech.clone());
        let base = Instant::now();
        s.start(Some(target_zone()), 190).unwrap();

        let mut spoken_at = Vec::new();
        for i in 0..300u64 {
            // Churn the effort so the feedback state keeps changing.
            let delta = if (i / 15) % 2 == 0 { 10 } else { -10 };
            s.adjust_effort(delta).unwrap();
            let report = s.tick_at(base + Duration::from_secs(i)).unwrap();
            if let Some(a) = report.announcement {
                spoken_at.push(a.elapsed_seconds);
            }
        }

        assert!(!spoken_at.is_empty());
        for pair in spoken_at.windows(2) {
            assert!(pair[1] - pair[0] >= 10, "announcements at {:?}", pair);
        }
        assert_eq!(speech.spoken.lock().unwrap().len(), spoken_at.len());
    }

    #[test]
    fn test_first_off_target_tick_announces() {
        let speech = RecordingSpeech::default();
        let mut s = session(5).with_speech(speech.clone());
        s.start(Some(target_zone()), 190).unwrap();

        // 70 bpm against 114-152 is below target on the first tick.
        let report = s.tick_at(Instant::now()).unwrap();
        assert_eq!(report.feedback, FeedbackState::BelowTarget);
        assert_eq!(report.announcement.unwrap().text, "Increase pace!");
        assert_eq!(speech.spoken.lock().unwrap().as_slice(), ["Increase pace!"]);
    }

    #[test]
    fn test_full_effort_scenario() {
        let mut s = session(190);
        let base = Instant::now();
        let zone = target_zone();
        assert_eq!((zone.min_bpm, zone.max_bpm), (114, 152));

        s.start(Some(zone), 190).unwrap();
        s.adjust_effort(1000).unwrap();

        let reports: Vec<TickReport> = run_ticks(&mut s, base, 0, 60)
            .into_iter()
            .map(Option::unwrap)
            .collect();

        assert!(reports[59].bpm > reports[0].bpm);
        assert!(reports[59].bpm >= 152);
        assert!(reports[20..]
            .iter()
            .all(|r| r.feedback != FeedbackState::BelowTarget));
        assert_eq!(s.time_in_zone().total(), 60);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let mut s = session(6);
        let base = Instant::now();
        s.start(Some(target_zone()), 190).unwrap();
        s.set_muted(true).unwrap();
        run_ticks(&mut s, base, 0, 65);

        let snapshot = s.snapshot();
        assert_eq!(snapshot.phase, SessionPhase::Active);
        assert_eq!(snapshot.elapsed_seconds, 65);
        assert_eq!(snapshot.elapsed_display, "01:05");
        assert!(snapshot.is_running);
        assert!(snapshot.is_muted);
        assert!(snapshot.started_at.is_some());
        assert_eq!(snapshot.max_heart_rate, Some(190));
        assert_eq!(snapshot.target_zone.as_ref().unwrap().id, "aerobic");
        assert_eq!(
            snapshot.feedback.as_ref().map(|f| f.state),
            s.feedback()
        );
        assert_eq!(snapshot.time_in_zone.total(), 65);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["phase"], "active");
        assert_eq!(json["target_zone"]["min_bpm"], 114);
    }

    #[test]
    fn test_same_seed_same_session() {
        let run = || {
            let mut s = session(77);
            let base = Instant::now();
            s.start(Some(target_zone()), 190).unwrap();
            s.adjust_effort(40).unwrap();
            run_ticks(&mut s, base, 0, 40)
                .into_iter()
                .map(|r| {
                    let r = r.unwrap();
                    (r.bpm, r.feedback, r.announcement.map(|a| a.elapsed_seconds))
                })
                .collect::<Vec<_>>()
        };

        assert_eq!(run(), run());
    }
}
