//! Async session driver
//!
//! Moves a [`WorkoutSession`] into a tokio task that owns it exclusively. One
//! interval drives the ticks; presentation-layer operations arrive over a
//! command channel and are applied between ticks, so every operation and
//! every tick see a consistent state. Snapshots are published on a `watch`
//! channel, announcements on a `broadcast` channel.

use rand::Rng;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::announcer::SpeechSink;
use crate::error::{SpeechError, WorkoutError};
use crate::session::WorkoutSession;
use crate::types::{Announcement, HeartRateZone, SessionPhase, SessionSnapshot};

/// Capacity of the announcement broadcast channel
const ANNOUNCEMENT_CAPACITY: usize = 16;

/// Text handed to a speech channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub locale: String,
}

/// Speech sink forwarding utterances to an async consumer without waiting
#[derive(Debug, Clone)]
pub struct ChannelSpeech {
    tx: mpsc::UnboundedSender<Utterance>,
}

impl ChannelSpeech {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Utterance>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SpeechSink for ChannelSpeech {
    fn speak(&self, text: &str, locale: &str) -> Result<(), SpeechError> {
        self.tx
            .send(Utterance {
                text: text.to_string(),
                locale: locale.to_string(),
            })
            .map_err(|_| SpeechError::Unavailable)
    }
}

enum Command {
    Start {
        zone: Option<HeartRateZone>,
        max_heart_rate: i32,
        reply: oneshot::Sender<Result<(), WorkoutError>>,
    },
    ToggleRunning {
        reply: oneshot::Sender<Result<SessionPhase, WorkoutError>>,
    },
    AdjustEffort {
        delta: i32,
        reply: oneshot::Sender<Result<u8, WorkoutError>>,
    },
    SetMuted {
        muted: bool,
        reply: oneshot::Sender<Result<(), WorkoutError>>,
    },
    Close {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Handle to a session running on the tokio runtime
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    announcements: broadcast::Sender<Announcement>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Spawn the ticker task. Must be called from within a tokio runtime.
    pub fn spawn<R>(session: WorkoutSession<R>) -> Self
    where
        R: Rng + Send + 'static,
    {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshots) = watch::channel(session.snapshot());
        let (announcements, _) = broadcast::channel(ANNOUNCEMENT_CAPACITY);

        let task = tokio::spawn(drive(
            session,
            command_rx,
            snapshot_tx,
            announcements.clone(),
        ));

        Self {
            commands,
            snapshots,
            announcements,
            task: Some(task),
        }
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified after every tick and command
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Receiver for announcements decided by the session
    pub fn announcements(&self) -> broadcast::Receiver<Announcement> {
        self.announcements.subscribe()
    }

    pub async fn start(
        &self,
        zone: Option<HeartRateZone>,
        max_heart_rate: i32,
    ) -> Result<(), WorkoutError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            Command::Start {
                zone,
                max_heart_rate,
                reply,
            },
            rx,
        )
        .await?
    }

    pub async fn toggle_running(&self) -> Result<SessionPhase, WorkoutError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::ToggleRunning { reply }, rx).await?
    }

    pub async fn adjust_effort(&self, delta: i32) -> Result<u8, WorkoutError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::AdjustEffort { delta, reply }, rx).await?
    }

    pub async fn set_muted(&self, muted: bool) -> Result<(), WorkoutError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::SetMuted { muted, reply }, rx).await?
    }

    /// Close the session and wait for the ticker to stop.
    ///
    /// No tick runs after this returns. Later calls return the final snapshot.
    pub async fn close(&mut self) -> SessionSnapshot {
        let Some(task) = self.task.take() else {
            return self.snapshot();
        };

        let (reply, rx) = oneshot::channel();
        let closed = match self.commands.send(Command::Close { reply }) {
            Ok(()) => rx.await.ok(),
            Err(_) => None,
        };

        if let Err(e) = task.await {
            warn!(error = %e, "session task ended abnormally");
        }

        closed.unwrap_or_else(|| self.snapshot())
    }

    async fn request<T>(
        &self,
        command: Command,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, WorkoutError> {
        self.commands
            .send(command)
            .map_err(|_| WorkoutError::SessionClosed)?;
        rx.await.map_err(|_| WorkoutError::SessionClosed)
    }
}

async fn drive<R: Rng>(
    mut session: WorkoutSession<R>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<SessionSnapshot>,
    announcements: broadcast::Sender<Announcement>,
) {
    let period = session.config().tick_period();
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            command = commands.recv() => {
                let Some(command) = command else {
                    debug!(session_id = %session.id(), "all handles dropped, closing session");
                    session.close();
                    snapshots.send_replace(session.snapshot());
                    break;
                };

                let keep_running = apply(&mut session, command);
                snapshots.send_replace(session.snapshot());
                if !keep_running {
                    break;
                }
            }

            at = ticker.tick() => {
                if let Some(report) = session.tick_at(at.into_std()) {
                    snapshots.send_replace(session.snapshot());
                    if let Some(announcement) = report.announcement {
                        // Nobody listening is fine.
                        let _ = announcements.send(announcement);
                    }
                }
            }
        }
    }
}

/// Apply one command; false once the session is closed and the task should stop
fn apply<R: Rng>(session: &mut WorkoutSession<R>, command: Command) -> bool {
    // A dropped reply receiver means the caller stopped waiting; the
    // operation still applies.
    match command {
        Command::Start {
            zone,
            max_heart_rate,
            reply,
        } => {
            let _ = reply.send(session.start(zone, max_heart_rate));
        }
        Command::ToggleRunning { reply } => {
            let _ = reply.send(session.toggle_running());
        }
        Command::AdjustEffort { delta, reply } => {
            let _ = reply.send(session.adjust_effort(delta));
        }
        Command::SetMuted { muted, reply } => {
            let _ = reply.send(session.set_muted(muted));
        }
        Command::Close { reply } => {
            session.close();
            let _ = reply.send(session.snapshot());
            return false;
        }
    }
    true
}
