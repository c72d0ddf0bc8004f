//! Deterministic stand-ins for the embedded player and the page timeline.
//!
//! `SimulatedPlayer` advances its position with a manual `Clock`, and
//! `SimulatedSession` wires it to a driver and a `ManualScheduler` so whole
//! page visits can be replayed in virtual time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;
use watch_core::model::{LifecycleSignal, PlayerState, SessionSettings};
use watch_core::{Clock, WatchTracker};

use crate::driver::{Signal, WatchSessionDriver};
use crate::player::VideoPlayer;
use crate::scheduler::ManualScheduler;
use crate::transport::TransportRef;

//
// ─── PLAYER ────────────────────────────────────────────────────────────────────
//

#[derive(Debug)]
struct Playback {
    duration: f64,
    /// Position at the last state change or seek.
    anchor: f64,
    /// Clock reading when the current play run started.
    playing_since: Option<DateTime<Utc>>,
    state: PlayerState,
    muted: bool,
    notifications: VecDeque<PlayerState>,
}

/// Player whose position follows a manual clock while playing.
///
/// Commands change state immediately and queue the matching notification;
/// reaching the end while playing switches to `Ended` on the next read.
/// With `with_signals`, notifications go to the driver's channel instead of
/// the queue.
#[derive(Debug)]
pub struct SimulatedPlayer {
    clock: Clock,
    playback: Mutex<Playback>,
    signals: Option<UnboundedSender<Signal>>,
}

impl SimulatedPlayer {
    #[must_use]
    pub fn new(duration_secs: f64, clock: Clock) -> Self {
        Self {
            clock,
            playback: Mutex::new(Playback {
                duration: duration_secs.max(0.0),
                anchor: 0.0,
                playing_since: None,
                state: PlayerState::Unstarted,
                muted: false,
                notifications: VecDeque::new(),
            }),
            signals: None,
        }
    }

    /// Delivers state changes as `Signal::PlayerStateChanged` on `signals`.
    #[must_use]
    pub fn with_signals(mut self, signals: UnboundedSender<Signal>) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Jumps to `position`, keeping the play state.
    pub fn seek(&self, position: f64) {
        let now = self.clock.now();
        let mut playback = self.sync();
        playback.anchor = position.clamp(0.0, playback.duration);
        if playback.playing_since.is_some() {
            playback.playing_since = Some(now);
        }
    }

    /// Jumps to the end and reports `Ended`.
    pub fn finish(&self) {
        let mut playback = self.sync();
        playback.anchor = playback.duration;
        self.transition(&mut playback, PlayerState::Ended, None);
    }

    /// Takes the queued state-change notifications.
    pub fn drain_notifications(&self) -> Vec<PlayerState> {
        self.sync().notifications.drain(..).collect()
    }

    fn sync(&self) -> MutexGuard<'_, Playback> {
        let now = self.clock.now();
        let mut playback = self.playback.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(since) = playback.playing_since {
            let position = playback.anchor + elapsed_secs(since, now);
            if playback.duration > 0.0 && position >= playback.duration {
                playback.anchor = playback.duration;
                self.transition(&mut playback, PlayerState::Ended, None);
            } else {
                playback.anchor = position;
                playback.playing_since = Some(now);
            }
        }
        playback
    }

    fn transition(
        &self,
        playback: &mut Playback,
        state: PlayerState,
        since: Option<DateTime<Utc>>,
    ) {
        playback.state = state;
        playback.playing_since = since;
        match &self.signals {
            Some(signals) => {
                if signals.send(Signal::PlayerStateChanged(state)).is_err() {
                    tracing::debug!(?state, "driver gone; player notification dropped");
                }
            }
            None => playback.notifications.push_back(state),
        }
    }
}

impl VideoPlayer for SimulatedPlayer {
    fn current_time(&self) -> f64 {
        self.sync().anchor
    }

    fn duration(&self) -> f64 {
        self.playback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .duration
    }

    fn state(&self) -> PlayerState {
        self.sync().state
    }

    fn play(&self) {
        let now = self.clock.now();
        let mut playback = self.sync();
        if playback.state == PlayerState::Playing {
            return;
        }
        if playback.state == PlayerState::Ended {
            playback.anchor = 0.0;
        }
        self.transition(&mut playback, PlayerState::Playing, Some(now));
    }

    fn pause(&self) {
        let mut playback = self.sync();
        if matches!(playback.state, PlayerState::Playing | PlayerState::Buffering) {
            self.transition(&mut playback, PlayerState::Paused, None);
        }
    }

    fn mute(&self) {
        self.sync().muted = true;
    }

    fn unmute(&self) {
        self.sync().muted = false;
    }

    fn is_muted(&self) -> bool {
        self.sync().muted
    }
}

fn elapsed_secs(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let millis = (now - since).num_milliseconds().max(0) as f64;
    millis / 1000.0
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Driver, simulated player and virtual-time scheduler wired together.
pub struct SimulatedSession {
    driver: WatchSessionDriver,
    player: Arc<SimulatedPlayer>,
    scheduler: Arc<ManualScheduler>,
}

impl SimulatedSession {
    #[must_use]
    pub fn new(
        settings: SessionSettings,
        transport: TransportRef,
        duration_secs: f64,
        clock: Clock,
    ) -> Self {
        let player = Arc::new(SimulatedPlayer::new(duration_secs, clock.clone()));
        let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
        let driver = WatchSessionDriver::new(
            settings,
            player.clone(),
            transport,
            scheduler.clone(),
            clock,
        );
        Self {
            driver,
            player,
            scheduler,
        }
    }

    #[must_use]
    pub fn player(&self) -> &SimulatedPlayer {
        &self.player
    }

    #[must_use]
    pub fn scheduler(&self) -> &ManualScheduler {
        &self.scheduler
    }

    #[must_use]
    pub fn tracker(&self) -> &WatchTracker {
        self.driver.tracker()
    }

    #[must_use]
    pub fn into_tracker(self) -> WatchTracker {
        self.driver.into_tracker()
    }

    /// Delivers a signal, then every notification it caused.
    pub fn send(&mut self, signal: Signal) {
        self.driver.handle(signal);
        self.pump();
    }

    pub fn ready(&mut self) {
        self.send(Signal::PlayerReady);
    }

    pub fn tap_to_start(&mut self) {
        self.send(Signal::StartGesture);
    }

    pub fn leave(&mut self, signal: LifecycleSignal) {
        self.send(Signal::Lifecycle(signal));
    }

    /// Lets `duration` of virtual time pass, firing timers as they fall due.
    pub fn run_for(&mut self, duration: Duration) {
        let deadline = self.scheduler.elapsed() + duration;
        self.pump();
        while let Some(timer) = self.scheduler.fire_next_until(deadline) {
            self.driver.handle(Signal::TimerFired(timer));
            self.pump();
        }
        self.pump();
    }

    /// Forwards queued player notifications until none are left.
    pub fn pump(&mut self) {
        loop {
            let notifications = self.player.drain_notifications();
            if notifications.is_empty() {
                break;
            }
            for state in notifications {
                self.driver.handle(Signal::PlayerStateChanged(state));
            }
        }
    }
}
