use std::fmt;

use tokio::sync::mpsc::UnboundedReceiver;
use watch_core::model::event::VIDEO_SESSION_COMPLETE;
use watch_core::model::{LifecycleSignal, PlayerState, SessionSettings};
use watch_core::{Clock, Effect, Timer, TrackerInput, WatchTracker};

use crate::player::{PlayerRef, apply_command};
use crate::scheduler::SchedulerRef;
use crate::transport::TransportRef;

/// External happening delivered to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    PlayerReady,
    PlayerStateChanged(PlayerState),
    StartGesture,
    MuteToggle,
    Lifecycle(LifecycleSignal),
    TimerFired(Timer),
}

//
// ─── DRIVER ────────────────────────────────────────────────────────────────────
//

/// Sole owner of the session state.
///
/// Every signal passes through `handle`, which reads the live player, feeds
/// the tracker and carries out the resulting effects. Owning the tracker in
/// one place is what serializes notification handlers, poll ticks and
/// lifecycle signals.
pub struct WatchSessionDriver {
    tracker: WatchTracker,
    player: PlayerRef,
    transport: TransportRef,
    scheduler: SchedulerRef,
    clock: Clock,
    player_ready: bool,
}

impl WatchSessionDriver {
    /// Creates the driver; the session starts at `clock.now()`.
    #[must_use]
    pub fn new(
        settings: SessionSettings,
        player: PlayerRef,
        transport: TransportRef,
        scheduler: SchedulerRef,
        clock: Clock,
    ) -> Self {
        Self {
            tracker: WatchTracker::new(settings, clock.now()),
            player,
            transport,
            scheduler,
            clock,
            player_ready: false,
        }
    }

    #[must_use]
    pub fn tracker(&self) -> &WatchTracker {
        &self.tracker
    }

    #[must_use]
    pub fn into_tracker(self) -> WatchTracker {
        self.tracker
    }

    /// Applies one signal and executes its effects.
    pub fn handle(&mut self, signal: Signal) {
        let input = self.input_for(signal);
        for effect in self.tracker.apply(input) {
            self.execute(effect);
        }
    }

    /// Handles signals until the session is finalized or every sender is gone.
    pub async fn run(mut self, mut signals: UnboundedReceiver<Signal>) -> WatchTracker {
        while let Some(signal) = signals.recv().await {
            self.handle(signal);
            if self.tracker.is_finalized() {
                break;
            }
        }
        self.tracker
    }

    fn input_for(&mut self, signal: Signal) -> TrackerInput {
        match signal {
            Signal::PlayerReady => {
                self.player_ready = true;
                TrackerInput::PlayerReady {
                    duration: self.player.duration(),
                }
            }
            Signal::PlayerStateChanged(state) => {
                if let PlayerState::Unknown(code) = state {
                    tracing::debug!(code, "unrecognized player state ignored");
                }
                TrackerInput::StateChanged {
                    state,
                    position: self.live_position(),
                    muted: self.player_ready && self.player.is_muted(),
                }
            }
            Signal::StartGesture => TrackerInput::Gesture,
            Signal::MuteToggle => TrackerInput::MuteToggleRequested {
                currently_muted: self.player_ready && self.player.is_muted(),
                position: self.live_position(),
            },
            Signal::Lifecycle(signal) => TrackerInput::Lifecycle {
                signal,
                position: self.live_position(),
                at: self.clock.now(),
            },
            Signal::TimerFired(Timer::Poll) => TrackerInput::PollSample {
                state: self.player.state(),
                position: self.live_position(),
                duration: self.player.duration(),
            },
            Signal::TimerFired(Timer::Unmute) => TrackerInput::UnmuteDue,
        }
    }

    fn live_position(&self) -> f64 {
        if self.player_ready {
            self.player.current_time()
        } else {
            0.0
        }
    }

    fn execute(&self, effect: Effect) {
        match effect {
            Effect::Command(command) => apply_command(self.player.as_ref(), command),
            Effect::Schedule { timer, after } => self.scheduler.schedule_after(after, timer),
            Effect::Emit(event) => {
                if event.name == VIDEO_SESSION_COMPLETE {
                    tracing::info!(
                        watched = self.tracker.total_watched_secs(),
                        plays = self.tracker.play_epochs(),
                        "watch session finalized"
                    );
                }
                self.transport.track(event);
            }
        }
    }
}

impl fmt::Debug for WatchSessionDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSessionDriver")
            .field("phase", &self.tracker.phase())
            .field("player_ready", &self.player_ready)
            .field("transport_ready", &self.transport.is_ready())
            .finish_non_exhaustive()
    }
}
