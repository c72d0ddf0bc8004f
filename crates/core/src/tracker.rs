//! Watch-time accounting state machine.
//!
//! `WatchTracker` is a pure reducer: every external happening is fed in as a
//! `TrackerInput` and the tracker answers with the `Effect`s the caller must
//! carry out (player commands, timers, analytics events). It never touches a
//! player, a timer or a network itself.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::model::event::{
    VIDEO_COMPLETE, VIDEO_MUTE_TOGGLE, VIDEO_PAUSE, VIDEO_PLAY, VIDEO_PROGRESS, VIDEO_START,
    round2,
};
use crate::model::{
    AnalyticsEvent, LifecycleSignal, Milestone, MilestoneSet, PlayerCommand, PlayerState,
    SessionSettings, SessionSummary, percent_of,
};

//
// ─── INPUTS & EFFECTS ─────────────────────────────────────────────────────────
//

/// Lifecycle phase of a watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    /// Player not ready yet.
    Idle,
    /// Player ready, waiting for the start gesture.
    ReadyUnarmed,
    /// Gesture received; notifications are accounted.
    Armed,
    /// Summary sent. Terminal.
    Finalized,
}

/// Timers the tracker asks its host to schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    Poll,
    Unmute,
}

/// Something that happened to the session.
///
/// Positions and durations are seconds as reported by the player.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerInput {
    PlayerReady {
        duration: f64,
    },
    Gesture,
    StateChanged {
        state: PlayerState,
        position: f64,
        muted: bool,
    },
    PollSample {
        state: PlayerState,
        position: f64,
        duration: f64,
    },
    UnmuteDue,
    MuteToggleRequested {
        currently_muted: bool,
        position: f64,
    },
    Lifecycle {
        signal: LifecycleSignal,
        position: f64,
        at: DateTime<Utc>,
    },
}

/// Side effect requested by the tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Command(PlayerCommand),
    Schedule { timer: Timer, after: Duration },
    Emit(AnalyticsEvent),
}

//
// ─── TRACKER ──────────────────────────────────────────────────────────────────
//

/// Engagement state for the single video on a page view.
#[derive(Debug, Clone)]
pub struct WatchTracker {
    settings: SessionSettings,
    started_at: DateTime<Utc>,
    phase: TrackerPhase,
    arm_pending: bool,
    duration_secs: f64,
    play_epochs: u32,
    current_play_start: Option<f64>,
    total_watched_secs: f64,
    milestones: MilestoneSet,
    max_progress_secs: f64,
    completion_count: u32,
    poll_active: bool,
    summary: Option<SessionSummary>,
}

impl WatchTracker {
    /// Creates the session for a page view that loaded at `started_at`.
    #[must_use]
    pub fn new(settings: SessionSettings, started_at: DateTime<Utc>) -> Self {
        Self {
            settings,
            started_at,
            phase: TrackerPhase::Idle,
            arm_pending: false,
            duration_secs: 0.0,
            play_epochs: 0,
            current_play_start: None,
            total_watched_secs: 0.0,
            milestones: MilestoneSet::new(),
            max_progress_secs: 0.0,
            completion_count: 0,
            poll_active: false,
            summary: None,
        }
    }

    /// Applies one input and returns the effects to carry out, in order.
    pub fn apply(&mut self, input: TrackerInput) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.phase == TrackerPhase::Finalized {
            return effects;
        }

        match input {
            TrackerInput::PlayerReady { duration } => self.on_ready(duration, &mut effects),
            TrackerInput::Gesture => self.on_gesture(&mut effects),
            TrackerInput::StateChanged {
                state,
                position,
                muted,
            } => self.on_state_changed(state, seconds(position), muted, &mut effects),
            TrackerInput::PollSample {
                state,
                position,
                duration,
            } => self.on_poll(state, seconds(position), seconds(duration), &mut effects),
            TrackerInput::UnmuteDue => {
                if self.phase == TrackerPhase::Armed {
                    effects.push(Effect::Command(PlayerCommand::Unmute));
                }
            }
            TrackerInput::MuteToggleRequested {
                currently_muted,
                position,
            } => self.on_mute_toggle(currently_muted, seconds(position), &mut effects),
            TrackerInput::Lifecycle {
                signal,
                position,
                at,
            } => self.finalize(signal, seconds(position), at, &mut effects),
        }
        effects
    }

    fn on_ready(&mut self, duration: f64, effects: &mut Vec<Effect>) {
        if self.phase != TrackerPhase::Idle {
            return;
        }
        self.duration_secs = seconds(duration);
        self.phase = TrackerPhase::ReadyUnarmed;
        // The embed may already be autoplaying.
        effects.push(Effect::Command(PlayerCommand::Pause));
        effects.push(Effect::Command(PlayerCommand::Mute));

        if std::mem::take(&mut self.arm_pending) {
            self.arm(effects);
        }
    }

    fn on_gesture(&mut self, effects: &mut Vec<Effect>) {
        match self.phase {
            TrackerPhase::Idle => self.arm_pending = true,
            TrackerPhase::ReadyUnarmed => self.arm(effects),
            TrackerPhase::Armed | TrackerPhase::Finalized => {}
        }
    }

    // Muted autoplay is allowed by browsers, unmuted is not: play muted first
    // and unmute once playback had a moment to start.
    fn arm(&mut self, effects: &mut Vec<Effect>) {
        self.phase = TrackerPhase::Armed;
        effects.push(Effect::Command(PlayerCommand::Mute));
        effects.push(Effect::Command(PlayerCommand::Play));
        effects.push(Effect::Schedule {
            timer: Timer::Unmute,
            after: self.settings.unmute_delay(),
        });
    }

    fn on_state_changed(
        &mut self,
        state: PlayerState,
        position: f64,
        muted: bool,
        effects: &mut Vec<Effect>,
    ) {
        if self.phase != TrackerPhase::Armed {
            if state.is_playing() {
                effects.push(Effect::Command(PlayerCommand::Pause));
            }
            return;
        }

        match state {
            PlayerState::Playing => {
                self.observe(position);
                if self.current_play_start.is_none() {
                    self.current_play_start = Some(position);
                    self.play_epochs = self.play_epochs.saturating_add(1);
                    self.announce_play(position, muted, effects);
                }
                if !self.poll_active {
                    self.poll_active = true;
                    effects.push(self.schedule_poll());
                }
            }
            PlayerState::Paused => {
                self.observe(position);
                if self.close_segment(position) {
                    let event = self
                        .settings
                        .event(VIDEO_PAUSE)
                        .with("current_time", round2(position))
                        .with("total_watch_seconds", round2(self.total_watched_secs));
                    effects.push(Effect::Emit(event));
                }
            }
            PlayerState::Ended => {
                self.observe(position);
                self.close_segment(position);
                self.completion_count = self.completion_count.saturating_add(1);
                self.reach(Milestone::Complete, position, effects);
                self.announce_complete(position, effects);
            }
            PlayerState::Unstarted
            | PlayerState::Buffering
            | PlayerState::Cued
            | PlayerState::Unknown(_) => {}
        }
    }

    fn on_poll(
        &mut self,
        state: PlayerState,
        position: f64,
        duration: f64,
        effects: &mut Vec<Effect>,
    ) {
        if !self.poll_active {
            return;
        }
        if self.phase != TrackerPhase::Armed || !state.is_playing() {
            self.poll_active = false;
            return;
        }

        if self.duration_secs <= 0.0 {
            self.duration_secs = duration;
        }
        self.observe(position);

        if self.duration_secs > 0.0 {
            for milestone in Milestone::ALL {
                if position >= milestone.threshold(self.duration_secs) {
                    self.reach(milestone, position, effects);
                }
            }
        }

        effects.push(self.schedule_poll());
    }

    fn on_mute_toggle(&mut self, currently_muted: bool, position: f64, effects: &mut Vec<Effect>) {
        if self.phase == TrackerPhase::Idle {
            return;
        }
        let command = if currently_muted {
            PlayerCommand::Unmute
        } else {
            PlayerCommand::Mute
        };
        effects.push(Effect::Command(command));

        if self.phase == TrackerPhase::Armed {
            let event = self
                .settings
                .event(VIDEO_MUTE_TOGGLE)
                .with("is_muted", !currently_muted)
                .with("current_time", round2(position));
            effects.push(Effect::Emit(event));
        }
    }

    fn finalize(
        &mut self,
        signal: LifecycleSignal,
        position: f64,
        at: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) {
        let armed = self.phase == TrackerPhase::Armed;
        if armed {
            self.observe(position);
            self.close_segment(position);
        }
        self.phase = TrackerPhase::Finalized;
        self.poll_active = false;

        let summary = SessionSummary {
            total_watched_secs: self.total_watched_secs,
            play_count: self.play_epochs,
            completion_count: self.completion_count,
            milestones: self.milestones,
            max_progress_secs: self.max_progress_secs,
            final_position_secs: if armed { position } else { 0.0 },
            video_duration_secs: self.duration_secs,
            started_at: self.started_at,
            finalized_at: at,
            exit_signal: signal,
        };
        effects.push(Effect::Emit(summary.to_event(&self.settings)));
        self.summary = Some(summary);
    }

    fn observe(&mut self, position: f64) {
        if position > self.max_progress_secs {
            self.max_progress_secs = position;
        }
    }

    /// Returns whether a segment was open.
    fn close_segment(&mut self, position: f64) -> bool {
        match self.current_play_start.take() {
            Some(start) => {
                self.total_watched_secs += (position - start).max(0.0);
                true
            }
            None => false,
        }
    }

    fn announce_play(&self, position: f64, muted: bool, effects: &mut Vec<Effect>) {
        if self.play_epochs == 1 {
            let event = self
                .settings
                .event(VIDEO_START)
                .with("video_duration_seconds", round2(self.duration_secs))
                .with("current_time", round2(position));
            effects.push(Effect::Emit(event));
        }
        let event = self
            .settings
            .event(VIDEO_PLAY)
            .with("current_time", round2(position))
            .with("is_muted", muted)
            .with("play_count", self.play_epochs);
        effects.push(Effect::Emit(event));
    }

    fn announce_complete(&self, position: f64, effects: &mut Vec<Effect>) {
        let event = self
            .settings
            .event(VIDEO_COMPLETE)
            .with("video_duration_seconds", round2(self.duration_secs))
            .with("total_watch_seconds", round2(self.total_watched_secs))
            .with(
                "completion_rate_percent",
                round2(percent_of(position, self.duration_secs)),
            )
            .with("max_progress_seconds", round2(self.max_progress_secs))
            .with("completion_count", self.completion_count);
        effects.push(Effect::Emit(event));
    }

    fn reach(&mut self, milestone: Milestone, position: f64, effects: &mut Vec<Effect>) {
        if !self.milestones.insert(milestone) {
            return;
        }
        let event = self
            .settings
            .event(VIDEO_PROGRESS)
            .with("milestone_percent", milestone.percent())
            .with("current_time", round2(position))
            .with("play_count", self.play_epochs)
            .with("total_watch_seconds", round2(self.watched_so_far(position)));
        effects.push(Effect::Emit(event));
    }

    fn schedule_poll(&self) -> Effect {
        Effect::Schedule {
            timer: Timer::Poll,
            after: self.settings.poll_interval(),
        }
    }

    /// Closed-segment total plus the forward part of the open segment.
    #[must_use]
    pub fn watched_so_far(&self, position: f64) -> f64 {
        let open = self
            .current_play_start
            .map_or(0.0, |start| (position - start).max(0.0));
        self.total_watched_secs + open
    }

    #[must_use]
    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.phase == TrackerPhase::Armed
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.phase == TrackerPhase::Finalized
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    #[must_use]
    pub fn play_epochs(&self) -> u32 {
        self.play_epochs
    }

    #[must_use]
    pub fn current_play_start(&self) -> Option<f64> {
        self.current_play_start
    }

    #[must_use]
    pub fn total_watched_secs(&self) -> f64 {
        self.total_watched_secs
    }

    #[must_use]
    pub fn milestones(&self) -> MilestoneSet {
        self.milestones
    }

    #[must_use]
    pub fn max_progress_secs(&self) -> f64 {
        self.max_progress_secs
    }

    #[must_use]
    pub fn completion_count(&self) -> u32 {
        self.completion_count
    }

    #[must_use]
    pub fn poll_active(&self) -> bool {
        self.poll_active
    }

    /// Summary frozen at finalization.
    #[must_use]
    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }
}

/// Player-reported seconds; NaN, infinities and negatives read as zero.
fn seconds(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
