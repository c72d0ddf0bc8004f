use chrono::{DateTime, Utc};

use crate::model::event::{AnalyticsEvent, VIDEO_SESSION_COMPLETE, round2};
use crate::model::milestone::{Milestone, MilestoneSet};
use crate::model::player::LifecycleSignal;
use crate::model::settings::SessionSettings;

/// Share of `duration_secs` covered by `position_secs`, clamped to 100.
///
/// Players can report marginally past the nominal duration, hence the clamp.
/// An unknown (zero) duration yields 0.
#[must_use]
pub fn percent_of(position_secs: f64, duration_secs: f64) -> f64 {
    if duration_secs <= 0.0 {
        return 0.0;
    }
    (position_secs.max(0.0) / duration_secs * 100.0).min(100.0)
}

/// Metrics accumulated over one watch session, frozen at finalization.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub total_watched_secs: f64,
    pub play_count: u32,
    pub completion_count: u32,
    pub milestones: MilestoneSet,
    pub max_progress_secs: f64,
    pub final_position_secs: f64,
    pub video_duration_secs: f64,
    pub started_at: DateTime<Utc>,
    pub finalized_at: DateTime<Utc>,
    pub exit_signal: LifecycleSignal,
}

impl SessionSummary {
    #[must_use]
    pub fn completion_rate_percent(&self) -> f64 {
        percent_of(self.final_position_secs, self.video_duration_secs)
    }

    #[must_use]
    pub fn max_progress_percent(&self) -> f64 {
        percent_of(self.max_progress_secs, self.video_duration_secs)
    }

    /// Wall-clock seconds between page load and finalization.
    #[must_use]
    pub fn session_duration_secs(&self) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let millis = (self.finalized_at - self.started_at).num_milliseconds().max(0) as f64;
        millis / 1000.0
    }

    /// Builds the `video_session_complete` event.
    #[must_use]
    pub fn to_event(&self, settings: &SessionSettings) -> AnalyticsEvent {
        let mut event = settings
            .event(VIDEO_SESSION_COMPLETE)
            .with("total_watch_seconds", round2(self.total_watched_secs))
            .with("total_watch_minutes", round2(self.total_watched_secs / 60.0))
            .with("play_count", self.play_count)
            .with("completion_count", self.completion_count)
            .with("max_progress_percent", round2(self.max_progress_percent()))
            .with("completion_rate_percent", round2(self.completion_rate_percent()))
            .with("video_duration_seconds", round2(self.video_duration_secs))
            .with("session_duration_seconds", round2(self.session_duration_secs()))
            .with("exit_signal", self.exit_signal.as_str());

        for milestone in Milestone::ALL {
            let key = format!("milestone_{}", milestone.percent());
            event = event.with(&key, self.milestones.contains(milestone));
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::PropertyValue;
    use crate::model::settings::SessionSettingsDraft;
    use crate::time::fixed_now;

    fn summary() -> SessionSummary {
        let mut milestones = MilestoneSet::new();
        milestones.insert(Milestone::Quarter);
        milestones.insert(Milestone::Half);
        let now = fixed_now();
        SessionSummary {
            total_watched_secs: 90.0,
            play_count: 2,
            completion_count: 0,
            milestones,
            max_progress_secs: 55.0,
            final_position_secs: 50.0,
            video_duration_secs: 100.0,
            started_at: now,
            finalized_at: now + chrono::Duration::milliseconds(120_500),
            exit_signal: LifecycleSignal::PageHide,
        }
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(percent_of(100.4, 100.0), 100.0);
        assert_eq!(percent_of(50.0, 100.0), 50.0);
        assert_eq!(percent_of(10.0, 0.0), 0.0);
        assert_eq!(percent_of(-3.0, 100.0), 0.0);
    }

    #[test]
    fn event_carries_all_metrics() {
        let settings = SessionSettingsDraft::new("vid", "study").validate().unwrap();
        let event = summary().to_event(&settings);

        assert_eq!(event.name, VIDEO_SESSION_COMPLETE);
        assert_eq!(event.get("total_watch_seconds"), Some(&PropertyValue::Float(90.0)));
        assert_eq!(event.get("total_watch_minutes"), Some(&PropertyValue::Float(1.5)));
        assert_eq!(event.get("play_count"), Some(&PropertyValue::Int(2)));
        assert_eq!(event.get("milestone_25"), Some(&PropertyValue::Bool(true)));
        assert_eq!(event.get("milestone_75"), Some(&PropertyValue::Bool(false)));
        assert_eq!(event.get("max_progress_percent"), Some(&PropertyValue::Float(55.0)));
        assert_eq!(event.get("completion_rate_percent"), Some(&PropertyValue::Float(50.0)));
        assert_eq!(event.get("session_duration_seconds"), Some(&PropertyValue::Float(120.5)));
        assert_eq!(event.get("exit_signal").and_then(PropertyValue::as_str), Some("pagehide"));
        assert_eq!(event.get("video_id").and_then(PropertyValue::as_str), Some("vid"));
    }
}
