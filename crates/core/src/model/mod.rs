pub mod event;
mod ids;
mod milestone;
mod player;
mod settings;
mod summary;

pub use event::{AnalyticsEvent, Properties, PropertyValue};
pub use ids::{IdError, ParticipantId, StudyId, VideoId};
pub use milestone::{Milestone, MilestoneSet};
pub use player::{LifecycleSignal, PlayerCommand, PlayerState};
pub use settings::{
    AnalyticsSettings, AnalyticsSettingsDraft, SessionSettings, SessionSettingsDraft,
    SettingsError, DEFAULT_POLL_INTERVAL, DEFAULT_UNMUTE_DELAY,
};
pub use summary::{SessionSummary, percent_of};
