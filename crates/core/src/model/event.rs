use serde::Serialize;
use std::collections::BTreeMap;

/// Milestone crossing.
pub const VIDEO_PROGRESS: &str = "video_progress";
/// Terminal per-session summary.
pub const VIDEO_SESSION_COMPLETE: &str = "video_session_complete";
pub const VIDEO_MUTE_TOGGLE: &str = "video_mute_toggle";
/// First play of the session.
pub const VIDEO_START: &str = "video_start";
/// A play segment opened.
pub const VIDEO_PLAY: &str = "video_play";
/// A play segment closed by a pause.
pub const VIDEO_PAUSE: &str = "video_pause";
/// Playback reached the end.
pub const VIDEO_COMPLETE: &str = "video_complete";
pub const PAGE_VIEW: &str = "page_view";

/// Property keys under which the participant id is stamped on every event.
pub const USER_ID_KEY: &str = "user_id";
pub const PARTICIPANT_ID_KEY: &str = "participant_id";

/// Scalar value of a single event property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl PropertyValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u8> for PropertyValue {
    fn from(value: u8) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Flat, ordered property mapping sent with an event.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Named analytics event with its properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsEvent {
    pub name: String,
    pub properties: Properties,
}

impl AnalyticsEvent {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Properties::new(),
        }
    }

    /// Builder-style property setter.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.to_owned(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

/// Rounds a reported quantity to two decimals.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
