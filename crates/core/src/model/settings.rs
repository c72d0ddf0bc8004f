use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::model::event::AnalyticsEvent;
use crate::model::ids::{IdError, StudyId, VideoId};

/// Interval between position samples while the video is playing.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Delay between the muted play command and the unmute command.
pub const DEFAULT_UNMUTE_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_VIDEO_PLATFORM: &str = "youtube";
pub const DEFAULT_COLLECT_ENDPOINT: &str = "https://www.google-analytics.com/mp/collect";
pub const DEFAULT_TAG_URL: &str = "https://www.googletagmanager.com/gtag/js";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error(transparent)]
    Id(#[from] IdError),

    #[error("video platform cannot be empty")]
    EmptyPlatform,

    #[error("poll interval must be > 0")]
    InvalidPollInterval,

    #[error("measurement id cannot be empty")]
    EmptyMeasurementId,

    #[error("invalid {field} URL")]
    InvalidUrl { field: &'static str },
}

//
// ─── SESSION SETTINGS ──────────────────────────────────────────────────────────
//

/// Static descriptors and timings for one watch session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    video_id: VideoId,
    study_id: StudyId,
    video_platform: String,
    poll_interval: Duration,
    unmute_delay: Duration,
}

#[derive(Clone, Debug, Default)]
pub struct SessionSettingsDraft {
    pub video_id: String,
    pub study_id: String,
    pub video_platform: Option<String>,
    pub poll_interval: Option<Duration>,
    pub unmute_delay: Option<Duration>,
}

impl SessionSettingsDraft {
    #[must_use]
    pub fn new(video_id: impl Into<String>, study_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            study_id: study_id.into(),
            ..Self::default()
        }
    }

    /// Validate the draft, filling unset timings with defaults.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if an identifier is blank or the poll interval is zero.
    pub fn validate(self) -> Result<SessionSettings, SettingsError> {
        let video_id = VideoId::new(self.video_id.trim())?;
        let study_id = StudyId::new(self.study_id.trim())?;
        let video_platform = match normalize_optional(self.video_platform) {
            Some(platform) => platform,
            None => DEFAULT_VIDEO_PLATFORM.to_owned(),
        };
        let poll_interval = self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL);
        if poll_interval.is_zero() {
            return Err(SettingsError::InvalidPollInterval);
        }

        Ok(SessionSettings {
            video_id,
            study_id,
            video_platform,
            poll_interval,
            unmute_delay: self.unmute_delay.unwrap_or(DEFAULT_UNMUTE_DELAY),
        })
    }
}

impl SessionSettings {
    #[must_use]
    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    #[must_use]
    pub fn study_id(&self) -> &StudyId {
        &self.study_id
    }

    #[must_use]
    pub fn video_platform(&self) -> &str {
        &self.video_platform
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn unmute_delay(&self) -> Duration {
        self.unmute_delay
    }

    /// Starts an event pre-filled with the static video descriptors.
    #[must_use]
    pub fn event(&self, name: &str) -> AnalyticsEvent {
        AnalyticsEvent::new(name)
            .with("video_id", self.video_id.as_str())
            .with("study_id", self.study_id.as_str())
            .with("video_platform", self.video_platform.as_str())
    }
}

//
// ─── ANALYTICS SETTINGS ────────────────────────────────────────────────────────
//

/// Where and how analytics events are delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalyticsSettings {
    measurement_id: String,
    api_secret: Option<String>,
    collect_endpoint: Url,
    tag_url: Url,
}

#[derive(Clone, Debug, Default)]
pub struct AnalyticsSettingsDraft {
    pub measurement_id: String,
    pub api_secret: Option<String>,
    pub collect_endpoint: Option<String>,
    pub tag_url: Option<String>,
}

impl AnalyticsSettingsDraft {
    /// Validate and normalize the draft.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if the measurement id is blank or a URL does not parse.
    pub fn validate(self) -> Result<AnalyticsSettings, SettingsError> {
        let measurement_id = self.measurement_id.trim().to_owned();
        if measurement_id.is_empty() {
            return Err(SettingsError::EmptyMeasurementId);
        }

        let collect_endpoint = parse_url(
            self.collect_endpoint,
            DEFAULT_COLLECT_ENDPOINT,
            "collect endpoint",
        )?;
        let tag_url = parse_url(self.tag_url, DEFAULT_TAG_URL, "tag")?;

        Ok(AnalyticsSettings {
            measurement_id,
            api_secret: normalize_optional(self.api_secret),
            collect_endpoint,
            tag_url,
        })
    }
}

impl AnalyticsSettings {
    #[must_use]
    pub fn measurement_id(&self) -> &str {
        &self.measurement_id
    }

    #[must_use]
    pub fn api_secret(&self) -> Option<&str> {
        self.api_secret.as_deref()
    }

    /// Collect endpoint with the measurement id and secret applied.
    #[must_use]
    pub fn collect_url(&self) -> Url {
        let mut url = self.collect_endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("measurement_id", &self.measurement_id);
            if let Some(secret) = self.api_secret.as_deref() {
                query.append_pair("api_secret", secret);
            }
        }
        url
    }

    /// Tag bootstrap script URL for this measurement id.
    #[must_use]
    pub fn tag_url(&self) -> Url {
        let mut url = self.tag_url.clone();
        url.query_pairs_mut().append_pair("id", &self.measurement_id);
        url
    }
}

fn parse_url(
    raw: Option<String>,
    default: &str,
    field: &'static str,
) -> Result<Url, SettingsError> {
    let raw = normalize_optional(raw).unwrap_or_else(|| default.to_owned());
    Url::parse(&raw).map_err(|_| SettingsError::InvalidUrl { field })
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_defaults_are_filled_in() {
        let settings = SessionSettingsDraft::new("nyu_youtube_ad", "instagram_study")
            .validate()
            .unwrap();
        assert_eq!(settings.video_id().as_str(), "nyu_youtube_ad");
        assert_eq!(settings.video_platform(), "youtube");
        assert_eq!(settings.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert_eq!(settings.unmute_delay(), DEFAULT_UNMUTE_DELAY);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let draft = SessionSettingsDraft {
            poll_interval: Some(Duration::ZERO),
            ..SessionSettingsDraft::new("v", "s")
        };
        assert_eq!(draft.validate().unwrap_err(), SettingsError::InvalidPollInterval);
    }

    #[test]
    fn blank_video_id_is_rejected() {
        let err = SessionSettingsDraft::new("  ", "s").validate().unwrap_err();
        assert!(matches!(err, SettingsError::Id(_)));
    }

    #[test]
    fn analytics_urls_carry_measurement_id() {
        let settings = AnalyticsSettingsDraft {
            measurement_id: " G-TEST ".into(),
            api_secret: Some("secret".into()),
            ..AnalyticsSettingsDraft::default()
        }
        .validate()
        .unwrap();

        assert_eq!(settings.measurement_id(), "G-TEST");
        assert_eq!(
            settings.collect_url().as_str(),
            "https://www.google-analytics.com/mp/collect?measurement_id=G-TEST&api_secret=secret"
        );
        assert_eq!(
            settings.tag_url().as_str(),
            "https://www.googletagmanager.com/gtag/js?id=G-TEST"
        );
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let err = AnalyticsSettingsDraft {
            measurement_id: "G-TEST".into(),
            collect_endpoint: Some("not a url".into()),
            ..AnalyticsSettingsDraft::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(
            err,
            SettingsError::InvalidUrl {
                field: "collect endpoint"
            }
        );
    }

    #[test]
    fn blank_measurement_id_is_rejected() {
        let err = AnalyticsSettingsDraft::default().validate().unwrap_err();
        assert_eq!(err, SettingsError::EmptyMeasurementId);
    }
}
