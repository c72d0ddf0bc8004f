use std::collections::BTreeMap;
use std::env;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use tokio::runtime::Handle;
use url::Url;
use watch_core::model::event::PARTICIPANT_ID_KEY;
use watch_core::model::{
    AnalyticsEvent, AnalyticsSettings, AnalyticsSettingsDraft, ParticipantId, Properties,
};

use super::{AnalyticsSink, SinkRef, TagLoader};
use crate::error::{SinkError, TagLoadError};

/// GA4 tag delivered through the Measurement Protocol.
///
/// Loading fetches the gtag bootstrap script, the same request a browser
/// makes, so a blocked or unreachable tag leaves the transport not ready.
#[derive(Clone)]
pub struct MeasurementProtocolTag {
    client: Client,
    settings: AnalyticsSettings,
}

impl MeasurementProtocolTag {
    #[must_use]
    pub fn new(settings: AnalyticsSettings) -> Self {
        Self {
            client: Client::new(),
            settings,
        }
    }

    /// Builds the tag from `WATCH_MEASUREMENT_ID`, `WATCH_API_SECRET`,
    /// `WATCH_COLLECT_ENDPOINT` and `WATCH_TAG_URL`.
    ///
    /// Returns `None` when no measurement id is configured or the settings are invalid.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let draft = AnalyticsSettingsDraft {
            measurement_id: env::var("WATCH_MEASUREMENT_ID").ok()?,
            api_secret: env::var("WATCH_API_SECRET").ok(),
            collect_endpoint: env::var("WATCH_COLLECT_ENDPOINT").ok(),
            tag_url: env::var("WATCH_TAG_URL").ok(),
        };
        draft.validate().ok().map(Self::new)
    }

    #[must_use]
    pub fn settings(&self) -> &AnalyticsSettings {
        &self.settings
    }
}

#[async_trait]
impl TagLoader for MeasurementProtocolTag {
    async fn load(&self, participant: Option<&ParticipantId>) -> Result<SinkRef, TagLoadError> {
        let response = self.client.get(self.settings.tag_url()).send().await?;
        if !response.status().is_success() {
            return Err(TagLoadError::HttpStatus(response.status()));
        }

        let sink = MeasurementProtocolSink {
            client: self.client.clone(),
            collect_url: self.settings.collect_url(),
            client_id: new_client_id(),
            participant: participant.cloned(),
            runtime: Handle::try_current().ok(),
        };
        tracing::debug!(client_id = %sink.client_id, "analytics tag loaded");
        Ok(std::sync::Arc::new(sink))
    }
}

/// Posts each event to the collect endpoint on the current tokio runtime.
pub struct MeasurementProtocolSink {
    client: Client,
    collect_url: Url,
    client_id: String,
    participant: Option<ParticipantId>,
    runtime: Option<Handle>,
}

impl MeasurementProtocolSink {
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    fn payload<'a>(&'a self, event: &'a AnalyticsEvent) -> CollectRequest<'a> {
        let mut user_properties = BTreeMap::new();
        if let Some(participant) = &self.participant {
            user_properties.insert(
                PARTICIPANT_ID_KEY,
                UserProperty {
                    value: participant.as_str(),
                },
            );
        }

        CollectRequest {
            client_id: &self.client_id,
            user_id: self.participant.as_ref().map(ParticipantId::as_str),
            user_properties,
            events: [CollectEvent {
                name: &event.name,
                params: &event.properties,
            }],
        }
    }
}

impl AnalyticsSink for MeasurementProtocolSink {
    fn send(&self, event: &AnalyticsEvent) -> Result<(), SinkError> {
        let body = serde_json::to_vec(&self.payload(event))?;
        let runtime = self.runtime.as_ref().ok_or(SinkError::NoRuntime)?;
        let request = self
            .client
            .post(self.collect_url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        let name = event.name.clone();

        runtime.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => {
                    tracing::debug!(
                        event = %name,
                        status = %response.status(),
                        "collect rejected event"
                    );
                }
                Err(err) => tracing::debug!(event = %name, error = %err, "collect request failed"),
            }
        });
        Ok(())
    }
}

/// GA-style client id: random component plus load timestamp.
fn new_client_id() -> String {
    format!("{}.{}", rand::random::<u32>(), Utc::now().timestamp())
}

#[derive(Debug, Serialize)]
struct CollectRequest<'a> {
    client_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    user_properties: BTreeMap<&'static str, UserProperty<'a>>,
    events: [CollectEvent<'a>; 1],
}

#[derive(Debug, Serialize)]
struct UserProperty<'a> {
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct CollectEvent<'a> {
    name: &'a str,
    params: &'a Properties,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sink(participant: Option<&str>) -> MeasurementProtocolSink {
        MeasurementProtocolSink {
            client: Client::new(),
            collect_url: Url::parse("https://collect.example/mp/collect").unwrap(),
            client_id: "7.1700000000".into(),
            participant: participant.map(|p| ParticipantId::new(p).unwrap()),
            runtime: None,
        }
    }

    #[test]
    fn payload_carries_identity_and_params() {
        let sink = sink(Some("abc123"));
        let event = AnalyticsEvent::new("video_progress")
            .with("milestone_percent", 25_u8)
            .with("current_time", 25.5);

        let body = serde_json::to_value(sink.payload(&event)).unwrap();
        assert_eq!(
            body,
            json!({
                "client_id": "7.1700000000",
                "user_id": "abc123",
                "user_properties": { "participant_id": { "value": "abc123" } },
                "events": [{
                    "name": "video_progress",
                    "params": { "current_time": 25.5, "milestone_percent": 25 }
                }]
            })
        );
    }

    #[test]
    fn payload_without_participant_omits_identity() {
        let body = serde_json::to_value(sink(None).payload(&AnalyticsEvent::new("page_view")))
            .unwrap();
        assert!(body.get("user_id").is_none());
        assert!(body.get("user_properties").is_none());
    }

    #[test]
    fn send_without_runtime_fails_softly() {
        let err = sink(None)
            .send(&AnalyticsEvent::new("page_view"))
            .unwrap_err();
        assert!(matches!(err, SinkError::NoRuntime));
    }

    #[test]
    fn client_ids_have_two_parts() {
        let id = new_client_id();
        let (random, ts) = id.split_once('.').unwrap();
        assert!(random.parse::<u32>().is_ok());
        assert!(ts.parse::<i64>().is_ok());
    }
}
