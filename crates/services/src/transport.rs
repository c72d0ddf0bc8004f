//! Identity-stamping front of the analytics tag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use watch_core::model::event::{PAGE_VIEW, PARTICIPANT_ID_KEY, USER_ID_KEY};
use watch_core::model::{AnalyticsEvent, ParticipantId};

use crate::analytics::{SinkRef, TagLoader};

/// Single `track` primitive shared by everything on the page.
///
/// Starts not ready. `initialize` makes it ready once the tag loads; a failed
/// load keeps it not ready for the rest of the page view. Only the first
/// `initialize` call loads anything. Nothing here ever returns an error to
/// the caller.
pub struct Transport {
    participant: Option<ParticipantId>,
    load_attempted: AtomicBool,
    sink: OnceLock<SinkRef>,
}

pub type TransportRef = Arc<Transport>;

impl Transport {
    #[must_use]
    pub fn new(participant: Option<ParticipantId>) -> Self {
        Self {
            participant,
            load_attempted: AtomicBool::new(false),
            sink: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn participant(&self) -> Option<&ParticipantId> {
        self.participant.as_ref()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.sink.get().is_some()
    }

    /// Load the analytics tag once. Failures are logged and otherwise ignored;
    /// later calls do nothing, whatever the first outcome was.
    pub async fn initialize(&self, tag: &dyn TagLoader) {
        if self.load_attempted.swap(true, Ordering::SeqCst) {
            tracing::debug!("analytics tag already attempted; not loading again");
            return;
        }
        match tag.load(self.participant.as_ref()).await {
            Ok(sink) => {
                if self.sink.set(sink).is_err() {
                    tracing::debug!("analytics tag loaded twice; keeping the first sink");
                }
            }
            Err(err) => tracing::debug!(error = %err, "analytics tag failed to load"),
        }
    }

    /// Send an event stamped with the participant id. No-op until ready.
    pub fn track(&self, event: AnalyticsEvent) {
        let Some(sink) = self.sink.get() else {
            return;
        };

        let mut event = event;
        if let Some(participant) = &self.participant {
            event = event
                .with(USER_ID_KEY, participant.as_str())
                .with(PARTICIPANT_ID_KEY, participant.as_str());
        }

        if let Err(err) = sink.send(&event) {
            tracing::debug!(event = %event.name, error = %err, "analytics event dropped");
        }
    }

    pub fn track_page_view(&self, title: &str, location: &str, path: &str) {
        self.track(
            AnalyticsEvent::new(PAGE_VIEW)
                .with("page_title", title)
                .with("page_location", location)
                .with("page_path", path),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{AnalyticsSink, FailingTag, RecordingTag};
    use crate::error::SinkError;
    use async_trait::async_trait;
    use watch_core::model::PropertyValue;

    struct RejectingSink;

    impl AnalyticsSink for RejectingSink {
        fn send(&self, _event: &AnalyticsEvent) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }
    }

    struct RejectingTag;

    #[async_trait]
    impl TagLoader for RejectingTag {
        async fn load(
            &self,
            _participant: Option<&ParticipantId>,
        ) -> Result<SinkRef, crate::error::TagLoadError> {
            Ok(Arc::new(RejectingSink))
        }
    }

    fn participant() -> Option<ParticipantId> {
        Some(ParticipantId::new("abc123").unwrap())
    }

    #[tokio::test]
    async fn track_is_silent_before_initialize() {
        let tag = RecordingTag::new();
        let transport = Transport::new(participant());
        transport.track(AnalyticsEvent::new("video_progress"));

        assert!(!transport.is_ready());
        assert!(tag.sink().is_empty());
    }

    #[tokio::test]
    async fn events_are_stamped_under_both_keys() {
        let tag = RecordingTag::new();
        let transport = Transport::new(participant());
        transport.initialize(&tag).await;

        transport.track(AnalyticsEvent::new("video_progress").with("milestone_percent", 25_u8));

        let events = tag.sink().events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].get("user_id").and_then(PropertyValue::as_str),
            Some("abc123")
        );
        assert_eq!(
            events[0].get("participant_id").and_then(PropertyValue::as_str),
            Some("abc123")
        );
    }

    #[tokio::test]
    async fn missing_participant_sends_without_identity() {
        let tag = RecordingTag::new();
        let transport = Transport::new(None);
        transport.initialize(&tag).await;

        transport.track_page_view("Study", "https://study.example/watch", "/watch");

        let events = tag.sink().events();
        assert_eq!(events[0].name, PAGE_VIEW);
        assert!(events[0].get("user_id").is_none());
        assert!(events[0].get("participant_id").is_none());
        assert_eq!(
            events[0].get("page_path").and_then(PropertyValue::as_str),
            Some("/watch")
        );
    }

    #[tokio::test]
    async fn failed_load_stays_not_ready() {
        let tag = FailingTag::new();
        let transport = Transport::new(participant());
        transport.initialize(&tag).await;
        transport.track(AnalyticsEvent::new("video_progress"));

        assert!(!transport.is_ready());
        assert_eq!(tag.attempts(), 1);
    }

    #[tokio::test]
    async fn failed_load_is_not_retried() {
        let failing = FailingTag::new();
        let working = RecordingTag::new();
        let transport = Transport::new(participant());

        transport.initialize(&failing).await;
        transport.initialize(&working).await;
        transport.track(AnalyticsEvent::new("video_progress"));

        assert!(!transport.is_ready());
        assert!(working.sink().is_empty());
        assert_eq!(failing.attempts(), 1);
    }

    #[tokio::test]
    async fn second_initialize_keeps_the_first_sink() {
        let first = RecordingTag::new();
        let second = RecordingTag::new();
        let transport = Transport::new(None);

        transport.initialize(&first).await;
        transport.initialize(&second).await;
        transport.track(AnalyticsEvent::new("video_progress"));

        assert_eq!(first.sink().len(), 1);
        assert!(second.sink().is_empty());
    }

    #[tokio::test]
    async fn sink_errors_are_swallowed() {
        let transport = Transport::new(None);
        transport.initialize(&RejectingTag).await;
        assert!(transport.is_ready());
        transport.track(AnalyticsEvent::new("video_progress"));
    }
}
