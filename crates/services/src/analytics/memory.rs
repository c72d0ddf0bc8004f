use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use watch_core::model::{AnalyticsEvent, ParticipantId};

use super::{AnalyticsSink, SinkRef, TagLoader};
use crate::error::{SinkError, TagLoadError};

/// Sink that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events with the given name, in emission order.
    #[must_use]
    pub fn named(&self, name: &str) -> Vec<AnalyticsEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.name == name)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AnalyticsSink for RecordingSink {
    fn send(&self, event: &AnalyticsEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}

/// Tag that always loads and hands out a shared `RecordingSink`.
#[derive(Debug, Default, Clone)]
pub struct RecordingTag {
    sink: Arc<RecordingSink>,
}

impl RecordingTag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn sink(&self) -> Arc<RecordingSink> {
        Arc::clone(&self.sink)
    }
}

#[async_trait]
impl TagLoader for RecordingTag {
    async fn load(&self, _participant: Option<&ParticipantId>) -> Result<SinkRef, TagLoadError> {
        Ok(self.sink.clone())
    }
}

/// Tag that never loads, as when a content blocker drops the script.
#[derive(Debug, Default)]
pub struct FailingTag {
    attempts: AtomicUsize,
}

impl FailingTag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TagLoader for FailingTag {
    async fn load(&self, _participant: Option<&ParticipantId>) -> Result<SinkRef, TagLoadError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(TagLoadError::Unavailable)
    }
}
