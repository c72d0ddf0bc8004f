//! Analytics delivery: the tag that has to load before anything is sent, and
//! the sink it yields.

use std::sync::Arc;

use async_trait::async_trait;
use watch_core::model::{AnalyticsEvent, ParticipantId};

use crate::error::{SinkError, TagLoadError};

mod measurement;
mod memory;

pub use measurement::{MeasurementProtocolSink, MeasurementProtocolTag};
pub use memory::{FailingTag, RecordingSink, RecordingTag};

/// Write-only destination for analytics events. Fire-and-forget.
pub trait AnalyticsSink: Send + Sync {
    /// Hand one event to the delivery mechanism.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if the event could not even be handed off.
    fn send(&self, event: &AnalyticsEvent) -> Result<(), SinkError>;
}

pub type SinkRef = Arc<dyn AnalyticsSink>;

/// Asynchronously loaded analytics tag.
#[async_trait]
pub trait TagLoader: Send + Sync {
    /// Load the tag and configure it for the resolved participant.
    ///
    /// # Errors
    ///
    /// Returns `TagLoadError` if the tag is blocked, unreachable or misconfigured.
    async fn load(&self, participant: Option<&ParticipantId>) -> Result<SinkRef, TagLoadError>;
}
