//! Terminal stand-ins for the browser: stdin for the participant prompt,
//! stdout for analytics.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use async_trait::async_trait;
use services::error::{SinkError, TagLoadError};
use services::{AnalyticsSink, ParticipantPrompt, SinkRef, TagLoader};
use watch_core::model::{AnalyticsEvent, ParticipantId};

/// Asks on stderr and reads one line from stdin. EOF counts as cancel.
pub struct StdinPrompt;

impl ParticipantPrompt for StdinPrompt {
    fn ask(&self, message: &str) -> Option<String> {
        eprint!("{message} ");
        let _ = io::stderr().flush();
        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(answer),
        }
    }
}

/// Tag that always loads and prints events as JSON lines.
pub struct StdoutTag;

#[async_trait]
impl TagLoader for StdoutTag {
    async fn load(&self, _participant: Option<&ParticipantId>) -> Result<SinkRef, TagLoadError> {
        Ok(Arc::new(JsonLinesSink))
    }
}

struct JsonLinesSink;

impl AnalyticsSink for JsonLinesSink {
    fn send(&self, event: &AnalyticsEvent) -> Result<(), SinkError> {
        let line = serde_json::to_string(event)?;
        let mut out = io::stdout().lock();
        writeln!(out, "{line}").map_err(|_| SinkError::Closed)
    }
}
