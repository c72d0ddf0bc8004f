//! Participant resolution: URL first, prompt as fallback, never persisted.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use url::Url;
use watch_core::identity::{
    PARTICIPANT_PROMPT, STORED_PARTICIPANT_KEY, participant_from_answer, participant_from_url,
};
use watch_core::model::ParticipantId;

use crate::error::StoreError;

/// Synchronous question to the person viewing the page.
pub trait ParticipantPrompt: Send + Sync {
    /// Returns the raw answer, or `None` if the prompt was cancelled.
    fn ask(&self, message: &str) -> Option<String>;
}

/// Durable key/value store that is only ever cleared.
pub trait IdentifierStore: Send + Sync {
    /// Remove a stored value if present.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be reached.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Prompt with a canned answer.
#[derive(Debug, Clone, Default)]
pub struct FixedPrompt {
    answer: Option<String>,
}

impl FixedPrompt {
    #[must_use]
    pub fn answering(answer: impl Into<String>) -> Self {
        Self {
            answer: Some(answer.into()),
        }
    }

    #[must_use]
    pub fn cancelled() -> Self {
        Self { answer: None }
    }
}

impl ParticipantPrompt for FixedPrompt {
    fn ask(&self, _message: &str) -> Option<String> {
        self.answer.clone()
    }
}

/// In-memory `IdentifierStore`.
#[derive(Debug, Default)]
pub struct MemoryIdentifierStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryIdentifierStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl IdentifierStore for MemoryIdentifierStore {
    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Resolves the participant for this page load.
///
/// The `PROLIFIC_ID` query parameter wins; otherwise the prompt is asked once.
/// A cancelled or blank answer leaves the participant absent.
pub fn resolve_participant(page: &Url, prompt: &dyn ParticipantPrompt) -> Option<ParticipantId> {
    if let Some(id) = participant_from_url(page) {
        tracing::debug!(participant = %id, "participant id from url");
        return Some(id);
    }

    let resolved = participant_from_answer(prompt.ask(PARTICIPANT_PROMPT));
    if resolved.is_none() {
        tracing::debug!("no participant id provided");
    }
    resolved
}

/// Drops any identifier left over from an earlier page load.
pub fn clear_stored_participant(store: &dyn IdentifierStore) {
    if let Err(err) = store.remove(STORED_PARTICIPANT_KEY) {
        tracing::debug!(error = %err, "could not clear stored participant id");
    }
}
