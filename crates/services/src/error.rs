//! Shared error types for the services crate.

use thiserror::Error;

use watch_core::model::SettingsError;

/// Errors raised while loading an analytics tag.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TagLoadError {
    #[error("analytics tag is blocked or unavailable")]
    Unavailable,
    #[error("analytics tag request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Errors raised by an analytics sink while handing off an event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SinkError {
    #[error("no async runtime available to deliver events")]
    NoRuntime,
    #[error("sink is closed")]
    Closed,
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by a durable identifier store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("identifier store is unavailable: {0}")]
    Unavailable(String),
}
