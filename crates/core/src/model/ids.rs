use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error type for building an identifier from a raw string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IdError {
    #[error("{kind} cannot be empty")]
    Empty { kind: &'static str },
}

fn non_empty(raw: impl Into<String>, kind: &'static str) -> Result<String, IdError> {
    let raw = raw.into();
    if raw.trim().is_empty() {
        return Err(IdError::Empty { kind });
    }
    Ok(raw)
}

/// Opaque participant identifier attached to every emitted event.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Creates a `ParticipantId` from a non-blank string.
    ///
    /// The value is stored verbatim; callers decide whether to trim.
    ///
    /// # Errors
    ///
    /// Returns `IdError::Empty` if the value is empty or whitespace only.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        non_empty(raw, "participant id").map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Static identifier of the tracked video.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoId(String);

impl VideoId {
    /// # Errors
    ///
    /// Returns `IdError::Empty` if the value is blank.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        non_empty(raw, "video id").map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Static identifier of the study the page belongs to.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudyId(String);

impl StudyId {
    /// # Errors
    ///
    /// Returns `IdError::Empty` if the value is blank.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdError> {
        non_empty(raw, "study id").map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantId({})", self.0)
    }
}

impl fmt::Debug for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VideoId({})", self.0)
    }
}

impl fmt::Debug for StudyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StudyId({})", self.0)
    }
}

// ─── Display Implementations ───────────────────────────────────────────────────

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for StudyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
