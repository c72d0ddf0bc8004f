//! Page load: identity resolution and the analytics connection that follows.

use std::sync::Arc;

use url::Url;
use watch_core::model::ParticipantId;

use crate::analytics::TagLoader;
use crate::identity::{
    IdentifierStore, ParticipantPrompt, clear_stored_participant, resolve_participant,
};
use crate::transport::{Transport, TransportRef};

/// What a page view sets up before any video is watched.
#[derive(Clone)]
pub struct PageBootstrap {
    url: Url,
    title: String,
    transport: TransportRef,
}

impl PageBootstrap {
    /// Clears the stored identifier, resolves the participant and builds a
    /// transport that is not ready yet.
    #[must_use]
    pub fn load(
        url: Url,
        title: impl Into<String>,
        prompt: &dyn ParticipantPrompt,
        store: &dyn IdentifierStore,
    ) -> Self {
        clear_stored_participant(store);
        let participant = resolve_participant(&url, prompt);
        Self {
            url,
            title: title.into(),
            transport: Arc::new(Transport::new(participant)),
        }
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    #[must_use]
    pub fn participant(&self) -> Option<&ParticipantId> {
        self.transport.participant()
    }

    #[must_use]
    pub fn transport(&self) -> TransportRef {
        Arc::clone(&self.transport)
    }

    /// Loads the tag and records the page view once it is ready.
    pub async fn connect_analytics(&self, tag: &dyn TagLoader) {
        self.transport.initialize(tag).await;
        if self.transport.is_ready() {
            tracing::info!(page = %self.url.path(), "analytics connected");
            self.transport
                .track_page_view(&self.title, self.url.as_str(), self.url.path());
        }
    }
}
