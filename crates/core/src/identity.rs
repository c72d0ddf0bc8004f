//! Participant identifier resolution from the page URL or a prompt answer.

use url::Url;

use crate::model::ParticipantId;

/// Query-string key carrying the participant identifier.
pub const PARTICIPANT_QUERY_KEY: &str = "PROLIFIC_ID";
/// Key of the durable value cleared on every page load.
pub const STORED_PARTICIPANT_KEY: &str = "prolific_id";
/// Question shown when the URL does not carry an identifier.
pub const PARTICIPANT_PROMPT: &str = "Please enter your Participant ID:";

/// Reads the participant identifier from the page URL query.
///
/// The first non-empty `PROLIFIC_ID` value wins; it is used as given.
#[must_use]
pub fn participant_from_url(url: &Url) -> Option<ParticipantId> {
    url.query_pairs()
        .filter(|(key, _)| key == PARTICIPANT_QUERY_KEY)
        .find_map(|(_, value)| ParticipantId::new(value.into_owned()).ok())
}

/// Normalizes a prompt answer. Cancelled or blank answers yield `None`.
#[must_use]
pub fn participant_from_answer(answer: Option<String>) -> Option<ParticipantId> {
    answer.and_then(|raw| ParticipantId::new(raw.trim()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn reads_identifier_from_query() {
        let id = participant_from_url(&url("https://study.example/?PROLIFIC_ID=abc123&x=1"));
        assert_eq!(id.unwrap().as_str(), "abc123");
    }

    #[test]
    fn key_is_case_sensitive_and_blank_is_absent() {
        assert!(participant_from_url(&url("https://study.example/?prolific_id=abc")).is_none());
        assert!(participant_from_url(&url("https://study.example/?PROLIFIC_ID=")).is_none());
        assert!(participant_from_url(&url("https://study.example/")).is_none());
    }

    #[test]
    fn percent_encoded_values_are_decoded() {
        let id = participant_from_url(&url("https://study.example/?PROLIFIC_ID=a%20b"));
        assert_eq!(id.unwrap().as_str(), "a b");
    }

    #[test]
    fn prompt_answers_are_trimmed() {
        assert_eq!(
            participant_from_answer(Some("  p-42 \n".into())).unwrap().as_str(),
            "p-42"
        );
        assert!(participant_from_answer(Some("   ".into())).is_none());
        assert!(participant_from_answer(None).is_none());
    }
}
