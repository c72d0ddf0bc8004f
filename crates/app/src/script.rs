//! JSON-lines description of a page visit.
//!
//! One step per line: `{"after_ms": 1500, "action": "pause"}`. `after_ms` is
//! the wait since the previous step. Blank lines and lines starting with `#`
//! are skipped.

use std::io::BufRead;
use std::time::Duration;

use serde::Deserialize;
use services::{Signal, SimulatedPlayer, VideoPlayer};
use thiserror::Error;
use watch_core::model::LifecycleSignal;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script: {0}")]
    Io(#[from] std::io::Error),
    #[error("script line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Something the visitor or the page does.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Ready,
    Gesture,
    Play,
    Pause,
    Seek { to: f64 },
    End,
    ToggleMute,
    Hide,
    Pagehide,
    Unload,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub after_ms: u64,
    #[serde(flatten)]
    pub action: Action,
}

impl Step {
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.after_ms)
    }
}

impl Action {
    /// Signal for the driver, or `None` when the action acts on the player
    /// directly and the player reports back on its own.
    #[must_use]
    pub fn perform(self, player: &SimulatedPlayer) -> Option<Signal> {
        match self {
            Self::Ready => Some(Signal::PlayerReady),
            Self::Gesture => Some(Signal::StartGesture),
            Self::ToggleMute => Some(Signal::MuteToggle),
            Self::Hide => Some(Signal::Lifecycle(LifecycleSignal::VisibilityHidden)),
            Self::Pagehide => Some(Signal::Lifecycle(LifecycleSignal::PageHide)),
            Self::Unload => Some(Signal::Lifecycle(LifecycleSignal::Unload)),
            Self::Play => {
                player.play();
                None
            }
            Self::Pause => {
                player.pause();
                None
            }
            Self::Seek { to } => {
                player.seek(to);
                None
            }
            Self::End => {
                player.finish();
                None
            }
        }
    }
}

/// Parses a whole script.
///
/// # Errors
///
/// Returns `ScriptError` on a read failure or the first malformed line.
pub fn parse(reader: impl BufRead) -> Result<Vec<Step>, ScriptError> {
    let mut steps = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let step = serde_json::from_str(trimmed).map_err(|source| ScriptError::Parse {
            line: index + 1,
            source,
        })?;
        steps.push(step);
    }
    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use watch_core::model::PlayerState;
    use watch_core::time::manual_test_clock;

    #[test]
    fn parses_steps_and_skips_comments() {
        let script = r#"
# visitor opens the page
{"action": "ready"}
{"after_ms": 800, "action": "gesture"}
{"after_ms": 30000, "action": "seek", "to": 12.5}
{"after_ms": 100, "action": "pagehide"}
"#;
        let steps = parse(script.as_bytes()).unwrap();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].after_ms, 0);
        assert_eq!(steps[1].delay(), Duration::from_millis(800));
        assert_eq!(steps[2].action, Action::Seek { to: 12.5 });
        assert_eq!(steps[3].action, Action::Pagehide);
    }

    #[test]
    fn reports_line_of_bad_step() {
        let script = "{\"action\": \"ready\"}\n{\"action\": \"rewind\"}\n";
        let err = parse(script.as_bytes()).unwrap_err();
        assert!(matches!(err, ScriptError::Parse { line: 2, .. }));
    }

    #[test]
    fn player_actions_do_not_produce_signals() {
        let player = SimulatedPlayer::new(30.0, manual_test_clock());
        assert_eq!(Action::Play.perform(&player), None);
        assert_eq!(player.state(), PlayerState::Playing);
        assert_eq!(
            Action::Hide.perform(&player),
            Some(Signal::Lifecycle(LifecycleSignal::VisibilityHidden))
        );
    }
}
