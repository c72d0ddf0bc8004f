use serde::{Deserialize, Serialize};

//
// ─── PLAYER STATE ─────────────────────────────────────────────────────────────
//

/// Playback state reported by the embedded video player.
///
/// Codes follow the YouTube iframe API. Only `Playing`, `Paused` and `Ended`
/// drive accounting; every other state is observed and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
    /// A code the player API does not document.
    Unknown(i32),
}

impl PlayerState {
    /// Maps a raw player state code to a `PlayerState`.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::Unstarted,
            0 => Self::Ended,
            1 => Self::Playing,
            2 => Self::Paused,
            3 => Self::Buffering,
            5 => Self::Cued,
            other => Self::Unknown(other),
        }
    }

    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::Unstarted => -1,
            Self::Ended => 0,
            Self::Playing => 1,
            Self::Paused => 2,
            Self::Buffering => 3,
            Self::Cued => 5,
            Self::Unknown(code) => code,
        }
    }

    #[must_use]
    pub fn is_playing(self) -> bool {
        matches!(self, Self::Playing)
    }
}

//
// ─── COMMANDS ─────────────────────────────────────────────────────────────────
//

/// Command issued by the tracker to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    Play,
    Pause,
    Mute,
    Unmute,
}

//
// ─── PAGE LIFECYCLE ───────────────────────────────────────────────────────────
//

/// Page-lifecycle signal that ends the watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleSignal {
    VisibilityHidden,
    PageHide,
    Unload,
}

impl LifecycleSignal {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VisibilityHidden => "visibility_hidden",
            Self::PageHide => "pagehide",
            Self::Unload => "unload",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_codes_map_both_ways() {
        for code in [-1, 0, 1, 2, 3, 5] {
            assert_eq!(PlayerState::from_code(code).code(), code);
        }
        assert_eq!(PlayerState::from_code(1), PlayerState::Playing);
        assert_eq!(PlayerState::from_code(0), PlayerState::Ended);
    }

    #[test]
    fn undocumented_code_is_unknown() {
        assert_eq!(PlayerState::from_code(42), PlayerState::Unknown(42));
        assert!(!PlayerState::from_code(42).is_playing());
    }
}
