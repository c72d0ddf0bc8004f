use std::sync::Arc;

use watch_core::model::{PlayerCommand, PlayerState};

/// Command and query surface of the embedded video player.
///
/// State-change and ready notifications travel separately, as
/// `driver::Signal`s.
pub trait VideoPlayer: Send + Sync {
    /// Current playback position in seconds.
    fn current_time(&self) -> f64;
    /// Total duration in seconds; 0 while unknown.
    fn duration(&self) -> f64;
    fn state(&self) -> PlayerState;
    fn play(&self);
    fn pause(&self);
    fn mute(&self);
    fn unmute(&self);
    fn is_muted(&self) -> bool;
}

pub type PlayerRef = Arc<dyn VideoPlayer>;

/// Carries out a tracker command on the player.
pub fn apply_command(player: &dyn VideoPlayer, command: PlayerCommand) {
    match command {
        PlayerCommand::Play => player.play(),
        PlayerCommand::Pause => player.pause(),
        PlayerCommand::Mute => player.mute(),
        PlayerCommand::Unmute => player.unmute(),
    }
}
