pub mod listener;
pub mod response;
pub mod session;

use std::sync::Arc;

use crate::core::{AchievementInfo, GameServiceFeature, LeaderboardEntry};
use crate::error::{GameServiceError, Result};

pub use listener::{ChannelListener, ConnectionEvent, GameServiceListener};
pub use response::Response;
pub use session::{ConnectAttempt, ConnectionState, InFlight, Operation, Session};

/// Response carrying leaderboard entries in backend order
pub type LeaderboardResponse = Response<Vec<LeaderboardEntry>>;
/// Response carrying achievements in backend order
pub type AchievementsResponse = Response<Vec<AchievementInfo>>;
/// Response completed once a game state write or delete is persisted
pub type SaveResponse = Response<()>;
/// Response carrying a loaded game state payload
pub type LoadResponse = Response<Vec<u8>>;
/// Response carrying saved game state identifiers
pub type GameStatesResponse = Response<Vec<String>>;

/// Contract every game service backend implements
///
/// Optional features are discoverable through [`is_feature_supported`].
/// Calling an unsupported feature returns [`GameServiceError::NotSupported`]
/// synchronously, before any side effect, and its response never fires.
///
/// Asynchronous calls return `Ok(true)` once accepted. `Ok(false)` means the
/// call was rejected (not connected, or a call of the same kind is still
/// pending); the response then receives the reason. Every accepted or
/// rejected call answers its response exactly once.
///
/// Fire-and-forget calls return `true` when accepted for submission. That
/// does not confirm the backend persisted anything.
///
/// [`is_feature_supported`]: GameServiceClient::is_feature_supported
pub trait GameServiceClient: Send + Sync {
    /// Stable backend identifier
    fn game_service_id(&self) -> &str;

    fn set_listener(&self, listener: Arc<dyn GameServiceListener>);

    /// Host came back to the foreground
    fn resume_session(&self);

    /// Host went to the background
    fn pause_session(&self);

    /// Start connecting. Returns the current connected status; the outcome
    /// of the attempt is delivered through the listener.
    ///
    /// Does not start a second attempt while one is pending. With
    /// `silent == false` a backend may show its own login prompt.
    fn connect(&self, silent: bool) -> bool;

    fn disconnect(&self);

    /// Sign the player out. Backends without programmatic sign-out report
    /// `LogoutFailed` through the listener.
    fn log_off(&self);

    /// `None` when not connected or signed in as guest
    fn player_display_name(&self) -> Option<String>;

    fn is_connected(&self) -> bool;

    fn is_connection_pending(&self) -> bool;

    /// Show the backend's native leaderboard UI; `None` shows all leaderboards
    fn show_leaderboards(&self, leaderboard_id: Option<&str>) -> Result<()>;

    fn show_achievements(&self) -> Result<()>;

    fn submit_to_leaderboard(&self, leaderboard_id: &str, score: i64, tag: Option<&str>) -> bool;

    /// Fetch at most `limit` entries, either the top of the board or the
    /// window around the current player
    fn fetch_leaderboard_entries(
        &self,
        leaderboard_id: &str,
        limit: usize,
        related_to_player: bool,
        response: LeaderboardResponse,
    ) -> Result<bool>;

    fn submit_event(&self, event_id: &str, increment: u32) -> bool;

    /// Unlocking is incrementing to full completion
    fn unlock_achievement(&self, achievement_id: &str) -> bool {
        self.increment_achievement(achievement_id, 1, 1.0)
    }

    fn increment_achievement(&self, achievement_id: &str, inc_num: u32, completion_percentage: f32) -> bool;

    fn fetch_achievements(&self, response: AchievementsResponse) -> Result<bool>;

    fn save_game_state(
        &self,
        file_id: &str,
        game_state: Vec<u8>,
        progress_value: i64,
        response: SaveResponse,
    ) -> Result<bool>;

    fn load_game_state(&self, file_id: &str, response: LoadResponse) -> Result<bool>;

    fn delete_game_state(&self, file_id: &str, response: SaveResponse) -> Result<bool>;

    fn fetch_game_states(&self, response: GameStatesResponse) -> Result<bool>;

    /// Pure capability query
    fn is_feature_supported(&self, feature: GameServiceFeature) -> bool;

    fn ensure_supported(&self, feature: GameServiceFeature) -> Result<()> {
        if self.is_feature_supported(feature) {
            Ok(())
        } else {
            Err(GameServiceError::not_supported(self.game_service_id(), feature))
        }
    }

    /// All features this backend supports
    fn supported_features(&self) -> Vec<GameServiceFeature> {
        GameServiceFeature::ALL
            .iter()
            .copied()
            .filter(|f| self.is_feature_supported(*f))
            .collect()
    }
}

/// Feature gating `show_leaderboards` for the given argument
pub(crate) fn leaderboard_ui_feature(leaderboard_id: Option<&str>) -> GameServiceFeature {
    match leaderboard_id {
        Some(_) => GameServiceFeature::ShowLeaderboardUi,
        None => GameServiceFeature::ShowAllLeaderboardsUi,
    }
}
