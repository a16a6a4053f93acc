use std::sync::Arc;

use crate::client::{
    AchievementsResponse, GameServiceClient, GameServiceListener, GameStatesResponse,
    LeaderboardResponse, LoadResponse, SaveResponse, Session,
};
use crate::core::GameServiceFeature;
use crate::error::{GameServiceError, Result};

/// Client for builds without any game service
///
/// Supports no feature and never connects.
pub struct NoGameServiceClient {
    session: Session,
}

impl NoGameServiceClient {
    pub const GAME_SERVICE_ID: &'static str = "none";

    pub fn new() -> Self {
        Self {
            session: Session::new(Self::GAME_SERVICE_ID),
        }
    }
}

impl Default for NoGameServiceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GameServiceClient for NoGameServiceClient {
    fn game_service_id(&self) -> &str {
        Self::GAME_SERVICE_ID
    }

    fn set_listener(&self, listener: Arc<dyn GameServiceListener>) {
        self.session.set_listener(listener);
    }

    fn resume_session(&self) {}

    fn pause_session(&self) {}

    fn connect(&self, _silent: bool) -> bool {
        // the attempt concludes immediately without a player
        if let Some(attempt) = self.session.begin_connect() {
            self.session.settle_disconnected(attempt);
        }
        false
    }

    fn disconnect(&self) {}

    fn log_off(&self) {
        self.session.report(&GameServiceError::LogoutFailed(
            "No game service available".to_string(),
        ));
    }

    fn player_display_name(&self) -> Option<String> {
        None
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn is_connection_pending(&self) -> bool {
        false
    }

    fn show_leaderboards(&self, leaderboard_id: Option<&str>) -> Result<()> {
        self.ensure_supported(crate::client::leaderboard_ui_feature(leaderboard_id))
    }

    fn show_achievements(&self) -> Result<()> {
        self.ensure_supported(GameServiceFeature::ShowAchievementsUi)
    }

    fn submit_to_leaderboard(&self, _leaderboard_id: &str, _score: i64, _tag: Option<&str>) -> bool {
        false
    }

    fn fetch_leaderboard_entries(
        &self,
        _leaderboard_id: &str,
        _limit: usize,
        _related_to_player: bool,
        response: LeaderboardResponse,
    ) -> Result<bool> {
        response.require(self, GameServiceFeature::FetchLeaderboardEntries)?;
        Ok(false)
    }

    fn submit_event(&self, _event_id: &str, _increment: u32) -> bool {
        false
    }

    fn increment_achievement(&self, _achievement_id: &str, _inc_num: u32, _completion: f32) -> bool {
        false
    }

    fn fetch_achievements(&self, response: AchievementsResponse) -> Result<bool> {
        response.require(self, GameServiceFeature::FetchAchievements)?;
        Ok(false)
    }

    fn save_game_state(
        &self,
        _file_id: &str,
        _game_state: Vec<u8>,
        _progress_value: i64,
        response: SaveResponse,
    ) -> Result<bool> {
        response.require(self, GameServiceFeature::GameStateStorage)?;
        Ok(false)
    }

    fn load_game_state(&self, _file_id: &str, response: LoadResponse) -> Result<bool> {
        response.require(self, GameServiceFeature::GameStateStorage)?;
        Ok(false)
    }

    fn delete_game_state(&self, _file_id: &str, response: SaveResponse) -> Result<bool> {
        response.require(self, GameServiceFeature::GameStateDelete)?;
        Ok(false)
    }

    fn fetch_game_states(&self, response: GameStatesResponse) -> Result<bool> {
        response.require(self, GameServiceFeature::FetchGameStates)?;
        Ok(false)
    }

    fn is_feature_supported(&self, _feature: GameServiceFeature) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChannelListener, ConnectionEvent, Response};
    use crate::error::ErrorKind;

    #[test]
    fn test_connect_never_succeeds() {
        let client = NoGameServiceClient::new();
        let (listener, mut events) = ChannelListener::channel();
        client.set_listener(listener);

        assert!(!client.connect(false));
        assert!(!client.is_connected());
        assert!(!client.is_connection_pending());
        assert_eq!(events.try_recv().unwrap(), ConnectionEvent::Disconnected);
    }

    #[test]
    fn test_everything_unsupported() {
        let client = NoGameServiceClient::new();
        assert!(client.supported_features().is_empty());

        let (response, mut rx) = Response::channel();
        let err = client.fetch_game_states(response).unwrap_err();
        assert!(err.is_not_supported());
        assert!(rx.try_recv().is_err());

        assert!(client.show_achievements().unwrap_err().is_not_supported());
        assert!(client.show_leaderboards(None).unwrap_err().is_not_supported());
        assert!(!client.submit_event("evt", 1));
        assert!(!client.unlock_achievement("ach"));
    }

    #[test]
    fn test_log_off_reports_failure() {
        let client = NoGameServiceClient::new();
        let (listener, mut events) = ChannelListener::channel();
        client.set_listener(listener);

        client.log_off();
        match events.try_recv().unwrap() {
            ConnectionEvent::Error { kind, .. } => assert_eq!(kind, ErrorKind::LogoutFailed),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
