use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Optional capabilities a backend may or may not provide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameServiceFeature {
    SubmitEvents,
    FetchAchievements,
    FetchLeaderboardEntries,
    ShowAchievementsUi,
    /// Native UI for a single leaderboard
    ShowLeaderboardUi,
    /// Native UI listing every leaderboard
    ShowAllLeaderboardsUi,
    /// Saving and loading game state
    GameStateStorage,
    /// More than one save slot
    GameStateMultipleFiles,
    GameStateDelete,
    FetchGameStates,
    PlayerLogOut,
}

impl GameServiceFeature {
    pub const ALL: [GameServiceFeature; 11] = [
        GameServiceFeature::SubmitEvents,
        GameServiceFeature::FetchAchievements,
        GameServiceFeature::FetchLeaderboardEntries,
        GameServiceFeature::ShowAchievementsUi,
        GameServiceFeature::ShowLeaderboardUi,
        GameServiceFeature::ShowAllLeaderboardsUi,
        GameServiceFeature::GameStateStorage,
        GameServiceFeature::GameStateMultipleFiles,
        GameServiceFeature::GameStateDelete,
        GameServiceFeature::FetchGameStates,
        GameServiceFeature::PlayerLogOut,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameServiceFeature::SubmitEvents => "submit_events",
            GameServiceFeature::FetchAchievements => "fetch_achievements",
            GameServiceFeature::FetchLeaderboardEntries => "fetch_leaderboard_entries",
            GameServiceFeature::ShowAchievementsUi => "show_achievements_ui",
            GameServiceFeature::ShowLeaderboardUi => "show_leaderboard_ui",
            GameServiceFeature::ShowAllLeaderboardsUi => "show_all_leaderboards_ui",
            GameServiceFeature::GameStateStorage => "game_state_storage",
            GameServiceFeature::GameStateMultipleFiles => "game_state_multiple_files",
            GameServiceFeature::GameStateDelete => "game_state_delete",
            GameServiceFeature::FetchGameStates => "fetch_game_states",
            GameServiceFeature::PlayerLogOut => "player_log_out",
        }
    }
}

impl fmt::Display for GameServiceFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameServiceFeature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        GameServiceFeature::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == normalized)
            .ok_or_else(|| format!("Unknown game service feature: {}", s))
    }
}
