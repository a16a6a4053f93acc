pub mod achievement;
pub mod feature;
pub mod leaderboard_entry;

pub use achievement::AchievementInfo;
pub use feature::GameServiceFeature;
pub use leaderboard_entry::LeaderboardEntry;
