use serde::{Deserialize, Serialize};

/// Leaderboard entry data
///
/// `sort_value` is the raw score used for ranking. Whether higher or lower
/// values rank first is up to the backend and not expressed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    formatted_value: String,
    sort_value: i64,

    #[serde(default)]
    score_tag: Option<String>,

    #[serde(default)]
    user_display_name: String,

    /// `None` for guest users
    #[serde(default)]
    user_id: Option<String>,

    /// 1-based position, `None` if the backend could not compute it
    #[serde(default)]
    score_rank: Option<u32>,
}

impl LeaderboardEntry {
    /// Create a new entry with the required score fields
    pub fn new(formatted_value: impl Into<String>, sort_value: i64) -> Self {
        Self {
            formatted_value: formatted_value.into(),
            sort_value,
            score_tag: None,
            user_display_name: String::new(),
            user_id: None,
            score_rank: None,
        }
    }

    /// Attach the submitting user. Pass `None` as id for guests.
    pub fn with_user(mut self, display_name: impl Into<String>, user_id: Option<String>) -> Self {
        self.user_display_name = display_name.into();
        self.user_id = user_id;
        self
    }

    pub fn with_score_tag(mut self, tag: Option<String>) -> Self {
        self.score_tag = tag;
        self
    }

    pub fn with_rank(mut self, rank: u32) -> Self {
        self.score_rank = Some(rank);
        self
    }

    pub fn formatted_value(&self) -> &str {
        &self.formatted_value
    }

    pub fn sort_value(&self) -> i64 {
        self.sort_value
    }

    pub fn score_tag(&self) -> Option<&str> {
        self.score_tag.as_deref()
    }

    pub fn user_display_name(&self) -> &str {
        &self.user_display_name
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn score_rank(&self) -> Option<u32> {
        self.score_rank
    }

    /// Entry submitted by an anonymous player
    pub fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }

    /// Get display string for logging
    pub fn display(&self) -> String {
        let rank = self
            .score_rank
            .map(|r| format!("#{}", r))
            .unwrap_or_else(|| "#?".to_string());
        let name = if self.user_display_name.is_empty() {
            "guest"
        } else {
            &self.user_display_name
        };
        format!("{} {} - {}", rank, name, self.formatted_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_creation() {
        let entry = LeaderboardEntry::new("1,200 pts", 1200)
            .with_user("Alice", Some("player-1".to_string()))
            .with_score_tag(Some("replay:42".to_string()))
            .with_rank(3);

        assert_eq!(entry.formatted_value(), "1,200 pts");
        assert_eq!(entry.sort_value(), 1200);
        assert_eq!(entry.score_tag(), Some("replay:42"));
        assert_eq!(entry.user_display_name(), "Alice");
        assert_eq!(entry.user_id(), Some("player-1"));
        assert_eq!(entry.score_rank(), Some(3));
        assert!(!entry.is_guest());
    }

    #[test]
    fn test_guest_entry() {
        let entry = LeaderboardEntry::new("50", 50).with_user("Anonymous", None);
        assert!(entry.is_guest());
        assert_eq!(entry.score_rank(), None);
        assert_eq!(entry.display(), "#? Anonymous - 50");
    }

    #[test]
    fn test_deserialize_defaults() {
        let entry: LeaderboardEntry =
            serde_json::from_str(r#"{"formatted_value":"10","sort_value":10}"#).unwrap();
        assert!(entry.is_guest());
        assert_eq!(entry.score_tag(), None);
        assert_eq!(entry.user_display_name(), "");
    }
}
