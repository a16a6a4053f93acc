pub mod local;
pub mod mock;
pub mod none;
pub mod web_stats;

use std::ops::Range;

use crate::client::Response;
use crate::error::{GameServiceError, Result};

pub use local::LocalGameServiceClient;
pub use mock::MockGameServiceClient;
pub use none::NoGameServiceClient;
pub use web_stats::{HttpStatsTransport, PortalSession, StatsTransport, WebStatsClient};

/// Index range of a leaderboard page
///
/// Without an anchor this is the top `limit` rows. With one, the page is
/// centered on the anchor row and shifted to stay inside the board.
pub(crate) fn leaderboard_window(total: usize, limit: usize, anchor: Option<usize>) -> Range<usize> {
    let len = limit.min(total);
    let start = match anchor {
        Some(pos) => pos.saturating_sub(limit / 2).min(total - len),
        None => 0,
    };
    start..start + len
}

/// Reject an empty game state id before the call is admitted
pub(crate) fn require_file_id<T>(file_id: &str, response: Response<T>) -> Result<Response<T>> {
    if file_id.is_empty() {
        return Err(response.reject(GameServiceError::InvalidArgument(
            "file id is empty".to_string(),
        )));
    }
    Ok(response)
}
