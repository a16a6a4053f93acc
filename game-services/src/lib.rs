//! # Game Services
//!
//! One client contract over interchangeable game service backends:
//! - Leaderboards, achievements, events and cloud saves behind a single trait
//! - Capability discovery through `is_feature_supported`
//! - Connection lifecycle reported to a listener
//! - Single-shot responses for asynchronous calls
//! - Backends: none, in-memory mock, local SQLite, web stats portal
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use game_services::{create_client, ChannelListener, GameServiceConfig, GameServiceFeature, Response};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = GameServiceConfig::load("game_services.yaml")?.with_env_overrides()?;
//!     let client = create_client(&config, tokio::runtime::Handle::current())?;
//!
//!     let (listener, mut events) = ChannelListener::channel();
//!     client.set_listener(listener);
//!     client.connect(true);
//!     println!("Connection: {:?}", events.recv().await);
//!
//!     client.submit_to_leaderboard("HighScore", 4200, None);
//!
//!     if client.is_feature_supported(GameServiceFeature::FetchLeaderboardEntries) {
//!         let (response, rx) = Response::channel();
//!         client.fetch_leaderboard_entries("HighScore", 10, false, response)?;
//!         for entry in rx.await?? {
//!             println!("{}", entry.display());
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod backends;
pub mod client;
pub mod config;
pub mod core;
pub mod error;
pub mod factory;

// Re-export primary types
pub use client::{
    ChannelListener, ConnectionEvent, ConnectionState, GameServiceClient, GameServiceListener,
    Operation, Response,
};
pub use config::{BackendKind, GameServiceConfig, ScoreOrder};
pub use crate::core::{AchievementInfo, GameServiceFeature, LeaderboardEntry};
pub use error::{ErrorKind, GameServiceError, Result};
pub use factory::create_client;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
