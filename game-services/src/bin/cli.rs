use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use game_services::{
    create_client, BackendKind, ChannelListener, ConnectionEvent, GameServiceClient,
    GameServiceConfig, GameServiceFeature, Response,
};

#[derive(Parser)]
#[command(name = "game-services-cli")]
#[command(about = "Game services client CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend override (none, mock, local, web_stats)
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// How long to wait for the backend
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and show the player
    Status,

    /// List supported features
    Features,

    /// Submit a leaderboard score
    Submit {
        leaderboard: String,
        score: i64,
        #[arg(short, long)]
        tag: Option<String>,
    },

    /// Show leaderboard entries
    Leaderboard {
        leaderboard: String,
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Entries around the current player instead of the top
        #[arg(long)]
        around_player: bool,
    },

    /// List achievements
    Achievements,

    /// Unlock an achievement
    Unlock { achievement: String },

    /// Add progress to an incremental achievement
    Increment {
        achievement: String,
        #[arg(short, long, default_value = "1")]
        steps: u32,
        /// Completion after this increment, 0.0 to 1.0
        completion: f32,
    },

    /// Submit an event
    Event {
        event: String,
        #[arg(short, long, default_value = "1")]
        increment: u32,
    },

    /// Save a game state
    Save {
        file_id: String,
        data: String,
        #[arg(short, long, default_value = "0")]
        progress: i64,
    },

    /// Load a game state
    Load { file_id: String },

    /// Delete a game state
    Delete { file_id: String },

    /// List saved game states
    States,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => GameServiceConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => GameServiceConfig::default(),
    }
    .with_env_overrides()?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let timeout = Duration::from_millis(cli.timeout_ms);
    let client = create_client(&config, tokio::runtime::Handle::current())?;

    match cli.command {
        Commands::Status => {
            let connected = connect(&client, timeout).await?;
            println!("🎮 Backend: {}", client.game_service_id());
            println!("   Connected: {}", connected);
            println!(
                "   Player: {}",
                client.player_display_name().unwrap_or_else(|| "N/A".to_string())
            );
        }

        Commands::Features => {
            println!("📋 Features of {}:", client.game_service_id());
            for feature in GameServiceFeature::ALL {
                let mark = if client.is_feature_supported(feature) { "✅" } else { "❌" };
                println!("   {} {}", mark, feature);
            }
        }

        Commands::Submit { leaderboard, score, tag } => {
            require_connection(&client, timeout).await?;
            if !client.submit_to_leaderboard(&leaderboard, score, tag.as_deref()) {
                bail!("Score was not accepted");
            }
            settle(&client, timeout).await;
            println!("✅ Submitted {} to {}", score, leaderboard);
        }

        Commands::Leaderboard { leaderboard, limit, around_player } => {
            require_connection(&client, timeout).await?;
            let (response, rx) = Response::channel();
            client.fetch_leaderboard_entries(&leaderboard, limit, around_player, response)?;
            let entries = wait(rx, timeout).await?;

            println!("🏆 {} ({} entries):", leaderboard, entries.len());
            for entry in &entries {
                println!("   {}", entry.display());
            }
        }

        Commands::Achievements => {
            require_connection(&client, timeout).await?;
            let (response, rx) = Response::channel();
            client.fetch_achievements(response)?;
            let achievements = wait(rx, timeout).await?;

            println!("🏅 Achievements ({}):", achievements.len());
            for achievement in &achievements {
                println!("   {}", achievement.display_name());
            }
        }

        Commands::Unlock { achievement } => {
            require_connection(&client, timeout).await?;
            if !client.unlock_achievement(&achievement) {
                bail!("Unlock was not accepted");
            }
            settle(&client, timeout).await;
            println!("✅ Unlocked {}", achievement);
        }

        Commands::Increment { achievement, steps, completion } => {
            require_connection(&client, timeout).await?;
            if !client.increment_achievement(&achievement, steps, completion) {
                bail!("Increment was not accepted");
            }
            settle(&client, timeout).await;
            println!("✅ {} now at {:.0}%", achievement, completion.clamp(0.0, 1.0) * 100.0);
        }

        Commands::Event { event, increment } => {
            require_connection(&client, timeout).await?;
            if !client.submit_event(&event, increment) {
                bail!("Event was not accepted");
            }
            settle(&client, timeout).await;
            println!("✅ Event {} +{}", event, increment);
        }

        Commands::Save { file_id, data, progress } => {
            require_connection(&client, timeout).await?;
            let (response, rx) = Response::channel();
            client.save_game_state(&file_id, data.into_bytes(), progress, response)?;
            wait(rx, timeout).await?;
            println!("💾 Saved {}", file_id);
        }

        Commands::Load { file_id } => {
            require_connection(&client, timeout).await?;
            let (response, rx) = Response::channel();
            client.load_game_state(&file_id, response)?;
            let data = wait(rx, timeout).await?;
            println!("📂 {} ({} bytes):", file_id, data.len());
            println!("{}", String::from_utf8_lossy(&data));
        }

        Commands::Delete { file_id } => {
            require_connection(&client, timeout).await?;
            let (response, rx) = Response::channel();
            client.delete_game_state(&file_id, response)?;
            wait(rx, timeout).await?;
            println!("🗑️  Deleted {}", file_id);
        }

        Commands::States => {
            require_connection(&client, timeout).await?;
            let (response, rx) = Response::channel();
            client.fetch_game_states(response)?;
            let states = wait(rx, timeout).await?;

            println!("📂 Game states ({}):", states.len());
            for file_id in &states {
                println!("   {}", file_id);
            }
        }
    }

    Ok(())
}

/// Connect silently and wait for the listener's verdict
async fn connect(client: &Arc<dyn GameServiceClient>, timeout: Duration) -> anyhow::Result<bool> {
    let (listener, mut events) = ChannelListener::channel();
    client.set_listener(listener);
    client.connect(true);

    match tokio::time::timeout(timeout, events.recv()).await {
        Ok(Some(ConnectionEvent::Connected)) => Ok(true),
        Ok(Some(ConnectionEvent::Disconnected)) => Ok(false),
        Ok(Some(ConnectionEvent::Error { kind, message })) => Err(anyhow!("{:?}: {}", kind, message)),
        Ok(None) => Ok(client.is_connected()),
        Err(_) => bail!("Timed out connecting to {}", client.game_service_id()),
    }
}

async fn require_connection(client: &Arc<dyn GameServiceClient>, timeout: Duration) -> anyhow::Result<()> {
    if !connect(client, timeout).await? {
        bail!("{} has no signed-in player", client.game_service_id());
    }
    Ok(())
}

async fn wait<T>(
    rx: oneshot::Receiver<game_services::Result<T>>,
    timeout: Duration,
) -> anyhow::Result<T> {
    let result = tokio::time::timeout(timeout, rx)
        .await
        .context("Timed out waiting for the backend")?
        .context("Backend dropped the request")?;
    Ok(result?)
}

/// Give fire-and-forget submissions time to reach the backend before exit
async fn settle(client: &Arc<dyn GameServiceClient>, timeout: Duration) {
    if client.is_feature_supported(GameServiceFeature::FetchGameStates) {
        // queued behind the submission
        let (response, rx) = Response::channel();
        if let Ok(true) = client.fetch_game_states(response) {
            let _ = wait(rx, timeout).await;
            return;
        }
    }
    tokio::time::sleep(timeout.min(Duration::from_millis(500))).await;
}
