use std::sync::Arc;
use tokio::runtime::Handle;

use crate::backends::{LocalGameServiceClient, MockGameServiceClient, NoGameServiceClient, WebStatsClient};
use crate::client::GameServiceClient;
use crate::config::{BackendKind, GameServiceConfig};
use crate::error::Result;

/// Build the client selected by `config.backend`
///
/// Backends that run work in the background spawn it on `runtime`.
pub fn create_client(config: &GameServiceConfig, runtime: Handle) -> Result<Arc<dyn GameServiceClient>> {
    tracing::info!("🎮 Creating {} game service client", config.backend);

    let client: Arc<dyn GameServiceClient> = match config.backend {
        BackendKind::None => Arc::new(NoGameServiceClient::new()),
        BackendKind::Mock => Arc::new(MockGameServiceClient::from_config(
            &config.mock,
            &config.player_id,
            &config.player_name,
            runtime,
        )),
        BackendKind::Local => Arc::new(LocalGameServiceClient::from_config(
            &config.local,
            &config.player_id,
            &config.player_name,
        )?),
        BackendKind::WebStats => Arc::new(WebStatsClient::from_config(&config.web_stats, runtime)?),
    };

    tracing::debug!(
        "{} supports: {:?}",
        client.game_service_id(),
        client.supported_features()
    );
    Ok(client)
}
