use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

use crate::client::{
    leaderboard_ui_feature, AchievementsResponse, GameServiceClient, GameServiceListener,
    GameStatesResponse, LeaderboardResponse, LoadResponse, SaveResponse, Session,
};
use crate::config::WebStatsConfig;
use crate::core::GameServiceFeature;
use crate::error::{GameServiceError, Result};

/// Player session as reported by the portal
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortalSession {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub guest: bool,
}

impl PortalSession {
    pub fn is_guest(&self) -> bool {
        self.guest || self.username.is_none()
    }
}

/// Bridge to a stats portal
#[async_trait]
pub trait StatsTransport: Send + Sync {
    /// Load the portal API and the current player session
    async fn load_session(&self) -> Result<PortalSession>;

    /// Ask the portal to show its own sign-in dialog
    async fn show_login(&self) -> Result<()>;

    /// Submit a named statistic
    async fn submit_stat(&self, name: &str, value: i64) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct StatRequest {
    value: i64,
}

/// Stats portal reached over HTTP
///
/// `GET {base}/session`, `POST {base}/login`, `POST {base}/stats/{name}`.
pub struct HttpStatsTransport {
    client: Client,
    base_url: String,
}

impl HttpStatsTransport {
    pub fn new(config: &WebStatsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if !response.status().is_success() {
            return Err(GameServiceError::backend(
                WebStatsClient::GAME_SERVICE_ID,
                format!("HTTP {}", response.status()),
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl StatsTransport for HttpStatsTransport {
    async fn load_session(&self) -> Result<PortalSession> {
        let url = format!("{}/session", self.base_url);
        let response = Self::check(self.client.get(&url).send().await?)?;
        Ok(response.json().await?)
    }

    async fn show_login(&self) -> Result<()> {
        let url = format!("{}/login", self.base_url);
        Self::check(self.client.post(&url).send().await?)?;
        Ok(())
    }

    async fn submit_stat(&self, name: &str, value: i64) -> Result<()> {
        let url = format!("{}/stats/{}", self.base_url, urlencoding::encode(name));
        Self::check(self.client.post(&url).json(&StatRequest { value }).send().await?)?;
        Ok(())
    }
}

/// Client for a stats-only web portal
///
/// The portal accepts named statistics and nothing else: leaderboard
/// scores, events and achievement progress are all submitted as stats.
/// Sign-in and sign-out happen in the portal's own interface. A guest
/// session leaves the client disconnected; connecting again non-silently
/// asks the portal to show its login first.
pub struct WebStatsClient {
    session: Session,
    runtime: Handle,
    transport: Arc<dyn StatsTransport>,
    initialized: Arc<AtomicBool>,
}

impl WebStatsClient {
    pub const GAME_SERVICE_ID: &'static str = "web_stats";

    pub fn new(transport: Arc<dyn StatsTransport>, runtime: Handle) -> Self {
        Self {
            session: Session::new(Self::GAME_SERVICE_ID),
            runtime,
            transport,
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(config: &WebStatsConfig, runtime: Handle) -> Result<Self> {
        let transport = HttpStatsTransport::new(config)?;
        Ok(Self::new(Arc::new(transport), runtime))
    }

    /// Portal API loaded at least once
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn submit_stat(&self, name: &str, value: i64) -> bool {
        if !self.session.is_connected() {
            tracing::debug!("web_stats: stat {} rejected, not connected", name);
            return false;
        }

        let transport = Arc::clone(&self.transport);
        let name = name.to_string();
        self.runtime.spawn(async move {
            if let Err(e) = transport.submit_stat(&name, value).await {
                tracing::warn!("web_stats: failed to submit stat {}: {}", name, e);
            }
        });
        true
    }
}

impl GameServiceClient for WebStatsClient {
    fn game_service_id(&self) -> &str {
        Self::GAME_SERVICE_ID
    }

    fn set_listener(&self, listener: Arc<dyn GameServiceListener>) {
        self.session.set_listener(listener);
    }

    fn resume_session(&self) {
        if self.session.take_resume() {
            self.connect(true);
        }
    }

    fn pause_session(&self) {
        self.session.pause();
    }

    fn connect(&self, silent: bool) -> bool {
        let Some(attempt) = self.session.begin_connect() else {
            return self.session.is_connected();
        };

        let session = self.session.clone();
        let transport = Arc::clone(&self.transport);
        let initialized = Arc::clone(&self.initialized);
        let prompt_login = !silent && self.is_initialized();
        self.runtime.spawn(async move {
            if prompt_login {
                if let Err(e) = transport.show_login().await {
                    session.fail_connect(attempt, format!("Could not show portal login: {}", e), Some(e));
                    return;
                }
            }

            match transport.load_session().await {
                Ok(portal) => {
                    initialized.store(true, Ordering::SeqCst);
                    if portal.is_guest() {
                        session.settle_disconnected(attempt);
                    } else {
                        session.complete_connect(attempt, portal.username);
                    }
                }
                Err(e) => {
                    session.fail_connect(attempt, format!("Could not load portal API: {}", e), Some(e));
                }
            }
        });

        self.session.is_connected()
    }

    fn disconnect(&self) {
        self.session.disconnect();
    }

    fn log_off(&self) {
        self.session.report(&GameServiceError::LogoutFailed(
            "Please log out through the portal's interface".to_string(),
        ));
    }

    fn player_display_name(&self) -> Option<String> {
        self.session.player_name()
    }

    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    fn is_connection_pending(&self) -> bool {
        self.session.is_connection_pending()
    }

    fn show_leaderboards(&self, leaderboard_id: Option<&str>) -> Result<()> {
        self.ensure_supported(leaderboard_ui_feature(leaderboard_id))
    }

    fn show_achievements(&self) -> Result<()> {
        self.ensure_supported(GameServiceFeature::ShowAchievementsUi)
    }

    fn submit_to_leaderboard(&self, leaderboard_id: &str, score: i64, _tag: Option<&str>) -> bool {
        self.submit_stat(leaderboard_id, score)
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

    fn submit_event(&self, event_id: &str, increment: u32) -> bool {
        self.submit_stat(event_id, i64::from(increment))
    }

    fn increment_achievement(&self, achievement_id: &str, inc_num: u32, _completion: f32) -> bool {
        self.submit_stat(achievement_id, i64::from(inc_num))
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

    fn is_feature_supported(&self, feature: GameServiceFeature) -> bool {
        feature == GameServiceFeature::SubmitEvents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ChannelListener, ConnectionEvent, Response};
    use crate::error::ErrorKind;
    use std::sync::Mutex;
    use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

    struct RecordingTransport {
        guest: Mutex<bool>,
        fail: bool,
        logins: Mutex<usize>,
        stats: UnboundedSender<(String, i64)>,
    }

    impl RecordingTransport {
        fn new(guest: bool, fail: bool) -> (Arc<Self>, UnboundedReceiver<(String, i64)>) {
            let (stats, rx) = mpsc::unbounded_channel();
            let transport = Arc::new(Self {
                guest: Mutex::new(guest),
                fail,
                logins: Mutex::new(0),
                stats,
            });
            (transport, rx)
        }
    }

    #[async_trait]
    impl StatsTransport for RecordingTransport {
        async fn load_session(&self) -> Result<PortalSession> {
            if self.fail {
                return Err(GameServiceError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "portal unreachable",
                )));
            }
            let guest = *self.guest.lock().unwrap();
            Ok(PortalSession {
                username: (!guest).then(|| "kong_fan".to_string()),
                guest,
            })
        }

        async fn show_login(&self) -> Result<()> {
            *self.logins.lock().unwrap() += 1;
            *self.guest.lock().unwrap() = false;
            Ok(())
        }

        async fn submit_stat(&self, name: &str, value: i64) -> Result<()> {
            self.stats.send((name.to_string(), value)).unwrap();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_connect_and_submit_stats() {
        let (transport, mut stats) = RecordingTransport::new(false, false);
        let client = WebStatsClient::new(transport, Handle::current());
        let (listener, mut events) = ChannelListener::channel();
        client.set_listener(listener);

        assert!(!client.submit_event("coins", 5));

        assert!(!client.connect(true));
        assert_eq!(events.recv().await, Some(ConnectionEvent::Connected));
        assert_eq!(client.player_display_name(), Some("kong_fan".to_string()));

        assert!(client.submit_to_leaderboard("HighScore", 4200, Some("ignored")));
        assert_eq!(stats.recv().await, Some(("HighScore".to_string(), 4200)));

        assert!(client.unlock_achievement("BeatBoss"));
        assert_eq!(stats.recv().await, Some(("BeatBoss".to_string(), 1)));
    }

    #[tokio::test]
    async fn test_guest_then_login_prompt() {
        let (transport, _stats) = RecordingTransport::new(true, false);
        let client = WebStatsClient::new(Arc::clone(&transport) as Arc<dyn StatsTransport>, Handle::current());
        let (listener, mut events) = ChannelListener::channel();
        client.set_listener(listener);

        client.connect(true);
        assert_eq!(events.recv().await, Some(ConnectionEvent::Disconnected));
        assert!(client.is_initialized());
        assert!(!client.is_connected());
        assert!(!client.submit_event("coins", 1));

        client.connect(false);
        assert_eq!(events.recv().await, Some(ConnectionEvent::Connected));
        assert_eq!(*transport.logins.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_portal() {
        let (transport, _stats) = RecordingTransport::new(false, true);
        let client = WebStatsClient::new(transport, Handle::current());
        let (listener, mut events) = ChannelListener::channel();
        client.set_listener(listener);

        client.connect(true);
        match events.recv().await.unwrap() {
            ConnectionEvent::Error { kind, message } => {
                assert_eq!(kind, ErrorKind::LoginFailed);
                assert!(message.contains("portal unreachable"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(!client.is_initialized());
    }

    struct CauseListener {
        causes: UnboundedSender<Option<String>>,
    }

    impl GameServiceListener for CauseListener {
        fn connected(&self) {}

        fn disconnected(&self) {}

        fn error_msg(&self, _kind: ErrorKind, _message: &str, cause: Option<&GameServiceError>) {
            let cause = cause.map(|e| match e {
                GameServiceError::Io(io) => format!("io {:?}: {}", io.kind(), io),
                other => format!("{:?}", other),
            });
            self.causes.send(cause).unwrap();
        }
    }

    #[tokio::test]
    async fn test_login_failure_carries_transport_error() {
        let (transport, _stats) = RecordingTransport::new(false, true);
        let client = WebStatsClient::new(transport, Handle::current());
        let (causes, mut rx) = mpsc::unbounded_channel();
        client.set_listener(Arc::new(CauseListener { causes }));

        client.connect(true);
        let cause = rx.recv().await.unwrap();
        assert_eq!(cause.as_deref(), Some("io ConnectionRefused: portal unreachable"));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_log_off_not_supported_programmatically() {
        let (transport, _stats) = RecordingTransport::new(false, false);
        let client = WebStatsClient::new(transport, Handle::current());
        let (listener, mut events) = ChannelListener::channel();
        client.set_listener(listener);

        client.connect(true);
        assert_eq!(events.recv().await, Some(ConnectionEvent::Connected));

        client.log_off();
        match events.recv().await.unwrap() {
            ConnectionEvent::Error { kind, .. } => assert_eq!(kind, ErrorKind::LogoutFailed),
            other => panic!("unexpected event {:?}", other),
        }
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn test_only_events_supported() {
        let (transport, _stats) = RecordingTransport::new(false, false);
        let client = WebStatsClient::new(transport, Handle::current());
        assert_eq!(client.supported_features(), vec![GameServiceFeature::SubmitEvents]);

        let (response, mut rx) = Response::channel();
        let err = client.fetch_leaderboard_entries("HighScore", 10, false, response).unwrap_err();
        assert!(err.is_not_supported());
        assert!(rx.try_recv().is_err());
        assert!(client.show_leaderboards(Some("HighScore")).unwrap_err().is_not_supported());
    }

    #[tokio::test]
    #[ignore] // Requires a running stats portal
    async fn test_http_transport_session() {
        let transport = HttpStatsTransport::new(&WebStatsConfig::default()).unwrap();
        let session = transport.load_session().await.unwrap();
        assert!(session.username.is_some() || session.guest);
    }
}
