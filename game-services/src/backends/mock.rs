use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;

use crate::backends::{leaderboard_window, require_file_id};
use crate::client::{
    leaderboard_ui_feature, AchievementsResponse, GameServiceClient, GameServiceListener,
    GameStatesResponse, InFlight, LeaderboardResponse, LoadResponse, Operation, Response,
    SaveResponse, Session,
};
use crate::config::MockConfig;
use crate::core::{AchievementInfo, GameServiceFeature, LeaderboardEntry};
use crate::error::{GameServiceError, Result};

#[derive(Debug, Clone)]
struct MockScore {
    user_id: Option<String>,
    user_name: String,
    value: i64,
    tag: Option<String>,
}

#[derive(Default)]
struct MockStore {
    achievements: Vec<AchievementInfo>,
    /// Sorted, best score first
    leaderboards: HashMap<String, Vec<MockScore>>,
    game_states: BTreeMap<String, Vec<u8>>,
    events: HashMap<String, u64>,
}

impl MockStore {
    fn submit_score(&mut self, leaderboard_id: &str, score: MockScore) {
        let board = self.leaderboards.entry(leaderboard_id.to_string()).or_default();

        if let Some(user_id) = score.user_id.as_deref() {
            if let Some(pos) = board.iter().position(|s| s.user_id.as_deref() == Some(user_id)) {
                if board[pos].value >= score.value {
                    return;
                }
                board.remove(pos);
            }
        }

        board.push(score);
        board.sort_by(|a, b| b.value.cmp(&a.value));
    }

    fn entries(&self, leaderboard_id: &str, limit: usize, around: Option<&str>) -> Vec<LeaderboardEntry> {
        let Some(board) = self.leaderboards.get(leaderboard_id) else {
            return Vec::new();
        };

        let anchor = around.and_then(|id| board.iter().position(|s| s.user_id.as_deref() == Some(id)));
        let window = leaderboard_window(board.len(), limit, anchor);

        board[window.clone()]
            .iter()
            .zip(window)
            .map(|(score, index)| {
                LeaderboardEntry::new(score.value.to_string(), score.value)
                    .with_user(score.user_name.clone(), score.user_id.clone())
                    .with_score_tag(score.tag.clone())
                    .with_rank(index as u32 + 1)
            })
            .collect()
    }

    fn increment_achievement(&mut self, achievement_id: &str, completion: f32) {
        match self.achievements.iter_mut().find(|a| a.id() == achievement_id) {
            Some(existing) => {
                if completion > existing.completion_percentage() {
                    *existing = existing.clone().with_completion_percentage(completion);
                }
            }
            None => self
                .achievements
                .push(AchievementInfo::new(achievement_id, completion)),
        }
    }
}

/// In-memory backend with simulated latency
///
/// Useful for development and tests. Connection and every asynchronous call
/// complete on the runtime after the configured latency; fire-and-forget
/// calls apply to the in-memory store right away. Leaderboards rank higher
/// scores first and keep each player's best score. Without
/// `GameStateMultipleFiles` the store holds a single save slot and saving
/// under a second file id fails with `SaveFailed`.
pub struct MockGameServiceClient {
    session: Session,
    runtime: Handle,
    store: Arc<Mutex<MockStore>>,
    features: HashSet<GameServiceFeature>,
    latency: Duration,
    fail_login: bool,
    player_id: String,
    player_name: String,
    backend_calls: Arc<AtomicUsize>,
}

impl MockGameServiceClient {
    pub const GAME_SERVICE_ID: &'static str = "mock";

    /// Create a mock supporting every feature, with no latency
    pub fn new(runtime: Handle) -> Self {
        Self {
            session: Session::new(Self::GAME_SERVICE_ID),
            runtime,
            store: Arc::new(Mutex::new(MockStore::default())),
            features: GameServiceFeature::ALL.into_iter().collect(),
            latency: Duration::ZERO,
            fail_login: false,
            player_id: "mock-player".to_string(),
            player_name: "Mock Player".to_string(),
            backend_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn from_config(config: &MockConfig, player_id: &str, player_name: &str, runtime: Handle) -> Self {
        let mut client = Self::new(runtime)
            .with_latency(Duration::from_millis(config.latency_ms))
            .with_player(player_id, player_name);
        for feature in &config.unsupported_features {
            client.features.remove(feature);
        }
        client.fail_login = config.fail_login;
        client
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_player(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.player_id = id.into();
        self.player_name = name.into();
        self
    }

    /// Restrict the supported features
    pub fn with_features(mut self, features: impl IntoIterator<Item = GameServiceFeature>) -> Self {
        self.features = features.into_iter().collect();
        self
    }

    pub fn without_feature(mut self, feature: GameServiceFeature) -> Self {
        self.features.remove(&feature);
        self
    }

    /// Every connection attempt fails with a login error
    pub fn failing_login(mut self) -> Self {
        self.fail_login = true;
        self
    }

    pub fn with_achievement(self, achievement: AchievementInfo) -> Self {
        self.lock_store().achievements.push(achievement);
        self
    }

    /// Seed a leaderboard score; `user_id == None` seeds a guest entry
    pub fn with_score(self, leaderboard_id: &str, user_name: &str, user_id: Option<&str>, value: i64) -> Self {
        self.lock_store().submit_score(
            leaderboard_id,
            MockScore {
                user_id: user_id.map(str::to_string),
                user_name: user_name.to_string(),
                value,
                tag: None,
            },
        );
        self
    }

    pub fn with_game_state(self, file_id: &str, data: Vec<u8>) -> Self {
        self.lock_store().game_states.insert(file_id.to_string(), data);
        self
    }

    /// Number of calls that reached the simulated backend
    pub fn backend_calls(&self) -> usize {
        self.backend_calls.load(Ordering::SeqCst)
    }

    pub fn event_count(&self, event_id: &str) -> u64 {
        self.lock_store().events.get(event_id).copied().unwrap_or(0)
    }

    pub fn achievement(&self, achievement_id: &str) -> Option<AchievementInfo> {
        self.lock_store()
            .achievements
            .iter()
            .find(|a| a.id() == achievement_id)
            .cloned()
    }

    pub fn game_state(&self, file_id: &str) -> Option<Vec<u8>> {
        self.lock_store().game_states.get(file_id).cloned()
    }

    fn lock_store(&self) -> MutexGuard<'_, MockStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `work` against the store on the runtime after the simulated latency,
    /// then release `guard` and answer `response` outside the store lock
    fn dispatch<T, W>(&self, guard: InFlight, response: Response<T>, work: W)
    where
        T: Send + 'static,
        W: FnOnce(&mut MockStore) -> Result<T> + Send + 'static,
    {
        self.backend_calls.fetch_add(1, Ordering::SeqCst);
        let store = Arc::clone(&self.store);
        let latency = self.latency;
        self.runtime.spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            let result = work(&mut *store.lock().unwrap_or_else(PoisonError::into_inner));
            drop(guard);
            response.deliver(result);
        });
    }

    /// Apply a fire-and-forget call if connected
    fn submit<F>(&self, what: &str, work: F) -> bool
    where
        F: FnOnce(&mut MockStore),
    {
        if !self.session.is_connected() {
            tracing::debug!("mock: {} rejected, not connected", what);
            return false;
        }
        self.backend_calls.fetch_add(1, Ordering::SeqCst);
        work(&mut *self.lock_store());
        true
    }
}

impl GameServiceClient for MockGameServiceClient {
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
        match self.session.begin_connect() {
            Some(attempt) => {
                self.backend_calls.fetch_add(1, Ordering::SeqCst);
                let session = self.session.clone();
                let latency = self.latency;
                let fail_login = self.fail_login;
                let player_name = self.player_name.clone();
                self.runtime.spawn(async move {
                    if !latency.is_zero() {
                        tokio::time::sleep(latency).await;
                    }
                    if fail_login {
                        session.fail_connect(attempt, "Mock login rejected", None);
                    } else {
                        session.complete_connect(attempt, Some(player_name));
                    }
                });
            }
            None if !silent && self.session.is_connected() => {
                tracing::debug!("mock: already signed in, no login prompt needed");
            }
            None => {}
        }
        self.session.is_connected()
    }

    fn disconnect(&self) {
        self.session.disconnect();
    }

    fn log_off(&self) {
        if self.is_feature_supported(GameServiceFeature::PlayerLogOut) {
            self.session.disconnect();
        } else {
            self.session.report(&GameServiceError::LogoutFailed(
                "Mock backend has no sign-out".to_string(),
            ));
        }
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
        self.ensure_supported(leaderboard_ui_feature(leaderboard_id))?;
        tracing::info!("mock: showing leaderboard UI for {:?}", leaderboard_id);
        Ok(())
    }

    fn show_achievements(&self) -> Result<()> {
        self.ensure_supported(GameServiceFeature::ShowAchievementsUi)?;
        tracing::info!("mock: showing achievements UI");
        Ok(())
    }

    fn submit_to_leaderboard(&self, leaderboard_id: &str, score: i64, tag: Option<&str>) -> bool {
        let score = MockScore {
            user_id: Some(self.player_id.clone()),
            user_name: self.player_name.clone(),
            value: score,
            tag: tag.map(str::to_string),
        };
        self.submit("leaderboard submission", |store| {
            store.submit_score(leaderboard_id, score)
        })
    }

    fn fetch_leaderboard_entries(
        &self,
        leaderboard_id: &str,
        limit: usize,
        related_to_player: bool,
        response: LeaderboardResponse,
    ) -> Result<bool> {
        let response = response.require(self, GameServiceFeature::FetchLeaderboardEntries)?;
        if leaderboard_id.is_empty() {
            return Err(response.reject(GameServiceError::InvalidArgument(
                "leaderboard id is empty".to_string(),
            )));
        }
        let Some((guard, response)) = self.session.admit(Operation::FetchLeaderboardEntries, response) else {
            return Ok(false);
        };

        let leaderboard_id = leaderboard_id.to_string();
        let player_id = related_to_player.then(|| self.player_id.clone());
        self.dispatch(guard, response, move |store| {
            Ok(store.entries(&leaderboard_id, limit, player_id.as_deref()))
        });
        Ok(true)
    }

    fn submit_event(&self, event_id: &str, increment: u32) -> bool {
        if !self.is_feature_supported(GameServiceFeature::SubmitEvents) {
            return false;
        }
        self.submit("event", |store| {
            *store.events.entry(event_id.to_string()).or_insert(0) += u64::from(increment);
        })
    }

    fn increment_achievement(&self, achievement_id: &str, _inc_num: u32, completion_percentage: f32) -> bool {
        self.submit("achievement progress", |store| {
            store.increment_achievement(achievement_id, completion_percentage)
        })
    }

    fn fetch_achievements(&self, response: AchievementsResponse) -> Result<bool> {
        let response = response.require(self, GameServiceFeature::FetchAchievements)?;
        let Some((guard, response)) = self.session.admit(Operation::FetchAchievements, response) else {
            return Ok(false);
        };

        self.dispatch(guard, response, |store| Ok(store.achievements.clone()));
        Ok(true)
    }

    fn save_game_state(
        &self,
        file_id: &str,
        game_state: Vec<u8>,
        progress_value: i64,
        response: SaveResponse,
    ) -> Result<bool> {
        let response = response.require(self, GameServiceFeature::GameStateStorage)?;
        let response = require_file_id(file_id, response)?;
        let Some((guard, response)) = self.session.admit(Operation::SaveGameState, response) else {
            return Ok(false);
        };

        tracing::debug!("mock: saving {} ({} bytes, progress {})", file_id, game_state.len(), progress_value);
        let file_id = file_id.to_string();
        let single_slot = !self.is_feature_supported(GameServiceFeature::GameStateMultipleFiles);
        self.dispatch(guard, response, move |store| {
            if single_slot && store.game_states.keys().any(|id| *id != file_id) {
                return Err(GameServiceError::SaveFailed {
                    file_id,
                    message: "only one save slot is available".to_string(),
                });
            }
            store.game_states.insert(file_id, game_state);
            Ok(())
        });
        Ok(true)
    }

    fn load_game_state(&self, file_id: &str, response: LoadResponse) -> Result<bool> {
        let response = response.require(self, GameServiceFeature::GameStateStorage)?;
        let response = require_file_id(file_id, response)?;
        let Some((guard, response)) = self.session.admit(Operation::LoadGameState, response) else {
            return Ok(false);
        };

        let file_id = file_id.to_string();
        self.dispatch(guard, response, move |store| {
            store
                .game_states
                .get(&file_id)
                .cloned()
                .ok_or(GameServiceError::GameStateNotFound(file_id))
        });
        Ok(true)
    }

    fn delete_game_state(&self, file_id: &str, response: SaveResponse) -> Result<bool> {
        let response = response.require(self, GameServiceFeature::GameStateDelete)?;
        let response = require_file_id(file_id, response)?;
        let Some((guard, response)) = self.session.admit(Operation::DeleteGameState, response) else {
            return Ok(false);
        };

        let file_id = file_id.to_string();
        self.dispatch(guard, response, move |store| match store.game_states.remove(&file_id) {
            Some(_) => Ok(()),
            None => Err(GameServiceError::GameStateNotFound(file_id)),
        });
        Ok(true)
    }

    fn fetch_game_states(&self, response: GameStatesResponse) -> Result<bool> {
        let response = response.require(self, GameServiceFeature::FetchGameStates)?;
        let Some((guard, response)) = self.session.admit(Operation::FetchGameStates, response) else {
            return Ok(false);
        };

        self.dispatch(guard, response, |store| Ok(store.game_states.keys().cloned().collect()));
        Ok(true)
    }

    fn is_feature_supported(&self, feature: GameServiceFeature) -> bool {
        self.features.contains(&feature)
    }
}
