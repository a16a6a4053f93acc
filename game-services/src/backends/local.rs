use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

use crate::backends::{leaderboard_window, require_file_id};
use crate::client::{
    leaderboard_ui_feature, AchievementsResponse, GameServiceClient, GameServiceListener,
    GameStatesResponse, InFlight, LeaderboardResponse, LoadResponse, Operation, Response,
    SaveResponse, Session,
};
use crate::config::{LocalConfig, ScoreOrder};
use crate::core::achievement::clamp_completion;
use crate::core::{AchievementInfo, GameServiceFeature, LeaderboardEntry};
use crate::error::{GameServiceError, Result};

type Job = Box<dyn FnOnce(&Connection) + Send>;

const SUPPORTED: [GameServiceFeature; 8] = [
    GameServiceFeature::SubmitEvents,
    GameServiceFeature::FetchAchievements,
    GameServiceFeature::FetchLeaderboardEntries,
    GameServiceFeature::GameStateStorage,
    GameServiceFeature::GameStateMultipleFiles,
    GameServiceFeature::GameStateDelete,
    GameServiceFeature::FetchGameStates,
    GameServiceFeature::PlayerLogOut,
];

/// SQLite-backed backend for offline play
///
/// Schema:
/// ```sql
/// CREATE TABLE game_states (
///     file_id TEXT PRIMARY KEY,
///     data BLOB NOT NULL,
///     progress INTEGER NOT NULL DEFAULT 0,
///     saved_at TEXT NOT NULL
/// );
/// CREATE TABLE leaderboard_scores (
///     leaderboard_id TEXT NOT NULL,
///     player_id TEXT NOT NULL,
///     player_name TEXT NOT NULL,
///     sort_value INTEGER NOT NULL,
///     score_tag TEXT,
///     submitted_at TEXT NOT NULL,
///     PRIMARY KEY (leaderboard_id, player_id)
/// );
/// CREATE TABLE achievements (...);
/// CREATE TABLE events (...);
/// ```
///
/// All database work runs in order on one worker thread that owns the
/// connection, so a submission is always visible to a later fetch.
pub struct LocalGameServiceClient {
    session: Session,
    jobs: Sender<Job>,
    player_id: String,
    player_name: String,
    score_order: ScoreOrder,
}

impl LocalGameServiceClient {
    pub const GAME_SERVICE_ID: &'static str = "local";

    /// Open (or create) the store at `db_path`; `":memory:"` keeps it in memory
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        init_schema(&conn)?;

        let (jobs, queue) = mpsc::channel::<Job>();
        thread::Builder::new()
            .name("game-services-local".to_string())
            .spawn(move || {
                for job in queue {
                    job(&conn);
                }
                tracing::debug!("local: store worker stopped");
            })?;

        tracing::debug!("local: opened store at {}", db_path);
        Ok(Self {
            session: Session::new(Self::GAME_SERVICE_ID),
            jobs,
            player_id: "local-player".to_string(),
            player_name: "Player".to_string(),
            score_order: ScoreOrder::HigherIsBetter,
        })
    }

    pub fn from_config(config: &LocalConfig, player_id: &str, player_name: &str) -> Result<Self> {
        Ok(Self::open(&config.db_path)?
            .with_player(player_id, player_name)
            .with_score_order(config.score_order))
    }

    pub fn with_player(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.player_id = id.into();
        self.player_name = name.into();
        self
    }

    pub fn with_score_order(mut self, order: ScoreOrder) -> Self {
        self.score_order = order;
        self
    }

    /// Register display data for an achievement. Progress already made is kept.
    pub fn define_achievement(&self, achievement: AchievementInfo) -> bool {
        self.enqueue(move |conn| {
            if let Err(e) = upsert_achievement_definition(conn, &achievement) {
                tracing::warn!("local: failed to define achievement {}: {}", achievement.id(), e);
            }
        })
    }

    /// Current counter of an event
    pub fn fetch_event_count(&self, event_id: &str, response: Response<u64>) {
        let event_id = event_id.to_string();
        self.enqueue(move |conn| response.deliver(event_count(conn, &event_id)));
    }

    fn enqueue<F>(&self, job: F) -> bool
    where
        F: FnOnce(&Connection) + Send + 'static,
    {
        // a rejected job is dropped here, which fails any response it owns
        if self.jobs.send(Box::new(job)).is_err() {
            tracing::warn!("local: store worker is gone");
            return false;
        }
        true
    }

    /// Queue `work`, then release `guard` and answer `response`
    fn run<T, W>(&self, guard: InFlight, response: Response<T>, work: W)
    where
        T: Send + 'static,
        W: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        self.enqueue(move |conn| {
            let result = work(conn);
            drop(guard);
            response.deliver(result);
        });
    }

    fn submit<F>(&self, what: &'static str, work: F) -> bool
    where
        F: FnOnce(&Connection) -> Result<()> + Send + 'static,
    {
        if !self.session.is_connected() {
            tracing::debug!("local: {} rejected, not connected", what);
            return false;
        }
        self.enqueue(move |conn| {
            if let Err(e) = work(conn) {
                tracing::warn!("local: {} failed: {}", what, e);
            }
        })
    }
}

impl GameServiceClient for LocalGameServiceClient {
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

    fn connect(&self, _silent: bool) -> bool {
        // no accounts to sign in to
        if let Some(attempt) = self.session.begin_connect() {
            self.session.complete_connect(attempt, Some(self.player_name.clone()));
        }
        self.session.is_connected()
    }

    fn disconnect(&self) {
        self.session.disconnect();
    }

    fn log_off(&self) {
        self.session.disconnect();
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

    fn submit_to_leaderboard(&self, leaderboard_id: &str, score: i64, tag: Option<&str>) -> bool {
        let score = ScoreRow {
            player_id: self.player_id.clone(),
            player_name: self.player_name.clone(),
            sort_value: score,
            score_tag: tag.map(str::to_string),
        };
        let leaderboard_id = leaderboard_id.to_string();
        let order = self.score_order;
        self.submit("leaderboard submission", move |conn| {
            submit_score(conn, &leaderboard_id, &score, order)
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
        let order = self.score_order;
        self.run(guard, response, move |conn| {
            let rows = leaderboard_rows(conn, &leaderboard_id, order)?;
            let anchor = player_id
                .as_deref()
                .and_then(|id| rows.iter().position(|r| r.player_id == id));
            let window = leaderboard_window(rows.len(), limit, anchor);

            Ok(rows[window.clone()]
                .iter()
                .zip(window)
                .map(|(row, index)| row.to_entry(index as u32 + 1))
                .collect())
        });
        Ok(true)
    }

    fn submit_event(&self, event_id: &str, increment: u32) -> bool {
        let event_id = event_id.to_string();
        self.submit("event", move |conn| add_event(conn, &event_id, increment))
    }

    fn increment_achievement(&self, achievement_id: &str, _inc_num: u32, completion_percentage: f32) -> bool {
        let completion = clamp_completion(completion_percentage);
        let achievement_id = achievement_id.to_string();
        self.submit("achievement progress", move |conn| {
            raise_achievement(conn, &achievement_id, completion)
        })
    }

    fn fetch_achievements(&self, response: AchievementsResponse) -> Result<bool> {
        let response = response.require(self, GameServiceFeature::FetchAchievements)?;
        let Some((guard, response)) = self.session.admit(Operation::FetchAchievements, response) else {
            return Ok(false);
        };

        self.run(guard, response, |conn| achievements(conn).map_err(Into::into));
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

        let file_id = file_id.to_string();
        self.run(guard, response, move |conn| {
            save_state(conn, &file_id, &game_state, progress_value).map_err(|e| {
                GameServiceError::SaveFailed {
                    file_id: file_id.clone(),
                    message: e.to_string(),
                }
            })
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
        self.run(guard, response, move |conn| match load_state(conn, &file_id) {
            Ok(Some(data)) => Ok(data),
            Ok(None) => Err(GameServiceError::GameStateNotFound(file_id)),
            Err(e) => Err(GameServiceError::LoadFailed {
                file_id,
                message: e.to_string(),
            }),
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
        self.run(guard, response, move |conn| {
            let deleted = conn.execute("DELETE FROM game_states WHERE file_id = ?1", params![file_id])?;
            if deleted == 0 {
                return Err(GameServiceError::GameStateNotFound(file_id));
            }
            Ok(())
        });
        Ok(true)
    }

    fn fetch_game_states(&self, response: GameStatesResponse) -> Result<bool> {
        let response = response.require(self, GameServiceFeature::FetchGameStates)?;
        let Some((guard, response)) = self.session.admit(Operation::FetchGameStates, response) else {
            return Ok(false);
        };

        self.run(guard, response, |conn| list_states(conn).map_err(Into::into));
        Ok(true)
    }

    fn is_feature_supported(&self, feature: GameServiceFeature) -> bool {
        SUPPORTED.contains(&feature)
    }
}

#[derive(Debug, Clone)]
struct ScoreRow {
    player_id: String,
    player_name: String,
    sort_value: i64,
    score_tag: Option<String>,
}

impl ScoreRow {
    fn to_entry(&self, rank: u32) -> LeaderboardEntry {
        LeaderboardEntry::new(self.sort_value.to_string(), self.sort_value)
            .with_user(self.player_name.clone(), Some(self.player_id.clone()))
            .with_score_tag(self.score_tag.clone())
            .with_rank(rank)
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS game_states (
            file_id TEXT PRIMARY KEY,
            data BLOB NOT NULL,
            progress INTEGER NOT NULL DEFAULT 0,
            saved_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS leaderboard_scores (
            leaderboard_id TEXT NOT NULL,
            player_id TEXT NOT NULL,
            player_name TEXT NOT NULL,
            sort_value INTEGER NOT NULL,
            score_tag TEXT,
            submitted_at TEXT NOT NULL,
            PRIMARY KEY (leaderboard_id, player_id)
        );
        CREATE INDEX IF NOT EXISTS idx_scores_value ON leaderboard_scores(leaderboard_id, sort_value);
        CREATE TABLE IF NOT EXISTS achievements (
            achievement_id TEXT PRIMARY KEY,
            title TEXT,
            description TEXT,
            icon_url TEXT,
            completion REAL NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS events (
            event_id TEXT PRIMARY KEY,
            count INTEGER NOT NULL DEFAULT 0
        );",
    )
}

fn save_state(conn: &Connection, file_id: &str, data: &[u8], progress: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO game_states (file_id, data, progress, saved_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![file_id, data, progress, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn load_state(conn: &Connection, file_id: &str) -> rusqlite::Result<Option<Vec<u8>>> {
    conn.query_row(
        "SELECT data FROM game_states WHERE file_id = ?1",
        params![file_id],
        |row| row.get(0),
    )
    .optional()
}

fn list_states(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT file_id FROM game_states ORDER BY file_id")?;
    let ids = stmt.query_map([], |row| row.get::<_, String>(0))?.collect();
    ids
}

/// Keep only the player's best score according to `order`
fn submit_score(conn: &Connection, leaderboard_id: &str, score: &ScoreRow, order: ScoreOrder) -> Result<()> {
    let better = match order {
        ScoreOrder::HigherIsBetter => ">",
        ScoreOrder::LowerIsBetter => "<",
    };
    let sql = format!(
        "INSERT INTO leaderboard_scores
            (leaderboard_id, player_id, player_name, sort_value, score_tag, submitted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(leaderboard_id, player_id) DO UPDATE SET
            player_name = excluded.player_name,
            sort_value = excluded.sort_value,
            score_tag = excluded.score_tag,
            submitted_at = excluded.submitted_at
         WHERE excluded.sort_value {} leaderboard_scores.sort_value",
        better
    );
    conn.execute(
        &sql,
        params![
            leaderboard_id,
            score.player_id,
            score.player_name,
            score.sort_value,
            score.score_tag,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn leaderboard_rows(conn: &Connection, leaderboard_id: &str, order: ScoreOrder) -> rusqlite::Result<Vec<ScoreRow>> {
    let direction = match order {
        ScoreOrder::HigherIsBetter => "DESC",
        ScoreOrder::LowerIsBetter => "ASC",
    };
    let sql = format!(
        "SELECT player_id, player_name, sort_value, score_tag
         FROM leaderboard_scores
         WHERE leaderboard_id = ?1
         ORDER BY sort_value {}, submitted_at ASC",
        direction
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![leaderboard_id], |row| {
            Ok(ScoreRow {
                player_id: row.get(0)?,
                player_name: row.get(1)?,
                sort_value: row.get(2)?,
                score_tag: row.get(3)?,
            })
        })?
        .collect();
    rows
}

fn upsert_achievement_definition(conn: &Connection, achievement: &AchievementInfo) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO achievements (achievement_id, title, description, icon_url, completion)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(achievement_id) DO UPDATE SET
            title = excluded.title,
            description = excluded.description,
            icon_url = excluded.icon_url",
        params![
            achievement.id(),
            achievement.title(),
            achievement.description(),
            achievement.icon_url(),
            f64::from(achievement.completion_percentage()),
        ],
    )?;
    Ok(())
}

/// Progress never goes backwards
fn raise_achievement(conn: &Connection, achievement_id: &str, completion: f32) -> Result<()> {
    conn.execute(
        "INSERT INTO achievements (achievement_id, completion) VALUES (?1, ?2)
         ON CONFLICT(achievement_id) DO UPDATE SET
            completion = MAX(completion, excluded.completion)",
        params![achievement_id, f64::from(completion)],
    )?;
    Ok(())
}

fn achievements(conn: &Connection) -> rusqlite::Result<Vec<AchievementInfo>> {
    let mut stmt = conn.prepare(
        "SELECT achievement_id, title, description, icon_url, completion
         FROM achievements ORDER BY rowid",
    )?;
    let achievements = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let completion: f64 = row.get(4)?;
            let mut achievement = AchievementInfo::new(id, completion as f32);
            if let Some(title) = row.get::<_, Option<String>>(1)? {
                achievement = achievement.with_title(title);
            }
            if let Some(description) = row.get::<_, Option<String>>(2)? {
                achievement = achievement.with_description(description);
            }
            if let Some(icon_url) = row.get::<_, Option<String>>(3)? {
                achievement = achievement.with_icon_url(icon_url);
            }
            Ok(achievement)
        })?
        .collect();
    achievements
}

fn add_event(conn: &Connection, event_id: &str, increment: u32) -> Result<()> {
    conn.execute(
        "INSERT INTO events (event_id, count) VALUES (?1, ?2)
         ON CONFLICT(event_id) DO UPDATE SET count = count + excluded.count",
        params![event_id, increment],
    )?;
    Ok(())
}

fn event_count(conn: &Connection, event_id: &str) -> Result<u64> {
    let count: Option<i64> = conn
        .query_row(
            "SELECT count FROM events WHERE event_id = ?1",
            params![event_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(count.unwrap_or(0).max(0) as u64)
}
