use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::client::{GameServiceListener, Response};
use crate::error::{GameServiceError, Result};

/// Connection lifecycle of a client instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    ConnectionPending,
    Connected,
}

/// Asynchronous operation kinds, used to detect overlapping requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchLeaderboardEntries,
    FetchAchievements,
    SaveGameState,
    LoadGameState,
    DeleteGameState,
    FetchGameStates,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::FetchLeaderboardEntries => "fetch_leaderboard_entries",
            Operation::FetchAchievements => "fetch_achievements",
            Operation::SaveGameState => "save_game_state",
            Operation::LoadGameState => "load_game_state",
            Operation::DeleteGameState => "delete_game_state",
            Operation::FetchGameStates => "fetch_game_states",
        };
        f.write_str(name)
    }
}

/// Identifies one connection attempt. Completions carrying a stale id are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectAttempt(u64);

struct SessionInner {
    state: ConnectionState,
    attempt: u64,
    listener: Option<Arc<dyn GameServiceListener>>,
    player_name: Option<String>,
    resume_connected: bool,
    in_flight: HashSet<Operation>,
}

/// Shared connection state machine used by every backend
///
/// Backend tasks finish on runtime threads, so the state lives behind a
/// mutex. Listener callbacks always run after the lock is released, which
/// lets a listener query the client from inside a notification.
#[derive(Clone)]
pub struct Session {
    service: &'static str,
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    pub fn new(service: &'static str) -> Self {
        Self {
            service,
            inner: Arc::new(Mutex::new(SessionInner {
                state: ConnectionState::Disconnected,
                attempt: 0,
                listener: None,
                player_name: None,
                resume_connected: false,
                in_flight: HashSet::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn set_listener(&self, listener: Arc<dyn GameServiceListener>) {
        self.lock().listener = Some(listener);
    }

    fn listener(&self) -> Option<Arc<dyn GameServiceListener>> {
        self.lock().listener.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn is_connection_pending(&self) -> bool {
        self.state() == ConnectionState::ConnectionPending
    }

    pub fn player_name(&self) -> Option<String> {
        let inner = self.lock();
        match inner.state {
            ConnectionState::Connected => inner.player_name.clone(),
            _ => None,
        }
    }

    /// Move Disconnected -> ConnectionPending.
    ///
    /// Returns `None` when connected or an attempt is already pending.
    pub fn begin_connect(&self) -> Option<ConnectAttempt> {
        let mut inner = self.lock();
        if inner.state != ConnectionState::Disconnected {
            return None;
        }
        inner.state = ConnectionState::ConnectionPending;
        inner.attempt += 1;
        tracing::debug!("{}: connection attempt {} started", self.service, inner.attempt);
        Some(ConnectAttempt(inner.attempt))
    }

    fn settle(&self, attempt: ConnectAttempt, next: ConnectionState, player_name: Option<String>) -> bool {
        let mut inner = self.lock();
        if inner.attempt != attempt.0 || inner.state != ConnectionState::ConnectionPending {
            tracing::debug!("{}: ignoring stale connection attempt {}", self.service, attempt.0);
            return false;
        }
        inner.state = next;
        inner.player_name = player_name;
        true
    }

    /// Pending attempt succeeded
    pub fn complete_connect(&self, attempt: ConnectAttempt, player_name: Option<String>) {
        if self.settle(attempt, ConnectionState::Connected, player_name) {
            tracing::info!("{}: connected", self.service);
            if let Some(listener) = self.listener() {
                listener.connected();
            }
        }
    }

    /// Pending attempt finished without a signed-in player (guest session, no service)
    pub fn settle_disconnected(&self, attempt: ConnectAttempt) {
        if self.settle(attempt, ConnectionState::Disconnected, None) {
            tracing::info!("{}: no player signed in", self.service);
            if let Some(listener) = self.listener() {
                listener.disconnected();
            }
        }
    }

    /// Pending attempt failed; reported to the listener as a login failure
    /// carrying `cause` when the backend produced one
    pub fn fail_connect(&self, attempt: ConnectAttempt, message: impl Into<String>, cause: Option<GameServiceError>) {
        if self.settle(attempt, ConnectionState::Disconnected, None) {
            let err = GameServiceError::LoginFailed {
                message: message.into(),
                source: cause.map(Box::new),
            };
            tracing::warn!("{}: {}", self.service, err);
            self.report(&err);
        }
    }

    /// Drop the connection (or abandon a pending attempt)
    pub fn disconnect(&self) {
        let previous = {
            let mut inner = self.lock();
            let previous = inner.state;
            inner.state = ConnectionState::Disconnected;
            inner.player_name = None;
            previous
        };

        if previous != ConnectionState::Disconnected {
            tracing::info!("{}: disconnected", self.service);
            if let Some(listener) = self.listener() {
                listener.disconnected();
            }
        }
    }

    /// Disconnect, remembering whether the session was connected
    pub fn pause(&self) {
        {
            let mut inner = self.lock();
            inner.resume_connected = inner.state == ConnectionState::Connected;
        }
        self.disconnect();
    }

    /// True if the session was connected when last paused. Clears the flag.
    pub fn take_resume(&self) -> bool {
        std::mem::take(&mut self.lock().resume_connected)
    }

    /// Forward an error to the listener with its category.
    /// The listener's `cause` is the originating error when `err` wraps one.
    pub fn report(&self, err: &GameServiceError) {
        if let Some(listener) = self.listener() {
            let cause = err.underlying().unwrap_or(err);
            listener.error_msg(err.kind(), &err.to_string(), Some(cause));
        }
    }

    pub fn require_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(GameServiceError::NotConnected(self.service.to_string()))
        }
    }

    /// Mark `operation` as running until the returned guard is dropped
    pub fn begin(&self, operation: Operation) -> Result<InFlight> {
        let mut inner = self.lock();
        if !inner.in_flight.insert(operation) {
            return Err(GameServiceError::OperationPending(operation));
        }
        Ok(InFlight {
            operation,
            inner: Arc::clone(&self.inner),
        })
    }

    /// Accept an async request: connected and no same-kind request running.
    ///
    /// On rejection the response is failed with the reason and `None` is returned.
    pub fn admit<T>(&self, operation: Operation, response: Response<T>) -> Option<(InFlight, Response<T>)> {
        let admitted = self.require_connected().and_then(|_| self.begin(operation));
        match admitted {
            Ok(guard) => Some((guard, response)),
            Err(err) => {
                tracing::debug!("{}: rejected {}: {}", self.service, operation, err);
                response.fail(err);
                None
            }
        }
    }
}

/// Guard for a running operation
pub struct InFlight {
    operation: Operation,
    inner: Arc<Mutex<SessionInner>>,
}

impl InFlight {
    pub fn operation(&self) -> Operation {
        self.operation
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight
            .remove(&self.operation);
    }
}
