use thiserror::Error;

use crate::client::Operation;
use crate::core::GameServiceFeature;

/// Main error type for game service clients
#[derive(Error, Debug)]
pub enum GameServiceError {
    /// Feature is structurally unavailable on this backend
    #[error("Game service '{service}' does not support {feature}")]
    NotSupported {
        service: String,
        feature: GameServiceFeature,
    },

    /// Operation attempted while disconnected
    #[error("Not connected to game service '{0}'")]
    NotConnected(String),

    #[error("Login failed: {message}")]
    LoginFailed {
        message: String,
        /// Backend error that made the attempt fail
        #[source]
        source: Option<Box<GameServiceError>>,
    },

    #[error("Logout failed: {0}")]
    LogoutFailed(String),

    #[error("Saving game state '{file_id}' failed: {message}")]
    SaveFailed { file_id: String, message: String },

    #[error("Loading game state '{file_id}' failed: {message}")]
    LoadFailed { file_id: String, message: String },

    #[error("Game state '{0}' not found")]
    GameStateNotFound(String),

    /// A request of the same kind has not completed yet
    #[error("A {0} request is already pending")]
    OperationPending(Operation),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Backend dropped a response without answering it
    #[error("Response dropped before the backend answered")]
    ResponseDropped,

    /// Any other backend-reported failure
    #[error("Game service '{service}' error: {message}")]
    Backend { service: String, message: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP request errors
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// YAML config errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure category, so callers can branch without matching on messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotSupported,
    NotConnected,
    LoginFailed,
    LogoutFailed,
    SaveFailed,
    LoadFailed,
    Generic,
}

impl GameServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GameServiceError::NotSupported { .. } => ErrorKind::NotSupported,
            GameServiceError::NotConnected(_) => ErrorKind::NotConnected,
            GameServiceError::LoginFailed { .. } => ErrorKind::LoginFailed,
            GameServiceError::LogoutFailed(_) => ErrorKind::LogoutFailed,
            GameServiceError::SaveFailed { .. } => ErrorKind::SaveFailed,
            GameServiceError::LoadFailed { .. } | GameServiceError::GameStateNotFound(_) => {
                ErrorKind::LoadFailed
            }
            _ => ErrorKind::Generic,
        }
    }

    /// Originating error wrapped by this one, if any
    pub fn underlying(&self) -> Option<&GameServiceError> {
        match self {
            GameServiceError::LoginFailed { source, .. } => source.as_deref(),
            _ => None,
        }
    }

    pub fn is_not_supported(&self) -> bool {
        self.kind() == ErrorKind::NotSupported
    }

    pub(crate) fn not_supported(service: &str, feature: GameServiceFeature) -> Self {
        GameServiceError::NotSupported {
            service: service.to_string(),
            feature,
        }
    }

    pub(crate) fn backend(service: &str, message: impl Into<String>) -> Self {
        GameServiceError::Backend {
            service: service.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, GameServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = GameServiceError::not_supported("mock", GameServiceFeature::FetchGameStates);
        assert_eq!(err.kind(), ErrorKind::NotSupported);
        assert!(err.is_not_supported());
        assert_eq!(
            err.to_string(),
            "Game service 'mock' does not support fetch_game_states"
        );

        assert_eq!(
            GameServiceError::GameStateNotFound("slot1".into()).kind(),
            ErrorKind::LoadFailed
        );
        assert_eq!(
            GameServiceError::OperationPending(Operation::FetchAchievements).kind(),
            ErrorKind::Generic
        );
        assert_eq!(GameServiceError::backend("mock", "boom").kind(), ErrorKind::Generic);
    }

    #[test]
    fn test_login_failure_keeps_cause() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = GameServiceError::LoginFailed {
            message: "portal unreachable".to_string(),
            source: Some(Box::new(GameServiceError::Io(io))),
        };

        assert_eq!(err.kind(), ErrorKind::LoginFailed);
        assert_eq!(err.to_string(), "Login failed: portal unreachable");
        assert!(matches!(err.underlying(), Some(GameServiceError::Io(_))));
        assert!(err.source().is_some());

        let bare = GameServiceError::LoginFailed {
            message: "rejected".to_string(),
            source: None,
        };
        assert!(bare.underlying().is_none());
    }
}
