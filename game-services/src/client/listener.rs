use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::{ErrorKind, GameServiceError};

/// Receives connection lifecycle notifications
///
/// Exactly one of the three methods is called per connection attempt. Calls
/// may arrive on a runtime thread rather than the thread that called `connect`.
pub trait GameServiceListener: Send + Sync {
    fn connected(&self);

    fn disconnected(&self);

    /// `cause` carries the originating error when one is available
    fn error_msg(&self, kind: ErrorKind, message: &str, cause: Option<&GameServiceError>);
}

/// Listener notification as a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    Error { kind: ErrorKind, message: String },
}

/// Listener that forwards notifications over a channel
pub struct ChannelListener {
    tx: UnboundedSender<ConnectionEvent>,
}

impl ChannelListener {
    pub fn channel() -> (Arc<Self>, UnboundedReceiver<ConnectionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }

    fn send(&self, event: ConnectionEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Connection event dropped, receiver closed");
        }
    }
}

impl GameServiceListener for ChannelListener {
    fn connected(&self) {
        self.send(ConnectionEvent::Connected);
    }

    fn disconnected(&self) {
        self.send(ConnectionEvent::Disconnected);
    }

    fn error_msg(&self, kind: ErrorKind, message: &str, _cause: Option<&GameServiceError>) {
        self.send(ConnectionEvent::Error {
            kind,
            message: message.to_string(),
        });
    }
}
