use std::fmt;
use tokio::sync::oneshot;

use crate::client::GameServiceClient;
use crate::core::GameServiceFeature;
use crate::error::{GameServiceError, Result};

type Callback<T> = Box<dyn FnOnce(Result<T>) + Send>;

/// Single-shot completion for an asynchronous client call
///
/// Answering consumes the response, so it can fire at most once. A response
/// dropped without an answer delivers `ResponseDropped` instead of staying
/// silent. `dismiss` is the only way to release it unanswered; backends use
/// it when they reject the call synchronously.
pub struct Response<T> {
    callback: Option<Callback<T>>,
}

impl<T> Response<T> {
    pub fn new<F>(callback: F) -> Self
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        Self {
            callback: Some(Box::new(callback)),
        }
    }

    pub fn succeed(self, value: T) {
        self.deliver(Ok(value));
    }

    pub fn fail(self, err: GameServiceError) {
        tracing::debug!("Response failed: {}", err);
        self.deliver(Err(err));
    }

    pub fn deliver(mut self, result: Result<T>) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }

    /// Release without invoking the callback
    pub fn dismiss(mut self) {
        self.callback.take();
    }

    /// Dismiss and hand back `err` for a synchronous rejection
    pub fn reject(self, err: GameServiceError) -> GameServiceError {
        self.dismiss();
        err
    }

    /// Pass the response through if `client` supports `feature`, reject it otherwise
    pub fn require(self, client: &dyn GameServiceClient, feature: GameServiceFeature) -> Result<Self> {
        match client.ensure_supported(feature) {
            Ok(()) => Ok(self),
            Err(err) => Err(self.reject(err)),
        }
    }
}

impl<T: Send + 'static> Response<T> {
    /// Response paired with a receiver for hosts that await the result
    pub fn channel() -> (Self, oneshot::Receiver<Result<T>>) {
        let (tx, rx) = oneshot::channel();
        let response = Self::new(move |result| {
            let _ = tx.send(result);
        });
        (response, rx)
    }
}

impl<T> Drop for Response<T> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            tracing::warn!("Response dropped without an answer");
            callback(Err(GameServiceError::ResponseDropped));
        }
    }
}

impl<T> fmt::Debug for Response<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("pending", &self.callback.is_some())
            .finish()
    }
}
