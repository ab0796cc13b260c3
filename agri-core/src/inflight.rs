use std::{future::Future, sync::Mutex};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{ApiError, ApiResult};

/// Tracks the in-flight request of one operation kind. Starting a new
/// request cancels the previous one instead of letting the two race.
#[derive(Debug, Default)]
pub struct InFlight {
    name: &'static str,
    current: Mutex<Option<CancellationToken>>,
}

impl InFlight {
    pub fn new(name: &'static str) -> Self {
        Self { name, current: Mutex::new(None) }
    }

    /// Cancel whatever is running and hand out a token for the new request.
    pub fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut slot = self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = slot.replace(token.clone()) {
            if !previous.is_cancelled() {
                debug!(operation = self.name, "superseding in-flight request");
            }
            previous.cancel();
        }
        token
    }

    /// Cancel the in-flight request, if any.
    pub fn cancel(&self) {
        let slot = self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(token) = slot.as_ref() {
            token.cancel();
        }
    }

    /// Run `fut` as the newest request of this kind.
    pub async fn run<T, F>(&self, fut: F) -> ApiResult<T>
    where
        F: Future<Output = ApiResult<T>>,
    {
        let token = self.begin();
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(ApiError::Cancelled),
            res = fut => res,
        }
    }
}
