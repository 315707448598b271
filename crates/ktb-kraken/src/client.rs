//! Retrying call wrapper around a [`Transport`].

use std::future::Future;
use std::panic::Location;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::{ApiError, TransportError};
use crate::{Params, Transport};

/// How transient transport failures are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub enabled: bool,
    /// Attempts after the first one.
    pub extra_attempts: u32,
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            extra_attempts: 0,
        }
    }

    fn max_attempts(self) -> u32 {
        if self.enabled {
            self.extra_attempts.saturating_add(1)
        } else {
            1
        }
    }
}

/// Exchange client used by every bot component.
///
/// Cloning is cheap; clones share the transport.
#[derive(Clone)]
pub struct KrakenClient {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl KrakenClient {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Call `method` and return its `result` payload or a non-empty error
    /// list. The log line names the calling source location.
    #[track_caller]
    pub fn call<'a>(
        &'a self,
        method: &'a str,
        params: Params,
        private: bool,
    ) -> impl Future<Output = Result<Value, ApiError>> + Send + 'a {
        self.call_at(Location::caller(), method, params, private)
    }

    pub(crate) async fn call_at(
        &self,
        caller: &'static Location<'static>,
        method: &str,
        params: Params,
        private: bool,
    ) -> Result<Value, ApiError> {
        info!("[kraken] {caller}: {method} {params:?}");

        let max_attempts = self.retry.max_attempts();
        let mut last_error: Option<TransportError> = None;
        for attempt in 1..=max_attempts {
            match self.transport.query(method, &params, private).await {
                Ok(reply) => return reply.into_result(),
                Err(e) if !e.is_retryable() => {
                    warn!("[kraken] {method} failed, not retrying: {e}");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!("[kraken] {method} attempt {attempt}/{max_attempts} failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .map(ApiError::from)
            .unwrap_or_else(|| ApiError::single(format!("{method}: no attempt made"))))
    }
}
