//! Conditional update check against a release URL.
//!
//! `If-None-Match` carries the ETag of the installed version: 304 means up
//! to date, 200 means a newer file is published. Installing it is left to
//! deployment tooling; the new ETag is kept as pending and only becomes
//! `update_hash` on `/restart`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

use crate::chat::Keyboard;
use crate::context::BotContext;
use crate::lifecycle::Lifecycle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    Available { etag: Option<String> },
    Unexpected(u16),
}

impl UpdateStatus {
    pub fn from_response(status: u16, etag: Option<String>) -> Self {
        match status {
            304 => Self::UpToDate,
            200 => Self::Available { etag },
            other => Self::Unexpected(other),
        }
    }
}

pub struct UpdateChecker {
    http: reqwest::Client,
    /// ETag seen by `/update`, not yet deployed.
    pending: Mutex<Option<String>>,
}

impl UpdateChecker {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            pending: Mutex::new(None),
        }
    }

    pub async fn set_pending(&self, etag: Option<String>) {
        *self.pending.lock().await = etag;
    }

    pub async fn take_pending(&self) -> Option<String> {
        self.pending.lock().await.take()
    }

    pub async fn check(&self, url: &str, etag: Option<&str>) -> Result<UpdateStatus> {
        let mut request = self.http.get(url);
        if let Some(etag) = etag {
            request = request.header(IF_NONE_MATCH, etag);
        }
        let resp = request.send().await.context("update check request failed")?;
        let status = resp.status();
        let etag = resp
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if status != StatusCode::NOT_MODIFIED && status != StatusCode::OK {
            warn!("update check returned {status}");
        }
        Ok(UpdateStatus::from_response(status.as_u16(), etag))
    }
}

impl Default for UpdateChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic check; only news and failures reach the owner.
pub async fn run(ctx: Arc<BotContext>, mut lifecycle: watch::Receiver<Lifecycle>) {
    let every = ctx.config.read().await.update_check_time.max(60);
    let mut interval = tokio::time::interval(Duration::from_secs(every));
    info!("update check every {every}s");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let (enabled, url, etag, owner) = {
                    let cfg = ctx.config.read().await;
                    (cfg.update_check, cfg.update_url.clone(), cfg.update_hash.clone(), cfg.user_id)
                };
                let Some(url) = url.filter(|_| enabled) else {
                    continue;
                };
                match ctx.updater.check(&url, etag.as_deref()).await {
                    Ok(UpdateStatus::UpToDate) => info!("bot is up to date"),
                    Ok(UpdateStatus::Available { .. }) => {
                        ctx.send(owner, "New version available. Get it with /update", Keyboard::None).await;
                    }
                    Ok(UpdateStatus::Unexpected(code)) => {
                        let text = format!("Update check not possible. Unexpected status code: {code}");
                        ctx.send(owner, &text, Keyboard::None).await;
                    }
                    Err(e) => {
                        warn!("update check failed: {e:#}");
                        ctx.report_error(&format!("❌ Update check failed: {e}")).await;
                    }
                }
            }
            changed = lifecycle.changed() => {
                if changed.is_err() || !lifecycle.borrow().is_running() {
                    break;
                }
            }
        }
    }
}
