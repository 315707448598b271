//! HTTP transport against the Kraken REST API.
//!
//! | Access  | Method | Path                  |
//! |---------|--------|-----------------------|
//! | public  | GET    | `/0/public/{method}`  |
//! | private | POST   | `/0/private/{method}` |
//!
//! Private requests are signed per [`crate::auth`].

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::auth::{self, NonceSource};
use crate::config::{Credentials, KrakenConfig};
use crate::error::TransportError;
use crate::{Reply, Transport};

/// Production [`Transport`] backed by `reqwest`.
pub struct KrakenRest {
    http: reqwest::Client,
    base_url: String,
    /// `None` when the key file could not be loaded; private calls then fail
    /// with [`TransportError::InvalidCredentials`].
    credentials: Option<Credentials>,
    nonce: NonceSource,
}

impl KrakenRest {
    pub fn new(config: &KrakenConfig, credentials: Option<Credentials>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: config.rest_url.trim_end_matches('/').to_string(),
            credentials,
            nonce: NonceSource::new(),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    async fn send_public(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<reqwest::Response, TransportError> {
        let url = format!("{}{path}", self.base_url);
        self.http
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))
    }

    async fn send_private(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<reqwest::Response, TransportError> {
        let Some(creds) = &self.credentials else {
            return Err(TransportError::InvalidCredentials(
                "API key file not loaded".into(),
            ));
        };

        let nonce = self.nonce.next().to_string();
        let mut form = Vec::with_capacity(params.len() + 1);
        form.push(("nonce".to_string(), nonce.clone()));
        form.extend(params.iter().cloned());
        let body = auth::encode_form(&form);
        let signature = auth::sign(path, &nonce, &body, &creds.secret)?;

        let url = format!("{}{path}", self.base_url);
        self.http
            .post(&url)
            .header("API-Key", &creds.key)
            .header("API-Sign", signature)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded; charset=utf-8",
            )
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    TransportError::InvalidCredentials(e.to_string())
                } else {
                    TransportError::Network(e.to_string())
                }
            })
    }
}

#[async_trait]
impl Transport for KrakenRest {
    async fn query(
        &self,
        method: &str,
        params: &[(String, String)],
        private: bool,
    ) -> Result<Reply, TransportError> {
        let path = if private {
            format!("/0/private/{method}")
        } else {
            format!("/0/public/{method}")
        };

        let resp = if private {
            self.send_private(&path, params).await?
        } else {
            self.send_public(&path, params).await?
        };

        let status = resp.status();
        debug!("[kraken] {path} -> {status}");
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(TransportError::ServiceUnavailable);
        }
        if !status.is_success() {
            return Err(TransportError::Http(status.as_u16()));
        }

        resp.json::<Reply>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}
