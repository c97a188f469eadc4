//! `AgroSmart` server HTTP client.
//!
//! One request per call; connectivity failures come back as
//! [`ClientError::Unreachable`] and are never retried here.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use agrosmart_core::{SensorReport, ZoneId, ZoneOverview, ZoneSettings};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Dashboard client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server could not be reached; trying again later may succeed.
    #[error("Cannot reach AgroSmart server at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server error ({status}): {detail}")]
    Api { status: u16, detail: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}

/// Server reply to a sensor report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PumpCommand {
    pub pump_on: bool,
    pub message: String,
}

/// Server health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Client for one `AgroSmart` server.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    http: reqwest::Client,
    base_url: String,
}

impl DashboardClient {
    /// Create a client for `base_url` (e.g. `http://127.0.0.1:8000`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "server URL must start with http:// or https://, got '{base_url}'"
            )));
        }

        // reqwest is built without a crypto provider; Err means one is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn classify(&self, e: reqwest::Error) -> ClientError {
        if e.is_connect() || e.is_timeout() {
            ClientError::Unreachable {
                url: self.base_url.clone(),
                reason: if e.is_timeout() {
                    "request timed out".into()
                } else {
                    "connection failed".into()
                },
            }
        } else {
            ClientError::Http(e)
        }
    }

    /// Turn a non-success response into [`ClientError::Api`], using the
    /// server's `detail` when present.
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let detail = match resp.json::<ErrorBody>().await {
            Ok(body) => body.detail,
            Err(_) => status.canonical_reason().unwrap_or("Unknown").into(),
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            detail,
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let resp = request.send().await.map_err(|e| self.classify(e))?;
        let resp = Self::check(resp).await?;
        resp.json().await.map_err(|e| self.classify(e))
    }

    pub async fn health(&self) -> Result<Health, ClientError> {
        self.send(self.http.get(self.url("/health"))).await
    }

    /// Latest readings of every zone, ordered by zone id.
    pub async fn zones(&self) -> Result<Vec<(ZoneId, ZoneOverview)>, ClientError> {
        let body: HashMap<String, ZoneOverview> =
            self.send(self.http.get(self.url("/zones"))).await?;
        let mut zones = body
            .into_iter()
            .map(|(label, zone)| {
                label
                    .parse::<ZoneId>()
                    .map(|id| (id, zone))
                    .map_err(|e| ClientError::Config(format!("unexpected zone key: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        zones.sort_by_key(|(id, _)| *id);
        debug!(zones = zones.len(), "Fetched zones");
        Ok(zones)
    }

    pub async fn zone(&self, zone: ZoneId) -> Result<ZoneOverview, ClientError> {
        self.send(self.http.get(self.url(&format!("/zones/{zone}"))))
            .await
    }

    /// Request manual watering; returns the server's confirmation message.
    pub async fn water(&self, zone: ZoneId, amount: Option<u32>) -> Result<String, ClientError> {
        let mut request = self.http.post(self.url(&format!("/zones/{zone}/water")));
        if let Some(amount) = amount {
            request = request.json(&json!({ "amount": amount }));
        }
        let reply: Message = self.send(request).await?;
        Ok(reply.message)
    }

    pub async fn configure(
        &self,
        zone: ZoneId,
        settings: &ZoneSettings,
    ) -> Result<ZoneOverview, ClientError> {
        self.send(
            self.http
                .put(self.url(&format!("/zones/{zone}")))
                .json(settings),
        )
        .await
    }

    /// Submit a reading as a sensor node would.
    pub async fn report(
        &self,
        zone: ZoneId,
        report: &SensorReport,
    ) -> Result<PumpCommand, ClientError> {
        self.send(
            self.http
                .post(self.url(&format!("/report/{zone}")))
                .json(report),
        )
        .await
    }
}
