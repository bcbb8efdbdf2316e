//! Remote collector client.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use wt_core::{Buckets, Identity};

/// Default request timeout for collector calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const TRACK_PATH: &[&str] = &["api", "track"];
const WEEKLY_REPORT_PATH: &[&str] = &["api", "report", "weekly"];

/// Collector errors.
///
/// Every variant counts as a delivery failure: the payload is buffered and
/// retried on the next sync tick.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The configured collector URL cannot be used.
    #[error("invalid collector URL {url}: {reason}")]
    InvalidUrl { url: String, reason: &'static str },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// Transport-level failure.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// The collector answered with a non-success status.
    #[error("collector rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    /// No answer within the delivery timeout.
    #[error("no response within {0:?}")]
    Timeout(Duration),
    /// Failed to parse a response body.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// One submission of buckets to the collector.
///
/// The collector adds submitted buckets to what it already holds for the
/// identity, so each payload must contain only time not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    /// Random id for correlating logs on both sides.
    pub submission_id: String,
    pub identity: Identity,
    pub captured_at: DateTime<Utc>,
    pub buckets: Buckets,
}

impl Delivery {
    pub fn new(identity: Identity, captured_at: DateTime<Utc>, buckets: Buckets) -> Self {
        Self {
            submission_id: Uuid::new_v4().to_string(),
            identity,
            captured_at,
            buckets,
        }
    }
}

/// Weekly totals as served by the collector's report endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    pub total_time: u64,
    pub productive_time: u64,
    pub unproductive_time: u64,
    pub neutral_time: u64,
    #[serde(default)]
    pub website_breakdown: Buckets,
}

/// Destination for snapshots.
pub trait Collector {
    /// Submits one delivery. `Ok` means the collector acknowledged it.
    fn deliver(
        &self,
        delivery: &Delivery,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// HTTP collector client.
///
/// # Thread Safety
///
/// The client is safe to clone and share across threads. Each clone shares
/// the underlying HTTP connection pool.
#[derive(Debug, Clone)]
pub struct HttpCollector {
    http: reqwest::Client,
    base: Url,
}

impl HttpCollector {
    /// Creates a client for the collector at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not an absolute `http`/`https` URL, or
    /// if the HTTP client fails to build.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DeliveryError> {
        let invalid = |reason| DeliveryError::InvalidUrl {
            url: base_url.to_string(),
            reason,
        };
        let base = Url::parse(base_url.trim()).map_err(|_| invalid("not an absolute URL"))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if base.cannot_be_a_base() {
            return Err(invalid("URL cannot have a path"));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DeliveryError::ClientBuild)?;

        Ok(Self { http, base })
    }

    /// Fetches the weekly report for `identity`.
    pub async fn weekly_report(&self, identity: &Identity) -> Result<WeeklyReport, DeliveryError> {
        let mut segments = WEEKLY_REPORT_PATH.to_vec();
        segments.push(identity.as_str());
        let url = self.endpoint(&segments);

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|err| DeliveryError::InvalidResponse(err.to_string()))
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

impl Collector for HttpCollector {
    async fn deliver(&self, delivery: &Delivery) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(self.endpoint(TRACK_PATH))
            .json(delivery)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
