//! Search analytics reporting client.
//!
//! Wraps the `searchAnalytics.query` endpoint of the Search Console API. One
//! call per property, no pagination.

use crate::utils::encode_path_segment;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// A single result row exactly as returned by the API.
///
/// Field order follows the response document (`keys`, `clicks`,
/// `impressions`, `ctr`, `position` for the current API).
pub type ResultRow = serde_json::Map<String, serde_json::Value>;

/// The body of a `searchAnalytics.query` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub start_date: String,
    pub end_date: String,
    pub dimensions: Vec<String>,
    pub row_limit: u32,
}

impl QueryRequest {
    /// Top queries for a date range. Dates are passed through as given.
    pub fn top_queries(start_date: &str, end_date: &str, row_limit: u32) -> Self {
        QueryRequest {
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            dimensions: vec!["query".to_string()],
            row_limit,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// Absent when the property has no data for the range.
    #[serde(default)]
    pub rows: Vec<ResultRow>,
    #[serde(default)]
    pub response_aggregation_type: Option<String>,
}

#[derive(Error, Debug)]
pub enum ReportingError {
    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unexpected response body: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

/// An authenticated handle to the reporting service.
pub struct ReportClient {
    http: Client,
    api_base: Url,
    access_token: String,
}

impl ReportClient {
    pub fn new(http: Client, api_base: Url, access_token: String) -> Self {
        ReportClient {
            http,
            api_base,
            access_token,
        }
    }

    /// The endpoint URL for one property.
    pub fn endpoint(&self, site_url: &str) -> String {
        format!(
            "{}/webmasters/v3/sites/{}/searchAnalytics/query",
            self.api_base.as_str().trim_end_matches('/'),
            encode_path_segment(site_url)
        )
    }

    /// Runs one search analytics query for `site_url`.
    pub async fn query(
        &self,
        site_url: &str,
        request: &QueryRequest,
    ) -> Result<QueryResponse, ReportingError> {
        let endpoint = self.endpoint(site_url);
        tracing::debug!(%endpoint, ?request, "Querying search analytics");

        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.access_token)
            .json(request)
            .send()
            .await
            .map_err(ReportingError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(ReportingError::Transport)?;

        if !status.is_success() {
            return Err(ReportingError::Api {
                status,
                message: api_error_message(&body),
            });
        }

        if body.trim().is_empty() {
            return Ok(QueryResponse::default());
        }
        serde_json::from_str(&body).map_err(ReportingError::Decode)
    }
}

/// Pulls the human readable message out of a Google API error envelope,
/// falling back to the raw body.
fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(status) if !envelope.error.message.is_empty() => {
                format!("{} ({})", envelope.error.message, status)
            }
            Some(status) => status,
            None => envelope.error.message,
        },
        Err(_) => body.trim().to_string(),
    }
}
