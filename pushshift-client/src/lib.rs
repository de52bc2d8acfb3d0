//! Client for the Pushshift comment index.
//!
//! Pushshift mirrors Reddit comments with a delay of hours to days, so an
//! empty answer for a recent thread usually means "not indexed yet".

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use threadkeeper_core::{BulkIndex, BulkIndexError, ConfigError, CoreError, PushshiftSettings};
use tracing::{debug, error, info};
use url::Url;

const COMMENT_SEARCH_PATH: &str = "reddit/comment/search/";

#[derive(Debug, Deserialize)]
struct CommentSearchResponse {
    data: Vec<CommentHit>,
}

#[derive(Debug, Deserialize)]
struct CommentHit {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Clone)]
pub struct PushshiftClient {
    http_client: Client,
    base_url: Url,
    limit: u32,
}

impl PushshiftClient {
    pub fn new(base_url: &str, limit: u32, timeout: Duration) -> Result<Self, CoreError> {
        // A trailing slash keeps `join` from replacing the last path segment
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| ConfigError::InvalidValue {
            field: "pushshift.base_url".to_string(),
            value: format!("{} ({})", base_url, e),
        })?;

        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url,
            limit,
        })
    }

    pub fn from_settings(settings: &PushshiftSettings) -> Result<Self, CoreError> {
        Self::new(
            &settings.base_url,
            settings.limit,
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub fn search_url(&self, thread_id: &str) -> Result<Url, CoreError> {
        let mut url = self
            .base_url
            .join(COMMENT_SEARCH_PATH)
            .map_err(|e| CoreError::Internal {
                message: format!("Cannot build comment search URL: {}", e),
            })?;
        url.query_pairs_mut()
            .append_pair("link_id", thread_id)
            .append_pair("limit", &self.limit.to_string())
            .append_pair("fields", "body");
        Ok(url)
    }

    pub async fn search_comments(&self, thread_id: &str) -> Result<Vec<String>, CoreError> {
        let url = self.search_url(thread_id)?;
        debug!("Querying comment index: {}", url);

        let response = self.http_client.get(url).send().await.map_err(|e| {
            error!("Comment index request failed for {}: {}", thread_id, e);
            if e.is_timeout() {
                CoreError::BulkIndex(BulkIndexError::RequestTimeout {
                    thread_id: thread_id.to_string(),
                })
            } else {
                CoreError::Network(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::BulkIndex(BulkIndexError::UnexpectedStatus {
                thread_id: thread_id.to_string(),
                status_code: status.as_u16(),
            }));
        }

        let body = response.text().await?;
        let bodies = parse_comment_bodies(thread_id, &body)?;
        info!("Comment index returned {} comments for {}", bodies.len(), thread_id);
        Ok(bodies)
    }
}

fn parse_comment_bodies(thread_id: &str, payload: &str) -> Result<Vec<String>, BulkIndexError> {
    let response: CommentSearchResponse =
        serde_json::from_str(payload).map_err(|e| BulkIndexError::MalformedPayload {
            thread_id: thread_id.to_string(),
            details: e.to_string(),
        })?;
    Ok(response.data.into_iter().map(|hit| hit.body).collect())
}

#[async_trait]
impl BulkIndex for PushshiftClient {
    async fn comment_bodies(&self, identifier: &str) -> Result<Vec<String>, CoreError> {
        self.search_comments(identifier).await
    }
}
