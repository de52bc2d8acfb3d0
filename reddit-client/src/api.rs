use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::Duration;
use threadkeeper_core::{CommentNode, CoreError, RedditApiError};
use tracing::{debug, error, warn};

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<T>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionData {
    pub id: String,
    pub title: String,
    pub permalink: String,
    pub locked: bool,
    #[serde(default)]
    pub num_comments: u32,
    #[serde(default)]
    pub created_utc: f64,
}

/// A node of a comment listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum Thing {
    #[serde(rename = "t1")]
    Comment(CommentData),
    #[serde(rename = "more")]
    More(MoreData),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentData {
    pub id: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub parent_id: String,
    #[serde(default, deserialize_with = "deserialize_replies")]
    pub replies: Vec<Thing>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MoreData {
    pub id: String,
    pub parent_id: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub children: Vec<String>,
}

// Reddit sends `""` instead of an empty listing for comments without replies.
fn deserialize_replies<'de, D>(deserializer: D) -> Result<Vec<Thing>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Replies {
        Listing(RedditListing<Thing>),
        Empty(String),
        Missing,
    }

    Ok(match Replies::deserialize(deserializer)? {
        Replies::Listing(listing) => listing.data.children,
        Replies::Empty(_) | Replies::Missing => Vec::new(),
    })
}

#[derive(Debug, Deserialize)]
struct MoreChildrenResponse {
    json: MoreChildrenJson,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenJson {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
    data: Option<MoreChildrenData>,
}

#[derive(Debug, Deserialize)]
struct MoreChildrenData {
    things: Vec<Thing>,
}

impl From<Thing> for CommentNode {
    fn from(thing: Thing) -> Self {
        match thing {
            Thing::Comment(comment) => CommentNode::Comment {
                id: comment.id,
                body: comment.body,
                replies: comment.replies.into_iter().map(CommentNode::from).collect(),
            },
            Thing::More(more) => CommentNode::More {
                parent_id: more.parent_id,
                children: more.children,
                count: more.count,
            },
        }
    }
}

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    user_agent: String,
}

impl RedditApiClient {
    pub fn new(user_agent: String, min_request_interval: Duration) -> Result<Self, CoreError> {
        let rate_config = RateLimitConfig::min_interval(min_request_interval);
        let rate_limiter = Arc::new(RateLimiter::new(rate_config));

        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter,
            user_agent,
        })
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: Option<&[(&str, &str)]>,
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", REDDIT_API_BASE, endpoint);

        // One operation at a time, no faster than the configured ceiling
        let permit = self.rate_limiter.acquire_permit().await;
        debug!(
            "Acquired rate limit permit for {} {} after {:?}",
            method, endpoint, permit.queue_wait_time
        );

        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token)
            .header("User-Agent", &self.user_agent);

        if let Some(params) = query_params {
            request_builder = request_builder.query(params);
        }

        debug!("Making Reddit API request: {} {}", method, endpoint);
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    return Err(CoreError::RedditApi(RedditApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, endpoint);
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok());
        let api_error = error_for_status(status, endpoint, retry_after);
        Err(CoreError::RedditApi(api_error))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        access_token: &str,
        query_params: &[(&str, &str)],
    ) -> Result<T, CoreError> {
        let response = self
            .make_request(Method::GET, endpoint, access_token, Some(query_params))
            .await?;

        response.json::<T>().await.map_err(|e| {
            error!("Failed to parse response for {}: {}", endpoint, e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse response for {}", endpoint),
            })
        })
    }

    /// Looks up one submission by its base-36 id.
    pub async fn get_submission(
        &self,
        access_token: &str,
        post_id: &str,
    ) -> Result<SubmissionData, CoreError> {
        let fullname = format!("t3_{}", post_id);
        let listing: RedditListing<RedditListingChild<SubmissionData>> = self
            .get_json("/api/info", access_token, &[("id", fullname.as_str())])
            .await?;

        let submission = submission_from_listing(listing, post_id)?;

        debug!(
            "Submission {} locked={} ({} comments)",
            submission.id, submission.locked, submission.num_comments
        );
        Ok(submission)
    }

    /// First page of a post's comment tree.
    pub async fn get_comment_tree(
        &self,
        access_token: &str,
        post_id: &str,
    ) -> Result<Vec<Thing>, CoreError> {
        let endpoint = format!("/comments/{}", post_id);
        let (_post, comments): (IgnoredAny, RedditListing<Thing>) = self
            .get_json(
                &endpoint,
                access_token,
                &[("limit", "500"), ("raw_json", "1")],
            )
            .await
            .map_err(|e| not_found_as_post(e, post_id))?;

        Ok(comments.data.children)
    }

    /// Resolves the ids of a "load more comments" placeholder.
    pub async fn get_more_children(
        &self,
        access_token: &str,
        post_id: &str,
        children: &[String],
    ) -> Result<Vec<Thing>, CoreError> {
        let link_id = format!("t3_{}", post_id);
        let children = children.join(",");
        let response: MoreChildrenResponse = self
            .get_json(
                "/api/morechildren",
                access_token,
                &[
                    ("api_type", "json"),
                    ("link_id", link_id.as_str()),
                    ("children", children.as_str()),
                    ("limit_children", "false"),
                    ("raw_json", "1"),
                ],
            )
            .await?;

        if !response.json.errors.is_empty() {
            return Err(CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("morechildren errors: {:?}", response.json.errors),
            }));
        }

        Ok(response
            .json
            .data
            .map(|data| data.things)
            .unwrap_or_default())
    }

    /// Replies below one comment, for "continue this thread" placeholders.
    pub async fn get_comment_subtree(
        &self,
        access_token: &str,
        post_id: &str,
        comment_id: &str,
    ) -> Result<Vec<Thing>, CoreError> {
        let endpoint = format!("/comments/{}/_/{}", post_id, comment_id);
        let (_post, comments): (IgnoredAny, RedditListing<Thing>) = self
            .get_json(&endpoint, access_token, &[("raw_json", "1")])
            .await
            .map_err(|e| not_found_as_post(e, post_id))?;

        let replies = comments
            .data
            .children
            .into_iter()
            .find_map(|thing| match thing {
                Thing::Comment(comment) if comment.id == comment_id => Some(comment.replies),
                _ => None,
            })
            .unwrap_or_default();
        Ok(replies)
    }

    pub async fn get_rate_limit_status(&self) -> crate::rate_limiter::RateLimitStatus {
        self.rate_limiter.get_rate_limit_status().await
    }
}

/// Maps a failed response onto the API error the callers react to.
fn error_for_status(
    status: StatusCode,
    endpoint: &str,
    retry_after: Option<u64>,
) -> RedditApiError {
    match status.as_u16() {
        429 => {
            let retry_after = retry_after.unwrap_or(60);
            warn!("Rate limited, retry after {} seconds", retry_after);
            RedditApiError::RateLimitExceeded { retry_after }
        }
        401 => RedditApiError::InvalidToken,
        403 => RedditApiError::Forbidden {
            resource: endpoint.to_string(),
        },
        404 => RedditApiError::PostNotFound {
            post_id: endpoint.to_string(),
        },
        code if status.is_server_error() => RedditApiError::ServerError { status_code: code },
        code => RedditApiError::InvalidResponse {
            details: format!("Unexpected status {} for {}", code, endpoint),
        },
    }
}

/// `/api/info` answers an unknown id with an empty listing rather than a 404.
fn submission_from_listing(
    listing: RedditListing<RedditListingChild<SubmissionData>>,
    post_id: &str,
) -> Result<SubmissionData, RedditApiError> {
    listing
        .data
        .children
        .into_iter()
        .next()
        .map(|child| child.data)
        .ok_or_else(|| RedditApiError::PostNotFound {
            post_id: post_id.to_string(),
        })
}

fn not_found_as_post(error: CoreError, post_id: &str) -> CoreError {
    match error {
        CoreError::RedditApi(RedditApiError::PostNotFound { .. }) => {
            CoreError::RedditApi(RedditApiError::PostNotFound {
                post_id: post_id.to_string(),
            })
        }
        other => other,
    }
}
