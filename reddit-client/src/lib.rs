pub mod api;
pub mod rate_limiter;


use api::RedditApiClient;
use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, ClientId, ClientSecret, ResourceOwnerPassword, ResourceOwnerUsername, Scope,
    TokenResponse, TokenUrl,
};
use std::time::{Duration, SystemTime};
use threadkeeper_core::{
    CommentForest, CommentNode, ConfigError, CoreError, LockOracle, RedditApiError,
    RedditSettings,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const AUTHORIZE_URL: &str = "https://www.reddit.com/api/v1/authorize";
const ACCESS_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

// Tokens are renewed this long before Reddit would reject them.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Script-app credentials for the OAuth2 password grant.
#[derive(Debug, Clone)]
pub struct RedditOAuth2Config {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
    pub min_request_interval: Duration,
}

impl RedditOAuth2Config {
    pub fn new(
        client_id: String,
        client_secret: String,
        username: String,
        password: String,
        user_agent: String,
    ) -> Self {
        Self {
            client_id,
            client_secret,
            username,
            password,
            user_agent,
            min_request_interval: Duration::from_secs(1),
        }
    }

    pub fn from_settings(settings: &RedditSettings) -> Result<Self, ConfigError> {
        let credentials = settings.credentials()?;
        Ok(Self {
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            username: credentials.username,
            password: credentials.password,
            user_agent: settings.user_agent.clone(),
            min_request_interval: settings.min_request_interval(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct RedditToken {
    pub access_token: String,
    pub expires_at: SystemTime,
    pub scope: Vec<String>,
}

impl RedditToken {
    pub fn is_expired(&self) -> bool {
        SystemTime::now() + EXPIRY_MARGIN >= self.expires_at
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    NotAuthenticated,
    Authenticated { expires_at: SystemTime },
    TokenExpired { expired_at: SystemTime },
}

/// Authenticated Reddit session: owns the token and the rate-limited API client.
pub struct RedditClient {
    config: RedditOAuth2Config,
    oauth_client: BasicClient,
    api: RedditApiClient,
    token: Mutex<Option<RedditToken>>,
}

impl RedditClient {
    pub fn new(config: RedditOAuth2Config) -> Result<Self, CoreError> {
        let auth_url = AuthUrl::new(AUTHORIZE_URL.to_string()).map_err(|e| {
            ConfigError::InvalidValue {
                field: "authorize_url".to_string(),
                value: e.to_string(),
            }
        })?;
        let token_url = TokenUrl::new(ACCESS_TOKEN_URL.to_string()).map_err(|e| {
            ConfigError::InvalidValue {
                field: "access_token_url".to_string(),
                value: e.to_string(),
            }
        })?;

        let oauth_client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        );
        let api = RedditApiClient::new(config.user_agent.clone(), config.min_request_interval)?;

        Ok(Self {
            config,
            oauth_client,
            api,
            token: Mutex::new(None),
        })
    }

    pub fn get_required_scopes() -> Vec<&'static str> {
        vec!["read"]
    }

    pub async fn get_auth_state(&self) -> AuthState {
        match self.token.lock().await.as_ref() {
            None => AuthState::NotAuthenticated,
            Some(token) if token.is_expired() => AuthState::TokenExpired {
                expired_at: token.expires_at,
            },
            Some(token) => AuthState::Authenticated {
                expires_at: token.expires_at,
            },
        }
    }

    pub async fn set_token(&self, token: RedditToken) {
        *self.token.lock().await = Some(token);
    }

    /// Runs the password grant and caches the resulting token.
    pub async fn authenticate(&self) -> Result<RedditToken, CoreError> {
        info!("Authenticating as u/{}", self.config.username);
        let username = ResourceOwnerUsername::new(self.config.username.clone());
        let password = ResourceOwnerPassword::new(self.config.password.clone());
        let mut request = self.oauth_client.exchange_password(&username, &password);
        for scope in Self::get_required_scopes() {
            request = request.add_scope(Scope::new(scope.to_string()));
        }

        let response = request.request_async(async_http_client).await.map_err(|e| {
            warn!("Password grant rejected: {}", e);
            RedditApiError::AuthenticationFailed {
                reason: e.to_string(),
            }
        })?;

        let lifetime = response
            .expires_in()
            .unwrap_or_else(|| Duration::from_secs(3600));
        let token = RedditToken {
            access_token: response.access_token().secret().clone(),
            expires_at: SystemTime::now() + lifetime,
            scope: response
                .scopes()
                .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
                .unwrap_or_default(),
        };

        debug!("Token valid for {:?}", lifetime);
        *self.token.lock().await = Some(token.clone());
        Ok(token)
    }

    async fn access_token(&self) -> Result<String, CoreError> {
        {
            let token = self.token.lock().await;
            if let Some(token) = token.as_ref().filter(|t| !t.is_expired()) {
                return Ok(token.access_token.clone());
            }
        }
        Ok(self.authenticate().await?.access_token)
    }

    /// Drops a token Reddit no longer accepts so the next call re-authenticates.
    async fn forget_rejected_token<T>(&self, result: Result<T, CoreError>) -> Result<T, CoreError> {
        if let Err(CoreError::RedditApi(RedditApiError::InvalidToken)) = &result {
            warn!("Access token rejected, clearing cached token");
            *self.token.lock().await = None;
        }
        result
    }

    pub fn api(&self) -> &RedditApiClient {
        &self.api
    }
}

#[async_trait]
impl LockOracle for RedditClient {
    async fn is_locked(&self, identifier: &str) -> Result<bool, CoreError> {
        let token = self.access_token().await?;
        let result = self.api.get_submission(&token, identifier).await;
        let submission = self.forget_rejected_token(result).await?;
        debug!("Post {} locked: {}", identifier, submission.locked);
        Ok(submission.locked)
    }
}

#[async_trait]
impl CommentForest for RedditClient {
    async fn top_level(&self, identifier: &str) -> Result<Vec<CommentNode>, CoreError> {
        let token = self.access_token().await?;
        let result = self.api.get_comment_tree(&token, identifier).await;
        let things = self.forget_rejected_token(result).await?;
        Ok(things.into_iter().map(CommentNode::from).collect())
    }

    async fn expand_more(
        &self,
        identifier: &str,
        children: &[String],
    ) -> Result<Vec<CommentNode>, CoreError> {
        let token = self.access_token().await?;
        let result = self
            .api
            .get_more_children(&token, identifier, children)
            .await;
        let things = self.forget_rejected_token(result).await?;
        Ok(things.into_iter().map(CommentNode::from).collect())
    }

    async fn continue_thread(
        &self,
        identifier: &str,
        parent_id: &str,
    ) -> Result<Vec<CommentNode>, CoreError> {
        let comment_id = parent_id.strip_prefix("t1_").unwrap_or(parent_id);
        let token = self.access_token().await?;
        let result = self
            .api
            .get_comment_subtree(&token, identifier, comment_id)
            .await;
        let things = self.forget_rejected_token(result).await?;
        Ok(things.into_iter().map(CommentNode::from).collect())
    }
}
