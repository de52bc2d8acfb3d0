use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const CONFIG_PATH_VAR: &str = "THREADKEEPER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "threadkeeper.toml";

/// How an empty answer from the bulk index is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyIndexPolicy {
    /// Zero rows mean the index has not caught up; fall back to the API.
    #[default]
    Stale,
    /// Zero rows mean the post really has no comments.
    Authoritative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderBackend {
    #[default]
    Webdriver,
    Static,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub subreddit: String,
    pub listing_url: String,
    pub backfill_days: u32,
    pub poll_interval_secs: u64,
    pub empty_index_policy: EmptyIndexPolicy,
    pub removed_markers: Vec<String>,
    pub expansion_timeout_secs: Option<u64>,
    pub reddit: RedditSettings,
    pub pushshift: PushshiftSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_agent: String,
    pub min_request_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PushshiftSettings {
    pub base_url: String,
    pub limit: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub backend: RenderBackend,
    pub webdriver_url: String,
    pub title_class: String,
    pub link_class: String,
    pub comment_class: String,
}

/// Credentials for the password grant, all present.
#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("comments"),
            subreddit: "wallstreetbets".to_string(),
            listing_url:
                "https://www.reddit.com/r/wallstreetbets/?f=flair_name%3A%22Daily%20Discussion%22"
                    .to_string(),
            backfill_days: 30,
            poll_interval_secs: 10,
            empty_index_policy: EmptyIndexPolicy::default(),
            removed_markers: vec!["[removed]".to_string()],
            expansion_timeout_secs: None,
            reddit: RedditSettings::default(),
            pushshift: PushshiftSettings::default(),
            render: RenderSettings::default(),
        }
    }
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            username: None,
            password: None,
            user_agent: "threadkeeper/0.1 comment archiver".to_string(),
            min_request_interval_ms: 1000, // Reddit allows one operation per second
        }
    }
}

impl Default for PushshiftSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.pushshift.io".to_string(),
            limit: 20000,
            timeout_secs: 60,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            backend: RenderBackend::default(),
            webdriver_url: "http://localhost:9515".to_string(),
            title_class: "_eYtD2XCVieq6emjKBH3m".to_string(),
            link_class: "SQnoC3ObvgnGjWt90zD9Z _2INHSNB8V5eaWp4P0rY_mE".to_string(),
            comment_class: "_1qeIAgB0cPwnLhDF9XSiJM".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads the file named by `THREADKEEPER_CONFIG`, or `threadkeeper.toml`
    /// when present, then applies credential environment variables.
    pub async fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(Path::new(&path)).await?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE)).await?
            }
            Err(_) => {
                info!("No configuration file found, using defaults");
                Self::default()
            }
        };

        config.reddit.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|_| ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backfill_days == 0 {
            return Err(ConfigError::InvalidValue {
                field: "backfill_days".to_string(),
                value: "0".to_string(),
            });
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval_secs".to_string(),
                value: "0".to_string(),
            });
        }
        if self.subreddit.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "subreddit".to_string(),
            });
        }
        if self.reddit.user_agent.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "reddit.user_agent".to_string(),
            });
        }
        if self.pushshift.limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pushshift.limit".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn expansion_timeout(&self) -> Option<Duration> {
        self.expansion_timeout_secs.map(Duration::from_secs)
    }
}

impl RedditSettings {
    fn apply_env_overrides(&mut self) {
        let overrides = [
            ("REDDIT_CLIENT_ID", &mut self.client_id),
            ("REDDIT_CLIENT_SECRET", &mut self.client_secret),
            ("REDDIT_USERNAME", &mut self.username),
            ("REDDIT_PASSWORD", &mut self.password),
        ];
        for (var_name, slot) in overrides {
            if let Ok(value) = std::env::var(var_name) {
                debug!("Using {} from the environment", var_name);
                *slot = Some(value);
            }
        }
    }

    pub fn credentials(&self) -> Result<RedditCredentials, ConfigError> {
        fn required(value: &Option<String>, field: &str) -> Result<String, ConfigError> {
            value
                .as_ref()
                .filter(|v| !v.trim().is_empty())
                .cloned()
                .ok_or_else(|| ConfigError::MissingField {
                    field: format!("reddit.{}", field),
                })
        }

        Ok(RedditCredentials {
            client_id: required(&self.client_id, "client_id")?,
            client_secret: required(&self.client_secret, "client_secret")?,
            username: required(&self.username, "username")?,
            password: required(&self.password, "password")?,
        })
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.backfill_days, 30);
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.empty_index_policy, EmptyIndexPolicy::Stale);
        assert_eq!(config.removed_markers, vec!["[removed]".to_string()]);
        assert_eq!(
            config.reddit.min_request_interval(),
            Duration::from_secs(1)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            output_dir = "/data/wsb"
            empty_index_policy = "authoritative"

            [reddit]
            client_id = "abc"

            [render]
            backend = "static"
            "#,
        )
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/data/wsb"));
        assert_eq!(config.empty_index_policy, EmptyIndexPolicy::Authoritative);
        assert_eq!(config.reddit.client_id.as_deref(), Some("abc"));
        assert_eq!(config.render.backend, RenderBackend::Static);
        assert_eq!(config.subreddit, "wallstreetbets");
        assert_eq!(config.pushshift.limit, 20000);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let result = AppConfig::from_toml_str("backfill_days = \"thirty\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation_rejects_zero_poll_interval() {
        let config = AppConfig {
            poll_interval_secs: 0,
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "poll_interval_secs"
        ));
    }

    #[test]
    fn test_missing_credentials() {
        let settings = RedditSettings {
            client_id: Some("id".to_string()),
            client_secret: Some("secret".to_string()),
            username: Some("   ".to_string()),
            password: None,
            ..RedditSettings::default()
        };

        match settings.credentials() {
            Err(ConfigError::MissingField { field }) => assert_eq!(field, "reddit.username"),
            other => panic!("expected missing username, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_from_file_not_found() {
        let path = std::env::temp_dir().join(format!("threadkeeper_{}.toml", uuid::Uuid::new_v4()));
        let result = AppConfig::from_file(&path).await;
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }
}
