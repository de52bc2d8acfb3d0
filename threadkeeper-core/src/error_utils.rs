use crate::error::*;
use std::time::Duration;
use tracing::{error, info, warn};

/// Classification helpers shared by every error in the workspace.
///
/// `is_retryable` and `retry_after` are informational: nothing in the
/// pipeline retries automatically, but the reporter surfaces them so an
/// operator knows whether re-running a batch is worthwhile.
pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn log_warn(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::RedditApi(e) => {
                error!("Reddit API error details: {:?}", e);
            }
            CoreError::BulkIndex(e) => {
                error!("Bulk index error details: {:?}", e);
            }
            CoreError::Render(e) => {
                error!("Render error details: {:?}", e);
            }
            CoreError::Storage(e) => {
                error!("Storage error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("CoreError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::RedditApi(e) => e.is_retryable(),
            CoreError::BulkIndex(e) => e.is_retryable(),
            CoreError::Render(e) => e.is_retryable(),
            CoreError::Network(_) => true,
            CoreError::Timeout { .. } => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after }) => {
                Some(Duration::from_secs(*retry_after))
            }
            CoreError::Timeout { seconds } => Some(Duration::from_secs(*seconds)),
            _ if self.is_retryable() => Some(Duration::from_secs(5)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::BulkIndex(e) => e.user_friendly_message(),
            CoreError::Render(e) => e.user_friendly_message(),
            CoreError::Storage(e) => e.user_friendly_message(),
            CoreError::DateParse(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::Timeout { seconds } => {
                format!("The operation did not finish within {} seconds.", seconds)
            }
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::RedditApi(_) => "REDDIT_API".to_string(),
            CoreError::BulkIndex(_) => "BULK_INDEX".to_string(),
            CoreError::Render(_) => "RENDER".to_string(),
            CoreError::Storage(_) => "STORAGE".to_string(),
            CoreError::DateParse(_) => "DATE_PARSE".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::Timeout { .. } => "TIMEOUT".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for RedditApiError {
    fn log_error(&self) -> &Self {
        error!("RedditApiError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("RedditApiError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            RedditApiError::RateLimitExceeded { .. } => true,
            RedditApiError::RequestTimeout => true,
            RedditApiError::ServerError { status_code } => *status_code >= 500,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            RedditApiError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ if self.is_retryable() => Some(Duration::from_secs(30)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => {
                "Reddit authentication failed. Please check your credentials.".to_string()
            }
            RedditApiError::RateLimitExceeded { retry_after } => format!(
                "Too many requests. Please wait {} seconds before trying again.",
                retry_after
            ),
            RedditApiError::Forbidden { resource } => format!(
                "Access denied to {}. You may not have permission to view this content.",
                resource
            ),
            RedditApiError::PostNotFound { post_id } => {
                format!("The post '{}' could not be found.", post_id)
            }
            RedditApiError::InvalidToken => {
                "Reddit authentication token is invalid. Please re-authenticate.".to_string()
            }
            RedditApiError::RequestTimeout => {
                "Request to Reddit timed out. Please try again.".to_string()
            }
            _ => "Reddit API error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => "REDDIT_AUTH_FAILED".to_string(),
            RedditApiError::RateLimitExceeded { .. } => "REDDIT_RATE_LIMIT".to_string(),
            RedditApiError::Forbidden { .. } => "REDDIT_FORBIDDEN".to_string(),
            RedditApiError::PostNotFound { .. } => "REDDIT_POST_NOT_FOUND".to_string(),
            RedditApiError::InvalidToken => "REDDIT_INVALID_TOKEN".to_string(),
            RedditApiError::RequestTimeout => "REDDIT_TIMEOUT".to_string(),
            RedditApiError::InvalidResponse { .. } => "REDDIT_INVALID_RESPONSE".to_string(),
            RedditApiError::ServerError { .. } => "REDDIT_SERVER_ERROR".to_string(),
        }
    }
}

impl ErrorExt for BulkIndexError {
    fn log_error(&self) -> &Self {
        error!("BulkIndexError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("BulkIndexError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            BulkIndexError::UnexpectedStatus { status_code, .. } => {
                *status_code == 429 || *status_code >= 500
            }
            BulkIndexError::RequestTimeout { .. } => true,
            BulkIndexError::MalformedPayload { .. } => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        if self.is_retryable() {
            Some(Duration::from_secs(10))
        } else {
            None
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            BulkIndexError::UnexpectedStatus { status_code, .. } => format!(
                "The comment index answered with status {}. It may be down.",
                status_code
            ),
            BulkIndexError::MalformedPayload { .. } => {
                "The comment index returned data in an unexpected format.".to_string()
            }
            BulkIndexError::RequestTimeout { .. } => {
                "The comment index did not answer in time.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            BulkIndexError::UnexpectedStatus { .. } => "BULK_INDEX_STATUS".to_string(),
            BulkIndexError::MalformedPayload { .. } => "BULK_INDEX_MALFORMED".to_string(),
            BulkIndexError::RequestTimeout { .. } => "BULK_INDEX_TIMEOUT".to_string(),
        }
    }
}

impl ErrorExt for RenderError {
    fn log_error(&self) -> &Self {
        error!("RenderError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("RenderError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            RenderError::SessionStart { .. } | RenderError::Navigation { .. }
        )
    }

    fn retry_after(&self) -> Option<Duration> {
        if self.is_retryable() {
            Some(Duration::from_secs(10))
        } else {
            None
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RenderError::SessionStart { .. } => {
                "Could not start the browser session. Is the WebDriver server running?"
                    .to_string()
            }
            RenderError::Navigation { url, .. } => format!("Could not load page {}.", url),
            RenderError::InvalidSelector { class_name } => {
                format!("The element class '{}' is not a valid selector.", class_name)
            }
            _ => "Page rendering failed. Please try again.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            RenderError::SessionStart { .. } => "RENDER_SESSION_START".to_string(),
            RenderError::Navigation { .. } => "RENDER_NAVIGATION".to_string(),
            RenderError::InvalidSelector { .. } => "RENDER_INVALID_SELECTOR".to_string(),
            RenderError::Query { .. } => "RENDER_QUERY".to_string(),
            RenderError::SessionClosed => "RENDER_SESSION_CLOSED".to_string(),
        }
    }
}

impl ErrorExt for StorageError {
    fn log_error(&self) -> &Self {
        error!("StorageError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("StorageError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            StorageError::DirectoryUnreadable { path } => {
                format!("Cannot read the comment directory {}.", path)
            }
            StorageError::AlreadyExists { path } => {
                format!("Comments were already saved to {}.", path)
            }
            StorageError::WriteFailed { path, .. } => {
                format!("Could not write comments to {}.", path)
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            StorageError::DirectoryUnreadable { .. } => "STORAGE_DIR_UNREADABLE".to_string(),
            StorageError::AlreadyExists { .. } => "STORAGE_ALREADY_EXISTS".to_string(),
            StorageError::WriteFailed { .. } => "STORAGE_WRITE_FAILED".to_string(),
        }
    }
}

impl ErrorExt for DateParseError {
    fn log_error(&self) -> &Self {
        error!("DateParseError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("DateParseError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        format!("Skipping a post title with an unreadable date ({}).", self)
    }

    fn error_code(&self) -> String {
        match self {
            DateParseError::UnknownMonth { .. } => "DATE_UNKNOWN_MONTH".to_string(),
            DateParseError::MissingDelimiter { .. } => "DATE_MISSING_DELIMITER".to_string(),
            DateParseError::InvalidNumber { .. } => "DATE_INVALID_NUMBER".to_string(),
            DateParseError::OutOfRange { .. } => "DATE_OUT_OF_RANGE".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn log_warn(&self) -> &Self {
        warn!("ConfigError (warning): {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false // Config errors need user intervention
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file {} not found.", path)
            }
            ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

/// Logs pipeline failures together with their code and operator message.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report_error(&self, error: &CoreError) {
        error.log_error();
        info!("Error code: {}", error.error_code());
        info!("User message: {}", error.user_friendly_message());
        if error.is_retryable() {
            if let Some(retry_after) = error.retry_after() {
                info!(
                    "Error is transient; re-running the batch after {:?} may succeed",
                    retry_after
                );
            }
        }
    }

    pub fn report_warning(&self, error: &CoreError) {
        error.log_warn();
    }
}
