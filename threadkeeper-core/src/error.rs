use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Reddit API error: {0}")]
    RedditApi(#[from] RedditApiError),

    #[error("Bulk index error: {0}")]
    BulkIndex(#[from] BulkIndexError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Date parse error: {0}")]
    DateParse(#[from] DateParseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Operation timeout after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum RedditApiError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Post not found: {post_id}")]
    PostNotFound { post_id: String },

    #[error("Invalid OAuth token")]
    InvalidToken,

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },
}

#[derive(Error, Debug, Clone)]
pub enum BulkIndexError {
    #[error("Bulk index returned status {status_code} for thread {thread_id}")]
    UnexpectedStatus { thread_id: String, status_code: u16 },

    #[error("Bulk index payload for thread {thread_id} could not be decoded: {details}")]
    MalformedPayload { thread_id: String, details: String },

    #[error("Bulk index request timed out for thread {thread_id}")]
    RequestTimeout { thread_id: String },
}

#[derive(Error, Debug, Clone)]
pub enum RenderError {
    #[error("Could not start rendering session: {reason}")]
    SessionStart { reason: String },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Invalid selector for class {class_name}")]
    InvalidSelector { class_name: String },

    #[error("Element query failed: {reason}")]
    Query { reason: String },

    #[error("Rendering session already closed")]
    SessionClosed,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Output directory unreadable: {path}")]
    DirectoryUnreadable { path: String },

    #[error("Artifact already exists: {path}")]
    AlreadyExists { path: String },

    #[error("Failed to write artifact {path}: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateParseError {
    #[error("Unknown month name: {month}")]
    UnknownMonth { month: String },

    #[error("Missing delimiter in date text: {text}")]
    MissingDelimiter { text: String },

    #[error("Invalid day or year in date text: {text}")]
    InvalidNumber { text: String },

    #[error("Date does not exist: {text}")]
    OutOfRange { text: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}
