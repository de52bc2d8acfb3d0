//! Ways of collecting every comment of a post.

mod authenticated;
mod bulk_index;
mod live_poll;

pub use authenticated::AuthenticatedApiStrategy;
pub use bulk_index::BulkIndexStrategy;
pub use live_poll::{LiveAccumulator, LivePollStrategy};

use async_trait::async_trait;
use std::fmt;
use threadkeeper_core::{CoreError, PostRecord, RetrievalResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    BulkIndex,
    AuthenticatedApi,
    LivePoll,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::BulkIndex => write!(f, "bulk index"),
            StrategyKind::AuthenticatedApi => write!(f, "authenticated API"),
            StrategyKind::LivePoll => write!(f, "live poll"),
        }
    }
}

#[async_trait]
pub trait CommentSource: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Collects the comments of `post`. An incomplete result tells the
    /// caller to try another source.
    async fn fetch(&self, post: &PostRecord) -> Result<RetrievalResult, CoreError>;
}
