use super::{CommentSource, StrategyKind};
use async_trait::async_trait;
use std::sync::Arc;
use threadkeeper_core::{
    BulkIndex, CommentList, CoreError, EmptyIndexPolicy, PostRecord, RetrievalResult,
};
use tracing::info;

/// Reads a post's comments from the bulk index in a single request.
pub struct BulkIndexStrategy {
    index: Arc<dyn BulkIndex>,
    empty_policy: EmptyIndexPolicy,
}

impl BulkIndexStrategy {
    pub fn new(index: Arc<dyn BulkIndex>, empty_policy: EmptyIndexPolicy) -> Self {
        Self {
            index,
            empty_policy,
        }
    }
}

#[async_trait]
impl CommentSource for BulkIndexStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BulkIndex
    }

    async fn fetch(&self, post: &PostRecord) -> Result<RetrievalResult, CoreError> {
        let bodies = self.index.comment_bodies(&post.identifier).await?;

        if !bodies.is_empty() {
            return Ok(RetrievalResult::complete(CommentList::from(bodies)));
        }

        match self.empty_policy {
            EmptyIndexPolicy::Stale => {
                info!(
                    "Bulk index has no comments for {} yet; treating it as not caught up",
                    post.identifier
                );
                Ok(RetrievalResult::incomplete(CommentList::new()))
            }
            EmptyIndexPolicy::Authoritative => {
                info!("Bulk index reports no comments for {}", post.identifier);
                Ok(RetrievalResult::complete(CommentList::new()))
            }
        }
    }
}
