use super::{CommentSource, StrategyKind};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use threadkeeper_core::{
    CommentForest, CommentList, CommentNode, CoreError, PostRecord, RetrievalResult,
};
use tokio::time::Instant;
use tracing::{debug, info};

/// The forum resolves at most this many placeholder ids per request.
pub const MORE_CHILDREN_BATCH: usize = 100;

/// Walks the full comment tree through the authenticated API, resolving
/// every "load more" placeholder until none remain.
pub struct AuthenticatedApiStrategy {
    forest: Arc<dyn CommentForest>,
    deadline: Option<Duration>,
}

impl AuthenticatedApiStrategy {
    pub fn new(forest: Arc<dyn CommentForest>, deadline: Option<Duration>) -> Self {
        Self { forest, deadline }
    }

    /// Bodies in depth-first discovery order. Each comment id is emitted at
    /// most once even when placeholders overlap.
    pub async fn collect_comments(&self, identifier: &str) -> Result<CommentList, CoreError> {
        let started = Instant::now();
        let mut comments = CommentList::new();
        let mut seen_ids = HashSet::new();
        let mut continued = HashSet::new();
        let mut requests = 1usize;

        let mut stack = Vec::new();
        push_in_order(&mut stack, self.forest.top_level(identifier).await?);

        while let Some(node) = stack.pop() {
            self.check_deadline(started, identifier)?;

            match node {
                CommentNode::Comment { id, body, replies } => {
                    if !seen_ids.insert(id) {
                        continue;
                    }
                    comments.push(body);
                    push_in_order(&mut stack, replies);
                }
                CommentNode::More {
                    parent_id,
                    children,
                    count,
                } if children.is_empty() => {
                    if is_post_fullname(&parent_id) || !continued.insert(parent_id.clone()) {
                        continue;
                    }
                    debug!("Continuing thread below {} (~{} comments)", parent_id, count);
                    requests += 1;
                    let replies = self.forest.continue_thread(identifier, &parent_id).await?;
                    push_in_order(&mut stack, replies);
                }
                CommentNode::More { children, .. } => {
                    let mut expanded = Vec::new();
                    for batch in children.chunks(MORE_CHILDREN_BATCH) {
                        self.check_deadline(started, identifier)?;
                        requests += 1;
                        expanded.extend(self.forest.expand_more(identifier, batch).await?);
                    }
                    debug!(
                        "Expanded {} placeholder ids into {} nodes",
                        children.len(),
                        expanded.len()
                    );
                    push_in_order(&mut stack, expanded);
                }
            }
        }

        info!(
            "Collected {} comments for {} in {} requests ({:.1}s)",
            comments.len(),
            identifier,
            requests,
            started.elapsed().as_secs_f64()
        );
        Ok(comments)
    }

    fn check_deadline(&self, started: Instant, identifier: &str) -> Result<(), CoreError> {
        match self.deadline {
            Some(limit) if started.elapsed() >= limit => {
                info!("Gave up expanding {} after {:?}", identifier, limit);
                Err(CoreError::Timeout {
                    seconds: limit.as_secs(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Pushes `nodes` so that the first of them is popped first.
fn push_in_order(stack: &mut Vec<CommentNode>, nodes: Vec<CommentNode>) {
    stack.extend(nodes.into_iter().rev());
}

/// A placeholder hanging directly off the post has no thread to continue.
fn is_post_fullname(id: &str) -> bool {
    id.starts_with("t3_")
}

#[async_trait]
impl CommentSource for AuthenticatedApiStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AuthenticatedApi
    }

    async fn fetch(&self, post: &PostRecord) -> Result<RetrievalResult, CoreError> {
        let comments = self.collect_comments(&post.identifier).await?;
        Ok(RetrievalResult::complete(comments))
    }
}
