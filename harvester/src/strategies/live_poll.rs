use super::{CommentSource, StrategyKind};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use threadkeeper_core::{
    CommentList, CoreError, LockOracle, PostRecord, Renderer, RetrievalResult,
};
use tracing::{debug, info, warn};

/// Comments gathered across polling cycles, deduplicated by exact text.
#[derive(Debug, Default)]
pub struct LiveAccumulator {
    comments: CommentList,
    seen: HashSet<String>,
}

impl LiveAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends every text not merged before, keeping snapshot order.
    /// Returns how many were new.
    pub fn merge(&mut self, snapshot: impl IntoIterator<Item = String>) -> usize {
        let mut added = 0;
        for text in snapshot {
            if text.is_empty() || self.seen.contains(&text) {
                continue;
            }
            self.seen.insert(text.clone());
            self.comments.push(text);
            added += 1;
        }
        added
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn into_comments(self) -> CommentList {
        self.comments
    }
}

/// Re-renders an open post until it locks, collecting every comment that
/// was ever visible.
pub struct LivePollStrategy {
    oracle: Arc<dyn LockOracle>,
    renderer: Arc<dyn Renderer>,
    comment_class: String,
    interval: Duration,
}

impl LivePollStrategy {
    pub fn new(
        oracle: Arc<dyn LockOracle>,
        renderer: Arc<dyn Renderer>,
        comment_class: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self {
            oracle,
            renderer,
            comment_class: comment_class.into(),
            interval,
        }
    }

    async fn snapshot(&self, url: &str) -> Result<Vec<String>, CoreError> {
        let mut session = self.renderer.open(url).await?;
        let texts = session.texts(&self.comment_class).await;
        if let Err(e) = session.close().await {
            warn!("Failed to close rendering session for {}: {}", url, e);
        }
        texts
    }
}

#[async_trait]
impl CommentSource for LivePollStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LivePoll
    }

    async fn fetch(&self, post: &PostRecord) -> Result<RetrievalResult, CoreError> {
        let mut accumulator = LiveAccumulator::new();
        let mut cycles = 0u32;

        while !self.oracle.is_locked(&post.identifier).await? {
            cycles += 1;
            let snapshot = self.snapshot(&post.url).await?;
            let visible = snapshot.len();
            let added = accumulator.merge(snapshot);

            info!(
                "Poll {} of {}: {} visible, {} new, {} collected",
                cycles,
                post.identifier,
                visible,
                added,
                accumulator.len()
            );
            debug!("Sleeping {:?} before the next poll", self.interval);
            tokio::time::sleep(self.interval).await;
        }

        if cycles == 0 {
            info!(
                "{} locked before it could be polled; nothing was captured",
                post.identifier
            );
            return Ok(RetrievalResult::incomplete(CommentList::new()));
        }

        info!(
            "{} locked after {} polls with {} comments",
            post.identifier,
            cycles,
            accumulator.len()
        );
        Ok(RetrievalResult::complete(accumulator.into_comments()))
    }
}
