use crate::oracle::find_open_post;
use crate::store::CommentStore;
use crate::strategies::{CommentSource, StrategyKind};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use threadkeeper_core::{
    CommentList, CoreError, ErrorExt, ErrorReporter, LinkMap, LockOracle, PostCategory,
    PostRecord, RetrievalResult, StorageError,
};
use tracing::{debug, info, warn};

/// Terminal state of one post in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    Persisted {
        source: StrategyKind,
        comments: usize,
        path: PathBuf,
    },
    /// An artifact already exists for the key.
    Skipped,
    /// Still open; the realtime driver owns it.
    Deferred,
    Failed {
        error_code: String,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub category: PostCategory,
    pub outcomes: Vec<(NaiveDate, PostOutcome)>,
}

impl RunReport {
    fn new(category: PostCategory) -> Self {
        Self {
            category,
            outcomes: Vec::new(),
        }
    }

    pub fn persisted(&self) -> usize {
        self.count(|o| matches!(o, PostOutcome::Persisted { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, PostOutcome::Skipped))
    }

    pub fn deferred(&self) -> usize {
        self.count(|o| matches!(o, PostOutcome::Deferred))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, PostOutcome::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&PostOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| predicate(o)).count()
    }
}

/// Decides per post which strategy to run and persists the result at most
/// once per (category, date).
pub struct RetrievalOrchestrator {
    store: CommentStore,
    oracle: Arc<dyn LockOracle>,
    bulk: Arc<dyn CommentSource>,
    exhaustive: Arc<dyn CommentSource>,
    live: Arc<dyn CommentSource>,
    removed_markers: Vec<String>,
    reporter: ErrorReporter,
}

impl RetrievalOrchestrator {
    pub fn new(
        store: CommentStore,
        oracle: Arc<dyn LockOracle>,
        bulk: Arc<dyn CommentSource>,
        exhaustive: Arc<dyn CommentSource>,
        live: Arc<dyn CommentSource>,
        removed_markers: Vec<String>,
    ) -> Self {
        Self {
            store,
            oracle,
            bulk,
            exhaustive,
            live,
            removed_markers,
            reporter: ErrorReporter::new(),
        }
    }

    pub fn store(&self) -> &CommentStore {
        &self.store
    }

    /// Harvests every locked post in `links` that has no artifact yet.
    /// A failing post is reported and the run moves on.
    pub async fn harvest_locked(&self, category: PostCategory, links: &LinkMap) -> RunReport {
        let mut report = RunReport::new(category);

        for record in links.values() {
            let outcome = match self.harvest_locked_post(category, record).await {
                Ok(outcome) => outcome,
                Err(e) => self.failed(record, e),
            };
            report.outcomes.push((record.date, outcome));
        }

        info!(
            "{} run: {} persisted, {} skipped, {} deferred, {} failed",
            category,
            report.persisted(),
            report.skipped(),
            report.deferred(),
            report.failed()
        );
        report
    }

    async fn harvest_locked_post(
        &self,
        category: PostCategory,
        record: &PostRecord,
    ) -> Result<PostOutcome, CoreError> {
        if self.store.already_stored(category, record.date).await? {
            debug!("{} {} is already stored", category, record.date);
            return Ok(PostOutcome::Skipped);
        }

        if !self.oracle.is_locked(&record.identifier).await? {
            info!(
                "{} ({}) is still open; leaving it for live capture",
                record.identifier, record.date
            );
            return Ok(PostOutcome::Deferred);
        }

        let (source, result) = self.fetch_locked(record).await?;
        self.persist(category, record, source, result.comments).await
    }

    /// Bulk index first; the authenticated API when the index is behind or
    /// unavailable.
    async fn fetch_locked(
        &self,
        record: &PostRecord,
    ) -> Result<(StrategyKind, RetrievalResult), CoreError> {
        match self.bulk.fetch(record).await {
            Ok(result) if result.complete => return Ok((self.bulk.kind(), result)),
            Ok(_) => info!(
                "Falling back to the {} for {}",
                self.exhaustive.kind(),
                record.identifier
            ),
            Err(e) => {
                self.reporter.report_warning(&e);
                warn!(
                    "{} failed for {}; falling back to the {}",
                    self.bulk.kind(),
                    record.identifier,
                    self.exhaustive.kind()
                );
            }
        }

        let result = self.exhaustive.fetch(record).await?;
        Ok((self.exhaustive.kind(), result))
    }

    /// Live-captures the first open post of `links`, if any, and persists
    /// it once it locks.
    pub async fn harvest_unlocked(
        &self,
        category: PostCategory,
        links: &LinkMap,
    ) -> Option<(NaiveDate, PostOutcome)> {
        let Some(record) = find_open_post(self.oracle.as_ref(), links).await else {
            info!("No open {} post to capture", category);
            return None;
        };

        info!(
            "Capturing {} post {} ({}) until it locks",
            category, record.identifier, record.date
        );
        let outcome = match self.capture_open_post(category, record).await {
            Ok(outcome) => outcome,
            Err(e) => self.failed(record, e),
        };
        Some((record.date, outcome))
    }

    async fn capture_open_post(
        &self,
        category: PostCategory,
        record: &PostRecord,
    ) -> Result<PostOutcome, CoreError> {
        let result = self.live.fetch(record).await?;

        if self.store.already_stored(category, record.date).await? {
            info!(
                "{} {} was stored while polling; discarding {} comments",
                category,
                record.date,
                result.comments.len()
            );
            return Ok(PostOutcome::Skipped);
        }

        if result.complete {
            return self
                .persist(category, record, self.live.kind(), result.comments)
                .await;
        }

        // Locked before the first poll; the locked-post path has the full data
        info!(
            "{} locked before live capture started; collecting it as a locked post",
            record.identifier
        );
        let (source, result) = self.fetch_locked(record).await?;
        self.persist(category, record, source, result.comments).await
    }

    async fn persist(
        &self,
        category: PostCategory,
        record: &PostRecord,
        source: StrategyKind,
        comments: CommentList,
    ) -> Result<PostOutcome, CoreError> {
        let collected = comments.len();
        let cleaned = comments.without_markers(&self.removed_markers);
        debug!(
            "Dropped {} removed comments from {}",
            collected - cleaned.len(),
            record.identifier
        );

        match self.store.write(category, record.date, &cleaned).await {
            Ok(path) => {
                info!(
                    "Persisted {} comments of {} from the {}",
                    cleaned.len(),
                    record.identifier,
                    source
                );
                Ok(PostOutcome::Persisted {
                    source,
                    comments: cleaned.len(),
                    path,
                })
            }
            Err(CoreError::Storage(StorageError::AlreadyExists { path })) => {
                warn!("{} appeared during the run; keeping it", path);
                Ok(PostOutcome::Skipped)
            }
            Err(e) => Err(e),
        }
    }

    fn failed(&self, record: &PostRecord, error: CoreError) -> PostOutcome {
        warn!("Harvest of {} ({}) failed", record.identifier, record.date);
        self.reporter.report_error(&error);
        PostOutcome::Failed {
            error_code: error.error_code(),
            message: error.user_friendly_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use threadkeeper_core::RedditApiError;
    use uuid::Uuid;

    struct Locked(bool);

    #[async_trait]
    impl LockOracle for Locked {
        async fn is_locked(&self, _identifier: &str) -> Result<bool, CoreError> {
            Ok(self.0)
        }
    }

    struct Canned {
        kind: StrategyKind,
        result: Option<RetrievalResult>,
        calls: AtomicUsize,
    }

    impl Canned {
        fn new(kind: StrategyKind, result: Option<RetrievalResult>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                result,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CommentSource for Canned {
        fn kind(&self) -> StrategyKind {
            self.kind
        }

        async fn fetch(&self, post: &PostRecord) -> Result<RetrievalResult, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().ok_or_else(|| {
                RedditApiError::PostNotFound {
                    post_id: post.identifier.clone(),
                }
                .into()
            })
        }
    }

    fn comments(values: &[&str]) -> CommentList {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn links() -> LinkMap {
        let date = NaiveDate::from_ymd_opt(2021, 11, 5).unwrap();
        LinkMap::from([(
            date,
            PostRecord {
                date,
                identifier: "qnabc1".to_string(),
                url: "https://www.reddit.com/r/wallstreetbets/comments/qnabc1/".to_string(),
            },
        )])
    }

    fn store() -> CommentStore {
        let dir = format!("threadkeeper-orchestrator-{}", Uuid::new_v4());
        CommentStore::new(std::env::temp_dir().join(dir))
    }

    #[tokio::test]
    async fn test_open_post_is_deferred() {
        let bulk = Canned::new(StrategyKind::BulkIndex, None);
        let api = Canned::new(StrategyKind::AuthenticatedApi, None);
        let live = Canned::new(StrategyKind::LivePoll, None);
        let orchestrator = RetrievalOrchestrator::new(
            store(),
            Arc::new(Locked(false)),
            bulk.clone(),
            api.clone(),
            live,
            vec!["[removed]".to_string()],
        );

        let report = orchestrator
            .harvest_locked(PostCategory::DailyDiscussion, &links())
            .await;
        assert_eq!(report.deferred(), 1);
        assert_eq!(bulk.calls() + api.calls(), 0);
    }

    #[tokio::test]
    async fn test_bulk_error_falls_back_and_failure_is_reported() {
        let bulk = Canned::new(StrategyKind::BulkIndex, None);
        let api = Canned::new(StrategyKind::AuthenticatedApi, None);
        let live = Canned::new(StrategyKind::LivePoll, None);
        let orchestrator = RetrievalOrchestrator::new(
            store(),
            Arc::new(Locked(true)),
            bulk.clone(),
            api.clone(),
            live,
            vec![],
        );

        let report = orchestrator
            .harvest_locked(PostCategory::DailyDiscussion, &links())
            .await;
        assert_eq!((bulk.calls(), api.calls()), (1, 1));
        assert!(matches!(
            &report.outcomes[0].1,
            PostOutcome::Failed { error_code, .. } if error_code == "REDDIT_API"
        ));
    }

    #[tokio::test]
    async fn test_complete_bulk_result_is_cleaned_and_persisted() {
        let bulk = Canned::new(
            StrategyKind::BulkIndex,
            Some(RetrievalResult::complete(comments(&["a", "[removed]", "b"]))),
        );
        let api = Canned::new(StrategyKind::AuthenticatedApi, None);
        let live = Canned::new(StrategyKind::LivePoll, None);
        let orchestrator = RetrievalOrchestrator::new(
            store(),
            Arc::new(Locked(true)),
            bulk,
            api.clone(),
            live,
            vec!["[removed]".to_string()],
        );

        let report = orchestrator
            .harvest_locked(PostCategory::MovesTomorrow, &links())
            .await;
        assert_eq!(api.calls(), 0);
        match &report.outcomes[0].1 {
            PostOutcome::Persisted {
                source,
                comments,
                path,
            } => {
                assert_eq!(*source, StrategyKind::BulkIndex);
                assert_eq!(*comments, 2);
                assert_eq!(tokio::fs::read_to_string(path).await.unwrap(), "a\nb\n");
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        tokio::fs::remove_dir_all(orchestrator.store().dir())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_open_post_is_a_no_op() {
        let live = Canned::new(StrategyKind::LivePoll, None);
        let orchestrator = RetrievalOrchestrator::new(
            store(),
            Arc::new(Locked(true)),
            Canned::new(StrategyKind::BulkIndex, None),
            Canned::new(StrategyKind::AuthenticatedApi, None),
            live.clone(),
            vec![],
        );

        let outcome = orchestrator
            .harvest_unlocked(PostCategory::DailyDiscussion, &links())
            .await;
        assert!(outcome.is_none());
        assert_eq!(live.calls(), 0);
    }
}
