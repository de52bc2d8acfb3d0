use async_trait::async_trait;
use chrono::{Datelike, Duration as DateDuration, NaiveDate, Weekday};
use harvester::{
    AuthenticatedApiStrategy, BackfillPlanner, BulkIndexStrategy, CommentSource, CommentStore,
    DiscoverySelectors, LinkDiscovery, LivePollStrategy, PostOutcome, RetrievalOrchestrator,
    StrategyKind,
};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use threadkeeper_core::{
    BulkIndex, CommentForest, CommentList, CommentNode, CoreError, EmptyIndexPolicy, LinkMap,
    LockOracle, PostCategory, PostRecord, RenderSession, Renderer,
};
use uuid::Uuid;

const TITLE_CLASS: &str = "title";
const LINK_CLASS: &str = "link";
const COMMENT_CLASS: &str = "comment";

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn temp_store() -> CommentStore {
    let dir = format!("threadkeeper-pipeline-{}", Uuid::new_v4());
    CommentStore::new(std::env::temp_dir().join(dir))
}

async fn artifact_names(dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return names;
    };
    while let Some(entry) = entries.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    names
}

fn nov(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 11, day).unwrap()
}

fn record(date: NaiveDate, identifier: &str) -> PostRecord {
    PostRecord {
        date,
        identifier: identifier.to_string(),
        url: format!(
            "https://www.reddit.com/r/wallstreetbets/comments/{}/daily_discussion_thread/",
            identifier
        ),
    }
}

/// Each id answers "open" for a fixed number of checks, then "locked".
/// Unknown ids are locked.
#[derive(Default)]
struct CountdownOracle {
    open_checks: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
}

impl CountdownOracle {
    fn open_for(identifier: &str, checks: usize) -> Self {
        let oracle = Self::default();
        oracle
            .open_checks
            .lock()
            .unwrap()
            .insert(identifier.to_string(), checks);
        oracle
    }
}

#[async_trait]
impl LockOracle for CountdownOracle {
    async fn is_locked(&self, identifier: &str) -> Result<bool, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut open_checks = self.open_checks.lock().unwrap();
        match open_checks.get_mut(identifier) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Ok(false)
            }
            _ => Ok(true),
        }
    }
}

#[derive(Default)]
struct CannedIndex {
    bodies: Vec<String>,
    calls: AtomicUsize,
}

#[async_trait]
impl BulkIndex for CannedIndex {
    async fn comment_bodies(&self, _identifier: &str) -> Result<Vec<String>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.bodies.clone())
    }
}

#[derive(Default)]
struct MemoryForest {
    top_level: Vec<CommentNode>,
    by_id: HashMap<String, CommentNode>,
    calls: AtomicUsize,
}

#[async_trait]
impl CommentForest for MemoryForest {
    async fn top_level(&self, _identifier: &str) -> Result<Vec<CommentNode>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.top_level.clone())
    }

    async fn expand_more(
        &self,
        _identifier: &str,
        children: &[String],
    ) -> Result<Vec<CommentNode>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(children.len() <= 100);
        Ok(children
            .iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect())
    }

    async fn continue_thread(
        &self,
        _identifier: &str,
        _parent_id: &str,
    ) -> Result<Vec<CommentNode>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Default)]
struct FakePage {
    titles: Vec<String>,
    hrefs: Vec<String>,
    comments: Vec<String>,
}

/// Serves queued pages in order, then empty ones. Records every URL opened
/// and counts closed sessions.
#[derive(Default)]
struct ScriptedRenderer {
    pages: Mutex<VecDeque<FakePage>>,
    opened: Mutex<Vec<String>>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedRenderer {
    fn with_pages(pages: Vec<FakePage>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            ..Self::default()
        }
    }

    fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn open(&self, url: &str) -> Result<Box<dyn RenderSession>, CoreError> {
        self.opened.lock().unwrap().push(url.to_string());
        let page = self.pages.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::new(FakeSession {
            page,
            closed: self.closed.clone(),
        }))
    }
}

struct FakeSession {
    page: FakePage,
    closed: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn texts(&self, class_name: &str) -> Result<Vec<String>, CoreError> {
        Ok(match class_name {
            TITLE_CLASS => self.page.titles.clone(),
            COMMENT_CLASS => self.page.comments.clone(),
            _ => Vec::new(),
        })
    }

    async fn attributes(
        &self,
        class_name: &str,
        attribute: &str,
    ) -> Result<Vec<String>, CoreError> {
        Ok(match (class_name, attribute) {
            (LINK_CLASS, "href") => self.page.hrefs.clone(),
            _ => Vec::new(),
        })
    }

    async fn close(&mut self) -> Result<(), CoreError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn discovery(renderer: Arc<ScriptedRenderer>) -> LinkDiscovery {
    LinkDiscovery::new(
        renderer,
        DiscoverySelectors {
            title_class: TITLE_CLASS.to_string(),
            link_class: LINK_CLASS.to_string(),
        },
    )
}

fn unused_source(kind: StrategyKind) -> Arc<dyn CommentSource> {
    struct Unused(StrategyKind);

    #[async_trait]
    impl CommentSource for Unused {
        fn kind(&self) -> StrategyKind {
            self.0
        }

        async fn fetch(
            &self,
            post: &PostRecord,
        ) -> Result<threadkeeper_core::RetrievalResult, CoreError> {
            panic!("{} must not fetch {}", self.0, post.identifier);
        }
    }

    Arc::new(Unused(kind))
}

#[tokio::test]
async fn test_second_locked_run_fetches_nothing() {
    init_logging();
    let store = temp_store();
    let index = Arc::new(CannedIndex {
        bodies: vec!["calls".to_string(), "puts".to_string()],
        ..CannedIndex::default()
    });
    let oracle = Arc::new(CountdownOracle::default());
    let orchestrator = RetrievalOrchestrator::new(
        store.clone(),
        oracle.clone(),
        Arc::new(BulkIndexStrategy::new(index.clone(), EmptyIndexPolicy::Stale)),
        unused_source(StrategyKind::AuthenticatedApi),
        unused_source(StrategyKind::LivePoll),
        vec!["[removed]".to_string()],
    );
    let links = LinkMap::from([(nov(5), record(nov(5), "qnabc1"))]);

    let first = orchestrator
        .harvest_locked(PostCategory::DailyDiscussion, &links)
        .await;
    assert_eq!(first.persisted(), 1);

    let oracle_calls = oracle.calls.load(Ordering::SeqCst);
    let second = orchestrator
        .harvest_locked(PostCategory::DailyDiscussion, &links)
        .await;
    assert_eq!(second.skipped(), 1);
    assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), oracle_calls);

    assert_eq!(
        artifact_names(store.dir()).await,
        vec!["Daily_Discussion_Thread_Comments_11-05-2021.txt"]
    );
    tokio::fs::remove_dir_all(store.dir()).await.unwrap();
}

#[tokio::test]
async fn test_backfill_searches_only_missing_weekdays() {
    init_logging();
    let store = temp_store();
    store
        .write(PostCategory::DailyDiscussion, nov(15), &CommentList::new())
        .await
        .unwrap();

    // The first search (November 1) also surfaces a second November 5 post
    let first_search = FakePage {
        titles: vec![
            "Daily Discussion Thread for November 01, 2021".to_string(),
            "Daily Discussion Thread for November 05, 2021".to_string(),
        ],
        hrefs: vec![
            "https://www.reddit.com/r/wallstreetbets/comments/qk0001/daily_discussion_thread_for_november_01_2021/".to_string(),
            "https://www.reddit.com/r/wallstreetbets/comments/qnzzzz/daily_discussion_thread_for_november_05_2021/".to_string(),
        ],
        comments: Vec::new(),
    };
    let renderer = Arc::new(ScriptedRenderer::with_pages(vec![first_search]));
    let planner = BackfillPlanner::new(
        discovery(renderer.clone()),
        store.clone(),
        "wallstreetbets",
        30,
    );

    let input = LinkMap::from([
        (nov(5), record(nov(5), "qnabc1")),
        (nov(10), record(nov(10), "qpabc2")),
    ]);
    let today = nov(30);
    let extended = planner
        .extend(input.clone(), PostCategory::DailyDiscussion, today)
        .await
        .unwrap();

    let expected: Vec<String> = (1..=30)
        .map(nov)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .filter(|d| ![nov(5), nov(10), nov(15)].contains(d))
        .map(|d| planner.search_url(PostCategory::DailyDiscussion, d))
        .collect();
    assert_eq!(expected.len(), 19);
    assert_eq!(renderer.opened(), expected);
    assert_eq!(
        renderer.closed.load(Ordering::SeqCst),
        expected.len(),
        "every session is closed"
    );

    // Superset of the input, existing records untouched
    assert!(input.iter().all(|(date, r)| extended.get(date) == Some(r)));
    assert_eq!(extended.len(), 3);
    assert_eq!(extended[&nov(1)].identifier, "qk0001");
    assert_eq!(extended[&nov(5)].identifier, "qnabc1");

    tokio::fs::remove_dir_all(store.dir()).await.unwrap();
}

#[tokio::test]
async fn test_backfill_never_searches_weekends() {
    let renderer = Arc::new(ScriptedRenderer::default());
    let planner = BackfillPlanner::new(
        discovery(renderer.clone()),
        temp_store(),
        "wallstreetbets",
        30,
    );

    let today = nov(30);
    planner
        .extend(LinkMap::new(), PostCategory::MovesTomorrow, today)
        .await
        .unwrap();

    let weekend_urls: Vec<String> = (0..30)
        .map(|offset| today - DateDuration::days(offset))
        .filter(|d| matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .map(|d| planner.search_url(PostCategory::MovesTomorrow, d))
        .collect();
    assert_eq!(weekend_urls.len(), 8);

    let opened = renderer.opened();
    assert_eq!(opened.len(), 22);
    assert!(opened.iter().all(|url| !weekend_urls.contains(url)));
}

#[tokio::test]
async fn test_empty_bulk_index_falls_back_to_full_tree() {
    init_logging();
    let store = temp_store();

    let mut forest = MemoryForest::default();
    let mut placeholder_ids = Vec::new();
    for i in 0..500 {
        let id = format!("c{}", i);
        let node = CommentNode::Comment {
            id: id.clone(),
            body: format!("comment {}", i),
            replies: Vec::new(),
        };
        if i < 200 {
            forest.top_level.push(node);
        } else {
            forest.by_id.insert(id.clone(), node);
            placeholder_ids.push(id);
        }
    }
    for i in 0..20 {
        let id = format!("r{}", i);
        let node = CommentNode::Comment {
            id: id.clone(),
            body: "[removed]".to_string(),
            replies: Vec::new(),
        };
        if i < 10 {
            forest.top_level.push(node);
        } else {
            forest.by_id.insert(id.clone(), node);
            placeholder_ids.push(id);
        }
    }
    forest.top_level.push(CommentNode::More {
        parent_id: "t3_qnabc1".to_string(),
        count: placeholder_ids.len() as u32,
        children: placeholder_ids,
    });
    let forest = Arc::new(forest);

    let index = Arc::new(CannedIndex::default());
    let orchestrator = RetrievalOrchestrator::new(
        store.clone(),
        Arc::new(CountdownOracle::default()),
        Arc::new(BulkIndexStrategy::new(index.clone(), EmptyIndexPolicy::Stale)),
        Arc::new(AuthenticatedApiStrategy::new(forest.clone(), None)),
        unused_source(StrategyKind::LivePoll),
        vec!["[removed]".to_string()],
    );
    let links = LinkMap::from([(nov(5), record(nov(5), "qnabc1"))]);

    let report = orchestrator
        .harvest_locked(PostCategory::DailyDiscussion, &links)
        .await;

    assert_eq!(index.calls.load(Ordering::SeqCst), 1);
    // One top-level request plus four batches for the 310 placeholder ids
    assert_eq!(forest.calls.load(Ordering::SeqCst), 5);

    let PostOutcome::Persisted {
        source,
        comments,
        path,
    } = &report.outcomes[0].1
    else {
        panic!("unexpected outcome {:?}", report.outcomes);
    };
    assert_eq!(*source, StrategyKind::AuthenticatedApi);
    assert_eq!(*comments, 500);

    let written = tokio::fs::read_to_string(path).await.unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 500);
    assert!(!lines.contains(&"[removed]"));
    assert_eq!(lines[0], "comment 0");
    assert_eq!(lines[499], "comment 499");

    tokio::fs::remove_dir_all(store.dir()).await.unwrap();
}

#[tokio::test]
async fn test_live_capture_converges_when_the_post_locks() {
    init_logging();
    let store = temp_store();
    let all: Vec<String> = (0..50).map(|i| format!("live comment {}", i)).collect();

    // The scan uses the first open answer; the loop sees four more and the
    // sixth check reports the post locked.
    let oracle = Arc::new(CountdownOracle::open_for("qnlive", 5));
    let snapshots = [0, 20, 35, 50]
        .into_iter()
        .map(|visible| FakePage {
            comments: all[..visible].to_vec(),
            ..FakePage::default()
        })
        .collect();
    let renderer = Arc::new(ScriptedRenderer::with_pages(snapshots));

    let live = LivePollStrategy::new(
        oracle.clone(),
        renderer.clone(),
        COMMENT_CLASS,
        Duration::ZERO,
    );
    let orchestrator = RetrievalOrchestrator::new(
        store.clone(),
        oracle.clone(),
        unused_source(StrategyKind::BulkIndex),
        unused_source(StrategyKind::AuthenticatedApi),
        Arc::new(live),
        vec!["[removed]".to_string()],
    );

    let links = LinkMap::from([
        (nov(4), record(nov(4), "qmlocked")),
        (nov(5), record(nov(5), "qnlive")),
    ]);
    let (date, outcome) = orchestrator
        .harvest_unlocked(PostCategory::DailyDiscussion, &links)
        .await
        .expect("an open post");

    assert_eq!(date, nov(5));
    assert!(matches!(
        outcome,
        PostOutcome::Persisted { source: StrategyKind::LivePoll, comments: 50, .. }
    ));
    let opened = renderer.opened();
    assert!(opened.len() <= 6);
    assert!(opened.iter().all(|url| url.contains("/qnlive/")));
    assert_eq!(renderer.closed.load(Ordering::SeqCst), opened.len());

    let written = tokio::fs::read_to_string(
        store.artifact_path(PostCategory::DailyDiscussion, nov(5)),
    )
    .await
    .unwrap();
    assert_eq!(written.lines().collect::<Vec<_>>(), all);

    tokio::fs::remove_dir_all(store.dir()).await.unwrap();
}

#[tokio::test]
async fn test_live_poll_merges_repeated_text_once() {
    let oracle = Arc::new(CountdownOracle::open_for("qnlive", 2));
    let renderer = Arc::new(ScriptedRenderer::with_pages(vec![
        FakePage {
            comments: vec!["diamond hands".to_string()],
            ..FakePage::default()
        },
        FakePage {
            comments: vec!["diamond hands".to_string(), "paper hands".to_string()],
            ..FakePage::default()
        },
    ]));
    let live = LivePollStrategy::new(oracle, renderer.clone(), COMMENT_CLASS, Duration::ZERO);

    let result = live.fetch(&record(nov(5), "qnlive")).await.unwrap();

    assert!(result.complete);
    assert_eq!(renderer.opened().len(), 2);
    assert_eq!(
        result.comments.into_inner(),
        vec!["diamond hands", "paper hands"]
    );
}

#[tokio::test]
async fn test_post_locking_before_live_capture_is_collected_as_locked() {
    init_logging();
    let store = temp_store();

    // Open for the scan only
    let oracle = Arc::new(CountdownOracle::open_for("qnlive", 1));
    let renderer = Arc::new(ScriptedRenderer::default());
    let index = Arc::new(CannedIndex {
        bodies: vec!["closing bell".to_string(), "[removed]".to_string()],
        ..CannedIndex::default()
    });
    let orchestrator = RetrievalOrchestrator::new(
        store.clone(),
        oracle.clone(),
        Arc::new(BulkIndexStrategy::new(index.clone(), EmptyIndexPolicy::Stale)),
        unused_source(StrategyKind::AuthenticatedApi),
        Arc::new(LivePollStrategy::new(
            oracle,
            renderer.clone(),
            COMMENT_CLASS,
            Duration::ZERO,
        )),
        vec!["[removed]".to_string()],
    );
    let links = LinkMap::from([(nov(5), record(nov(5), "qnlive"))]);

    let (date, outcome) = orchestrator
        .harvest_unlocked(PostCategory::DailyDiscussion, &links)
        .await
        .expect("an open post");

    assert_eq!(date, nov(5));
    assert!(matches!(
        outcome,
        PostOutcome::Persisted { source: StrategyKind::BulkIndex, comments: 1, .. }
    ));
    assert!(renderer.opened().is_empty());
    assert_eq!(index.calls.load(Ordering::SeqCst), 1);

    let written = tokio::fs::read_to_string(
        store.artifact_path(PostCategory::DailyDiscussion, nov(5)),
    )
    .await
    .unwrap();
    assert_eq!(written, "closing bell\n");

    tokio::fs::remove_dir_all(store.dir()).await.unwrap();
}
