//! Harvest pipeline: finds the daily threads, decides which ones still need
//! collecting and persists each closed thread's comments exactly once.

pub mod backfill;
pub mod discovery;
pub mod oracle;
pub mod orchestrator;
pub mod store;
pub mod strategies;

pub use backfill::BackfillPlanner;
pub use discovery::{match_links, thread_id_from_url, DiscoverySelectors, LinkDiscovery};
pub use oracle::find_open_post;
pub use orchestrator::{PostOutcome, RetrievalOrchestrator, RunReport};
pub use store::CommentStore;
pub use strategies::{
    AuthenticatedApiStrategy, BulkIndexStrategy, CommentSource, LiveAccumulator,
    LivePollStrategy, StrategyKind,
};
