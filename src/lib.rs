//! Wiring shared by the `historical` and `realtime` drivers.

use chrono::NaiveDate;
use harvester::{
    AuthenticatedApiStrategy, BackfillPlanner, BulkIndexStrategy, CommentStore,
    DiscoverySelectors, LinkDiscovery, LivePollStrategy, PostOutcome, RetrievalOrchestrator,
    RunReport,
};
use pushshift_client::PushshiftClient;
use reddit_client::{RedditClient, RedditOAuth2Config};
use std::sync::Arc;
use threadkeeper_core::{AppConfig, CoreError, ErrorExt, LinkMap, PostCategory};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "threadkeeper=info,historical=info,realtime=info,threadkeeper_core=info,\
harvester=info,reddit_client=info,pushshift_client=info,page_renderer=info";

/// Installs the fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub struct Pipeline {
    config: AppConfig,
    discovery: LinkDiscovery,
    planner: BackfillPlanner,
    orchestrator: RetrievalOrchestrator,
}

impl Pipeline {
    pub fn from_config(config: AppConfig) -> Result<Self, CoreError> {
        let reddit = Arc::new(RedditClient::new(RedditOAuth2Config::from_settings(
            &config.reddit,
        )?)?);
        let pushshift = Arc::new(PushshiftClient::from_settings(&config.pushshift)?);
        let renderer = page_renderer::build_renderer(&config.render, &config.reddit.user_agent)?;

        let store = CommentStore::new(config.output_dir.clone());
        let discovery = LinkDiscovery::new(
            renderer.clone(),
            DiscoverySelectors {
                title_class: config.render.title_class.clone(),
                link_class: config.render.link_class.clone(),
            },
        );
        let planner = BackfillPlanner::new(
            discovery.clone(),
            store.clone(),
            config.subreddit.clone(),
            config.backfill_days,
        );

        let orchestrator = RetrievalOrchestrator::new(
            store,
            reddit.clone(),
            Arc::new(BulkIndexStrategy::new(pushshift, config.empty_index_policy)),
            Arc::new(AuthenticatedApiStrategy::new(
                reddit.clone(),
                config.expansion_timeout(),
            )),
            Arc::new(LivePollStrategy::new(
                reddit,
                renderer,
                config.render.comment_class.clone(),
                config.poll_interval(),
            )),
            config.removed_markers.clone(),
        );

        Ok(Self {
            config,
            discovery,
            planner,
            orchestrator,
        })
    }

    /// Posts currently on the listing page. A listing that cannot be read
    /// yields an empty map so the rest of the run still happens.
    async fn listed_posts(&self, category: PostCategory) -> LinkMap {
        match self
            .discovery
            .discover(&self.config.listing_url, category)
            .await
        {
            Ok(links) => links,
            Err(e) => {
                e.log_error();
                warn!("Continuing {} without the listing page", category);
                LinkMap::new()
            }
        }
    }

    /// Discovery, backfill and locked-post harvest for both categories.
    pub async fn run_historical(&self, today: NaiveDate) -> Result<Vec<RunReport>, CoreError> {
        let mut reports = Vec::new();
        for category in PostCategory::ALL {
            let listed = self.listed_posts(category).await;
            let links = self.planner.extend(listed, category, today).await?;
            info!("Harvesting {} {} posts", links.len(), category);
            reports.push(self.orchestrator.harvest_locked(category, &links).await);
        }
        Ok(reports)
    }

    /// Captures the open post of each category until it locks.
    pub async fn run_realtime(&self) -> Vec<(PostCategory, NaiveDate, PostOutcome)> {
        let mut captured = Vec::new();
        for category in PostCategory::ALL {
            let links = self.listed_posts(category).await;
            if let Some((date, outcome)) = self.orchestrator.harvest_unlocked(category, &links).await
            {
                captured.push((category, date, outcome));
            }
        }
        captured
    }
}
