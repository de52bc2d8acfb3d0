use crate::discovery::LinkDiscovery;
use crate::store::CommentStore;
use chrono::{Duration, NaiveDate};
use threadkeeper_core::dates::{is_weekend, title_text};
use threadkeeper_core::{CoreError, ErrorExt, LinkMap, PostCategory};
use tracing::{debug, info};

/// Fills the link map with posts from the last `window_days` days that the
/// listing page no longer shows, one site search per missing weekday.
#[derive(Clone)]
pub struct BackfillPlanner {
    discovery: LinkDiscovery,
    store: CommentStore,
    subreddit: String,
    window_days: u32,
}

impl BackfillPlanner {
    pub fn new(
        discovery: LinkDiscovery,
        store: CommentStore,
        subreddit: impl Into<String>,
        window_days: u32,
    ) -> Self {
        Self {
            discovery,
            store,
            subreddit: subreddit.into(),
            window_days,
        }
    }

    /// Search page for the thread of `category` posted on `date`.
    pub fn search_url(&self, category: PostCategory, date: NaiveDate) -> String {
        format!(
            "https://www.reddit.com/r/{}/search/?q=flair%3A%22{}%22%20AND%20title%3A%22{}%22&restrict_sr=1&sr_nsfw=",
            self.subreddit,
            encode_query_text(category.search_flair()),
            encode_query_text(&title_text(date))
        )
    }

    /// Merges search results into `links` for every weekday in the window
    /// that has neither a record nor an artifact. Existing entries are never
    /// replaced. A failed search only costs that day.
    pub async fn extend(
        &self,
        mut links: LinkMap,
        category: PostCategory,
        today: NaiveDate,
    ) -> Result<LinkMap, CoreError> {
        let stored = self.store.stored_dates(category).await?;
        let mut searches = 0;

        for date in candidate_dates(today, self.window_days) {
            if links.contains_key(&date) || stored.contains(&date) {
                continue;
            }

            let url = self.search_url(category, date);
            debug!("Searching for the {} post of {}", category, date);
            searches += 1;

            match self.discovery.discover(&url, category).await {
                Ok(found) => {
                    for (found_date, record) in found {
                        links.entry(found_date).or_insert(record);
                    }
                }
                Err(e) => {
                    e.log_warn();
                }
            }
        }

        info!(
            "Backfill ran {} searches; {} {} posts known",
            searches,
            links.len(),
            category
        );
        Ok(links)
    }
}

/// Encodes the characters that occur in flairs and title dates.
fn encode_query_text(text: &str) -> String {
    text.replace(',', "%2C").replace(' ', "%20")
}

/// Weekdays from `window_days - 1` days ago through `today`, oldest first.
pub fn candidate_dates(today: NaiveDate, window_days: u32) -> impl Iterator<Item = NaiveDate> {
    (0..window_days)
        .rev()
        .map(move |offset| today - Duration::days(i64::from(offset)))
        .filter(|date| !is_weekend(*date))
}
