use std::sync::Arc;
use threadkeeper_core::dates::parse_title_date;
use threadkeeper_core::{CoreError, LinkMap, PostCategory, PostRecord, RenderSession, Renderer};
use tracing::{debug, info, warn};

/// Class names identifying post titles and post links on a rendered listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverySelectors {
    pub title_class: String,
    pub link_class: String,
}

/// Reads a listing or search page and pairs dated titles with permalinks.
#[derive(Clone)]
pub struct LinkDiscovery {
    renderer: Arc<dyn Renderer>,
    selectors: DiscoverySelectors,
}

impl LinkDiscovery {
    pub fn new(renderer: Arc<dyn Renderer>, selectors: DiscoverySelectors) -> Self {
        Self {
            renderer,
            selectors,
        }
    }

    /// Opens one rendering session on `listing_url`, which is closed again
    /// whether or not the queries succeed.
    pub async fn discover(
        &self,
        listing_url: &str,
        category: PostCategory,
    ) -> Result<LinkMap, CoreError> {
        let mut session = self.renderer.open(listing_url).await?;
        let queried = self.query(session.as_ref()).await;
        if let Err(e) = session.close().await {
            warn!("Failed to close rendering session for {}: {}", listing_url, e);
        }

        let (titles, hrefs) = queried?;
        debug!(
            "{} titles and {} links on {}",
            titles.len(),
            hrefs.len(),
            listing_url
        );

        let links = match_links(&titles, &hrefs, category);
        info!("Discovered {} {} posts on {}", links.len(), category, listing_url);
        Ok(links)
    }

    async fn query(
        &self,
        session: &dyn RenderSession,
    ) -> Result<(Vec<String>, Vec<String>), CoreError> {
        let titles = session.texts(&self.selectors.title_class).await?;
        let hrefs = session
            .attributes(&self.selectors.link_class, "href")
            .await?;
        Ok((titles, hrefs))
    }
}

/// Pairs every title of `category` with the first link whose path carries
/// both the category fragment and the title's date slug.
///
/// Titles whose date does not parse are logged and skipped. A date that is
/// already mapped keeps its first record.
pub fn match_links(titles: &[String], hrefs: &[String], category: PostCategory) -> LinkMap {
    let mut links = LinkMap::new();

    for title in titles {
        let Some(date_text) = title.trim().strip_prefix(category.title_prefix()) else {
            continue;
        };

        let title_date = match parse_title_date(date_text) {
            Ok(title_date) => title_date,
            Err(e) => {
                warn!("Skipping title {:?}: {}", title, e);
                continue;
            }
        };

        if links.contains_key(&title_date.date) {
            continue;
        }

        let Some(url) = hrefs
            .iter()
            .find(|href| href.contains(category.path_fragment()) && href.contains(&title_date.slug))
        else {
            debug!("No link found for {:?}", title);
            continue;
        };

        let Some(identifier) = thread_id_from_url(url) else {
            warn!("Cannot read a thread id from {}", url);
            continue;
        };

        links.insert(
            title_date.date,
            PostRecord {
                date: title_date.date,
                identifier,
                url: url.clone(),
            },
        );
    }

    links
}

/// Extracts the thread id from a permalink such as
/// `.../r/wallstreetbets/comments/qnabc1/daily_discussion_thread_for_.../`.
///
/// Falls back to the second-to-last path segment when the URL has no
/// `comments` segment.
pub fn thread_id_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let candidate = match segments.iter().position(|s| *s == "comments") {
        Some(index) => segments.get(index + 1).copied(),
        None if segments.len() >= 2 => segments.get(segments.len() - 2).copied(),
        None => None,
    }?;

    if candidate.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(candidate.to_string())
    } else {
        None
    }
}
