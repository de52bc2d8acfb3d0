use crate::{absolutize, class_selector};
use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use std::time::Duration;
use threadkeeper_core::{CoreError, RenderError, RenderSession, Renderer};
use tracing::debug;

/// Fetches pages over plain HTTP and queries the served markup. Content the
/// forum inserts with JavaScript is not visible to this backend.
#[derive(Debug, Clone)]
pub struct StaticRenderer {
    http_client: Client,
}

impl StaticRenderer {
    pub fn new(user_agent: &str) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl Renderer for StaticRenderer {
    async fn open(&self, url: &str) -> Result<Box<dyn RenderSession>, CoreError> {
        let navigation_error = |reason: String| RenderError::Navigation {
            url: url.to_string(),
            reason,
        };

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| navigation_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(navigation_error(format!("status {}", response.status())).into());
        }
        let markup = response
            .text()
            .await
            .map_err(|e| navigation_error(e.to_string()))?;

        debug!("Fetched {} bytes from {}", markup.len(), url);
        Ok(Box::new(StaticSession::from_html(url, markup)))
    }
}

/// A fetched document. The markup is re-parsed per query because the parsed
/// tree cannot be held across await points.
#[derive(Debug, Clone)]
pub struct StaticSession {
    url: String,
    markup: Option<String>,
}

impl StaticSession {
    pub fn from_html(url: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            markup: Some(markup.into()),
        }
    }

    fn document(&self) -> Result<Html, RenderError> {
        self.markup
            .as_deref()
            .map(Html::parse_document)
            .ok_or(RenderError::SessionClosed)
    }
}

#[async_trait]
impl RenderSession for StaticSession {
    async fn texts(&self, class_name: &str) -> Result<Vec<String>, CoreError> {
        let selector = class_selector(class_name)?;
        let document = self.document()?;
        Ok(document
            .select(&selector)
            .map(|element| element.text().collect::<String>().trim().to_string())
            .collect())
    }

    async fn attributes(
        &self,
        class_name: &str,
        attribute: &str,
    ) -> Result<Vec<String>, CoreError> {
        let selector = class_selector(class_name)?;
        let document = self.document()?;
        Ok(document
            .select(&selector)
            .filter_map(|element| element.value().attr(attribute))
            .map(|value| absolutize(&self.url, attribute, value))
            .collect())
    }

    async fn close(&mut self) -> Result<(), CoreError> {
        self.markup = None;
        Ok(())
    }
}
