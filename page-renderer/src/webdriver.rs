use crate::absolutize;
use async_trait::async_trait;
use thirtyfour::{By, DesiredCapabilities, WebDriver};
use threadkeeper_core::{CoreError, RenderError, RenderSession, Renderer};
use tracing::{debug, info, warn};

/// Renders pages in Chrome through a running WebDriver server
/// (chromedriver listens on port 9515 by default).
#[derive(Debug, Clone)]
pub struct WebDriverRenderer {
    server_url: String,
}

impl WebDriverRenderer {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
        }
    }
}

#[async_trait]
impl Renderer for WebDriverRenderer {
    async fn open(&self, url: &str) -> Result<Box<dyn RenderSession>, CoreError> {
        let caps = DesiredCapabilities::chrome();
        let driver = WebDriver::new(&self.server_url, caps).await.map_err(|e| {
            RenderError::SessionStart {
                reason: format!("WebDriver at {}: {}", self.server_url, e),
            }
        })?;

        debug!("Loading {}", url);
        if let Err(e) = driver.goto(url).await {
            if let Err(quit_error) = driver.quit().await {
                warn!("Failed to quit WebDriver session: {}", quit_error);
            }
            return Err(RenderError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }
            .into());
        }

        Ok(Box::new(WebDriverSession {
            url: url.to_string(),
            driver: Some(driver),
        }))
    }
}

pub struct WebDriverSession {
    url: String,
    driver: Option<WebDriver>,
}

impl WebDriverSession {
    fn driver(&self) -> Result<&WebDriver, RenderError> {
        self.driver.as_ref().ok_or(RenderError::SessionClosed)
    }
}

fn class_xpath(class_name: &str) -> String {
    format!("//*[@class=\"{}\"]", class_name)
}

fn query_error(e: impl std::fmt::Display) -> RenderError {
    RenderError::Query {
        reason: e.to_string(),
    }
}

#[async_trait]
impl RenderSession for WebDriverSession {
    async fn texts(&self, class_name: &str) -> Result<Vec<String>, CoreError> {
        let xpath = class_xpath(class_name);
        let elements = self
            .driver()?
            .find_all(By::XPath(&xpath))
            .await
            .map_err(query_error)?;

        let mut texts = Vec::with_capacity(elements.len());
        for element in elements {
            texts.push(element.text().await.map_err(query_error)?);
        }
        Ok(texts)
    }

    async fn attributes(
        &self,
        class_name: &str,
        attribute: &str,
    ) -> Result<Vec<String>, CoreError> {
        let xpath = class_xpath(class_name);
        let elements = self
            .driver()?
            .find_all(By::XPath(&xpath))
            .await
            .map_err(query_error)?;

        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            if let Some(value) = element.attr(attribute).await.map_err(query_error)? {
                values.push(absolutize(&self.url, attribute, &value));
            }
        }
        Ok(values)
    }

    async fn close(&mut self) -> Result<(), CoreError> {
        if let Some(driver) = self.driver.take() {
            driver.quit().await.map_err(query_error)?;
            info!("Closed browser session for {}", self.url);
        }
        Ok(())
    }
}
