pub mod static_html;
pub mod webdriver;

pub use static_html::{StaticRenderer, StaticSession};
pub use webdriver::{WebDriverRenderer, WebDriverSession};

use scraper::Selector;
use std::sync::Arc;
use threadkeeper_core::{CoreError, RenderBackend, RenderError, RenderSettings, Renderer};
use url::Url;

/// Builds the renderer selected in the configuration.
pub fn build_renderer(
    settings: &RenderSettings,
    user_agent: &str,
) -> Result<Arc<dyn Renderer>, CoreError> {
    Ok(match settings.backend {
        RenderBackend::Webdriver => Arc::new(WebDriverRenderer::new(&settings.webdriver_url)),
        RenderBackend::Static => Arc::new(StaticRenderer::new(user_agent)?),
    })
}

/// Selector for elements whose class attribute equals `class_name` exactly.
pub(crate) fn class_selector(class_name: &str) -> Result<Selector, RenderError> {
    if class_name.contains('"') {
        return Err(RenderError::InvalidSelector {
            class_name: class_name.to_string(),
        });
    }
    Selector::parse(&format!("[class=\"{}\"]", class_name)).map_err(|_| {
        RenderError::InvalidSelector {
            class_name: class_name.to_string(),
        }
    })
}

/// Resolves relative `href` values against the page they were read from.
pub(crate) fn absolutize(page_url: &str, attribute: &str, value: &str) -> String {
    if attribute != "href" {
        return value.to_string();
    }
    Url::parse(page_url)
        .and_then(|base| base.join(value))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| value.to_string())
}
