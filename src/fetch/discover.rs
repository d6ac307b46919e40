// src/fetch/discover.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Secondary discovery for the date-scoped pipeline: given the provider's
/// landing page and an element locator, resolve the current download link.
/// Narrow on purpose so a different discovery mechanism can be swapped in
/// without touching pipeline logic.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn resolve(&self, page_url: &str, selector: &str) -> Result<String>;
}

/// HTTP polling scraper: re-fetches the page until the CSS selector matches
/// an element with an `href`, or the bounded wait elapses.
pub struct PageScraper {
    client: Client,
    timeout: Duration,
    poll_interval: Duration,
}

impl PageScraper {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Parse `html` and pull the first `href` matching `selector`, resolved
/// against `base_url`. Synchronous so the non-Send DOM never crosses an
/// await point.
fn extract_link(html: &str, selector: &str, base_url: &str) -> Result<Option<String>> {
    let sel = Selector::parse(selector)
        .map_err(|e| anyhow::anyhow!("invalid CSS selector `{}`: {:?}", selector, e))?;
    let base = Url::parse(base_url).with_context(|| format!("invalid page URL {}", base_url))?;

    let link = Html::parse_document(html)
        .select(&sel)
        .filter_map(|e| e.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .map(|u| u.to_string())
        .next();
    Ok(link)
}

#[async_trait]
impl LinkResolver for PageScraper {
    async fn resolve(&self, page_url: &str, selector: &str) -> Result<String> {
        let deadline = Instant::now() + self.timeout;
        info!(%page_url, %selector, "discovering download link");

        loop {
            let html = match self.client.get(page_url).send().await {
                Ok(resp) if resp.status().is_success() => match resp.text().await {
                    Ok(text) => Some(text),
                    Err(e) => {
                        warn!(%page_url, error = %e, "failed to read page body");
                        None
                    }
                },
                Ok(resp) => {
                    warn!(%page_url, status = %resp.status(), "page fetch returned non-success");
                    None
                }
                Err(e) => {
                    warn!(%page_url, error = %e, "page fetch failed");
                    None
                }
            };

            if let Some(html) = html {
                if let Some(link) = extract_link(&html, selector, page_url)? {
                    debug!(%link, "download link resolved");
                    return Ok(link);
                }
            }

            if Instant::now() >= deadline {
                anyhow::bail!(
                    "no element matching `{}` on {} within {:?}",
                    selector,
                    page_url,
                    self.timeout
                );
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_matching_href() -> Result<()> {
        let html = r#"<html><body>
            <a class="other" href="/nope">x</a>
            <a class="download-button" href="/mobility/applemobilitytrends-2020-09-02.csv">csv</a>
        </body></html>"#;
        let link = extract_link(html, "a.download-button", "https://example.com/mobility")?;
        assert_eq!(
            link.as_deref(),
            Some("https://example.com/mobility/applemobilitytrends-2020-09-02.csv")
        );
        Ok(())
    }

    #[test]
    fn missing_element_yields_none() -> Result<()> {
        let html = "<html><body><p>nothing here</p></body></html>";
        let link = extract_link(html, "a.download-button", "https://example.com/")?;
        assert!(link.is_none());
        Ok(())
    }

    #[test]
    fn bad_selector_is_an_error() {
        assert!(extract_link("<html></html>", ":::", "https://example.com/").is_err());
    }
}
