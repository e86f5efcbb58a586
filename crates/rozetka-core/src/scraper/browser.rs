use super::{is_challenge_page, mark_sibling_script, DocumentHandle, Pacing, SIBLING_MARK};
use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use async_trait::async_trait;
use chromiumoxide::element::Element;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// A guard that ensures the page is closed when dropped.
struct PageGuard {
    page: Page,
}

impl PageGuard {
    fn new(page: Page) -> Self {
        Self { page }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        let page = self.page.clone();
        tokio::spawn(async move {
            if let Err(e) = page.close().await {
                debug!("Failed to close page in Drop: {}", e);
            }
        });
    }
}

impl std::ops::Deref for PageGuard {
    type Target = Page;

    fn deref(&self) -> &Self::Target {
        &self.page
    }
}

/// Modern automation protocol backend: an async CDP session with element
/// handles that stay bound to the live page.
pub struct BrowserDocument {
    browser: Browser,
    page: Option<PageGuard>,
    handler: JoinHandle<()>,
    navigation_timeout: Duration,
    settle: Pacing,
}

impl BrowserDocument {
    pub async fn launch(config: &ScrapeConfig) -> anyhow::Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(1900, 1600)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-notifications")
            .arg("--lang=uk-UA")
            .arg(format!("--user-agent={}", config.user_agent));
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        let (browser, mut handler) =
            Browser::launch(builder.build().map_err(|e| anyhow::anyhow!(e))?).await?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    debug!("Browser handler error: {:?}", h);
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;

        Ok(Self {
            browser,
            page: Some(PageGuard::new(page)),
            handler,
            navigation_timeout: config.navigation_timeout,
            settle: config.settle,
        })
    }

    fn page(&self) -> anyhow::Result<&Page> {
        self.page
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("browser page already closed"))
    }

    pub async fn close(mut self) -> anyhow::Result<()> {
        if let Some(guard) = self.page.take() {
            drop(guard);
        }
        self.browser.close().await?;
        self.handler.abort();
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> anyhow::Result<bool> {
        let page = self.page()?;
        let start = std::time::Instant::now();
        let mut delay = Duration::from_millis(50);

        while start.elapsed() < timeout {
            let found = page
                .find_elements(selector)
                .await
                .map(|elements| !elements.is_empty())
                .unwrap_or(false);
            if found {
                return Ok(true);
            }
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(Duration::from_millis(500));
        }

        Ok(false)
    }
}

#[async_trait(?Send)]
impl DocumentHandle for BrowserDocument {
    type Node = Element;

    fn backend(&self) -> &'static str {
        "modern"
    }

    async fn open(&mut self, url: &str) -> anyhow::Result<()> {
        let page = self.page()?;
        match tokio::time::timeout(self.navigation_timeout, page.goto(url)).await {
            Ok(res) => {
                res?;
            }
            Err(_) => {
                return Err(ScrapeError::Timeout {
                    url: url.to_string(),
                }
                .into())
            }
        }

        let content = page.content().await?;
        if is_challenge_page(&content) {
            return Err(ScrapeError::Blocked {
                url: url.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> anyhow::Result<bool> {
        self.wait_for_selector(selector, timeout).await
    }

    async fn select(&self, scope: Option<&Element>, selector: &str) -> anyhow::Result<Vec<Element>> {
        let found = match scope {
            Some(element) => element.find_elements(selector).await?,
            None => self.page()?.find_elements(selector).await?,
        };
        Ok(found)
    }

    async fn text(&self, node: &Element) -> anyhow::Result<String> {
        Ok(node.inner_text().await?.unwrap_or_default())
    }

    async fn attribute(&self, node: &Element, name: &str) -> anyhow::Result<Option<String>> {
        Ok(node.attribute(name).await?)
    }

    async fn next_sibling(&self, node: &Element, selector: &str) -> anyhow::Result<Option<Element>> {
        let marked = node
            .call_js_fn(mark_sibling_script(selector)?, false)
            .await?
            .result
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !marked {
            return Ok(None);
        }
        let found = self
            .page()?
            .find_elements(format!("[{SIBLING_MARK}]"))
            .await?;
        Ok(found.into_iter().next())
    }

    async fn type_text(&mut self, node: &Element, text: &str, pacing: &Pacing) -> anyhow::Result<()> {
        node.click().await?;
        for ch in text.chars() {
            node.type_str(ch.to_string()).await?;
            pacing.pause().await;
        }
        Ok(())
    }

    async fn activate(&mut self, node: &Element) -> anyhow::Result<()> {
        node.hover().await?;
        node.click().await?;
        self.settle.pause().await;

        let page = self.page()?;
        // Tab switches inside the product page don't always navigate.
        if tokio::time::timeout(self.navigation_timeout, page.wait_for_navigation())
            .await
            .is_err()
        {
            debug!("No navigation observed after click");
        }
        Ok(())
    }
}
