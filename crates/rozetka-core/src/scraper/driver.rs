use super::{is_challenge_page, mark_sibling_script, DocumentHandle, Pacing, SIBLING_MARK};
use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use async_trait::async_trait;
use headless_chrome::browser::tab::NoElementFound;
use headless_chrome::protocol::cdp::DOM::NodeId;
use headless_chrome::util::Timeout;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Classic driver backend: a blocking, Selenium-style session. Every call
/// completes (or times out inside the driver) before the next one starts.
///
/// Nodes are CDP node ids, re-bound to the tab on each use so no element
/// borrow outlives a call.
pub struct DriverDocument {
    _browser: Browser,
    tab: Arc<Tab>,
    settle: Pacing,
}

impl DriverDocument {
    pub fn launch(config: &ScrapeConfig) -> anyhow::Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((1900, 1600)))
            .path(config.chrome_path.clone())
            .args(vec![
                OsStr::new("--disable-blink-features=AutomationControlled"),
                OsStr::new("--disable-notifications"),
                OsStr::new("--lang=uk-UA"),
            ])
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build launch options: {e}"))?;

        let browser = Browser::new(options)?;
        let tab = browser.new_tab()?;
        tab.set_default_timeout(config.navigation_timeout);
        tab.set_user_agent(&config.user_agent, Some(&config.accept_language), None)?;

        Ok(Self {
            _browser: browser,
            tab,
            settle: config.settle,
        })
    }

    fn element(&self, node: &NodeId) -> anyhow::Result<Element<'_>> {
        Element::new(&self.tab, *node)
    }
}

/// The driver reports an empty lookup, or one that never appeared within its
/// timeout, as an error. Anything else means the session stopped answering.
fn is_no_match(err: &anyhow::Error) -> bool {
    err.downcast_ref::<NoElementFound>().is_some() || err.downcast_ref::<Timeout>().is_some()
}

#[async_trait(?Send)]
impl DocumentHandle for DriverDocument {
    type Node = NodeId;

    fn backend(&self) -> &'static str {
        "classic"
    }

    async fn open(&mut self, url: &str) -> anyhow::Result<()> {
        self.tab
            .navigate_to(url)?
            .wait_until_navigated()
            .map_err(|e| match e.downcast_ref::<Timeout>() {
                Some(_) => ScrapeError::Timeout {
                    url: url.to_string(),
                }
                .into(),
                None => e,
            })?;

        let content = self.tab.get_content()?;
        if is_challenge_page(&content) {
            return Err(ScrapeError::Blocked {
                url: url.to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> anyhow::Result<bool> {
        match self.tab.wait_for_element_with_custom_timeout(selector, timeout) {
            Ok(_) => Ok(true),
            Err(e) if is_no_match(&e) => Ok(false),
            Err(e) => Err(ScrapeError::Session(e).into()),
        }
    }

    async fn select(&self, scope: Option<&NodeId>, selector: &str) -> anyhow::Result<Vec<NodeId>> {
        let found = match scope {
            Some(node) => self.element(node)?.find_elements(selector),
            None => self.tab.find_elements(selector),
        };
        match found {
            Ok(elements) => Ok(elements.iter().map(|e| e.node_id).collect()),
            Err(e) if is_no_match(&e) => {
                debug!("No match for {}: {}", selector, e);
                Ok(Vec::new())
            }
            Err(e) => Err(ScrapeError::Session(e).into()),
        }
    }

    async fn text(&self, node: &NodeId) -> anyhow::Result<String> {
        self.element(node)?.get_inner_text()
    }

    async fn attribute(&self, node: &NodeId, name: &str) -> anyhow::Result<Option<String>> {
        self.element(node)?.get_attribute_value(name)
    }

    async fn next_sibling(&self, node: &NodeId, selector: &str) -> anyhow::Result<Option<NodeId>> {
        let marked = self
            .element(node)?
            .call_js_fn(&mark_sibling_script(selector)?, vec![], false)?
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !marked {
            return Ok(None);
        }
        Ok(self
            .select(None, &format!("[{SIBLING_MARK}]"))
            .await?
            .into_iter()
            .next())
    }

    async fn type_text(&mut self, node: &NodeId, text: &str, pacing: &Pacing) -> anyhow::Result<()> {
        self.element(node)?.click()?;
        for ch in text.chars() {
            self.tab.type_str(&ch.to_string())?;
            pacing.pause().await;
        }
        Ok(())
    }

    async fn activate(&mut self, node: &NodeId) -> anyhow::Result<()> {
        let element = self.element(node)?;
        element.move_mouse_over()?;
        element.click()?;
        self.settle.pause().await;

        if let Err(e) = self.tab.wait_until_navigated() {
            debug!("No navigation observed after click: {}", e);
        }
        Ok(())
    }
}
