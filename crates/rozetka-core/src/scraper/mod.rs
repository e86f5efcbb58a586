pub mod browser;
pub mod driver;
pub mod http;

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Markers of an anti-automation interstitial instead of the requested page.
pub const CHALLENGE_MARKERS: &[&str] = &[
    "cf-browser-verification",
    "challenge-platform",
    "Just a moment...",
];

/// Everything the extractor needs from a page, whatever is behind it: a
/// parsed tree, a blocking driver session or an async protocol session.
///
/// Lookups that match nothing return an empty `Vec` or `None`; errors are
/// reserved for a handle that could not answer at all.
#[async_trait(?Send)]
pub trait DocumentHandle {
    type Node;

    fn backend(&self) -> &'static str;

    async fn open(&mut self, url: &str) -> anyhow::Result<()>;

    /// Waits until `selector` matches. `Ok(false)` means the timeout expired.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> anyhow::Result<bool>;

    /// Matches in document order, below `scope` or across the whole page.
    async fn select(
        &self,
        scope: Option<&Self::Node>,
        selector: &str,
    ) -> anyhow::Result<Vec<Self::Node>>;

    async fn text(&self, node: &Self::Node) -> anyhow::Result<String>;

    async fn attribute(&self, node: &Self::Node, name: &str) -> anyhow::Result<Option<String>>;

    /// The first later sibling of `node` matching `selector`.
    async fn next_sibling(
        &self,
        node: &Self::Node,
        selector: &str,
    ) -> anyhow::Result<Option<Self::Node>>;

    /// Types into an input one character at a time.
    async fn type_text(
        &mut self,
        node: &Self::Node,
        text: &str,
        pacing: &Pacing,
    ) -> anyhow::Result<()>;

    /// Clicks the node, or follows its link when there is nothing to click.
    async fn activate(&mut self, node: &Self::Node) -> anyhow::Result<()>;
}

/// Random delay range for simulated input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub min: Duration,
    pub max: Duration,
}

impl Pacing {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn next_delay(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if min == max {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

pub fn is_challenge_page(html: &str) -> bool {
    CHALLENGE_MARKERS.iter().any(|marker| html.contains(marker))
}

/// Attribute the live backends use to tag a sibling found in page script, so
/// it can be fetched back as a node.
pub(crate) const SIBLING_MARK: &str = "data-rozetka-sibling";

/// Function body run with `this` bound to the anchor node. Clears stale
/// marks, marks the first later sibling matching `selector` and reports
/// whether there was one.
pub(crate) fn mark_sibling_script(selector: &str) -> anyhow::Result<String> {
    let selector = serde_json::to_string(selector)?;
    Ok(format!(
        "function() {{ \
            document.querySelectorAll('[{SIBLING_MARK}]').forEach(e => e.removeAttribute('{SIBLING_MARK}')); \
            let s = this.nextElementSibling; \
            while (s && !s.matches({selector})) s = s.nextElementSibling; \
            if (!s) return false; \
            s.setAttribute('{SIBLING_MARK}', ''); \
            return true; \
        }}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacing_stays_within_bounds() {
        let pacing = Pacing::new(Duration::from_millis(50), Duration::from_millis(150));
        for _ in 0..100 {
            let delay = pacing.next_delay();
            assert!(delay >= Duration::from_millis(50));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn pacing_swaps_reversed_bounds() {
        let pacing = Pacing::new(Duration::from_millis(9), Duration::from_millis(3));
        assert_eq!(pacing.min, Duration::from_millis(3));
        assert_eq!(Pacing::none().next_delay(), Duration::ZERO);
    }

    #[test]
    fn sibling_script_quotes_the_selector() {
        let script = mark_sibling_script(r#"p[title="a"]"#).unwrap();
        assert!(script.contains(r#"s.matches("p[title=\"a\"]")"#));
        assert!(script.contains(SIBLING_MARK));
    }

    #[test]
    fn challenge_markers_are_detected() {
        assert!(is_challenge_page("<title>Just a moment...</title>"));
        assert!(is_challenge_page("<div id=\"cf-browser-verification\"></div>"));
        assert!(!is_challenge_page("<h1>Apple iPhone 15</h1>"));
    }
}
