use super::{is_challenge_page, DocumentHandle, Pacing};
use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use async_trait::async_trait;
use kuchikiki::traits::TendrilSink;
use kuchikiki::iter::NodeIterator;
use kuchikiki::{NodeRef, Selectors};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub struct FetchedPage {
    pub url: Url,
    pub status: u16,
    pub body: String,
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &ScrapeConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_str(&config.accept_language)?);

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(config.navigation_timeout)
            .build()?;

        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &Url) -> anyhow::Result<FetchedPage> {
        let timed_out = |e: reqwest::Error| -> anyhow::Error {
            if e.is_timeout() {
                ScrapeError::Timeout {
                    url: url.to_string(),
                }
                .into()
            } else {
                e.into()
            }
        };

        let response = self.client.get(url.clone()).send().await.map_err(timed_out)?;
        let status = response.status();
        let final_url = response.url().clone();
        let body = response.text().await.map_err(timed_out)?;

        if is_blocking_status(status) || is_challenge_page(&body) {
            return Err(ScrapeError::Blocked {
                url: url.to_string(),
            }
            .into());
        }
        if !status.is_success() {
            return Err(ScrapeError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }
            .into());
        }

        debug!("Fetched {} ({} bytes)", final_url, body.len());
        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

fn is_blocking_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    )
}

/// A fetched page parsed into a static tree. Navigation means another fetch.
pub struct StaticDocument {
    fetcher: Option<HttpFetcher>,
    url: Option<Url>,
    root: NodeRef,
}

impl StaticDocument {
    pub fn new(fetcher: HttpFetcher) -> Self {
        Self {
            fetcher: Some(fetcher),
            url: None,
            root: kuchikiki::parse_html().one(""),
        }
    }

    /// A detached tree with no fetcher. Links can't be followed.
    pub fn from_html(html: &str) -> Self {
        Self {
            fetcher: None,
            url: None,
            root: kuchikiki::parse_html().one(html),
        }
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    async fn load(&mut self, url: Url) -> anyhow::Result<()> {
        let fetcher = self
            .fetcher
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("static document has no fetcher; cannot load {}", url))?;
        let page = fetcher.fetch(&url).await?;
        self.root = kuchikiki::parse_html().one(page.body.as_str());
        self.url = Some(page.url);
        Ok(())
    }

    fn resolve(&self, href: &str) -> anyhow::Result<Url> {
        match &self.url {
            Some(base) => Ok(base.join(href)?),
            None => Ok(Url::parse(href)?),
        }
    }
}

#[async_trait(?Send)]
impl DocumentHandle for StaticDocument {
    type Node = NodeRef;

    fn backend(&self) -> &'static str {
        "static"
    }

    async fn open(&mut self, url: &str) -> anyhow::Result<()> {
        let url = Url::parse(url)?;
        self.load(url).await
    }

    async fn wait_for(&self, selector: &str, _timeout: Duration) -> anyhow::Result<bool> {
        // A parsed tree never changes, so one look is enough.
        Ok(!self.select(None, selector).await?.is_empty())
    }

    async fn select(&self, scope: Option<&NodeRef>, selector: &str) -> anyhow::Result<Vec<NodeRef>> {
        let scope = scope.unwrap_or(&self.root);
        let matches = scope
            .select(selector)
            .map_err(|_| anyhow::anyhow!("invalid selector: {}", selector))?;
        Ok(matches
            .filter(|m| m.as_node() != scope)
            .map(|m| m.as_node().clone())
            .collect())
    }

    async fn text(&self, node: &NodeRef) -> anyhow::Result<String> {
        Ok(node.text_contents())
    }

    async fn attribute(&self, node: &NodeRef, name: &str) -> anyhow::Result<Option<String>> {
        Ok(node
            .as_element()
            .and_then(|element| element.attributes.borrow().get(name).map(str::to_string)))
    }

    async fn next_sibling(&self, node: &NodeRef, selector: &str) -> anyhow::Result<Option<NodeRef>> {
        let compiled = Selectors::compile(selector)
            .map_err(|_| anyhow::anyhow!("invalid selector: {}", selector))?;
        Ok(node
            .following_siblings()
            .elements()
            .find(|sibling| compiled.matches(sibling))
            .map(|sibling| sibling.as_node().clone()))
    }

    async fn type_text(&mut self, _node: &NodeRef, _text: &str, _pacing: &Pacing) -> anyhow::Result<()> {
        anyhow::bail!("static documents do not accept input")
    }

    async fn activate(&mut self, node: &NodeRef) -> anyhow::Result<()> {
        let href = self
            .attribute(node, "href")
            .await?
            .ok_or_else(|| anyhow::anyhow!("node has no href to follow"))?;
        let target = self.resolve(&href)?;
        debug!("Following link to {}", target);
        self.load(target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r#"
        <div class="var-options">
            <p><span>Колір:</span><span class="bold">Black</span></p>
        </div>
        <a class="product-characteristics" href="characteristics/">Характеристики</a>
    "#;

    #[tokio::test]
    async fn select_is_scoped_and_excludes_the_scope_itself() {
        let doc = StaticDocument::from_html(HTML);
        let groups = doc.select(None, "div.var-options p").await.unwrap();
        assert_eq!(groups.len(), 1);

        let spans = doc.select(Some(&groups[0]), "span").await.unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(doc.text(&spans[1]).await.unwrap(), "Black");

        let nested = doc.select(Some(&spans[0]), "span").await.unwrap();
        assert!(nested.is_empty());
    }

    #[tokio::test]
    async fn attributes_and_readiness() {
        let doc = StaticDocument::from_html(HTML);
        let links = doc.select(None, "a.product-characteristics").await.unwrap();
        assert_eq!(
            doc.attribute(&links[0], "href").await.unwrap().as_deref(),
            Some("characteristics/")
        );
        assert_eq!(doc.attribute(&links[0], "title").await.unwrap(), None);
        assert!(doc.wait_for("a", Duration::from_millis(1)).await.unwrap());
        assert!(!doc.wait_for("h1", Duration::from_millis(1)).await.unwrap());
    }

    #[tokio::test]
    async fn next_sibling_stays_under_the_same_parent() {
        let doc = StaticDocument::from_html(
            r#"<div><p class="small">41 999</p><span>x</span></div>
               <div><p class="small">9 999</p><span>y</span><p>7 999</p></div>"#,
        );
        let anchors = doc.select(None, "p.small").await.unwrap();
        assert!(doc.next_sibling(&anchors[0], "p").await.unwrap().is_none());

        let found = doc.next_sibling(&anchors[1], "p").await.unwrap().unwrap();
        assert_eq!(doc.text(&found).await.unwrap(), "7 999");
        assert!(doc.next_sibling(&anchors[1], "p[").await.is_err());
    }

    #[tokio::test]
    async fn detached_documents_cannot_navigate_or_type() {
        let mut doc = StaticDocument::from_html(HTML);
        let links = doc.select(None, "a").await.unwrap();
        assert!(doc.activate(&links[0]).await.is_err());
        assert!(doc.type_text(&links[0], "iPhone", &Pacing::none()).await.is_err());
    }

    #[test]
    fn blocking_statuses() {
        assert!(is_blocking_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_blocking_status(StatusCode::FORBIDDEN));
        assert!(!is_blocking_status(StatusCode::NOT_FOUND));
    }
}
