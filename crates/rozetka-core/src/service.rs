//! The acquisition state machine, shared by every backend.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::config::ScrapeConfig;
use crate::error::ScrapeError;
use crate::extract::{self, specs};
use crate::layout::PageLayout;
use crate::record::ProductRecord;
use crate::scraper::browser::BrowserDocument;
use crate::scraper::driver::DriverDocument;
use crate::scraper::http::{HttpFetcher, StaticDocument};
use crate::scraper::DocumentHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Loaded,
    Searched,
    ResultOpened,
    Extracted,
    CharacteristicsOpened,
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::Loaded => "loaded",
            Phase::Searched => "searched",
            Phase::ResultOpened => "result_opened",
            Phase::Extracted => "extracted",
            Phase::CharacteristicsOpened => "characteristics_opened",
            Phase::Completed => "completed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Plain HTTP fetch and a parsed tree.
    Static,
    /// Blocking driver session.
    Classic,
    /// Async automation protocol session.
    Modern,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Static, Strategy::Classic, Strategy::Modern];

    /// Static fetches go straight to the product page; browsers search for it.
    pub fn entry(&self, config: &ScrapeConfig) -> Entry {
        match self {
            Strategy::Static => Entry::Direct {
                url: config.product_url.clone(),
            },
            Strategy::Classic | Strategy::Modern => Entry::Search {
                home: config.home_url.clone(),
                query: config.query.clone(),
            },
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::Static => "static",
            Strategy::Classic => "classic",
            Strategy::Modern => "modern",
        })
    }
}

impl FromStr for Strategy {
    type Err = ScrapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Strategy::Static),
            "classic" => Ok(Strategy::Classic),
            "modern" => Ok(Strategy::Modern),
            other => Err(ScrapeError::Config(format!(
                "unknown strategy {other:?}; expected static, classic or modern"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Direct { url: String },
    Search { home: String, query: String },
}

impl Entry {
    fn url(&self) -> &str {
        match self {
            Entry::Direct { url } => url,
            Entry::Search { home, .. } => home,
        }
    }
}

/// One run over one document handle, which it borrows exclusively.
pub struct Acquisition<'a, H: DocumentHandle> {
    doc: &'a mut H,
    layout: &'a PageLayout,
    config: &'a ScrapeConfig,
    phase: Phase,
}

impl<'a, H: DocumentHandle> Acquisition<'a, H> {
    pub fn new(doc: &'a mut H, layout: &'a PageLayout, config: &'a ScrapeConfig) -> Self {
        Self {
            doc,
            layout,
            config,
            phase: Phase::Init,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn advance(&mut self, next: Phase) {
        debug!(
            backend = self.doc.backend(),
            from = %self.phase,
            to = %next,
            "phase transition"
        );
        self.phase = next;
    }

    /// Drives the run to `Completed` within the configured budget, filling
    /// `record` as it goes. Only session-level failures are returned; once
    /// the budget runs out the record keeps whatever was already read.
    pub async fn run(&mut self, entry: &Entry, record: &mut ProductRecord) -> Result<(), ScrapeError> {
        let budget = self.config.run_budget;
        let outcome = tokio::time::timeout(budget, self.drive(entry, record)).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    backend = self.doc.backend(),
                    phase = %self.phase,
                    "Run budget of {:?} exhausted, keeping partial record",
                    budget
                );
                self.advance(Phase::Completed);
                Ok(())
            }
        }
    }

    async fn drive(&mut self, entry: &Entry, record: &mut ProductRecord) -> Result<(), ScrapeError> {
        match self.walk(entry, record).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => warn!(
                backend = self.doc.backend(),
                phase = %self.phase,
                "{}; finishing with what was gathered",
                e
            ),
        }
        self.advance(Phase::Completed);
        Ok(())
    }

    async fn walk(&mut self, entry: &Entry, record: &mut ProductRecord) -> Result<(), ScrapeError> {
        self.load(entry).await?;
        match entry {
            Entry::Search { query, .. } => {
                self.search(query).await?;
                self.open_first_result().await?;
            }
            Entry::Direct { .. } => self.advance(Phase::ResultOpened),
        }

        self.extract(record).await;

        self.open_characteristics().await?;
        self.build_specs(record).await;
        Ok(())
    }

    async fn load(&mut self, entry: &Entry) -> Result<(), ScrapeError> {
        open_with_retry(&mut *self.doc, entry.url(), self.config).await?;

        let ready = match entry {
            Entry::Search { .. } => &self.layout.search_input,
            Entry::Direct { .. } => &self.layout.product_ready,
        };
        self.wait(Phase::Loaded, ready).await?;
        self.advance(Phase::Loaded);
        Ok(())
    }

    async fn search(&mut self, query: &str) -> Result<(), ScrapeError> {
        let step = Phase::Searched;
        let input = self
            .doc
            .select(None, &self.layout.search_input)
            .await
            .map_err(|e| classify(step, e))?
            .into_iter()
            .next()
            .ok_or_else(|| ScrapeError::navigation(step, "search input not found"))?;

        self.doc
            .type_text(&input, query, &self.config.typing)
            .await
            .map_err(|e| classify(step, e))?;

        let layout = self.layout;
        self.follow(step, &layout.search_submit, "search button").await?;
        self.wait(step, &layout.results_ready).await?;
        self.advance(step);
        Ok(())
    }

    async fn open_first_result(&mut self) -> Result<(), ScrapeError> {
        let step = Phase::ResultOpened;
        let layout = self.layout;
        self.follow(step, &layout.first_result, "first search result")
            .await?;
        self.wait(step, &layout.product_ready).await?;
        self.advance(step);
        Ok(())
    }

    async fn extract(&mut self, record: &mut ProductRecord) {
        extract::extract_into(&*self.doc, self.layout, record).await;
        self.advance(Phase::Extracted);
    }

    async fn open_characteristics(&mut self) -> Result<(), ScrapeError> {
        let step = Phase::CharacteristicsOpened;
        let layout = self.layout;
        self.follow(step, &layout.characteristics_link, "characteristics link")
            .await?;
        self.wait(step, &layout.specifications.sections).await?;
        self.advance(step);
        Ok(())
    }

    async fn build_specs(&mut self, record: &mut ProductRecord) {
        match specs::build(&*self.doc, &self.layout.specifications).await {
            Ok(table) => record.specifications = Some(table),
            Err(e) => debug!(error = %e, "specifications unavailable"),
        }
    }

    /// Finds the node behind `locator` and activates it.
    async fn follow(
        &mut self,
        step: Phase,
        locator: &extract::Locator,
        what: &str,
    ) -> Result<(), ScrapeError> {
        let node = extract::find(&*self.doc, locator)
            .await
            .map_err(|e| classify(step, e))?
            .ok_or_else(|| ScrapeError::navigation(step, format!("{what} not found")))?;
        self.doc.activate(&node).await.map_err(|e| classify(step, e))
    }

    async fn wait(&self, step: Phase, selector: &str) -> Result<(), ScrapeError> {
        let ready = self
            .doc
            .wait_for(selector, self.config.wait_timeout)
            .await
            .map_err(|e| classify(step, e))?;
        if ready {
            Ok(())
        } else {
            Err(ScrapeError::navigation(
                step,
                format!(
                    "`{}` did not appear within {:?}",
                    selector, self.config.wait_timeout
                ),
            ))
        }
    }
}

/// Challenge pages and dead sessions end the run; anything else a step hits
/// only ends that step.
fn classify(step: Phase, err: anyhow::Error) -> ScrapeError {
    match err.downcast::<ScrapeError>() {
        Ok(fatal @ (ScrapeError::Blocked { .. } | ScrapeError::Session(_))) => fatal,
        Ok(other) => ScrapeError::navigation(step, other.to_string()),
        Err(other) => ScrapeError::navigation(step, format!("{other:#}")),
    }
}

/// Opens the entry page, retrying while a challenge page is served.
///
/// Retries are linear: the n-th retry waits `n * block_backoff`. An error
/// status or a load timeout is a navigation failure; any other open failure
/// means the session itself is unusable.
pub async fn open_with_retry<H: DocumentHandle>(
    doc: &mut H,
    url: &str,
    config: &ScrapeConfig,
) -> Result<(), ScrapeError> {
    let mut attempt: u32 = 0;
    loop {
        let err = match doc.open(url).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if !ScrapeError::is_blocked(&err) {
            return Err(match err.downcast::<ScrapeError>() {
                Ok(soft @ (ScrapeError::UnexpectedStatus { .. } | ScrapeError::Timeout { .. })) => {
                    ScrapeError::navigation(Phase::Loaded, soft.to_string())
                }
                Ok(other) => other,
                Err(other) => ScrapeError::Session(other),
            });
        }
        if attempt >= config.block_retries {
            return Err(ScrapeError::Blocked {
                url: url.to_string(),
            });
        }

        attempt += 1;
        let delay = config.block_backoff * attempt;
        warn!(
            backend = doc.backend(),
            "Challenge page at {}, retry {}/{} in {:?}",
            url,
            attempt,
            config.block_retries,
            delay
        );
        tokio::time::sleep(delay).await;
    }
}

/// Runs one acquisition with the chosen backend and returns its record.
pub async fn scrape(
    strategy: Strategy,
    config: &ScrapeConfig,
    layout: &PageLayout,
) -> Result<ProductRecord, ScrapeError> {
    let entry = strategy.entry(config);
    let mut record = ProductRecord::default();
    info!("Starting {} scrape of {}", strategy, entry.url());

    match strategy {
        Strategy::Static => {
            let fetcher = HttpFetcher::new(config).map_err(ScrapeError::Session)?;
            let mut doc = StaticDocument::new(fetcher);
            Acquisition::new(&mut doc, layout, config)
                .run(&entry, &mut record)
                .await?;
        }
        Strategy::Classic => {
            let mut doc = DriverDocument::launch(config).map_err(ScrapeError::Session)?;
            Acquisition::new(&mut doc, layout, config)
                .run(&entry, &mut record)
                .await?;
        }
        Strategy::Modern => {
            let mut doc = BrowserDocument::launch(config)
                .await
                .map_err(ScrapeError::Session)?;
            let outcome = Acquisition::new(&mut doc, layout, config)
                .run(&entry, &mut record)
                .await;
            if let Err(e) = doc.close().await {
                warn!("Failed to close browser: {}", e);
            }
            outcome?;
        }
    }

    info!(
        "Finished {} scrape: {} fields, {} photos, specifications {}",
        strategy,
        record.filled_fields(),
        record.photos.len(),
        if record.specifications.is_some() {
            "present"
        } else {
            "missing"
        }
    );
    Ok(record)
}
