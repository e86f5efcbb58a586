use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ScrapeError;
use crate::scraper::Pacing;

pub const DEFAULT_HOME_URL: &str = "https://rozetka.com.ua/";
pub const DEFAULT_PRODUCT_URL: &str = "https://rozetka.com.ua/apple-iphone-15-128gb-black/p395460480/";
pub const DEFAULT_QUERY: &str = "Apple iPhone 15 128GB Black";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "uk-UA,uk;q=0.9,en-US;q=0.8,en;q=0.7";

/// Inputs to a single run. Target URL and query are fixed per run.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub home_url: String,
    pub product_url: String,
    pub query: String,
    pub user_agent: String,
    pub accept_language: String,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    /// Upper bound for every wait-for-element step.
    pub wait_timeout: Duration,
    pub navigation_timeout: Duration,
    /// Wall-clock budget for the whole run; partial records survive it.
    pub run_budget: Duration,
    pub typing: Pacing,
    pub settle: Pacing,
    pub block_retries: u32,
    pub block_backoff: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            home_url: DEFAULT_HOME_URL.to_string(),
            product_url: DEFAULT_PRODUCT_URL.to_string(),
            query: DEFAULT_QUERY.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            headless: true,
            chrome_path: None,
            wait_timeout: Duration::from_secs(10),
            navigation_timeout: Duration::from_secs(30),
            run_budget: Duration::from_secs(300),
            typing: Pacing::new(Duration::from_millis(50), Duration::from_millis(150)),
            settle: Pacing::new(Duration::from_millis(3000), Duration::from_millis(5000)),
            block_retries: 3,
            block_backoff: Duration::from_secs(5),
        }
    }
}

impl ScrapeConfig {
    /// Reads `ROZETKA_*` variables, falling back to the defaults.
    pub fn from_env() -> Result<Self, ScrapeError> {
        let defaults = Self::default();

        let typing = Pacing::new(
            env_millis("ROZETKA_TYPING_MIN_MS", defaults.typing.min)?,
            env_millis("ROZETKA_TYPING_MAX_MS", defaults.typing.max)?,
        );
        let settle = Pacing::new(
            env_millis("ROZETKA_SETTLE_MIN_MS", defaults.settle.min)?,
            env_millis("ROZETKA_SETTLE_MAX_MS", defaults.settle.max)?,
        );

        Ok(Self {
            home_url: std::env::var("ROZETKA_HOME_URL").unwrap_or(defaults.home_url),
            product_url: std::env::var("ROZETKA_PRODUCT_URL").unwrap_or(defaults.product_url),
            query: std::env::var("ROZETKA_QUERY").unwrap_or(defaults.query),
            user_agent: std::env::var("ROZETKA_USER_AGENT").unwrap_or(defaults.user_agent),
            accept_language: std::env::var("ROZETKA_ACCEPT_LANGUAGE")
                .unwrap_or(defaults.accept_language),
            headless: env_parse("ROZETKA_HEADLESS", defaults.headless)?,
            chrome_path: std::env::var("ROZETKA_CHROME_PATH")
                .ok()
                .map(PathBuf::from)
                .or(defaults.chrome_path),
            wait_timeout: env_millis("ROZETKA_WAIT_TIMEOUT_MS", defaults.wait_timeout)?,
            navigation_timeout: env_millis(
                "ROZETKA_NAVIGATION_TIMEOUT_MS",
                defaults.navigation_timeout,
            )?,
            run_budget: env_millis("ROZETKA_RUN_BUDGET_MS", defaults.run_budget)?,
            typing,
            settle,
            block_retries: env_parse("ROZETKA_BLOCK_RETRIES", defaults.block_retries)?,
            block_backoff: env_millis("ROZETKA_BLOCK_BACKOFF_MS", defaults.block_backoff)?,
        })
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ScrapeError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ScrapeError::Config(format!("{key} has an unparseable value: {raw:?}"))),
        Err(_) => Ok(default),
    }
}

fn env_millis(key: &str, default: Duration) -> Result<Duration, ScrapeError> {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    env_parse(key, default_ms).map(Duration::from_millis)
}
