use thiserror::Error;

use crate::service::Phase;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("session unusable: {0}")]
    Session(#[source] anyhow::Error),

    #[error("request to {url} was blocked by an anti-automation challenge")]
    Blocked { url: String },

    #[error("navigation step `{step}` failed: {reason}")]
    Navigation { step: Phase, reason: String },

    #[error("timed out loading {url}")]
    Timeout { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ScrapeError {
    pub fn navigation(step: Phase, reason: impl Into<String>) -> Self {
        Self::Navigation {
            step,
            reason: reason.into(),
        }
    }

    /// Navigation failures only truncate the current phase; everything else
    /// ends the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Navigation { .. })
    }

    /// Looks through an adapter error for a challenge page report.
    pub fn is_blocked(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<ScrapeError>(), Some(ScrapeError::Blocked { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_is_the_only_recoverable_error() {
        assert!(!ScrapeError::navigation(Phase::Searched, "no input").is_fatal());
        assert!(ScrapeError::Blocked { url: "https://x".into() }.is_fatal());
        assert!(ScrapeError::Session(anyhow::anyhow!("crashed")).is_fatal());
    }

    #[test]
    fn blocked_survives_anyhow_wrapping() {
        let err = anyhow::Error::new(ScrapeError::Blocked {
            url: "https://rozetka.com.ua/".into(),
        });
        assert!(ScrapeError::is_blocked(&err));
        assert!(!ScrapeError::is_blocked(&anyhow::anyhow!("connection reset")));
    }
}
