#![deny(clippy::all)]

pub use crate::config::ScrapeConfig;
pub use crate::error::ScrapeError;
pub use crate::layout::{PageLayout, SpecLayout};
pub use crate::record::{ProductRecord, SpecSection, SpecTable};
pub use crate::service::{scrape, Acquisition, Entry, Phase, Strategy};

pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod layout;
pub mod normalize;
pub mod record;
pub mod scraper;
pub mod service;
pub mod storage;
