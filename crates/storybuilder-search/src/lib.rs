//! Web search for the research stage.
//!
//! `SearchProvider` is the seam the pipeline depends on; `DuckDuckGoClient`
//! is the default implementation, scraping DuckDuckGo's HTML results page.

mod duckduckgo;
mod models;
mod provider;

pub use duckduckgo::{DuckDuckGoClient, DEFAULT_BASE_URL};
pub use models::SearchHit;
pub use provider::SearchProvider;
