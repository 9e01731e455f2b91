//! Headline aggregation from RSS, Atom and JSON feeds.
//!
//! `FeedSource` fetches the entry titles of one feed; `FeedAggregator` walks a
//! list of feeds, caps each one, and turns the titles into [`Headline`]s.
//!
//! [`Headline`]: storybuilder_types::Headline

mod aggregator;
mod source;

pub use aggregator::{FeedAggregator, DEFAULT_FEEDS, DEFAULT_PER_FEED_CAP};
pub use source::{parse_titles, FeedSource, HttpFeedSource};
