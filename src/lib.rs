//! Turns provider RSS feeds and web pages into normalized Atom feeds.
//!
//! A run obtains one or more feeds, converts RSS to Atom, merges multiple
//! sources into one document ordered by `updated`, and then enriches every
//! entry concurrently with data scraped from its article page: an audio or
//! video enclosure, or the sanitized article body. Entries that cannot be
//! enriched are dropped instead of failing the run.

pub mod config;
pub mod enrich;
pub mod extract;
pub mod feed;
pub mod pipeline;
pub mod util;
pub mod xml;
