//! # paperweave
//!
//! Aggregates bibliographic metadata (papers, authors, venues, affiliations)
//! from a query-style search API and per-source scrapers into one normalized
//! entity graph.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Paper, Venue, SearchRequest, etc.)
//! - [`search`]: Query fan-out, bounded-concurrency dispatch and result merging
//! - [`sources`]: Scrapers that normalize source records, and their registry
//! - [`utils`]: Date resolution, page fetching and logging setup
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```no_run
//! use paperweave::config::Config;
//! use paperweave::models::{SearchRequest, SortOrder};
//! use paperweave::search::{
//!     run_search, DispatchOptions, FanoutBuilder, HttpSearchApi, QueryDispatcher, RunOptions,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let request = SearchRequest::new().title("attention").year(2017);
//! let specs = FanoutBuilder::new(&request).build()?;
//!
//! let api = Arc::new(HttpSearchApi::new(&config.search_api)?);
//! let options = DispatchOptions::from_config(&config.dispatch, SortOrder::MostCitedFirst);
//! let dispatcher = QueryDispatcher::new(api, options);
//!
//! let cancel = CancellationToken::new();
//! let outcome = run_search(&dispatcher, &specs, &RunOptions::default(), &cancel).await?;
//! for paper in outcome.results.papers().into_iter().flatten() {
//!     println!("{}", paper.title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod models;
pub mod search;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use models::Paper;
pub use search::{run_search, SearchOutcome};
pub use sources::{Scraper, ScraperRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
