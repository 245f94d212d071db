//! Utility modules supporting ingestion and search.
//!
//! - [`dates`]: resolution of ambiguous source dates and search bounds
//! - [`Fetcher`]: capability to fetch a page as JSON or text, with [`HttpFetcher`]
//!   as the reqwest-backed implementation and [`StaticFetcher`] for tests
//! - [`init_logging`]: tracing subscriber setup
//!
//! # Date resolution
//!
//! ```rust
//! use paperweave::models::DatePrecision;
//! use paperweave::utils::dates::resolve_date;
//!
//! let published = [2020, 6];
//! let resolved = resolve_date(None, [None, Some(&published[..])]).unwrap();
//! assert_eq!(resolved.precision, DatePrecision::Month);
//! ```

pub mod dates;
mod http;
mod logging;

pub use dates::{resolve_bounds, resolve_date, DateResolutionError, ResolvedDate};
pub use http::{FetchError, Fetcher, Format, HttpFetcher, Payload, StaticFetcher};
pub use logging::init_logging;
