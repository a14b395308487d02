//! Dumpmill - bulk acquisition and tabulation of monthly XML data dumps
//!
//! This library downloads large gzip-compressed XML dump archives,
//! decompresses them, and converts them into flat CSV files whose schema
//! is discovered from the data itself. Every stage streams in bounded
//! memory, honors cooperative cancellation, and leaves only complete
//! artifacts behind, so interrupted runs can always be resumed.
//!
//! Module map:
//! - [`cancel`] - shared cancellation token
//! - [`catalog`] - dataset identity, naming, and filesystem-derived state
//! - [`config`] - configuration with INI persistence
//! - [`convert`] - XML chunking, schema discovery, CSV output
//! - [`extract`] - streaming gzip extraction
//! - [`fetch`] - concurrent range-segmented downloads
//! - [`logging`] - tracing subscriber setup for binaries
//! - [`pipeline`] - stage orchestration with idempotence guards

pub mod cancel;
pub mod catalog;
pub mod config;
pub mod convert;
pub mod extract;
pub mod fetch;
pub mod logging;
pub mod pipeline;

/// Library version, from the crate manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
