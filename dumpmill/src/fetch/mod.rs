//! Concurrent, resumable archive downloads.
//!
//! This module downloads one dump archive per call, including:
//! - HEAD probes for size and range support (`http`)
//! - Byte-range segment planning (`plan`)
//! - Single-stream and thread-per-segment strategies (`strategy`)
//! - Atomic counters with a polling progress reporter (`progress`)
//! - SHA-256 verification (`checksum`)
//! - High-level orchestration and part assembly (`orchestrator`)
//!
//! # Architecture
//!
//! ```text
//! SegmentedDownloader (orchestrator)
//!         │
//!         ├── HttpFetcher (probe, ranged and full streams)
//!         │
//!         ├── FetchStrategy (trait)
//!         │       ├── SingleStreamStrategy
//!         │       └── SegmentedStrategy (one thread per segment)
//!         │
//!         ├── SegmentProgress + ProgressReporter (500ms snapshots)
//!         │
//!         └── assemble_parts (concat .part<i> in index order)
//! ```
//!
//! Cancellation flows down as a [`CancelToken`](crate::cancel::CancelToken)
//! checked between 64KiB blocks. A canceled or failed download removes
//! its part files and partial destination; part files only survive a
//! crash, and the next attempt resumes them.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use dumpmill::cancel::CancelToken;
//! use dumpmill::fetch::{ArchiveDownloader, SegmentedDownloader};
//!
//! let downloader = SegmentedDownloader::new();
//! let cancel = CancelToken::new();
//!
//! let bytes = downloader.download_with_progress(
//!     "https://dumps.example.com/discogs_20240101_releases.xml.gz",
//!     Path::new("/data/releases/2024-01/discogs_20240101_releases.xml.gz"),
//!     None,
//!     &cancel,
//!     Box::new(|progress| {
//!         println!("{} / {} bytes", progress.bytes_downloaded, progress.total_bytes);
//!     }),
//! )?;
//! ```

mod checksum;
mod error;
mod http;
mod orchestrator;
mod plan;
mod progress;
mod strategy;

pub use checksum::{sha256_file, verify_sha256};
pub use error::{FetchError, FetchResult};
pub use http::{HttpFetcher, ResourceInfo};
pub use orchestrator::{ArchiveDownloader, SegmentedDownloader};
pub use plan::{part_path, plan_segments, Segment};
pub use progress::{
    DownloadProgress, FetchProgressCallback, ProgressReporter, SegmentProgress,
    DEFAULT_POLL_INTERVAL,
};
