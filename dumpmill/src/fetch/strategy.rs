//! Download strategies: segmented range requests vs a single stream.
//!
//! The orchestrator probes the resource, plans the segments, and hands
//! the plan to a strategy. Strategies only move bytes and publish
//! per-segment counters; the orchestrator owns the progress reporter,
//! part assembly, and cleanup.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::error::{FetchError, FetchResult};
use super::http::{ByteProgressCallback, HttpFetcher};
use super::plan::{part_path, Segment};
use super::progress::SegmentProgress;
use crate::cancel::CancelToken;

/// Strategy for downloading one resource.
pub trait FetchStrategy: Send + Sync {
    /// Download the planned segments of `url` toward `dest`.
    ///
    /// Workers publish byte counts through `counters`; whether bytes land
    /// in `dest` directly or in part files is up to the strategy.
    /// Returns the total bytes downloaded.
    fn execute(
        &self,
        fetcher: &HttpFetcher,
        url: &str,
        dest: &Path,
        segments: &[Segment],
        counters: &Arc<SegmentProgress>,
        cancel: &CancelToken,
    ) -> FetchResult<u64>;
}

/// Single-connection strategy.
///
/// Used when the server doesn't advertise range support, when the size
/// is unknown, or when one segment is configured. Writes straight into
/// the destination file.
#[derive(Debug, Default)]
pub struct SingleStreamStrategy {
    /// Resume from existing destination bytes. Only sound when the
    /// server honors range requests.
    resume: bool,
}

impl SingleStreamStrategy {
    /// Create a single-stream strategy.
    pub fn new(resume: bool) -> Self {
        Self { resume }
    }
}

impl FetchStrategy for SingleStreamStrategy {
    fn execute(
        &self,
        fetcher: &HttpFetcher,
        url: &str,
        dest: &Path,
        _segments: &[Segment],
        counters: &Arc<SegmentProgress>,
        cancel: &CancelToken,
    ) -> FetchResult<u64> {
        let resume_from = if self.resume && dest.exists() {
            dest.metadata().map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };

        let counters_clone = Arc::clone(counters);
        let on_bytes: ByteProgressCallback =
            Box::new(move |bytes| counters_clone.update_segment(0, bytes));

        let total = fetcher.fetch_stream(url, dest, resume_from, cancel, Some(on_bytes))?;
        counters.mark_completed(0, total);
        Ok(total)
    }
}

/// Segmented strategy: one thread per planned segment.
///
/// Each thread downloads its byte range into `<dest>.part<i>` with its
/// own HTTP connection. All threads are joined before the result is
/// decided; any segment failure fails the whole download.
#[derive(Debug)]
pub struct SegmentedStrategy {
    /// Timeout applied to each segment's connection.
    pub timeout: Duration,
}

impl SegmentedStrategy {
    /// Create a segmented strategy.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SegmentedStrategy {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl FetchStrategy for SegmentedStrategy {
    fn execute(
        &self,
        _fetcher: &HttpFetcher,
        url: &str,
        dest: &Path,
        segments: &[Segment],
        counters: &Arc<SegmentProgress>,
        cancel: &CancelToken,
    ) -> FetchResult<u64> {
        let failures = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::with_capacity(segments.len());

        for segment in segments.iter().copied() {
            let url = url.to_string();
            let part = part_path(dest, segment.index);
            let counters = Arc::clone(counters);
            let cancel = cancel.clone();
            let failures = Arc::clone(&failures);
            let timeout = self.timeout;

            let handle = thread::spawn(move || {
                let fetcher = HttpFetcher::with_timeout(timeout);

                let counters_clone = Arc::clone(&counters);
                let index = segment.index;
                let on_bytes: ByteProgressCallback =
                    Box::new(move |bytes| counters_clone.update_segment(index, bytes));

                match fetcher.fetch_segment(&url, segment, &part, &cancel, Some(on_bytes)) {
                    Ok(bytes) => {
                        counters.mark_completed(segment.index, bytes);
                    }
                    Err(err) => {
                        failures.lock().unwrap().push((segment.index, err));
                    }
                }
            });

            handles.push(handle);
        }

        for handle in handles {
            handle.join().ok();
        }

        let mut failures = failures.lock().unwrap();
        failures.sort_by_key(|(index, _)| *index);

        // A real failure outranks cancellations observed by sibling threads.
        if let Some((index, err)) = failures.iter().find(|(_, err)| !err.is_canceled()) {
            return Err(FetchError::SegmentFailed {
                index: *index,
                reason: err.to_string(),
            });
        }
        if !failures.is_empty() {
            return Err(FetchError::Canceled);
        }

        Ok(counters.total_bytes())
    }
}
