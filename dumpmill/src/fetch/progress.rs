//! Progress reporting for segmented downloads.
//!
//! Segment threads only touch atomic counters; a single reporter thread
//! polls them on a fixed interval, derives throughput and ETA from the
//! elapsed wall time, and invokes the caller's callback with a snapshot.
//! Workers never block on progress consumers.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default reporter poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Snapshot of overall download progress at one reporter tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    /// Bytes downloaded across all segments.
    pub bytes_downloaded: u64,
    /// Total expected bytes, 0 when the size is unknown.
    pub total_bytes: u64,
    /// Segments fully downloaded.
    pub segments_completed: usize,
    /// Total number of segments.
    pub total_segments: usize,
    /// Seconds since the download started.
    pub elapsed_secs: f64,
    /// Average throughput since the start, in bytes per second.
    pub bytes_per_sec: f64,
    /// Estimated seconds remaining, when computable.
    pub eta_secs: Option<f64>,
}

impl DownloadProgress {
    /// Completed fraction in `0.0..=1.0`, when the total size is known.
    pub fn fraction(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        Some((self.bytes_downloaded as f64 / self.total_bytes as f64).min(1.0))
    }
}

/// Progress callback invoked from the reporter thread.
pub type FetchProgressCallback = Box<dyn Fn(&DownloadProgress) + Send + Sync>;

/// Shared progress counters for segment download threads.
///
/// Holds one atomic byte counter per segment so workers can publish
/// progress without locking.
#[derive(Debug)]
pub struct SegmentProgress {
    /// Per-segment byte counters.
    pub segment_bytes: Arc<Vec<AtomicU64>>,
    /// Number of segments fully downloaded.
    pub segments_completed: Arc<AtomicUsize>,
    /// Signal to stop the reporter thread.
    pub done: Arc<AtomicBool>,
}

impl SegmentProgress {
    /// Create counters for the given number of segments.
    pub fn new(num_segments: usize) -> Self {
        Self {
            segment_bytes: Arc::new((0..num_segments).map(|_| AtomicU64::new(0)).collect()),
            segments_completed: Arc::new(AtomicUsize::new(0)),
            done: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Total bytes downloaded across all segments.
    pub fn total_bytes(&self) -> u64 {
        self.segment_bytes
            .iter()
            .map(|b| b.load(Ordering::SeqCst))
            .sum()
    }

    /// Number of completed segments.
    pub fn completed_segments(&self) -> usize {
        self.segments_completed.load(Ordering::SeqCst)
    }

    /// Publish the byte count for one segment.
    pub fn update_segment(&self, index: usize, bytes: u64) {
        if index < self.segment_bytes.len() {
            self.segment_bytes[index].store(bytes, Ordering::SeqCst);
        }
    }

    /// Mark one segment as fully downloaded.
    pub fn mark_completed(&self, index: usize, final_bytes: u64) {
        if index < self.segment_bytes.len() {
            self.segment_bytes[index].store(final_bytes, Ordering::SeqCst);
            self.segments_completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Signal the reporter thread to stop.
    pub fn signal_done(&self) {
        self.done.store(true, Ordering::SeqCst);
    }

    /// Whether the download has been signaled done.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

/// Average throughput and remaining-time estimate.
///
/// Throughput is bytes over elapsed wall time since the start. The ETA is
/// remaining bytes over that throughput, and is `None` until both the
/// total size and a nonzero throughput are known.
fn rate_and_eta(bytes: u64, total: u64, elapsed_secs: f64) -> (f64, Option<f64>) {
    if elapsed_secs <= 0.0 {
        return (0.0, None);
    }
    let rate = bytes as f64 / elapsed_secs;
    if total == 0 || rate <= 0.0 {
        return (rate, None);
    }
    let remaining = total.saturating_sub(bytes);
    (rate, Some(remaining as f64 / rate))
}

fn snapshot(
    counters: &SegmentProgress,
    total_size: u64,
    total_segments: usize,
    started: Instant,
) -> DownloadProgress {
    let bytes = counters.total_bytes();
    let elapsed_secs = started.elapsed().as_secs_f64();
    let (bytes_per_sec, eta_secs) = rate_and_eta(bytes, total_size, elapsed_secs);

    DownloadProgress {
        bytes_downloaded: bytes,
        total_bytes: total_size,
        segments_completed: counters.completed_segments(),
        total_segments,
        elapsed_secs,
        bytes_per_sec,
        eta_secs,
    }
}

/// Polling progress reporter for segmented downloads.
///
/// Spawns a background thread that snapshots the counters on every poll
/// interval and invokes the callback. A final snapshot is reported after
/// the done signal so consumers always see the terminal byte count.
pub struct ProgressReporter {
    handle: Option<JoinHandle<()>>,
    counters: Arc<SegmentProgress>,
}

impl ProgressReporter {
    /// Start a reporter.
    ///
    /// # Arguments
    ///
    /// * `counters` - Shared segment counters
    /// * `total_size` - Total expected bytes, 0 when unknown
    /// * `total_segments` - Number of segments being downloaded
    /// * `callback` - Invoked with each snapshot
    /// * `poll_interval` - Time between snapshots
    pub fn start(
        counters: Arc<SegmentProgress>,
        total_size: u64,
        total_segments: usize,
        callback: Arc<FetchProgressCallback>,
        poll_interval: Duration,
    ) -> Self {
        let counters_clone = Arc::clone(&counters);
        let started = Instant::now();

        let handle = thread::spawn(move || {
            while !counters_clone.is_done() {
                callback(&snapshot(
                    &counters_clone,
                    total_size,
                    total_segments,
                    started,
                ));
                thread::sleep(poll_interval);
            }

            // Final report
            callback(&snapshot(
                &counters_clone,
                total_size,
                total_segments,
                started,
            ));
        });

        Self {
            handle: Some(handle),
            counters,
        }
    }

    /// Start a reporter with the default 500ms poll interval.
    pub fn start_default(
        counters: Arc<SegmentProgress>,
        total_size: u64,
        total_segments: usize,
        callback: Arc<FetchProgressCallback>,
    ) -> Self {
        Self::start(
            counters,
            total_size,
            total_segments,
            callback,
            DEFAULT_POLL_INTERVAL,
        )
    }

    /// Stop the reporter and wait for it to finish.
    #[cfg(test)]
    pub fn stop(mut self) {
        self.counters.signal_done();
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.counters.signal_done();
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_progress_new() {
        let counters = SegmentProgress::new(3);
        assert_eq!(counters.segment_bytes.len(), 3);
        assert_eq!(counters.total_bytes(), 0);
        assert_eq!(counters.completed_segments(), 0);
        assert!(!counters.is_done());
    }

    #[test]
    fn test_segment_progress_update() {
        let counters = SegmentProgress::new(2);

        counters.update_segment(0, 500);
        counters.update_segment(1, 300);

        assert_eq!(counters.total_bytes(), 800);
    }

    #[test]
    fn test_segment_progress_mark_completed() {
        let counters = SegmentProgress::new(2);

        counters.mark_completed(0, 1000);

        assert_eq!(counters.completed_segments(), 1);
        assert_eq!(counters.segment_bytes[0].load(Ordering::SeqCst), 1000);
    }

    #[test]
    fn test_segment_progress_ignores_out_of_range() {
        let counters = SegmentProgress::new(1);

        counters.update_segment(5, 100);
        counters.mark_completed(5, 100);

        assert_eq!(counters.total_bytes(), 0);
        assert_eq!(counters.completed_segments(), 0);
    }

    #[test]
    fn test_rate_and_eta() {
        let (rate, eta) = rate_and_eta(1000, 4000, 2.0);
        assert_eq!(rate, 500.0);
        assert_eq!(eta, Some(6.0));
    }

    #[test]
    fn test_rate_and_eta_unknown_total() {
        let (rate, eta) = rate_and_eta(1000, 0, 2.0);
        assert_eq!(rate, 500.0);
        assert_eq!(eta, None);
    }

    #[test]
    fn test_rate_and_eta_zero_elapsed() {
        let (rate, eta) = rate_and_eta(1000, 4000, 0.0);
        assert_eq!(rate, 0.0);
        assert_eq!(eta, None);
    }

    #[test]
    fn test_rate_and_eta_overshoot_clamps_to_zero() {
        let (_, eta) = rate_and_eta(5000, 4000, 2.0);
        assert_eq!(eta, Some(0.0));
    }

    #[test]
    fn test_fraction() {
        let progress = DownloadProgress {
            bytes_downloaded: 250,
            total_bytes: 1000,
            segments_completed: 1,
            total_segments: 4,
            elapsed_secs: 1.0,
            bytes_per_sec: 250.0,
            eta_secs: Some(3.0),
        };
        assert_eq!(progress.fraction(), Some(0.25));

        let unknown = DownloadProgress {
            total_bytes: 0,
            ..progress
        };
        assert_eq!(unknown.fraction(), None);
    }

    #[test]
    fn test_reporter_lifecycle() {
        let counters = Arc::new(SegmentProgress::new(2));
        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = Arc::clone(&call_count);

        let callback: FetchProgressCallback = Box::new(move |_progress| {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let reporter = ProgressReporter::start(
            Arc::clone(&counters),
            1000,
            2,
            Arc::new(callback),
            Duration::from_millis(10),
        );

        thread::sleep(Duration::from_millis(50));
        reporter.stop();

        assert!(call_count.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_reporter_final_snapshot_sees_all_bytes() {
        let counters = Arc::new(SegmentProgress::new(1));
        let last_bytes = Arc::new(AtomicU64::new(0));
        let last_bytes_clone = Arc::clone(&last_bytes);

        let callback: FetchProgressCallback = Box::new(move |progress| {
            last_bytes_clone.store(progress.bytes_downloaded, Ordering::SeqCst);
        });

        let reporter = ProgressReporter::start(
            Arc::clone(&counters),
            100,
            1,
            Arc::new(callback),
            Duration::from_millis(5),
        );

        counters.mark_completed(0, 100);
        reporter.stop();

        assert_eq!(last_bytes.load(Ordering::SeqCst), 100);
    }
}
