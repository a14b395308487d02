//! High-level download orchestration.
//!
//! [`SegmentedDownloader`] owns the full life of one archive download:
//! probe, strategy selection, segment execution, part assembly, size and
//! checksum verification, and cleanup. Strategies below it only move
//! bytes; everything that decides success or failure lives here.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::checksum::verify_sha256;
use super::error::{FetchError, FetchResult};
use super::http::{HttpFetcher, BLOCK_SIZE};
use super::plan::{part_path, plan_segments, Segment};
use super::progress::{
    DownloadProgress, FetchProgressCallback, ProgressReporter, SegmentProgress,
};
use super::strategy::{FetchStrategy, SegmentedStrategy, SingleStreamStrategy};
use crate::cancel::CancelToken;

/// Archive downloader seam.
///
/// The pipeline depends on this trait rather than on the HTTP engine,
/// so tests can substitute a local-file implementation.
pub trait ArchiveDownloader: Send + Sync {
    /// Download `url` into `dest`, verifying against `expected_sha256`
    /// when one is given. Returns the final byte count.
    fn download(
        &self,
        url: &str,
        dest: &Path,
        expected_sha256: Option<&str>,
        cancel: &CancelToken,
    ) -> FetchResult<u64>;

    /// Like [`download`](Self::download), with progress snapshots
    /// delivered on a polling interval.
    fn download_with_progress(
        &self,
        url: &str,
        dest: &Path,
        expected_sha256: Option<&str>,
        cancel: &CancelToken,
        on_progress: FetchProgressCallback,
    ) -> FetchResult<u64>;
}

/// Range-segmented archive downloader.
///
/// Probes the resource, splits it into equal byte ranges downloaded by
/// one thread each, and concatenates the parts in index order. Falls
/// back to a single stream when the server doesn't support ranges, the
/// size is unknown, or one segment is configured.
///
/// On failure or cancellation the destination and all part files are
/// removed; only a crash leaves parts behind, and those are resumed by
/// the next attempt.
#[derive(Debug)]
pub struct SegmentedDownloader {
    /// Probing client; segment threads build their own.
    fetcher: HttpFetcher,
    /// Requested segment count.
    segments: usize,
}

impl Default for SegmentedDownloader {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentedDownloader {
    /// Create a downloader with default settings (4 segments).
    pub fn new() -> Self {
        Self {
            fetcher: HttpFetcher::new(),
            segments: 4,
        }
    }

    /// Create a downloader with custom settings.
    pub fn with_settings(timeout: Duration, segments: usize) -> Self {
        Self {
            fetcher: HttpFetcher::with_timeout(timeout),
            segments: segments.max(1),
        }
    }

    /// Requested segment count.
    pub fn segments(&self) -> usize {
        self.segments
    }

    fn run(
        &self,
        url: &str,
        dest: &Path,
        expected_sha256: Option<&str>,
        cancel: &CancelToken,
        on_progress: Option<FetchProgressCallback>,
    ) -> FetchResult<u64> {
        if cancel.is_canceled() {
            cleanup_partials(dest);
            return Err(FetchError::Canceled);
        }

        let info = self.fetcher.probe(url)?;

        // A destination already at the probed size is a finished download.
        if let Some(size) = self.check_existing(dest, info.total_size, expected_sha256)? {
            report_already_complete(&on_progress, size);
            return Ok(size);
        }

        let use_segments = info.supports_ranges && info.total_size > 0 && self.segments > 1;
        let (plan, strategy): (Vec<Segment>, Box<dyn FetchStrategy>) = if use_segments {
            (
                plan_segments(info.total_size, self.segments),
                Box::new(SegmentedStrategy::new(self.fetcher.timeout)),
            )
        } else {
            (
                Vec::new(),
                Box::new(SingleStreamStrategy::new(info.supports_ranges)),
            )
        };
        let segment_count = if use_segments { plan.len() } else { 1 };

        debug!(
            url = url,
            total_bytes = info.total_size,
            segments = segment_count,
            ranged = use_segments,
            "Starting download"
        );

        let counters = Arc::new(SegmentProgress::new(segment_count));
        let _reporter = on_progress.map(|cb| {
            ProgressReporter::start_default(
                Arc::clone(&counters),
                info.total_size,
                segment_count,
                Arc::new(cb),
            )
        });

        let result = strategy.execute(&self.fetcher, url, dest, &plan, &counters, cancel);
        counters.signal_done();

        if let Err(err) = result {
            cleanup_partials(dest);
            return Err(err);
        }

        if use_segments {
            if let Err(err) = assemble_parts(&plan, dest) {
                cleanup_partials(dest);
                return Err(err);
            }
        }

        let final_size = dest.metadata().map(|m| m.len()).unwrap_or(0);
        if info.total_size > 0 && final_size != info.total_size {
            cleanup_partials(dest);
            return Err(FetchError::SizeMismatch {
                path: dest.to_path_buf(),
                expected: info.total_size,
                actual: final_size,
            });
        }

        if let Some(expected) = expected_sha256 {
            if let Err(err) = verify_sha256(dest, expected) {
                cleanup_partials(dest);
                return Err(err);
            }
        }

        info!(url = url, bytes = final_size, "Download complete");
        Ok(final_size)
    }

    /// Check whether `dest` already holds the complete resource.
    ///
    /// A size match with a failed checksum deletes the file so the
    /// download starts over.
    fn check_existing(
        &self,
        dest: &Path,
        total_size: u64,
        expected_sha256: Option<&str>,
    ) -> FetchResult<Option<u64>> {
        if total_size == 0 || !dest.is_file() {
            return Ok(None);
        }
        let existing = dest.metadata().map(|m| m.len()).unwrap_or(0);
        if existing != total_size {
            return Ok(None);
        }

        if let Some(expected) = expected_sha256 {
            if verify_sha256(dest, expected).is_err() {
                fs::remove_file(dest).ok();
                return Ok(None);
            }
        }

        debug!(dest = %dest.display(), "Destination already complete, skipping download");
        Ok(Some(total_size))
    }
}

impl ArchiveDownloader for SegmentedDownloader {
    fn download(
        &self,
        url: &str,
        dest: &Path,
        expected_sha256: Option<&str>,
        cancel: &CancelToken,
    ) -> FetchResult<u64> {
        self.run(url, dest, expected_sha256, cancel, None)
    }

    fn download_with_progress(
        &self,
        url: &str,
        dest: &Path,
        expected_sha256: Option<&str>,
        cancel: &CancelToken,
        on_progress: FetchProgressCallback,
    ) -> FetchResult<u64> {
        self.run(url, dest, expected_sha256, cancel, Some(on_progress))
    }
}

/// Concatenate part files into the destination, in segment order.
///
/// Every part must exist before any byte is written, so a missing part
/// can never produce a truncated destination.
fn assemble_parts(segments: &[Segment], dest: &Path) -> FetchResult<u64> {
    for segment in segments {
        let part = part_path(dest, segment.index);
        if !part.exists() {
            return Err(FetchError::MissingPart { path: part });
        }
    }

    let output = File::create(dest).map_err(|e| FetchError::WriteFailed {
        path: dest.to_path_buf(),
        source: e,
    })?;
    let mut writer = BufWriter::new(output);
    let mut total = 0u64;

    for segment in segments {
        let part = part_path(dest, segment.index);
        let file = File::open(&part).map_err(|e| FetchError::ReadFailed {
            path: part.clone(),
            source: e,
        })?;
        let mut reader = BufReader::new(file);
        let mut buffer = vec![0u8; BLOCK_SIZE];

        loop {
            let bytes_read = reader.read(&mut buffer).map_err(|e| FetchError::ReadFailed {
                path: part.clone(),
                source: e,
            })?;

            if bytes_read == 0 {
                break;
            }

            writer
                .write_all(&buffer[..bytes_read])
                .map_err(|e| FetchError::WriteFailed {
                    path: dest.to_path_buf(),
                    source: e,
                })?;

            total += bytes_read as u64;
        }
    }

    writer.flush().map_err(|e| FetchError::WriteFailed {
        path: dest.to_path_buf(),
        source: e,
    })?;

    for segment in segments {
        fs::remove_file(part_path(dest, segment.index)).ok();
    }

    Ok(total)
}

/// Best-effort removal of the destination and any part files beside it.
///
/// Scans the parent directory instead of trusting the current segment
/// count, so parts from a run with a different configuration are
/// removed too.
fn cleanup_partials(dest: &Path) {
    fs::remove_file(dest).ok();

    let Some(parent) = dest.parent() else {
        return;
    };
    let Some(name) = dest.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    let prefix = format!("{}.part", name);

    if let Ok(entries) = fs::read_dir(parent) {
        for entry in entries.flatten() {
            let matches = entry
                .file_name()
                .to_str()
                .map(|n| n.starts_with(&prefix))
                .unwrap_or(false);
            if matches {
                fs::remove_file(entry.path()).ok();
            }
        }
    }
}

/// Deliver one terminal snapshot for a download that was already done.
fn report_already_complete(on_progress: &Option<FetchProgressCallback>, size: u64) {
    if let Some(cb) = on_progress {
        cb(&DownloadProgress {
            bytes_downloaded: size,
            total_bytes: size,
            segments_completed: 1,
            total_segments: 1,
            elapsed_secs: 0.0,
            bytes_per_sec: 0.0,
            eta_secs: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_downloader_default() {
        let downloader = SegmentedDownloader::default();
        assert_eq!(downloader.segments(), 4);
    }

    #[test]
    fn test_downloader_with_settings() {
        let downloader = SegmentedDownloader::with_settings(Duration::from_secs(60), 8);
        assert_eq!(downloader.segments(), 8);
        assert_eq!(downloader.fetcher.timeout.as_secs(), 60);
    }

    #[test]
    fn test_downloader_min_segments() {
        let downloader = SegmentedDownloader::with_settings(Duration::from_secs(60), 0);
        assert_eq!(downloader.segments(), 1);
    }

    #[test]
    fn test_canceled_download_removes_leftover_parts() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("dump.xml.gz");
        let part0 = part_path(&dest, 0);
        let part1 = part_path(&dest, 1);
        fs::write(&part0, b"left over").unwrap();
        fs::write(&part1, b"from a previous run").unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();

        let downloader = SegmentedDownloader::new();
        let result = downloader.download("http://localhost/never-contacted", &dest, None, &cancel);

        assert!(matches!(result, Err(FetchError::Canceled)));
        assert!(!part0.exists());
        assert!(!part1.exists());
        assert!(!dest.exists());
    }

    #[test]
    fn test_assemble_parts_in_order() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("dump.bin");
        let segments = plan_segments(11, 3);

        fs::write(part_path(&dest, 0), b"Hel").unwrap();
        fs::write(part_path(&dest, 1), b"lo ").unwrap();
        fs::write(part_path(&dest, 2), b"world").unwrap();

        let total = assemble_parts(&segments, &dest).unwrap();

        assert_eq!(total, 11);
        assert_eq!(fs::read(&dest).unwrap(), b"Hello world");
        // Parts are removed after a successful assembly
        assert!(!part_path(&dest, 0).exists());
        assert!(!part_path(&dest, 1).exists());
        assert!(!part_path(&dest, 2).exists());
    }

    #[test]
    fn test_assemble_missing_part_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("dump.bin");
        let segments = plan_segments(10, 2);

        fs::write(part_path(&dest, 0), b"half").unwrap();

        let result = assemble_parts(&segments, &dest);

        assert!(matches!(result, Err(FetchError::MissingPart { .. })));
        assert!(!dest.exists());
        // The existing part is untouched
        assert!(part_path(&dest, 0).exists());
    }

    #[test]
    fn test_assemble_single_part() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("dump.bin");
        let segments = plan_segments(5, 1);

        fs::write(part_path(&dest, 0), b"bytes").unwrap();

        let total = assemble_parts(&segments, &dest).unwrap();
        assert_eq!(total, 5);
        assert_eq!(fs::read(&dest).unwrap(), b"bytes");
    }

    #[test]
    fn test_cleanup_partials_removes_dest_and_parts() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("dump.xml.gz");
        fs::write(&dest, b"partial").unwrap();
        fs::write(part_path(&dest, 0), b"p0").unwrap();
        fs::write(part_path(&dest, 7), b"p7").unwrap();
        let unrelated = temp.path().join("other.xml.gz");
        fs::write(&unrelated, b"keep").unwrap();

        cleanup_partials(&dest);

        assert!(!dest.exists());
        assert!(!part_path(&dest, 0).exists());
        assert!(!part_path(&dest, 7).exists());
        assert!(unrelated.exists());
    }
}
