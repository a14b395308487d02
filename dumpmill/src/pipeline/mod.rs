//! Lifecycle orchestration: download, extract, convert.
//!
//! [`Pipeline`] chains the stages for one dataset, checking an
//! idempotence guard at every boundary: a stage whose output already
//! exists is a no-op, so re-running the pipeline after a failure only
//! repeats the work that is actually missing. Artifacts prove progress;
//! the catalog never has to be trusted.
//!
//! ```text
//! url ──download──> .xml.gz ──extract──> .xml ──convert──> .csv
//!                                          │
//!                                          └─ chunk → discover → write → cleanup
//! ```
//!
//! Every stage returns a [`StageOutcome`]: success, canceled, or failed
//! with a reason. [`Pipeline::process`] runs the whole chain and stops
//! at the first outcome that is not a success.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::catalog::DatasetEntry;
use crate::config::{format_size, DumpConfig};
use crate::convert::{
    discover_schema, list_chunk_files, materialize_csv, ConvertError, RecordChunker,
};
use crate::extract::{ExtractError, ExtractOutcome, GzipExtractor};
use crate::fetch::{ArchiveDownloader, FetchError, SegmentedDownloader};

/// Pipeline stages, for progress reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Downloading the compressed archive.
    Download,
    /// Decompressing the archive.
    Extract,
    /// Splitting the XML into chunk files.
    Chunk,
    /// First conversion pass: collecting column names.
    DiscoverSchema,
    /// Second conversion pass: writing rows.
    WriteCsv,
    /// Removing intermediate chunk files.
    Cleanup,
    /// All stages finished.
    Complete,
}

impl PipelineStage {
    /// Human-readable name for the stage.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Download => "Downloading",
            Self::Extract => "Extracting",
            Self::Chunk => "Chunking",
            Self::DiscoverSchema => "Discovering schema",
            Self::WriteCsv => "Writing CSV",
            Self::Cleanup => "Cleaning up",
            Self::Complete => "Complete",
        }
    }
}

/// Progress callback for pipeline operations.
///
/// # Arguments
///
/// * `stage` - Current pipeline stage
/// * `progress` - Progress within the stage (0.0 - 1.0)
/// * `message` - Human-readable message
pub type PipelineProgressCallback = Box<dyn Fn(PipelineStage, f64, &str) + Send + Sync>;

/// Shared form of the progress callback, cloned across stages.
type ProgressFn = dyn Fn(PipelineStage, f64, &str) + Send + Sync;

/// How one pipeline stage ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage finished, or its output already existed.
    Success,
    /// The stage observed a cancellation request and cleaned up.
    Canceled,
    /// The stage failed for the given reason.
    Failed(String),
}

impl StageOutcome {
    /// Whether the stage finished (or was correctly skipped).
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Whether the stage ended on a cancellation request.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

impl From<FetchError> for StageOutcome {
    fn from(err: FetchError) -> Self {
        if err.is_canceled() {
            Self::Canceled
        } else {
            Self::Failed(err.to_string())
        }
    }
}

impl From<ExtractError> for StageOutcome {
    fn from(err: ExtractError) -> Self {
        if err.is_canceled() {
            Self::Canceled
        } else {
            Self::Failed(err.to_string())
        }
    }
}

impl From<ConvertError> for StageOutcome {
    fn from(err: ConvertError) -> Self {
        if err.is_canceled() {
            Self::Canceled
        } else {
            Self::Failed(err.to_string())
        }
    }
}

/// Per-stage outcomes of one [`Pipeline::process`] run.
///
/// A stage that was never reached is `None`; the chain stops at the
/// first outcome that is not a success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub download: Option<StageOutcome>,
    pub extract: Option<StageOutcome>,
    pub convert: Option<StageOutcome>,
}

impl PipelineReport {
    /// Whether every stage ran and succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.convert, Some(StageOutcome::Success))
    }

    /// The outcome the chain stopped on.
    pub fn final_outcome(&self) -> &StageOutcome {
        self.convert
            .as_ref()
            .or(self.extract.as_ref())
            .or(self.download.as_ref())
            .expect("a pipeline run always has a download outcome")
    }
}

/// Sequencer for the download, extract, and convert stages of one
/// dataset.
///
/// Generic over [`ArchiveDownloader`] so orchestration can be exercised
/// without a network.
pub struct Pipeline<D: ArchiveDownloader> {
    downloader: D,
    extractor: GzipExtractor,
    records_per_chunk: usize,
}

impl Pipeline<SegmentedDownloader> {
    /// Create a pipeline from a configuration.
    pub fn new(config: &DumpConfig) -> Self {
        Self::with_downloader(
            SegmentedDownloader::with_settings(config.timeout(), config.segments),
            config.records_per_chunk,
        )
    }
}

impl<D: ArchiveDownloader> Pipeline<D> {
    /// Create a pipeline around a specific downloader.
    pub fn with_downloader(downloader: D, records_per_chunk: usize) -> Self {
        Self {
            downloader,
            extractor: GzipExtractor::new(),
            records_per_chunk: records_per_chunk.max(1),
        }
    }

    /// Download a dataset's archive.
    ///
    /// Skipped when the extracted XML (or the finished CSV behind it)
    /// already proves the download happened, or when the archive is
    /// already on disk at the probed size. `checksum` is an optional
    /// expected SHA-256 of the archive.
    pub fn download(
        &self,
        entry: &DatasetEntry,
        checksum: Option<&str>,
        cancel: &CancelToken,
        on_progress: Option<PipelineProgressCallback>,
    ) -> StageOutcome {
        self.run_download(entry, checksum, cancel, shared(on_progress).as_ref())
    }

    /// Extract a dataset's archive into its XML file.
    ///
    /// Skipped when the XML already exists; fails when the archive is
    /// missing.
    pub fn extract(
        &self,
        entry: &DatasetEntry,
        cancel: &CancelToken,
        on_progress: Option<PipelineProgressCallback>,
    ) -> StageOutcome {
        self.run_extract(entry, cancel, shared(on_progress).as_ref())
    }

    /// Convert a dataset's XML into its CSV.
    ///
    /// Skipped when the CSV already exists (no chunk folder is created);
    /// fails when the XML is missing. Chunk files are always removed
    /// before this returns. A conversion with failed chunks publishes
    /// `.csv.partial` instead of the CSV and reports a failure, so the
    /// processed flag can never claim an incomplete output.
    pub fn convert(
        &self,
        entry: &DatasetEntry,
        cancel: &CancelToken,
        on_progress: Option<PipelineProgressCallback>,
    ) -> StageOutcome {
        self.run_convert(entry, cancel, shared(on_progress).as_ref())
    }

    /// Run download, extract, and convert in order, stopping at the
    /// first outcome that is not a success.
    pub fn process(
        &self,
        entry: &DatasetEntry,
        cancel: &CancelToken,
        on_progress: Option<PipelineProgressCallback>,
    ) -> PipelineReport {
        let cb = shared(on_progress);
        let cb = cb.as_ref();

        let mut report = PipelineReport {
            download: None,
            extract: None,
            convert: None,
        };

        let download = self.run_download(entry, None, cancel, cb);
        let ok = download.is_success();
        report.download = Some(download);
        if !ok {
            return report;
        }

        let extract = self.run_extract(entry, cancel, cb);
        let ok = extract.is_success();
        report.extract = Some(extract);
        if !ok {
            return report;
        }

        let convert = self.run_convert(entry, cancel, cb);
        let ok = convert.is_success();
        report.convert = Some(convert);

        if ok {
            reportf(cb, PipelineStage::Complete, 1.0, "Pipeline complete");
            info!(dataset = %entry.id(), "Pipeline complete");
        }
        report
    }

    fn run_download(
        &self,
        entry: &DatasetEntry,
        checksum: Option<&str>,
        cancel: &CancelToken,
        cb: Option<&Arc<ProgressFn>>,
    ) -> StageOutcome {
        let archive = entry.archive_path();

        // A surviving later artifact proves the download happened.
        if !archive.is_file() && (entry.xml_path().is_file() || entry.csv_path().is_file()) {
            reportf(cb, PipelineStage::Download, 1.0, "Already extracted");
            return StageOutcome::Success;
        }

        let Some(url) = entry.url() else {
            if archive.is_file() {
                reportf(cb, PipelineStage::Download, 1.0, "Archive already on disk");
                return StageOutcome::Success;
            }
            return StageOutcome::failed(format!("no url registered for {}", entry.id()));
        };

        if let Err(e) = fs::create_dir_all(entry.dir()) {
            return StageOutcome::failed(format!(
                "failed to create {}: {}",
                entry.dir().display(),
                e
            ));
        }

        reportf(cb, PipelineStage::Download, 0.0, "Starting download");
        let result = match cb {
            Some(cb) => {
                let cb = Arc::clone(cb);
                self.downloader.download_with_progress(
                    url,
                    &archive,
                    checksum,
                    cancel,
                    Box::new(move |p| {
                        let fraction = if p.total_bytes > 0 {
                            p.bytes_downloaded as f64 / p.total_bytes as f64
                        } else {
                            0.0
                        };
                        let message = format!(
                            "{} / {} ({}/s)",
                            format_size(p.bytes_downloaded),
                            format_size(p.total_bytes),
                            format_size(p.bytes_per_sec as u64),
                        );
                        cb(PipelineStage::Download, fraction, &message);
                    }),
                )
            }
            None => self.downloader.download(url, &archive, checksum, cancel),
        };

        match result {
            Ok(bytes) => {
                reportf(
                    cb,
                    PipelineStage::Download,
                    1.0,
                    &format!("Downloaded {}", format_size(bytes)),
                );
                StageOutcome::Success
            }
            Err(e) => e.into(),
        }
    }

    fn run_extract(
        &self,
        entry: &DatasetEntry,
        cancel: &CancelToken,
        cb: Option<&Arc<ProgressFn>>,
    ) -> StageOutcome {
        if entry.xml_path().is_file() {
            reportf(cb, PipelineStage::Extract, 1.0, "Already extracted");
            return StageOutcome::Success;
        }

        let archive = entry.archive_path();
        if !archive.is_file() {
            return StageOutcome::failed(format!("missing archive {}", archive.display()));
        }

        reportf(cb, PipelineStage::Extract, 0.0, "Starting extraction");
        let result = match cb {
            Some(cb) => {
                let cb = Arc::clone(cb);
                self.extractor.extract_with_progress(
                    &archive,
                    cancel,
                    Box::new(move |consumed, total| {
                        let fraction = if total > 0 {
                            consumed as f64 / total as f64
                        } else {
                            0.0
                        };
                        cb(PipelineStage::Extract, fraction, "Decompressing");
                    }),
                )
            }
            None => self.extractor.extract(&archive, cancel),
        };

        match result {
            Ok(ExtractOutcome::Extracted { bytes_written }) => {
                reportf(
                    cb,
                    PipelineStage::Extract,
                    1.0,
                    &format!("Extracted {}", format_size(bytes_written)),
                );
                StageOutcome::Success
            }
            Ok(ExtractOutcome::AlreadyExtracted) => {
                reportf(cb, PipelineStage::Extract, 1.0, "Already extracted");
                StageOutcome::Success
            }
            Err(e) => e.into(),
        }
    }

    fn run_convert(
        &self,
        entry: &DatasetEntry,
        cancel: &CancelToken,
        cb: Option<&Arc<ProgressFn>>,
    ) -> StageOutcome {
        // Idempotence: a finished CSV means the whole conversion ran.
        if entry.csv_path().is_file() {
            reportf(cb, PipelineStage::WriteCsv, 1.0, "Already processed");
            return StageOutcome::Success;
        }

        let xml = entry.xml_path();
        if !xml.is_file() {
            return StageOutcome::failed(format!("no extracted file {}", xml.display()));
        }

        // Stage 1: chunk. The chunker removes its folder itself on
        // failure or cancellation.
        reportf(cb, PipelineStage::Chunk, 0.0, "Chunking source XML");
        let chunker = RecordChunker::new().with_records_per_chunk(self.records_per_chunk);
        let chunk_result = match cb {
            Some(cb) => {
                let cb = Arc::clone(cb);
                chunker.chunk_with_progress(
                    &xml,
                    entry.kind(),
                    cancel,
                    Box::new(move |consumed, total| {
                        let fraction = if total > 0 {
                            consumed as f64 / total as f64
                        } else {
                            0.0
                        };
                        cb(PipelineStage::Chunk, fraction, "Splitting records");
                    }),
                )
            }
            None => chunker.chunk(&xml, entry.kind(), cancel),
        };
        let chunk_report = match chunk_result {
            Ok(report) => report,
            Err(e) => return e.into(),
        };
        reportf(
            cb,
            PipelineStage::Chunk,
            1.0,
            &format!(
                "{} records in {} chunks",
                chunk_report.records, chunk_report.chunks_written
            ),
        );

        let chunk_dir = chunk_report.chunk_dir.clone();
        let outcome = self.discover_and_write(entry, &chunk_dir, cancel, cb);

        // Stage 4: chunk files never outlive the conversion attempt.
        reportf(cb, PipelineStage::Cleanup, 0.0, "Removing chunk files");
        fs::remove_dir_all(&chunk_dir).ok();
        reportf(cb, PipelineStage::Cleanup, 1.0, "Chunk files removed");

        outcome
    }

    /// Passes 1 and 2 over an existing chunk folder, publishing the
    /// output through the `.csv.tmp` file. The chunk folder itself is
    /// the caller's to remove.
    fn discover_and_write(
        &self,
        entry: &DatasetEntry,
        chunk_dir: &Path,
        cancel: &CancelToken,
        cb: Option<&Arc<ProgressFn>>,
    ) -> StageOutcome {
        let chunks = match list_chunk_files(chunk_dir) {
            Ok(chunks) => chunks,
            Err(e) => return e.into(),
        };

        // Pass 1: schema discovery.
        reportf(cb, PipelineStage::DiscoverSchema, 0.0, "Scanning chunks");
        let discovery = match discover_schema(
            entry.kind(),
            &chunks,
            cancel,
            cb.map(|cb| pass_progress(cb, PipelineStage::DiscoverSchema)),
        ) {
            Ok(discovery) => discovery,
            Err(e) => return e.into(),
        };
        reportf(
            cb,
            PipelineStage::DiscoverSchema,
            1.0,
            &format!("{} columns discovered", discovery.schema.len()),
        );

        // Pass 2: materialization, into the temp file.
        let tmp = entry.tmp_csv_path();
        reportf(cb, PipelineStage::WriteCsv, 0.0, "Writing rows");
        let materialized = materialize_csv(
            entry.kind(),
            &chunks,
            &discovery.schema,
            &tmp,
            cancel,
            cb.map(|cb| pass_progress(cb, PipelineStage::WriteCsv)),
        );
        let report = match materialized {
            Ok(report) => report,
            Err(e) => {
                fs::remove_file(&tmp).ok();
                return e.into();
            }
        };

        let mut failed = discovery.failed_chunks;
        for index in report.failed_chunks {
            if !failed.contains(&index) {
                failed.push(index);
            }
        }

        // Only a conversion with zero failed chunks publishes the CSV;
        // anything else must not look processed to a catalog scan.
        let (dest, complete) = if failed.is_empty() {
            (entry.csv_path(), true)
        } else {
            (entry.partial_csv_path(), false)
        };
        if let Err(e) = fs::rename(&tmp, &dest) {
            fs::remove_file(&tmp).ok();
            return StageOutcome::failed(format!("failed to write {}: {}", dest.display(), e));
        }

        if complete {
            reportf(
                cb,
                PipelineStage::WriteCsv,
                1.0,
                &format!("{} rows written", report.rows_written),
            );
            info!(
                dataset = %entry.id(),
                rows = report.rows_written,
                "Conversion complete"
            );
            StageOutcome::Success
        } else {
            warn!(
                dataset = %entry.id(),
                failed_chunks = failed.len(),
                "Conversion finished with failed chunks"
            );
            StageOutcome::failed(format!(
                "{} chunk(s) failed to parse; partial output at {}",
                failed.len(),
                dest.display()
            ))
        }
    }
}

/// Box-to-Arc conversion so one callback can be shared across stages
/// and handed to worker threads.
fn shared(on_progress: Option<PipelineProgressCallback>) -> Option<Arc<ProgressFn>> {
    on_progress.map(Arc::from)
}

fn reportf(cb: Option<&Arc<ProgressFn>>, stage: PipelineStage, progress: f64, message: &str) {
    if let Some(cb) = cb {
        cb(stage, progress, message);
    }
}

/// Adapt the pipeline callback to a (done, total) pass callback.
fn pass_progress(
    cb: &Arc<ProgressFn>,
    stage: PipelineStage,
) -> Box<dyn Fn(usize, usize) + Send + Sync> {
    let cb = Arc::clone(cb);
    Box::new(move |done, total| {
        let fraction = if total > 0 {
            done as f64 / total as f64
        } else {
            1.0
        };
        let message = format!("Chunk {} of {}", done, total);
        cb(stage, fraction, &message);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogRepository;
    use crate::fetch::FetchResult;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    const URL: &str = "https://dumps.example.com/discogs_20240101_releases.xml.gz";

    const THREE_RECORDS: &str = r#"<?xml version="1.0" encoding="UTF-8"?><releases><release id="1"><title>A</title></release><release id="2"><title>B</title><genre>Rock</genre></release><release id="3"><artist name="X"><title>C</title></artist></release></releases>"#;

    /// Downloader that writes a canned payload, counting invocations.
    struct CannedDownloader {
        payload: Vec<u8>,
        calls: AtomicUsize,
    }

    impl CannedDownloader {
        fn gzip(content: &str) -> Self {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(content.as_bytes()).unwrap();
            Self {
                payload: encoder.finish().unwrap(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ArchiveDownloader for CannedDownloader {
        fn download(
            &self,
            _url: &str,
            dest: &Path,
            _expected_sha256: Option<&str>,
            _cancel: &CancelToken,
        ) -> FetchResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            fs::write(dest, &self.payload).unwrap();
            Ok(self.payload.len() as u64)
        }

        fn download_with_progress(
            &self,
            url: &str,
            dest: &Path,
            expected_sha256: Option<&str>,
            cancel: &CancelToken,
            _on_progress: crate::fetch::FetchProgressCallback,
        ) -> FetchResult<u64> {
            self.download(url, dest, expected_sha256, cancel)
        }
    }

    /// Downloader that must never be reached.
    struct UnreachableDownloader;

    impl ArchiveDownloader for UnreachableDownloader {
        fn download(
            &self,
            url: &str,
            _dest: &Path,
            _expected_sha256: Option<&str>,
            _cancel: &CancelToken,
        ) -> FetchResult<u64> {
            panic!("download called for {}", url);
        }

        fn download_with_progress(
            &self,
            url: &str,
            dest: &Path,
            expected_sha256: Option<&str>,
            cancel: &CancelToken,
            _on_progress: crate::fetch::FetchProgressCallback,
        ) -> FetchResult<u64> {
            self.download(url, dest, expected_sha256, cancel)
        }
    }

    fn registered_entry(root: &Path) -> DatasetEntry {
        let mut catalog = CatalogRepository::new(root);
        let id = catalog.register_url(URL).unwrap();
        catalog.get(&id).unwrap().clone()
    }

    #[test]
    fn test_process_end_to_end() {
        let temp = TempDir::new().unwrap();
        let entry = registered_entry(temp.path());

        let downloader = CannedDownloader::gzip(THREE_RECORDS);
        let pipeline = Pipeline::with_downloader(downloader, 2);

        let report = pipeline.process(&entry, &CancelToken::new(), None);

        assert!(report.is_success(), "report: {:?}", report);
        assert!(entry.archive_path().is_file());
        assert!(entry.xml_path().is_file());
        assert!(entry.csv_path().is_file());
        assert!(!entry.chunk_dir().exists());
        assert!(!entry.tmp_csv_path().exists());

        let csv = fs::read_to_string(entry.csv_path()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "artist_name,artist_title,genre,release_id,title"
        );
        assert_eq!(lines.count(), 3);
    }

    #[test]
    fn test_process_again_is_a_no_op() {
        let temp = TempDir::new().unwrap();
        let entry = registered_entry(temp.path());

        let downloader = CannedDownloader::gzip(THREE_RECORDS);
        let pipeline = Pipeline::with_downloader(downloader, 2);

        assert!(pipeline.process(&entry, &CancelToken::new(), None).is_success());
        let first_csv = fs::read_to_string(entry.csv_path()).unwrap();

        // The second run must not touch the network or the CSV.
        let report = pipeline.process(&entry, &CancelToken::new(), None);
        assert!(report.is_success());
        assert_eq!(pipeline.downloader.calls(), 1);
        assert!(!entry.chunk_dir().exists());
        assert_eq!(fs::read_to_string(entry.csv_path()).unwrap(), first_csv);
    }

    #[test]
    fn test_download_skipped_when_xml_exists() {
        let temp = TempDir::new().unwrap();
        let entry = registered_entry(temp.path());
        fs::create_dir_all(entry.dir()).unwrap();
        fs::write(entry.xml_path(), THREE_RECORDS).unwrap();

        let pipeline = Pipeline::with_downloader(UnreachableDownloader, 2);
        let outcome = pipeline.download(&entry, None, &CancelToken::new(), None);
        assert!(outcome.is_success());
    }

    #[test]
    fn test_download_without_url_fails() {
        let temp = TempDir::new().unwrap();
        // An entry discovered by scan has no URL.
        let dir = temp.path().join("releases/2024-01");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("discogs_20240101_releases.csv"), b"id\n").unwrap();
        let mut catalog = CatalogRepository::new(temp.path());
        catalog.scan().unwrap();
        let entry = catalog.entries()[0].clone();
        // Remove the artifact so nothing proves a download.
        fs::remove_file(dir.join("discogs_20240101_releases.csv")).unwrap();

        let pipeline = Pipeline::with_downloader(UnreachableDownloader, 2);
        let outcome = pipeline.download(&entry, None, &CancelToken::new(), None);
        assert!(matches!(outcome, StageOutcome::Failed(ref r) if r.contains("no url")));
    }

    #[test]
    fn test_extract_missing_archive_fails() {
        let temp = TempDir::new().unwrap();
        let entry = registered_entry(temp.path());

        let pipeline = Pipeline::with_downloader(UnreachableDownloader, 2);
        let outcome = pipeline.extract(&entry, &CancelToken::new(), None);
        assert!(matches!(outcome, StageOutcome::Failed(ref r) if r.contains("missing archive")));
    }

    #[test]
    fn test_convert_missing_xml_fails() {
        let temp = TempDir::new().unwrap();
        let entry = registered_entry(temp.path());

        let pipeline = Pipeline::with_downloader(UnreachableDownloader, 2);
        let outcome = pipeline.convert(&entry, &CancelToken::new(), None);
        assert!(matches!(outcome, StageOutcome::Failed(ref r) if r.contains("no extracted file")));
    }

    #[test]
    fn test_convert_skips_when_csv_exists() {
        let temp = TempDir::new().unwrap();
        let entry = registered_entry(temp.path());
        fs::create_dir_all(entry.dir()).unwrap();
        fs::write(entry.xml_path(), THREE_RECORDS).unwrap();
        fs::write(entry.csv_path(), b"existing\n").unwrap();

        let pipeline = Pipeline::with_downloader(UnreachableDownloader, 2);
        let outcome = pipeline.convert(&entry, &CancelToken::new(), None);

        assert!(outcome.is_success());
        // No chunk folder was created and the CSV was not rewritten.
        assert!(!entry.chunk_dir().exists());
        assert_eq!(fs::read(entry.csv_path()).unwrap(), b"existing\n");
    }

    #[test]
    fn test_convert_canceled_leaves_no_artifacts() {
        let temp = TempDir::new().unwrap();
        let entry = registered_entry(temp.path());
        fs::create_dir_all(entry.dir()).unwrap();
        fs::write(entry.xml_path(), THREE_RECORDS).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();

        let pipeline = Pipeline::with_downloader(UnreachableDownloader, 2);
        let outcome = pipeline.convert(&entry, &cancel, None);

        assert!(outcome.is_canceled());
        assert!(!entry.chunk_dir().exists());
        assert!(!entry.csv_path().exists());
        assert!(!entry.tmp_csv_path().exists());
    }

    #[test]
    fn test_process_stops_after_failed_stage() {
        let temp = TempDir::new().unwrap();
        let entry = registered_entry(temp.path());
        fs::create_dir_all(entry.dir()).unwrap();
        // A corrupt archive downloads fine but fails extraction.
        fs::write(entry.archive_path(), b"not gzip at all").unwrap();

        let pipeline = Pipeline::with_downloader(UnreachableDownloader, 2);
        let report = pipeline.process(&entry, &CancelToken::new(), None);

        assert!(matches!(report.download, Some(StageOutcome::Success)));
        assert!(matches!(report.extract, Some(StageOutcome::Failed(_))));
        assert_eq!(report.convert, None);
        assert!(!report.is_success());
        assert!(matches!(report.final_outcome(), StageOutcome::Failed(_)));
    }

    #[test]
    fn test_process_reports_stage_progression() {
        let temp = TempDir::new().unwrap();
        let entry = registered_entry(temp.path());

        let downloader = CannedDownloader::gzip(THREE_RECORDS);
        let pipeline = Pipeline::with_downloader(downloader, 2);

        let stages: Arc<Mutex<Vec<PipelineStage>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);
        let report = pipeline.process(
            &entry,
            &CancelToken::new(),
            Some(Box::new(move |stage, _, _| {
                let mut stages = sink.lock().unwrap();
                if stages.last() != Some(&stage) {
                    stages.push(stage);
                }
            })),
        );

        assert!(report.is_success());
        assert_eq!(
            *stages.lock().unwrap(),
            vec![
                PipelineStage::Download,
                PipelineStage::Extract,
                PipelineStage::Chunk,
                PipelineStage::DiscoverSchema,
                PipelineStage::WriteCsv,
                PipelineStage::Cleanup,
                PipelineStage::Complete,
            ]
        );
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PipelineStage::Download.name(), "Downloading");
        assert_eq!(PipelineStage::Extract.name(), "Extracting");
        assert_eq!(PipelineStage::Chunk.name(), "Chunking");
        assert_eq!(PipelineStage::DiscoverSchema.name(), "Discovering schema");
        assert_eq!(PipelineStage::WriteCsv.name(), "Writing CSV");
        assert_eq!(PipelineStage::Cleanup.name(), "Cleaning up");
        assert_eq!(PipelineStage::Complete.name(), "Complete");
    }

    #[test]
    fn test_outcome_conversions() {
        assert!(StageOutcome::from(FetchError::Canceled).is_canceled());
        assert!(StageOutcome::from(ExtractError::Canceled).is_canceled());
        assert!(StageOutcome::from(ConvertError::Canceled).is_canceled());
        assert!(matches!(
            StageOutcome::from(FetchError::ProbeFailed {
                url: "http://x".into(),
                reason: "404".into()
            }),
            StageOutcome::Failed(_)
        ));
    }
}
