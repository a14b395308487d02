//! Streaming gzip extraction.
//!
//! Decompresses a downloaded `.gz` archive next to itself with the
//! suffix stripped (`discogs_20240101_releases.xml.gz` becomes
//! `discogs_20240101_releases.xml`). The stream is processed in fixed
//! 64 KiB blocks so memory stays bounded regardless of archive size,
//! and progress is reported as compressed bytes consumed, since the
//! decompressed size is unknown until the end of the stream.
//!
//! Output goes through a `.tmp` file renamed into place on success, so
//! a crash or cancellation never leaves a plausible-looking partial
//! `.xml` behind. The source archive is always kept; deleting it is the
//! caller's decision.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use thiserror::Error;
use tracing::{debug, info};

use crate::cancel::CancelToken;

/// I/O block size for decompression reads and writes.
const BLOCK_SIZE: usize = 64 * 1024;

/// Errors from gzip extraction.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Reading or decompressing the source archive failed.
    #[error("failed to read {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Writing or publishing the decompressed output failed.
    #[error("failed to write {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },

    /// The operation observed a cancellation request and stopped.
    #[error("extraction canceled")]
    Canceled,
}

impl ExtractError {
    /// Whether this error represents cancellation rather than failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, ExtractError::Canceled)
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// What an extraction call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// The archive was decompressed; `bytes_written` is the output size.
    Extracted { bytes_written: u64 },
    /// Nothing to do: the input carries no `.gz` suffix or the output
    /// already exists.
    AlreadyExtracted,
}

/// Progress callback: (compressed bytes consumed, compressed total).
pub type ExtractProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Streaming gzip decompressor.
#[derive(Debug, Default)]
pub struct GzipExtractor;

impl GzipExtractor {
    /// Create a new extractor.
    pub fn new() -> Self {
        Self
    }

    /// Decompress `archive` next to itself with the `.gz` suffix stripped.
    ///
    /// Inputs without a `.gz` suffix, and archives whose decompressed
    /// output already exists, return [`ExtractOutcome::AlreadyExtracted`]
    /// without touching the filesystem. On cancellation the partial
    /// output is removed, the archive is kept, and
    /// [`ExtractError::Canceled`] is returned.
    pub fn extract(&self, archive: &Path, cancel: &CancelToken) -> ExtractResult<ExtractOutcome> {
        self.run(archive, cancel, None)
    }

    /// Like [`extract`](Self::extract), reporting compressed-bytes
    /// progress after every output block.
    pub fn extract_with_progress(
        &self,
        archive: &Path,
        cancel: &CancelToken,
        on_progress: ExtractProgressCallback,
    ) -> ExtractResult<ExtractOutcome> {
        self.run(archive, cancel, Some(on_progress))
    }

    fn run(
        &self,
        archive: &Path,
        cancel: &CancelToken,
        on_progress: Option<ExtractProgressCallback>,
    ) -> ExtractResult<ExtractOutcome> {
        let output = match decompressed_path(archive) {
            Some(path) => path,
            None => {
                debug!("Not a gzip archive, skipping: {}", archive.display());
                return Ok(ExtractOutcome::AlreadyExtracted);
            }
        };

        if output.is_file() {
            debug!("Already extracted: {}", output.display());
            return Ok(ExtractOutcome::AlreadyExtracted);
        }

        if cancel.is_canceled() {
            return Err(ExtractError::Canceled);
        }

        let tmp = tmp_output_path(&output);

        match stream_decompress(archive, &tmp, cancel, on_progress) {
            Ok(bytes_written) => {
                fs::rename(&tmp, &output).map_err(|e| ExtractError::WriteFailed {
                    path: output.clone(),
                    source: e,
                })?;

                info!(
                    archive = %archive.display(),
                    bytes = bytes_written,
                    "Extraction complete"
                );
                Ok(ExtractOutcome::Extracted { bytes_written })
            }
            Err(e) => {
                fs::remove_file(&tmp).ok();
                Err(e)
            }
        }
    }
}

/// Decompress `archive` into `tmp`, returning the decompressed size.
///
/// The cancellation token is checked once per output block; partial
/// output cleanup is the caller's job.
fn stream_decompress(
    archive: &Path,
    tmp: &Path,
    cancel: &CancelToken,
    on_progress: Option<ExtractProgressCallback>,
) -> ExtractResult<u64> {
    let read_err = |e: io::Error| ExtractError::ReadFailed {
        path: archive.to_path_buf(),
        source: e,
    };
    let write_err = |e: io::Error| ExtractError::WriteFailed {
        path: tmp.to_path_buf(),
        source: e,
    };

    let compressed_total = fs::metadata(archive).map_err(read_err)?.len();
    let file = File::open(archive).map_err(read_err)?;
    let mut decoder = GzDecoder::new(CountingReader::new(file));
    let mut writer = BufWriter::new(File::create(tmp).map_err(write_err)?);

    let report = |consumed: u64| {
        if let Some(ref cb) = on_progress {
            cb(consumed, compressed_total);
        }
    };

    let mut buffer = vec![0u8; BLOCK_SIZE];
    let mut bytes_written = 0u64;

    loop {
        if cancel.is_canceled() {
            return Err(ExtractError::Canceled);
        }

        let n = decoder.read(&mut buffer).map_err(read_err)?;
        if n == 0 {
            break;
        }

        writer.write_all(&buffer[..n]).map_err(write_err)?;
        bytes_written += n as u64;
        report(decoder.get_ref().bytes_read());
    }

    writer.flush().map_err(write_err)?;
    report(decoder.get_ref().bytes_read());

    Ok(bytes_written)
}

/// Output path for an archive: the input with its final `.gz` suffix
/// removed, or `None` when the input does not carry one.
fn decompressed_path(archive: &Path) -> Option<PathBuf> {
    match archive.extension().and_then(|e| e.to_str()) {
        Some("gz") => Some(archive.with_extension("")),
        _ => None,
    }
}

fn tmp_output_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Reader wrapper counting bytes pulled from the underlying source.
///
/// Wrapped around the compressed file inside the decoder, it measures
/// progress in compressed bytes, which is the only total known up front.
struct CountingReader<R> {
    inner: R,
    bytes_read: u64,
}

impl<R> CountingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
        }
    }

    fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use rand::Rng;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn write_gzip(path: &Path, content: &[u8]) {
        let file = File::create(path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(content).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_extract_round_trip() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("dump.xml.gz");
        let output = temp.path().join("dump.xml");

        // Several output blocks worth of incompressible data
        let mut payload = vec![0u8; 200_000];
        rand::rng().fill(&mut payload[..]);
        write_gzip(&archive, &payload);

        let extractor = GzipExtractor::new();
        let outcome = extractor.extract(&archive, &CancelToken::new()).unwrap();

        assert_eq!(
            outcome,
            ExtractOutcome::Extracted {
                bytes_written: payload.len() as u64
            }
        );
        assert_eq!(fs::read(&output).unwrap(), payload);
        // Source archive is kept
        assert!(archive.exists());
        // Temp file has been renamed away
        assert!(!temp.path().join("dump.xml.tmp").exists());
    }

    #[test]
    fn test_extract_non_gz_input_skips() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dump.xml");
        fs::write(&path, b"<root/>").unwrap();

        let extractor = GzipExtractor::new();
        let outcome = extractor.extract(&path, &CancelToken::new()).unwrap();

        assert_eq!(outcome, ExtractOutcome::AlreadyExtracted);
    }

    #[test]
    fn test_extract_existing_output_skips() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("dump.xml.gz");
        let output = temp.path().join("dump.xml");

        write_gzip(&archive, b"<root><release/></root>");
        fs::write(&output, b"previous contents").unwrap();

        let extractor = GzipExtractor::new();
        let outcome = extractor.extract(&archive, &CancelToken::new()).unwrap();

        assert_eq!(outcome, ExtractOutcome::AlreadyExtracted);
        // The existing output is untouched
        assert_eq!(fs::read(&output).unwrap(), b"previous contents");
    }

    #[test]
    fn test_extract_canceled_before_start() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("dump.xml.gz");
        write_gzip(&archive, b"<root/>");

        let cancel = CancelToken::new();
        cancel.cancel();

        let extractor = GzipExtractor::new();
        let err = extractor.extract(&archive, &cancel).unwrap_err();

        assert!(err.is_canceled());
        assert!(archive.exists());
        assert!(!temp.path().join("dump.xml").exists());
        assert!(!temp.path().join("dump.xml.tmp").exists());
    }

    #[test]
    fn test_extract_reports_compressed_progress() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("dump.xml.gz");

        let mut payload = vec![0u8; 150_000];
        rand::rng().fill(&mut payload[..]);
        write_gzip(&archive, &payload);
        let compressed_total = fs::metadata(&archive).unwrap().len();

        let reports: Arc<Mutex<Vec<(u64, u64)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);

        let extractor = GzipExtractor::new();
        extractor
            .extract_with_progress(
                &archive,
                &CancelToken::new(),
                Box::new(move |consumed, total| {
                    sink.lock().unwrap().push((consumed, total));
                }),
            )
            .unwrap();

        let reports = reports.lock().unwrap();
        assert!(!reports.is_empty());
        for pair in reports.windows(2) {
            assert!(pair[1].0 >= pair[0].0);
        }
        let last = reports.last().unwrap();
        assert_eq!(last.0, compressed_total);
        assert_eq!(last.1, compressed_total);
    }

    #[test]
    fn test_extract_corrupt_archive_fails_and_cleans_up() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("dump.xml.gz");
        fs::write(&archive, b"this is not gzip data").unwrap();

        let extractor = GzipExtractor::new();
        let err = extractor.extract(&archive, &CancelToken::new()).unwrap_err();

        assert!(!err.is_canceled());
        assert!(matches!(err, ExtractError::ReadFailed { .. }));
        assert!(!temp.path().join("dump.xml").exists());
        assert!(!temp.path().join("dump.xml.tmp").exists());
    }

    #[test]
    fn test_decompressed_path() {
        assert_eq!(
            decompressed_path(Path::new("/data/dump.xml.gz")),
            Some(PathBuf::from("/data/dump.xml"))
        );
        assert_eq!(decompressed_path(Path::new("/data/dump.xml")), None);
        assert_eq!(decompressed_path(Path::new("/data/dump")), None);
    }
}
