//! Error types for the download engine.

use std::io;
use std::path::PathBuf;

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors that can occur while probing, downloading, or assembling.
#[derive(Debug)]
pub enum FetchError {
    /// HEAD probe failed or returned a non-success status.
    ProbeFailed { url: String, reason: String },

    /// GET request failed or returned a non-success status.
    DownloadFailed { url: String, reason: String },

    /// Failed to read a local file.
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a local file.
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Network request exceeded the configured timeout.
    Timeout { url: String, timeout_secs: u64 },

    /// A download segment failed, which fails the whole download.
    SegmentFailed { index: usize, reason: String },

    /// A part file expected during assembly is missing.
    MissingPart { path: PathBuf },

    /// Assembled file size doesn't match the probed size.
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Downloaded file doesn't match the expected checksum.
    ChecksumMismatch {
        filename: String,
        expected: String,
        actual: String,
    },

    /// The download was canceled before it completed.
    Canceled,
}

impl FetchError {
    /// Whether this error marks a cancellation rather than a failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProbeFailed { url, reason } => {
                write!(f, "failed to probe {}: {}", url, reason)
            }
            Self::DownloadFailed { url, reason } => {
                write!(f, "failed to download {}: {}", url, reason)
            }
            Self::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::CreateDirFailed { path, source } => {
                write!(
                    f,
                    "failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::Timeout { url, timeout_secs } => {
                write!(f, "request to {} timed out after {}s", url, timeout_secs)
            }
            Self::SegmentFailed { index, reason } => {
                write!(f, "segment {} failed: {}", index, reason)
            }
            Self::MissingPart { path } => {
                write!(f, "missing download part: {}", path.display())
            }
            Self::SizeMismatch {
                path,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "size mismatch for {}: expected {} bytes, got {}",
                    path.display(),
                    expected,
                    actual
                )
            }
            Self::ChecksumMismatch {
                filename,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "checksum mismatch for {}: expected {}, got {}",
                    filename, expected, actual
                )
            }
            Self::Canceled => write!(f, "download canceled"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFailed { source, .. } => Some(source),
            Self::WriteFailed { source, .. } => Some(source),
            Self::CreateDirFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_failed_display() {
        let err = FetchError::SegmentFailed {
            index: 2,
            reason: "connection reset".to_string(),
        };
        assert_eq!(err.to_string(), "segment 2 failed: connection reset");
    }

    #[test]
    fn test_size_mismatch_display() {
        let err = FetchError::SizeMismatch {
            path: PathBuf::from("/tmp/dump.xml.gz"),
            expected: 100,
            actual: 90,
        };
        assert!(err.to_string().contains("expected 100 bytes"));
        assert!(err.to_string().contains("got 90"));
    }

    #[test]
    fn test_is_canceled() {
        assert!(FetchError::Canceled.is_canceled());
        assert!(!FetchError::MissingPart {
            path: PathBuf::from("/tmp/x.part0")
        }
        .is_canceled());
    }
}
