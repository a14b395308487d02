//! Blocking HTTP client for probes and streaming downloads.
//!
//! This module provides the single-connection building blocks the
//! download strategies compose:
//! - HEAD probes for size and range support
//! - Full-stream downloads with resume via open-ended `Range` requests
//! - Bounded-range segment downloads into part files
//!
//! Every stream loop checks the cancellation token between 64KiB blocks,
//! so a cancel takes effect within one block regardless of file size.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::Duration;

use reqwest::blocking::Client;

use super::error::{FetchError, FetchResult};
use super::plan::Segment;
use crate::cancel::CancelToken;

/// Default timeout for HTTP requests in seconds.
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 300; // 5 minutes

/// Block size for reading/writing during downloads (64KiB).
pub(crate) const BLOCK_SIZE: usize = 64 * 1024;

/// Byte-level progress callback for one download stream.
///
/// Receives the cumulative byte count for the stream, including bytes
/// already present when a download resumed.
pub type ByteProgressCallback = Box<dyn Fn(u64) + Send + Sync>;

/// What a HEAD probe learned about the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceInfo {
    /// Content length in bytes; 0 when the server didn't report one.
    pub total_size: u64,
    /// Whether the server advertises byte-range requests.
    pub supports_ranges: bool,
}

/// Blocking HTTP fetcher used by the download strategies.
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
    pub(crate) timeout: Duration,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a fetcher with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, timeout }
    }

    /// Probe the resource via HEAD request.
    pub fn probe(&self, url: &str) -> FetchResult<ResourceInfo> {
        let response = self
            .client
            .head(url)
            .send()
            .map_err(|e| FetchError::ProbeFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(FetchError::ProbeFailed {
                url: url.to_string(),
                reason: format!("HEAD request failed with status {}", response.status()),
            });
        }

        let total_size = response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let supports_ranges = response
            .headers()
            .get("accept-ranges")
            .map(|v| v.to_str().unwrap_or("") == "bytes")
            .unwrap_or(false);

        Ok(ResourceInfo {
            total_size,
            supports_ranges,
        })
    }

    /// Download the whole resource into `dest` on a single connection.
    ///
    /// When `resume_from` is nonzero the request carries an open-ended
    /// `Range` header and the destination is opened in append mode.
    pub fn fetch_stream(
        &self,
        url: &str,
        dest: &Path,
        resume_from: u64,
        cancel: &CancelToken,
        on_bytes: Option<ByteProgressCallback>,
    ) -> FetchResult<u64> {
        if cancel.is_canceled() {
            return Err(FetchError::Canceled);
        }

        let file = open_destination(dest, resume_from > 0)?;

        let mut request = self.client.get(url);
        if resume_from > 0 {
            request = request.header("Range", format!("bytes={}-", resume_from));
        }

        let response = self.send_get(request, url)?;
        self.stream_body(response, file, dest, url, resume_from, cancel, on_bytes)
    }

    /// Download one segment of the resource into its part file.
    ///
    /// The request carries an inclusive `Range: bytes=start-end` header.
    /// A part file holding the complete segment short-circuits without a
    /// request; a shorter one resumes from where it stopped.
    pub fn fetch_segment(
        &self,
        url: &str,
        segment: Segment,
        part: &Path,
        cancel: &CancelToken,
        on_bytes: Option<ByteProgressCallback>,
    ) -> FetchResult<u64> {
        if cancel.is_canceled() {
            return Err(FetchError::Canceled);
        }

        let expected = segment.byte_count();
        let existing = if part.exists() {
            part.metadata().map(|m| m.len()).unwrap_or(0)
        } else {
            0
        };

        if existing >= expected {
            if let Some(ref cb) = on_bytes {
                cb(expected);
            }
            return Ok(expected);
        }

        let file = open_destination(part, existing > 0)?;

        let request = self.client.get(url).header(
            "Range",
            format!("bytes={}-{}", segment.start + existing, segment.end),
        );

        let response = self.send_get(request, url)?;
        self.stream_body(response, file, part, url, existing, cancel, on_bytes)
    }

    /// Send a GET request, mapping transport errors and bad statuses.
    fn send_get(
        &self,
        request: reqwest::blocking::RequestBuilder,
        url: &str,
    ) -> FetchResult<reqwest::blocking::Response> {
        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                FetchError::DownloadFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        // 200 OK or 206 Partial Content
        let status = response.status();
        if !status.is_success() && status.as_u16() != 206 {
            return Err(FetchError::DownloadFailed {
                url: url.to_string(),
                reason: format!("GET request failed with status {}", status),
            });
        }

        Ok(response)
    }

    /// Stream a response body to a file in 64KiB blocks.
    #[allow(clippy::too_many_arguments)]
    fn stream_body(
        &self,
        mut response: reqwest::blocking::Response,
        file: File,
        dest: &Path,
        url: &str,
        already: u64,
        cancel: &CancelToken,
        on_bytes: Option<ByteProgressCallback>,
    ) -> FetchResult<u64> {
        let mut writer = BufWriter::new(file);
        let mut buffer = vec![0u8; BLOCK_SIZE];
        let mut downloaded = already;

        loop {
            if cancel.is_canceled() {
                return Err(FetchError::Canceled);
            }

            let bytes_read = response
                .read(&mut buffer)
                .map_err(|e| FetchError::DownloadFailed {
                    url: url.to_string(),
                    reason: format!("Read error: {}", e),
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

            downloaded += bytes_read as u64;

            if let Some(ref cb) = on_bytes {
                cb(downloaded);
            }
        }

        writer.flush().map_err(|e| FetchError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })?;

        Ok(downloaded)
    }
}

/// Open a download destination, creating parent directories on a fresh
/// start and appending on resume.
fn open_destination(dest: &Path, append: bool) -> FetchResult<File> {
    if append {
        OpenOptions::new()
            .append(true)
            .open(dest)
            .map_err(|e| FetchError::WriteFailed {
                path: dest.to_path_buf(),
                source: e,
            })
    } else {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| FetchError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        File::create(dest).map_err(|e| FetchError::WriteFailed {
            path: dest.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fetcher_default_timeout() {
        let fetcher = HttpFetcher::default();
        assert_eq!(fetcher.timeout.as_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_fetcher_with_timeout() {
        let fetcher = HttpFetcher::with_timeout(Duration::from_secs(60));
        assert_eq!(fetcher.timeout.as_secs(), 60);
    }

    #[test]
    fn test_fetch_segment_canceled_before_start() {
        let temp = TempDir::new().unwrap();
        let fetcher = HttpFetcher::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let segment = Segment {
            index: 0,
            start: 0,
            end: 99,
        };
        let result = fetcher.fetch_segment(
            "http://localhost/never-contacted",
            segment,
            &temp.path().join("dump.part0"),
            &cancel,
            None,
        );

        assert!(matches!(result, Err(FetchError::Canceled)));
    }

    #[test]
    fn test_fetch_stream_canceled_before_start() {
        let temp = TempDir::new().unwrap();
        let fetcher = HttpFetcher::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let result = fetcher.fetch_stream(
            "http://localhost/never-contacted",
            &temp.path().join("dump.xml.gz"),
            0,
            &cancel,
            None,
        );

        assert!(matches!(result, Err(FetchError::Canceled)));
    }

    #[test]
    fn test_fetch_segment_complete_part_short_circuits() {
        let temp = TempDir::new().unwrap();
        let part = temp.path().join("dump.part0");
        fs::write(&part, vec![0u8; 100]).unwrap();

        let fetcher = HttpFetcher::new();
        let cancel = CancelToken::new();
        let segment = Segment {
            index: 0,
            start: 0,
            end: 99,
        };

        // No request is made: the URL would fail if contacted.
        let bytes = fetcher
            .fetch_segment(
                "http://localhost/never-contacted",
                segment,
                &part,
                &cancel,
                None,
            )
            .unwrap();

        assert_eq!(bytes, 100);
    }

    #[test]
    fn test_open_destination_creates_parents() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("releases/2024-01/dump.xml.gz");

        let file = open_destination(&nested, false).unwrap();
        drop(file);

        assert!(nested.exists());
    }
}
