//! XML dump conversion: chunking, schema discovery, CSV output.
//!
//! A monthly dump is too large to load and its schema is not known up
//! front, so conversion works in bounded-memory passes over the data:
//!
//! ```text
//! discogs_20240101_releases.xml
//!     |   RecordChunker      split into at most N records per file
//!     v
//! chunked_releases/chunk_0.xml .. chunk_k.xml
//!     |   discover_schema    union of every column seen, sorted, frozen
//!     v
//! Schema
//!     |   materialize_csv    one row per record in frozen column order
//!     v
//! discogs_20240101_releases.csv
//! ```
//!
//! Discovery and materialization drive the same streaming record
//! walker, so both passes flatten a record into columns identically. A
//! chunk that fails to parse is skipped and recorded by both passes;
//! the surviving rows still ship, and the caller publishes the output
//! as partial instead of complete.
//!
//! Chunks are always processed in production order, the index encoded
//! in the filename, not the order a directory listing happens to
//! return.

mod chunker;
mod fields;
mod schema;
mod writer;

pub use chunker::{ChunkProgressCallback, ChunkReport, RecordChunker, DEFAULT_RECORDS_PER_CHUNK};
pub use schema::{discover_schema, Discovery, Schema, SchemaBuilder};
pub use writer::{materialize_csv, MaterializeReport};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use crate::catalog::parse_chunk_index;

/// Errors from chunking, schema discovery, or CSV materialization.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Reading a source or chunk file failed below the XML layer.
    #[error("failed to read {path}: {source}")]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Creating or writing an output file or folder failed.
    #[error("failed to write {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Emitting XML events into a chunk file failed.
    #[error("failed to write chunk {path}: {reason}")]
    ChunkWriteFailed { path: PathBuf, reason: String },

    /// The XML in a source or chunk file is malformed.
    #[error("failed to parse {path}: {reason}")]
    ParseFailed { path: PathBuf, reason: String },

    /// Writing a row or header to the CSV output failed.
    #[error("failed to write csv {path}: {source}")]
    CsvFailed { path: PathBuf, source: csv::Error },

    /// The file to convert does not exist.
    #[error("missing source file {path}")]
    MissingSource { path: PathBuf },

    /// The operation observed a cancellation request and stopped.
    #[error("conversion canceled")]
    Canceled,
}

impl ConvertError {
    /// Whether this error represents cancellation rather than failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, ConvertError::Canceled)
    }
}

/// Result type for conversion operations.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Progress callback for the discovery and materialization passes:
/// (chunks processed, chunks total).
pub type PassProgressCallback = Box<dyn Fn(usize, usize) + Send + Sync>;

/// One chunk file, identified by the index parsed from its filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFile {
    /// Zero-based index assigned at chunking time.
    pub index: usize,
    /// Path to the chunk file.
    pub path: PathBuf,
}

/// List the chunk files in a chunk folder in production order.
///
/// Files that do not match the `chunk_<i>.xml` pattern are logged and
/// ignored rather than treated as chunks.
pub fn list_chunk_files(chunk_dir: &Path) -> ConvertResult<Vec<ChunkFile>> {
    let read_err = |e: io::Error| ConvertError::ReadFailed {
        path: chunk_dir.to_path_buf(),
        source: e,
    };

    let mut chunks = Vec::new();
    for entry in fs::read_dir(chunk_dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();
        match parse_chunk_index(&name) {
            Some(index) => chunks.push(ChunkFile {
                index,
                path: entry.path(),
            }),
            None => warn!("Skipping unrecognized file in chunk folder: {}", name),
        }
    }

    chunks.sort_by_key(|c| c.index);
    Ok(chunks)
}

/// Wrap any displayable XML parser error as [`ConvertError::ParseFailed`].
pub(crate) fn parse_failed(path: &Path, err: impl std::fmt::Display) -> ConvertError {
    ConvertError::ParseFailed {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

pub(crate) fn csv_failed(path: &Path, source: csv::Error) -> ConvertError {
    ConvertError::CsvFailed {
        path: path.to_path_buf(),
        source,
    }
}
