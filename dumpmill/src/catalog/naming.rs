//! Centralized dump artifact naming conventions.
//!
//! This module is the single source of truth for every filename the tool
//! reads or writes:
//! - Dump archives (e.g., `discogs_20240101_releases.xml.gz`)
//! - Extracted XML files (e.g., `discogs_20240101_releases.xml`)
//! - CSV output (e.g., `discogs_20240101_releases.csv`)
//! - Chunk folders (`chunked_releases`) and chunk files (`chunk_0.xml`)
//!
//! All other modules use these functions rather than constructing names
//! directly. This keeps the downloader, extractor, converter, and catalog
//! in agreement about where each artifact lives.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use super::content::ContentKind;

/// Suffix of a compressed dump archive.
pub const ARCHIVE_SUFFIX: &str = ".xml.gz";

/// Parsed components of a dump archive filename.
///
/// Archive names follow `{prefix}_{YYYYMMDD}_{plural}.xml.gz`, where the
/// prefix identifies the publisher, the date token is the dump date, and
/// the plural token names the content kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    /// Publisher prefix (e.g., "discogs").
    pub prefix: String,
    /// Dump date parsed from the 8-digit token.
    pub date: NaiveDate,
    /// Content kind parsed from the plural token.
    pub kind: ContentKind,
}

impl ArchiveName {
    /// The stable dataset id: the archive filename without its suffix.
    ///
    /// # Example
    ///
    /// ```
    /// use dumpmill::catalog::parse_archive_name;
    ///
    /// let name = parse_archive_name("discogs_20240101_releases.xml.gz").unwrap();
    /// assert_eq!(name.dataset_id(), "discogs_20240101_releases");
    /// ```
    pub fn dataset_id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.prefix,
            self.date.format("%Y%m%d"),
            self.kind.plural()
        )
    }
}

/// Error parsing a dump archive filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// Filename doesn't match the `{prefix}_{YYYYMMDD}_{plural}.xml.gz` pattern.
    InvalidPattern(String),
    /// The 8-digit token is not a calendar date.
    InvalidDate(String),
    /// The plural token names no known content kind.
    UnknownKind(String),
}

impl std::fmt::Display for NameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameError::InvalidPattern(name) => {
                write!(f, "filename {} doesn't match the dump archive pattern", name)
            }
            NameError::InvalidDate(token) => write!(f, "invalid dump date: {}", token),
            NameError::UnknownKind(token) => write!(f, "unknown content kind: {}", token),
        }
    }
}

impl std::error::Error for NameError {}

/// Get the dump archive filename pattern.
///
/// Pattern: `{prefix}_{YYYYMMDD}_{plural}.xml.gz`
/// Example: `discogs_20240101_releases.xml.gz`
fn archive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // ([A-Za-z0-9-]+) - publisher prefix
        // (\d{8})         - dump date, YYYYMMDD
        // ([a-z]+)        - plural content kind token
        Regex::new(r"^([A-Za-z0-9-]+)_(\d{8})_([a-z]+)\.xml\.gz$").unwrap()
    })
}

/// Parse a dump archive filename into its components.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use dumpmill::catalog::{parse_archive_name, ContentKind};
///
/// let name = parse_archive_name("discogs_20240101_releases.xml.gz").unwrap();
/// assert_eq!(name.prefix, "discogs");
/// assert_eq!(name.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
/// assert_eq!(name.kind, ContentKind::Releases);
/// ```
pub fn parse_archive_name(filename: &str) -> Result<ArchiveName, NameError> {
    let captures = archive_pattern()
        .captures(filename)
        .ok_or_else(|| NameError::InvalidPattern(filename.to_string()))?;

    let prefix = captures.get(1).unwrap().as_str().to_string();

    let date_token = captures.get(2).unwrap().as_str();
    let date = NaiveDate::parse_from_str(date_token, "%Y%m%d")
        .map_err(|_| NameError::InvalidDate(date_token.to_string()))?;

    let kind_token = captures.get(3).unwrap().as_str();
    let kind = ContentKind::from_plural(kind_token)
        .ok_or_else(|| NameError::UnknownKind(kind_token.to_string()))?;

    Ok(ArchiveName { prefix, date, kind })
}

/// Archive filename for a dataset id.
///
/// # Example
///
/// ```
/// use dumpmill::catalog::archive_filename;
///
/// assert_eq!(
///     archive_filename("discogs_20240101_releases"),
///     "discogs_20240101_releases.xml.gz"
/// );
/// ```
pub fn archive_filename(dataset_id: &str) -> String {
    format!("{}{}", dataset_id, ARCHIVE_SUFFIX)
}

/// Extracted XML filename for a dataset id.
///
/// # Example
///
/// ```
/// use dumpmill::catalog::xml_filename;
///
/// assert_eq!(
///     xml_filename("discogs_20240101_releases"),
///     "discogs_20240101_releases.xml"
/// );
/// ```
pub fn xml_filename(dataset_id: &str) -> String {
    format!("{}.xml", dataset_id)
}

/// CSV output filename for a dataset id.
///
/// Only fully converted datasets carry this name; partial output is
/// published under [`partial_csv_filename`] instead.
pub fn csv_filename(dataset_id: &str) -> String {
    format!("{}.csv", dataset_id)
}

/// CSV filename for a conversion that completed with chunk failures.
pub fn partial_csv_filename(dataset_id: &str) -> String {
    format!("{}.csv.partial", dataset_id)
}

/// In-progress extraction filename, renamed to the XML name on success.
pub fn tmp_xml_filename(dataset_id: &str) -> String {
    format!("{}.xml.tmp", dataset_id)
}

/// In-progress conversion filename, renamed on completion.
pub fn tmp_csv_filename(dataset_id: &str) -> String {
    format!("{}.csv.tmp", dataset_id)
}

/// Chunk folder name for a content kind.
///
/// The folder sits beside the extracted XML file.
///
/// # Example
///
/// ```
/// use dumpmill::catalog::{chunk_dir_name, ContentKind};
///
/// assert_eq!(chunk_dir_name(ContentKind::Releases), "chunked_releases");
/// assert_eq!(chunk_dir_name(ContentKind::Artists), "chunked_artists");
/// ```
pub fn chunk_dir_name(kind: ContentKind) -> String {
    format!("chunked_{}", kind.plural())
}

/// Chunk filename for a zero-based chunk index.
///
/// # Example
///
/// ```
/// use dumpmill::catalog::chunk_filename;
///
/// assert_eq!(chunk_filename(0), "chunk_0.xml");
/// assert_eq!(chunk_filename(12), "chunk_12.xml");
/// ```
pub fn chunk_filename(index: usize) -> String {
    format!("chunk_{}.xml", index)
}

/// Parse the chunk index back out of a chunk filename.
///
/// Used to process chunks in their production order regardless of the
/// lexicographic order a directory listing returns.
pub fn parse_chunk_index(filename: &str) -> Option<usize> {
    filename
        .strip_prefix("chunk_")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

/// Monthly storage bucket for a dump date.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use dumpmill::catalog::period_bucket;
///
/// let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
/// assert_eq!(period_bucket(date), "2024-01");
/// ```
pub fn period_bucket(date: NaiveDate) -> String {
    date.format("%Y-%m").to_string()
}
