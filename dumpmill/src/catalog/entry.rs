//! Dataset identity and lifecycle state.
//!
//! A dataset is one dump archive and everything derived from it. Its
//! lifecycle flags are never stored; they are re-derived from which
//! artifact files currently exist, so external deletion or a crashed run
//! can never leave the catalog believing in state the disk doesn't have.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;

use super::content::ContentKind;
use super::naming::{self, ArchiveName};

/// Stable dataset identifier: the archive filename without its suffix.
///
/// # Example
///
/// ```
/// use dumpmill::catalog::DatasetId;
///
/// let id = DatasetId::from("discogs_20240101_releases");
/// assert_eq!(id.as_str(), "discogs_20240101_releases");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DatasetId(String);

impl DatasetId {
    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DatasetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DatasetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Lifecycle flags derived from which artifacts exist on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DatasetStatus {
    /// The compressed archive was fetched (or a later stage proves it was).
    pub downloaded: bool,
    /// The XML file was extracted (or a later stage proves it was).
    pub extracted: bool,
    /// A complete CSV conversion exists.
    pub processed: bool,
}

impl DatasetStatus {
    /// Derive flags from artifact existence.
    ///
    /// A later artifact implies the earlier stages ran even if their
    /// outputs were deleted by hand, so the flags are normalized:
    /// an extracted file counts as downloaded, a finished CSV counts
    /// as both.
    ///
    /// # Example
    ///
    /// ```
    /// use dumpmill::catalog::DatasetStatus;
    ///
    /// // Archive deleted after extraction: still counts as downloaded.
    /// let status = DatasetStatus::from_artifacts(false, true, false);
    /// assert!(status.downloaded);
    /// assert!(status.extracted);
    /// assert!(!status.processed);
    /// ```
    pub fn from_artifacts(archive: bool, xml: bool, csv: bool) -> Self {
        Self {
            downloaded: archive || xml || csv,
            extracted: xml || csv,
            processed: csv,
        }
    }
}

/// One dataset known to the catalog.
///
/// Holds the parsed identity, the directory its artifacts live in
/// (`<root>/<plural>/<YYYY-MM>/`), the remote URL when one was
/// registered, and the last derived status.
#[derive(Debug, Clone)]
pub struct DatasetEntry {
    id: DatasetId,
    name: ArchiveName,
    dir: PathBuf,
    url: Option<String>,
    status: DatasetStatus,
}

impl DatasetEntry {
    /// Create an entry under a storage root. Touches no files; call
    /// [`refresh_status`](Self::refresh_status) to read the disk.
    pub(crate) fn new(root: &Path, name: ArchiveName, url: Option<String>) -> Self {
        let dir = root
            .join(name.kind.plural())
            .join(naming::period_bucket(name.date));
        let id = DatasetId::from(name.dataset_id());
        Self {
            id,
            name,
            dir,
            url,
            status: DatasetStatus::default(),
        }
    }

    /// The stable dataset id.
    pub fn id(&self) -> &DatasetId {
        &self.id
    }

    /// Content kind of the records in this dump.
    pub fn kind(&self) -> ContentKind {
        self.name.kind
    }

    /// Dump date parsed from the archive name.
    pub fn date(&self) -> NaiveDate {
        self.name.date
    }

    /// Publisher prefix from the archive name.
    pub fn prefix(&self) -> &str {
        &self.name.prefix
    }

    /// Remote URL, if one was registered for this dataset.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub(crate) fn set_url(&mut self, url: String) {
        self.url = Some(url);
    }

    /// Flags as of the last [`refresh_status`](Self::refresh_status).
    pub fn status(&self) -> DatasetStatus {
        self.status
    }

    /// Directory holding this dataset's artifacts.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the compressed archive.
    pub fn archive_path(&self) -> PathBuf {
        self.dir.join(naming::archive_filename(self.id.as_str()))
    }

    /// Path of the extracted XML file.
    pub fn xml_path(&self) -> PathBuf {
        self.dir.join(naming::xml_filename(self.id.as_str()))
    }

    /// Path of the completed CSV output.
    pub fn csv_path(&self) -> PathBuf {
        self.dir.join(naming::csv_filename(self.id.as_str()))
    }

    /// Path of a CSV produced by a conversion with chunk failures.
    pub fn partial_csv_path(&self) -> PathBuf {
        self.dir
            .join(naming::partial_csv_filename(self.id.as_str()))
    }

    /// Path of an in-progress extraction.
    pub fn tmp_xml_path(&self) -> PathBuf {
        self.dir.join(naming::tmp_xml_filename(self.id.as_str()))
    }

    /// Path of an in-progress conversion.
    pub fn tmp_csv_path(&self) -> PathBuf {
        self.dir.join(naming::tmp_csv_filename(self.id.as_str()))
    }

    /// Folder the chunker writes `chunk_<i>.xml` files into.
    pub fn chunk_dir(&self) -> PathBuf {
        self.dir.join(naming::chunk_dir_name(self.name.kind))
    }

    /// Re-derive the lifecycle flags from the files currently on disk.
    pub fn refresh_status(&mut self) -> DatasetStatus {
        self.status = DatasetStatus::from_artifacts(
            self.archive_path().is_file(),
            self.xml_path().is_file(),
            self.csv_path().is_file(),
        );
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parse_archive_name;
    use std::fs;
    use tempfile::TempDir;

    fn entry_in(root: &Path) -> DatasetEntry {
        let name = parse_archive_name("discogs_20240101_releases.xml.gz").unwrap();
        DatasetEntry::new(root, name, None)
    }

    #[test]
    fn test_status_from_artifacts_truth_table() {
        let fresh = DatasetStatus::from_artifacts(false, false, false);
        assert!(!fresh.downloaded && !fresh.extracted && !fresh.processed);

        let downloaded = DatasetStatus::from_artifacts(true, false, false);
        assert!(downloaded.downloaded && !downloaded.extracted);

        let extracted = DatasetStatus::from_artifacts(true, true, false);
        assert!(extracted.downloaded && extracted.extracted && !extracted.processed);

        let processed = DatasetStatus::from_artifacts(true, true, true);
        assert!(processed.downloaded && processed.extracted && processed.processed);
    }

    #[test]
    fn test_status_normalization() {
        // Archive deleted after extraction
        let status = DatasetStatus::from_artifacts(false, true, false);
        assert!(status.downloaded);
        assert!(status.extracted);

        // Everything but the CSV deleted
        let status = DatasetStatus::from_artifacts(false, false, true);
        assert!(status.downloaded);
        assert!(status.extracted);
        assert!(status.processed);
    }

    #[test]
    fn test_entry_directory_layout() {
        let entry = entry_in(Path::new("/data/dumps"));
        assert_eq!(
            entry.dir(),
            Path::new("/data/dumps/releases/2024-01")
        );
        assert_eq!(
            entry.archive_path(),
            Path::new("/data/dumps/releases/2024-01/discogs_20240101_releases.xml.gz")
        );
        assert_eq!(
            entry.chunk_dir(),
            Path::new("/data/dumps/releases/2024-01/chunked_releases")
        );
    }

    #[test]
    fn test_entry_identity() {
        let entry = entry_in(Path::new("/data"));
        assert_eq!(entry.id().as_str(), "discogs_20240101_releases");
        assert_eq!(entry.kind(), ContentKind::Releases);
        assert_eq!(entry.prefix(), "discogs");
        assert_eq!(entry.date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn test_refresh_status_tracks_disk() {
        let temp = TempDir::new().unwrap();
        let mut entry = entry_in(temp.path());

        assert_eq!(entry.refresh_status(), DatasetStatus::default());

        fs::create_dir_all(entry.dir()).unwrap();
        fs::write(entry.archive_path(), b"gz").unwrap();
        let status = entry.refresh_status();
        assert!(status.downloaded && !status.extracted);

        fs::write(entry.xml_path(), b"<root/>").unwrap();
        let status = entry.refresh_status();
        assert!(status.extracted && !status.processed);

        fs::write(entry.csv_path(), b"a,b\n").unwrap();
        let status = entry.refresh_status();
        assert!(status.processed);
    }

    #[test]
    fn test_tmp_and_partial_paths_share_directory() {
        let entry = entry_in(Path::new("/data"));
        assert_eq!(entry.tmp_xml_path().parent(), entry.xml_path().parent());
        assert_eq!(entry.tmp_csv_path().parent(), entry.csv_path().parent());
        assert_eq!(
            entry.partial_csv_path().parent(),
            entry.csv_path().parent()
        );
    }
}
