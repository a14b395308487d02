//! Dataset repository over the on-disk dump layout.
//!
//! The catalog owns no state of its own beyond registered URLs: every
//! lifecycle flag is re-derived from the artifact files found under
//! `<root>/<plural>/<YYYY-MM>/`. Scanning after an external deletion or
//! a crashed run therefore always reflects what the disk actually holds.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use super::content::ContentKind;
use super::entry::{DatasetEntry, DatasetId, DatasetStatus};
use super::naming::{self, parse_archive_name, ArchiveName, NameError};

/// Errors raised by catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Failed to read a directory while scanning.
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to remove an artifact during cascade delete.
    #[error("failed to remove {}: {source}", path.display())]
    RemoveFailed { path: PathBuf, source: io::Error },

    /// No dataset with the given id is known to the catalog.
    #[error("dataset not found: {0}")]
    DatasetNotFound(DatasetId),

    /// A filename or URL doesn't name a dump archive.
    #[error(transparent)]
    InvalidName(#[from] NameError),
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Repository of datasets keyed by stable id.
///
/// # Example
///
/// ```no_run
/// use dumpmill::catalog::CatalogRepository;
///
/// let mut catalog = CatalogRepository::new("/data/dumps");
/// catalog.scan()?;
///
/// for entry in catalog.entries() {
///     println!("{}: {:?}", entry.id(), entry.status());
/// }
/// # Ok::<(), dumpmill::catalog::CatalogError>(())
/// ```
#[derive(Debug)]
pub struct CatalogRepository {
    /// Root of the dump storage layout.
    root: PathBuf,
    /// Known datasets, ordered by id.
    datasets: BTreeMap<DatasetId, DatasetEntry>,
}

impl CatalogRepository {
    /// Create a repository over a storage root. Touches no files.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            datasets: BTreeMap::new(),
        }
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of known datasets.
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// Whether the catalog knows any datasets.
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Rebuild the catalog from the files currently on disk.
    ///
    /// Walks `<root>/<plural>/<YYYY-MM>/` for every content kind and
    /// creates one entry per dataset id found. Registered URLs survive
    /// the rescan. Files that don't belong to the layout are skipped
    /// with a warning. Returns the number of datasets found.
    pub fn scan(&mut self) -> CatalogResult<usize> {
        let mut rebuilt: BTreeMap<DatasetId, DatasetEntry> = BTreeMap::new();

        for kind in ContentKind::ALL {
            let kind_dir = self.root.join(kind.plural());
            if !kind_dir.is_dir() {
                continue;
            }

            for period_dir in read_dir_sorted(&kind_dir)? {
                if !period_dir.is_dir() {
                    continue;
                }

                for file in read_dir_sorted(&period_dir)? {
                    if !file.is_file() {
                        continue;
                    }
                    let Some(filename) = file.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    let Some(id) = dataset_id_from_artifact(filename) else {
                        continue;
                    };

                    let name = match parse_archive_name(&naming::archive_filename(&id)) {
                        Ok(name) => name,
                        Err(err) => {
                            warn!("Skipping {}: {}", file.display(), err);
                            continue;
                        }
                    };

                    let entry = DatasetEntry::new(&self.root, name, None);
                    if entry.dir() != period_dir {
                        warn!(
                            "Skipping misplaced artifact {} (expected under {})",
                            file.display(),
                            entry.dir().display()
                        );
                        continue;
                    }

                    rebuilt.entry(DatasetId::from(id)).or_insert(entry);
                }
            }
        }

        // Carry registered URLs over, and keep URL-only entries alive so a
        // registration without a completed download is not forgotten.
        for (id, old) in std::mem::take(&mut self.datasets) {
            if let Some(url) = old.url() {
                match rebuilt.get_mut(&id) {
                    Some(entry) => entry.set_url(url.to_string()),
                    None => {
                        rebuilt.insert(id, old);
                    }
                }
            }
        }

        for entry in rebuilt.values_mut() {
            entry.refresh_status();
        }

        self.datasets = rebuilt;
        debug!(datasets = self.datasets.len(), "Catalog scan complete");
        Ok(self.datasets.len())
    }

    /// Register a remote archive URL.
    ///
    /// The dataset id is derived from the URL's filename. Registering a
    /// URL for an already-known dataset replaces its URL.
    pub fn register_url(&mut self, url: &str) -> CatalogResult<DatasetId> {
        let name = archive_name_from_url(url)?;
        let id = DatasetId::from(name.dataset_id());

        match self.datasets.get_mut(&id) {
            Some(entry) => entry.set_url(url.to_string()),
            None => {
                let mut entry = DatasetEntry::new(&self.root, name, Some(url.to_string()));
                entry.refresh_status();
                self.datasets.insert(id.clone(), entry);
            }
        }

        Ok(id)
    }

    /// Look up a dataset by id.
    pub fn get(&self, id: &DatasetId) -> Option<&DatasetEntry> {
        self.datasets.get(id)
    }

    /// All known datasets, ordered by id.
    pub fn entries(&self) -> Vec<&DatasetEntry> {
        self.datasets.values().collect()
    }

    /// Re-derive one dataset's flags from disk.
    pub fn refresh(&mut self, id: &DatasetId) -> CatalogResult<DatasetStatus> {
        let entry = self
            .datasets
            .get_mut(id)
            .ok_or_else(|| CatalogError::DatasetNotFound(id.clone()))?;
        Ok(entry.refresh_status())
    }

    /// Delete every artifact of a dataset: archive, extracted XML, CSV
    /// output (complete, partial, and in-progress), leftover download
    /// parts, and the chunk folder.
    ///
    /// Returns the paths that were actually removed. The entry itself
    /// survives only if it still has a registered URL.
    pub fn delete(&mut self, id: &DatasetId) -> CatalogResult<Vec<PathBuf>> {
        let entry = self
            .datasets
            .get(id)
            .ok_or_else(|| CatalogError::DatasetNotFound(id.clone()))?
            .clone();

        let mut removed = Vec::new();

        for path in [
            entry.archive_path(),
            entry.xml_path(),
            entry.csv_path(),
            entry.partial_csv_path(),
            entry.tmp_xml_path(),
            entry.tmp_csv_path(),
        ] {
            remove_file_if_exists(&path, &mut removed)?;
        }

        for part in leftover_parts(&entry)? {
            remove_file_if_exists(&part, &mut removed)?;
        }

        let chunk_dir = entry.chunk_dir();
        if chunk_dir.is_dir() {
            fs::remove_dir_all(&chunk_dir).map_err(|e| CatalogError::RemoveFailed {
                path: chunk_dir.clone(),
                source: e,
            })?;
            removed.push(chunk_dir);
        }

        if entry.url().is_some() {
            self.refresh(id)?;
        } else {
            self.datasets.remove(id);
        }

        debug!(dataset = %id, artifacts = removed.len(), "Cascade delete complete");
        Ok(removed)
    }
}

/// Read a directory and return its entries sorted by path.
///
/// Sorting makes scan results deterministic across platforms.
fn read_dir_sorted(dir: &Path) -> CatalogResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| CatalogError::ReadFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CatalogError::ReadFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

/// Derive a dataset id from a completed artifact filename.
///
/// Only finished artifacts count; in-progress and partial files
/// (`.tmp`, `.partial`, `.part<i>`) never create catalog entries.
fn dataset_id_from_artifact(filename: &str) -> Option<String> {
    for suffix in [".xml.gz", ".xml", ".csv"] {
        if let Some(id) = filename.strip_suffix(suffix) {
            return Some(id.to_string());
        }
    }
    None
}

/// Extract and parse the archive filename from a URL.
fn archive_name_from_url(url: &str) -> Result<ArchiveName, NameError> {
    let without_query = url
        .split(|c| c == '?' || c == '#')
        .next()
        .unwrap_or(url);
    let filename = without_query.rsplit('/').next().unwrap_or(without_query);
    parse_archive_name(filename)
}

fn remove_file_if_exists(path: &Path, removed: &mut Vec<PathBuf>) -> CatalogResult<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            removed.push(path.to_path_buf());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CatalogError::RemoveFailed {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Find `.part<i>` files left next to the archive by an interrupted fetch.
fn leftover_parts(entry: &DatasetEntry) -> CatalogResult<Vec<PathBuf>> {
    if !entry.dir().is_dir() {
        return Ok(Vec::new());
    }

    let archive_name = naming::archive_filename(entry.id().as_str());
    let prefix = format!("{}.part", archive_name);

    let mut parts = Vec::new();
    for path in read_dir_sorted(entry.dir())? {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.starts_with(&prefix) {
                parts.push(path);
            }
        }
    }
    Ok(parts)
}
