//! Dataset catalog: identity, naming, and filesystem-derived state.
//!
//! A *dataset* is one monthly dump archive and everything produced from
//! it. The catalog tracks datasets through three lifecycle stages, each
//! proven by an artifact on disk:
//!
//! ```text
//! discogs_20240101_releases.xml.gz   downloaded
//! discogs_20240101_releases.xml      extracted
//! discogs_20240101_releases.csv      processed
//! chunked_releases/chunk_<i>.xml     (intermediate, not a stage)
//! ```
//!
//! Artifacts live under `<root>/<plural>/<YYYY-MM>/`, where the plural
//! folder and month bucket come from the archive filename. Flags are
//! never persisted; [`CatalogRepository::scan`] re-derives them from the
//! files present, normalized so that a surviving later artifact implies
//! the earlier stages (extracted implies downloaded, processed implies
//! both).

mod content;
mod entry;
mod naming;
mod repository;

pub use content::ContentKind;
pub use entry::{DatasetEntry, DatasetId, DatasetStatus};
pub use naming::{
    archive_filename, chunk_dir_name, chunk_filename, csv_filename, parse_archive_name,
    parse_chunk_index, partial_csv_filename, period_bucket, tmp_csv_filename, tmp_xml_filename,
    xml_filename, ArchiveName, NameError, ARCHIVE_SUFFIX,
};
pub use repository::{CatalogError, CatalogRepository, CatalogResult};
