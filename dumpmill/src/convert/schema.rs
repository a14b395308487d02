//! Column schema discovery (pass 1).
//!
//! Discovery streams every chunk file once, collecting the distinct
//! column names into a [`SchemaBuilder`]. Freezing the builder sorts
//! the set, so the final column order is reproducible across runs and
//! platforms regardless of first-seen order.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use super::fields::walk_chunk_records;
use super::{ChunkFile, ConvertError, ConvertResult, PassProgressCallback};
use crate::cancel::CancelToken;
use crate::catalog::ContentKind;

/// Accumulates distinct column names during discovery.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    columns: BTreeSet<String>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a column name. Duplicates are absorbed.
    pub fn add(&mut self, column: &str) {
        if !self.columns.contains(column) {
            self.columns.insert(column.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Freeze into an immutable, alphabetically ordered [`Schema`].
    pub fn freeze(self) -> Schema {
        let columns: Vec<String> = self.columns.into_iter().collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, column)| (column.clone(), i))
            .collect();
        Schema { columns, index }
    }
}

/// Immutable ordered column set. Built once per conversion job and
/// shared by every materialized row.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Columns in output order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of `column` in the output order.
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }
}

/// Outcome of the discovery pass.
#[derive(Debug)]
pub struct Discovery {
    /// Frozen, sorted column set over every readable chunk.
    pub schema: Schema,
    /// Indexes of chunks that failed to parse and contributed nothing.
    pub failed_chunks: Vec<usize>,
}

/// First pass: stream every chunk and collect distinct column names.
///
/// A malformed chunk is logged and recorded in
/// [`Discovery::failed_chunks`]; the remaining chunks still contribute.
/// Resource errors and cancellation abort the whole pass.
pub fn discover_schema(
    kind: ContentKind,
    chunks: &[ChunkFile],
    cancel: &CancelToken,
    on_progress: Option<PassProgressCallback>,
) -> ConvertResult<Discovery> {
    let mut builder = SchemaBuilder::new();
    let mut failed_chunks = Vec::new();

    for (done, chunk) in chunks.iter().enumerate() {
        if cancel.is_canceled() {
            return Err(ConvertError::Canceled);
        }

        let walked = walk_chunk_records(&chunk.path, kind.singular(), cancel, |fields| {
            for column in fields.columns() {
                builder.add(column);
            }
            Ok(())
        });

        match walked {
            Ok(records) => {
                debug!(chunk = chunk.index, records, "Discovery pass over chunk");
            }
            Err(e @ ConvertError::ParseFailed { .. }) => {
                warn!("Skipping chunk {}: {}", chunk.index, e);
                failed_chunks.push(chunk.index);
            }
            Err(e) => return Err(e),
        }

        if let Some(ref cb) = on_progress {
            cb(done + 1, chunks.len());
        }
    }

    Ok(Discovery {
        schema: builder.freeze(),
        failed_chunks,
    })
}
