//! CSV materialization (pass 2).
//!
//! Re-streams every chunk through the same record walker as discovery
//! and emits one row per record in the frozen column order. A field
//! the record lacks renders empty; a field the record repeats renders
//! as a JSON array of its values in document order, so no information
//! is lost to the flat format.

use std::fs::File;
use std::path::Path;

use tracing::{debug, warn};

use super::fields::{walk_chunk_records, RecordFields};
use super::schema::Schema;
use super::{csv_failed, ChunkFile, ConvertError, ConvertResult, PassProgressCallback};
use crate::cancel::CancelToken;
use crate::catalog::ContentKind;

/// Outcome of the materialization pass.
#[derive(Debug)]
pub struct MaterializeReport {
    /// Data rows written (header not counted).
    pub rows_written: u64,
    /// Indexes of chunks that failed to parse. Rows a chunk emitted
    /// before its parse error stay in the output.
    pub failed_chunks: Vec<usize>,
}

/// Second pass: write `output` with one row per record across all
/// chunks, columns in `schema` order.
///
/// Malformed chunks are logged and skipped like in discovery; resource
/// errors and cancellation abort the pass, leaving cleanup of the
/// partial output to the caller.
pub fn materialize_csv(
    kind: ContentKind,
    chunks: &[ChunkFile],
    schema: &Schema,
    output: &Path,
    cancel: &CancelToken,
    on_progress: Option<PassProgressCallback>,
) -> ConvertResult<MaterializeReport> {
    let file = File::create(output).map_err(|e| ConvertError::WriteFailed {
        path: output.to_path_buf(),
        source: e,
    })?;
    let mut writer = csv::Writer::from_writer(file);

    if !schema.is_empty() {
        writer
            .write_record(schema.columns())
            .map_err(|e| csv_failed(output, e))?;
    }

    let mut row: Vec<String> = vec![String::new(); schema.len()];
    let mut rows_written = 0u64;
    let mut failed_chunks = Vec::new();

    for (done, chunk) in chunks.iter().enumerate() {
        if cancel.is_canceled() {
            return Err(ConvertError::Canceled);
        }

        let walked = walk_chunk_records(&chunk.path, kind.singular(), cancel, |fields| {
            fill_row(schema, fields, &mut row);
            writer
                .write_record(&row)
                .map_err(|e| csv_failed(output, e))?;
            rows_written += 1;
            Ok(())
        });

        match walked {
            Ok(records) => {
                debug!(chunk = chunk.index, records, "Materialized chunk");
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

    writer.flush().map_err(|e| ConvertError::WriteFailed {
        path: output.to_path_buf(),
        source: e,
    })?;

    Ok(MaterializeReport {
        rows_written,
        failed_chunks,
    })
}

/// Fill `row` with this record's rendered values, empty cells for
/// columns the record lacks. Fields outside the schema are dropped;
/// that can only happen for records in a chunk that failed discovery.
fn fill_row(schema: &Schema, fields: &RecordFields, row: &mut [String]) {
    for cell in row.iter_mut() {
        cell.clear();
    }
    for (column, values) in fields.iter() {
        if let Some(i) = schema.index_of(column) {
            row[i] = render_values(values);
        }
    }
}

/// A single value renders as-is; repeats render as a JSON array.
fn render_values(values: &[String]) -> String {
    if values.len() == 1 {
        values[0].clone()
    } else {
        serde_json::Value::from(values.to_vec()).to_string()
    }
}
