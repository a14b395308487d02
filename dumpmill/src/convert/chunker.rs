//! Record-bounded XML chunking.
//!
//! Splits one extracted dump file into a folder of small XML files,
//! each holding at most a fixed number of records under a synthetic
//! `<root>` element. The source is streamed event-by-event, so memory
//! use stays flat no matter how large the dump is; chunk files open
//! lazily, on the first record that needs one.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use tracing::{debug, info};

use super::{parse_failed, ConvertError, ConvertResult};
use crate::cancel::CancelToken;
use crate::catalog::{chunk_dir_name, chunk_filename, ContentKind};

/// Records per chunk file unless overridden.
pub const DEFAULT_RECORDS_PER_CHUNK: usize = 10_000;

/// Progress callback for chunking: (source bytes consumed, source bytes total).
pub type ChunkProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Outcome of a completed chunking run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReport {
    /// Folder holding the chunk files, beside the source XML.
    pub chunk_dir: PathBuf,
    /// Number of chunk files written.
    pub chunks_written: usize,
    /// Total records across all chunks.
    pub records: usize,
}

/// Splits a dump file into record-bounded chunks.
///
/// The chunk folder is named `chunked_<plural>` and sits next to the
/// source file. A stale folder from an earlier run is replaced, and on
/// any failure or cancellation the folder is removed again, so it only
/// ever exists in a complete state.
#[derive(Debug)]
pub struct RecordChunker {
    records_per_chunk: usize,
}

impl RecordChunker {
    pub fn new() -> Self {
        RecordChunker {
            records_per_chunk: DEFAULT_RECORDS_PER_CHUNK,
        }
    }

    /// Override the chunk size. Values below 1 are clamped to 1.
    pub fn with_records_per_chunk(mut self, records_per_chunk: usize) -> Self {
        self.records_per_chunk = records_per_chunk.max(1);
        self
    }

    pub fn records_per_chunk(&self) -> usize {
        self.records_per_chunk
    }

    /// Chunk `xml` into a fresh `chunked_<plural>` folder.
    pub fn chunk(
        &self,
        xml: &Path,
        kind: ContentKind,
        cancel: &CancelToken,
    ) -> ConvertResult<ChunkReport> {
        self.run(xml, kind, cancel, None)
    }

    /// Like [`chunk`](Self::chunk), reporting consumed source bytes as
    /// records are split off.
    pub fn chunk_with_progress(
        &self,
        xml: &Path,
        kind: ContentKind,
        cancel: &CancelToken,
        on_progress: ChunkProgressCallback,
    ) -> ConvertResult<ChunkReport> {
        self.run(xml, kind, cancel, Some(on_progress))
    }

    fn run(
        &self,
        xml: &Path,
        kind: ContentKind,
        cancel: &CancelToken,
        on_progress: Option<ChunkProgressCallback>,
    ) -> ConvertResult<ChunkReport> {
        if !xml.is_file() {
            return Err(ConvertError::MissingSource {
                path: xml.to_path_buf(),
            });
        }
        if cancel.is_canceled() {
            return Err(ConvertError::Canceled);
        }

        let parent = xml.parent().unwrap_or_else(|| Path::new("."));
        let chunk_dir = parent.join(chunk_dir_name(kind));

        if chunk_dir.exists() {
            debug!(dir = %chunk_dir.display(), "Removing stale chunk folder");
            fs::remove_dir_all(&chunk_dir).map_err(|e| ConvertError::WriteFailed {
                path: chunk_dir.clone(),
                source: e,
            })?;
        }
        fs::create_dir_all(&chunk_dir).map_err(|e| ConvertError::WriteFailed {
            path: chunk_dir.clone(),
            source: e,
        })?;

        match split_records(
            xml,
            kind,
            &chunk_dir,
            self.records_per_chunk,
            cancel,
            on_progress,
        ) {
            Ok((chunks_written, records)) => {
                info!(
                    source = %xml.display(),
                    chunks = chunks_written,
                    records,
                    "Chunking complete"
                );
                Ok(ChunkReport {
                    chunk_dir,
                    chunks_written,
                    records,
                })
            }
            Err(e) => {
                fs::remove_dir_all(&chunk_dir).ok();
                Err(e)
            }
        }
    }
}

impl Default for RecordChunker {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream the source and copy each record subtree into the open chunk,
/// rolling over to a new chunk file every `records_per_chunk` records.
/// Returns (chunks written, records seen).
fn split_records(
    xml: &Path,
    kind: ContentKind,
    chunk_dir: &Path,
    records_per_chunk: usize,
    cancel: &CancelToken,
    on_progress: Option<ChunkProgressCallback>,
) -> ConvertResult<(usize, usize)> {
    let read_err = |e: io::Error| ConvertError::ReadFailed {
        path: xml.to_path_buf(),
        source: e,
    };

    let total_bytes = fs::metadata(xml).map_err(read_err)?.len();
    let file = File::open(xml).map_err(read_err)?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    let tag = kind.singular().as_bytes();

    let report = |consumed: u64| {
        if let Some(ref cb) = on_progress {
            cb(consumed, total_bytes);
        }
    };

    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut in_record = false;
    let mut chunk: Option<OpenChunk> = None;
    let mut next_index = 0usize;
    let mut records = 0usize;
    let mut records_in_chunk = 0usize;

    loop {
        let mut record_done = false;

        match reader.read_event_into(&mut buf) {
            Err(e) => return Err(parse_failed(xml, e)),
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                if !in_record && depth == 1 && e.name().as_ref() == tag {
                    in_record = true;
                }
                if in_record {
                    write_to_chunk(&mut chunk, chunk_dir, &mut next_index, Event::Start(e))?;
                }
                depth += 1;
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                if in_record {
                    write_to_chunk(&mut chunk, chunk_dir, &mut next_index, Event::End(e))?;
                    if depth == 1 {
                        in_record = false;
                        record_done = true;
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let starts_record = !in_record && depth == 1 && e.name().as_ref() == tag;
                if in_record || starts_record {
                    write_to_chunk(&mut chunk, chunk_dir, &mut next_index, Event::Empty(e))?;
                }
                record_done = starts_record;
            }
            Ok(event) => {
                if in_record {
                    write_to_chunk(&mut chunk, chunk_dir, &mut next_index, event)?;
                }
            }
        }

        if record_done {
            records += 1;
            records_in_chunk += 1;
            report(reader.buffer_position() as u64);
            if cancel.is_canceled() {
                return Err(ConvertError::Canceled);
            }
            if records_in_chunk >= records_per_chunk {
                if let Some(open) = chunk.take() {
                    open.finish()?;
                }
                records_in_chunk = 0;
            }
        }

        buf.clear();
    }

    if let Some(open) = chunk.take() {
        open.finish()?;
    }
    report(total_bytes);

    Ok((next_index, records))
}

/// Copy one event into the current chunk, opening the next chunk file
/// first if none is open.
fn write_to_chunk(
    chunk: &mut Option<OpenChunk>,
    chunk_dir: &Path,
    next_index: &mut usize,
    event: Event<'_>,
) -> ConvertResult<()> {
    if chunk.is_none() {
        *chunk = Some(OpenChunk::create(chunk_dir, *next_index)?);
        *next_index += 1;
    }
    if let Some(open) = chunk.as_mut() {
        open.write(event)?;
    }
    Ok(())
}

/// A chunk file mid-write: XML declaration and `<root>` already
/// emitted, `</root>` still owed.
struct OpenChunk {
    writer: Writer<BufWriter<File>>,
    path: PathBuf,
}

impl OpenChunk {
    fn create(chunk_dir: &Path, index: usize) -> ConvertResult<Self> {
        let path = chunk_dir.join(chunk_filename(index));
        let file = File::create(&path).map_err(|e| ConvertError::WriteFailed {
            path: path.clone(),
            source: e,
        })?;
        let mut open = OpenChunk {
            writer: Writer::new(BufWriter::new(file)),
            path,
        };
        open.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        open.write(Event::Start(BytesStart::new("root")))?;
        Ok(open)
    }

    fn write(&mut self, event: Event<'_>) -> ConvertResult<()> {
        self.writer
            .write_event(event)
            .map_err(|e| ConvertError::ChunkWriteFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    fn finish(mut self) -> ConvertResult<()> {
        self.write(Event::End(BytesEnd::new("root")))?;
        self.writer
            .into_inner()
            .flush()
            .map_err(|e| ConvertError::WriteFailed {
                path: self.path,
                source: e,
            })
    }
}
