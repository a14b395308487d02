//! Column derivation and the streaming record walker.
//!
//! Both conversion passes, schema discovery and CSV materialization,
//! walk chunk files through the same code path so the derived column
//! names can never diverge between them. Names flatten the element
//! tree below a record:
//!
//! - text in the record element itself takes the record tag (`release`)
//! - text one level down takes the element name (`title`)
//! - deeper text joins the last two path components (`artist_title`)
//! - an attribute appends its name to the element's column
//!   (`release_id`, `artist_name`, `videos_video_src`)
//!
//! Whitespace-only text never contributes a field.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::{parse_failed, ConvertError, ConvertResult};
use crate::cancel::CancelToken;

/// Flattened column name for text inside the element at `rel_path`,
/// the open-element names strictly below the record element.
pub(crate) fn element_column(record_tag: &str, rel_path: &[String]) -> String {
    match rel_path.len() {
        0 => record_tag.to_string(),
        1 => rel_path[0].clone(),
        n => format!("{}_{}", rel_path[n - 2], rel_path[n - 1]),
    }
}

/// Flattened column name for an attribute on the element at `rel_path`.
pub(crate) fn attribute_column(record_tag: &str, rel_path: &[String], attr: &str) -> String {
    format!("{}_{}", element_column(record_tag, rel_path), attr)
}

/// Field accumulator for one record: column name to the values seen in
/// document order. A column appears more than once when the record
/// repeats an element or attribute.
#[derive(Debug, Default)]
pub(crate) struct RecordFields {
    values: BTreeMap<String, Vec<String>>,
}

impl RecordFields {
    fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, column: String, value: String) {
        self.values.entry(column).or_default().push(value);
    }

    fn clear(&mut self) {
        self.values.clear();
    }

    /// Column names present in this record.
    pub(crate) fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// (column, values) pairs; values keep document order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// Stream one chunk file and invoke `on_record` with the accumulated
/// fields of every record, returning the record count.
///
/// Records are elements named `record_tag` sitting directly below the
/// document root; a same-named element deeper down belongs to the
/// enclosing record's subtree. The cancellation token is checked at
/// record boundaries.
pub(crate) fn walk_chunk_records<F>(
    path: &Path,
    record_tag: &str,
    cancel: &CancelToken,
    mut on_record: F,
) -> ConvertResult<usize>
where
    F: FnMut(&RecordFields) -> ConvertResult<()>,
{
    let file = File::open(path).map_err(|e| ConvertError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut reader = Reader::from_reader(BufReader::new(file));
    let tag = record_tag.as_bytes();

    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut in_record = false;
    let mut rel_path: Vec<String> = Vec::new();
    let mut fields = RecordFields::new();
    let mut records = 0usize;

    loop {
        let mut record_done = false;

        match reader.read_event_into(&mut buf).map_err(|e| parse_failed(path, e))? {
            Event::Eof => break,
            Event::Start(e) => {
                if in_record {
                    rel_path.push(element_name(&e));
                    collect_attributes(path, record_tag, &rel_path, &e, &mut fields)?;
                } else if depth == 1 && e.name().as_ref() == tag {
                    in_record = true;
                    rel_path.clear();
                    fields.clear();
                    collect_attributes(path, record_tag, &rel_path, &e, &mut fields)?;
                }
                depth += 1;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                if in_record {
                    if depth == 1 {
                        in_record = false;
                        record_done = true;
                    } else {
                        rel_path.pop();
                    }
                }
            }
            Event::Empty(e) => {
                if in_record {
                    rel_path.push(element_name(&e));
                    collect_attributes(path, record_tag, &rel_path, &e, &mut fields)?;
                    rel_path.pop();
                } else if depth == 1 && e.name().as_ref() == tag {
                    rel_path.clear();
                    fields.clear();
                    collect_attributes(path, record_tag, &rel_path, &e, &mut fields)?;
                    record_done = true;
                }
            }
            Event::Text(t) => {
                if in_record {
                    let text = t.unescape().map_err(|e| parse_failed(path, e))?;
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        fields.add(element_column(record_tag, &rel_path), trimmed.to_string());
                    }
                }
            }
            Event::CData(t) => {
                if in_record {
                    let text = String::from_utf8_lossy(&t);
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        fields.add(element_column(record_tag, &rel_path), trimmed.to_string());
                    }
                }
            }
            _ => {}
        }

        if record_done {
            on_record(&fields)?;
            records += 1;
            fields.clear();
            if cancel.is_canceled() {
                return Err(ConvertError::Canceled);
            }
        }

        buf.clear();
    }

    Ok(records)
}

fn element_name(element: &BytesStart) -> String {
    String::from_utf8_lossy(element.name().as_ref()).into_owned()
}

fn collect_attributes(
    path: &Path,
    record_tag: &str,
    rel_path: &[String],
    element: &BytesStart,
    fields: &mut RecordFields,
) -> ConvertResult<()> {
    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| parse_failed(path, e))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| parse_failed(path, e))?;
        fields.add(
            attribute_column(record_tag, rel_path, &key),
            value.into_owned(),
        );
    }
    Ok(())
}
