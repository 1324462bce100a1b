//! Streaming decoder for header-tagged tabular text.
//!
//! The first line names the columns. Each column is bound, once, to a field
//! of the target record shape (see [`TabularRecord`]); every following line
//! becomes one record. Decoding is lazy: records are produced as the caller
//! pulls them, and dropping the decoder stops reading input.
//!
//! Defects are never fatal here. Unknown columns and fields without a scalar
//! converter are ignored with a warning; lines with the wrong field count or
//! with unconvertible values are logged and skipped. Input that is not valid
//! UTF-8 is decoded with replacement characters. Only read failures of the
//! input itself surface as errors.

mod line;
mod schema;

use std::io::{self, BufRead};
use std::marker::PhantomData;
use std::sync::Arc;

use log::{debug, warn};

use crate::error_handling::{ImportStats, RowDefect};

pub use line::{split_fields, LossyLines};
pub use schema::{snake_to_camel, ConvertError, FieldSetter, FieldSpec, TabularRecord};

/// Lazy sequence of records decoded from tabular text.
///
/// Reads one line of input per record (plus any skipped lines). Single pass:
/// the underlying input is consumed irreversibly.
pub struct TabularDecoder<T: TabularRecord, I> {
    lines: I,
    bindings: Vec<Option<&'static FieldSetter<T>>>,
    stats: Arc<ImportStats>,
    line_number: usize,
    done: bool,
    _shape: PhantomData<fn() -> T>,
}

impl<T, I> TabularDecoder<T, I>
where
    T: TabularRecord,
    I: Iterator<Item = io::Result<String>>,
{
    /// Creates a decoder from an already-read header line and the remaining
    /// body lines.
    pub fn new(header: &str, lines: I, stats: Arc<ImportStats>) -> Self {
        let bindings = bind_columns::<T>(header, &stats);
        TabularDecoder {
            lines,
            bindings,
            stats,
            line_number: 1,
            done: false,
            _shape: PhantomData,
        }
    }

    /// Number of columns declared by the header, bound or not.
    pub fn column_count(&self) -> usize {
        self.bindings.len()
    }

    fn decode_line(&self, line: &str) -> Option<T> {
        let fields = split_fields(line);
        if fields.len() != self.column_count() {
            warn!(
                "Invalid line format ({} line {}): expected {} fields, found {}: {}",
                T::SHAPE,
                self.line_number,
                self.column_count(),
                fields.len(),
                line
            );
            self.stats.record(RowDefect::InvalidLine);
            return None;
        }

        let mut record = T::default();
        for (raw, setter) in fields.into_iter().zip(&self.bindings) {
            let Some(setter) = setter else { continue };
            if raw.is_empty() {
                continue;
            }
            if let Err(e) = setter.apply(&mut record, raw) {
                warn!(
                    "Skipping {} line {}: {}",
                    T::SHAPE,
                    self.line_number,
                    e
                );
                self.stats.record(RowDefect::InvalidValue);
                return None;
            }
        }
        Some(record)
    }
}

impl<T: TabularRecord, R: BufRead> TabularDecoder<T, LossyLines<R>> {
    /// Reads the header from `reader` and decodes the rest of it.
    ///
    /// Returns `Ok(None)` when the input is empty.
    pub fn from_reader(reader: R, stats: Arc<ImportStats>) -> io::Result<Option<Self>> {
        let mut lines = LossyLines::new(reader);
        match lines.next() {
            Some(header) => Ok(Some(Self::new(&header?, lines, stats))),
            None => Ok(None),
        }
    }
}

impl<T, I> Iterator for TabularDecoder<T, I>
where
    T: TabularRecord,
    I: Iterator<Item = io::Result<String>>,
{
    type Item = io::Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    debug!("Reached the end of {} input", T::SHAPE);
                    break;
                }
            };
            self.line_number += 1;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            if let Some(record) = self.decode_line(line) {
                return Some(Ok(record));
            }
        }
        None
    }
}

/// Resolves every header column against the shape's field table.
fn bind_columns<T: TabularRecord>(
    header: &str,
    stats: &ImportStats,
) -> Vec<Option<&'static FieldSetter<T>>> {
    let header = header.trim_start_matches('\u{feff}').trim_end_matches('\r');
    header
        .split(',')
        .map(|column| {
            let name = snake_to_camel(column.trim());
            match T::field(&name) {
                None => {
                    warn!("{} has no field {} found in input", T::SHAPE, name);
                    stats.record(RowDefect::UnknownColumn);
                    None
                }
                Some(FieldSpec {
                    setter: FieldSetter::Unsupported(type_name),
                    ..
                }) => {
                    warn!(
                        "Unsupported {} field {} type: {}",
                        T::SHAPE,
                        name,
                        type_name
                    );
                    stats.record(RowDefect::UnsupportedField);
                    None
                }
                Some(spec) => Some(&spec.setter),
            }
        })
        .collect()
}
