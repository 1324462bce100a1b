//! Quoted-CSV line grammar.
//!
//! A field is either a double-quoted run of characters or an unquoted run up
//! to the next comma or the end of the line. Quotes inside a quoted field are
//! not escaped: the field ends at the first quote followed by a comma or the
//! end of the line. Whitespace before a field is ignored.

use std::borrow::Cow;
use std::io::{self, BufRead};

use log::warn;

/// Splits one body line into its positional fields.
pub fn split_fields(line: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut rest = line;
    loop {
        let field = rest.trim_start();
        if let Some((quoted, after)) = quoted_field(field) {
            fields.push(quoted);
            match after.strip_prefix(',') {
                Some(next) => rest = next,
                None => break,
            }
            continue;
        }
        match field.find(',') {
            Some(comma) => {
                fields.push(&field[..comma]);
                rest = &field[comma + 1..];
            }
            None => {
                fields.push(field);
                break;
            }
        }
    }
    fields
}

/// Lines of a byte stream, decoded as UTF-8 leniently.
///
/// Invalid byte sequences are replaced with U+FFFD and the line is kept, so
/// one badly encoded row cannot end the input. Only read failures of the
/// underlying stream are returned as errors. Line terminators (`\n` or
/// `\r\n`) are stripped.
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
    line_number: usize,
}

impl<R: BufRead> LossyLines<R> {
    /// Wraps `reader`.
    pub fn new(reader: R) -> Self {
        LossyLines {
            reader,
            buf: Vec::new(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                self.line_number += 1;
                if self.buf.last() == Some(&b'\n') {
                    self.buf.pop();
                    if self.buf.last() == Some(&b'\r') {
                        self.buf.pop();
                    }
                }
                let line = match String::from_utf8_lossy(&self.buf) {
                    Cow::Borrowed(line) => line.to_string(),
                    Cow::Owned(line) => {
                        warn!(
                            "Replaced invalid UTF-8 on line {}: {}",
                            self.line_number, line
                        );
                        line
                    }
                };
                Some(Ok(line))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Returns the content of a quoted field and the text following its closing
/// quote, or `None` when `field` does not start a terminated quoted field.
fn quoted_field(field: &str) -> Option<(&str, &str)> {
    let body = field.strip_prefix('"')?;
    body.match_indices('"').find_map(|(at, _)| {
        let after = &body[at + 1..];
        (after.is_empty() || after.starts_with(',')).then(|| (&body[..at], after))
    })
}
