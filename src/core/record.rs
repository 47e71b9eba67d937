//! Purpose: Line codec for tab-delimited two-column records.
//! Exports: `Record`, `FIELD_SEPARATOR`, `LINE_ENDING`, `write_fields`, `read_line`.
//! Role: Pure encode/decode helpers used by `RecordChannel`; no file ownership here.
//! Invariants: Fields are joined with one tab, never escaped, no leading/trailing tab.
//! Invariants: Reading accepts `\n`, `\r\n`, and lone `\r` terminators.
//! Invariants: A line without a tab decodes to `column1` only; `column2` is absent.
use std::io::{self, BufRead, Write};

use bstr::ByteSlice;
use serde::{Deserialize, Serialize};

pub const FIELD_SEPARATOR: char = '\t';

#[cfg(windows)]
pub const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
pub const LINE_ENDING: &str = "\n";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub column1: String,
    pub column2: Option<String>,
}

impl Record {
    pub fn new(column1: impl Into<String>, column2: impl Into<String>) -> Self {
        Self {
            column1: column1.into(),
            column2: Some(column2.into()),
        }
    }

    /// Splits a line on tabs and keeps the first two positions; the rest is ignored.
    pub fn parse(line: &str) -> Self {
        let mut fields = line.split(FIELD_SEPARATOR);
        let column1 = fields.next().unwrap_or_default().to_string();
        let column2 = fields.next().map(str::to_string);
        Self { column1, column2 }
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.column1.as_str()).chain(self.column2.as_deref())
    }

    pub fn into_columns(self) -> (String, Option<String>) {
        (self.column1, self.column2)
    }
}

/// Writes one line: fields joined by tabs, then the platform line ending.
pub fn write_fields<W, I, S>(writer: &mut W, fields: I) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for (index, field) in fields.into_iter().enumerate() {
        if index > 0 {
            writer.write_all(b"\t")?;
        }
        writer.write_all(field.as_ref().as_bytes())?;
    }
    writer.write_all(LINE_ENDING.as_bytes())
}

/// Reads the next line, without its terminator, into `line`.
///
/// Returns `Ok(false)` at end of input. A final line without a terminator is
/// still returned. Bytes that are not valid UTF-8 are replaced with U+FFFD.
pub fn read_line<R: BufRead>(reader: &mut R, line: &mut String) -> io::Result<bool> {
    let mut raw = Vec::new();
    if !read_raw_line(reader, &mut raw)? {
        line.clear();
        return Ok(false);
    }
    *line = raw.to_str_lossy().into_owned();
    Ok(true)
}

/// Drops a leading UTF-8 byte order mark, if present, before the first read.
pub(crate) fn skip_bom<R: BufRead>(reader: &mut R) -> io::Result<()> {
    loop {
        let has_bom = match reader.fill_buf() {
            Ok(buf) => buf.starts_with(UTF8_BOM),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        if has_bom {
            reader.consume(UTF8_BOM.len());
        }
        return Ok(());
    }
}

fn read_raw_line<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> io::Result<bool> {
    line.clear();
    let mut saw_bytes = false;
    loop {
        let (terminator, used) = {
            let available = match reader.fill_buf() {
                Ok(buf) => buf,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            };
            if available.is_empty() {
                return Ok(saw_bytes);
            }
            saw_bytes = true;
            match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(pos) => {
                    line.extend_from_slice(&available[..pos]);
                    (Some(available[pos]), pos + 1)
                }
                None => {
                    line.extend_from_slice(available);
                    (None, available.len())
                }
            }
        };
        reader.consume(used);
        match terminator {
            Some(b'\r') => {
                skip_byte(reader, b'\n')?;
                return Ok(true);
            }
            Some(_) => return Ok(true),
            None => {}
        }
    }
}

fn skip_byte<R: BufRead>(reader: &mut R, expected: u8) -> io::Result<()> {
    loop {
        match reader.fill_buf() {
            Ok(buf) => {
                let matches = buf.first() == Some(&expected);
                if matches {
                    reader.consume(1);
                }
                return Ok(());
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}
