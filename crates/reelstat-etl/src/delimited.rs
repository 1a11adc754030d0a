//! Streaming parser for large delimited text files.
//!
//! A [`RowStream`] reads one line at a time, splits it literally on the
//! delimiter (the dataset formats never quote or escape), decodes it into a
//! typed row and hands back only the rows accepted by the caller's
//! predicate. A key filter, when set, runs on the raw key column first, and
//! lines it rejects are never decoded. Malformed lines surface as
//! [`RowParseError`] items and the stream carries on with the next line.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::marker::PhantomData;
use std::path::Path;
use std::str::FromStr;

use crate::error::RowParseError;

/// Field value meaning "unknown" in the dataset files.
pub const ABSENT: &str = "\\N";

/// Returns the field unless it is empty or the [`ABSENT`] sentinel.
pub fn present(raw: &str) -> Option<&str> {
    if raw.is_empty() || raw == ABSENT {
        None
    } else {
        Some(raw)
    }
}

/// Parse an optional field.
///
/// Absent and unparsable values both yield `None`; an unparsable value is
/// logged so bad data stays visible.
pub fn optional<T: FromStr>(column: &'static str, raw: &str) -> Option<T> {
    let value = present(raw)?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            log::debug!("Discarding unparsable {} value {:?}", column, value);
            None
        }
    }
}

/// Parse a field the row cannot do without.
pub fn required<T: FromStr>(column: &'static str, raw: &str) -> Result<T, FieldError> {
    present(raw)
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| FieldError::new(column, raw))
}

/// A required column that is absent or cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub column: &'static str,
    pub value: String,
}

impl FieldError {
    pub fn new(column: &'static str, value: &str) -> Self {
        Self {
            column,
            value: value.to_string(),
        }
    }
}

/// A typed row decoded from the fields of a single line.
pub trait DelimitedRow: Sized {
    /// Minimum number of columns a line must carry.
    const COLUMNS: usize;

    /// Column holding the row's key, as seen by a key filter.
    const KEY: usize = 0;

    fn from_fields(fields: &[&str]) -> Result<Self, FieldError>;
}

/// Row counters kept while streaming a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct ParseStats {
    /// Data lines read (header and blank lines excluded).
    pub seen: u64,
    /// Rows accepted by the key filter and the predicate.
    pub kept: u64,
    pub malformed: u64,
}

/// Key filter of a stream that has none.
pub type AnyKey = fn(&str) -> bool;

fn any_key(_: &str) -> bool {
    true
}

/// Lazy, non-restartable sequence of typed rows.
pub struct RowStream<B, T, P, K = AnyKey> {
    lines: Lines<B>,
    delimiter: char,
    key_filter: K,
    predicate: P,
    line: u64,
    header_skipped: bool,
    stats: ParseStats,
    _row: PhantomData<fn() -> T>,
}

impl<T, P> RowStream<BufReader<File>, T, P, AnyKey>
where
    T: DelimitedRow,
    P: FnMut(&T) -> bool,
{
    /// Open `path` for streaming.
    pub fn open(path: &Path, delimiter: char, predicate: P) -> std::io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), delimiter, predicate))
    }
}

impl<B, T, P> RowStream<B, T, P, AnyKey>
where
    B: BufRead,
    T: DelimitedRow,
    P: FnMut(&T) -> bool,
{
    /// Stream rows from any buffered reader. The first line is a header.
    pub fn new(reader: B, delimiter: char, predicate: P) -> Self {
        Self {
            lines: reader.lines(),
            delimiter,
            key_filter: any_key,
            predicate,
            line: 0,
            header_skipped: false,
            stats: ParseStats::default(),
            _row: PhantomData,
        }
    }

    /// Drop lines whose raw key column fails `key_filter` before decoding.
    pub fn with_key_filter<K>(self, key_filter: K) -> RowStream<B, T, P, K>
    where
        K: FnMut(&str) -> bool,
    {
        RowStream {
            lines: self.lines,
            delimiter: self.delimiter,
            key_filter,
            predicate: self.predicate,
            line: self.line,
            header_skipped: self.header_skipped,
            stats: self.stats,
            _row: PhantomData,
        }
    }
}

impl<B, T, P, K> RowStream<B, T, P, K>
where
    B: BufRead,
    T: DelimitedRow,
    P: FnMut(&T) -> bool,
    K: FnMut(&str) -> bool,
{
    /// Counters so far.
    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    /// Drain the stream, logging and dropping malformed rows.
    pub fn collect_logged(mut self, label: &str) -> (Vec<T>, ParseStats) {
        let mut rows = Vec::new();
        for row in self.by_ref() {
            match row {
                Ok(row) => rows.push(row),
                Err(e) => log::warn!("{}: skipping row: {}", label, e),
            }
        }
        let stats = self.stats;
        log::info!(
            "{}: {} rows read, {} kept, {} malformed",
            label,
            stats.seen,
            stats.kept,
            stats.malformed
        );
        (rows, stats)
    }

    /// Decode one line. `Ok(None)` means the key filter dropped it.
    fn decode(&mut self, text: &str) -> Result<Option<T>, RowParseError> {
        let fields: Vec<&str> = text.split(self.delimiter).collect();
        if fields.len() < T::COLUMNS {
            return Err(RowParseError::MissingColumns {
                line: self.line,
                expected: T::COLUMNS,
                found: fields.len(),
                payload: text.to_string(),
            });
        }
        if !(self.key_filter)(fields[T::KEY]) {
            return Ok(None);
        }
        T::from_fields(&fields)
            .map(Some)
            .map_err(|e| RowParseError::Malformed {
                line: self.line,
                column: e.column,
                value: e.value,
                payload: text.to_string(),
            })
    }
}

impl<B, T, P, K> Iterator for RowStream<B, T, P, K>
where
    B: BufRead,
    T: DelimitedRow,
    P: FnMut(&T) -> bool,
    K: FnMut(&str) -> bool,
{
    type Item = Result<T, RowParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line += 1;
            let text = match line {
                Ok(text) => text,
                Err(source) => {
                    self.stats.malformed += 1;
                    return Some(Err(RowParseError::Io {
                        line: self.line,
                        source,
                    }));
                }
            };

            if !self.header_skipped {
                self.header_skipped = true;
                continue;
            }

            let text = text.trim_end_matches('\r');
            if text.is_empty() {
                continue;
            }
            self.stats.seen += 1;

            match self.decode(text) {
                Ok(Some(row)) => {
                    if (self.predicate)(&row) {
                        self.stats.kept += 1;
                        return Some(Ok(row));
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    self.stats.malformed += 1;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<B, T, P, K> std::fmt::Debug for RowStream<B, T, P, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream")
            .field("delimiter", &self.delimiter)
            .field("line", &self.line)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
