//! Delimited text → [`RawRow`]s.
//!
//! The first non-blank line names the columns. Every later non-blank line is
//! one row; a row with the wrong number of fields is reported, not fatal.

use crate::record::{RowIssue, RowProblem};
use crate::{IngestError, IngestResult};
use csv_async::{AsyncReader, AsyncReaderBuilder, StringRecord, Trim};
use std::sync::Arc;
use tokio::io::AsyncRead;

/// One data line keyed by the header's column names.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    line: u64,
    headers: Arc<[String]>,
    values: Vec<String>,
}

impl RawRow {
    pub fn new(line: u64, headers: Arc<[String]>, values: Vec<String>) -> Self {
        Self {
            line,
            headers,
            values,
        }
    }

    /// 1-based line number in the source file.
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// Trimmed value of `column`; unknown columns and blank cells are `None`.
    pub fn get(&self, column: &str) -> Option<&str> {
        let idx = self.headers.iter().position(|h| h == column)?;
        self.values
            .get(idx)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Everything the parser produced for one file.
#[derive(Debug, Clone)]
pub struct ParsedInput {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
    pub rejected: Vec<RowIssue>,
}

impl ParsedInput {
    /// Data lines seen, accepted or not.
    pub fn data_lines(&self) -> usize {
        self.rows.len() + self.rejected.len()
    }
}

/// Lazy row source over an async reader.
pub struct RowReader<R> {
    rdr: AsyncReader<R>,
    headers: Arc<[String]>,
    record: StringRecord,
}

impl<R> RowReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Read up to and including the header line.
    pub async fn new(reader: R, delimiter: u8) -> IngestResult<Self> {
        let mut rdr = AsyncReaderBuilder::new()
            // header detection skips blank lines, so do it by hand
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .trim(Trim::All)
            .buffer_capacity(1 << 16)
            .create_reader(reader);

        let mut record = StringRecord::new();
        loop {
            if !rdr.read_record(&mut record).await? {
                return Err(IngestError::MalformedInput(
                    "input is empty, expected a header line and at least one data line".into(),
                ));
            }
            if !is_blank(&record) {
                break;
            }
        }

        let headers: Vec<String> = record
            .iter()
            .enumerate()
            .map(|(i, h)| {
                let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
                unquote(h.trim()).to_string()
            })
            .collect();
        tracing::debug!(columns = ?headers, "read header line");

        Ok(Self {
            rdr,
            headers: headers.into(),
            record,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Next non-blank data line: `Ok(Some(Err(_)))` is a rejected row.
    pub async fn next_row(&mut self) -> IngestResult<Option<Result<RawRow, RowIssue>>> {
        loop {
            match self.rdr.read_record(&mut self.record).await {
                Ok(true) => {}
                Ok(false) => return Ok(None),
                Err(err) => {
                    if let csv_async::ErrorKind::Utf8 { pos, .. } = err.kind() {
                        let line = pos.as_ref().map(|p| p.line()).unwrap_or_default();
                        return Ok(Some(Err(RowIssue::new(line, RowProblem::InvalidEncoding))));
                    }
                    return Err(err.into());
                }
            }

            if is_blank(&self.record) {
                continue;
            }

            let line = self
                .record
                .position()
                .map(|p| p.line())
                .unwrap_or_default();
            let expected = self.headers.len();
            let found = self.record.len();
            if found != expected {
                return Ok(Some(Err(RowIssue::new(
                    line,
                    RowProblem::FieldCountMismatch { expected, found },
                ))));
            }

            let values = self
                .record
                .iter()
                .map(|v| v.trim().to_string())
                .collect();
            return Ok(Some(Ok(RawRow::new(line, self.headers.clone(), values))));
        }
    }
}

/// Drain `reader` into memory, splitting accepted from rejected lines.
///
/// Fails with [`IngestError::MalformedInput`] unless there is a header line
/// and at least one data line.
pub async fn parse_all<R>(reader: R, delimiter: u8) -> IngestResult<ParsedInput>
where
    R: AsyncRead + Unpin + Send,
{
    let mut rows_reader = RowReader::new(reader, delimiter).await?;
    let mut rows = Vec::new();
    let mut rejected = Vec::new();

    while let Some(item) = rows_reader.next_row().await? {
        match item {
            Ok(row) => rows.push(row),
            Err(issue) => {
                tracing::warn!(line = issue.line, "{issue}");
                rejected.push(issue);
            }
        }
    }

    if rows.is_empty() && rejected.is_empty() {
        return Err(IngestError::MalformedInput(
            "input has a header line but no data lines".into(),
        ));
    }

    Ok(ParsedInput {
        headers: rows_reader.headers().to_vec(),
        rows,
        rejected,
    })
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|f| f.trim().is_empty()) && record.len() <= 1
}

/// Strip one pair of surrounding double quotes left behind by sloppy quoting
/// (e.g. `, "Price"` with a space before the opening quote).
fn unquote(s: &str) -> &str {
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        &s[1..s.len() - 1]
    } else {
        s
    }
}
