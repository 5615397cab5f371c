use std::io::{BufRead, Lines};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenizeError {
    #[error("CSV file must contain a header row and at least one data row")]
    NoDataRows,
    #[error("failed to read CSV input: {0}")]
    Read(#[from] std::io::Error),
    #[error("import cancelled")]
    Cancelled,
}

/// One non-blank data line. `line` is the 1-based physical line in the file,
/// so the header is line 1 and skipped blank lines still count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub line: usize,
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn cell(&self, idx: usize) -> &str {
        self.cells.get(idx).map(String::as_str).unwrap_or("")
    }
}

/// Splits on every comma. Quoted fields are not supported: a value holding a
/// comma spills into the next column.
pub fn split_cells(line: &str) -> Vec<String> {
    line.split(',').map(|c| c.trim().to_string()).collect()
}

/// Streams data rows out of a reader after consuming the header line.
pub struct RowReader<R: BufRead> {
    header: Vec<String>,
    lines: Lines<R>,
    line_no: usize,
}

impl<R: BufRead> RowReader<R> {
    pub fn new(reader: R) -> Result<Self, TokenizeError> {
        let mut lines = reader.lines();
        let mut line_no = 0usize;
        let header = loop {
            let Some(line) = lines.next() else {
                return Err(TokenizeError::NoDataRows);
            };
            let line = line?;
            line_no += 1;
            let t = line.trim().trim_start_matches('\u{feff}').trim();
            if t.is_empty() {
                continue;
            }
            break split_cells(t)
                .into_iter()
                .map(|h| h.to_lowercase())
                .collect::<Vec<_>>();
        };
        Ok(Self {
            header,
            lines,
            line_no,
        })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }
}

impl<R: BufRead> Iterator for RowReader<R> {
    type Item = Result<RawRow, TokenizeError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(l) => l,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            let t = line.trim();
            if t.is_empty() {
                continue;
            }
            return Some(Ok(RawRow {
                line: self.line_no,
                cells: split_cells(t),
            }));
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tokenized {
    pub header: Vec<String>,
    pub rows: Vec<RawRow>,
}

pub fn tokenize(text: &str) -> Result<Tokenized, TokenizeError> {
    let mut reader = RowReader::new(text.as_bytes())?;
    let rows = reader.by_ref().collect::<Result<Vec<_>, _>>()?;
    if rows.is_empty() {
        return Err(TokenizeError::NoDataRows);
    }
    Ok(Tokenized {
        header: reader.header,
        rows,
    })
}
