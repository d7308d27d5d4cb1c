//! CSV reading, blank-row skipping and field normalization.
//!
//! Rows are numbered by the physical line they start on, with the header on
//! line 1. Blank lines are skipped but still occupy their line number, so
//! reported row numbers always point at the right place in the uploaded file.

use crate::import::error::{
    HEADERS_ONLY, ImportError, ImportResult, NO_FIRST_RECORD, UNREADABLE_UPLOAD,
};
use crate::import::header::{EXPECTED_HEADERS, verify_header};
use crate::import::outcome::{FieldError, RowDiagnostic, RowValues};
use csv::{ByteRecord, ReaderBuilder};
use serde::{Deserialize, Serialize};

pub const MALFORMED_ROW: &str = "Malformed CSV row: wrong number of columns.";

/// Normalized columns of a structurally valid row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFields {
    pub name: String,
    pub email: String,
    pub date_of_birth: Option<String>,
    pub annual_income: Option<String>,
}

impl RowFields {
    /// Build from exactly four raw cells in header order.
    fn normalize(cells: &[String]) -> Self {
        let optional = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };

        Self {
            name: cells[0].trim().to_string(),
            email: cells[1].trim().to_lowercase(),
            date_of_birth: optional(&cells[2]),
            annual_income: optional(&cells[3]),
        }
    }
}

/// A row with the right shape, ready for validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRow {
    pub row_number: u64,
    pub fields: RowFields,
}

#[derive(Debug, Default)]
pub struct ParsedFile {
    /// Every non-blank data row, whatever happens to it later.
    pub total_rows_processed: usize,
    pub rows: Vec<ParsedRow>,
    pub malformed: Vec<RowDiagnostic>,
}

/// Read the header and every data row from `bytes`.
pub fn parse_csv(bytes: &[u8]) -> ImportResult<ParsedFile> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut lines = LineTracker::new(bytes);
    let mut record = ByteRecord::new();

    match reader.read_byte_record(&mut record) {
        Ok(true) => {}
        // Only blank lines: the header line is there but empty.
        Ok(false) if !bytes.is_empty() => return Err(ImportError::header_invalid()),
        Ok(false) => return Err(ImportError::file_invalid(NO_FIRST_RECORD)),
        Err(err) => {
            log::debug!("failed to read CSV header: {}", err);
            return Err(ImportError::file_invalid(UNREADABLE_UPLOAD));
        }
    }

    // The reader skips empty lines, so a header found below line 1 means the
    // file opened with a blank line where the header belongs.
    if lines.record_start(reader.position().byte()) != 1 {
        return Err(ImportError::header_invalid());
    }
    verify_header(&decode(&record))?;

    let mut parsed = ParsedFile::default();

    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                log::debug!("failed to read CSV row: {}", err);
                return Err(ImportError::file_invalid(UNREADABLE_UPLOAD));
            }
        }

        let row_number = lines.record_start(reader.position().byte());
        let cells = decode(&record);
        if is_blank(&cells) {
            continue;
        }

        parsed.total_rows_processed += 1;

        if cells.len() != EXPECTED_HEADERS.len() {
            parsed.malformed.push(RowDiagnostic::new(
                row_number,
                RowValues::Raw(cells),
                vec![FieldError::new("row", MALFORMED_ROW)],
            ));
            continue;
        }

        parsed.rows.push(ParsedRow {
            row_number,
            fields: RowFields::normalize(&cells),
        });
    }

    if parsed.total_rows_processed == 0 {
        return Err(ImportError::file_invalid(HEADERS_ONLY));
    }

    Ok(parsed)
}

/// Maps records back to the physical line they start on.
///
/// Fed the reader's byte offset after each record, it skips the empty lines
/// the reader discarded and counts newlines inside the record itself, so
/// quoted multi-line cells keep later rows aligned.
struct LineTracker<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: u64,
}

impl<'a> LineTracker<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            line: 1,
        }
    }

    fn record_start(&mut self, record_end: u64) -> u64 {
        let end = usize::try_from(record_end)
            .unwrap_or(usize::MAX)
            .min(self.bytes.len());

        while self.offset < end && matches!(self.bytes[self.offset], b'\r' | b'\n') {
            if self.bytes[self.offset] == b'\n' {
                self.line += 1;
            }
            self.offset += 1;
        }

        let start = self.line;
        if self.offset < end {
            let newlines = self.bytes[self.offset..end]
                .iter()
                .filter(|&&b| b == b'\n')
                .count();
            self.line += newlines as u64;
            self.offset = end;
        }
        start
    }
}

fn decode(record: &ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|cell| String::from_utf8_lossy(cell).into_owned())
        .collect()
}

/// Padding lines: no cells, or only cells that trim to nothing.
fn is_blank(cells: &[String]) -> bool {
    cells.iter().all(|cell| cell.trim().is_empty())
}
