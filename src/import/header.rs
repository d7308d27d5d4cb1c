//! Header line verification.

use crate::import::error::{ImportError, ImportResult};

/// Columns every import file must declare, in this order.
pub const EXPECTED_HEADERS: [&str; 4] = ["name", "email", "date_of_birth", "annual_income"];

const UTF8_BOM: char = '\u{feff}';

/// Normalize header cells: strip one leading BOM, trim, lower-case.
pub fn normalize_header<S: AsRef<str>>(cells: &[S]) -> Vec<String> {
    cells
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let cell = cell.as_ref();
            let cell = if idx == 0 {
                cell.strip_prefix(UTF8_BOM).unwrap_or(cell)
            } else {
                cell
            };
            cell.trim().to_lowercase()
        })
        .collect()
}

/// Accept the header only when it names exactly the expected columns.
pub fn verify_header<S: AsRef<str>>(cells: &[S]) -> ImportResult<()> {
    let normalized = normalize_header(cells);

    if normalized.iter().map(String::as_str).eq(EXPECTED_HEADERS) {
        Ok(())
    } else {
        log::debug!("rejecting CSV header {:?}", normalized);
        Err(ImportError::header_invalid())
    }
}
