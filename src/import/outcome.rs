//! Row diagnostics and the aggregated result of one import call.

use crate::import::batch::BatchReport;
use crate::import::parser::RowFields;
use crate::store::ImportedCustomer;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One rule violation on one field of a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Echo of the offending row.
///
/// Structurally valid rows are echoed by column name; malformed rows keep
/// the raw field list as read from the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowValues {
    Fields(RowFields),
    Raw(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowDiagnostic {
    pub row_number: u64,
    pub values: RowValues,
    pub errors: Vec<FieldError>,
}

impl RowDiagnostic {
    pub fn new(row_number: u64, values: RowValues, errors: Vec<FieldError>) -> Self {
        Self {
            row_number,
            values,
            errors: dedupe_errors(errors),
        }
    }

    pub fn messages(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.message.as_str()).collect()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }
}

/// Drop repeated `(field, message)` pairs, keeping first occurrences in order.
pub fn dedupe_errors(errors: Vec<FieldError>) -> Vec<FieldError> {
    let mut seen = HashSet::new();
    errors
        .into_iter()
        .filter(|error| seen.insert((error.field.clone(), error.message.clone())))
        .collect()
}

/// Response payload of a completed import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub total_rows_processed: usize,
    pub imported_count: usize,
    pub failed_count: usize,
    pub aborted: bool,
    pub fatal_error: Option<String>,
    pub imported: Vec<ImportedCustomer>,
    pub errors: Vec<RowDiagnostic>,
}

impl ImportOutcome {
    /// Combine parser and batch results.
    ///
    /// Both diagnostic streams are already in file order, so they are merged
    /// rather than sorted.
    pub fn assemble(
        total_rows_processed: usize,
        malformed: Vec<RowDiagnostic>,
        report: BatchReport,
    ) -> Self {
        let aborted = report.aborted();
        let errors = merge_in_row_order(malformed, report.diagnostics);

        Self {
            total_rows_processed,
            imported_count: report.imported.len(),
            failed_count: errors.len(),
            aborted,
            fatal_error: report.fatal_error,
            imported: report.imported,
            errors,
        }
    }
}

fn merge_in_row_order(left: Vec<RowDiagnostic>, right: Vec<RowDiagnostic>) -> Vec<RowDiagnostic> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();

    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => l.row_number <= r.row_number,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        merged.extend(if take_left { left.next() } else { right.next() });
    }

    merged
}
