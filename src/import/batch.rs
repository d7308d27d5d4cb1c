//! Batched persistence with abort-on-store-failure.
//!
//! Rows are validated and written one at a time, in file order, grouped in
//! fixed-size batches. Writes are not wrapped in a transaction: a row that
//! was inserted stays inserted even if a later row fails. The first store
//! failure aborts the run; from then on every remaining row, in the current
//! batch and all later ones, is reported with the fatal message and nothing
//! else is written.

use crate::import::duplicates::DuplicateIndex;
use crate::import::outcome::{FieldError, RowDiagnostic, RowValues};
use crate::import::parser::ParsedRow;
use crate::import::validation::{RowValidator, to_new_customer};
use crate::store::{CustomerStore, ImportedCustomer};

pub const DEFAULT_BATCH_SIZE: usize = 100;

pub const FATAL_STORE_ERROR: &str = "Database became unavailable; import aborted.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Completed,
    Aborted,
}

/// What happened to one row during the run.
#[derive(Debug)]
enum RowOutcome {
    Imported(ImportedCustomer),
    Rejected(RowDiagnostic),
    /// The row hit the store failure, or came after it.
    Unprocessed(RowDiagnostic),
}

#[derive(Debug)]
pub struct BatchReport {
    pub state: RunState,
    pub imported: Vec<ImportedCustomer>,
    pub diagnostics: Vec<RowDiagnostic>,
    pub fatal_error: Option<String>,
}

impl BatchReport {
    fn new() -> Self {
        Self {
            state: RunState::Running,
            imported: Vec::new(),
            diagnostics: Vec::new(),
            fatal_error: None,
        }
    }

    pub fn aborted(&self) -> bool {
        self.state == RunState::Aborted
    }

    fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Imported(customer) => self.imported.push(customer),
            RowOutcome::Rejected(diagnostic) | RowOutcome::Unprocessed(diagnostic) => {
                self.diagnostics.push(diagnostic)
            }
        }
    }
}

pub struct BatchImporter<'a, S: ?Sized> {
    store: &'a S,
    validator: RowValidator,
    batch_size: usize,
}

impl<'a, S> BatchImporter<'a, S>
where
    S: CustomerStore + ?Sized,
{
    pub fn new(store: &'a S, validator: RowValidator, batch_size: usize) -> Self {
        Self {
            store,
            validator,
            batch_size: batch_size.max(1),
        }
    }

    /// Validate and persist `rows`, growing `index` as emails get stored.
    pub async fn run(&self, rows: &[ParsedRow], index: &mut DuplicateIndex) -> BatchReport {
        let mut report = BatchReport::new();

        for (batch_number, batch) in rows.chunks(self.batch_size).enumerate() {
            if report.state == RunState::Aborted {
                for row in batch {
                    report.record(RowOutcome::Unprocessed(fatal_diagnostic(row)));
                }
                continue;
            }

            log::trace!(
                "import batch {}: rows {}..={}",
                batch_number + 1,
                batch.first().map_or(0, |row| row.row_number),
                batch.last().map_or(0, |row| row.row_number)
            );

            for row in batch {
                let outcome = if report.state == RunState::Aborted {
                    RowOutcome::Unprocessed(fatal_diagnostic(row))
                } else {
                    self.process_row(row, index, &mut report).await
                };
                report.record(outcome);
            }
        }

        if report.state == RunState::Running {
            report.state = RunState::Completed;
        }

        report
    }

    async fn process_row(
        &self,
        row: &ParsedRow,
        index: &mut DuplicateIndex,
        report: &mut BatchReport,
    ) -> RowOutcome {
        // Re-derived here rather than at prefetch time: an earlier row of this
        // run may have stored the same email since the index was built.
        let errors = self.validator.validate(&row.fields, index);
        if !errors.is_empty() {
            return RowOutcome::Rejected(RowDiagnostic::new(
                row.row_number,
                RowValues::Fields(row.fields.clone()),
                errors,
            ));
        }

        match self.store.insert(&to_new_customer(&row.fields)).await {
            Ok(customer) => {
                index.record_imported(&row.fields.email);
                RowOutcome::Imported(customer)
            }
            Err(err) => {
                log::warn!(
                    "store failure on row {}, aborting import: {}",
                    row.row_number,
                    err
                );
                report.state = RunState::Aborted;
                report.fatal_error = Some(FATAL_STORE_ERROR.to_string());
                RowOutcome::Unprocessed(fatal_diagnostic(row))
            }
        }
    }
}

fn fatal_diagnostic(row: &ParsedRow) -> RowDiagnostic {
    RowDiagnostic::new(
        row.row_number,
        RowValues::Fields(row.fields.clone()),
        vec![FieldError::new("row", FATAL_STORE_ERROR)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::parser::RowFields;
    use crate::import::validation::DUPLICATE_IN_STORE;
    use crate::store::InMemoryCustomerStore;
    use chrono::NaiveDate;

    fn validator() -> RowValidator {
        RowValidator::new(NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"))
    }

    fn row(row_number: u64, email: &str) -> ParsedRow {
        ParsedRow {
            row_number,
            fields: RowFields {
                name: format!("Customer {row_number}"),
                email: email.to_string(),
                date_of_birth: None,
                annual_income: None,
            },
        }
    }

    fn rows(count: u64) -> Vec<ParsedRow> {
        (0..count)
            .map(|i| row(i + 2, &format!("user{i}@example.com")))
            .collect()
    }

    #[tokio::test]
    async fn imports_all_valid_rows() {
        let store = InMemoryCustomerStore::new();
        let mut index = DuplicateIndex::default();

        let report = BatchImporter::new(&store, validator(), 2)
            .run(&rows(5), &mut index)
            .await;

        assert_eq!(report.state, RunState::Completed);
        assert_eq!(report.imported.len(), 5);
        assert!(report.diagnostics.is_empty());
        assert_eq!(store.len(), 5);
        assert!(index.exists_in_store("user4@example.com"));
    }

    #[tokio::test]
    async fn stored_email_conflicts_with_later_row_of_same_run() {
        // Both rows pass the prefetch index (which was built empty), but the
        // second must see the first one's insert.
        let store = InMemoryCustomerStore::new();
        let mut index = DuplicateIndex::default();
        let input = vec![row(2, "same@example.com"), row(3, "same@example.com")];

        let report = BatchImporter::new(&store, validator(), 1)
            .run(&input, &mut index)
            .await;

        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].row_number, 3);
        assert_eq!(report.diagnostics[0].messages(), vec![DUPLICATE_IN_STORE]);
        assert_eq!(store.insert_attempts(), 1);
    }

    #[tokio::test]
    async fn store_failure_marks_rest_of_batch_and_later_batches() {
        let store = InMemoryCustomerStore::new().failing_from_insert(3);
        let mut index = DuplicateIndex::default();

        let report = BatchImporter::new(&store, validator(), 3)
            .run(&rows(8), &mut index)
            .await;

        assert!(report.aborted());
        assert_eq!(report.fatal_error.as_deref(), Some(FATAL_STORE_ERROR));
        assert_eq!(report.imported.len(), 2);
        assert_eq!(store.len(), 2);
        // No write is attempted after the failing one.
        assert_eq!(store.insert_attempts(), 3);

        let failed: Vec<u64> = report.diagnostics.iter().map(|d| d.row_number).collect();
        assert_eq!(failed, vec![4, 5, 6, 7, 8, 9]);
        for diagnostic in &report.diagnostics {
            assert_eq!(diagnostic.messages(), vec![FATAL_STORE_ERROR]);
            assert_eq!(diagnostic.fields(), vec!["row"]);
        }
    }

    #[tokio::test]
    async fn invalid_rows_after_abort_get_fatal_message_only() {
        let store = InMemoryCustomerStore::new().failing_from_insert(1);
        let mut index = DuplicateIndex::default();
        let input = vec![row(2, "ok@example.com"), row(3, "bad-email")];

        let report = BatchImporter::new(&store, validator(), 100)
            .run(&input, &mut index)
            .await;

        assert_eq!(report.diagnostics.len(), 2);
        assert_eq!(report.diagnostics[1].messages(), vec![FATAL_STORE_ERROR]);
    }

    #[tokio::test]
    async fn rejected_rows_are_never_written() {
        let store = InMemoryCustomerStore::new();
        let mut index = DuplicateIndex::default();
        let input = vec![row(2, "bad-email"), row(3, "good@example.com")];

        let report = BatchImporter::new(&store, validator(), 100)
            .run(&input, &mut index)
            .await;

        assert_eq!(store.insert_attempts(), 1);
        assert_eq!(report.imported.len(), 1);
        assert_eq!(report.diagnostics[0].row_number, 2);
        assert!(!report.aborted());
    }

    #[test]
    fn zero_batch_size_is_clamped() {
        let store = InMemoryCustomerStore::new();
        let importer = BatchImporter::new(&store, validator(), 0);
        assert_eq!(importer.batch_size, 1);
    }
}
