//! CSV customer import pipeline.
//!
//! Stages run strictly in order:
//!
//! 1. [`header`] checks the first line names the expected columns.
//! 2. [`parser`] turns every later line into a [`ParsedRow`] or a malformed
//!    row diagnostic, skipping blank padding lines.
//! 3. [`duplicates`] finds emails repeated in the file and, with one store
//!    lookup, emails that already exist.
//! 4. [`validation`] and [`batch`] validate and persist rows batch by batch,
//!    aborting all further writes on the first store failure.
//! 5. [`outcome`] assembles counts, imported summaries and diagnostics.
//!
//! File and header problems reject the whole call with an [`ImportError`].
//! Everything that goes wrong with an individual row is reported inside the
//! returned [`ImportOutcome`] instead.

pub mod batch;
pub mod duplicates;
pub mod error;
pub mod header;
pub mod outcome;
pub mod parser;
pub mod validation;

pub use batch::{BatchImporter, BatchReport, DEFAULT_BATCH_SIZE, FATAL_STORE_ERROR, RunState};
pub use duplicates::DuplicateIndex;
pub use error::{ImportError, ImportResult};
pub use outcome::{FieldError, ImportOutcome, RowDiagnostic, RowValues};
pub use parser::{ParsedRow, RowFields};
pub use validation::RowValidator;

use crate::store::CustomerStore;
use chrono::NaiveDate;

/// Runs the whole pipeline for one uploaded file against a store.
pub struct CustomerImporter<'a, S: ?Sized> {
    store: &'a S,
    batch_size: usize,
    validator: RowValidator,
}

impl<'a, S> CustomerImporter<'a, S>
where
    S: CustomerStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
            validator: RowValidator::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Pin the date birth dates are compared against.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.validator = RowValidator::new(today);
        self
    }

    pub async fn import(&self, bytes: &[u8]) -> ImportResult<ImportOutcome> {
        if bytes.is_empty() {
            log::debug!("rejecting empty upload");
            return Err(ImportError::file_invalid(error::EMPTY_UPLOAD));
        }

        let parsed = parser::parse_csv(bytes)?;
        let mut index = DuplicateIndex::build(&parsed.rows, self.store).await?;

        let report = BatchImporter::new(self.store, self.validator, self.batch_size)
            .run(&parsed.rows, &mut index)
            .await;

        let outcome =
            ImportOutcome::assemble(parsed.total_rows_processed, parsed.malformed, report);

        log::info!(
            "customer import: {} processed, {} imported, {} failed, aborted={}",
            outcome.total_rows_processed,
            outcome.imported_count,
            outcome.failed_count,
            outcome.aborted
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::validation::{DUPLICATE_IN_FILE, DUPLICATE_IN_STORE, EMAIL_INVALID};
    use crate::store::InMemoryCustomerStore;

    const HEADER: &str = "name,email,date_of_birth,annual_income\n";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date")
    }

    async fn run(store: &InMemoryCustomerStore, body: &str) -> ImportOutcome {
        CustomerImporter::new(store)
            .with_today(today())
            .import(format!("{HEADER}{body}").as_bytes())
            .await
            .expect("import succeeds")
    }

    #[tokio::test]
    async fn imports_valid_rows() {
        let store = InMemoryCustomerStore::new();
        let outcome = run(
            &store,
            "John Doe,john@x.com,1990-05-12,50000\nJane Smith,jane@x.com,1985-01-01,75000\n",
        )
        .await;

        assert_eq!(outcome.total_rows_processed, 2);
        assert_eq!(outcome.imported_count, 2);
        assert_eq!(outcome.failed_count, 0);
        assert!(!outcome.aborted);
        let names: Vec<&str> = outcome.imported.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["John Doe", "Jane Smith"]);

        let stored = store.customers();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].email, "john@x.com");
        assert_eq!(stored[0].date_of_birth, NaiveDate::from_ymd_opt(1990, 5, 12));
    }

    #[tokio::test]
    async fn in_file_duplicates_fail_both_rows() {
        let store = InMemoryCustomerStore::new();
        let outcome = run(
            &store,
            "First,dup@x.com,1990-01-01,1000\nSecond,DUP@x.com,1991-01-01,2000\n",
        )
        .await;

        assert_eq!(outcome.imported_count, 0);
        assert_eq!(outcome.failed_count, 2);
        for diagnostic in &outcome.errors {
            assert!(diagnostic.messages().contains(&DUPLICATE_IN_FILE));
        }
        assert_eq!(store.insert_attempts(), 0);
    }

    #[tokio::test]
    async fn existing_email_is_rejected_without_insert() {
        let store = InMemoryCustomerStore::with_existing(["taken@x.com"]);
        let outcome = run(&store, "Taken,Taken@X.com,,\nFree,free@x.com,,\n").await;

        assert_eq!(outcome.imported_count, 1);
        assert_eq!(outcome.errors[0].row_number, 2);
        assert_eq!(outcome.errors[0].messages(), vec![DUPLICATE_IN_STORE]);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn malformed_row_does_not_block_others() {
        let store = InMemoryCustomerStore::new();
        let outcome = run(
            &store,
            "Valid One,v1@x.com,1990-01-01,1000\nMalformed,m@x.com\nValid Two,v2@x.com,1991-01-01,2000\n",
        )
        .await;

        assert_eq!(outcome.total_rows_processed, 3);
        assert_eq!(outcome.imported_count, 2);
        assert_eq!(outcome.failed_count, 1);
        assert_eq!(outcome.errors[0].row_number, 3);
        assert_eq!(outcome.errors[0].messages(), vec![parser::MALFORMED_ROW]);
    }

    #[tokio::test]
    async fn errors_follow_file_order_across_kinds() {
        let store = InMemoryCustomerStore::new();
        let outcome = run(
            &store,
            "Bad,bad-email,,\nShort,s@x.com\n,missing@x.com,,\n\nOk,ok@x.com,,\n",
        )
        .await;

        let rows: Vec<u64> = outcome.errors.iter().map(|d| d.row_number).collect();
        assert_eq!(rows, vec![2, 3, 4]);
        assert_eq!(outcome.errors[0].messages(), vec![EMAIL_INVALID]);
        assert_eq!(outcome.total_rows_processed, 4);
        assert_eq!(outcome.imported_count, 1);
    }

    #[tokio::test]
    async fn abort_keeps_earlier_imports_and_marks_the_rest() {
        let store = InMemoryCustomerStore::new().failing_from_insert(2);
        let body: String = (0..5)
            .map(|i| format!("Customer {i},c{i}@x.com,,\n"))
            .collect();

        let outcome = CustomerImporter::new(&store)
            .with_batch_size(2)
            .with_today(today())
            .import(format!("{HEADER}{body}").as_bytes())
            .await
            .expect("import completes");

        assert!(outcome.aborted);
        assert_eq!(outcome.fatal_error.as_deref(), Some(FATAL_STORE_ERROR));
        assert_eq!(outcome.imported_count, 1);
        assert_eq!(outcome.failed_count, 4);
        assert!(
            outcome
                .errors
                .iter()
                .all(|d| d.messages() == vec![FATAL_STORE_ERROR])
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn out_of_range_income_fails_only_its_row() {
        let store = InMemoryCustomerStore::new();
        let outcome = run(
            &store,
            "Huge,huge@x.com,,1e20\nTiny,tiny@x.com,,0.001\nFine,fine@x.com,,1234.567\n",
        )
        .await;

        assert!(!outcome.aborted);
        assert_eq!(outcome.imported_count, 1);
        assert_eq!(outcome.errors[0].messages(), vec![validation::INCOME_TOO_LARGE]);
        assert_eq!(outcome.errors[1].messages(), vec![validation::INCOME_NOT_POSITIVE]);

        let stored = store.customers();
        assert_eq!(stored.len(), 1);
        let income = stored[0].annual_income.as_ref().map(ToString::to_string);
        assert_eq!(income.as_deref(), Some("1234.57"));
    }

    #[tokio::test]
    async fn same_invalid_file_gives_same_diagnostics() {
        let store = InMemoryCustomerStore::new();
        let body = ",bad,2999-01-01,-5\nA,dup@x.com,,\nB,dup@x.com,,\n";

        let first = run(&store, body).await;
        let second = run(&store, body).await;

        assert_eq!(first.errors, second.errors);
    }

    #[tokio::test]
    async fn empty_upload_is_file_invalid() {
        let store = InMemoryCustomerStore::new();
        let err = CustomerImporter::new(&store).import(b"").await.unwrap_err();
        assert!(matches!(err, ImportError::FileInvalid(ref m) if m == error::EMPTY_UPLOAD));
    }

    #[tokio::test]
    async fn prefetch_failure_is_a_store_error() {
        let store = InMemoryCustomerStore::new().failing_lookups();
        let err = CustomerImporter::new(&store)
            .import(format!("{HEADER}A,a@x.com,,\n").as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Store(_)));
    }
}
