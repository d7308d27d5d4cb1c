use crate::store::StoreError;
use thiserror::Error;

pub type ImportResult<T> = Result<T, ImportError>;

pub const EMPTY_UPLOAD: &str = "The uploaded file is empty.";
pub const UNREADABLE_UPLOAD: &str = "Unable to read the uploaded file.";
pub const NO_FIRST_RECORD: &str = "The CSV file appears to be empty or invalid.";
pub const HEADERS_ONLY: &str = "The CSV file contains only headers and no data.";
pub const INVALID_HEADER: &str =
    "Invalid CSV header. Expected: name,email,date_of_birth,annual_income";

/// File-level failures that reject an import before any row is reported.
///
/// Row-level problems never surface here; they are collected as
/// diagnostics in the [`ImportOutcome`](super::ImportOutcome).
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("{0}")]
    FileInvalid(String),
    #[error("{0}")]
    HeaderInvalid(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ImportError {
    pub fn file_invalid(message: &str) -> Self {
        ImportError::FileInvalid(message.to_string())
    }

    pub fn header_invalid() -> Self {
        ImportError::HeaderInvalid(INVALID_HEADER.to_string())
    }
}
