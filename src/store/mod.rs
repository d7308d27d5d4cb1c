//! Customer record store used by the import pipeline.
//!
//! The pipeline only ever needs two things from durable storage: a batched
//! existence lookup by email and a single-row insert. Both are expressed by
//! [`CustomerStore`] so the pipeline runs unchanged against PostgreSQL
//! ([`PgCustomerStore`]) or the in-memory store used by tests
//! ([`InMemoryCustomerStore`]).

pub mod memory;
pub mod postgres;

pub use memory::InMemoryCustomerStore;
pub use postgres::PgCustomerStore;

use chrono::NaiveDate;
use rocket_db_pools::sqlx;
use rocket_db_pools::sqlx::types::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Failures raised by a [`CustomerStore`].
///
/// The import pipeline does not distinguish between variants: any of them
/// during an insert aborts the run.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A validated customer ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCustomer {
    pub name: String,
    /// Already trimmed and lower-cased.
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub annual_income: Option<BigDecimal>,
}

/// Summary of a persisted customer, echoed back in the import response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedCustomer {
    pub id: i64,
    pub name: String,
}

#[rocket::async_trait]
pub trait CustomerStore: Send + Sync {
    /// Return the subset of `candidates` already present, compared
    /// case-insensitively. Returned addresses are lower-cased.
    async fn find_existing_emails(
        &self,
        candidates: &[String],
    ) -> Result<HashSet<String>, StoreError>;

    /// Persist one customer. Each successful call is durable on its own.
    async fn insert(&self, customer: &NewCustomer) -> Result<ImportedCustomer, StoreError>;
}
