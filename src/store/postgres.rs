//! PostgreSQL-backed [`CustomerStore`].

use super::{CustomerStore, ImportedCustomer, NewCustomer, StoreError};
use rocket_db_pools::sqlx::{self, PgPool};
use std::collections::HashSet;

/// Customer store over a shared connection pool.
///
/// Inserts run as individual autocommit statements, so every imported row is
/// durable as soon as `insert` returns.
#[derive(Clone)]
pub struct PgCustomerStore {
    pool: PgPool,
}

impl PgCustomerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl CustomerStore for PgCustomerStore {
    async fn find_existing_emails(
        &self,
        candidates: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        if candidates.is_empty() {
            return Ok(HashSet::new());
        }

        let lowered: Vec<String> = candidates.iter().map(|email| email.to_lowercase()).collect();

        let existing: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT lower(email) FROM customers WHERE lower(email) = ANY($1)",
        )
        .bind(&lowered)
        .fetch_all(&self.pool)
        .await?;

        log::debug!(
            "email lookup: {} candidates, {} already stored",
            lowered.len(),
            existing.len()
        );

        Ok(existing.into_iter().collect())
    }

    async fn insert(&self, customer: &NewCustomer) -> Result<ImportedCustomer, StoreError> {
        let (id, name): (i64, String) = sqlx::query_as(
            r#"INSERT INTO customers (name, email, date_of_birth, annual_income)
               VALUES ($1, $2, $3, $4)
               RETURNING id, name"#,
        )
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(customer.date_of_birth)
        .bind(customer.annual_income.clone())
        .fetch_one(&self.pool)
        .await?;

        Ok(ImportedCustomer { id, name })
    }
}
