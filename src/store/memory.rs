//! In-process [`CustomerStore`] for tests and local experiments.
//!
//! Mirrors the PostgreSQL schema's unique index on `lower(email)` and can be
//! told to start failing at a given insert attempt, which is how the abort
//! path of the import pipeline gets exercised without a database.

use super::{CustomerStore, ImportedCustomer, NewCustomer, StoreError};
use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    customers: Vec<(ImportedCustomer, NewCustomer)>,
    insert_attempts: usize,
    lookups: usize,
}

#[derive(Debug, Default)]
pub struct InMemoryCustomerStore {
    inner: Mutex<Inner>,
    /// 1-based insert attempt from which every insert fails.
    fail_from_attempt: Option<usize>,
    fail_lookups: bool,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with customers that already exist before an import.
    pub fn with_existing<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        {
            let mut inner = store.inner.lock();
            for email in emails {
                let email = email.into();
                inner.next_id += 1;
                let id = inner.next_id;
                let customer = NewCustomer {
                    name: format!("Existing {id}"),
                    email,
                    date_of_birth: None,
                    annual_income: None,
                };
                let summary = ImportedCustomer {
                    id,
                    name: customer.name.clone(),
                };
                inner.customers.push((summary, customer));
            }
        }
        store
    }

    /// Simulate losing the database from the `attempt`-th insert onwards.
    pub fn failing_from_insert(mut self, attempt: usize) -> Self {
        self.fail_from_attempt = Some(attempt.max(1));
        self
    }

    pub fn failing_lookups(mut self) -> Self {
        self.fail_lookups = true;
        self
    }

    /// Snapshot of every stored customer in insertion order.
    pub fn customers(&self) -> Vec<NewCustomer> {
        self.inner
            .lock()
            .customers
            .iter()
            .map(|(_, customer)| customer.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert_attempts(&self) -> usize {
        self.inner.lock().insert_attempts
    }

    pub fn lookup_count(&self) -> usize {
        self.inner.lock().lookups
    }
}

#[rocket::async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn find_existing_emails(
        &self,
        candidates: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        let mut inner = self.inner.lock();
        inner.lookups += 1;

        if self.fail_lookups {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }

        let stored: HashSet<String> = inner
            .customers
            .iter()
            .map(|(_, customer)| customer.email.to_lowercase())
            .collect();

        Ok(candidates
            .iter()
            .map(|email| email.to_lowercase())
            .filter(|email| stored.contains(email))
            .collect())
    }

    async fn insert(&self, customer: &NewCustomer) -> Result<ImportedCustomer, StoreError> {
        let mut inner = self.inner.lock();
        inner.insert_attempts += 1;

        if let Some(from) = self.fail_from_attempt {
            if inner.insert_attempts >= from {
                return Err(StoreError::Unavailable("connection reset by peer".to_string()));
            }
        }

        let email = customer.email.to_lowercase();
        if inner
            .customers
            .iter()
            .any(|(_, stored)| stored.email.to_lowercase() == email)
        {
            return Err(StoreError::Constraint(format!(
                "duplicate key value violates unique constraint on email '{email}'"
            )));
        }

        inner.next_id += 1;
        let summary = ImportedCustomer {
            id: inner.next_id,
            name: customer.name.clone(),
        };
        inner.customers.push((summary.clone(), customer.clone()));

        Ok(summary)
    }
}
