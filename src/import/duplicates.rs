//! Duplicate email detection, within the file and against the store.

use crate::import::parser::ParsedRow;
use crate::store::{CustomerStore, StoreError};
use std::collections::{BTreeMap, HashSet};

/// Emails that collide with another row of the same file (`in_file`) or
/// with a stored customer (`in_store`).
///
/// Built once per import. Only `in_store` changes afterwards, as rows get
/// persisted during the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateIndex {
    in_file: HashSet<String>,
    in_store: HashSet<String>,
}

impl DuplicateIndex {
    /// Count emails across `rows` and look the distinct ones up in a single
    /// store round trip.
    pub async fn build<S>(rows: &[ParsedRow], store: &S) -> Result<Self, StoreError>
    where
        S: CustomerStore + ?Sized,
    {
        let counts = email_frequencies(rows);

        let in_file: HashSet<String> = counts
            .iter()
            .filter(|(_, count)| **count > 1)
            .map(|(email, _)| email.to_string())
            .collect();

        let distinct: Vec<String> = counts.keys().map(|email| email.to_string()).collect();
        let in_store = if distinct.is_empty() {
            HashSet::new()
        } else {
            store
                .find_existing_emails(&distinct)
                .await?
                .into_iter()
                .map(|email| email.to_lowercase())
                .collect()
        };

        log::debug!(
            "duplicate index: {} distinct emails, {} repeated in file, {} already stored",
            distinct.len(),
            in_file.len(),
            in_store.len()
        );

        Ok(Self { in_file, in_store })
    }

    pub fn from_sets<I, J>(in_file: I, in_store: J) -> Self
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
    {
        Self {
            in_file: in_file.into_iter().collect(),
            in_store: in_store.into_iter().collect(),
        }
    }

    pub fn is_repeated_in_file(&self, email: &str) -> bool {
        self.in_file.contains(email)
    }

    pub fn exists_in_store(&self, email: &str) -> bool {
        self.in_store.contains(email)
    }

    /// Mark `email` as stored so later rows of the run see the conflict.
    pub fn record_imported(&mut self, email: &str) {
        if !email.is_empty() {
            self.in_store.insert(email.to_string());
        }
    }
}

/// Occurrences of each non-empty email, ordered for a stable lookup query.
fn email_frequencies(rows: &[ParsedRow]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for row in rows {
        let email = row.fields.email.as_str();
        if !email.is_empty() {
            *counts.entry(email).or_insert(0) += 1;
        }
    }
    counts
}
