//! Per-row field rules and duplicate checks.
//!
//! Each rule inspects one aspect of a row and yields at most one
//! [`FieldError`]. The duplicate rules only run for rows whose email passed
//! its own format rule, so a malformed address is never also reported as a
//! duplicate.

use crate::import::duplicates::DuplicateIndex;
use crate::import::outcome::{FieldError, dedupe_errors};
use crate::import::parser::RowFields;
use crate::store::NewCustomer;
use chrono::{DateTime, NaiveDate, Utc};
use rocket_db_pools::sqlx::types::BigDecimal;
use std::str::FromStr;
use validator::ValidateEmail;

pub const NAME_REQUIRED: &str = "Name is required.";
pub const EMAIL_REQUIRED: &str = "Email is required.";
pub const EMAIL_INVALID: &str = "Email must be a valid email address.";
pub const DATE_INVALID: &str = "Date of birth must be a valid date.";
pub const DATE_IN_FUTURE: &str = "Date of birth must not be in the future.";
pub const INCOME_NOT_NUMERIC: &str = "Annual income must be a number.";
pub const INCOME_NOT_POSITIVE: &str = "Annual income must be a positive number.";
pub const INCOME_TOO_LARGE: &str = "Annual income must be less than 10000000000000.";
pub const DUPLICATE_IN_FILE: &str = "Duplicate email found within the same file.";
pub const DUPLICATE_IN_STORE: &str = "Email already exists.";

/// `annual_income` is stored as `NUMERIC(15, 2)`.
const INCOME_SCALE: i64 = 2;
const INCOME_MAX_INTEGER_DIGITS: i64 = 13;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%m/%d/%Y", "%B %d, %Y", "%d %B %Y"];

/// Validates rows against the field rules and the shared duplicate index.
///
/// A birth date equal to `today` is accepted.
#[derive(Debug, Clone, Copy)]
pub struct RowValidator {
    today: NaiveDate,
}

impl Default for RowValidator {
    fn default() -> Self {
        Self::new(Utc::now().date_naive())
    }
}

impl RowValidator {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// Every problem with `fields`, without repeated `(field, message)` pairs.
    /// An empty result means the row may be persisted.
    pub fn validate(&self, fields: &RowFields, index: &DuplicateIndex) -> Vec<FieldError> {
        let email_error = check_email(fields);
        let email_usable = email_error.is_none();

        let mut errors: Vec<FieldError> = [
            check_name(fields),
            email_error,
            check_date_of_birth(fields, self.today),
            check_annual_income(fields),
        ]
        .into_iter()
        .flatten()
        .collect();

        if email_usable {
            errors.extend(check_duplicate_in_file(fields, index));
            errors.extend(check_duplicate_in_store(fields, index));
        }

        dedupe_errors(errors)
    }
}

fn check_name(fields: &RowFields) -> Option<FieldError> {
    fields
        .name
        .is_empty()
        .then(|| FieldError::new("name", NAME_REQUIRED))
}

fn check_email(fields: &RowFields) -> Option<FieldError> {
    if fields.email.is_empty() {
        Some(FieldError::new("email", EMAIL_REQUIRED))
    } else if !fields.email.validate_email() {
        Some(FieldError::new("email", EMAIL_INVALID))
    } else {
        None
    }
}

fn check_date_of_birth(fields: &RowFields, today: NaiveDate) -> Option<FieldError> {
    let raw = fields.date_of_birth.as_deref()?;
    match parse_date(raw) {
        None => Some(FieldError::new("date_of_birth", DATE_INVALID)),
        Some(date) if date > today => Some(FieldError::new("date_of_birth", DATE_IN_FUTURE)),
        Some(_) => None,
    }
}

fn check_annual_income(fields: &RowFields) -> Option<FieldError> {
    let raw = fields.annual_income.as_deref()?;
    parse_income(raw)
        .err()
        .map(|message| FieldError::new("annual_income", message))
}

fn check_duplicate_in_file(fields: &RowFields, index: &DuplicateIndex) -> Option<FieldError> {
    index
        .is_repeated_in_file(&fields.email)
        .then(|| FieldError::new("email", DUPLICATE_IN_FILE))
}

fn check_duplicate_in_store(fields: &RowFields, index: &DuplicateIndex) -> Option<FieldError> {
    index
        .exists_in_store(&fields.email)
        .then(|| FieldError::new("email", DUPLICATE_IN_STORE))
}

/// Parse a calendar date in one of the accepted layouts.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Parse an income and round it to the stored scale.
///
/// The magnitude is checked on the digits before any arithmetic, so an
/// exponent like `1e999999999` is rejected without being expanded.
pub fn parse_income(raw: &str) -> Result<BigDecimal, &'static str> {
    let income = BigDecimal::from_str(raw.trim()).map_err(|_| INCOME_NOT_NUMERIC)?;

    let (digits, scale) = income.as_bigint_and_exponent();
    let digits = digits.to_string();
    if digits == "0" || digits.starts_with('-') {
        return Err(INCOME_NOT_POSITIVE);
    }

    let integer_digits = i64::try_from(digits.len()).unwrap_or(i64::MAX) - scale;
    if integer_digits > INCOME_MAX_INTEGER_DIGITS {
        return Err(INCOME_TOO_LARGE);
    }
    if integer_digits < -INCOME_SCALE {
        return Err(INCOME_NOT_POSITIVE);
    }

    let income = income.round(INCOME_SCALE);
    if income <= BigDecimal::from(0) {
        Err(INCOME_NOT_POSITIVE)
    } else if income >= BigDecimal::from(10_000_000_000_000i64) {
        Err(INCOME_TOO_LARGE)
    } else {
        Ok(income)
    }
}

/// Typed record for a row that passed validation.
pub fn to_new_customer(fields: &RowFields) -> NewCustomer {
    NewCustomer {
        name: fields.name.clone(),
        email: fields.email.clone(),
        date_of_birth: fields.date_of_birth.as_deref().and_then(parse_date),
        annual_income: fields
            .annual_income
            .as_deref()
            .and_then(|raw| parse_income(raw).ok()),
    }
}
