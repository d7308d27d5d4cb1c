use chrono::{DateTime, NaiveDate, Utc};
use rocket_db_pools::sqlx::FromRow;
use rocket_db_pools::sqlx::types::BigDecimal;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ===== Customer Models =====

/// Row of the `customers` table.
#[derive(Debug, Clone, FromRow)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub date_of_birth: Option<NaiveDate>,
    pub annual_income: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
}

/// Customer as rendered by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CustomerResource {
    pub id: i64,
    pub name: String,
    pub email: String,
    /// `YYYY-MM-DD`.
    pub date_of_birth: Option<NaiveDate>,
    /// Decimal string with two fraction digits, e.g. `"50000.00"`.
    pub annual_income: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Customer> for CustomerResource {
    fn from(customer: Customer) -> Self {
        Self {
            id: customer.id,
            name: customer.name,
            email: customer.email,
            date_of_birth: customer.date_of_birth,
            annual_income: customer
                .annual_income
                .map(|income| income.with_scale(2).to_string()),
            created_at: customer.created_at,
        }
    }
}

// ===== Response Envelopes =====

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PageMeta {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

impl PageMeta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        let last_page = if total <= 0 {
            1
        } else {
            (total + per_page - 1) / per_page
        };

        Self {
            page,
            per_page,
            total,
            last_page,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        Self {
            data,
            meta: PageMeta::new(page, per_page, total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn last_page_rounds_up_and_never_drops_below_one() {
        assert_eq!(PageMeta::new(1, 10, 0).last_page, 1);
        assert_eq!(PageMeta::new(1, 10, 10).last_page, 1);
        assert_eq!(PageMeta::new(1, 10, 11).last_page, 2);
    }

    #[test]
    fn income_renders_with_two_decimals() {
        let customer = Customer {
            id: 1,
            name: "John".to_string(),
            email: "john@example.com".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 12),
            annual_income: Some(BigDecimal::from_str("50000").expect("decimal")),
            created_at: Utc::now(),
        };

        let resource = CustomerResource::from(customer);
        assert_eq!(resource.annual_income.as_deref(), Some("50000.00"));

        let json = serde_json::to_value(&resource).expect("serializes");
        assert_eq!(json["date_of_birth"], "1990-05-12");
    }
}
