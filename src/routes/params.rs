//! Query parameters accepted by the customer listing endpoint.

use crate::config::CustomerListConfig;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const fn default_page() -> i64 {
    1
}

/// Pagination for `GET /customers`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, rocket::form::FromForm)]
pub struct CustomerListParams {
    /// One-based page index (defaults to the first page).
    #[serde(default)]
    pub page: Option<i64>,
    /// Customers per page (defaults to 10, clamped between 1 and 50).
    #[serde(default)]
    pub per_page: Option<i64>,
}

impl CustomerListParams {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or_else(default_page).max(1)
    }

    pub fn per_page(&self, config: &CustomerListConfig) -> i64 {
        self.per_page
            .unwrap_or(config.default_per_page)
            .clamp(1, config.max_per_page)
    }

    pub fn offset(&self, config: &CustomerListConfig) -> i64 {
        (self.page() - 1).saturating_mul(self.per_page(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::form::Form;

    #[test]
    fn defaults_apply_when_absent() {
        let config = CustomerListConfig::default();
        let parsed: CustomerListParams = Form::parse("").unwrap();

        assert_eq!(parsed.page(), 1);
        assert_eq!(parsed.per_page(&config), 10);
        assert_eq!(parsed.offset(&config), 0);
    }

    #[test]
    fn values_are_clamped() {
        let config = CustomerListConfig::default();

        let parsed: CustomerListParams = Form::parse("page=0&per_page=500").unwrap();
        assert_eq!(parsed.page(), 1);
        assert_eq!(parsed.per_page(&config), 50);

        let parsed: CustomerListParams = Form::parse("page=3&per_page=0").unwrap();
        assert_eq!(parsed.per_page(&config), 1);
        assert_eq!(parsed.offset(&config), 2);
    }
}
