use crate::config::CustomerListConfig;
use crate::error::ApiError;
use crate::models::{Customer, CustomerResource, PaginatedResponse};
use crate::routes::params::CustomerListParams;
use rocket::State;
use rocket::serde::json::Json;
use rocket_db_pools::sqlx::{self, PgPool};
use rocket_okapi::openapi;

/// List imported customers, newest first.
///
/// `per_page` defaults to 10 and is clamped between 1 and 50; `page` is
/// one-based. Pages past the end return an empty `data` array.
#[openapi(tag = "Customers")]
#[get("/customers?<params..>")]
pub async fn list_customers(
    pool: &State<PgPool>,
    config: &State<CustomerListConfig>,
    params: Option<CustomerListParams>,
) -> Result<Json<PaginatedResponse<CustomerResource>>, ApiError> {
    let params = params.unwrap_or_default();
    let page = params.page();
    let per_page = params.per_page(config);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
        .fetch_one(pool.inner())
        .await?;

    let customers: Vec<Customer> = sqlx::query_as(
        r#"SELECT id, name, email, date_of_birth, annual_income, created_at
           FROM customers
           ORDER BY id DESC
           LIMIT $1 OFFSET $2"#,
    )
    .bind(per_page)
    .bind(params.offset(config))
    .fetch_all(pool.inner())
    .await?;

    let data = customers.into_iter().map(CustomerResource::from).collect();

    Ok(Json(PaginatedResponse::new(data, page, per_page, total)))
}
