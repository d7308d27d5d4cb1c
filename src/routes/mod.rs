//! HTTP route handlers.
//!
//! JSON endpoints are annotated with `#[openapi]` so `rocket_okapi` can
//! derive the OpenAPI document; the multipart import endpoint is mounted
//! alongside them without documentation.

pub mod customers;
pub mod health;
pub mod import;
pub mod params;
