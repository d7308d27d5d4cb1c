use crate::import::ImportError;
use crate::store::StoreError;
use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use rocket_db_pools::sqlx;
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::Responses;
use rocket_okapi::response::OpenApiResponderInner;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

#[derive(Debug)]
pub enum ApiError {
    /// The file could not be used at all: empty, unreadable or without data rows.
    FileInvalid(String),
    HeaderInvalid(String),
    /// Transport pre-checks: missing field, extension, size.
    UploadInvalid(String),
    DatabaseError(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let (status, error_type, message) = match self {
            ApiError::FileInvalid(msg) => {
                log::debug!("file invalid: {}", msg);
                (Status::UnprocessableEntity, "FileInvalid", msg)
            }
            ApiError::HeaderInvalid(msg) => {
                log::debug!("header invalid: {}", msg);
                (Status::UnprocessableEntity, "HeaderInvalid", msg)
            }
            ApiError::UploadInvalid(msg) => {
                log::debug!("upload invalid: {}", msg);
                (Status::UnprocessableEntity, "UploadInvalid", msg)
            }
            ApiError::DatabaseError(msg) => {
                log::error!("database error: {}", msg);
                (Status::InternalServerError, "DatabaseError", msg)
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message,
        };

        let json = serde_json::to_string(&error_response).unwrap_or_else(|_| {
            r#"{"error":"SerializationError","message":"Failed to serialize error"}"#.to_string()
        });

        Response::build()
            .status(status)
            .header(rocket::http::ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

impl OpenApiResponderInner for ApiError {
    fn responses(_generator: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        Ok(Responses::default())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::DatabaseError(err.to_string())
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::FileInvalid(msg) => ApiError::FileInvalid(msg),
            ImportError::HeaderInvalid(msg) => ApiError::HeaderInvalid(msg),
            ImportError::Store(err) => err.into(),
        }
    }
}
