//! `POST /import`: upload checks in front of the import pipeline.
//!
//! The route is mounted with plain `routes!` rather than through
//! `openapi_get_routes!`, as multipart uploads have no schema in the
//! generated document.

use crate::config::ImportConfig;
use crate::error::ApiError;
use crate::import::{CustomerImporter, ImportOutcome};
use crate::store::CustomerStore;
use rocket::State;
use rocket::form::{self, Form};
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

pub const MISSING_FILE: &str = "Please upload a CSV file.";
pub const WRONG_EXTENSION: &str = "The uploaded file must be a valid CSV file.";

#[derive(FromForm)]
pub struct ImportUpload<'r> {
    pub file: TempFile<'r>,
}

/// Import customers from the uploaded `file` field.
///
/// Row problems are reported in the body of a `200` response; only upload,
/// file and header problems produce an error status.
#[post("/import", data = "<upload>")]
pub async fn import_customers(
    upload: Result<Form<ImportUpload<'_>>, form::Errors<'_>>,
    store: &State<Arc<dyn CustomerStore>>,
    config: &State<ImportConfig>,
) -> Result<Json<ImportOutcome>, ApiError> {
    let upload = upload.map_err(|errors| upload_error(&errors, config))?;

    check_upload(&upload.file, config)?;
    let bytes = read_upload(&upload.file).await?;

    let outcome = CustomerImporter::new(&**store.inner())
        .with_batch_size(config.batch_size)
        .import(&bytes)
        .await?;

    Ok(Json(outcome))
}

fn too_large(config: &ImportConfig) -> ApiError {
    ApiError::UploadInvalid(format!(
        "The CSV file must not exceed {}.",
        config.max_upload_label()
    ))
}

/// A missing `file` field and a file cut off at the size limit both surface
/// as form errors; only the latter gets the size message.
fn upload_error(errors: &form::Errors<'_>, config: &ImportConfig) -> ApiError {
    log::debug!("rejecting upload form: {}", errors);

    let over_limit = errors
        .iter()
        .any(|error| matches!(error.kind, form::error::ErrorKind::InvalidLength { .. }));

    if over_limit {
        too_large(config)
    } else {
        ApiError::UploadInvalid(MISSING_FILE.to_string())
    }
}

fn check_upload(file: &TempFile<'_>, config: &ImportConfig) -> Result<(), ApiError> {
    let extension = upload_extension(file);
    let allowed = extension
        .as_deref()
        .is_some_and(|ext| config.allows_extension(ext));

    if !allowed {
        log::debug!("rejecting upload with extension {:?}", extension);
        return Err(ApiError::UploadInvalid(WRONG_EXTENSION.to_string()));
    }

    if file.len() > config.max_upload_bytes {
        log::debug!(
            "rejecting upload of {} bytes (limit {})",
            file.len(),
            config.max_upload_bytes
        );
        return Err(too_large(config));
    }

    Ok(())
}

/// Extension of the client-supplied file name, falling back to the one
/// implied by the part's content type.
fn upload_extension(file: &TempFile<'_>) -> Option<String> {
    let from_name = file
        .raw_name()
        .map(|name| name.dangerous_unsafe_unsanitized_raw().as_str())
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    from_name.or_else(|| {
        file.content_type()
            .and_then(|content_type| content_type.extension())
            .map(|ext| ext.as_str().to_ascii_lowercase())
    })
}

async fn read_upload(file: &TempFile<'_>) -> Result<Vec<u8>, ApiError> {
    let unreadable = |err: std::io::Error| {
        log::debug!("failed to read upload: {}", err);
        ApiError::FileInvalid(crate::import::error::UNREADABLE_UPLOAD.to_string())
    };

    let reader = file.open().await.map_err(unreadable)?;
    tokio::pin!(reader);

    let mut bytes = Vec::with_capacity(usize::try_from(file.len()).unwrap_or(0));
    reader.read_to_end(&mut bytes).await.map_err(unreadable)?;

    Ok(bytes)
}
