use crate::AppState;
use crate::api::error::AppError;
use crate::config::EXAMPLE_EXCEL_NAME;
use crate::models::{BenefitPage, BenefitResponse, InsertionScript, Page, UploadDescription};
use crate::services::staging::StagedUpload;
use crate::utils::validation::{ValidationError, validate_upload};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Multipart, Query, State, multipart::MultipartError, rejection::QueryRejection},
    http::{StatusCode, header},
    response::Response,
};
use chrono::Utc;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::info;
use utoipa::ToSchema;

use super::types::{BenefitsQuery, UploadQuery};

pub const XLSX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Multipart form accepted by the upload endpoint.
#[derive(Deserialize, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The benefits Excel (.xlsx)
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

struct UploadedFile {
    filename: String,
    content: Bytes,
}

fn multipart_error(e: MultipartError) -> AppError {
    let err_msg = e.to_string();
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE || err_msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        ValidationError::new("INVALID_MULTIPART", err_msg).into()
    }
}

/// Pulls exactly one `file` part out of the form; other parts are skipped.
async fn read_single_file(multipart: &mut Multipart) -> Result<UploadedFile, AppError> {
    let mut upload: Option<UploadedFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        if upload.is_some() {
            return Err(ValidationError::multiple_files().into());
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(ValidationError::missing_file)?;
        let content = field.bytes().await.map_err(multipart_error)?;
        upload = Some(UploadedFile { filename, content });
    }

    upload.ok_or_else(|| ValidationError::missing_file().into())
}

#[utoipa::path(
    post,
    path = "/create/benefits/upload",
    tag = "Uploads",
    params(UploadQuery),
    request_body(content = UploadForm, content_type = "multipart/form-data", description = "Excel file with benefits data"),
    responses(
        (status = 200, description = "SQL insertions for the ERP interface", body = InsertionScript),
        (status = 400, description = "Invalid file or environment"),
        (status = 413, description = "File too large"),
        (status = 500, description = "The insertion routine failed")
    )
)]
pub async fn upload_benefits_file(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<InsertionScript>, AppError> {
    let upload = match read_single_file(&mut multipart).await {
        Ok(upload) => upload,
        Err(e) => {
            // Drain the remaining body before replying.
            tracing::warn!("Upload rejected early: {}. Consuming remaining stream...", e);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            return Err(e);
        }
    };

    let environment = validate_upload(&upload.filename, &query.environment)?;

    info!(
        "📥 Benefits upload '{}' ({} bytes) for {}",
        upload.filename,
        upload.content.len(),
        environment
    );

    let mut staged = StagedUpload::stage(
        &state.staging_locks,
        &state.config.temp_path,
        &upload.filename,
        &upload.content,
    )
    .await?;

    let description = UploadDescription {
        environment,
        filename: upload.filename,
        path: staged.path().to_path_buf(),
    };
    let result = state
        .benefits_upload
        .erp_interface_insertions(&description)
        .await;

    staged.remove().await;
    drop(staged);
    state.staging_locks.prune();

    let script = result.map_err(|e| AppError::service(module_path!(), e))?;
    Ok(Json(script))
}

#[utoipa::path(
    get,
    path = "/benefits/example/excel",
    tag = "Example Excel benefits",
    responses(
        (status = 200, description = "Template Excel for the benefits data load", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 404, description = "The example Excel is not installed")
    )
)]
pub async fn get_benefit_excel(State(state): State<AppState>) -> Result<Response, AppError> {
    let path = state.config.example_excel_path();

    let size = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => {
            tracing::warn!("Example Excel not found at {}", path.display());
            return Err(AppError::NotFound(
                "The Excel doesn't exists. Please, contact to the administrator".to_string(),
            ));
        }
    };

    let file = tokio::fs::File::open(&path).await?;
    let content_disposition = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        EXAMPLE_EXCEL_NAME,
        utf8_percent_encode(EXAMPLE_EXCEL_NAME, NON_ALPHANUMERIC)
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, XLSX_MEDIA_TYPE)
        .header(header::CONTENT_LENGTH, size)
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::Internal(format!("Failed to build file response: {}", e)))
}

#[utoipa::path(
    get,
    path = "/benefits",
    tag = "ORMA_BENEFITS",
    params(BenefitsQuery),
    responses(
        (status = 200, description = "One page of benefits", body = BenefitPage),
        (status = 400, description = "Invalid filter or pagination")
    )
)]
pub async fn get_benefits(
    State(state): State<AppState>,
    query: Result<Query<BenefitsQuery>, QueryRejection>,
) -> Result<Json<Page<BenefitResponse>>, AppError> {
    let Query(query) =
        query.map_err(|e| ValidationError::new("INVALID_QUERY", e.body_text()))?;

    // "now" is taken per request, never cached.
    let filter = query.into_filter(Utc::now(), state.config.max_page_size)?;

    let page = state
        .benefits
        .benefits(&filter)
        .await
        .map_err(|e| AppError::service(module_path!(), e))?;

    Ok(Json(page))
}
