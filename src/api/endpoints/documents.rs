//! Document submission, status polling, retry and deletion.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use base64::Engine;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, DocumentView, RetryResponse, SubmitRequest, SubmitResponse};
use crate::models::DocumentId;

/// `POST /api/documents`: create a Pending document and enqueue it.
///
/// Returns 202 immediately; clients poll `GET /api/documents/:id`.
pub async fn submit(
    State(ctx): State<ApiContext>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmitResponse>), ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let payload = decode_data_url(&request.content_base64)
        .map_err(|e| ApiError::BadRequest(format!("Invalid document content: {e}")))?;

    let doc = ctx.core.orchestrator().submit(
        &request.owner_id,
        request.document_type.as_deref(),
        payload,
    )?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            document_id: doc.id,
            status: doc.status,
        }),
    ))
}

/// `GET /api/documents/:id`: latest persisted snapshot. Read-only.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<DocumentView>, ApiError> {
    let id = parse_id(&id)?;
    let doc = ctx
        .core
        .documents()
        .get_by_id(id)?
        .ok_or_else(|| ApiError::NotFound(format!("Document {id} not found")))?;
    Ok(Json(doc.into()))
}

/// `POST /api/documents/:id/retry`
pub async fn retry(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<RetryResponse>), ApiError> {
    let id = parse_id(&id)?;
    let outcome = ctx.core.retry_controller().retry(id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(RetryResponse {
            document_id: id,
            outcome: outcome.as_str().to_string(),
        }),
    ))
}

/// `DELETE /api/documents/:id`: hard delete.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    ctx.core.documents().delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/owners/:owner_id/documents`: newest first.
pub async fn list_by_owner(
    State(ctx): State<ApiContext>,
    Path(owner_id): Path<String>,
) -> Result<Json<Vec<DocumentView>>, ApiError> {
    let docs = ctx.core.documents().list_by_owner(&owner_id)?;
    Ok(Json(docs.into_iter().map(DocumentView::from).collect()))
}

fn parse_id(raw: &str) -> Result<DocumentId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid document id: {raw}")))
}

/// Decode a base64 data URL (or bare base64) into raw bytes.
fn decode_data_url(data_url: &str) -> Result<Vec<u8>, String> {
    let base64_data = match data_url.find(',') {
        Some(idx) => &data_url[idx + 1..],
        None => data_url,
    };

    base64::engine::general_purpose::STANDARD
        .decode(base64_data.trim())
        .map_err(|e| format!("Base64 decode failed: {e}"))
}
