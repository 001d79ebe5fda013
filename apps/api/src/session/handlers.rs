//! Axum route handlers for the Session API.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{AppError, NO_FILE_MESSAGE};
use crate::export::{render_html, render_pdf};
use crate::session::models::{OutputStatus, ProcessingConfig, ResumeRecord, ResumeSummary};
use crate::session::submit::{start_submission, SubmissionEvent};
use crate::state::AppState;

const FILE_FIELD: &str = "file";
const PDF_CONTENT_TYPE: &str = "application/pdf";
const EXPORT_FILE_NAME: &str = "resume.pdf";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ResumeListResponse {
    pub resumes: Vec<ResumeSummary>,
    /// Uploaded parts that were not PDFs.
    pub skipped: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct OutputResponse {
    pub status: OutputStatus,
    pub reasoning: String,
    pub content: String,
    pub html: String,
    pub error: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session_id = state.sessions.create().await;
    info!("Created session {session_id}");
    (StatusCode::CREATED, Json(CreateSessionResponse { session_id }))
}

/// DELETE /api/v1/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove(session_id).await?;
    info!("Ended session {session_id}");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/sessions/:id/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ResumeListResponse>, AppError> {
    let resumes = state.sessions.list_resumes(session_id).await?;
    Ok(Json(ResumeListResponse {
        resumes,
        skipped: Vec::new(),
    }))
}

/// POST /api/v1/sessions/:id/resumes
///
/// Every `file` part that is a PDF becomes a record, in the order received.
pub async fn handle_upload_resumes(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ResumeListResponse>), AppError> {
    let mut records = Vec::new();
    let mut skipped = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let name = field.file_name().unwrap_or("resume.pdf").to_string();
        let is_pdf = field.content_type() == Some(PDF_CONTENT_TYPE)
            || name.to_ascii_lowercase().ends_with(".pdf");
        if !is_pdf {
            warn!("Skipping non-PDF upload '{name}'");
            skipped.push(name);
            continue;
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid file: {e}")))?;
        records.push(ResumeRecord::new(name, data));
    }

    if records.is_empty() {
        return Err(AppError::Validation(NO_FILE_MESSAGE.to_string()));
    }

    info!("Session {session_id}: uploaded {} resume(s)", records.len());
    let resumes = state.sessions.add_resumes(session_id, records).await?;
    Ok((
        StatusCode::CREATED,
        Json(ResumeListResponse { resumes, skipped }),
    ))
}

/// DELETE /api/v1/sessions/:id/resumes/:resume_id
pub async fn handle_delete_resume(
    State(state): State<AppState>,
    Path((session_id, resume_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.sessions.remove_resume(session_id, resume_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/sessions/:id/config
pub async fn handle_get_config(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ProcessingConfig>, AppError> {
    Ok(Json(state.sessions.config(session_id).await?))
}

/// PUT /api/v1/sessions/:id/config
pub async fn handle_put_config(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(config): Json<ProcessingConfig>,
) -> Result<Json<ProcessingConfig>, AppError> {
    state.sessions.set_config(session_id, config.clone()).await?;
    Ok(Json(config))
}

/// POST /api/v1/sessions/:id/submit
///
/// Extracts all résumés, then streams the rewrite as server-sent events:
/// `reasoning` and `content` carry `{text}`, `error` carries `{error}`,
/// `done` closes a successful run.
pub async fn handle_submit(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let events = start_submission(&state, session_id).await?;

    let stream = UnboundedReceiverStream::new(events).map(SubmissionEvent::into_sse);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// GET /api/v1/sessions/:id/output
pub async fn handle_get_output(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<OutputResponse>, AppError> {
    let output = state.sessions.output(session_id).await?;
    Ok(Json(OutputResponse {
        status: output.status,
        html: render_html(&output.content),
        reasoning: output.reasoning,
        content: output.content,
        error: output.error,
    }))
}

/// GET /api/v1/sessions/:id/export
///
/// Lays out the current final text as a US-letter PDF download.
pub async fn handle_export(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let output = state.sessions.output(session_id).await?;
    if output.status != OutputStatus::Completed || output.content.trim().is_empty() {
        return Err(AppError::Validation(
            "Nothing to export until a submission has completed".to_string(),
        ));
    }

    let bytes = tokio::task::spawn_blocking(move || render_pdf(&output.content, "Resume"))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("PDF export worker failed: {e}")))??;

    Ok((
        [
            (header::CONTENT_TYPE, PDF_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILE_NAME}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}
