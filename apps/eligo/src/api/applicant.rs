//! Applicant handlers. The access token in the path is the only credential.

use super::error::ApiError;
use super::{ApiJson, AppState};
use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use eligo_core::documents::validate_upload;
use eligo_core::{
    AccessToken, Application, ApplicationId, ApplicationStatus, DocumentId, DocumentKind,
    DocumentMeta, EligibilityDetermination, EligoError, IntakeForm, IntakeStep, StepInput,
    ValidationErrors, Verdict,
};
use serde::Serialize;
use tracing::{info, warn};

/// Uniform 404 for unknown, malformed and revoked tokens.
fn unknown_token() -> ApiError {
    ApiError::Core(EligoError::NotFound("application".to_string()))
}

fn load_by_token(state: &AppState, token: &str) -> Result<Application, ApiError> {
    let token = AccessToken::parse(token).ok_or_else(unknown_token)?;
    state
        .store
        .find_by_token(&token.digest())?
        .ok_or_else(unknown_token)
}

// =============================================================================
// VIEWS
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ProgramEntry {
    pub code: String,
    pub name: String,
    pub required_documents: Vec<DocumentKind>,
}

#[derive(Debug, Serialize)]
pub struct StartedApplication {
    pub id: ApplicationId,
    pub reference: String,
    /// Shown once. Only its digest is stored.
    pub token: String,
    pub next_step: Option<IntakeStep>,
}

#[derive(Debug, Serialize)]
pub struct ApplicantDecision {
    pub verdict: Verdict,
    pub note: String,
    pub decided_at: DateTime<Utc>,
}

/// What an applicant sees. Reviewer notes and history are withheld.
#[derive(Debug, Serialize)]
pub struct ApplicantView {
    pub id: ApplicationId,
    pub reference: String,
    pub status: ApplicationStatus,
    pub next_step: Option<IntakeStep>,
    pub completed_steps: Vec<IntakeStep>,
    pub missing_documents: Vec<DocumentKind>,
    pub form: IntakeForm,
    pub documents: Vec<DocumentMeta>,
    pub system_result: Option<EligibilityDetermination>,
    pub decision: Option<ApplicantDecision>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicantView {
    fn build(state: &AppState, app: Application) -> Result<Self, ApiError> {
        let table = state.store.income_limits()?;
        Ok(Self {
            id: app.id,
            reference: app.reference(),
            status: app.status,
            next_step: app.form.next_step(),
            completed_steps: app.form.completed_steps(),
            missing_documents: app.missing_documents(&table),
            decision: app.decision.as_ref().map(|d| ApplicantDecision {
                verdict: d.verdict,
                note: d.note.clone(),
                decided_at: d.decided_at,
            }),
            system_result: app.system_result,
            documents: app.documents,
            form: app.form,
            submitted_at: app.submitted_at,
            updated_at: app.updated_at,
        })
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `GET /api/programs`
pub async fn programs(State(state): State<AppState>) -> Result<Json<Vec<ProgramEntry>>, ApiError> {
    let table = state.store.income_limits()?;
    let entries = table
        .programs
        .iter()
        .map(|(code, limits)| ProgramEntry {
            code: code.to_string(),
            name: limits.name.clone(),
            required_documents: limits.required_documents.clone(),
        })
        .collect();
    Ok(Json(entries))
}

/// `POST /api/applications`
pub async fn start(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state
        .start_limiter
        .check()
        .map_err(|_| ApiError::RateLimited)?;

    let token = AccessToken::generate();
    let app = {
        let _gate = state.write_gate.lock().await;
        state.store.create(&token.digest(), Utc::now())?
    };
    info!(application = %app.reference(), "application started");

    let body = StartedApplication {
        id: app.id,
        reference: app.reference(),
        token: token.as_str().to_string(),
        next_step: app.form.next_step(),
    };
    Ok((StatusCode::CREATED, Json(body)))
}

/// `GET /api/apply/{token}`
pub async fn view(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ApplicantView>, ApiError> {
    let app = load_by_token(&state, &token)?;
    Ok(Json(ApplicantView::build(&state, app)?))
}

/// `PUT /api/apply/{token}/steps/{step}`
pub async fn save_step(
    State(state): State<AppState>,
    Path((token, step)): Path<(String, String)>,
    ApiJson(input): ApiJson<StepInput>,
) -> Result<Json<ApplicantView>, ApiError> {
    let step = IntakeStep::parse(&step)
        .ok_or_else(|| ApiError::Core(EligoError::NotFound(format!("step {step:?}"))))?;
    if input.step() != step {
        return Err(EligoError::Validation(ValidationErrors::single(
            "step",
            format!("body is for {} but the path names {step}", input.step()),
        ))
        .into());
    }

    let app = {
        let _gate = state.write_gate.lock().await;
        let mut app = load_by_token(&state, &token)?;
        let table = state.store.income_limits()?;
        app.save_step(input, &table, Utc::now())?;
        state.store.update(&app)?;
        app
    };
    info!(application = %app.reference(), %step, "intake step saved");
    Ok(Json(ApplicantView::build(&state, app)?))
}

struct Upload {
    kind: DocumentKind,
    file_name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut kind = None;
    let mut file = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "kind" => kind = Some(DocumentKind::parse(field.text().await?.trim())?),
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?.to_vec();
                file = Some((file_name, content_type, bytes));
            }
            _ => {}
        }
    }

    let mut errors = ValidationErrors::new();
    if kind.is_none() {
        errors.add("kind", "is required");
    }
    if file.is_none() {
        errors.add("file", "is required");
    }
    match (kind, file) {
        (Some(kind), Some((file_name, content_type, bytes))) => Ok(Upload {
            kind,
            file_name,
            content_type,
            bytes,
        }),
        _ => Err(EligoError::Validation(errors).into()),
    }
}

/// `POST /api/apply/{token}/documents` (multipart `kind` + `file`)
pub async fn upload_document(
    State(state): State<AppState>,
    Path(token): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = read_upload(multipart).await?;
    let content_type = validate_upload(
        upload.content_type.as_deref(),
        &upload.bytes,
        state.config.max_upload_bytes,
    )?;

    let _gate = state.write_gate.lock().await;
    let mut app = load_by_token(&state, &token)?;
    let now = Utc::now();
    let meta = DocumentMeta::new(
        app.peek_document_id(),
        upload.kind,
        &upload.file_name,
        content_type,
        &upload.bytes,
        now,
    );
    app.attach_document(meta.clone(), state.config.max_documents_per_application, now)?;

    state.uploads.write(app.id, &meta, &upload.bytes).await?;
    if let Err(err) = state.store.update(&app) {
        if let Err(cleanup) = state.uploads.remove(app.id, &meta).await {
            warn!(error = %cleanup, "failed to remove orphaned upload");
        }
        return Err(err.into());
    }
    info!(
        application = %app.reference(),
        document = %meta.id,
        kind = %meta.kind,
        size = meta.size_bytes,
        "document uploaded"
    );
    Ok((StatusCode::CREATED, Json(meta)))
}

/// `DELETE /api/apply/{token}/documents/{doc_id}`
pub async fn remove_document(
    State(state): State<AppState>,
    Path((token, doc_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let doc_id = doc_id
        .parse::<u64>()
        .map(DocumentId)
        .map_err(|_| ApiError::Core(EligoError::NotFound(format!("document {doc_id:?}"))))?;

    let _gate = state.write_gate.lock().await;
    let mut app = load_by_token(&state, &token)?;
    let meta = app.remove_document(doc_id, Utc::now())?;
    state.store.update(&app)?;
    if let Err(err) = state.uploads.remove(app.id, &meta).await {
        warn!(
            application = %app.reference(),
            document = %meta.id,
            error = %err,
            "failed to remove detached upload"
        );
    }
    info!(application = %app.reference(), document = %meta.id, "document removed");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/apply/{token}/submit`
pub async fn submit(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<EligibilityDetermination>, ApiError> {
    let _gate = state.write_gate.lock().await;
    let mut app = load_by_token(&state, &token)?;
    let table = state.store.income_limits()?;
    let determination = app.submit(&table, Utc::now())?.clone();
    state.store.update(&app)?;
    info!(
        application = %app.reference(),
        program = %determination.program,
        outcome = %determination.outcome,
        "application submitted"
    );
    Ok(Json(determination))
}
