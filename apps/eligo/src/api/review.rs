//! Reviewer handlers. All except login require a [`ReviewerSession`].

use super::error::ApiError;
use super::session::{ReviewerSession, SESSION_COOKIE, clear_cookie, cookie_value, session_cookie};
use super::{ApiJson, ApiQuery, AppState};
use crate::config::Role;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE, SET_COOKIE, X_CONTENT_TYPE_OPTIONS};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use eligo_core::export::export_csv;
use eligo_core::{
    Application, ApplicationFilter, ApplicationId, ApplicationSummary, Decision, DocumentId,
    EligoError, IncomeLimitTable, Page, StatusCounts,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// =============================================================================
// HELPERS
// =============================================================================

fn parse_application_id(raw: &str) -> Result<ApplicationId, ApiError> {
    raw.trim_start_matches("APP-")
        .parse::<u64>()
        .map(ApplicationId)
        .map_err(|_| EligoError::NotFound(format!("application {raw:?}")).into())
}

fn load(state: &AppState, id: ApplicationId) -> Result<Application, ApiError> {
    state
        .store
        .get(id)?
        .ok_or_else(|| EligoError::NotFound(format!("application {id}")).into())
}

/// Load, change and store one application under the write gate.
async fn mutate<F>(state: &AppState, raw_id: &str, change: F) -> Result<Application, ApiError>
where
    F: FnOnce(&mut Application, &IncomeLimitTable, DateTime<Utc>) -> eligo_core::Result<()>,
{
    let id = parse_application_id(raw_id)?;
    let _gate = state.write_gate.lock().await;
    let mut app = load(state, id)?;
    let table = state.store.income_limits()?;
    change(&mut app, &table, Utc::now())?;
    state.store.update(&app)?;
    Ok(app)
}

// =============================================================================
// AUTH
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct ReviewerProfile {
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// `POST /api/review/login`
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let attempted = req.username.trim().to_ascii_lowercase();
    let account = state.config.reviewer(&req.username);
    // Unknown usernames share one bucket so the keyed map stays bounded.
    let key = account
        .map(|a| a.username.to_ascii_lowercase())
        .unwrap_or_default();
    state.login_limiter.retain_recent();
    if state.login_limiter.check_key(&key).is_err() {
        warn!(username = %attempted, "login rate limited");
        return Err(ApiError::RateLimited);
    }

    let Some(account) = account.filter(|a| a.verify_password(&req.password)) else {
        warn!(username = %attempted, "login failed");
        return Err(ApiError::InvalidCredentials);
    };

    let (token, session) = state.sessions.create(account, Utc::now()).await;
    info!(username = %session.username, role = session.role.as_str(), "reviewer signed in");

    let cookie = session_cookie(
        token.as_str(),
        state.sessions.ttl_seconds(),
        state.config.secure_cookies,
    );
    let profile = ReviewerProfile {
        username: session.username,
        display_name: session.display_name,
        role: session.role,
        expires_at: session.expires_at,
    };
    let mut resp = Json(profile).into_response();
    resp.headers_mut().insert(
        SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(|e| ApiError::bad_request(e.to_string()))?,
    );
    Ok(resp)
}

/// `POST /api/review/logout`
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(id) = cookie_value(&headers, SESSION_COOKIE) {
        if let Some(session) = state.sessions.revoke(id).await {
            info!(username = %session.username, "reviewer signed out");
        }
    }
    let mut resp = StatusCode::NO_CONTENT.into_response();
    if let Ok(value) = HeaderValue::from_str(&clear_cookie(state.config.secure_cookies)) {
        resp.headers_mut().insert(SET_COOKIE, value);
    }
    resp
}

/// `GET /api/review/me`
pub async fn me(ReviewerSession(session): ReviewerSession) -> Json<ReviewerProfile> {
    Json(ReviewerProfile {
        username: session.username,
        display_name: session.display_name,
        role: session.role,
        expires_at: session.expires_at,
    })
}

// =============================================================================
// BROWSING
// =============================================================================

/// `GET /api/review/applications`
pub async fn list(
    State(state): State<AppState>,
    _session: ReviewerSession,
    ApiQuery(filter): ApiQuery<ApplicationFilter>,
) -> Result<Json<Page<ApplicationSummary>>, ApiError> {
    let apps = state.store.list()?;
    Ok(Json(filter.paginate(&apps)))
}

/// `GET /api/review/dashboard`
pub async fn dashboard(
    State(state): State<AppState>,
    _session: ReviewerSession,
) -> Result<Json<StatusCounts>, ApiError> {
    let apps = state.store.list()?;
    Ok(Json(StatusCounts::tally(&apps)))
}

/// `GET /api/review/applications/{id}`
pub async fn detail(
    State(state): State<AppState>,
    _session: ReviewerSession,
    Path(id): Path<String>,
) -> Result<Json<Application>, ApiError> {
    let id = parse_application_id(&id)?;
    Ok(Json(load(&state, id)?))
}

/// `GET /api/review/applications/{id}/documents/{doc_id}`
pub async fn download_document(
    State(state): State<AppState>,
    ReviewerSession(session): ReviewerSession,
    Path((id, doc_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let app = load(&state, parse_application_id(&id)?)?;
    let meta = doc_id
        .parse::<u64>()
        .ok()
        .and_then(|d| app.document(DocumentId(d)))
        .ok_or_else(|| EligoError::NotFound(format!("document {doc_id:?}")))?;
    let bytes = state.uploads.read(app.id, meta).await?;
    info!(
        application = %app.reference(),
        document = %meta.id,
        reviewer = %session.username,
        "document downloaded"
    );

    let disposition = format!("attachment; filename=\"{}\"", meta.original_name);
    let headers = [
        (
            CONTENT_TYPE,
            HeaderValue::from_str(&meta.content_type)
                .unwrap_or(HeaderValue::from_static("application/octet-stream")),
        ),
        (
            CONTENT_DISPOSITION,
            HeaderValue::from_str(&disposition)
                .unwrap_or(HeaderValue::from_static("attachment")),
        ),
        (X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
    ];
    Ok((headers, bytes).into_response())
}

/// `GET /api/review/export.csv`
pub async fn export(
    State(state): State<AppState>,
    ReviewerSession(session): ReviewerSession,
    ApiQuery(filter): ApiQuery<ApplicationFilter>,
) -> Result<Response, ApiError> {
    let apps = state.store.list()?;
    let matched = filter.apply(&apps);
    let rows = matched.len();
    let csv = export_csv(matched);
    info!(reviewer = %session.username, rows, "applications exported");
    let headers = [
        (CONTENT_TYPE, HeaderValue::from_static("text/csv; charset=utf-8")),
        (
            CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"applications.csv\""),
        ),
    ];
    Ok((headers, csv).into_response())
}

// =============================================================================
// WORKFLOW
// =============================================================================

/// `POST /api/review/applications/{id}/claim`
pub async fn claim(
    State(state): State<AppState>,
    ReviewerSession(session): ReviewerSession,
    Path(id): Path<String>,
) -> Result<Json<Application>, ApiError> {
    let app = mutate(&state, &id, |app, _, now| app.claim(&session.username, now)).await?;
    info!(application = %app.reference(), reviewer = %session.username, "application claimed");
    Ok(Json(app))
}

/// `POST /api/review/applications/{id}/release`
pub async fn release(
    State(state): State<AppState>,
    ReviewerSession(session): ReviewerSession,
    Path(id): Path<String>,
) -> Result<Json<Application>, ApiError> {
    let app = mutate(&state, &id, |app, _, now| app.release(&session.username, now)).await?;
    info!(application = %app.reference(), reviewer = %session.username, "application released");
    Ok(Json(app))
}

/// `POST /api/review/applications/{id}/recalculate`
pub async fn recalculate(
    State(state): State<AppState>,
    ReviewerSession(session): ReviewerSession,
    Path(id): Path<String>,
) -> Result<Json<Application>, ApiError> {
    let app = mutate(&state, &id, |app, table, now| {
        app.recalculate(table, now).map(|_| ())
    })
    .await?;
    info!(
        application = %app.reference(),
        reviewer = %session.username,
        outcome = ?app.system_outcome(),
        "eligibility recalculated"
    );
    Ok(Json(app))
}

/// `POST /api/review/applications/{id}/decision`
pub async fn decide(
    State(state): State<AppState>,
    ReviewerSession(session): ReviewerSession,
    Path(id): Path<String>,
    ApiJson(decision): ApiJson<Decision>,
) -> Result<Json<Application>, ApiError> {
    let app = mutate(&state, &id, |app, _, now| {
        app.decide(&session.username, decision, now)
    })
    .await?;
    info!(
        application = %app.reference(),
        reviewer = %session.username,
        status = %app.status,
        "application decided"
    );
    Ok(Json(app))
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub body: String,
}

/// `POST /api/review/applications/{id}/notes`
pub async fn add_note(
    State(state): State<AppState>,
    ReviewerSession(session): ReviewerSession,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<NoteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let app = mutate(&state, &id, |app, _, now| {
        app.add_note(&session.username, &req.body, now)
    })
    .await?;
    info!(application = %app.reference(), reviewer = %session.username, "note added");
    Ok((StatusCode::CREATED, Json(app)))
}

// =============================================================================
// INCOME LIMITS
// =============================================================================

/// `GET /api/review/income-limits`
pub async fn income_limits(
    State(state): State<AppState>,
    _session: ReviewerSession,
) -> Result<Json<IncomeLimitTable>, ApiError> {
    Ok(Json(state.store.income_limits()?))
}

/// `PUT /api/review/income-limits` (supervisor only)
pub async fn replace_income_limits(
    State(state): State<AppState>,
    session: ReviewerSession,
    ApiJson(table): ApiJson<IncomeLimitTable>,
) -> Result<Json<IncomeLimitTable>, ApiError> {
    session.require_supervisor()?;
    table.validate()?;
    {
        let _gate = state.write_gate.lock().await;
        state.store.replace_income_limits(&table)?;
    }
    info!(
        reviewer = %session.0.username,
        programs = table.programs.len(),
        "income limits replaced"
    );
    Ok(Json(table))
}
