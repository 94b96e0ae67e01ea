//! # HTTP API
//!
//! axum router for the applicant and reviewer surfaces.
//!
//! ## Endpoints
//!
//! Applicant (authorized by the token in the path):
//! - `GET  /health`
//! - `GET  /api/programs`
//! - `POST /api/applications`
//! - `GET  /api/apply/{token}`
//! - `PUT  /api/apply/{token}/steps/{step}`
//! - `POST /api/apply/{token}/documents`
//! - `DELETE /api/apply/{token}/documents/{doc_id}`
//! - `POST /api/apply/{token}/submit`
//!
//! Reviewer (session cookie):
//! - `POST /api/review/login`, `POST /api/review/logout`, `GET /api/review/me`
//! - `GET  /api/review/applications`, `GET /api/review/dashboard`
//! - `GET  /api/review/applications/{id}`
//! - `POST /api/review/applications/{id}/claim|release|recalculate|decision|notes`
//! - `GET  /api/review/applications/{id}/documents/{doc_id}`
//! - `GET  /api/review/export.csv`
//! - `GET|PUT /api/review/income-limits`

pub mod applicant;
pub mod error;
pub mod review;
pub mod session;
pub mod uploads;

pub use error::ApiError;

use crate::config::AppConfig;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{DefaultBodyLimit, FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use eligo_core::ApplicationStore;
use governor::{DefaultDirectRateLimiter, DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use session::SessionStore;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uploads::UploadDir;

/// Headroom over `max_upload_bytes` for multipart framing and the text fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ApplicationStore>,
    pub config: Arc<AppConfig>,
    pub sessions: Arc<SessionStore>,
    pub uploads: Arc<UploadDir>,
    /// Serializes read-modify-write of stored records.
    pub write_gate: Arc<Mutex<()>>,
    pub login_limiter: Arc<DefaultKeyedRateLimiter<String>>,
    pub start_limiter: Arc<DefaultDirectRateLimiter>,
}

impl AppState {
    pub fn new(store: Arc<dyn ApplicationStore>, config: AppConfig) -> Self {
        let logins = NonZeroU32::new(config.rate_limits.logins_per_minute).unwrap_or(NonZeroU32::MIN);
        let starts = NonZeroU32::new(config.rate_limits.starts_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            store,
            sessions: Arc::new(SessionStore::new(config.session_ttl_minutes)),
            uploads: Arc::new(UploadDir::new(config.upload_dir.clone())),
            write_gate: Arc::new(Mutex::new(())),
            login_limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(logins))),
            start_limiter: Arc::new(RateLimiter::direct(Quota::per_minute(starts))),
            config: Arc::new(config),
        }
    }
}

/// Build the full router.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = usize::try_from(state.config.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    let applicant = Router::new()
        .route("/api/programs", get(applicant::programs))
        .route("/api/applications", post(applicant::start))
        .route("/api/apply/{token}", get(applicant::view))
        .route("/api/apply/{token}/steps/{step}", put(applicant::save_step))
        .route(
            "/api/apply/{token}/documents",
            post(applicant::upload_document).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/apply/{token}/documents/{doc_id}",
            delete(applicant::remove_document),
        )
        .route("/api/apply/{token}/submit", post(applicant::submit));

    let review = Router::new()
        .route("/api/review/login", post(review::login))
        .route("/api/review/logout", post(review::logout))
        .route("/api/review/me", get(review::me))
        .route("/api/review/dashboard", get(review::dashboard))
        .route("/api/review/applications", get(review::list))
        .route("/api/review/applications/{id}", get(review::detail))
        .route("/api/review/applications/{id}/claim", post(review::claim))
        .route("/api/review/applications/{id}/release", post(review::release))
        .route(
            "/api/review/applications/{id}/recalculate",
            post(review::recalculate),
        )
        .route("/api/review/applications/{id}/decision", post(review::decide))
        .route("/api/review/applications/{id}/notes", post(review::add_note))
        .route(
            "/api/review/applications/{id}/documents/{doc_id}",
            get(review::download_document),
        )
        .route("/api/review/export.csv", get(review::export))
        .route(
            "/api/review/income-limits",
            get(review::income_limits).put(review::replace_income_limits),
        );

    let cors = cors_layer(&state.config.cors_origins);
    let router = Router::new()
        .route("/health", get(health))
        .merge(applicant)
        .merge(review)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
    )
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// EXTRACTORS
// =============================================================================

/// `Json` whose rejection renders as [`ApiError`].
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| ApiError::from(e))?;
        Ok(Self(value))
    }
}

/// `Query` whose rejection renders as [`ApiError`].
#[derive(Debug, Clone)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e: QueryRejection| ApiError::from(e))?;
        Ok(Self(value))
    }
}
