//! API error type and its JSON rendering.
//!
//! Every failure is returned as
//! `{"error": {"code": "...", "message": "...", "details": ...}}`.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use eligo_core::EligoError;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] EligoError),

    #[error("sign in required")]
    Unauthorized,

    /// Uniform for unknown user and wrong password.
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("too many requests, try again shortly")]
    RateLimited,

    #[error("request body is too large")]
    PayloadTooLarge,

    #[error("{message}")]
    BadRequest { status: StatusCode, message: String },

    #[error("file storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Core(err) => core_status(err),
            Self::Unauthorized | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BadRequest { status, .. } => *status,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Core(err) => core_code(err),
            Self::Unauthorized => "unauthorized",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Forbidden(_) => "forbidden",
            Self::RateLimited => "rate_limited",
            Self::PayloadTooLarge => "payload_too_large",
            Self::BadRequest { .. } => "bad_request",
            Self::Io(_) => "internal",
        }
    }

    fn details(&self) -> Value {
        match self {
            Self::Core(EligoError::Validation(errors)) => json!(errors.errors),
            Self::Core(EligoError::Incomplete { missing }) => json!({ "missing_steps": missing }),
            Self::Core(EligoError::MissingDocuments(kinds)) => {
                json!({ "missing_documents": kinds })
            }
            Self::Core(EligoError::StepOutOfOrder { step, expected }) => {
                json!({ "step": step, "expected": expected })
            }
            Self::Core(EligoError::InvalidTransition { from, to }) => {
                json!({ "from": from, "to": to })
            }
            Self::Core(EligoError::ActionNotAllowed { status, .. }) => {
                json!({ "status": status })
            }
            _ => Value::Null,
        }
    }

    fn is_internal(&self) -> bool {
        self.status() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn core_status(err: &EligoError) -> StatusCode {
    match err {
        EligoError::Validation(_)
        | EligoError::InvalidProgramCode(_)
        | EligoError::InvalidStatus(_)
        | EligoError::UnknownProgram(_)
        | EligoError::InvalidLimits(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EligoError::NotFound(_) => StatusCode::NOT_FOUND,
        EligoError::InvalidTransition { .. }
        | EligoError::ActionNotAllowed { .. }
        | EligoError::FormLocked(_)
        | EligoError::StepOutOfOrder { .. }
        | EligoError::Incomplete { .. }
        | EligoError::MissingDocuments(_)
        | EligoError::DocumentLimit(_)
        | EligoError::Duplicate(_) => StatusCode::CONFLICT,
        EligoError::NotAssigned => StatusCode::FORBIDDEN,
        EligoError::Storage(_) | EligoError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn core_code(err: &EligoError) -> &'static str {
    match err {
        EligoError::Validation(_) => "validation_failed",
        EligoError::InvalidProgramCode(_) => "invalid_program_code",
        EligoError::InvalidStatus(_) => "invalid_status",
        EligoError::UnknownProgram(_) => "unknown_program",
        EligoError::InvalidLimits(_) => "invalid_income_limits",
        EligoError::NotFound(_) => "not_found",
        EligoError::InvalidTransition { .. } => "invalid_transition",
        EligoError::ActionNotAllowed { .. } => "action_not_allowed",
        EligoError::FormLocked(_) => "form_locked",
        EligoError::StepOutOfOrder { .. } => "step_out_of_order",
        EligoError::Incomplete { .. } => "incomplete",
        EligoError::MissingDocuments(_) => "missing_documents",
        EligoError::DocumentLimit(_) => "document_limit",
        EligoError::Duplicate(_) => "duplicate",
        EligoError::NotAssigned => "not_assigned",
        EligoError::Storage(_) | EligoError::Serialization(_) => "internal",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.is_internal() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message,
                "details": self.details(),
            }
        }));
        let mut resp = (status, body).into_response();
        if status == StatusCode::TOO_MANY_REQUESTS {
            resp.headers_mut()
                .insert("retry-after", HeaderValue::from_static("60"));
        }
        resp
    }
}

// =============================================================================
// EXTRACTOR REJECTIONS
// =============================================================================

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => Self::PayloadTooLarge,
            status => Self::BadRequest {
                status,
                message: rejection.body_text(),
            },
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        match err.status() {
            StatusCode::PAYLOAD_TOO_LARGE => Self::PayloadTooLarge,
            status => Self::BadRequest {
                status,
                message: err.body_text(),
            },
        }
    }
}
