//! Reviewer sessions.
//!
//! Session ids are [`AccessToken`]s handed out in the `eligo_session`
//! cookie. The map is keyed by digest, so the raw id is never held
//! server-side.

use super::error::ApiError;
use super::AppState;
use crate::config::{ReviewerAccount, Role};
use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use eligo_core::{AccessToken, TokenDigest};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

pub const SESSION_COOKIE: &str = "eligo_session";

/// A signed-in reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// In-memory session table.
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<BTreeMap<TokenDigest, Session>>,
    ttl: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl_minutes: u32) -> Self {
        Self {
            sessions: RwLock::new(BTreeMap::new()),
            ttl: Duration::minutes(i64::from(ttl_minutes)),
        }
    }

    /// Time-to-live in seconds, for the cookie `Max-Age`.
    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Open a session for `account`. Expired sessions are purged first.
    pub async fn create(&self, account: &ReviewerAccount, now: DateTime<Utc>) -> (AccessToken, Session) {
        let token = AccessToken::generate();
        let session = Session {
            username: account.username.clone(),
            display_name: account.display_name.clone(),
            role: account.role,
            expires_at: now + self.ttl,
        };
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(token.digest(), session.clone());
        (token, session)
    }

    /// Look up a live session by raw id.
    pub async fn get(&self, id: &str, now: DateTime<Utc>) -> Option<Session> {
        let token = AccessToken::parse(id)?;
        let sessions = self.sessions.read().await;
        sessions
            .get(&token.digest())
            .filter(|s| s.expires_at > now)
            .cloned()
    }

    /// Drop a session. Returns the removed entry.
    pub async fn revoke(&self, id: &str) -> Option<Session> {
        let token = AccessToken::parse(id)?;
        self.sessions.write().await.remove(&token.digest())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

// =============================================================================
// COOKIES
// =============================================================================

/// `Set-Cookie` value carrying a session id.
#[must_use]
pub fn session_cookie(id: &str, max_age_seconds: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={id}; HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
#[must_use]
pub fn clear_cookie(secure: bool) -> String {
    session_cookie("", 0, secure)
}

/// Value of cookie `name` from the request headers.
#[must_use]
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

// =============================================================================
// EXTRACTOR
// =============================================================================

/// Rejects with 401 unless a live session cookie is present.
#[derive(Debug, Clone)]
pub struct ReviewerSession(pub Session);

impl ReviewerSession {
    pub fn require_supervisor(&self) -> Result<(), ApiError> {
        if self.0.role.can_edit_limits() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "supervisor role required".to_string(),
            ))
        }
    }
}

impl FromRequestParts<AppState> for ReviewerSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let id = cookie_value(&parts.headers, SESSION_COOKIE).ok_or(ApiError::Unauthorized)?;
        state
            .sessions
            .get(id, Utc::now())
            .await
            .map(Self)
            .ok_or(ApiError::Unauthorized)
    }
}
