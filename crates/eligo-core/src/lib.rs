//! # Eligo Core
//!
//! Domain rules for the Eligo benefits portal.
//!
//! Applicants fill a five-step intake form behind a tokenized link, attach
//! supporting documents and submit. Submission runs the eligibility check
//! against the configured income limits and records a system result.
//! Reviewers then claim, annotate and decide applications.
//!
//! This crate is synchronous and performs no network or file I/O apart from
//! the redb database in [`storage`]. Operations that record time take the
//! current instant as an argument.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod application;
pub mod documents;
pub mod eligibility;
pub mod export;
pub mod intake;
pub mod query;
pub mod storage;
pub mod token;
pub mod validation;

pub use application::{Application, Decision, HistoryEntry, ReviewDecision, ReviewNote, Verdict};
pub use documents::{DocumentKind, DocumentMeta};
pub use eligibility::{EligibilityDetermination, EligibilityOutcome, IncomeLimitTable, ProgramLimits};
pub use intake::{IntakeForm, IntakeStep, StepInput};
pub use query::{ApplicationFilter, ApplicationSummary, Page, SortOrder, StatusCounts};
pub use storage::{ApplicationStore, MemoryStore, RedbStore};
pub use token::{AccessToken, TokenDigest};
pub use validation::{FieldError, Validate, ValidationContext, ValidationErrors};

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Numeric application identifier, allocated by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub u64);

impl ApplicationId {
    /// Human-facing reference, e.g. `APP-000042`.
    #[must_use]
    pub fn reference(&self) -> String {
        format!("APP-{:06}", self.0)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Document identifier, unique within one application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub u64);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum length of a program code.
pub const MAX_PROGRAM_CODE_LEN: usize = 32;

/// Program code such as `snap` or `liheap`.
///
/// Lowercase ASCII letters, digits, `_` and `-`, 1 to 32 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProgramCode(String);

impl ProgramCode {
    /// Parse and validate a program code.
    pub fn new(code: impl Into<String>) -> Result<Self> {
        let code = code.into();
        let valid_chars = code
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
        if code.is_empty() || code.len() > MAX_PROGRAM_CODE_LEN || !valid_chars {
            return Err(EligoError::InvalidProgramCode(code));
        }
        Ok(Self(code))
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProgramCode {
    type Error = EligoError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ProgramCode> for String {
    fn from(code: ProgramCode) -> Self {
        code.0
    }
}

impl fmt::Display for ProgramCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// MONEY
// =============================================================================

/// An amount of money in cents.
///
/// All eligibility arithmetic is integer-only.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Cents(pub u64);

impl Cents {
    /// Zero cents.
    pub const ZERO: Cents = Cents(0);

    /// Build from whole dollars.
    #[must_use]
    pub const fn from_dollars(dollars: u64) -> Self {
        Self(dollars.saturating_mul(100))
    }

    /// Saturating addition.
    #[must_use]
    pub const fn saturating_add(self, other: Cents) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Saturating multiplication by a count.
    #[must_use]
    pub const fn saturating_mul(self, factor: u64) -> Self {
        Self(self.0.saturating_mul(factor))
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// STATUS
// =============================================================================

/// Lifecycle status of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Applicant is still filling the form.
    Draft,
    /// Submitted and waiting for a reviewer.
    Submitted,
    /// Claimed by a reviewer.
    UnderReview,
    /// Approved by a reviewer.
    Approved,
    /// Denied by a reviewer.
    Denied,
}

impl ApplicationStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Draft,
        ApplicationStatus::Submitted,
        ApplicationStatus::UnderReview,
        ApplicationStatus::Approved,
        ApplicationStatus::Denied,
    ];

    /// Wire name of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }

    /// Parse a wire name.
    pub fn parse(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == value)
            .ok_or_else(|| EligoError::InvalidStatus(value.to_string()))
    }

    /// Approved and Denied are final.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Denied)
    }

    /// The legal transition table.
    #[must_use]
    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::{Approved, Denied, Draft, Submitted, UnderReview};
        matches!(
            (*self, next),
            (Draft, Submitted)
                | (Submitted, UnderReview)
                | (UnderReview, Submitted)
                | (UnderReview, Approved)
                | (UnderReview, Denied)
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who performed an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// The applicant holding the access token.
    Applicant,
    /// A signed-in reviewer, by username.
    Reviewer(String),
    /// The portal itself (eligibility calculation).
    System,
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applicant => f.write_str("applicant"),
            Self::Reviewer(name) => write!(f, "reviewer:{name}"),
            Self::System => f.write_str("system"),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Errors produced by the core.
#[derive(Debug, Error)]
pub enum EligoError {
    /// One or more fields failed validation.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Program code is malformed.
    #[error("invalid program code: {0:?}")]
    InvalidProgramCode(String),

    /// Status name is not one of the five statuses.
    #[error("invalid status: {0:?}")]
    InvalidStatus(String),

    /// Program is not present in the income limit table.
    #[error("unknown program: {0}")]
    UnknownProgram(String),

    /// Entity not found.
    #[error("{0} not found")]
    NotFound(String),

    /// The requested status change is not allowed.
    #[error("cannot move application from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    /// A reviewer action that the current status does not permit.
    #[error("cannot {action} an application that is {status}")]
    ActionNotAllowed {
        action: &'static str,
        status: ApplicationStatus,
    },

    /// Form edits are only allowed while the application is a draft.
    #[error("application is {0} and can no longer be edited")]
    FormLocked(ApplicationStatus),

    /// A step was saved before the steps preceding it.
    #[error("step {step} cannot be saved before {expected}")]
    StepOutOfOrder {
        step: IntakeStep,
        expected: IntakeStep,
    },

    /// Submission attempted with missing steps.
    #[error("intake form incomplete, missing: {}", join_display(.missing))]
    Incomplete { missing: Vec<IntakeStep> },

    /// Submission attempted without the program's required documents.
    #[error("missing required documents: {}", join_display(.0))]
    MissingDocuments(Vec<DocumentKind>),

    /// Too many documents on one application.
    #[error("document limit of {0} reached")]
    DocumentLimit(usize),

    /// Reviewer is not the one assigned to the application.
    #[error("application is assigned to another reviewer")]
    NotAssigned,

    /// Income limit table failed validation.
    #[error("invalid income limit table: {0}")]
    InvalidLimits(String),

    /// Storage backend failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Encoding or decoding of a stored record failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Duplicate key on insert.
    #[error("duplicate {0}")]
    Duplicate(String),
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<postcard::Error> for EligoError {
    fn from(err: postcard::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, EligoError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_is_zero_padded() {
        assert_eq!(ApplicationId(42).reference(), "APP-000042");
        assert_eq!(ApplicationId(1_234_567).reference(), "APP-1234567");
    }

    #[test]
    fn program_code_rules() {
        assert!(ProgramCode::new("snap").is_ok());
        assert!(ProgramCode::new("energy_assist-2").is_ok());
        assert!(ProgramCode::new("").is_err());
        assert!(ProgramCode::new("SNAP").is_err());
        assert!(ProgramCode::new("a b").is_err());
        assert!(ProgramCode::new("x".repeat(33)).is_err());
    }

    #[test]
    fn cents_display() {
        assert_eq!(Cents(0).to_string(), "0.00");
        assert_eq!(Cents(5).to_string(), "0.05");
        assert_eq!(Cents(123_456).to_string(), "1234.56");
        assert_eq!(Cents::from_dollars(2_000).to_string(), "2000.00");
    }

    #[test]
    fn status_transitions() {
        use ApplicationStatus::*;
        assert!(Draft.can_transition_to(Submitted));
        assert!(Submitted.can_transition_to(UnderReview));
        assert!(UnderReview.can_transition_to(Approved));
        assert!(UnderReview.can_transition_to(Denied));
        assert!(UnderReview.can_transition_to(Submitted));

        assert!(!Draft.can_transition_to(Approved));
        assert!(!Submitted.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Denied));
        assert!(!Denied.can_transition_to(UnderReview));
    }

    #[test]
    fn status_round_trips_through_wire_name() {
        for status in ApplicationStatus::ALL {
            assert_eq!(ApplicationStatus::parse(status.as_str()).ok(), Some(status));
        }
        assert!(ApplicationStatus::parse("pending").is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(ApplicationStatus::Approved.is_terminal());
        assert!(ApplicationStatus::Denied.is_terminal());
        assert!(!ApplicationStatus::UnderReview.is_terminal());
    }
}
