//! # Validation Module
//!
//! Schema-object validation for intake payloads.
//!
//! Each payload type implements [`Validate`] and reports every failing field
//! at once, so a client can highlight all problems in one round trip.

use crate::{EligoError, Result};
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Oldest accepted date of birth, in years before `today`.
pub const MAX_AGE_YEARS: u32 = 130;

/// A single failing field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Dotted path of the field, e.g. `address.postal_code`.
    pub field: String,
    /// Human readable message.
    pub message: String,
}

/// Collected field errors. Empty means valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A single-error set.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record a failure.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Merge errors from a nested object, prefixing their paths.
    pub fn merge_nested(&mut self, prefix: &str, nested: ValidationErrors) {
        for err in nested.errors {
            self.errors.push(FieldError {
                field: format!("{prefix}.{}", err.field),
                message: err.message,
            });
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// True if some error targets `field`.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when empty, otherwise a validation error.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(EligoError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Facts that field rules depend on but payloads do not carry.
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext {
    /// Calendar date the payload is validated on.
    pub today: NaiveDate,
}

impl ValidationContext {
    #[must_use]
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }
}

/// A schema object that can report its own field errors.
pub trait Validate {
    /// Collect every field error.
    fn validate(&self, ctx: &ValidationContext) -> ValidationErrors;

    /// Validate and convert failures into [`EligoError::Validation`].
    fn check(&self, ctx: &ValidationContext) -> Result<()> {
        self.validate(ctx).into_result()
    }
}

// =============================================================================
// FIELD RULES
// =============================================================================

/// Required, non-blank, at most `max` characters.
pub fn required_text(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.trim().is_empty() {
        errors.add(field, "is required");
    } else if value.chars().count() > max {
        errors.add(field, format!("must be at most {max} characters"));
    }
}

/// Optional text, at most `max` characters.
pub fn optional_text(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(field, format!("must be at most {max} characters"));
    }
}

/// Basic email shape: one `@`, a local part and a dotted domain.
#[must_use]
pub fn is_valid_email(value: &str) -> bool {
    let value = value.trim();
    if value.len() > 254 || value.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = value.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}

/// Phone number with 10 to 15 digits after removing common punctuation.
#[must_use]
pub fn is_valid_phone(value: &str) -> bool {
    let mut digits = 0usize;
    for c in value.chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' | '(' | ')' | '+' => {}
            _ => return false,
        }
    }
    (10..=15).contains(&digits)
}

/// Two ASCII letters.
#[must_use]
pub fn is_valid_state(value: &str) -> bool {
    value.len() == 2 && value.bytes().all(|b| b.is_ascii_alphabetic())
}

/// `12345` or `12345-6789`.
#[must_use]
pub fn is_valid_postal_code(value: &str) -> bool {
    let bytes = value.as_bytes();
    let five = |s: &[u8]| s.len() == 5 && s.iter().all(u8::is_ascii_digit);
    match bytes.len() {
        5 => five(bytes),
        10 => five(&bytes[..5]) && bytes[5] == b'-' && bytes[6..].iter().all(u8::is_ascii_digit),
        _ => false,
    }
}

/// Parse `YYYY-MM-DD`.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// A date of birth that is neither in the future nor implausibly old.
pub fn birth_date(errors: &mut ValidationErrors, field: &str, value: &str, today: NaiveDate) {
    let Some(date) = parse_iso_date(value) else {
        errors.add(field, "must be a date in YYYY-MM-DD format");
        return;
    };
    if date > today {
        errors.add(field, "cannot be in the future");
    } else if today
        .checked_sub_months(Months::new(MAX_AGE_YEARS * 12))
        .is_some_and(|oldest| date < oldest)
    {
        errors.add(field, format!("cannot be more than {MAX_AGE_YEARS} years ago"));
    }
}

// =============================================================================
// TESTS
// =============================================================================
