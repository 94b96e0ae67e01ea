//! # Eligibility Module
//!
//! Per-program income limits and the system eligibility result.
//!
//! A limit is looked up by program and household size and compared to the
//! reported monthly income. When no limit applies the result is
//! `Undetermined` and a reviewer decides without a system recommendation.

use crate::documents::DocumentKind;
use crate::{Cents, EligoError, ProgramCode, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Largest household size a table may list.
pub const MAX_HOUSEHOLD_SIZE: u8 = 20;

// =============================================================================
// LIMIT TABLE
// =============================================================================

/// Income limits for one program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramLimits {
    /// Display name, e.g. "Supplemental Nutrition Assistance".
    pub name: String,
    /// Monthly gross income limit by household size.
    pub monthly_limits: BTreeMap<u8, Cents>,
    /// Added per person beyond the largest listed household size.
    #[serde(default)]
    pub additional_member: Option<Cents>,
    /// Document kinds that must be attached before submission.
    #[serde(default)]
    pub required_documents: Vec<DocumentKind>,
}

impl ProgramLimits {
    /// Limit for `household_size`, if one applies.
    #[must_use]
    pub fn limit_for(&self, household_size: u8) -> Option<Cents> {
        if let Some(limit) = self.monthly_limits.get(&household_size) {
            return Some(*limit);
        }
        let (&max_size, &max_limit) = self.monthly_limits.last_key_value()?;
        if household_size <= max_size {
            return None;
        }
        let extra = self.additional_member?;
        let extra_members = u64::from(household_size - max_size);
        Some(max_limit.saturating_add(extra.saturating_mul(extra_members)))
    }
}

/// The configurable limit table, keyed by program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeLimitTable {
    pub programs: BTreeMap<ProgramCode, ProgramLimits>,
}

impl IncomeLimitTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one program.
    pub fn insert(&mut self, code: ProgramCode, limits: ProgramLimits) {
        self.programs.insert(code, limits);
    }

    #[must_use]
    pub fn program(&self, code: &ProgramCode) -> Option<&ProgramLimits> {
        self.programs.get(code)
    }

    #[must_use]
    pub fn contains(&self, code: &ProgramCode) -> bool {
        self.programs.contains_key(code)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Limit for a program and household size.
    #[must_use]
    pub fn lookup(&self, code: &ProgramCode, household_size: u8) -> Option<Cents> {
        self.programs.get(code)?.limit_for(household_size)
    }

    /// Check structural rules.
    ///
    /// Every program lists at least one size, sizes are within
    /// `1..=MAX_HOUSEHOLD_SIZE`, limits are positive and never decrease as
    /// the household grows.
    pub fn validate(&self) -> Result<()> {
        for (code, limits) in &self.programs {
            if limits.name.trim().is_empty() {
                return Err(EligoError::InvalidLimits(format!("{code}: name is required")));
            }
            if limits.monthly_limits.is_empty() {
                return Err(EligoError::InvalidLimits(format!(
                    "{code}: at least one household size is required"
                )));
            }
            let mut previous = Cents::ZERO;
            for (&size, &limit) in &limits.monthly_limits {
                if size == 0 || size > MAX_HOUSEHOLD_SIZE {
                    return Err(EligoError::InvalidLimits(format!(
                        "{code}: household size {size} outside 1..={MAX_HOUSEHOLD_SIZE}"
                    )));
                }
                if limit == Cents::ZERO {
                    return Err(EligoError::InvalidLimits(format!(
                        "{code}: limit for size {size} must be positive"
                    )));
                }
                if limit < previous {
                    return Err(EligoError::InvalidLimits(format!(
                        "{code}: limit for size {size} is lower than for a smaller household"
                    )));
                }
                previous = limit;
            }
            if limits.additional_member == Some(Cents::ZERO) {
                return Err(EligoError::InvalidLimits(format!(
                    "{code}: additional_member must be positive when set"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// DETERMINATION
// =============================================================================

/// The system's recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityOutcome {
    /// Income is at or below the limit.
    Eligible,
    /// Income exceeds the limit.
    Ineligible,
    /// No limit is configured for this program and household size.
    Undetermined,
}

impl EligibilityOutcome {
    pub const ALL: [EligibilityOutcome; 3] = [
        EligibilityOutcome::Eligible,
        EligibilityOutcome::Ineligible,
        EligibilityOutcome::Undetermined,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eligible => "eligible",
            Self::Ineligible => "ineligible",
            Self::Undetermined => "undetermined",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.as_str() == value)
    }
}

impl fmt::Display for EligibilityOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded system result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityDetermination {
    pub outcome: EligibilityOutcome,
    pub program: ProgramCode,
    pub household_size: u8,
    pub monthly_income: Cents,
    pub income_limit: Option<Cents>,
    pub reason: String,
    pub evaluated_at: DateTime<Utc>,
}

/// Compare reported income with the applicable limit.
#[must_use]
pub fn evaluate(
    table: &IncomeLimitTable,
    program: &ProgramCode,
    household_size: u8,
    monthly_income: Cents,
    now: DateTime<Utc>,
) -> EligibilityDetermination {
    let income_limit = table.lookup(program, household_size);
    let (outcome, reason) = match income_limit {
        None => (
            EligibilityOutcome::Undetermined,
            format!("no income limit configured for {program} with household size {household_size}"),
        ),
        Some(limit) if monthly_income <= limit => (
            EligibilityOutcome::Eligible,
            format!("monthly income {monthly_income} is within the {limit} limit"),
        ),
        Some(limit) => (
            EligibilityOutcome::Ineligible,
            format!("monthly income {monthly_income} exceeds the {limit} limit"),
        ),
    };
    EligibilityDetermination {
        outcome,
        program: program.clone(),
        household_size,
        monthly_income,
        income_limit,
        reason,
        evaluated_at: now,
    }
}

// =============================================================================
// TESTS
// =============================================================================
