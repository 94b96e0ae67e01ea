//! # Intake Module
//!
//! The five-step intake form.
//!
//! Steps are filled in order: applicant, household, income, program,
//! consent. A step can be saved once every step before it is complete, and
//! earlier steps can be revised at any time while the application is a
//! draft. Each step payload is a schema object validated on save.

use crate::validation::{
    self, Validate, ValidationContext, ValidationErrors, birth_date, optional_text, required_text,
};
use crate::{Cents, EligoError, ProgramCode, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of a name field.
pub const MAX_NAME_LEN: usize = 100;
/// Maximum number of additional household members.
pub const MAX_MEMBERS: usize = 19;
/// Maximum number of income sources.
pub const MAX_INCOME_SOURCES: usize = 20;
/// Largest single income amount (100 million dollars).
pub const MAX_INCOME_AMOUNT: Cents = Cents(10_000_000_000);
/// Maximum length of free-text descriptions and signatures.
pub const MAX_DESCRIPTION_LEN: usize = 200;

// =============================================================================
// STEPS
// =============================================================================

/// Identifies one step of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStep {
    Applicant,
    Household,
    Income,
    Program,
    Consent,
}

impl IntakeStep {
    /// All steps in fill order.
    pub const ORDER: [IntakeStep; 5] = [
        IntakeStep::Applicant,
        IntakeStep::Household,
        IntakeStep::Income,
        IntakeStep::Program,
        IntakeStep::Consent,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applicant => "applicant",
            Self::Household => "household",
            Self::Income => "income",
            Self::Program => "program",
            Self::Consent => "consent",
        }
    }

    /// Parse a step name as used in URLs.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ORDER.into_iter().find(|s| s.as_str() == value)
    }
}

impl fmt::Display for IntakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// STEP 1: APPLICANT
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl Validate for Address {
    fn validate(&self, _ctx: &ValidationContext) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        required_text(&mut errors, "street", &self.street, MAX_DESCRIPTION_LEN);
        required_text(&mut errors, "city", &self.city, MAX_NAME_LEN);
        if !validation::is_valid_state(&self.state) {
            errors.add("state", "must be a two-letter state code");
        }
        if !validation::is_valid_postal_code(&self.postal_code) {
            errors.add("postal_code", "must be a 5-digit or ZIP+4 code");
        }
        errors
    }
}

/// The primary applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantStep {
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD`.
    pub date_of_birth: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub address: Address,
}

impl ApplicantStep {
    /// `first last`, trimmed.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

impl Validate for ApplicantStep {
    fn validate(&self, ctx: &ValidationContext) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        required_text(&mut errors, "first_name", &self.first_name, MAX_NAME_LEN);
        required_text(&mut errors, "last_name", &self.last_name, MAX_NAME_LEN);
        birth_date(&mut errors, "date_of_birth", &self.date_of_birth, ctx.today);
        if let Some(email) = self.email.as_deref().filter(|e| !e.trim().is_empty()) {
            if !validation::is_valid_email(email) {
                errors.add("email", "must be a valid email address");
            }
        }
        if let Some(phone) = self.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            if !validation::is_valid_phone(phone) {
                errors.add("phone", "must contain 10 to 15 digits");
            }
        }
        errors.merge_nested("address", self.address.validate(ctx));
        errors
    }
}

// =============================================================================
// STEP 2: HOUSEHOLD
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Spouse,
    Partner,
    Child,
    Parent,
    Sibling,
    Other,
}

/// Someone living with the applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdMember {
    pub name: String,
    pub relationship: Relationship,
    pub date_of_birth: String,
}

/// Everyone besides the applicant who shares the household.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdStep {
    #[serde(default)]
    pub members: Vec<HouseholdMember>,
}

impl HouseholdStep {
    /// Applicant plus members.
    #[must_use]
    pub fn household_size(&self) -> u8 {
        u8::try_from(self.members.len().saturating_add(1)).unwrap_or(u8::MAX)
    }
}

impl Validate for HouseholdStep {
    fn validate(&self, ctx: &ValidationContext) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if self.members.len() > MAX_MEMBERS {
            errors.add("members", format!("at most {MAX_MEMBERS} members are allowed"));
        }
        for (i, member) in self.members.iter().enumerate() {
            required_text(&mut errors, &format!("members[{i}].name"), &member.name, MAX_NAME_LEN);
            birth_date(
                &mut errors,
                &format!("members[{i}].date_of_birth"),
                &member.date_of_birth,
                ctx.today,
            );
        }
        errors
    }
}

// =============================================================================
// STEP 3: INCOME
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeKind {
    Employment,
    SelfEmployment,
    Benefits,
    ChildSupport,
    Pension,
    Other,
}

/// How often an amount is received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeFrequency {
    Weekly,
    Biweekly,
    Semimonthly,
    Monthly,
    Annually,
}

impl IncomeFrequency {
    /// Convert an amount at this frequency to monthly cents, rounding down.
    #[must_use]
    pub fn to_monthly(&self, amount: Cents) -> Cents {
        let a = amount.0;
        let monthly = match self {
            Self::Weekly => a.saturating_mul(52) / 12,
            Self::Biweekly => a.saturating_mul(26) / 12,
            Self::Semimonthly => a.saturating_mul(2),
            Self::Monthly => a,
            Self::Annually => a / 12,
        };
        Cents(monthly)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeSource {
    pub kind: IncomeKind,
    #[serde(default)]
    pub description: String,
    pub amount: Cents,
    pub frequency: IncomeFrequency,
}

impl IncomeSource {
    #[must_use]
    pub fn monthly_amount(&self) -> Cents {
        self.frequency.to_monthly(self.amount)
    }
}

/// Household income.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeStep {
    #[serde(default)]
    pub sources: Vec<IncomeSource>,
    /// Must be set when `sources` is empty.
    #[serde(default)]
    pub reports_no_income: bool,
}

impl IncomeStep {
    /// Sum of all sources normalized to a month.
    #[must_use]
    pub fn monthly_total(&self) -> Cents {
        self.sources
            .iter()
            .fold(Cents::ZERO, |acc, s| acc.saturating_add(s.monthly_amount()))
    }
}

impl Validate for IncomeStep {
    fn validate(&self, _ctx: &ValidationContext) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if self.sources.is_empty() && !self.reports_no_income {
            errors.add("sources", "add an income source or confirm the household has no income");
        }
        if !self.sources.is_empty() && self.reports_no_income {
            errors.add("reports_no_income", "cannot be set when income sources are listed");
        }
        if self.sources.len() > MAX_INCOME_SOURCES {
            errors.add("sources", format!("at most {MAX_INCOME_SOURCES} sources are allowed"));
        }
        for (i, source) in self.sources.iter().enumerate() {
            if source.amount == Cents::ZERO {
                errors.add(format!("sources[{i}].amount"), "must be greater than zero");
            } else if source.amount > MAX_INCOME_AMOUNT {
                errors.add(format!("sources[{i}].amount"), "is too large");
            }
            optional_text(
                &mut errors,
                &format!("sources[{i}].description"),
                &source.description,
                MAX_DESCRIPTION_LEN,
            );
        }
        errors
    }
}

// =============================================================================
// STEP 4: PROGRAM
// =============================================================================

/// Which benefit program the application is for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramStep {
    pub program: ProgramCode,
}

impl Validate for ProgramStep {
    fn validate(&self, _ctx: &ValidationContext) -> ValidationErrors {
        // The code is validated on parse; membership in the catalog is
        // checked by the application against the income limit table.
        ValidationErrors::new()
    }
}

// =============================================================================
// STEP 5: CONSENT
// =============================================================================

/// Attestation and typed signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentStep {
    pub attests_truthful: bool,
    pub signature: String,
}

impl ConsentStep {
    /// Signature equals the applicant's full name, ignoring case and
    /// surrounding whitespace.
    #[must_use]
    pub fn matches_name(&self, full_name: &str) -> bool {
        self.signature.trim().to_lowercase() == full_name.trim().to_lowercase()
    }
}

impl Validate for ConsentStep {
    fn validate(&self, _ctx: &ValidationContext) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if !self.attests_truthful {
            errors.add("attests_truthful", "must be accepted");
        }
        required_text(&mut errors, "signature", &self.signature, MAX_DESCRIPTION_LEN);
        errors
    }
}

// =============================================================================
// STEP INPUT
// =============================================================================

/// A payload for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepInput {
    Applicant(ApplicantStep),
    Household(HouseholdStep),
    Income(IncomeStep),
    Program(ProgramStep),
    Consent(ConsentStep),
}

impl StepInput {
    #[must_use]
    pub fn step(&self) -> IntakeStep {
        match self {
            Self::Applicant(_) => IntakeStep::Applicant,
            Self::Household(_) => IntakeStep::Household,
            Self::Income(_) => IntakeStep::Income,
            Self::Program(_) => IntakeStep::Program,
            Self::Consent(_) => IntakeStep::Consent,
        }
    }
}

impl Validate for StepInput {
    fn validate(&self, ctx: &ValidationContext) -> ValidationErrors {
        match self {
            Self::Applicant(s) => s.validate(ctx),
            Self::Household(s) => s.validate(ctx),
            Self::Income(s) => s.validate(ctx),
            Self::Program(s) => s.validate(ctx),
            Self::Consent(s) => s.validate(ctx),
        }
    }
}

// =============================================================================
// FORM
// =============================================================================

/// The form as saved so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeForm {
    pub applicant: Option<ApplicantStep>,
    pub household: Option<HouseholdStep>,
    pub income: Option<IncomeStep>,
    pub program: Option<ProgramStep>,
    pub consent: Option<ConsentStep>,
}

impl IntakeForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `step` has been saved.
    #[must_use]
    pub fn is_step_complete(&self, step: IntakeStep) -> bool {
        match step {
            IntakeStep::Applicant => self.applicant.is_some(),
            IntakeStep::Household => self.household.is_some(),
            IntakeStep::Income => self.income.is_some(),
            IntakeStep::Program => self.program.is_some(),
            IntakeStep::Consent => self.consent.is_some(),
        }
    }

    /// Saved steps in fill order.
    #[must_use]
    pub fn completed_steps(&self) -> Vec<IntakeStep> {
        IntakeStep::ORDER
            .into_iter()
            .filter(|s| self.is_step_complete(*s))
            .collect()
    }

    /// Steps still missing, in fill order.
    #[must_use]
    pub fn missing_steps(&self) -> Vec<IntakeStep> {
        IntakeStep::ORDER
            .into_iter()
            .filter(|s| !self.is_step_complete(*s))
            .collect()
    }

    /// First missing step, `None` when the form is complete.
    #[must_use]
    pub fn next_step(&self) -> Option<IntakeStep> {
        IntakeStep::ORDER
            .into_iter()
            .find(|s| !self.is_step_complete(*s))
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.next_step().is_none()
    }

    /// Validate and store one step.
    ///
    /// Fails with [`EligoError::StepOutOfOrder`] if an earlier step is still
    /// missing. Re-saving the applicant step drops a consent whose signature
    /// no longer matches the name.
    pub fn save_step(&mut self, input: StepInput, ctx: &ValidationContext) -> Result<()> {
        let step = input.step();
        if let Some(expected) = IntakeStep::ORDER
            .into_iter()
            .take_while(|s| *s < step)
            .find(|s| !self.is_step_complete(*s))
        {
            return Err(EligoError::StepOutOfOrder { step, expected });
        }

        input.check(ctx)?;

        match input {
            StepInput::Applicant(applicant) => {
                let full_name = applicant.full_name();
                if self
                    .consent
                    .as_ref()
                    .is_some_and(|c| !c.matches_name(&full_name))
                {
                    self.consent = None;
                }
                self.applicant = Some(applicant);
            }
            StepInput::Household(household) => self.household = Some(household),
            StepInput::Income(income) => self.income = Some(income),
            StepInput::Program(program) => self.program = Some(program),
            StepInput::Consent(consent) => {
                let full_name = self
                    .applicant
                    .as_ref()
                    .map(ApplicantStep::full_name)
                    .unwrap_or_default();
                if !consent.matches_name(&full_name) {
                    return Err(EligoError::Validation(ValidationErrors::single(
                        "signature",
                        "must match the applicant's full name",
                    )));
                }
                self.consent = Some(consent);
            }
        }
        Ok(())
    }

    /// Household size, defaulting to 1 before the household step.
    #[must_use]
    pub fn household_size(&self) -> u8 {
        self.household
            .as_ref()
            .map(HouseholdStep::household_size)
            .unwrap_or(1)
    }

    /// Reported monthly income, zero before the income step.
    #[must_use]
    pub fn monthly_income(&self) -> Cents {
        self.income
            .as_ref()
            .map(IncomeStep::monthly_total)
            .unwrap_or(Cents::ZERO)
    }

    /// Selected program, if chosen.
    #[must_use]
    pub fn program(&self) -> Option<&ProgramCode> {
        self.program.as_ref().map(|p| &p.program)
    }

    /// Applicant full name, empty before the first step.
    #[must_use]
    pub fn applicant_name(&self) -> String {
        self.applicant
            .as_ref()
            .map(ApplicantStep::full_name)
            .unwrap_or_default()
    }

    /// Applicant email, empty when not given.
    #[must_use]
    pub fn applicant_email(&self) -> String {
        self.applicant
            .as_ref()
            .and_then(|a| a.email.clone())
            .unwrap_or_default()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    pub(crate) fn ctx() -> ValidationContext {
        ValidationContext::new(NaiveDate::from_ymd_opt(2026, 6, 1).expect("valid date"))
    }

    pub(crate) fn applicant() -> ApplicantStep {
        ApplicantStep {
            first_name: "Ana".to_string(),
            last_name: "Reyes".to_string(),
            date_of_birth: "1988-04-12".to_string(),
            email: Some("ana@example.org".to_string()),
            phone: Some("(555) 123-4567".to_string()),
            address: Address {
                street: "12 Elm St".to_string(),
                city: "Springfield".to_string(),
                state: "IL".to_string(),
                postal_code: "62701".to_string(),
            },
        }
    }

    pub(crate) fn household(members: usize) -> HouseholdStep {
        HouseholdStep {
            members: (0..members)
                .map(|i| HouseholdMember {
                    name: format!("Member {i}"),
                    relationship: Relationship::Child,
                    date_of_birth: "2015-09-01".to_string(),
                })
                .collect(),
        }
    }

    pub(crate) fn monthly_income(amount: Cents) -> IncomeStep {
        IncomeStep {
            sources: vec![IncomeSource {
                kind: IncomeKind::Employment,
                description: "Warehouse".to_string(),
                amount,
                frequency: IncomeFrequency::Monthly,
            }],
            reports_no_income: false,
        }
    }

    pub(crate) fn consent() -> ConsentStep {
        ConsentStep {
            attests_truthful: true,
            signature: "ana reyes".to_string(),
        }
    }

    pub(crate) fn complete_form(program: &str, members: usize, income: Cents) -> IntakeForm {
        let mut form = IntakeForm::new();
        let program = ProgramCode::new(program).expect("valid program");
        let steps = vec![
            StepInput::Applicant(applicant()),
            StepInput::Household(household(members)),
            StepInput::Income(monthly_income(income)),
            StepInput::Program(ProgramStep { program }),
            StepInput::Consent(consent()),
        ];
        for step in steps {
            form.save_step(step, &ctx()).expect("step saves");
        }
        form
    }

    #[test]
    fn next_step_follows_order() {
        let mut form = IntakeForm::new();
        assert_eq!(form.next_step(), Some(IntakeStep::Applicant));
        form.save_step(StepInput::Applicant(applicant()), &ctx())
            .expect("saves");
        assert_eq!(form.next_step(), Some(IntakeStep::Household));
        assert_eq!(form.completed_steps(), vec![IntakeStep::Applicant]);
    }

    #[test]
    fn out_of_order_step_is_rejected() {
        let mut form = IntakeForm::new();
        let result = form.save_step(StepInput::Income(monthly_income(Cents(100))), &ctx());
        assert!(matches!(
            result,
            Err(EligoError::StepOutOfOrder {
                step: IntakeStep::Income,
                expected: IntakeStep::Applicant
            })
        ));
    }

    #[test]
    fn earlier_steps_can_be_revised() {
        let mut form = complete_form("snap", 2, Cents(150_000));
        form.save_step(StepInput::Household(household(4)), &ctx())
            .expect("revision saves");
        assert_eq!(form.household_size(), 5);
        assert!(form.is_complete());
    }

    #[test]
    fn invalid_applicant_reports_all_fields() {
        let mut bad = applicant();
        bad.first_name = " ".to_string();
        bad.email = Some("nope".to_string());
        bad.address.postal_code = "1".to_string();
        let errors = bad.validate(&ctx());
        assert!(errors.has_field("first_name"));
        assert!(errors.has_field("email"));
        assert!(errors.has_field("address.postal_code"));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn blank_optional_contact_fields_are_allowed() {
        let mut a = applicant();
        a.email = Some(String::new());
        a.phone = None;
        assert!(a.validate(&ctx()).is_empty());
    }

    #[test]
    fn member_errors_are_indexed() {
        let mut h = household(2);
        h.members[1].date_of_birth = "soon".to_string();
        let errors = h.validate(&ctx());
        assert!(errors.has_field("members[1].date_of_birth"));
    }

    #[test]
    fn too_many_members() {
        assert!(household(MAX_MEMBERS).validate(&ctx()).is_empty());
        assert!(household(MAX_MEMBERS + 1).validate(&ctx()).has_field("members"));
    }

    #[test]
    fn income_requires_sources_or_attestation() {
        let empty = IncomeStep::default();
        assert!(empty.validate(&ctx()).has_field("sources"));

        let none = IncomeStep {
            sources: Vec::new(),
            reports_no_income: true,
        };
        assert!(none.validate(&ctx()).is_empty());
        assert_eq!(none.monthly_total(), Cents::ZERO);

        let mut both = monthly_income(Cents(100));
        both.reports_no_income = true;
        assert!(both.validate(&ctx()).has_field("reports_no_income"));
    }

    #[test]
    fn zero_amount_is_rejected() {
        let income = monthly_income(Cents::ZERO);
        assert!(income.validate(&ctx()).has_field("sources[0].amount"));
    }

    #[test]
    fn frequency_normalization() {
        let amount = Cents(120_000);
        assert_eq!(IncomeFrequency::Weekly.to_monthly(amount), Cents(520_000));
        assert_eq!(IncomeFrequency::Biweekly.to_monthly(amount), Cents(260_000));
        assert_eq!(IncomeFrequency::Semimonthly.to_monthly(amount), Cents(240_000));
        assert_eq!(IncomeFrequency::Monthly.to_monthly(amount), amount);
        assert_eq!(IncomeFrequency::Annually.to_monthly(amount), Cents(10_000));
        // Rounds down.
        assert_eq!(IncomeFrequency::Weekly.to_monthly(Cents(1)), Cents(4));
    }

    #[test]
    fn monthly_total_sums_mixed_frequencies() {
        let income = IncomeStep {
            sources: vec![
                IncomeSource {
                    kind: IncomeKind::Employment,
                    description: String::new(),
                    amount: Cents(60_000),
                    frequency: IncomeFrequency::Biweekly,
                },
                IncomeSource {
                    kind: IncomeKind::Pension,
                    description: String::new(),
                    amount: Cents(1_200_000),
                    frequency: IncomeFrequency::Annually,
                },
            ],
            reports_no_income: false,
        };
        assert_eq!(income.monthly_total(), Cents(130_000 + 100_000));
    }

    #[test]
    fn consent_signature_must_match_applicant() {
        let mut form = complete_form("snap", 0, Cents(1));
        let wrong = ConsentStep {
            attests_truthful: true,
            signature: "Someone Else".to_string(),
        };
        let result = form.save_step(StepInput::Consent(wrong), &ctx());
        assert!(matches!(result, Err(EligoError::Validation(_))));
    }

    #[test]
    fn renaming_applicant_clears_stale_consent() {
        let mut form = complete_form("snap", 0, Cents(1));
        let mut renamed = applicant();
        renamed.last_name = "Reyes-Ortiz".to_string();
        form.save_step(StepInput::Applicant(renamed), &ctx())
            .expect("saves");
        assert!(form.consent.is_none());
        assert_eq!(form.next_step(), Some(IntakeStep::Consent));
    }

    #[test]
    fn step_input_wire_format() {
        let json = r#"{"step":"program","program":"snap"}"#;
        let input: StepInput = serde_json::from_str(json).expect("parses");
        assert_eq!(input.step(), IntakeStep::Program);

        let bad = r#"{"step":"program","program":"SNAP!"}"#;
        assert!(serde_json::from_str::<StepInput>(bad).is_err());
    }

    fn frequency() -> impl Strategy<Value = IncomeFrequency> {
        prop_oneof![
            Just(IncomeFrequency::Weekly),
            Just(IncomeFrequency::Biweekly),
            Just(IncomeFrequency::Semimonthly),
            Just(IncomeFrequency::Monthly),
            Just(IncomeFrequency::Annually),
        ]
    }

    fn source() -> impl Strategy<Value = IncomeSource> {
        (1..=MAX_INCOME_AMOUNT.0, frequency()).prop_map(|(amount, frequency)| IncomeSource {
            kind: IncomeKind::Other,
            description: String::new(),
            amount: Cents(amount),
            frequency,
        })
    }

    proptest! {
        #[test]
        fn monthly_is_identity(amount in 0..=MAX_INCOME_AMOUNT.0) {
            prop_assert_eq!(IncomeFrequency::Monthly.to_monthly(Cents(amount)), Cents(amount));
        }

        #[test]
        fn normalization_is_monotone(freq in frequency(), a in 0..=MAX_INCOME_AMOUNT.0, b in 0..=MAX_INCOME_AMOUNT.0) {
            let (low, high) = (a.min(b), a.max(b));
            prop_assert!(freq.to_monthly(Cents(low)) <= freq.to_monthly(Cents(high)));
        }

        #[test]
        fn more_frequent_pay_is_never_less(amount in 0..=MAX_INCOME_AMOUNT.0) {
            let a = Cents(amount);
            let weekly = IncomeFrequency::Weekly.to_monthly(a);
            let biweekly = IncomeFrequency::Biweekly.to_monthly(a);
            let semimonthly = IncomeFrequency::Semimonthly.to_monthly(a);
            let monthly = IncomeFrequency::Monthly.to_monthly(a);
            let annually = IncomeFrequency::Annually.to_monthly(a);
            prop_assert!(weekly >= biweekly);
            prop_assert!(biweekly >= semimonthly);
            prop_assert!(semimonthly >= monthly);
            prop_assert!(monthly >= annually);
        }

        #[test]
        fn total_is_sum_of_sources(sources in proptest::collection::vec(source(), 0..=MAX_INCOME_SOURCES)) {
            let expected = sources
                .iter()
                .map(|s| s.frequency.to_monthly(s.amount).0)
                .fold(0u64, u64::saturating_add);
            let income = IncomeStep {
                reports_no_income: sources.is_empty(),
                sources,
            };
            prop_assert_eq!(income.monthly_total(), Cents(expected));
        }
    }
}
