//! # Application Module
//!
//! The application record and its status workflow.
//!
//! ```text
//! draft ──submit──► submitted ──claim──► under_review ──decide──► approved
//!                       ▲                     │                 └► denied
//!                       └──────release────────┘
//! ```
//!
//! Every change appends a [`HistoryEntry`]. Legal moves are defined once in
//! [`ApplicationStatus::can_transition_to`].

use crate::documents::{DocumentKind, DocumentMeta};
use crate::eligibility::{self, EligibilityDetermination, EligibilityOutcome, IncomeLimitTable};
use crate::intake::{IntakeForm, StepInput};
use crate::validation::{ValidationContext, ValidationErrors};
use crate::{Actor, ApplicationId, ApplicationStatus, DocumentId, EligoError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of notes and decision notes.
pub const MAX_NOTE_LEN: usize = 2000;

// =============================================================================
// RECORD TYPES
// =============================================================================

/// Reviewer verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approve,
    Deny,
}

impl Verdict {
    #[must_use]
    pub fn target_status(&self) -> ApplicationStatus {
        match self {
            Self::Approve => ApplicationStatus::Approved,
            Self::Deny => ApplicationStatus::Denied,
        }
    }
}

/// A decision request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,
    #[serde(default)]
    pub note: String,
}

/// A recorded decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub verdict: Verdict,
    pub reviewer: String,
    pub note: String,
    pub decided_at: DateTime<Utc>,
    /// System outcome the reviewer saw when deciding.
    pub system_outcome_at_decision: Option<EligibilityOutcome>,
}

/// Free-text reviewer note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewNote {
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// An entry in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,
    pub actor: Actor,
    /// Status before the event. `None` for creation and non-status events.
    pub from: Option<ApplicationStatus>,
    pub to: ApplicationStatus,
    pub message: String,
}

/// A benefit application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub status: ApplicationStatus,
    pub form: IntakeForm,
    pub documents: Vec<DocumentMeta>,
    pub next_document_id: u64,
    pub system_result: Option<EligibilityDetermination>,
    pub decision: Option<ReviewDecision>,
    pub assigned_reviewer: Option<String>,
    pub notes: Vec<ReviewNote>,
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

// =============================================================================
// WORKFLOW
// =============================================================================

impl Application {
    /// A new draft.
    #[must_use]
    pub fn start(id: ApplicationId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            status: ApplicationStatus::Draft,
            form: IntakeForm::new(),
            documents: Vec::new(),
            next_document_id: 1,
            system_result: None,
            decision: None,
            assigned_reviewer: None,
            notes: Vec::new(),
            history: vec![HistoryEntry {
                at: now,
                actor: Actor::Applicant,
                from: None,
                to: ApplicationStatus::Draft,
                message: "application started".to_string(),
            }],
            created_at: now,
            updated_at: now,
            submitted_at: None,
        }
    }

    /// `APP-000042` style reference.
    #[must_use]
    pub fn reference(&self) -> String {
        self.id.reference()
    }

    /// System outcome, if evaluated.
    #[must_use]
    pub fn system_outcome(&self) -> Option<EligibilityOutcome> {
        self.system_result.as_ref().map(|r| r.outcome)
    }

    fn ensure_draft(&self) -> Result<()> {
        if self.status == ApplicationStatus::Draft {
            Ok(())
        } else {
            Err(EligoError::FormLocked(self.status))
        }
    }

    fn transition(
        &mut self,
        to: ApplicationStatus,
        actor: Actor,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(EligoError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.history.push(HistoryEntry {
            at: now,
            actor,
            from: Some(self.status),
            to,
            message: message.into(),
        });
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    fn record(&mut self, actor: Actor, message: impl Into<String>, now: DateTime<Utc>) {
        self.history.push(HistoryEntry {
            at: now,
            actor,
            from: None,
            to: self.status,
            message: message.into(),
        });
        self.updated_at = now;
    }

    fn ensure_assigned(&self, reviewer: &str) -> Result<()> {
        match self.assigned_reviewer.as_deref() {
            Some(assigned) if assigned == reviewer => Ok(()),
            _ => Err(EligoError::NotAssigned),
        }
    }

    /// Save one intake step. Draft only.
    pub fn save_step(
        &mut self,
        input: StepInput,
        table: &IncomeLimitTable,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_draft()?;
        if let StepInput::Program(program) = &input {
            if !table.contains(&program.program) {
                return Err(EligoError::UnknownProgram(program.program.to_string()));
            }
        }
        let ctx = ValidationContext::new(now.date_naive());
        self.form.save_step(input, &ctx)?;
        self.updated_at = now;
        Ok(())
    }

    /// Id for the next attached document.
    #[must_use]
    pub fn peek_document_id(&self) -> DocumentId {
        DocumentId(self.next_document_id)
    }

    /// Attach an uploaded document. Draft only.
    pub fn attach_document(
        &mut self,
        meta: DocumentMeta,
        max_documents: usize,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_draft()?;
        if self.documents.len() >= max_documents {
            return Err(EligoError::DocumentLimit(max_documents));
        }
        if meta.id.0 != self.next_document_id {
            return Err(EligoError::Duplicate(format!("document id {}", meta.id)));
        }
        self.next_document_id = self.next_document_id.saturating_add(1);
        self.documents.push(meta);
        self.updated_at = now;
        Ok(())
    }

    /// Remove a document. Draft only. Returns the removed metadata.
    pub fn remove_document(&mut self, id: DocumentId, now: DateTime<Utc>) -> Result<DocumentMeta> {
        self.ensure_draft()?;
        let index = self
            .documents
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| EligoError::NotFound(format!("document {id}")))?;
        self.updated_at = now;
        Ok(self.documents.remove(index))
    }

    #[must_use]
    pub fn document(&self, id: DocumentId) -> Option<&DocumentMeta> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// Required document kinds not yet attached.
    #[must_use]
    pub fn missing_documents(&self, table: &IncomeLimitTable) -> Vec<DocumentKind> {
        let Some(limits) = self.form.program().and_then(|p| table.program(p)) else {
            return Vec::new();
        };
        limits
            .required_documents
            .iter()
            .copied()
            .filter(|kind| !self.documents.iter().any(|d| d.kind == *kind))
            .collect()
    }

    /// Submit the draft and record the system eligibility result.
    pub fn submit(
        &mut self,
        table: &IncomeLimitTable,
        now: DateTime<Utc>,
    ) -> Result<&EligibilityDetermination> {
        self.ensure_draft()?;
        let missing = self.form.missing_steps();
        if !missing.is_empty() {
            return Err(EligoError::Incomplete { missing });
        }
        let program = self
            .form
            .program()
            .cloned()
            .ok_or(EligoError::Incomplete {
                missing: vec![crate::IntakeStep::Program],
            })?;
        if !table.contains(&program) {
            return Err(EligoError::UnknownProgram(program.to_string()));
        }
        let missing_documents = self.missing_documents(table);
        if !missing_documents.is_empty() {
            return Err(EligoError::MissingDocuments(missing_documents));
        }

        let determination = eligibility::evaluate(
            table,
            &program,
            self.form.household_size(),
            self.form.monthly_income(),
            now,
        );
        self.transition(
            ApplicationStatus::Submitted,
            Actor::Applicant,
            "application submitted",
            now,
        )?;
        self.record(
            Actor::System,
            format!("eligibility {}: {}", determination.outcome, determination.reason),
            now,
        );
        self.submitted_at = Some(now);
        Ok(&*self.system_result.insert(determination))
    }

    /// Take a submitted application for review.
    pub fn claim(&mut self, reviewer: &str, now: DateTime<Utc>) -> Result<()> {
        self.transition(
            ApplicationStatus::UnderReview,
            Actor::Reviewer(reviewer.to_string()),
            "claimed for review",
            now,
        )?;
        self.assigned_reviewer = Some(reviewer.to_string());
        Ok(())
    }

    /// Return a claimed application to the queue.
    pub fn release(&mut self, reviewer: &str, now: DateTime<Utc>) -> Result<()> {
        if self.status == ApplicationStatus::UnderReview {
            self.ensure_assigned(reviewer)?;
        }
        self.transition(
            ApplicationStatus::Submitted,
            Actor::Reviewer(reviewer.to_string()),
            "released back to queue",
            now,
        )?;
        self.assigned_reviewer = None;
        Ok(())
    }

    /// Approve or deny. Only the assigned reviewer may decide, and a denial
    /// needs a note.
    pub fn decide(&mut self, reviewer: &str, decision: Decision, now: DateTime<Utc>) -> Result<()> {
        let to = decision.verdict.target_status();
        if self.status != ApplicationStatus::UnderReview {
            return Err(EligoError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.ensure_assigned(reviewer)?;
        let note = decision.note.trim().to_string();
        if decision.verdict == Verdict::Deny && note.is_empty() {
            return Err(EligoError::Validation(ValidationErrors::single(
                "note",
                "a reason is required when denying",
            )));
        }
        if note.chars().count() > MAX_NOTE_LEN {
            return Err(EligoError::Validation(ValidationErrors::single(
                "note",
                format!("must be at most {MAX_NOTE_LEN} characters"),
            )));
        }
        let system_outcome = self.system_outcome();
        let message = match system_outcome {
            Some(outcome) => format!("decided {} (system result {outcome})", to),
            None => format!("decided {}", to),
        };
        self.transition(to, Actor::Reviewer(reviewer.to_string()), message, now)?;
        self.decision = Some(ReviewDecision {
            verdict: decision.verdict,
            reviewer: reviewer.to_string(),
            note,
            decided_at: now,
            system_outcome_at_decision: system_outcome,
        });
        Ok(())
    }

    /// Attach a reviewer note. Not allowed on drafts.
    pub fn add_note(&mut self, author: &str, body: &str, now: DateTime<Utc>) -> Result<()> {
        if self.status == ApplicationStatus::Draft {
            return Err(EligoError::ActionNotAllowed {
                action: "add a note to",
                status: self.status,
            });
        }
        let body = body.trim();
        if body.is_empty() || body.chars().count() > MAX_NOTE_LEN {
            return Err(EligoError::Validation(ValidationErrors::single(
                "body",
                format!("must be 1 to {MAX_NOTE_LEN} characters"),
            )));
        }
        self.notes.push(ReviewNote {
            author: author.to_string(),
            body: body.to_string(),
            created_at: now,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Re-run eligibility against the current table. Only for applications
    /// awaiting or under review.
    pub fn recalculate(
        &mut self,
        table: &IncomeLimitTable,
        now: DateTime<Utc>,
    ) -> Result<&EligibilityDetermination> {
        if !matches!(
            self.status,
            ApplicationStatus::Submitted | ApplicationStatus::UnderReview
        ) {
            return Err(EligoError::ActionNotAllowed {
                action: "recalculate",
                status: self.status,
            });
        }
        let program = self
            .form
            .program()
            .cloned()
            .ok_or_else(|| EligoError::NotFound("selected program".to_string()))?;
        let determination = eligibility::evaluate(
            table,
            &program,
            self.form.household_size(),
            self.form.monthly_income(),
            now,
        );
        self.record(
            Actor::System,
            format!("eligibility recalculated {}: {}", determination.outcome, determination.reason),
            now,
        );
        Ok(&*self.system_result.insert(determination))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::documents::ContentType;
    use crate::eligibility::tests::sample_table;
    use crate::intake::tests::complete_form;
    use crate::{Cents, ProgramCode};

    pub(crate) fn identity_doc(app: &Application) -> DocumentMeta {
        DocumentMeta::new(
            app.peek_document_id(),
            DocumentKind::Identity,
            "id.pdf",
            ContentType::Pdf,
            b"%PDF-1.4",
            Utc::now(),
        )
    }

    /// A draft with a complete form and the identity document snap requires.
    pub(crate) fn ready_draft(id: u64, income: Cents) -> Application {
        let mut app = Application::start(ApplicationId(id), Utc::now());
        app.form = complete_form("snap", 1, income);
        let doc = identity_doc(&app);
        app.attach_document(doc, 10, Utc::now()).expect("attaches");
        app
    }

    #[test]
    fn start_creates_draft_with_history() {
        let app = Application::start(ApplicationId(1), Utc::now());
        assert_eq!(app.status, ApplicationStatus::Draft);
        assert_eq!(app.history.len(), 1);
        assert_eq!(app.form.next_step(), Some(crate::IntakeStep::Applicant));
    }

    #[test]
    fn program_step_must_be_in_catalog() {
        let table = sample_table();
        let mut app = Application::start(ApplicationId(1), Utc::now());
        app.form = complete_form("snap", 0, Cents(1));
        let input = StepInput::Program(crate::intake::ProgramStep {
            program: ProgramCode::new("wic").expect("code"),
        });
        let result = app.save_step(input, &table, Utc::now());
        assert!(matches!(result, Err(EligoError::UnknownProgram(_))));
    }

    #[test]
    fn submit_records_eligible_result() {
        let table = sample_table();
        let mut app = ready_draft(1, Cents::from_dollars(1_900));
        let outcome = app.submit(&table, Utc::now()).map(|r| r.outcome);
        assert_eq!(outcome.ok(), Some(EligibilityOutcome::Eligible));
        assert_eq!(app.status, ApplicationStatus::Submitted);
        assert!(app.submitted_at.is_some());
        assert_eq!(
            app.system_result.as_ref().and_then(|r| r.income_limit),
            Some(Cents::from_dollars(2_000))
        );
        let last = app.history.last().map(|h| h.actor.clone());
        assert_eq!(last, Some(Actor::System));
    }

    #[test]
    fn submit_records_ineligible_result() {
        let table = sample_table();
        let mut app = ready_draft(1, Cents::from_dollars(2_001));
        let outcome = app.submit(&table, Utc::now()).map(|r| r.outcome);
        assert_eq!(outcome.ok(), Some(EligibilityOutcome::Ineligible));
    }

    #[test]
    fn submit_requires_complete_form() {
        let table = sample_table();
        let mut app = Application::start(ApplicationId(1), Utc::now());
        let result = app.submit(&table, Utc::now());
        assert!(matches!(result, Err(EligoError::Incomplete { missing }) if missing.len() == 5));
        assert_eq!(app.status, ApplicationStatus::Draft);
    }

    #[test]
    fn submit_requires_documents() {
        let table = sample_table();
        let mut app = Application::start(ApplicationId(1), Utc::now());
        app.form = complete_form("snap", 0, Cents(1));
        let result = app.submit(&table, Utc::now());
        assert!(matches!(
            result,
            Err(EligoError::MissingDocuments(kinds)) if kinds == vec![DocumentKind::Identity]
        ));
    }

    #[test]
    fn submitted_form_is_locked() {
        let table = sample_table();
        let mut app = ready_draft(1, Cents(1));
        app.submit(&table, Utc::now()).expect("submits");
        let result = app.save_step(
            StepInput::Household(crate::intake::HouseholdStep::default()),
            &table,
            Utc::now(),
        );
        assert!(matches!(result, Err(EligoError::FormLocked(ApplicationStatus::Submitted))));
        assert!(app.submit(&table, Utc::now()).is_err());
        let doc = identity_doc(&app);
        assert!(app.attach_document(doc, 10, Utc::now()).is_err());
    }

    #[test]
    fn document_limit() {
        let mut app = Application::start(ApplicationId(1), Utc::now());
        let first = identity_doc(&app);
        app.attach_document(first, 1, Utc::now()).expect("attaches");
        let second = identity_doc(&app);
        assert!(matches!(
            app.attach_document(second, 1, Utc::now()),
            Err(EligoError::DocumentLimit(1))
        ));
    }

    #[test]
    fn remove_document_keeps_ids_monotonic() {
        let mut app = Application::start(ApplicationId(1), Utc::now());
        let first = identity_doc(&app);
        app.attach_document(first, 5, Utc::now()).expect("attaches");
        app.remove_document(DocumentId(1), Utc::now()).expect("removes");
        assert!(app.documents.is_empty());
        assert_eq!(app.peek_document_id(), DocumentId(2));
        assert!(app.remove_document(DocumentId(1), Utc::now()).is_err());
    }

    #[test]
    fn full_review_cycle() {
        let table = sample_table();
        let mut app = ready_draft(1, Cents(1));
        app.submit(&table, Utc::now()).expect("submits");

        app.claim("rivera", Utc::now()).expect("claims");
        assert_eq!(app.status, ApplicationStatus::UnderReview);
        assert_eq!(app.assigned_reviewer.as_deref(), Some("rivera"));

        let approve = Decision {
            verdict: Verdict::Approve,
            note: String::new(),
        };
        app.decide("rivera", approve, Utc::now()).expect("decides");
        assert_eq!(app.status, ApplicationStatus::Approved);
        let decision = app.decision.as_ref().expect("recorded");
        assert_eq!(decision.system_outcome_at_decision, Some(EligibilityOutcome::Eligible));
    }

    #[test]
    fn decide_requires_claim_and_assignment() {
        let table = sample_table();
        let mut app = ready_draft(1, Cents(1));
        app.submit(&table, Utc::now()).expect("submits");

        let approve = Decision {
            verdict: Verdict::Approve,
            note: String::new(),
        };
        assert!(matches!(
            app.decide("rivera", approve.clone(), Utc::now()),
            Err(EligoError::InvalidTransition { .. })
        ));

        app.claim("rivera", Utc::now()).expect("claims");
        assert!(matches!(
            app.decide("chen", approve, Utc::now()),
            Err(EligoError::NotAssigned)
        ));
    }

    #[test]
    fn deny_needs_note_and_may_override_system() {
        let table = sample_table();
        let mut app = ready_draft(1, Cents(1));
        app.submit(&table, Utc::now()).expect("submits");
        app.claim("rivera", Utc::now()).expect("claims");

        let bare = Decision {
            verdict: Verdict::Deny,
            note: "  ".to_string(),
        };
        assert!(matches!(
            app.decide("rivera", bare, Utc::now()),
            Err(EligoError::Validation(_))
        ));

        let reasoned = Decision {
            verdict: Verdict::Deny,
            note: "Residency outside service area".to_string(),
        };
        app.decide("rivera", reasoned, Utc::now()).expect("decides");
        assert_eq!(app.status, ApplicationStatus::Denied);
        assert!(app.claim("rivera", Utc::now()).is_err());
    }

    #[test]
    fn release_only_by_assignee() {
        let table = sample_table();
        let mut app = ready_draft(1, Cents(1));
        app.submit(&table, Utc::now()).expect("submits");
        app.claim("rivera", Utc::now()).expect("claims");
        assert!(matches!(app.release("chen", Utc::now()), Err(EligoError::NotAssigned)));
        app.release("rivera", Utc::now()).expect("releases");
        assert_eq!(app.status, ApplicationStatus::Submitted);
        assert!(app.assigned_reviewer.is_none());
    }

    #[test]
    fn notes_rejected_on_drafts() {
        let mut app = Application::start(ApplicationId(1), Utc::now());
        let result = app.add_note("rivera", "hello", Utc::now());
        assert!(matches!(
            result,
            Err(EligoError::ActionNotAllowed { status: ApplicationStatus::Draft, .. })
        ));
    }

    #[test]
    fn recalculate_needs_pending_review() {
        let table = sample_table();
        let mut draft = ready_draft(1, Cents::from_dollars(1_000));
        let result = draft.recalculate(&table, Utc::now()).map(|r| r.outcome);
        assert!(matches!(
            result,
            Err(EligoError::ActionNotAllowed { action: "recalculate", status: ApplicationStatus::Draft })
        ));
    }

    #[test]
    fn recalculate_uses_new_limits() {
        let mut table = sample_table();
        let mut app = ready_draft(1, Cents::from_dollars(1_900));
        app.submit(&table, Utc::now()).expect("submits");

        if let Some(p) = table.programs.get_mut(&ProgramCode::new("snap").expect("code")) {
            p.monthly_limits.insert(2, Cents::from_dollars(1_800));
        }
        let outcome = app.recalculate(&table, Utc::now()).map(|r| r.outcome);
        assert_eq!(outcome.ok(), Some(EligibilityOutcome::Ineligible));
        assert_eq!(app.status, ApplicationStatus::Submitted);
    }
}
