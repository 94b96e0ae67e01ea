//! # Query Module
//!
//! Reviewer-side browsing: filtering, sorting and pagination over
//! applications.

use crate::application::Application;
use crate::eligibility::EligibilityOutcome;
use crate::{ApplicationId, ApplicationStatus, Cents, ProgramCode};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Default page size.
pub const DEFAULT_PER_PAGE: usize = 25;
/// Largest page size.
pub const MAX_PER_PAGE: usize = 100;

/// Sort orders for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Most recently submitted first.
    #[default]
    SubmittedDesc,
    SubmittedAsc,
    UpdatedDesc,
    /// Highest reported income first.
    IncomeDesc,
}

/// Listing criteria. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationFilter {
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    pub program: Option<ProgramCode>,
    #[serde(default)]
    pub outcome: Option<EligibilityOutcome>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    /// Case-insensitive match on name, email or reference.
    #[serde(default)]
    pub search: Option<String>,
    /// Inclusive lower bound on the submission date.
    #[serde(default)]
    pub submitted_from: Option<NaiveDate>,
    /// Inclusive upper bound on the submission date.
    #[serde(default)]
    pub submitted_to: Option<NaiveDate>,
    #[serde(default)]
    pub sort: SortOrder,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub per_page: Option<usize>,
}

impl ApplicationFilter {
    /// Whether `app` satisfies every criterion.
    ///
    /// Without an explicit status, drafts are excluded.
    #[must_use]
    pub fn matches(&self, app: &Application) -> bool {
        match self.status {
            Some(status) if app.status != status => return false,
            None if app.status == ApplicationStatus::Draft => return false,
            _ => {}
        }
        if let Some(program) = &self.program {
            if app.form.program() != Some(program) {
                return false;
            }
        }
        if let Some(outcome) = self.outcome {
            if app.system_outcome() != Some(outcome) {
                return false;
            }
        }
        if let Some(reviewer) = &self.assigned_to {
            if app.assigned_reviewer.as_ref() != Some(reviewer) {
                return false;
            }
        }
        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            let hit = app.form.applicant_name().to_lowercase().contains(&term)
                || app.form.applicant_email().to_lowercase().contains(&term)
                || app.reference().to_lowercase().contains(&term);
            if !hit {
                return false;
            }
        }
        if self.submitted_from.is_some() || self.submitted_to.is_some() {
            let Some(date) = app.submitted_at.map(|t| t.date_naive()) else {
                return false;
            };
            if self.submitted_from.is_some_and(|from| date < from)
                || self.submitted_to.is_some_and(|to| date > to)
            {
                return false;
            }
        }
        true
    }

    #[must_use]
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    #[must_use]
    pub fn per_page(&self) -> usize {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    /// Matching applications in sort order, unpaginated.
    #[must_use]
    pub fn apply<'a>(&self, apps: &'a [Application]) -> Vec<&'a Application> {
        let mut matched: Vec<&Application> = apps.iter().filter(|a| self.matches(a)).collect();
        matched.sort_by(|a, b| compare(self.sort, a, b));
        matched
    }

    /// One page of summaries.
    #[must_use]
    pub fn paginate(&self, apps: &[Application]) -> Page<ApplicationSummary> {
        let matched = self.apply(apps);
        let per_page = self.per_page();
        let page = self.page();
        let total = matched.len();
        let items = matched
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .map(ApplicationSummary::from)
            .collect();
        Page {
            items,
            page,
            per_page,
            total,
            total_pages: total.div_ceil(per_page),
        }
    }
}

fn compare(sort: SortOrder, a: &Application, b: &Application) -> Ordering {
    let primary = match sort {
        SortOrder::SubmittedDesc => b.submitted_at.cmp(&a.submitted_at),
        SortOrder::SubmittedAsc => a.submitted_at.cmp(&b.submitted_at),
        SortOrder::UpdatedDesc => b.updated_at.cmp(&a.updated_at),
        SortOrder::IncomeDesc => b.form.monthly_income().cmp(&a.form.monthly_income()),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

/// A page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// One row of a reviewer listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSummary {
    pub id: ApplicationId,
    pub reference: String,
    pub status: ApplicationStatus,
    pub program: Option<ProgramCode>,
    pub applicant_name: String,
    pub household_size: u8,
    pub monthly_income: Cents,
    pub system_outcome: Option<EligibilityOutcome>,
    pub assigned_reviewer: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Application> for ApplicationSummary {
    fn from(app: &Application) -> Self {
        Self {
            id: app.id,
            reference: app.reference(),
            status: app.status,
            program: app.form.program().cloned(),
            applicant_name: app.form.applicant_name(),
            household_size: app.form.household_size(),
            monthly_income: app.form.monthly_income(),
            system_outcome: app.system_outcome(),
            assigned_reviewer: app.assigned_reviewer.clone(),
            submitted_at: app.submitted_at,
            updated_at: app.updated_at,
        }
    }
}

/// Number of applications per status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub draft: usize,
    pub submitted: usize,
    pub under_review: usize,
    pub approved: usize,
    pub denied: usize,
}

impl StatusCounts {
    #[must_use]
    pub fn tally(apps: &[Application]) -> Self {
        let mut counts = Self::default();
        for app in apps {
            let slot = match app.status {
                ApplicationStatus::Draft => &mut counts.draft,
                ApplicationStatus::Submitted => &mut counts.submitted,
                ApplicationStatus::UnderReview => &mut counts.under_review,
                ApplicationStatus::Approved => &mut counts.approved,
                ApplicationStatus::Denied => &mut counts.denied,
            };
            *slot += 1;
        }
        counts
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tests::ready_draft;
    use crate::eligibility::tests::sample_table;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0)
            .single()
            .expect("valid instant")
    }

    /// Five applications: ids 1..=4 submitted on March 1..=4 with rising
    /// income, id 5 left as a draft.
    fn fixture() -> Vec<Application> {
        let table = sample_table();
        let mut apps: Vec<Application> = (1..=4u64)
            .map(|i| {
                let mut app = ready_draft(i, Cents::from_dollars(1_000 * i));
                app.submit(&table, at(i as u32)).expect("submits");
                app
            })
            .collect();
        apps.push(ready_draft(5, Cents(1)));
        apps[1].claim("rivera", at(10)).expect("claims");
        apps
    }

    fn ids(page: &Page<ApplicationSummary>) -> Vec<u64> {
        page.items.iter().map(|s| s.id.0).collect()
    }

    #[test]
    fn drafts_are_hidden_by_default() {
        let apps = fixture();
        let page = ApplicationFilter::default().paginate(&apps);
        assert_eq!(page.total, 4);
        assert_eq!(ids(&page), vec![4, 3, 2, 1]);

        let drafts = ApplicationFilter {
            status: Some(ApplicationStatus::Draft),
            ..Default::default()
        };
        assert_eq!(ids(&drafts.paginate(&apps)), vec![5]);
    }

    #[test]
    fn filter_by_status_and_assignee() {
        let apps = fixture();
        let filter = ApplicationFilter {
            status: Some(ApplicationStatus::UnderReview),
            assigned_to: Some("rivera".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&filter.paginate(&apps)), vec![2]);
    }

    #[test]
    fn filter_by_outcome() {
        // Household of 2, limit 2000.00: 1000 and 2000 eligible, 3000 and 4000 not.
        let apps = fixture();
        let filter = ApplicationFilter {
            outcome: Some(EligibilityOutcome::Ineligible),
            sort: SortOrder::SubmittedAsc,
            ..Default::default()
        };
        assert_eq!(ids(&filter.paginate(&apps)), vec![3, 4]);
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let apps = fixture();
        let filter = ApplicationFilter {
            submitted_from: NaiveDate::from_ymd_opt(2026, 3, 2),
            submitted_to: NaiveDate::from_ymd_opt(2026, 3, 3),
            sort: SortOrder::SubmittedAsc,
            ..Default::default()
        };
        assert_eq!(ids(&filter.paginate(&apps)), vec![2, 3]);
    }

    #[test]
    fn search_matches_reference_and_name() {
        let apps = fixture();
        let by_ref = ApplicationFilter {
            search: Some("app-000003".to_string()),
            ..Default::default()
        };
        assert_eq!(ids(&by_ref.paginate(&apps)), vec![3]);

        let by_name = ApplicationFilter {
            search: Some("REYES".to_string()),
            ..Default::default()
        };
        assert_eq!(by_name.paginate(&apps).total, 4);

        let miss = ApplicationFilter {
            search: Some("nobody".to_string()),
            ..Default::default()
        };
        assert_eq!(miss.paginate(&apps).total, 0);
    }

    #[test]
    fn income_sort() {
        let apps = fixture();
        let filter = ApplicationFilter {
            sort: SortOrder::IncomeDesc,
            ..Default::default()
        };
        assert_eq!(ids(&filter.paginate(&apps)), vec![4, 3, 2, 1]);
    }

    #[test]
    fn pagination_bounds() {
        let apps = fixture();
        let filter = ApplicationFilter {
            sort: SortOrder::SubmittedAsc,
            page: Some(2),
            per_page: Some(3),
            ..Default::default()
        };
        let page = filter.paginate(&apps);
        assert_eq!(ids(&page), vec![4]);
        assert_eq!(page.total_pages, 2);

        let beyond = ApplicationFilter {
            page: Some(9),
            ..Default::default()
        };
        assert!(beyond.paginate(&apps).items.is_empty());

        let clamped = ApplicationFilter {
            page: Some(0),
            per_page: Some(10_000),
            ..Default::default()
        };
        assert_eq!(clamped.page(), 1);
        assert_eq!(clamped.per_page(), MAX_PER_PAGE);
    }

    #[test]
    fn status_tally() {
        let counts = StatusCounts::tally(&fixture());
        assert_eq!(counts.draft, 1);
        assert_eq!(counts.submitted, 3);
        assert_eq!(counts.under_review, 1);
        assert_eq!(counts.approved + counts.denied, 0);
    }
}
