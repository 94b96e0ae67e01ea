//! # Export Module
//!
//! CSV export of applications for offline reporting.
//!
//! Output follows RFC 4180 (CRLF line endings, quoted fields where needed).
//! Cells that a spreadsheet would evaluate as a formula are prefixed with a
//! single quote.

use crate::application::{Application, Verdict};

/// Column headers, in output order.
pub const CSV_COLUMNS: [&str; 13] = [
    "reference",
    "status",
    "program",
    "applicant_name",
    "email",
    "household_size",
    "monthly_income",
    "income_limit",
    "system_outcome",
    "decision",
    "decided_by",
    "submitted_at",
    "decided_at",
];

/// Quote and neutralize one cell.
#[must_use]
pub fn escape_field(value: &str) -> String {
    let neutralized = if value.starts_with(['=', '+', '-', '@']) {
        format!("'{value}")
    } else {
        value.to_string()
    };
    if neutralized.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", neutralized.replace('"', "\"\""))
    } else {
        neutralized
    }
}

fn row(app: &Application) -> Vec<String> {
    let result = app.system_result.as_ref();
    let decision = app.decision.as_ref();
    vec![
        app.reference(),
        app.status.to_string(),
        app.form.program().map(ToString::to_string).unwrap_or_default(),
        app.form.applicant_name(),
        app.form.applicant_email(),
        app.form.household_size().to_string(),
        app.form.monthly_income().to_string(),
        result
            .and_then(|r| r.income_limit)
            .map(|l| l.to_string())
            .unwrap_or_default(),
        result.map(|r| r.outcome.to_string()).unwrap_or_default(),
        decision
            .map(|d| match d.verdict {
                Verdict::Approve => "approve".to_string(),
                Verdict::Deny => "deny".to_string(),
            })
            .unwrap_or_default(),
        decision.map(|d| d.reviewer.clone()).unwrap_or_default(),
        app.submitted_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        decision.map(|d| d.decided_at.to_rfc3339()).unwrap_or_default(),
    ]
}

/// Render applications as CSV with a header row.
#[must_use]
pub fn export_csv<'a>(apps: impl IntoIterator<Item = &'a Application>) -> String {
    let mut out = CSV_COLUMNS.join(",");
    out.push_str("\r\n");
    for app in apps {
        let cells: Vec<String> = row(app).iter().map(|c| escape_field(c)).collect();
        out.push_str(&cells.join(","));
        out.push_str("\r\n");
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::Decision;
    use crate::application::tests::ready_draft;
    use crate::eligibility::tests::sample_table;
    use crate::Cents;
    use chrono::Utc;

    #[test]
    fn escaping() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("line\nbreak"), "\"line\nbreak\"");
        assert_eq!(escape_field("=SUM(A1)"), "'=SUM(A1)");
        assert_eq!(escape_field("-1,2"), "\"'-1,2\"");
    }

    #[test]
    fn header_only_for_empty_input() {
        let csv = export_csv(std::iter::empty());
        assert_eq!(csv, format!("{}\r\n", CSV_COLUMNS.join(",")));
    }

    #[test]
    fn decided_row() {
        let table = sample_table();
        let mut app = ready_draft(7, Cents(123_456));
        app.submit(&table, Utc::now()).expect("submits");
        app.claim("rivera", Utc::now()).expect("claims");
        app.decide(
            "rivera",
            Decision {
                verdict: crate::Verdict::Approve,
                note: String::new(),
            },
            Utc::now(),
        )
        .expect("decides");

        let csv = export_csv(std::slice::from_ref(&app));
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines.len(), 3);
        let cells: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(cells.len(), CSV_COLUMNS.len());
        assert_eq!(cells[0], "APP-000007");
        assert_eq!(cells[1], "approved");
        assert_eq!(cells[2], "snap");
        assert_eq!(cells[3], "Ana Reyes");
        assert_eq!(cells[5], "2");
        assert_eq!(cells[6], "1234.56");
        assert_eq!(cells[7], "2000.00");
        assert_eq!(cells[8], "eligible");
        assert_eq!(cells[9], "approve");
        assert_eq!(cells[10], "rivera");
    }
}
