//! Findings of [`Network::validate_into`](crate::Network::validate_into).
//!
//! Validation collects every problem instead of stopping at the first one.
//! Errors make a network unusable for a cascade run; warnings are reported
//! and the run goes ahead.
//!
//! ```
//! use cascade_core::diagnostics::{Diagnostics, IssueCategory};
//! use cascade_core::GenId;
//!
//! let mut diag = Diagnostics::new();
//! diag.warn(IssueCategory::Structure, "Network has no load");
//! diag.error_on(IssueCategory::Reference, GenId::new(3), "Generator references unknown bus 9");
//!
//! assert_eq!(diag.summary(), "1 error, 1 warning");
//! assert!(diag.has_errors());
//! ```

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// Which part of the data an issue is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    /// Missing or duplicated records
    Structure,
    /// A record naming a bus the network does not have
    Reference,
    /// Values the power-flow solve cannot use
    Physical,
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IssueCategory::Structure => "structure",
            IssueCategory::Reference => "reference",
            IssueCategory::Physical => "physical",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    pub category: IssueCategory,
    pub message: String,
    /// Record the issue is about, e.g. "Branch 3"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] ", self.severity, self.category)?;
        if let Some(entity) = &self.entity {
            write!(f, "{entity}: ")?;
        }
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        &mut self,
        severity: Severity,
        category: IssueCategory,
        entity: Option<String>,
        message: impl Into<String>,
    ) {
        self.issues.push(DiagnosticIssue {
            severity,
            category,
            message: message.into(),
            entity,
        });
    }

    pub fn warn(&mut self, category: IssueCategory, message: impl Into<String>) {
        self.push(Severity::Warning, category, None, message);
    }

    pub fn error(&mut self, category: IssueCategory, message: impl Into<String>) {
        self.push(Severity::Error, category, None, message);
    }

    pub fn warn_on(
        &mut self,
        category: IssueCategory,
        entity: impl fmt::Display,
        message: impl Into<String>,
    ) {
        self.push(Severity::Warning, category, Some(entity.to_string()), message);
    }

    pub fn error_on(
        &mut self,
        category: IssueCategory,
        entity: impl fmt::Display,
        message: impl Into<String>,
    ) {
        self.push(Severity::Error, category, Some(entity.to_string()), message);
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.with_severity(Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticIssue> {
        self.with_severity(Severity::Warning)
    }

    fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.severity == severity)
    }

    /// "clean", or counts such as "2 errors, 1 warning".
    pub fn summary(&self) -> String {
        let counted = |n: usize, noun: &str| match n {
            1 => format!("1 {noun}"),
            n => format!("{n} {noun}s"),
        };
        let parts: Vec<String> = [
            (self.errors().count(), "error"),
            (self.warnings().count(), "warning"),
        ]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, noun)| counted(n, noun))
        .collect();
        if parts.is_empty() {
            "clean".to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {issue}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BranchId;

    #[test]
    fn test_counts_by_severity() {
        let mut diag = Diagnostics::new();
        assert!(diag.is_empty());
        diag.warn(IssueCategory::Structure, "no generators");
        diag.error(IssueCategory::Reference, "dangling generator");
        diag.warn_on(IssueCategory::Physical, BranchId::new(2), "flow on failed branch");

        assert_eq!(diag.warnings().count(), 2);
        assert_eq!(diag.errors().count(), 1);
        assert!(diag.has_errors());
    }

    #[test]
    fn test_issue_display() {
        let mut diag = Diagnostics::new();
        diag.error_on(IssueCategory::Reference, BranchId::new(14), "unknown bus");
        assert_eq!(
            diag.issues[0].to_string(),
            "error [reference] Branch 14: unknown bus"
        );
    }

    #[test]
    fn test_summary() {
        let mut diag = Diagnostics::new();
        assert_eq!(diag.summary(), "clean");
        diag.warn(IssueCategory::Structure, "a");
        assert_eq!(diag.summary(), "1 warning");
        diag.error(IssueCategory::Structure, "b");
        diag.warn(IssueCategory::Structure, "c");
        assert_eq!(diag.summary(), "1 error, 2 warnings");
    }

    #[test]
    fn test_serializes_categories_lowercase() {
        let mut diag = Diagnostics::new();
        diag.error_on(IssueCategory::Reference, "Gen 1", "Invalid bus");
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"severity\":\"error\""));
        assert!(json.contains("\"category\":\"reference\""));
        assert!(json.contains("\"entity\":\"Gen 1\""));
    }
}
