//! Purpose: Provide a stable, serializable validation report model.
//! Exports: `ValidationReport`, `ValidationStatus`, `ValidationIssue`, `issue`.
//! Role: Shared contract for caller-level checks run after a record is decoded.
//! Invariants: `issue_count` always equals `issues.len()`.
//! Invariants: A report with no issues is `Ok`; converting it into a result never fails.

use serde::Serialize;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Ok,
    Invalid,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ValidationReport {
    pub record: String,
    pub status: ValidationStatus,
    pub issues: Vec<ValidationIssue>,
    pub issue_count: usize,
}

impl ValidationReport {
    pub fn new(record: impl Into<String>) -> Self {
        Self {
            record: record.into(),
            status: ValidationStatus::Ok,
            issues: Vec::new(),
            issue_count: 0,
        }
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
        self.issue_count = self.issues.len();
        self.status = ValidationStatus::Invalid;
    }

    pub fn with_issues(mut self, issues: Vec<ValidationIssue>) -> Self {
        self.issue_count = issues.len();
        self.issues = issues;
        self.status = if self.issue_count == 0 {
            ValidationStatus::Ok
        } else {
            ValidationStatus::Invalid
        };
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ValidationStatus::Ok
    }

    /// Turn an invalid report into a `Validation` error carrying every issue.
    pub fn into_result(self) -> Result<(), Error> {
        if self.is_ok() {
            return Ok(());
        }
        let summary = self
            .issues
            .iter()
            .map(|issue| format!("{}: {}", issue.field, issue.message))
            .collect::<Vec<_>>()
            .join("; ");
        let codes = self
            .issues
            .iter()
            .map(|issue| issue.code.as_str())
            .collect::<Vec<_>>()
            .join(",");
        Err(Error::new(ErrorKind::Validation)
            .with_message(format!("invalid {}: {summary}", self.record))
            .with_hint(format!("issue codes: {codes}")))
    }
}

pub fn issue(field: &str, code: &str, message: impl Into<String>) -> ValidationIssue {
    ValidationIssue {
        field: field.to_string(),
        code: code.to_string(),
        message: message.into(),
    }
}
