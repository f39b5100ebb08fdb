// ✅ Data Quality - recoverable per-row issues
//
// Nothing here aborts a stage. Each issue is handed to an injected WarningSink,
// the row gets default/blank values, and processing continues.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;

// ============================================================================
// ISSUE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueKind {
    UnparsableNumber,
    EmptyCanonicalKey,
    DuplicateCanonicalKey,
    PartyMismatch,
    MissingConstituency,
    InvalidEcRef,
    DuplicateUnit,
    MissingName,
    NegativeReconciliation,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::UnparsableNumber => "unparsable_number",
            IssueKind::EmptyCanonicalKey => "empty_canonical_key",
            IssueKind::DuplicateCanonicalKey => "duplicate_canonical_key",
            IssueKind::PartyMismatch => "party_mismatch",
            IssueKind::MissingConstituency => "missing_constituency",
            IssueKind::InvalidEcRef => "invalid_ecref",
            IssueKind::DuplicateUnit => "duplicate_unit",
            IssueKind::MissingName => "missing_name",
            IssueKind::NegativeReconciliation => "negative_reconciliation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning, // Needs a human to look at it
    Info,    // Expected noise, counted but not alarming
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    /// 1-based data row (header excluded), when the issue is tied to a row
    pub row: Option<usize>,
    pub message: String,
}

impl DataIssue {
    pub fn warning(kind: IssueKind, message: impl Into<String>) -> Self {
        DataIssue {
            kind,
            severity: Severity::Warning,
            row: None,
            message: message.into(),
        }
    }

    pub fn info(kind: IssueKind, message: impl Into<String>) -> Self {
        DataIssue {
            kind,
            severity: Severity::Info,
            row: None,
            message: message.into(),
        }
    }

    pub fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }
}

impl fmt::Display for DataIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "[{}] row {}: {}", self.kind.as_str(), row, self.message),
            None => write!(f, "[{}] {}", self.kind.as_str(), self.message),
        }
    }
}

// ============================================================================
// SINKS
// ============================================================================

/// Receives recoverable issues as a stage runs.
pub trait WarningSink {
    fn report(&self, issue: DataIssue);
}

/// Forwards every issue to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl WarningSink for TracingSink {
    fn report(&self, issue: DataIssue) {
        match issue.severity {
            Severity::Warning => tracing::warn!(kind = issue.kind.as_str(), row = ?issue.row, "{}", issue.message),
            Severity::Info => tracing::info!(kind = issue.kind.as_str(), row = ?issue.row, "{}", issue.message),
        }
    }
}

/// Keeps issues in memory, optionally forwarding them to tracing as well.
#[derive(Debug, Default)]
pub struct CollectingSink {
    issues: RefCell<Vec<DataIssue>>,
    forward: bool,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect and also log through `TracingSink`
    pub fn forwarding() -> Self {
        CollectingSink {
            issues: RefCell::new(Vec::new()),
            forward: true,
        }
    }

    pub fn issues(&self) -> Vec<DataIssue> {
        self.issues.borrow().clone()
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.issues.borrow().iter().filter(|i| i.kind == kind).count()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.borrow().is_empty()
    }

    pub fn summary(&self) -> IssueSummary {
        let issues = self.issues.borrow();
        IssueSummary {
            total: issues.len(),
            warnings: issues.iter().filter(|i| i.severity == Severity::Warning).count(),
            infos: issues.iter().filter(|i| i.severity == Severity::Info).count(),
        }
    }
}

impl WarningSink for CollectingSink {
    fn report(&self, issue: DataIssue) {
        if self.forward {
            TracingSink.report(issue.clone());
        }
        self.issues.borrow_mut().push(issue);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub total: usize,
    pub warnings: usize,
    pub infos: usize,
}

impl IssueSummary {
    pub fn summary(&self) -> String {
        format!(
            "{} issues ({} warnings, {} info)",
            self.total, self.warnings, self.infos
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================
