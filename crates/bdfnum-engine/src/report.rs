//! Validation findings and the run report.
//!
//! Every check collects into a [`ValidationReport`]; nothing stops at the
//! first problem. Errors block the run, Warnings do not.

use bdfnum_deck::Namespace;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// Missing include, duplicate definition, reserved ID.
    Structural,
    /// A range has fewer slots than the IDs it must hold.
    Capacity,
    /// Two ranges of one namespace intersect.
    Overlap,
    /// A range starts below 1 or ends before it starts.
    Positivity,
    /// A file has IDs in a namespace but no range for it.
    MissingRange,
    DanglingReference,
    /// The written deck does not hold the same records as the source.
    CountMismatch,
    /// A card type without rewrite rules was passed through unchanged.
    UnmappedType,
    ControlEntry,
    /// The written deck could not be read back.
    Io,
}

impl FindingKind {
    pub fn key(self) -> &'static str {
        match self {
            FindingKind::Structural => "structural",
            FindingKind::Capacity => "capacity",
            FindingKind::Overlap => "overlap",
            FindingKind::Positivity => "positivity",
            FindingKind::MissingRange => "missing-range",
            FindingKind::DanglingReference => "dangling-reference",
            FindingKind::CountMismatch => "count-mismatch",
            FindingKind::UnmappedType => "unmapped-type",
            FindingKind::ControlEntry => "control-entry",
            FindingKind::Io => "io",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub kind: FindingKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<Namespace>,
    /// The offending ID, when the finding is about one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
}

impl Finding {
    pub fn error(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
            file: None,
            namespace: None,
            id: None,
        }
    }

    pub fn warning(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            message: message.into(),
            file: None,
            namespace: None,
            id: None,
        }
    }

    pub fn in_file(mut self, file: &Path) -> Self {
        self.file = Some(file.to_path_buf());
        self
    }

    pub fn in_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = Some(namespace);
        self
    }

    pub fn in_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{severity}[{}]", self.kind)?;
        if let Some(file) = &self.file {
            write!(f, " {}", file.display())?;
        }
        match (self.namespace, self.id) {
            (Some(ns), Some(id)) => write!(f, " ({ns} {id})")?,
            (Some(ns), None) => write!(f, " ({ns})")?,
            (None, Some(id)) => write!(f, " (id {id})")?,
            (None, None) => {}
        }
        write!(f, ": {}", self.message)
    }
}

// ============================================================================
// Report
// ============================================================================

/// Outcome of a run, derived from the findings collected so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    SuccessWithWarnings,
    Failure,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        self.findings.extend(findings);
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.findings.extend(other.findings);
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(Finding::is_error)
    }

    pub fn of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn status(&self) -> RunStatus {
        if self.has_errors() {
            RunStatus::Failure
        } else if self.findings.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::SuccessWithWarnings
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for finding in &self.findings {
            writeln!(f, "{finding}")?;
        }
        Ok(())
    }
}
