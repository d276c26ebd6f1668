//! Diagnostics
//!
//! The parsing engine never prints anything. It hands every finding to a
//! [`DiagnosticSink`] supplied by the caller, who decides how to sort,
//! deduplicate and format them. Passing `None` instead of a sink silences
//! the parse completely.

use serde::Serialize;
use std::fmt;

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARN",
            Self::Note => "NOTE",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed literal text replacement, applied or discarded by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Autofix {
    pub old: String,
    pub new: String,
    /// Human-readable reasons for the replacement.
    pub rationale: Vec<String>,
}

/// A single finding produced while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Optional multi-line explanation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub explanation: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autofix: Option<Autofix>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            explanation: Vec::new(),
            autofix: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self::new(Severity::Note, message)
    }

    pub fn with_explanation(mut self, lines: &[&str]) -> Self {
        self.explanation = lines.iter().map(|line| line.to_string()).collect();
        self
    }

    pub fn with_autofix(mut self, old: impl Into<String>, new: impl Into<String>, rationale: &[&str]) -> Self {
        self.autofix = Some(Autofix {
            old: old.into(),
            new: new.into(),
            rationale: rationale.iter().map(|line| line.to_string()).collect(),
        });
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Receives the diagnostics of one parse.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Identifies the line a diagnostic belongs to. The parser never looks inside.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A sink that stamps every diagnostic with the line it was created for.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LineDiagnostics {
    pub location: Location,
    pub diagnostics: Vec<Diagnostic>,
}

impl LineDiagnostics {
    pub fn new(location: Location) -> Self {
        Self {
            location,
            diagnostics: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == severity).count()
    }
}

impl DiagnosticSink for LineDiagnostics {
    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}
