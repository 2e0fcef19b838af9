//! Structured diagnostic messages.

use crate::code::DiagnosticCode;
use crate::label::Label;
use crate::severity::Severity;
use corvid_source::SourceLoc;
use serde::{Deserialize, Serialize};

/// A diagnostic with a primary location, labels, notes, and help text.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity level.
    pub severity: Severity,
    /// Unique code of the diagnostic kind.
    pub code: DiagnosticCode,
    /// Main message.
    pub message: String,
    /// Where the problem was detected.
    pub primary_loc: SourceLoc,
    /// Additional annotated locations.
    pub labels: Vec<Label>,
    /// Explanatory footnotes.
    pub notes: Vec<String>,
    /// Actionable suggestions.
    pub help: Vec<String>,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>, loc: SourceLoc) -> Self {
        Self::with_severity(Severity::Error, code, message, loc)
    }

    /// Creates a warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, loc: SourceLoc) -> Self {
        Self::with_severity(Severity::Warning, code, message, loc)
    }

    fn with_severity(
        severity: Severity,
        code: DiagnosticCode,
        message: impl Into<String>,
        loc: SourceLoc,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            primary_loc: loc,
            labels: Vec::new(),
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Adds a label.
    pub fn with_label(mut self, label: Label) -> Self {
        self.labels.push(label);
        self
    }

    /// Adds a note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help message.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;

    #[test]
    fn builder_methods() {
        let code = DiagnosticCode::new(Category::Error, 201);
        let diag = Diagnostic::error(code, "width mismatch", SourceLoc::DUMMY)
            .with_label(Label::secondary(SourceLoc::DUMMY, "called from here"))
            .with_note("target is 8 bits wide")
            .with_help("resize the source explicitly");
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.labels.len(), 1);
        assert_eq!(diag.notes.len(), 1);
        assert_eq!(diag.help.len(), 1);
    }

    #[test]
    fn warning_severity() {
        let code = DiagnosticCode::new(Category::Warning, 401);
        let diag = Diagnostic::warning(code, "unreachable code", SourceLoc::DUMMY);
        assert_eq!(diag.severity, Severity::Warning);
    }
}
