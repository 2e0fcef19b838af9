//! Fatal compile errors with a user-level call chain.
//!
//! Error codes group by [`ErrorKind`]: `E1xx` scope/name, `E2xx` type,
//! `E3xx` context, `E4xx` control flow, `E5xx` liveness, `E6xx`
//! intrinsic/IR, `E9xx` sanity checks.

use crate::code::{Category, DiagnosticCode};
use crate::diagnostic::Diagnostic;
use crate::label::Label;
use corvid_common::InternalError;
use corvid_source::{Frame, SourceLoc};
use std::fmt;
use std::panic::Location;

/// Result alias used by every compiler pass.
pub type CompileResult<T> = Result<T, CompileError>;

/// The error taxonomy of the compiler.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ErrorKind {
    /// Name used before binding, duplicate binding, late `nonlocal`,
    /// member declaration outside `__init__`.
    Scope,
    /// Width mismatch, signed/unsigned mixing, non-boolean condition.
    Type,
    /// Multiple drivers, cross-context variables, writes to inputs,
    /// construct not allowed in the current context kind.
    Context,
    /// `await`/`while` outside sequential contexts, nested state machines,
    /// loops that can never terminate, unreachable code.
    ControlFlow,
    /// Temporaries read before being written, or shared between states.
    Liveness,
    /// Malformed intrinsic use or unrecognized node.
    Intrinsic,
    /// Broken structural invariant.
    Sanity,
}

impl ErrorKind {
    /// Returns the diagnostic code used for this kind.
    pub fn code(self) -> DiagnosticCode {
        let number = match self {
            ErrorKind::Scope => 101,
            ErrorKind::Type => 201,
            ErrorKind::Context => 301,
            ErrorKind::ControlFlow => 401,
            ErrorKind::Liveness => 501,
            ErrorKind::Intrinsic => 601,
            ErrorKind::Sanity => 901,
        };
        DiagnosticCode::new(Category::Error, number)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Scope => "scope",
            ErrorKind::Type => "type",
            ErrorKind::Context => "context",
            ErrorKind::ControlFlow => "control flow",
            ErrorKind::Liveness => "liveness",
            ErrorKind::Intrinsic => "intrinsic",
            ErrorKind::Sanity => "sanity",
        };
        f.write_str(s)
    }
}

/// A fatal error raised by any pass.
///
/// `trace` holds the user-level virtual call chain (outermost first) of the
/// statement being processed; `origin` is the compiler location that raised
/// the error and is shown instead of the trace when enrichment is disabled.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct CompileError {
    /// The error category.
    pub kind: ErrorKind,
    /// Human-readable description.
    pub message: String,
    /// User call chain, outermost first. Empty until a pass attaches it.
    pub trace: Vec<Frame>,
    /// Where in the compiler the error was raised.
    pub origin: &'static Location<'static>,
}

impl CompileError {
    /// Creates an error of the given kind.
    #[track_caller]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace: Vec::new(),
            origin: Location::caller(),
        }
    }

    /// Creates a [`ErrorKind::Scope`] error.
    #[track_caller]
    pub fn scope(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Scope, message)
    }

    /// Creates a [`ErrorKind::Type`] error.
    #[track_caller]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    /// Creates a [`ErrorKind::Context`] error.
    #[track_caller]
    pub fn context(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Context, message)
    }

    /// Creates a [`ErrorKind::ControlFlow`] error.
    #[track_caller]
    pub fn control_flow(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ControlFlow, message)
    }

    /// Creates a [`ErrorKind::Liveness`] error.
    #[track_caller]
    pub fn liveness(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Liveness, message)
    }

    /// Creates a [`ErrorKind::Intrinsic`] error.
    #[track_caller]
    pub fn intrinsic(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Intrinsic, message)
    }

    /// Creates a [`ErrorKind::Sanity`] error.
    #[track_caller]
    pub fn sanity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Sanity, message)
    }

    /// Attaches a call chain unless a deeper pass already attached one.
    pub fn with_trace(mut self, trace: Vec<Frame>) -> Self {
        if self.trace.is_empty() {
            self.trace = trace;
        }
        self
    }

    /// Returns the innermost user location, if a trace is attached.
    pub fn location(&self) -> SourceLoc {
        self.trace.last().map(|f| f.loc).unwrap_or(SourceLoc::DUMMY)
    }

    /// Converts the error into a diagnostic.
    ///
    /// With `enrich` set, every caller in the virtual chain becomes a
    /// secondary label; otherwise the compiler origin is reported as a note.
    pub fn to_diagnostic(&self, enrich: bool) -> Diagnostic {
        if !enrich {
            return Diagnostic::error(self.kind.code(), &self.message, SourceLoc::DUMMY)
                .with_note(format!(
                    "raised at {}:{}",
                    self.origin.file(),
                    self.origin.line()
                ));
        }
        let mut diag = Diagnostic::error(self.kind.code(), &self.message, self.location());
        if let Some((innermost, callers)) = self.trace.split_last() {
            diag = diag.with_note(format!("in `{}`", innermost.function));
            for frame in callers.iter().rev() {
                diag = diag.with_label(Label::secondary(
                    frame.loc,
                    format!("called from `{}`", frame.function),
                ));
            }
        }
        diag
    }
}

impl From<InternalError> for CompileError {
    #[track_caller]
    fn from(err: InternalError) -> Self {
        CompileError::sanity(err.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_source::FileId;

    fn frame(function: &str, line: u32) -> Frame {
        Frame {
            function: function.to_string(),
            loc: SourceLoc::new(FileId::from_raw(0), line, 1),
            parent: None,
        }
    }

    #[test]
    fn display_includes_kind() {
        let err = CompileError::context("signal `q` driven from two contexts");
        assert_eq!(
            err.to_string(),
            "context error: signal `q` driven from two contexts"
        );
        assert_eq!(err.kind.code().to_string(), "E301");
    }

    #[test]
    fn first_trace_wins() {
        let err = CompileError::liveness("temporary might not be initialized")
            .with_trace(vec![frame("inner", 3)])
            .with_trace(vec![frame("outer", 9)]);
        assert_eq!(err.trace[0].function, "inner");
        assert_eq!(err.location().line, 3);
    }

    #[test]
    fn enriched_diagnostic_lists_callers() {
        let err = CompileError::type_error("width mismatch")
            .with_trace(vec![frame("architecture", 2), frame("helper", 12)]);
        let diag = err.to_diagnostic(true);
        assert_eq!(diag.primary_loc.line, 12);
        assert_eq!(diag.labels.len(), 1);
        assert!(diag.labels[0].message.contains("architecture"));
        assert!(diag.notes[0].contains("helper"));
    }

    #[test]
    fn plain_diagnostic_reports_origin() {
        let err = CompileError::sanity("bad block").with_trace(vec![frame("f", 1)]);
        let diag = err.to_diagnostic(false);
        assert!(diag.primary_loc.is_dummy());
        assert!(diag.notes[0].starts_with("raised at "));
        assert!(diag.notes[0].contains("error.rs"));
    }

    #[test]
    fn internal_error_is_sanity() {
        let err: CompileError = InternalError::new("oops").into();
        assert_eq!(err.kind, ErrorKind::Sanity);
    }
}
