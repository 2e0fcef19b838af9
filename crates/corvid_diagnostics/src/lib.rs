//! Diagnostics and fatal compile errors.
//!
//! Every pass fails fast with a [`CompileError`] carrying an [`ErrorKind`] and
//! the virtual call chain of the offending statement. The driver converts it
//! into a structured [`Diagnostic`], stores it in a [`DiagnosticSink`], and a
//! [`DiagnosticRenderer`] formats it for the terminal.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod error;
pub mod label;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use error::{CompileError, CompileResult, ErrorKind};
pub use label::{Label, LabelStyle};
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
