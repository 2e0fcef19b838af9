//! Terminal rendering of diagnostics.

use crate::diagnostic::Diagnostic;
use crate::label::LabelStyle;
use corvid_source::SourceDb;

/// Formats a diagnostic into text.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic.
    fn render(&self, diag: &Diagnostic, source_db: &SourceDb) -> String;
}

/// Renders diagnostics in a rustc-like layout:
///
/// ```text
/// error[E301]: signal `q` is driven by more than one context
///   --> design.py:14:9
///    |
/// 14 |         q <<= d
///    |         ^
///    = called from `architecture` at design.py:30:5
///    = note: ...
/// ```
pub struct TerminalRenderer {
    /// Whether to wrap the header in ANSI colors.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic, source_db: &SourceDb) -> String {
        let mut out = String::new();
        let header = format!("{}[{}]", diag.severity, diag.code);
        if self.color {
            out.push_str(&format!("\x1b[1;31m{header}\x1b[0m: {}\n", diag.message));
        } else {
            out.push_str(&format!("{header}: {}\n", diag.message));
        }

        if !diag.primary_loc.is_dummy() {
            let loc = diag.primary_loc;
            out.push_str(&format!("  --> {}\n", source_db.describe(loc)));
            if let Some(text) = source_db.line_text(loc) {
                let line_num = loc.line.to_string();
                let padding = " ".repeat(line_num.len());
                let col_padding = " ".repeat((loc.column as usize).saturating_sub(1));
                out.push_str(&format!("{padding} |\n"));
                out.push_str(&format!("{line_num} | {text}\n"));
                out.push_str(&format!("{padding} | {col_padding}^\n"));
            }
        }

        for label in diag
            .labels
            .iter()
            .filter(|l| l.style == LabelStyle::Secondary)
        {
            out.push_str(&format!(
                "   = {} at {}\n",
                label.message,
                source_db.describe(label.loc)
            ));
        }
        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }
        out
    }
}
