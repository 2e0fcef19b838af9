//! A single host source file with line lookup.

use crate::file_id::FileId;
use std::path::PathBuf;

/// A host source file whose text may or may not be available.
///
/// Designs built programmatically have no text; diagnostics then show only
/// the `path:line:column` header.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// The id assigned by the [`SourceDb`](crate::SourceDb).
    pub id: FileId,
    /// The path shown in diagnostics.
    pub path: PathBuf,
    /// The file text, if known.
    pub content: Option<String>,
}

impl SourceFile {
    /// Creates a new source file record.
    pub fn new(id: FileId, path: PathBuf, content: Option<String>) -> Self {
        Self { id, path, content }
    }

    /// Returns the text of the 1-based `line`, without its terminator.
    pub fn line_text(&self, line: u32) -> Option<&str> {
        if line == 0 {
            return None;
        }
        self.content
            .as_deref()?
            .lines()
            .nth(line as usize - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_lookup() {
        let f = SourceFile::new(
            FileId::from_raw(0),
            "top.py".into(),
            Some("def a():\n    x <<= y\n".to_string()),
        );
        assert_eq!(f.line_text(2), Some("    x <<= y"));
        assert_eq!(f.line_text(0), None);
        assert_eq!(f.line_text(9), None);
    }

    #[test]
    fn no_content() {
        let f = SourceFile::new(FileId::from_raw(0), "gen.py".into(), None);
        assert_eq!(f.line_text(1), None);
    }
}
