//! Line/column source locations.

use crate::file_id::FileId;
use serde::{Deserialize, Serialize};

/// A position in a host source file, as reported by the host parser.
///
/// Lines and columns are 1-based; a location in [`FileId::DUMMY`] marks
/// compiler-generated code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct SourceLoc {
    /// The file containing the location.
    pub file: FileId,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

impl SourceLoc {
    /// Location used for compiler-generated nodes.
    pub const DUMMY: SourceLoc = SourceLoc {
        file: FileId::DUMMY,
        line: 0,
        column: 0,
    };

    /// Creates a new location.
    pub fn new(file: FileId, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }

    /// Returns `true` for compiler-generated locations.
    pub fn is_dummy(&self) -> bool {
        self.file == FileId::DUMMY
    }
}

impl Default for SourceLoc {
    fn default() -> Self {
        Self::DUMMY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dummy_location() {
        assert!(SourceLoc::DUMMY.is_dummy());
        assert!(SourceLoc::default().is_dummy());
        assert!(!SourceLoc::new(FileId::from_raw(0), 1, 1).is_dummy());
    }

    #[test]
    fn serde_roundtrip() {
        let loc = SourceLoc::new(FileId::from_raw(2), 10, 4);
        let json = serde_json::to_string(&loc).unwrap();
        let back: SourceLoc = serde_json::from_str(&json).unwrap();
        assert_eq!(loc, back);
    }
}
