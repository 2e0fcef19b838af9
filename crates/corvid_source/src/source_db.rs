//! Registry of host source files for a compilation session.

use crate::file_id::FileId;
use crate::loc::SourceLoc;
use crate::source_file::SourceFile;
use std::io;
use std::path::{Path, PathBuf};

/// Owns every host file known to the session and formats locations.
#[derive(Debug, Clone)]
pub struct SourceDb {
    files: Vec<SourceFile>,
}

impl SourceDb {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    /// Loads a file from disk, keeping its text for diagnostics.
    pub fn load_file(&mut self, path: &Path) -> Result<FileId, io::Error> {
        let content = std::fs::read_to_string(path)?;
        Ok(self.push(path.to_path_buf(), Some(content)))
    }

    /// Registers an in-memory file.
    pub fn add_source(&mut self, name: impl Into<PathBuf>, content: String) -> FileId {
        self.push(name.into(), Some(content))
    }

    /// Registers a file known only by name.
    pub fn add_path(&mut self, name: impl Into<PathBuf>) -> FileId {
        self.push(name.into(), None)
    }

    fn push(&mut self, path: PathBuf, content: Option<String>) -> FileId {
        let id = FileId::from_raw(self.files.len() as u32);
        self.files.push(SourceFile::new(id, path, content));
        id
    }

    /// Returns the file for `id`, or `None` for [`FileId::DUMMY`] and unknown ids.
    pub fn get_file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.as_raw() as usize)
    }

    /// Formats a location as `path:line:column`.
    pub fn describe(&self, loc: SourceLoc) -> String {
        match self.get_file(loc.file) {
            Some(file) => format!("{}:{}:{}", file.path.display(), loc.line, loc.column),
            None => "<generated>".to_string(),
        }
    }

    /// Returns the source line of a location, if the text is known.
    pub fn line_text(&self, loc: SourceLoc) -> Option<&str> {
        self.get_file(loc.file)?.line_text(loc.line)
    }
}

impl Default for SourceDb {
    fn default() -> Self {
        Self::new()
    }
}
