//! Host source files, source locations, and virtual call frames.
//!
//! The host parser hands the compiler line/column locations. This crate keeps
//! the [`SourceDb`] that resolves them for diagnostics, and the [`FrameArena`]
//! that records the chain of user-level calls active while a statement was
//! produced, so errors can point into the user's code rather than the
//! compiler's.

#![warn(missing_docs)]

pub mod file_id;
pub mod frame;
pub mod loc;
pub mod source_db;
pub mod source_file;

pub use file_id::FileId;
pub use frame::{Frame, FrameArena, FrameId};
pub use loc::SourceLoc;
pub use source_db::SourceDb;
pub use source_file::SourceFile;
