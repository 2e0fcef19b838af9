//! The structured intermediate representation (SIR).
//!
//! The IR generator turns prepared trees into [`CodeBlock`]s of [`Stmt`]s,
//! grouped into [`Context`]s, [`Block`]s and [`EntityTemplate`]s. A
//! [`Library`] holds the templates reachable from the top entity together
//! with the object database and the virtual frames, and is the input of the
//! VHDL assembler.

#![warn(missing_docs)]

pub mod block;
pub mod context;
pub mod design;
pub mod stmt;

pub use block::{BlockArena, BlockId, CodeBlock, StateId};
pub use context::{Concurrent, Context, Sequential};
pub use design::{Block, Entity, EntityTemplate, Library, PortBinding, TemplateId};
pub use stmt::{Stmt, StmtKind};
