//! Synthesizable contexts in IR form.

use crate::block::BlockId;
use corvid_source::{FrameId, SourceLoc};
use corvid_types::{ObjectId, Sensitivity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Continuously active code: concurrent statements of an architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concurrent {
    /// Context name.
    pub name: String,
    /// Root code block.
    pub code: BlockId,
    /// Free-form attributes.
    pub attributes: BTreeMap<String, String>,
    /// Registration site.
    pub loc: SourceLoc,
    /// Frame of the context function.
    pub frame: FrameId,
}

/// A process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequential {
    /// Context name.
    pub name: String,
    /// Root code block.
    pub code: BlockId,
    /// Companion block evaluating the `always(...)` expressions.
    pub always: Option<Concurrent>,
    /// Explicit sensitivity; `None` means the set of signals read.
    pub sensitivity: Option<Sensitivity>,
    /// State register, when the body became a state machine.
    pub state: Option<ObjectId>,
    /// Free-form attributes.
    pub attributes: BTreeMap<String, String>,
    /// Registration site.
    pub loc: SourceLoc,
    /// Frame of the context function.
    pub frame: FrameId,
}

/// A concurrent or sequential context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Context {
    /// Concurrent statements.
    Concurrent(Concurrent),
    /// A process.
    Sequential(Sequential),
}

impl Context {
    /// Context name.
    pub fn name(&self) -> &str {
        match self {
            Context::Concurrent(c) => &c.name,
            Context::Sequential(s) => &s.name,
        }
    }

    /// Root code block.
    pub fn code(&self) -> BlockId {
        match self {
            Context::Concurrent(c) => c.code,
            Context::Sequential(s) => s.code,
        }
    }

    /// Registration site.
    pub fn loc(&self) -> SourceLoc {
        match self {
            Context::Concurrent(c) => c.loc,
            Context::Sequential(s) => s.loc,
        }
    }

    /// Frame of the context function.
    pub fn frame(&self) -> FrameId {
        match self {
            Context::Concurrent(c) => c.frame,
            Context::Sequential(s) => s.frame,
        }
    }
}
