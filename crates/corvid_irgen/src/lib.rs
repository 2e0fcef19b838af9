//! IR generation: prepared trees to SIR.
//!
//! [`generate_ir`] turns every lowered context into IR code, synthesizes
//! state machines for sequential contexts, checks temporary liveness and
//! driver attribution, runs the cleanup passes and assembles the entity
//! templates into a [`Library`](corvid_ir::Library).

#![warn(missing_docs)]

mod assemble;
mod cleanup;
mod context;
mod gen;
mod liveness;
mod remap;
mod reset;
mod statemachine;

pub use assemble::{generate_ir, IrOptions};
pub use cleanup::{cleanup_bool_cast, cleanup_unused};

use corvid_diagnostics::CompileError;
use corvid_ir::BlockArena;
use corvid_source::{FrameArena, FrameId};
use corvid_types::ObjectDb;

/// State shared by the generation of all contexts of a library.
#[derive(Debug)]
pub(crate) struct GenCx {
    pub(crate) objects: ObjectDb,
    pub(crate) frames: FrameArena,
    pub(crate) code: BlockArena,
}

impl GenCx {
    /// Attaches the user call chain of `frame` to `err` unless it already
    /// carries one.
    pub(crate) fn locate(&self, err: CompileError, frame: FrameId) -> CompileError {
        if err.trace.is_empty() && (frame.as_raw() as usize) < self.frames.len() {
            err.with_trace(self.frames.chain(frame))
        } else {
            err
        }
    }
}
