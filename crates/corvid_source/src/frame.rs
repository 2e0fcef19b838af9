//! Virtual call frames pointing into user source.
//!
//! While the lowerer walks user functions it pushes one [`Frame`] per call.
//! Every prepared node and IR statement stores the [`FrameId`] that was on
//! top at its creation; an error raised later in any pass resolves that id
//! into a user-level call chain.

use crate::loc::SourceLoc;
use corvid_common::{define_id, Arena};
use serde::{Deserialize, Serialize};

define_id!(
    /// Index of a [`Frame`] in a [`FrameArena`].
    FrameId
);

/// One entry of a virtual call stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Name of the user function executing in this frame.
    pub function: String,
    /// Location inside `function` that was being lowered.
    pub loc: SourceLoc,
    /// The calling frame.
    pub parent: Option<FrameId>,
}

/// Storage for all virtual frames of a compilation session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameArena {
    frames: Arena<FrameId, Frame>,
}

impl FrameArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame and returns its id.
    pub fn push(
        &mut self,
        parent: Option<FrameId>,
        function: impl Into<String>,
        loc: SourceLoc,
    ) -> FrameId {
        self.frames.alloc(Frame {
            function: function.into(),
            loc,
            parent,
        })
    }

    /// Returns a frame that shares `id`'s function and parent but points at
    /// another location.
    pub fn relocate(&mut self, id: FrameId, loc: SourceLoc) -> FrameId {
        let frame = self.frames[id].clone();
        if frame.loc == loc {
            return id;
        }
        self.frames.alloc(Frame { loc, ..frame })
    }

    /// Returns the frame for `id`.
    pub fn get(&self, id: FrameId) -> &Frame {
        &self.frames[id]
    }

    /// Resolves `id` into its call chain, outermost caller first.
    pub fn chain(&self, id: FrameId) -> Vec<Frame> {
        let mut out = Vec::new();
        let mut cur = Some(id);
        while let Some(fid) = cur {
            let frame = self.frames[fid].clone();
            cur = frame.parent;
            out.push(frame);
        }
        out.reverse();
        out
    }

    /// Returns the number of recorded frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` if no frame was recorded.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_id::FileId;

    fn loc(line: u32) -> SourceLoc {
        SourceLoc::new(FileId::from_raw(0), line, 1)
    }

    #[test]
    fn chain_is_outermost_first() {
        let mut arena = FrameArena::new();
        let outer = arena.push(None, "architecture", loc(1));
        let inner = arena.push(Some(outer), "helper", loc(7));
        let chain = arena.chain(inner);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].function, "architecture");
        assert_eq!(chain[1].function, "helper");
        assert_eq!(chain[1].loc.line, 7);
    }

    #[test]
    fn relocate_keeps_parent() {
        let mut arena = FrameArena::new();
        let outer = arena.push(None, "arch", loc(1));
        let inner = arena.push(Some(outer), "f", loc(3));
        let moved = arena.relocate(inner, loc(4));
        assert_ne!(moved, inner);
        assert_eq!(arena.get(moved).parent, Some(outer));
        assert_eq!(arena.relocate(moved, loc(4)), moved);
    }
}
