//! Code blocks and their arena.
//!
//! A [`CodeBlock`] knows its parent block and the state-machine state it
//! belongs to. The parent links form the tree used to find common blocks
//! when control flow re-merges after an `if` or a returning call.

use crate::stmt::{Stmt, StmtKind};
use corvid_common::{define_id, Arena};
use serde::{Deserialize, Serialize};

define_id!(
    /// Index of a [`CodeBlock`] in a [`BlockArena`].
    BlockId
);
define_id!(
    /// Index of a state of a synthesized state machine.
    StateId
);

/// An ordered sequence of statements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    /// Statements in execution order.
    pub stmts: Vec<Stmt>,
    /// The block containing the statement that owns this block.
    pub parent: Option<BlockId>,
    /// The state-machine state this block belongs to.
    pub state: Option<StateId>,
}

/// Storage for every code block of a library.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockArena {
    blocks: Arena<BlockId, CodeBlock>,
}

impl BlockArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an empty block.
    pub fn alloc(&mut self, parent: Option<BlockId>, state: Option<StateId>) -> BlockId {
        self.blocks.alloc(CodeBlock {
            stmts: Vec::new(),
            parent,
            state,
        })
    }

    /// Allocates an empty child of `parent` in the same state.
    pub fn child(&mut self, parent: BlockId) -> BlockId {
        let state = self.blocks[parent].state;
        self.alloc(Some(parent), state)
    }

    /// Returns a block.
    pub fn get(&self, id: BlockId) -> &CodeBlock {
        &self.blocks[id]
    }

    /// Returns a block mutably.
    pub fn get_mut(&mut self, id: BlockId) -> &mut CodeBlock {
        &mut self.blocks[id]
    }

    /// Appends a statement.
    pub fn push(&mut self, id: BlockId, stmt: Stmt) {
        self.blocks[id].stmts.push(stmt);
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns `true` if no block was allocated.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns `true` if the block holds nothing but comments and nops.
    pub fn is_effectively_empty(&self, id: BlockId) -> bool {
        self.blocks[id]
            .stmts
            .iter()
            .all(|s| matches!(s.kind, StmtKind::Nop | StmtKind::Comment(_)))
    }

    /// Visits every statement below `root` in execution order, parents
    /// before their nested blocks.
    pub fn walk(&self, root: BlockId, f: &mut impl FnMut(BlockId, &Stmt)) {
        for stmt in &self.blocks[root].stmts {
            f(root, stmt);
            for child in stmt.kind.blocks() {
                self.walk(child, f);
            }
        }
    }

    /// Every block below `root`, including `root`, in pre-order.
    pub fn descendants(&self, root: BlockId) -> Vec<BlockId> {
        let mut out = vec![root];
        let mut i = 0;
        while i < out.len() {
            let id = out[i];
            for stmt in &self.blocks[id].stmts {
                out.extend(stmt.kind.blocks());
            }
            i += 1;
        }
        out
    }

    /// Applies `f` to every statement below `root`.
    pub fn for_each_mut(&mut self, root: BlockId, f: &mut impl FnMut(&mut Stmt)) {
        for id in self.descendants(root) {
            for stmt in &mut self.blocks[id].stmts {
                f(stmt);
            }
        }
    }

    /// Keeps only the statements below `root` for which `keep` holds.
    /// Returns the number of removed statements.
    pub fn retain(&mut self, root: BlockId, keep: &mut impl FnMut(&Stmt) -> bool) -> usize {
        let mut removed = 0;
        for id in self.descendants(root) {
            let stmts = &mut self.blocks[id].stmts;
            let before = stmts.len();
            stmts.retain(|s| keep(s));
            removed += before - stmts.len();
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_source::{FrameId, SourceLoc};
    use corvid_types::{ConstValue, Operand};

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt::new(kind, SourceLoc::DUMMY, FrameId::from_raw(0))
    }

    #[test]
    fn children_inherit_state() {
        let mut arena = BlockArena::new();
        let root = arena.alloc(None, Some(StateId::from_raw(2)));
        let child = arena.child(root);
        assert_eq!(arena.get(child).parent, Some(root));
        assert_eq!(arena.get(child).state, Some(StateId::from_raw(2)));
    }

    #[test]
    fn comments_do_not_count_as_code() {
        let mut arena = BlockArena::new();
        let root = arena.alloc(None, None);
        arena.push(root, stmt(StmtKind::Comment(vec!["hello".into()])));
        assert!(arena.is_effectively_empty(root));
        arena.push(root, stmt(StmtKind::Transition(StateId::from_raw(0))));
        assert!(!arena.is_effectively_empty(root));
    }

    #[test]
    fn walk_visits_nested_blocks_in_order() {
        let mut arena = BlockArena::new();
        let root = arena.alloc(None, None);
        let body = arena.child(root);
        let orelse = arena.child(root);
        arena.push(body, stmt(StmtKind::Comment(vec!["then".into()])));
        arena.push(orelse, stmt(StmtKind::Comment(vec!["else".into()])));
        arena.push(
            root,
            stmt(StmtKind::If {
                test: Operand::Const(ConstValue::Bool(true)),
                body,
                orelse,
            }),
        );
        arena.push(root, stmt(StmtKind::Nop));
        let mut seen = Vec::new();
        arena.walk(root, &mut |block, s| {
            if let StmtKind::Comment(lines) = &s.kind {
                seen.push((block, lines[0].clone()));
            }
        });
        assert_eq!(seen, vec![(body, "then".to_string()), (orelse, "else".to_string())]);
        assert_eq!(arena.descendants(root), vec![root, body, orelse]);
        let removed = arena.retain(root, &mut |s| !matches!(s.kind, StmtKind::Comment(_)));
        assert_eq!(removed, 2);
    }
}
