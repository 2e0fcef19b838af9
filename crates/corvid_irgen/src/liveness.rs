//! Temporary liveness.
//!
//! A temporary only lives for one activation of its context. Every read
//! must therefore be preceded, on every path through the same state, by a
//! write. Branches define what all of their arms define.

use crate::GenCx;
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_ir::{BlockId, StmtKind};
use corvid_types::{ObjectId, QualifierKind};
use std::collections::HashSet;

struct Liveness<'a> {
    cx: &'a GenCx,
    copies: &'a HashSet<ObjectId>,
}

impl Liveness<'_> {
    fn check_read(&self, id: ObjectId, defined: &HashSet<ObjectId>) -> CompileResult<()> {
        let root = self.cx.objects.root(id);
        if self.cx.objects.kind(root) != QualifierKind::Temporary || defined.contains(&root) {
            return Ok(());
        }
        let what = self.cx.objects.describe(root);
        if self.copies.contains(&root) {
            Err(CompileError::liveness(format!(
                "{what} is used in more than one state; temporaries do not survive an `await`"
            )))
        } else {
            Err(CompileError::liveness(format!("{what} might not be initialized")))
        }
    }

    fn block(&self, block: BlockId, mut defined: HashSet<ObjectId>) -> CompileResult<HashSet<ObjectId>> {
        for stmt in &self.cx.code.get(block).stmts {
            for id in stmt.kind.reads(&self.cx.objects) {
                self.check_read(id, &defined)
                    .map_err(|err| self.cx.locate(err, stmt.frame))?;
            }
            match &stmt.kind {
                StmtKind::If { body, orelse, .. } => {
                    let a = self.block(*body, defined.clone())?;
                    let b = self.block(*orelse, defined.clone())?;
                    defined = a.intersection(&b).copied().collect();
                }
                StmtKind::CaseWhen {
                    branches, default, ..
                } => {
                    let mut arms = Vec::with_capacity(branches.len() + 1);
                    for (_, b) in branches {
                        arms.push(self.block(*b, defined.clone())?);
                    }
                    match default {
                        Some(d) => arms.push(self.block(*d, defined.clone())?),
                        None => arms.push(defined.clone()),
                    }
                    defined = intersect_all(arms);
                }
                kind => {
                    for id in kind.written() {
                        defined.insert(self.cx.objects.root(id));
                    }
                }
            }
        }
        Ok(defined)
    }
}

fn intersect_all(mut sets: Vec<HashSet<ObjectId>>) -> HashSet<ObjectId> {
    let Some(mut acc) = sets.pop() else {
        return HashSet::new();
    };
    for set in sets {
        acc.retain(|id| set.contains(id));
    }
    acc
}

/// Checks that every temporary read below `root` is defined first.
/// `copies` are the per-state copies made by temporary localization.
pub(crate) fn check_liveness(cx: &GenCx, root: BlockId, copies: &HashSet<ObjectId>) -> CompileResult<()> {
    Liveness { cx, copies }.block(root, HashSet::new()).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_diagnostics::ErrorKind;
    use corvid_ir::{BlockArena, Stmt};
    use corvid_source::{FrameArena, FrameId, SourceLoc};
    use corvid_types::{ConstValue, ObjectDb, Operand, Primitive};

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt::new(kind, SourceLoc::DUMMY, FrameId::from_raw(0))
    }

    fn cx() -> GenCx {
        GenCx {
            objects: ObjectDb::new(),
            frames: FrameArena::new(),
            code: BlockArena::new(),
        }
    }

    fn write(t: ObjectId) -> Stmt {
        stmt(StmtKind::VariableAssignment {
            target: t,
            source: Operand::Const(ConstValue::bit(true)),
        })
    }

    fn read(s: ObjectId, t: ObjectId) -> Stmt {
        stmt(StmtKind::SignalAssignment {
            target: s,
            source: Operand::Object(t),
        })
    }

    /// `if c: t = 1` (optionally `else: t = 1`), then `s <= t`.
    fn branchy(both_arms: bool) -> (GenCx, BlockId) {
        let mut cx = cx();
        let t = cx.objects.temporary(Primitive::Bit);
        let s = cx.objects.signal("s", Primitive::Bit);
        let c = cx.objects.signal("c", Primitive::Bool);
        let root = cx.code.alloc(None, None);
        let body = cx.code.child(root);
        let orelse = cx.code.child(root);
        cx.code.push(
            root,
            stmt(StmtKind::If {
                test: Operand::Object(c),
                body,
                orelse,
            }),
        );
        cx.code.push(body, write(t));
        if both_arms {
            cx.code.push(orelse, write(t));
        }
        cx.code.push(root, read(s, t));
        (cx, root)
    }

    #[test]
    fn written_on_every_path() {
        let (cx, root) = branchy(true);
        check_liveness(&cx, root, &HashSet::new()).unwrap();
    }

    #[test]
    fn written_on_one_path_only() {
        let (cx, root) = branchy(false);
        let err = check_liveness(&cx, root, &HashSet::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Liveness);
        assert!(err.message.contains("might not be initialized"));
    }

    #[test]
    fn state_copies_explain_themselves() {
        let mut cx = cx();
        let t = cx.objects.temporary(Primitive::Bit);
        let s = cx.objects.signal("s", Primitive::Bit);
        let root = cx.code.alloc(None, None);
        cx.code.push(root, read(s, t));
        let copies = HashSet::from([t]);
        let err = check_liveness(&cx, root, &copies).unwrap_err();
        assert!(err.message.contains("more than one state"));
    }

    #[test]
    fn case_without_default_keeps_the_incoming_set() {
        let mut cx = cx();
        let t = cx.objects.temporary(Primitive::Bit);
        let s = cx.objects.signal("s", Primitive::Bit);
        let sel = cx.objects.signal("sel", Primitive::unsigned(1));
        let root = cx.code.alloc(None, None);
        let arm = cx.code.child(root);
        cx.code.push(arm, write(t));
        cx.code.push(
            root,
            stmt(StmtKind::CaseWhen {
                value: Operand::Object(sel),
                branches: vec![(ConstValue::unsigned(0, 1), arm)],
                default: None,
            }),
        );
        cx.code.push(root, read(s, t));
        assert!(check_liveness(&cx, root, &HashSet::new()).is_err());
    }
}
