//! Expansion of `reset_context()`, `reset_pushed()` and push defaults.

use crate::GenCx;
use corvid_diagnostics::CompileResult;
use corvid_ir::{BlockId, Stmt, StmtKind};
use corvid_source::{FrameId, SourceLoc};
use corvid_types::{AssignableType, ConstValue, ObjectDb, ObjectId, Operand, QualifierKind};
use std::collections::BTreeSet;

/// The value `obj` takes on reset: its default, else `Null` when its type
/// accepts it.
fn reset_value(objects: &ObjectDb, obj: ObjectId) -> Option<Operand> {
    let decl = objects.get(obj);
    if let Some(default) = &decl.default {
        return Some(Operand::Const(default.clone()));
    }
    let null = Operand::Const(ConstValue::Null);
    decl.ty
        .accepts(&objects.arg_type(&null))
        .then_some(null)
}

/// The assignment resetting `obj`, if it has a writable reset value.
pub(crate) fn reset_stmt(objects: &ObjectDb, obj: ObjectId) -> Option<StmtKind> {
    let source = reset_value(objects, obj)?;
    match objects.kind(obj) {
        QualifierKind::Variable => Some(StmtKind::VariableAssignment { target: obj, source }),
        kind if kind.is_signal_like() => Some(StmtKind::SignalAssignment { target: obj, source }),
        _ => None,
    }
}

/// Roots written below `root` by statements `pick` selects.
fn written_roots(cx: &GenCx, root: BlockId, pick: impl Fn(&StmtKind) -> bool) -> BTreeSet<ObjectId> {
    let mut out = BTreeSet::new();
    cx.code.walk(root, &mut |_, stmt| {
        if pick(&stmt.kind) {
            for id in stmt.kind.written() {
                out.insert(cx.objects.root(id));
            }
        }
    });
    out
}

fn reset_list(cx: &GenCx, roots: &BTreeSet<ObjectId>, loc: SourceLoc, frame: FrameId) -> Vec<Stmt> {
    roots
        .iter()
        .filter(|id| !cx.objects.get(**id).noreset)
        .filter_map(|id| reset_stmt(&cx.objects, *id))
        .map(|kind| Stmt::new(kind, loc, frame))
        .collect()
}

/// Blocks guarded by a clock edge test, in pre-order.
fn edge_bodies(cx: &GenCx, root: BlockId) -> Vec<BlockId> {
    let mut out = Vec::new();
    cx.code.walk(root, &mut |_, stmt| {
        if let StmtKind::If {
            test: Operand::Event { .. },
            body,
            ..
        } = &stmt.kind
        {
            out.push(*body);
        }
    });
    out
}

/// Replaces the reset placeholders below `root` and inserts the push
/// defaults. Defaults open every clock-edge region, so a push holds for
/// exactly one cycle; a process without edge tests gets them at its top.
/// `register` (the state register) is never reset here.
pub(crate) fn expand_resets(cx: &mut GenCx, root: BlockId, register: Option<ObjectId>) -> CompileResult<()> {
    let context_owned = written_roots(cx, root, |k| {
        matches!(
            k,
            StmtKind::SignalAssignment { .. }
                | StmtKind::SignalPush { .. }
                | StmtKind::VariableAssignment { .. }
                | StmtKind::SelectWith { .. }
        )
    });
    let context_owned: BTreeSet<ObjectId> = context_owned
        .into_iter()
        .filter(|id| Some(*id) != register)
        .filter(|id| {
            matches!(cx.objects.kind(*id), QualifierKind::Variable)
                || cx.objects.kind(*id).is_signal_like()
        })
        .collect();
    let pushed = written_roots(cx, root, |k| matches!(k, StmtKind::SignalPush { .. }));

    for block in cx.code.descendants(root) {
        let stmts = std::mem::take(&mut cx.code.get_mut(block).stmts);
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            match stmt.kind {
                StmtKind::ResetContext => {
                    out.extend(reset_list(cx, &context_owned, stmt.loc, stmt.frame))
                }
                StmtKind::ResetPushed => out.extend(reset_list(cx, &pushed, stmt.loc, stmt.frame)),
                _ => out.push(stmt),
            }
        }
        cx.code.get_mut(block).stmts = out;
    }

    if !pushed.is_empty() {
        let frame = FrameId::from_raw(0);
        let defaults: Vec<Stmt> = pushed
            .iter()
            .filter_map(|id| reset_stmt(&cx.objects, *id))
            .map(|kind| Stmt::new(kind, SourceLoc::DUMMY, frame))
            .collect();
        let mut heads = edge_bodies(cx, root);
        if heads.is_empty() {
            heads.push(root);
        }
        for block in heads {
            let body = &mut cx.code.get_mut(block).stmts;
            let mut stmts = defaults.clone();
            stmts.append(body);
            *body = stmts;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_ir::BlockArena;
    use corvid_source::FrameArena;
    use corvid_types::{EventKind, ObjectDecl, Primitive};

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

    #[test]
    fn defaults_and_null_fallback() {
        let mut objects = ObjectDb::new();
        let a = objects.declare(
            ObjectDecl::new(QualifierKind::Signal, Primitive::unsigned(4))
                .named("a")
                .with_default(ConstValue::unsigned(3, 4)),
        );
        let b = objects.signal("b", Primitive::Bool);
        assert_eq!(
            reset_stmt(&objects, a),
            Some(StmtKind::SignalAssignment {
                target: a,
                source: Operand::Const(ConstValue::unsigned(3, 4)),
            })
        );
        assert_eq!(reset_stmt(&objects, b), None);
    }

    #[test]
    fn reset_context_skips_noreset() {
        let mut cx = cx();
        let a = cx.objects.signal("a", Primitive::Bit);
        let mut decl = ObjectDecl::new(QualifierKind::Signal, Primitive::Bit).named("keep");
        decl.noreset = true;
        let keep = cx.objects.declare(decl);
        let root = cx.code.alloc(None, None);
        for target in [a, keep] {
            cx.code.push(
                root,
                stmt(StmtKind::SignalAssignment {
                    target,
                    source: Operand::Const(ConstValue::bit(true)),
                }),
            );
        }
        cx.code.push(root, stmt(StmtKind::ResetContext));
        expand_resets(&mut cx, root, None).unwrap();
        let stmts = &cx.code.get(root).stmts;
        assert_eq!(stmts.len(), 3);
        assert_eq!(
            stmts[2].kind,
            StmtKind::SignalAssignment {
                target: a,
                source: Operand::Const(ConstValue::Null),
            }
        );
    }

    #[test]
    fn pushed_signals_get_a_leading_default() {
        let mut cx = cx();
        let p = cx.objects.signal("p", Primitive::Bit);
        let root = cx.code.alloc(None, None);
        let body = cx.code.child(root);
        let orelse = cx.code.child(root);
        cx.code.push(
            root,
            stmt(StmtKind::If {
                test: Operand::Const(ConstValue::Bool(true)),
                body,
                orelse,
            }),
        );
        cx.code.push(
            body,
            stmt(StmtKind::SignalPush {
                target: p,
                source: Operand::Const(ConstValue::bit(true)),
            }),
        );
        expand_resets(&mut cx, root, None).unwrap();
        let first = &cx.code.get(root).stmts[0].kind;
        assert_eq!(
            first,
            &StmtKind::SignalAssignment {
                target: p,
                source: Operand::Const(ConstValue::Null),
            }
        );
    }

    #[test]
    fn push_defaults_stay_inside_the_clock_edge() {
        let mut cx = cx();
        let clk = cx.objects.signal("clk", Primitive::Bit);
        let p = cx.objects.signal("p", Primitive::Bit);
        let root = cx.code.alloc(None, None);
        let body = cx.code.child(root);
        let orelse = cx.code.child(root);
        cx.code.push(
            root,
            stmt(StmtKind::If {
                test: Operand::Event {
                    kind: EventKind::Rising,
                    signal: clk,
                },
                body,
                orelse,
            }),
        );
        cx.code.push(
            body,
            stmt(StmtKind::SignalPush {
                target: p,
                source: Operand::Const(ConstValue::bit(true)),
            }),
        );
        expand_resets(&mut cx, root, None).unwrap();
        assert_eq!(cx.code.get(root).stmts.len(), 1);
        let kinds: Vec<&StmtKind> = cx.code.get(body).stmts.iter().map(|s| &s.kind).collect();
        assert_eq!(
            kinds[0],
            &StmtKind::SignalAssignment {
                target: p,
                source: Operand::Const(ConstValue::Null),
            }
        );
        assert!(matches!(kinds[1], StmtKind::SignalPush { .. }));
    }
}
