//! State machine synthesis for sequential contexts.
//!
//! Every suspension point of a coroutine starts a new state. A state is a
//! root code block; `Transition` statements inside it name the state that
//! runs on the next activation. [`Machine::finish`] turns the states into a
//! `case` over a generated enum register, or flattens a single state into
//! plain process code.

use crate::remap::ObjectMap;
use crate::GenCx;
use corvid_diagnostics::CompileResult;
use corvid_ir::{BlockArena, BlockId, StateId, Stmt, StmtKind};
use corvid_source::{FrameId, SourceLoc};
use corvid_types::{ConstValue, ObjectDecl, ObjectId, Operand, Primitive, QualifierKind};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// The states of one sequential context.
#[derive(Debug)]
pub(crate) struct Machine {
    states: Vec<BlockId>,
}

impl Machine {
    /// A machine with its initial state.
    pub(crate) fn new(code: &mut BlockArena) -> Self {
        let first = code.alloc(None, Some(StateId::from_raw(0)));
        Self {
            states: vec![first],
        }
    }

    pub(crate) fn first_state(&self) -> StateId {
        StateId::from_raw(0)
    }

    pub(crate) fn first_block(&self) -> BlockId {
        self.states[0]
    }

    pub(crate) fn add_state(&mut self, code: &mut BlockArena) -> (StateId, BlockId) {
        let state = StateId::from_raw(self.states.len() as u32);
        let block = code.alloc(None, Some(state));
        self.states.push(block);
        (state, block)
    }

    pub(crate) fn is_state_root(&self, block: BlockId) -> bool {
        self.states.contains(&block)
    }

    pub(crate) fn states(&self) -> &[BlockId] {
        &self.states
    }

    /// Builds the process body. Returns the root block and the state
    /// register, if one was needed.
    pub(crate) fn finish(self, cx: &mut GenCx, name: &str) -> CompileResult<(BlockId, Option<ObjectId>)> {
        if let [only] = self.states.as_slice() {
            cx.code
                .retain(*only, &mut |s| !matches!(s.kind, StmtKind::Transition(_)));
            return Ok((*only, None));
        }
        let members = (0..self.states.len())
            .map(|i| format!("{name}_s{i}"))
            .collect();
        let ty = cx
            .objects
            .enums
            .declare_generated(format!("state_t_{name}"), members);
        let register = cx.objects.declare(
            ObjectDecl::new(QualifierKind::Signal, Primitive::Enum(ty))
                .named(format!("state_{name}"))
                .with_default(ConstValue::Enum { ty, index: 0 }),
        );
        for &state in &self.states {
            cx.code.for_each_mut(state, &mut |stmt| {
                if let StmtKind::Transition(next) = stmt.kind {
                    stmt.kind = StmtKind::SignalAssignment {
                        target: register,
                        source: Operand::Const(ConstValue::Enum {
                            ty,
                            index: next.as_raw(),
                        }),
                    };
                }
            });
        }
        log::debug!("`{name}` became a state machine with {} states", self.states.len());
        let root = cx.code.alloc(None, None);
        let branches = self
            .states
            .iter()
            .enumerate()
            .map(|(i, block)| {
                (
                    ConstValue::Enum {
                        ty,
                        index: i as u32,
                    },
                    *block,
                )
            })
            .collect();
        for &state in &self.states {
            cx.code.get_mut(state).parent = Some(root);
        }
        cx.code.push(
            root,
            Stmt::new(
                StmtKind::CaseWhen {
                    value: Operand::Object(register),
                    branches,
                    default: None,
                },
                SourceLoc::DUMMY,
                FrameId::from_raw(0),
            ),
        );
        Ok((root, Some(register)))
    }
}

/// Rewrites the signal aliases below `block`: the initializer goes into a
/// fresh temporary, the signal is driven from it and later reads in the
/// same activation use the temporary.
pub(crate) fn lift_aliases(cx: &mut GenCx, block: BlockId, mut map: ObjectMap) -> CompileResult<()> {
    let stmts = std::mem::take(&mut cx.code.get_mut(block).stmts);
    let mut out = Vec::with_capacity(stmts.len());
    for mut stmt in stmts {
        if !map.is_empty() {
            map.apply_reads(&mut cx.objects, &mut stmt.kind)?;
        }
        match stmt.kind {
            StmtKind::SignalAlias { signal, value } => {
                let ty = cx.objects.ty(signal).clone();
                let temp = cx.objects.temporary(ty);
                out.push(Stmt::new(
                    StmtKind::VariableAssignment {
                        target: temp,
                        source: value,
                    },
                    stmt.loc,
                    stmt.frame,
                ));
                out.push(Stmt::new(
                    StmtKind::SignalAssignment {
                        target: signal,
                        source: Operand::Object(temp),
                    },
                    stmt.loc,
                    stmt.frame,
                ));
                map.insert(signal, temp);
            }
            kind => {
                for child in kind.blocks() {
                    lift_aliases(cx, child, map.clone())?;
                }
                out.push(Stmt::new(kind, stmt.loc, stmt.frame));
            }
        }
    }
    cx.code.get_mut(block).stmts = out;
    Ok(())
}

/// Temporary roots touched by the code below `root`.
fn temporaries_in(cx: &GenCx, root: BlockId) -> BTreeSet<ObjectId> {
    let mut out = BTreeSet::new();
    cx.code.walk(root, &mut |_, stmt| {
        for id in stmt.kind.written().into_iter().chain(stmt.kind.reads(&cx.objects)) {
            let root = cx.objects.root(id);
            if cx.objects.kind(root) == QualifierKind::Temporary {
                out.insert(root);
            }
        }
    });
    out
}

/// Gives every state its own copy of the temporaries it shares with an
/// earlier state. Returns the copies, so the liveness check can explain
/// why they are undefined.
pub(crate) fn localize_temporaries(cx: &mut GenCx, states: &[BlockId]) -> CompileResult<HashSet<ObjectId>> {
    let mut owner: BTreeMap<ObjectId, usize> = BTreeMap::new();
    let mut copies = HashSet::new();
    for (index, &state) in states.iter().enumerate() {
        let mut map = ObjectMap::new();
        for temp in temporaries_in(cx, state) {
            match owner.get(&temp) {
                None => {
                    owner.insert(temp, index);
                }
                Some(_) => {
                    let decl = cx.objects.get(temp);
                    let mut copy = ObjectDecl::new(QualifierKind::Temporary, decl.ty.clone());
                    copy.name = decl.name.clone();
                    copy.loc = decl.loc;
                    let copy = cx.objects.declare(copy);
                    map.insert(temp, copy);
                    copies.insert(copy);
                }
            }
        }
        if map.is_empty() {
            continue;
        }
        let mut failed = None;
        for block in cx.code.descendants(state) {
            let mut stmts = std::mem::take(&mut cx.code.get_mut(block).stmts);
            for stmt in &mut stmts {
                if let Err(err) = map.apply_all(&mut cx.objects, &mut stmt.kind) {
                    failed.get_or_insert(err);
                }
            }
            cx.code.get_mut(block).stmts = stmts;
        }
        if let Some(err) = failed {
            return Err(err);
        }
    }
    Ok(copies)
}
