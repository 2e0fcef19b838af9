//! IR statements.
//!
//! [`StmtKind`] is flat: nested code lives in other [`CodeBlock`]s of the
//! [`BlockArena`](crate::BlockArena) and is referenced by [`BlockId`].
//! Expression statements write their result into a Temporary, which keeps
//! every statement a single assignment the assembler can render directly.
//!
//! [`CodeBlock`]: crate::CodeBlock

use crate::block::{BlockId, StateId};
use corvid_source::{FrameId, SourceLoc};
use corvid_types::{BinOp, CompareOp, ConstValue, InlinePart, ObjectDb, ObjectId, Operand, UnaryOp};
use serde::{Deserialize, Serialize};

/// A statement kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// Does nothing.
    Nop,
    /// Comment lines, emitted verbatim.
    Comment(Vec<String>),
    /// `target <= source`
    SignalAssignment {
        /// Written signal (or concurrent temporary).
        target: ObjectId,
        /// Written value.
        source: Operand,
    },
    /// One-cycle `target <= source`; the process resets it to its default.
    SignalPush {
        /// Written signal.
        target: ObjectId,
        /// Written value.
        source: Operand,
    },
    /// `target := source`
    VariableAssignment {
        /// Written variable or temporary.
        target: ObjectId,
        /// Written value.
        source: Operand,
    },
    /// `if test then body else orelse end if`
    If {
        /// Condition.
        test: Operand,
        /// Taken branch.
        body: BlockId,
        /// Other branch.
        orelse: BlockId,
    },
    /// `case value is when c => ... end case`
    CaseWhen {
        /// Selector.
        value: Operand,
        /// Choices with their code.
        branches: Vec<(ConstValue, BlockId)>,
        /// `when others` code.
        default: Option<BlockId>,
    },
    /// Concurrent `with arg select target <= v when c, ...`
    SelectWith {
        /// Written object.
        target: ObjectId,
        /// Selector.
        arg: Operand,
        /// Choices with their values.
        choices: Vec<(ConstValue, Operand)>,
        /// Value for `when others`.
        default: Option<Operand>,
    },
    /// `assert test report message`
    Assert {
        /// Condition.
        test: Operand,
        /// Report text.
        message: Option<String>,
    },
    /// Inline VHDL.
    InlineCode {
        /// Template pieces.
        parts: Vec<InlinePart>,
    },
    /// `result = boolean(arg)`
    Boolean {
        /// Operand.
        arg: Operand,
        /// Result temporary.
        result: ObjectId,
    },
    /// `result = lhs op rhs`
    BinOp {
        /// Operator.
        op: BinOp,
        /// Left operand.
        lhs: Operand,
        /// Right operand.
        rhs: Operand,
        /// Result temporary.
        result: ObjectId,
    },
    /// `result = op arg`
    UnaryOp {
        /// Operator.
        op: UnaryOp,
        /// Operand.
        arg: Operand,
        /// Result temporary.
        result: ObjectId,
    },
    /// `result = lhs op rhs` with a boolean result.
    Compare {
        /// Operator.
        op: CompareOp,
        /// Left operand.
        lhs: Operand,
        /// Right operand.
        rhs: Operand,
        /// Result temporary.
        result: ObjectId,
    },
    /// `result = arg0 and arg1 and ...`
    All {
        /// Operands.
        args: Vec<Operand>,
        /// Result temporary.
        result: ObjectId,
    },
    /// `result = arg0 or arg1 or ...`
    Any {
        /// Operands.
        args: Vec<Operand>,
        /// Result temporary.
        result: ObjectId,
    },
    /// Interior: switch to another state of the enclosing state machine.
    Transition(StateId),
    /// Interior: declaration of a signal from a runtime initializer.
    SignalAlias {
        /// The declared signal.
        signal: ObjectId,
        /// Its initializer.
        value: Operand,
    },
    /// Interior: `reset_context()`, expanded once all writes are known.
    ResetContext,
    /// Interior: `reset_pushed()`, expanded once all pushes are known.
    ResetPushed,
}

impl StmtKind {
    /// Returns `true` for kinds that must be gone before assembly.
    pub fn is_interior(&self) -> bool {
        matches!(
            self,
            StmtKind::Transition(_)
                | StmtKind::SignalAlias { .. }
                | StmtKind::ResetContext
                | StmtKind::ResetPushed
        )
    }

    /// Returns `true` for pure expression statements.
    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            StmtKind::Boolean { .. }
                | StmtKind::BinOp { .. }
                | StmtKind::UnaryOp { .. }
                | StmtKind::Compare { .. }
                | StmtKind::All { .. }
                | StmtKind::Any { .. }
        )
    }

    /// Objects written by the statement itself (not by nested blocks).
    pub fn written(&self) -> Vec<ObjectId> {
        match self {
            StmtKind::SignalAssignment { target, .. }
            | StmtKind::SignalPush { target, .. }
            | StmtKind::VariableAssignment { target, .. }
            | StmtKind::SelectWith { target, .. } => vec![*target],
            StmtKind::Boolean { result, .. }
            | StmtKind::BinOp { result, .. }
            | StmtKind::UnaryOp { result, .. }
            | StmtKind::Compare { result, .. }
            | StmtKind::All { result, .. }
            | StmtKind::Any { result, .. } => vec![*result],
            StmtKind::SignalAlias { signal, .. } => vec![*signal],
            StmtKind::InlineCode { parts } => parts
                .iter()
                .filter_map(|p| match p {
                    InlinePart::Target(id) => Some(*id),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Operands read by the statement itself.
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            StmtKind::SignalAssignment { source, .. }
            | StmtKind::SignalPush { source, .. }
            | StmtKind::VariableAssignment { source, .. } => vec![source],
            StmtKind::If { test, .. } | StmtKind::Assert { test, .. } => vec![test],
            StmtKind::CaseWhen { value, .. } => vec![value],
            StmtKind::SelectWith {
                arg,
                choices,
                default,
                ..
            } => {
                let mut out = vec![arg];
                out.extend(choices.iter().map(|(_, v)| v));
                out.extend(default.iter());
                out
            }
            StmtKind::Boolean { arg, .. } | StmtKind::UnaryOp { arg, .. } => vec![arg],
            StmtKind::BinOp { lhs, rhs, .. } | StmtKind::Compare { lhs, rhs, .. } => vec![lhs, rhs],
            StmtKind::All { args, .. } | StmtKind::Any { args, .. } => args.iter().collect(),
            StmtKind::SignalAlias { value, .. } => vec![value],
            _ => Vec::new(),
        }
    }

    /// Mutable access to the operands read by the statement.
    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            StmtKind::SignalAssignment { source, .. }
            | StmtKind::SignalPush { source, .. }
            | StmtKind::VariableAssignment { source, .. } => vec![source],
            StmtKind::If { test, .. } | StmtKind::Assert { test, .. } => vec![test],
            StmtKind::CaseWhen { value, .. } => vec![value],
            StmtKind::SelectWith {
                arg,
                choices,
                default,
                ..
            } => {
                let mut out = vec![arg];
                out.extend(choices.iter_mut().map(|(_, v)| v));
                out.extend(default.iter_mut());
                out
            }
            StmtKind::Boolean { arg, .. } | StmtKind::UnaryOp { arg, .. } => vec![arg],
            StmtKind::BinOp { lhs, rhs, .. } | StmtKind::Compare { lhs, rhs, .. } => vec![lhs, rhs],
            StmtKind::All { args, .. } | StmtKind::Any { args, .. } => args.iter_mut().collect(),
            StmtKind::SignalAlias { value, .. } => vec![value],
            _ => Vec::new(),
        }
    }

    /// Every object whose value the statement reads: operands, event
    /// signals, inline references and the runtime indices of any view it
    /// touches, including the written one.
    pub fn reads(&self, objects: &ObjectDb) -> Vec<ObjectId> {
        let mut out = Vec::new();
        for operand in self.operands() {
            if let Some(id) = operand.object() {
                out.push(id);
                out.extend(objects.dynamic_indices(id));
            }
        }
        if let StmtKind::InlineCode { parts } = self {
            for part in parts {
                if let InlinePart::Read(id) = part {
                    out.push(*id);
                    out.extend(objects.dynamic_indices(*id));
                }
            }
        }
        for target in self.written() {
            out.extend(objects.dynamic_indices(target));
        }
        out
    }

    /// Child blocks, in rendering order.
    pub fn blocks(&self) -> Vec<BlockId> {
        match self {
            StmtKind::If { body, orelse, .. } => vec![*body, *orelse],
            StmtKind::CaseWhen {
                branches, default, ..
            } => {
                let mut out: Vec<BlockId> = branches.iter().map(|(_, b)| *b).collect();
                out.extend(default.iter().copied());
                out
            }
            _ => Vec::new(),
        }
    }
}

/// A statement with its origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    /// What the statement does.
    pub kind: StmtKind,
    /// User source location.
    pub loc: SourceLoc,
    /// Virtual call frame the statement was produced in.
    pub frame: FrameId,
}

impl Stmt {
    /// Creates a statement.
    pub fn new(kind: StmtKind, loc: SourceLoc, frame: FrameId) -> Self {
        Self { kind, loc, frame }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_types::{EventKind, Primitive};

    #[test]
    fn reads_include_dynamic_indices() {
        let mut objects = ObjectDb::new();
        let mem = objects.signal(
            "mem",
            Primitive::Array {
                elem: Box::new(Primitive::unsigned(8)),
                count: 4,
            },
        );
        let idx = objects.temporary(Primitive::unsigned(2));
        let word = objects.dynamic_offset(mem, idx).unwrap();
        let data = objects.signal("data", Primitive::unsigned(8));
        let stmt = StmtKind::SignalAssignment {
            target: word,
            source: Operand::Object(data),
        };
        assert_eq!(stmt.reads(&objects), vec![data, idx]);
        assert_eq!(stmt.written(), vec![word]);
    }

    #[test]
    fn select_with_operands() {
        let mut objects = ObjectDb::new();
        let sel = objects.signal("sel", Primitive::Bit);
        let a = objects.signal("a", Primitive::Bit);
        let y = objects.signal("y", Primitive::Bit);
        let mut stmt = StmtKind::SelectWith {
            target: y,
            arg: Operand::Object(sel),
            choices: vec![(ConstValue::bit(true), Operand::Object(a))],
            default: Some(Operand::Const(ConstValue::bit(false))),
        };
        assert_eq!(stmt.operands().len(), 3);
        for op in stmt.operands_mut() {
            if *op == Operand::Object(a) {
                *op = Operand::Object(sel);
            }
        }
        assert_eq!(stmt.reads(&objects), vec![sel, sel]);
    }

    #[test]
    fn events_read_their_signal() {
        let mut objects = ObjectDb::new();
        let clk = objects.signal("clk", Primitive::Bit);
        let stmt = StmtKind::Assert {
            test: Operand::Event {
                kind: EventKind::Rising,
                signal: clk,
            },
            message: None,
        };
        assert_eq!(stmt.reads(&objects), vec![clk]);
        assert!(!stmt.is_interior());
        assert!(StmtKind::ResetPushed.is_interior());
    }
}
