//! The prepared tree: output of the lowerer, input of the IR generator.
//!
//! Nodes live in one arena per session. Statement nodes form a tree through
//! `CodeBlock` children; expression nodes write their result into a
//! Temporary. `bound` lists side-effecting nodes that must run right before
//! a node (the computation of a loop or await condition, for instance).
//!
//! Values that depend on control flow are [`MergedBranch`]es. Each branch
//! has a [`Hook`] placed in its code path; assigning the merged value to a
//! target records one [`Redirect`] per hook, and the IR generator emits the
//! recorded assignments where the hook sits.

use corvid_common::{define_id, Arena};
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_source::{FrameId, SourceLoc};
use corvid_types::{
    AssignMode, AssignableType, BinOp, CompareOp, ConstValue, InlinePart, ObjectDb, ObjectId,
    Operand, UnaryOp,
};

define_id!(
    /// Index of a prepared [`Node`].
    NodeId
);
define_id!(
    /// Index of a [`MergedBranch`].
    MergedId
);
define_id!(
    /// Index of a redirect [`Hook`].
    HookId
);

/// Control-flow summary of a node and its children.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowFlags {
    /// Every path through the node ends in a `return`.
    pub returns_always: bool,
    /// Some path ends in a `return`.
    pub return_paths: bool,
    /// A `break` for an enclosing loop occurs inside.
    pub contains_break: bool,
    /// A `continue` for an enclosing loop occurs inside.
    pub contains_continue: bool,
    /// An `await` or loop (a state transition) occurs inside.
    pub contains_await: bool,
}

impl FlowFlags {
    /// Flags of two nodes executed in sequence.
    pub fn then(self, next: FlowFlags) -> FlowFlags {
        FlowFlags {
            returns_always: self.returns_always || next.returns_always,
            return_paths: self.return_paths || next.return_paths,
            contains_break: self.contains_break || next.contains_break,
            contains_continue: self.contains_continue || next.contains_continue,
            contains_await: self.contains_await || next.contains_await,
        }
    }

    /// Flags of two alternative branches.
    pub fn either(self, other: FlowFlags) -> FlowFlags {
        FlowFlags {
            returns_always: self.returns_always && other.returns_always,
            ..self.then(other)
        }
    }

    /// Returns `true` if the node may leave its block early.
    pub fn exits_early(&self) -> bool {
        self.return_paths || self.contains_break || self.contains_continue
    }
}

/// One alternative of a [`NodeKind::CondSelect`].
#[derive(Debug, Clone, PartialEq)]
pub struct SelectCase {
    /// Condition of the alternative.
    pub test: Operand,
    /// Nodes computing `test`.
    pub bound: Vec<NodeId>,
    /// Code run when `test` holds.
    pub body: NodeId,
}

/// Prepared node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// `target <mode>= source`
    Assign {
        /// Written object.
        target: ObjectId,
        /// Written value.
        source: Operand,
        /// Resolved mode (never `Auto`).
        mode: AssignMode,
    },
    /// Declaration of a signal initialized from a runtime value.
    SignalAlias {
        /// The declared signal.
        signal: ObjectId,
        /// Its initializer.
        value: Operand,
    },
    /// Does nothing.
    Nop,
    /// Comment lines.
    Comment(Vec<String>),
    /// A sequence of nodes.
    CodeBlock(Vec<NodeId>),
    /// Runtime `if`.
    If {
        /// Condition.
        test: Operand,
        /// Taken branch.
        body: NodeId,
        /// Other branch.
        orelse: NodeId,
    },
    /// Runtime if-expression; its result is a merged value whose two
    /// hooks sit at the end of `body` and `orelse`.
    IfExpr {
        /// Condition (Bit or Bool).
        test: Operand,
        /// Side effects of the true arm.
        body: NodeId,
        /// Side effects of the false arm.
        orelse: NodeId,
        /// Hooks of the true and false arm.
        hooks: [HookId; 2],
    },
    /// Runtime `while`; `bound` computes the condition in the loop header.
    While {
        /// Condition.
        test: Operand,
        /// Loop body.
        body: NodeId,
    },
    /// Leaves the innermost `while`.
    Break,
    /// Restarts the innermost `while`.
    Continue,
    /// Primitive await; `bound` computes the condition in the new state.
    Await {
        /// Condition to wait for.
        test: Operand,
    },
    /// An inlined function call.
    Call {
        /// Callee name.
        function: String,
        /// Inlined body.
        body: NodeId,
    },
    /// `return`; the hook carries the returned value's redirects.
    Return {
        /// Redirect hook of the returned value.
        hook: Option<HookId>,
    },
    /// `reset_context()`
    ResetContext,
    /// `reset_pushed()`
    ResetPushed,
    /// `reset_instance(objs...)`
    ResetInstance {
        /// Objects reset to their defaults.
        objects: Vec<ObjectId>,
    },
    /// An if/elif chain from `match` or a breaking `for`.
    CondSelect {
        /// Alternatives in priority order.
        cases: Vec<SelectCase>,
        /// Code run when no alternative holds.
        default: Option<NodeId>,
    },
    /// `select_with(arg, {choice: value}, default=...)`
    SelectWith {
        /// Selector.
        arg: Operand,
        /// Choices and the hooks of their values.
        choices: Vec<(ConstValue, HookId)>,
        /// Hook of the default value.
        default: Option<HookId>,
    },
    /// Root of an async sequential context.
    Statemachine {
        /// The coroutine body.
        body: NodeId,
    },
    /// Runtime assertion.
    Assert {
        /// Condition.
        test: Operand,
        /// Report message.
        message: Option<String>,
    },
    /// Inline HDL code.
    InlineCode {
        /// Target language.
        hdl: String,
        /// Template pieces.
        parts: Vec<InlinePart>,
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
    /// `result = lhs op rhs` (boolean result).
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
    /// `result = bool(arg)`
    Boolean {
        /// Operand.
        arg: Operand,
        /// Result temporary.
        result: ObjectId,
    },
    /// `result = all(args)`
    All {
        /// Operands.
        args: Vec<Operand>,
        /// Result temporary.
        result: ObjectId,
    },
    /// `result = any(args)`
    Any {
        /// Operands.
        args: Vec<Operand>,
        /// Result temporary.
        result: ObjectId,
    },
}

/// A prepared node with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// What the node does.
    pub kind: NodeKind,
    /// Nodes that must run right before this one.
    pub bound: Vec<NodeId>,
    /// Control-flow summary.
    pub flags: FlowFlags,
    /// User source location.
    pub loc: SourceLoc,
    /// Virtual call frame active when the node was created.
    pub frame: FrameId,
}

/// A pending assignment attached to a hook.
#[derive(Debug, Clone, PartialEq)]
pub struct Redirect {
    /// Written object.
    pub target: ObjectId,
    /// Resolved assignment mode.
    pub mode: AssignMode,
    /// The branch value.
    pub source: Operand,
}

/// A place in one code path where redirected assignments are emitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hook {
    /// Recorded assignments, in recording order.
    pub redirects: Vec<Redirect>,
}

/// One candidate of a merged value.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueBranch {
    /// The value on this path.
    pub value: Operand,
    /// Where assignments of this branch go.
    pub hook: HookId,
}

/// A value whose identity depends on the path taken.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedBranch {
    /// Candidates, one per path.
    pub branches: Vec<ValueBranch>,
    /// Temporary all branches were routed into, once materialized.
    pub joined: Option<ObjectId>,
    /// The node holding the hooks. Redirects only stand in for a write
    /// that directly follows it in the same block.
    pub site: Option<NodeId>,
}

/// Session-wide storage of prepared nodes and merged values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedTree {
    nodes: Arena<NodeId, Node>,
    merged: Arena<MergedId, MergedBranch>,
    hooks: Arena<HookId, Hook>,
}

impl PreparedTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, computing its flags from its children.
    pub fn add(&mut self, kind: NodeKind, bound: Vec<NodeId>, loc: SourceLoc, frame: FrameId) -> NodeId {
        let flags = self.flags_of(&kind);
        self.nodes.alloc(Node {
            kind,
            bound,
            flags,
            loc,
            frame,
        })
    }

    fn flags_of(&self, kind: &NodeKind) -> FlowFlags {
        let f = |id: &NodeId| self.nodes[*id].flags;
        match kind {
            NodeKind::CodeBlock(children) => children
                .iter()
                .fold(FlowFlags::default(), |acc, c| acc.then(f(c))),
            NodeKind::If { body, orelse, .. } | NodeKind::IfExpr { body, orelse, .. } => {
                f(body).either(f(orelse))
            }
            NodeKind::While { body, .. } => FlowFlags {
                contains_break: false,
                contains_continue: false,
                contains_await: true,
                returns_always: false,
                ..f(body)
            },
            NodeKind::Break => FlowFlags {
                contains_break: true,
                ..FlowFlags::default()
            },
            NodeKind::Continue => FlowFlags {
                contains_continue: true,
                ..FlowFlags::default()
            },
            NodeKind::Await { .. } => FlowFlags {
                contains_await: true,
                ..FlowFlags::default()
            },
            NodeKind::Return { .. } => FlowFlags {
                returns_always: true,
                return_paths: true,
                ..FlowFlags::default()
            },
            NodeKind::Call { body, .. } => FlowFlags {
                contains_await: f(body).contains_await,
                ..FlowFlags::default()
            },
            NodeKind::Statemachine { body } => f(body),
            NodeKind::CondSelect { cases, default } => {
                let mut acc = match default {
                    Some(d) => f(d),
                    None => FlowFlags::default(),
                };
                for case in cases {
                    acc = acc.either(f(&case.body));
                }
                if cases.is_empty() && default.is_none() {
                    acc.returns_always = false;
                }
                acc
            }
            _ => FlowFlags::default(),
        }
    }

    /// Returns a node.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no node was added.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Children of a code block, or the node itself for other kinds.
    pub fn block_children(&self, id: NodeId) -> Vec<NodeId> {
        match &self.nodes[id].kind {
            NodeKind::CodeBlock(children) => children.clone(),
            _ => vec![id],
        }
    }

    /// Creates an empty hook.
    pub fn new_hook(&mut self) -> HookId {
        self.hooks.alloc(Hook::default())
    }

    /// Returns a hook.
    pub fn hook(&self, id: HookId) -> &Hook {
        &self.hooks[id]
    }

    /// Stores a merged value produced by `site`.
    pub fn merge(&mut self, branches: Vec<ValueBranch>, site: Option<NodeId>) -> MergedId {
        self.merged.alloc(MergedBranch {
            branches,
            joined: None,
            site,
        })
    }

    /// Returns a merged value.
    pub fn merged(&self, id: MergedId) -> &MergedBranch {
        &self.merged[id]
    }

    /// Records `target := branch` on the hook of every branch of `merged`.
    ///
    /// Every branch value must be assignable to the target.
    pub fn redirect(
        &mut self,
        objects: &ObjectDb,
        merged: MergedId,
        target: ObjectId,
        mode: AssignMode,
    ) -> CompileResult<()> {
        let target_ty = objects.ty(target).clone();
        let branches = self.merged[merged].branches.clone();
        for branch in &branches {
            target_ty.check_assignable(&objects.arg_type(&branch.value))?;
        }
        for branch in branches {
            self.hooks[branch.hook].redirects.push(Redirect {
                target,
                mode,
                source: branch.value,
            });
        }
        Ok(())
    }

    /// Routes every branch into `temp` and remembers it as the joined value.
    pub fn join(&mut self, objects: &ObjectDb, merged: MergedId, temp: ObjectId) -> CompileResult<()> {
        if self.merged[merged].joined.is_some() {
            return Err(CompileError::sanity("merged value joined twice"));
        }
        self.redirect(objects, merged, temp, AssignMode::Temp)?;
        self.merged[merged].joined = Some(temp);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_types::Primitive;

    fn frame() -> FrameId {
        FrameId::from_raw(0)
    }

    #[test]
    fn block_flags_accumulate() {
        let mut tree = PreparedTree::new();
        let brk = tree.add(NodeKind::Break, vec![], SourceLoc::DUMMY, frame());
        let ret = tree.add(NodeKind::Return { hook: None }, vec![], SourceLoc::DUMMY, frame());
        let block = tree.add(NodeKind::CodeBlock(vec![brk, ret]), vec![], SourceLoc::DUMMY, frame());
        let flags = tree.node(block).flags;
        assert!(flags.contains_break);
        assert!(flags.returns_always);
        assert!(flags.exits_early());
    }

    #[test]
    fn if_returns_always_only_when_both_arms_do() {
        let mut tree = PreparedTree::new();
        let ret = tree.add(NodeKind::Return { hook: None }, vec![], SourceLoc::DUMMY, frame());
        let nop = tree.add(NodeKind::Nop, vec![], SourceLoc::DUMMY, frame());
        let test = Operand::Const(ConstValue::Bool(true));
        let half = tree.add(
            NodeKind::If {
                test: test.clone(),
                body: ret,
                orelse: nop,
            },
            vec![],
            SourceLoc::DUMMY,
            frame(),
        );
        assert!(!tree.node(half).flags.returns_always);
        assert!(tree.node(half).flags.return_paths);
        let full = tree.add(
            NodeKind::If {
                test,
                body: ret,
                orelse: ret,
            },
            vec![],
            SourceLoc::DUMMY,
            frame(),
        );
        assert!(tree.node(full).flags.returns_always);
    }

    #[test]
    fn calls_and_loops_consume_exits() {
        let mut tree = PreparedTree::new();
        let brk = tree.add(NodeKind::Break, vec![], SourceLoc::DUMMY, frame());
        let lp = tree.add(
            NodeKind::While {
                test: Operand::Const(ConstValue::Bool(true)),
                body: brk,
            },
            vec![],
            SourceLoc::DUMMY,
            frame(),
        );
        assert!(!tree.node(lp).flags.contains_break);
        assert!(tree.node(lp).flags.contains_await);
        let ret = tree.add(NodeKind::Return { hook: None }, vec![], SourceLoc::DUMMY, frame());
        let call = tree.add(
            NodeKind::Call {
                function: "f".into(),
                body: ret,
            },
            vec![],
            SourceLoc::DUMMY,
            frame(),
        );
        assert!(!tree.node(call).flags.return_paths);
    }

    #[test]
    fn redirects_land_on_every_hook() {
        let mut objects = ObjectDb::new();
        let a = objects.signal("a", Primitive::bit_vector(8));
        let b = objects.signal("b", Primitive::bit_vector(8));
        let y = objects.signal("y", Primitive::bit_vector(8));
        let mut tree = PreparedTree::new();
        let h0 = tree.new_hook();
        let h1 = tree.new_hook();
        let merged = tree.merge(vec![
            ValueBranch {
                value: Operand::Object(a),
                hook: h0,
            },
            ValueBranch {
                value: Operand::Object(b),
                hook: h1,
            },
        ], None);
        tree.redirect(&objects, merged, y, AssignMode::Next).unwrap();
        assert_eq!(tree.hook(h0).redirects[0].source, Operand::Object(a));
        assert_eq!(tree.hook(h1).redirects[0].target, y);
    }

    #[test]
    fn incompatible_redirect_is_rejected() {
        let mut objects = ObjectDb::new();
        let a = objects.signal("a", Primitive::bit_vector(8));
        let y = objects.signal("y", Primitive::bit_vector(4));
        let mut tree = PreparedTree::new();
        let h = tree.new_hook();
        let merged = tree.merge(vec![ValueBranch {
            value: Operand::Object(a),
            hook: h,
        }], None);
        assert!(tree.redirect(&objects, merged, y, AssignMode::Next).is_err());
        assert!(tree.hook(h).redirects.is_empty());
    }
}
