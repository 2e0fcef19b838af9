//! The IR generator proper.
//!
//! [`IrGen`] walks one prepared tree while keeping a list of *open blocks*:
//! the code blocks that currently accept statements. Straight-line nodes
//! append to every open block. Branches give every open block two children
//! and continue in whatever their arms leave open. Suspension points
//! (`await`, loop headers) allocate states of the context's [`Machine`] and
//! continue in the new state.

use crate::statemachine::Machine;
use crate::GenCx;
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_frontend::{HookId, Node, NodeId, NodeKind, PreparedTree, SelectCase};
use corvid_ir::{BlockId, StateId, Stmt, StmtKind};
use corvid_types::{
    AssignMode, CompareOp, ConstValue, ContextKind, ObjectId, Operand, Primitive,
};
use itertools::Itertools;

struct LoopFrame {
    header: StateId,
    breaks: Vec<BlockId>,
}

/// Generates IR for one context.
pub(crate) struct IrGen<'a> {
    cx: &'a mut GenCx,
    tree: &'a PreparedTree,
    kind: ContextKind,
    machine: Option<Machine>,
    machine_active: bool,
    returns: Vec<Vec<BlockId>>,
    loops: Vec<LoopFrame>,
    diverged: bool,
}

impl<'a> IrGen<'a> {
    pub(crate) fn new(cx: &'a mut GenCx, tree: &'a PreparedTree, kind: ContextKind) -> Self {
        Self {
            cx,
            tree,
            kind,
            machine: None,
            machine_active: false,
            returns: Vec::new(),
            loops: Vec::new(),
            diverged: false,
        }
    }

    /// Attaches a state machine; sequential contexts lower into its first
    /// state.
    pub(crate) fn with_machine(mut self, machine: Machine) -> Self {
        self.machine = Some(machine);
        self
    }

    /// Gives the state machine back after lowering.
    pub(crate) fn into_machine(self) -> Option<Machine> {
        self.machine
    }

    /// Lowers `id` appending to `opens` and returns the blocks left open.
    pub(crate) fn lower(&mut self, id: NodeId, opens: Vec<BlockId>) -> CompileResult<Vec<BlockId>> {
        let node = self.tree.node(id).clone();
        self.lower_node(&node, opens)
            .map_err(|err| self.cx.locate(err, node.frame))
    }

    fn lower_all(&mut self, ids: &[NodeId], mut opens: Vec<BlockId>) -> CompileResult<Vec<BlockId>> {
        for &id in ids {
            if opens.is_empty() {
                break;
            }
            opens = self.lower(id, opens)?;
        }
        Ok(opens)
    }

    fn lower_node(&mut self, node: &Node, opens: Vec<BlockId>) -> CompileResult<Vec<BlockId>> {
        match &node.kind {
            NodeKind::While { test, body } => return self.while_loop(node, test, *body, opens),
            NodeKind::Await { test } => return self.await_(node, test, opens),
            _ => {}
        }
        let opens = self.lower_all(&node.bound, opens)?;
        match &node.kind {
            NodeKind::Assign {
                target,
                source,
                mode,
            } => {
                let kind = self.assign_kind(*target, source.clone(), *mode)?;
                self.emit(&opens, kind, node);
                Ok(opens)
            }
            NodeKind::SignalAlias { signal, value } => {
                let kind = match self.kind {
                    ContextKind::Concurrent => StmtKind::SignalAssignment {
                        target: *signal,
                        source: value.clone(),
                    },
                    ContextKind::Sequential => StmtKind::SignalAlias {
                        signal: *signal,
                        value: value.clone(),
                    },
                };
                self.emit(&opens, kind, node);
                Ok(opens)
            }
            NodeKind::Nop => Ok(opens),
            NodeKind::Comment(lines) => {
                self.emit(&opens, StmtKind::Comment(lines.clone()), node);
                Ok(opens)
            }
            NodeKind::CodeBlock(children) => self.sequence(children, opens),
            NodeKind::If { test, body, orelse } => {
                self.require_sequential("a runtime `if`")?;
                self.branch(node, test, opens, |g, bodies, elses| {
                    let a = g.lower(*body, bodies)?;
                    let b = g.lower(*orelse, elses)?;
                    Ok(a.into_iter().chain(b).collect())
                })
            }
            NodeKind::IfExpr {
                test,
                body,
                orelse,
                hooks,
            } => self.if_expr(node, test, *body, *orelse, *hooks, opens),
            NodeKind::Break => {
                let frame = self
                    .loops
                    .last_mut()
                    .ok_or_else(|| CompileError::control_flow("`break` outside of a loop"))?;
                frame.breaks.extend(opens);
                Ok(Vec::new())
            }
            NodeKind::Continue => {
                let header = self
                    .loops
                    .last()
                    .map(|f| f.header)
                    .ok_or_else(|| CompileError::control_flow("`continue` outside of a loop"))?;
                self.emit(&opens, StmtKind::Transition(header), node);
                Ok(Vec::new())
            }
            NodeKind::Call { function, body } => {
                log::trace!("inlining call of `{function}`");
                self.returns.push(Vec::new());
                let result = self.lower(*body, opens);
                let returned = self.returns.pop().unwrap_or_default();
                let mut out = result?;
                out.extend(returned);
                Ok(self.collapse(out))
            }
            NodeKind::Return { hook } => {
                if let Some(hook) = hook {
                    self.redirects(*hook, &opens, node)?;
                }
                self.returns
                    .last_mut()
                    .ok_or_else(|| CompileError::sanity("`return` outside of an inlined call"))?
                    .extend(opens);
                Ok(Vec::new())
            }
            NodeKind::ResetContext => {
                self.require_sequential("`reset_context()`")?;
                self.emit(&opens, StmtKind::ResetContext, node);
                Ok(opens)
            }
            NodeKind::ResetPushed => {
                self.require_sequential("`reset_pushed()`")?;
                self.emit(&opens, StmtKind::ResetPushed, node);
                Ok(opens)
            }
            NodeKind::ResetInstance { objects } => {
                for &obj in objects {
                    if let Some(kind) = crate::reset::reset_stmt(&self.cx.objects, obj) {
                        self.emit(&opens, kind, node);
                    }
                }
                Ok(opens)
            }
            NodeKind::CondSelect { cases, default } => {
                self.require_sequential("a runtime selection")?;
                self.cond_select(node, cases, *default, opens)
            }
            NodeKind::SelectWith {
                arg,
                choices,
                default,
            } => self.select_with(node, arg, choices, *default, opens),
            NodeKind::Statemachine { body } => self.statemachine(node, *body, opens),
            NodeKind::Assert { test, message } => {
                self.emit(
                    &opens,
                    StmtKind::Assert {
                        test: test.clone(),
                        message: message.clone(),
                    },
                    node,
                );
                Ok(opens)
            }
            NodeKind::InlineCode { hdl, parts } => {
                if !hdl.eq_ignore_ascii_case("vhdl") {
                    return Err(CompileError::intrinsic(format!(
                        "no matching HDL option for inline code in `{hdl}`"
                    )));
                }
                self.emit(&opens, StmtKind::InlineCode { parts: parts.clone() }, node);
                Ok(opens)
            }
            NodeKind::BinOp {
                op,
                lhs,
                rhs,
                result,
            } => {
                let kind = StmtKind::BinOp {
                    op: *op,
                    lhs: lhs.clone(),
                    rhs: rhs.clone(),
                    result: *result,
                };
                self.emit(&opens, kind, node);
                Ok(opens)
            }
            NodeKind::UnaryOp { op, arg, result } => {
                let kind = StmtKind::UnaryOp {
                    op: *op,
                    arg: arg.clone(),
                    result: *result,
                };
                self.emit(&opens, kind, node);
                Ok(opens)
            }
            NodeKind::Compare {
                op,
                lhs,
                rhs,
                result,
            } => {
                let kind = StmtKind::Compare {
                    op: *op,
                    lhs: lhs.clone(),
                    rhs: rhs.clone(),
                    result: *result,
                };
                self.emit(&opens, kind, node);
                Ok(opens)
            }
            NodeKind::Boolean { arg, result } => {
                let kind = StmtKind::Boolean {
                    arg: arg.clone(),
                    result: *result,
                };
                self.emit(&opens, kind, node);
                Ok(opens)
            }
            NodeKind::All { args, result } => {
                let kind = StmtKind::All {
                    args: args.clone(),
                    result: *result,
                };
                self.emit(&opens, kind, node);
                Ok(opens)
            }
            NodeKind::Any { args, result } => {
                let kind = StmtKind::Any {
                    args: args.clone(),
                    result: *result,
                };
                self.emit(&opens, kind, node);
                Ok(opens)
            }
            NodeKind::While { .. } | NodeKind::Await { .. } => {
                Err(CompileError::sanity("loop node reached the generic path"))
            }
        }
    }

    fn require_sequential(&self, what: &str) -> CompileResult<()> {
        match self.kind {
            ContextKind::Sequential => Ok(()),
            ContextKind::Concurrent => Err(CompileError::context(format!(
                "{what} is only allowed in sequential contexts"
            ))),
        }
    }

    fn emit(&mut self, opens: &[BlockId], kind: StmtKind, node: &Node) {
        for &block in opens {
            self.cx
                .code
                .push(block, Stmt::new(kind.clone(), node.loc, node.frame));
        }
    }

    fn sequence(&mut self, children: &[NodeId], mut opens: Vec<BlockId>) -> CompileResult<Vec<BlockId>> {
        let mut warned = false;
        for &child in children {
            if opens.is_empty() {
                let node = self.tree.node(child);
                if matches!(node.kind, NodeKind::Nop | NodeKind::Comment(_)) {
                    continue;
                }
                if self.diverged {
                    return Err(self.cx.locate(
                        CompileError::control_flow(
                            "unreachable code after a loop that never terminates",
                        ),
                        node.frame,
                    ));
                }
                if !warned {
                    log::warn!("dropping unreachable code at line {}", node.loc.line);
                    warned = true;
                }
                continue;
            }
            self.diverged = false;
            opens = self.lower(child, opens)?;
        }
        Ok(opens)
    }

    /// Resolves the statement kind of a write.
    fn assign_kind(&self, target: ObjectId, source: Operand, mode: AssignMode) -> CompileResult<StmtKind> {
        let kind = self.cx.objects.kind(target);
        let mode = mode.resolve(kind)?;
        Ok(match mode {
            AssignMode::Next => StmtKind::SignalAssignment { target, source },
            AssignMode::Push => {
                self.require_sequential("a push assignment")?;
                StmtKind::SignalPush { target, source }
            }
            AssignMode::Value => {
                self.require_sequential("a variable assignment")?;
                StmtKind::VariableAssignment { target, source }
            }
            AssignMode::Temp | AssignMode::Auto => match self.kind {
                ContextKind::Concurrent => StmtKind::SignalAssignment { target, source },
                ContextKind::Sequential => StmtKind::VariableAssignment { target, source },
            },
        })
    }

    /// Emits the assignments recorded on a redirect hook.
    fn redirects(&mut self, hook: HookId, opens: &[BlockId], node: &Node) -> CompileResult<()> {
        let redirects = self.tree.hook(hook).redirects.clone();
        for r in redirects {
            let kind = self.assign_kind(r.target, r.source, r.mode)?;
            self.emit(opens, kind, node);
        }
        Ok(())
    }

    /// Gives every open block an `if test` with two fresh children and lets
    /// `arms` lower into them.
    fn branch(
        &mut self,
        node: &Node,
        test: &Operand,
        opens: Vec<BlockId>,
        arms: impl FnOnce(&mut Self, Vec<BlockId>, Vec<BlockId>) -> CompileResult<Vec<BlockId>>,
    ) -> CompileResult<Vec<BlockId>> {
        let (bodies, elses) = self.fan_out(node, test, &opens);
        let out = arms(self, bodies, elses)?;
        Ok(self.collapse(out))
    }

    fn fan_out(&mut self, node: &Node, test: &Operand, opens: &[BlockId]) -> (Vec<BlockId>, Vec<BlockId>) {
        let mut bodies = Vec::with_capacity(opens.len());
        let mut elses = Vec::with_capacity(opens.len());
        for &open in opens {
            let body = self.cx.code.child(open);
            let orelse = self.cx.code.child(open);
            self.cx.code.push(
                open,
                Stmt::new(
                    StmtKind::If {
                        test: test.clone(),
                        body,
                        orelse,
                    },
                    node.loc,
                    node.frame,
                ),
            );
            bodies.push(body);
            elses.push(orelse);
        }
        (bodies, elses)
    }

    /// Folds sibling branches that are all still open back into the block
    /// holding their `if`/`case`, so following code is emitted once after
    /// the branch instead of once per arm.
    pub(crate) fn collapse(&self, opens: Vec<BlockId>) -> Vec<BlockId> {
        let mut opens: Vec<BlockId> = opens.into_iter().unique().collect();
        loop {
            let mut merged = None;
            for &open in &opens {
                let Some(parent) = self.cx.code.get(open).parent else {
                    continue;
                };
                let Some(last) = self.cx.code.get(parent).stmts.last() else {
                    continue;
                };
                let children = match &last.kind {
                    StmtKind::If { .. } | StmtKind::CaseWhen { default: Some(_), .. } => {
                        last.kind.blocks()
                    }
                    _ => continue,
                };
                if children.contains(&open) && children.iter().all(|c| opens.contains(c)) {
                    merged = Some((parent, children));
                    break;
                }
            }
            let Some((parent, children)) = merged else {
                return opens;
            };
            let at = opens
                .iter()
                .position(|b| children.contains(b))
                .unwrap_or(opens.len());
            opens.retain(|b| !children.contains(b));
            let at = at.min(opens.len());
            opens.insert(at, parent);
            opens = opens.into_iter().unique().collect();
        }
    }

    fn if_expr(
        &mut self,
        node: &Node,
        test: &Operand,
        body: NodeId,
        orelse: NodeId,
        hooks: [HookId; 2],
        opens: Vec<BlockId>,
    ) -> CompileResult<Vec<BlockId>> {
        match self.kind {
            ContextKind::Sequential => self.branch(node, test, opens, |g, bodies, elses| {
                let a = g.lower(body, bodies)?;
                g.redirects(hooks[0], &a, node)?;
                let b = g.lower(orelse, elses)?;
                g.redirects(hooks[1], &b, node)?;
                Ok(a.into_iter().chain(b).collect())
            }),
            ContextKind::Concurrent => {
                let opens = self.lower(body, opens)?;
                let opens = self.lower(orelse, opens)?;
                let truth = self.truth_value(test)?;
                let taken = self.tree.hook(hooks[0]).redirects.clone();
                let other = self.tree.hook(hooks[1]).redirects.clone();
                if taken.len() != other.len() {
                    return Err(CompileError::sanity("if-expression arms recorded different targets"));
                }
                for (a, b) in taken.into_iter().zip(other) {
                    let kind = StmtKind::SelectWith {
                        target: a.target,
                        arg: test.clone(),
                        choices: vec![(truth.clone(), a.source)],
                        default: Some(b.source),
                    };
                    self.emit(&opens, kind, node);
                }
                Ok(opens)
            }
        }
    }

    /// The constant a selector equals when `test` holds.
    fn truth_value(&self, test: &Operand) -> CompileResult<ConstValue> {
        match test {
            Operand::Event { .. } => Err(CompileError::type_error(
                "edge tests cannot select values in a concurrent context",
            )),
            other => match self.cx.objects.operand_type(other) {
                Some(Primitive::Bit) => Ok(ConstValue::bit(true)),
                Some(Primitive::Bool) => Ok(ConstValue::Bool(true)),
                Some(ty) => Err(CompileError::type_error(format!(
                    "an if-expression condition must be Bit or bool, found {ty}"
                ))),
                None => Err(CompileError::type_error(
                    "an if-expression condition must be Bit or bool",
                )),
            },
        }
    }

    fn select_with(
        &mut self,
        node: &Node,
        arg: &Operand,
        choices: &[(ConstValue, HookId)],
        default: Option<HookId>,
        opens: Vec<BlockId>,
    ) -> CompileResult<Vec<BlockId>> {
        let hooks: Vec<HookId> = choices.iter().map(|(_, h)| *h).chain(default).collect();
        let counts: Vec<usize> = hooks
            .iter()
            .map(|h| self.tree.hook(*h).redirects.len())
            .unique()
            .collect();
        let count = match counts.as_slice() {
            [] => 0,
            [n] => *n,
            _ => return Err(CompileError::sanity("select arms recorded different targets")),
        };
        if count == 0 {
            return Ok(opens);
        }
        match self.kind {
            ContextKind::Concurrent => {
                for i in 0..count {
                    let mut target = None;
                    let mut arms = Vec::with_capacity(choices.len());
                    for (value, hook) in choices {
                        let r = &self.tree.hook(*hook).redirects[i];
                        target = Some(r.target);
                        arms.push((value.clone(), r.source.clone()));
                    }
                    let other = default.map(|h| self.tree.hook(h).redirects[i].clone());
                    let Some(target) = target.or(other.as_ref().map(|r| r.target)) else {
                        continue;
                    };
                    let kind = StmtKind::SelectWith {
                        target,
                        arg: arg.clone(),
                        choices: arms,
                        default: other.map(|r| r.source),
                    };
                    self.emit(&opens, kind, node);
                }
                Ok(opens)
            }
            ContextKind::Sequential => {
                let mut out = Vec::new();
                for open in opens {
                    let mut branches = Vec::with_capacity(choices.len());
                    for (value, hook) in choices {
                        let block = self.cx.code.child(open);
                        self.redirects(*hook, &[block], node)?;
                        branches.push((value.clone(), block));
                    }
                    let other = self.cx.code.child(open);
                    if let Some(hook) = default {
                        self.redirects(hook, &[other], node)?;
                    }
                    out.extend(branches.iter().map(|(_, b)| *b));
                    out.push(other);
                    self.cx.code.push(
                        open,
                        Stmt::new(
                            StmtKind::CaseWhen {
                                value: arg.clone(),
                                branches,
                                default: Some(other),
                            },
                            node.loc,
                            node.frame,
                        ),
                    );
                }
                Ok(self.collapse(out))
            }
        }
    }

    /// Recognizes `x == c0`, `x == c1`, ... alternatives over one subject.
    fn case_shape(&self, cases: &[SelectCase]) -> Option<(Operand, Vec<ConstValue>)> {
        let mut subject: Option<Operand> = None;
        let mut values: Vec<ConstValue> = Vec::with_capacity(cases.len());
        for case in cases {
            let [compare] = case.bound.as_slice() else {
                return None;
            };
            let NodeKind::Compare {
                op: CompareOp::Eq,
                lhs,
                rhs: Operand::Const(value),
                result,
            } = &self.tree.node(*compare).kind
            else {
                return None;
            };
            if case.test != Operand::Object(*result) || lhs.as_object().is_none() {
                return None;
            }
            if subject.as_ref().is_some_and(|s| s != lhs) || values.contains(value) {
                return None;
            }
            subject = Some(lhs.clone());
            values.push(value.clone());
        }
        subject.map(|s| (s, values))
    }

    fn cond_select(
        &mut self,
        node: &Node,
        cases: &[SelectCase],
        default: Option<NodeId>,
        opens: Vec<BlockId>,
    ) -> CompileResult<Vec<BlockId>> {
        let Some((subject, values)) = self.case_shape(cases) else {
            return self.if_chain(node, cases, default, opens);
        };
        let mut arms: Vec<Vec<BlockId>> = vec![Vec::new(); cases.len()];
        let mut others = Vec::with_capacity(opens.len());
        for &open in &opens {
            let mut branches = Vec::with_capacity(cases.len());
            for (i, value) in values.iter().enumerate() {
                let block = self.cx.code.child(open);
                arms[i].push(block);
                branches.push((value.clone(), block));
            }
            let other = self.cx.code.child(open);
            others.push(other);
            self.cx.code.push(
                open,
                Stmt::new(
                    StmtKind::CaseWhen {
                        value: subject.clone(),
                        branches,
                        default: Some(other),
                    },
                    node.loc,
                    node.frame,
                ),
            );
        }
        let mut out = Vec::new();
        for (case, blocks) in cases.iter().zip(arms) {
            out.extend(self.lower(case.body, blocks)?);
        }
        match default {
            Some(d) => out.extend(self.lower(d, others)?),
            None => out.extend(others),
        }
        Ok(self.collapse(out))
    }

    fn if_chain(
        &mut self,
        node: &Node,
        cases: &[SelectCase],
        default: Option<NodeId>,
        opens: Vec<BlockId>,
    ) -> CompileResult<Vec<BlockId>> {
        let Some((first, rest)) = cases.split_first() else {
            return match default {
                Some(d) => self.lower(d, opens),
                None => Ok(opens),
            };
        };
        let opens = self.lower_all(&first.bound, opens)?;
        self.branch(node, &first.test, opens, |g, bodies, elses| {
            let mut out = g.lower(first.body, bodies)?;
            out.extend(g.if_chain(node, rest, default, elses)?);
            Ok(out)
        })
    }

    fn machine(&mut self) -> CompileResult<&mut Machine> {
        if self.kind != ContextKind::Sequential || !self.machine_active {
            return Err(CompileError::control_flow(
                "`await` and `while` require an async sequential context",
            ));
        }
        self.machine
            .as_mut()
            .ok_or_else(|| CompileError::sanity("sequential context without a state machine"))
    }

    fn statemachine(&mut self, node: &Node, body: NodeId, opens: Vec<BlockId>) -> CompileResult<Vec<BlockId>> {
        if self.machine_active {
            return Err(CompileError::control_flow("nested state machines are not supported"));
        }
        let first = match &self.machine {
            Some(m) => m.first_state(),
            None => {
                return Err(CompileError::control_flow(
                    "state machines require a sequential context",
                ))
            }
        };
        self.machine_active = true;
        let result = self.lower(body, opens);
        self.machine_active = false;
        let ends = result?;
        // Paths reaching the end of the coroutine start over.
        self.emit(&ends, StmtKind::Transition(first), node);
        Ok(Vec::new())
    }

    /// Moves `opens` into a fresh state, or stays when they are exactly
    /// one state that has no code yet.
    fn enter_state(&mut self, node: &Node, opens: &[BlockId]) -> CompileResult<Vec<BlockId>> {
        if let [single] = opens {
            let reusable = self.machine()?.is_state_root(*single)
                && self.cx.code.is_effectively_empty(*single);
            if reusable {
                return Ok(vec![*single]);
            }
        }
        let code = &mut self.cx.code;
        let machine = self
            .machine
            .as_mut()
            .ok_or_else(|| CompileError::sanity("sequential context without a state machine"))?;
        let (state, block) = machine.add_state(code);
        self.emit(opens, StmtKind::Transition(state), node);
        Ok(vec![block])
    }

    fn await_(&mut self, node: &Node, test: &Operand, opens: Vec<BlockId>) -> CompileResult<Vec<BlockId>> {
        self.machine()?;
        if opens.is_empty() {
            return Ok(opens);
        }
        let here = self.enter_state(node, &opens)?;
        let here = self.lower_all(&node.bound, here)?;
        match test.as_const().and_then(ConstValue::truthiness) {
            Some(true) => Ok(here),
            Some(false) => {
                log::warn!("`await` on a false condition at line {} never resumes", node.loc.line);
                Ok(Vec::new())
            }
            None => {
                let (bodies, _) = self.fan_out(node, test, &here);
                Ok(bodies)
            }
        }
    }

    fn while_loop(&mut self, node: &Node, test: &Operand, body: NodeId, opens: Vec<BlockId>) -> CompileResult<Vec<BlockId>> {
        self.machine()?;
        if opens.is_empty() {
            return Ok(opens);
        }
        let endless = test.as_const().and_then(ConstValue::truthiness) == Some(true);
        let flags = self.tree.node(body).flags;
        if endless && flags.contains_continue && !flags.contains_break {
            return Err(CompileError::control_flow(
                "`continue` in an endless loop requires a terminating `break`",
            ));
        }
        let code = &mut self.cx.code;
        let machine = self
            .machine
            .as_mut()
            .ok_or_else(|| CompileError::sanity("sequential context without a state machine"))?;
        let (header, block) = machine.add_state(code);
        self.emit(&opens, StmtKind::Transition(header), node);
        let here = self.lower_all(&node.bound, vec![block])?;
        let (entries, mut exits) = if endless {
            (here, Vec::new())
        } else {
            self.fan_out(node, test, &here)
        };
        self.loops.push(LoopFrame {
            header,
            breaks: Vec::new(),
        });
        let result = self.lower(body, entries);
        let frame = self.loops.pop();
        let ends = result?;
        self.emit(&ends, StmtKind::Transition(header), node);
        if let Some(frame) = frame {
            exits.extend(frame.breaks);
        }
        self.diverged = exits.is_empty();
        Ok(exits)
    }
}

