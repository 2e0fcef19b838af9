//! Statement lowering.

use super::{Flow, LoopKind, Lowerer, ReturnPath};
use crate::ast::{ClassDef, Expr, ExprKind, FunctionDef, HostBinOp, MatchCase, Pattern, Stmt, StmtKind};
use crate::heap::{ClassId, ClassObj, ScopeId};
use crate::prepared::{NodeId, NodeKind, SelectCase};
use crate::value::HostValue;
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_types::{AssignMode, ConstValue, ContextKind, Operand};
use linked_hash_map::LinkedHashMap;
use std::rc::Rc;

/// A lowered condition.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cond {
    Const(bool),
    Runtime(Operand),
}

impl Cond {
    pub(crate) fn into_operand(self) -> Operand {
        match self {
            Cond::Const(b) => Operand::Const(ConstValue::Bool(b)),
            Cond::Runtime(op) => op,
        }
    }
}

type Bindings = LinkedHashMap<String, HostValue>;

/// One lowered arm of a runtime branch.
struct Arm {
    flow: Flow,
    nodes: Vec<NodeId>,
    bindings: Option<Bindings>,
}

impl<'a> Lowerer<'a> {
    pub(super) fn body(&mut self, stmts: &[Stmt]) -> CompileResult<Flow> {
        for stmt in stmts {
            let flow = self.stmt(stmt)?;
            if !flow.is_normal() {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn stmt(&mut self, stmt: &Stmt) -> CompileResult<Flow> {
        self.loc = stmt.loc;
        let result = self.stmt_kind(&stmt.kind);
        result.map_err(|e| self.located(e))
    }

    fn stmt_kind(&mut self, kind: &StmtKind) -> CompileResult<Flow> {
        match kind {
            StmtKind::Expr(e) => {
                self.eval(e)?;
            }
            StmtKind::Assign { targets, value } => {
                let value = self.eval(value)?;
                for target in targets {
                    self.store(target, value.clone(), false)?;
                }
            }
            StmtKind::AugAssign { target, op, value } => self.aug_assign(target, *op, value)?,
            StmtKind::If { test, body, orelse } => return self.if_stmt(test, body, orelse),
            StmtKind::While { test, body } => return self.while_stmt(test, body),
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => return self.for_stmt(target, iter, body, orelse),
            StmtKind::Break => return self.loop_exit(Flow::Break),
            StmtKind::Continue => return self.loop_exit(Flow::Continue),
            StmtKind::Return(value) => return self.return_stmt(value.as_ref()),
            StmtKind::Pass | StmtKind::Nonlocal(_) => {}
            StmtKind::Assert { test, msg } => self.assert_stmt(test, msg.as_ref())?,
            StmtKind::FunctionDef(def) => {
                let closure = self.scope()?;
                let value = self.define_function(def, closure, None)?;
                self.bind_name(&def.name, value, false)?;
            }
            StmtKind::ClassDef(class) => self.define_class(class)?,
            StmtKind::Match { subject, cases } => return self.match_stmt(subject, cases),
        }
        Ok(Flow::Normal)
    }

    /// Lowers `body` as one arm of a runtime branch and resets the local
    /// bindings to `before` afterwards.
    fn arm(&mut self, before: &Bindings, body: &[Stmt]) -> CompileResult<Arm> {
        let (flow, nodes) = self.branch(|l| l.body(body))?;
        let bindings = if flow.is_normal() {
            Some(self.snapshot()?)
        } else {
            None
        };
        self.restore(before)?;
        Ok(Arm {
            flow,
            nodes,
            bindings,
        })
    }

    fn finish_arms(&mut self, before: &Bindings, arms: &[&Arm], exhaustive: bool) -> CompileResult<Flow> {
        let mut bindings: Vec<Bindings> = arms.iter().filter_map(|a| a.bindings.clone()).collect();
        if !exhaustive {
            bindings.push(before.clone());
        }
        if bindings.is_empty() {
            self.restore(before)?;
        } else {
            self.reconcile(before, bindings)?;
        }
        let all_exit = exhaustive && arms.iter().all(|a| !a.flow.is_normal());
        Ok(match arms.first() {
            Some(first) if all_exit => first.flow,
            _ => Flow::Normal,
        })
    }

    fn if_stmt(&mut self, test: &Expr, body: &[Stmt], orelse: &[Stmt]) -> CompileResult<Flow> {
        let value = self.eval(test)?;
        match self.condition(&value)? {
            Cond::Const(true) => self.body(body),
            Cond::Const(false) => self.body(orelse),
            Cond::Runtime(op) => {
                self.require_sequential("a runtime `if`")?;
                let before = self.snapshot()?;
                let then = self.arm(&before, body)?;
                let other = self.arm(&before, orelse)?;
                let flow = self.finish_arms(&before, &[&then, &other], true)?;
                let body = self.block(then.nodes);
                let orelse = self.block(other.nodes);
                self.emit(NodeKind::If {
                    test: op,
                    body,
                    orelse,
                })?;
                Ok(flow)
            }
        }
    }

    fn while_stmt(&mut self, test: &Expr, body: &[Stmt]) -> CompileResult<Flow> {
        if self.kind != ContextKind::Sequential || !self.frame()?.is_async {
            return Err(CompileError::control_flow(
                "`while` loops require an async sequential context",
            ));
        }
        let (cond, test_nodes) = self.capture(|l| {
            let v = l.eval(test)?;
            l.condition(&v)
        })?;
        if cond == Cond::Const(false) {
            return Ok(Flow::Normal);
        }
        let endless = cond == Cond::Const(true);
        let before = self.snapshot()?;
        self.frame_mut()?.loops.push(LoopKind::Runtime);
        let result = self.arm(&before, body);
        self.frame_mut()?.loops.pop();
        let arm = result?;
        self.finish_arms(&before, &[&arm], endless)?;
        let body = self.block(arm.nodes);
        self.emit_bound(
            NodeKind::While {
                test: cond.into_operand(),
                body,
            },
            test_nodes,
        )?;
        Ok(Flow::Normal)
    }

    fn loop_exit(&mut self, flow: Flow) -> CompileResult<Flow> {
        let word = if flow == Flow::Break { "break" } else { "continue" };
        let frame = self.frame()?;
        let depth = frame.runtime_depth;
        match frame.loops.last().copied() {
            None => Err(CompileError::control_flow(format!(
                "`{word}` outside of a loop"
            ))),
            Some(LoopKind::Runtime) => {
                let kind = if flow == Flow::Break {
                    NodeKind::Break
                } else {
                    NodeKind::Continue
                };
                self.emit(kind)?;
                Ok(flow)
            }
            Some(LoopKind::Unrolled(entry)) if entry == depth => Ok(flow),
            Some(LoopKind::Unrolled(_)) => Err(CompileError::control_flow(format!(
                "`{word}` inside a runtime condition of an unrolled `for` loop; \
                 only `if cond: ...; break` as the whole loop body is supported"
            ))),
        }
    }

    fn for_stmt(
        &mut self,
        target: &Expr,
        iter: &Expr,
        body: &[Stmt],
        orelse: &[Stmt],
    ) -> CompileResult<Flow> {
        let iterable = self.eval(iter)?;
        let items = self.iterate(&iterable)?;
        let depth = self.frame()?.runtime_depth;
        self.frame_mut()?.loops.push(LoopKind::Unrolled(depth));
        let result = match select_pattern(body) {
            Some((test, arm)) => self.for_select(target, items, test, arm, orelse),
            None => self.unroll(target, items, body, orelse),
        };
        self.frame_mut()?.loops.pop();
        result
    }

    fn unroll(
        &mut self,
        target: &Expr,
        items: Vec<HostValue>,
        body: &[Stmt],
        orelse: &[Stmt],
    ) -> CompileResult<Flow> {
        for item in items {
            self.store(target, item, true)?;
            match self.body(body)? {
                Flow::Break => return Ok(Flow::Normal),
                Flow::Return => return Ok(Flow::Return),
                Flow::Normal | Flow::Continue => {}
            }
        }
        // `else` runs outside the loop.
        let outer = self.frame_mut()?.loops.pop();
        let flow = self.body(orelse);
        if let Some(kind) = outer {
            self.frame_mut()?.loops.push(kind);
        }
        flow
    }

    /// `for x in items: if test(x): ...; break` becomes a priority select.
    fn for_select(
        &mut self,
        target: &Expr,
        items: Vec<HostValue>,
        test: &Expr,
        body: &[Stmt],
        orelse: &[Stmt],
    ) -> CompileResult<Flow> {
        let before = self.snapshot()?;
        let mut cases = Vec::new();
        let mut arms = Vec::new();
        let mut default = None;
        for item in items {
            self.store(target, item, true)?;
            let (cond, test_nodes) = self.capture(|l| {
                let v = l.eval(test)?;
                l.condition(&v)
            })?;
            match cond {
                Cond::Const(false) => {}
                Cond::Const(true) => {
                    let mut arm = self.arm(&before, body)?;
                    let mut nodes = test_nodes;
                    nodes.append(&mut arm.nodes);
                    arm.nodes = nodes;
                    default = Some(arm);
                    break;
                }
                Cond::Runtime(op) => {
                    let arm = self.arm(&before, body)?;
                    cases.push((op, test_nodes, arm.nodes.clone()));
                    arms.push(arm);
                }
            }
        }
        if default.is_none() && !orelse.is_empty() {
            let outer = self.frame_mut()?.loops.pop();
            let arm = self.arm(&before, orelse);
            if let Some(kind) = outer {
                self.frame_mut()?.loops.push(kind);
            }
            default = Some(arm?);
        }
        if cases.is_empty() {
            // Resolved at lowering time.
            return match default {
                Some(arm) => {
                    if let Some(bindings) = &arm.bindings {
                        self.restore(bindings)?;
                    }
                    let sink = self
                        .sinks
                        .last_mut()
                        .ok_or_else(|| CompileError::sanity("no active node sink"))?;
                    sink.extend(arm.nodes);
                    Ok(arm.flow)
                }
                None => Ok(Flow::Normal),
            };
        }
        self.require_sequential("a runtime `for ... break` selection")?;
        let mut all: Vec<&Arm> = arms.iter().collect();
        if let Some(d) = &default {
            all.push(d);
        }
        let flow = self.finish_arms(&before, &all, default.is_some())?;
        let cases = cases
            .into_iter()
            .map(|(test, bound, nodes)| SelectCase {
                test,
                bound,
                body: self.block(nodes),
            })
            .collect();
        let default = default.map(|arm| self.block(arm.nodes));
        self.emit(NodeKind::CondSelect { cases, default })?;
        Ok(flow)
    }

    fn match_stmt(&mut self, subject: &Expr, cases: &[MatchCase]) -> CompileResult<Flow> {
        let subject = self.eval(subject)?;
        let before = self.snapshot()?;
        let mut select = Vec::new();
        let mut arms = Vec::new();
        let mut default = None;
        for case in cases {
            let (cond, test_nodes) = self.capture(|l| l.pattern_test(&subject, &case.pattern))?;
            match cond {
                Cond::Const(false) => {}
                Cond::Const(true) if select.is_empty() => {
                    self.sinks
                        .last_mut()
                        .ok_or_else(|| CompileError::sanity("no active node sink"))?
                        .extend(test_nodes);
                    return self.body(&case.body);
                }
                Cond::Const(true) => {
                    default = Some(self.arm(&before, &case.body)?);
                    break;
                }
                Cond::Runtime(op) => {
                    let arm = self.arm(&before, &case.body)?;
                    select.push((op, test_nodes, arm.nodes.clone()));
                    arms.push(arm);
                }
            }
        }
        if select.is_empty() {
            return Ok(Flow::Normal);
        }
        self.require_sequential("a runtime `match`")?;
        let mut all: Vec<&Arm> = arms.iter().collect();
        if let Some(d) = &default {
            all.push(d);
        }
        let flow = self.finish_arms(&before, &all, default.is_some())?;
        let cases = select
            .into_iter()
            .map(|(test, bound, nodes)| SelectCase {
                test,
                bound,
                body: self.block(nodes),
            })
            .collect();
        let default = default.map(|arm| self.block(arm.nodes));
        self.emit(NodeKind::CondSelect { cases, default })?;
        Ok(flow)
    }

    fn pattern_test(&mut self, subject: &HostValue, pattern: &Pattern) -> CompileResult<Cond> {
        match pattern {
            Pattern::As(None) => Ok(Cond::Const(true)),
            Pattern::As(Some(name)) => {
                self.bind_name(name, subject.clone(), true)?;
                Ok(Cond::Const(true))
            }
            Pattern::Value(e) => {
                let value = self.eval(e)?;
                let eq = self.compare_values(crate::ast::HostCmpOp::Eq, subject, &value)?;
                self.condition(&eq)
            }
            Pattern::Or(items) => {
                let mut runtime = Vec::new();
                for item in items {
                    match self.pattern_test(subject, item)? {
                        Cond::Const(true) => return Ok(Cond::Const(true)),
                        Cond::Const(false) => {}
                        Cond::Runtime(op) => runtime.push(op),
                    }
                }
                match runtime.len() {
                    0 => Ok(Cond::Const(false)),
                    1 => Ok(Cond::Runtime(runtime.remove(0))),
                    _ => {
                        let result = self.temporary(corvid_types::Primitive::Bool);
                        self.emit(NodeKind::Any {
                            args: runtime,
                            result,
                        })?;
                        Ok(Cond::Runtime(Operand::Object(result)))
                    }
                }
            }
        }
    }

    fn return_stmt(&mut self, value: Option<&Expr>) -> CompileResult<Flow> {
        let mut value = match value {
            Some(e) => self.eval(e)?,
            None => HostValue::None,
        };
        let frame = self.frame()?;
        let hooked = frame.runtime_depth > 0 || frame.returns.iter().any(|r| r.hook.is_some());
        if !hooked {
            self.frame_mut()?.returns.push(ReturnPath { value, hook: None });
            return Ok(Flow::Return);
        }
        let hook = if value == HostValue::None {
            None
        } else {
            let operand = self.operand(&value)?;
            value = HostValue::from_operand(operand);
            Some(self.cx.tree.new_hook())
        };
        self.emit(NodeKind::Return { hook })?;
        self.frame_mut()?.returns.push(ReturnPath { value, hook });
        Ok(Flow::Return)
    }

    fn assert_stmt(&mut self, test: &Expr, msg: Option<&Expr>) -> CompileResult<()> {
        let value = self.eval(test)?;
        let message = match msg {
            Some(m) => match self.eval(m)? {
                HostValue::Str(s) => Some(s.to_string()),
                other => {
                    return Err(CompileError::type_error(format!(
                        "assertion message must be a str, found {}",
                        other.type_name()
                    )))
                }
            },
            None => None,
        };
        match self.condition(&value)? {
            Cond::Const(true) => Ok(()),
            Cond::Const(false) => Err(CompileError::sanity(match message {
                Some(m) => format!("assertion failed: {m}"),
                None => "assertion failed".to_string(),
            })),
            Cond::Runtime(test) => {
                self.emit(NodeKind::Assert { test, message })?;
                Ok(())
            }
        }
    }

    fn aug_assign(&mut self, target: &Expr, op: HostBinOp, value: &Expr) -> CompileResult<()> {
        let rhs = self.eval(value)?;
        let current = self.eval(target)?;
        if let HostValue::Object(id) = current {
            let mode = match op {
                HostBinOp::LShift => Some(AssignMode::Next),
                HostBinOp::BitXor => Some(AssignMode::Push),
                HostBinOp::MatMult => Some(AssignMode::Value),
                _ => None,
            };
            if let Some(mode) = mode {
                return self.assign(id, rhs, mode);
            }
        }
        if let HostValue::Instance(_) = current {
            if self.inplace_dunder(&current, op, &rhs)? {
                return Ok(());
            }
        }
        let result = self.binop(op, current, rhs)?;
        if let ExprKind::Name(name) = &target.kind {
            let def = &self.frame()?.definition;
            if !def.is_local(name) && !def.declared_nonlocal.contains(name) {
                return Err(CompileError::scope(format!(
                    "cannot rebind captured name `{name}`; declare it `nonlocal`"
                )));
            }
        }
        self.store(target, result, true)
    }

    /// Writes `value` into an assignment target.
    pub(super) fn store(&mut self, target: &Expr, value: HostValue, rebind: bool) -> CompileResult<()> {
        match &target.kind {
            ExprKind::Name(name) => self.bind_name(name, value, rebind),
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                let values = self.iterate(&value)?;
                if values.len() != items.len() {
                    return Err(CompileError::type_error(format!(
                        "cannot unpack {} values into {} targets",
                        values.len(),
                        items.len()
                    )));
                }
                for (item, v) in items.iter().zip(values) {
                    self.store(item, v, rebind)?;
                }
                Ok(())
            }
            ExprKind::Attribute { value: owner, attr } => {
                let owner = self.eval(owner)?;
                self.store_attr(owner, attr, value, rebind)
            }
            ExprKind::Subscript { value: owner, index } => {
                let owner = self.eval(owner)?;
                let index = self.eval(index)?;
                self.store_item(owner, index, value)
            }
            _ => Err(CompileError::scope("cannot assign to this expression")),
        }
    }

    pub(super) fn bind_name(&mut self, name: &str, value: HostValue, rebind: bool) -> CompileResult<()> {
        let frame = self.frame()?;
        if frame.definition.declared_nonlocal.contains(name) {
            let owner = self
                .cx
                .heap
                .owner_of(frame.scope, name)
                .ok_or_else(|| CompileError::scope(format!("no binding for nonlocal `{name}`")))?;
            self.cx.heap.bind(owner, name, value);
            return Ok(());
        }
        let scope = frame.scope;
        let unrolling = frame.loops.iter().any(|l| matches!(l, LoopKind::Unrolled(_)));
        if !rebind && !unrolling {
            if let Some(old) = self.cx.heap.get_local(scope, name) {
                if old.is_runtime() && *old != value {
                    let what = match old {
                        HostValue::Object(id) => self.cx.objects.describe(*id),
                        other => other.type_name().to_string(),
                    };
                    return Err(CompileError::scope(format!(
                        "`{name}` already refers to {what}; use `<<=`, `^=` or `@=` to assign to it"
                    )));
                }
            }
        }
        self.cx.heap.bind(scope, name, value);
        self.frame_mut()?.ambiguous.remove(name);
        Ok(())
    }

    fn store_attr(&mut self, owner: HostValue, attr: &str, value: HostValue, rebind: bool) -> CompileResult<()> {
        match owner {
            HostValue::Object(id) => {
                let mode = match attr {
                    "next" => AssignMode::Next,
                    "push" => AssignMode::Push,
                    "value" => AssignMode::Value,
                    _ => {
                        return Err(CompileError::type_error(format!(
                            "cannot set attribute `{attr}` of {}",
                            self.cx.objects.describe(id)
                        )))
                    }
                };
                self.assign(id, value, mode)
            }
            HostValue::Instance(iid) => {
                let instance = &self.cx.heap.instances[iid];
                if instance.init_active || (rebind && instance.attrs.contains_key(attr)) {
                    self.cx.heap.instances[iid].attrs.insert(attr.to_string(), value);
                    return Ok(());
                }
                let class = instance.class;
                if let Some((_, HostValue::Property { setter: Some(setter), .. })) =
                    self.cx.heap.class_attr(class, attr)
                {
                    let setter = *setter;
                    self.call_function(setter, Some(owner), vec![value], Vec::new())?;
                    return Ok(());
                }
                Err(CompileError::scope(format!(
                    "attribute `{attr}` of `{}` can only be declared in `__init__`",
                    self.cx.heap.classes[class].name
                )))
            }
            HostValue::Class(cid) => {
                self.cx.heap.classes[cid].attrs.insert(attr.to_string(), value);
                Ok(())
            }
            other => Err(CompileError::scope(format!(
                "cannot set attribute `{attr}` of a {}",
                other.type_name()
            ))),
        }
    }

    fn store_item(&mut self, owner: HostValue, index: HostValue, value: HostValue) -> CompileResult<()> {
        match owner {
            HostValue::List(lid) => {
                let len = self.cx.heap.lists[lid].len();
                let i = normalize_index(&index, len)?;
                self.cx.heap.lists[lid][i] = value;
                Ok(())
            }
            HostValue::Dict(did) => {
                let key = crate::value::DictKey::from_value(&index).ok_or_else(|| {
                    CompileError::type_error(format!(
                        "a {} cannot be used as a dict key",
                        index.type_name()
                    ))
                })?;
                self.cx.heap.dicts[did].insert(key, value);
                Ok(())
            }
            HostValue::Object(id) => Err(CompileError::scope(format!(
                "use `<<=`, `^=` or `@=` to assign to an element of {}",
                self.cx.objects.describe(id)
            ))),
            other => Err(CompileError::type_error(format!(
                "a {} does not support item assignment",
                other.type_name()
            ))),
        }
    }

    /// Creates a function object; decorators are applied innermost first.
    pub(super) fn define_function(
        &mut self,
        def: &Rc<FunctionDef>,
        closure: ScopeId,
        owner: Option<ClassId>,
    ) -> CompileResult<HostValue> {
        let mut defaults = Vec::with_capacity(def.params.len());
        for param in &def.params {
            defaults.push(match &param.default {
                Some(e) => Some(self.eval(e)?),
                None => None,
            });
        }
        let id = self.cx.heap.functions.alloc(crate::heap::FunctionObj {
            def: def.clone(),
            closure,
            defaults,
            owner,
        });
        let mut value = HostValue::Function(id);
        for decorator in def.decorators.iter().rev() {
            let decorator = self.eval(decorator)?;
            value = self.call_value(decorator, vec![value], Vec::new())?;
        }
        Ok(value)
    }

    fn define_class(&mut self, class: &Rc<ClassDef>) -> CompileResult<()> {
        let base = match &class.base {
            Some(e) => match self.eval(e)? {
                HostValue::Class(id) => Some(id),
                other => {
                    return Err(CompileError::type_error(format!(
                        "base of class `{}` must be a class, found {}",
                        class.name,
                        other.type_name()
                    )))
                }
            },
            None => None,
        };
        let cid = self.cx.heap.classes.alloc(ClassObj {
            name: class.name.clone(),
            base,
            attrs: LinkedHashMap::new(),
            loc: class.loc,
        });
        let outer = self.scope()?;
        let class_scope = self.cx.heap.new_scope(Some(outer));
        self.frame_mut()?.scope = class_scope;
        let result = self.class_body(cid, outer, class_scope, &class.body);
        self.frame_mut()?.scope = outer;
        result?;
        self.bind_name(&class.name, HostValue::Class(cid), false)
    }

    fn class_body(&mut self, cid: ClassId, closure: ScopeId, scope: ScopeId, body: &[Stmt]) -> CompileResult<()> {
        for stmt in body {
            self.loc = stmt.loc;
            let (name, value) = match &stmt.kind {
                StmtKind::FunctionDef(def) => {
                    let value = self.define_function(def, closure, Some(cid))?;
                    (def.name.clone(), value)
                }
                StmtKind::Assign { targets, value } => {
                    let [target] = targets.as_slice() else {
                        return Err(CompileError::scope("chained assignment in class body"));
                    };
                    let Some(name) = target.as_name() else {
                        return Err(CompileError::scope("class attributes must be plain names"));
                    };
                    (name.to_string(), self.eval(value)?)
                }
                StmtKind::Pass => continue,
                StmtKind::Expr(Expr {
                    kind: ExprKind::Literal(_),
                    ..
                }) => continue,
                _ => return Err(CompileError::scope("unsupported statement in class body")),
            };
            self.cx.heap.bind(scope, name.clone(), value.clone());
            self.cx.heap.classes[cid].attrs.insert(name, value);
        }
        Ok(())
    }
}

/// Recognizes a loop body consisting of a single `if` whose arm ends in
/// `break`.
fn select_pattern(body: &[Stmt]) -> Option<(&Expr, &[Stmt])> {
    let [Stmt {
        kind: StmtKind::If { test, body, orelse },
        ..
    }] = body
    else {
        return None;
    };
    if !orelse.is_empty() {
        return None;
    }
    match body.split_last() {
        Some((last, rest)) if last.kind == StmtKind::Break => Some((test, rest)),
        _ => None,
    }
}

/// Resolves a possibly negative host index against a length.
pub(super) fn normalize_index(index: &HostValue, len: usize) -> CompileResult<usize> {
    let i = index.as_int().ok_or_else(|| {
        CompileError::type_error(format!("index must be an int, found {}", index.type_name()))
    })?;
    let resolved = if i < 0 { len as i64 + i } else { i };
    if resolved < 0 || resolved as usize >= len {
        return Err(CompileError::type_error(format!(
            "index {i} out of range for length {len}"
        )));
    }
    Ok(resolved as usize)
}
