//! Calls: user functions, methods, classes and awaits.

use super::stmt::Cond;
use super::{FnFrame, Flow, Lowerer, ReturnPath, MAX_CALL_DEPTH};
use crate::ast::{Expr, ExprKind, HostBinOp};
use crate::heap::{ClassId, FunctionId, InstanceObj};
use crate::prepared::{NodeKind, ValueBranch};
use crate::value::HostValue;
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_types::{ConstValue, Operand};
use linked_hash_map::LinkedHashMap;
use std::collections::BTreeSet;

impl<'a> Lowerer<'a> {
    /// Inlines a call of a user function.
    pub(super) fn call_function(
        &mut self,
        function: FunctionId,
        receiver: Option<HostValue>,
        args: Vec<HostValue>,
        kwargs: Vec<(String, HostValue)>,
    ) -> CompileResult<HostValue> {
        if self.stack.len() >= MAX_CALL_DEPTH {
            return Err(CompileError::sanity("maximum call depth exceeded"));
        }
        let awaited = std::mem::take(&mut self.awaiting);
        let fobj = self.cx.heap.functions[function].clone();
        let def = fobj.def.clone();
        match (def.is_async, awaited) {
            (true, false) => {
                return Err(CompileError::type_error(format!(
                    "coroutine `{}` must be awaited",
                    def.name
                )))
            }
            (false, true) => {
                return Err(CompileError::type_error(format!(
                    "`{}` is not a coroutine and cannot be awaited",
                    def.name
                )))
            }
            _ => {}
        }
        let definition = self.cx.definitions.get(&def)?;
        let scope = self.cx.heap.new_scope(Some(fobj.closure));
        for name in &definition.local_names {
            self.cx.heap.bind(scope, name.clone(), HostValue::Unbound);
        }

        let mut positional = Vec::with_capacity(args.len() + 1);
        positional.extend(receiver.clone());
        positional.extend(args);
        if positional.len() > def.params.len() {
            return Err(CompileError::type_error(format!(
                "`{}` takes {} positional arguments but {} were given",
                def.name,
                def.params.len(),
                positional.len()
            )));
        }
        let mut bound: Vec<Option<HostValue>> = def.params.iter().map(|_| None).collect();
        for (slot, value) in bound.iter_mut().zip(positional) {
            *slot = Some(value);
        }
        for (key, value) in kwargs {
            let Some(index) = def.params.iter().position(|p| p.name == key) else {
                return Err(CompileError::type_error(format!(
                    "`{}` got an unexpected keyword argument `{key}`",
                    def.name
                )));
            };
            if bound[index].is_some() {
                return Err(CompileError::type_error(format!(
                    "`{}` got multiple values for argument `{key}`",
                    def.name
                )));
            }
            bound[index] = Some(value);
        }
        for ((param, slot), default) in def.params.iter().zip(bound).zip(&fobj.defaults) {
            let value = match (slot, default) {
                (Some(v), _) => v,
                (None, Some(d)) => d.clone(),
                (None, None) => {
                    return Err(CompileError::type_error(format!(
                        "`{}` missing required argument `{}`",
                        def.name, param.name
                    )))
                }
            };
            self.cx.heap.bind(scope, param.name.clone(), value);
        }

        let parent = if self.stack.is_empty() {
            None
        } else {
            Some(self.current_frame())
        };
        let frame = self.cx.frames.push(parent, def.name.clone(), def.loc);
        if self.root_frame.is_none() {
            self.root_frame = Some(frame);
        }
        log::trace!("inlining `{}`", def.name);
        self.stack.push(FnFrame {
            name: def.name.clone(),
            scope,
            definition,
            first_arg: receiver,
            owner: fobj.owner,
            is_async: def.is_async,
            frame,
            runtime_depth: 0,
            loops: Vec::new(),
            returns: Vec::new(),
            ambiguous: BTreeSet::new(),
        });
        let saved_loc = self.loc;
        let result = self.capture(|l| l.body(&def.body));
        self.loc = saved_loc;
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| CompileError::sanity("function frame stack underflow"))?;
        let (flow, nodes) = result?;
        let value = self
            .return_value(&frame.name, flow, frame.returns)
            .map_err(|e| self.located(e))?;
        if !nodes.is_empty() {
            let body = self.block(nodes);
            self.emit(NodeKind::Call {
                function: frame.name,
                body,
            })?;
        }
        Ok(value)
    }

    /// Combines the values of every `return` of one call.
    fn return_value(&mut self, name: &str, flow: Flow, returns: Vec<ReturnPath>) -> CompileResult<HostValue> {
        if returns.iter().all(|r| r.hook.is_none()) {
            return Ok(returns.into_iter().last().map_or(HostValue::None, |r| r.value));
        }
        if returns.iter().all(|r| r.value == HostValue::None) {
            return Ok(HostValue::None);
        }
        let fell_through = flow != Flow::Return;
        let mut branches = Vec::with_capacity(returns.len());
        for ret in returns {
            match (ret.hook, ret.value.to_operand()) {
                (Some(hook), Some(value)) if !fell_through => {
                    branches.push(ValueBranch { value, hook })
                }
                _ => {
                    return Err(CompileError::type_error(format!(
                        "`{name}` does not return a value on every path"
                    )))
                }
            }
        }
        self.merge_values(branches)
    }

    /// Calls any callable host value.
    pub(super) fn call_value(
        &mut self,
        callee: HostValue,
        args: Vec<HostValue>,
        kwargs: Vec<(String, HostValue)>,
    ) -> CompileResult<HostValue> {
        match callee {
            HostValue::Function(f) => self.call_function(f, None, args, kwargs),
            HostValue::BoundMethod { function, receiver } => {
                self.call_function(function, Some(*receiver), args, kwargs)
            }
            HostValue::Intrinsic(i) => self.call_intrinsic(i, None, args, kwargs),
            HostValue::BoundIntrinsic {
                intrinsic,
                receiver,
            } => self.call_intrinsic(intrinsic, Some(*receiver), args, kwargs),
            HostValue::Type(ty) => self.construct(ty, args, kwargs),
            HostValue::Class(cid) => self.instantiate(cid, args, kwargs),
            HostValue::Instance(_) => match self.method(&callee, "__call__") {
                Some(f) => self.call_function(f, Some(callee), args, kwargs),
                None => Err(CompileError::type_error("instance is not callable")),
            },
            other => Err(CompileError::type_error(format!(
                "a {} is not callable",
                other.type_name()
            ))),
        }
    }

    fn instantiate(
        &mut self,
        class: ClassId,
        args: Vec<HostValue>,
        kwargs: Vec<(String, HostValue)>,
    ) -> CompileResult<HostValue> {
        let id = self.cx.heap.instances.alloc(InstanceObj {
            class,
            attrs: LinkedHashMap::new(),
            init_active: true,
        });
        let instance = HostValue::Instance(id);
        match self.method(&instance, "__init__") {
            Some(init) => {
                self.call_function(init, Some(instance.clone()), args, kwargs)?;
            }
            None if !args.is_empty() || !kwargs.is_empty() => {
                return Err(CompileError::type_error(format!(
                    "`{}` takes no arguments",
                    self.cx.heap.classes[class].name
                )))
            }
            None => {}
        }
        self.cx.heap.instances[id].init_active = false;
        Ok(instance)
    }

    /// A method of an instance's class, by name.
    fn method(&self, value: &HostValue, name: &str) -> Option<FunctionId> {
        let HostValue::Instance(iid) = value else {
            return None;
        };
        let class = self.cx.heap.instances[*iid].class;
        match self.cx.heap.class_attr(class, name) {
            Some((_, HostValue::Function(f))) => Some(*f),
            _ => None,
        }
    }

    /// Calls `value.<name>(args)` if the instance defines it.
    pub(super) fn call_dunder(
        &mut self,
        value: &HostValue,
        name: &str,
        args: Vec<HostValue>,
    ) -> CompileResult<Option<HostValue>> {
        match self.method(value, name) {
            Some(f) => self
                .call_function(f, Some(value.clone()), args, Vec::new())
                .map(Some),
            None => Ok(None),
        }
    }

    /// Operator overloading on instances, trying the reflected method second.
    pub(super) fn binop_dunder(
        &mut self,
        op: HostBinOp,
        lhs: &HostValue,
        rhs: &HostValue,
    ) -> CompileResult<Option<HostValue>> {
        let name = dunder_name(op);
        if let Some(result) = self.call_dunder(lhs, &format!("__{name}__"), vec![rhs.clone()])? {
            return Ok(Some(result));
        }
        self.call_dunder(rhs, &format!("__r{name}__"), vec![lhs.clone()])
    }

    /// `x op= y` on an instance; returns `false` when no in-place method
    /// exists.
    pub(super) fn inplace_dunder(&mut self, target: &HostValue, op: HostBinOp, rhs: &HostValue) -> CompileResult<bool> {
        let name = format!("__i{}__", dunder_name(op));
        Ok(self.call_dunder(target, &name, vec![rhs.clone()])?.is_some())
    }

    /// `always(expr)`: the expression is evaluated outside the state machine.
    pub(super) fn always_call(&mut self, args: &[Expr]) -> CompileResult<HostValue> {
        self.require_sequential("`always`")?;
        let [arg] = args else {
            return Err(CompileError::intrinsic("`always` takes exactly one argument"));
        };
        let (value, nodes) = self.capture(|l| l.eval(arg))?;
        self.always.extend(nodes);
        Ok(value)
    }

    /// `await coroutine()` inlines the coroutine; `await cond` waits for
    /// `cond` in a new state.
    pub(super) fn await_expr(&mut self, inner: &Expr) -> CompileResult<HostValue> {
        self.require_sequential("`await`")?;
        if !self.frame()?.is_async {
            return Err(CompileError::control_flow(
                "`await` outside of an async function",
            ));
        }
        if let ExprKind::Call {
            func,
            args,
            keywords,
        } = &inner.kind
        {
            let callee = self.eval(func)?;
            if self.is_coroutine(&callee) {
                let args = self.eval_args(args)?;
                let keywords = self.eval_keywords(keywords)?;
                self.awaiting = true;
                let result = self.call_value(callee, args, keywords);
                self.awaiting = false;
                return result;
            }
        }
        let (test, bound) = self.capture(|l| {
            let value = l.eval(inner)?;
            Ok(match l.condition(&value)? {
                Cond::Runtime(op) => op,
                Cond::Const(b) => Operand::Const(ConstValue::Bool(b)),
            })
        })?;
        self.emit_bound(NodeKind::Await { test }, bound)?;
        Ok(HostValue::None)
    }

    fn is_coroutine(&self, callee: &HostValue) -> bool {
        let function = match callee {
            HostValue::Function(f) => *f,
            HostValue::BoundMethod { function, .. } => *function,
            _ => return false,
        };
        self.cx.heap.functions[function].def.is_async
    }
}

fn dunder_name(op: HostBinOp) -> &'static str {
    match op {
        HostBinOp::Add => "add",
        HostBinOp::Sub => "sub",
        HostBinOp::Mult => "mul",
        HostBinOp::FloorDiv => "floordiv",
        HostBinOp::Mod => "mod",
        HostBinOp::Pow => "pow",
        HostBinOp::BitAnd => "and",
        HostBinOp::BitOr => "or",
        HostBinOp::BitXor => "xor",
        HostBinOp::LShift => "lshift",
        HostBinOp::RShift => "rshift",
        HostBinOp::MatMult => "matmul",
    }
}
