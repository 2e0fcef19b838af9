//! Expression lowering.
//!
//! Host values are computed directly. Operations with a qualified operand
//! emit an expression node writing a fresh Temporary, unless both operands
//! are constants and the result folds.

use super::stmt::{normalize_index, Cond};
use super::Lowerer;
use crate::ast::{
    BoolOpKind, Comprehension, Expr, ExprKind, FStringPart, FunctionDef, HostBinOp, HostCmpOp,
    HostUnaryOp, Literal, Param, Stmt, StmtKind,
};
use crate::intrinsics::Intrinsic;
use crate::prepared::{NodeKind, ValueBranch};
use crate::value::{DictKey, HostValue, QualifierCtor, TypeExpr, TypeFamily};
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_types::{
    binop_type, check_boolean_context, check_compare, fold_binop, fold_compare, fold_unary,
    unary_type, BinOp, CompareOp, ConstValue, InlinePart, Operand, Primitive, UnaryOp, VecFamily,
};
use linked_hash_map::LinkedHashMap;
use std::rc::Rc;

impl<'a> Lowerer<'a> {
    pub(super) fn eval(&mut self, expr: &Expr) -> CompileResult<HostValue> {
        match &expr.kind {
            ExprKind::Name(name) => self.lookup(name),
            ExprKind::Literal(lit) => Ok(match lit {
                Literal::None => HostValue::None,
                Literal::Bool(b) => HostValue::Bool(*b),
                Literal::Int(i) => HostValue::Int(*i),
                Literal::Str(s) => HostValue::str(s),
            }),
            ExprKind::Attribute { value, attr } => {
                let value = self.eval(value)?;
                self.attr(value, attr)
            }
            ExprKind::Subscript { value, index } => {
                let base = self.eval(value)?;
                if let ExprKind::Slice { lower, upper, step } = &index.kind {
                    let lower = self.eval_opt(lower.as_deref())?;
                    let upper = self.eval_opt(upper.as_deref())?;
                    let step = self.eval_opt(step.as_deref())?;
                    return self.slice(base, lower, upper, step);
                }
                let index = self.eval(index)?;
                self.index(base, index)
            }
            ExprKind::Slice { .. } => Err(CompileError::type_error(
                "slices are only valid inside a subscript",
            )),
            ExprKind::BinOp { left, op, right } => {
                let lhs = self.eval(left)?;
                let rhs = self.eval(right)?;
                self.binop(*op, lhs, rhs)
            }
            ExprKind::UnaryOp { op, operand } => {
                let value = self.eval(operand)?;
                self.unary(*op, value)
            }
            ExprKind::Compare { left, rest } => {
                let mut lhs = self.eval(left)?;
                let mut results = Vec::with_capacity(rest.len());
                for (op, e) in rest {
                    let rhs = self.eval(e)?;
                    results.push(self.compare_values(*op, &lhs, &rhs)?);
                    lhs = rhs;
                }
                if results.len() == 1 {
                    return Ok(results.remove(0));
                }
                self.combine(BoolOpKind::And, results)
            }
            ExprKind::BoolOp { op, values } => self.bool_op(*op, values),
            ExprKind::IfExp { test, body, orelse } => self.if_exp(test, body, orelse),
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                let callee = self.eval(func)?;
                if callee == HostValue::Intrinsic(Intrinsic::Always) {
                    return self.always_call(args);
                }
                let args = self.eval_args(args)?;
                let keywords = self.eval_keywords(keywords)?;
                self.call_value(callee, args, keywords)
            }
            ExprKind::Await(inner) => self.await_expr(inner),
            ExprKind::Tuple(items) => Ok(HostValue::tuple(self.eval_args(items)?)),
            ExprKind::List(items) => {
                let items = self.eval_args(items)?;
                Ok(self.cx.heap.new_list(items))
            }
            ExprKind::Dict(items) => {
                let mut map = LinkedHashMap::new();
                for (k, v) in items {
                    let key = self.eval(k)?;
                    let value = self.eval(v)?;
                    map.insert(dict_key(&key)?, value);
                }
                Ok(self.cx.heap.new_dict(map))
            }
            ExprKind::ListComp { elt, generators } => {
                let mut out = Vec::new();
                self.comprehend(generators, &mut |l: &mut Self| -> CompileResult<()> {
                    let v = l.eval(elt)?;
                    out.push(v);
                    Ok(())
                })?;
                Ok(self.cx.heap.new_list(out))
            }
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => {
                let mut out = LinkedHashMap::new();
                self.comprehend(generators, &mut |l: &mut Self| -> CompileResult<()> {
                    let k = l.eval(key)?;
                    let v = l.eval(value)?;
                    out.insert(dict_key(&k)?, v);
                    Ok(())
                })?;
                Ok(self.cx.heap.new_dict(out))
            }
            ExprKind::Lambda { params, body } => self.lambda(params, body, expr),
            ExprKind::Starred(_) => Err(CompileError::type_error(
                "starred expressions are only valid in calls and literals",
            )),
            ExprKind::FString { parts, hdl } => self.fstring(parts, hdl.as_deref()),
        }
    }

    fn eval_opt(&mut self, expr: Option<&Expr>) -> CompileResult<Option<HostValue>> {
        expr.map(|e| self.eval(e)).transpose()
    }

    /// Evaluates positional arguments, expanding `*iterable`.
    pub(super) fn eval_args(&mut self, args: &[Expr]) -> CompileResult<Vec<HostValue>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            if let ExprKind::Starred(inner) = &arg.kind {
                let value = self.eval(inner)?;
                out.extend(self.iterate(&value)?);
            } else {
                out.push(self.eval(arg)?);
            }
        }
        Ok(out)
    }

    pub(super) fn eval_keywords(&mut self, keywords: &[(String, Expr)]) -> CompileResult<Vec<(String, HostValue)>> {
        keywords
            .iter()
            .map(|(k, e)| Ok((k.clone(), self.eval(e)?)))
            .collect()
    }

    fn lookup(&mut self, name: &str) -> CompileResult<HostValue> {
        let frame = self.frame()?;
        let mut cur = Some(frame.scope);
        while let Some(id) = cur {
            let scope = &self.cx.heap.scopes[id];
            if let Some(value) = scope.vars.get(name) {
                if *value == HostValue::Unbound {
                    if frame.ambiguous.contains(name) {
                        return Err(CompileError::scope(format!(
                            "`{name}` is bound differently by the branches of a runtime condition"
                        )));
                    }
                    return Err(CompileError::scope(format!(
                        "local name `{name}` is used before it is bound"
                    )));
                }
                return Ok(value.clone());
            }
            cur = scope.parent;
        }
        self.cx
            .registry
            .lookup(name)
            .cloned()
            .ok_or_else(|| CompileError::scope(format!("name `{name}` is not defined")))
    }

    pub(super) fn attr(&mut self, value: HostValue, name: &str) -> CompileResult<HostValue> {
        let missing = |what: &str| {
            CompileError::scope(format!("{what} has no attribute `{name}`"))
        };
        match &value {
            HostValue::Object(id) => self.object_attr(*id, name),
            HostValue::Instance(iid) => {
                let instance = &self.cx.heap.instances[*iid];
                if let Some(v) = instance.attrs.get(name) {
                    return Ok(v.clone());
                }
                let class = instance.class;
                match self.cx.heap.class_attr(class, name).map(|(_, v)| v.clone()) {
                    Some(HostValue::Function(f)) => Ok(HostValue::BoundMethod {
                        function: f,
                        receiver: Box::new(value.clone()),
                    }),
                    Some(HostValue::Property { getter, .. }) => {
                        self.call_function(getter, Some(value.clone()), Vec::new(), Vec::new())
                    }
                    Some(v) => Ok(v),
                    None => Err(missing(&format!(
                        "`{}` object",
                        self.cx.heap.classes[class].name
                    ))),
                }
            }
            HostValue::Class(cid) => self
                .cx
                .heap
                .class_attr(*cid, name)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| missing(&format!("class `{}`", self.cx.heap.classes[*cid].name))),
            HostValue::Super { class, receiver } => {
                let base = self.cx.heap.classes[*class].base.ok_or_else(|| {
                    CompileError::scope("`super()` used in a class without a base class")
                })?;
                let receiver = (**receiver).clone();
                match self.cx.heap.class_attr(base, name).map(|(_, v)| v.clone()) {
                    Some(HostValue::Function(f)) => Ok(HostValue::BoundMethod {
                        function: f,
                        receiver: Box::new(receiver),
                    }),
                    Some(HostValue::Property { getter, .. }) => {
                        self.call_function(getter, Some(receiver), Vec::new(), Vec::new())
                    }
                    Some(v) => Ok(v),
                    None => Err(missing("`super()`")),
                }
            }
            HostValue::EnumType(eid) => {
                let index = self
                    .cx
                    .objects
                    .enums
                    .member_index(*eid, name)
                    .ok_or_else(|| missing(&format!("enum `{}`", self.cx.objects.enums.get(*eid).name)))?;
                Ok(HostValue::Const(ConstValue::Enum { ty: *eid, index }))
            }
            HostValue::List(_) if name == "append" => Ok(bound(Intrinsic::ListAppend, value.clone())),
            HostValue::Dict(_) if name == "items" => Ok(bound(Intrinsic::DictItems, value.clone())),
            HostValue::Dict(_) if name == "keys" => Ok(bound(Intrinsic::DictKeys, value.clone())),
            HostValue::Dict(_) if name == "values" => Ok(bound(Intrinsic::DictValues, value.clone())),
            HostValue::Property { .. } if name == "setter" => {
                Ok(bound(Intrinsic::PropertySetter, value.clone()))
            }
            other => Err(missing(&format!("a {}", other.type_name()))),
        }
    }

    fn object_attr(&mut self, id: corvid_types::ObjectId, name: &str) -> CompileResult<HostValue> {
        let facet = match name {
            "unsigned" => Some(VecFamily::Unsigned),
            "signed" => Some(VecFamily::Signed),
            "bitvector" => Some(VecFamily::BitVector),
            _ => None,
        };
        if let Some(family) = facet {
            return Ok(HostValue::Object(self.cx.objects.facet(id, family)?));
        }
        match name {
            "lsb" => Ok(bound(Intrinsic::Lsb, HostValue::Object(id))),
            "msb" => Ok(bound(Intrinsic::Msb, HostValue::Object(id))),
            "next" | "push" | "value" => Ok(HostValue::Object(id)),
            "width" => {
                let ty = self.cx.objects.ty(id);
                ty.width()
                    .map(|w| HostValue::Int(w as i64))
                    .ok_or_else(|| CompileError::type_error(format!("{ty} has no width")))
            }
            _ => Err(CompileError::type_error(format!(
                "{} has no attribute `{name}`",
                self.cx.objects.describe(id)
            ))),
        }
    }

    fn slice(
        &mut self,
        base: HostValue,
        lower: Option<HostValue>,
        upper: Option<HostValue>,
        step: Option<HostValue>,
    ) -> CompileResult<HostValue> {
        match base {
            HostValue::Object(id) => {
                let (Some(high), Some(low), None) = (
                    lower.as_ref().and_then(HostValue::as_int),
                    upper.as_ref().and_then(HostValue::as_int),
                    step,
                ) else {
                    return Err(CompileError::type_error(
                        "a vector slice needs constant bounds `[high:low]`",
                    ));
                };
                if high < 0 || low < 0 {
                    return Err(CompileError::type_error(format!(
                        "slice [{high}:{low}] has negative bounds"
                    )));
                }
                Ok(HostValue::Object(self.cx.objects.slice(id, high as u32, low as u32)?))
            }
            HostValue::Tuple(_) | HostValue::List(_) | HostValue::Str(_) => {
                let items = self.iterate(&base)?;
                let picked = slice_indices(items.len(), lower, upper, step)?
                    .into_iter()
                    .map(|i| items[i].clone())
                    .collect::<Vec<_>>();
                Ok(match base {
                    HostValue::Tuple(_) => HostValue::tuple(picked),
                    HostValue::Str(_) => HostValue::str(
                        &picked
                            .iter()
                            .filter_map(|v| match v {
                                HostValue::Str(s) => Some(s.to_string()),
                                _ => None,
                            })
                            .collect::<String>(),
                    ),
                    _ => self.cx.heap.new_list(picked),
                })
            }
            other => Err(CompileError::type_error(format!(
                "a {} cannot be sliced",
                other.type_name()
            ))),
        }
    }

    fn index(&mut self, base: HostValue, index: HostValue) -> CompileResult<HostValue> {
        match base {
            HostValue::Type(TypeExpr::Family(family)) => self.apply_family(family, &index),
            HostValue::Type(TypeExpr::Qualified {
                qualifier,
                ty: None,
            }) => Ok(HostValue::Type(TypeExpr::Qualified {
                qualifier,
                ty: Some(self.primitive_of(&index)?),
            })),
            HostValue::Object(id) => self.object_index(id, index),
            HostValue::Dict(did) => {
                let key = dict_key(&index)?;
                self.cx.heap.dicts[did]
                    .get(&key)
                    .cloned()
                    .ok_or_else(|| CompileError::scope("key not found in dict"))
            }
            HostValue::Tuple(_) | HostValue::List(_) | HostValue::Str(_) | HostValue::Range { .. } => {
                let items = self.iterate(&base)?;
                let i = normalize_index(&index, items.len())?;
                Ok(items[i].clone())
            }
            other => Err(CompileError::type_error(format!(
                "a {} is not subscriptable",
                other.type_name()
            ))),
        }
    }

    fn object_index(&mut self, id: corvid_types::ObjectId, index: HostValue) -> CompileResult<HostValue> {
        let index = match index {
            HostValue::Const(c) if c.as_int().is_some() => HostValue::Int(c.as_int().unwrap_or(0)),
            other => other,
        };
        if let Some(i) = index.as_int() {
            let count = self.cx.objects.ty(id).element_count().unwrap_or(0) as usize;
            let i = normalize_index(&HostValue::Int(i), count)?;
            return Ok(HostValue::Object(self.cx.objects.offset(id, i as u32)?));
        }
        let operand = self.operand(&index)?;
        let Operand::Object(idx) = operand else {
            return Err(CompileError::type_error("element index must be an integer"));
        };
        let idx = if self.cx.objects.kind(idx) == corvid_types::QualifierKind::Temporary
            && !self.cx.objects.is_view(idx)
        {
            idx
        } else {
            let ty = self.cx.objects.ty(idx).clone();
            let temp = self.temporary(ty);
            self.emit(NodeKind::Assign {
                target: temp,
                source: Operand::Object(idx),
                mode: corvid_types::AssignMode::Temp,
            })?;
            temp
        };
        Ok(HostValue::Object(self.cx.objects.dynamic_offset(id, idx)?))
    }

    fn apply_family(&mut self, family: TypeFamily, index: &HostValue) -> CompileResult<HostValue> {
        let width = || {
            index
                .as_int()
                .filter(|w| *w > 0 && *w <= u32::MAX as i64)
                .map(|w| w as u32)
                .ok_or_else(|| CompileError::type_error("vector width must be a positive int"))
        };
        let ty = match family {
            TypeFamily::BitVector => Primitive::bit_vector(width()?),
            TypeFamily::Unsigned => Primitive::unsigned(width()?),
            TypeFamily::Signed => Primitive::signed(width()?),
            TypeFamily::Array => {
                let HostValue::Tuple(items) = index else {
                    return Err(CompileError::type_error("Array takes `[element_type, count]`"));
                };
                let [elem, count] = &items[..] else {
                    return Err(CompileError::type_error("Array takes `[element_type, count]`"));
                };
                let elem = self.primitive_of(elem)?;
                let count = count
                    .as_int()
                    .filter(|c| *c > 0)
                    .ok_or_else(|| CompileError::type_error("array length must be a positive int"))?;
                Primitive::Array {
                    elem: Box::new(elem),
                    count: count as u32,
                }
            }
            TypeFamily::Signal | TypeFamily::Variable | TypeFamily::Temporary => {
                let qualifier = match family {
                    TypeFamily::Signal => QualifierCtor::Signal,
                    TypeFamily::Variable => QualifierCtor::Variable,
                    _ => QualifierCtor::Temporary,
                };
                return Ok(HostValue::Type(TypeExpr::Qualified {
                    qualifier,
                    ty: Some(self.primitive_of(index)?),
                }));
            }
        };
        Ok(HostValue::Type(TypeExpr::Primitive(ty)))
    }

    pub(super) fn primitive_of(&self, value: &HostValue) -> CompileResult<Primitive> {
        match value {
            HostValue::Type(TypeExpr::Primitive(p)) => Ok(p.clone()),
            HostValue::EnumType(id) => Ok(Primitive::Enum(*id)),
            HostValue::Intrinsic(Intrinsic::Bool) => Ok(Primitive::Bool),
            HostValue::Intrinsic(Intrinsic::Int) => Ok(Primitive::integer()),
            other => Err(CompileError::type_error(format!(
                "a {} is not a hardware type",
                other.type_name()
            ))),
        }
    }

    pub(super) fn binop(&mut self, op: HostBinOp, lhs: HostValue, rhs: HostValue) -> CompileResult<HostValue> {
        if matches!(lhs, HostValue::Instance(_)) || matches!(rhs, HostValue::Instance(_)) {
            if let Some(result) = self.binop_dunder(op, &lhs, &rhs)? {
                return Ok(result);
            }
        }
        if is_host(&lhs) && is_host(&rhs) {
            return self.host_binop(op, &lhs, &rhs);
        }
        let hw = match op {
            HostBinOp::Add => BinOp::Add,
            HostBinOp::Sub => BinOp::Sub,
            HostBinOp::Mult => BinOp::Mul,
            HostBinOp::FloorDiv => BinOp::Div,
            HostBinOp::Mod => BinOp::Mod,
            HostBinOp::BitAnd => BinOp::And,
            HostBinOp::BitOr => BinOp::Or,
            HostBinOp::BitXor => BinOp::Xor,
            HostBinOp::LShift => BinOp::Shl,
            HostBinOp::RShift => BinOp::Shr,
            HostBinOp::MatMult => BinOp::Concat,
            HostBinOp::Pow => {
                return Err(CompileError::type_error("`**` is not defined for hardware values"))
            }
        };
        self.hardware_binop(hw, &lhs, &rhs)
    }

    pub(super) fn hardware_binop(&mut self, op: BinOp, lhs: &HostValue, rhs: &HostValue) -> CompileResult<HostValue> {
        let a = self.operand(lhs)?;
        let b = self.operand(rhs)?;
        if let (Operand::Const(x), Operand::Const(y)) = (&a, &b) {
            if let Some(folded) = fold_binop(op, x, y) {
                return Ok(HostValue::from_operand(Operand::Const(folded)));
            }
        }
        let ty = binop_type(op, &self.cx.objects.arg_type(&a), &self.cx.objects.arg_type(&b))?;
        let result = self.temporary(ty);
        self.emit(NodeKind::BinOp {
            op,
            lhs: a,
            rhs: b,
            result,
        })?;
        Ok(HostValue::Object(result))
    }

    fn host_binop(&mut self, op: HostBinOp, lhs: &HostValue, rhs: &HostValue) -> CompileResult<HostValue> {
        let unsupported = || {
            CompileError::type_error(format!(
                "unsupported operand types for {op:?}: {} and {}",
                lhs.type_name(),
                rhs.type_name()
            ))
        };
        if let (HostValue::Bool(a), HostValue::Bool(b)) = (lhs, rhs) {
            match op {
                HostBinOp::BitAnd => return Ok(HostValue::Bool(*a && *b)),
                HostBinOp::BitOr => return Ok(HostValue::Bool(*a || *b)),
                HostBinOp::BitXor => return Ok(HostValue::Bool(a != b)),
                _ => {}
            }
        }
        if let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) {
            return int_binop(op, a, b).map(HostValue::Int);
        }
        match (op, lhs, rhs) {
            (HostBinOp::Add, HostValue::Str(a), HostValue::Str(b)) => {
                Ok(HostValue::str(&format!("{a}{b}")))
            }
            (HostBinOp::Mult, HostValue::Str(s), HostValue::Int(n))
            | (HostBinOp::Mult, HostValue::Int(n), HostValue::Str(s)) => {
                Ok(HostValue::str(&s.repeat((*n).max(0) as usize)))
            }
            (HostBinOp::Add, HostValue::Tuple(a), HostValue::Tuple(b)) => {
                Ok(HostValue::tuple(a.iter().chain(b.iter()).cloned().collect()))
            }
            (HostBinOp::Add, HostValue::List(a), HostValue::List(b)) => {
                let items = self.cx.heap.lists[*a]
                    .iter()
                    .chain(self.cx.heap.lists[*b].iter())
                    .cloned()
                    .collect();
                Ok(self.cx.heap.new_list(items))
            }
            (HostBinOp::Mult, HostValue::Tuple(_) | HostValue::List(_), HostValue::Int(n)) => {
                let items = self.iterate(lhs)?;
                let repeated: Vec<_> = (0..(*n).max(0)).flat_map(|_| items.iter().cloned()).collect();
                Ok(match lhs {
                    HostValue::Tuple(_) => HostValue::tuple(repeated),
                    _ => self.cx.heap.new_list(repeated),
                })
            }
            _ => Err(unsupported()),
        }
    }

    pub(super) fn unary(&mut self, op: HostUnaryOp, value: HostValue) -> CompileResult<HostValue> {
        if let HostValue::Instance(_) = value {
            let name = match op {
                HostUnaryOp::Invert => "__invert__",
                HostUnaryOp::USub => "__neg__",
                HostUnaryOp::UAdd => "__pos__",
                HostUnaryOp::Not => "__bool__",
            };
            if let Some(result) = self.call_dunder(&value, name, Vec::new())? {
                return match op {
                    HostUnaryOp::Not => self.unary(HostUnaryOp::Not, result),
                    _ => Ok(result),
                };
            }
        }
        if is_host(&value) {
            return match (op, &value) {
                (HostUnaryOp::Not, v) => Ok(HostValue::Bool(!self.host_truth(v))),
                (HostUnaryOp::Invert, v) if v.as_int().is_some() => {
                    Ok(HostValue::Int(!v.as_int().unwrap_or(0)))
                }
                (HostUnaryOp::USub, v) if v.as_int().is_some() => v
                    .as_int()
                    .and_then(i64::checked_neg)
                    .map(HostValue::Int)
                    .ok_or_else(|| CompileError::type_error("integer overflow")),
                (HostUnaryOp::UAdd, v) if v.as_int().is_some() => {
                    Ok(HostValue::Int(v.as_int().unwrap_or(0)))
                }
                _ => Err(CompileError::type_error(format!(
                    "bad operand type for unary {op:?}: {}",
                    value.type_name()
                ))),
            };
        }
        let hw = match op {
            HostUnaryOp::Not => UnaryOp::Not,
            HostUnaryOp::Invert => UnaryOp::Inv,
            HostUnaryOp::USub => UnaryOp::Neg,
            HostUnaryOp::UAdd => return Ok(value),
        };
        self.hardware_unary(hw, &value)
    }

    pub(super) fn hardware_unary(&mut self, op: UnaryOp, value: &HostValue) -> CompileResult<HostValue> {
        let arg = self.operand(value)?;
        if let Operand::Const(c) = &arg {
            if let Some(folded) = fold_unary(op, c) {
                return Ok(HostValue::from_operand(Operand::Const(folded)));
            }
        }
        let ty = unary_type(op, &self.cx.objects.arg_type(&arg))?;
        let result = self.temporary(ty);
        self.emit(NodeKind::UnaryOp { op, arg, result })?;
        Ok(HostValue::Object(result))
    }

    pub(super) fn compare_values(&mut self, op: HostCmpOp, lhs: &HostValue, rhs: &HostValue) -> CompileResult<HostValue> {
        match op {
            HostCmpOp::Is => return Ok(HostValue::Bool(lhs == rhs)),
            HostCmpOp::IsNot => return Ok(HostValue::Bool(lhs != rhs)),
            HostCmpOp::In | HostCmpOp::NotIn => {
                let items: Vec<HostValue> = match rhs {
                    HostValue::Dict(did) => self.cx.heap.dicts[*did].keys().map(DictKey::to_value).collect(),
                    HostValue::Str(s) => {
                        if let HostValue::Str(needle) = lhs {
                            let found = s.contains(&**needle);
                            return Ok(HostValue::Bool(found == (op == HostCmpOp::In)));
                        }
                        return Err(CompileError::type_error("`in <str>` requires a str operand"));
                    }
                    other => self.iterate(other)?,
                };
                let mut hits = Vec::with_capacity(items.len());
                for item in &items {
                    hits.push(self.compare_values(HostCmpOp::Eq, lhs, item)?);
                }
                let any = self.combine(BoolOpKind::Or, hits)?;
                return if op == HostCmpOp::In {
                    Ok(any)
                } else {
                    self.unary(HostUnaryOp::Not, any)
                };
            }
            _ => {}
        }
        if matches!(lhs, HostValue::Instance(_)) {
            let name = match op {
                HostCmpOp::Eq => "__eq__",
                HostCmpOp::NotEq => "__ne__",
                HostCmpOp::Lt => "__lt__",
                HostCmpOp::LtE => "__le__",
                HostCmpOp::Gt => "__gt__",
                _ => "__ge__",
            };
            if let Some(result) = self.call_dunder(lhs, name, vec![rhs.clone()])? {
                return Ok(result);
            }
        }
        let cop = match op {
            HostCmpOp::Eq => CompareOp::Eq,
            HostCmpOp::NotEq => CompareOp::Ne,
            HostCmpOp::Lt => CompareOp::Lt,
            HostCmpOp::LtE => CompareOp::Le,
            HostCmpOp::Gt => CompareOp::Gt,
            _ => CompareOp::Ge,
        };
        if is_host(lhs) && is_host(rhs) {
            return host_compare(cop, lhs, rhs).map(HostValue::Bool);
        }
        let a = self.operand(lhs)?;
        let b = self.operand(rhs)?;
        if let (Operand::Const(x), Operand::Const(y)) = (&a, &b) {
            if let Some(result) = fold_compare(cop, x, y) {
                return Ok(HostValue::Bool(result));
            }
        }
        check_compare(cop, &self.cx.objects.arg_type(&a), &self.cx.objects.arg_type(&b))?;
        let result = self.temporary(Primitive::Bool);
        self.emit(NodeKind::Compare {
            op: cop,
            lhs: a,
            rhs: b,
            result,
        })?;
        Ok(HostValue::Object(result))
    }

    fn bool_op(&mut self, kind: BoolOpKind, values: &[Expr]) -> CompileResult<HostValue> {
        let mut runtime = Vec::new();
        let mut last = HostValue::Bool(kind == BoolOpKind::And);
        for e in values {
            let v = self.eval(e)?;
            if v.is_runtime() {
                runtime.push(v);
                continue;
            }
            let truthy = match self.condition(&v)? {
                Cond::Const(b) => b,
                Cond::Runtime(_) => true,
            };
            let decisive = match kind {
                BoolOpKind::And => !truthy,
                BoolOpKind::Or => truthy,
            };
            if decisive {
                return Ok(if runtime.is_empty() {
                    v
                } else {
                    HostValue::Bool(truthy)
                });
            }
            last = v;
        }
        if runtime.is_empty() {
            return Ok(last);
        }
        self.combine(kind, runtime)
    }

    /// Combines boolean values into `All`/`Any`, folding constant parts.
    pub(super) fn combine(&mut self, kind: BoolOpKind, values: Vec<HostValue>) -> CompileResult<HostValue> {
        let mut args = Vec::new();
        for v in values {
            match self.condition(&v)? {
                Cond::Const(b) => {
                    if (kind == BoolOpKind::And) != b {
                        return Ok(HostValue::Bool(b));
                    }
                }
                Cond::Runtime(op) => args.push(op),
            }
        }
        match args.len() {
            0 => Ok(HostValue::Bool(kind == BoolOpKind::And)),
            1 => self.to_boolean(args.remove(0)),
            _ => {
                let result = self.temporary(Primitive::Bool);
                let node = match kind {
                    BoolOpKind::And => NodeKind::All { args, result },
                    BoolOpKind::Or => NodeKind::Any { args, result },
                };
                self.emit(node)?;
                Ok(HostValue::Object(result))
            }
        }
    }

    /// Casts a runtime operand to `Bool`.
    pub(super) fn to_boolean(&mut self, arg: Operand) -> CompileResult<HostValue> {
        match self.cx.objects.operand_type(&arg) {
            Some(Primitive::Bool) => Ok(HostValue::from_operand(arg)),
            Some(ty) => {
                check_boolean_context(&ty)?;
                let result = self.temporary(Primitive::Bool);
                self.emit(NodeKind::Boolean { arg, result })?;
                Ok(HostValue::Object(result))
            }
            None => match arg.as_const().and_then(ConstValue::truthiness) {
                Some(b) => Ok(HostValue::Bool(b)),
                None => Err(CompileError::type_error("value has no truth value")),
            },
        }
    }

    /// Classifies a value used as a condition.
    pub(super) fn condition(&mut self, value: &HostValue) -> CompileResult<Cond> {
        match value {
            HostValue::Object(_) | HostValue::Merged(_) => {
                let op = self.operand(value)?;
                if let Some(ty) = self.cx.objects.operand_type(&op) {
                    check_boolean_context(&ty)?;
                }
                Ok(Cond::Runtime(op))
            }
            HostValue::Event { kind, signal } => Ok(Cond::Runtime(Operand::Event {
                kind: *kind,
                signal: *signal,
            })),
            HostValue::Const(c) => c.truthiness().map(Cond::Const).ok_or_else(|| {
                CompileError::type_error(format!("constant {c} has no truth value"))
            }),
            HostValue::Instance(_) => match self.call_dunder(value, "__bool__", Vec::new())? {
                Some(result) => self.condition(&result),
                None => Ok(Cond::Const(true)),
            },
            other => Ok(Cond::Const(self.host_truth(other))),
        }
    }

    fn host_truth(&self, value: &HostValue) -> bool {
        match value {
            HostValue::None | HostValue::Unbound => false,
            HostValue::Bool(b) => *b,
            HostValue::Int(i) => *i != 0,
            HostValue::Str(s) => !s.is_empty(),
            HostValue::Tuple(items) => !items.is_empty(),
            HostValue::List(id) => !self.cx.heap.lists[*id].is_empty(),
            HostValue::Dict(id) => !self.cx.heap.dicts[*id].is_empty(),
            HostValue::Range { start, stop, step } => range_len(*start, *stop, *step) > 0,
            HostValue::Const(c) => c.truthiness().unwrap_or(true),
            _ => true,
        }
    }

    fn if_exp(&mut self, test: &Expr, body: &Expr, orelse: &Expr) -> CompileResult<HostValue> {
        let test = self.eval(test)?;
        let op = match self.condition(&test)? {
            Cond::Const(true) => return self.eval(body),
            Cond::Const(false) => return self.eval(orelse),
            Cond::Runtime(op) => op,
        };
        let (then_value, then_nodes) = self.capture(|l| {
            let v = l.eval(body)?;
            l.operand(&v)
        })?;
        let (else_value, else_nodes) = self.capture(|l| {
            let v = l.eval(orelse)?;
            l.operand(&v)
        })?;
        let hooks = [self.cx.tree.new_hook(), self.cx.tree.new_hook()];
        let body = self.block(then_nodes);
        let orelse = self.block(else_nodes);
        self.emit(NodeKind::IfExpr {
            test: op,
            body,
            orelse,
            hooks,
        })?;
        self.merge_values(vec![
            ValueBranch {
                value: then_value,
                hook: hooks[0],
            },
            ValueBranch {
                value: else_value,
                hook: hooks[1],
            },
        ])
    }

    fn comprehend(
        &mut self,
        generators: &[Comprehension],
        out: &mut dyn FnMut(&mut Self) -> CompileResult<()>,
    ) -> CompileResult<()> {
        let outer = self.scope()?;
        let inner = self.cx.heap.new_scope(Some(outer));
        self.frame_mut()?.scope = inner;
        let result = self.comprehend_level(generators, out);
        self.frame_mut()?.scope = outer;
        result
    }

    fn comprehend_level(
        &mut self,
        generators: &[Comprehension],
        out: &mut dyn FnMut(&mut Self) -> CompileResult<()>,
    ) -> CompileResult<()> {
        let Some((first, rest)) = generators.split_first() else {
            return out(self);
        };
        let iterable = self.eval(&first.iter)?;
        'items: for item in self.iterate(&iterable)? {
            self.bind_target(&first.target, item)?;
            for filter in &first.ifs {
                let v = self.eval(filter)?;
                match self.condition(&v)? {
                    Cond::Const(true) => {}
                    Cond::Const(false) => continue 'items,
                    Cond::Runtime(_) => {
                        return Err(CompileError::type_error(
                            "comprehension filters must be compile-time constants",
                        ))
                    }
                }
            }
            self.comprehend_level(rest, out)?;
        }
        Ok(())
    }

    /// Binds a comprehension target in the current scope.
    fn bind_target(&mut self, target: &Expr, value: HostValue) -> CompileResult<()> {
        match &target.kind {
            ExprKind::Name(name) => {
                let scope = self.scope()?;
                self.cx.heap.bind(scope, name.clone(), value);
                Ok(())
            }
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                let values = self.iterate(&value)?;
                if values.len() != items.len() {
                    return Err(CompileError::type_error(format!(
                        "cannot unpack {} values into {} targets",
                        values.len(),
                        items.len()
                    )));
                }
                items
                    .iter()
                    .zip(values)
                    .try_for_each(|(t, v)| self.bind_target(t, v))
            }
            _ => Err(CompileError::scope("invalid comprehension target")),
        }
    }

    fn lambda(&mut self, params: &[Param], body: &Expr, expr: &Expr) -> CompileResult<HostValue> {
        let def = Rc::new(FunctionDef {
            name: "<lambda>".to_string(),
            params: params.to_vec(),
            body: vec![Stmt {
                kind: StmtKind::Return(Some(body.clone())),
                loc: expr.loc,
            }],
            is_async: false,
            decorators: Vec::new(),
            loc: expr.loc,
        });
        let closure = self.scope()?;
        self.define_function(&def, closure, None)
    }

    fn fstring(&mut self, parts: &[FStringPart], hdl: Option<&str>) -> CompileResult<HostValue> {
        let Some(hdl) = hdl else {
            let mut text = String::new();
            for part in parts {
                match part {
                    FStringPart::Text(t) => text.push_str(t),
                    FStringPart::Expr { expr, .. } => {
                        let v = self.eval(expr)?;
                        text.push_str(&self.format_host(&v)?);
                    }
                }
            }
            return Ok(HostValue::str(&text));
        };
        if hdl != "vhdl" {
            return Err(CompileError::intrinsic(format!(
                "no inline code option for `{hdl}`"
            )));
        }
        let mut out = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                FStringPart::Text(t) => out.push(InlinePart::Text(t.clone())),
                FStringPart::Expr { expr, target } => {
                    let v = self.eval(expr)?;
                    if v.is_runtime() {
                        let Operand::Object(id) = self.operand(&v)? else {
                            return Err(CompileError::intrinsic(
                                "events cannot be interpolated into inline code",
                            ));
                        };
                        out.push(if *target {
                            InlinePart::Target(id)
                        } else {
                            InlinePart::Read(id)
                        });
                    } else {
                        out.push(InlinePart::Text(self.format_host(&v)?));
                    }
                }
            }
        }
        self.emit(NodeKind::InlineCode {
            hdl: hdl.to_string(),
            parts: out,
        })?;
        Ok(HostValue::None)
    }

    pub(super) fn format_host(&self, value: &HostValue) -> CompileResult<String> {
        Ok(match value {
            HostValue::None => "None".to_string(),
            HostValue::Bool(true) => "True".to_string(),
            HostValue::Bool(false) => "False".to_string(),
            HostValue::Int(i) => i.to_string(),
            HostValue::Str(s) => s.to_string(),
            HostValue::Const(c) => c.to_string(),
            HostValue::Tuple(items) => {
                let inner = items
                    .iter()
                    .map(|v| self.format_host(v))
                    .collect::<CompileResult<Vec<_>>>()?;
                format!("({})", inner.join(", "))
            }
            HostValue::Object(id) => self.cx.objects.describe(*id),
            other => {
                return Err(CompileError::type_error(format!(
                    "cannot format a {}",
                    other.type_name()
                )))
            }
        })
    }

    /// Enumerates a compile-time iterable.
    pub(super) fn iterate(&mut self, value: &HostValue) -> CompileResult<Vec<HostValue>> {
        Ok(match value {
            HostValue::Tuple(items) => items.to_vec(),
            HostValue::List(id) => self.cx.heap.lists[*id].clone(),
            HostValue::Dict(id) => self.cx.heap.dicts[*id].keys().map(DictKey::to_value).collect(),
            HostValue::Str(s) => s.chars().map(|c| HostValue::str(&c.to_string())).collect(),
            HostValue::Range { start, stop, step } => {
                let len = range_len(*start, *stop, *step);
                (0..len).map(|i| HostValue::Int(start + i * step)).collect()
            }
            HostValue::Object(id) => {
                let count = self.cx.objects.ty(*id).element_count().ok_or_else(|| {
                    CompileError::type_error(format!(
                        "{} is not iterable",
                        self.cx.objects.describe(*id)
                    ))
                })?;
                (0..count)
                    .map(|i| self.cx.objects.offset(*id, i).map(HostValue::Object))
                    .collect::<CompileResult<Vec<_>>>()?
            }
            other => {
                return Err(CompileError::type_error(format!(
                    "a {} is not iterable at compile time",
                    other.type_name()
                )))
            }
        })
    }
}

fn bound(intrinsic: Intrinsic, receiver: HostValue) -> HostValue {
    HostValue::BoundIntrinsic {
        intrinsic,
        receiver: Box::new(receiver),
    }
}

pub(super) fn dict_key(value: &HostValue) -> CompileResult<DictKey> {
    DictKey::from_value(value).ok_or_else(|| {
        CompileError::type_error(format!(
            "a {} cannot be used as a dict key",
            value.type_name()
        ))
    })
}

/// Values computed by the host rather than by hardware.
fn is_host(value: &HostValue) -> bool {
    !matches!(
        value,
        HostValue::Const(_) | HostValue::Object(_) | HostValue::Event { .. } | HostValue::Merged(_)
    )
}

pub(super) fn range_len(start: i64, stop: i64, step: i64) -> i64 {
    if step > 0 && stop > start {
        (stop - start + step - 1) / step
    } else if step < 0 && stop < start {
        (start - stop - step - 1) / -step
    } else {
        0
    }
}

fn int_binop(op: HostBinOp, a: i64, b: i64) -> CompileResult<i64> {
    let overflow = || CompileError::type_error("integer overflow in constant expression");
    let zero = || CompileError::type_error("division by zero in constant expression");
    match op {
        HostBinOp::Add => a.checked_add(b).ok_or_else(overflow),
        HostBinOp::Sub => a.checked_sub(b).ok_or_else(overflow),
        HostBinOp::Mult => a.checked_mul(b).ok_or_else(overflow),
        HostBinOp::FloorDiv => {
            if b == 0 {
                return Err(zero());
            }
            let q = a / b;
            Ok(if a % b != 0 && ((a < 0) != (b < 0)) { q - 1 } else { q })
        }
        HostBinOp::Mod => {
            if b == 0 {
                return Err(zero());
            }
            let r = a % b;
            Ok(if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r })
        }
        HostBinOp::Pow => {
            let exp = u32::try_from(b)
                .map_err(|_| CompileError::type_error("negative exponent in constant expression"))?;
            a.checked_pow(exp).ok_or_else(overflow)
        }
        HostBinOp::BitAnd => Ok(a & b),
        HostBinOp::BitOr => Ok(a | b),
        HostBinOp::BitXor => Ok(a ^ b),
        HostBinOp::LShift => u32::try_from(b)
            .ok()
            .and_then(|s| a.checked_shl(s))
            .ok_or_else(overflow),
        HostBinOp::RShift => u32::try_from(b)
            .ok()
            .map(|s| a >> s.min(63))
            .ok_or_else(|| CompileError::type_error("negative shift count")),
        HostBinOp::MatMult => Err(CompileError::type_error("`@` is not defined for ints")),
    }
}

fn host_compare(op: CompareOp, lhs: &HostValue, rhs: &HostValue) -> CompileResult<bool> {
    if let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) {
        return Ok(op.apply(a, b));
    }
    if let (HostValue::Str(a), HostValue::Str(b)) = (lhs, rhs) {
        return Ok(op.apply(a, b));
    }
    match op {
        CompareOp::Eq => Ok(lhs == rhs),
        CompareOp::Ne => Ok(lhs != rhs),
        _ => Err(CompileError::type_error(format!(
            "cannot order a {} and a {}",
            lhs.type_name(),
            rhs.type_name()
        ))),
    }
}

/// Python slice semantics over a sequence of `len` items.
fn slice_indices(
    len: usize,
    lower: Option<HostValue>,
    upper: Option<HostValue>,
    step: Option<HostValue>,
) -> CompileResult<Vec<usize>> {
    let int = |v: Option<HostValue>| -> CompileResult<Option<i64>> {
        match v {
            None | Some(HostValue::None) => Ok(None),
            Some(v) => v
                .as_int()
                .map(Some)
                .ok_or_else(|| CompileError::type_error("slice bounds must be ints")),
        }
    };
    let len = len as i64;
    let step = int(step)?.unwrap_or(1);
    if step == 0 {
        return Err(CompileError::type_error("slice step cannot be zero"));
    }
    let clamp = |v: i64, lo: i64, hi: i64| {
        let v = if v < 0 { v + len } else { v };
        v.clamp(lo, hi)
    };
    let (start, stop) = if step > 0 {
        (
            int(lower)?.map_or(0, |v| clamp(v, 0, len)),
            int(upper)?.map_or(len, |v| clamp(v, 0, len)),
        )
    } else {
        (
            int(lower)?.map_or(len - 1, |v| clamp(v, -1, len - 1)),
            int(upper)?.map_or(-1, |v| clamp(v, -1, len - 1)),
        )
    };
    let mut out = Vec::new();
    let mut i = start;
    while (step > 0 && i < stop) || (step < 0 && i > stop) {
        out.push(i as usize);
        i += step;
    }
    Ok(out)
}
