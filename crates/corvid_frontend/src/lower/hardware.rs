//! Writes to qualified objects, merged values and type constructors.

use super::Lowerer;
use crate::prepared::{MergedId, NodeId, NodeKind, ValueBranch};
use crate::value::{HostValue, QualifierCtor, TypeExpr};
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_types::{
    ArgType, AssignMode, AssignableType, ConstValue, ContextKind, ObjectDecl, ObjectId, Operand,
    Primitive, QualifierKind,
};

impl<'a> Lowerer<'a> {
    /// Emits `target <mode>= value`.
    pub(super) fn assign(&mut self, target: ObjectId, value: HostValue, mode: AssignMode) -> CompileResult<()> {
        let kind = self.cx.objects.kind(target);
        let mode = mode.resolve(kind)?;
        if mode == AssignMode::Value && self.kind == ContextKind::Concurrent {
            return Err(CompileError::context(
                "variables can only be written in sequential contexts",
            ));
        }
        let source = match value {
            HostValue::Merged(id) => {
                let (joined, site) = {
                    let merged = self.cx.tree.merged(id);
                    (merged.joined, merged.site)
                };
                match joined {
                    Some(joined) => Operand::Object(joined),
                    None if self.at_tail(site) => {
                        return self.cx.tree.redirect(&self.cx.objects, id, target, mode)
                    }
                    None => Operand::Object(self.materialize(id)?),
                }
            }
            HostValue::Tuple(_) | HostValue::List(_)
                if matches!(self.cx.objects.ty(target), Primitive::Array { .. }) =>
            {
                let items = self.iterate(&value)?;
                let count = self.cx.objects.ty(target).element_count().unwrap_or(0) as usize;
                if items.len() != count {
                    return Err(CompileError::type_error(format!(
                        "array of {count} elements cannot take {} values",
                        items.len()
                    )));
                }
                for (i, item) in items.into_iter().enumerate() {
                    let elem = self.cx.objects.offset(target, i as u32)?;
                    self.assign(elem, item, mode)?;
                }
                return Ok(());
            }
            other => self.operand(&other)?,
        };
        let ty = self.cx.objects.ty(target).clone();
        ty.check_assignable(&self.cx.objects.arg_type(&source))
            .map_err(|e| CompileError::type_error(format!("{}: {}", self.cx.objects.describe(target), e.message)))?;
        self.emit(NodeKind::Assign {
            target,
            source,
            mode,
        })?;
        Ok(())
    }

    /// Combines the values produced by alternative code paths.
    ///
    /// Identical values collapse. Numeric values with a common type are
    /// joined into one temporary right away; anything else stays merged
    /// until it is assigned or read.
    pub(super) fn merge_values(&mut self, branches: Vec<ValueBranch>) -> CompileResult<HostValue> {
        let Some(first) = branches.first() else {
            return Ok(HostValue::None);
        };
        if branches.iter().all(|b| b.value == first.value) {
            return Ok(HostValue::from_operand(first.value.clone()));
        }
        let args: Vec<ArgType> = branches
            .iter()
            .map(|b| self.cx.objects.arg_type(&b.value))
            .collect();
        let site = self.sinks.last().and_then(|sink| sink.last()).copied();
        let id = self.cx.tree.merge(branches, site);
        match common_type(&args) {
            Some(ty) if ty.is_numeric() => {
                let temp = self.temporary(ty);
                self.cx.tree.join(&self.cx.objects, id, temp)?;
                Ok(HostValue::Object(temp))
            }
            _ => Ok(HostValue::Merged(id)),
        }
    }

    /// Whether `site` is the last node emitted into the current sink, so a
    /// write recorded on its hooks lands exactly where it was written.
    fn at_tail(&self, site: Option<NodeId>) -> bool {
        site.is_some() && self.sinks.last().and_then(|sink| sink.last()).copied() == site
    }

    /// Routes every branch of a merged value into one temporary.
    pub(super) fn materialize(&mut self, id: MergedId) -> CompileResult<ObjectId> {
        if let Some(joined) = self.cx.tree.merged(id).joined {
            return Ok(joined);
        }
        let args: Vec<ArgType> = self
            .cx
            .tree
            .merged(id)
            .branches
            .iter()
            .map(|b| self.cx.objects.arg_type(&b.value))
            .collect();
        let ty = common_type(&args).ok_or_else(|| {
            let found = args.iter().map(ToString::to_string).collect::<Vec<_>>();
            CompileError::type_error(format!(
                "values of alternative paths have incompatible types: {}",
                found.join(", ")
            ))
        })?;
        let temp = self.temporary(ty);
        self.cx.tree.join(&self.cx.objects, id, temp)?;
        Ok(temp)
    }

    /// Calls a type: conversion for primitives, declaration for qualifiers.
    pub(super) fn construct(
        &mut self,
        ty: TypeExpr,
        args: Vec<HostValue>,
        mut kwargs: Vec<(String, HostValue)>,
    ) -> CompileResult<HostValue> {
        let name = take_kwarg(&mut kwargs, "name")
            .map(|v| match v {
                HostValue::Str(s) => Ok(s.to_string()),
                other => Err(CompileError::type_error(format!(
                    "`name` must be a str, found {}",
                    other.type_name()
                ))),
            })
            .transpose()?;
        let noreset = take_kwarg(&mut kwargs, "noreset").is_some_and(|v| v == HostValue::Bool(true));
        if let Some((key, _)) = kwargs.first() {
            return Err(CompileError::type_error(format!(
                "unexpected keyword argument `{key}`"
            )));
        }
        let (qualifier, ty) = match ty {
            TypeExpr::Family(family) => {
                return Err(CompileError::type_error(format!(
                    "{family:?} must be subscripted before it is called"
                )))
            }
            TypeExpr::Primitive(p) => {
                let [value] = <[HostValue; 1]>::try_from(args).map_err(|_| {
                    CompileError::type_error(format!("{p}(...) takes exactly one argument"))
                })?;
                return self.convert(&p, value);
            }
            TypeExpr::Qualified { qualifier, ty } => (qualifier, ty),
        };
        let value = match <[HostValue; 1]>::try_from(args) {
            Ok([v]) => Some(v),
            Err(args) if args.is_empty() => None,
            Err(_) => {
                return Err(CompileError::type_error(
                    "qualified constructors take at most one argument",
                ))
            }
        };
        let value = match (&ty, value) {
            (Some(t), Some(v)) if v.is_runtime() => Some(self.convert(t, v)?),
            (_, v) => v,
        };
        let ty = match ty {
            Some(t) => t,
            None => self.infer_type(value.as_ref())?,
        };
        match qualifier {
            QualifierCtor::Signal => self.declare_qualified(QualifierKind::Signal, ty, value, name, noreset),
            QualifierCtor::Variable => {
                self.require_sequential("declaring a Variable")?;
                self.declare_qualified(QualifierKind::Variable, ty, value, name, noreset)
            }
            QualifierCtor::Temporary => {
                let Some(value) = value else {
                    return Err(CompileError::type_error("Temporary(...) needs an initial value"));
                };
                let source = self.operand(&value)?;
                let temp = self.temporary(ty.clone());
                ty.check_assignable(&self.cx.objects.arg_type(&source))?;
                self.emit(NodeKind::Assign {
                    target: temp,
                    source,
                    mode: AssignMode::Temp,
                })?;
                Ok(HostValue::Object(temp))
            }
        }
    }

    fn infer_type(&mut self, value: Option<&HostValue>) -> CompileResult<Primitive> {
        let Some(value) = value else {
            return Err(CompileError::type_error(
                "a qualified object without a type needs an initial value",
            ));
        };
        let operand = self.operand(value)?;
        self.cx.objects.operand_type(&operand).ok_or_else(|| {
            CompileError::type_error(format!(
                "cannot infer a type from {}",
                self.cx.objects.arg_type(&operand)
            ))
        })
    }

    fn declare_qualified(
        &mut self,
        kind: QualifierKind,
        ty: Primitive,
        value: Option<HostValue>,
        name: Option<String>,
        noreset: bool,
    ) -> CompileResult<HostValue> {
        let mut decl = ObjectDecl::new(kind, ty.clone()).at(self.loc);
        decl.name = name;
        decl.noreset = noreset;
        let runtime = match value.as_ref().map(|v| self.operand(v)).transpose()? {
            Some(Operand::Const(c)) => {
                ty.check_assignable(&self.cx.objects.arg_type(&Operand::Const(c.clone())))?;
                decl = decl.with_default(c);
                None
            }
            other => other,
        };
        let id = self.cx.objects.declare(decl);
        if let Some(source) = runtime {
            ty.check_assignable(&self.cx.objects.arg_type(&source))?;
            match kind {
                QualifierKind::Variable => self.assign(id, HostValue::from_operand(source), AssignMode::Value)?,
                _ => {
                    self.emit(NodeKind::SignalAlias {
                        signal: id,
                        value: source,
                    })?;
                }
            }
        }
        Ok(HostValue::Object(id))
    }

    /// Explicit conversion `T(x)`.
    pub(super) fn convert(&mut self, ty: &Primitive, value: HostValue) -> CompileResult<HostValue> {
        let operand = self.operand(&value)?;
        let source = match operand {
            Operand::Const(c) => return const_convert(ty, &c).map(|c| HostValue::from_operand(Operand::Const(c))),
            Operand::Event { .. } => {
                if !matches!(ty, Primitive::Bool | Primitive::Bit) {
                    return Err(CompileError::type_error(format!("cannot convert an event to {ty}")));
                }
                operand
            }
            Operand::Object(id) => {
                let src = self.cx.objects.ty(id).clone();
                if src == *ty {
                    return Ok(value);
                }
                if let (Some(family), true) = (ty.family(), src.width() == ty.width() && src.is_vector()) {
                    return Ok(HostValue::Object(self.cx.objects.facet(id, family)?));
                }
                if !convertible(ty, &src) {
                    return Err(CompileError::type_error(format!("cannot convert {src} to {ty}")));
                }
                operand
            }
        };
        let temp = self.temporary(ty.clone());
        self.emit(NodeKind::Assign {
            target: temp,
            source,
            mode: AssignMode::Temp,
        })?;
        Ok(HostValue::Object(temp))
    }
}

fn take_kwarg(kwargs: &mut Vec<(String, HostValue)>, key: &str) -> Option<HostValue> {
    let index = kwargs.iter().position(|(k, _)| k == key)?;
    Some(kwargs.remove(index).1)
}

/// Conversions allowed by an explicit constructor call, beyond plain
/// assignability.
fn convertible(target: &Primitive, src: &Primitive) -> bool {
    let bitlike = |p: &Primitive| matches!(p, Primitive::Bit | Primitive::Bool);
    let numeric = |p: &Primitive| p.is_vector() || matches!(p, Primitive::Integer { .. });
    target.accepts(&ArgType::Typed(src.clone()))
        || (bitlike(target) && bitlike(src))
        || (numeric(target) && numeric(src))
}

fn const_convert(ty: &Primitive, value: &ConstValue) -> CompileResult<ConstValue> {
    let err = || CompileError::type_error(format!("cannot convert {value} to {ty}"));
    let int = value.as_int();
    Ok(match ty {
        Primitive::Bool => ConstValue::Bool(value.truthiness().ok_or_else(err)?),
        Primitive::Bit => match int {
            Some(0) => ConstValue::bit(false),
            Some(1) => ConstValue::bit(true),
            _ => match value {
                ConstValue::Null => ConstValue::bit(false),
                ConstValue::Full => ConstValue::bit(true),
                _ => return Err(err()),
            },
        },
        Primitive::Integer { .. } => ConstValue::Int(int.ok_or_else(err)?),
        Primitive::BitVector { .. } | Primitive::Unsigned { .. } | Primitive::Signed { .. } => {
            let width = ty.width().unwrap_or(0);
            let family = ty.family().ok_or_else(err)?;
            if let ConstValue::Int(i) = value {
                if !matches!(ty, Primitive::BitVector { .. }) && !ty.accepts(&ArgType::IntLiteral(*i)) {
                    return Err(CompileError::type_error(format!(
                        "integer {i} does not fit into {ty}"
                    )));
                }
            }
            let bits = value.to_bits(width).ok_or_else(err)?;
            ConstValue::Vector { bits, family }
        }
        Primitive::Enum(_) | Primitive::Array { .. } => {
            ty.check_assignable(&match value {
                ConstValue::Array(items) => ArgType::Elements(items.len()),
                other => other.primitive().map(ArgType::Typed).ok_or_else(err)?,
            })?;
            value.clone()
        }
    })
}

/// The type a temporary needs to hold every candidate.
pub(super) fn common_type(args: &[ArgType]) -> Option<Primitive> {
    let typed: Vec<&Primitive> = args.iter().filter_map(ArgType::primitive).collect();
    let candidate = match typed.first() {
        None => {
            return args
                .iter()
                .all(|a| matches!(a, ArgType::IntLiteral(_)))
                .then(Primitive::integer)
        }
        Some(first) if typed.iter().all(|t| t == first) => (*first).clone(),
        Some(_) => {
            let widest = |pick: fn(&Primitive) -> Option<u32>| {
                typed.iter().map(|t| pick(t)).collect::<Option<Vec<u32>>>().and_then(|w| w.into_iter().max())
            };
            if let Some(w) = widest(|t| match t {
                Primitive::Unsigned { width } => Some(*width),
                _ => None,
            }) {
                Primitive::unsigned(w)
            } else if let Some(w) = widest(|t| match t {
                Primitive::Signed { width } => Some(*width),
                _ => None,
            }) {
                Primitive::signed(w)
            } else if typed.iter().all(|t| matches!(t, Primitive::Bit | Primitive::Bool)) {
                Primitive::Bool
            } else {
                return None;
            }
        }
    };
    args.iter().all(|a| candidate.accepts(a)).then_some(candidate)
}
