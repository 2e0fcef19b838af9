//! Builtin calls.

use super::expr::{dict_key, range_len};
use super::stmt::Cond;
use super::Lowerer;
use crate::ast::BoolOpKind;
use crate::intrinsics::Intrinsic;
use crate::prepared::{NodeKind, ValueBranch};
use crate::value::{DictKey, HostValue, TypeExpr};
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_types::{
    BinOp, ConstValue, EventKind, ObjectId, Operand, Primitive, Sensitivity, UnaryOp,
};

impl<'a> Lowerer<'a> {
    pub(super) fn call_intrinsic(
        &mut self,
        intrinsic: Intrinsic,
        receiver: Option<HostValue>,
        mut args: Vec<HostValue>,
        mut kwargs: Vec<(String, HostValue)>,
    ) -> CompileResult<HostValue> {
        let name = intrinsic.name();
        log::trace!("intrinsic `{name}`");
        if let Some(receiver) = receiver {
            args.insert(0, receiver);
        }
        let default = match intrinsic {
            Intrinsic::SelectWith => kwargs
                .iter()
                .position(|(k, _)| k == "default")
                .map(|i| kwargs.remove(i).1),
            _ => None,
        };
        if let Some((key, _)) = kwargs.first() {
            return Err(CompileError::intrinsic(format!(
                "`{name}` got an unexpected keyword argument `{key}`"
            )));
        }
        match intrinsic {
            Intrinsic::RisingEdge
            | Intrinsic::FallingEdge
            | Intrinsic::BothEdges
            | Intrinsic::High
            | Intrinsic::Low => {
                let [value] = exact::<1>(name, args)?;
                let kind = match intrinsic {
                    Intrinsic::RisingEdge => EventKind::Rising,
                    Intrinsic::FallingEdge => EventKind::Falling,
                    Intrinsic::BothEdges => EventKind::Both,
                    Intrinsic::High => EventKind::High,
                    _ => EventKind::Low,
                };
                let signal = self.bit_signal(name, &value)?;
                Ok(HostValue::Event { kind, signal })
            }
            Intrinsic::SelectWith => {
                let [arg, choices] = exact::<2>(name, args)?;
                self.select_with(arg, choices, default)
            }
            Intrinsic::SensitivityAll => {
                self.require_sequential("`sensitivity_all`")?;
                exact::<0>(name, args)?;
                self.add_sensitivity(Sensitivity::All);
                Ok(HostValue::None)
            }
            Intrinsic::SensitivityList => {
                self.require_sequential("`sensitivity_list`")?;
                let mut signals = Vec::new();
                for value in self.flatten(args)? {
                    match value {
                        HostValue::Object(id) if self.cx.objects.kind(id).is_signal_like() => {
                            signals.push(self.cx.objects.root(id))
                        }
                        other => {
                            return Err(CompileError::intrinsic(format!(
                                "`sensitivity_list` expects signals, found {}",
                                other.type_name()
                            )))
                        }
                    }
                }
                self.add_sensitivity(Sensitivity::List(signals));
                Ok(HostValue::None)
            }
            Intrinsic::ResetContext | Intrinsic::ResetPushed => {
                self.require_sequential(&format!("`{name}`"))?;
                exact::<0>(name, args)?;
                self.emit(match intrinsic {
                    Intrinsic::ResetContext => NodeKind::ResetContext,
                    _ => NodeKind::ResetPushed,
                })?;
                Ok(HostValue::None)
            }
            Intrinsic::ResetInstance => {
                let mut objects = Vec::new();
                for value in args {
                    self.collect_objects(&value, &mut objects)?;
                }
                self.emit(NodeKind::ResetInstance { objects })?;
                Ok(HostValue::None)
            }
            Intrinsic::Always => Err(CompileError::intrinsic(
                "`always` must be called directly",
            )),
            Intrinsic::Any | Intrinsic::All => {
                let [iterable] = exact::<1>(name, args)?;
                let items = self.iterate(&iterable)?;
                let kind = match intrinsic {
                    Intrinsic::Any => BoolOpKind::Or,
                    _ => BoolOpKind::And,
                };
                self.combine(kind, items)
            }
            Intrinsic::Bool => {
                let [value] = exact::<1>(name, args)?;
                match self.condition(&value)? {
                    Cond::Const(b) => Ok(HostValue::Bool(b)),
                    Cond::Runtime(op) => self.to_boolean(op),
                }
            }
            Intrinsic::Comment => {
                let lines = args
                    .iter()
                    .map(|v| self.format_host(v))
                    .collect::<CompileResult<Vec<_>>>()?;
                self.emit(NodeKind::Comment(lines))?;
                Ok(HostValue::None)
            }
            Intrinsic::Concat => {
                let mut parts = args.into_iter();
                let first = parts
                    .next()
                    .ok_or_else(|| CompileError::intrinsic("`concat` needs at least one operand"))?;
                parts.try_fold(first, |acc, next| self.hardware_binop(BinOp::Concat, &acc, &next))
            }
            Intrinsic::LeftShift | Intrinsic::RightShift => {
                let [value, amount] = exact::<2>(name, args)?;
                let op = match intrinsic {
                    Intrinsic::LeftShift => BinOp::Shl,
                    _ => BinOp::Shr,
                };
                self.hardware_binop(op, &value, &amount)
            }
            Intrinsic::Abs => {
                let [value] = exact::<1>(name, args)?;
                match value.as_int() {
                    Some(i) => i
                        .checked_abs()
                        .map(HostValue::Int)
                        .ok_or_else(|| CompileError::intrinsic("integer overflow in `abs`")),
                    None => self.hardware_unary(UnaryOp::Abs, &value),
                }
            }
            Intrinsic::Len => {
                let [value] = exact::<1>(name, args)?;
                let len = match &value {
                    HostValue::Object(id) => {
                        let ty = self.cx.objects.ty(*id);
                        ty.element_count().ok_or_else(|| {
                            CompileError::intrinsic(format!("{ty} has no length"))
                        })? as usize
                    }
                    HostValue::Dict(id) => self.cx.heap.dicts[*id].len(),
                    HostValue::Range { start, stop, step } => range_len(*start, *stop, *step) as usize,
                    other => self.iterate(other)?.len(),
                };
                Ok(HostValue::Int(len as i64))
            }
            Intrinsic::Range => {
                let ints = args
                    .iter()
                    .map(|v| {
                        v.as_int()
                            .ok_or_else(|| CompileError::intrinsic("`range` arguments must be ints"))
                    })
                    .collect::<CompileResult<Vec<_>>>()?;
                let (start, stop, step) = match ints[..] {
                    [stop] => (0, stop, 1),
                    [start, stop] => (start, stop, 1),
                    [start, stop, step] if step != 0 => (start, stop, step),
                    [_, _, _] => return Err(CompileError::intrinsic("`range` step cannot be zero")),
                    _ => return Err(CompileError::intrinsic("`range` takes 1 to 3 arguments")),
                };
                Ok(HostValue::Range { start, stop, step })
            }
            Intrinsic::Enumerate => {
                let (iterable, start) = match <[HostValue; 2]>::try_from(args) {
                    Ok([it, start]) => (it, start.as_int().unwrap_or(0)),
                    Err(args) => {
                        let [it] = exact::<1>(name, args)?;
                        (it, 0)
                    }
                };
                let items = self
                    .iterate(&iterable)?
                    .into_iter()
                    .zip(start..)
                    .map(|(v, i)| HostValue::tuple(vec![HostValue::Int(i), v]))
                    .collect();
                Ok(self.cx.heap.new_list(items))
            }
            Intrinsic::Zip => {
                let columns = args
                    .iter()
                    .map(|a| self.iterate(a))
                    .collect::<CompileResult<Vec<_>>>()?;
                let len = columns.iter().map(Vec::len).min().unwrap_or(0);
                let rows = (0..len)
                    .map(|i| HostValue::tuple(columns.iter().map(|c| c[i].clone()).collect()))
                    .collect();
                Ok(self.cx.heap.new_list(rows))
            }
            Intrinsic::Min | Intrinsic::Max => {
                let items = match <[HostValue; 1]>::try_from(args) {
                    Ok([single]) => self.iterate(&single)?,
                    Err(args) => args,
                };
                let ints = items
                    .iter()
                    .map(HostValue::as_int)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| CompileError::intrinsic(format!("`{name}` expects ints")))?;
                let result = match intrinsic {
                    Intrinsic::Min => ints.into_iter().min(),
                    _ => ints.into_iter().max(),
                };
                result
                    .map(HostValue::Int)
                    .ok_or_else(|| CompileError::intrinsic(format!("`{name}` of an empty sequence")))
            }
            Intrinsic::Int => {
                let [value] = exact::<1>(name, args)?;
                match &value {
                    HostValue::Str(s) => s
                        .trim()
                        .parse::<i64>()
                        .map(HostValue::Int)
                        .map_err(|_| CompileError::intrinsic(format!("invalid int literal `{s}`"))),
                    HostValue::Const(c) => c
                        .as_int()
                        .map(HostValue::Int)
                        .ok_or_else(|| CompileError::intrinsic(format!("`int` of constant {c}"))),
                    other => other.as_int().map(HostValue::Int).ok_or_else(|| {
                        CompileError::intrinsic(format!("`int` of a {}", other.type_name()))
                    }),
                }
            }
            Intrinsic::Str => {
                let [value] = exact::<1>(name, args)?;
                Ok(HostValue::str(&self.format_host(&value)?))
            }
            Intrinsic::List | Intrinsic::Tuple | Intrinsic::Reversed => {
                let mut items = match <[HostValue; 1]>::try_from(args) {
                    Ok([value]) => self.iterate(&value)?,
                    Err(args) if args.is_empty() && intrinsic != Intrinsic::Reversed => Vec::new(),
                    Err(_) => return Err(CompileError::intrinsic(format!("`{name}` takes one argument"))),
                };
                if intrinsic == Intrinsic::Reversed {
                    items.reverse();
                }
                Ok(match intrinsic {
                    Intrinsic::Tuple => HostValue::tuple(items),
                    _ => self.cx.heap.new_list(items),
                })
            }
            Intrinsic::Isinstance => {
                let [value, class] = exact::<2>(name, args)?;
                let classes = match &class {
                    HostValue::Tuple(items) => items.to_vec(),
                    other => vec![other.clone()],
                };
                Ok(HostValue::Bool(
                    classes.iter().any(|c| self.is_instance(&value, c)),
                ))
            }
            Intrinsic::Property => {
                let [getter] = exact::<1>(name, args)?;
                let HostValue::Function(getter) = getter else {
                    return Err(CompileError::intrinsic("`property` expects a function"));
                };
                Ok(HostValue::Property {
                    getter,
                    setter: None,
                })
            }
            Intrinsic::PropertySetter => {
                let [property, setter] = exact::<2>(name, args)?;
                match (property, setter) {
                    (HostValue::Property { getter, .. }, HostValue::Function(setter)) => {
                        Ok(HostValue::Property {
                            getter,
                            setter: Some(setter),
                        })
                    }
                    _ => Err(CompileError::intrinsic("`setter` expects a function")),
                }
            }
            Intrinsic::Super => {
                exact::<0>(name, args)?;
                let frame = self.frame()?;
                match (frame.owner, frame.first_arg.clone()) {
                    (Some(class), Some(receiver)) => Ok(HostValue::Super {
                        class,
                        receiver: Box::new(receiver),
                    }),
                    _ => Err(CompileError::intrinsic(
                        "`super()` is only valid inside a method",
                    )),
                }
            }
            Intrinsic::ListAppend => {
                let [list, item] = exact::<2>(name, args)?;
                let HostValue::List(id) = list else {
                    return Err(CompileError::sanity("`append` bound to a non-list"));
                };
                self.cx.heap.lists[id].push(item);
                Ok(HostValue::None)
            }
            Intrinsic::DictItems | Intrinsic::DictKeys | Intrinsic::DictValues => {
                let [dict] = exact::<1>(name, args)?;
                let HostValue::Dict(id) = dict else {
                    return Err(CompileError::sanity(format!("`{name}` bound to a non-dict")));
                };
                let items = self.cx.heap.dicts[id]
                    .iter()
                    .map(|(k, v)| match intrinsic {
                        Intrinsic::DictKeys => k.to_value(),
                        Intrinsic::DictValues => v.clone(),
                        _ => HostValue::tuple(vec![k.to_value(), v.clone()]),
                    })
                    .collect();
                Ok(self.cx.heap.new_list(items))
            }
            Intrinsic::Lsb | Intrinsic::Msb => {
                let (object, count) = match <[HostValue; 2]>::try_from(args) {
                    Ok([object, count]) => (object, Some(count)),
                    Err(args) => {
                        let [object] = exact::<1>(name, args)?;
                        (object, None)
                    }
                };
                let HostValue::Object(id) = object else {
                    return Err(CompileError::sanity(format!("`{name}` bound to a non-object")));
                };
                let width = self.cx.objects.ty(id).width().unwrap_or(0);
                let view = match count.as_ref().and_then(HostValue::as_int) {
                    None if count.is_some() => {
                        return Err(CompileError::intrinsic(format!("`{name}` width must be an int")))
                    }
                    None => {
                        let index = match intrinsic {
                            Intrinsic::Lsb => 0,
                            _ => width.saturating_sub(1),
                        };
                        self.cx.objects.offset(id, index)?
                    }
                    Some(n) if n <= 0 => {
                        return Err(CompileError::intrinsic(format!("`{name}` width must be positive")))
                    }
                    Some(n) => match intrinsic {
                        Intrinsic::Lsb => self.cx.objects.lsb(id, n as u32)?,
                        _ => self.cx.objects.msb(id, n as u32)?,
                    },
                };
                Ok(HostValue::Object(view))
            }
        }
    }

    fn bit_signal(&self, name: &str, value: &HostValue) -> CompileResult<ObjectId> {
        match value {
            HostValue::Object(id)
                if self.cx.objects.kind(*id).is_signal_like()
                    && *self.cx.objects.ty(*id) == Primitive::Bit =>
            {
                Ok(*id)
            }
            other => Err(CompileError::intrinsic(format!(
                "`{name}` expects a Bit signal, found {}",
                match other {
                    HostValue::Object(id) => self.cx.objects.describe(*id),
                    v => v.type_name().to_string(),
                }
            ))),
        }
    }

    fn add_sensitivity(&mut self, sensitivity: Sensitivity) {
        self.sensitivity = Some(match self.sensitivity.take() {
            Some(current) => current.merge(sensitivity),
            None => sensitivity,
        });
    }

    /// Expands nested tuples and lists.
    fn flatten(&mut self, values: Vec<HostValue>) -> CompileResult<Vec<HostValue>> {
        let mut out = Vec::new();
        for value in values {
            match value {
                HostValue::Tuple(_) | HostValue::List(_) => {
                    let inner = self.iterate(&value)?;
                    out.extend(self.flatten(inner)?);
                }
                other => out.push(other),
            }
        }
        Ok(out)
    }

    /// Gathers the objects reachable from a value for `reset_instance`.
    fn collect_objects(&mut self, value: &HostValue, out: &mut Vec<ObjectId>) -> CompileResult<()> {
        match value {
            HostValue::Object(id) => {
                if !out.contains(id) {
                    out.push(*id);
                }
            }
            HostValue::Instance(iid) => {
                let attrs: Vec<HostValue> = self.cx.heap.instances[*iid].attrs.values().cloned().collect();
                for attr in &attrs {
                    self.collect_objects(attr, out)?;
                }
            }
            HostValue::Tuple(_) | HostValue::List(_) | HostValue::Dict(_) => {
                let items: Vec<HostValue> = match value {
                    HostValue::Dict(id) => self.cx.heap.dicts[*id].values().cloned().collect(),
                    other => self.iterate(other)?,
                };
                for item in &items {
                    self.collect_objects(item, out)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn select_with(
        &mut self,
        arg: HostValue,
        choices: HostValue,
        default: Option<HostValue>,
    ) -> CompileResult<HostValue> {
        let arg = self.operand(&arg)?;
        let HostValue::Dict(did) = choices else {
            return Err(CompileError::intrinsic(
                "`select_with` expects a dict of choices",
            ));
        };
        let entries: Vec<(DictKey, HostValue)> = self.cx.heap.dicts[did]
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Operand::Const(c) = &arg {
            let key = dict_key(&HostValue::from_operand(Operand::Const(c.clone())))?;
            return match entries.into_iter().find(|(k, _)| *k == key) {
                Some((_, v)) => Ok(v),
                None => default.ok_or_else(|| {
                    CompileError::intrinsic("constant `select_with` selector matches no choice")
                }),
            };
        }
        let mut branches = Vec::with_capacity(entries.len() + 1);
        let mut cases = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let choice = match self.operand(&key.to_value())? {
                Operand::Const(c) => c,
                _ => {
                    return Err(CompileError::intrinsic(
                        "`select_with` choices must be constants",
                    ))
                }
            };
            let hook = self.cx.tree.new_hook();
            branches.push(ValueBranch {
                value: self.operand(&value)?,
                hook,
            });
            cases.push((choice, hook));
        }
        let default = match default {
            Some(value) => {
                let hook = self.cx.tree.new_hook();
                branches.push(ValueBranch {
                    value: self.operand(&value)?,
                    hook,
                });
                Some(hook)
            }
            None => None,
        };
        if cases.is_empty() && default.is_none() {
            return Err(CompileError::intrinsic("`select_with` without any choice"));
        }
        self.emit(NodeKind::SelectWith {
            arg,
            choices: cases,
            default,
        })?;
        self.merge_values(branches)
    }

    fn is_instance(&self, value: &HostValue, class: &HostValue) -> bool {
        match (value, class) {
            (HostValue::Instance(iid), HostValue::Class(cid)) => {
                self.cx.heap.is_subclass(self.cx.heap.instances[*iid].class, *cid)
            }
            (HostValue::Int(_), HostValue::Intrinsic(Intrinsic::Int))
            | (HostValue::Bool(_), HostValue::Intrinsic(Intrinsic::Bool | Intrinsic::Int))
            | (HostValue::Str(_), HostValue::Intrinsic(Intrinsic::Str))
            | (HostValue::List(_), HostValue::Intrinsic(Intrinsic::List))
            | (HostValue::Tuple(_), HostValue::Intrinsic(Intrinsic::Tuple)) => true,
            (HostValue::Object(id), HostValue::Type(TypeExpr::Primitive(p))) => self.cx.objects.ty(*id) == p,
            (HostValue::Const(c), HostValue::Type(TypeExpr::Primitive(p))) => {
                c.primitive().as_ref() == Some(p)
            }
            (HostValue::Const(ConstValue::Enum { ty, .. }), HostValue::EnumType(e)) => ty == e,
            (HostValue::Object(id), HostValue::EnumType(e)) => {
                *self.cx.objects.ty(*id) == Primitive::Enum(*e)
            }
            _ => false,
        }
    }
}

/// Destructures exactly `N` positional arguments.
fn exact<const N: usize>(name: &str, args: Vec<HostValue>) -> CompileResult<[HostValue; N]> {
    let count = args.len();
    <[HostValue; N]>::try_from(args).map_err(|_| {
        CompileError::intrinsic(format!(
            "`{name}` takes {N} argument{} but {count} were given",
            if N == 1 { "" } else { "s" }
        ))
    })
}
