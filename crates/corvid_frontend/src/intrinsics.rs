//! The intrinsic registry.
//!
//! Builtin callables are not lowered from source. Each one is either
//! *pure* (evaluated while lowering, like `len` or `range`) or a *special
//! case* that the lowerer turns into a dedicated prepared node (`select_with`,
//! `reset_context`, event tests, ...). The registry also binds the builtin
//! type names (`Bit`, `Unsigned`, `Signal`, ...) and the `Null`/`Full`
//! constants.

use crate::value::{HostValue, QualifierCtor, TypeExpr, TypeFamily};
use corvid_types::{ConstValue, Primitive};
use std::collections::HashMap;

/// How an intrinsic is replaced during lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    /// Evaluated at lowering time; never produces nodes.
    Pure,
    /// Converted into a specific prepared node.
    SpecialCase,
}

/// Every builtin known to the lowerer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    /// `rising_edge(s)`
    RisingEdge,
    /// `falling_edge(s)`
    FallingEdge,
    /// `both_edges(s)`
    BothEdges,
    /// `high(s)`
    High,
    /// `low(s)`
    Low,
    /// `select_with(arg, choices, default=...)`
    SelectWith,
    /// `sensitivity_all()`
    SensitivityAll,
    /// `sensitivity_list(s...)`
    SensitivityList,
    /// `reset_context()`
    ResetContext,
    /// `reset_pushed()`
    ResetPushed,
    /// `reset_instance(objs...)`
    ResetInstance,
    /// `always(expr)`
    Always,
    /// `any(iterable)`
    Any,
    /// `all(iterable)`
    All,
    /// `bool(x)`
    Bool,
    /// `comment(text...)`
    Comment,
    /// `concat(a, b, ...)`
    Concat,
    /// `leftshift(x, n)`
    LeftShift,
    /// `rightshift(x, n)`
    RightShift,
    /// `len(x)`
    Len,
    /// `range(...)`
    Range,
    /// `enumerate(x)`
    Enumerate,
    /// `zip(a, b, ...)`
    Zip,
    /// `min(...)`
    Min,
    /// `max(...)`
    Max,
    /// `abs(x)`
    Abs,
    /// `int(x)`
    Int,
    /// `str(x)`
    Str,
    /// `list(x)`
    List,
    /// `tuple(x)`
    Tuple,
    /// `reversed(x)`
    Reversed,
    /// `isinstance(x, cls)`
    Isinstance,
    /// `property(getter)`
    Property,
    /// `super()`
    Super,
    /// `list.append(x)`
    ListAppend,
    /// `dict.items()`
    DictItems,
    /// `dict.keys()`
    DictKeys,
    /// `dict.values()`
    DictValues,
    /// `obj.lsb(n)`
    Lsb,
    /// `obj.msb(n)`
    Msb,
    /// `prop.setter(fn)`
    PropertySetter,
}

impl Intrinsic {
    /// The builtin's host name.
    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::RisingEdge => "rising_edge",
            Intrinsic::FallingEdge => "falling_edge",
            Intrinsic::BothEdges => "both_edges",
            Intrinsic::High => "high",
            Intrinsic::Low => "low",
            Intrinsic::SelectWith => "select_with",
            Intrinsic::SensitivityAll => "sensitivity_all",
            Intrinsic::SensitivityList => "sensitivity_list",
            Intrinsic::ResetContext => "reset_context",
            Intrinsic::ResetPushed => "reset_pushed",
            Intrinsic::ResetInstance => "reset_instance",
            Intrinsic::Always => "always",
            Intrinsic::Any => "any",
            Intrinsic::All => "all",
            Intrinsic::Bool => "bool",
            Intrinsic::Comment => "comment",
            Intrinsic::Concat => "concat",
            Intrinsic::LeftShift => "leftshift",
            Intrinsic::RightShift => "rightshift",
            Intrinsic::Len => "len",
            Intrinsic::Range => "range",
            Intrinsic::Enumerate => "enumerate",
            Intrinsic::Zip => "zip",
            Intrinsic::Min => "min",
            Intrinsic::Max => "max",
            Intrinsic::Abs => "abs",
            Intrinsic::Int => "int",
            Intrinsic::Str => "str",
            Intrinsic::List => "list",
            Intrinsic::Tuple => "tuple",
            Intrinsic::Reversed => "reversed",
            Intrinsic::Isinstance => "isinstance",
            Intrinsic::Property => "property",
            Intrinsic::Super => "super",
            Intrinsic::ListAppend => "append",
            Intrinsic::DictItems => "items",
            Intrinsic::DictKeys => "keys",
            Intrinsic::DictValues => "values",
            Intrinsic::Lsb => "lsb",
            Intrinsic::Msb => "msb",
            Intrinsic::PropertySetter => "setter",
        }
    }

    /// Whether the intrinsic is evaluated or turned into a node.
    pub fn replacement(self) -> Replacement {
        match self {
            Intrinsic::RisingEdge
            | Intrinsic::FallingEdge
            | Intrinsic::BothEdges
            | Intrinsic::High
            | Intrinsic::Low
            | Intrinsic::SelectWith
            | Intrinsic::SensitivityAll
            | Intrinsic::SensitivityList
            | Intrinsic::ResetContext
            | Intrinsic::ResetPushed
            | Intrinsic::ResetInstance
            | Intrinsic::Always
            | Intrinsic::Any
            | Intrinsic::All
            | Intrinsic::Bool
            | Intrinsic::Comment
            | Intrinsic::Concat
            | Intrinsic::LeftShift
            | Intrinsic::RightShift
            | Intrinsic::Abs
            | Intrinsic::Lsb
            | Intrinsic::Msb => Replacement::SpecialCase,
            _ => Replacement::Pure,
        }
    }

    /// Builtins reachable by name.
    const GLOBAL: [Intrinsic; 34] = [
        Intrinsic::RisingEdge,
        Intrinsic::FallingEdge,
        Intrinsic::BothEdges,
        Intrinsic::High,
        Intrinsic::Low,
        Intrinsic::SelectWith,
        Intrinsic::SensitivityAll,
        Intrinsic::SensitivityList,
        Intrinsic::ResetContext,
        Intrinsic::ResetPushed,
        Intrinsic::ResetInstance,
        Intrinsic::Always,
        Intrinsic::Any,
        Intrinsic::All,
        Intrinsic::Bool,
        Intrinsic::Comment,
        Intrinsic::Concat,
        Intrinsic::LeftShift,
        Intrinsic::RightShift,
        Intrinsic::Len,
        Intrinsic::Range,
        Intrinsic::Enumerate,
        Intrinsic::Zip,
        Intrinsic::Min,
        Intrinsic::Max,
        Intrinsic::Abs,
        Intrinsic::Int,
        Intrinsic::Str,
        Intrinsic::List,
        Intrinsic::Tuple,
        Intrinsic::Reversed,
        Intrinsic::Isinstance,
        Intrinsic::Property,
        Intrinsic::Super,
    ];
}

/// Name → builtin value table, populated once per session.
#[derive(Debug, Clone)]
pub struct IntrinsicRegistry {
    builtins: HashMap<String, HostValue>,
}

impl Default for IntrinsicRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IntrinsicRegistry {
    /// Creates the registry with every builtin.
    pub fn new() -> Self {
        let mut builtins = HashMap::new();
        for intrinsic in Intrinsic::GLOBAL {
            builtins.insert(intrinsic.name().to_string(), HostValue::Intrinsic(intrinsic));
        }
        let types = [
            ("Bit", TypeExpr::Primitive(Primitive::Bit)),
            ("Integer", TypeExpr::Primitive(Primitive::integer())),
            ("BitVector", TypeExpr::Family(TypeFamily::BitVector)),
            ("Unsigned", TypeExpr::Family(TypeFamily::Unsigned)),
            ("Signed", TypeExpr::Family(TypeFamily::Signed)),
            ("Array", TypeExpr::Family(TypeFamily::Array)),
            ("Signal", TypeExpr::Family(TypeFamily::Signal)),
            ("Variable", TypeExpr::Family(TypeFamily::Variable)),
            (
                "Temporary",
                TypeExpr::Qualified {
                    qualifier: QualifierCtor::Temporary,
                    ty: None,
                },
            ),
        ];
        for (name, ty) in types {
            builtins.insert(name.to_string(), HostValue::Type(ty));
        }
        builtins.insert("Null".to_string(), HostValue::Const(ConstValue::Null));
        builtins.insert("Full".to_string(), HostValue::Const(ConstValue::Full));
        Self { builtins }
    }

    /// Looks a builtin up by name.
    pub fn lookup(&self, name: &str) -> Option<&HostValue> {
        self.builtins.get(name)
    }

    /// Adds or replaces a builtin.
    pub fn register(&mut self, name: impl Into<String>, value: HostValue) {
        self.builtins.insert(name.into(), value);
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.builtins.len()
    }

    /// Returns `true` if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.builtins.is_empty()
    }
}
