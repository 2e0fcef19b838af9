//! Operands shared by the prepared tree and the IR.

use crate::object::ObjectId;
use crate::primitive::Primitive;
use crate::value::ConstValue;
use serde::{Deserialize, Serialize};

/// Clock and level tests on a single signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// `rising_edge(s)`.
    Rising,
    /// `falling_edge(s)`.
    Falling,
    /// Any change of `s`.
    Both,
    /// `s = '1'`.
    High,
    /// `s = '0'`.
    Low,
}

/// A readable value: a qualified object, a constant or an event test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    /// A qualified object (possibly a view).
    Object(ObjectId),
    /// A constant.
    Const(ConstValue),
    /// An event test on a Bit signal; evaluates to a boolean.
    Event {
        /// Which event.
        kind: EventKind,
        /// The tested signal.
        signal: ObjectId,
    },
}

impl Operand {
    /// The object, if this operand is one.
    pub fn as_object(&self) -> Option<ObjectId> {
        match self {
            Operand::Object(id) => Some(*id),
            _ => None,
        }
    }

    /// The constant, if this operand is one.
    pub fn as_const(&self) -> Option<&ConstValue> {
        match self {
            Operand::Const(c) => Some(c),
            _ => None,
        }
    }

    /// Objects this operand reads (not including dynamic view indices).
    pub fn object(&self) -> Option<ObjectId> {
        match self {
            Operand::Object(id) => Some(*id),
            Operand::Event { signal, .. } => Some(*signal),
            Operand::Const(_) => None,
        }
    }
}

impl From<ObjectId> for Operand {
    fn from(id: ObjectId) -> Self {
        Operand::Object(id)
    }
}

impl From<ConstValue> for Operand {
    fn from(value: ConstValue) -> Self {
        Operand::Const(value)
    }
}

/// A piece of inline HDL code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InlinePart {
    /// Verbatim text.
    Text(String),
    /// An object reference in read position.
    Read(ObjectId),
    /// An object reference in assignment-target position.
    Target(ObjectId),
}

/// The type an operand contributes to typing decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgType {
    /// A value with a fixed primitive type.
    Typed(Primitive),
    /// An untyped integer literal.
    IntLiteral(i64),
    /// `Null` or `Full`.
    Adaptive,
    /// A string literal.
    Str,
    /// A list of element constants.
    Elements(usize),
}

impl ArgType {
    /// The fixed primitive type, if any.
    pub fn primitive(&self) -> Option<&Primitive> {
        match self {
            ArgType::Typed(p) => Some(p),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgType::Typed(p) => write!(f, "{p}"),
            ArgType::IntLiteral(i) => write!(f, "integer literal {i}"),
            ArgType::Adaptive => write!(f, "Null/Full"),
            ArgType::Str => write!(f, "str"),
            ArgType::Elements(n) => write!(f, "{n} element list"),
        }
    }
}
