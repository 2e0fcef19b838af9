//! Host-level values manipulated while lowering.

use crate::heap::{ClassId, DictId, FunctionId, InstanceId, ListId};
use crate::intrinsics::Intrinsic;
use crate::prepared::MergedId;
use corvid_types::{ConstValue, EnumId, EventKind, ObjectId, Operand, Primitive};
use std::rc::Rc;

/// Unsubscripted type families (`Unsigned`, `Signal`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    /// `BitVector[w]`
    BitVector,
    /// `Unsigned[w]`
    Unsigned,
    /// `Signed[w]`
    Signed,
    /// `Array[T, n]`
    Array,
    /// `Signal[T]`
    Signal,
    /// `Variable[T]`
    Variable,
    /// `Temporary[T]`
    Temporary,
}

/// Qualifiers that can be constructed from host code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualifierCtor {
    /// `Signal[T](...)`
    Signal,
    /// `Variable[T](...)`
    Variable,
    /// `Temporary[T](...)`
    Temporary,
}

/// A type-level host value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// A family awaiting its subscript.
    Family(TypeFamily),
    /// A complete primitive type; calling it converts.
    Primitive(Primitive),
    /// A qualifier with an optional primitive; calling it declares.
    Qualified {
        /// The qualifier.
        qualifier: QualifierCtor,
        /// The wrapped type, inferred from the argument when absent.
        ty: Option<Primitive>,
    },
}

/// A value the lowerer can hold in a name.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// `None`
    None,
    /// A host boolean.
    Bool(bool),
    /// A host integer.
    Int(i64),
    /// A host string.
    Str(Rc<str>),
    /// A hardware constant (Bit, vector literal, Null, Full, enum member).
    Const(ConstValue),
    /// A qualified object.
    Object(ObjectId),
    /// An event test such as `rising_edge(clk)`.
    Event {
        /// Which event.
        kind: EventKind,
        /// The tested signal.
        signal: ObjectId,
    },
    /// A value that depends on control flow.
    Merged(MergedId),
    /// An immutable tuple.
    Tuple(Rc<[HostValue]>),
    /// A mutable list.
    List(ListId),
    /// A mutable dict.
    Dict(DictId),
    /// `range(start, stop, step)`
    Range {
        /// First value.
        start: i64,
        /// End, exclusive.
        stop: i64,
        /// Increment.
        step: i64,
    },
    /// A user function.
    Function(FunctionId),
    /// A function bound to its receiver.
    BoundMethod {
        /// The function.
        function: FunctionId,
        /// Passed as the first argument.
        receiver: Box<HostValue>,
    },
    /// A builtin.
    Intrinsic(Intrinsic),
    /// A builtin method bound to its receiver.
    BoundIntrinsic {
        /// The builtin.
        intrinsic: Intrinsic,
        /// Passed as the first argument.
        receiver: Box<HostValue>,
    },
    /// A type or type family.
    Type(TypeExpr),
    /// An enum type.
    EnumType(EnumId),
    /// A user class.
    Class(ClassId),
    /// An instance of a user class.
    Instance(InstanceId),
    /// A `property` stored on a class.
    Property {
        /// Getter.
        getter: FunctionId,
        /// Optional setter.
        setter: Option<FunctionId>,
    },
    /// The result of `super()`.
    Super {
        /// Class whose bases are searched.
        class: ClassId,
        /// The instance methods are bound to.
        receiver: Box<HostValue>,
    },
    /// A local name that has not been assigned yet.
    Unbound,
}

impl HostValue {
    /// Shorthand for a string value.
    pub fn str(s: &str) -> Self {
        HostValue::Str(Rc::from(s))
    }

    /// Shorthand for a tuple value.
    pub fn tuple(items: Vec<HostValue>) -> Self {
        HostValue::Tuple(Rc::from(items))
    }

    /// The operand this value denotes, if it is a hardware value.
    pub fn to_operand(&self) -> Option<Operand> {
        match self {
            HostValue::Bool(b) => Some(Operand::Const(ConstValue::Bool(*b))),
            HostValue::Int(i) => Some(Operand::Const(ConstValue::Int(*i))),
            HostValue::Const(c) => Some(Operand::Const(c.clone())),
            HostValue::Object(id) => Some(Operand::Object(*id)),
            HostValue::Event { kind, signal } => Some(Operand::Event {
                kind: *kind,
                signal: *signal,
            }),
            _ => None,
        }
    }

    /// Converts an operand back into a host value.
    pub fn from_operand(operand: Operand) -> Self {
        match operand {
            Operand::Object(id) => HostValue::Object(id),
            Operand::Event { kind, signal } => HostValue::Event { kind, signal },
            Operand::Const(ConstValue::Bool(b)) => HostValue::Bool(b),
            Operand::Const(ConstValue::Int(i)) => HostValue::Int(i),
            Operand::Const(c) => HostValue::Const(c),
        }
    }

    /// Returns `true` for values only known at runtime.
    pub fn is_runtime(&self) -> bool {
        matches!(
            self,
            HostValue::Object(_) | HostValue::Event { .. } | HostValue::Merged(_)
        )
    }

    /// The integer value of host integers and booleans.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            HostValue::Int(i) => Some(*i),
            HostValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Host-level name of the value's type, for messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::None => "NoneType",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Str(_) => "str",
            HostValue::Const(_) => "constant",
            HostValue::Object(_) => "qualified object",
            HostValue::Event { .. } => "event",
            HostValue::Merged(_) => "merged value",
            HostValue::Tuple(_) => "tuple",
            HostValue::List(_) => "list",
            HostValue::Dict(_) => "dict",
            HostValue::Range { .. } => "range",
            HostValue::Function(_) => "function",
            HostValue::BoundMethod { .. } => "method",
            HostValue::Intrinsic(_) | HostValue::BoundIntrinsic { .. } => "builtin",
            HostValue::Type(_) => "type",
            HostValue::EnumType(_) => "enum type",
            HostValue::Class(_) => "class",
            HostValue::Instance(_) => "instance",
            HostValue::Property { .. } => "property",
            HostValue::Super { .. } => "super",
            HostValue::Unbound => "unbound",
        }
    }
}

/// Hashable dict keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DictKey {
    /// `None`
    None,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A string.
    Str(Rc<str>),
    /// A hardware constant.
    Const(ConstValue),
    /// An object, keyed by identity.
    Object(ObjectId),
    /// An enum type.
    EnumType(EnumId),
    /// A tuple of keys.
    Tuple(Vec<DictKey>),
}

impl DictKey {
    /// Builds a key from a hashable value.
    pub fn from_value(value: &HostValue) -> Option<DictKey> {
        Some(match value {
            HostValue::None => DictKey::None,
            HostValue::Bool(b) => DictKey::Bool(*b),
            HostValue::Int(i) => DictKey::Int(*i),
            HostValue::Str(s) => DictKey::Str(s.clone()),
            HostValue::Const(c) => DictKey::Const(c.clone()),
            HostValue::Object(id) => DictKey::Object(*id),
            HostValue::EnumType(id) => DictKey::EnumType(*id),
            HostValue::Tuple(items) => DictKey::Tuple(
                items
                    .iter()
                    .map(DictKey::from_value)
                    .collect::<Option<Vec<_>>>()?,
            ),
            _ => return None,
        })
    }

    /// Converts the key back into a value.
    pub fn to_value(&self) -> HostValue {
        match self {
            DictKey::None => HostValue::None,
            DictKey::Bool(b) => HostValue::Bool(*b),
            DictKey::Int(i) => HostValue::Int(*i),
            DictKey::Str(s) => HostValue::Str(s.clone()),
            DictKey::Const(c) => HostValue::Const(c.clone()),
            DictKey::Object(id) => HostValue::Object(*id),
            DictKey::EnumType(id) => HostValue::EnumType(*id),
            DictKey::Tuple(items) => {
                HostValue::tuple(items.iter().map(DictKey::to_value).collect())
            }
        }
    }
}
