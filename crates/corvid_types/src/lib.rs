//! Hardware primitive types and type qualifiers.
//!
//! Primitives ([`Primitive`]) describe the shape of hardware data. Qualified
//! objects ([`ObjectDecl`], stored in an [`ObjectDb`]) wrap a primitive with
//! ownership and access semantics: signals, variables, temporaries, ports
//! and generics. A qualified object may be a *view* of another one through
//! a chain of [`RefSpec`] descriptors.
//!
//! The typing rules used by every later stage live here too: which source
//! may be assigned to which target ([`AssignableType`]) and what an operator
//! produces ([`ops`]).

#![warn(missing_docs)]

pub mod assign;
pub mod context;
pub mod enums;
pub mod object;
pub mod operand;
pub mod ops;
pub mod primitive;
pub mod value;

pub use assign::{AssignMode, AssignableType};
pub use context::{ContextKind, Sensitivity};
pub use enums::{EnumDb, EnumId, EnumType};
pub use object::{Direction, ObjectDb, ObjectDecl, ObjectId, Origin, QualifierKind, RefSpec};
pub use operand::{ArgType, EventKind, InlinePart, Operand};
pub use ops::{
    binop_type, check_boolean_context, check_compare, fold_binop, fold_compare, fold_unary,
    unary_type, BinOp, CompareOp, UnaryOp,
};
pub use primitive::{Order, Primitive, VecFamily};
pub use value::ConstValue;
