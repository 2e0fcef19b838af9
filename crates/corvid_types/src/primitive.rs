//! Primitive hardware types.

use crate::enums::EnumId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index direction of a vector.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum Order {
    /// `(w-1 downto 0)`.
    #[default]
    Downto,
    /// `(0 to w-1)`.
    Upto,
}

/// The three vector flavors. They share a bit layout and differ in the
/// arithmetic they allow.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum VecFamily {
    /// Plain `std_logic_vector`: no arithmetic.
    BitVector,
    /// `unsigned`.
    Unsigned,
    /// `signed`, two's complement.
    Signed,
}

/// A primitive hardware type.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Primitive {
    /// A single `std_logic`.
    Bit,
    /// The result of comparisons and boolean casts (VHDL `boolean`).
    Bool,
    /// An ordered sequence of bits.
    BitVector {
        /// Number of bits.
        width: u32,
        /// Index direction.
        order: Order,
    },
    /// Unsigned integer arithmetic over `width` bits.
    Unsigned {
        /// Number of bits.
        width: u32,
    },
    /// Two's complement arithmetic over `width` bits.
    Signed {
        /// Number of bits.
        width: u32,
    },
    /// An integer with an optional range.
    Integer {
        /// Inclusive lower bound.
        min: Option<i64>,
        /// Inclusive upper bound.
        max: Option<i64>,
    },
    /// A fixed-length homogeneous array.
    Array {
        /// Element type.
        elem: Box<Primitive>,
        /// Number of elements.
        count: u32,
    },
    /// An enumeration registered in the [`EnumDb`](crate::EnumDb).
    Enum(EnumId),
}

impl Primitive {
    /// `BitVector[width]` with the default `downto` order.
    pub fn bit_vector(width: u32) -> Self {
        Primitive::BitVector {
            width,
            order: Order::Downto,
        }
    }

    /// `Unsigned[width]`.
    pub fn unsigned(width: u32) -> Self {
        Primitive::Unsigned { width }
    }

    /// `Signed[width]`.
    pub fn signed(width: u32) -> Self {
        Primitive::Signed { width }
    }

    /// An unconstrained integer.
    pub fn integer() -> Self {
        Primitive::Integer {
            min: None,
            max: None,
        }
    }

    /// Builds a vector of the given family.
    pub fn vector(family: VecFamily, width: u32) -> Self {
        match family {
            VecFamily::BitVector => Primitive::bit_vector(width),
            VecFamily::Unsigned => Primitive::unsigned(width),
            VecFamily::Signed => Primitive::signed(width),
        }
    }

    /// Bit width of bit-level types (`Bit` counts as one).
    pub fn width(&self) -> Option<u32> {
        match self {
            Primitive::Bit => Some(1),
            Primitive::BitVector { width, .. }
            | Primitive::Unsigned { width }
            | Primitive::Signed { width } => Some(*width),
            _ => None,
        }
    }

    /// The vector family, for vector types.
    pub fn family(&self) -> Option<VecFamily> {
        match self {
            Primitive::BitVector { .. } => Some(VecFamily::BitVector),
            Primitive::Unsigned { .. } => Some(VecFamily::Unsigned),
            Primitive::Signed { .. } => Some(VecFamily::Signed),
            _ => None,
        }
    }

    /// Returns `true` for `BitVector`, `Unsigned` and `Signed`.
    pub fn is_vector(&self) -> bool {
        self.family().is_some()
    }

    /// Returns `true` for types with integer arithmetic.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Primitive::Unsigned { .. } | Primitive::Signed { .. } | Primitive::Integer { .. }
        )
    }

    /// Returns `true` for types that may be used as a condition.
    pub fn is_boolean_castable(&self) -> bool {
        matches!(self, Primitive::Bit | Primitive::Bool) || self.is_vector()
    }

    /// The element type selected by a single index.
    pub fn element(&self) -> Option<Primitive> {
        match self {
            Primitive::Array { elem, .. } => Some((**elem).clone()),
            p if p.is_vector() => Some(Primitive::Bit),
            _ => None,
        }
    }

    /// Number of addressable elements (bits for vectors, entries for arrays).
    pub fn element_count(&self) -> Option<u32> {
        match self {
            Primitive::Array { count, .. } => Some(*count),
            p => p.width().filter(|_| p.is_vector()),
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Bit => write!(f, "Bit"),
            Primitive::Bool => write!(f, "bool"),
            Primitive::BitVector { width, order } => match order {
                Order::Downto => write!(f, "BitVector[{width}]"),
                Order::Upto => write!(f, "BitVector[0:{width}]"),
            },
            Primitive::Unsigned { width } => write!(f, "Unsigned[{width}]"),
            Primitive::Signed { width } => write!(f, "Signed[{width}]"),
            Primitive::Integer { min, max } => match (min, max) {
                (Some(lo), Some(hi)) => write!(f, "Integer[{lo}..{hi}]"),
                _ => write!(f, "Integer"),
            },
            Primitive::Array { elem, count } => write!(f, "Array[{elem}, {count}]"),
            Primitive::Enum(id) => write!(f, "Enum#{}", id.as_raw()),
        }
    }
}
