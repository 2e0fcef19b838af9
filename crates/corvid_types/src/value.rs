//! Compile-time constant values.

use crate::enums::EnumId;
use crate::primitive::{Primitive, VecFamily};
use corvid_common::{Logic, LogicVec};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A constant that may appear as an operand, a default or a case choice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstValue {
    /// A single logic value.
    Bit(Logic),
    /// A boolean.
    Bool(bool),
    /// An untyped integer; adopts the type of the other operand.
    Int(i64),
    /// A typed vector literal.
    Vector {
        /// Bit values, LSB first.
        bits: LogicVec,
        /// Vector flavor.
        family: VecFamily,
    },
    /// All zero, adapts to any bit-level target.
    Null,
    /// All one, adapts to any bit-level target.
    Full,
    /// An enumeration member.
    Enum {
        /// The enum type.
        ty: EnumId,
        /// Member index.
        index: u32,
    },
    /// A string; only valid for generics and messages.
    Str(String),
    /// One value per array element.
    Array(Vec<ConstValue>),
}

impl ConstValue {
    /// `'0'` or `'1'`.
    pub fn bit(value: bool) -> Self {
        ConstValue::Bit(Logic::from_bool(value))
    }

    /// An unsigned literal of the given width.
    pub fn unsigned(value: u64, width: u32) -> Self {
        ConstValue::Vector {
            bits: LogicVec::from_u64(value, width),
            family: VecFamily::Unsigned,
        }
    }

    /// A signed literal of the given width.
    pub fn signed(value: i64, width: u32) -> Self {
        ConstValue::Vector {
            bits: LogicVec::from_i64(value, width),
            family: VecFamily::Signed,
        }
    }

    /// A bit vector literal of the given width.
    pub fn bit_vector(value: u64, width: u32) -> Self {
        ConstValue::Vector {
            bits: LogicVec::from_u64(value, width),
            family: VecFamily::BitVector,
        }
    }

    /// The primitive type of this constant, if it has a fixed one.
    ///
    /// Integers, `Null` and `Full` adapt to their context and return `None`.
    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            ConstValue::Bit(_) => Some(Primitive::Bit),
            ConstValue::Bool(_) => Some(Primitive::Bool),
            ConstValue::Vector { bits, family } => Some(Primitive::vector(*family, bits.width())),
            ConstValue::Enum { ty, .. } => Some(Primitive::Enum(*ty)),
            ConstValue::Int(_)
            | ConstValue::Null
            | ConstValue::Full
            | ConstValue::Str(_)
            | ConstValue::Array(_) => None,
        }
    }

    /// Truth value when used as a condition, if statically known.
    pub fn truthiness(&self) -> Option<bool> {
        match self {
            ConstValue::Bit(l) => l.as_bool(),
            ConstValue::Bool(b) => Some(*b),
            ConstValue::Int(i) => Some(*i != 0),
            ConstValue::Vector { bits, .. } => {
                if bits.iter().any(|b| b == Logic::High) {
                    Some(true)
                } else if bits.is_definite() {
                    Some(false)
                } else {
                    None
                }
            }
            ConstValue::Null => Some(false),
            ConstValue::Full => Some(true),
            ConstValue::Str(s) => Some(!s.is_empty()),
            ConstValue::Array(items) => Some(!items.is_empty()),
            ConstValue::Enum { .. } => None,
        }
    }

    /// Integer interpretation of numeric constants.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConstValue::Int(i) => Some(*i),
            ConstValue::Bool(b) => Some(*b as i64),
            ConstValue::Bit(l) => l.as_bool().map(|b| b as i64),
            ConstValue::Vector { bits, family } => match family {
                VecFamily::Signed => bits.to_i64(),
                _ => bits.to_u64().and_then(|v| i64::try_from(v).ok()),
            },
            _ => None,
        }
    }

    /// Converts a constant into the bit pattern of a vector of `width` bits.
    pub fn to_bits(&self, width: u32) -> Option<LogicVec> {
        match self {
            ConstValue::Null => Some(LogicVec::all_zero(width)),
            ConstValue::Full => Some(LogicVec::all_one(width)),
            ConstValue::Int(i) => Some(LogicVec::from_i64(*i, width)),
            ConstValue::Bit(l) => Some(LogicVec::filled(1, *l)).filter(|_| width == 1),
            ConstValue::Bool(b) => Some(LogicVec::filled(1, Logic::from_bool(*b))).filter(|_| width == 1),
            ConstValue::Vector { bits, .. } => Some(bits.clone()).filter(|b| b.width() == width),
            _ => None,
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Bit(l) => write!(f, "'{l}'"),
            ConstValue::Bool(b) => write!(f, "{b}"),
            ConstValue::Int(i) => write!(f, "{i}"),
            ConstValue::Vector { bits, .. } => write!(f, "\"{bits}\""),
            ConstValue::Null => write!(f, "Null"),
            ConstValue::Full => write!(f, "Full"),
            ConstValue::Enum { index, .. } => write!(f, "enum#{index}"),
            ConstValue::Str(s) => write!(f, "{s:?}"),
            ConstValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_types() {
        assert_eq!(ConstValue::unsigned(3, 4).primitive(), Some(Primitive::unsigned(4)));
        assert_eq!(ConstValue::bit(true).primitive(), Some(Primitive::Bit));
        assert_eq!(ConstValue::Int(5).primitive(), None);
        assert_eq!(ConstValue::Null.primitive(), None);
    }

    #[test]
    fn truthiness() {
        assert_eq!(ConstValue::bit(true).truthiness(), Some(true));
        assert_eq!(ConstValue::Bit(Logic::Unknown).truthiness(), None);
        assert_eq!(ConstValue::unsigned(0, 4).truthiness(), Some(false));
        assert_eq!(ConstValue::unsigned(2, 4).truthiness(), Some(true));
        assert_eq!(ConstValue::Full.truthiness(), Some(true));
    }

    #[test]
    fn integer_views() {
        assert_eq!(ConstValue::signed(-3, 4).as_int(), Some(-3));
        assert_eq!(ConstValue::unsigned(9, 4).as_int(), Some(9));
        assert_eq!(ConstValue::Full.to_bits(3).map(|b| b.to_string()), Some("111".into()));
        assert_eq!(ConstValue::Int(2).to_bits(3).map(|b| b.to_string()), Some("010".into()));
        assert_eq!(ConstValue::unsigned(1, 2).to_bits(3), None);
    }

    #[test]
    fn display() {
        assert_eq!(ConstValue::bit(false).to_string(), "'0'");
        assert_eq!(ConstValue::unsigned(5, 3).to_string(), "\"101\"");
    }
}
