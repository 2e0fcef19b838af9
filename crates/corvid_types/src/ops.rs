//! Operator result typing and constant folding.

use crate::operand::ArgType;
use crate::primitive::{Primitive, VecFamily};
use crate::value::ConstValue;
use corvid_diagnostics::{CompileError, CompileResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `//`
    Div,
    /// `%`
    Mod,
    /// `&`
    And,
    /// `|`
    Or,
    /// `^`
    Xor,
    /// `@`: concatenation, left operand in the high bits.
    Concat,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
}

impl BinOp {
    /// The host operator symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "//",
            BinOp::Mod => "%",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::Concat => "@",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }

    fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod
        )
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `~`: bitwise inversion.
    Inv,
    /// `-`
    Neg,
    /// `abs()`
    Abs,
    /// `not`: boolean negation.
    Not,
    /// `bool()`
    Bool,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// Applies the comparison to two ordered values.
    pub fn apply<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
        }
    }
}

fn mixed_sign() -> CompileError {
    CompileError::type_error("cannot mix Signed and Unsigned operands without an explicit cast")
}

fn unsupported(op: impl fmt::Display, lhs: &ArgType, rhs: &ArgType) -> CompileError {
    CompileError::type_error(format!(
        "operator `{op}` is not defined for {lhs} and {rhs}"
    ))
}

/// Result type of `lhs op rhs`.
pub fn binop_type(op: BinOp, lhs: &ArgType, rhs: &ArgType) -> CompileResult<Primitive> {
    use ArgType as A;
    use Primitive as P;
    if op.is_arithmetic() {
        return match (lhs, rhs) {
            (A::Typed(P::Unsigned { width: a }), A::Typed(P::Unsigned { width: b })) => {
                Ok(P::unsigned(arith_width(op, *a, *b)))
            }
            (A::Typed(P::Signed { width: a }), A::Typed(P::Signed { width: b })) => {
                Ok(P::signed(arith_width(op, *a, *b)))
            }
            (A::Typed(P::Unsigned { width: a }), A::IntLiteral(_)) => {
                Ok(P::unsigned(arith_width(op, *a, *a)))
            }
            (A::IntLiteral(_), A::Typed(P::Unsigned { width: b })) => {
                Ok(P::unsigned(arith_width(op, *b, *b)))
            }
            (A::Typed(P::Signed { width: a }), A::IntLiteral(_)) => {
                Ok(P::signed(arith_width(op, *a, *a)))
            }
            (A::IntLiteral(_), A::Typed(P::Signed { width: b })) => {
                Ok(P::signed(arith_width(op, *b, *b)))
            }
            (A::Typed(P::Integer { .. }), A::Typed(P::Integer { .. }) | A::IntLiteral(_))
            | (A::IntLiteral(_), A::Typed(P::Integer { .. })) => Ok(P::integer()),
            (A::Typed(P::Unsigned { .. }), A::Typed(P::Signed { .. }))
            | (A::Typed(P::Signed { .. }), A::Typed(P::Unsigned { .. })) => Err(mixed_sign()),
            (A::Typed(P::BitVector { .. }), _) | (_, A::Typed(P::BitVector { .. })) => {
                Err(CompileError::type_error(format!(
                    "arithmetic `{op}` on a BitVector requires `.unsigned` or `.signed`"
                )))
            }
            _ => Err(unsupported(op, lhs, rhs)),
        };
    }
    match op {
        BinOp::And | BinOp::Or | BinOp::Xor => match (lhs, rhs) {
            (A::Typed(a), A::Typed(b)) if a == b && (a.is_vector() || matches!(a, P::Bit | P::Bool)) => {
                Ok(a.clone())
            }
            (A::Typed(P::Bit), A::Typed(P::Bool)) | (A::Typed(P::Bool), A::Typed(P::Bit)) => {
                Ok(P::Bit)
            }
            (A::Typed(a), A::Typed(b)) if a.is_vector() && b.is_vector() => {
                if a.width() != b.width() {
                    Err(CompileError::type_error(format!(
                        "width mismatch in `{op}`: {a} and {b}"
                    )))
                } else if a.family() == Some(VecFamily::BitVector) {
                    Ok(b.clone())
                } else if b.family() == Some(VecFamily::BitVector) {
                    Ok(a.clone())
                } else {
                    Err(mixed_sign())
                }
            }
            (A::Typed(a), A::Adaptive) | (A::Adaptive, A::Typed(a))
                if a.is_vector() || *a == P::Bit =>
            {
                Ok(a.clone())
            }
            (A::Typed(a), A::IntLiteral(_)) | (A::IntLiteral(_), A::Typed(a))
                if a.is_numeric() || *a == P::Bit =>
            {
                Ok(a.clone())
            }
            _ => Err(unsupported(op, lhs, rhs)),
        },
        BinOp::Concat => {
            let width = |t: &ArgType| match t {
                A::Typed(p) if p.is_vector() || *p == P::Bit => p.width(),
                _ => None,
            };
            match (width(lhs), width(rhs)) {
                (Some(a), Some(b)) => Ok(P::bit_vector(a + b)),
                _ => Err(unsupported(op, lhs, rhs)),
            }
        }
        BinOp::Shl | BinOp::Shr => match (lhs, rhs) {
            (A::Typed(a), A::IntLiteral(n)) if a.is_vector() => {
                if *n < 0 {
                    Err(CompileError::type_error("negative shift amount"))
                } else {
                    Ok(a.clone())
                }
            }
            (A::Typed(a), A::Typed(P::Unsigned { .. } | P::Integer { .. })) if a.is_vector() => {
                Ok(a.clone())
            }
            _ => Err(unsupported(op, lhs, rhs)),
        },
        _ => Err(unsupported(op, lhs, rhs)),
    }
}

fn arith_width(op: BinOp, a: u32, b: u32) -> u32 {
    match op {
        BinOp::Mul => a + b,
        BinOp::Div => a,
        BinOp::Mod => b,
        _ => a.max(b),
    }
}

/// Result type of a unary operator.
pub fn unary_type(op: UnaryOp, arg: &ArgType) -> CompileResult<Primitive> {
    use Primitive as P;
    let ty = match arg {
        ArgType::Typed(p) => p,
        other => {
            return Err(CompileError::type_error(format!(
                "unary operator {op:?} is not defined for {other}"
            )))
        }
    };
    match op {
        UnaryOp::Inv if ty.is_vector() || *ty == P::Bit || *ty == P::Bool => Ok(ty.clone()),
        UnaryOp::Neg | UnaryOp::Abs
            if matches!(ty, P::Signed { .. } | P::Integer { .. }) =>
        {
            Ok(ty.clone())
        }
        UnaryOp::Neg | UnaryOp::Abs if matches!(ty, P::Unsigned { .. }) => Err(
            CompileError::type_error(format!("{op:?} is not defined for Unsigned; cast to Signed first")),
        ),
        UnaryOp::Not | UnaryOp::Bool => {
            check_boolean_context(ty)?;
            Ok(P::Bool)
        }
        _ => Err(CompileError::type_error(format!(
            "unary operator {op:?} is not defined for {ty}"
        ))),
    }
}

/// Checks that a value of type `ty` may be used as a condition.
pub fn check_boolean_context(ty: &Primitive) -> CompileResult<()> {
    if ty.is_boolean_castable() || matches!(ty, Primitive::Integer { .. }) {
        Ok(())
    } else {
        Err(CompileError::type_error(format!(
            "{ty} cannot be used in a boolean context"
        )))
    }
}

/// Checks operand compatibility of a comparison. The result is always `Bool`.
pub fn check_compare(op: CompareOp, lhs: &ArgType, rhs: &ArgType) -> CompileResult<()> {
    use ArgType as A;
    use Primitive as P;
    let ordered = !matches!(op, CompareOp::Eq | CompareOp::Ne);
    match (lhs, rhs) {
        (A::Typed(a), A::Typed(b)) => {
            match (a.family(), b.family()) {
                (Some(VecFamily::BitVector), Some(VecFamily::Unsigned | VecFamily::Signed))
                | (Some(VecFamily::Unsigned | VecFamily::Signed), Some(VecFamily::BitVector)) => {
                    return Err(CompileError::type_error(format!(
                        "cannot compare {a} with {b} without an explicit cast"
                    )))
                }
                (Some(VecFamily::Unsigned), Some(VecFamily::Signed))
                | (Some(VecFamily::Signed), Some(VecFamily::Unsigned)) => return Err(mixed_sign()),
                _ => {}
            }
            let ok = if ordered {
                a.is_numeric() && b.is_numeric()
            } else {
                a == b
                    || (a.is_numeric() && b.is_numeric())
                    || (a.family() == Some(VecFamily::BitVector) && a.width() == b.width())
                    || matches!((a, b), (P::Bit | P::Bool, P::Bit | P::Bool))
            };
            if ok {
                Ok(())
            } else {
                Err(unsupported(format!("{op:?}"), lhs, rhs))
            }
        }
        (A::Typed(a), A::IntLiteral(_)) | (A::IntLiteral(_), A::Typed(a))
            if a.is_numeric() || (!ordered && *a == P::Bit) =>
        {
            Ok(())
        }
        (A::Typed(a), A::Adaptive) | (A::Adaptive, A::Typed(a)) if !ordered && (a.is_vector() || *a == P::Bit) => {
            Ok(())
        }
        _ => Err(unsupported(format!("{op:?}"), lhs, rhs)),
    }
}

/// Folds a binary operator over two constants, when the result is known.
pub fn fold_binop(op: BinOp, lhs: &ConstValue, rhs: &ConstValue) -> Option<ConstValue> {
    match (lhs, rhs) {
        (ConstValue::Bit(a), ConstValue::Bit(b)) => match op {
            BinOp::And => Some(ConstValue::Bit(*a & *b)),
            BinOp::Or => Some(ConstValue::Bit(*a | *b)),
            BinOp::Xor => Some(ConstValue::Bit(*a ^ *b)),
            _ => None,
        },
        (ConstValue::Bool(a), ConstValue::Bool(b)) => match op {
            BinOp::And => Some(ConstValue::Bool(*a && *b)),
            BinOp::Or => Some(ConstValue::Bool(*a || *b)),
            BinOp::Xor => Some(ConstValue::Bool(*a != *b)),
            _ => None,
        },
        (ConstValue::Int(a), ConstValue::Int(b)) => fold_int(op, *a, *b).map(ConstValue::Int),
        (ConstValue::Vector { bits: a, .. }, ConstValue::Vector { bits: b, .. })
            if op == BinOp::Concat =>
        {
            Some(ConstValue::Vector {
                bits: a.concat(b),
                family: VecFamily::BitVector,
            })
        }
        _ => None,
    }
}

fn fold_int(op: BinOp, a: i64, b: i64) -> Option<i64> {
    match op {
        BinOp::Add => a.checked_add(b),
        BinOp::Sub => a.checked_sub(b),
        BinOp::Mul => a.checked_mul(b),
        BinOp::Div => (b != 0).then(|| a.div_euclid(b)),
        BinOp::Mod => (b != 0).then(|| a.rem_euclid(b)),
        BinOp::And => Some(a & b),
        BinOp::Or => Some(a | b),
        BinOp::Xor => Some(a ^ b),
        BinOp::Shl => u32::try_from(b).ok().and_then(|s| a.checked_shl(s)),
        BinOp::Shr => u32::try_from(b).ok().and_then(|s| a.checked_shr(s)),
        BinOp::Concat => None,
    }
}

/// Folds a unary operator over a constant, when the result is known.
pub fn fold_unary(op: UnaryOp, arg: &ConstValue) -> Option<ConstValue> {
    match (op, arg) {
        (UnaryOp::Not, c) => c.truthiness().map(|b| ConstValue::Bool(!b)),
        (UnaryOp::Bool, c) => c.truthiness().map(ConstValue::Bool),
        (UnaryOp::Inv, ConstValue::Bit(l)) => Some(ConstValue::Bit(!*l)),
        (UnaryOp::Inv, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
        (UnaryOp::Inv, ConstValue::Null) => Some(ConstValue::Full),
        (UnaryOp::Inv, ConstValue::Full) => Some(ConstValue::Null),
        (UnaryOp::Inv, ConstValue::Vector { bits, family }) => Some(ConstValue::Vector {
            bits: corvid_common::LogicVec::from_bits(bits.iter().map(|b| !b).collect()),
            family: *family,
        }),
        (UnaryOp::Neg, ConstValue::Int(i)) => i.checked_neg().map(ConstValue::Int),
        (UnaryOp::Abs, ConstValue::Int(i)) => i.checked_abs().map(ConstValue::Int),
        _ => None,
    }
}

/// Folds a comparison over two constants, when the result is known.
pub fn fold_compare(op: CompareOp, lhs: &ConstValue, rhs: &ConstValue) -> Option<bool> {
    match (lhs, rhs) {
        (ConstValue::Enum { ty: a, index: x }, ConstValue::Enum { ty: b, index: y }) if a == b => {
            matches!(op, CompareOp::Eq | CompareOp::Ne).then(|| op.apply(x, y))
        }
        (ConstValue::Bit(a), ConstValue::Bit(b)) => {
            let (a, b) = (a.as_bool()?, b.as_bool()?);
            matches!(op, CompareOp::Eq | CompareOp::Ne).then(|| op.apply(a, b))
        }
        _ => {
            let (a, b) = (lhs.as_int()?, rhs.as_int()?);
            Some(op.apply(a, b))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_diagnostics::ErrorKind;

    fn t(p: Primitive) -> ArgType {
        ArgType::Typed(p)
    }

    #[test]
    fn add_takes_max_width() {
        let ty = binop_type(
            BinOp::Add,
            &t(Primitive::unsigned(4)),
            &t(Primitive::unsigned(8)),
        )
        .unwrap();
        assert_eq!(ty, Primitive::unsigned(8));
        let ty = binop_type(BinOp::Sub, &t(Primitive::signed(6)), &ArgType::IntLiteral(1)).unwrap();
        assert_eq!(ty, Primitive::signed(6));
    }

    #[test]
    fn mul_sums_widths() {
        let ty = binop_type(
            BinOp::Mul,
            &t(Primitive::unsigned(4)),
            &t(Primitive::unsigned(3)),
        )
        .unwrap();
        assert_eq!(ty, Primitive::unsigned(7));
    }

    #[test]
    fn mixing_signedness_fails() {
        let err = binop_type(
            BinOp::Add,
            &t(Primitive::unsigned(4)),
            &t(Primitive::signed(4)),
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Type);
    }

    #[test]
    fn bitvector_arithmetic_fails() {
        assert!(binop_type(
            BinOp::Add,
            &t(Primitive::bit_vector(4)),
            &ArgType::IntLiteral(1)
        )
        .is_err());
    }

    #[test]
    fn concat_builds_bitvector() {
        let ty = binop_type(
            BinOp::Concat,
            &t(Primitive::Bit),
            &t(Primitive::unsigned(3)),
        )
        .unwrap();
        assert_eq!(ty, Primitive::bit_vector(4));
    }

    #[test]
    fn logic_ops_need_same_width() {
        assert!(binop_type(
            BinOp::And,
            &t(Primitive::bit_vector(4)),
            &t(Primitive::bit_vector(3))
        )
        .is_err());
        assert_eq!(
            binop_type(BinOp::Xor, &t(Primitive::Bit), &t(Primitive::Bit)).unwrap(),
            Primitive::Bit
        );
    }

    #[test]
    fn compare_rules() {
        assert!(check_compare(
            CompareOp::Eq,
            &t(Primitive::unsigned(3)),
            &ArgType::IntLiteral(2)
        )
        .is_ok());
        assert!(check_compare(
            CompareOp::Lt,
            &t(Primitive::bit_vector(3)),
            &t(Primitive::bit_vector(3))
        )
        .is_err());
        let err = check_compare(
            CompareOp::Eq,
            &t(Primitive::bit_vector(4)),
            &t(Primitive::signed(4)),
        )
        .unwrap_err();
        assert!(err.message.contains("explicit cast"));
    }

    #[test]
    fn unary_rules() {
        assert_eq!(
            unary_type(UnaryOp::Not, &t(Primitive::Bit)).unwrap(),
            Primitive::Bool
        );
        assert!(unary_type(UnaryOp::Neg, &t(Primitive::unsigned(4))).is_err());
        assert!(unary_type(UnaryOp::Bool, &t(Primitive::Array {
            elem: Box::new(Primitive::Bit),
            count: 2
        }))
        .is_err());
    }

    #[test]
    fn folding() {
        assert_eq!(
            fold_binop(BinOp::Add, &ConstValue::Int(2), &ConstValue::Int(3)),
            Some(ConstValue::Int(5))
        );
        assert_eq!(
            fold_binop(BinOp::Div, &ConstValue::Int(1), &ConstValue::Int(0)),
            None
        );
        assert_eq!(
            fold_unary(UnaryOp::Inv, &ConstValue::bit(true)),
            Some(ConstValue::bit(false))
        );
        assert_eq!(
            fold_compare(CompareOp::Lt, &ConstValue::Int(1), &ConstValue::unsigned(3, 4)),
            Some(true)
        );
    }
}
