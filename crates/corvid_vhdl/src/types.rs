//! VHDL spellings of types, literals and conversions.

use corvid_diagnostics::{CompileError, CompileResult};
use corvid_types::{ConstValue, EnumId, Order, Primitive, VecFamily};
use std::collections::HashMap;

/// A rendered VHDL expression together with its type.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Expr {
    pub text: String,
    pub ty: Primitive,
    atomic: bool,
}

impl Expr {
    /// An expression that never needs parentheses: names, calls, literals.
    pub fn atom(text: impl Into<String>, ty: Primitive) -> Self {
        Self {
            text: text.into(),
            ty,
            atomic: true,
        }
    }

    /// An operator expression.
    pub fn compound(text: impl Into<String>, ty: Primitive) -> Self {
        Self {
            text: text.into(),
            ty,
            atomic: false,
        }
    }

    /// The text, parenthesized unless atomic.
    pub fn wrapped(&self) -> String {
        if self.atomic {
            self.text.clone()
        } else {
            format!("({})", self.text)
        }
    }

    fn retyped(self, ty: &Primitive) -> Self {
        Self {
            ty: ty.clone(),
            ..self
        }
    }
}

#[derive(Debug, Clone)]
struct EnumNames {
    ty: String,
    members: Vec<String>,
}

/// Names of the enum and array types declared by one architecture.
#[derive(Debug, Default)]
pub(crate) struct TypeNames {
    enums: HashMap<EnumId, EnumNames>,
    arrays: Vec<(Primitive, String)>,
}

impl TypeNames {
    pub fn declare_enum(&mut self, id: EnumId, ty: String, members: Vec<String>) {
        self.enums.insert(id, EnumNames { ty, members });
    }

    pub fn declare_array(&mut self, ty: Primitive, name: String) {
        self.arrays.push((ty, name));
    }

    pub fn has_enum(&self, id: EnumId) -> bool {
        self.enums.contains_key(&id)
    }

    pub fn has_array(&self, ty: &Primitive) -> bool {
        self.arrays.iter().any(|(t, _)| t == ty)
    }

    pub fn enum_members(&self, id: EnumId) -> CompileResult<&[String]> {
        self.enums
            .get(&id)
            .map(|e| e.members.as_slice())
            .ok_or_else(|| undeclared(&Primitive::Enum(id)))
    }

    fn enum_type(&self, id: EnumId) -> CompileResult<&str> {
        self.enums
            .get(&id)
            .map(|e| e.ty.as_str())
            .ok_or_else(|| undeclared(&Primitive::Enum(id)))
    }

    fn array_type(&self, ty: &Primitive) -> CompileResult<&str> {
        self.arrays
            .iter()
            .find(|(t, _)| t == ty)
            .map(|(_, name)| name.as_str())
            .ok_or_else(|| undeclared(ty))
    }
}

fn undeclared(ty: &Primitive) -> CompileError {
    CompileError::sanity(format!("{ty} has no VHDL type declaration"))
}

fn range(width: u32, order: Order) -> String {
    match order {
        Order::Downto => format!("({} downto 0)", width.saturating_sub(1)),
        Order::Upto => format!("(0 to {})", width.saturating_sub(1)),
    }
}

/// The VHDL subtype indication of `ty`.
pub(crate) fn type_name(ty: &Primitive, names: &TypeNames) -> CompileResult<String> {
    Ok(match ty {
        Primitive::Bit => "std_logic".to_string(),
        Primitive::Bool => "boolean".to_string(),
        Primitive::BitVector { width, order } => format!("std_logic_vector{}", range(*width, *order)),
        Primitive::Unsigned { width } => format!("unsigned{}", range(*width, Order::Downto)),
        Primitive::Signed { width } => format!("signed{}", range(*width, Order::Downto)),
        Primitive::Integer { min, max } => match (min, max) {
            (Some(lo), Some(hi)) => format!("integer range {lo} to {hi}"),
            _ => "integer".to_string(),
        },
        Primitive::Array { .. } => names.array_type(ty)?.to_string(),
        Primitive::Enum(id) => names.enum_type(*id)?.to_string(),
    })
}

/// Declaration of an array type named `name`.
pub(crate) fn array_declaration(name: &str, ty: &Primitive, names: &TypeNames) -> CompileResult<String> {
    match ty {
        Primitive::Array { elem, count } => Ok(format!(
            "type {name} is array (0 to {}) of {};",
            count.saturating_sub(1),
            type_name(elem, names)?
        )),
        other => Err(CompileError::sanity(format!("{other} is not an array type"))),
    }
}

/// An integer literal; negative values are parenthesized.
pub(crate) fn int_literal(value: i64) -> Expr {
    if value < 0 {
        Expr::atom(format!("({value})"), Primitive::integer())
    } else {
        Expr::atom(value.to_string(), Primitive::integer())
    }
}

/// A quoted VHDL string with inner quotes doubled.
pub(crate) fn string_literal(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

fn qualifier(family: VecFamily) -> &'static str {
    match family {
        VecFamily::BitVector => "std_logic_vector",
        VecFamily::Unsigned => "unsigned",
        VecFamily::Signed => "signed",
    }
}

fn mismatch(value: &ConstValue, ty: &Primitive) -> CompileError {
    CompileError::type_error(format!("constant {value} cannot be written as {ty}"))
}

/// `value` written as a literal of type `ty`.
pub(crate) fn literal(value: &ConstValue, ty: &Primitive, names: &TypeNames) -> CompileResult<Expr> {
    match ty {
        Primitive::Bit => {
            let bit = match value {
                ConstValue::Bit(l) => l.to_char(),
                other => match other.truthiness() {
                    Some(true) => '1',
                    Some(false) => '0',
                    None => return Err(mismatch(value, ty)),
                },
            };
            Ok(Expr::atom(format!("'{bit}'"), Primitive::Bit))
        }
        Primitive::Bool => match value.truthiness() {
            Some(b) => Ok(Expr::atom(b.to_string(), Primitive::Bool)),
            None => Err(mismatch(value, ty)),
        },
        Primitive::BitVector { width, .. } | Primitive::Unsigned { width } | Primitive::Signed { width } => {
            if let Some(bits) = value.to_bits(*width) {
                return Ok(Expr::atom(format!("\"{bits}\""), ty.clone()));
            }
            match value {
                ConstValue::Vector { bits, family } => {
                    let own = Expr::atom(
                        format!("{}'(\"{bits}\")", qualifier(*family)),
                        Primitive::vector(*family, bits.width()),
                    );
                    convert(own, ty)
                }
                _ => Err(mismatch(value, ty)),
            }
        }
        Primitive::Integer { .. } => match value {
            ConstValue::Null => Ok(int_literal(0)),
            other => other.as_int().map(int_literal).ok_or_else(|| mismatch(value, ty)),
        },
        Primitive::Enum(id) => match value {
            ConstValue::Enum { ty: of, index } if of == id => {
                let members = names.enum_members(*id)?;
                members
                    .get(*index as usize)
                    .map(|m| Expr::atom(m.clone(), ty.clone()))
                    .ok_or_else(|| CompileError::sanity(format!("enum member {index} out of range")))
            }
            _ => Err(mismatch(value, ty)),
        },
        Primitive::Array { elem, count } => match value {
            ConstValue::Null | ConstValue::Full => {
                let inner = literal(value, elem, names)?;
                Ok(Expr::atom(format!("(others => {})", inner.text), ty.clone()))
            }
            ConstValue::Array(items) if items.len() == *count as usize => {
                let parts = items
                    .iter()
                    .map(|item| literal(item, elem, names).map(|e| e.text))
                    .collect::<CompileResult<Vec<_>>>()?;
                let text = if parts.len() == 1 {
                    format!("(0 => {})", parts[0])
                } else {
                    format!("({})", parts.join(", "))
                };
                Ok(Expr::atom(text, ty.clone()))
            }
            _ => Err(mismatch(value, ty)),
        },
    }
}

/// Converts `expr` to type `to`, inserting the numeric_std conversion
/// functions VHDL requires.
pub(crate) fn convert(expr: Expr, to: &Primitive) -> CompileResult<Expr> {
    use Primitive as P;
    if expr.ty == *to {
        return Ok(expr);
    }
    let from = expr.ty.clone();
    let converted = match (&from, to) {
        (P::Bool, P::Bit) => Expr::atom(format!("cohdl_bool_to_std_logic({})", expr.text), P::Bit),
        (P::Bit, P::Bool) => Expr::compound(format!("{} = '1'", expr.wrapped()), P::Bool),
        (P::Unsigned { .. } | P::Signed { .. } | P::Integer { .. }, P::Bool) => {
            Expr::compound(format!("{} /= 0", expr.wrapped()), P::Bool)
        }
        (P::BitVector { width, .. }, P::Bool) => Expr::compound(
            format!("{} /= \"{}\"", expr.wrapped(), "0".repeat(*width as usize)),
            P::Bool,
        ),
        (P::BitVector { width: a, .. }, P::BitVector { width: b, .. }) if a == b => expr.retyped(to),
        (P::Unsigned { .. }, P::Unsigned { width }) | (P::Signed { .. }, P::Signed { width }) => {
            Expr::atom(format!("resize({}, {width})", expr.text), to.clone())
        }
        (P::Unsigned { width: a } | P::Signed { width: a }, P::BitVector { width: b, .. }) => {
            let family = from.family().unwrap_or(VecFamily::Unsigned);
            let sized = if a == b {
                expr
            } else {
                convert(expr, &P::vector(family, *b))?
            };
            Expr::atom(format!("std_logic_vector({})", sized.text), to.clone())
        }
        (P::BitVector { width, .. }, P::Unsigned { .. }) => {
            convert(Expr::atom(format!("unsigned({})", expr.text), P::unsigned(*width)), to)?
        }
        (P::BitVector { width, .. }, P::Signed { .. }) => {
            convert(Expr::atom(format!("signed({})", expr.text), P::signed(*width)), to)?
        }
        (P::Signed { width }, P::Unsigned { .. }) => convert(
            Expr::atom(format!("unsigned(std_logic_vector({}))", expr.text), P::unsigned(*width)),
            to,
        )?,
        (P::Unsigned { width }, P::Signed { .. }) => convert(
            Expr::atom(format!("signed(std_logic_vector({}))", expr.text), P::signed(*width)),
            to,
        )?,
        (P::Unsigned { .. } | P::Signed { .. }, P::Integer { .. }) => {
            Expr::atom(format!("to_integer({})", expr.text), to.clone())
        }
        (P::Integer { .. }, P::Unsigned { width }) => {
            Expr::atom(format!("to_unsigned({}, {width})", expr.text), to.clone())
        }
        (P::Integer { .. }, P::Signed { width }) => {
            Expr::atom(format!("to_signed({}, {width})", expr.text), to.clone())
        }
        (P::Integer { .. }, P::Integer { .. }) => expr.retyped(to),
        (from, to) => {
            return Err(CompileError::sanity(format!(
                "no VHDL conversion from {from} to {to}"
            )))
        }
    };
    Ok(converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_common::Logic;

    fn names() -> TypeNames {
        TypeNames::default()
    }

    #[test]
    fn type_spellings() {
        let names = names();
        assert_eq!(type_name(&Primitive::Bit, &names).unwrap(), "std_logic");
        assert_eq!(
            type_name(&Primitive::bit_vector(8), &names).unwrap(),
            "std_logic_vector(7 downto 0)"
        );
        assert_eq!(
            type_name(&Primitive::BitVector { width: 4, order: Order::Upto }, &names).unwrap(),
            "std_logic_vector(0 to 3)"
        );
        assert_eq!(type_name(&Primitive::signed(3), &names).unwrap(), "signed(2 downto 0)");
        assert_eq!(
            type_name(&Primitive::Integer { min: Some(0), max: Some(9) }, &names).unwrap(),
            "integer range 0 to 9"
        );
        assert!(type_name(&Primitive::Enum(EnumId::from_raw(0)), &names).is_err());
    }

    #[test]
    fn literals_follow_the_target_type() {
        let names = names();
        let lit = |v: ConstValue, ty: Primitive| literal(&v, &ty, &names).unwrap().text;
        assert_eq!(lit(ConstValue::Int(1), Primitive::unsigned(3)), "\"001\"");
        assert_eq!(lit(ConstValue::Null, Primitive::bit_vector(4)), "\"0000\"");
        assert_eq!(lit(ConstValue::Bit(Logic::High), Primitive::Bit), "'1'");
        assert_eq!(lit(ConstValue::Bool(false), Primitive::Bool), "false");
        assert_eq!(lit(ConstValue::Int(-2), Primitive::integer()), "(-2)");
        assert_eq!(
            lit(ConstValue::unsigned(1, 2), Primitive::unsigned(4)),
            "resize(unsigned'(\"01\"), 4)"
        );
        let array = Primitive::Array {
            elem: Box::new(Primitive::Bit),
            count: 1,
        };
        assert_eq!(lit(ConstValue::Array(vec![ConstValue::bit(true)]), array), "(0 => '1')");
    }

    #[test]
    fn array_literals() {
        let mut names = names();
        let ty = Primitive::Array {
            elem: Box::new(Primitive::unsigned(2)),
            count: 2,
        };
        names.declare_array(ty.clone(), "array_type".into());
        assert_eq!(literal(&ConstValue::Null, &ty, &names).unwrap().text, "(others => \"00\")");
        let items = ConstValue::Array(vec![ConstValue::Int(1), ConstValue::Int(2)]);
        assert_eq!(literal(&items, &ty, &names).unwrap().text, "(\"01\", \"10\")");
        assert_eq!(
            array_declaration("array_type", &ty, &names).unwrap(),
            "type array_type is array (0 to 1) of unsigned(1 downto 0);"
        );
    }

    #[test]
    fn conversions() {
        let x = Expr::atom("x", Primitive::unsigned(4));
        assert_eq!(convert(x.clone(), &Primitive::unsigned(8)).unwrap().text, "resize(x, 8)");
        assert_eq!(
            convert(x.clone(), &Primitive::bit_vector(4)).unwrap().text,
            "std_logic_vector(x)"
        );
        assert_eq!(convert(x.clone(), &Primitive::integer()).unwrap().text, "to_integer(x)");
        assert_eq!(convert(x.clone(), &Primitive::Bool).unwrap().text, "x /= 0");
        assert_eq!(
            convert(x, &Primitive::signed(6)).unwrap().text,
            "resize(signed(std_logic_vector(x)), 6)"
        );
        let b = Expr::compound("a = b", Primitive::Bool);
        assert_eq!(
            convert(b, &Primitive::Bit).unwrap().text,
            "cohdl_bool_to_std_logic(a = b)"
        );
        let v = Expr::atom("v", Primitive::bit_vector(2));
        assert_eq!(convert(v.clone(), &Primitive::Bool).unwrap().text, "v /= \"00\"");
        assert_eq!(convert(v, &Primitive::unsigned(2)).unwrap().text, "unsigned(v)");
        assert!(convert(Expr::atom("b", Primitive::Bool), &Primitive::unsigned(2)).is_err());
    }
}
