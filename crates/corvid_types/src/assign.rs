//! Assignment modes and assignability rules.

use crate::object::{Direction, QualifierKind};
use crate::operand::ArgType;
use crate::primitive::Primitive;
use corvid_diagnostics::{CompileError, CompileResult};
use serde::{Deserialize, Serialize};

/// How a value is written into its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignMode {
    /// Non-blocking signal assignment (`<<=`, `.next`).
    Next,
    /// One-cycle signal driver that falls back to its default (`^=`, `.push`).
    Push,
    /// Immediate variable assignment (`@=`, `.value`).
    Value,
    /// Chosen from the target kind.
    Auto,
    /// Internal: the single write of a temporary.
    Temp,
}

impl AssignMode {
    /// Resolves [`AssignMode::Auto`] and checks the mode against the target.
    pub fn resolve(self, kind: QualifierKind) -> CompileResult<AssignMode> {
        if kind == QualifierKind::Port(Direction::Input) {
            return Err(CompileError::context("cannot assign to an input port"));
        }
        if kind == QualifierKind::Generic {
            return Err(CompileError::context("cannot assign to a generic"));
        }
        let resolved = match self {
            AssignMode::Auto => match kind {
                QualifierKind::Variable => AssignMode::Value,
                QualifierKind::Temporary => AssignMode::Temp,
                _ => AssignMode::Next,
            },
            other => other,
        };
        let ok = match resolved {
            AssignMode::Next | AssignMode::Push => kind.is_signal_like(),
            AssignMode::Value => kind == QualifierKind::Variable,
            AssignMode::Temp => kind == QualifierKind::Temporary,
            AssignMode::Auto => false,
        };
        if ok {
            Ok(resolved)
        } else {
            Err(CompileError::context(format!(
                "{} assignment is not valid for a {}",
                resolved.describe(),
                kind.describe()
            )))
        }
    }

    /// Human-readable mode name.
    pub fn describe(self) -> &'static str {
        match self {
            AssignMode::Next => "next",
            AssignMode::Push => "push",
            AssignMode::Value => "value",
            AssignMode::Auto => "auto",
            AssignMode::Temp => "temporary",
        }
    }
}

/// Capability of a type to receive values of other types.
///
/// The built-in rules live on [`Primitive`]; the assembler inserts the casts
/// that the accepted combinations need.
pub trait AssignableType {
    /// Checks that `source` may be written into a target of this type.
    fn check_assignable(&self, source: &ArgType) -> CompileResult<()>;

    /// Returns `true` if `source` may be written into this type.
    fn accepts(&self, source: &ArgType) -> bool {
        self.check_assignable(source).is_ok()
    }
}

fn int_fits(target: &Primitive, value: i64) -> bool {
    match target {
        Primitive::Bit => value == 0 || value == 1,
        Primitive::Unsigned { width } => {
            value >= 0 && (*width >= 63 || value < (1i64 << width))
        }
        Primitive::Signed { width } => {
            if *width >= 64 {
                true
            } else {
                let half = 1i64 << (width - 1);
                value >= -half && value < half
            }
        }
        Primitive::Integer { min, max } => {
            min.map_or(true, |lo| value >= lo) && max.map_or(true, |hi| value <= hi)
        }
        _ => false,
    }
}

impl AssignableType for Primitive {
    fn check_assignable(&self, source: &ArgType) -> CompileResult<()> {
        let mismatch = || {
            CompileError::type_error(format!("cannot assign {source} to {self}"))
        };
        match source {
            ArgType::Adaptive => match self {
                Primitive::Bit | Primitive::BitVector { .. } => Ok(()),
                Primitive::Unsigned { .. } | Primitive::Signed { .. } => Ok(()),
                Primitive::Array { elem, .. } => elem.check_assignable(source),
                _ => Err(mismatch()),
            },
            ArgType::IntLiteral(value) => {
                if int_fits(self, *value) {
                    Ok(())
                } else if matches!(
                    self,
                    Primitive::Unsigned { .. } | Primitive::Signed { .. } | Primitive::Integer { .. }
                ) {
                    Err(CompileError::type_error(format!(
                        "integer {value} does not fit into {self}"
                    )))
                } else {
                    Err(mismatch())
                }
            }
            ArgType::Str => Err(mismatch()),
            ArgType::Elements(n) => match self {
                Primitive::Array { count, .. } if *count as usize == *n => Ok(()),
                Primitive::Array { count, .. } => Err(CompileError::type_error(format!(
                    "array of {count} elements cannot take {n} values"
                ))),
                _ => Err(mismatch()),
            },
            ArgType::Typed(src) => check_typed(self, src).ok_or_else(mismatch)?,
        }
    }
}

fn check_typed(target: &Primitive, src: &Primitive) -> Option<CompileResult<()>> {
    use Primitive as P;
    let width_err = |t: u32, s: u32| {
        Some(Err(CompileError::type_error(format!(
            "width mismatch: cannot assign {s} bits to {t} bits"
        ))))
    };
    match (target, src) {
        (P::Bit | P::Bool, P::Bit | P::Bool) => Some(Ok(())),
        (P::BitVector { width: t, .. }, s) if s.is_vector() => {
            let s = s.width().unwrap_or(0);
            if *t == s {
                Some(Ok(()))
            } else {
                width_err(*t, s)
            }
        }
        (P::Unsigned { width: t }, P::Unsigned { width: s })
        | (P::Signed { width: t }, P::Signed { width: s }) => {
            if s <= t {
                Some(Ok(()))
            } else {
                width_err(*t, *s)
            }
        }
        (P::Unsigned { width: t } | P::Signed { width: t }, P::BitVector { width: s, .. }) => {
            if t == s {
                Some(Ok(()))
            } else {
                width_err(*t, *s)
            }
        }
        (P::Unsigned { .. }, P::Signed { .. }) => Some(Err(CompileError::type_error(
            "cannot assign Signed to Unsigned without an explicit cast",
        ))),
        (P::Signed { .. }, P::Unsigned { .. }) => Some(Err(CompileError::type_error(
            "cannot assign Unsigned to Signed without an explicit cast",
        ))),
        (P::Unsigned { .. } | P::Signed { .. }, P::Integer { .. }) => Some(Ok(())),
        (P::Integer { .. }, P::Unsigned { .. } | P::Signed { .. } | P::Integer { .. }) => {
            Some(Ok(()))
        }
        (P::Array { elem: te, count: tc }, P::Array { elem: se, count: sc }) => {
            (te == se && tc == sc).then_some(Ok(()))
        }
        (P::Enum(t), P::Enum(s)) => (t == s).then_some(Ok(())),
        _ => None,
    }
}
