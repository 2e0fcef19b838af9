//! Synthesizable context kinds.

use crate::object::ObjectId;
use serde::{Deserialize, Serialize};

/// The two kinds of synthesizable functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextKind {
    /// Continuously active; lowered to concurrent statements.
    Concurrent,
    /// Sensitivity-driven; lowered to a process, possibly a state machine.
    Sequential,
}

impl ContextKind {
    /// Lowercase name used in messages and name hints.
    pub fn as_str(self) -> &'static str {
        match self {
            ContextKind::Concurrent => "concurrent",
            ContextKind::Sequential => "sequential",
        }
    }
}

/// Explicit sensitivity of a sequential context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sensitivity {
    /// Sensitive to every signal read (`sensitivity_all()`).
    All,
    /// Sensitive to the listed signals.
    List(Vec<ObjectId>),
}

impl Sensitivity {
    /// Combines two specifiers; `All` absorbs lists.
    pub fn merge(self, other: Sensitivity) -> Sensitivity {
        match (self, other) {
            (Sensitivity::All, _) | (_, Sensitivity::All) => Sensitivity::All,
            (Sensitivity::List(mut a), Sensitivity::List(b)) => {
                for id in b {
                    if !a.contains(&id) {
                        a.push(id);
                    }
                }
                Sensitivity::List(a)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_lists_dedups() {
        let a = ObjectId::from_raw(0);
        let b = ObjectId::from_raw(1);
        let merged = Sensitivity::List(vec![a]).merge(Sensitivity::List(vec![b, a]));
        assert_eq!(merged, Sensitivity::List(vec![a, b]));
    }

    #[test]
    fn all_absorbs() {
        let a = ObjectId::from_raw(0);
        assert_eq!(
            Sensitivity::List(vec![a]).merge(Sensitivity::All),
            Sensitivity::All
        );
    }
}
