//! Enumeration types.
//!
//! Enum types are declared once per session and referenced by [`EnumId`].
//! User enums come from the host program; the state-machine pass declares
//! one enum per synthesized machine.

use corvid_common::{define_id, Arena};
use serde::{Deserialize, Serialize};

define_id!(
    /// Index of an [`EnumType`] in an [`EnumDb`].
    EnumId
);

/// A named finite set of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    /// Type name hint.
    pub name: String,
    /// Member names, indexed by value.
    pub members: Vec<String>,
    /// Declared by the compiler rather than the user.
    pub generated: bool,
}

/// Session-wide storage for enum types.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnumDb {
    types: Arena<EnumId, EnumType>,
}

impl EnumDb {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a user enum type.
    pub fn declare<S: Into<String>>(
        &mut self,
        name: impl Into<String>,
        members: impl IntoIterator<Item = S>,
    ) -> EnumId {
        self.types.alloc(EnumType {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
            generated: false,
        })
    }

    /// Declares a compiler-generated enum type.
    pub fn declare_generated(&mut self, name: impl Into<String>, members: Vec<String>) -> EnumId {
        self.types.alloc(EnumType {
            name: name.into(),
            members,
            generated: true,
        })
    }

    /// Returns the enum type.
    pub fn get(&self, id: EnumId) -> &EnumType {
        &self.types[id]
    }

    /// Looks a member up by name.
    pub fn member_index(&self, id: EnumId, member: &str) -> Option<u32> {
        self.types[id]
            .members
            .iter()
            .position(|m| m == member)
            .map(|i| i as u32)
    }

    /// Returns the member name for a value.
    pub fn member_name(&self, id: EnumId, index: u32) -> Option<&str> {
        self.types[id]
            .members
            .get(index as usize)
            .map(String::as_str)
    }

    /// Iterates over all declared enums.
    pub fn iter(&self) -> impl Iterator<Item = (EnumId, &EnumType)> {
        self.types.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_and_lookup() {
        let mut db = EnumDb::new();
        let id = db.declare("Color", ["RED", "GREEN", "BLUE"]);
        assert_eq!(db.member_index(id, "GREEN"), Some(1));
        assert_eq!(db.member_index(id, "PINK"), None);
        assert_eq!(db.member_name(id, 2), Some("BLUE"));
        assert!(!db.get(id).generated);
    }

    #[test]
    fn generated_enums_are_flagged() {
        let mut db = EnumDb::new();
        let id = db.declare_generated("state_t_proc", vec!["s0".into(), "s1".into()]);
        assert!(db.get(id).generated);
        assert_eq!(db.iter().count(), 1);
    }
}
