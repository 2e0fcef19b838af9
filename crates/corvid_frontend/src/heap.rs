//! Storage for host objects created while lowering.
//!
//! Functions, classes, instances, lists, dicts and name scopes live in
//! arenas; host values refer to them by id, so closures and instance
//! attributes never form reference cycles.

use crate::ast::FunctionDef;
use crate::value::{DictKey, HostValue};
use corvid_common::{define_id, Arena};
use corvid_source::SourceLoc;
use linked_hash_map::LinkedHashMap;
use std::rc::Rc;

define_id!(
    /// Index of a [`FunctionObj`].
    FunctionId
);
define_id!(
    /// Index of a [`ClassObj`].
    ClassId
);
define_id!(
    /// Index of an [`InstanceObj`].
    InstanceId
);
define_id!(
    /// Index of a host list.
    ListId
);
define_id!(
    /// Index of a host dict.
    DictId
);
define_id!(
    /// Index of a [`Scope`].
    ScopeId
);

/// A function value: definition plus captured environment.
#[derive(Debug, Clone)]
pub struct FunctionObj {
    /// The definition.
    pub def: Rc<FunctionDef>,
    /// Scope the function was defined in; free names resolve through it.
    pub closure: ScopeId,
    /// Evaluated parameter defaults, one per parameter.
    pub defaults: Vec<Option<HostValue>>,
    /// Class the function was defined in, for `super()`.
    pub owner: Option<ClassId>,
}

/// A user class.
#[derive(Debug, Clone)]
pub struct ClassObj {
    /// Class name.
    pub name: String,
    /// Single base class.
    pub base: Option<ClassId>,
    /// Class attributes and methods in definition order.
    pub attrs: LinkedHashMap<String, HostValue>,
    /// Where the class was defined.
    pub loc: SourceLoc,
}

/// An instance of a user class.
#[derive(Debug, Clone)]
pub struct InstanceObj {
    /// The class.
    pub class: ClassId,
    /// Instance attributes in declaration order.
    pub attrs: LinkedHashMap<String, HostValue>,
    /// Set while `__init__` runs; only then may attributes be declared.
    pub init_active: bool,
}

/// A name scope.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Bound names.
    pub vars: LinkedHashMap<String, HostValue>,
    /// Enclosing scope.
    pub parent: Option<ScopeId>,
}

/// All host objects of a session.
#[derive(Debug, Default)]
pub struct Heap {
    /// Function values.
    pub functions: Arena<FunctionId, FunctionObj>,
    /// Classes.
    pub classes: Arena<ClassId, ClassObj>,
    /// Class instances.
    pub instances: Arena<InstanceId, InstanceObj>,
    /// Lists.
    pub lists: Arena<ListId, Vec<HostValue>>,
    /// Dicts.
    pub dicts: Arena<DictId, LinkedHashMap<DictKey, HostValue>>,
    /// Scopes.
    pub scopes: Arena<ScopeId, Scope>,
}

impl Heap {
    /// Creates an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scope nested in `parent`.
    pub fn new_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        self.scopes.alloc(Scope {
            vars: LinkedHashMap::new(),
            parent,
        })
    }

    /// Binds `name` in `scope`, replacing any previous binding.
    pub fn bind(&mut self, scope: ScopeId, name: impl Into<String>, value: HostValue) {
        self.scopes[scope].vars.insert(name.into(), value);
    }

    /// Looks `name` up in `scope` only.
    pub fn get_local(&self, scope: ScopeId, name: &str) -> Option<&HostValue> {
        self.scopes[scope].vars.get(name)
    }

    /// Looks `name` up in `scope` and its ancestors.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<&HostValue> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let scope = &self.scopes[id];
            if let Some(v) = scope.vars.get(name) {
                if *v != HostValue::Unbound {
                    return Some(v);
                }
            }
            cur = scope.parent;
        }
        None
    }

    /// Finds the scope in the ancestry of `scope` (excluding `scope`
    /// itself) that binds `name`.
    pub fn owner_of(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        let mut cur = self.scopes[scope].parent;
        while let Some(id) = cur {
            if self.scopes[id].vars.contains_key(name) {
                return Some(id);
            }
            cur = self.scopes[id].parent;
        }
        None
    }

    /// Stores a list.
    pub fn new_list(&mut self, items: Vec<HostValue>) -> HostValue {
        HostValue::List(self.lists.alloc(items))
    }

    /// Stores a dict.
    pub fn new_dict(&mut self, items: LinkedHashMap<DictKey, HostValue>) -> HostValue {
        HostValue::Dict(self.dicts.alloc(items))
    }

    /// Finds an attribute on a class or its bases.
    pub fn class_attr(&self, class: ClassId, name: &str) -> Option<(ClassId, &HostValue)> {
        let mut cur = Some(class);
        while let Some(id) = cur {
            let obj = &self.classes[id];
            if let Some(v) = obj.attrs.get(name) {
                return Some((id, v));
            }
            cur = obj.base;
        }
        None
    }

    /// Returns `true` if `class` is `other` or derives from it.
    pub fn is_subclass(&self, class: ClassId, other: ClassId) -> bool {
        let mut cur = Some(class);
        while let Some(id) = cur {
            if id == other {
                return true;
            }
            cur = self.classes[id].base;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_chain_lookup() {
        let mut heap = Heap::new();
        let outer = heap.new_scope(None);
        let inner = heap.new_scope(Some(outer));
        heap.bind(outer, "x", HostValue::Int(1));
        heap.bind(inner, "y", HostValue::Unbound);
        assert_eq!(heap.lookup(inner, "x"), Some(&HostValue::Int(1)));
        assert_eq!(heap.lookup(inner, "y"), None);
        assert_eq!(heap.owner_of(inner, "x"), Some(outer));
        assert_eq!(heap.owner_of(inner, "y"), None);
    }

    #[test]
    fn class_attribute_inheritance() {
        let mut heap = Heap::new();
        let base = heap.classes.alloc(ClassObj {
            name: "Base".into(),
            base: None,
            attrs: LinkedHashMap::new(),
            loc: SourceLoc::DUMMY,
        });
        heap.classes[base]
            .attrs
            .insert("width".into(), HostValue::Int(8));
        let derived = heap.classes.alloc(ClassObj {
            name: "Derived".into(),
            base: Some(base),
            attrs: LinkedHashMap::new(),
            loc: SourceLoc::DUMMY,
        });
        let (owner, value) = heap.class_attr(derived, "width").unwrap();
        assert_eq!(owner, base);
        assert_eq!(value, &HostValue::Int(8));
        assert!(heap.is_subclass(derived, base));
        assert!(!heap.is_subclass(base, derived));
    }
}
