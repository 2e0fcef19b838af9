//! The scope tree deciding where each object is declared.
//!
//! Scopes nest as module, entity, architecture and process. Every use of an
//! object is recorded with [`ScopeTree::declare`]; once all uses are known,
//! [`ScopeTree::complete_setup`] activates the declaration in the lowest
//! scope enclosing all of them and removes it from the scopes below.

use corvid_common::{define_id, Arena};
use corvid_types::ObjectId;
use linked_hash_map::LinkedHashMap;

define_id!(
    /// Index of a [`Scope`] in a [`ScopeTree`].
    ScopeId
);

/// What a scope corresponds to in the generated VHDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// The whole library.
    Module,
    /// An entity declaration: ports and generics.
    Entity,
    /// The declarative part of an architecture: signals and types.
    Architecture,
    /// The declarative part of a process: variables only.
    Process,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    parent: Option<ScopeId>,
    /// Declarations in first-use order with their active bit.
    decls: LinkedHashMap<ObjectId, bool>,
}

/// Scopes of one library and the declarations they own.
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Arena<ScopeId, Scope>,
    uses: LinkedHashMap<ObjectId, Vec<ScopeId>>,
    module: ScopeId,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    /// A tree holding only the module scope.
    pub fn new() -> Self {
        let mut scopes = Arena::new();
        let module = scopes.alloc(Scope {
            kind: ScopeKind::Module,
            parent: None,
            decls: LinkedHashMap::new(),
        });
        Self {
            scopes,
            uses: LinkedHashMap::new(),
            module,
        }
    }

    /// The module scope.
    pub fn module(&self) -> ScopeId {
        self.module
    }

    /// Opens a scope below `parent`.
    pub fn child(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        self.scopes.alloc(Scope {
            kind,
            parent: Some(parent),
            decls: LinkedHashMap::new(),
        })
    }

    /// Kind of a scope.
    pub fn kind(&self, scope: ScopeId) -> ScopeKind {
        self.scopes[scope].kind
    }

    /// `scope` followed by its ancestors up to the module scope.
    fn ancestors(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut out = vec![scope];
        let mut current = scope;
        while let Some(parent) = self.scopes[current].parent {
            out.push(parent);
            current = parent;
        }
        out
    }

    fn active_above(&self, scope: ScopeId, obj: ObjectId) -> bool {
        self.ancestors(scope)
            .into_iter()
            .any(|s| self.scopes[s].decls.get(&obj).copied().unwrap_or(false))
    }

    /// Declares `obj` as owned by `scope` from the start; uses below it
    /// never declare it again.
    pub fn declare_owned(&mut self, scope: ScopeId, obj: ObjectId) {
        self.scopes[scope].decls.insert(obj, true);
    }

    /// Records a use of `obj` in `scope`. Signals cannot be declared in a
    /// process and escalate to the enclosing scope.
    pub fn declare(&mut self, scope: ScopeId, obj: ObjectId, signal: bool) {
        let mut scope = scope;
        while signal && self.kind(scope) == ScopeKind::Process {
            match self.scopes[scope].parent {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        if self.active_above(scope, obj) {
            return;
        }
        for s in self.ancestors(scope) {
            self.scopes[s].decls.entry(obj).or_insert(false);
        }
        log::trace!("object {} used in {:?} scope", obj.as_raw(), self.kind(scope));
        let uses = self.uses.entry(obj).or_insert_with(Vec::new);
        if !uses.contains(&scope) {
            uses.push(scope);
        }
    }

    fn common_ancestor(&self, a: ScopeId, b: ScopeId) -> ScopeId {
        let above_a = self.ancestors(a);
        self.ancestors(b)
            .into_iter()
            .find(|s| above_a.contains(s))
            .unwrap_or(self.module)
    }

    /// Activates every recorded declaration in the lowest scope enclosing
    /// all of its uses.
    pub fn complete_setup(&mut self) {
        let uses: Vec<(ObjectId, Vec<ScopeId>)> = self
            .uses
            .iter()
            .map(|(obj, scopes)| (*obj, scopes.clone()))
            .collect();
        for (obj, scopes) in uses {
            let Some((&first, rest)) = scopes.split_first() else {
                continue;
            };
            let owner = rest
                .iter()
                .fold(first, |acc, s| self.common_ancestor(acc, *s));
            if let Some(active) = self.scopes[owner].decls.get_mut(&obj) {
                *active = true;
            }
            for scope in scopes {
                for s in self.ancestors(scope) {
                    if s == owner {
                        break;
                    }
                    self.scopes[s].decls.remove(&obj);
                }
            }
        }
        self.uses.clear();
    }

    /// Objects declared in `scope`, in first-use order.
    pub fn declarations(&self, scope: ScopeId) -> Vec<ObjectId> {
        self.scopes[scope]
            .decls
            .iter()
            .filter(|(_, active)| **active)
            .map(|(obj, _)| *obj)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(n: u32) -> ObjectId {
        ObjectId::from_raw(n)
    }

    fn tree() -> (ScopeTree, ScopeId, ScopeId, ScopeId) {
        let mut tree = ScopeTree::new();
        let entity = tree.child(tree.module(), ScopeKind::Entity);
        let arch = tree.child(entity, ScopeKind::Architecture);
        let proc_a = tree.child(arch, ScopeKind::Process);
        (tree, entity, arch, proc_a)
    }

    #[test]
    fn single_use_stays_local() {
        let (mut tree, _, arch, proc_a) = tree();
        tree.declare(proc_a, obj(1), false);
        tree.complete_setup();
        assert_eq!(tree.declarations(proc_a), vec![obj(1)]);
        assert!(tree.declarations(arch).is_empty());
    }

    #[test]
    fn shared_use_moves_to_the_common_scope() {
        let (mut tree, _, arch, proc_a) = tree();
        let proc_b = tree.child(arch, ScopeKind::Process);
        tree.declare(proc_a, obj(1), false);
        tree.declare(proc_b, obj(1), false);
        tree.complete_setup();
        assert_eq!(tree.declarations(arch), vec![obj(1)]);
        assert!(tree.declarations(proc_a).is_empty());
        assert!(tree.declarations(proc_b).is_empty());
    }

    #[test]
    fn signals_escalate_out_of_processes() {
        let (mut tree, _, arch, proc_a) = tree();
        tree.declare(proc_a, obj(2), true);
        tree.complete_setup();
        assert_eq!(tree.declarations(arch), vec![obj(2)]);
        assert!(tree.declarations(proc_a).is_empty());
    }

    #[test]
    fn owned_objects_are_not_redeclared() {
        let (mut tree, entity, arch, proc_a) = tree();
        tree.declare_owned(entity, obj(0));
        tree.declare(proc_a, obj(0), true);
        tree.declare(arch, obj(3), true);
        tree.declare(arch, obj(4), true);
        tree.complete_setup();
        assert_eq!(tree.declarations(entity), vec![obj(0)]);
        assert_eq!(tree.declarations(arch), vec![obj(3), obj(4)]);
    }
}
