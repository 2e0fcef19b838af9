//! Substitution of objects inside statements.
//!
//! Renaming a root object also renames every view of it: the view chain is
//! replayed on the new root, with runtime indices substituted too.

use corvid_diagnostics::CompileResult;
use corvid_ir::StmtKind;
use corvid_types::{InlinePart, ObjectDb, ObjectId, Operand, RefSpec};
use std::collections::HashMap;

/// A root-to-root substitution with a cache of rebuilt views.
#[derive(Debug, Clone, Default)]
pub(crate) struct ObjectMap {
    roots: HashMap<ObjectId, ObjectId>,
    views: HashMap<ObjectId, ObjectId>,
}

impl ObjectMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, from: ObjectId, to: ObjectId) {
        self.roots.insert(from, to);
        self.views.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub(crate) fn get(&self, root: ObjectId) -> Option<ObjectId> {
        self.roots.get(&root).copied()
    }

    /// The substitute of `id`, or `id` itself when nothing it depends on is
    /// renamed.
    pub(crate) fn apply(&mut self, objects: &mut ObjectDb, id: ObjectId) -> CompileResult<ObjectId> {
        if let Some(mapped) = self.roots.get(&id) {
            return Ok(*mapped);
        }
        if !objects.is_view(id) {
            return Ok(id);
        }
        if let Some(mapped) = self.views.get(&id) {
            return Ok(*mapped);
        }
        let root = objects.root(id);
        let chain = objects.chain(id).to_vec();
        let touched = self.roots.contains_key(&root)
            || chain.iter().any(|spec| {
                matches!(spec, RefSpec::DynamicOffset(index) if self.roots.contains_key(&objects.root(*index)))
            });
        if !touched {
            return Ok(id);
        }
        let mut cur = self.roots.get(&root).copied().unwrap_or(root);
        for spec in chain {
            cur = match spec {
                RefSpec::Offset(index) => objects.offset(cur, index)?,
                RefSpec::DynamicOffset(index) => {
                    let index = self.apply(objects, index)?;
                    objects.dynamic_offset(cur, index)?
                }
                RefSpec::Slice { high, low } => objects.slice(cur, high, low)?,
            };
        }
        let want = objects.ty(id).clone();
        if *objects.ty(cur) != want {
            if let Some(family) = want.family() {
                cur = objects.facet(cur, family)?;
            }
        }
        self.views.insert(id, cur);
        Ok(cur)
    }

    /// Substitutes the objects a statement reads. Written targets keep
    /// their identity; only their runtime indices are substituted.
    pub(crate) fn apply_reads(&mut self, objects: &mut ObjectDb, kind: &mut StmtKind) -> CompileResult<()> {
        for operand in kind.operands_mut() {
            match operand {
                Operand::Object(id) => *id = self.apply(objects, *id)?,
                Operand::Event { signal, .. } => *signal = self.apply(objects, *signal)?,
                Operand::Const(_) => {}
            }
        }
        if let StmtKind::InlineCode { parts } = kind {
            for part in parts {
                if let InlinePart::Read(id) = part {
                    *id = self.apply(objects, *id)?;
                }
            }
        }
        Ok(())
    }

    /// Substitutes reads and written targets alike.
    pub(crate) fn apply_all(&mut self, objects: &mut ObjectDb, kind: &mut StmtKind) -> CompileResult<()> {
        self.apply_reads(objects, kind)?;
        match kind {
            StmtKind::SignalAssignment { target, .. }
            | StmtKind::SignalPush { target, .. }
            | StmtKind::VariableAssignment { target, .. }
            | StmtKind::SelectWith { target, .. } => *target = self.apply(objects, *target)?,
            StmtKind::Boolean { result, .. }
            | StmtKind::BinOp { result, .. }
            | StmtKind::UnaryOp { result, .. }
            | StmtKind::Compare { result, .. }
            | StmtKind::All { result, .. }
            | StmtKind::Any { result, .. } => *result = self.apply(objects, *result)?,
            StmtKind::SignalAlias { signal, .. } => *signal = self.apply(objects, *signal)?,
            StmtKind::InlineCode { parts } => {
                for part in parts {
                    if let InlinePart::Target(id) = part {
                        *id = self.apply(objects, *id)?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_types::{Primitive, VecFamily};

    #[test]
    fn roots_and_views_follow_the_rename() {
        let mut objects = ObjectDb::new();
        let old = objects.temporary(Primitive::bit_vector(8));
        let new = objects.temporary(Primitive::bit_vector(8));
        let high = objects.slice(old, 7, 4).unwrap();
        let as_unsigned = objects.facet(high, VecFamily::Unsigned).unwrap();
        let mut map = ObjectMap::new();
        map.insert(old, new);
        assert_eq!(map.apply(&mut objects, old).unwrap(), new);
        let moved = map.apply(&mut objects, as_unsigned).unwrap();
        assert_eq!(objects.root(moved), new);
        assert_eq!(objects.ty(moved), &Primitive::unsigned(4));
        assert_eq!(map.apply(&mut objects, as_unsigned).unwrap(), moved);
    }

    #[test]
    fn runtime_indices_are_substituted() {
        let mut objects = ObjectDb::new();
        let mem = objects.signal(
            "mem",
            Primitive::Array {
                elem: Box::new(Primitive::Bit),
                count: 4,
            },
        );
        let idx = objects.temporary(Primitive::unsigned(2));
        let other = objects.temporary(Primitive::unsigned(2));
        let elem = objects.dynamic_offset(mem, idx).unwrap();
        let mut map = ObjectMap::new();
        map.insert(idx, other);
        let moved = map.apply(&mut objects, elem).unwrap();
        assert_eq!(objects.root(moved), mem);
        assert_eq!(objects.dynamic_indices(moved), vec![other]);
    }

    #[test]
    fn untouched_objects_are_kept() {
        let mut objects = ObjectDb::new();
        let a = objects.signal("a", Primitive::bit_vector(4));
        let view = objects.offset(a, 1).unwrap();
        let t = objects.temporary(Primitive::Bit);
        let u = objects.temporary(Primitive::Bit);
        let mut map = ObjectMap::new();
        map.insert(t, u);
        assert_eq!(map.apply(&mut objects, view).unwrap(), view);
        let mut kind = StmtKind::SignalAssignment {
            target: view,
            source: Operand::Object(t),
        };
        map.apply_reads(&mut objects, &mut kind).unwrap();
        assert_eq!(
            kind,
            StmtKind::SignalAssignment {
                target: view,
                source: Operand::Object(u),
            }
        );
    }
}
