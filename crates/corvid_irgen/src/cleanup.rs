//! Cleanup passes run on the generated library.
//!
//! Each pass reports whether it changed anything; [`run_cleanups`] repeats
//! the whole list until a round changes nothing.

use crate::remap::ObjectMap;
use corvid_diagnostics::CompileResult;
use corvid_ir::{BlockId, Context, Library, StmtKind};
use corvid_types::{ObjectDb, ObjectId, Operand, Primitive, QualifierKind};
use std::collections::HashSet;

/// A single cleanup pass.
pub(crate) trait CleanupPass {
    /// Name used in debug logs.
    fn name(&self) -> &'static str;

    /// Runs the pass, returning `true` if it made changes.
    fn run(&self, lib: &mut Library) -> CompileResult<bool>;
}

/// Root blocks of every context of every template, companions included.
fn context_roots(lib: &Library) -> Vec<BlockId> {
    let mut out = Vec::new();
    for (_, template) in lib.templates.iter() {
        for context in template.body.all_contexts() {
            out.push(context.code());
            if let Context::Sequential(seq) = context {
                if let Some(always) = &seq.always {
                    out.push(always.code);
                }
            }
        }
    }
    out
}

fn is_temp_root(objects: &ObjectDb, id: ObjectId) -> bool {
    objects.kind(id) == QualifierKind::Temporary
}

/// Removes writes to temporaries nobody reads.
pub(crate) struct UnusedTemporaries;

impl CleanupPass for UnusedTemporaries {
    fn name(&self) -> &'static str {
        "unused-temporaries"
    }

    fn run(&self, lib: &mut Library) -> CompileResult<bool> {
        let roots = context_roots(lib);
        let mut read = HashSet::new();
        for &root in &roots {
            lib.code.walk(root, &mut |_, stmt| {
                for id in stmt.kind.reads(&lib.objects) {
                    read.insert(lib.objects.root(id));
                }
            });
        }
        let objects = &lib.objects;
        let mut removed = 0;
        for &root in &roots {
            removed += lib.code.retain(root, &mut |stmt| {
                let dead = match &stmt.kind {
                    StmtKind::InlineCode { .. } => false,
                    kind => {
                        let written = kind.written();
                        !written.is_empty()
                            && written.iter().all(|id| {
                                let r = objects.root(*id);
                                is_temp_root(objects, r) && !read.contains(&r)
                            })
                    }
                };
                !dead
            });
        }
        Ok(removed > 0)
    }
}

/// Forwards `bool(t)` of a Bool temporary `t` to its readers.
pub(crate) struct RedundantBoolCast;

impl CleanupPass for RedundantBoolCast {
    fn name(&self) -> &'static str {
        "redundant-bool-cast"
    }

    fn run(&self, lib: &mut Library) -> CompileResult<bool> {
        let roots = context_roots(lib);
        let mut map = ObjectMap::new();
        for &root in &roots {
            lib.code.walk(root, &mut |_, stmt| {
                if let StmtKind::Boolean {
                    arg: Operand::Object(arg),
                    result,
                } = &stmt.kind
                {
                    let objects = &lib.objects;
                    if !objects.is_view(*arg)
                        && map.get(*arg).is_none()
                        && is_temp_root(objects, *arg)
                        && *objects.ty(*arg) == Primitive::Bool
                        && is_temp_root(objects, *result)
                        && !objects.is_view(*result)
                    {
                        map.insert(*result, *arg);
                    }
                }
            });
        }
        if map.is_empty() {
            return Ok(false);
        }
        for &root in &roots {
            lib.code.retain(root, &mut |stmt| {
                !matches!(&stmt.kind, StmtKind::Boolean { result, .. } if map.get(*result).is_some())
            });
            for block in lib.code.descendants(root) {
                let mut stmts = std::mem::take(&mut lib.code.get_mut(block).stmts);
                let result = stmts
                    .iter_mut()
                    .try_for_each(|stmt| map.apply_reads(&mut lib.objects, &mut stmt.kind));
                lib.code.get_mut(block).stmts = stmts;
                result?;
            }
        }
        Ok(true)
    }
}

/// Drops `if` statements whose arms are both empty.
pub(crate) struct EmptyBranches;

impl CleanupPass for EmptyBranches {
    fn name(&self) -> &'static str {
        "empty-branches"
    }

    fn run(&self, lib: &mut Library) -> CompileResult<bool> {
        let mut removed = 0;
        for root in context_roots(lib) {
            for block in lib.code.descendants(root) {
                let code = &lib.code;
                let keep: Vec<bool> = code
                    .get(block)
                    .stmts
                    .iter()
                    .map(|stmt| match &stmt.kind {
                        StmtKind::If { body, orelse, .. } => {
                            !(code.is_effectively_empty(*body) && code.is_effectively_empty(*orelse))
                        }
                        _ => true,
                    })
                    .collect();
                let dropped = keep.iter().filter(|k| !**k).count();
                if dropped == 0 {
                    continue;
                }
                let mut keep = keep.into_iter();
                lib.code
                    .get_mut(block)
                    .stmts
                    .retain(|_| keep.next().unwrap_or(true));
                removed += dropped;
            }
        }
        Ok(removed > 0)
    }
}

/// Runs every cleanup pass until none of them changes the library.
pub(crate) fn run_cleanups(lib: &mut Library) -> CompileResult<()> {
    let passes: Vec<Box<dyn CleanupPass>> = vec![
        Box::new(RedundantBoolCast),
        Box::new(EmptyBranches),
        Box::new(UnusedTemporaries),
    ];
    loop {
        let mut changed = false;
        for pass in &passes {
            if pass.run(lib)? {
                log::debug!("cleanup pass `{}` changed the library", pass.name());
                changed = true;
            }
        }
        if !changed {
            return Ok(());
        }
    }
}

/// Removes writes to temporaries that are never read. Returns `true` if
/// anything was removed.
pub fn cleanup_unused(lib: &mut Library) -> CompileResult<bool> {
    UnusedTemporaries.run(lib)
}

/// Replaces reads of `bool(t)` results by `t` itself when `t` is already
/// a Bool temporary. Returns `true` if anything changed.
pub fn cleanup_bool_cast(lib: &mut Library) -> CompileResult<bool> {
    RedundantBoolCast.run(lib)
}
