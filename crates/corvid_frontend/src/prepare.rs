//! Lowering of a whole design.
//!
//! [`prepare_design`] lowers every context of every entity reachable from
//! the top entity. The result owns the object database, the prepared tree
//! and the virtual frames; the host heap is no longer needed afterwards.

use crate::design::{BlockDeclId, Design, EntityAttrs, EntityDeclId, InstanceDecl};
use crate::lower::{LowerCx, Lowerer};
use crate::prepared::{NodeId, PreparedTree};
use corvid_common::Arena;
use corvid_diagnostics::CompileResult;
use corvid_source::{FrameArena, FrameId, SourceDb, SourceLoc};
use corvid_types::{ContextKind, ObjectDb, ObjectId, Sensitivity};
use std::collections::BTreeMap;

/// A lowered context.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedContext {
    /// Context name.
    pub name: String,
    /// Concurrent or sequential.
    pub kind: ContextKind,
    /// Root node.
    pub root: NodeId,
    /// `always(...)` expressions.
    pub always: Vec<NodeId>,
    /// Registered and lowered sensitivity, combined.
    pub sensitivity: Option<Sensitivity>,
    /// Free-form attributes.
    pub attributes: BTreeMap<String, String>,
    /// Registration site.
    pub loc: SourceLoc,
    /// Frame of the context function.
    pub frame: FrameId,
}

/// A lowered block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedBlock {
    /// Block label hint.
    pub name: Option<String>,
    /// Contexts in registration order.
    pub contexts: Vec<PreparedContext>,
    /// Nested blocks.
    pub blocks: Vec<PreparedBlock>,
    /// Entity instances.
    pub instances: Vec<InstanceDecl>,
}

/// A lowered entity declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedEntity {
    /// Declaration id, referenced by instances.
    pub id: EntityDeclId,
    /// Entity name.
    pub name: String,
    /// Ports in declaration order.
    pub ports: Vec<ObjectId>,
    /// Generics in declaration order.
    pub generics: Vec<ObjectId>,
    /// Attributes.
    pub attrs: EntityAttrs,
    /// Architecture body; empty for extern entities.
    pub body: PreparedBlock,
    /// Declaration site.
    pub loc: SourceLoc,
}

/// Output of the frontend.
#[derive(Debug)]
pub struct PreparedDesign {
    /// User sources.
    pub sources: SourceDb,
    /// Qualified objects, including temporaries created while lowering.
    pub objects: ObjectDb,
    /// Virtual call frames.
    pub frames: FrameArena,
    /// Prepared nodes of all contexts.
    pub tree: PreparedTree,
    /// Reachable entities, top first.
    pub entities: Vec<PreparedEntity>,
}

impl PreparedDesign {
    /// The top entity.
    pub fn top(&self) -> &PreparedEntity {
        &self.entities[0]
    }

    /// Looks an entity up by declaration id.
    pub fn entity(&self, id: EntityDeclId) -> Option<&PreparedEntity> {
        self.entities.iter().find(|e| e.id == id)
    }
}

/// Lowers every context reachable from the top entity.
pub fn prepare_design(design: Design) -> CompileResult<PreparedDesign> {
    let top = design.top()?;
    let order = design.reachable(top);
    let Design {
        sources,
        objects,
        heap,
        registry,
        entities,
        blocks,
        ..
    } = design;
    let mut cx = LowerCx::new(objects, heap, registry);
    let mut prepared = Vec::with_capacity(order.len());
    for id in order {
        let decl = &entities[id];
        log::debug!("preparing entity `{}`", decl.name);
        let body = if decl.attrs.extern_ {
            PreparedBlock::default()
        } else {
            prepare_block(&mut cx, &blocks, decl.body)?
        };
        prepared.push(PreparedEntity {
            id,
            name: decl.name.clone(),
            ports: decl.ports.clone(),
            generics: decl.generics.clone(),
            attrs: decl.attrs.clone(),
            body,
            loc: decl.loc,
        });
    }
    Ok(PreparedDesign {
        sources,
        objects: cx.objects,
        frames: cx.frames,
        tree: cx.tree,
        entities: prepared,
    })
}

fn prepare_block(
    cx: &mut LowerCx,
    blocks: &Arena<BlockDeclId, crate::design::BlockDecl>,
    id: BlockDeclId,
) -> CompileResult<PreparedBlock> {
    let decl = &blocks[id];
    let mut contexts = Vec::with_capacity(decl.contexts.len());
    for ctx in &decl.contexts {
        let lowered = Lowerer::new(cx, ctx.kind).lower_context(ctx.function)?;
        let sensitivity = match (ctx.sensitivity.clone(), lowered.sensitivity) {
            (Some(a), Some(b)) => Some(a.merge(b)),
            (a, b) => a.or(b),
        };
        contexts.push(PreparedContext {
            name: ctx.name.clone(),
            kind: ctx.kind,
            root: lowered.root,
            always: lowered.always,
            sensitivity,
            attributes: ctx.attributes.clone(),
            loc: ctx.loc,
            frame: lowered.frame,
        });
    }
    let children = decl
        .blocks
        .iter()
        .map(|child| prepare_block(cx, blocks, *child))
        .collect::<CompileResult<Vec<_>>>()?;
    Ok(PreparedBlock {
        name: decl.name.clone(),
        contexts,
        blocks: children,
        instances: decl.instances.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;
    use corvid_types::{Direction, Primitive};

    fn counter_design() -> Design {
        let mut design = Design::new();
        let top = design.entity("counter");
        design.port(top, "clk", Direction::Input, Primitive::Bit);
        design.port(top, "q", Direction::Output, Primitive::unsigned(4));
        let f = design.define(
            top,
            async_function(
                "count",
                vec![],
                vec![while_(
                    boolean(true),
                    vec![
                        expr(await_(call(name("rising_edge"), vec![name("clk")]))),
                        next(name("q"), add(name("q"), int(1))),
                    ],
                )],
            ),
        );
        let body = design.body(top);
        design.sequential(body, f, None);
        design
    }

    #[test]
    fn lowers_every_context() {
        let prepared = prepare_design(counter_design()).unwrap();
        assert_eq!(prepared.entities.len(), 1);
        let top = prepared.top();
        assert_eq!(top.name, "counter");
        assert_eq!(top.body.contexts.len(), 1);
        assert_eq!(top.body.contexts[0].name, "count");
        assert_eq!(top.body.contexts[0].kind, ContextKind::Sequential);
    }

    #[test]
    fn lowering_is_deterministic() {
        let first = prepare_design(counter_design()).unwrap();
        let second = prepare_design(counter_design()).unwrap();
        assert_eq!(first.tree, second.tree);
        assert_eq!(first.objects.len(), second.objects.len());
        assert_eq!(first.entities, second.entities);
    }

    #[test]
    fn extern_entities_are_not_lowered() {
        let mut design = Design::new();
        let top = design.entity("top");
        let child = design.entity("blackbox");
        design.attrs_mut(child).extern_ = true;
        let f = design.define(child, function("never", vec![], vec![expr(name("undefined"))]));
        let child_body = design.body(child);
        design.concurrent(child_body, f);
        let body = design.body(top);
        design.instantiate(body, child, Some("u0"), &[], &[]).unwrap();
        let prepared = prepare_design(design).unwrap();
        assert_eq!(prepared.entities.len(), 2);
        assert!(prepared.entity(child).unwrap().body.contexts.is_empty());
    }
}
