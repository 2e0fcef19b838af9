//! Library assembly: every prepared entity becomes an entity template.

use crate::cleanup::run_cleanups;
use crate::context::generate_context;
use crate::GenCx;
use corvid_common::Arena;
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_frontend::{EntityDeclId, PreparedBlock, PreparedDesign, PreparedEntity, PreparedTree};
use corvid_ir::{Block, BlockArena, BlockId, Context, Entity, EntityTemplate, Library, PortBinding, TemplateId};
use corvid_source::FrameId;
use corvid_types::{Direction, ObjectDb, ObjectId, QualifierKind};
use std::collections::HashMap;

/// Options of the IR generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrOptions {
    /// VHDL library of entities that do not name one.
    pub library: String,
}

impl Default for IrOptions {
    fn default() -> Self {
        Self {
            library: "work".to_string(),
        }
    }
}

/// Generates the library of a prepared design.
///
/// Templates are allocated in the order of `design.entities`, so the top
/// entity is always [`Library::top`] and has index 0.
pub fn generate_ir(design: PreparedDesign, options: &IrOptions) -> CompileResult<Library> {
    let PreparedDesign {
        sources,
        objects,
        frames,
        tree,
        entities,
    } = design;
    if entities.is_empty() {
        return Err(CompileError::sanity("design without a top entity"));
    }
    let mut cx = GenCx {
        objects,
        frames,
        code: BlockArena::new(),
    };
    let ids: HashMap<EntityDeclId, TemplateId> = entities
        .iter()
        .enumerate()
        .map(|(i, e)| (e.id, TemplateId::from_raw(i as u32)))
        .collect();
    let ports = templates_ports(&entities, &ids);
    let mut templates = Arena::new();
    for entity in &entities {
        log::debug!("generating entity `{}`", entity.name);
        let body = generate_block(&mut cx, &tree, &entity.body, &ids)?;
        check_drivers(&cx, &body, &ports)?;
        templates.alloc(template(entity, body, options));
    }
    let mut lib = Library {
        sources,
        objects: cx.objects,
        frames: cx.frames,
        code: cx.code,
        templates,
        top: TemplateId::from_raw(0),
    };
    run_cleanups(&mut lib)?;
    Ok(lib)
}

fn template(entity: &PreparedEntity, body: Block, options: &IrOptions) -> EntityTemplate {
    EntityTemplate {
        name: entity.name.clone(),
        ports: entity.ports.clone(),
        generics: entity.generics.clone(),
        extern_: entity.attrs.extern_,
        path: entity
            .attrs
            .path
            .clone()
            .unwrap_or_else(|| options.library.clone()),
        arch_name: entity
            .attrs
            .arch_name
            .clone()
            .unwrap_or_else(|| format!("arch_{}", entity.name)),
        reserved_names: entity.attrs.reserved_names.clone(),
        body,
        loc: entity.loc,
    }
}

fn templates_ports(entities: &[PreparedEntity], ids: &HashMap<EntityDeclId, TemplateId>) -> HashMap<TemplateId, Vec<ObjectId>> {
    entities
        .iter()
        .filter_map(|e| ids.get(&e.id).map(|t| (*t, e.ports.clone())))
        .collect()
}

fn generate_block(
    cx: &mut GenCx,
    tree: &PreparedTree,
    block: &PreparedBlock,
    ids: &HashMap<EntityDeclId, TemplateId>,
) -> CompileResult<Block> {
    let contexts = block
        .contexts
        .iter()
        .map(|ctx| generate_context(cx, tree, ctx))
        .collect::<CompileResult<Vec<_>>>()?;
    let blocks = block
        .blocks
        .iter()
        .map(|child| generate_block(cx, tree, child, ids))
        .collect::<CompileResult<Vec<_>>>()?;
    let entities = block
        .instances
        .iter()
        .map(|inst| {
            let template = ids.get(&inst.entity).copied().ok_or_else(|| {
                CompileError::sanity("instance of an entity that was not prepared")
            })?;
            Ok(Entity {
                name: inst.name.clone(),
                template,
                ports: inst
                    .ports
                    .iter()
                    .map(|b| PortBinding {
                        port: b.port,
                        signal: b.signal,
                    })
                    .collect(),
                generics: inst.generics.clone(),
                loc: inst.loc,
            })
        })
        .collect::<CompileResult<Vec<_>>>()?;
    Ok(Block {
        name: block.name.clone(),
        contexts,
        blocks,
        entities,
    })
}

/// Who writes or uses what inside one architecture.
///
/// Owners are regions (a context, an always companion or an instance)
/// numbered in visiting order; labels only name them in errors.
#[derive(Default)]
struct Drivers {
    labels: Vec<String>,
    signals: HashMap<ObjectId, usize>,
    locals: HashMap<ObjectId, usize>,
}

impl Drivers {
    fn region(&mut self, label: String) -> usize {
        self.labels.push(label);
        self.labels.len() - 1
    }

    fn conflict(&self, objects: &ObjectDb, id: ObjectId, verb: &str, a: usize, b: usize) -> CompileError {
        CompileError::context(format!(
            "{} is {verb} by more than one context (`{}` and `{}`)",
            objects.describe(id),
            self.labels[a],
            self.labels[b]
        ))
    }

    fn drive(&mut self, objects: &ObjectDb, id: ObjectId, by: usize) -> CompileResult<()> {
        match self.signals.get(&id) {
            Some(&other) if other != by => Err(self.conflict(objects, id, "driven", other, by)),
            _ => {
                self.signals.insert(id, by);
                Ok(())
            }
        }
    }

    fn use_local(&mut self, objects: &ObjectDb, id: ObjectId, by: usize) -> CompileResult<()> {
        match self.locals.get(&id) {
            Some(&other) if other != by => Err(self.conflict(objects, id, "used", other, by)),
            _ => {
                self.locals.insert(id, by);
                Ok(())
            }
        }
    }
}

fn check_drivers(cx: &GenCx, body: &Block, ports: &HashMap<TemplateId, Vec<ObjectId>>) -> CompileResult<()> {
    let mut drivers = Drivers::default();
    let mut regions: Vec<(usize, BlockId, FrameId)> = Vec::new();
    for context in body.all_contexts() {
        let region = drivers.region(context.name().to_string());
        regions.push((region, context.code(), context.frame()));
        if let Context::Sequential(seq) = context {
            if let Some(always) = &seq.always {
                let region = drivers.region(always.name.clone());
                regions.push((region, always.code, always.frame));
            }
        }
    }
    for &(region, root, frame) in &regions {
        let mut result = Ok(());
        cx.code.walk(root, &mut |_, stmt| {
            if result.is_err() {
                return;
            }
            for id in stmt.kind.written() {
                let root = cx.objects.root(id);
                let kind = cx.objects.kind(root);
                let step = if kind.is_signal_like() {
                    drivers.drive(&cx.objects, root, region)
                } else {
                    drivers.use_local(&cx.objects, root, region)
                };
                if let Err(err) = step {
                    result = Err(cx.locate(err, stmt.frame));
                    return;
                }
            }
            for id in stmt.kind.reads(&cx.objects) {
                let root = cx.objects.root(id);
                if cx.objects.kind(root).is_context_local() {
                    if let Err(err) = drivers.use_local(&cx.objects, root, region) {
                        result = Err(cx.locate(err, stmt.frame));
                        return;
                    }
                }
            }
        });
        result.map_err(|err| cx.locate(err, frame))?;
    }
    for (index, entity) in body.all_entities().into_iter().enumerate() {
        let label = match &entity.name {
            Some(name) => format!("instance {name}"),
            None => format!("unnamed instance #{index}"),
        };
        let region = drivers.region(label);
        let known = ports.get(&entity.template);
        for binding in &entity.ports {
            if known.is_some_and(|p| !p.contains(&binding.port)) {
                return Err(CompileError::sanity("port binding names a foreign port"));
            }
            let dir = match cx.objects.kind(binding.port) {
                QualifierKind::Port(dir) => dir,
                _ => return Err(CompileError::sanity("port binding of a non-port object")),
            };
            if dir == Direction::Input {
                continue;
            }
            let parent = cx.objects.root(binding.signal);
            match cx.objects.kind(parent) {
                QualifierKind::Port(Direction::Input) => {
                    return Err(CompileError::context(format!(
                        "{} cannot be driven by {}",
                        cx.objects.describe(parent),
                        drivers.labels[region]
                    )))
                }
                kind if kind.is_signal_like() => drivers.drive(&cx.objects, parent, region)?,
                _ => {
                    return Err(CompileError::context(format!(
                        "output port bound to {}, which is not a signal",
                        cx.objects.describe(parent)
                    )))
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_library_is_work() {
        assert_eq!(IrOptions::default().library, "work");
    }

    #[test]
    fn regions_with_equal_labels_still_conflict() {
        let mut objects = ObjectDb::new();
        let y = objects.signal("y", corvid_types::Primitive::Bit);
        let mut drivers = Drivers::default();
        let first = drivers.region("logic".to_string());
        let second = drivers.region("logic".to_string());
        drivers.drive(&objects, y, first).unwrap();
        drivers.drive(&objects, y, first).unwrap();
        let err = drivers.drive(&objects, y, second).unwrap_err();
        assert!(err.message.contains("more than one context"), "{}", err.message);
    }
}
