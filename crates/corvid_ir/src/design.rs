//! Entity templates, their instances and the library.

use crate::block::BlockArena;
use crate::context::Context;
use corvid_common::{define_id, Arena};
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_source::{FrameArena, SourceDb, SourceLoc};
use corvid_types::{ConstValue, ObjectDb, ObjectId};
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

define_id!(
    /// Index of an [`EntityTemplate`] in a [`Library`].
    TemplateId
);

/// Connection of a sub-entity port to a signal of the parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortBinding {
    /// Port of the instantiated template.
    pub port: ObjectId,
    /// Parent signal or port bound to it.
    pub signal: ObjectId,
}

/// A use of a template with concrete bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Instance label hint.
    pub name: Option<String>,
    /// The instantiated template.
    pub template: TemplateId,
    /// Port map.
    pub ports: Vec<PortBinding>,
    /// Generic map.
    pub generics: Vec<(ObjectId, ConstValue)>,
    /// Instantiation site.
    pub loc: SourceLoc,
}

/// A named grouping of contexts, instances and nested blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block label hint.
    pub name: Option<String>,
    /// Contexts in registration order.
    pub contexts: Vec<Context>,
    /// Nested blocks.
    pub blocks: Vec<Block>,
    /// Instantiated entities.
    pub entities: Vec<Entity>,
}

impl Block {
    /// Every context of this block and its nested blocks, depth first.
    pub fn all_contexts(&self) -> Vec<&Context> {
        let mut out: Vec<&Context> = self.contexts.iter().collect();
        for block in &self.blocks {
            out.extend(block.all_contexts());
        }
        out
    }

    /// Every instance of this block and its nested blocks, depth first.
    pub fn all_entities(&self) -> Vec<&Entity> {
        let mut out: Vec<&Entity> = self.entities.iter().collect();
        for block in &self.blocks {
            out.extend(block.all_entities());
        }
        out
    }
}

/// An entity declaration with its architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityTemplate {
    /// Entity name.
    pub name: String,
    /// Ports in declaration order.
    pub ports: Vec<ObjectId>,
    /// Generics in declaration order.
    pub generics: Vec<ObjectId>,
    /// Declared elsewhere; no architecture is emitted.
    pub extern_: bool,
    /// VHDL library of the entity.
    pub path: String,
    /// Architecture name.
    pub arch_name: String,
    /// Identifiers the generated code must not use.
    pub reserved_names: Vec<String>,
    /// The architecture.
    pub body: Block,
    /// Declaration site.
    pub loc: SourceLoc,
}

/// Every template reachable from the top entity.
#[derive(Debug)]
pub struct Library {
    /// User sources.
    pub sources: SourceDb,
    /// Qualified objects.
    pub objects: ObjectDb,
    /// Virtual call frames.
    pub frames: FrameArena,
    /// Code blocks of all contexts.
    pub code: BlockArena,
    /// Entity templates.
    pub templates: Arena<TemplateId, EntityTemplate>,
    /// The top entity.
    pub top: TemplateId,
}

impl Library {
    /// The top template.
    pub fn top_template(&self) -> &EntityTemplate {
        &self.templates[self.top]
    }

    /// Templates ordered so that every template comes after the templates
    /// it instantiates.
    pub fn emission_order(&self) -> CompileResult<Vec<TemplateId>> {
        let mut graph: DiGraph<TemplateId, ()> = DiGraph::new();
        let nodes: HashMap<TemplateId, NodeIndex> = self
            .templates
            .ids()
            .map(|id| (id, graph.add_node(id)))
            .collect();
        for (id, template) in self.templates.iter() {
            for entity in template.body.all_entities() {
                graph.add_edge(nodes[&entity.template], nodes[&id], ());
            }
        }
        let order = algo::toposort(&graph, None).map_err(|cycle| {
            let name = &self.templates[graph[cycle.node_id()]].name;
            CompileError::sanity(format!("entity `{name}` instantiates itself"))
        })?;
        Ok(order.into_iter().map(|n| graph[n]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(name: &str, entities: Vec<Entity>) -> EntityTemplate {
        EntityTemplate {
            name: name.to_string(),
            ports: Vec::new(),
            generics: Vec::new(),
            extern_: false,
            path: "work".to_string(),
            arch_name: format!("arch_{name}"),
            reserved_names: Vec::new(),
            body: Block {
                entities,
                ..Block::default()
            },
            loc: SourceLoc::DUMMY,
        }
    }

    fn instance(template: TemplateId) -> Entity {
        Entity {
            name: None,
            template,
            ports: Vec::new(),
            generics: Vec::new(),
            loc: SourceLoc::DUMMY,
        }
    }

    fn library(templates: Arena<TemplateId, EntityTemplate>, top: TemplateId) -> Library {
        Library {
            sources: SourceDb::new(),
            objects: ObjectDb::new(),
            frames: FrameArena::new(),
            code: BlockArena::new(),
            templates,
            top,
        }
    }

    #[test]
    fn leaves_come_first() {
        let mut templates = Arena::new();
        let top_id = TemplateId::from_raw(0);
        let mid_id = TemplateId::from_raw(1);
        let leaf_id = TemplateId::from_raw(2);
        templates.alloc(template("top", vec![instance(mid_id), instance(leaf_id)]));
        templates.alloc(template("mid", vec![instance(leaf_id)]));
        templates.alloc(template("leaf", Vec::new()));
        let lib = library(templates, top_id);
        let order = lib.emission_order().unwrap();
        let pos = |id: TemplateId| order.iter().position(|x| *x == id).unwrap();
        assert!(pos(leaf_id) < pos(mid_id));
        assert!(pos(mid_id) < pos(top_id));
        assert_eq!(lib.top_template().name, "top");
    }

    #[test]
    fn self_instantiation_is_rejected() {
        let mut templates = Arena::new();
        let id = TemplateId::from_raw(0);
        templates.alloc(template("loop", vec![instance(id)]));
        let err = library(templates, id).emission_order().unwrap_err();
        assert!(err.message.contains("instantiates itself"));
    }

    #[test]
    fn nested_blocks_are_flattened() {
        let inner = Block {
            name: Some("inner".into()),
            entities: vec![instance(TemplateId::from_raw(1))],
            ..Block::default()
        };
        let outer = Block {
            blocks: vec![inner],
            entities: vec![instance(TemplateId::from_raw(2))],
            ..Block::default()
        };
        assert_eq!(outer.all_entities().len(), 2);
        assert!(outer.all_contexts().is_empty());
    }
}
