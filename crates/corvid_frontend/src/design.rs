//! The entity/architecture input model.
//!
//! A [`Design`] is what the host program hands the compiler after running
//! its architectures: entity declarations with ports and generics, nested
//! blocks, synthesizable contexts (functions plus their kind) and
//! instances of other entities.

use crate::ast::FunctionDef;
use crate::heap::{FunctionId, FunctionObj, Heap, ScopeId};
use crate::intrinsics::IntrinsicRegistry;
use crate::value::HostValue;
use corvid_common::{define_id, Arena};
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_source::{FileId, SourceDb, SourceLoc};
use corvid_types::{
    AssignableType, ConstValue, ContextKind, Direction, EnumId, ObjectDb, ObjectDecl, ObjectId,
    Primitive, QualifierKind, Sensitivity,
};
use std::collections::BTreeMap;
use std::rc::Rc;

define_id!(
    /// Index of an [`EntityDecl`].
    EntityDeclId
);
define_id!(
    /// Index of a [`BlockDecl`].
    BlockDeclId
);

/// Entity-level attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityAttrs {
    /// The entity is provided externally; no architecture is emitted.
    pub extern_: bool,
    /// VHDL library the entity is compiled into (default from config).
    pub path: Option<String>,
    /// Architecture name; defaults to `arch_<entity>`.
    pub arch_name: Option<String>,
    /// Identifiers generated code must not use.
    pub reserved_names: Vec<String>,
}

/// A synthesizable context registered by an architecture.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextDecl {
    /// Context name.
    pub name: String,
    /// Concurrent or sequential.
    pub kind: ContextKind,
    /// The function whose body is lowered.
    pub function: FunctionId,
    /// Explicit sensitivity given at registration.
    pub sensitivity: Option<Sensitivity>,
    /// Free-form attributes, emitted as comments.
    pub attributes: BTreeMap<String, String>,
    /// Registration site.
    pub loc: SourceLoc,
}

/// A binding of a child port or generic.
#[derive(Debug, Clone, PartialEq)]
pub struct PortBinding {
    /// Port of the instantiated entity.
    pub port: ObjectId,
    /// Object of the parent it is connected to.
    pub signal: ObjectId,
}

/// An instance of another entity.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDecl {
    /// Instance label hint.
    pub name: Option<String>,
    /// The instantiated entity.
    pub entity: EntityDeclId,
    /// Port connections.
    pub ports: Vec<PortBinding>,
    /// Generic values.
    pub generics: Vec<(ObjectId, ConstValue)>,
    /// Instantiation site.
    pub loc: SourceLoc,
}

/// A named grouping of contexts, sub-blocks and instances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockDecl {
    /// Block label hint; `None` for an architecture body.
    pub name: Option<String>,
    /// Contexts in registration order.
    pub contexts: Vec<ContextDecl>,
    /// Nested blocks.
    pub blocks: Vec<BlockDeclId>,
    /// Entity instances.
    pub instances: Vec<InstanceDecl>,
}

/// An entity declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDecl {
    /// Entity name.
    pub name: String,
    /// Ports in declaration order.
    pub ports: Vec<ObjectId>,
    /// Generics in declaration order.
    pub generics: Vec<ObjectId>,
    /// Attributes.
    pub attrs: EntityAttrs,
    /// Architecture body.
    pub body: BlockDeclId,
    /// Names visible to the entity's functions.
    pub scope: ScopeId,
    /// Declaration site.
    pub loc: SourceLoc,
}

/// Everything the compiler needs about a design.
#[derive(Debug)]
pub struct Design {
    /// User sources.
    pub sources: SourceDb,
    /// Qualified objects and enum types.
    pub objects: ObjectDb,
    /// Host objects.
    pub heap: Heap,
    /// Builtins.
    pub registry: IntrinsicRegistry,
    /// Module scope shared by all entities.
    pub globals: ScopeId,
    /// Entity declarations.
    pub entities: Arena<EntityDeclId, EntityDecl>,
    /// Block declarations.
    pub blocks: Arena<BlockDeclId, BlockDecl>,
    top: Option<EntityDeclId>,
}

impl Default for Design {
    fn default() -> Self {
        Self::new()
    }
}

impl Design {
    /// Creates an empty design.
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let globals = heap.new_scope(None);
        Self {
            sources: SourceDb::new(),
            objects: ObjectDb::new(),
            heap,
            registry: IntrinsicRegistry::new(),
            globals,
            entities: Arena::new(),
            blocks: Arena::new(),
            top: None,
        }
    }

    /// Registers a source file.
    pub fn add_source(&mut self, name: &str, text: &str) -> FileId {
        self.sources.add_source(name, text.to_string())
    }

    /// Declares an entity. The first declared entity is the top level
    /// unless [`Design::set_top`] says otherwise.
    pub fn entity(&mut self, name: &str) -> EntityDeclId {
        let scope = self.heap.new_scope(Some(self.globals));
        let body = self.blocks.alloc(BlockDecl::default());
        let id = self.entities.alloc(EntityDecl {
            name: name.to_string(),
            ports: Vec::new(),
            generics: Vec::new(),
            attrs: EntityAttrs::default(),
            body,
            scope,
            loc: SourceLoc::DUMMY,
        });
        self.top.get_or_insert(id);
        id
    }

    /// Selects the top-level entity.
    pub fn set_top(&mut self, entity: EntityDeclId) {
        self.top = Some(entity);
    }

    /// The top-level entity.
    pub fn top(&self) -> CompileResult<EntityDeclId> {
        self.top
            .ok_or_else(|| CompileError::sanity("design has no entity"))
    }

    /// Entity attributes.
    pub fn attrs_mut(&mut self, entity: EntityDeclId) -> &mut EntityAttrs {
        &mut self.entities[entity].attrs
    }

    /// The architecture body of an entity.
    pub fn body(&self, entity: EntityDeclId) -> BlockDeclId {
        self.entities[entity].body
    }

    /// Declares a port and binds its name in the entity scope.
    pub fn port(&mut self, entity: EntityDeclId, name: &str, dir: Direction, ty: Primitive) -> ObjectId {
        let id = self.objects.port(name, dir, ty);
        self.entities[entity].ports.push(id);
        self.bind(entity, name, HostValue::Object(id));
        id
    }

    /// Declares a port with a default value.
    pub fn port_with_default(
        &mut self,
        entity: EntityDeclId,
        name: &str,
        dir: Direction,
        ty: Primitive,
        default: ConstValue,
    ) -> ObjectId {
        let id = self.port(entity, name, dir, ty);
        self.objects.get_mut(id).default = Some(default);
        id
    }

    /// Declares a generic and binds its name in the entity scope.
    pub fn generic(&mut self, entity: EntityDeclId, name: &str, ty: Primitive, value: ConstValue) -> ObjectId {
        let id = self.objects.generic(name, ty, value);
        self.entities[entity].generics.push(id);
        self.bind(entity, name, HostValue::Object(id));
        id
    }

    /// Declares an architecture-level signal.
    pub fn signal(&mut self, entity: EntityDeclId, name: &str, ty: Primitive) -> ObjectId {
        let id = self.objects.signal(name, ty);
        self.bind(entity, name, HostValue::Object(id));
        id
    }

    /// Declares an architecture-level signal with a default value.
    pub fn signal_with_default(
        &mut self,
        entity: EntityDeclId,
        name: &str,
        ty: Primitive,
        default: ConstValue,
    ) -> ObjectId {
        let id = self.objects.declare(
            ObjectDecl::new(QualifierKind::Signal, ty)
                .named(name)
                .with_default(default),
        );
        self.bind(entity, name, HostValue::Object(id));
        id
    }

    /// Declares a user enum type visible to every entity.
    pub fn declare_enum(&mut self, name: &str, members: &[&str]) -> EnumId {
        let id = self.objects.enums.declare(name, members.iter().copied());
        self.heap.bind(self.globals, name, HostValue::EnumType(id));
        id
    }

    /// Binds an arbitrary host value in the entity scope.
    pub fn bind(&mut self, entity: EntityDeclId, name: &str, value: HostValue) {
        let scope = self.entities[entity].scope;
        self.heap.bind(scope, name, value);
    }

    /// Binds a value visible to every entity.
    pub fn bind_global(&mut self, name: &str, value: HostValue) {
        self.heap.bind(self.globals, name, value);
    }

    /// Defines a function in the entity scope and binds its name.
    ///
    /// Parameter defaults must be literals at this level.
    pub fn define(&mut self, entity: EntityDeclId, def: FunctionDef) -> FunctionId {
        let scope = self.entities[entity].scope;
        self.define_in(scope, def)
    }

    /// Defines a function in the module scope.
    pub fn define_global(&mut self, def: FunctionDef) -> FunctionId {
        self.define_in(self.globals, def)
    }

    fn define_in(&mut self, scope: ScopeId, def: FunctionDef) -> FunctionId {
        let defaults = def
            .params
            .iter()
            .map(|p| p.default.as_ref().and_then(literal_value))
            .collect();
        let name = def.name.clone();
        let id = self.heap.functions.alloc(FunctionObj {
            def: Rc::new(def),
            closure: scope,
            defaults,
            owner: None,
        });
        self.heap.bind(scope, name, HostValue::Function(id));
        id
    }

    /// Adds a nested block.
    pub fn block(&mut self, parent: BlockDeclId, name: &str) -> BlockDeclId {
        let id = self.blocks.alloc(BlockDecl {
            name: Some(name.to_string()),
            ..BlockDecl::default()
        });
        self.blocks[parent].blocks.push(id);
        id
    }

    /// Registers a concurrent context in `block`.
    pub fn concurrent(&mut self, block: BlockDeclId, function: FunctionId) -> &mut ContextDecl {
        self.add_context(block, function, ContextKind::Concurrent, None)
    }

    /// Registers a sequential context in `block`.
    pub fn sequential(
        &mut self,
        block: BlockDeclId,
        function: FunctionId,
        sensitivity: Option<Sensitivity>,
    ) -> &mut ContextDecl {
        self.add_context(block, function, ContextKind::Sequential, sensitivity)
    }

    fn add_context(
        &mut self,
        block: BlockDeclId,
        function: FunctionId,
        kind: ContextKind,
        sensitivity: Option<Sensitivity>,
    ) -> &mut ContextDecl {
        let def = &self.heap.functions[function].def;
        let decl = ContextDecl {
            name: def.name.clone(),
            kind,
            function,
            sensitivity,
            attributes: BTreeMap::new(),
            loc: def.loc,
        };
        let contexts = &mut self.blocks[block].contexts;
        contexts.push(decl);
        let last = contexts.len() - 1;
        &mut contexts[last]
    }

    /// Instantiates `child` inside `block`, connecting ports by name.
    pub fn instantiate(
        &mut self,
        block: BlockDeclId,
        child: EntityDeclId,
        name: Option<&str>,
        ports: &[(&str, ObjectId)],
        generics: &[(&str, ConstValue)],
    ) -> CompileResult<()> {
        let decl = &self.entities[child];
        let mut bindings = Vec::new();
        for (port_name, signal) in ports {
            let port = decl
                .ports
                .iter()
                .copied()
                .find(|p| self.objects.name(*p) == Some(*port_name))
                .ok_or_else(|| {
                    CompileError::scope(format!(
                        "entity `{}` has no port `{port_name}`",
                        decl.name
                    ))
                })?;
            let port_ty = self.objects.ty(port);
            let signal_ty = self.objects.ty(*signal);
            if port_ty != signal_ty && !port_ty.accepts(&corvid_types::ArgType::Typed(signal_ty.clone())) {
                return Err(CompileError::type_error(format!(
                    "port `{port_name}` of type {port_ty} cannot connect to {} of type {signal_ty}",
                    self.objects.describe(*signal)
                )));
            }
            if !self.objects.kind(*signal).is_signal_like() {
                return Err(CompileError::context(format!(
                    "port `{port_name}` must connect to a signal, not a {}",
                    self.objects.kind(*signal).describe()
                )));
            }
            bindings.push(PortBinding {
                port,
                signal: *signal,
            });
        }
        let mut generic_values = Vec::new();
        for (generic_name, value) in generics {
            let generic = decl
                .generics
                .iter()
                .copied()
                .find(|g| self.objects.name(*g) == Some(*generic_name))
                .ok_or_else(|| {
                    CompileError::scope(format!(
                        "entity `{}` has no generic `{generic_name}`",
                        decl.name
                    ))
                })?;
            generic_values.push((generic, value.clone()));
        }
        self.blocks[block].instances.push(InstanceDecl {
            name: name.map(str::to_string),
            entity: child,
            ports: bindings,
            generics: generic_values,
            loc: SourceLoc::DUMMY,
        });
        Ok(())
    }

    /// Entities reachable from `root` through instances, `root` first.
    pub fn reachable(&self, root: EntityDeclId) -> Vec<EntityDeclId> {
        let mut order = vec![root];
        let mut i = 0;
        while i < order.len() {
            let body = self.entities[order[i]].body;
            let mut stack = vec![body];
            while let Some(block) = stack.pop() {
                let decl = &self.blocks[block];
                for inst in &decl.instances {
                    if !order.contains(&inst.entity) {
                        order.push(inst.entity);
                    }
                }
                stack.extend(decl.blocks.iter().rev().copied());
            }
            i += 1;
        }
        order
    }
}

fn literal_value(expr: &crate::ast::Expr) -> Option<HostValue> {
    use crate::ast::{ExprKind, Literal};
    match &expr.kind {
        ExprKind::Literal(Literal::None) => Some(HostValue::None),
        ExprKind::Literal(Literal::Bool(b)) => Some(HostValue::Bool(*b)),
        ExprKind::Literal(Literal::Int(i)) => Some(HostValue::Int(*i)),
        ExprKind::Literal(Literal::Str(s)) => Some(HostValue::str(s)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build::*;

    #[test]
    fn ports_are_bound_in_entity_scope() {
        let mut design = Design::new();
        let top = design.entity("top");
        let clk = design.port(top, "clk", Direction::Input, Primitive::Bit);
        let scope = design.entities[top].scope;
        assert_eq!(
            design.heap.lookup(scope, "clk"),
            Some(&HostValue::Object(clk))
        );
        assert_eq!(design.top().unwrap(), top);
    }

    #[test]
    fn contexts_take_the_function_name() {
        let mut design = Design::new();
        let top = design.entity("top");
        let f = design.define(top, function("logic", Vec::new(), vec![pass()]));
        let body = design.body(top);
        design
            .concurrent(body, f)
            .attributes
            .insert("owner".into(), "core".into());
        let ctx = &design.blocks[body].contexts[0];
        assert_eq!(ctx.name, "logic");
        assert_eq!(ctx.kind, ContextKind::Concurrent);
        assert_eq!(ctx.attributes["owner"], "core");
    }

    #[test]
    fn instantiation_checks_ports() {
        let mut design = Design::new();
        let top = design.entity("top");
        let child = design.entity("child");
        design.port(child, "a", Direction::Input, Primitive::bit_vector(4));
        let wide = design.signal(top, "wide", Primitive::bit_vector(8));
        let narrow = design.signal(top, "narrow", Primitive::bit_vector(4));
        let body = design.body(top);
        assert!(design
            .instantiate(body, child, None, &[("a", wide)], &[])
            .is_err());
        assert!(design
            .instantiate(body, child, None, &[("b", narrow)], &[])
            .is_err());
        design
            .instantiate(body, child, Some("u0"), &[("a", narrow)], &[])
            .unwrap();
        assert_eq!(design.reachable(top), vec![top, child]);
    }

    #[test]
    fn reachable_follows_nested_blocks() {
        let mut design = Design::new();
        let top = design.entity("top");
        let leaf = design.entity("leaf");
        let unused = design.entity("unused");
        let body = design.body(top);
        let inner = design.block(body, "inner");
        design.instantiate(inner, leaf, None, &[], &[]).unwrap();
        let order = design.reachable(top);
        assert_eq!(order, vec![top, leaf]);
        assert!(!order.contains(&unused));
    }
}
