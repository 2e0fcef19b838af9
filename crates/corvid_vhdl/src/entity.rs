//! Emission of one entity declaration and its architecture.
//!
//! Assembly of a template runs in three passes. Setup gives every output
//! port a buffer signal, records where each object is used and lets the
//! [`ScopeTree`] pick its declaration scope. Naming allocates identifiers
//! for types, declarations and labels. Emission writes the text.

use crate::expr::{inline_candidates, Inlines, Naming, Renderer};
use crate::names::NameTable;
use crate::scope::{ScopeId, ScopeKind, ScopeTree};
use crate::stmt::Body;
use crate::types::{array_declaration, literal, string_literal, type_name, TypeNames};
use crate::writer::Writer;
use crate::VhdlOptions;
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_ir::{Block, BlockArena, BlockId, Context, Entity, EntityTemplate, Library, Sequential, TemplateId};
use corvid_types::{
    ConstValue, Direction, EnumId, ObjectDb, ObjectDecl, ObjectId, Primitive, QualifierKind, Sensitivity,
};
use itertools::Itertools;
use std::collections::HashMap;

/// The externally visible names of a template.
#[derive(Debug, Clone)]
pub(crate) struct Interface {
    pub entity: String,
    pub path: String,
    pub ports: Vec<(ObjectId, String)>,
    pub generics: Vec<(ObjectId, String)>,
}

/// Names the entity and its interface. Extern entities keep their names
/// verbatim, since they refer to VHDL that already exists.
pub(crate) fn interface(
    template: &EntityTemplate,
    objects: &ObjectDb,
    entities: &mut NameTable,
    table: &mut NameTable,
) -> CompileResult<Interface> {
    let verbatim = |id: ObjectId| {
        objects
            .name(id)
            .map(str::to_string)
            .ok_or_else(|| CompileError::sanity(format!("extern entity `{}` has an unnamed port", template.name)))
    };
    let (entity, ports, generics) = if template.extern_ {
        let ports = template
            .ports
            .iter()
            .map(|&p| verbatim(p).map(|n| (p, n)))
            .collect::<CompileResult<Vec<_>>>()?;
        let generics = template
            .generics
            .iter()
            .map(|&g| verbatim(g).map(|n| (g, n)))
            .collect::<CompileResult<Vec<_>>>()?;
        (template.name.clone(), ports, generics)
    } else {
        let entity = entities.allocate(Some(&template.name), "entity");
        table.reserve(&entity);
        let ports = template
            .ports
            .iter()
            .map(|&p| (p, table.allocate(objects.name(p), "port")))
            .collect();
        let generics = template
            .generics
            .iter()
            .map(|&g| (g, table.allocate(objects.name(g), "generic")))
            .collect();
        (entity, ports, generics)
    };
    Ok(Interface {
        entity,
        path: template.path.clone(),
        ports,
        generics,
    })
}

/// A piece of an architecture body, in emission order.
enum Section<'l> {
    Concurrent {
        code: BlockId,
        inlined: Inlines,
    },
    Process {
        ctx: &'l Sequential,
        scope: ScopeId,
        label: String,
        inlined: Inlines,
        always: Option<(BlockId, Inlines)>,
    },
    Instance {
        entity: &'l Entity,
        label: String,
    },
    Block {
        block: &'l Block,
        label: String,
        sections: Vec<Section<'l>>,
    },
}

enum TypeDecl {
    Enum(EnumId),
    Array(Primitive),
}

/// Assembles the templates of one library.
pub(crate) struct Assembler<'l> {
    lib: &'l Library,
    options: &'l VhdlOptions,
    /// The library objects plus the buffer signals added during assembly.
    objects: ObjectDb,
    scopes: ScopeTree,
    interfaces: HashMap<TemplateId, Interface>,
}

impl<'l> Assembler<'l> {
    pub fn new(lib: &'l Library, options: &'l VhdlOptions, interfaces: HashMap<TemplateId, Interface>) -> Self {
        Self {
            lib,
            options,
            objects: lib.objects.clone(),
            scopes: ScopeTree::new(),
            interfaces,
        }
    }

    fn interface_of(&self, id: TemplateId) -> CompileResult<&Interface> {
        self.interfaces
            .get(&id)
            .ok_or_else(|| CompileError::sanity("template without an interface"))
    }

    /// Emits the file of template `id`; `table` holds the names its
    /// interface already took.
    pub fn emit(&mut self, id: TemplateId, mut table: NameTable) -> CompileResult<(String, String)> {
        let lib = self.lib;
        let template = &lib.templates[id];
        let iface = self.interface_of(id)?.clone();
        log::debug!("assembling entity `{}`", iface.entity);

        let mut naming = Naming::default();
        let entity_scope = self.scopes.child(self.scopes.module(), ScopeKind::Entity);
        let arch = self.scopes.child(entity_scope, ScopeKind::Architecture);
        for (obj, name) in iface.ports.iter().chain(&iface.generics) {
            naming.names.insert(*obj, name.clone());
            self.scopes.declare_owned(entity_scope, *obj);
        }

        let mut buffers = Vec::new();
        for (port, name) in &iface.ports {
            if self.objects.kind(*port) != QualifierKind::Port(Direction::Output) {
                continue;
            }
            let decl = self.objects.get(*port);
            let mut buffer = ObjectDecl::new(QualifierKind::Signal, decl.ty.clone())
                .named(format!("buffer_{name}"))
                .at(decl.loc);
            buffer.default = decl.default.clone();
            let buffer = self.objects.declare(buffer);
            naming.aliases.insert(*port, buffer);
            self.scopes.declare(arch, buffer, true);
            buffers.push((name.clone(), buffer));
        }

        let mut sections = {
            let mut setup = Setup {
                objects: &self.objects,
                code: &lib.code,
                scopes: &mut self.scopes,
                naming: &naming,
            };
            setup.block(&template.body, arch)?
        };
        self.scopes.complete_setup();

        let signals = self.scopes.declarations(arch);
        let mut type_decls = Vec::new();
        for (port, _) in &iface.ports {
            let ty = self.objects.ty(*port);
            if matches!(ty, Primitive::Enum(_) | Primitive::Array { .. }) {
                return Err(CompileError::type_error(format!(
                    "{} of entity `{}` has type {ty}, which an entity port cannot carry",
                    self.objects.describe(*port),
                    template.name
                )));
            }
        }
        for obj in &signals {
            self.collect_type(&self.objects.ty(*obj).clone(), &mut table, &mut naming.types, &mut type_decls);
        }
        self.collect_section_types(&sections, &mut table, &mut naming.types, &mut type_decls);

        for obj in &signals {
            let name = table.allocate(self.objects.get(*obj).name.as_deref(), fallback(self.objects.kind(*obj)));
            naming.names.insert(*obj, name);
        }
        self.name_sections(&mut sections, &mut table, &mut naming);

        let mut w = Writer::new(self.options.indent);
        self.header(&mut w, template, &iface, &naming)?;
        w.blank();
        w.line(format!("architecture {} of {} is", template.arch_name, iface.entity));
        w.indent();
        for decl in &type_decls {
            w.line(self.type_declaration(decl, &naming.types)?);
        }
        for obj in &signals {
            let kind = self.objects.kind(*obj);
            if kind == QualifierKind::Variable {
                return Err(CompileError::sanity(format!(
                    "{} is shared between processes",
                    self.objects.describe(*obj)
                )));
            }
            w.line(self.declaration("signal", *obj, &naming)?);
        }
        if !type_decls.is_empty() || !signals.is_empty() {
            w.blank();
        }
        bool_helper(&mut w);
        w.dedent();
        w.line("begin");
        w.indent();
        for (port, buffer) in &buffers {
            w.line(format!("{port} <= {};", naming.names[buffer]));
        }
        self.sections(&mut w, &sections, &naming)?;
        w.dedent();
        w.line(format!("end architecture {};", template.arch_name));
        Ok((iface.entity, w.finish()))
    }

    fn collect_type(&self, ty: &Primitive, table: &mut NameTable, types: &mut TypeNames, out: &mut Vec<TypeDecl>) {
        match ty {
            Primitive::Enum(id) if !types.has_enum(*id) => {
                let e = self.objects.enums.get(*id);
                let name = table.allocate(Some(&e.name), "enum_type");
                let members = e.members.iter().map(|m| table.allocate(Some(m), "member")).collect();
                types.declare_enum(*id, name, members);
                out.push(TypeDecl::Enum(*id));
            }
            Primitive::Array { elem, .. } if !types.has_array(ty) => {
                self.collect_type(elem, table, types, out);
                let name = table.allocate(None, "array_type");
                types.declare_array(ty.clone(), name);
                out.push(TypeDecl::Array(ty.clone()));
            }
            _ => {}
        }
    }

    fn collect_section_types(
        &self,
        sections: &[Section<'_>],
        table: &mut NameTable,
        types: &mut TypeNames,
        out: &mut Vec<TypeDecl>,
    ) {
        for section in sections {
            match section {
                Section::Process { scope, .. } => {
                    for obj in self.scopes.declarations(*scope) {
                        self.collect_type(&self.objects.ty(obj).clone(), table, types, out);
                    }
                }
                Section::Block { sections, .. } => self.collect_section_types(sections, table, types, out),
                _ => {}
            }
        }
    }

    fn name_sections(&self, sections: &mut [Section<'_>], table: &mut NameTable, naming: &mut Naming) {
        for section in sections {
            match section {
                Section::Concurrent { .. } => {}
                Section::Process { ctx, scope, label, .. } => {
                    *label = table.allocate(Some(&ctx.name), "proc");
                    for obj in self.scopes.declarations(*scope) {
                        let name =
                            table.allocate(self.objects.get(obj).name.as_deref(), fallback(self.objects.kind(obj)));
                        naming.names.insert(obj, name);
                    }
                }
                Section::Instance { entity, label } => {
                    *label = table.allocate(entity.name.as_deref(), "inst");
                }
                Section::Block {
                    block,
                    label,
                    sections,
                } => {
                    *label = table.allocate(block.name.as_deref(), "block");
                    self.name_sections(sections, table, naming);
                }
            }
        }
    }

    fn type_declaration(&self, decl: &TypeDecl, types: &TypeNames) -> CompileResult<String> {
        match decl {
            TypeDecl::Enum(id) => {
                let name = type_name(&Primitive::Enum(*id), types)?;
                let members = types.enum_members(*id)?.join(", ");
                Ok(format!("type {name} is ({members});"))
            }
            TypeDecl::Array(ty) => array_declaration(&type_name(ty, types)?, ty, types),
        }
    }

    fn default_suffix(&self, obj: ObjectId, types: &TypeNames) -> CompileResult<String> {
        let decl = self.objects.get(obj);
        Ok(match &decl.default {
            Some(ConstValue::Str(text)) => format!(" := {}", string_literal(text)),
            Some(value) => format!(" := {}", literal(value, &decl.ty, types)?.text),
            None => String::new(),
        })
    }

    fn declaration(&self, keyword: &str, obj: ObjectId, naming: &Naming) -> CompileResult<String> {
        let name = naming
            .names
            .get(&obj)
            .ok_or_else(|| CompileError::sanity(format!("{} has no VHDL name", self.objects.describe(obj))))?;
        let ty = type_name(self.objects.ty(obj), &naming.types)?;
        let default = self.default_suffix(obj, &naming.types)?;
        Ok(format!("{keyword} {name} : {ty}{default};"))
    }

    fn header(&self, w: &mut Writer, template: &EntityTemplate, iface: &Interface, naming: &Naming) -> CompileResult<()> {
        w.line("library ieee;");
        w.line("use ieee.std_logic_1164.all;");
        w.line("use ieee.numeric_std.all;");
        let libraries: Vec<String> = template
            .body
            .all_entities()
            .into_iter()
            .filter_map(|e| self.interfaces.get(&e.template))
            .map(|child| child.path.clone())
            .filter(|path| !path.eq_ignore_ascii_case("work"))
            .sorted()
            .dedup()
            .collect();
        for library in libraries {
            w.line(format!("library {library};"));
        }
        w.blank();
        w.line(format!("entity {} is", iface.entity));
        w.indent();
        if !iface.generics.is_empty() {
            let lines = iface
                .generics
                .iter()
                .map(|(g, name)| {
                    let ty = match self.objects.get(*g).default {
                        Some(ConstValue::Str(_)) => "string".to_string(),
                        _ => type_name(self.objects.ty(*g), &naming.types)?,
                    };
                    Ok(format!("{name} : {ty}{}", self.default_suffix(*g, &naming.types)?))
                })
                .collect::<CompileResult<Vec<_>>>()?;
            interface_list(w, "generic", &lines);
        }
        if !iface.ports.is_empty() {
            let lines = iface
                .ports
                .iter()
                .map(|(p, name)| {
                    let dir = match self.objects.kind(*p) {
                        QualifierKind::Port(Direction::Input) => "in",
                        QualifierKind::Port(Direction::Output) => "out",
                        QualifierKind::Port(Direction::Inout) => "inout",
                        _ => return Err(CompileError::sanity("entity port that is not a port")),
                    };
                    let ty = type_name(self.objects.ty(*p), &naming.types)?;
                    let default = if dir == "in" {
                        self.default_suffix(*p, &naming.types)?
                    } else {
                        String::new()
                    };
                    Ok(format!("{name} : {dir} {ty}{default}"))
                })
                .collect::<CompileResult<Vec<_>>>()?;
            interface_list(w, "port", &lines);
        }
        w.dedent();
        w.line(format!("end entity {};", iface.entity));
        Ok(())
    }

    fn sections(&self, w: &mut Writer, sections: &[Section<'_>], naming: &Naming) -> CompileResult<()> {
        for section in sections {
            match section {
                Section::Concurrent { code, inlined } => self.concurrent(w, *code, inlined, naming)?,
                Section::Process {
                    ctx,
                    scope,
                    label,
                    inlined,
                    always,
                } => {
                    if let Some((code, inlined)) = always {
                        self.concurrent(w, *code, inlined, naming)?;
                    }
                    self.process(w, ctx, *scope, label, inlined, naming)?;
                }
                Section::Instance { entity, label } => self.instance(w, entity, label, naming)?,
                Section::Block { label, sections, .. } => {
                    w.blank();
                    w.line(format!("{label}: block"));
                    w.line("begin");
                    w.indent();
                    self.sections(w, sections, naming)?;
                    w.dedent();
                    w.line(format!("end block {label};"));
                }
            }
        }
        Ok(())
    }

    fn renderer<'r>(&'r self, naming: &'r Naming, inlined: &'r Inlines) -> Renderer<'r> {
        Renderer {
            objects: &self.objects,
            code: &self.lib.code,
            naming,
            inlined,
        }
    }

    fn concurrent(&self, w: &mut Writer, code: BlockId, inlined: &Inlines, naming: &Naming) -> CompileResult<()> {
        let r = self.renderer(naming, inlined);
        Body {
            r: &r,
            sequential: false,
        }
        .block(w, code)
    }

    fn process(
        &self,
        w: &mut Writer,
        ctx: &Sequential,
        scope: ScopeId,
        label: &str,
        inlined: &Inlines,
        naming: &Naming,
    ) -> CompileResult<()> {
        let list = match &ctx.sensitivity {
            Some(Sensitivity::All) if self.options.std_2008 => Some("all".to_string()),
            Some(Sensitivity::List(ids)) => Some(self.sensitivity_names(ids.iter().copied(), naming)?),
            _ => {
                let mut reads = Vec::new();
                self.lib.code.walk(ctx.code, &mut |_, stmt| {
                    reads.extend(stmt.kind.reads(&self.objects));
                });
                let signals: Vec<ObjectId> = reads
                    .into_iter()
                    .map(|id| naming.resolve(&self.objects, id))
                    .filter(|id| self.objects.kind(*id).is_signal_like())
                    .collect();
                Some(self.sensitivity_names(signals.into_iter(), naming)?)
            }
        };
        w.blank();
        match list.filter(|l| !l.is_empty()) {
            Some(list) => w.line(format!("{label}: process ({list})")),
            None if self.options.std_2008 => w.line(format!("{label}: process (all)")),
            None => w.line(format!("{label}: process")),
        }
        w.indent();
        for obj in self.scopes.declarations(scope) {
            w.line(self.declaration("variable", obj, naming)?);
        }
        w.dedent();
        w.line("begin");
        w.indent();
        let r = self.renderer(naming, inlined);
        Body {
            r: &r,
            sequential: true,
        }
        .block(w, ctx.code)?;
        w.dedent();
        w.line(format!("end process {label};"));
        Ok(())
    }

    fn sensitivity_names(&self, ids: impl Iterator<Item = ObjectId>, naming: &Naming) -> CompileResult<String> {
        let names = ids
            .map(|id| naming.resolve(&self.objects, id))
            .unique()
            .map(|root| {
                naming.names.get(&root).cloned().ok_or_else(|| {
                    CompileError::sanity(format!("{} has no VHDL name", self.objects.describe(root)))
                })
            })
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(names.join(", "))
    }

    fn instance(&self, w: &mut Writer, entity: &Entity, label: &str, naming: &Naming) -> CompileResult<()> {
        let child = self.interface_of(entity.template)?;
        let inlined = Inlines::new();
        let r = self.renderer(naming, &inlined);
        let generics = entity
            .generics
            .iter()
            .map(|(g, value)| {
                let name = lookup(&child.generics, *g)?;
                let value = match value {
                    ConstValue::Str(text) => string_literal(text),
                    other => literal(other, self.objects.ty(*g), &naming.types)?.text,
                };
                Ok(format!("{name} => {value}"))
            })
            .collect::<CompileResult<Vec<_>>>()?;
        let ports = entity
            .ports
            .iter()
            .map(|binding| {
                let name = lookup(&child.ports, binding.port)?;
                Ok(format!("{name} => {}", r.place(binding.signal)?.text))
            })
            .collect::<CompileResult<Vec<_>>>()?;
        let head = format!("{label}: entity {}.{}", child.path, child.entity);
        w.blank();
        if generics.is_empty() && ports.is_empty() {
            w.line(format!("{head};"));
            return Ok(());
        }
        w.line(head);
        w.indent();
        if !generics.is_empty() {
            map_list(w, "generic map", &generics, ports.is_empty());
        }
        if !ports.is_empty() {
            map_list(w, "port map", &ports, true);
        }
        w.dedent();
        Ok(())
    }
}

/// Records where the objects of each context are used.
struct Setup<'s> {
    objects: &'s ObjectDb,
    code: &'s BlockArena,
    scopes: &'s mut ScopeTree,
    naming: &'s Naming,
}

impl Setup<'_> {
    fn block<'l>(&mut self, block: &'l Block, arch: ScopeId) -> CompileResult<Vec<Section<'l>>> {
        let mut out = Vec::new();
        for context in &block.contexts {
            match context {
                Context::Concurrent(ctx) => {
                    let inlined = inline_candidates(self.code, self.objects, &[ctx.code]);
                    self.uses(arch, ctx.code, &inlined);
                    out.push(Section::Concurrent {
                        code: ctx.code,
                        inlined,
                    });
                }
                Context::Sequential(ctx) => {
                    let always = ctx.always.as_ref().map(|a| {
                        let inlined = inline_candidates(self.code, self.objects, &[a.code]);
                        self.uses(arch, a.code, &inlined);
                        (a.code, inlined)
                    });
                    let scope = self.scopes.child(arch, ScopeKind::Process);
                    if let Some(Sensitivity::List(ids)) = &ctx.sensitivity {
                        for id in ids {
                            self.use_object(arch, *id, &Inlines::new());
                        }
                    }
                    let inlined = inline_candidates(self.code, self.objects, &[ctx.code]);
                    self.uses(scope, ctx.code, &inlined);
                    out.push(Section::Process {
                        ctx,
                        scope,
                        label: String::new(),
                        inlined,
                        always,
                    });
                }
            }
        }
        for child in &block.blocks {
            let sections = self.block(child, arch)?;
            out.push(Section::Block {
                block: child,
                label: String::new(),
                sections,
            });
        }
        for entity in &block.entities {
            for binding in &entity.ports {
                self.use_object(arch, binding.signal, &Inlines::new());
                for index in self.objects.dynamic_indices(binding.signal) {
                    self.use_object(arch, index, &Inlines::new());
                }
            }
            out.push(Section::Instance {
                entity,
                label: String::new(),
            });
        }
        Ok(out)
    }

    fn uses(&mut self, scope: ScopeId, root: BlockId, inlined: &Inlines) {
        let mut ids = Vec::new();
        self.code.walk(root, &mut |_, stmt| {
            ids.extend(stmt.kind.written());
            ids.extend(stmt.kind.reads(self.objects));
        });
        for id in ids {
            self.use_object(scope, id, inlined);
        }
    }

    fn use_object(&mut self, scope: ScopeId, id: ObjectId, inlined: &Inlines) {
        if inlined.contains_key(&self.objects.root(id)) {
            return;
        }
        let root = self.naming.resolve(self.objects, id);
        match self.objects.kind(root) {
            QualifierKind::Port(_) | QualifierKind::Generic => {}
            QualifierKind::Signal => self.scopes.declare(scope, root, true),
            QualifierKind::Variable | QualifierKind::Temporary => self.scopes.declare(scope, root, false),
        }
    }
}

fn fallback(kind: QualifierKind) -> &'static str {
    match kind {
        QualifierKind::Variable => "var",
        QualifierKind::Temporary => "temp",
        _ => "sig",
    }
}

fn lookup(names: &[(ObjectId, String)], id: ObjectId) -> CompileResult<&str> {
    names
        .iter()
        .find(|(obj, _)| *obj == id)
        .map(|(_, name)| name.as_str())
        .ok_or_else(|| CompileError::sanity("binding names an unknown port or generic"))
}

/// `generic (` or `port (` followed by `;`-separated entries.
fn interface_list(w: &mut Writer, keyword: &str, lines: &[String]) {
    w.line(format!("{keyword} ("));
    w.indent();
    for (i, line) in lines.iter().enumerate() {
        let sep = if i + 1 < lines.len() { ";" } else { "" };
        w.line(format!("{line}{sep}"));
    }
    w.dedent();
    w.line(");");
}

/// `generic map (` or `port map (` followed by `,`-separated entries.
fn map_list(w: &mut Writer, keyword: &str, lines: &[String], last: bool) {
    w.line(format!("{keyword} ("));
    w.indent();
    for (i, line) in lines.iter().enumerate() {
        let sep = if i + 1 < lines.len() { "," } else { "" };
        w.line(format!("{line}{sep}"));
    }
    w.dedent();
    w.line(if last { ");" } else { ")" });
}

fn bool_helper(w: &mut Writer) {
    w.line("function cohdl_bool_to_std_logic(value : boolean) return std_logic is");
    w.line("begin");
    w.indent();
    w.line("if value then");
    w.indent();
    w.line("return '1';");
    w.dedent();
    w.line("else");
    w.indent();
    w.line("return '0';");
    w.dedent();
    w.line("end if;");
    w.dedent();
    w.line("end function;");
}
