//! Qualified objects: signals, variables, temporaries, ports and generics.
//!
//! Every object lives in the [`ObjectDb`]. An object is either a root (it
//! owns storage) or a view of a root through a chain of [`RefSpec`]s. Views
//! share ownership with their root, so writing a view writes bits of the
//! root and driver attribution always works on roots.

use crate::enums::EnumDb;
use crate::operand::{ArgType, Operand};
use crate::primitive::{Primitive, VecFamily};
use crate::value::ConstValue;
use corvid_common::{define_id, Arena};
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_source::SourceLoc;
use serde::{Deserialize, Serialize};

define_id!(
    /// Index of an [`ObjectDecl`] in an [`ObjectDb`].
    ObjectId
);

/// Port direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// `in`.
    Input,
    /// `out`.
    Output,
    /// `inout`.
    Inout,
}

/// The qualifier wrapped around a primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualifierKind {
    /// A wire, written with next/push assignments.
    Signal,
    /// A process-local cell, written with value assignments.
    Variable,
    /// The result of a pure expression, written once.
    Temporary,
    /// A signal at the entity boundary.
    Port(Direction),
    /// A compile-time constant at the entity boundary.
    Generic,
}

impl QualifierKind {
    /// Signals and ports.
    pub fn is_signal_like(self) -> bool {
        matches!(self, QualifierKind::Signal | QualifierKind::Port(_))
    }

    /// Objects that belong to exactly one context.
    pub fn is_context_local(self) -> bool {
        matches!(self, QualifierKind::Variable | QualifierKind::Temporary)
    }

    /// Human-readable kind name used in messages.
    pub fn describe(self) -> &'static str {
        match self {
            QualifierKind::Signal => "signal",
            QualifierKind::Variable => "variable",
            QualifierKind::Temporary => "temporary",
            QualifierKind::Port(Direction::Input) => "input port",
            QualifierKind::Port(Direction::Output) => "output port",
            QualifierKind::Port(Direction::Inout) => "inout port",
            QualifierKind::Generic => "generic",
        }
    }
}

/// One step in a view chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefSpec {
    /// Selects one element at a constant position.
    Offset(u32),
    /// Selects one element at a runtime position held by an object.
    DynamicOffset(ObjectId),
    /// Selects bits `high` down to `low`, inclusive.
    Slice {
        /// Upper bit index.
        high: u32,
        /// Lower bit index.
        low: u32,
    },
}

/// How an object relates to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// The object owns its storage.
    Root,
    /// The object aliases part of `root`.
    View {
        /// The owning object.
        root: ObjectId,
        /// Selection steps applied to the root, outermost first.
        chain: Vec<RefSpec>,
    },
}

/// A qualified object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDecl {
    /// Name hint; the VHDL assembler derives the final identifier from it.
    pub name: Option<String>,
    /// Qualifier kind. For views this mirrors the root.
    pub kind: QualifierKind,
    /// Primitive type of the object (for views, the type of the view).
    pub ty: Primitive,
    /// Default (reset) value.
    pub default: Option<ConstValue>,
    /// Root or view.
    pub origin: Origin,
    /// Excluded from `reset_context()`.
    pub noreset: bool,
    /// Where the object was declared.
    pub loc: SourceLoc,
}

impl ObjectDecl {
    /// A root object.
    pub fn new(kind: QualifierKind, ty: Primitive) -> Self {
        Self {
            name: None,
            kind,
            ty,
            default: None,
            origin: Origin::Root,
            noreset: false,
            loc: SourceLoc::DUMMY,
        }
    }

    /// Sets the name hint.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the default value.
    pub fn with_default(mut self, default: ConstValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Sets the declaration location.
    pub fn at(mut self, loc: SourceLoc) -> Self {
        self.loc = loc;
        self
    }
}

/// Storage for every qualified object and enum type of a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectDb {
    objects: Arena<ObjectId, ObjectDecl>,
    /// Enum types referenced by objects.
    pub enums: EnumDb,
}

impl ObjectDb {
    /// Creates an empty database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an object.
    pub fn declare(&mut self, decl: ObjectDecl) -> ObjectId {
        self.objects.alloc(decl)
    }

    /// Declares a named signal.
    pub fn signal(&mut self, name: impl Into<String>, ty: Primitive) -> ObjectId {
        self.declare(ObjectDecl::new(QualifierKind::Signal, ty).named(name))
    }

    /// Declares a named variable.
    pub fn variable(&mut self, name: impl Into<String>, ty: Primitive) -> ObjectId {
        self.declare(ObjectDecl::new(QualifierKind::Variable, ty).named(name))
    }

    /// Declares an anonymous temporary.
    pub fn temporary(&mut self, ty: Primitive) -> ObjectId {
        self.declare(ObjectDecl::new(QualifierKind::Temporary, ty))
    }

    /// Declares a port.
    pub fn port(&mut self, name: impl Into<String>, dir: Direction, ty: Primitive) -> ObjectId {
        self.declare(ObjectDecl::new(QualifierKind::Port(dir), ty).named(name))
    }

    /// Declares a generic with its value.
    pub fn generic(&mut self, name: impl Into<String>, ty: Primitive, value: ConstValue) -> ObjectId {
        self.declare(
            ObjectDecl::new(QualifierKind::Generic, ty)
                .named(name)
                .with_default(value),
        )
    }

    /// Returns an object.
    pub fn get(&self, id: ObjectId) -> &ObjectDecl {
        &self.objects[id]
    }

    /// Returns an object mutably.
    pub fn get_mut(&mut self, id: ObjectId) -> &mut ObjectDecl {
        &mut self.objects[id]
    }

    /// Number of objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if no object was declared.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterates over all objects.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &ObjectDecl)> {
        self.objects.iter()
    }

    /// The root of `id` (itself for roots).
    pub fn root(&self, id: ObjectId) -> ObjectId {
        match &self.objects[id].origin {
            Origin::Root => id,
            Origin::View { root, .. } => *root,
        }
    }

    /// The view chain of `id` (empty for roots).
    pub fn chain(&self, id: ObjectId) -> &[RefSpec] {
        match &self.objects[id].origin {
            Origin::Root => &[],
            Origin::View { chain, .. } => chain,
        }
    }

    /// Returns `true` if `id` aliases another object.
    pub fn is_view(&self, id: ObjectId) -> bool {
        matches!(self.objects[id].origin, Origin::View { .. })
    }

    /// Qualifier kind of the root of `id`.
    pub fn kind(&self, id: ObjectId) -> QualifierKind {
        self.objects[self.root(id)].kind
    }

    /// Primitive type of `id`.
    pub fn ty(&self, id: ObjectId) -> &Primitive {
        &self.objects[id].ty
    }

    /// Name hint of the root of `id`.
    pub fn name(&self, id: ObjectId) -> Option<&str> {
        self.objects[self.root(id)].name.as_deref()
    }

    /// Describes `id` for error messages, e.g. `` signal `led` ``.
    pub fn describe(&self, id: ObjectId) -> String {
        let kind = self.kind(id).describe();
        match self.name(id) {
            Some(name) => format!("{kind} `{name}`"),
            None => format!("anonymous {kind}"),
        }
    }

    /// Objects holding runtime indices of the view chain of `id`.
    pub fn dynamic_indices(&self, id: ObjectId) -> Vec<ObjectId> {
        self.chain(id)
            .iter()
            .filter_map(|spec| match spec {
                RefSpec::DynamicOffset(index) => Some(*index),
                _ => None,
            })
            .collect()
    }

    fn extend_view(&mut self, base: ObjectId, spec: Option<RefSpec>, ty: Primitive) -> ObjectId {
        let root = self.root(base);
        let mut chain = self.chain(base).to_vec();
        chain.extend(spec);
        let base_decl = &self.objects[root];
        let decl = ObjectDecl {
            name: None,
            kind: base_decl.kind,
            ty,
            default: None,
            origin: Origin::View { root, chain },
            noreset: base_decl.noreset,
            loc: base_decl.loc,
        };
        self.objects.alloc(decl)
    }

    /// Selects element `index` of a vector or array.
    pub fn offset(&mut self, base: ObjectId, index: u32) -> CompileResult<ObjectId> {
        let ty = self.ty(base).clone();
        let (Some(elem), Some(count)) = (ty.element(), ty.element_count()) else {
            return Err(CompileError::type_error(format!(
                "cannot index {} of type {ty}",
                self.describe(base)
            )));
        };
        if index >= count {
            return Err(CompileError::type_error(format!(
                "index {index} out of range for {ty}"
            )));
        }
        Ok(self.extend_view(base, Some(RefSpec::Offset(index)), elem))
    }

    /// Selects the element at the runtime position held by `index`.
    pub fn dynamic_offset(&mut self, base: ObjectId, index: ObjectId) -> CompileResult<ObjectId> {
        let ty = self.ty(base).clone();
        let Some(elem) = ty.element() else {
            return Err(CompileError::type_error(format!(
                "cannot index {} of type {ty}",
                self.describe(base)
            )));
        };
        if !matches!(
            self.ty(index),
            Primitive::Unsigned { .. } | Primitive::Integer { .. }
        ) {
            return Err(CompileError::type_error(format!(
                "runtime index must be Unsigned or Integer, found {}",
                self.ty(index)
            )));
        }
        Ok(self.extend_view(base, Some(RefSpec::DynamicOffset(index)), elem))
    }

    /// Selects bits `high` down to `low` of a vector. The result is a
    /// `BitVector`.
    pub fn slice(&mut self, base: ObjectId, high: u32, low: u32) -> CompileResult<ObjectId> {
        let ty = self.ty(base).clone();
        let Some(width) = ty.width().filter(|_| ty.is_vector()) else {
            return Err(CompileError::type_error(format!(
                "cannot slice {} of type {ty}",
                self.describe(base)
            )));
        };
        if high < low || high >= width {
            return Err(CompileError::type_error(format!(
                "slice [{high}:{low}] out of range for {ty}"
            )));
        }
        Ok(self.extend_view(
            base,
            Some(RefSpec::Slice { high, low }),
            Primitive::bit_vector(high - low + 1),
        ))
    }

    /// The lowest `n` bits.
    pub fn lsb(&mut self, base: ObjectId, n: u32) -> CompileResult<ObjectId> {
        if n == 0 {
            return Err(CompileError::type_error("lsb() requires a positive width"));
        }
        self.slice(base, n - 1, 0)
    }

    /// The highest `n` bits.
    pub fn msb(&mut self, base: ObjectId, n: u32) -> CompileResult<ObjectId> {
        let width = self.ty(base).width().unwrap_or(0);
        if n == 0 || n > width {
            return Err(CompileError::type_error(format!(
                "msb({n}) out of range for {}",
                self.ty(base)
            )));
        }
        self.slice(base, width - 1, width - n)
    }

    /// Reinterprets a vector as another vector family of the same width
    /// (`.unsigned`, `.signed`, `.bitvector`).
    pub fn facet(&mut self, base: ObjectId, family: VecFamily) -> CompileResult<ObjectId> {
        let ty = self.ty(base).clone();
        let Some(width) = ty.width().filter(|_| ty.is_vector()) else {
            return Err(CompileError::type_error(format!(
                "{} of type {ty} has no vector facets",
                self.describe(base)
            )));
        };
        if ty.family() == Some(family) {
            return Ok(base);
        }
        Ok(self.extend_view(base, None, Primitive::vector(family, width)))
    }

    /// Turns a temporary into a signal; used for temporaries shared between
    /// an always-block and its sequential context.
    pub fn promote_to_signal(&mut self, id: ObjectId) {
        let root = self.root(id);
        if self.objects[root].kind == QualifierKind::Temporary {
            self.objects[root].kind = QualifierKind::Signal;
        }
    }

    /// The typing-relevant type of an operand.
    pub fn arg_type(&self, operand: &Operand) -> ArgType {
        match operand {
            Operand::Object(id) => ArgType::Typed(self.ty(*id).clone()),
            Operand::Event { .. } => ArgType::Typed(Primitive::Bool),
            Operand::Const(c) => match c {
                ConstValue::Int(i) => ArgType::IntLiteral(*i),
                ConstValue::Null | ConstValue::Full => ArgType::Adaptive,
                ConstValue::Str(_) => ArgType::Str,
                ConstValue::Array(items) => ArgType::Elements(items.len()),
                other => match other.primitive() {
                    Some(p) => ArgType::Typed(p),
                    None => ArgType::Adaptive,
                },
            },
        }
    }

    /// Primitive type of an operand, if it has a fixed one.
    pub fn operand_type(&self, operand: &Operand) -> Option<Primitive> {
        match self.arg_type(operand) {
            ArgType::Typed(p) => Some(p),
            _ => None,
        }
    }
}
