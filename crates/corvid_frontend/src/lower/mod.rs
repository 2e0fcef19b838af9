//! The frontend lowerer: host AST to prepared tree.
//!
//! One [`Lowerer`] walks one synthesizable context. Compile-time host code
//! (arithmetic on ints, loops over ranges, calls to helper functions,
//! classes) is executed directly; operations on qualified objects emit
//! prepared nodes into the current *sink*. Function calls push a
//! [`FnFrame`] and wrap the callee body in a `Call` node.

mod builtins;
mod call;
mod expr;
mod hardware;
mod stmt;

use crate::definition::{DefinitionCache, FunctionDefinition};
use crate::heap::{ClassId, FunctionId, Heap, ScopeId};
use crate::intrinsics::IntrinsicRegistry;
use crate::prepared::{HookId, NodeId, NodeKind, PreparedTree};
use crate::value::HostValue;
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_source::{FrameArena, FrameId, SourceLoc};
use corvid_types::{ContextKind, ObjectDb, ObjectId, Operand, Primitive, Sensitivity};
use linked_hash_map::LinkedHashMap;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Calls nested deeper than this are reported as runaway recursion.
const MAX_CALL_DEPTH: usize = 64;

/// State shared by every lowering session of one design.
#[derive(Debug)]
pub struct LowerCx {
    /// Qualified objects; lowering declares temporaries and views here.
    pub objects: ObjectDb,
    /// Host objects.
    pub heap: Heap,
    /// Builtin names.
    pub registry: IntrinsicRegistry,
    /// Name classification of user functions.
    pub definitions: DefinitionCache,
    /// Virtual call frames.
    pub frames: FrameArena,
    /// The prepared nodes of all contexts.
    pub tree: PreparedTree,
}

impl LowerCx {
    /// Creates a session over existing objects and host values.
    pub fn new(objects: ObjectDb, heap: Heap, registry: IntrinsicRegistry) -> Self {
        Self {
            objects,
            heap,
            registry,
            definitions: DefinitionCache::new(),
            frames: FrameArena::new(),
            tree: PreparedTree::new(),
        }
    }
}

/// The result of lowering one context.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredContext {
    /// Root node: a `Call`, wrapped in a `Statemachine` for sequential
    /// contexts.
    pub root: NodeId,
    /// Expressions registered with `always(...)`.
    pub always: Vec<NodeId>,
    /// Sensitivity accumulated from `sensitivity_all`/`sensitivity_list`.
    pub sensitivity: Option<Sensitivity>,
    /// Frame of the context function.
    pub frame: FrameId,
}

/// How control leaves a statement at lowering time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Normal,
    Break,
    Continue,
    Return,
}

impl Flow {
    fn is_normal(self) -> bool {
        self == Flow::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopKind {
    /// A `while` emitted as a runtime loop.
    Runtime,
    /// A `for` unrolled at lowering time, entered at the given runtime
    /// branch depth.
    Unrolled(u32),
}

#[derive(Debug, Clone)]
struct ReturnPath {
    value: HostValue,
    hook: Option<HookId>,
}

/// One active user function.
#[derive(Debug)]
struct FnFrame {
    name: String,
    scope: ScopeId,
    definition: Rc<FunctionDefinition>,
    first_arg: Option<HostValue>,
    owner: Option<ClassId>,
    is_async: bool,
    frame: FrameId,
    runtime_depth: u32,
    loops: Vec<LoopKind>,
    returns: Vec<ReturnPath>,
    // Names bound differently by the arms of a runtime branch.
    ambiguous: BTreeSet<String>,
}

/// Lowers one synthesizable context.
pub struct Lowerer<'a> {
    cx: &'a mut LowerCx,
    kind: ContextKind,
    stack: Vec<FnFrame>,
    sinks: Vec<Vec<NodeId>>,
    always: Vec<NodeId>,
    sensitivity: Option<Sensitivity>,
    loc: SourceLoc,
    root_frame: Option<FrameId>,
    awaiting: bool,
}

impl<'a> Lowerer<'a> {
    /// Creates a lowerer for a context of the given kind.
    pub fn new(cx: &'a mut LowerCx, kind: ContextKind) -> Self {
        Self {
            cx,
            kind,
            stack: Vec::new(),
            sinks: Vec::new(),
            always: Vec::new(),
            sensitivity: None,
            loc: SourceLoc::DUMMY,
            root_frame: None,
            awaiting: false,
        }
    }

    /// Lowers `function` as the body of a context. The function is called
    /// without arguments; parameters must have defaults.
    pub fn lower_context(mut self, function: FunctionId) -> CompileResult<LoweredContext> {
        let def = self.cx.heap.functions[function].def.clone();
        log::debug!("lowering {} context `{}`", self.kind.as_str(), def.name);
        self.loc = def.loc;
        if def.is_async && self.kind == ContextKind::Concurrent {
            return Err(CompileError::context(format!(
                "concurrent context `{}` cannot be async",
                def.name
            )));
        }
        self.awaiting = def.is_async;
        self.sinks.push(Vec::new());
        let result = self.call_function(function, None, Vec::new(), Vec::new());
        let nodes = self.sinks.pop().unwrap_or_default();
        let value = result?;
        if !matches!(value, HostValue::None) {
            log::warn!("return value of context `{}` is ignored", def.name);
        }
        let call = match nodes.as_slice() {
            [single] => *single,
            _ => {
                let body = self.block(nodes);
                self.node(
                    NodeKind::Call {
                        function: def.name.clone(),
                        body,
                    },
                    Vec::new(),
                )
            }
        };
        let root = match self.kind {
            ContextKind::Sequential => self.node(NodeKind::Statemachine { body: call }, Vec::new()),
            ContextKind::Concurrent => call,
        };
        let frame = match self.root_frame {
            Some(frame) => frame,
            None => self.cx.frames.push(None, def.name.clone(), def.loc),
        };
        Ok(LoweredContext {
            root,
            always: self.always,
            sensitivity: self.sensitivity,
            frame,
        })
    }

    fn frame(&self) -> CompileResult<&FnFrame> {
        self.stack
            .last()
            .ok_or_else(|| CompileError::sanity("no active function frame"))
    }

    fn frame_mut(&mut self) -> CompileResult<&mut FnFrame> {
        self.stack
            .last_mut()
            .ok_or_else(|| CompileError::sanity("no active function frame"))
    }

    fn scope(&self) -> CompileResult<ScopeId> {
        Ok(self.frame()?.scope)
    }

    fn current_frame(&mut self) -> FrameId {
        match self.stack.last() {
            Some(f) => {
                let fid = f.frame;
                self.cx.frames.relocate(fid, self.loc)
            }
            None => self.cx.frames.push(None, "<context>", self.loc),
        }
    }

    /// Attaches the current virtual call chain to `err`.
    fn located(&mut self, err: CompileError) -> CompileError {
        if !err.trace.is_empty() {
            return err;
        }
        let fid = self.current_frame();
        let chain = self.cx.frames.chain(fid);
        err.with_trace(chain)
    }

    /// Creates a node without placing it in a sink.
    fn node(&mut self, kind: NodeKind, bound: Vec<NodeId>) -> NodeId {
        let frame = self.current_frame();
        self.cx.tree.add(kind, bound, self.loc, frame)
    }

    /// Creates a node and appends it to the current sink.
    fn emit(&mut self, kind: NodeKind) -> CompileResult<NodeId> {
        self.emit_bound(kind, Vec::new())
    }

    fn emit_bound(&mut self, kind: NodeKind, bound: Vec<NodeId>) -> CompileResult<NodeId> {
        let id = self.node(kind, bound);
        self.sinks
            .last_mut()
            .ok_or_else(|| CompileError::sanity("no active node sink"))?
            .push(id);
        Ok(id)
    }

    fn block(&mut self, nodes: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::CodeBlock(nodes), Vec::new())
    }

    /// Runs `f` with a fresh sink and returns its result with the nodes it
    /// emitted.
    fn capture<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> CompileResult<T>,
    ) -> CompileResult<(T, Vec<NodeId>)> {
        self.sinks.push(Vec::new());
        let result = f(self);
        let nodes = self.sinks.pop().unwrap_or_default();
        result.map(|v| (v, nodes))
    }

    /// Like [`Lowerer::capture`], inside a runtime branch.
    fn branch<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> CompileResult<T>,
    ) -> CompileResult<(T, Vec<NodeId>)> {
        self.frame_mut()?.runtime_depth += 1;
        let result = self.capture(f);
        if let Ok(frame) = self.frame_mut() {
            frame.runtime_depth -= 1;
        }
        result
    }

    fn temporary(&mut self, ty: Primitive) -> ObjectId {
        let id = self.cx.objects.temporary(ty);
        self.cx.objects.get_mut(id).loc = self.loc;
        id
    }

    fn require_sequential(&self, what: &str) -> CompileResult<()> {
        match self.kind {
            ContextKind::Sequential => Ok(()),
            ContextKind::Concurrent => Err(CompileError::context(format!(
                "{what} is only allowed in sequential contexts"
            ))),
        }
    }

    /// Snapshot of the local bindings, taken before a runtime branch.
    fn snapshot(&self) -> CompileResult<LinkedHashMap<String, HostValue>> {
        let scope = self.scope()?;
        Ok(self.cx.heap.scopes[scope].vars.clone())
    }

    fn restore(&mut self, snapshot: &LinkedHashMap<String, HostValue>) -> CompileResult<()> {
        let scope = self.scope()?;
        self.cx.heap.scopes[scope].vars = snapshot.clone();
        Ok(())
    }

    /// Merges the local bindings left by the arms of a runtime branch.
    /// Names bound to the same value everywhere survive; others become
    /// unusable.
    fn reconcile(
        &mut self,
        before: &LinkedHashMap<String, HostValue>,
        arms: Vec<LinkedHashMap<String, HostValue>>,
    ) -> CompileResult<()> {
        let scope = self.scope()?;
        let mut merged = before.clone();
        let mut ambiguous = Vec::new();
        for name in before.keys() {
            let mut values = arms.iter().filter_map(|a| a.get(name));
            let first = values.next().cloned().unwrap_or(HostValue::Unbound);
            if values.all(|v| *v == first) {
                merged.insert(name.clone(), first);
            } else {
                merged.insert(name.clone(), HostValue::Unbound);
                ambiguous.push(name.clone());
            }
        }
        self.cx.heap.scopes[scope].vars = merged;
        self.frame_mut()?.ambiguous.extend(ambiguous);
        Ok(())
    }

    /// Converts a host value into an operand, materializing merged values.
    fn operand(&mut self, value: &HostValue) -> CompileResult<Operand> {
        if let HostValue::Merged(id) = value {
            return Ok(Operand::Object(self.materialize(*id)?));
        }
        value.to_operand().ok_or_else(|| {
            CompileError::type_error(format!(
                "a {} is not a hardware value",
                value.type_name()
            ))
        })
    }
}

