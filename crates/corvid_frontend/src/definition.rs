//! Name classification of user functions.
//!
//! Before a function is lowered, its body is scanned once to decide which
//! names are local (bound in the body) and which are free (resolved through
//! the closure). Results are cached per definition in a
//! [`DefinitionCache`] owned by the compiler context.

use crate::ast::{Comprehension, Expr, ExprKind, FStringPart, FunctionDef, Param, Pattern, Stmt, StmtKind};
use corvid_diagnostics::{CompileError, CompileResult};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

/// The classified names of one function definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDefinition {
    /// Function name.
    pub name: String,
    /// Names bound in the body, including parameters and nested `def`s.
    pub local_names: BTreeSet<String>,
    /// Free names read by the body or by nested functions.
    pub nonlocal_names: BTreeSet<String>,
    /// Names declared with `nonlocal`.
    pub declared_nonlocal: BTreeSet<String>,
}

impl FunctionDefinition {
    /// Classifies the names of `def`.
    pub fn classify(def: &FunctionDef) -> CompileResult<Self> {
        let mut c = Classifier::default();
        c.params(&def.params);
        c.block(&def.body)?;
        Ok(c.finish(def.name.clone()))
    }

    /// Returns `true` if `name` is bound in the function body.
    pub fn is_local(&self, name: &str) -> bool {
        self.local_names.contains(name)
    }
}

/// Memoized classifications keyed by definition identity.
#[derive(Debug, Default)]
pub struct DefinitionCache {
    entries: HashMap<*const FunctionDef, Rc<FunctionDefinition>>,
    // Keeps keyed definitions alive so addresses are never reused.
    keep: Vec<Rc<FunctionDef>>,
}

impl DefinitionCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached classification, computing it on first use.
    pub fn get(&mut self, def: &Rc<FunctionDef>) -> CompileResult<Rc<FunctionDefinition>> {
        let key = Rc::as_ptr(def);
        if let Some(entry) = self.entries.get(&key) {
            return Ok(entry.clone());
        }
        let entry = Rc::new(FunctionDefinition::classify(def)?);
        self.entries.insert(key, entry.clone());
        self.keep.push(def.clone());
        Ok(entry)
    }

    /// Number of cached definitions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing was classified yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Default)]
struct Classifier {
    stores: BTreeSet<String>,
    loads: BTreeSet<String>,
    nonlocal: BTreeSet<String>,
    // Every name touched so far, to detect late `nonlocal`.
    seen: BTreeSet<String>,
}

impl Classifier {
    fn finish(self, name: String) -> FunctionDefinition {
        let local_names: BTreeSet<String> = self
            .stores
            .iter()
            .filter(|n| !self.nonlocal.contains(*n))
            .cloned()
            .collect();
        let nonlocal_names = self
            .loads
            .iter()
            .chain(self.nonlocal.iter())
            .filter(|n| !local_names.contains(*n))
            .cloned()
            .collect();
        FunctionDefinition {
            name,
            local_names,
            nonlocal_names,
            declared_nonlocal: self.nonlocal,
        }
    }

    fn params(&mut self, params: &[Param]) {
        for p in params {
            self.store(&p.name);
        }
    }

    fn store(&mut self, name: &str) {
        self.stores.insert(name.to_string());
        self.seen.insert(name.to_string());
    }

    fn load(&mut self, name: &str) {
        self.loads.insert(name.to_string());
        self.seen.insert(name.to_string());
    }

    fn block(&mut self, body: &[Stmt]) -> CompileResult<()> {
        body.iter().try_for_each(|s| self.stmt(s))
    }

    fn target(&mut self, target: &Expr) {
        match &target.kind {
            ExprKind::Name(n) => self.store(n),
            ExprKind::Tuple(items) | ExprKind::List(items) => {
                items.iter().for_each(|t| self.target(t))
            }
            ExprKind::Starred(inner) => self.target(inner),
            _ => self.expr(target),
        }
    }

    fn stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        match &stmt.kind {
            StmtKind::Expr(e) => self.expr(e),
            StmtKind::Assign { targets, value } => {
                self.expr(value);
                targets.iter().for_each(|t| self.target(t));
            }
            StmtKind::AugAssign { target, value, .. } => {
                self.expr(value);
                // Augmented targets are read before they are written.
                self.expr(target);
                if let ExprKind::Name(n) = &target.kind {
                    if !self.stores.contains(n) && !self.nonlocal.contains(n) {
                        // `x <<= v` on a captured signal does not rebind `x`.
                        self.load(n);
                    }
                }
            }
            StmtKind::If { test, body, orelse } => {
                self.expr(test);
                self.block(body)?;
                self.block(orelse)?;
            }
            StmtKind::While { test, body } => {
                self.expr(test);
                self.block(body)?;
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                self.expr(iter);
                self.target(target);
                self.block(body)?;
                self.block(orelse)?;
            }
            StmtKind::Return(value) => {
                if let Some(v) = value {
                    self.expr(v);
                }
            }
            StmtKind::Assert { test, msg } => {
                self.expr(test);
                if let Some(m) = msg {
                    self.expr(m);
                }
            }
            StmtKind::FunctionDef(def) => {
                def.decorators.iter().for_each(|d| self.expr(d));
                def.params
                    .iter()
                    .filter_map(|p| p.default.as_ref())
                    .for_each(|d| self.expr(d));
                let inner = FunctionDefinition::classify(def)?;
                self.escalate(&inner);
                self.store(&def.name);
            }
            StmtKind::ClassDef(class) => {
                if let Some(base) = &class.base {
                    self.expr(base);
                }
                for item in &class.body {
                    if let StmtKind::FunctionDef(def) = &item.kind {
                        def.decorators.iter().for_each(|d| self.class_decorator(d));
                        let inner = FunctionDefinition::classify(def)?;
                        self.escalate(&inner);
                    }
                }
                self.store(&class.name);
            }
            StmtKind::Nonlocal(names) => {
                for n in names {
                    if self.seen.contains(n) {
                        return Err(CompileError::scope(format!(
                            "name `{n}` is used prior to nonlocal declaration"
                        )));
                    }
                    self.nonlocal.insert(n.clone());
                }
            }
            StmtKind::Match { subject, cases } => {
                self.expr(subject);
                for case in cases {
                    self.pattern(&case.pattern);
                    self.block(&case.body)?;
                }
            }
            StmtKind::Break | StmtKind::Continue | StmtKind::Pass => {}
        }
        Ok(())
    }

    // Decorators like `@value.setter` inside a class refer to class-body
    // names, not to the enclosing function.
    fn class_decorator(&mut self, expr: &Expr) {
        if let ExprKind::Name(n) = &expr.kind {
            self.load(n);
        }
    }

    fn pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Value(e) => self.expr(e),
            Pattern::As(Some(n)) => self.store(n),
            Pattern::As(None) => {}
            Pattern::Or(items) => items.iter().for_each(|p| self.pattern(p)),
        }
    }

    fn escalate(&mut self, inner: &FunctionDefinition) {
        for n in &inner.nonlocal_names {
            self.load(n);
        }
    }

    fn comprehension(&mut self, generators: &[Comprehension], elts: &[&Expr]) {
        let mut inner = Classifier::default();
        for g in generators {
            self.expr(&g.iter);
            inner.target(&g.target);
            g.ifs.iter().for_each(|e| inner.expr(e));
        }
        elts.iter().for_each(|e| inner.expr(e));
        for n in inner.loads.difference(&inner.stores) {
            self.load(n);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Name(n) => self.load(n),
            ExprKind::Literal(_) => {}
            ExprKind::Attribute { value, .. } | ExprKind::Await(value) | ExprKind::Starred(value) => {
                self.expr(value)
            }
            ExprKind::Subscript { value, index } => {
                self.expr(value);
                self.expr(index);
            }
            ExprKind::Slice { lower, upper, step } => {
                for e in [lower, upper, step].into_iter().flatten() {
                    self.expr(e);
                }
            }
            ExprKind::BinOp { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            ExprKind::UnaryOp { operand, .. } => self.expr(operand),
            ExprKind::Compare { left, rest } => {
                self.expr(left);
                rest.iter().for_each(|(_, e)| self.expr(e));
            }
            ExprKind::BoolOp { values, .. } | ExprKind::Tuple(values) | ExprKind::List(values) => {
                values.iter().for_each(|e| self.expr(e))
            }
            ExprKind::IfExp { test, body, orelse } => {
                self.expr(test);
                self.expr(body);
                self.expr(orelse);
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => {
                self.expr(func);
                args.iter().for_each(|e| self.expr(e));
                keywords.iter().for_each(|(_, e)| self.expr(e));
            }
            ExprKind::Dict(items) => {
                for (k, v) in items {
                    self.expr(k);
                    self.expr(v);
                }
            }
            ExprKind::ListComp { elt, generators } => self.comprehension(generators, &[elt]),
            ExprKind::DictComp {
                key,
                value,
                generators,
            } => self.comprehension(generators, &[key, value]),
            ExprKind::Lambda { params, body } => {
                let mut inner = Classifier::default();
                inner.params(params);
                inner.expr(body);
                for n in inner.loads.difference(&inner.stores) {
                    self.load(n);
                }
            }
            ExprKind::FString { parts, .. } => {
                for part in parts {
                    if let FStringPart::Expr { expr, .. } = part {
                        self.expr(expr);
                    }
                }
            }
        }
    }
}
