//! Rendering of object references, operands and expression statements.
//!
//! Expression statements write temporaries. A temporary written once and
//! read once, from inputs that cannot change between the two, is not
//! declared at all: its expression is rendered where it is read.

use crate::types::{convert, int_literal, literal, Expr, TypeNames};
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_ir::{BlockArena, BlockId, StmtKind};
use corvid_types::{
    BinOp, CompareOp, ConstValue, EventKind, ObjectDb, ObjectId, Operand, Order, Primitive, QualifierKind, RefSpec,
    UnaryOp, VecFamily,
};
use std::collections::{HashMap, HashSet};

/// Identifiers and types of one architecture.
#[derive(Debug, Default)]
pub(crate) struct Naming {
    /// VHDL identifier of every declared root object.
    pub names: HashMap<ObjectId, String>,
    /// Output ports and the buffer signal standing in for them.
    pub aliases: HashMap<ObjectId, ObjectId>,
    pub types: TypeNames,
}

impl Naming {
    /// The root an architecture reference resolves to.
    pub fn resolve(&self, objects: &ObjectDb, id: ObjectId) -> ObjectId {
        let root = objects.root(id);
        self.aliases.get(&root).copied().unwrap_or(root)
    }
}

/// Temporaries rendered at their single read, keyed by root.
pub(crate) type Inlines = HashMap<ObjectId, StmtKind>;

/// Finds the temporaries of the code below `roots` that can be inlined.
pub(crate) fn inline_candidates(code: &BlockArena, objects: &ObjectDb, roots: &[BlockId]) -> Inlines {
    let mut writers: HashMap<ObjectId, Vec<StmtKind>> = HashMap::new();
    let mut reads: HashMap<ObjectId, usize> = HashMap::new();
    let mut viewed: HashSet<ObjectId> = HashSet::new();
    for &root in roots {
        code.walk(root, &mut |_, stmt| {
            for id in stmt.kind.written() {
                let r = objects.root(id);
                if r != id {
                    viewed.insert(r);
                }
                writers.entry(r).or_default().push(stmt.kind.clone());
            }
            for id in stmt.kind.reads(objects) {
                let r = objects.root(id);
                if r != id {
                    viewed.insert(r);
                }
                *reads.entry(r).or_default() += 1;
            }
        });
    }
    let stable = |id: ObjectId| {
        let r = objects.root(id);
        match objects.kind(r) {
            QualifierKind::Temporary => writers.get(&r).is_some_and(|w| w.len() == 1),
            kind => kind.is_signal_like() || kind == QualifierKind::Generic,
        }
    };
    let mut out = Inlines::new();
    for (&obj, written_by) in &writers {
        if objects.kind(obj) != QualifierKind::Temporary || viewed.contains(&obj) {
            continue;
        }
        let [writer] = written_by.as_slice() else {
            continue;
        };
        if reads.get(&obj).copied() != Some(1) {
            continue;
        }
        let direct = match writer {
            StmtKind::SignalAssignment { target, .. } | StmtKind::VariableAssignment { target, .. } => {
                *target == obj
            }
            kind => kind.is_expression(),
        };
        let inputs = writer.reads(objects);
        if direct && inputs.iter().all(|&i| objects.root(i) != obj && stable(i)) {
            out.insert(obj, writer.clone());
        }
    }
    out
}

/// Renders the operands of one context.
pub(crate) struct Renderer<'a> {
    pub objects: &'a ObjectDb,
    pub code: &'a BlockArena,
    pub naming: &'a Naming,
    pub inlined: &'a Inlines,
}

impl<'a> Renderer<'a> {
    pub fn is_inlined(&self, id: ObjectId) -> bool {
        self.inlined.contains_key(&id)
    }

    pub fn types(&self) -> &TypeNames {
        &self.naming.types
    }

    fn root_name(&self, id: ObjectId) -> CompileResult<&str> {
        let root = self.naming.resolve(self.objects, id);
        self.naming
            .names
            .get(&root)
            .map(String::as_str)
            .ok_or_else(|| CompileError::sanity(format!("{} has no VHDL name", self.objects.describe(root))))
    }

    /// The storage `id` refers to, typed as stored: a facet view of an
    /// unsigned signal is still `unsigned` here.
    pub fn place(&self, id: ObjectId) -> CompileResult<Expr> {
        let mut text = self.root_name(id)?.to_string();
        let mut ty = self.objects.ty(self.objects.root(id)).clone();
        for spec in self.objects.chain(id) {
            match spec {
                RefSpec::Offset(index) => {
                    text = format!("{text}({index})");
                    ty = element(&ty)?;
                }
                RefSpec::DynamicOffset(index) => {
                    let index = convert(self.read(*index)?, &Primitive::integer())?;
                    text = format!("{text}({})", index.text);
                    ty = element(&ty)?;
                }
                RefSpec::Slice { high, low } => {
                    let range = match ty {
                        Primitive::BitVector { order: Order::Upto, .. } => format!("{low} to {high}"),
                        _ => format!("{high} downto {low}"),
                    };
                    text = format!("{text}({range})");
                    ty = sliced(&ty, high - low + 1)?;
                }
            }
        }
        Ok(Expr::atom(text, ty))
    }

    /// The value of `id` with the type of `id`.
    pub fn read(&self, id: ObjectId) -> CompileResult<Expr> {
        if let Some(writer) = self.inlined.get(&id) {
            return self.expression(writer);
        }
        convert(self.place(id)?, self.objects.ty(id))
    }

    pub fn operand(&self, operand: &Operand) -> CompileResult<Expr> {
        match operand {
            Operand::Object(id) => self.read(*id),
            Operand::Event { kind, signal } => self.event(*kind, *signal),
            Operand::Const(ConstValue::Int(i)) => Ok(int_literal(*i)),
            Operand::Const(c) => match c.primitive() {
                Some(ty) => literal(c, &ty, self.types()),
                None => Err(CompileError::sanity(format!("constant {c} needs a target type"))),
            },
        }
    }

    /// `operand` converted to `ty`; constants become literals of `ty`.
    pub fn operand_as(&self, operand: &Operand, ty: &Primitive) -> CompileResult<Expr> {
        match operand {
            Operand::Const(c) => literal(c, ty, self.types()),
            other => convert(self.operand(other)?, ty),
        }
    }

    /// The selector of a `case` or `select`: objects are used as stored,
    /// since VHDL wants a locally static subtype there.
    pub fn selector(&self, operand: &Operand) -> CompileResult<Expr> {
        match operand {
            Operand::Object(id) if !self.is_inlined(*id) => self.place(*id),
            other => self.operand(other),
        }
    }

    fn event(&self, kind: EventKind, signal: ObjectId) -> CompileResult<Expr> {
        let s = self.read(signal)?;
        Ok(match kind {
            EventKind::Rising => Expr::atom(format!("rising_edge({})", s.text), Primitive::Bool),
            EventKind::Falling => Expr::atom(format!("falling_edge({})", s.text), Primitive::Bool),
            EventKind::Both => Expr::atom(format!("{}'event", s.text), Primitive::Bool),
            EventKind::High => Expr::compound(format!("{} = '1'", s.wrapped()), Primitive::Bool),
            EventKind::Low => Expr::compound(format!("{} = '0'", s.wrapped()), Primitive::Bool),
        })
    }

    /// The value an expression statement, or a temporary initializer,
    /// computes.
    pub fn expression(&self, kind: &StmtKind) -> CompileResult<Expr> {
        let ty = |id: &ObjectId| self.objects.ty(*id).clone();
        match kind {
            StmtKind::SignalAssignment { target, source } | StmtKind::VariableAssignment { target, source } => {
                self.operand_as(source, &ty(target))
            }
            StmtKind::Boolean { arg, result } => convert(self.operand_as(arg, &Primitive::Bool)?, &ty(result)),
            StmtKind::UnaryOp { op, arg, result } => self.unary(*op, arg, &ty(result)),
            StmtKind::BinOp { op, lhs, rhs, result } => self.binary(*op, lhs, rhs, &ty(result)),
            StmtKind::Compare { op, lhs, rhs, result } => {
                let (l, r) = self.compared(lhs, rhs)?;
                let text = format!("{} {} {}", l.wrapped(), compare_symbol(*op), r.wrapped());
                convert(Expr::compound(text, Primitive::Bool), &ty(result))
            }
            StmtKind::All { args, result } => self.chain(args, "and", &ty(result)),
            StmtKind::Any { args, result } => self.chain(args, "or", &ty(result)),
            other => Err(CompileError::sanity(format!("{other:?} is not an expression"))),
        }
    }

    fn unary(&self, op: UnaryOp, arg: &Operand, result: &Primitive) -> CompileResult<Expr> {
        let e = match op {
            UnaryOp::Inv => {
                let a = self.operand_as(arg, result)?;
                Expr::compound(format!("not {}", a.wrapped()), result.clone())
            }
            UnaryOp::Neg => {
                let a = self.operand_as(arg, result)?;
                Expr::compound(format!("-{}", a.wrapped()), result.clone())
            }
            UnaryOp::Abs => {
                let a = self.operand_as(arg, result)?;
                Expr::atom(format!("abs({})", a.text), result.clone())
            }
            UnaryOp::Not => {
                let a = self.operand_as(arg, &Primitive::Bool)?;
                Expr::compound(format!("not {}", a.wrapped()), Primitive::Bool)
            }
            UnaryOp::Bool => self.operand_as(arg, &Primitive::Bool)?,
        };
        convert(e, result)
    }

    fn arithmetic_operand(&self, operand: &Operand, result: &Primitive) -> CompileResult<Expr> {
        match operand {
            Operand::Const(ConstValue::Int(i)) => Ok(int_literal(*i)),
            Operand::Const(c) => literal(c, result, self.types()),
            other => self.operand(other),
        }
    }

    fn binary(&self, op: BinOp, lhs: &Operand, rhs: &Operand, result: &Primitive) -> CompileResult<Expr> {
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                let l = self.arithmetic_operand(lhs, result)?;
                let r = self.arithmetic_operand(rhs, result)?;
                let symbol = match op {
                    BinOp::Add => "+",
                    BinOp::Sub => "-",
                    BinOp::Mul => "*",
                    BinOp::Div => "/",
                    _ => "mod",
                };
                Ok(Expr::compound(
                    format!("{} {symbol} {}", l.wrapped(), r.wrapped()),
                    result.clone(),
                ))
            }
            BinOp::And | BinOp::Or | BinOp::Xor => {
                let l = self.operand_as(lhs, result)?;
                let r = self.operand_as(rhs, result)?;
                let word = match op {
                    BinOp::And => "and",
                    BinOp::Or => "or",
                    _ => "xor",
                };
                Ok(Expr::compound(
                    format!("{} {word} {}", l.wrapped(), r.wrapped()),
                    result.clone(),
                ))
            }
            BinOp::Concat => {
                let part = |operand: &Operand| -> CompileResult<Expr> {
                    let e = self.operand(operand)?;
                    match e.ty.width() {
                        Some(w) if e.ty.is_vector() => convert(e, &Primitive::bit_vector(w)),
                        _ => Ok(e),
                    }
                };
                let (l, r) = (part(lhs)?, part(rhs)?);
                Ok(Expr::compound(
                    format!("{} & {}", l.wrapped(), r.wrapped()),
                    result.clone(),
                ))
            }
            BinOp::Shl | BinOp::Shr => {
                let func = if op == BinOp::Shl { "shift_left" } else { "shift_right" };
                let value = self.operand(lhs)?;
                let count = match rhs {
                    Operand::Const(ConstValue::Int(n)) => n.to_string(),
                    other => convert(self.operand(other)?, &Primitive::integer())?.text,
                };
                let text = match value.ty {
                    Primitive::BitVector { .. } => {
                        format!("std_logic_vector({func}(unsigned({}), {count}))", value.text)
                    }
                    _ => format!("{func}({}, {count})", value.text),
                };
                Ok(Expr::atom(text, result.clone()))
            }
        }
    }

    fn compared(&self, lhs: &Operand, rhs: &Operand) -> CompileResult<(Expr, Expr)> {
        let against = |c: &ConstValue, other: &Expr| match c {
            ConstValue::Int(i) if other.ty.is_numeric() => Ok(int_literal(*i)),
            c => literal(c, &other.ty, self.types()),
        };
        match (lhs, rhs) {
            (Operand::Const(c), other) if !matches!(other, Operand::Const(_)) => {
                let r = self.operand(other)?;
                Ok((against(c, &r)?, r))
            }
            (other, Operand::Const(c)) => {
                let l = self.operand(other)?;
                let r = against(c, &l)?;
                Ok((l, r))
            }
            _ => {
                let l = self.operand(lhs)?;
                let r = self.operand(rhs)?;
                match (&l.ty, &r.ty) {
                    (Primitive::Bit, Primitive::Bool) => Ok((l, convert(r, &Primitive::Bit)?)),
                    (Primitive::Bool, Primitive::Bit) => Ok((convert(l, &Primitive::Bit)?, r)),
                    _ => Ok((l, r)),
                }
            }
        }
    }

    fn chain(&self, args: &[Operand], word: &str, result: &Primitive) -> CompileResult<Expr> {
        let parts = args
            .iter()
            .map(|a| self.operand_as(a, result))
            .collect::<CompileResult<Vec<_>>>()?;
        match parts.as_slice() {
            [] => Err(CompileError::sanity(format!("`{word}` without operands"))),
            [single] => Ok(single.clone()),
            many => Ok(Expr::compound(
                many.iter().map(Expr::wrapped).collect::<Vec<_>>().join(&format!(" {word} ")),
                result.clone(),
            )),
        }
    }
}

fn compare_symbol(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "=",
        CompareOp::Ne => "/=",
        CompareOp::Lt => "<",
        CompareOp::Le => "<=",
        CompareOp::Gt => ">",
        CompareOp::Ge => ">=",
    }
}

fn element(ty: &Primitive) -> CompileResult<Primitive> {
    ty.element()
        .ok_or_else(|| CompileError::sanity(format!("{ty} cannot be indexed")))
}

fn sliced(ty: &Primitive, width: u32) -> CompileResult<Primitive> {
    match ty {
        Primitive::BitVector { order, .. } => Ok(Primitive::BitVector { width, order: *order }),
        Primitive::Unsigned { .. } => Ok(Primitive::vector(VecFamily::Unsigned, width)),
        Primitive::Signed { .. } => Ok(Primitive::vector(VecFamily::Signed, width)),
        other => Err(CompileError::sanity(format!("{other} cannot be sliced"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_ir::Stmt;
    use corvid_source::{FrameId, SourceLoc};
    use corvid_types::{Direction, ObjectDecl};

    struct Fixture {
        objects: ObjectDb,
        code: BlockArena,
        naming: Naming,
        root: BlockId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut code = BlockArena::new();
            let root = code.alloc(None, None);
            Self {
                objects: ObjectDb::new(),
                code,
                naming: Naming::default(),
                root,
            }
        }

        fn named(&mut self, decl: ObjectDecl, name: &str) -> ObjectId {
            let id = self.objects.declare(decl.named(name));
            self.naming.names.insert(id, name.to_string());
            id
        }

        fn push(&mut self, kind: StmtKind) {
            self.code.push(self.root, Stmt::new(kind, SourceLoc::DUMMY, FrameId::from_raw(0)));
        }
    }

    #[test]
    fn places_walk_the_view_chain() {
        let mut f = Fixture::new();
        let data = f.named(ObjectDecl::new(QualifierKind::Signal, Primitive::unsigned(8)), "data");
        let ix = f.named(ObjectDecl::new(QualifierKind::Signal, Primitive::unsigned(3)), "ix");
        let bit = f.objects.dynamic_offset(data, ix).unwrap();
        let low = f.objects.slice(data, 3, 0).unwrap();
        let inlined = Inlines::new();
        let r = Renderer {
            objects: &f.objects,
            code: &f.code,
            naming: &f.naming,
            inlined: &inlined,
        };
        assert_eq!(r.place(bit).unwrap().text, "data(to_integer(ix))");
        let slice = r.place(low).unwrap();
        assert_eq!(slice.text, "data(3 downto 0)");
        assert_eq!(slice.ty, Primitive::unsigned(4));
    }

    #[test]
    fn single_use_temporaries_are_inlined() {
        let mut f = Fixture::new();
        let q = f.named(ObjectDecl::new(QualifierKind::Signal, Primitive::Bit), "q");
        let t = f.objects.temporary(Primitive::Bit);
        f.push(StmtKind::UnaryOp {
            op: UnaryOp::Inv,
            arg: Operand::Object(q),
            result: t,
        });
        f.push(StmtKind::SignalAssignment {
            target: q,
            source: Operand::Object(t),
        });
        let inlined = inline_candidates(&f.code, &f.objects, &[f.root]);
        assert!(inlined.contains_key(&t));
        let r = Renderer {
            objects: &f.objects,
            code: &f.code,
            naming: &f.naming,
            inlined: &inlined,
        };
        assert_eq!(r.read(t).unwrap().text, "not q");
    }

    #[test]
    fn temporaries_reading_variables_stay_declared() {
        let mut f = Fixture::new();
        let v = f.named(ObjectDecl::new(QualifierKind::Variable, Primitive::unsigned(4)), "v");
        let t = f.objects.temporary(Primitive::unsigned(4));
        f.push(StmtKind::BinOp {
            op: BinOp::Add,
            lhs: Operand::Object(v),
            rhs: Operand::Const(ConstValue::Int(1)),
            result: t,
        });
        f.push(StmtKind::VariableAssignment {
            target: v,
            source: Operand::Object(t),
        });
        assert!(inline_candidates(&f.code, &f.objects, &[f.root]).is_empty());
    }

    #[test]
    fn comparisons_type_their_constants() {
        let mut f = Fixture::new();
        let op = f.named(
            ObjectDecl::new(QualifierKind::Port(Direction::Input), Primitive::unsigned(3)),
            "op",
        );
        let t = f.objects.temporary(Primitive::Bool);
        let inlined = Inlines::new();
        let r = Renderer {
            objects: &f.objects,
            code: &f.code,
            naming: &f.naming,
            inlined: &inlined,
        };
        let cmp = StmtKind::Compare {
            op: CompareOp::Eq,
            lhs: Operand::Object(op),
            rhs: Operand::Const(ConstValue::Int(2)),
            result: t,
        };
        assert_eq!(r.expression(&cmp).unwrap().text, "op = 2");
        let shifted = r
            .binary(
                BinOp::Shl,
                &Operand::Object(op),
                &Operand::Const(ConstValue::Int(1)),
                &Primitive::unsigned(3),
            )
            .unwrap();
        assert_eq!(shifted.text, "shift_left(op, 1)");
    }
}
