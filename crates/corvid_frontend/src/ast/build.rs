//! Terse constructors for host ASTs.
//!
//! Nodes are created with [`SourceLoc::DUMMY`]; [`number_lines`] assigns
//! consecutive line numbers of one file so diagnostics point somewhere.

use super::*;
use corvid_source::FileId;

fn e(kind: ExprKind) -> Expr {
    Expr {
        kind,
        loc: SourceLoc::DUMMY,
    }
}

fn s(kind: StmtKind) -> Stmt {
    Stmt {
        kind,
        loc: SourceLoc::DUMMY,
    }
}

/// `name`
pub fn name(n: &str) -> Expr {
    e(ExprKind::Name(n.to_string()))
}

/// Integer literal.
pub fn int(v: i64) -> Expr {
    e(ExprKind::Literal(Literal::Int(v)))
}

/// `True` / `False`.
pub fn boolean(v: bool) -> Expr {
    e(ExprKind::Literal(Literal::Bool(v)))
}

/// String literal.
pub fn string(v: &str) -> Expr {
    e(ExprKind::Literal(Literal::Str(v.to_string())))
}

/// `None`
pub fn none() -> Expr {
    e(ExprKind::Literal(Literal::None))
}

/// `value.attr`
pub fn attr(value: Expr, attr: &str) -> Expr {
    e(ExprKind::Attribute {
        value: Box::new(value),
        attr: attr.to_string(),
    })
}

/// `value[index]`
pub fn index(value: Expr, index: Expr) -> Expr {
    e(ExprKind::Subscript {
        value: Box::new(value),
        index: Box::new(index),
    })
}

/// `lower:upper`
pub fn slice(lower: Option<Expr>, upper: Option<Expr>) -> Expr {
    e(ExprKind::Slice {
        lower: lower.map(Box::new),
        upper: upper.map(Box::new),
        step: None,
    })
}

/// `func(args...)`
pub fn call(func: Expr, args: Vec<Expr>) -> Expr {
    call_kw(func, args, Vec::new())
}

/// `func(args..., key=value...)`
pub fn call_kw(func: Expr, args: Vec<Expr>, keywords: Vec<(&str, Expr)>) -> Expr {
    e(ExprKind::Call {
        func: Box::new(func),
        args,
        keywords: keywords
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    })
}

/// `value.method(args...)`
pub fn method(value: Expr, method: &str, args: Vec<Expr>) -> Expr {
    call(attr(value, method), args)
}

/// `left op right`
pub fn binop(left: Expr, op: HostBinOp, right: Expr) -> Expr {
    e(ExprKind::BinOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
    })
}

/// `left + right`
pub fn add(left: Expr, right: Expr) -> Expr {
    binop(left, HostBinOp::Add, right)
}

/// `left - right`
pub fn sub(left: Expr, right: Expr) -> Expr {
    binop(left, HostBinOp::Sub, right)
}

/// `left & right`
pub fn bit_and(left: Expr, right: Expr) -> Expr {
    binop(left, HostBinOp::BitAnd, right)
}

/// `left | right`
pub fn bit_or(left: Expr, right: Expr) -> Expr {
    binop(left, HostBinOp::BitOr, right)
}

/// `left @ right` (concatenation)
pub fn concat(left: Expr, right: Expr) -> Expr {
    binop(left, HostBinOp::MatMult, right)
}

/// `op operand`
pub fn unary(op: HostUnaryOp, operand: Expr) -> Expr {
    e(ExprKind::UnaryOp {
        op,
        operand: Box::new(operand),
    })
}

/// `not operand`
pub fn not(operand: Expr) -> Expr {
    unary(HostUnaryOp::Not, operand)
}

/// `~operand`
pub fn invert(operand: Expr) -> Expr {
    unary(HostUnaryOp::Invert, operand)
}

/// `left op right`
pub fn cmp(left: Expr, op: HostCmpOp, right: Expr) -> Expr {
    e(ExprKind::Compare {
        left: Box::new(left),
        rest: vec![(op, right)],
    })
}

/// `left == right`
pub fn eq(left: Expr, right: Expr) -> Expr {
    cmp(left, HostCmpOp::Eq, right)
}

/// `a and b ...`
pub fn and(values: Vec<Expr>) -> Expr {
    e(ExprKind::BoolOp {
        op: BoolOpKind::And,
        values,
    })
}

/// `a or b ...`
pub fn or(values: Vec<Expr>) -> Expr {
    e(ExprKind::BoolOp {
        op: BoolOpKind::Or,
        values,
    })
}

/// `body if test else orelse`
pub fn if_exp(test: Expr, body: Expr, orelse: Expr) -> Expr {
    e(ExprKind::IfExp {
        test: Box::new(test),
        body: Box::new(body),
        orelse: Box::new(orelse),
    })
}

/// `await value`
pub fn await_(value: Expr) -> Expr {
    e(ExprKind::Await(Box::new(value)))
}

/// `(items...)`
pub fn tuple(items: Vec<Expr>) -> Expr {
    e(ExprKind::Tuple(items))
}

/// `[items...]`
pub fn list(items: Vec<Expr>) -> Expr {
    e(ExprKind::List(items))
}

/// `{k: v, ...}`
pub fn dict(items: Vec<(Expr, Expr)>) -> Expr {
    e(ExprKind::Dict(items))
}

/// `[elt for target in iter]`
pub fn list_comp(elt: Expr, target: Expr, iter: Expr) -> Expr {
    e(ExprKind::ListComp {
        elt: Box::new(elt),
        generators: vec![Comprehension {
            target,
            iter,
            ifs: Vec::new(),
        }],
    })
}

/// `{key: value for target in iter}`
pub fn dict_comp(key: Expr, value: Expr, target: Expr, iter: Expr) -> Expr {
    e(ExprKind::DictComp {
        key: Box::new(key),
        value: Box::new(value),
        generators: vec![Comprehension {
            target,
            iter,
            ifs: Vec::new(),
        }],
    })
}

/// `lambda params: body`
pub fn lambda(names: &[&str], body: Expr) -> Expr {
    e(ExprKind::Lambda {
        params: params(names),
        body: Box::new(body),
    })
}

/// `*value`
pub fn starred(value: Expr) -> Expr {
    e(ExprKind::Starred(Box::new(value)))
}

/// A VHDL inline-code f-string.
pub fn vhdl(parts: Vec<FStringPart>) -> Expr {
    e(ExprKind::FString {
        parts,
        hdl: Some("vhdl".to_string()),
    })
}

/// Literal f-string text.
pub fn text(t: &str) -> FStringPart {
    FStringPart::Text(t.to_string())
}

/// An interpolated f-string value.
pub fn interp(expr: Expr) -> FStringPart {
    FStringPart::Expr {
        expr,
        target: false,
    }
}

/// Parameter list without defaults.
pub fn params(names: &[&str]) -> Vec<Param> {
    names
        .iter()
        .map(|n| Param {
            name: n.to_string(),
            default: None,
        })
        .collect()
}

/// An expression statement.
pub fn expr(value: Expr) -> Stmt {
    s(StmtKind::Expr(value))
}

/// `target = value`
pub fn assign(target: Expr, value: Expr) -> Stmt {
    s(StmtKind::Assign {
        targets: vec![target],
        value,
    })
}

/// `target op= value`
pub fn aug(target: Expr, op: HostBinOp, value: Expr) -> Stmt {
    s(StmtKind::AugAssign { target, op, value })
}

/// `target <<= value`
pub fn next(target: Expr, value: Expr) -> Stmt {
    aug(target, HostBinOp::LShift, value)
}

/// `target ^= value`
pub fn push(target: Expr, value: Expr) -> Stmt {
    aug(target, HostBinOp::BitXor, value)
}

/// `target @= value`
pub fn value(target: Expr, value: Expr) -> Stmt {
    aug(target, HostBinOp::MatMult, value)
}

/// `if test: body else: orelse`
pub fn if_(test: Expr, body: Vec<Stmt>, orelse: Vec<Stmt>) -> Stmt {
    s(StmtKind::If { test, body, orelse })
}

/// `while test: body`
pub fn while_(test: Expr, body: Vec<Stmt>) -> Stmt {
    s(StmtKind::While { test, body })
}

/// `for target in iter: body`
pub fn for_(target: Expr, iter: Expr, body: Vec<Stmt>) -> Stmt {
    s(StmtKind::For {
        target,
        iter,
        body,
        orelse: Vec::new(),
    })
}

/// `break`
pub fn break_() -> Stmt {
    s(StmtKind::Break)
}

/// `continue`
pub fn continue_() -> Stmt {
    s(StmtKind::Continue)
}

/// `return [value]`
pub fn ret(value: Option<Expr>) -> Stmt {
    s(StmtKind::Return(value))
}

/// `pass`
pub fn pass() -> Stmt {
    s(StmtKind::Pass)
}

/// `assert test[, msg]`
pub fn assert_(test: Expr, msg: Option<&str>) -> Stmt {
    s(StmtKind::Assert {
        test,
        msg: msg.map(string),
    })
}

/// `nonlocal names...`
pub fn nonlocal(names: &[&str]) -> Stmt {
    s(StmtKind::Nonlocal(names.iter().map(|n| n.to_string()).collect()))
}

/// `match subject: cases`
pub fn match_(subject: Expr, cases: Vec<MatchCase>) -> Stmt {
    s(StmtKind::Match { subject, cases })
}

/// `case value:`
pub fn case(value: Expr, body: Vec<Stmt>) -> MatchCase {
    MatchCase {
        pattern: Pattern::Value(value),
        body,
    }
}

/// `case _:`
pub fn case_default(body: Vec<Stmt>) -> MatchCase {
    MatchCase {
        pattern: Pattern::As(None),
        body,
    }
}

/// A function definition.
pub fn function(name: &str, params: Vec<Param>, body: Vec<Stmt>) -> FunctionDef {
    FunctionDef {
        name: name.to_string(),
        params,
        body,
        is_async: false,
        decorators: Vec::new(),
        loc: SourceLoc::DUMMY,
    }
}

/// An `async def`.
pub fn async_function(name: &str, params: Vec<Param>, body: Vec<Stmt>) -> FunctionDef {
    FunctionDef {
        is_async: true,
        ..function(name, params, body)
    }
}

/// A nested `def` statement.
pub fn def(def: FunctionDef) -> Stmt {
    s(StmtKind::FunctionDef(Rc::new(def)))
}

/// A nested `class` statement.
pub fn class(name: &str, base: Option<Expr>, body: Vec<Stmt>) -> Stmt {
    s(StmtKind::ClassDef(Rc::new(ClassDef {
        name: name.to_string(),
        base,
        body,
        loc: SourceLoc::DUMMY,
    })))
}

/// Assigns line numbers of `file` to a function and everything inside it,
/// starting at `first_line` for the `def` line.
pub fn number_lines(def: &mut FunctionDef, file: FileId, first_line: u32) -> u32 {
    def.loc = SourceLoc::new(file, first_line, 1);
    number_block(&mut def.body, file, first_line + 1, 5)
}

fn number_block(body: &mut [Stmt], file: FileId, mut line: u32, column: u32) -> u32 {
    for stmt in body {
        let loc = SourceLoc::new(file, line, column);
        stmt.loc = loc;
        line += 1;
        match &mut stmt.kind {
            StmtKind::Expr(value) => number_expr(value, loc),
            StmtKind::Assign { targets, value } => {
                targets.iter_mut().for_each(|t| number_expr(t, loc));
                number_expr(value, loc);
            }
            StmtKind::AugAssign { target, value, .. } => {
                number_expr(target, loc);
                number_expr(value, loc);
            }
            StmtKind::If { test, body, orelse } => {
                number_expr(test, loc);
                line = number_block(body, file, line, column + 4);
                if !orelse.is_empty() {
                    line = number_block(orelse, file, line + 1, column + 4);
                }
            }
            StmtKind::While { test, body } => {
                number_expr(test, loc);
                line = number_block(body, file, line, column + 4);
            }
            StmtKind::For {
                target,
                iter,
                body,
                orelse,
            } => {
                number_expr(target, loc);
                number_expr(iter, loc);
                line = number_block(body, file, line, column + 4);
                if !orelse.is_empty() {
                    line = number_block(orelse, file, line + 1, column + 4);
                }
            }
            StmtKind::Return(Some(value)) => number_expr(value, loc),
            StmtKind::Assert { test, .. } => number_expr(test, loc),
            StmtKind::FunctionDef(def) => {
                let def = Rc::make_mut(def);
                def.loc = loc;
                line = number_block(&mut def.body, file, line, column + 4);
            }
            StmtKind::ClassDef(class) => {
                let class = Rc::make_mut(class);
                class.loc = loc;
                line = number_block(&mut class.body, file, line, column + 4);
            }
            StmtKind::Match { subject, cases } => {
                number_expr(subject, loc);
                for case in cases {
                    line = number_block(&mut case.body, file, line + 1, column + 8);
                }
            }
            StmtKind::Return(None)
            | StmtKind::Break
            | StmtKind::Continue
            | StmtKind::Pass
            | StmtKind::Nonlocal(_) => {}
        }
    }
    line
}

fn number_expr(expr: &mut Expr, loc: SourceLoc) {
    expr.loc = loc;
    match &mut expr.kind {
        ExprKind::Attribute { value, .. } | ExprKind::Await(value) | ExprKind::Starred(value) => {
            number_expr(value, loc)
        }
        ExprKind::Subscript { value, index } => {
            number_expr(value, loc);
            number_expr(index, loc);
        }
        ExprKind::BinOp { left, right, .. } => {
            number_expr(left, loc);
            number_expr(right, loc);
        }
        ExprKind::UnaryOp { operand, .. } => number_expr(operand, loc),
        ExprKind::Compare { left, rest } => {
            number_expr(left, loc);
            rest.iter_mut().for_each(|(_, r)| number_expr(r, loc));
        }
        ExprKind::BoolOp { values, .. } | ExprKind::Tuple(values) | ExprKind::List(values) => {
            values.iter_mut().for_each(|v| number_expr(v, loc))
        }
        ExprKind::IfExp { test, body, orelse } => {
            number_expr(test, loc);
            number_expr(body, loc);
            number_expr(orelse, loc);
        }
        ExprKind::Call { func, args, keywords } => {
            number_expr(func, loc);
            args.iter_mut().for_each(|a| number_expr(a, loc));
            keywords.iter_mut().for_each(|(_, v)| number_expr(v, loc));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbering_walks_nested_blocks() {
        let mut f = function(
            "body",
            Vec::new(),
            vec![
                if_(name("c"), vec![pass(), pass()], vec![pass()]),
                ret(None),
            ],
        );
        let file = FileId::from_raw(0);
        let end = number_lines(&mut f, file, 10);
        assert_eq!(f.loc.line, 10);
        assert_eq!(f.body[0].loc.line, 11);
        let StmtKind::If { body, orelse, .. } = &f.body[0].kind else {
            panic!("expected if");
        };
        assert_eq!(body[1].loc.line, 13);
        assert_eq!(orelse[0].loc.line, 15);
        assert_eq!(f.body[1].loc.line, 16);
        assert_eq!(end, 17);
    }

    #[test]
    fn aug_assign_helpers() {
        let stmt = next(name("q"), name("d"));
        assert!(matches!(
            stmt.kind,
            StmtKind::AugAssign {
                op: HostBinOp::LShift,
                ..
            }
        ));
    }
}
