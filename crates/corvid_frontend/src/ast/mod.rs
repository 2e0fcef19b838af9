//! The host AST consumed by the lowerer.
//!
//! The host parser is an external collaborator; this module is the shape of
//! its output. Every node carries a [`SourceLoc`]. Tests and embedders build
//! trees with the helpers in [`build`].

pub mod build;

use corvid_source::SourceLoc;
use std::rc::Rc;

/// A statement with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// What the statement is.
    pub kind: StmtKind,
    /// Where it was written.
    pub loc: SourceLoc,
}

/// An expression with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// What the expression is.
    pub kind: ExprKind,
    /// Where it was written.
    pub loc: SourceLoc,
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Parameter name.
    pub name: String,
    /// Default value expression, evaluated at definition time.
    pub default: Option<Expr>,
}

/// A `def` or `async def`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    /// Function name.
    pub name: String,
    /// Positional-or-keyword parameters.
    pub params: Vec<Param>,
    /// Body statements.
    pub body: Vec<Stmt>,
    /// `async def`.
    pub is_async: bool,
    /// Decorator expressions, outermost first.
    pub decorators: Vec<Expr>,
    /// Location of the `def` line.
    pub loc: SourceLoc,
}

/// A `class` definition.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    /// Class name.
    pub name: String,
    /// Base class expression.
    pub base: Option<Expr>,
    /// Body statements (methods and class attributes).
    pub body: Vec<Stmt>,
    /// Location of the `class` line.
    pub loc: SourceLoc,
}

/// One `case` of a `match`.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCase {
    /// The pattern.
    pub pattern: Pattern,
    /// Statements run on match.
    pub body: Vec<Stmt>,
}

/// The supported `match` patterns.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// `case <expr>:` compares for equality.
    Value(Expr),
    /// `case _:` or `case name:` matches anything.
    As(Option<String>),
    /// `case a | b:`
    Or(Vec<Pattern>),
}

/// A `for` clause of a comprehension.
#[derive(Debug, Clone, PartialEq)]
pub struct Comprehension {
    /// Loop target.
    pub target: Expr,
    /// Iterated expression.
    pub iter: Expr,
    /// Filters; must fold to constants.
    pub ifs: Vec<Expr>,
}

/// A piece of an f-string.
#[derive(Debug, Clone, PartialEq)]
pub enum FStringPart {
    /// Literal text.
    Text(String),
    /// An interpolated expression. `target` selects the written form of an
    /// object reference (`{x!t}`).
    Expr {
        /// The interpolated value.
        expr: Expr,
        /// Format the reference as an assignment target.
        target: bool,
    },
}

/// Statement kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// An expression evaluated for its side effects.
    Expr(Expr),
    /// `a = b = value`
    Assign {
        /// Targets, assigned left to right.
        targets: Vec<Expr>,
        /// Assigned value.
        value: Expr,
    },
    /// `target op= value`
    AugAssign {
        /// The target.
        target: Expr,
        /// The operator.
        op: HostBinOp,
        /// The right-hand side.
        value: Expr,
    },
    /// `if test: body else: orelse`
    If {
        /// Condition.
        test: Expr,
        /// Taken branch.
        body: Vec<Stmt>,
        /// Other branch (`elif` chains nest here).
        orelse: Vec<Stmt>,
    },
    /// `while test: body`
    While {
        /// Loop condition.
        test: Expr,
        /// Loop body.
        body: Vec<Stmt>,
    },
    /// `for target in iter: body else: orelse`
    For {
        /// Loop target.
        target: Expr,
        /// Iterated expression.
        iter: Expr,
        /// Loop body.
        body: Vec<Stmt>,
        /// Runs when the loop was not broken.
        orelse: Vec<Stmt>,
    },
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `return [value]`
    Return(Option<Expr>),
    /// `pass`
    Pass,
    /// `assert test[, msg]`
    Assert {
        /// Condition.
        test: Expr,
        /// Message.
        msg: Option<Expr>,
    },
    /// Nested function definition.
    FunctionDef(Rc<FunctionDef>),
    /// Nested class definition.
    ClassDef(Rc<ClassDef>),
    /// `nonlocal a, b`
    Nonlocal(Vec<String>),
    /// `match subject: cases`
    Match {
        /// Matched value.
        subject: Expr,
        /// Cases in order.
        cases: Vec<MatchCase>,
    },
}

/// Host binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostBinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mult,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `<<`
    LShift,
    /// `>>`
    RShift,
    /// `@`
    MatMult,
}

/// Host unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostUnaryOp {
    /// `not`
    Not,
    /// `~`
    Invert,
    /// unary `-`
    USub,
    /// unary `+`
    UAdd,
}

/// Host comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCmpOp {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtE,
    /// `>`
    Gt,
    /// `>=`
    GtE,
    /// `is`
    Is,
    /// `is not`
    IsNot,
    /// `in`
    In,
    /// `not in`
    NotIn,
}

/// `and` / `or`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOpKind {
    /// `and`
    And,
    /// `or`
    Or,
}

/// Host literals.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `None`
    None,
    /// `True` / `False`
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// String literal.
    Str(String),
}

/// Expression kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// A name reference.
    Name(String),
    /// A literal.
    Literal(Literal),
    /// `value.attr`
    Attribute {
        /// Owner.
        value: Box<Expr>,
        /// Attribute name.
        attr: String,
    },
    /// `value[index]`
    Subscript {
        /// Indexed value.
        value: Box<Expr>,
        /// Index; a [`ExprKind::Slice`] for `a[hi:lo]`.
        index: Box<Expr>,
    },
    /// `lower:upper[:step]`, only valid as a subscript index.
    Slice {
        /// Start.
        lower: Option<Box<Expr>>,
        /// Stop.
        upper: Option<Box<Expr>>,
        /// Step.
        step: Option<Box<Expr>>,
    },
    /// `left op right`
    BinOp {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: HostBinOp,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `op operand`
    UnaryOp {
        /// Operator.
        op: HostUnaryOp,
        /// Operand.
        operand: Box<Expr>,
    },
    /// `left op1 c1 op2 c2 ...`
    Compare {
        /// First operand.
        left: Box<Expr>,
        /// Remaining operators and operands.
        rest: Vec<(HostCmpOp, Expr)>,
    },
    /// `a and b and c`
    BoolOp {
        /// `and` or `or`.
        op: BoolOpKind,
        /// Operands, at least two.
        values: Vec<Expr>,
    },
    /// `body if test else orelse`
    IfExp {
        /// Condition.
        test: Box<Expr>,
        /// Value when true.
        body: Box<Expr>,
        /// Value when false.
        orelse: Box<Expr>,
    },
    /// `func(args, key=value)`
    Call {
        /// Callee.
        func: Box<Expr>,
        /// Positional arguments; may contain [`ExprKind::Starred`].
        args: Vec<Expr>,
        /// Keyword arguments.
        keywords: Vec<(String, Expr)>,
    },
    /// `await value`
    Await(Box<Expr>),
    /// `(a, b)`
    Tuple(Vec<Expr>),
    /// `[a, b]`
    List(Vec<Expr>),
    /// `{k: v}`
    Dict(Vec<(Expr, Expr)>),
    /// `[elt for ...]`
    ListComp {
        /// Produced element.
        elt: Box<Expr>,
        /// Generator clauses.
        generators: Vec<Comprehension>,
    },
    /// `{k: v for ...}`
    DictComp {
        /// Produced key.
        key: Box<Expr>,
        /// Produced value.
        value: Box<Expr>,
        /// Generator clauses.
        generators: Vec<Comprehension>,
    },
    /// `lambda params: body`
    Lambda {
        /// Parameters.
        params: Vec<Param>,
        /// Body expression.
        body: Box<Expr>,
    },
    /// `*value` in a call or list.
    Starred(Box<Expr>),
    /// An f-string. `hdl` is set for inline-code strings (`vhdl(f"...")`).
    FString {
        /// Text and interpolations.
        parts: Vec<FStringPart>,
        /// Target language of inline code.
        hdl: Option<String>,
    },
}

impl Expr {
    /// Returns the name if this is a plain name reference.
    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(n) => Some(n),
            _ => None,
        }
    }
}
