//! Lowering single contexts into prepared trees.

use corvid_diagnostics::{CompileResult, ErrorKind};
use corvid_frontend::ast::build::*;
use corvid_frontend::ast::{FunctionDef, HostBinOp};
use corvid_frontend::lower::{LowerCx, LoweredContext, Lowerer};
use corvid_frontend::{Design, FunctionId, NodeId, NodeKind, PreparedTree};
use corvid_types::{AssignMode, BinOp, ContextKind, Direction, EventKind, ObjectId, Operand, Primitive};

struct Fixture {
    cx: LowerCx,
    a: ObjectId,
    b: ObjectId,
    s: ObjectId,
    clk: ObjectId,
    y: ObjectId,
    function: FunctionId,
}

fn fixture(def: FunctionDef) -> Fixture {
    fixture_with(def, Vec::new())
}

fn fixture_with(def: FunctionDef, helpers: Vec<FunctionDef>) -> Fixture {
    let mut design = Design::new();
    let top = design.entity("top");
    let a = design.port(top, "a", Direction::Input, Primitive::bit_vector(4));
    let b = design.port(top, "b", Direction::Input, Primitive::bit_vector(4));
    let s = design.port(top, "s", Direction::Input, Primitive::Bit);
    let clk = design.port(top, "clk", Direction::Input, Primitive::Bit);
    let y = design.port(top, "y", Direction::Output, Primitive::bit_vector(4));
    for helper in helpers {
        design.define(top, helper);
    }
    let function = design.define(top, def);
    Fixture {
        cx: LowerCx::new(design.objects, design.heap, design.registry),
        a,
        b,
        s,
        clk,
        y,
        function,
    }
}

fn lower(f: &mut Fixture, kind: ContextKind) -> CompileResult<LoweredContext> {
    Lowerer::new(&mut f.cx, kind).lower_context(f.function)
}

/// Every node reachable from `root`, in pre-order.
fn walk(tree: &PreparedTree, root: NodeId) -> Vec<NodeKind> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let node = tree.node(id);
        out.push(node.kind.clone());
        let mut children: Vec<NodeId> = node.bound.clone();
        match &node.kind {
            NodeKind::CodeBlock(items) => children.extend(items),
            NodeKind::If { body, orelse, .. } | NodeKind::IfExpr { body, orelse, .. } => {
                children.extend([*body, *orelse])
            }
            NodeKind::While { body, .. }
            | NodeKind::Call { body, .. }
            | NodeKind::Statemachine { body } => children.push(*body),
            NodeKind::CondSelect { cases, default } => {
                for case in cases {
                    children.extend(case.bound.iter().copied());
                    children.push(case.body);
                }
                children.extend(default.iter().copied());
            }
            _ => {}
        }
        stack.extend(children.into_iter().rev());
    }
    out
}

fn assigns(kinds: &[NodeKind]) -> Vec<(ObjectId, Operand, AssignMode)> {
    kinds
        .iter()
        .filter_map(|k| match k {
            NodeKind::Assign {
                target,
                source,
                mode,
            } => Some((*target, source.clone(), *mode)),
            _ => None,
        })
        .collect()
}

#[test]
fn concurrent_operator_assignment() {
    let mut f = fixture(function(
        "logic",
        vec![],
        vec![next(name("y"), bit_and(name("a"), name("b")))],
    ));
    let ctx = lower(&mut f, ContextKind::Concurrent).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    let result = kinds
        .iter()
        .find_map(|k| match k {
            NodeKind::BinOp {
                op: BinOp::And,
                lhs,
                rhs,
                result,
            } => {
                assert_eq!(*lhs, Operand::Object(f.a));
                assert_eq!(*rhs, Operand::Object(f.b));
                Some(*result)
            }
            _ => None,
        })
        .expect("and node");
    assert_eq!(
        assigns(&kinds),
        vec![(f.y, Operand::Object(result), AssignMode::Next)]
    );
    assert!(ctx.always.is_empty());
}

#[test]
fn constant_conditions_lower_only_the_taken_branch() {
    let mut f = fixture(function(
        "logic",
        vec![],
        vec![if_(
            boolean(false),
            vec![next(name("y"), name("a"))],
            vec![next(name("y"), name("b"))],
        )],
    ));
    let ctx = lower(&mut f, ContextKind::Concurrent).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    assert_eq!(
        assigns(&kinds),
        vec![(f.y, Operand::Object(f.b), AssignMode::Next)]
    );
    assert!(!kinds.iter().any(|k| matches!(k, NodeKind::If { .. })));
}

#[test]
fn runtime_if_requires_sequential_context() {
    let body = vec![if_(
        name("s"),
        vec![next(name("y"), name("a"))],
        vec![],
    )];
    let mut f = fixture(function("logic", vec![], body.clone()));
    let err = lower(&mut f, ContextKind::Concurrent).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Context);
    assert!(!err.trace.is_empty());

    let mut f = fixture(function("proc", vec![], body));
    let ctx = lower(&mut f, ContextKind::Sequential).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    assert!(matches!(kinds[0], NodeKind::Statemachine { .. }));
    assert!(kinds
        .iter()
        .any(|k| matches!(k, NodeKind::If { test, .. } if *test == Operand::Object(f.s))));
}

#[test]
fn if_expression_redirects_into_target() {
    let mut f = fixture(function(
        "mux",
        vec![],
        vec![next(name("y"), if_exp(name("s"), name("a"), name("b")))],
    ));
    let ctx = lower(&mut f, ContextKind::Concurrent).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    let hooks = kinds
        .iter()
        .find_map(|k| match k {
            NodeKind::IfExpr { hooks, .. } => Some(*hooks),
            _ => None,
        })
        .expect("if expression");
    let then = &f.cx.tree.hook(hooks[0]).redirects;
    let orelse = &f.cx.tree.hook(hooks[1]).redirects;
    assert_eq!(then[0].target, f.y);
    assert_eq!(then[0].source, Operand::Object(f.a));
    assert_eq!(orelse[0].source, Operand::Object(f.b));
    assert!(assigns(&kinds).is_empty());
}

#[test]
fn for_loops_are_unrolled() {
    // for i in range(4): y[i] <<= a[3 - i]
    let mut f = fixture(function(
        "reverse",
        vec![],
        vec![for_(
            name("i"),
            call(name("range"), vec![int(4)]),
            vec![next(
                index(name("y"), name("i")),
                index(name("a"), sub(int(3), name("i"))),
            )],
        )],
    ));
    let ctx = lower(&mut f, ContextKind::Concurrent).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    let writes = assigns(&kinds);
    assert_eq!(writes.len(), 4);
    for (target, _, mode) in &writes {
        assert_eq!(f.cx.objects.root(*target), f.y);
        assert_eq!(*mode, AssignMode::Next);
    }
}

#[test]
fn async_loop_awaits_clock_edge() {
    // while True: await rising_edge(clk); y <<= ~y
    let mut f = fixture(async_function(
        "blink",
        vec![],
        vec![while_(
            boolean(true),
            vec![
                expr(await_(call(name("rising_edge"), vec![name("clk")]))),
                next(name("y"), invert(name("y"))),
            ],
        )],
    ));
    let ctx = lower(&mut f, ContextKind::Sequential).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    assert!(kinds.iter().any(|k| matches!(k, NodeKind::While { .. })));
    assert!(kinds.iter().any(|k| matches!(
        k,
        NodeKind::Await { test: Operand::Event { kind: EventKind::Rising, signal } } if *signal == f.clk
    )));
}

#[test]
fn while_needs_an_async_function() {
    let mut f = fixture(function(
        "spin",
        vec![],
        vec![while_(boolean(true), vec![pass()])],
    ));
    let err = lower(&mut f, ContextKind::Sequential).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ControlFlow);
}

#[test]
fn helper_calls_are_inlined() {
    let helper = function(
        "merge",
        params(&["x", "z"]),
        vec![ret(Some(bit_or(name("x"), name("z"))))],
    );
    let mut f = fixture_with(
        function(
            "logic",
            vec![],
            vec![next(name("y"), call(name("merge"), vec![name("a"), name("b")]))],
        ),
        vec![helper],
    );
    let ctx = lower(&mut f, ContextKind::Concurrent).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    assert!(kinds
        .iter()
        .any(|k| matches!(k, NodeKind::Call { function, .. } if function == "merge")));
    assert!(kinds
        .iter()
        .any(|k| matches!(k, NodeKind::BinOp { op: BinOp::Or, .. })));
}

#[test]
fn runaway_recursion_is_reported() {
    let helper = function("forever", vec![], vec![expr(call(name("forever"), vec![]))]);
    let mut f = fixture_with(
        function("logic", vec![], vec![expr(call(name("forever"), vec![]))]),
        vec![helper],
    );
    let err = lower(&mut f, ContextKind::Concurrent).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Sanity);
    assert!(err.message.contains("call depth"));
}

#[test]
fn undefined_names_are_scope_errors() {
    let mut f = fixture(function(
        "logic",
        vec![],
        vec![next(name("y"), name("missing"))],
    ));
    let err = lower(&mut f, ContextKind::Concurrent).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Scope);
    assert!(err.message.contains("missing"));
}

#[test]
fn failed_constant_assertion() {
    let mut f = fixture(function(
        "logic",
        vec![],
        vec![assert_(eq(int(1), int(2)), Some("widths differ"))],
    ));
    let err = lower(&mut f, ContextKind::Concurrent).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Sanity);
    assert_eq!(err.message, "assertion failed: widths differ");
}

#[test]
fn classes_hold_hardware_members() {
    // class Pair:
    //     def __init__(self, lo, hi): self.lo = lo; self.hi = hi
    //     def both(self): return self.lo & self.hi
    let init = function(
        "__init__",
        params(&["self", "lo", "hi"]),
        vec![
            assign(attr(name("self"), "lo"), name("lo")),
            assign(attr(name("self"), "hi"), name("hi")),
        ],
    );
    let both = function(
        "both",
        params(&["self"]),
        vec![ret(Some(bit_and(
            attr(name("self"), "lo"),
            attr(name("self"), "hi"),
        )))],
    );
    let mut f = fixture(function(
        "logic",
        vec![],
        vec![
            class("Pair", None, vec![def(init), def(both)]),
            assign(name("p"), call(name("Pair"), vec![name("a"), name("b")])),
            next(name("y"), method(name("p"), "both", vec![])),
        ],
    ));
    let ctx = lower(&mut f, ContextKind::Concurrent).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    assert!(kinds.iter().any(|k| matches!(
        k,
        NodeKind::BinOp { op: BinOp::And, lhs, rhs, .. }
            if *lhs == Operand::Object(f.a) && *rhs == Operand::Object(f.b)
    )));
}

#[test]
fn augmented_host_arithmetic_rebinds_locals() {
    // n = 1; n += 2; y <<= a[n]
    let mut f = fixture(function(
        "logic",
        vec![],
        vec![
            assign(name("n"), int(1)),
            aug(name("n"), HostBinOp::Add, int(2)),
            next(index(name("y"), int(0)), index(name("a"), name("n"))),
        ],
    ));
    let ctx = lower(&mut f, ContextKind::Concurrent).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    let (_, source, _) = assigns(&kinds).remove(0);
    let Operand::Object(view) = source else {
        panic!("expected a view of a");
    };
    assert_eq!(f.cx.objects.root(view), f.a);
    assert_eq!(
        f.cx.objects.chain(view),
        &[corvid_types::RefSpec::Offset(3)]
    );
}

#[test]
fn inline_vhdl_references_objects() {
    let mut f = fixture(function(
        "raw",
        vec![],
        vec![expr(vhdl(vec![text("-- reads "), interp(name("a"))]))],
    ));
    let ctx = lower(&mut f, ContextKind::Concurrent).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    assert!(kinds.iter().any(|k| matches!(
        k,
        NodeKind::InlineCode { parts, .. }
            if parts[1] == corvid_types::InlinePart::Read(f.a)
    )));
}

#[test]
fn edge_tests_need_bit_signals() {
    let mut f = fixture(async_function(
        "wait",
        vec![],
        vec![expr(await_(call(name("rising_edge"), vec![name("a")])))],
    ));
    let err = lower(&mut f, ContextKind::Sequential).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Intrinsic);
}

#[test]
fn merged_value_written_under_a_later_branch_is_joined() {
    // v = a if s else b
    // if clk: y <<= v
    let mut f = fixture(function(
        "late",
        vec![],
        vec![
            assign(name("v"), if_exp(name("s"), name("a"), name("b"))),
            if_(name("clk"), vec![next(name("y"), name("v"))], vec![]),
        ],
    ));
    let ctx = lower(&mut f, ContextKind::Sequential).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    let hooks = kinds
        .iter()
        .find_map(|k| match k {
            NodeKind::IfExpr { hooks, .. } => Some(*hooks),
            _ => None,
        })
        .expect("if expression");
    let then = &f.cx.tree.hook(hooks[0]).redirects;
    let orelse = &f.cx.tree.hook(hooks[1]).redirects;
    assert_eq!(then.len(), 1);
    let temp = then[0].target;
    assert_ne!(temp, f.y);
    assert_eq!(orelse[0].target, temp);
    assert_eq!(orelse[0].source, Operand::Object(f.b));
    assert_eq!(
        assigns(&kinds),
        vec![(f.y, Operand::Object(temp), AssignMode::Next)]
    );
}

#[test]
fn select_with_redirects_every_choice() {
    // y <<= select_with(s, {0: a, 1: b})
    let mut f = fixture(function(
        "pick",
        vec![],
        vec![next(
            name("y"),
            call(
                name("select_with"),
                vec![name("s"), dict(vec![(int(0), name("a")), (int(1), name("b"))])],
            ),
        )],
    ));
    let ctx = lower(&mut f, ContextKind::Concurrent).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    let (choices, default) = kinds
        .iter()
        .find_map(|k| match k {
            NodeKind::SelectWith { choices, default, .. } => Some((choices.clone(), *default)),
            _ => None,
        })
        .expect("select node");
    assert_eq!(choices.len(), 2);
    assert!(default.is_none());
    let first = &f.cx.tree.hook(choices[0].1).redirects;
    assert_eq!(first[0].target, f.y);
    assert_eq!(first[0].source, Operand::Object(f.a));
    assert!(assigns(&kinds).is_empty());
}

#[test]
fn select_with_default_gets_its_own_hook() {
    let mut f = fixture(function(
        "pick",
        vec![],
        vec![next(
            name("y"),
            call_kw(
                name("select_with"),
                vec![name("s"), dict(vec![(int(1), name("a"))])],
                vec![("default", name("b"))],
            ),
        )],
    ));
    let ctx = lower(&mut f, ContextKind::Sequential).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    let default = kinds
        .iter()
        .find_map(|k| match k {
            NodeKind::SelectWith { default, .. } => *default,
            _ => None,
        })
        .expect("default hook");
    let redirects = &f.cx.tree.hook(default).redirects;
    assert_eq!(redirects[0].source, Operand::Object(f.b));
}

#[test]
fn comprehensions_build_host_containers() {
    // bits = [a[i] for i in range(4)]
    // table = {i: b[i] for i in range(4)}
    // y[0] <<= bits[3]; y[1] <<= table[2]
    let mut f = fixture(function(
        "gather",
        vec![],
        vec![
            assign(
                name("bits"),
                list_comp(
                    index(name("a"), name("i")),
                    name("i"),
                    call(name("range"), vec![int(4)]),
                ),
            ),
            assign(
                name("table"),
                dict_comp(
                    name("i"),
                    index(name("b"), name("i")),
                    name("i"),
                    call(name("range"), vec![int(4)]),
                ),
            ),
            next(index(name("y"), int(0)), index(name("bits"), int(3))),
            next(index(name("y"), int(1)), index(name("table"), int(2))),
        ],
    ));
    let ctx = lower(&mut f, ContextKind::Concurrent).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    let writes = assigns(&kinds);
    assert_eq!(writes.len(), 2);
    let view = |op: &Operand| match op {
        Operand::Object(id) => *id,
        other => panic!("expected an object, found {other:?}"),
    };
    let first = view(&writes[0].1);
    assert_eq!(f.cx.objects.root(first), f.a);
    assert_eq!(f.cx.objects.chain(first), &[corvid_types::RefSpec::Offset(3)]);
    let second = view(&writes[1].1);
    assert_eq!(f.cx.objects.root(second), f.b);
    assert_eq!(f.cx.objects.chain(second), &[corvid_types::RefSpec::Offset(2)]);
}

#[test]
fn super_calls_and_properties_resolve_through_the_base() {
    // class Base:
    //     def __init__(self, lo, hi): self.lo = lo; self.hi = hi
    //     def pick(self): return self.lo
    // class Child(Base):
    //     def pick(self): return ~super().pick()
    //     @property
    //     def both(self): return self.pick() & self.hi
    // y <<= Child(a, b).both
    let init = function(
        "__init__",
        params(&["self", "lo", "hi"]),
        vec![
            assign(attr(name("self"), "lo"), name("lo")),
            assign(attr(name("self"), "hi"), name("hi")),
        ],
    );
    let base_pick = function("pick", params(&["self"]), vec![ret(Some(attr(name("self"), "lo")))]);
    let child_pick = function(
        "pick",
        params(&["self"]),
        vec![ret(Some(invert(method(
            call(name("super"), vec![]),
            "pick",
            vec![],
        ))))],
    );
    let mut both = function(
        "both",
        params(&["self"]),
        vec![ret(Some(bit_and(
            method(name("self"), "pick", vec![]),
            attr(name("self"), "hi"),
        )))],
    );
    both.decorators = vec![name("property")];
    let mut f = fixture(function(
        "logic",
        vec![],
        vec![
            class("Base", None, vec![def(init), def(base_pick)]),
            class("Child", Some(name("Base")), vec![def(child_pick), def(both)]),
            next(
                name("y"),
                attr(call(name("Child"), vec![name("a"), name("b")]), "both"),
            ),
        ],
    ));
    let ctx = lower(&mut f, ContextKind::Concurrent).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    let inverted = kinds
        .iter()
        .find_map(|k| match k {
            NodeKind::UnaryOp { arg, result, .. } if *arg == Operand::Object(f.a) => Some(*result),
            _ => None,
        })
        .expect("inverted base value");
    assert!(kinds.iter().any(|k| matches!(
        k,
        NodeKind::BinOp { op: BinOp::And, lhs, rhs, .. }
            if *lhs == Operand::Object(inverted) && *rhs == Operand::Object(f.b)
    )));
}

#[test]
fn super_outside_a_method_is_rejected() {
    let mut f = fixture(function(
        "logic",
        vec![],
        vec![expr(call(name("super"), vec![]))],
    ));
    let err = lower(&mut f, ContextKind::Concurrent).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Intrinsic);
}

#[test]
fn break_leaves_a_runtime_while() {
    // while True: await rising_edge(clk); if s: break
    let mut f = fixture(async_function(
        "hold",
        vec![],
        vec![
            while_(
                boolean(true),
                vec![
                    expr(await_(call(name("rising_edge"), vec![name("clk")]))),
                    if_(name("s"), vec![break_()], vec![]),
                ],
            ),
            next(name("y"), name("a")),
        ],
    ));
    let ctx = lower(&mut f, ContextKind::Sequential).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    let at = |pred: fn(&NodeKind) -> bool| kinds.iter().position(pred).expect("node present");
    let looped = at(|k| matches!(k, NodeKind::While { .. }));
    let broke = at(|k| matches!(k, NodeKind::Break));
    let after = at(|k| matches!(k, NodeKind::Assign { .. }));
    assert!(looped < broke && broke < after);
}

#[test]
fn breaking_for_becomes_a_priority_select() {
    // for i in range(4):
    //     if a[i]:
    //         y[i] <<= s
    //         break
    let mut f = fixture(function(
        "first",
        vec![],
        vec![for_(
            name("i"),
            call(name("range"), vec![int(4)]),
            vec![if_(
                index(name("a"), name("i")),
                vec![next(index(name("y"), name("i")), name("s")), break_()],
                vec![],
            )],
        )],
    ));
    let ctx = lower(&mut f, ContextKind::Sequential).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    let (cases, default) = kinds
        .iter()
        .find_map(|k| match k {
            NodeKind::CondSelect { cases, default } => Some((cases.len(), *default)),
            _ => None,
        })
        .expect("select chain");
    assert_eq!(cases, 4);
    assert!(default.is_none());
    assert_eq!(assigns(&kinds).len(), 4);
    assert!(!kinds.iter().any(|k| matches!(k, NodeKind::Break)));
}

#[test]
fn resets_need_a_sequential_context() {
    let mut f = fixture(function(
        "clear",
        vec![],
        vec![
            expr(call(name("reset_context"), vec![])),
            expr(call(name("reset_pushed"), vec![])),
        ],
    ));
    let ctx = lower(&mut f, ContextKind::Sequential).unwrap();
    let kinds = walk(&f.cx.tree, ctx.root);
    assert!(kinds.contains(&NodeKind::ResetContext));
    assert!(kinds.contains(&NodeKind::ResetPushed));

    let mut f = fixture(function(
        "clear",
        vec![],
        vec![expr(call(name("reset_context"), vec![]))],
    ));
    let err = lower(&mut f, ContextKind::Concurrent).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Context);
}

#[test]
fn always_moves_its_expression_out_of_the_body() {
    // y <<= always(a & b)
    let mut f = fixture(function(
        "count",
        vec![],
        vec![next(
            name("y"),
            call(name("always"), vec![bit_and(name("a"), name("b"))]),
        )],
    ));
    let ctx = lower(&mut f, ContextKind::Sequential).unwrap();
    assert_eq!(ctx.always.len(), 1);
    let companion = &f.cx.tree.node(ctx.always[0]).kind;
    let NodeKind::BinOp { op: BinOp::And, result, .. } = companion else {
        panic!("expected the and node, found {companion:?}");
    };
    let kinds = walk(&f.cx.tree, ctx.root);
    assert!(!kinds.iter().any(|k| matches!(k, NodeKind::BinOp { .. })));
    assert_eq!(
        assigns(&kinds),
        vec![(f.y, Operand::Object(*result), AssignMode::Next)]
    );
}

#[test]
fn sensitivity_all_is_recorded() {
    let mut f = fixture(function(
        "comb",
        vec![],
        vec![
            expr(call(name("sensitivity_all"), vec![])),
            next(name("y"), name("a")),
        ],
    ));
    let ctx = lower(&mut f, ContextKind::Sequential).unwrap();
    assert_eq!(ctx.sensitivity, Some(corvid_types::Sensitivity::All));

    let mut f = fixture(function(
        "comb",
        vec![],
        vec![expr(call(name("sensitivity_all"), vec![]))],
    ));
    let err = lower(&mut f, ContextKind::Concurrent).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Context);
}
