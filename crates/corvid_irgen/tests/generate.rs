//! IR generation from lowered designs.

use corvid_diagnostics::{CompileResult, ErrorKind};
use corvid_irgen::{cleanup_bool_cast, cleanup_unused, generate_ir, IrOptions};
use corvid_frontend::ast::build::*;
use corvid_frontend::ast::{Expr, FunctionDef};
use corvid_frontend::{prepare_design, Design};
use corvid_ir::{Context, Library, StmtKind};
use corvid_types::{
    ConstValue, ContextKind, Direction, EventKind, ObjectId, Operand, Primitive, QualifierKind,
    Sensitivity,
};

struct Ports {
    clk: ObjectId,
    d: ObjectId,
    q: ObjectId,
}

fn design_with(kind: ContextKind, def: FunctionDef) -> (Design, Ports) {
    let mut design = Design::new();
    let top = design.entity("top");
    let clk = design.port(top, "clk", Direction::Input, Primitive::Bit);
    let d = design.port(top, "d", Direction::Input, Primitive::Bit);
    let q = design.port(top, "q", Direction::Output, Primitive::Bit);
    design.port(top, "sel", Direction::Input, Primitive::unsigned(3));
    let f = design.define(top, def);
    let body = design.body(top);
    match kind {
        ContextKind::Concurrent => {
            design.concurrent(body, f);
        }
        ContextKind::Sequential => {
            design.sequential(body, f, Some(Sensitivity::List(vec![clk])));
        }
    }
    (design, Ports { clk, d, q })
}

fn generate(design: Design) -> CompileResult<Library> {
    generate_ir(prepare_design(design)?, &IrOptions::default())
}

fn only_context(lib: &Library) -> &Context {
    lib.top_template().body.contexts.first().expect("one context")
}

fn stmts(lib: &Library, block: corvid_ir::BlockId) -> Vec<StmtKind> {
    lib.code.get(block).stmts.iter().map(|s| s.kind.clone()).collect()
}

fn latch() -> FunctionDef {
    async_function(
        "latch",
        vec![],
        vec![
            expr(await_(call(name("rising_edge"), vec![name("clk")]))),
            next(name("q"), name("d")),
        ],
    )
}

fn toggle() -> FunctionDef {
    async_function(
        "toggle",
        vec![],
        vec![while_(
            boolean(true),
            vec![
                expr(await_(call(name("rising_edge"), vec![name("clk")]))),
                next(name("q"), invert(name("q"))),
            ],
        )],
    )
}

#[test]
fn concurrent_assignment_is_a_signal_assignment() {
    let (design, p) = design_with(
        ContextKind::Concurrent,
        function("wire", vec![], vec![next(name("q"), name("d"))]),
    );
    let lib = generate(design).unwrap();
    let Context::Concurrent(ctx) = only_context(&lib) else {
        panic!("expected a concurrent context");
    };
    assert_eq!(
        stmts(&lib, ctx.code),
        vec![StmtKind::SignalAssignment {
            target: p.q,
            source: Operand::Object(p.d),
        }]
    );
}

#[test]
fn first_await_reuses_the_empty_first_state() {
    let (design, p) = design_with(ContextKind::Sequential, latch());
    let lib = generate(design).unwrap();
    let Context::Sequential(ctx) = only_context(&lib) else {
        panic!("expected a process");
    };
    assert!(ctx.state.is_none());
    let root = stmts(&lib, ctx.code);
    let [StmtKind::If { test, body, .. }] = root.as_slice() else {
        panic!("expected a single edge test, found {root:?}");
    };
    assert_eq!(
        test,
        &Operand::Event {
            kind: EventKind::Rising,
            signal: p.clk,
        }
    );
    assert_eq!(
        stmts(&lib, *body),
        vec![StmtKind::SignalAssignment {
            target: p.q,
            source: Operand::Object(p.d),
        }]
    );
}

#[test]
fn endless_loop_becomes_a_two_state_machine() {
    let (design, _) = design_with(ContextKind::Sequential, toggle());
    let lib = generate(design).unwrap();
    let Context::Sequential(ctx) = only_context(&lib) else {
        panic!("expected a process");
    };
    let register = ctx.state.expect("state register");
    let root = stmts(&lib, ctx.code);
    let [StmtKind::CaseWhen { value, branches, default }] = root.as_slice() else {
        panic!("expected a case over the states, found {root:?}");
    };
    assert_eq!(value, &Operand::Object(register));
    assert_eq!(branches.len(), 2);
    assert!(default.is_none());
    let mut transitions = 0;
    lib.code.walk(ctx.code, &mut |_, stmt| {
        if matches!(&stmt.kind, StmtKind::SignalAssignment { target, .. } if *target == register) {
            transitions += 1;
        }
    });
    assert_eq!(transitions, 2);
}

#[test]
fn match_becomes_a_case_statement() {
    let (design, _) = design_with(
        ContextKind::Sequential,
        function(
            "decode",
            vec![],
            vec![match_(
                name("sel"),
                vec![
                    case(int(1), vec![next(name("q"), name("d"))]),
                    case(int(2), vec![next(name("q"), invert(name("d")))]),
                    case_default(vec![next(name("q"), name("Null"))]),
                ],
            )],
        ),
    );
    let lib = generate(design).unwrap();
    let ctx = only_context(&lib);
    let mut cases = Vec::new();
    lib.code.walk(ctx.code(), &mut |_, stmt| {
        if let StmtKind::CaseWhen { branches, default, .. } = &stmt.kind {
            cases.push((branches.len(), default.is_some()));
        }
    });
    assert_eq!(cases, vec![(2, true)]);
    let mut compares = 0;
    lib.code.walk(ctx.code(), &mut |_, stmt| {
        if matches!(stmt.kind, StmtKind::Compare { .. }) {
            compares += 1;
        }
    });
    assert_eq!(compares, 0);
}

#[test]
fn two_drivers_are_rejected() {
    let mut design = Design::new();
    let top = design.entity("top");
    design.port(top, "a", Direction::Input, Primitive::Bit);
    design.port(top, "q", Direction::Output, Primitive::Bit);
    let f = design.define(top, function("one", vec![], vec![next(name("q"), name("a"))]));
    let g = design.define(top, function("two", vec![], vec![next(name("q"), invert(name("a")))]));
    let body = design.body(top);
    design.concurrent(body, f);
    design.concurrent(body, g);
    let err = generate(design).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Context);
    assert!(err.message.contains("more than one context"), "{}", err.message);
}

#[test]
fn temporaries_do_not_survive_an_await() {
    let (design, _) = design_with(
        ContextKind::Sequential,
        async_function(
            "stale",
            vec![],
            vec![
                assign(name("t"), bit_and(name("d"), name("clk"))),
                expr(await_(call(name("rising_edge"), vec![name("clk")]))),
                next(name("q"), name("t")),
            ],
        ),
    );
    let err = generate(design).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Liveness);
    assert!(err.message.contains("more than one state"), "{}", err.message);
}

#[test]
fn continue_without_break_never_terminates() {
    let (design, _) = design_with(
        ContextKind::Sequential,
        async_function(
            "spin",
            vec![],
            vec![while_(
                boolean(true),
                vec![
                    expr(await_(call(name("rising_edge"), vec![name("clk")]))),
                    if_(name("d"), vec![continue_()], vec![]),
                    next(name("q"), name("d")),
                ],
            )],
        ),
    );
    let err = generate(design).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ControlFlow);
}

#[test]
fn code_after_an_endless_loop_is_an_error() {
    let (design, _) = design_with(
        ContextKind::Sequential,
        async_function(
            "stuck",
            vec![],
            vec![
                while_(
                    boolean(true),
                    vec![expr(await_(call(name("rising_edge"), vec![name("clk")])))],
                ),
                next(name("q"), name("d")),
            ],
        ),
    );
    let err = generate(design).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ControlFlow);
    assert!(err.message.contains("unreachable"));
}

#[test]
fn await_false_drops_the_rest() {
    let (design, p) = design_with(
        ContextKind::Sequential,
        async_function(
            "halt",
            vec![],
            vec![
                next(name("q"), name("d")),
                expr(await_(boolean(false))),
                next(name("q"), invert(name("d"))),
            ],
        ),
    );
    let lib = generate(design).unwrap();
    let ctx = only_context(&lib);
    let mut writes = Vec::new();
    lib.code.walk(ctx.code(), &mut |_, stmt| {
        if let StmtKind::SignalAssignment { target, source } = &stmt.kind {
            if *target == p.q {
                writes.push(source.clone());
            }
        }
    });
    assert_eq!(writes, vec![Operand::Object(p.d)]);
}

#[test]
fn generation_is_deterministic_and_cleanups_are_idempotent() {
    let render = |lib: &Library| {
        (
            serde_json::to_string(&lib.templates).unwrap(),
            serde_json::to_string(&lib.code).unwrap(),
        )
    };
    let (first, _) = design_with(ContextKind::Sequential, toggle());
    let (second, _) = design_with(ContextKind::Sequential, toggle());
    let mut a = generate(first).unwrap();
    let b = generate(second).unwrap();
    assert_eq!(render(&a), render(&b));
    assert!(!cleanup_unused(&mut a).unwrap());
    assert!(!cleanup_bool_cast(&mut a).unwrap());
    assert_eq!(render(&a), render(&b));
}

fn choose(default: bool) -> Expr {
    // select_with(sel, {1: d, 2: clk}[, default=Null])
    let keywords = if default {
        vec![("default", name("Null"))]
    } else {
        Vec::new()
    };
    call_kw(
        name("select_with"),
        vec![name("sel"), dict(vec![(int(1), name("d")), (int(2), name("clk"))])],
        keywords,
    )
}

#[test]
fn concurrent_select_with_stays_a_selected_assignment() {
    let (design, p) = design_with(
        ContextKind::Concurrent,
        function("pick", vec![], vec![next(name("q"), choose(true))]),
    );
    let lib = generate(design).unwrap();
    let Context::Concurrent(ctx) = only_context(&lib) else {
        panic!("expected a concurrent context");
    };
    let root = stmts(&lib, ctx.code);
    let [StmtKind::SelectWith { target, choices, default, .. }] = root.as_slice() else {
        panic!("expected one selected assignment, found {root:?}");
    };
    assert_eq!(*target, p.q);
    assert_eq!(
        choices.iter().map(|(_, v)| v.clone()).collect::<Vec<_>>(),
        vec![Operand::Object(p.d), Operand::Object(p.clk)]
    );
    assert!(default.is_some());
}

#[test]
fn sequential_select_with_becomes_a_case() {
    let (design, p) = design_with(
        ContextKind::Sequential,
        function("pick", vec![], vec![next(name("q"), choose(false))]),
    );
    let lib = generate(design).unwrap();
    let ctx = only_context(&lib);
    let root = stmts(&lib, ctx.code());
    let [StmtKind::CaseWhen { branches, default, .. }] = root.as_slice() else {
        panic!("expected a case statement, found {root:?}");
    };
    assert_eq!(branches.len(), 2);
    assert_eq!(
        stmts(&lib, branches[0].1),
        vec![StmtKind::SignalAssignment {
            target: p.q,
            source: Operand::Object(p.d),
        }]
    );
    let other = default.expect("others arm");
    assert!(lib.code.is_effectively_empty(other));
}

#[test]
fn breaking_for_over_equalities_becomes_a_case() {
    // for i in range(3):
    //     if sel == i: q <<= d; break
    let (design, _) = design_with(
        ContextKind::Sequential,
        function(
            "decode",
            vec![],
            vec![for_(
                name("i"),
                call(name("range"), vec![int(3)]),
                vec![if_(
                    eq(name("sel"), name("i")),
                    vec![next(name("q"), name("d")), break_()],
                    vec![],
                )],
            )],
        ),
    );
    let lib = generate(design).unwrap();
    let ctx = only_context(&lib);
    let mut cases = Vec::new();
    let mut compares = 0;
    lib.code.walk(ctx.code(), &mut |_, stmt| match &stmt.kind {
        StmtKind::CaseWhen { branches, default, .. } => cases.push((branches.len(), default.is_some())),
        StmtKind::Compare { .. } => compares += 1,
        _ => {}
    });
    assert_eq!(cases, vec![(3, true)]);
    assert_eq!(compares, 0);
}

#[test]
fn breaking_for_over_bits_becomes_an_if_chain() {
    // for i in range(3):
    //     if sel[i]: q <<= d; break
    let (design, p) = design_with(
        ContextKind::Sequential,
        function(
            "first",
            vec![],
            vec![for_(
                name("i"),
                call(name("range"), vec![int(3)]),
                vec![if_(
                    index(name("sel"), name("i")),
                    vec![next(name("q"), name("d")), break_()],
                    vec![],
                )],
            )],
        ),
    );
    let lib = generate(design).unwrap();
    let ctx = only_context(&lib);
    let mut ifs = 0;
    let mut writes = 0;
    lib.code.walk(ctx.code(), &mut |_, stmt| match &stmt.kind {
        StmtKind::If { .. } => ifs += 1,
        StmtKind::CaseWhen { .. } => panic!("bit tests cannot form a case"),
        StmtKind::SignalAssignment { target, .. } if *target == p.q => writes += 1,
        _ => {}
    });
    assert_eq!(ifs, 3);
    assert_eq!(writes, 3);
}

#[test]
fn break_leaves_the_loop_for_the_code_after_it() {
    // while True: await rising_edge(clk); if d: break
    // q <<= d
    let (design, p) = design_with(
        ContextKind::Sequential,
        async_function(
            "hold",
            vec![],
            vec![
                while_(
                    boolean(true),
                    vec![
                        expr(await_(call(name("rising_edge"), vec![name("clk")]))),
                        if_(name("d"), vec![break_()], vec![]),
                    ],
                ),
                next(name("q"), name("d")),
            ],
        ),
    );
    let lib = generate(design).unwrap();
    let Context::Sequential(ctx) = only_context(&lib) else {
        panic!("expected a process");
    };
    let register = ctx.state.expect("state register");
    let mut breaking = None;
    lib.code.walk(ctx.code, &mut |_, stmt| {
        if let StmtKind::If { test, body, .. } = &stmt.kind {
            if *test == Operand::Object(p.d) {
                breaking = Some(*body);
            }
        }
    });
    let body = stmts(&lib, breaking.expect("loop exit test"));
    assert_eq!(
        body[0],
        StmtKind::SignalAssignment {
            target: p.q,
            source: Operand::Object(p.d),
        }
    );
    assert!(matches!(&body[1], StmtKind::SignalAssignment { target, .. } if *target == register));
}

#[test]
fn reset_context_writes_every_driven_object() {
    // if d: reset_context()
    // else: q <<= clk
    let (design, p) = design_with(
        ContextKind::Sequential,
        function(
            "clear",
            vec![],
            vec![if_(
                name("d"),
                vec![expr(call(name("reset_context"), vec![]))],
                vec![next(name("q"), name("clk"))],
            )],
        ),
    );
    let lib = generate(design).unwrap();
    let ctx = only_context(&lib);
    let root = stmts(&lib, ctx.code());
    let [StmtKind::If { body, .. }] = root.as_slice() else {
        panic!("expected one if, found {root:?}");
    };
    assert_eq!(
        stmts(&lib, *body),
        vec![StmtKind::SignalAssignment {
            target: p.q,
            source: Operand::Const(ConstValue::Null),
        }]
    );
}

#[test]
fn reset_pushed_only_touches_pushed_signals() {
    // q ^= d; if clk: reset_pushed()
    let (design, p) = design_with(
        ContextKind::Sequential,
        function(
            "pulse",
            vec![],
            vec![
                push(name("q"), name("d")),
                if_(name("clk"), vec![expr(call(name("reset_pushed"), vec![]))], vec![]),
            ],
        ),
    );
    let lib = generate(design).unwrap();
    let ctx = only_context(&lib);
    let root = stmts(&lib, ctx.code());
    let reset = StmtKind::SignalAssignment {
        target: p.q,
        source: Operand::Const(ConstValue::Null),
    };
    assert_eq!(root.len(), 3, "{root:?}");
    assert_eq!(root[0], reset);
    assert_eq!(
        root[1],
        StmtKind::SignalPush {
            target: p.q,
            source: Operand::Object(p.d),
        }
    );
    let StmtKind::If { body, .. } = &root[2] else {
        panic!("expected the guarded reset, found {:?}", root[2]);
    };
    assert_eq!(stmts(&lib, *body), vec![reset]);
}

#[test]
fn always_companion_gets_promoted_signals() {
    // q <<= always(d & clk)
    let (design, p) = design_with(
        ContextKind::Sequential,
        function(
            "count",
            vec![],
            vec![next(
                name("q"),
                call(name("always"), vec![bit_and(name("d"), name("clk"))]),
            )],
        ),
    );
    let lib = generate(design).unwrap();
    let Context::Sequential(ctx) = only_context(&lib) else {
        panic!("expected a process");
    };
    let companion = ctx.always.as_ref().expect("always companion");
    let companion = stmts(&lib, companion.code);
    let [StmtKind::BinOp { result, .. }] = companion.as_slice() else {
        panic!("expected the and statement, found {companion:?}");
    };
    assert_eq!(lib.objects.kind(*result), QualifierKind::Signal);
    assert_eq!(
        stmts(&lib, ctx.code),
        vec![StmtKind::SignalAssignment {
            target: p.q,
            source: Operand::Object(*result),
        }]
    );
}
