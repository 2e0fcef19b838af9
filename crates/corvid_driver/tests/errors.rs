//! Rejected designs and how their errors are reported.

use corvid_config::{load_config_from_str, CompilerConfig};
use corvid_diagnostics::{ErrorKind, Severity};
use corvid_driver::{compile, Compiler, DriverError};
use corvid_frontend::ast::build::*;
use corvid_frontend::Design;
use corvid_types::{Direction, Primitive, Sensitivity};

const SOURCE: &str = "\
def logic():
    if s:
        y <<= a
";

/// A runtime `if` in a concurrent context, with line numbers pointing
/// into `design.py`.
fn runtime_if_in_concurrent_context() -> Design {
    let mut design = Design::new();
    let file = design.add_source("design.py", SOURCE);
    let top = design.entity("top");
    design.port(top, "s", Direction::Input, Primitive::Bit);
    design.port(top, "a", Direction::Input, Primitive::Bit);
    design.port(top, "y", Direction::Output, Primitive::Bit);
    let mut def = function(
        "logic",
        vec![],
        vec![if_(name("s"), vec![next(name("y"), name("a"))], vec![])],
    );
    number_lines(&mut def, file, 1);
    let f = design.define(top, def);
    let body = design.body(top);
    design.concurrent(body, f);
    design
}

#[test]
fn second_driver_is_a_context_error() {
    let mut design = Design::new();
    let top = design.entity("top");
    design.port(top, "a", Direction::Input, Primitive::Bit);
    design.port(top, "q", Direction::Output, Primitive::Bit);
    let f = design.define(top, function("one", vec![], vec![next(name("q"), name("a"))]));
    let g = design.define(top, function("two", vec![], vec![next(name("q"), invert(name("a")))]));
    let body = design.body(top);
    design.concurrent(body, f);
    design.concurrent(body, g);

    let err = compile(design, &CompilerConfig::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Context);
    assert!(err.message.contains("more than one context"), "{}", err.message);
}

#[test]
fn temporary_across_states_is_a_liveness_error() {
    let mut design = Design::new();
    let top = design.entity("top");
    let clk = design.port(top, "clk", Direction::Input, Primitive::Bit);
    design.port(top, "d", Direction::Input, Primitive::Bit);
    design.port(top, "q", Direction::Output, Primitive::Bit);
    let f = design.define(
        top,
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
    let body = design.body(top);
    design.sequential(body, f, Some(Sensitivity::List(vec![clk])));

    let err = compile(design, &CompilerConfig::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Liveness);
}

#[test]
fn failures_are_recorded_as_diagnostics() {
    let mut compiler = Compiler::new(CompilerConfig::default());
    let err = compiler.compile(runtime_if_in_concurrent_context()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Context);
    assert!(compiler.has_errors());

    let diagnostics = compiler.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].severity, Severity::Error);
    assert_eq!(diagnostics[0].code.to_string(), "E301");

    let rendered = compiler.render_diagnostics(false);
    assert!(rendered.starts_with("error[E301]"), "{rendered}");
    assert!(rendered.contains("--> design.py:2:"), "{rendered}");
    assert!(rendered.contains("if s:"), "{rendered}");
}

#[test]
fn traceback_can_be_disabled() {
    let config = load_config_from_str("[compiler]\ntraceback = false\n").unwrap();
    let mut compiler = Compiler::new(config);
    assert!(compiler.compile(runtime_if_in_concurrent_context()).is_err());
    let rendered = compiler.render_diagnostics(false);
    assert!(!rendered.contains("design.py"), "{rendered}");
    assert!(rendered.contains("raised at"), "{rendered}");
}

#[test]
fn build_stops_before_writing_on_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut compiler = Compiler::new(CompilerConfig::default());
    let err = compiler
        .build(runtime_if_in_concurrent_context(), dir.path())
        .unwrap_err();
    assert!(matches!(err, DriverError::Compile(_)));
    assert!(!dir.path().join("vhdl.vhd").exists());
}

#[test]
fn invalid_project_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("corvid.toml"), "[vhdl]\nindent = 0\n").unwrap();
    let err = Compiler::from_project(dir.path()).err().expect("indent 0 is rejected");
    assert!(matches!(err, DriverError::Config(_)));
    assert!(err.to_string().contains("indent"), "{err}");
}

#[test]
fn same_named_contexts_still_conflict() {
    let mut design = Design::new();
    let top = design.entity("top");
    design.port(top, "a", Direction::Input, Primitive::Bit);
    design.port(top, "q", Direction::Output, Primitive::Bit);
    let f = design.define(top, function("logic", vec![], vec![next(name("q"), name("a"))]));
    let g = design.define(top, function("logic", vec![], vec![next(name("q"), invert(name("a")))]));
    let body = design.body(top);
    design.concurrent(body, f);
    design.concurrent(body, g);

    let err = compile(design, &CompilerConfig::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Context);
    assert!(err.message.contains("`logic` and `logic`"), "{}", err.message);
}

#[test]
fn unnamed_instances_driving_one_signal_conflict() {
    let mut design = Design::new();
    let top = design.entity("top");
    let a = design.port(top, "a", Direction::Input, Primitive::Bit);
    let q = design.port(top, "q", Direction::Output, Primitive::Bit);
    let inv = design.entity("inverter");
    design.port(inv, "i", Direction::Input, Primitive::Bit);
    design.port(inv, "o", Direction::Output, Primitive::Bit);
    let f = design.define(inv, function("invert", vec![], vec![next(name("o"), invert(name("i")))]));
    let inv_body = design.body(inv);
    design.concurrent(inv_body, f);
    let body = design.body(top);
    for _ in 0..2 {
        design
            .instantiate(body, inv, None, &[("i", a), ("o", q)], &[])
            .expect("ports bind");
    }

    let err = compile(design, &CompilerConfig::default()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::Context);
    assert!(err.message.contains("unnamed instance"), "{}", err.message);
}
