//! VHDL text assembled from small designs.

use corvid_diagnostics::CompileResult;
use corvid_vhdl::{assemble_vhdl, VhdlLibrary, VhdlOptions};
use corvid_frontend::ast::build::*;
use corvid_frontend::{prepare_design, Design};
use corvid_irgen::{generate_ir, IrOptions};
use corvid_types::{ConstValue, Direction, Primitive, Sensitivity};

fn assemble(design: Design) -> CompileResult<VhdlLibrary> {
    let lib = generate_ir(prepare_design(design)?, &IrOptions::default())?;
    assemble_vhdl(&lib, &VhdlOptions::default())
}

/// Whitespace-insensitive containment.
fn has(text: &str, needle: &str) -> bool {
    let squash = |s: &str| s.split_whitespace().collect::<String>();
    squash(text).contains(&squash(needle))
}

fn top_text(vhdl: &VhdlLibrary) -> &str {
    &vhdl.files().last().expect("at least one entity").text
}

#[test]
fn output_ports_are_written_through_a_buffer() {
    let mut design = Design::new();
    let top = design.entity("top");
    design.port(top, "in_sig", Direction::Input, Primitive::Bit);
    design.port(top, "out_sig", Direction::Output, Primitive::Bit);
    let f = design.define(top, function("wire", vec![], vec![next(name("out_sig"), name("in_sig"))]));
    let body = design.body(top);
    design.concurrent(body, f);
    let vhdl = assemble(design).unwrap();
    let text = top_text(&vhdl);
    assert!(has(text, "entity top is port ( in_sig : in std_logic; out_sig : out std_logic ); end entity top;"), "{text}");
    assert!(has(text, "signal buffer_out_sig : std_logic;"), "{text}");
    assert!(has(text, "out_sig <= buffer_out_sig;"), "{text}");
    assert!(has(text, "buffer_out_sig <= in_sig;"), "{text}");
    assert!(has(text, "architecture arch_top of top is"), "{text}");
}

#[test]
fn endless_loop_declares_its_state_type() {
    let mut design = Design::new();
    let top = design.entity("top");
    let clk = design.port(top, "clk", Direction::Input, Primitive::Bit);
    design.signal(top, "led", Primitive::Bit);
    let f = design.define(
        top,
        async_function(
            "toggle",
            vec![],
            vec![while_(
                boolean(true),
                vec![
                    expr(await_(call(name("rising_edge"), vec![name("clk")]))),
                    next(name("led"), invert(name("led"))),
                ],
            )],
        ),
    );
    let body = design.body(top);
    design.sequential(body, f, Some(Sensitivity::List(vec![clk])));
    let vhdl = assemble(design).unwrap();
    let text = top_text(&vhdl);
    assert!(has(text, "type state_t_toggle is (toggle_s0, toggle_s1);"), "{text}");
    assert!(has(text, "signal state_toggle : state_t_toggle := toggle_s0;"), "{text}");
    assert!(has(text, "toggle: process (clk)"), "{text}");
    assert!(has(text, "case state_toggle is"), "{text}");
    assert!(has(text, "led <= not led;"), "{text}");
    assert!(has(text, "end process toggle;"), "{text}");
}

#[test]
fn keywords_and_reserved_names_are_avoided() {
    let mut design = Design::new();
    let top = design.entity("top");
    design.port(top, "a", Direction::Input, Primitive::Bit);
    design.signal(top, "signal", Primitive::Bit);
    design.signal(top, "keep", Primitive::Bit);
    design.attrs_mut(top).reserved_names = vec!["keep".to_string()];
    let f = design.define(
        top,
        function(
            "wires",
            vec![],
            vec![next(name("signal"), name("a")), next(name("keep"), name("signal"))],
        ),
    );
    let body = design.body(top);
    design.concurrent(body, f);
    let vhdl = assemble(design).unwrap();
    let text = top_text(&vhdl);
    assert!(has(text, "signal signal_1 : std_logic;"), "{text}");
    assert!(has(text, "signal keep_1 : std_logic;"), "{text}");
    assert!(has(text, "keep_1 <= signal_1;"), "{text}");
}

#[test]
fn extern_entities_are_instantiated_but_not_emitted() {
    let mut design = Design::new();
    let top = design.entity("top");
    let clk = design.port(top, "clk", Direction::Input, Primitive::Bit);
    let q = design.port(top, "q", Direction::Output, Primitive::unsigned(4));
    let ram = design.entity("vendor_ram");
    design.port(ram, "clk", Direction::Input, Primitive::Bit);
    design.port(ram, "dout", Direction::Output, Primitive::unsigned(4));
    design.generic(ram, "depth", Primitive::integer(), ConstValue::Int(16));
    let attrs = design.attrs_mut(ram);
    attrs.extern_ = true;
    attrs.path = Some("vendor".to_string());
    let body = design.body(top);
    design
        .instantiate(
            body,
            ram,
            Some("u0"),
            &[("clk", clk), ("dout", q)],
            &[("depth", ConstValue::Int(32))],
        )
        .unwrap();
    let vhdl = assemble(design).unwrap();
    assert_eq!(vhdl.files().len(), 1);
    assert!(vhdl.file("vendor_ram").is_none());
    let text = top_text(&vhdl);
    assert!(has(text, "library vendor;"), "{text}");
    assert!(has(text, "u0: entity vendor.vendor_ram"), "{text}");
    assert!(has(text, "generic map ( depth => 32 )"), "{text}");
    assert!(has(text, "port map ( clk => clk, dout => buffer_q );"), "{text}");
    assert!(has(text, "q <= buffer_q;"), "{text}");
}

#[test]
fn children_are_emitted_before_their_parents() {
    let mut design = Design::new();
    let top = design.entity("top");
    let a = design.port(top, "a", Direction::Input, Primitive::Bit);
    let y = design.port(top, "y", Direction::Output, Primitive::Bit);
    let inv = design.entity("inverter");
    design.port(inv, "i", Direction::Input, Primitive::Bit);
    design.port(inv, "o", Direction::Output, Primitive::Bit);
    let f = design.define(inv, function("invert", vec![], vec![next(name("o"), invert(name("i")))]));
    let inv_body = design.body(inv);
    design.concurrent(inv_body, f);
    let body = design.body(top);
    design
        .instantiate(body, inv, None, &[("i", a), ("o", y)], &[])
        .unwrap();
    let vhdl = assemble(design).unwrap();
    let names: Vec<&str> = vhdl.files().iter().map(|f| f.entity.as_str()).collect();
    assert_eq!(names, vec!["inverter", "top"]);
    assert!(has(&vhdl.files()[0].text, "buffer_o <= not i;"));
    assert!(has(top_text(&vhdl), "inst: entity work.inverter"));
    let joined = vhdl.write();
    assert!(joined.find("entity inverter is") < joined.find("entity top is"));
}

#[test]
fn implicit_sensitivity_lists_every_signal_read() {
    let mut design = Design::new();
    let top = design.entity("top");
    design.port(top, "a", Direction::Input, Primitive::Bit);
    design.port(top, "b", Direction::Input, Primitive::Bit);
    design.port(top, "y", Direction::Output, Primitive::Bit);
    let f = design.define(
        top,
        function(
            "comb",
            vec![],
            vec![if_(name("a"), vec![next(name("y"), name("b"))], vec![next(name("y"), name("a"))])],
        ),
    );
    let body = design.body(top);
    design.sequential(body, f, None);
    let vhdl = assemble(design).unwrap();
    let text = top_text(&vhdl);
    assert!(has(text, "comb: process (a, b)"), "{text}");
    assert!(has(text, "if a = '1' then buffer_y <= b; else buffer_y <= a; end if;"), "{text}");
}

#[test]
fn assembly_is_deterministic() {
    let build = || {
        let mut design = Design::new();
        let top = design.entity("top");
        design.port(top, "x", Direction::Input, Primitive::unsigned(4));
        design.port(top, "u8", Direction::Output, Primitive::unsigned(8));
        let f = design.define(top, function("widen", vec![], vec![next(name("u8"), name("x"))]));
        let body = design.body(top);
        design.concurrent(body, f);
        design
    };
    let first = assemble(build()).unwrap();
    let second = assemble(build()).unwrap();
    assert_eq!(first.write(), second.write());
    assert!(has(&first.write(), "buffer_u8 <= resize(x, 8);"));
}

#[test]
fn write_dir_creates_one_file_per_entity() {
    let mut design = Design::new();
    let top = design.entity("top");
    design.port(top, "a", Direction::Input, Primitive::Bit);
    design.port(top, "y", Direction::Output, Primitive::Bit);
    let f = design.define(top, function("wire", vec![], vec![next(name("y"), name("a"))]));
    let body = design.body(top);
    design.concurrent(body, f);
    let vhdl = assemble(design).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let paths = vhdl.write_dir(&dir.path().join("out")).unwrap();
    assert_eq!(paths.len(), 1);
    assert!(paths[0].ends_with("top.vhd"));
    let written = std::fs::read_to_string(&paths[0]).unwrap();
    assert_eq!(written, vhdl.files()[0].text);
}
