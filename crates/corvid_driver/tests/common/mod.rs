//! Helpers shared by the end-to-end tests.

#![allow(dead_code)]

use corvid_config::CompilerConfig;
use corvid_driver::compile;
use corvid_frontend::Design;
use corvid_vhdl::VhdlLibrary;

/// Compiles with the default configuration, panicking on errors.
pub fn compile_default(design: Design) -> VhdlLibrary {
    match compile(design, &CompilerConfig::default()) {
        Ok(vhdl) => vhdl,
        Err(err) => panic!("compilation failed: {err}"),
    }
}

/// Whitespace-insensitive containment.
pub fn has(text: &str, needle: &str) -> bool {
    let squash = |s: &str| s.split_whitespace().collect::<String>();
    squash(text).contains(&squash(needle))
}

/// Asserts `needle` occurs in `text`, ignoring whitespace.
#[track_caller]
pub fn assert_has(text: &str, needle: &str) {
    assert!(has(text, needle), "expected `{needle}` in:\n{text}");
}
