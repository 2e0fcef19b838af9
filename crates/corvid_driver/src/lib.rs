//! The corvid compiler pipeline.
//!
//! Composes the stages into one call: the frontend lowers every
//! synthesizable context of a [`Design`] into a prepared tree, the IR
//! generator turns that into structured IR (synthesizing state machines on
//! the way), and the VHDL assembler renders the resulting library.
//!
//! Every stage fails fast with a [`CompileError`]. The [`Compiler`] keeps
//! the sources of the last design it compiled so that error can be
//! reported as a rendered diagnostic pointing into user code.
//!
//! # Usage
//!
//! ```ignore
//! use corvid_driver::Compiler;
//! let mut compiler = Compiler::from_project(Path::new("."))?;
//! match compiler.compile(design) {
//!     Ok(vhdl) => { compiler.write(&vhdl, Path::new("."))?; }
//!     Err(_) => eprint!("{}", compiler.render_diagnostics(true)),
//! }
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod output;

pub use error::DriverError;
pub use output::write_output;

use corvid_config::{load_config, CompilerConfig};
use corvid_diagnostics::{
    CompileError, CompileResult, Diagnostic, DiagnosticRenderer, DiagnosticSink, TerminalRenderer,
};
use corvid_frontend::{prepare_design, Design};
use corvid_irgen::{generate_ir, IrOptions};
use corvid_source::SourceDb;
use corvid_vhdl::{assemble_vhdl, VhdlLibrary, VhdlOptions};
use std::path::{Path, PathBuf};

/// Runs the full pipeline on `design`.
pub fn compile(design: Design, config: &CompilerConfig) -> CompileResult<VhdlLibrary> {
    let prepared = prepare_design(design)?;
    log::debug!("prepared {} entities", prepared.entities.len());
    let options = IrOptions {
        library: config.vhdl.library.clone(),
    };
    let lib = generate_ir(prepared, &options)?;
    log::debug!("generated IR for {} templates", lib.templates.len());
    assemble_vhdl(&lib, &VhdlOptions::from(&config.vhdl))
}

/// A configured compiler that collects diagnostics across runs.
pub struct Compiler {
    config: CompilerConfig,
    sink: DiagnosticSink,
    sources: SourceDb,
}

impl Compiler {
    /// Creates a compiler with an explicit configuration.
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            sink: DiagnosticSink::new(),
            sources: SourceDb::new(),
        }
    }

    /// Creates a compiler configured by `<dir>/corvid.toml`, or defaults if
    /// the file does not exist.
    pub fn from_project(dir: &Path) -> Result<Self, DriverError> {
        Ok(Self::new(load_config(dir)?))
    }

    /// The active configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Compiles `design`. On failure the error is also recorded as a
    /// diagnostic, enriched with the user call chain unless
    /// `compiler.traceback` is off.
    pub fn compile(&mut self, design: Design) -> CompileResult<VhdlLibrary> {
        self.sources = design.sources.clone();
        compile(design, &self.config).inspect_err(|err| self.report(err))
    }

    /// Compiles `design` and writes the result as configured by `[output]`.
    pub fn build(&mut self, design: Design, root: &Path) -> Result<Vec<PathBuf>, DriverError> {
        let vhdl = self.compile(design)?;
        self.write(&vhdl, root)
    }

    /// Writes `vhdl` below `root` as configured by `[output]`.
    pub fn write(&self, vhdl: &VhdlLibrary, root: &Path) -> Result<Vec<PathBuf>, DriverError> {
        write_output(vhdl, &self.config.output, root)
    }

    fn report(&self, err: &CompileError) {
        log::debug!("compilation failed: {err}");
        self.sink.emit(err.to_diagnostic(self.config.compiler.traceback));
    }

    /// Whether any compilation so far failed.
    pub fn has_errors(&self) -> bool {
        self.sink.has_errors()
    }

    /// The diagnostics recorded so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.sink.diagnostics()
    }

    /// Renders every recorded diagnostic against the sources of the last
    /// compiled design.
    pub fn render_diagnostics(&self, color: bool) -> String {
        let renderer = TerminalRenderer::new(color);
        self.sink
            .diagnostics()
            .iter()
            .map(|diag| renderer.render(diag, &self.sources))
            .collect()
    }
}
