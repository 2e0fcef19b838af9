//! VHDL assembly for the corvid compiler.
//!
//! This crate turns a [`Library`] produced by the IR generator into VHDL
//! source: one entity declaration and one architecture per non-extern
//! entity template, emitted leaves first so every file only instantiates
//! entities written before it.
//!
//! Output ports are never read or written directly by the architecture.
//! Each one gets a `buffer_<port>` signal that the generated code uses in
//! its place, and a single concurrent assignment copies the buffer to the
//! port. This keeps output ports readable without VHDL-2008 `out` reads.
//!
//! # Usage
//!
//! ```ignore
//! use corvid_vhdl::{assemble_vhdl, VhdlOptions};
//! let vhdl = assemble_vhdl(&library, &VhdlOptions::default())?;
//! std::fs::write("design.vhd", vhdl.write())?;
//! ```

#![warn(missing_docs)]

mod entity;
mod expr;
pub mod keywords;
pub mod names;
pub mod scope;
mod stmt;
mod types;
mod writer;

use corvid_config::VhdlConfig;
use corvid_diagnostics::{CompileError, CompileResult};
use corvid_ir::Library;
use entity::{interface, Assembler};
use names::NameTable;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Options of the VHDL assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VhdlOptions {
    /// Spaces per nesting level.
    pub indent: usize,
    /// Use VHDL-2008 constructs such as `process (all)`.
    pub std_2008: bool,
    /// Identifiers generated code must not use, on top of the VHDL keywords.
    pub reserved_names: Vec<String>,
}

impl Default for VhdlOptions {
    fn default() -> Self {
        Self {
            indent: 4,
            std_2008: true,
            reserved_names: Vec::new(),
        }
    }
}

impl From<&VhdlConfig> for VhdlOptions {
    fn from(config: &VhdlConfig) -> Self {
        Self {
            indent: config.indent,
            std_2008: config.std_2008,
            reserved_names: config.reserved_names.clone(),
        }
    }
}

/// The VHDL source of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VhdlFile {
    /// Entity name, also the file stem.
    pub entity: String,
    /// Entity declaration and architecture.
    pub text: String,
}

/// Assembled VHDL, one file per emitted entity in dependency order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VhdlLibrary {
    files: Vec<VhdlFile>,
}

impl VhdlLibrary {
    /// The files in emission order; the top entity comes last.
    pub fn files(&self) -> &[VhdlFile] {
        &self.files
    }

    /// The file of entity `name`.
    pub fn file(&self, name: &str) -> Option<&VhdlFile> {
        self.files.iter().find(|f| f.entity == name)
    }

    /// All files concatenated into a single source.
    pub fn write(&self) -> String {
        self.files
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Writes one `<entity>.vhd` per file into `dir`, creating it if needed.
    pub fn write_dir(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut paths = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let path = dir.join(format!("{}.vhd", file.entity));
            std::fs::write(&path, &file.text)?;
            paths.push(path);
        }
        Ok(paths)
    }
}

/// Assembles the VHDL of every non-extern template of `lib`.
pub fn assemble_vhdl(lib: &Library, options: &VhdlOptions) -> CompileResult<VhdlLibrary> {
    let order = lib.emission_order()?;
    let mut entities = NameTable::new(&options.reserved_names);
    for id in &order {
        let template = &lib.templates[*id];
        if template.extern_ {
            entities.reserve(&template.name);
        }
    }

    let mut interfaces = HashMap::new();
    let mut tables = HashMap::new();
    for &id in &order {
        let template = &lib.templates[id];
        let mut table = NameTable::new(options.reserved_names.iter().chain(&template.reserved_names));
        interfaces.insert(id, interface(template, &lib.objects, &mut entities, &mut table)?);
        tables.insert(id, table);
    }

    let mut assembler = Assembler::new(lib, options, interfaces);
    let mut files = Vec::new();
    for id in order {
        let template = &lib.templates[id];
        if template.extern_ {
            log::debug!("entity `{}` is extern, not emitted", template.name);
            continue;
        }
        let table = tables
            .remove(&id)
            .ok_or_else(|| CompileError::sanity("template assembled twice"))?;
        let (entity, text) = assembler.emit(id, table)?;
        files.push(VhdlFile { entity, text });
    }
    log::info!("assembled {} VHDL entities", files.len());
    Ok(VhdlLibrary { files })
}
