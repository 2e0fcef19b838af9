//! Configuration types deserialized from `corvid.toml`.

use serde::Deserialize;

/// The complete compiler configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompilerConfig {
    /// Error-reporting behavior.
    #[serde(default)]
    pub compiler: CompilerSection,
    /// VHDL generation settings.
    #[serde(default)]
    pub vhdl: VhdlConfig,
    /// How the generated library is written.
    #[serde(default)]
    pub output: OutputConfig,
}

/// Error-reporting behavior of the compiler.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompilerSection {
    /// Rewrite errors so they point at the user's call chain. Disable to see
    /// the compiler location that raised the error.
    #[serde(default = "default_true")]
    pub traceback: bool,
}

impl Default for CompilerSection {
    fn default() -> Self {
        Self { traceback: true }
    }
}

/// Settings for the VHDL assembler.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VhdlConfig {
    /// Library used for entities that do not set their own `path`.
    #[serde(default = "default_library")]
    pub library: String,
    /// Spaces per nesting level.
    #[serde(default = "default_indent")]
    pub indent: usize,
    /// Identifiers that generated code must never use.
    #[serde(default)]
    pub reserved_names: Vec<String>,
    /// Emit `process(all)` for `sensitivity_all()`; otherwise list every
    /// signal the process reads.
    #[serde(default = "default_true")]
    pub std_2008: bool,
}

impl Default for VhdlConfig {
    fn default() -> Self {
        Self {
            library: default_library(),
            indent: default_indent(),
            reserved_names: Vec::new(),
            std_2008: true,
        }
    }
}

/// How the library is written to disk.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Single concatenated file or one file per entity.
    #[serde(default)]
    pub mode: OutputMode,
    /// Output directory (or file stem for single mode).
    #[serde(default = "default_directory")]
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            directory: default_directory(),
        }
    }
}

/// Output layout of the generated library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// One concatenated source.
    #[default]
    Single,
    /// One `<entity>.vhd` per entity.
    PerEntity,
}

fn default_true() -> bool {
    true
}

fn default_library() -> String {
    "work".to_string()
}

fn default_indent() -> usize {
    4
}

fn default_directory() -> String {
    "vhdl".to_string()
}
