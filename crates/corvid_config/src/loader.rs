//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::CompilerConfig;
use std::path::Path;

/// Loads `<project_dir>/corvid.toml`, falling back to defaults if the file
/// does not exist.
pub fn load_config(project_dir: &Path) -> Result<CompilerConfig, ConfigError> {
    let config_path = project_dir.join("corvid.toml");
    if !config_path.exists() {
        return Ok(CompilerConfig::default());
    }
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates configuration text.
pub fn load_config_from_str(content: &str) -> Result<CompilerConfig, ConfigError> {
    let config: CompilerConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &CompilerConfig) -> Result<(), ConfigError> {
    if config.vhdl.indent == 0 {
        return Err(ConfigError::ValidationError(
            "vhdl.indent must be positive".to_string(),
        ));
    }
    if config.vhdl.library.is_empty() {
        return Err(ConfigError::ValidationError(
            "vhdl.library must not be empty".to_string(),
        ));
    }
    for name in &config.vhdl.reserved_names {
        if !is_vhdl_identifier(name) {
            return Err(ConfigError::ValidationError(format!(
                "reserved name `{name}` is not a VHDL identifier"
            )));
        }
    }
    Ok(())
}

/// Basic VHDL identifier rule: a letter, then letters, digits, or single
/// underscores, not ending in an underscore.
fn is_vhdl_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    !name.ends_with('_')
        && !name.contains("__")
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OutputMode;

    #[test]
    fn empty_config_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert!(config.compiler.traceback);
        assert_eq!(config.vhdl.library, "work");
        assert_eq!(config.vhdl.indent, 4);
        assert!(config.vhdl.std_2008);
        assert_eq!(config.output.mode, OutputMode::Single);
    }

    #[test]
    fn full_config() {
        let toml = r#"
[compiler]
traceback = false

[vhdl]
library = "corelib"
indent = 2
reserved_names = ["clk_gen", "top"]
std_2008 = false

[output]
mode = "per-entity"
directory = "out"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert!(!config.compiler.traceback);
        assert_eq!(config.vhdl.library, "corelib");
        assert_eq!(config.vhdl.indent, 2);
        assert_eq!(config.vhdl.reserved_names, vec!["clk_gen", "top"]);
        assert_eq!(config.output.mode, OutputMode::PerEntity);
        assert_eq!(config.output.directory, "out");
    }

    #[test]
    fn zero_indent_rejected() {
        let err = load_config_from_str("[vhdl]\nindent = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn bad_reserved_name_rejected() {
        let err = load_config_from_str("[vhdl]\nreserved_names = [\"_x\"]\n").unwrap_err();
        assert!(err.to_string().contains("_x"));
    }

    #[test]
    fn unknown_field_rejected() {
        let err = load_config_from_str("[vhdl]\nfoo = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.vhdl.library, "work");
    }

    #[test]
    fn load_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("corvid.toml"), "[vhdl]\nindent = 3\n").unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.vhdl.indent, 3);
    }

    #[test]
    fn identifier_rule() {
        assert!(is_vhdl_identifier("state_reg"));
        assert!(!is_vhdl_identifier("state_"));
        assert!(!is_vhdl_identifier("a__b"));
        assert!(!is_vhdl_identifier("9lives"));
    }
}
