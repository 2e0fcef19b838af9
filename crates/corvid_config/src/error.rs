//! Error types for configuration loading and validation.

/// Errors raised while loading `corvid.toml`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content is malformed or has unknown values.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A value is syntactically valid but not acceptable.
    #[error("validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_validation_error() {
        let err = ConfigError::ValidationError("vhdl.indent must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "validation error: vhdl.indent must be positive"
        );
    }

    #[test]
    fn display_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = ConfigError::from(io_err);
        assert!(err.to_string().starts_with("failed to read configuration:"));
    }
}
