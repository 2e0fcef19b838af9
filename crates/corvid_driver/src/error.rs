//! Errors surfaced by the driver.

use corvid_config::ConfigError;
use corvid_diagnostics::CompileError;
use std::path::PathBuf;

/// Anything that stops a build.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// `corvid.toml` could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A compiler pass rejected the design.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Generated VHDL could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// The file or directory being written.
        path: PathBuf,
        /// The underlying I/O failure.
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_names_the_path() {
        let err = DriverError::Write {
            path: PathBuf::from("out/top.vhd"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "failed to write out/top.vhd: denied");
    }

    #[test]
    fn compile_errors_pass_through() {
        let err = DriverError::from(CompileError::context("q is driven twice"));
        assert_eq!(err.to_string(), "context error: q is driven twice");
    }
}
