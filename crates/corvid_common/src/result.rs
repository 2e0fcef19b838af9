//! Internal-error result type.

/// Result type for operations that can only fail because of a compiler bug.
///
/// User-facing failures are reported as `CompileError` values from
/// `corvid_diagnostics`; `Err(InternalError)` means corvid itself is wrong.
pub type CorvidResult<T> = Result<T, InternalError>;

/// An internal compiler error indicating a bug in corvid, not in the design.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("internal compiler error: {message}")]
pub struct InternalError {
    /// Description of the broken invariant.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
