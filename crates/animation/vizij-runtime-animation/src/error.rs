//! Error types for runtime evaluation.

/// Errors surfaced by [`RuntimeInstance`](crate::RuntimeInstance) operations.
///
/// Degenerate inputs (empty property path, no keys, `from == to`, odd speed
/// ratios) are handled by policy and never produce an error.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RuntimeError {
    /// An intermediate segment of the property path resolved to nothing.
    #[error("cannot resolve property path '{path}': segment '{segment}' is undefined")]
    PropertyPathResolution { path: String, segment: String },

    /// The target refused to store a value in one of its slots.
    #[error("cannot assign property '{property}': {reason}")]
    PropertyAssignment { property: String, reason: String },
}

impl RuntimeError {
    /// Short label for logs.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::PropertyPathResolution { .. } => "path",
            Self::PropertyAssignment { .. } => "target",
        }
    }
}

pub type Result<T> = core::result::Result<T, RuntimeError>;
