//! Error definitions.
use std::result;

/// A specialized Result type for this library.
pub type Result<T, E = FindNeardupError> = result::Result<T, E>;

/// Errors in this library.
///
/// Comparisons themselves never fail; errors only arise from invalid parameters
/// and from calling operations out of order.
#[derive(Debug, thiserror::Error)]
pub enum FindNeardupError {
    /// Invalid index or engine parameters, detected at construction.
    #[error("ConfigurationError: {0}")]
    Configuration(String),

    /// An operation was called in a state that does not allow it.
    #[error("PreconditionError: {0}")]
    Precondition(&'static str),

    /// Invalid caller input.
    #[error("InputError: {0}")]
    Input(String),
}

impl FindNeardupError {
    pub(crate) fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) const fn precondition(msg: &'static str) -> Self {
        Self::Precondition(msg)
    }

    pub(crate) fn input<S: Into<String>>(msg: S) -> Self {
        Self::Input(msg.into())
    }
}
