//! Error types for the Herald framework.

use thiserror::Error;

/// Errors that can occur while extracting handler parameters.
///
/// Extraction failures are programming errors (a handler asking for
/// arguments of a type its command does not parse), so the handler
/// machinery reports them as internal errors.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// The parsed arguments are not of the requested type.
    #[error("argument type mismatch: expected '{expected}'")]
    ArgsTypeMismatch {
        /// Expected type name.
        expected: &'static str,
    },

    /// The argument stage has not run for this invocation.
    #[error("arguments have not been parsed")]
    ArgsNotParsed,

    /// The bot type does not match the expected type.
    #[error("bot type mismatch: expected '{expected}'")]
    BotTypeMismatch {
        /// Expected bot type name.
        expected: &'static str,
    },

    /// No state of the requested type was stored in the context.
    #[error("no state of type '{0}' in context")]
    StateMissing(&'static str),

    /// Custom extraction error.
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;
