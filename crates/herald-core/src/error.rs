//! Error taxonomy shared by every stage of command execution.
//!
//! Each failure a pipeline stage can produce is its own type so that error
//! handlers can classify a type-erased [`BoxError`] by downcasting. The
//! `Display` output of the user-facing kinds is the text shown to the invoking
//! user; localization and richer rendering are left to external formatters.
//!
//! [`classify`] maps an error to an [`ErrorDisposition`]:
//!
//! | Kind | Disposition |
//! |------|-------------|
//! | [`ChannelTypeError`], [`InsufficientPermissionsError`], [`RestrictionError`], [`ThrottledError`], [`ArgumentError`], [`UserError`] | user-facing |
//! | [`InternalError`] | fatal |
//! | [`NotFound`], [`SilentError`], [`InvocationAborted`], anything else | log-only |

use std::any::Any;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::channel::{ChannelKind, ChannelTypes};
use crate::permission::Permissions;

/// Type-erased error travelling through the execution pipeline.
///
/// Identical to `tower::BoxError`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Routing
// =============================================================================

/// No command matched the invoke text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no command matched the invoke")]
pub struct NotFound;

// =============================================================================
// Stage errors
// =============================================================================

/// The command does not support the channel it was invoked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("This command can't be used in this channel.")]
pub struct ChannelTypeError {
    /// Channel types the command supports.
    pub allowed: ChannelTypes,
    /// The channel kind of the invoking message.
    pub actual: ChannelKind,
}

/// The bot lacks permissions the command requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("I'm missing the following permissions to run this command: {missing}.")]
pub struct InsufficientPermissionsError {
    pub missing: Permissions,
}

/// A restriction rejected the invocation.
///
/// Every restriction error aborts execution. `fatal` marks errors the user
/// cannot resolve (for example by switching channels or acquiring a role);
/// only fatal errors hide a command when listing commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{description}")]
pub struct RestrictionError {
    pub description: String,
    pub fatal: bool,
}

impl RestrictionError {
    /// A restriction error the user cannot work around.
    pub fn fatal(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            fatal: true,
        }
    }

    /// A restriction error the user may be able to resolve.
    pub fn recoverable(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            fatal: false,
        }
    }
}

/// The invocation was rate limited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("You're using this command too often. Try again in {}.", format_wait(.wait))]
pub struct ThrottledError {
    /// Time until the next invocation will be admitted.
    pub wait: Duration,
}

/// Renders a wait duration rounded up to whole seconds, e.g. `1m 5s`.
fn format_wait(wait: &Duration) -> String {
    let mut secs = wait.as_secs();
    if wait.subsec_nanos() > 0 || secs == 0 {
        secs += 1;
    }
    match (secs / 60, secs % 60) {
        (0, s) => format!("{s}s"),
        (m, 0) => format!("{m}m"),
        (m, s) => format!("{m}m {s}s"),
    }
}

/// The argument text could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// Text followed a command that takes no arguments.
    #[error("This command doesn't take any arguments.")]
    UnexpectedArguments,

    /// A required argument was missing.
    #[error("You need to provide the argument `{0}`.")]
    Missing(String),

    /// An argument was malformed.
    #[error("{0}")]
    Invalid(String),

    /// The user asked for usage help; carries the rendered help text.
    #[error("{0}")]
    Help(String),
}

impl ArgumentError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

// =============================================================================
// Errors raised by plugin code
// =============================================================================

/// An error whose message is shown to the invoking user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct UserError(pub String);

impl UserError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// An error that is logged but never shown to the user.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SilentError {
    pub message: String,
    #[source]
    pub source: Option<BoxError>,
}

impl SilentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// An unexpected failure: logged as an error and answered with a generic
/// apology.
#[derive(Debug, Error)]
#[error("internal error: {source}")]
pub struct InternalError {
    #[source]
    pub source: BoxError,
}

impl InternalError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

/// A pipeline stage was torn down before it produced a result, because of a
/// panic further down the chain or because its future was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invocation aborted before completion")]
pub struct InvocationAborted;

// =============================================================================
// Panics
// =============================================================================

/// The value recovered from a panic caught at the pipeline boundary.
pub struct PanicPayload(Box<dyn Any + Send>);

impl PanicPayload {
    pub fn new(payload: Box<dyn Any + Send>) -> Self {
        Self(payload)
    }

    /// The panic message, if the payload is a string.
    pub fn message(&self) -> Option<&str> {
        self.0
            .downcast_ref::<&'static str>()
            .copied()
            .or_else(|| self.0.downcast_ref::<String>().map(String::as_str))
    }

    /// Returns the raw payload.
    pub fn into_inner(self) -> Box<dyn Any + Send> {
        self.0
    }
}

impl fmt::Debug for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PanicPayload").field(&self.message()).finish()
    }
}

impl fmt::Display for PanicPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => write!(f, "panic: {msg}"),
            None => f.write_str("panic with non-string payload"),
        }
    }
}

// =============================================================================
// Classification
// =============================================================================

/// How an error handler should treat a pipeline error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Reply to the invoking user with the given text.
    UserFacing(String),
    /// Log the error; the user sees nothing.
    LogOnly,
    /// Log the error as a failure and tell the user something went wrong.
    Fatal,
}

/// Classifies a pipeline error by its concrete type.
pub fn classify(err: &(dyn std::error::Error + Send + Sync + 'static)) -> ErrorDisposition {
    macro_rules! user_facing {
        ($($ty:ty),* $(,)?) => {
            $(
                if let Some(e) = err.downcast_ref::<$ty>() {
                    return ErrorDisposition::UserFacing(e.to_string());
                }
            )*
        };
    }

    user_facing!(
        ChannelTypeError,
        InsufficientPermissionsError,
        RestrictionError,
        ThrottledError,
        ArgumentError,
        UserError,
    );

    if err.is::<InternalError>() {
        ErrorDisposition::Fatal
    } else {
        ErrorDisposition::LogOnly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_wait_rounds_up() {
        assert_eq!(format_wait(&Duration::from_millis(19_200)), "20s");
        assert_eq!(format_wait(&Duration::from_secs(65)), "1m 5s");
        assert_eq!(format_wait(&Duration::from_secs(120)), "2m");
        assert_eq!(format_wait(&Duration::ZERO), "1s");
    }

    #[test]
    fn test_classify_user_facing() {
        let err: BoxError = Box::new(ThrottledError {
            wait: Duration::from_secs(20),
        });
        assert_eq!(
            classify(err.as_ref()),
            ErrorDisposition::UserFacing(
                "You're using this command too often. Try again in 20s.".into()
            )
        );

        let err: BoxError = Box::new(UserError::new("nope"));
        assert_eq!(
            classify(err.as_ref()),
            ErrorDisposition::UserFacing("nope".into())
        );
    }

    #[test]
    fn test_classify_internal_is_fatal() {
        let err: BoxError = Box::new(InternalError::new("db down"));
        assert_eq!(classify(err.as_ref()), ErrorDisposition::Fatal);
    }

    #[test]
    fn test_classify_unknown_is_log_only() {
        let err: BoxError = "something odd".into();
        assert_eq!(classify(err.as_ref()), ErrorDisposition::LogOnly);
        let err: BoxError = Box::new(SilentError::new("quiet"));
        assert_eq!(classify(err.as_ref()), ErrorDisposition::LogOnly);
    }

    #[test]
    fn test_panic_payload_message() {
        let payload = PanicPayload::new(Box::new("boom"));
        assert_eq!(payload.message(), Some("boom"));
        let payload = PanicPayload::new(Box::new(String::from("bang")));
        assert_eq!(payload.to_string(), "panic: bang");
        let payload = PanicPayload::new(Box::new(42_u8));
        assert_eq!(payload.message(), None);
    }
}
