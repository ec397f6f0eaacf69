//! Argument configuration.
//!
//! Every command carries an [`ArgConfig`] that turns the text following the
//! command name into a typed value. The parsed value is stored on the
//! [`InvokeContext`] and handed to handlers through the [`Args`] extractor.
//!
//! Concrete parsers for platform types (mentions, channels, durations, ...)
//! live outside this crate; the built-in configs only cover the generic cases:
//!
//! | Config | Parsed type | Behaviour |
//! |--------|-------------|-----------|
//! | [`NoArgs`] | `()` | rejects any trailing text |
//! | [`RawArgs`] | `String` | the remainder as-is, optionally required |
//! | [`ShellArgs`] | `Vec<String>` | shell-like split honouring quotes |
//! | `ClapArgs<T>` | `T` | a `clap::Parser` (feature `clap`) |
//!
//! ```rust,ignore
//! use herald_framework::{Args, CommandDefinition, args::ShellArgs};
//!
//! async fn kick(Args(args): Args<Vec<String>>) -> String {
//!     format!("kicking {}", args[0])
//! }
//!
//! let cmd = CommandDefinition::new("kick", kick)
//!     .args(ShellArgs::new().required("member"));
//! ```
//!
//! [`Args`]: crate::extractor::Args

mod shell;

#[cfg(feature = "clap")]
mod clap_args;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use herald_core::ArgumentError;

use crate::context::InvokeContext;

pub use shell::shell_split;

#[cfg(feature = "clap")]
pub use clap_args::ClapArgs;

/// Parses the argument text of a command.
#[async_trait]
pub trait ArgConfig: Send + Sync + 'static {
    /// Parses `raw`, the text following the invoked name with leading
    /// whitespace removed.
    async fn parse(&self, ctx: &InvokeContext, raw: &str) -> Result<ParsedArgs, ArgumentError>;

    /// A one-line usage string, e.g. `<member> [reason]`.
    fn usage(&self) -> Option<String> {
        None
    }
}

/// A shared, type-erased argument config.
pub type BoxedArgConfig = Arc<dyn ArgConfig>;

/// A type-erased parsed argument value.
#[derive(Clone)]
pub struct ParsedArgs(Arc<dyn Any + Send + Sync>);

impl ParsedArgs {
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self(Arc::new(value))
    }

    /// Returns the value if it is a `T`.
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.0.is::<T>()
    }
}

impl fmt::Debug for ParsedArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParsedArgs").finish_non_exhaustive()
    }
}

// =============================================================================
// Built-in configs
// =============================================================================

/// Accepts no arguments. Parses to `()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArgs;

#[async_trait]
impl ArgConfig for NoArgs {
    async fn parse(&self, _ctx: &InvokeContext, raw: &str) -> Result<ParsedArgs, ArgumentError> {
        if raw.trim().is_empty() {
            Ok(ParsedArgs::new(()))
        } else {
            Err(ArgumentError::UnexpectedArguments)
        }
    }
}

/// Passes the argument text through unchanged. Parses to `String`.
#[derive(Debug, Clone, Default)]
pub struct RawArgs {
    required: Option<String>,
}

impl RawArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects empty text, naming the missing argument `name`.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            required: Some(name.into()),
        }
    }
}

#[async_trait]
impl ArgConfig for RawArgs {
    async fn parse(&self, _ctx: &InvokeContext, raw: &str) -> Result<ParsedArgs, ArgumentError> {
        let text = raw.trim();
        match &self.required {
            Some(name) if text.is_empty() => Err(ArgumentError::Missing(name.clone())),
            _ => Ok(ParsedArgs::new(text.to_owned())),
        }
    }

    fn usage(&self) -> Option<String> {
        Some(match &self.required {
            Some(name) => format!("<{name}...>"),
            None => "[text...]".to_owned(),
        })
    }
}

/// Splits the argument text like a shell would. Parses to `Vec<String>`.
///
/// Leading positional arguments can be declared required; extra tokens are
/// kept unless [`max`](Self::max) is set.
#[derive(Debug, Clone, Default)]
pub struct ShellArgs {
    required: Vec<String>,
    max: Option<usize>,
}

impl ShellArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the next positional argument as required.
    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.required.push(name.into());
        self
    }

    /// Rejects more than `max` tokens.
    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }
}

#[async_trait]
impl ArgConfig for ShellArgs {
    async fn parse(&self, _ctx: &InvokeContext, raw: &str) -> Result<ParsedArgs, ArgumentError> {
        let tokens = shell_split(raw)?;
        if let Some(name) = self.required.get(tokens.len()) {
            return Err(ArgumentError::Missing(name.clone()));
        }
        if let Some(max) = self.max
            && tokens.len() > max
        {
            return Err(match max {
                0 => ArgumentError::UnexpectedArguments,
                _ => ArgumentError::invalid(format!(
                    "This command takes at most {max} argument(s), but {} were given.",
                    tokens.len()
                )),
            });
        }
        Ok(ParsedArgs::new(tokens))
    }

    fn usage(&self) -> Option<String> {
        let mut parts: Vec<String> = self.required.iter().map(|n| format!("<{n}>")).collect();
        if self.max.is_none_or(|max| max > self.required.len()) {
            parts.push("[args...]".to_owned());
        }
        Some(parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::context_for;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_no_args_rejects_text() {
        let ctx = context_for("ping");
        assert_ok!(NoArgs.parse(&ctx, "").await);
        assert_ok!(NoArgs.parse(&ctx, "   ").await);
        let err = assert_err!(NoArgs.parse(&ctx, "extra").await);
        assert_eq!(err, ArgumentError::UnexpectedArguments);
    }

    #[tokio::test]
    async fn test_raw_args_required() {
        let ctx = context_for("echo");
        let parsed = assert_ok!(RawArgs::new().parse(&ctx, "hello  world ").await);
        assert_eq!(*parsed.downcast::<String>().unwrap(), "hello  world");

        let err = assert_err!(RawArgs::required("text").parse(&ctx, "").await);
        assert_eq!(err, ArgumentError::Missing("text".into()));
    }

    #[tokio::test]
    async fn test_shell_args_required_and_max() {
        let ctx = context_for("kick");
        let config = ShellArgs::new().required("member").max(2);

        let parsed = assert_ok!(config.parse(&ctx, r#"@alice "being rude""#).await);
        assert_eq!(
            *parsed.downcast::<Vec<String>>().unwrap(),
            vec!["@alice".to_owned(), "being rude".to_owned()]
        );

        let err = assert_err!(config.parse(&ctx, "").await);
        assert_eq!(err, ArgumentError::Missing("member".into()));

        assert_err!(config.parse(&ctx, "a b c").await);
        assert_eq!(config.usage().as_deref(), Some("<member> [args...]"));
    }

    #[test]
    fn test_parsed_args_downcast() {
        let parsed = ParsedArgs::new(42_u32);
        assert!(parsed.is::<u32>());
        assert_eq!(parsed.downcast::<u32>().as_deref(), Some(&42));
        assert!(parsed.downcast::<String>().is_none());
    }
}
