//! Extractor system for the Herald framework.
//!
//! The [`FromContext`] trait defines how handler parameters are pulled out of
//! an [`InvokeContext`].
//!
//! | Parameter | Extracted value |
//! |-----------|-----------------|
//! | `Arc<InvokeContext>` | the whole context |
//! | [`MessageEvent`] | a clone of the invoking message |
//! | [`CommandRef`] | the matched command |
//! | [`BoxedBot`] / `Arc<B: Bot>` | the bot, optionally downcast |
//! | [`Args<T>`] | the value parsed by the command's argument config |
//! | [`State<T>`] | a value stored with [`InvokeContext::set_state`] |
//! | `Option<T>` | `T`, or `None` when extraction fails |

use std::ops::Deref;
use std::sync::Arc;

use herald_core::{Bot, BoxedBot, MessageEvent, downcast_bot};

use crate::context::InvokeContext;
use crate::error::{ExtractError, ExtractResult};
use crate::tree::CommandRef;

/// A trait for types that can be extracted from an [`InvokeContext`].
///
/// # Example
///
/// ```rust,ignore
/// struct AuthorName(String);
///
/// impl FromContext for AuthorName {
///     fn from_context(ctx: &Arc<InvokeContext>) -> ExtractResult<Self> {
///         Ok(AuthorName(ctx.event().author.name.clone()))
///     }
/// }
/// ```
pub trait FromContext: Sized {
    /// Attempts to extract this type from the given context.
    fn from_context(ctx: &Arc<InvokeContext>) -> ExtractResult<Self>;
}

impl FromContext for Arc<InvokeContext> {
    fn from_context(ctx: &Arc<InvokeContext>) -> ExtractResult<Self> {
        Ok(Arc::clone(ctx))
    }
}

impl FromContext for MessageEvent {
    fn from_context(ctx: &Arc<InvokeContext>) -> ExtractResult<Self> {
        Ok(ctx.event().clone())
    }
}

impl FromContext for CommandRef {
    fn from_context(ctx: &Arc<InvokeContext>) -> ExtractResult<Self> {
        Ok(ctx.command().clone())
    }
}

/// Optional parameters never fail to extract.
impl<T: FromContext> FromContext for Option<T> {
    fn from_context(ctx: &Arc<InvokeContext>) -> ExtractResult<Self> {
        Ok(T::from_context(ctx).ok())
    }
}

impl FromContext for BoxedBot {
    fn from_context(ctx: &Arc<InvokeContext>) -> ExtractResult<Self> {
        Ok(ctx.bot_arc())
    }
}

/// Extracts a concrete bot type to reach platform-specific APIs.
///
/// ```rust,ignore
/// async fn pin(bot: Arc<MyPlatformBot>, event: MessageEvent) {
///     bot.pin_message(event.channel_id, event.id).await.ok();
/// }
/// ```
impl<T: Bot> FromContext for Arc<T> {
    fn from_context(ctx: &Arc<InvokeContext>) -> ExtractResult<Self> {
        downcast_bot::<T>(ctx.bot_arc()).ok_or(ExtractError::BotTypeMismatch {
            expected: std::any::type_name::<T>(),
        })
    }
}

// =============================================================================
// Args
// =============================================================================

/// The parsed arguments of the invocation.
///
/// `T` must match the type produced by the command's
/// [`ArgConfig`](crate::args::ArgConfig).
#[derive(Debug)]
pub struct Args<T>(pub Arc<T>);

impl<T> Clone for Args<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for Args<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Send + Sync + 'static> FromContext for Args<T> {
    fn from_context(ctx: &Arc<InvokeContext>) -> ExtractResult<Self> {
        let parsed = ctx.parsed_args().ok_or(ExtractError::ArgsNotParsed)?;
        parsed
            .downcast::<T>()
            .map(Args)
            .ok_or(ExtractError::ArgsTypeMismatch {
                expected: std::any::type_name::<T>(),
            })
    }
}

// =============================================================================
// State
// =============================================================================

/// A clone of a value stored in the invocation's state map, typically by a
/// middleware.
#[derive(Debug, Clone)]
pub struct State<T>(pub T);

impl<T> Deref for State<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: Clone + Send + Sync + 'static> FromContext for State<T> {
    fn from_context(ctx: &Arc<InvokeContext>) -> ExtractResult<Self> {
        ctx.get_state::<T>()
            .map(State)
            .ok_or(ExtractError::StateMissing(std::any::type_name::<T>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ParsedArgs;
    use crate::testing::{MockBot, context_for};

    #[test]
    fn test_args_require_parsing() {
        let ctx = context_for("ping");
        assert!(matches!(
            Args::<String>::from_context(&ctx),
            Err(ExtractError::ArgsNotParsed)
        ));

        ctx.set_args(ParsedArgs::new(vec![String::from("a")]));
        let Args(args) = Args::<Vec<String>>::from_context(&ctx).unwrap();
        assert_eq!(args.as_slice(), ["a"]);
        assert!(Option::<Args<u8>>::from_context(&ctx).unwrap().is_none());
    }

    #[test]
    fn test_bot_downcast() {
        let ctx = context_for("ping");
        assert!(Arc::<MockBot>::from_context(&ctx).is_ok());
    }

    #[test]
    fn test_state_extractor() {
        #[derive(Clone, PartialEq, Debug)]
        struct Locale(&'static str);

        let ctx = context_for("ping");
        assert!(State::<Locale>::from_context(&ctx).is_err());
        ctx.set_state(Locale("de"));
        assert_eq!(State::<Locale>::from_context(&ctx).unwrap().0, Locale("de"));
    }
}
