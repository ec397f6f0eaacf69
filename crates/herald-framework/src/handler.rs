//! Handler system for the Herald framework.
//!
//! Business callbacks are plain async functions. Every parameter is extracted
//! from the [`InvokeContext`] through [`FromContext`] and the return value is
//! turned into a [`Reply`] through [`IntoReply`], in the style of Axum
//! handlers.
//!
//! # Example
//!
//! ```rust,ignore
//! use herald_framework::{Args, InvokeContext};
//!
//! // No parameters, no reply
//! async fn noop() {}
//!
//! // Reply with text
//! async fn ping() -> &'static str {
//!     "pong"
//! }
//!
//! // Parsed arguments and a fallible reply
//! async fn echo(Args(text): Args<String>) -> Result<String, UserError> {
//!     if text.is_empty() {
//!         return Err(UserError::new("Nothing to echo."));
//!     }
//!     Ok(text.to_string())
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use herald_core::{BoxError, InternalError, Reply};
use serde_json::Value;

use crate::context::InvokeContext;
use crate::extractor::FromContext;

/// What a handler produces: a reply to deliver or an error for the error
/// handler.
pub type HandlerResult = Result<Reply, BoxError>;

// ============================================================================
// IntoReply - Handle handler return values
// ============================================================================

/// A trait for types that can be returned from handlers.
pub trait IntoReply: Send {
    fn into_reply(self) -> HandlerResult;
}

impl IntoReply for () {
    fn into_reply(self) -> HandlerResult {
        Ok(Reply::None)
    }
}

impl IntoReply for Reply {
    fn into_reply(self) -> HandlerResult {
        Ok(self)
    }
}

impl IntoReply for String {
    fn into_reply(self) -> HandlerResult {
        Ok(Reply::Text(self))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> HandlerResult {
        Ok(Reply::Text(self.to_owned()))
    }
}

impl IntoReply for Value {
    fn into_reply(self) -> HandlerResult {
        Ok(Reply::Content(self))
    }
}

/// `None` sends nothing.
impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> HandlerResult {
        match self {
            Some(value) => value.into_reply(),
            None => Ok(Reply::None),
        }
    }
}

/// `Err` is handed to the pipeline's error handler.
impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<BoxError> + Send,
{
    fn into_reply(self) -> HandlerResult {
        match self {
            Ok(value) => value.into_reply(),
            Err(err) => Err(err.into()),
        }
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// The core trait for command handlers.
///
/// Implemented for async functions that:
/// - take 0-16 parameters that implement [`FromContext`]
/// - return a type that implements [`IntoReply`]
///
/// A parameter that fails to extract is reported as an [`InternalError`].
#[async_trait]
pub trait Handler<T>: Clone + Send + Sync + 'static {
    /// Call the handler with the given context.
    async fn call(self, ctx: Arc<InvokeContext>) -> HandlerResult;
}

// ============================================================================
// BoxedHandler - Type-erased handler stored in the tree
// ============================================================================

/// A type-erased handler.
///
/// Internally a closure that captures the original handler and calls a
/// clone of it on each invocation.
pub type BoxedHandler =
    Arc<dyn Fn(Arc<InvokeContext>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Convert a handler function into a boxed handler.
pub fn into_handler<F, T>(f: F) -> BoxedHandler
where
    F: Handler<T>,
    T: 'static,
{
    Arc::new(move |ctx| f.clone().call(ctx))
}

// ============================================================================
// Handler implementations for functions (Axum-style)
// ============================================================================

/// Macro to generate Handler implementations for functions with different arities.
macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_variables)]
        #[async_trait]
        impl<F, Fut, Res, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: FnOnce($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: IntoReply + 'static,
            $( $ty: FromContext + Send + 'static, )*
        {
            async fn call(self, ctx: Arc<InvokeContext>) -> HandlerResult {
                $(
                    let $ty = $ty::from_context(&ctx).map_err(InternalError::new)?;
                )*

                (self)($($ty,)*).await.into_reply()
            }
        }
    };
}

// Generate implementations for 0-16 parameters
impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14);
impl_handler!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15
);
impl_handler!(
    T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12, T13, T14, T15, T16
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::Args;
    use crate::testing::context_for;
    use herald_core::{ErrorDisposition, MessageEvent, UserError, classify};

    #[test]
    fn test_into_reply_variants() {
        assert_eq!(().into_reply().unwrap(), Reply::None);
        assert_eq!("hi".into_reply().unwrap(), Reply::text("hi"));
        assert_eq!(Some(String::from("x")).into_reply().unwrap(), Reply::text("x"));
        assert_eq!(None::<String>.into_reply().unwrap(), Reply::None);

        let err = Err::<String, _>(UserError::new("nope")).into_reply().unwrap_err();
        assert_eq!(
            classify(err.as_ref()),
            ErrorDisposition::UserFacing("nope".into())
        );
    }

    #[tokio::test]
    async fn test_handler_extracts_parameters() {
        async fn echo(event: MessageEvent, Args(text): Args<String>) -> String {
            format!("{}: {}", event.author.name, text)
        }

        let ctx = context_for("echo");
        ctx.set_args(crate::args::ParsedArgs::new(String::from("hello")));
        let handler = into_handler(echo);
        assert_eq!(handler(ctx).await.unwrap(), Reply::text("tester: hello"));
    }

    #[tokio::test]
    async fn test_extraction_failure_is_internal() {
        async fn wants_number(Args(n): Args<u64>) -> String {
            n.to_string()
        }

        let ctx = context_for("num");
        ctx.set_args(crate::args::ParsedArgs::new(String::from("not a number")));
        let err = into_handler(wants_number)(ctx).await.unwrap_err();
        assert_eq!(classify(err.as_ref()), ErrorDisposition::Fatal);
    }
}
