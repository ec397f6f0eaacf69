//! The check stages and the innermost invoke service.
//!
//! Checks are tower filter predicates: a passing check hands the context on
//! unchanged, a failing one rejects it with the stage's error type.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use herald_core::{
    BoxError, ChannelTypeError, InsufficientPermissionsError, InternalError, Reply,
};
use tower::Service;
use tower::filter::{AsyncPredicate, Predicate};
use tracing::trace;

use crate::context::InvokeContext;

type CheckFuture = BoxFuture<'static, Result<Arc<InvokeContext>, BoxError>>;

// ============================================================================
// Channel type
// ============================================================================

/// Rejects invocations from channel kinds the command does not support.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelTypeCheck;

impl Predicate<Arc<InvokeContext>> for ChannelTypeCheck {
    type Request = Arc<InvokeContext>;

    fn check(&mut self, ctx: Arc<InvokeContext>) -> Result<Arc<InvokeContext>, BoxError> {
        let allowed = ctx.command().channel_types();
        let actual = ctx.event().channel_kind;
        if allowed.allows(actual) {
            Ok(ctx)
        } else {
            Err(ChannelTypeError { allowed, actual }.into())
        }
    }
}

// ============================================================================
// Bot permissions
// ============================================================================

/// Rejects invocations when the bot lacks the command's required permissions.
///
/// Commands that require nothing skip the platform query entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct BotPermissionCheck;

impl AsyncPredicate<Arc<InvokeContext>> for BotPermissionCheck {
    type Future = CheckFuture;
    type Request = Arc<InvokeContext>;

    fn check(&mut self, ctx: Arc<InvokeContext>) -> Self::Future {
        check_bot_permissions(ctx).boxed()
    }
}

async fn check_bot_permissions(ctx: Arc<InvokeContext>) -> Result<Arc<InvokeContext>, BoxError> {
    let required = ctx.command().bot_permissions();
    if required.is_empty() {
        return Ok(ctx);
    }

    let granted = ctx
        .bot()
        .permissions_in(ctx.event())
        .await
        .map_err(InternalError::new)?;
    let missing = granted.missing(required);
    if missing.is_empty() {
        Ok(ctx)
    } else {
        Err(InsufficientPermissionsError { missing }.into())
    }
}

// ============================================================================
// Restriction
// ============================================================================

/// Runs the command's restriction, if any.
#[derive(Debug, Clone, Copy, Default)]
pub struct RestrictionCheck;

impl AsyncPredicate<Arc<InvokeContext>> for RestrictionCheck {
    type Future = CheckFuture;
    type Request = Arc<InvokeContext>;

    fn check(&mut self, ctx: Arc<InvokeContext>) -> Self::Future {
        check_restriction(ctx).boxed()
    }
}

async fn check_restriction(ctx: Arc<InvokeContext>) -> Result<Arc<InvokeContext>, BoxError> {
    if let Some(restriction) = ctx.command().restriction() {
        restriction.check(ctx.event(), &**ctx.bot()).await?;
    }
    Ok(ctx)
}

// ============================================================================
// Arguments
// ============================================================================

/// Parses the raw argument text with the command's argument config and
/// stores the result on the context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseArguments;

impl AsyncPredicate<Arc<InvokeContext>> for ParseArguments {
    type Future = CheckFuture;
    type Request = Arc<InvokeContext>;

    fn check(&mut self, ctx: Arc<InvokeContext>) -> Self::Future {
        parse_arguments(ctx).boxed()
    }
}

async fn parse_arguments(ctx: Arc<InvokeContext>) -> Result<Arc<InvokeContext>, BoxError> {
    let parsed = ctx.command().args().parse(&ctx, ctx.raw_args()).await?;
    ctx.set_args(parsed);
    Ok(ctx)
}

// ============================================================================
// Invoke
// ============================================================================

/// The innermost service: calls the command's handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvokeService;

impl Service<Arc<InvokeContext>> for InvokeService {
    type Response = Reply;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Reply, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: Arc<InvokeContext>) -> Self::Future {
        trace!(command = %ctx.command().identifier(), "Invoking handler");
        let handler = Arc::clone(ctx.command().handler());
        handler(ctx).boxed()
    }
}
