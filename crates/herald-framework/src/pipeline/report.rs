//! Error and panic handlers.
//!
//! The pipeline hands every stage error to an [`ErrorHandler`] and every
//! caught panic to a [`PanicHandler`]. The defaults classify errors with
//! [`classify`] and answer the invoking user accordingly.

use async_trait::async_trait;
use herald_core::{BoxError, ErrorDisposition, PanicPayload, Reply, classify};
use tracing::{debug, error, warn};

use crate::context::InvokeContext;

/// Sent when an invocation fails unexpectedly.
pub const APOLOGY: &str = "Sorry, something went wrong while running this command.";

/// Handles an error that aborted an invocation.
#[async_trait]
pub trait ErrorHandler: Send + Sync + 'static {
    async fn on_error(&self, ctx: &InvokeContext, err: BoxError);
}

/// Handles a panic caught at the pipeline boundary.
#[async_trait]
pub trait PanicHandler: Send + Sync + 'static {
    async fn on_panic(&self, ctx: &InvokeContext, payload: PanicPayload);
}

/// Replies with user-facing errors, logs everything else.
///
/// | Disposition | Log level | Reply |
/// |-------------|-----------|-------|
/// | user-facing | `debug` | the error text |
/// | log-only | `debug` | none |
/// | fatal | `error` | [`APOLOGY`] |
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

#[async_trait]
impl ErrorHandler for DefaultErrorHandler {
    async fn on_error(&self, ctx: &InvokeContext, err: BoxError) {
        match classify(err.as_ref()) {
            ErrorDisposition::UserFacing(text) => {
                debug!(error = %err, "Invocation rejected");
                send_reply(ctx, Reply::Text(text)).await;
            }
            ErrorDisposition::LogOnly => {
                debug!(error = %err, "Invocation failed silently");
            }
            ErrorDisposition::Fatal => {
                error!(error = %err, "Invocation failed");
                send_reply(ctx, Reply::text(APOLOGY)).await;
            }
        }
    }
}

/// Logs the panic and replies with [`APOLOGY`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPanicHandler;

#[async_trait]
impl PanicHandler for DefaultPanicHandler {
    async fn on_panic(&self, ctx: &InvokeContext, payload: PanicPayload) {
        error!(%payload, "Command panicked");
        send_reply(ctx, Reply::text(APOLOGY)).await;
    }
}

/// Delivers `reply` to the invoking channel. Delivery failures are logged.
pub async fn send_reply(ctx: &InvokeContext, reply: Reply) {
    if let Err(err) = reply.deliver(ctx.bot().as_ref(), ctx.event().channel_id).await {
        warn!(error = %err, "Failed to deliver reply");
    }
}
