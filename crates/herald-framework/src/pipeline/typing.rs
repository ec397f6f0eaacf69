//! The typing indicator stage.
//!
//! While the inner stages run, a background task re-triggers the platform's
//! typing indicator every interval. The task is stopped and joined when the
//! stages finish, and cancelled and aborted if the stage future is dropped or
//! unwinds.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use herald_core::{BoxError, BoxedBot, ChannelId, Reply};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::{Layer, Service};
use tracing::{trace, warn};

use crate::context::InvokeContext;

/// How often the typing indicator is re-triggered by default. Platforms
/// typically show it for a few seconds after each trigger.
pub const DEFAULT_TYPING_INTERVAL: Duration = Duration::from_secs(6);

// ─── TypingIndicator ─────────────────────────────────────────────────────────

/// A running typing indicator task.
struct TypingIndicator {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TypingIndicator {
    fn start(bot: BoxedBot, channel: ChannelId, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                if task_token.run_until_cancelled(ticker.tick()).await.is_none() {
                    break;
                }
                match task_token
                    .run_until_cancelled(bot.trigger_typing(channel))
                    .await
                {
                    None => break,
                    Some(Ok(())) => trace!(%channel, "Triggered typing indicator"),
                    Some(Err(err)) => warn!(%channel, error = %err, "Failed to trigger typing indicator"),
                }
            }
        });

        Self {
            token,
            handle: Some(handle),
        }
    }

    /// Cancels the task and waits for it to exit.
    async fn stop(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(err) = handle.await
            && err.is_panic()
        {
            warn!(error = %err, "Typing indicator task panicked");
        }
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

// ─── TypingLayer ─────────────────────────────────────────────────────────────

/// Shows a typing indicator while the inner stages run.
///
/// `None` disables the indicator.
#[derive(Debug, Clone, Copy)]
pub struct TypingLayer {
    interval: Option<Duration>,
}

impl TypingLayer {
    pub fn new(interval: Option<Duration>) -> Self {
        Self { interval }
    }
}

impl Default for TypingLayer {
    fn default() -> Self {
        Self::new(Some(DEFAULT_TYPING_INTERVAL))
    }
}

impl<S> Layer<S> for TypingLayer {
    type Service = TypingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TypingService {
            inner,
            interval: self.interval,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypingService<S> {
    inner: S,
    interval: Option<Duration>,
}

impl<S> Service<Arc<InvokeContext>> for TypingService<S>
where
    S: Service<Arc<InvokeContext>, Response = Reply, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Reply;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Reply, BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, ctx: Arc<InvokeContext>) -> Self::Future {
        let mut inner = self.inner.clone();
        let Some(interval) = self.interval else {
            return inner.call(ctx).boxed();
        };

        async move {
            let indicator = TypingIndicator::start(ctx.bot_arc(), ctx.event().channel_id, interval);
            let result = inner.call(ctx).await;
            indicator.stop().await;
            result
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::CommandDefinition;
    use crate::pipeline::stage::InvokeService;
    use crate::testing::{MockBot, context_with, guild_event};
    use tokio_test::assert_ok;
    use tower::ServiceExt;

    async fn slow() {
        tokio::time::sleep(Duration::from_secs(13)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_repeats_until_done() {
        let bot = Arc::new(MockBot::new());
        let ctx = context_with(
            CommandDefinition::new("slow", slow),
            guild_event(1, "slow"),
            bot.clone(),
        );

        let service = TypingLayer::new(Some(Duration::from_secs(6))).layer(InvokeService);
        assert_ok!(service.oneshot(ctx).await);
        assert_eq!(bot.typing_calls(), 3);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(bot.typing_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_typing() {
        let bot = Arc::new(MockBot::new());
        let ctx = context_with(
            CommandDefinition::new("slow", slow),
            guild_event(1, "slow"),
            bot.clone(),
        );

        assert_ok!(TypingLayer::new(None).layer(InvokeService).oneshot(ctx).await);
        assert_eq!(bot.typing_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_future_stops_task() {
        let bot = Arc::new(MockBot::new());
        let ctx = context_with(
            CommandDefinition::new("slow", slow),
            guild_event(1, "slow"),
            bot.clone(),
        );

        let call = TypingLayer::default().layer(InvokeService).oneshot(ctx);
        let timed_out = tokio::time::timeout(Duration::from_secs(1), call).await;
        assert!(timed_out.is_err());
        let before = bot.typing_calls();
        assert_eq!(before, 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(bot.typing_calls(), before);
    }
}
