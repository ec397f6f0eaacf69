//! The command execution pipeline.
//!
//! Every routed invocation runs through the same fixed stage sequence, each
//! stage a tower layer:
//!
//! ```text
//! middleware (first registered outermost)
//!   -> typing indicator
//!   -> channel type check
//!   -> bot permission check
//!   -> throttling
//!   -> restriction
//!   -> argument parsing
//!   -> handler
//! ```
//!
//! The first stage error aborts the remaining stages and goes to the
//! [`ErrorHandler`]. A panic anywhere in the chain is caught at the pipeline
//! boundary and goes to the [`PanicHandler`]. A successful
//! [`Reply`](herald_core::Reply) is delivered to the invoking channel.
//!
//! # Example
//!
//! ```rust,ignore
//! let pipeline = Pipeline::builder()
//!     .middleware(middleware_fn(|ctx, next| async move {
//!         info!("before");
//!         next.run(ctx).await
//!     }))
//!     .typing_interval(Duration::from_secs(5))
//!     .build();
//!
//! let outcome = pipeline.execute(Arc::new(ctx)).await;
//! ```

mod middleware;
mod report;
mod stage;
mod throttle;
mod typing;

use std::error::Error;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use herald_core::PanicPayload;
use tower::{ServiceBuilder, ServiceExt};
use tracing::{Instrument, error, info_span};

use crate::context::InvokeContext;

pub use middleware::{BoxedMiddleware, FnMiddleware, Middleware, Next, PipelineService, middleware_fn};
pub use report::{
    APOLOGY, DefaultErrorHandler, DefaultPanicHandler, ErrorHandler, PanicHandler, send_reply,
};
pub use stage::{BotPermissionCheck, ChannelTypeCheck, InvokeService, ParseArguments, RestrictionCheck};
pub use throttle::{CancelPredicate, ThrottleLayer, ThrottleService, default_cancel_predicate};
pub use typing::{DEFAULT_TYPING_INTERVAL, TypingLayer, TypingService};

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The handler returned a reply, which was delivered.
    Completed,
    /// A stage or the handler failed; the error handler ran.
    Failed,
    /// A panic was caught; the panic handler ran.
    Panicked,
}

// =============================================================================
// Pipeline
// =============================================================================

/// An assembled execution pipeline. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    service: PipelineService,
    error_handler: Arc<dyn ErrorHandler>,
    panic_handler: Arc<dyn PanicHandler>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs one invocation to completion.
    ///
    /// Never panics because of the invocation: panics raised by stages,
    /// middleware, the handler or the error handler are caught and logged.
    pub async fn execute(&self, ctx: Arc<InvokeContext>) -> Outcome {
        let span = info_span!(
            "invoke",
            command = %ctx.command().identifier(),
            user = %ctx.event().author.id,
            channel = %ctx.event().channel_id,
        );
        self.run(ctx).instrument(span).await
    }

    async fn run(&self, ctx: Arc<InvokeContext>) -> Outcome {
        let service = self.service.clone();
        let result = AssertUnwindSafe(service.oneshot(Arc::clone(&ctx)))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(reply)) => {
                send_reply(&ctx, reply).await;
                Outcome::Completed
            }
            Ok(Err(err)) => {
                let handled = AssertUnwindSafe(self.error_handler.on_error(&ctx, err))
                    .catch_unwind()
                    .await;
                if let Err(payload) = handled {
                    error!(payload = %PanicPayload::new(payload), "Error handler panicked");
                }
                Outcome::Failed
            }
            Err(payload) => {
                let handled =
                    AssertUnwindSafe(self.panic_handler.on_panic(&ctx, PanicPayload::new(payload)))
                        .catch_unwind()
                        .await;
                if let Err(payload) = handled {
                    error!(payload = %PanicPayload::new(payload), "Panic handler panicked");
                }
                Outcome::Panicked
            }
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        PipelineBuilder::new().build()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

// =============================================================================
// PipelineBuilder
// =============================================================================

/// Configures a [`Pipeline`].
pub struct PipelineBuilder {
    middleware: Vec<BoxedMiddleware>,
    typing: Option<Duration>,
    cancel: CancelPredicate,
    error_handler: Arc<dyn ErrorHandler>,
    panic_handler: Arc<dyn PanicHandler>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            middleware: Vec::new(),
            typing: Some(DEFAULT_TYPING_INTERVAL),
            cancel: default_cancel_predicate(),
            error_handler: Arc::new(DefaultErrorHandler),
            panic_handler: Arc::new(DefaultPanicHandler),
        }
    }

    /// Appends a middleware. Earlier middleware wraps later middleware.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Sets how often the typing indicator is re-triggered.
    pub fn typing_interval(mut self, interval: Duration) -> Self {
        self.typing = Some(interval);
        self
    }

    /// Sets the typing interval, `None` disabling the indicator.
    pub fn typing(mut self, interval: Option<Duration>) -> Self {
        self.typing = interval;
        self
    }

    pub fn without_typing(self) -> Self {
        self.typing(None)
    }

    /// Sets which errors release an invocation from its throttle count.
    pub fn cancel_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&(dyn Error + Send + Sync + 'static)) -> bool + Send + Sync + 'static,
    {
        self.cancel = Arc::new(predicate);
        self
    }

    pub fn error_handler(mut self, handler: impl ErrorHandler) -> Self {
        self.error_handler = Arc::new(handler);
        self
    }

    pub fn panic_handler(mut self, handler: impl PanicHandler) -> Self {
        self.panic_handler = Arc::new(handler);
        self
    }

    pub fn build(self) -> Pipeline {
        let stages = ServiceBuilder::new()
            .layer(TypingLayer::new(self.typing))
            .filter(ChannelTypeCheck)
            .filter_async(BotPermissionCheck)
            .layer(ThrottleLayer::new(self.cancel))
            .filter_async(RestrictionCheck)
            .filter_async(ParseArguments)
            .service(InvokeService);

        Pipeline {
            service: middleware::wrap(PipelineService::new(stages), &self.middleware),
            error_handler: self.error_handler,
            panic_handler: self.panic_handler,
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("middleware", &self.middleware.len())
            .field("typing", &self.typing)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::args::RawArgs;
    use crate::definition::CommandDefinition;
    use crate::restriction::{from_fn, users};
    use crate::testing::{MockBot, context_with, dm_event, guild_event, noop};
    use async_trait::async_trait;
    use herald_core::throttle::PerUser;
    use herald_core::{
        BoxError, ChannelTypes, InternalError, Permissions, RestrictionError, SilentError,
        UserError, UserId,
    };
    use parking_lot::Mutex;

    async fn execute(pipeline: &Pipeline, command: CommandDefinition, bot: &Arc<MockBot>) -> Outcome {
        let ctx = context_with(command, guild_event(1, "cmd"), bot.clone());
        pipeline.execute(ctx).await
    }

    #[tokio::test]
    async fn test_reply_is_delivered() {
        async fn pong() -> &'static str {
            "pong"
        }

        let bot = Arc::new(MockBot::new());
        let pipeline = Pipeline::builder().without_typing().build();
        let outcome = execute(&pipeline, CommandDefinition::new("cmd", pong), &bot).await;

        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(bot.sent(), ["pong"]);

        let outcome = execute(&pipeline, CommandDefinition::new("cmd", noop), &bot).await;
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(bot.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_first_failing_stage_wins() {
        let bot = Arc::new(MockBot::new().with_permissions(Permissions::SEND_MESSAGES));
        let pipeline = Pipeline::builder().without_typing().build();

        // Channel type is checked before bot permissions.
        let command = CommandDefinition::new("cmd", noop)
            .channel_types(ChannelTypes::ALL_DIRECT)
            .bot_permissions(Permissions::BAN_MEMBERS);
        assert_eq!(execute(&pipeline, command, &bot).await, Outcome::Failed);
        assert_eq!(bot.sent(), ["This command can't be used in this channel."]);

        // Bot permissions are checked before the restriction.
        let command = CommandDefinition::new("cmd", noop)
            .bot_permissions(Permissions::BAN_MEMBERS)
            .restriction(users([UserId(42)]));
        assert_eq!(execute(&pipeline, command, &bot).await, Outcome::Failed);
        assert_eq!(
            bot.sent().last().map(String::as_str),
            Some("I'm missing the following permissions to run this command: ban_members.")
        );
    }

    #[tokio::test]
    async fn test_restriction_stops_argument_parsing() {
        let checks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&checks);
        let restriction = from_fn(move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(RestrictionError::recoverable("Not now."))
        });

        let bot = Arc::new(MockBot::new());
        let pipeline = Pipeline::builder().without_typing().build();
        let command = CommandDefinition::new("cmd", noop)
            .args(RawArgs::required("text"))
            .restrict(restriction);

        assert_eq!(execute(&pipeline, command, &bot).await, Outcome::Failed);
        assert_eq!(checks.load(Ordering::SeqCst), 1);
        assert_eq!(bot.sent(), ["Not now."]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_invocation_is_reported() {
        let bot = Arc::new(MockBot::new());
        let pipeline = Pipeline::builder().without_typing().build();
        let throttler = Arc::new(PerUser::new(1, std::time::Duration::from_secs(30)));
        let command = || CommandDefinition::new("cmd", noop).throttler(throttler.clone());

        assert_eq!(execute(&pipeline, command(), &bot).await, Outcome::Completed);
        assert_eq!(execute(&pipeline, command(), &bot).await, Outcome::Failed);
        assert_eq!(
            bot.sent(),
            ["You're using this command too often. Try again in 30s."]
        );
    }

    #[tokio::test]
    async fn test_error_dispositions() {
        async fn fatal() -> Result<(), InternalError> {
            Err(InternalError::new("database unavailable"))
        }
        async fn silent() -> Result<(), SilentError> {
            Err(SilentError::new("nothing to do"))
        }
        async fn user() -> Result<(), UserError> {
            Err(UserError::new("Try a smaller number."))
        }

        let bot = Arc::new(MockBot::new());
        let pipeline = Pipeline::builder().without_typing().build();

        assert_eq!(execute(&pipeline, CommandDefinition::new("cmd", silent), &bot).await, Outcome::Failed);
        assert!(bot.sent().is_empty());

        execute(&pipeline, CommandDefinition::new("cmd", user), &bot).await;
        execute(&pipeline, CommandDefinition::new("cmd", fatal), &bot).await;
        assert_eq!(bot.sent(), ["Try a smaller number.", APOLOGY]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_is_contained() {
        async fn explode() {
            tokio::time::sleep(std::time::Duration::from_secs(7)).await;
            panic!("kaboom");
        }

        let bot = Arc::new(MockBot::new());
        let pipeline = Pipeline::builder()
            .typing_interval(std::time::Duration::from_secs(6))
            .build();

        let outcome = execute(&pipeline, CommandDefinition::new("cmd", explode), &bot).await;
        assert_eq!(outcome, Outcome::Panicked);
        assert_eq!(bot.sent(), [APOLOGY]);

        let typing = bot.typing_calls();
        assert_eq!(typing, 2);
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        assert_eq!(bot.typing_calls(), typing);
    }

    #[tokio::test]
    async fn test_custom_handlers() {
        #[derive(Default, Clone)]
        struct Recorder(Arc<Mutex<Vec<String>>>);

        #[async_trait]
        impl ErrorHandler for Recorder {
            async fn on_error(&self, _ctx: &InvokeContext, err: BoxError) {
                self.0.lock().push(format!("error: {err}"));
            }
        }

        #[async_trait]
        impl PanicHandler for Recorder {
            async fn on_panic(&self, _ctx: &InvokeContext, payload: PanicPayload) {
                self.0.lock().push(payload.to_string());
            }
        }

        async fn boom() {
            panic!("boom");
        }
        async fn refuse() -> Result<(), UserError> {
            Err(UserError::new("no"))
        }

        let recorder = Recorder::default();
        let bot = Arc::new(MockBot::new());
        let pipeline = Pipeline::builder()
            .without_typing()
            .error_handler(recorder.clone())
            .panic_handler(recorder.clone())
            .build();

        execute(&pipeline, CommandDefinition::new("cmd", refuse), &bot).await;
        execute(&pipeline, CommandDefinition::new("cmd", boom), &bot).await;

        assert_eq!(*recorder.0.lock(), ["error: no", "panic: boom"]);
        assert!(bot.sent().is_empty());
    }

    #[tokio::test]
    async fn test_failed_delivery_still_completes() {
        async fn pong() -> &'static str {
            "pong"
        }

        let bot = Arc::new(MockBot::new().failing_sends());
        let pipeline = Pipeline::builder().without_typing().build();
        let outcome = execute(&pipeline, CommandDefinition::new("cmd", pong), &bot).await;
        assert_eq!(outcome, Outcome::Completed);
    }

    #[tokio::test]
    async fn test_direct_message_reaches_handler() {
        async fn where_am_i(event: herald_core::MessageEvent) -> String {
            if event.is_direct() { "dm".into() } else { "guild".into() }
        }

        let bot = Arc::new(MockBot::new());
        let pipeline = Pipeline::builder().without_typing().build();
        let ctx = context_with(
            CommandDefinition::new("cmd", where_am_i),
            dm_event(1, "cmd"),
            bot.clone(),
        );
        assert_eq!(pipeline.execute(ctx).await, Outcome::Completed);
        assert_eq!(bot.sent(), ["dm"]);
    }
}
