//! The message loop.
//!
//! A [`HeraldRuntime`] consumes [`MessageEvent`]s from an mpsc channel fed by
//! the platform client. For every message it:
//!
//! 1. skips messages written by bots (the bot itself always, other bots when
//!    `bot.ignore_bots` is set)
//! 2. strips a configured prefix or a mention of the bot
//! 3. resolves the plugin repository for the message and routes the invoke
//!    text
//! 4. runs the execution pipeline on its own task
//!
//! Messages that are not invocations, or that name no command, are dropped
//! without a reply.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! let runtime = HeraldRuntime::builder()
//!     .source(Source::new("builtin").command(CommandDefinition::new("ping", ping)))
//!     .build()?;
//!
//! let (tx, rx) = tokio::sync::mpsc::channel(64);
//! // hand `tx` to the platform client
//! runtime.run(bot, rx).await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use herald_core::{BoxedBot, MessageEvent};
use herald_framework::{
    BoxedProvider, ErrorHandler, InvokeContext, Middleware, Outcome, PanicHandler, Pipeline,
    PipelineBuilder, PluginProvider, PluginRepository, PrefixMatcher, Source, route,
};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace};

use crate::config::{ConfigLoader, HeraldConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// Drives a bot: reads messages, routes them and runs the pipeline.
pub struct HeraldRuntime {
    config: HeraldConfig,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
    running: AtomicBool,
}

impl HeraldRuntime {
    /// Creates a runtime builder that loads configuration from the default
    /// locations.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime serving `builtin` with the default pipeline.
    ///
    /// Initializes logging from the configuration unless a subscriber is
    /// already installed.
    pub fn from_config(config: &HeraldConfig, builtin: Source) -> Self {
        Self::assemble(config.clone(), builtin, Vec::new(), Pipeline::builder())
    }

    fn assemble(
        config: HeraldConfig,
        builtin: Source,
        providers: Vec<BoxedProvider>,
        pipeline: PipelineBuilder,
    ) -> Self {
        logging::init_from_config(&config.logging);

        let repository = providers.into_iter().fold(
            PluginRepository::new(builtin).with_defaults(config.defaults.to_library_defaults()),
            PluginRepository::with_boxed_provider,
        );
        let pipeline = pipeline.typing(config.pipeline.typing_interval()).build();

        info!(
            log_level = %config.logging.level,
            prefixes = ?config.bot.prefixes,
            mention_prefix = config.bot.mention_prefix,
            "Runtime initialized from configuration"
        );

        Self {
            dispatcher: Arc::new(Dispatcher {
                prefixes: config.bot.prefix_matcher(),
                ignore_bots: config.bot.ignore_bots,
                repository,
                pipeline,
            }),
            config,
            shutdown: CancellationToken::new(),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &HeraldConfig {
        &self.config
    }

    pub fn repository(&self) -> &PluginRepository {
        &self.dispatcher.repository
    }

    /// A token that stops [`run`](Self::run) when cancelled.
    ///
    /// Cancellation is permanent: a runtime that was shut down returns from
    /// every later `run` immediately.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Handles one message on the current task.
    ///
    /// Returns `None` if the message is not an invocation of a known command.
    pub async fn dispatch(&self, bot: &BoxedBot, event: MessageEvent) -> Option<Outcome> {
        self.dispatcher.dispatch(bot, event).await
    }

    /// Serves messages until Ctrl+C or SIGTERM, a call to
    /// [`shutdown`](Self::shutdown), or until every sender of `events` is
    /// dropped. Running invocations are awaited before returning.
    pub async fn run(&self, bot: BoxedBot, events: mpsc::Receiver<MessageEvent>) -> RuntimeResult<()> {
        self.serve(bot, events, wait_for_signal()).await
    }

    /// Like [`run`](Self::run), but stops when `shutdown` completes instead
    /// of on signals.
    pub async fn run_until<F>(
        &self,
        bot: BoxedBot,
        events: mpsc::Receiver<MessageEvent>,
        shutdown: F,
    ) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.serve(bot, events, async {
            shutdown.await;
            Ok(())
        })
        .await
    }

    async fn serve<F>(
        &self,
        bot: BoxedBot,
        mut events: mpsc::Receiver<MessageEvent>,
        shutdown: F,
    ) -> RuntimeResult<()>
    where
        F: Future<Output = RuntimeResult<()>>,
    {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(RuntimeError::AlreadyRunning);
        }

        let tracker = TaskTracker::new();
        tokio::pin!(shutdown);
        info!(bot = %bot.id(), "Herald runtime is now running");

        let result = loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break Ok(());
                }
                result = &mut shutdown => break result,
                event = events.recv() => match event {
                    Some(event) => {
                        let dispatcher = Arc::clone(&self.dispatcher);
                        let bot = Arc::clone(&bot);
                        tracker.spawn(async move {
                            dispatcher.dispatch(&bot, event).await;
                        });
                    }
                    None => {
                        info!("Event channel closed");
                        break Ok(());
                    }
                },
            }
        };

        tracker.close();
        if !tracker.is_empty() {
            info!(in_flight = tracker.len(), "Waiting for running invocations");
        }
        tracker.wait().await;

        self.running.store(false, Ordering::Release);
        info!("Herald runtime stopped");
        result
    }
}

impl std::fmt::Debug for HeraldRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeraldRuntime")
            .field("repository", &self.dispatcher.repository)
            .field("prefixes", &self.dispatcher.prefixes)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Waits for Ctrl+C, or SIGTERM on Unix.
async fn wait_for_signal() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(RuntimeError::Signal)?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(RuntimeError::Signal)?;
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map_err(RuntimeError::Signal)?;
        info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}

// =============================================================================
// Dispatcher
// =============================================================================

struct Dispatcher {
    prefixes: PrefixMatcher,
    ignore_bots: bool,
    repository: PluginRepository,
    pipeline: Pipeline,
}

impl Dispatcher {
    async fn dispatch(&self, bot: &BoxedBot, event: MessageEvent) -> Option<Outcome> {
        let bot_id = bot.id();
        if event.author.id == bot_id || (self.ignore_bots && event.author.bot) {
            trace!(author = %event.author.id, "Ignoring message from a bot");
            return None;
        }

        let stripped = self.prefixes.strip(&event.content, bot_id)?;
        let prefix = stripped.prefix.to_owned();
        let invoke = stripped.invoke.to_owned();

        let tree = self.repository.resolve(&event).await;
        let route = match route(&invoke, &tree) {
            Ok(route) => route,
            Err(err) => {
                debug!(invoke = %invoke, "{err}");
                return None;
            }
        };

        let ctx = InvokeContext::from_route(event, Arc::clone(bot), &prefix, route);
        Some(self.pipeline.execute(Arc::new(ctx)).await)
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`HeraldRuntime`] with custom configuration, plugins and
/// pipeline hooks.
///
/// ```rust,ignore
/// let runtime = HeraldRuntime::builder()
///     .config_file("config/herald.toml")
///     .profile("production")
///     .source(builtin)
///     .provider(GuildPlugins::new(db))
///     .middleware(timing)
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    source: Source,
    providers: Vec<BoxedProvider>,
    pipeline: PipelineBuilder,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            source: Source::new("builtin"),
            providers: Vec::new(),
            pipeline: Pipeline::builder(),
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration programmatically; files and environment
    /// variables still override it.
    pub fn merge(mut self, config: HeraldConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Sets the built-in source. It takes precedence over every provider.
    pub fn source(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    /// Adds a plugin provider. Providers added earlier take precedence.
    pub fn provider(mut self, provider: impl PluginProvider) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Adds a middleware. The first one added is the outermost.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.pipeline = self.pipeline.middleware(middleware);
        self
    }

    pub fn error_handler(mut self, handler: impl ErrorHandler) -> Self {
        self.pipeline = self.pipeline.error_handler(handler);
        self
    }

    pub fn panic_handler(mut self, handler: impl PanicHandler) -> Self {
        self.pipeline = self.pipeline.panic_handler(handler);
        self
    }

    /// Loads the configuration and builds the runtime.
    pub fn build(self) -> RuntimeResult<HeraldRuntime> {
        let config = self.config_loader.load()?;
        Ok(HeraldRuntime::assemble(
            config,
            self.source,
            self.providers,
            self.pipeline,
        ))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::any::Any;
    use std::time::Duration;

    use async_trait::async_trait;
    use herald_core::{
        ApiResult, Author, Bot, BoxError, ChannelId, MessageId, Permissions, UserId,
    };
    use herald_framework::{CommandDefinition, ModuleDefinition};
    use parking_lot::Mutex;
    use serde_json::Value;
    use tokio_test::{assert_err, assert_ok};

    const BOT_ID: UserId = UserId(7);

    #[derive(Default)]
    struct RecordingBot {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingBot {
        fn sent(&self) -> Vec<String> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl Bot for RecordingBot {
        fn id(&self) -> UserId {
            BOT_ID
        }

        async fn send_text(&self, _channel: ChannelId, text: &str) -> ApiResult<MessageId> {
            let mut sent = self.sent.lock();
            sent.push(text.to_owned());
            Ok(MessageId(sent.len() as u64))
        }

        async fn send_content(&self, channel: ChannelId, content: &Value) -> ApiResult<MessageId> {
            self.send_text(channel, &content.to_string()).await
        }

        async fn trigger_typing(&self, _channel: ChannelId) -> ApiResult<()> {
            Ok(())
        }

        async fn permissions_in(&self, _event: &MessageEvent) -> ApiResult<Permissions> {
            Ok(Permissions::ADMINISTRATOR)
        }

        fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
            self
        }
    }

    async fn ping() -> &'static str {
        "pong"
    }

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_secs(5)).await;
        "done"
    }

    async fn boom() -> &'static str {
        panic!("handler bug");
    }

    fn runtime() -> HeraldRuntime {
        let mut config = HeraldConfig::default();
        config.bot.prefixes = vec!["!".into(), "herald ".into()];
        config.pipeline.typing_interval_ms = 0;

        let builtin = Source::new("builtin")
            .command(CommandDefinition::new("ping", ping))
            .command(CommandDefinition::new("slow", slow))
            .module(
                ModuleDefinition::new("admin")
                    .command(CommandDefinition::new("ping", || async { "admin pong" })),
            );
        HeraldRuntime::from_config(&config, builtin)
    }

    fn message(content: &str) -> MessageEvent {
        MessageEvent::guild(1, Author::user(42, "alice"), 100, 20, content)
    }

    fn pair() -> (Arc<RecordingBot>, BoxedBot) {
        let bot = Arc::new(RecordingBot::default());
        let boxed: BoxedBot = bot.clone();
        (bot, boxed)
    }

    #[tokio::test]
    async fn test_dispatch_routes_prefixed_messages() {
        let runtime = runtime();
        let (bot, boxed) = pair();

        assert_eq!(
            runtime.dispatch(&boxed, message("!ping")).await,
            Some(Outcome::Completed)
        );
        assert_eq!(
            runtime.dispatch(&boxed, message("herald admin ping")).await,
            Some(Outcome::Completed)
        );
        assert_eq!(
            runtime.dispatch(&boxed, message("<@7> ping")).await,
            Some(Outcome::Completed)
        );
        assert_eq!(bot.sent(), ["pong", "admin pong", "pong"]);
    }

    #[tokio::test]
    async fn test_dispatch_drops_non_invocations() {
        let runtime = runtime();
        let (bot, boxed) = pair();

        assert_eq!(runtime.dispatch(&boxed, message("ping")).await, None);
        assert_eq!(runtime.dispatch(&boxed, message("!")).await, None);
        assert_eq!(runtime.dispatch(&boxed, message("!unknown")).await, None);
        assert_eq!(runtime.dispatch(&boxed, message("<@8> ping")).await, None);
        assert!(bot.sent().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_skips_bot_authors() {
        let runtime = runtime();
        let (bot, boxed) = pair();

        let mut other_bot = message("!ping");
        other_bot.author.bot = true;
        assert_eq!(runtime.dispatch(&boxed, other_bot.clone()).await, None);

        let mut own = message("!ping");
        own.author = Author::user(BOT_ID, "herald");
        assert_eq!(runtime.dispatch(&boxed, own).await, None);
        assert!(bot.sent().is_empty());

        let mut config = HeraldConfig::default();
        config.bot.ignore_bots = false;
        let lenient = HeraldRuntime::from_config(
            &config,
            Source::new("builtin").command(CommandDefinition::new("ping", ping)),
        );
        assert_eq!(
            lenient.dispatch(&boxed, other_bot).await,
            Some(Outcome::Completed)
        );
    }

    #[tokio::test]
    async fn test_configured_default_throttle() {
        let mut config = HeraldConfig::default();
        config.pipeline.typing_interval_ms = 0;
        config.defaults.throttle = Some(crate::config::ThrottleConfig {
            scope: herald_core::ThrottleScope::User,
            max: 1,
            window_ms: 30_000,
        });
        let runtime = HeraldRuntime::from_config(
            &config,
            Source::new("builtin").command(CommandDefinition::new("ping", ping)),
        );
        let (bot, boxed) = pair();

        assert_eq!(
            runtime.dispatch(&boxed, message("!ping")).await,
            Some(Outcome::Completed)
        );
        assert_eq!(
            runtime.dispatch(&boxed, message("!ping")).await,
            Some(Outcome::Failed)
        );
        assert_eq!(bot.sent().len(), 2);
        assert_eq!(bot.sent()[0], "pong");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_drains_in_flight_invocations() {
        let runtime = runtime();
        let (bot, boxed) = pair();
        let (tx, rx) = mpsc::channel(8);

        assert_ok!(tx.send(message("!slow")).await);
        assert_ok!(tx.send(message("!ping")).await);
        drop(tx);

        assert_ok!(runtime.run_until(boxed, rx, std::future::pending()).await);
        let mut sent = bot.sent();
        sent.sort();
        assert_eq!(sent, ["done", "pong"]);
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn test_run_survives_panicking_command() {
        let mut config = HeraldConfig::default();
        config.pipeline.typing_interval_ms = 0;
        let runtime = HeraldRuntime::from_config(
            &config,
            Source::new("builtin")
                .command(CommandDefinition::new("ping", ping))
                .command(CommandDefinition::new("boom", boom)),
        );
        let (bot, boxed) = pair();
        let (tx, rx) = mpsc::channel(8);

        let sender = async move {
            assert_ok!(tx.send(message("!boom")).await);
            tokio::task::yield_now().await;
            assert_ok!(tx.send(message("!ping")).await);
        };
        let (result, ()) = tokio::join!(
            runtime.run_until(boxed, rx, std::future::pending()),
            sender,
        );

        assert_ok!(result);
        let sent = bot.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().any(|text| text == "pong"));
        assert!(!runtime.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_token_stops_run() {
        let runtime = runtime();
        let (_bot, boxed) = pair();
        let (_tx, rx) = mpsc::channel(8);

        let token = runtime.shutdown_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });

        assert_ok!(runtime.run_until(boxed, rx, std::future::pending()).await);
    }

    #[tokio::test]
    async fn test_run_rejects_concurrent_runs() {
        let runtime = runtime();
        let (_bot, boxed) = pair();
        let (tx, first) = mpsc::channel::<MessageEvent>(1);
        let (_keep, second) = mpsc::channel::<MessageEvent>(1);

        let (a, b, ()) = tokio::join!(
            runtime.run_until(Arc::clone(&boxed), first, std::future::pending()),
            runtime.run_until(Arc::clone(&boxed), second, std::future::pending()),
            async {
                tokio::task::yield_now().await;
                drop(tx);
            },
        );
        assert_ok!(a);
        assert!(matches!(assert_err!(b), RuntimeError::AlreadyRunning));
    }

    struct Extra;

    #[async_trait]
    impl PluginProvider for Extra {
        fn name(&self) -> &str {
            "extra"
        }

        async fn provide(&self, _event: &MessageEvent) -> Result<Source, BoxError> {
            Ok(Source::new("extra").command(CommandDefinition::new("dice", || async { "4" })))
        }
    }

    #[tokio::test]
    async fn test_builder_wires_providers() {
        let runtime = assert_ok!(
            HeraldRuntime::builder()
                .search_path("/nonexistent")
                .without_env()
                .source(Source::new("builtin").command(CommandDefinition::new("ping", ping)))
                .provider(Extra)
                .build()
        );
        let (bot, boxed) = pair();

        assert_eq!(
            runtime.dispatch(&boxed, message("!dice")).await,
            Some(Outcome::Completed)
        );
        assert_eq!(bot.sent(), ["4"]);
    }
}
