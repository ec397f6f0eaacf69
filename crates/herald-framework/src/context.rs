//! The per-invocation context.
//!
//! One [`InvokeContext`] is created for every routed message and dropped when
//! the pipeline finishes. It names everything a stage or handler may need:
//! the message, the bot, the matched command, how it was invoked, the parsed
//! arguments and a typed state map for middleware to pass values along.
//!
//! # Example
//!
//! ```rust,ignore
//! async fn whoami(ctx: Arc<InvokeContext>) -> String {
//!     format!(
//!         "{} invoked {} as '{}{}'",
//!         ctx.event().author.name,
//!         ctx.command().identifier(),
//!         ctx.prefix(),
//!         ctx.invoked_with(),
//!     )
//! }
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use herald_core::{BoxedBot, MessageEvent};
use parking_lot::Mutex;

use crate::args::ParsedArgs;
use crate::router::Route;
use crate::tree::CommandRef;

/// Everything known about one command invocation.
pub struct InvokeContext {
    event: MessageEvent,
    bot: BoxedBot,
    command: CommandRef,
    invoked_with: String,
    prefix: String,
    raw_args: String,
    args: OnceLock<ParsedArgs>,
    state: Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
}

impl InvokeContext {
    pub fn new(
        event: MessageEvent,
        bot: BoxedBot,
        command: CommandRef,
        invoked_with: impl Into<String>,
        prefix: impl Into<String>,
        raw_args: impl Into<String>,
    ) -> Self {
        Self {
            event,
            bot,
            command,
            invoked_with: invoked_with.into(),
            prefix: prefix.into(),
            raw_args: raw_args.into(),
            args: OnceLock::new(),
            state: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a context from a successful route.
    pub fn from_route(event: MessageEvent, bot: BoxedBot, prefix: &str, route: Route<'_>) -> Self {
        Self::new(
            event,
            bot,
            route.command,
            route.invoked_with,
            prefix,
            route.remainder,
        )
    }

    // ─── Invocation ──────────────────────────────────────────────────────────

    /// The message that triggered the invocation.
    pub fn event(&self) -> &MessageEvent {
        &self.event
    }

    pub fn bot(&self) -> &BoxedBot {
        &self.bot
    }

    /// Returns a clone of the bot `Arc`.
    pub fn bot_arc(&self) -> BoxedBot {
        self.bot.clone()
    }

    pub fn command(&self) -> &CommandRef {
        &self.command
    }

    /// The name or alias the command was invoked with.
    pub fn invoked_with(&self) -> &str {
        &self.invoked_with
    }

    /// The prefix the message started with.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The text following the invoked name, leading whitespace removed.
    pub fn raw_args(&self) -> &str {
        &self.raw_args
    }

    // ─── Arguments ───────────────────────────────────────────────────────────

    /// The arguments parsed by the argument stage, once it has run.
    pub fn parsed_args(&self) -> Option<&ParsedArgs> {
        self.args.get()
    }

    /// Stores the parsed arguments. Only the first call has an effect.
    pub fn set_args(&self, args: ParsedArgs) {
        let _ = self.args.set(args);
    }

    // ─── State ───────────────────────────────────────────────────────────────

    /// Stores a value in the state map.
    ///
    /// Only one value per type can be stored; subsequent calls overwrite.
    pub fn set_state<T: Send + Sync + 'static>(&self, value: T) {
        self.state.lock().insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Retrieves a cloned value from the state map.
    pub fn get_state<T: Clone + 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Returns `true` if a value of type `T` exists in the state map.
    pub fn has_state<T: 'static>(&self) -> bool {
        self.state.lock().contains_key(&TypeId::of::<T>())
    }

    /// Removes and returns a value from the state map.
    pub fn take_state<T: 'static>(&self) -> Option<T> {
        self.state
            .lock()
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }
}

impl fmt::Debug for InvokeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokeContext")
            .field("event", &self.event)
            .field("command", &self.command)
            .field("invoked_with", &self.invoked_with)
            .field("prefix", &self.prefix)
            .field("raw_args", &self.raw_args)
            .finish_non_exhaustive()
    }
}
