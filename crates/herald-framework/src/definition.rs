//! Raw command and module definitions contributed by plugin sources.
//!
//! Definitions are plain immutable values built with chained setters. They
//! carry no resolved state: inheritance, conflict resolution and identifiers
//! are computed by [`merge`](crate::merge::merge).
//!
//! ```rust,ignore
//! let source = Source::new("moderation")
//!     .defaults(Defaults::new().channel_types(ChannelTypes::GUILD))
//!     .module(
//!         ModuleDefinition::new("mod")
//!             .description("Moderation tools")
//!             .bot_permissions(Permissions::BAN_MEMBERS)
//!             .command(CommandDefinition::new("ban", ban).alias("b").args(RawArgs::new())),
//!     );
//! ```

use std::fmt;
use std::sync::Arc;

use herald_core::{BoxedThrottler, ChannelTypes, Permissions, Throttler};

use crate::args::{ArgConfig, BoxedArgConfig, RawArgs};
use crate::handler::{BoxedHandler, Handler, into_handler};
use crate::restriction::{BoxedRestriction, Restriction};

// =============================================================================
// Defaults
// =============================================================================

/// Inheritable settings applied to every descendant command that does not set
/// its own value.
#[derive(Clone, Default)]
pub struct Defaults {
    pub hidden: Option<bool>,
    pub channel_types: Option<ChannelTypes>,
    pub bot_permissions: Option<Permissions>,
    pub throttler: Option<BoxedThrottler>,
    pub restriction: Option<BoxedRestriction>,
}

impl Defaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    pub fn channel_types(mut self, types: ChannelTypes) -> Self {
        self.channel_types = Some(types);
        self
    }

    pub fn bot_permissions(mut self, permissions: Permissions) -> Self {
        self.bot_permissions = Some(permissions);
        self
    }

    pub fn throttle(self, throttler: impl Throttler) -> Self {
        self.throttler(Arc::new(throttler))
    }

    pub fn throttler(mut self, throttler: BoxedThrottler) -> Self {
        self.throttler = Some(throttler);
        self
    }

    pub fn restrict(self, restriction: impl Restriction) -> Self {
        self.restriction(Arc::new(restriction))
    }

    pub fn restriction(mut self, restriction: BoxedRestriction) -> Self {
        self.restriction = Some(restriction);
        self
    }
}

impl fmt::Debug for Defaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Defaults")
            .field("hidden", &self.hidden)
            .field("channel_types", &self.channel_types)
            .field("bot_permissions", &self.bot_permissions)
            .field("throttler", &self.throttler.is_some())
            .field("restriction", &self.restriction.is_some())
            .finish()
    }
}

/// The last link of the inheritance chain, used when no definition and no
/// source sets a value.
#[derive(Clone)]
pub struct LibraryDefaults {
    pub hidden: bool,
    pub channel_types: ChannelTypes,
    pub bot_permissions: Permissions,
    pub throttler: Option<BoxedThrottler>,
    pub restriction: Option<BoxedRestriction>,
}

impl Default for LibraryDefaults {
    fn default() -> Self {
        Self {
            hidden: false,
            channel_types: ChannelTypes::ALL,
            bot_permissions: Permissions::SEND_MESSAGES,
            throttler: None,
            restriction: None,
        }
    }
}

impl fmt::Debug for LibraryDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryDefaults")
            .field("hidden", &self.hidden)
            .field("channel_types", &self.channel_types)
            .field("bot_permissions", &self.bot_permissions)
            .field("throttler", &self.throttler.is_some())
            .field("restriction", &self.restriction.is_some())
            .finish()
    }
}

// =============================================================================
// Commands
// =============================================================================

/// A command as contributed by one source.
#[derive(Clone)]
pub struct CommandDefinition {
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) short_description: Option<String>,
    pub(crate) long_description: Option<String>,
    pub(crate) examples: Vec<String>,
    pub(crate) args: BoxedArgConfig,
    pub(crate) hidden: Option<bool>,
    pub(crate) channel_types: Option<ChannelTypes>,
    pub(crate) bot_permissions: Option<Permissions>,
    pub(crate) throttler: Option<BoxedThrottler>,
    pub(crate) restriction: Option<BoxedRestriction>,
    pub(crate) handler: BoxedHandler,
}

impl CommandDefinition {
    /// Creates a command named `name` that runs `handler`.
    ///
    /// Arguments default to [`RawArgs`]: the remainder is accepted as-is.
    pub fn new<H, T>(name: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T>,
        T: 'static,
    {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            short_description: None,
            long_description: None,
            examples: Vec::new(),
            args: Arc::new(RawArgs::new()),
            hidden: None,
            channel_types: None,
            bot_permissions: None,
            throttler: None,
            restriction: None,
            handler: into_handler(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Sets the one-line description shown in listings.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.short_description = Some(text.into());
        self
    }

    pub fn long_description(mut self, text: impl Into<String>) -> Self {
        self.long_description = Some(text.into());
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.examples.push(example.into());
        self
    }

    pub fn args(mut self, config: impl ArgConfig) -> Self {
        self.args = Arc::new(config);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = Some(hidden);
        self
    }

    pub fn channel_types(mut self, types: ChannelTypes) -> Self {
        self.channel_types = Some(types);
        self
    }

    pub fn bot_permissions(mut self, permissions: Permissions) -> Self {
        self.bot_permissions = Some(permissions);
        self
    }

    pub fn throttle(self, throttler: impl Throttler) -> Self {
        self.throttler(Arc::new(throttler))
    }

    pub fn throttler(mut self, throttler: BoxedThrottler) -> Self {
        self.throttler = Some(throttler);
        self
    }

    pub fn restrict(self, restriction: impl Restriction) -> Self {
        self.restriction(Arc::new(restriction))
    }

    pub fn restriction(mut self, restriction: BoxedRestriction) -> Self {
        self.restriction = Some(restriction);
        self
    }
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("hidden", &self.hidden)
            .field("channel_types", &self.channel_types)
            .field("bot_permissions", &self.bot_permissions)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Modules
// =============================================================================

/// A module as contributed by one source.
///
/// Modules group commands under a shared name (`mod ban`, `mod kick`) and
/// carry [`Defaults`] for everything below them.
#[derive(Debug, Clone)]
pub struct ModuleDefinition {
    pub(crate) name: String,
    pub(crate) short_description: Option<String>,
    pub(crate) long_description: Option<String>,
    pub(crate) defaults: Defaults,
    pub(crate) modules: Vec<ModuleDefinition>,
    pub(crate) commands: Vec<CommandDefinition>,
}

impl ModuleDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            short_description: None,
            long_description: None,
            defaults: Defaults::default(),
            modules: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.short_description = Some(text.into());
        self
    }

    pub fn long_description(mut self, text: impl Into<String>) -> Self {
        self.long_description = Some(text.into());
        self
    }

    /// Replaces all defaults at once.
    pub fn defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.defaults.hidden = Some(hidden);
        self
    }

    pub fn channel_types(mut self, types: ChannelTypes) -> Self {
        self.defaults.channel_types = Some(types);
        self
    }

    pub fn bot_permissions(mut self, permissions: Permissions) -> Self {
        self.defaults.bot_permissions = Some(permissions);
        self
    }

    pub fn throttle(mut self, throttler: impl Throttler) -> Self {
        self.defaults.throttler = Some(Arc::new(throttler));
        self
    }

    pub fn restrict(mut self, restriction: impl Restriction) -> Self {
        self.defaults.restriction = Some(Arc::new(restriction));
        self
    }

    pub fn module(mut self, module: ModuleDefinition) -> Self {
        self.modules.push(module);
        self
    }

    pub fn command(mut self, command: CommandDefinition) -> Self {
        self.commands.push(command);
        self
    }
}

// =============================================================================
// Sources
// =============================================================================

/// A named, ordered provider of a module/command forest.
///
/// When merging, earlier sources take precedence over later ones.
#[derive(Debug, Clone)]
pub struct Source {
    pub(crate) name: String,
    pub(crate) defaults: Defaults,
    pub(crate) modules: Vec<ModuleDefinition>,
    pub(crate) commands: Vec<CommandDefinition>,
}

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defaults: Defaults::default(),
            modules: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the source-wide defaults, consulted after every module default.
    pub fn defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn module(mut self, module: ModuleDefinition) -> Self {
        self.modules.push(module);
        self
    }

    pub fn command(mut self, command: CommandDefinition) -> Self {
        self.commands.push(command);
        self
    }

    /// Returns `true` if the source contributes nothing.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.commands.is_empty()
    }
}
