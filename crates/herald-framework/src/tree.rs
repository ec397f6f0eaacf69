//! The resolved command tree.
//!
//! A [`ResolvedTree`] is an arena: modules and commands live in two flat
//! vectors and refer to each other through [`ModuleId`] and [`CommandId`].
//! Trees are built once by [`merge`](crate::merge::merge) and never mutated
//! afterwards, so a tree behind an `Arc` can be shared by any number of
//! concurrent invocations without locking.
//!
//! Sibling lists are sorted by name, which lets the router binary-search
//! them.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use herald_core::{Bot, BoxedThrottler, ChannelTypes, MessageEvent, Permissions};

use crate::args::BoxedArgConfig;
use crate::handler::BoxedHandler;
use crate::restriction::BoxedRestriction;

/// Index of a module in its [`ResolvedTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub(crate) usize);

/// Index of a command in its [`ResolvedTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandId(pub(crate) usize);

/// Where a resolved node came from: the contributing source and the module
/// path of the definitions that led to it inside that source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub source: String,
    pub path: Vec<String>,
}

/// A provider that failed to deliver its source during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnavailableSource {
    pub name: String,
    pub reason: String,
}

// =============================================================================
// Nodes
// =============================================================================

/// The merged view of every module definition sharing one tree path.
#[derive(Debug)]
pub struct ResolvedModule {
    pub(crate) identifier: String,
    pub(crate) name: String,
    pub(crate) parent: Option<ModuleId>,
    pub(crate) modules: Vec<ModuleId>,
    pub(crate) commands: Vec<CommandId>,
    pub(crate) hidden: bool,
    pub(crate) short_description: Option<String>,
    pub(crate) long_description: Option<String>,
    pub(crate) provenance: Vec<Provenance>,
}

impl ResolvedModule {
    /// The dot-separated path of the module, e.g. `mod.roles`.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<ModuleId> {
        self.parent
    }

    /// Child modules, ordered by name.
    pub fn modules(&self) -> &[ModuleId] {
        &self.modules
    }

    /// Child commands, ordered by name.
    pub fn commands(&self) -> &[CommandId] {
        &self.commands
    }

    /// `true` iff every command and submodule below is hidden.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn short_description(&self) -> Option<&str> {
        self.short_description.as_deref()
    }

    pub fn long_description(&self) -> Option<&str> {
        self.long_description.as_deref()
    }

    /// Every source definition merged into this module, in source order.
    pub fn provenance(&self) -> &[Provenance] {
        &self.provenance
    }

    fn level(&self) -> Level<'_> {
        Level {
            modules: &self.modules,
            commands: &self.commands,
        }
    }
}

/// One merged command with every inherited setting resolved.
pub struct ResolvedCommand {
    pub(crate) identifier: String,
    pub(crate) name: String,
    pub(crate) aliases: Vec<String>,
    pub(crate) parent: Option<ModuleId>,
    pub(crate) short_description: Option<String>,
    pub(crate) long_description: Option<String>,
    pub(crate) examples: Vec<String>,
    pub(crate) hidden: bool,
    pub(crate) channel_types: ChannelTypes,
    pub(crate) bot_permissions: Permissions,
    pub(crate) throttler: Option<BoxedThrottler>,
    pub(crate) restriction: Option<BoxedRestriction>,
    pub(crate) args: BoxedArgConfig,
    pub(crate) handler: BoxedHandler,
    pub(crate) provenance: Provenance,
}

impl ResolvedCommand {
    /// The dot-separated path of the command, e.g. `mod.ban`.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Aliases left after conflict resolution, in declaration order.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn parent(&self) -> Option<ModuleId> {
        self.parent
    }

    pub fn short_description(&self) -> Option<&str> {
        self.short_description.as_deref()
    }

    pub fn long_description(&self) -> Option<&str> {
        self.long_description.as_deref()
    }

    pub fn examples(&self) -> &[String] {
        &self.examples
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn channel_types(&self) -> ChannelTypes {
        self.channel_types
    }

    pub fn bot_permissions(&self) -> Permissions {
        self.bot_permissions
    }

    pub fn throttler(&self) -> Option<&BoxedThrottler> {
        self.throttler.as_ref()
    }

    pub fn restriction(&self) -> Option<&BoxedRestriction> {
        self.restriction.as_ref()
    }

    pub fn args(&self) -> &BoxedArgConfig {
        &self.args
    }

    pub fn handler(&self) -> &BoxedHandler {
        &self.handler
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Returns `true` if `word` is the command's name or one of its aliases.
    pub fn answers_to(&self, word: &str) -> bool {
        self.name == word || self.aliases.iter().any(|alias| alias == word)
    }
}

impl fmt::Debug for ResolvedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCommand")
            .field("identifier", &self.identifier)
            .field("aliases", &self.aliases)
            .field("hidden", &self.hidden)
            .field("channel_types", &self.channel_types)
            .field("bot_permissions", &self.bot_permissions)
            .field("throttler", &self.throttler.is_some())
            .field("restriction", &self.restriction.is_some())
            .field("provenance", &self.provenance)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tree
// =============================================================================

/// The sibling lists of one tree level: the roots or a module's children.
#[derive(Debug, Clone, Copy)]
pub struct Level<'t> {
    pub modules: &'t [ModuleId],
    pub commands: &'t [CommandId],
}

/// A merged module/command forest.
#[derive(Debug, Default)]
pub struct ResolvedTree {
    pub(crate) modules: Vec<ResolvedModule>,
    pub(crate) commands: Vec<ResolvedCommand>,
    pub(crate) root_modules: Vec<ModuleId>,
    pub(crate) root_commands: Vec<CommandId>,
    pub(crate) unavailable_sources: Vec<UnavailableSource>,
}

impl ResolvedTree {
    /// Top-level modules and commands.
    pub fn root(&self) -> Level<'_> {
        Level {
            modules: &self.root_modules,
            commands: &self.root_commands,
        }
    }

    /// The children of `id`.
    pub fn children(&self, id: ModuleId) -> Level<'_> {
        self.module(id).level()
    }

    pub fn module(&self, id: ModuleId) -> &ResolvedModule {
        &self.modules[id.0]
    }

    pub fn command(&self, id: CommandId) -> &ResolvedCommand {
        &self.commands[id.0]
    }

    /// All modules in allocation order (parents before children).
    pub fn modules(&self) -> impl Iterator<Item = (ModuleId, &ResolvedModule)> {
        self.modules.iter().enumerate().map(|(i, m)| (ModuleId(i), m))
    }

    /// All commands in allocation order.
    pub fn commands(&self) -> impl Iterator<Item = (CommandId, &ResolvedCommand)> {
        self.commands.iter().enumerate().map(|(i, c)| (CommandId(i), c))
    }

    pub fn is_empty(&self) -> bool {
        self.root_modules.is_empty() && self.root_commands.is_empty()
    }

    /// Providers that failed while this tree was resolved.
    pub fn unavailable_sources(&self) -> &[UnavailableSource] {
        &self.unavailable_sources
    }

    /// Finds a command at `level` by name (binary search) or alias (linear
    /// scan).
    pub fn find_command(&self, level: Level<'_>, word: &str) -> Option<CommandId> {
        level
            .commands
            .binary_search_by(|id| self.command(*id).name.as_str().cmp(word))
            .ok()
            .map(|i| level.commands[i])
            .or_else(|| {
                level
                    .commands
                    .iter()
                    .copied()
                    .find(|id| self.command(*id).aliases.iter().any(|a| a == word))
            })
    }

    /// Finds a module at `level` by name.
    pub fn find_module(&self, level: Level<'_>, name: &str) -> Option<ModuleId> {
        level
            .modules
            .binary_search_by(|id| self.module(*id).name.as_str().cmp(name))
            .ok()
            .map(|i| level.modules[i])
    }

    /// Looks up a command by its identifier, e.g. `mod.ban`.
    pub fn find_by_identifier(&self, identifier: &str) -> Option<CommandId> {
        let mut parts = identifier.split('.').peekable();
        let mut level = self.root();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                return level
                    .commands
                    .binary_search_by(|id| self.command(*id).name.as_str().cmp(part))
                    .ok()
                    .map(|i| level.commands[i]);
            }
            level = self.children(self.find_module(level, part)?);
        }
        None
    }

    /// Lists the commands the author of `event` may see.
    ///
    /// A command is listed if it is not hidden, supports the event's channel
    /// kind and its restriction (if any) does not fail fatally. Non-fatal
    /// restriction failures still list the command, since the user may be
    /// able to satisfy them.
    pub async fn visible_commands(
        self: &Arc<Self>,
        event: &MessageEvent,
        bot: &dyn Bot,
    ) -> Vec<CommandRef> {
        let mut visible = Vec::new();
        self.collect_visible(self.root(), event, bot, &mut visible).await;
        visible
    }

    fn collect_visible<'a>(
        self: &'a Arc<Self>,
        level: Level<'a>,
        event: &'a MessageEvent,
        bot: &'a dyn Bot,
        out: &'a mut Vec<CommandRef>,
    ) -> futures::future::BoxFuture<'a, ()> {
        Box::pin(async move {
            for &id in level.commands {
                let command = self.command(id);
                if command.hidden || !command.channel_types.allows(event.channel_kind) {
                    continue;
                }
                if let Some(restriction) = &command.restriction
                    && let Err(err) = restriction.check(event, bot).await
                    && err.fatal
                {
                    continue;
                }
                out.push(CommandRef::new(Arc::clone(self), id));
            }
            for &id in level.modules {
                if self.module(id).hidden {
                    continue;
                }
                self.collect_visible(self.children(id), event, bot, out).await;
            }
        })
    }
}

// =============================================================================
// CommandRef
// =============================================================================

/// A command together with the tree that owns it.
///
/// Dereferences to [`ResolvedCommand`].
#[derive(Clone)]
pub struct CommandRef {
    tree: Arc<ResolvedTree>,
    id: CommandId,
}

impl CommandRef {
    pub fn new(tree: Arc<ResolvedTree>, id: CommandId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn tree(&self) -> &Arc<ResolvedTree> {
        &self.tree
    }

    /// The module the command lives in, if any.
    pub fn module(&self) -> Option<&ResolvedModule> {
        self.parent.map(|id| self.tree.module(id))
    }
}

impl Deref for CommandRef {
    type Target = ResolvedCommand;

    fn deref(&self) -> &ResolvedCommand {
        self.tree.command(self.id)
    }
}

impl fmt::Debug for CommandRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CommandRef").field(&self.identifier).finish()
    }
}
