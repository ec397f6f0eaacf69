//! The merge engine.
//!
//! [`merge`] combines an ordered list of [`Source`]s into one
//! [`ResolvedTree`]. Earlier sources take precedence:
//!
//! - Same-name modules at one path are merged into a single
//!   [`ResolvedModule`](crate::tree::ResolvedModule). Its descriptions come
//!   from the first source defining it; every contributing definition is
//!   recorded in its provenance.
//! - Same-name commands at one path are not merged: the earliest one wins and
//!   later ones are dropped.
//! - Aliases are claimed in source order. An alias already claimed by an
//!   earlier sibling, or equal to a sibling command's name, is stripped.
//! - Names and aliases that are empty or contain `.` or whitespace could
//!   never be routed and would collide with nested identifiers, so they are
//!   dropped.
//! - Inheritable settings resolve to the command's own value, else the
//!   nearest enclosing module default of the *same source*, else the source's
//!   defaults, else the [`LibraryDefaults`].
//!
//! The result depends only on the sources and their order, so merging the
//! same sources twice yields identical trees.

use std::borrow::Borrow;
use std::collections::HashSet;

use tracing::debug;

use crate::definition::{CommandDefinition, Defaults, LibraryDefaults, ModuleDefinition, Source};
use crate::tree::{CommandId, ModuleId, Provenance, ResolvedCommand, ResolvedModule, ResolvedTree};

/// Merges `sources` (highest precedence first) into a resolved tree.
pub fn merge<S: Borrow<Source>>(sources: &[S], defaults: &LibraryDefaults) -> ResolvedTree {
    let sources: Vec<&Source> = sources.iter().map(Borrow::borrow).collect();

    let mut modules = Vec::new();
    let mut commands = Vec::new();
    for source in &sources {
        let origin = Origin::new(source);
        modules.extend(source.modules.iter().map(|def| Entry {
            def,
            origin: origin.clone(),
        }));
        commands.extend(source.commands.iter().map(|def| Entry {
            def,
            origin: origin.clone(),
        }));
    }

    let mut merger = Merger {
        library: defaults,
        tree: ResolvedTree::default(),
    };
    let (root_modules, root_commands) = merger.merge_level(None, "", modules, commands);
    merger.tree.root_modules = root_modules;
    merger.tree.root_commands = root_commands;

    debug!(
        sources = sources.len(),
        modules = merger.tree.modules.len(),
        commands = merger.tree.commands.len(),
        "Merged plugin sources"
    );
    merger.tree
}

/// The source a definition came from and the chain of module definitions
/// enclosing it inside that source, outermost first.
#[derive(Clone)]
struct Origin<'a> {
    source: &'a Source,
    ancestors: Vec<&'a ModuleDefinition>,
}

impl<'a> Origin<'a> {
    fn new(source: &'a Source) -> Self {
        Self {
            source,
            ancestors: Vec::new(),
        }
    }

    fn enter(&self, module: &'a ModuleDefinition) -> Self {
        let mut ancestors = self.ancestors.clone();
        ancestors.push(module);
        Self {
            source: self.source,
            ancestors,
        }
    }

    fn provenance(&self) -> Provenance {
        Provenance {
            source: self.source.name.clone(),
            path: self.ancestors.iter().map(|m| m.name.clone()).collect(),
        }
    }

    /// Resolves one inheritable setting: the nearest module default first,
    /// then the source's defaults.
    fn inherit<T: Clone>(&self, pick: impl Fn(&Defaults) -> Option<&T>) -> Option<T> {
        self.ancestors
            .iter()
            .rev()
            .find_map(|module| pick(&module.defaults))
            .or_else(|| pick(&self.source.defaults))
            .cloned()
    }
}

/// A definition at the level being merged, in arrival order.
struct Entry<'a, D> {
    def: &'a D,
    origin: Origin<'a>,
}

struct Merger<'d> {
    library: &'d LibraryDefaults,
    tree: ResolvedTree,
}

impl Merger<'_> {
    /// Merges the definitions found at one tree path and returns the sorted
    /// child lists. `path` is the parent's identifier (empty at the root).
    fn merge_level<'a>(
        &mut self,
        parent: Option<ModuleId>,
        path: &str,
        modules: Vec<Entry<'a, ModuleDefinition>>,
        commands: Vec<Entry<'a, CommandDefinition>>,
    ) -> (Vec<ModuleId>, Vec<CommandId>) {
        let commands = retain_routable(path, "command", commands, |def| def.name.as_str());
        let modules = retain_routable(path, "module", modules, |def| def.name.as_str());
        let survivors = select_commands(path, commands);
        let aliases = claim_aliases(path, &survivors);

        let mut command_ids: Vec<(&str, CommandId)> = survivors
            .iter()
            .zip(aliases)
            .map(|(entry, aliases)| {
                let id = self.push_command(parent, path, entry, aliases);
                (entry.def.name.as_str(), id)
            })
            .collect();
        command_ids.sort_by(|a, b| a.0.cmp(b.0));

        let module_ids = group_by_name(modules, |entry| entry.def.name.as_str())
            .into_iter()
            .map(|group| self.merge_module(parent, path, group))
            .collect();

        (module_ids, command_ids.into_iter().map(|(_, id)| id).collect())
    }

    fn push_command(
        &mut self,
        parent: Option<ModuleId>,
        path: &str,
        entry: &Entry<'_, CommandDefinition>,
        aliases: Vec<String>,
    ) -> CommandId {
        let def = entry.def;
        let origin = &entry.origin;
        let library = self.library;

        let command = ResolvedCommand {
            identifier: join(path, &def.name),
            name: def.name.clone(),
            aliases,
            parent,
            short_description: def.short_description.clone(),
            long_description: def.long_description.clone(),
            examples: def.examples.clone(),
            hidden: def
                .hidden
                .or_else(|| origin.inherit(|d| d.hidden.as_ref()))
                .unwrap_or(library.hidden),
            channel_types: def
                .channel_types
                .or_else(|| origin.inherit(|d| d.channel_types.as_ref()))
                .unwrap_or(library.channel_types),
            bot_permissions: def
                .bot_permissions
                .or_else(|| origin.inherit(|d| d.bot_permissions.as_ref()))
                .unwrap_or(library.bot_permissions),
            throttler: def
                .throttler
                .clone()
                .or_else(|| origin.inherit(|d| d.throttler.as_ref()))
                .or_else(|| library.throttler.clone()),
            restriction: def
                .restriction
                .clone()
                .or_else(|| origin.inherit(|d| d.restriction.as_ref()))
                .or_else(|| library.restriction.clone()),
            args: def.args.clone(),
            handler: def.handler.clone(),
            provenance: origin.provenance(),
        };

        let id = CommandId(self.tree.commands.len());
        self.tree.commands.push(command);
        id
    }

    /// Merges all definitions of one module path. The module is allocated
    /// before its children so parents always precede them in the arena.
    fn merge_module(
        &mut self,
        parent: Option<ModuleId>,
        path: &str,
        group: Vec<Entry<'_, ModuleDefinition>>,
    ) -> ModuleId {
        let first = group[0].def;
        let identifier = join(path, &first.name);
        let id = ModuleId(self.tree.modules.len());
        self.tree.modules.push(ResolvedModule {
            identifier: identifier.clone(),
            name: first.name.clone(),
            parent,
            modules: Vec::new(),
            commands: Vec::new(),
            hidden: true,
            short_description: first.short_description.clone(),
            long_description: first.long_description.clone(),
            provenance: group.iter().map(|entry| entry.origin.provenance()).collect(),
        });

        let mut child_modules = Vec::new();
        let mut child_commands = Vec::new();
        for entry in &group {
            let origin = entry.origin.enter(entry.def);
            child_modules.extend(entry.def.modules.iter().map(|def| Entry {
                def,
                origin: origin.clone(),
            }));
            child_commands.extend(entry.def.commands.iter().map(|def| Entry {
                def,
                origin: origin.clone(),
            }));
        }

        let (modules, commands) =
            self.merge_level(Some(id), &identifier, child_modules, child_commands);

        let hidden = modules.iter().all(|m| self.tree.modules[m.0].hidden)
            && commands.iter().all(|c| self.tree.commands[c.0].hidden);

        let module = &mut self.tree.modules[id.0];
        module.modules = modules;
        module.commands = commands;
        module.hidden = hidden;
        id
    }
}

/// Whether `name` can appear as one segment of an identifier and be matched
/// as a single word of a message.
fn is_routable(name: &str) -> bool {
    !name.is_empty() && !name.contains('.') && !name.contains(char::is_whitespace)
}

/// Drops definitions whose name is not routable.
fn retain_routable<'a, D>(
    path: &str,
    kind: &str,
    entries: Vec<Entry<'a, D>>,
    name: impl Fn(&D) -> &str,
) -> Vec<Entry<'a, D>> {
    entries
        .into_iter()
        .filter(|entry| {
            let routable = is_routable(name(entry.def));
            if !routable {
                debug!(
                    kind,
                    name = %name(entry.def),
                    parent = %path,
                    source = %entry.origin.source.name,
                    "Dropping definition with an unroutable name"
                );
            }
            routable
        })
        .collect()
}

/// Drops every command whose name was already taken by an earlier entry.
/// Survivors keep their arrival order.
fn select_commands<'a>(
    path: &str,
    commands: Vec<Entry<'a, CommandDefinition>>,
) -> Vec<Entry<'a, CommandDefinition>> {
    let mut taken: Vec<&str> = Vec::new();
    let mut survivors = Vec::with_capacity(commands.len());
    for entry in commands {
        let def = entry.def;
        match taken.binary_search(&def.name.as_str()) {
            Ok(_) => debug!(
                command = %join(path, &def.name),
                source = %entry.origin.source.name,
                "Dropping command shadowed by an earlier source"
            ),
            Err(pos) => {
                taken.insert(pos, def.name.as_str());
                survivors.push(entry);
            }
        }
    }
    survivors
}

/// Groups entries by name. Groups are sorted by name and each group keeps its
/// entries in arrival order.
fn group_by_name<T>(entries: Vec<T>, name: impl Fn(&T) -> &str) -> Vec<Vec<T>> {
    let mut groups: Vec<Vec<T>> = Vec::new();
    for entry in entries {
        match groups.binary_search_by(|group| name(&group[0]).cmp(name(&entry))) {
            Ok(pos) => groups[pos].push(entry),
            Err(pos) => groups.insert(pos, vec![entry]),
        }
    }
    groups
}

/// Assigns aliases to the surviving commands of one level in arrival order.
///
/// An alias is stripped if it is not routable, equals any sibling's name, was
/// claimed by an earlier sibling, or repeats within the same command.
fn claim_aliases(path: &str, survivors: &[Entry<'_, CommandDefinition>]) -> Vec<Vec<String>> {
    let mut claimed: HashSet<&str> = survivors.iter().map(|e| e.def.name.as_str()).collect();

    survivors
        .iter()
        .map(|entry| {
            let mut kept = Vec::new();
            for alias in &entry.def.aliases {
                if !is_routable(alias) {
                    debug!(
                        command = %join(path, &entry.def.name),
                        alias = %alias,
                        "Stripping unroutable alias"
                    );
                } else if claimed.insert(alias.as_str()) {
                    kept.push(alias.clone());
                } else {
                    debug!(
                        command = %join(path, &entry.def.name),
                        alias = %alias,
                        "Stripping alias claimed by another command"
                    );
                }
            }
            kept
        })
        .collect()
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_owned()
    } else {
        format!("{path}.{name}")
    }
}
