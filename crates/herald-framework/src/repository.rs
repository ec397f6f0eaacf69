//! The plugin repository.
//!
//! A [`PluginRepository`] owns the built-in [`Source`] and any number of
//! [`PluginProvider`]s. Resolving the repository for an event asks every
//! provider for its source concurrently and merges the results in
//! registration order, the built-in source first.
//!
//! A provider that fails or panics is skipped and recorded in
//! [`ResolvedTree::unavailable_sources`], so one broken provider never takes
//! the remaining commands down with it.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;
use herald_core::{BoxError, MessageEvent, PanicPayload};
use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::definition::{LibraryDefaults, Source};
use crate::merge::merge;
use crate::tree::{ResolvedTree, UnavailableSource};

/// Supplies a source of commands, possibly different per event (for example
/// per-guild plugins).
#[async_trait]
pub trait PluginProvider: Send + Sync + 'static {
    /// A name identifying the provider in logs and provenance.
    fn name(&self) -> &str;

    async fn provide(&self, event: &MessageEvent) -> Result<Source, BoxError>;
}

pub type BoxedProvider = Arc<dyn PluginProvider>;

/// The built-in source plus external providers.
pub struct PluginRepository {
    builtin: Arc<Source>,
    providers: Vec<BoxedProvider>,
    defaults: LibraryDefaults,
    cached: RwLock<Option<Arc<ResolvedTree>>>,
}

impl PluginRepository {
    pub fn new(builtin: Source) -> Self {
        Self {
            builtin: Arc::new(builtin),
            providers: Vec::new(),
            defaults: LibraryDefaults::default(),
            cached: RwLock::new(None),
        }
    }

    /// Sets the values used where no definition or source sets one.
    pub fn with_defaults(mut self, defaults: LibraryDefaults) -> Self {
        self.defaults = defaults;
        *self.cached.get_mut() = None;
        self
    }

    /// Appends a provider. Providers registered earlier take precedence.
    pub fn with_provider(self, provider: impl PluginProvider) -> Self {
        self.with_boxed_provider(Arc::new(provider))
    }

    pub fn with_boxed_provider(mut self, provider: BoxedProvider) -> Self {
        self.providers.push(provider);
        *self.cached.get_mut() = None;
        self
    }

    pub fn builtin(&self) -> &Source {
        &self.builtin
    }

    pub fn defaults(&self) -> &LibraryDefaults {
        &self.defaults
    }

    /// Returns the tree in effect for `event`.
    ///
    /// Without providers the tree never changes and is merged once.
    pub async fn resolve(&self, event: &MessageEvent) -> Arc<ResolvedTree> {
        if self.providers.is_empty() {
            return self.builtin_tree();
        }

        let provided = join_all(self.providers.iter().map(|p| async move {
            AssertUnwindSafe(p.provide(event))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(PanicPayload::new(payload).to_string().into()))
        }))
        .await;

        let mut sources: Vec<&Source> = vec![self.builtin.as_ref()];
        let mut unavailable = Vec::new();
        for (provider, result) in self.providers.iter().zip(&provided) {
            match result {
                Ok(source) => sources.push(source),
                Err(err) => {
                    warn!(provider = provider.name(), error = %err, "Plugin provider unavailable");
                    unavailable.push(UnavailableSource {
                        name: provider.name().to_owned(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        let mut tree = merge(&sources, &self.defaults);
        tree.unavailable_sources = unavailable;
        Arc::new(tree)
    }

    fn builtin_tree(&self) -> Arc<ResolvedTree> {
        if let Some(tree) = self.cached.read().as_ref() {
            return Arc::clone(tree);
        }

        let mut cached = self.cached.write();
        let tree = cached.get_or_insert_with(|| {
            trace!("Merging built-in source");
            Arc::new(merge(&[self.builtin.as_ref()], &self.defaults))
        });
        Arc::clone(tree)
    }
}

impl fmt::Debug for PluginRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRepository")
            .field("builtin", &self.builtin.name())
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::CommandDefinition;
    use crate::router::route;
    use crate::testing::{guild_event, noop};
    use herald_core::{ChannelTypes, GuildId};

    /// Provides the same commands for every event.
    struct Static(&'static str, &'static [&'static str]);

    #[async_trait]
    impl PluginProvider for Static {
        fn name(&self) -> &str {
            self.0
        }

        async fn provide(&self, _event: &MessageEvent) -> Result<Source, BoxError> {
            Ok(self
                .1
                .iter()
                .fold(Source::new(self.0), |source, name| {
                    source.command(CommandDefinition::new(*name, noop))
                }))
        }
    }

    struct Broken;

    #[async_trait]
    impl PluginProvider for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn provide(&self, _event: &MessageEvent) -> Result<Source, BoxError> {
            Err("registry unreachable".into())
        }
    }

    struct Panicking;

    #[async_trait]
    impl PluginProvider for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn provide(&self, _event: &MessageEvent) -> Result<Source, BoxError> {
            panic!("provider bug");
        }
    }

    /// Gives every guild its own command.
    struct PerGuild;

    #[async_trait]
    impl PluginProvider for PerGuild {
        fn name(&self) -> &str {
            "per-guild"
        }

        async fn provide(&self, event: &MessageEvent) -> Result<Source, BoxError> {
            let guild = event.guild_id.unwrap_or(GuildId(0));
            Ok(Source::new("per-guild").command(CommandDefinition::new(format!("g{guild}"), noop)))
        }
    }

    #[tokio::test]
    async fn test_builtin_tree_is_cached() {
        let repo = PluginRepository::new(
            Source::new("builtin").command(CommandDefinition::new("ping", noop)),
        );
        let event = guild_event(1, "ping");

        let first = repo.resolve(&event).await;
        let second = repo.resolve(&event).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert!(route("ping", &first).is_ok());
    }

    #[tokio::test]
    async fn test_builtin_takes_precedence() {
        let repo = PluginRepository::new(
            Source::new("builtin").command(CommandDefinition::new("ping", noop)),
        )
        .with_provider(Static("extra", &["ping", "dice"]));

        let tree = repo.resolve(&guild_event(1, "x")).await;
        let ping = route("ping", &tree).unwrap().command;
        assert_eq!(ping.provenance().source, "builtin");
        let dice = route("dice", &tree).unwrap().command;
        assert_eq!(dice.provenance().source, "extra");
    }

    #[tokio::test]
    async fn test_failing_provider_is_recorded() {
        let repo = PluginRepository::new(
            Source::new("builtin").command(CommandDefinition::new("ping", noop)),
        )
        .with_provider(Broken)
        .with_provider(Static("extra", &["dice"]));

        let tree = repo.resolve(&guild_event(1, "x")).await;
        assert!(route("ping", &tree).is_ok());
        assert!(route("dice", &tree).is_ok());
        assert_eq!(
            tree.unavailable_sources(),
            [UnavailableSource {
                name: "broken".into(),
                reason: "registry unreachable".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_panicking_provider_is_recorded() {
        let repo = PluginRepository::new(
            Source::new("builtin").command(CommandDefinition::new("ping", noop)),
        )
        .with_provider(Panicking)
        .with_provider(Static("extra", &["dice"]));

        let tree = repo.resolve(&guild_event(1, "x")).await;
        assert!(route("ping", &tree).is_ok());
        assert!(route("dice", &tree).is_ok());
        assert_eq!(
            tree.unavailable_sources(),
            [UnavailableSource {
                name: "panicking".into(),
                reason: "panic: provider bug".into(),
            }]
        );
    }

    #[tokio::test]
    async fn test_providers_see_the_event() {
        let repo = PluginRepository::new(Source::new("builtin")).with_provider(PerGuild);

        let tree = repo.resolve(&guild_event(1, "x")).await;
        assert!(route("g100", &tree).is_ok());
        assert!(route("g0", &tree).is_err());
    }

    #[tokio::test]
    async fn test_library_defaults_apply() {
        let defaults = LibraryDefaults {
            channel_types: ChannelTypes::GUILD,
            ..Default::default()
        };
        let repo = PluginRepository::new(
            Source::new("builtin").command(CommandDefinition::new("ping", noop)),
        )
        .with_defaults(defaults);

        let tree = repo.resolve(&guild_event(1, "ping")).await;
        let ping = route("ping", &tree).unwrap().command;
        assert_eq!(ping.channel_types(), ChannelTypes::GUILD);
    }
}
