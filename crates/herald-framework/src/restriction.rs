//! Authorization predicates gating command execution.
//!
//! A [`Restriction`] inspects the invoking message and either admits it or
//! returns a [`RestrictionError`]. Any restriction error aborts the
//! invocation; the error's `fatal` flag additionally hides the command from
//! [`visible_commands`](crate::tree::ResolvedTree::visible_commands) listings.
//!
//! ```rust,ignore
//! use herald_framework::restriction::{self, Restriction};
//!
//! let mods_only = restriction::all([
//!     restriction::guild_only(),
//!     restriction::user_permissions(Permissions::BAN_MEMBERS),
//! ]);
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use herald_core::{Bot, MessageEvent, Permissions, RestrictionError, UserId};
use tracing::warn;

/// Decides whether the author of a message may run a command.
#[async_trait]
pub trait Restriction: Send + Sync + 'static {
    async fn check(&self, event: &MessageEvent, bot: &dyn Bot) -> Result<(), RestrictionError>;
}

/// A shared, type-erased restriction.
pub type BoxedRestriction = Arc<dyn Restriction>;

// =============================================================================
// Closures
// =============================================================================

/// A restriction backed by a synchronous closure. Created by [`from_fn`].
pub struct FnRestriction<F>(F);

/// Wraps a closure as a [`Restriction`].
///
/// ```rust,ignore
/// let no_bots = restriction::from_fn(|event: &MessageEvent| {
///     if event.author.bot {
///         Err(RestrictionError::fatal("Bots can't use this command."))
///     } else {
///         Ok(())
///     }
/// });
/// ```
pub fn from_fn<F>(f: F) -> FnRestriction<F>
where
    F: Fn(&MessageEvent) -> Result<(), RestrictionError> + Send + Sync + 'static,
{
    FnRestriction(f)
}

#[async_trait]
impl<F> Restriction for FnRestriction<F>
where
    F: Fn(&MessageEvent) -> Result<(), RestrictionError> + Send + Sync + 'static,
{
    async fn check(&self, event: &MessageEvent, _bot: &dyn Bot) -> Result<(), RestrictionError> {
        (self.0)(event)
    }
}

// =============================================================================
// Combinators
// =============================================================================

/// Passes only if every inner restriction passes. Created by [`all`].
pub struct All(Vec<BoxedRestriction>);

/// Requires every restriction to pass, checked in order. The first failure
/// is returned.
pub fn all(restrictions: impl IntoIterator<Item = BoxedRestriction>) -> All {
    All(restrictions.into_iter().collect())
}

#[async_trait]
impl Restriction for All {
    async fn check(&self, event: &MessageEvent, bot: &dyn Bot) -> Result<(), RestrictionError> {
        for restriction in &self.0 {
            restriction.check(event, bot).await?;
        }
        Ok(())
    }
}

/// Passes if any inner restriction passes. Created by [`any`].
pub struct Any(Vec<BoxedRestriction>);

/// Requires at least one restriction to pass.
///
/// If all fail, the first error is returned; it is fatal only if every
/// failure was fatal. An empty set always passes.
pub fn any(restrictions: impl IntoIterator<Item = BoxedRestriction>) -> Any {
    Any(restrictions.into_iter().collect())
}

#[async_trait]
impl Restriction for Any {
    async fn check(&self, event: &MessageEvent, bot: &dyn Bot) -> Result<(), RestrictionError> {
        let mut first: Option<RestrictionError> = None;
        let mut all_fatal = true;
        for restriction in &self.0 {
            match restriction.check(event, bot).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    all_fatal &= err.fatal;
                    first.get_or_insert(err);
                }
            }
        }
        match first {
            Some(mut err) => {
                err.fatal = all_fatal;
                Err(err)
            }
            None => Ok(()),
        }
    }
}

// =============================================================================
// Built-ins
// =============================================================================

/// Only allows invocations inside a guild.
pub fn guild_only() -> BoxedRestriction {
    Arc::new(from_fn(|event: &MessageEvent| {
        if event.guild_id.is_some() {
            Ok(())
        } else {
            Err(RestrictionError::recoverable(
                "This command can only be used in a server.",
            ))
        }
    }))
}

/// Only allows invocations in direct messages.
pub fn direct_only() -> BoxedRestriction {
    Arc::new(from_fn(|event: &MessageEvent| {
        if event.is_direct() {
            Ok(())
        } else {
            Err(RestrictionError::recoverable(
                "This command can only be used in direct messages.",
            ))
        }
    }))
}

/// Only allows the listed users.
pub fn users(ids: impl IntoIterator<Item = UserId>) -> BoxedRestriction {
    let allowed: HashSet<UserId> = ids.into_iter().collect();
    Arc::new(from_fn(move |event: &MessageEvent| {
        if allowed.contains(&event.author.id) {
            Ok(())
        } else {
            Err(RestrictionError::fatal(
                "You're not allowed to use this command.",
            ))
        }
    }))
}

/// Requires the author to hold `required` in the channel of the invocation.
pub fn user_permissions(required: Permissions) -> BoxedRestriction {
    Arc::new(UserPermissions(required))
}

struct UserPermissions(Permissions);

#[async_trait]
impl Restriction for UserPermissions {
    async fn check(&self, event: &MessageEvent, bot: &dyn Bot) -> Result<(), RestrictionError> {
        let granted = bot.author_permissions(event).await.map_err(|err| {
            warn!(user = %event.author.id, error = %err, "Failed to fetch author permissions");
            RestrictionError::recoverable("I couldn't check your permissions. Try again later.")
        })?;

        let missing = granted.missing(self.0);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RestrictionError::fatal(format!(
                "You need the following permissions to use this command: {missing}."
            )))
        }
    }
}
