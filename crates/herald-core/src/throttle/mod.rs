//! Invocation throttling.
//!
//! A [`Throttler`] decides whether a command invocation is admitted. Admitted
//! invocations are counted and handed a [`Release`] that undoes the count,
//! which the execution pipeline uses when a later stage rejects the
//! invocation (for example because its arguments could not be parsed).
//!
//! All concrete throttlers are built on the sliding-window counter in
//! [`TimeWindow`]; the scoped variants in [`scoped`] only decide which key an
//! invocation is counted under.
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use herald_core::throttle::{PerGuildOrUser, Throttler};
//!
//! // At most 3 invocations per guild (or per user in DMs) every 30 seconds.
//! let throttler = PerGuildOrUser::new(3, Duration::from_secs(30));
//! match throttler.check(&event) {
//!     Ok(release) => { /* run the command; call release.release() to undo */ }
//!     Err(throttled) => println!("retry in {:?}", throttled.wait),
//! }
//! ```

pub mod scoped;
pub mod window;

use std::fmt;
use std::sync::Arc;

use crate::error::ThrottledError;
use crate::event::MessageEvent;

pub use scoped::{Global, PerChannel, PerGuild, PerGuildOrUser, PerMember, PerUser, ThrottleScope};
pub use window::TimeWindow;

/// Decides whether an invocation is admitted.
pub trait Throttler: Send + Sync + 'static {
    /// Counts the invocation described by `event`.
    ///
    /// Returns a [`Release`] that undoes the count, or a [`ThrottledError`]
    /// carrying the time until the next invocation would be admitted.
    fn check(&self, event: &MessageEvent) -> Result<Release, ThrottledError>;
}

/// A shared, type-erased throttler.
pub type BoxedThrottler = Arc<dyn Throttler>;

/// Undoes a previously counted invocation.
///
/// Releasing consumes the value, so a release runs at most once. Dropping a
/// `Release` without calling [`release`](Self::release) keeps the count.
#[must_use = "dropping a Release keeps the invocation counted"]
pub struct Release(Option<Box<dyn FnOnce() + Send + Sync>>);

impl Release {
    /// Creates a release that runs `undo` when released.
    pub fn new<F>(undo: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self(Some(Box::new(undo)))
    }

    /// A release that does nothing.
    pub fn noop() -> Self {
        Self(None)
    }

    /// Undoes the counted invocation.
    pub fn release(mut self) {
        if let Some(undo) = self.0.take() {
            undo();
        }
    }
}

impl fmt::Debug for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Release")
            .field("noop", &self.0.is_none())
            .finish()
    }
}
