//! # Herald Core
//!
//! Leaf types shared by every Herald crate.
//!
//! - **Events**: [`MessageEvent`] and the platform id newtypes
//! - **Masks**: [`ChannelTypes`] and [`Permissions`]
//! - **Errors**: the pipeline error taxonomy and [`classify`]
//! - **Collaborators**: the [`Bot`] trait and the [`Reply`] sum type
//! - **Throttling**: the sliding-window [`TimeWindow`] and the scoped
//!   [`Throttler`] implementations built on it
//!
//! Nothing in this crate knows about commands or modules; see
//! `herald-framework` for the merge engine, router and execution pipeline.

mod mask;

pub mod bot;
pub mod channel;
pub mod error;
pub mod event;
pub mod permission;
pub mod reply;
pub mod throttle;

pub use bot::{ApiError, ApiResult, Bot, BoxedBot, downcast_bot};
pub use channel::{ChannelKind, ChannelTypes};
pub use error::{
    ArgumentError, BoxError, ChannelTypeError, ErrorDisposition, InsufficientPermissionsError,
    InternalError, InvocationAborted, NotFound, PanicPayload, RestrictionError, SilentError,
    ThrottledError, UserError, classify,
};
pub use event::{Author, ChannelId, GuildId, MessageEvent, MessageId, UserId};
pub use permission::Permissions;
pub use reply::Reply;
pub use throttle::{BoxedThrottler, Release, ThrottleScope, Throttler, TimeWindow};
