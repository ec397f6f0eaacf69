//! The chat-platform collaborator.
//!
//! A [`Bot`] is the handle through which the framework talks back to the
//! platform: sending replies, showing a typing indicator and querying
//! permissions. Concrete clients implement it; the framework only sees
//! [`BoxedBot`].

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::event::{ChannelId, MessageEvent, MessageId, UserId};
use crate::permission::Permissions;

/// Result type for platform API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by platform API calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("bot is not connected")]
    NotConnected,

    #[error("API call timed out")]
    Timeout,

    /// The platform rejected the call.
    #[error("API error ({code}): {message}")]
    Platform { code: i32, message: String },

    #[error("{0}")]
    Other(String),
}

/// A connected bot account.
#[async_trait]
pub trait Bot: Send + Sync + 'static {
    /// The bot's own user id, used to recognise mention prefixes.
    fn id(&self) -> UserId;

    /// Sends a plain text message to `channel`.
    async fn send_text(&self, channel: ChannelId, text: &str) -> ApiResult<MessageId>;

    /// Sends platform-specific structured content (e.g. an embed payload).
    async fn send_content(&self, channel: ChannelId, content: &Value) -> ApiResult<MessageId>;

    /// Shows the typing indicator in `channel` for a few seconds.
    async fn trigger_typing(&self, channel: ChannelId) -> ApiResult<()>;

    /// Permissions the bot itself holds in the channel of `event`.
    async fn permissions_in(&self, event: &MessageEvent) -> ApiResult<Permissions>;

    /// Permissions the author of `event` holds in its channel.
    ///
    /// Outside guilds every permission is granted by default.
    async fn author_permissions(&self, event: &MessageEvent) -> ApiResult<Permissions> {
        if event.is_direct() {
            Ok(Permissions::ADMINISTRATOR)
        } else {
            Err(ApiError::Other("member permissions are not supported".into()))
        }
    }

    /// Returns self as an `Arc<dyn Any>` for downcasting.
    ///
    /// ```rust,ignore
    /// fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
    ///     self
    /// }
    /// ```
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A shared Bot trait object.
pub type BoxedBot = Arc<dyn Bot>;

/// Attempts to downcast a [`BoxedBot`] to a concrete client type.
pub fn downcast_bot<T: Bot>(bot: BoxedBot) -> Option<Arc<T>> {
    Arc::downcast::<T>(bot.as_any()).ok()
}
