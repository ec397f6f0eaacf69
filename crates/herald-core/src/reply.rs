//! Command replies.

use serde_json::Value;

use crate::bot::{ApiResult, Bot};
use crate::event::{ChannelId, MessageId};

/// What a command sends back after it ran.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Reply {
    /// A plain text message.
    Text(String),
    /// Platform-specific structured content, passed to [`Bot::send_content`].
    Content(Value),
    /// Nothing is sent.
    #[default]
    None,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Sends the reply to `channel`.
    ///
    /// Returns the id of the sent message, or `None` for [`Reply::None`] and
    /// empty text.
    pub async fn deliver(self, bot: &dyn Bot, channel: ChannelId) -> ApiResult<Option<MessageId>> {
        match self {
            Self::Text(text) if text.is_empty() => Ok(None),
            Self::Text(text) => bot.send_text(channel, &text).await.map(Some),
            Self::Content(content) => bot.send_content(channel, &content).await.map(Some),
            Self::None => Ok(None),
        }
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Value> for Reply {
    fn from(content: Value) -> Self {
        Self::Content(content)
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Self::None
    }
}

impl<T: Into<Reply>> From<Option<T>> for Reply {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}
