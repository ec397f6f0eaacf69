//! Inbound message events and platform identifiers.
//!
//! The gateway that produces these events is owned by an external chat
//! platform client; adapters convert the platform's wire representation into a
//! [`MessageEvent`] before handing it to the runtime.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::channel::ChannelKind;

macro_rules! platform_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Returns the raw numeric id.
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

platform_id!(
    /// Identifies a user (or bot account).
    UserId
);
platform_id!(
    /// Identifies a channel.
    ChannelId
);
platform_id!(
    /// Identifies a guild (server).
    GuildId
);
platform_id!(
    /// Identifies a message.
    MessageId
);

/// The author of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    /// Whether the author is a bot account.
    #[serde(default)]
    pub bot: bool,
}

/// A message received from the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub id: MessageId,
    /// Raw message content, prefix included.
    pub content: String,
    pub author: Author,
    pub channel_id: ChannelId,
    pub channel_kind: ChannelKind,
    /// The guild the message was sent in, `None` for direct messages.
    pub guild_id: Option<GuildId>,
}

impl MessageEvent {
    /// Creates a message sent in a one-to-one direct message channel.
    pub fn direct(
        id: impl Into<MessageId>,
        author: Author,
        channel_id: impl Into<ChannelId>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            author,
            channel_id: channel_id.into(),
            channel_kind: ChannelKind::Direct,
            guild_id: None,
        }
    }

    /// Creates a message sent in a guild text channel.
    pub fn guild(
        id: impl Into<MessageId>,
        author: Author,
        guild_id: impl Into<GuildId>,
        channel_id: impl Into<ChannelId>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            author,
            channel_id: channel_id.into(),
            channel_kind: ChannelKind::GuildText,
            guild_id: Some(guild_id.into()),
        }
    }

    /// Overrides the channel kind.
    pub fn with_channel_kind(mut self, kind: ChannelKind) -> Self {
        self.channel_kind = kind;
        self
    }

    /// Returns `true` if the message was not sent in a guild.
    pub fn is_direct(&self) -> bool {
        self.guild_id.is_none()
    }
}

impl Author {
    /// Creates a human author.
    pub fn user(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            bot: false,
        }
    }
}
