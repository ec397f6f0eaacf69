//! Channel kinds and channel-type masks.

use serde::{Deserialize, Serialize};

use crate::mask::named_mask;

/// The kind of channel a message was sent in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// A one-to-one direct message channel.
    Direct,
    /// A direct message channel with multiple recipients.
    GroupDirect,
    /// A regular text channel inside a guild.
    GuildText,
    /// An announcement channel inside a guild.
    GuildNews,
    /// A thread inside a guild channel.
    GuildThread,
}

impl ChannelKind {
    /// Returns `true` for channels that belong to a guild.
    pub const fn is_guild(self) -> bool {
        matches!(self, Self::GuildText | Self::GuildNews | Self::GuildThread)
    }

    /// The single-flag [`ChannelTypes`] mask for this kind.
    pub const fn as_types(self) -> ChannelTypes {
        match self {
            Self::Direct => ChannelTypes::DIRECT,
            Self::GroupDirect => ChannelTypes::GROUP_DIRECT,
            Self::GuildText => ChannelTypes::GUILD_TEXT,
            Self::GuildNews => ChannelTypes::GUILD_NEWS,
            Self::GuildThread => ChannelTypes::GUILD_THREAD,
        }
    }
}

named_mask! {
    /// A set of [`ChannelKind`]s a command may be invoked in.
    pub struct ChannelTypes(u8) {
        const DIRECT = 1 << 0, "direct";
        const GROUP_DIRECT = 1 << 1, "group_direct";
        const GUILD_TEXT = 1 << 2, "guild_text";
        const GUILD_NEWS = 1 << 3, "guild_news";
        const GUILD_THREAD = 1 << 4, "guild_thread";
        /// Both kinds of direct message channel.
        const ALL_DIRECT = (1 << 0) | (1 << 1), "all_direct";
        /// Every guild channel kind.
        const GUILD = (1 << 2) | (1 << 3) | (1 << 4), "guild";
        const ALL = 0b1_1111, "all";
    }
}

impl ChannelTypes {
    /// Returns `true` if a command restricted to these types may run in `kind`.
    pub const fn allows(self, kind: ChannelKind) -> bool {
        self.contains(kind.as_types())
    }
}

impl From<ChannelKind> for ChannelTypes {
    fn from(kind: ChannelKind) -> Self {
        kind.as_types()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_kind() {
        let types = ChannelTypes::GUILD_TEXT | ChannelTypes::DIRECT;
        assert!(types.allows(ChannelKind::Direct));
        assert!(types.allows(ChannelKind::GuildText));
        assert!(!types.allows(ChannelKind::GuildThread));
        assert!(ChannelTypes::ALL.allows(ChannelKind::GroupDirect));
    }

    #[test]
    fn test_display_lists_single_flags() {
        let types = ChannelTypes::GUILD;
        assert_eq!(types.to_string(), "guild_text, guild_news, guild_thread");
    }

    #[test]
    fn test_deserialize_groups_and_flags() {
        let types: ChannelTypes = serde_json::from_str(r#"["guild", "direct"]"#).unwrap();
        assert_eq!(types, ChannelTypes::GUILD | ChannelTypes::DIRECT);

        let err = serde_json::from_str::<ChannelTypes>(r#"["voice"]"#).unwrap_err();
        assert!(err.to_string().contains("unknown ChannelTypes flag 'voice'"));
    }
}
