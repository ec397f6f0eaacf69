//! Platform permission masks.

use crate::mask::named_mask;

named_mask! {
    /// A set of chat-platform permissions.
    ///
    /// Bit positions follow the common guild permission layout so that adapters
    /// can convert raw permission integers with [`Permissions::from_bits`].
    pub struct Permissions(u64) {
        const CREATE_INSTANT_INVITE = 1 << 0, "create_instant_invite";
        const KICK_MEMBERS = 1 << 1, "kick_members";
        const BAN_MEMBERS = 1 << 2, "ban_members";
        /// Implies every other permission.
        const ADMINISTRATOR = 1 << 3, "administrator";
        const MANAGE_CHANNELS = 1 << 4, "manage_channels";
        const MANAGE_GUILD = 1 << 5, "manage_guild";
        const ADD_REACTIONS = 1 << 6, "add_reactions";
        const VIEW_CHANNEL = 1 << 10, "view_channel";
        const SEND_MESSAGES = 1 << 11, "send_messages";
        const MANAGE_MESSAGES = 1 << 13, "manage_messages";
        const EMBED_LINKS = 1 << 14, "embed_links";
        const ATTACH_FILES = 1 << 15, "attach_files";
        const READ_MESSAGE_HISTORY = 1 << 16, "read_message_history";
        const MENTION_EVERYONE = 1 << 17, "mention_everyone";
        const USE_EXTERNAL_EMOJIS = 1 << 18, "use_external_emojis";
        const MANAGE_NICKNAMES = 1 << 27, "manage_nicknames";
        const MANAGE_ROLES = 1 << 28, "manage_roles";
        const MODERATE_MEMBERS = 1 << 40, "moderate_members";
    }
}

impl Permissions {
    /// Returns the permissions of `required` that `self` does not grant.
    ///
    /// [`ADMINISTRATOR`](Self::ADMINISTRATOR) grants everything.
    pub const fn missing(self, required: Self) -> Self {
        if self.contains(Self::ADMINISTRATOR) {
            Self::empty()
        } else {
            required.difference(self)
        }
    }

    /// Returns `true` if `self` grants every permission in `required`.
    pub const fn satisfies(self, required: Self) -> bool {
        self.missing(required).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_permissions() {
        let granted = Permissions::SEND_MESSAGES | Permissions::EMBED_LINKS;
        let required = Permissions::SEND_MESSAGES | Permissions::BAN_MEMBERS;
        assert_eq!(granted.missing(required), Permissions::BAN_MEMBERS);
        assert!(!granted.satisfies(required));
        assert!(granted.satisfies(Permissions::EMBED_LINKS));
    }

    #[test]
    fn test_administrator_grants_everything() {
        let granted = Permissions::ADMINISTRATOR;
        assert!(granted.satisfies(Permissions::BAN_MEMBERS | Permissions::MANAGE_ROLES));
    }

    #[test]
    fn test_display() {
        let perms = Permissions::BAN_MEMBERS | Permissions::KICK_MEMBERS;
        assert_eq!(perms.to_string(), "kick_members, ban_members");
    }
}
