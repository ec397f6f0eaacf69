//! Throttlers keyed on parts of a message event.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{BoxedThrottler, Release, Throttler, TimeWindow};
use crate::error::ThrottledError;
use crate::event::{ChannelId, GuildId, MessageEvent, UserId};

/// Limits each user individually.
#[derive(Debug)]
pub struct PerUser(TimeWindow<UserId>);

impl PerUser {
    pub fn new(max: u32, window: Duration) -> Self {
        Self(TimeWindow::new(max, window))
    }
}

impl Throttler for PerUser {
    fn check(&self, event: &MessageEvent) -> Result<Release, ThrottledError> {
        self.0.check(event.author.id)
    }
}

/// Limits each channel, shared by everyone in it.
#[derive(Debug)]
pub struct PerChannel(TimeWindow<ChannelId>);

impl PerChannel {
    pub fn new(max: u32, window: Duration) -> Self {
        Self(TimeWindow::new(max, window))
    }
}

impl Throttler for PerChannel {
    fn check(&self, event: &MessageEvent) -> Result<Release, ThrottledError> {
        self.0.check(event.channel_id)
    }
}

/// Limits each guild, shared by all of its members.
///
/// Invocations outside a guild are not throttled.
#[derive(Debug)]
pub struct PerGuild(TimeWindow<GuildId>);

impl PerGuild {
    pub fn new(max: u32, window: Duration) -> Self {
        Self(TimeWindow::new(max, window))
    }
}

impl Throttler for PerGuild {
    fn check(&self, event: &MessageEvent) -> Result<Release, ThrottledError> {
        match event.guild_id {
            Some(guild) => self.0.check(guild),
            None => Ok(Release::noop()),
        }
    }
}

/// One limit shared by every invocation.
#[derive(Debug)]
pub struct Global(TimeWindow<()>);

impl Global {
    pub fn new(max: u32, window: Duration) -> Self {
        Self(TimeWindow::new(max, window))
    }
}

impl Throttler for Global {
    fn check(&self, _event: &MessageEvent) -> Result<Release, ThrottledError> {
        self.0.check(())
    }
}

/// Limits each guild, or each user outside guilds.
#[derive(Debug)]
pub struct PerGuildOrUser {
    guild: PerGuild,
    user: PerUser,
}

impl PerGuildOrUser {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            guild: PerGuild::new(max, window),
            user: PerUser::new(max, window),
        }
    }
}

impl Throttler for PerGuildOrUser {
    fn check(&self, event: &MessageEvent) -> Result<Release, ThrottledError> {
        if event.guild_id.is_some() {
            self.guild.check(event)
        } else {
            self.user.check(event)
        }
    }
}

/// Limits each user separately in every guild, or each user outside guilds.
///
/// Per-guild windows are created on first use. Windows with no counted
/// invocations are dropped whenever a new guild window is inserted.
#[derive(Debug)]
pub struct PerMember {
    max: u32,
    window: Duration,
    guilds: Mutex<HashMap<GuildId, Arc<TimeWindow<UserId>>>>,
    user: PerUser,
}

impl PerMember {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            guilds: Mutex::new(HashMap::new()),
            user: PerUser::new(max, window),
        }
    }

    fn guild_window(&self, guild: GuildId) -> Arc<TimeWindow<UserId>> {
        let mut guilds = self.guilds.lock();
        if let Some(window) = guilds.get(&guild) {
            return Arc::clone(window);
        }
        guilds.retain(|_, window| !window.is_idle());
        let window = Arc::new(TimeWindow::new(self.max, self.window));
        guilds.insert(guild, Arc::clone(&window));
        window
    }

    /// Number of guilds currently holding a window.
    pub fn tracked_guilds(&self) -> usize {
        self.guilds.lock().len()
    }
}

impl Throttler for PerMember {
    fn check(&self, event: &MessageEvent) -> Result<Release, ThrottledError> {
        match event.guild_id {
            Some(guild) => self.guild_window(guild).check(event.author.id),
            None => self.user.check(event),
        }
    }
}

/// Names a throttler keying strategy, e.g. in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleScope {
    #[default]
    User,
    Channel,
    Guild,
    GuildOrUser,
    Member,
    Global,
}

impl ThrottleScope {
    /// Builds a throttler admitting `max` invocations every `window` in this
    /// scope.
    pub fn build(self, max: u32, window: Duration) -> BoxedThrottler {
        match self {
            Self::User => Arc::new(PerUser::new(max, window)),
            Self::Channel => Arc::new(PerChannel::new(max, window)),
            Self::Guild => Arc::new(PerGuild::new(max, window)),
            Self::GuildOrUser => Arc::new(PerGuildOrUser::new(max, window)),
            Self::Member => Arc::new(PerMember::new(max, window)),
            Self::Global => Arc::new(Global::new(max, window)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Author;
    use tokio::time::advance;
    use tokio_test::{assert_err, assert_ok};

    fn in_guild(user: u64, guild: u64, channel: u64) -> MessageEvent {
        MessageEvent::guild(1, Author::user(user, "user"), guild, channel, "ping")
    }

    fn in_dm(user: u64) -> MessageEvent {
        MessageEvent::direct(1, Author::user(user, "user"), 900 + user, "ping")
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_user_spans_channels() {
        let throttler = PerUser::new(1, Duration::from_secs(10));
        assert_ok!(throttler.check(&in_guild(1, 10, 100)));
        assert_err!(throttler.check(&in_guild(1, 11, 101)));
        assert_ok!(throttler.check(&in_guild(2, 10, 100)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_channel_is_shared() {
        let throttler = PerChannel::new(1, Duration::from_secs(10));
        assert_ok!(throttler.check(&in_guild(1, 10, 100)));
        assert_err!(throttler.check(&in_guild(2, 10, 100)));
        assert_ok!(throttler.check(&in_guild(2, 10, 101)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_guild_ignores_direct_messages() {
        let throttler = PerGuild::new(1, Duration::from_secs(10));
        assert_ok!(throttler.check(&in_guild(1, 10, 100)));
        assert_err!(throttler.check(&in_guild(2, 10, 101)));
        assert_ok!(throttler.check(&in_dm(1)));
        assert_ok!(throttler.check(&in_dm(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guild_or_user_falls_back_to_user() {
        let throttler = PerGuildOrUser::new(1, Duration::from_secs(10));
        assert_ok!(throttler.check(&in_guild(1, 10, 100)));
        assert_err!(throttler.check(&in_guild(2, 10, 100)));
        assert_ok!(throttler.check(&in_dm(1)));
        assert_err!(throttler.check(&in_dm(1)));
        assert_ok!(throttler.check(&in_dm(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_member_separates_guilds() {
        let throttler = PerMember::new(1, Duration::from_secs(10));
        assert_ok!(throttler.check(&in_guild(1, 10, 100)));
        assert_err!(throttler.check(&in_guild(1, 10, 101)));
        assert_ok!(throttler.check(&in_guild(1, 11, 102)));
        assert_ok!(throttler.check(&in_guild(2, 10, 100)));
        assert_ok!(throttler.check(&in_dm(1)));
        assert_err!(throttler.check(&in_dm(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_member_drops_idle_guilds() {
        let throttler = PerMember::new(1, Duration::from_secs(10));
        assert_ok!(throttler.check(&in_guild(1, 10, 100)));
        assert_ok!(throttler.check(&in_guild(1, 11, 100)));
        assert_eq!(throttler.tracked_guilds(), 2);

        advance(Duration::from_secs(10)).await;
        assert_ok!(throttler.check(&in_guild(1, 12, 100)));
        assert_eq!(throttler.tracked_guilds(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_release() {
        let throttler = ThrottleScope::Global.build(1, Duration::from_secs(30));
        let release = assert_ok!(throttler.check(&in_dm(1)));
        assert_err!(throttler.check(&in_guild(2, 10, 100)));
        release.release();
        assert_ok!(throttler.check(&in_guild(2, 10, 100)));
    }

    #[test]
    fn test_scope_serde_names() {
        let scope: ThrottleScope = serde_json::from_str("\"guild_or_user\"").unwrap();
        assert_eq!(scope, ThrottleScope::GuildOrUser);
    }
}
