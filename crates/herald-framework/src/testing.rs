//! Shared fixtures for unit tests.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use herald_core::{
    ApiError, ApiResult, Author, Bot, ChannelId, MessageEvent, MessageId, Permissions, UserId,
};
use parking_lot::Mutex;
use serde_json::Value;

use crate::context::InvokeContext;
use crate::definition::{CommandDefinition, Source};
use crate::merge::merge;
use crate::tree::CommandRef;

pub(crate) const BOT_ID: UserId = UserId(999);

/// A bot that records what it is asked to do.
#[derive(Clone, Default)]
pub(crate) struct MockBot {
    sent: Arc<Mutex<Vec<(ChannelId, String)>>>,
    typing: Arc<AtomicUsize>,
    permissions: Option<Permissions>,
    author_permissions: Option<Permissions>,
    fail_sends: bool,
}

impl MockBot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Permissions the bot holds everywhere. Defaults to all of them.
    pub(crate) fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Permissions every author holds in guilds.
    pub(crate) fn with_author_permissions(mut self, permissions: Permissions) -> Self {
        self.author_permissions = Some(permissions);
        self
    }

    pub(crate) fn failing_sends(mut self) -> Self {
        self.fail_sends = true;
        self
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, text)| text.clone()).collect()
    }

    pub(crate) fn typing_calls(&self) -> usize {
        self.typing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Bot for MockBot {
    fn id(&self) -> UserId {
        BOT_ID
    }

    async fn send_text(&self, channel: ChannelId, text: &str) -> ApiResult<MessageId> {
        if self.fail_sends {
            return Err(ApiError::NotConnected);
        }
        let mut sent = self.sent.lock();
        sent.push((channel, text.to_owned()));
        Ok(MessageId(sent.len() as u64))
    }

    async fn send_content(&self, channel: ChannelId, content: &Value) -> ApiResult<MessageId> {
        self.send_text(channel, &content.to_string()).await
    }

    async fn trigger_typing(&self, _channel: ChannelId) -> ApiResult<()> {
        self.typing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn permissions_in(&self, _event: &MessageEvent) -> ApiResult<Permissions> {
        Ok(self.permissions.unwrap_or(Permissions::from_bits(u64::MAX)))
    }

    async fn author_permissions(&self, event: &MessageEvent) -> ApiResult<Permissions> {
        match self.author_permissions {
            Some(permissions) if !event.is_direct() => Ok(permissions),
            _ => Ok(Permissions::ADMINISTRATOR),
        }
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub(crate) async fn noop() {}

pub(crate) fn dm_event(user: u64, content: &str) -> MessageEvent {
    MessageEvent::direct(1, Author::user(user, "tester"), 10, content)
}

pub(crate) fn guild_event(user: u64, content: &str) -> MessageEvent {
    MessageEvent::guild(1, Author::user(user, "tester"), 100, 20, content)
}

/// A context for a lone `name` command invoked in a guild.
pub(crate) fn context_for(name: &str) -> Arc<InvokeContext> {
    context_with(
        CommandDefinition::new(name, noop),
        guild_event(1, name),
        Arc::new(MockBot::new()),
    )
}

/// A context for `command`, the only command of its tree, invoked by `event`.
pub(crate) fn context_with(
    command: CommandDefinition,
    event: MessageEvent,
    bot: Arc<MockBot>,
) -> Arc<InvokeContext> {
    let name = command.name().to_owned();
    let tree = Arc::new(merge(&[Source::new("test").command(command)], &Default::default()));
    let id = tree
        .find_by_identifier(&name)
        .expect("command was merged");
    let raw_args = event
        .content
        .strip_prefix(name.as_str())
        .unwrap_or_default()
        .trim_start()
        .to_owned();
    Arc::new(InvokeContext::new(
        event,
        bot,
        CommandRef::new(tree, id),
        name,
        "!",
        raw_args,
    ))
}
