//! Chat platform collaborator. Every call can fail and none may block a
//! poll pass indefinitely.

pub mod discord;
pub mod render;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;

pub use discord::DiscordClient;

use crate::events::models::{ChannelId, MessageId, ThreadId, UserId};

/// Message content plus whether the RSVP buttons are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody {
    pub content: String,
    pub rsvp_buttons: bool,
}

impl MessageBody {
    pub fn with_buttons(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            rsvp_buttons: true,
        }
    }

    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            rsvp_buttons: false,
        }
    }
}

#[async_trait]
pub trait Messenger: Send + Sync {
    /// Post the event announcement, returns the message id that becomes
    /// the event id.
    async fn post_announcement(&self, channel_id: ChannelId, body: &MessageBody)
    -> Result<MessageId>;

    async fn create_discussion_thread(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        name: &str,
    ) -> Result<ThreadId>;

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        body: &MessageBody,
    ) -> Result<()>;

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()>;

    async fn add_user_to_thread(&self, thread_id: ThreadId, user_id: UserId) -> Result<()>;

    async fn remove_user_from_thread(&self, thread_id: ThreadId, user_id: UserId) -> Result<()>;

    /// Delete a thread. A thread that is already gone is not an error.
    async fn delete_thread(&self, thread_id: ThreadId) -> Result<()>;

    async fn archive_thread(&self, thread_id: ThreadId) -> Result<()>;

    /// Send to a channel or thread.
    async fn send_to_channel(&self, channel_id: ChannelId, content: &str) -> Result<MessageId>;

    async fn send_direct_message(&self, user_id: UserId, content: &str) -> Result<()>;

    /// Delete up to `limit` recent messages the bot authored in a channel,
    /// leaving the ones listed in `except` alone. Returns how many were
    /// deleted.
    async fn purge_bot_messages(
        &self,
        channel_id: ChannelId,
        limit: usize,
        except: &[MessageId],
    ) -> Result<usize>;

    /// Turn raw target group text (`@Members @TeamA`) into mentions the
    /// platform will notify. Unknown names are passed through unchanged.
    async fn resolve_role_mentions(&self, channel_id: ChannelId, target_group: &str)
    -> Result<String>;
}

/// Run a collaborator call with an upper bound on how long it may take.
pub async fn bounded<T, F>(timeout: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(|e| e.context(format!("{} failed", operation))),
        Err(_) => Err(anyhow!("{} timed out after {:?}", operation, timeout)),
    }
}

/// Wraps another messenger so every call is bounded by `timeout`.
pub struct BoundedMessenger {
    inner: Arc<dyn Messenger>,
    timeout: Duration,
}

impl BoundedMessenger {
    pub fn new(inner: Arc<dyn Messenger>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl Messenger for BoundedMessenger {
    async fn post_announcement(
        &self,
        channel_id: ChannelId,
        body: &MessageBody,
    ) -> Result<MessageId> {
        bounded(
            self.timeout,
            "post_announcement",
            self.inner.post_announcement(channel_id, body),
        )
        .await
    }

    async fn create_discussion_thread(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        name: &str,
    ) -> Result<ThreadId> {
        bounded(
            self.timeout,
            "create_discussion_thread",
            self.inner
                .create_discussion_thread(channel_id, message_id, name),
        )
        .await
    }

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        body: &MessageBody,
    ) -> Result<()> {
        bounded(
            self.timeout,
            "edit_message",
            self.inner.edit_message(channel_id, message_id, body),
        )
        .await
    }

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()> {
        bounded(
            self.timeout,
            "delete_message",
            self.inner.delete_message(channel_id, message_id),
        )
        .await
    }

    async fn add_user_to_thread(&self, thread_id: ThreadId, user_id: UserId) -> Result<()> {
        bounded(
            self.timeout,
            "add_user_to_thread",
            self.inner.add_user_to_thread(thread_id, user_id),
        )
        .await
    }

    async fn remove_user_from_thread(&self, thread_id: ThreadId, user_id: UserId) -> Result<()> {
        bounded(
            self.timeout,
            "remove_user_from_thread",
            self.inner.remove_user_from_thread(thread_id, user_id),
        )
        .await
    }

    async fn delete_thread(&self, thread_id: ThreadId) -> Result<()> {
        bounded(
            self.timeout,
            "delete_thread",
            self.inner.delete_thread(thread_id),
        )
        .await
    }

    async fn archive_thread(&self, thread_id: ThreadId) -> Result<()> {
        bounded(
            self.timeout,
            "archive_thread",
            self.inner.archive_thread(thread_id),
        )
        .await
    }

    async fn send_to_channel(&self, channel_id: ChannelId, content: &str) -> Result<MessageId> {
        bounded(
            self.timeout,
            "send_to_channel",
            self.inner.send_to_channel(channel_id, content),
        )
        .await
    }

    async fn send_direct_message(&self, user_id: UserId, content: &str) -> Result<()> {
        bounded(
            self.timeout,
            "send_direct_message",
            self.inner.send_direct_message(user_id, content),
        )
        .await
    }

    async fn purge_bot_messages(
        &self,
        channel_id: ChannelId,
        limit: usize,
        except: &[MessageId],
    ) -> Result<usize> {
        // Purging walks many messages, give it room for each one
        let timeout = self.timeout.saturating_mul(limit.clamp(1, 100) as u32);
        bounded(
            timeout,
            "purge_bot_messages",
            self.inner.purge_bot_messages(channel_id, limit, except),
        )
        .await
    }

    async fn resolve_role_mentions(
        &self,
        channel_id: ChannelId,
        target_group: &str,
    ) -> Result<String> {
        bounded(
            self.timeout,
            "resolve_role_mentions",
            self.inner.resolve_role_mentions(channel_id, target_group),
        )
        .await
    }
}

/// Log a failed best-effort collaborator call and carry on.
pub fn log_failure(event_id: MessageId, operation: &str, err: &Error) {
    tracing::warn!("Event {}: {} failed: {:#}", event_id, operation, err);
}
