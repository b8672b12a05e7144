//! Posting, cancelling and deleting events on the chat platform while
//! keeping the store in step with what users can see.

use anyhow::{Context, Result};

use super::attendance::summarize;
use super::db;
use super::error::EventError;
use super::lifecycle;
use super::models::{AttendanceSummary, Event, EventParams, MessageId, ThreadId};
use crate::core::AppContext;
use crate::messaging::{MessageBody, log_failure, render};

/// Post a new occurrence and start tracking it.
///
/// A message that was posted but could not be stored is deleted again, an
/// announcement nobody tracks would never get reminders or cleanup.
pub async fn publish_event(ctx: &AppContext, params: &EventParams) -> Result<Event> {
    params.validate()?;
    let tz = ctx.civil.tz();

    let content = render::announcement(params, &AttendanceSummary::default(), tz);
    let message_id = ctx
        .messenger
        .post_announcement(params.channel_id, &MessageBody::with_buttons(content))
        .await
        .context("Failed to post the announcement")?;

    let thread_id = match ctx
        .messenger
        .create_discussion_thread(
            params.channel_id,
            message_id,
            &render::thread_name(params.start_date),
        )
        .await
    {
        Ok(id) => Some(id),
        Err(e) => {
            log_failure(message_id, "create_discussion_thread", &e);
            None
        }
    };

    let event = match lifecycle::create(&ctx.db, params, message_id, thread_id).await {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(
                "Failed to store event {}, removing the announcement: {}",
                message_id,
                e
            );
            rollback(ctx, params, message_id, thread_id).await;
            return Err(e.into());
        }
    };

    if let Some(thread_id) = thread_id {
        if let Err(e) = ctx
            .messenger
            .send_to_channel(thread_id, &render::thread_welcome(event.start_date))
            .await
        {
            log_failure(message_id, "thread welcome", &e);
        }
    }

    if event.has_audience() {
        let mentions = resolve_mentions(ctx, &event).await;
        let ping = render::new_event_ping(&mentions, event.start_date, event.start_time, tz);
        if let Err(e) = ctx.messenger.send_to_channel(event.channel_id, &ping).await {
            log_failure(message_id, "new event ping", &e);
        }
    }

    Ok(event)
}

async fn rollback(
    ctx: &AppContext,
    params: &EventParams,
    message_id: MessageId,
    thread_id: Option<ThreadId>,
) {
    if let Some(thread_id) = thread_id {
        if let Err(e) = ctx.messenger.delete_thread(thread_id).await {
            log_failure(message_id, "rollback delete_thread", &e);
        }
    }
    if let Err(e) = ctx
        .messenger
        .delete_message(params.channel_id, message_id)
        .await
    {
        log_failure(message_id, "rollback delete_message", &e);
    }
}

/// Role mentions for the event's target group, falling back to the raw
/// text when they can't be resolved.
pub async fn resolve_mentions(ctx: &AppContext, event: &Event) -> String {
    let raw = event.target_group.clone().unwrap_or_default();
    match ctx
        .messenger
        .resolve_role_mentions(event.channel_id, &raw)
        .await
    {
        Ok(mentions) => mentions,
        Err(e) => {
            log_failure(event.message_id, "resolve_role_mentions", &e);
            raw
        }
    }
}

/// Re-render the announcement with the current roster.
pub async fn refresh_roster(ctx: &AppContext, event: &Event) -> Result<()> {
    let summary = summarize(&ctx.db, event.message_id).await?;
    let tz = ctx.civil.tz();
    let body = if event.is_cancelled {
        MessageBody::plain(render::cancelled_announcement(&event.params(), &summary, tz))
    } else {
        MessageBody::with_buttons(render::announcement(&event.params(), &summary, tz))
    };
    ctx.messenger
        .edit_message(event.channel_id, event.message_id, &body)
        .await
}

/// Cancel an event and tell the channel. Returns false if it was already
/// cancelled, in which case nothing is posted again.
pub async fn cancel_event(ctx: &AppContext, event_id: MessageId) -> Result<bool, EventError> {
    if !lifecycle::cancel(&ctx.db, event_id).await? {
        return Ok(false);
    }
    let Some(event) = db::find_event(&ctx.db, event_id).await? else {
        return Ok(true);
    };

    if let Err(e) = refresh_roster(ctx, &event).await {
        log_failure(event_id, "edit cancelled announcement", &e);
    }
    if let Some(thread_id) = event.thread_id {
        if let Err(e) = ctx
            .messenger
            .send_to_channel(thread_id, &render::cancellation_notice(event.start_date))
            .await
        {
            log_failure(event_id, "cancellation notice", &e);
        }
    }
    Ok(true)
}

/// Remove an event from the platform and the store.
pub async fn delete_event(ctx: &AppContext, event_id: MessageId) -> Result<(), EventError> {
    let event = db::find_event(&ctx.db, event_id)
        .await?
        .ok_or(EventError::NotFound(event_id))?;

    if let Err(e) = ctx
        .messenger
        .delete_message(event.channel_id, event.message_id)
        .await
    {
        log_failure(event_id, "delete_message", &e);
    }
    if let Some(thread_id) = event.thread_id {
        if let Err(e) = ctx.messenger.delete_thread(thread_id).await {
            log_failure(event_id, "delete_thread", &e);
        }
    }

    lifecycle::delete(&ctx.db, event_id).await
}
