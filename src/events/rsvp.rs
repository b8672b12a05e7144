//! Handling a member's button click.

use serde::Serialize;

use super::attendance::record_vote;
use super::error::EventError;
use super::lifecycle::{Acceptance, check_responses};
use super::models::{AttendanceStatus, Event, MessageId, UserId};
use super::publish::refresh_roster;
use crate::core::AppContext;
use crate::messaging::log_failure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub event_id: MessageId,
    pub user_id: UserId,
    pub display_name: String,
    pub status: AttendanceStatus,
}

/// What happened to a vote. Only storage failures are errors, a vote on a
/// closed event is an ordinary outcome reported back to the voter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    Recorded,
    EventCancelled,
    EventEnded,
    NotFound,
}

pub async fn submit_vote(ctx: &AppContext, vote: &Vote) -> Result<VoteOutcome, EventError> {
    match store_vote(ctx, vote).await? {
        Ok(event) => {
            sync_platform(ctx, &event, vote).await;
            Ok(VoteOutcome::Recorded)
        }
        Err(outcome) => Ok(outcome),
    }
}

/// Same as `submit_vote` but the thread membership and roster updates run
/// in a background task, for callers that must answer the platform quickly.
pub async fn submit_vote_in_background(
    ctx: &AppContext,
    vote: Vote,
) -> Result<VoteOutcome, EventError> {
    match store_vote(ctx, &vote).await? {
        Ok(event) => {
            let ctx = ctx.clone();
            tokio::spawn(async move { sync_platform(&ctx, &event, &vote).await });
            Ok(VoteOutcome::Recorded)
        }
        Err(outcome) => Ok(outcome),
    }
}

/// The event when the vote was stored, otherwise why it was refused.
async fn store_vote(
    ctx: &AppContext,
    vote: &Vote,
) -> Result<Result<Event, VoteOutcome>, EventError> {
    let event = match check_responses(&ctx.db, &ctx.civil, ctx.now(), vote.event_id).await? {
        Acceptance::Open(event) => event,
        Acceptance::Cancelled => return Ok(Err(VoteOutcome::EventCancelled)),
        Acceptance::Ended => return Ok(Err(VoteOutcome::EventEnded)),
        Acceptance::NotFound => return Ok(Err(VoteOutcome::NotFound)),
    };

    record_vote(
        &ctx.db,
        vote.event_id,
        vote.user_id,
        &vote.display_name,
        vote.status,
    )
    .await?;
    tracing::debug!(
        "Recorded {} for user {} on event {}",
        vote.status.as_str(),
        vote.user_id,
        vote.event_id
    );
    Ok(Ok(event))
}

// The vote stands even if the platform calls below fail
async fn sync_platform(ctx: &AppContext, event: &Event, vote: &Vote) {
    if let Some(thread_id) = event.thread_id {
        let membership = if vote.status.wants_updates() {
            ctx.messenger
                .add_user_to_thread(thread_id, vote.user_id)
                .await
        } else {
            ctx.messenger
                .remove_user_from_thread(thread_id, vote.user_id)
                .await
        };
        if let Err(e) = membership {
            log_failure(event.message_id, "thread membership", &e);
        }
    }

    if let Err(e) = refresh_roster(ctx, event).await {
        log_failure(event.message_id, "refresh_roster", &e);
    }
}
