use std::time::Duration as StdDuration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::PeriodicJob;
use crate::core::{AppConfig, AppContext, CivilTime};
use crate::events::attendance::summarize;
use crate::events::publish::publish_event;
use crate::events::recurrence::compute_next_occurrence;
use crate::events::{Event, EventError, db, lifecycle};
use crate::messaging::{MessageBody, log_failure, render};

/// Wraps up events once they are over: spawns the next occurrence of a
/// recurring series, posts the final roster, tears down the thread and
/// forgets the event.
#[derive(Debug)]
pub struct ArchiveEndedEvents;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub scanned: usize,
    pub archived: usize,
    pub successors: usize,
    pub failed: usize,
}

pub fn cleanup_deadline(
    event: &Event,
    civil: &CivilTime,
    grace: Duration,
) -> Result<DateTime<Utc>, EventError> {
    event
        .end_instant(civil)?
        .checked_add_signed(grace)
        .ok_or(EventError::InvalidDuration(event.duration_hours))
}

impl ArchiveEndedEvents {
    pub async fn run_pass(&self, ctx: &AppContext) -> Result<CleanupReport, EventError> {
        let now = ctx.now();
        let events = db::find_all_events(&ctx.db).await?;
        let mut report = CleanupReport {
            scanned: events.len(),
            ..Default::default()
        };

        for event in &events {
            match cleanup_deadline(event, &ctx.civil, ctx.config.cleanup_grace_period) {
                Ok(deadline) if now <= deadline => continue,
                Ok(_) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        "Event {}: can't tell when it ends: {}",
                        event.message_id,
                        e
                    );
                    continue;
                }
            }
            match archive_event(ctx, event, now).await {
                Ok(spawned) => {
                    report.archived += 1;
                    if spawned {
                        report.successors += 1;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        "Event {}: cleanup failed, will retry next pass: {:#}",
                        event.message_id,
                        e
                    );
                }
            }
        }

        tracing::info!(
            "Cleanup pass: {} events scanned, {} archived, {} successors created, {} failed",
            report.scanned,
            report.archived,
            report.successors,
            report.failed
        );
        Ok(report)
    }
}

/// Returns whether a successor was created.
///
/// The successor is published before anything else happens to the old
/// record. If a later step fails the record is picked up again on the next
/// pass, and `successor_id` keeps that retry from publishing a second one.
async fn archive_event(ctx: &AppContext, event: &Event, now: DateTime<Utc>) -> Result<bool> {
    let id = event.message_id;
    let spawned = spawn_successor(ctx, event, now).await?;

    let report = if event.is_cancelled {
        None
    } else {
        let summary = summarize(&ctx.db, id).await?;
        Some(render::final_report(event.start_date, &summary))
    };

    if let Some(thread_id) = event.thread_id {
        if let Some(report) = &report {
            if let Err(e) = ctx.messenger.send_to_channel(thread_id, report).await {
                log_failure(id, "final report", &e);
            }
        }
        if let Err(e) = ctx
            .messenger
            .send_to_channel(thread_id, render::thread_closing(event.keep_thread))
            .await
        {
            log_failure(id, "thread closing", &e);
        }
        let teardown = if event.keep_thread {
            ctx.messenger.archive_thread(thread_id).await
        } else {
            ctx.messenger.delete_thread(thread_id).await
        };
        if let Err(e) = teardown {
            log_failure(id, "thread teardown", &e);
        }
    }

    if event.keep_thread {
        // A kept thread keeps its announcement, turned into the final report
        if let Some(report) = report {
            if let Err(e) = ctx
                .messenger
                .edit_message(event.channel_id, id, &MessageBody::plain(report))
                .await
            {
                log_failure(id, "finalize announcement", &e);
            }
        }
    } else if let Err(e) = ctx.messenger.delete_message(event.channel_id, id).await {
        log_failure(id, "delete announcement", &e);
    }

    match lifecycle::delete(&ctx.db, id).await {
        Ok(()) | Err(EventError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }
    tracing::info!("Archived event {} from {}", id, event.start_date);
    Ok(spawned)
}

async fn spawn_successor(ctx: &AppContext, event: &Event, now: DateTime<Utc>) -> Result<bool> {
    if event.successor_id.is_some() {
        return Ok(false);
    }
    let Some(next) = compute_next_occurrence(event, ctx.civil.to_civil(now)) else {
        return Ok(false);
    };

    if !event.keep_thread {
        // Clear out old reminders and pings, tracked announcements stay
        let tracked = db::find_event_ids_in_channel(&ctx.db, event.channel_id).await?;
        match ctx
            .messenger
            .purge_bot_messages(event.channel_id, ctx.config.purge_limit, &tracked)
            .await
        {
            Ok(deleted) => tracing::debug!(
                "Purged {} old messages from channel {}",
                deleted,
                event.channel_id
            ),
            Err(e) => log_failure(event.message_id, "purge_bot_messages", &e),
        }
    }

    let successor = publish_event(ctx, &event.successor_params(next)).await?;
    db::set_successor(&ctx.db, event.message_id, successor.message_id).await?;
    tracing::info!(
        "Event {}: next {} occurrence is {} on {}",
        event.message_id,
        event.recurrence,
        successor.message_id,
        next
    );
    Ok(true)
}

#[async_trait]
impl PeriodicJob for ArchiveEndedEvents {
    fn interval(&self, config: &AppConfig) -> StdDuration {
        config.cleanup_poll_interval
    }

    async fn run_job(&self, ctx: &AppContext) {
        if let Err(e) = self.run_pass(ctx).await {
            tracing::error!("Cleanup pass failed: {}", e);
        }
    }
}
