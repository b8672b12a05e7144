use std::time::Duration as StdDuration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Days, Duration, Utc};

use super::PeriodicJob;
use crate::core::{AppConfig, AppContext, CivilTime};
use crate::events::attendance::summarize;
use crate::events::db;
use crate::events::publish::resolve_mentions;
use crate::events::{Event, EventError, ReminderKind};
use crate::messaging::render;

/// Posts the three-day, one-day and two-hour reminders.
#[derive(Debug)]
pub struct SendReminders;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReminderReport {
    pub scanned: usize,
    pub sent: usize,
    pub failed: usize,
    pub dm_failures: usize,
}

/// Reminders that are due for `event` at `now` and haven't been sent yet.
///
/// The one-day and two-hour windows are half open, `(23h, 24h]` and
/// `(1h, 2h]` before the start, so a poll landing exactly on the boundary
/// still fires.
pub fn due_reminders(event: &Event, civil: &CivilTime, now: DateTime<Utc>) -> Vec<ReminderKind> {
    if event.is_cancelled {
        return Vec::new();
    }
    let until_start = event.start_instant(civil) - now;
    let in_three_days = civil.today(now).checked_add_days(Days::new(3));

    ReminderKind::ALL
        .into_iter()
        .filter(|kind| !event.reminders.is_sent(*kind))
        .filter(|kind| match kind {
            ReminderKind::ThreeDay => {
                event.has_audience() && in_three_days == Some(event.start_date)
            }
            ReminderKind::OneDay => {
                until_start > Duration::hours(23) && until_start <= Duration::hours(24)
            }
            ReminderKind::TwoHour => {
                until_start > Duration::hours(1) && until_start <= Duration::hours(2)
            }
        })
        .collect()
}

impl SendReminders {
    pub async fn run_pass(&self, ctx: &AppContext) -> Result<ReminderReport, EventError> {
        let now = ctx.now();
        let events = db::find_active_events(&ctx.db).await?;
        let mut report = ReminderReport {
            scanned: events.len(),
            ..Default::default()
        };

        for event in &events {
            for kind in due_reminders(event, &ctx.civil, now) {
                match send_reminder(ctx, event, kind).await {
                    Ok(dm_failures) => {
                        report.sent += 1;
                        report.dm_failures += dm_failures;
                    }
                    Err(e) => {
                        report.failed += 1;
                        tracing::error!(
                            "Event {}: {} reminder failed, will retry next pass: {:#}",
                            event.message_id,
                            kind,
                            e
                        );
                    }
                }
            }
        }

        tracing::info!(
            "Reminder pass: {} events scanned, {} reminders sent, {} failed, {} DMs undelivered",
            report.scanned,
            report.sent,
            report.failed,
            report.dm_failures
        );
        Ok(report)
    }
}

/// Send one reminder then set its flag. Returns the number of direct
/// messages that couldn't be delivered.
async fn send_reminder(ctx: &AppContext, event: &Event, kind: ReminderKind) -> Result<usize> {
    let mut dm_failures = 0;

    match kind {
        ReminderKind::ThreeDay => {
            let mentions = resolve_mentions(ctx, event).await;
            let content = render::three_day_reminder(&mentions, event.start_date, event.start_time);
            ctx.messenger
                .send_to_channel(event.channel_id, &content)
                .await?;
        }
        ReminderKind::OneDay => match event.thread_id {
            Some(thread_id) => {
                let summary = summarize(&ctx.db, event.message_id).await?;
                let mentions = render::user_mentions(summary.interested());
                let content = render::one_day_reminder(&mentions, event.start_time);
                ctx.messenger.send_to_channel(thread_id, &content).await?;
            }
            None => {
                tracing::debug!(
                    "Event {} has no thread, skipping the one-day reminder",
                    event.message_id
                );
            }
        },
        ReminderKind::TwoHour => {
            let summary = summarize(&ctx.db, event.message_id).await?;
            let content = render::two_hour_dm(event.start_date, event.start_time, &event.details);
            for attendee in summary.interested() {
                if let Err(e) = ctx
                    .messenger
                    .send_direct_message(attendee.user_id, &content)
                    .await
                {
                    dm_failures += 1;
                    tracing::warn!(
                        "Event {}: could not DM {} ({}): {:#}",
                        event.message_id,
                        attendee.display_name,
                        attendee.user_id,
                        e
                    );
                }
            }
        }
    }

    if !db::mark_reminder_sent(&ctx.db, event.message_id, kind).await? {
        tracing::warn!(
            "Event {}: {} reminder flag was already set by another pass",
            event.message_id,
            kind
        );
    }
    Ok(dm_failures)
}

#[async_trait]
impl PeriodicJob for SendReminders {
    fn interval(&self, config: &AppConfig) -> StdDuration {
        config.reminder_poll_interval
    }

    async fn run_job(&self, ctx: &AppContext) {
        if let Err(e) = self.run_pass(ctx).await {
            tracing::error!("Reminder pass failed: {}", e);
        }
    }
}
