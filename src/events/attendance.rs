//! Per-event RSVP ledger. One row per (event, user), latest vote wins.

use tokio_rusqlite::Connection;

use super::db;
use super::error::EventError;
use super::models::{AttendanceStatus, AttendanceSummary, MessageId, UserId};

/// Upsert a vote. Callers decide whether the event still accepts votes.
pub async fn record_vote(
    db: &Connection,
    event_id: MessageId,
    user_id: UserId,
    display_name: &str,
    status: AttendanceStatus,
) -> Result<(), EventError> {
    db::upsert_attendance(db, event_id, user_id, display_name, status).await
}

pub async fn summarize(db: &Connection, event_id: MessageId) -> Result<AttendanceSummary, EventError> {
    let mut summary = AttendanceSummary::default();
    for (attendee, status) in db::find_attendance(db, event_id).await? {
        match status {
            AttendanceStatus::Coming => summary.coming.push(attendee),
            AttendanceStatus::Maybe => summary.maybe.push(attendee),
            AttendanceStatus::NotComing => summary.not_coming.push(attendee),
        }
    }
    Ok(summary)
}
