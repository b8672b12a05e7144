//! Stored event state transitions: create, cancel, delete and the gate
//! consulted before accepting a vote.

use chrono::{DateTime, Utc};
use tokio_rusqlite::Connection;

use super::db;
use super::error::EventError;
use super::models::{Event, EventParams, MessageId, ThreadId};
use crate::core::CivilTime;

/// Why an event does or doesn't take votes right now.
#[derive(Debug, Clone, PartialEq)]
pub enum Acceptance {
    Open(Event),
    Cancelled,
    Ended,
    NotFound,
}

/// Persist a freshly posted occurrence as `Scheduled` with every
/// reminder flag unset.
pub async fn create(
    db: &Connection,
    params: &EventParams,
    message_id: MessageId,
    thread_id: Option<ThreadId>,
) -> Result<Event, EventError> {
    params.validate()?;
    let event = Event::new(params, message_id, thread_id);
    db::insert_event(db, &event).await?;
    tracing::info!(
        "Created event {} on {} {} ({})",
        message_id,
        event.start_date,
        event.start_time,
        event.recurrence
    );
    Ok(event)
}

/// Mark an event cancelled. Returns whether this call changed anything, a
/// second cancel is a no-op.
pub async fn cancel(db: &Connection, event_id: MessageId) -> Result<bool, EventError> {
    match db::mark_cancelled(db, event_id).await? {
        Some(changed) => {
            if changed {
                tracing::info!("Cancelled event {}", event_id);
            }
            Ok(changed)
        }
        None => Err(EventError::NotFound(event_id)),
    }
}

/// Reads the event fresh from the store on every call, cancellation or
/// expiry may have happened since the voter saw the buttons.
pub async fn check_responses(
    db: &Connection,
    civil: &CivilTime,
    now: DateTime<Utc>,
    event_id: MessageId,
) -> Result<Acceptance, EventError> {
    let Some(event) = db::find_event(db, event_id).await? else {
        return Ok(Acceptance::NotFound);
    };
    if event.is_cancelled {
        return Ok(Acceptance::Cancelled);
    }
    if event.has_ended(civil, now)? {
        return Ok(Acceptance::Ended);
    }
    Ok(Acceptance::Open(event))
}

pub async fn is_accepting_responses(
    db: &Connection,
    civil: &CivilTime,
    now: DateTime<Utc>,
    event_id: MessageId,
) -> Result<bool, EventError> {
    let acceptance = check_responses(db, civil, now, event_id).await?;
    Ok(matches!(acceptance, Acceptance::Open(_)))
}

/// Remove the event and all of its attendance rows atomically.
pub async fn delete(db: &Connection, event_id: MessageId) -> Result<(), EventError> {
    if db::delete_event_and_attendance(db, event_id).await? {
        tracing::info!("Deleted event {}", event_id);
        Ok(())
    } else {
        Err(EventError::NotFound(event_id))
    }
}
