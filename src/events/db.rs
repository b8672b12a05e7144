use chrono::{NaiveDate, NaiveTime};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};
use tokio_rusqlite::Connection;

use super::error::EventError;
use super::models::{
    AttendanceStatus, Attendee, Event, MessageId, Recurrence, ReminderFlags, ReminderKind, UserId,
};

const EVENT_COLUMNS: &str = "message_id, thread_id, channel_id, event_date, event_time, \
     duration_hours, details, target_group, recurrence_type, keep_thread, is_cancelled, \
     reminder_3d_sent, reminder_24h_sent, reminder_2h_sent, successor_id";

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn event_from_row(row: &Row<'_>) -> Result<Event, rusqlite::Error> {
    let event_date: String = row.get(3)?;
    let event_time: String = row.get(4)?;
    let recurrence: String = row.get(8)?;
    Ok(Event {
        message_id: row.get::<_, i64>(0)? as MessageId,
        thread_id: row.get::<_, Option<i64>>(1)?.map(|id| id as u64),
        channel_id: row.get::<_, i64>(2)? as u64,
        start_date: NaiveDate::parse_from_str(&event_date, "%Y-%m-%d")
            .map_err(|e| conversion_error(3, e))?,
        start_time: NaiveTime::parse_from_str(&event_time, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&event_time, "%H:%M"))
            .map_err(|e| conversion_error(4, e))?,
        duration_hours: row.get(5)?,
        details: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        target_group: row.get(7)?,
        recurrence: recurrence
            .parse::<Recurrence>()
            .map_err(|e| conversion_error(8, e))?,
        keep_thread: row.get(9)?,
        is_cancelled: row.get(10)?,
        reminders: ReminderFlags {
            three_day: row.get(11)?,
            one_day: row.get(12)?,
            two_hour: row.get(13)?,
        },
        successor_id: row.get::<_, Option<i64>>(14)?.map(|id| id as u64),
    })
}

pub async fn insert_event(db: &Connection, event: &Event) -> Result<(), EventError> {
    let event = event.clone();
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO event (message_id, thread_id, channel_id, event_date, event_time, \
             duration_hours, details, target_group, recurrence_type, keep_thread, is_cancelled, \
             reminder_3d_sent, reminder_24h_sent, reminder_2h_sent, successor_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, 0, 0, NULL)",
            params![
                event.message_id as i64,
                event.thread_id.map(|id| id as i64),
                event.channel_id as i64,
                event.start_date.format("%Y-%m-%d").to_string(),
                event.start_time.format("%H:%M:%S").to_string(),
                event.duration_hours,
                event.details,
                event.target_group,
                event.recurrence.as_str(),
                event.keep_thread,
            ],
        )?;
        Ok(())
    })
    .await?;
    Ok(())
}

pub async fn find_event(db: &Connection, message_id: MessageId) -> Result<Option<Event>, EventError> {
    let event = db
        .call(move |conn| {
            let event = conn
                .query_row(
                    &format!("SELECT {} FROM event WHERE message_id = ?", EVENT_COLUMNS),
                    [message_id as i64],
                    event_from_row,
                )
                .optional()?;
            Ok(event)
        })
        .await?;
    Ok(event)
}

async fn query_events(db: &Connection, sql: String) -> Result<Vec<Event>, EventError> {
    let events = db
        .call(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], event_from_row)?;
            let mut events = Vec::new();
            for row in rows {
                match row {
                    Ok(event) => events.push(event),
                    // A corrupt row shouldn't stall every other event
                    Err(e) => tracing::error!("Skipping unreadable event row: {}", e),
                }
            }
            Ok(events)
        })
        .await?;
    Ok(events)
}

pub async fn find_all_events(db: &Connection) -> Result<Vec<Event>, EventError> {
    query_events(
        db,
        format!(
            "SELECT {} FROM event ORDER BY event_date, event_time",
            EVENT_COLUMNS
        ),
    )
    .await
}

pub async fn find_active_events(db: &Connection) -> Result<Vec<Event>, EventError> {
    query_events(
        db,
        format!(
            "SELECT {} FROM event WHERE is_cancelled = 0 ORDER BY event_date, event_time",
            EVENT_COLUMNS
        ),
    )
    .await
}

pub async fn find_event_ids_in_channel(
    db: &Connection,
    channel_id: u64,
) -> Result<Vec<MessageId>, EventError> {
    let ids = db
        .call(move |conn| {
            let mut stmt = conn.prepare("SELECT message_id FROM event WHERE channel_id = ?")?;
            let ids = stmt
                .query_map([channel_id as i64], |row| row.get::<_, i64>(0))?
                .filter_map(Result::ok)
                .map(|id| id as MessageId)
                .collect::<Vec<_>>();
            Ok(ids)
        })
        .await?;
    Ok(ids)
}

/// Flip `is_cancelled` on. Returns `None` when the event doesn't exist,
/// otherwise whether this call changed it.
pub async fn mark_cancelled(db: &Connection, message_id: MessageId) -> Result<Option<bool>, EventError> {
    let outcome = db
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE event SET is_cancelled = 1 WHERE message_id = ? AND is_cancelled = 0",
                [message_id as i64],
            )?;
            if changed > 0 {
                return Ok(Some(true));
            }
            let exists: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM event WHERE message_id = ?",
                [message_id as i64],
                |row| row.get(0),
            )?;
            Ok(exists.then_some(false))
        })
        .await?;
    Ok(outcome)
}

/// Claim a reminder flag. The update only matches while the flag is still
/// unset so of two racing passes only one gets `true` back.
pub async fn mark_reminder_sent(
    db: &Connection,
    message_id: MessageId,
    kind: ReminderKind,
) -> Result<bool, EventError> {
    let sql = match kind {
        ReminderKind::ThreeDay => {
            "UPDATE event SET reminder_3d_sent = 1 WHERE message_id = ? AND reminder_3d_sent = 0"
        }
        ReminderKind::OneDay => {
            "UPDATE event SET reminder_24h_sent = 1 WHERE message_id = ? AND reminder_24h_sent = 0"
        }
        ReminderKind::TwoHour => {
            "UPDATE event SET reminder_2h_sent = 1 WHERE message_id = ? AND reminder_2h_sent = 0"
        }
    };
    let changed = db
        .call(move |conn| Ok(conn.execute(sql, [message_id as i64])?))
        .await?;
    Ok(changed > 0)
}

pub async fn set_successor(
    db: &Connection,
    message_id: MessageId,
    successor_id: MessageId,
) -> Result<(), EventError> {
    db.call(move |conn| {
        conn.execute(
            "UPDATE event SET successor_id = ? WHERE message_id = ? AND successor_id IS NULL",
            [successor_id as i64, message_id as i64],
        )?;
        Ok(())
    })
    .await?;
    Ok(())
}

/// Remove the event and every attendance row for it in one transaction.
/// Returns false if there was no such event.
pub async fn delete_event_and_attendance(
    db: &Connection,
    message_id: MessageId,
) -> Result<bool, EventError> {
    let deleted = db
        .call(move |conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute("DELETE FROM event WHERE message_id = ?", [message_id as i64])?;
            tx.execute(
                "DELETE FROM attendance WHERE message_id = ?",
                [message_id as i64],
            )?;
            tx.commit()?;
            Ok(deleted > 0)
        })
        .await?;
    Ok(deleted)
}

pub async fn upsert_attendance(
    db: &Connection,
    message_id: MessageId,
    user_id: UserId,
    display_name: &str,
    status: AttendanceStatus,
) -> Result<(), EventError> {
    let display_name = display_name.to_string();
    db.call(move |conn| {
        conn.execute(
            "INSERT INTO attendance (message_id, user_id, user_name, status) VALUES (?, ?, ?, ?) \
             ON CONFLICT(message_id, user_id) DO UPDATE SET \
             user_name = excluded.user_name, status = excluded.status, \
             updated_at = CURRENT_TIMESTAMP",
            params![message_id as i64, user_id as i64, display_name, status.as_str()],
        )?;
        Ok(())
    })
    .await?;
    Ok(())
}

pub async fn find_attendance(
    db: &Connection,
    message_id: MessageId,
) -> Result<Vec<(Attendee, AttendanceStatus)>, EventError> {
    let rows = db
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, user_name, status FROM attendance WHERE message_id = ? ORDER BY id",
            )?;
            let rows = stmt
                .query_map([message_id as i64], |row| {
                    let status: String = row.get(2)?;
                    Ok((
                        Attendee {
                            user_id: row.get::<_, i64>(0)? as UserId,
                            display_name: row.get(1)?,
                        },
                        status
                            .parse::<AttendanceStatus>()
                            .map_err(|e| conversion_error(2, e))?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await?;
    Ok(rows)
}

pub async fn count_attendance(db: &Connection, message_id: MessageId) -> Result<usize, EventError> {
    let count = db
        .call(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM attendance WHERE message_id = ?",
                [message_id as i64],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::initialize_db;
    use crate::events::models::EventParams;

    async fn test_db() -> Connection {
        let db = Connection::open_in_memory().await.unwrap();
        db.call(|conn| Ok(initialize_db(conn)?)).await.unwrap();
        db
    }

    fn event(message_id: MessageId) -> Event {
        let mut params = EventParams::parse(100, "2025-03-10", "19:00", "Gymnase").unwrap();
        params.target_group = Some("@Membres".to_string());
        Event::new(&params, message_id, Some(message_id + 1))
    }

    #[tokio::test]
    async fn it_round_trips_an_event() {
        let db = test_db().await;
        let original = event(1);
        insert_event(&db, &original).await.unwrap();
        let found = find_event(&db, 1).await.unwrap().unwrap();
        assert_eq!(found, original);
        assert!(find_event(&db, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn it_rejects_a_duplicate_event_id() {
        let db = test_db().await;
        insert_event(&db, &event(1)).await.unwrap();
        assert!(matches!(
            insert_event(&db, &event(1)).await,
            Err(EventError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn reminder_flags_are_claimed_once() {
        let db = test_db().await;
        insert_event(&db, &event(1)).await.unwrap();

        assert!(mark_reminder_sent(&db, 1, ReminderKind::OneDay).await.unwrap());
        assert!(!mark_reminder_sent(&db, 1, ReminderKind::OneDay).await.unwrap());
        assert!(mark_reminder_sent(&db, 1, ReminderKind::TwoHour).await.unwrap());

        let found = find_event(&db, 1).await.unwrap().unwrap();
        assert!(!found.reminders.three_day);
        assert!(found.reminders.one_day);
        assert!(found.reminders.two_hour);
    }

    #[tokio::test]
    async fn it_cancels_once() {
        let db = test_db().await;
        insert_event(&db, &event(1)).await.unwrap();
        assert_eq!(mark_cancelled(&db, 1).await.unwrap(), Some(true));
        assert_eq!(mark_cancelled(&db, 1).await.unwrap(), Some(false));
        assert_eq!(mark_cancelled(&db, 9).await.unwrap(), None);
        assert!(find_active_events(&db).await.unwrap().is_empty());
        assert_eq!(find_all_events(&db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn it_keeps_one_attendance_row_per_user() {
        let db = test_db().await;
        insert_event(&db, &event(1)).await.unwrap();
        upsert_attendance(&db, 1, 7, "Sam", AttendanceStatus::Coming).await.unwrap();
        upsert_attendance(&db, 1, 7, "Sam B.", AttendanceStatus::NotComing).await.unwrap();
        let rows = find_attendance(&db, 1).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0.display_name, "Sam B.");
        assert_eq!(rows[0].1, AttendanceStatus::NotComing);
    }

    #[tokio::test]
    async fn delete_removes_attendance_with_the_event() {
        let db = test_db().await;
        insert_event(&db, &event(1)).await.unwrap();
        insert_event(&db, &event(5)).await.unwrap();
        upsert_attendance(&db, 1, 7, "Sam", AttendanceStatus::Coming).await.unwrap();
        upsert_attendance(&db, 5, 7, "Sam", AttendanceStatus::Maybe).await.unwrap();

        assert!(delete_event_and_attendance(&db, 1).await.unwrap());
        assert!(!delete_event_and_attendance(&db, 1).await.unwrap());
        assert_eq!(count_attendance(&db, 1).await.unwrap(), 0);
        assert_eq!(count_attendance(&db, 5).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn successor_is_only_recorded_once() {
        let db = test_db().await;
        insert_event(&db, &event(1)).await.unwrap();
        set_successor(&db, 1, 50).await.unwrap();
        set_successor(&db, 1, 60).await.unwrap();
        let found = find_event(&db, 1).await.unwrap().unwrap();
        assert_eq!(found.successor_id, Some(50));
    }
}
