use std::path::Path;

use anyhow::{Error, Result};
use rusqlite::Connection as SyncConnection;
use tokio_rusqlite::Connection;

pub const DB_FILE_NAME: &str = "rollcall.sqlite";

/// Open the async store. `db_dir` is a directory, the database file lives
/// inside it.
pub async fn async_db(db_dir: &str) -> Result<Connection, Error> {
    let db_path = Path::new(db_dir).join(DB_FILE_NAME);
    let db = Connection::open(db_path).await?;
    db.call(|conn| {
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(())
    })
    .await?;
    Ok(db)
}

/// Create tables that don't exist yet. Safe to run on every start.
pub fn initialize_db(conn: &SyncConnection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS event (
            message_id INTEGER PRIMARY KEY,
            thread_id INTEGER,
            channel_id INTEGER NOT NULL,
            event_date TEXT NOT NULL,
            event_time TEXT NOT NULL,
            duration_hours REAL NOT NULL DEFAULT 2.0,
            details TEXT NOT NULL DEFAULT '',
            target_group TEXT,
            recurrence_type TEXT NOT NULL DEFAULT 'none',
            keep_thread INTEGER NOT NULL DEFAULT 0,
            is_cancelled INTEGER NOT NULL DEFAULT 0,
            reminder_3d_sent INTEGER NOT NULL DEFAULT 0,
            reminder_24h_sent INTEGER NOT NULL DEFAULT 0,
            reminder_2h_sent INTEGER NOT NULL DEFAULT 0,
            successor_id INTEGER,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS attendance (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            user_name TEXT NOT NULL,
            status TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(message_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS attendance_message_id_idx ON attendance(message_id);
        CREATE INDEX IF NOT EXISTS event_is_cancelled_idx ON event(is_cancelled);
        ",
    )?;
    Ok(())
}

/// Columns added after the first release, with the DDL that adds them.
const EVENT_COLUMN_MIGRATIONS: &[(&str, &str)] = &[
    ("channel_id", "ALTER TABLE event ADD COLUMN channel_id INTEGER NOT NULL DEFAULT 0"),
    ("target_group", "ALTER TABLE event ADD COLUMN target_group TEXT"),
    (
        "reminder_3d_sent",
        "ALTER TABLE event ADD COLUMN reminder_3d_sent INTEGER NOT NULL DEFAULT 0",
    ),
    (
        "reminder_24h_sent",
        "ALTER TABLE event ADD COLUMN reminder_24h_sent INTEGER NOT NULL DEFAULT 0",
    ),
    (
        "reminder_2h_sent",
        "ALTER TABLE event ADD COLUMN reminder_2h_sent INTEGER NOT NULL DEFAULT 0",
    ),
    (
        "keep_thread",
        "ALTER TABLE event ADD COLUMN keep_thread INTEGER NOT NULL DEFAULT 0",
    ),
    (
        "is_cancelled",
        "ALTER TABLE event ADD COLUMN is_cancelled INTEGER NOT NULL DEFAULT 0",
    ),
    (
        "duration_hours",
        "ALTER TABLE event ADD COLUMN duration_hours REAL NOT NULL DEFAULT 2.0",
    ),
    ("successor_id", "ALTER TABLE event ADD COLUMN successor_id INTEGER"),
];

/// Bring a database created by an older build up to the current schema.
pub fn migrate_db(conn: &mut SyncConnection) -> Result<(), rusqlite::Error> {
    let tx = conn.transaction()?;

    // Older builds named the table `events`
    let legacy_table: bool = tx.query_row(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'events'",
        [],
        |row| row.get(0),
    )?;
    if legacy_table {
        tracing::info!("Renaming legacy table events to event");
        tx.execute("ALTER TABLE events RENAME TO event", [])?;
    }

    let columns = table_columns(&tx, "event")?;
    if !columns.is_empty() {
        if !columns.iter().any(|c| c == "recurrence_type") {
            tracing::info!("Adding column recurrence_type to event");
            tx.execute(
                "ALTER TABLE event ADD COLUMN recurrence_type TEXT NOT NULL DEFAULT 'none'",
                [],
            )?;
            // The old boolean flag only ever meant weekly
            if columns.iter().any(|c| c == "is_recurrent") {
                tx.execute(
                    "UPDATE event SET recurrence_type = 'weekly' WHERE is_recurrent = 1",
                    [],
                )?;
            }
        }
        for (column, ddl) in EVENT_COLUMN_MIGRATIONS {
            if !columns.iter().any(|c| c == column) {
                tracing::info!("Adding column {} to event", column);
                tx.execute(ddl, [])?;
            }
        }
    }

    // Older builds deleted events without their attendance rows
    let orphans = tx.execute(
        "DELETE FROM attendance WHERE message_id NOT IN (SELECT message_id FROM event)",
        [],
    );
    match orphans {
        Ok(0) => {}
        Ok(n) => tracing::info!("Removed {} orphaned attendance rows", n),
        // Table doesn't exist yet, initialize_db will create it
        Err(rusqlite::Error::SqliteFailure(_, Some(msg))) if msg.contains("no such table") => {}
        Err(e) => return Err(e),
    }

    tx.commit()?;
    initialize_db(conn)
}

fn table_columns(conn: &SyncConnection, table: &str) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}
