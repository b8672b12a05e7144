use thiserror::Error;

use super::models::MessageId;

/// Errors returned by event operations. Collaborator failures are not in
/// here, those are logged by the caller and never change stored state.
#[derive(Error, Debug)]
pub enum EventError {
    #[error("Invalid date or time format: {0}")]
    InvalidTimeFormat(String),

    #[error("Invalid recurrence: {0}")]
    InvalidRecurrence(String),

    #[error("Invalid attendance status: {0}")]
    InvalidStatus(String),

    #[error("Invalid duration: {0} hours")]
    InvalidDuration(f64),

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Event {0} not found")]
    NotFound(MessageId),

    #[error("Storage error: {0}")]
    Storage(#[from] tokio_rusqlite::Error),
}

impl EventError {
    /// True for errors caused by bad caller input rather than state or I/O.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            EventError::InvalidTimeFormat(_)
                | EventError::InvalidRecurrence(_)
                | EventError::InvalidStatus(_)
                | EventError::InvalidDuration(_)
                | EventError::InvalidId(_)
        )
    }
}

impl From<rusqlite::Error> for EventError {
    fn from(err: rusqlite::Error) -> Self {
        EventError::Storage(tokio_rusqlite::Error::Rusqlite(err))
    }
}
