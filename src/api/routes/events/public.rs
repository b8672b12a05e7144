//! Public types for the events API
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::CivilTime;
use crate::events::models::{
    AttendanceStatus, AttendanceSummary, Attendee, DEFAULT_DURATION_HOURS, Event, EventParams,
    EventState, ReminderFlags, parse_snowflake,
};
use crate::events::{EventError, Recurrence, VoteOutcome};

fn default_duration() -> f64 {
    DEFAULT_DURATION_HOURS
}

// Snowflakes are sent as strings, they don't fit in a JSON number

#[derive(Deserialize)]
pub struct CreateEventRequest {
    pub channel_id: String,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub details: String,
    #[serde(default = "default_duration")]
    pub duration_hours: f64,
    #[serde(default)]
    pub recurrence: Option<String>,
    pub target_group: Option<String>,
    #[serde(default)]
    pub keep_thread: bool,
}

impl CreateEventRequest {
    pub fn into_params(self) -> Result<EventParams, EventError> {
        let channel_id = parse_snowflake(&self.channel_id)?;
        let mut params = EventParams::parse(channel_id, &self.date, &self.time, &self.details)?;
        params.duration_hours = self.duration_hours;
        params.recurrence = match self.recurrence {
            Some(raw) => raw.parse::<Recurrence>()?,
            None => Recurrence::None,
        };
        params.target_group = self
            .target_group
            .map(|group| group.trim().to_string())
            .filter(|group| !group.is_empty());
        params.keep_thread = self.keep_thread;
        params.validate()?;
        Ok(params)
    }
}

#[derive(Serialize)]
pub struct EventResponse {
    pub id: String,
    pub channel_id: String,
    pub thread_id: Option<String>,
    pub date: String,
    pub time: String,
    pub start: DateTime<Utc>,
    /// Missing when the stored duration can't be represented.
    pub end: Option<DateTime<Utc>>,
    pub duration_hours: f64,
    pub details: String,
    pub recurrence: Recurrence,
    pub target_group: Option<String>,
    pub keep_thread: bool,
    pub state: EventState,
    pub reminders: ReminderFlags,
    pub successor_id: Option<String>,
}

impl EventResponse {
    pub fn new(event: &Event, civil: &CivilTime) -> Self {
        Self {
            id: event.message_id.to_string(),
            channel_id: event.channel_id.to_string(),
            thread_id: event.thread_id.map(|id| id.to_string()),
            date: event.start_date.to_string(),
            time: event.start_time.format("%H:%M").to_string(),
            start: event.start_instant(civil),
            end: event.end_instant(civil).ok(),
            duration_hours: event.duration_hours,
            details: event.details.clone(),
            recurrence: event.recurrence,
            target_group: event.target_group.clone(),
            keep_thread: event.keep_thread,
            state: event.state(),
            reminders: event.reminders,
            successor_id: event.successor_id.map(|id| id.to_string()),
        }
    }
}

#[derive(Serialize)]
pub struct EventListResponse {
    pub events: Vec<EventResponse>,
}

#[derive(Serialize)]
pub struct AttendeeResponse {
    pub user_id: String,
    pub display_name: String,
}

impl From<&Attendee> for AttendeeResponse {
    fn from(attendee: &Attendee) -> Self {
        Self {
            user_id: attendee.user_id.to_string(),
            display_name: attendee.display_name.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct AttendanceResponse {
    pub coming: Vec<AttendeeResponse>,
    pub maybe: Vec<AttendeeResponse>,
    pub not_coming: Vec<AttendeeResponse>,
}

impl From<&AttendanceSummary> for AttendanceResponse {
    fn from(summary: &AttendanceSummary) -> Self {
        Self {
            coming: summary.coming.iter().map(AttendeeResponse::from).collect(),
            maybe: summary.maybe.iter().map(AttendeeResponse::from).collect(),
            not_coming: summary.not_coming.iter().map(AttendeeResponse::from).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct EventDetailResponse {
    pub event: EventResponse,
    pub attendance: AttendanceResponse,
}

#[derive(Serialize)]
pub struct CancelEventResponse {
    /// False when the event was already cancelled.
    pub changed: bool,
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub user_id: String,
    pub display_name: String,
    pub status: AttendanceStatus,
}

#[derive(Serialize)]
pub struct VoteResponse {
    pub outcome: VoteOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateEventRequest {
        CreateEventRequest {
            channel_id: "100".to_string(),
            date: "2025-03-10".to_string(),
            time: "19:00".to_string(),
            details: "Gymnase".to_string(),
            duration_hours: 2.0,
            recurrence: Some("weekly".to_string()),
            target_group: Some("  ".to_string()),
            keep_thread: true,
        }
    }

    #[test]
    fn it_builds_params_from_a_request() {
        let params = request().into_params().unwrap();
        assert_eq!(params.channel_id, 100);
        assert_eq!(params.recurrence, Recurrence::Weekly);
        assert_eq!(params.target_group, None);
        assert!(params.keep_thread);
    }

    #[test]
    fn it_rejects_unknown_recurrence() {
        let mut req = request();
        req.recurrence = Some("daily".to_string());
        assert!(matches!(
            req.into_params(),
            Err(EventError::InvalidRecurrence(_))
        ));
    }
}
