use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::EventError;
use crate::core::CivilTime;

/// Chat platform snowflakes. The announcement message id doubles as the
/// event id.
pub type MessageId = u64;
pub type ChannelId = u64;
pub type ThreadId = u64;
pub type UserId = u64;

pub const DEFAULT_DURATION_HOURS: f64 = 2.0;
/// Longest session an organizer can schedule.
pub const MAX_DURATION_HOURS: f64 = 24.0;

pub fn parse_snowflake(raw: &str) -> Result<u64, EventError> {
    raw.trim()
        .parse()
        .map_err(|_| EventError::InvalidId(raw.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Recurrence {
    #[default]
    None,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::None => "none",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, Recurrence::None)
    }
}

impl FromStr for Recurrence {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "" => Ok(Recurrence::None),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            other => Err(EventError::InvalidRecurrence(other.to_string())),
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three reminder offsets, each backed by its own flag column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    ThreeDay,
    OneDay,
    TwoHour,
}

impl ReminderKind {
    pub const ALL: [ReminderKind; 3] = [
        ReminderKind::ThreeDay,
        ReminderKind::OneDay,
        ReminderKind::TwoHour,
    ];
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReminderKind::ThreeDay => "three-day",
            ReminderKind::OneDay => "one-day",
            ReminderKind::TwoHour => "two-hour",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReminderFlags {
    pub three_day: bool,
    pub one_day: bool,
    pub two_hour: bool,
}

impl ReminderFlags {
    pub fn is_sent(&self, kind: ReminderKind) -> bool {
        match kind {
            ReminderKind::ThreeDay => self.three_day,
            ReminderKind::OneDay => self.one_day,
            ReminderKind::TwoHour => self.two_hour,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Coming,
    Maybe,
    NotComing,
}

impl AttendanceStatus {
    /// Value stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Coming => "Coming",
            AttendanceStatus::Maybe => "Maybe",
            AttendanceStatus::NotComing => "Not Coming",
        }
    }

    /// Coming and Maybe voters belong in the discussion thread and get
    /// reminders.
    pub fn wants_updates(&self) -> bool {
        matches!(self, AttendanceStatus::Coming | AttendanceStatus::Maybe)
    }
}

impl FromStr for AttendanceStatus {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Coming" | "coming" => Ok(AttendanceStatus::Coming),
            "Maybe" | "maybe" => Ok(AttendanceStatus::Maybe),
            "Not Coming" | "not_coming" => Ok(AttendanceStatus::NotComing),
            other => Err(EventError::InvalidStatus(other.to_string())),
        }
    }
}

/// Parameters for a new occurrence, already validated for shape.
#[derive(Debug, Clone, PartialEq)]
pub struct EventParams {
    pub channel_id: ChannelId,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_hours: f64,
    pub details: String,
    pub recurrence: Recurrence,
    pub target_group: Option<String>,
    pub keep_thread: bool,
}

impl EventParams {
    /// Parse the civil date (`YYYY-MM-DD`) and time (`HH:MM` or
    /// `HH:MM:SS`) typed by an organizer.
    pub fn parse(
        channel_id: ChannelId,
        date: &str,
        time: &str,
        details: &str,
    ) -> Result<Self, EventError> {
        let (start_date, start_time) = parse_civil_date_time(date, time)?;
        Ok(Self {
            channel_id,
            start_date,
            start_time,
            duration_hours: DEFAULT_DURATION_HOURS,
            details: details.trim().to_string(),
            recurrence: Recurrence::None,
            target_group: None,
            keep_thread: false,
        })
    }

    pub fn validate(&self) -> Result<(), EventError> {
        if !self.duration_hours.is_finite()
            || self.duration_hours <= 0.0
            || self.duration_hours > MAX_DURATION_HOURS
        {
            return Err(EventError::InvalidDuration(self.duration_hours));
        }
        Ok(())
    }

    pub fn start(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.start_date, self.start_time)
    }
}

pub fn parse_civil_date_time(date: &str, time: &str) -> Result<(NaiveDate, NaiveTime), EventError> {
    let parsed_date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| EventError::InvalidTimeFormat(format!("date {:?}", date)))?;
    let parsed_time = NaiveTime::parse_from_str(time.trim(), "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time.trim(), "%H:%M"))
        .map_err(|_| EventError::InvalidTimeFormat(format!("time {:?}", time)))?;
    Ok((parsed_date, parsed_time))
}

/// One posted occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub message_id: MessageId,
    pub thread_id: Option<ThreadId>,
    pub channel_id: ChannelId,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub duration_hours: f64,
    pub details: String,
    pub target_group: Option<String>,
    pub recurrence: Recurrence,
    pub keep_thread: bool,
    pub is_cancelled: bool,
    pub reminders: ReminderFlags,
    /// Set once the next occurrence of a recurring series has been posted.
    pub successor_id: Option<MessageId>,
}

/// Stored lifecycle state. Ended is derived from the clock, not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    Scheduled,
    Cancelled,
}

impl Event {
    pub fn new(params: &EventParams, message_id: MessageId, thread_id: Option<ThreadId>) -> Self {
        Self {
            message_id,
            thread_id,
            channel_id: params.channel_id,
            start_date: params.start_date,
            start_time: params.start_time,
            duration_hours: params.duration_hours,
            details: params.details.clone(),
            target_group: params.target_group.clone(),
            recurrence: params.recurrence,
            keep_thread: params.keep_thread,
            is_cancelled: false,
            reminders: ReminderFlags::default(),
            successor_id: None,
        }
    }

    pub fn state(&self) -> EventState {
        if self.is_cancelled {
            EventState::Cancelled
        } else {
            EventState::Scheduled
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.start_date, self.start_time)
    }

    /// None when the stored duration can't be represented.
    pub fn duration(&self) -> Option<Duration> {
        if !self.duration_hours.is_finite() {
            return None;
        }
        Duration::try_milliseconds((self.duration_hours * 3_600_000.0).round() as i64)
    }

    pub fn start_instant(&self, civil: &CivilTime) -> DateTime<Utc> {
        civil.to_utc(self.start_date, self.start_time)
    }

    pub fn end_instant(&self, civil: &CivilTime) -> Result<DateTime<Utc>, EventError> {
        self.duration()
            .and_then(|duration| self.start_instant(civil).checked_add_signed(duration))
            .ok_or(EventError::InvalidDuration(self.duration_hours))
    }

    pub fn has_ended(&self, civil: &CivilTime, now: DateTime<Utc>) -> Result<bool, EventError> {
        Ok(now >= self.end_instant(civil)?)
    }

    /// True when there is someone to mention in channel announcements.
    pub fn has_audience(&self) -> bool {
        self.target_group
            .as_deref()
            .is_some_and(|group| !group.trim().is_empty())
    }

    pub fn params(&self) -> EventParams {
        EventParams {
            channel_id: self.channel_id,
            start_date: self.start_date,
            start_time: self.start_time,
            duration_hours: self.duration_hours,
            details: self.details.clone(),
            recurrence: self.recurrence,
            target_group: self.target_group.clone(),
            keep_thread: self.keep_thread,
        }
    }

    /// Parameters for the next occurrence, everything but the start is
    /// carried forward unchanged.
    pub fn successor_params(&self, start: NaiveDateTime) -> EventParams {
        EventParams {
            start_date: start.date(),
            start_time: start.time(),
            ..self.params()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attendee {
    pub user_id: UserId,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceSummary {
    pub coming: Vec<Attendee>,
    pub maybe: Vec<Attendee>,
    pub not_coming: Vec<Attendee>,
}

impl AttendanceSummary {
    /// Everyone who answered Coming or Maybe.
    pub fn interested(&self) -> impl Iterator<Item = &Attendee> {
        self.coming.iter().chain(self.maybe.iter())
    }

    pub fn total(&self) -> usize {
        self.coming.len() + self.maybe.len() + self.not_coming.len()
    }
}
