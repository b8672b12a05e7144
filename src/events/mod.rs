pub mod attendance;
pub mod db;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod publish;
pub mod recurrence;
pub mod rsvp;

pub use error::EventError;
pub use models::{
    AttendanceStatus, AttendanceSummary, Attendee, Event, EventParams, Recurrence, ReminderKind,
};
pub use rsvp::{Vote, VoteOutcome, submit_vote, submit_vote_in_background};
