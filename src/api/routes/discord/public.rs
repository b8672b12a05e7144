//! Discord interaction payloads, limited to what the RSVP buttons need.
use serde::{Deserialize, Serialize};

use crate::events::Vote;
use crate::events::models::parse_snowflake;

pub const PING: u8 = 1;
pub const MESSAGE_COMPONENT: u8 = 3;

const PONG: u8 = 1;
const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;
const EPHEMERAL: u64 = 1 << 6;

/// Announcement buttons carry `rsvp:<status>` as their custom id.
pub const RSVP_PREFIX: &str = "rsvp:";

#[derive(Deserialize, Debug)]
pub struct Interaction {
    #[serde(rename = "type")]
    pub kind: u8,
    pub data: Option<ComponentData>,
    pub message: Option<InteractionMessage>,
    /// Present when the click happened in a server.
    pub member: Option<Member>,
    /// Present when the click happened in a DM.
    pub user: Option<User>,
}

#[derive(Deserialize, Debug)]
pub struct ComponentData {
    pub custom_id: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct InteractionMessage {
    pub id: String,
}

#[derive(Deserialize, Debug)]
pub struct Member {
    pub user: User,
    pub nick: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct User {
    pub id: String,
    pub username: String,
    pub global_name: Option<String>,
}

impl Interaction {
    /// The vote behind an RSVP button click, None for any other component.
    pub fn vote(&self) -> Option<Vote> {
        let status = self
            .data
            .as_ref()?
            .custom_id
            .as_deref()?
            .strip_prefix(RSVP_PREFIX)?
            .parse()
            .ok()?;
        let event_id = parse_snowflake(&self.message.as_ref()?.id).ok()?;
        let (user, nick) = match (&self.member, &self.user) {
            (Some(member), _) => (&member.user, member.nick.as_deref()),
            (None, Some(user)) => (user, None),
            (None, None) => return None,
        };
        let display_name = nick
            .or(user.global_name.as_deref())
            .unwrap_or(&user.username)
            .to_string();

        Some(Vote {
            event_id,
            user_id: parse_snowflake(&user.id).ok()?,
            display_name,
            status,
        })
    }
}

#[derive(Serialize, Debug)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

#[derive(Serialize, Debug)]
pub struct ResponseData {
    pub content: String,
    pub flags: u64,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self {
            kind: PONG,
            data: None,
        }
    }

    /// A reply only the clicking member sees.
    pub fn ephemeral(content: impl Into<String>) -> Self {
        Self {
            kind: CHANNEL_MESSAGE_WITH_SOURCE,
            data: Some(ResponseData {
                content: content.into(),
                flags: EPHEMERAL,
            }),
        }
    }
}
