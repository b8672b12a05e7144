//! Messenger backed by the Discord REST API.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::OnceCell;

use super::{MessageBody, Messenger};
use crate::events::models::{ChannelId, MessageId, ThreadId, UserId};

/// Thread auto-archive after a day of inactivity.
const THREAD_AUTO_ARCHIVE_MINUTES: u32 = 1440;
/// Discord caps message history pages at 100.
const MAX_HISTORY_PAGE: usize = 100;

#[derive(Deserialize)]
struct Snowflake {
    id: String,
}

#[derive(Deserialize)]
struct DiscordMessage {
    id: String,
    author: Snowflake,
}

#[derive(Deserialize)]
struct DiscordChannel {
    guild_id: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DiscordRole {
    pub id: String,
    pub name: String,
}

fn parse_id(raw: &str) -> Result<u64> {
    raw.parse()
        .with_context(|| format!("Invalid snowflake {:?}", raw))
}

fn rsvp_components() -> Value {
    json!([{
        "type": 1,
        "components": [
            {"type": 2, "style": 3, "label": "✅ Je viens", "custom_id": "rsvp:coming"},
            {"type": 2, "style": 1, "label": "❓ Je ne sais pas", "custom_id": "rsvp:maybe"},
            {"type": 2, "style": 4, "label": "❌ Je ne viens pas", "custom_id": "rsvp:not_coming"}
        ]
    }])
}

fn message_payload(body: &MessageBody) -> Value {
    let components = if body.rsvp_buttons {
        rsvp_components()
    } else {
        json!([])
    };
    json!({
        "content": body.content,
        "components": components,
        "allowed_mentions": {"parse": ["roles", "users"]},
    })
}

/// Replace each word of `target_group` that names a role with that role's
/// mention. Words that already are mentions or match nothing are kept.
pub fn mention_roles(target_group: &str, roles: &[DiscordRole]) -> String {
    target_group
        .split_whitespace()
        .map(|word| {
            if word.starts_with("<@&") {
                return word.to_string();
            }
            let name = word.trim_start_matches('@');
            match roles.iter().find(|r| r.name == name) {
                Some(role) => format!("<@&{}>", role.id),
                None => {
                    tracing::warn!("Role {:?} not found on the server", word);
                    word.to_string()
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct DiscordClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    bot_user_id: OnceCell<UserId>,
}

impl DiscordClient {
    pub fn new(api_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("DiscordBot (rollcall, ", env!("CARGO_PKG_VERSION"), ")"))
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            bot_user_id: OnceCell::new(),
        })
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.api_url, path);
        let mut req = self
            .http
            .request(method.clone(), &url)
            .header("Authorization", format!("Bot {}", self.token));
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("{} {}", method, path))?;
        Ok(resp)
    }

    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<reqwest::Response> {
        let resp = self.send(method.clone(), path, body).await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("{} {} returned {}: {}", method, path, status, text);
        }
        Ok(resp)
    }

    async fn bot_user_id(&self) -> Result<UserId> {
        let id = self
            .bot_user_id
            .get_or_try_init(|| async {
                let me: Snowflake = self
                    .call(Method::GET, "/users/@me", None)
                    .await?
                    .json()
                    .await?;
                parse_id(&me.id)
            })
            .await?;
        Ok(*id)
    }

    async fn post_message(&self, channel_id: ChannelId, body: &MessageBody) -> Result<MessageId> {
        let msg: Snowflake = self
            .call(
                Method::POST,
                &format!("/channels/{}/messages", channel_id),
                Some(message_payload(body)),
            )
            .await?
            .json()
            .await?;
        parse_id(&msg.id)
    }
}

#[async_trait]
impl Messenger for DiscordClient {
    async fn post_announcement(
        &self,
        channel_id: ChannelId,
        body: &MessageBody,
    ) -> Result<MessageId> {
        self.post_message(channel_id, body).await
    }

    async fn create_discussion_thread(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        name: &str,
    ) -> Result<ThreadId> {
        let thread: Snowflake = self
            .call(
                Method::POST,
                &format!("/channels/{}/messages/{}/threads", channel_id, message_id),
                Some(json!({
                    "name": name,
                    "auto_archive_duration": THREAD_AUTO_ARCHIVE_MINUTES,
                })),
            )
            .await?
            .json()
            .await?;
        parse_id(&thread.id)
    }

    async fn edit_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        body: &MessageBody,
    ) -> Result<()> {
        self.call(
            Method::PATCH,
            &format!("/channels/{}/messages/{}", channel_id, message_id),
            Some(message_payload(body)),
        )
        .await?;
        Ok(())
    }

    async fn delete_message(&self, channel_id: ChannelId, message_id: MessageId) -> Result<()> {
        self.call(
            Method::DELETE,
            &format!("/channels/{}/messages/{}", channel_id, message_id),
            None,
        )
        .await?;
        Ok(())
    }

    async fn add_user_to_thread(&self, thread_id: ThreadId, user_id: UserId) -> Result<()> {
        self.call(
            Method::PUT,
            &format!("/channels/{}/thread-members/{}", thread_id, user_id),
            None,
        )
        .await?;
        Ok(())
    }

    async fn remove_user_from_thread(&self, thread_id: ThreadId, user_id: UserId) -> Result<()> {
        self.call(
            Method::DELETE,
            &format!("/channels/{}/thread-members/{}", thread_id, user_id),
            None,
        )
        .await?;
        Ok(())
    }

    async fn delete_thread(&self, thread_id: ThreadId) -> Result<()> {
        let path = format!("/channels/{}", thread_id);
        let resp = self.send(Method::DELETE, &path, None).await?;
        match resp.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                tracing::debug!("Thread {} already deleted", thread_id);
                Ok(())
            }
            status => {
                let text = resp.text().await.unwrap_or_default();
                bail!("DELETE {} returned {}: {}", path, status, text)
            }
        }
    }

    async fn archive_thread(&self, thread_id: ThreadId) -> Result<()> {
        self.call(
            Method::PATCH,
            &format!("/channels/{}", thread_id),
            Some(json!({"archived": true})),
        )
        .await?;
        Ok(())
    }

    async fn send_to_channel(&self, channel_id: ChannelId, content: &str) -> Result<MessageId> {
        self.post_message(channel_id, &MessageBody::plain(content))
            .await
    }

    async fn send_direct_message(&self, user_id: UserId, content: &str) -> Result<()> {
        let dm: Snowflake = self
            .call(
                Method::POST,
                "/users/@me/channels",
                Some(json!({"recipient_id": user_id.to_string()})),
            )
            .await?
            .json()
            .await?;
        let dm_channel = parse_id(&dm.id)?;
        self.post_message(dm_channel, &MessageBody::plain(content))
            .await?;
        Ok(())
    }

    async fn purge_bot_messages(
        &self,
        channel_id: ChannelId,
        limit: usize,
        except: &[MessageId],
    ) -> Result<usize> {
        let bot_id = self.bot_user_id().await?;
        let page = limit.clamp(1, MAX_HISTORY_PAGE);
        let messages: Vec<DiscordMessage> = self
            .call(
                Method::GET,
                &format!("/channels/{}/messages?limit={}", channel_id, page),
                None,
            )
            .await?
            .json()
            .await?;

        let mut deleted = 0;
        for msg in messages {
            let (Ok(id), Ok(author)) = (parse_id(&msg.id), parse_id(&msg.author.id)) else {
                continue;
            };
            if author != bot_id || except.contains(&id) {
                continue;
            }
            match self.delete_message(channel_id, id).await {
                Ok(()) => deleted += 1,
                Err(e) => tracing::warn!("Failed to purge message {}: {:#}", id, e),
            }
        }
        Ok(deleted)
    }

    async fn resolve_role_mentions(
        &self,
        channel_id: ChannelId,
        target_group: &str,
    ) -> Result<String> {
        let channel: DiscordChannel = self
            .call(Method::GET, &format!("/channels/{}", channel_id), None)
            .await?
            .json()
            .await?;
        let Some(guild_id) = channel.guild_id else {
            return Ok(target_group.to_string());
        };
        let roles: Vec<DiscordRole> = self
            .call(Method::GET, &format!("/guilds/{}/roles", guild_id), None)
            .await?
            .json()
            .await?;
        Ok(mention_roles(target_group, &roles))
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    fn client(url: &str) -> DiscordClient {
        DiscordClient::new(url, "test-token", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn it_posts_announcements_with_rsvp_buttons() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/channels/100/messages")
            .match_header("authorization", "Bot test-token")
            .match_body(Matcher::PartialJson(json!({"content": "hello"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "123456789012345678", "channel_id": "100"}"#)
            .create_async()
            .await;

        let id = client(&server.url())
            .post_announcement(100, &MessageBody::with_buttons("hello"))
            .await
            .unwrap();

        assert_eq!(id, 123456789012345678);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn it_reports_api_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/channels/100/messages/5/threads")
            .with_status(403)
            .with_body(r#"{"message": "Missing Permissions", "code": 50013}"#)
            .create_async()
            .await;

        let err = client(&server.url())
            .create_discussion_thread(100, 5, "thread")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn deleting_a_missing_thread_is_not_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("DELETE", "/channels/77")
            .with_status(404)
            .with_body(r#"{"message": "Unknown Channel", "code": 10003}"#)
            .create_async()
            .await;

        assert!(client(&server.url()).delete_thread(77).await.is_ok());
    }

    #[tokio::test]
    async fn it_opens_a_dm_channel_before_messaging() {
        let mut server = mockito::Server::new_async().await;
        let open = server
            .mock("POST", "/users/@me/channels")
            .match_body(Matcher::Json(json!({"recipient_id": "42"})))
            .with_status(200)
            .with_body(r#"{"id": "900"}"#)
            .create_async()
            .await;
        let send = server
            .mock("POST", "/channels/900/messages")
            .with_status(200)
            .with_body(r#"{"id": "901"}"#)
            .create_async()
            .await;

        client(&server.url())
            .send_direct_message(42, "see you soon")
            .await
            .unwrap();

        open.assert_async().await;
        send.assert_async().await;
    }

    #[tokio::test]
    async fn purge_only_deletes_the_bots_own_untracked_messages() {
        let mut server = mockito::Server::new_async().await;
        let _me = server
            .mock("GET", "/users/@me")
            .with_status(200)
            .with_body(r#"{"id": "1", "username": "rollcall"}"#)
            .create_async()
            .await;
        let _history = server
            .mock("GET", "/channels/100/messages")
            .match_query(Matcher::UrlEncoded("limit".into(), "100".into()))
            .with_status(200)
            .with_body(
                r#"[
                    {"id": "10", "author": {"id": "1"}},
                    {"id": "11", "author": {"id": "2"}},
                    {"id": "12", "author": {"id": "1"}}
                ]"#,
            )
            .create_async()
            .await;
        let delete_10 = server
            .mock("DELETE", "/channels/100/messages/10")
            .with_status(204)
            .create_async()
            .await;
        let delete_11 = server
            .mock("DELETE", "/channels/100/messages/11")
            .expect(0)
            .create_async()
            .await;
        let delete_12 = server
            .mock("DELETE", "/channels/100/messages/12")
            .expect(0)
            .create_async()
            .await;

        let deleted = client(&server.url())
            .purge_bot_messages(100, 100, &[12])
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        delete_10.assert_async().await;
        delete_11.assert_async().await;
        delete_12.assert_async().await;
    }

    #[test]
    fn it_maps_role_names_to_mentions() {
        let roles = vec![
            DiscordRole {
                id: "500".to_string(),
                name: "Membres".to_string(),
            },
            DiscordRole {
                id: "501".to_string(),
                name: "EquipeA".to_string(),
            },
        ];
        assert_eq!(
            mention_roles("@Membres EquipeA <@&777> @Inconnu", &roles),
            "<@&500> <@&501> <@&777> @Inconnu"
        );
    }
}
