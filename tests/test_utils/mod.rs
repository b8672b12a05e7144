//! Test utilities for integration tests
#![allow(dead_code)]

use std::collections::HashSet;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::{Router, body::Body, http::Request};
use ed25519_dalek::{Signer, SigningKey};
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use rollcall::api::routes::discord::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use rollcall::api::{AppState, app};
use rollcall::core::db::{async_db, initialize_db};
use rollcall::core::{AppConfig, AppContext, FixedClock};
use rollcall::events::models::{ChannelId, MessageId, ThreadId, UserId};
use rollcall::events::{EventParams, Recurrence};
use rollcall::messaging::{MessageBody, Messenger};

pub const CHANNEL: ChannelId = 100;

/// Every call the bot made to the chat platform, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Announcement {
        channel: ChannelId,
        message: MessageId,
        body: MessageBody,
    },
    Thread {
        message: MessageId,
        thread: ThreadId,
        name: String,
    },
    Edit {
        message: MessageId,
        body: MessageBody,
    },
    DeleteMessage(MessageId),
    AddToThread {
        thread: ThreadId,
        user: UserId,
    },
    RemoveFromThread {
        thread: ThreadId,
        user: UserId,
    },
    DeleteThread(ThreadId),
    ArchiveThread(ThreadId),
    Send {
        channel: ChannelId,
        content: String,
    },
    DirectMessage {
        user: UserId,
        content: String,
    },
    Purge {
        channel: ChannelId,
        except: Vec<MessageId>,
    },
}

/// In-memory stand-in for Discord. Ids are handed out sequentially and
/// any operation can be made to fail by name.
pub struct RecordingMessenger {
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
    failing: Mutex<HashSet<&'static str>>,
    dms_disabled: Mutex<HashSet<UserId>>,
}

impl Default for RecordingMessenger {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1000),
            failing: Mutex::new(HashSet::new()),
            dms_disabled: Mutex::new(HashSet::new()),
        }
    }
}

impl RecordingMessenger {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        self.failing.lock().unwrap().remove(operation);
    }

    pub fn disable_dms(&self, user: UserId) {
        self.dms_disabled.lock().unwrap().insert(user);
    }

    pub fn set_next_id(&self, id: u64) {
        self.next_id.store(id, Ordering::SeqCst);
    }

    pub fn direct_messages(&self) -> Vec<UserId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::DirectMessage { user, .. } => Some(user),
                _ => None,
            })
            .collect()
    }

    pub fn sent_to(&self, channel: ChannelId) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send { channel: c, content } if c == channel => Some(content),
                _ => None,
            })
            .collect()
    }

    pub fn announcements(&self) -> Vec<MessageId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Announcement { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        if self.failing.lock().unwrap().contains(operation) {
            return Err(anyhow!("{} is unavailable", operation));
        }
        Ok(())
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn post_announcement(&self, channel: ChannelId, body: &MessageBody) -> Result<MessageId> {
        self.check("post_announcement")?;
        let message = self.id();
        self.record(Call::Announcement {
            channel,
            message,
            body: body.clone(),
        });
        Ok(message)
    }

    async fn create_discussion_thread(
        &self,
        _channel: ChannelId,
        message: MessageId,
        name: &str,
    ) -> Result<ThreadId> {
        self.check("create_discussion_thread")?;
        let thread = self.id();
        self.record(Call::Thread {
            message,
            thread,
            name: name.to_string(),
        });
        Ok(thread)
    }

    async fn edit_message(
        &self,
        _channel: ChannelId,
        message: MessageId,
        body: &MessageBody,
    ) -> Result<()> {
        self.check("edit_message")?;
        self.record(Call::Edit {
            message,
            body: body.clone(),
        });
        Ok(())
    }

    async fn delete_message(&self, _channel: ChannelId, message: MessageId) -> Result<()> {
        self.check("delete_message")?;
        self.record(Call::DeleteMessage(message));
        Ok(())
    }

    async fn add_user_to_thread(&self, thread: ThreadId, user: UserId) -> Result<()> {
        self.check("add_user_to_thread")?;
        self.record(Call::AddToThread { thread, user });
        Ok(())
    }

    async fn remove_user_from_thread(&self, thread: ThreadId, user: UserId) -> Result<()> {
        self.check("remove_user_from_thread")?;
        self.record(Call::RemoveFromThread { thread, user });
        Ok(())
    }

    async fn delete_thread(&self, thread: ThreadId) -> Result<()> {
        self.check("delete_thread")?;
        self.record(Call::DeleteThread(thread));
        Ok(())
    }

    async fn archive_thread(&self, thread: ThreadId) -> Result<()> {
        self.check("archive_thread")?;
        self.record(Call::ArchiveThread(thread));
        Ok(())
    }

    async fn send_to_channel(&self, channel: ChannelId, content: &str) -> Result<MessageId> {
        self.check("send_to_channel")?;
        self.record(Call::Send {
            channel,
            content: content.to_string(),
        });
        Ok(self.id())
    }

    async fn send_direct_message(&self, user: UserId, content: &str) -> Result<()> {
        self.check("send_direct_message")?;
        if self.dms_disabled.lock().unwrap().contains(&user) {
            return Err(anyhow!("Cannot send messages to this user"));
        }
        self.record(Call::DirectMessage {
            user,
            content: content.to_string(),
        });
        Ok(())
    }

    async fn purge_bot_messages(
        &self,
        channel: ChannelId,
        _limit: usize,
        except: &[MessageId],
    ) -> Result<usize> {
        self.check("purge_bot_messages")?;
        self.record(Call::Purge {
            channel,
            except: except.to_vec(),
        });
        Ok(0)
    }

    async fn resolve_role_mentions(&self, _channel: ChannelId, target_group: &str) -> Result<String> {
        self.check("resolve_role_mentions")?;
        Ok(target_group
            .split_whitespace()
            .map(|name| format!("<@&{}>", name.trim_start_matches('@')))
            .collect::<Vec<_>>()
            .join(" "))
    }
}

pub struct TestContext {
    pub ctx: AppContext,
    pub clock: FixedClock,
    pub messenger: Arc<RecordingMessenger>,
    // Removed on drop
    _dir: TempDir,
}

/// A context backed by a fresh SQLite file in a temporary directory, a
/// clock pinned at `now` and a recording messenger.
pub async fn test_context(now: DateTime<Utc>) -> TestContext {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_path = dir.path().join("db");
    fs::create_dir_all(&db_path).expect("Failed to create db directory");
    let db_path = db_path.to_str().unwrap().to_string();

    let db = async_db(&db_path)
        .await
        .expect("Failed to connect to async db");
    db.call(|conn| {
        initialize_db(conn).expect("Failed to initialize db");
        Ok(())
    })
    .await
    .unwrap();

    let config = AppConfig {
        storage_path: dir.path().display().to_string(),
        db_path,
        discord_public_key: hex::encode(signing_key().verifying_key().to_bytes()),
        ..Default::default()
    };
    let clock = FixedClock::new(now);
    let messenger = Arc::new(RecordingMessenger::default());
    let ctx = AppContext::new(db, Arc::new(clock.clone()), messenger.clone(), config);

    TestContext {
        ctx,
        clock,
        messenger,
        _dir: dir,
    }
}

/// Creates a test application router on top of a test context.
pub async fn test_app(now: DateTime<Utc>) -> (Router, TestContext) {
    let test = test_context(now).await;
    let router = app(Arc::new(AppState::new(test.ctx.clone()).unwrap()));
    (router, test)
}

/// Stands in for the Discord application's key pair.
pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

/// An interaction request signed the way Discord signs them.
pub fn signed_interaction(payload: &serde_json::Value) -> Request<Body> {
    let body = payload.to_string();
    let timestamp = "1741600000";
    let signature = signing_key().sign(format!("{}{}", timestamp, body).as_bytes());
    Request::builder()
        .method("POST")
        .uri("/api/discord/interactions")
        .header("Content-Type", "application/json")
        .header(SIGNATURE_HEADER, hex::encode(signature.to_bytes()))
        .header(TIMESTAMP_HEADER, timestamp)
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// A wall clock reading in Paris as a UTC instant.
pub fn paris(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    chrono_tz::Europe::Paris
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn event_params(date: &str, time: &str, recurrence: Recurrence) -> EventParams {
    let mut params = EventParams::parse(CHANNEL, date, time, "Gymnase Jean Moulin").unwrap();
    params.recurrence = recurrence;
    params
}
