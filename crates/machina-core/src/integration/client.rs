//! The outbound messaging contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::ApiResult;

/// Optional parameters of a message send.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendOptions {
    /// Reply inside this thread.
    pub thread_ts: Option<String>,
    /// Send as an ephemeral message visible to this user only.
    pub ephemeral_user: Option<String>,
    pub blocks: Option<Value>,
    pub attachments: Option<Value>,
    /// Also post a thread reply to the channel.
    pub broadcast: bool,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_thread(mut self, thread_ts: impl Into<String>) -> Self {
        self.thread_ts = Some(thread_ts.into());
        self
    }

    pub fn ephemeral_to(mut self, user_id: impl Into<String>) -> Self {
        self.ephemeral_user = Some(user_id.into());
        self
    }

    pub fn with_blocks(mut self, blocks: Value) -> Self {
        self.blocks = Some(blocks);
        self
    }

    pub fn with_attachments(mut self, attachments: Value) -> Self {
        self.attachments = Some(attachments);
        self
    }

    pub fn broadcast(mut self) -> Self {
        self.broadcast = true;
        self
    }
}

/// Client for the platform's web API.
///
/// Every call returns the platform's JSON response.
#[async_trait]
pub trait SlackClient: Send + Sync {
    async fn send(&self, channel: &str, text: &str, options: SendOptions) -> ApiResult<Value>;

    /// Schedules a message for delivery at `post_at`.
    async fn send_scheduled(
        &self,
        post_at: DateTime<Utc>,
        channel: &str,
        text: &str,
        options: SendOptions,
    ) -> ApiResult<Value>;

    /// Sends a direct message, opening the conversation if needed.
    async fn send_dm(&self, user_id: &str, text: &str, options: SendOptions) -> ApiResult<Value>;

    async fn react(&self, channel: &str, ts: &str, emoji: &str) -> ApiResult<Value>;

    async fn update(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
        options: SendOptions,
    ) -> ApiResult<Value>;

    async fn delete(&self, channel: &str, ts: &str) -> ApiResult<Value>;

    async fn open_modal(&self, trigger_id: &str, view: Value) -> ApiResult<Value>;

    async fn push_modal(&self, trigger_id: &str, view: Value) -> ApiResult<Value>;

    async fn update_modal(&self, view_id: &str, view: Value, hash: Option<&str>)
    -> ApiResult<Value>;

    async fn publish_home_tab(&self, user_id: &str, view: Value) -> ApiResult<Value>;
}
