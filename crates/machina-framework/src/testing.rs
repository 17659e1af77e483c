//! Test doubles for the external collaborators.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Value, json};

use machina_core::{
    Acknowledgement, ApiResult, SendOptions, SlackClient, SocketConnection, TransportResult,
};

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCall {
    Send {
        channel: String,
        text: String,
        options: SendOptions,
    },
    SendScheduled {
        post_at: DateTime<Utc>,
        channel: String,
        text: String,
    },
    SendDm {
        user_id: String,
        text: String,
    },
    React {
        channel: String,
        ts: String,
        emoji: String,
    },
    Update {
        channel: String,
        ts: String,
        text: String,
    },
    Delete {
        channel: String,
        ts: String,
    },
    OpenModal {
        trigger_id: String,
    },
    PushModal {
        trigger_id: String,
    },
    UpdateModal {
        view_id: String,
    },
    PublishHomeTab {
        user_id: String,
    },
}

/// A client recording every call and answering `{"ok": true}`.
#[derive(Debug, Default)]
pub struct RecordingClient {
    calls: Mutex<Vec<ClientCall>>,
}

impl RecordingClient {
    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: ClientCall) -> ApiResult<Value> {
        self.calls.lock().push(call);
        Ok(json!({ "ok": true }))
    }
}

#[async_trait]
impl SlackClient for RecordingClient {
    async fn send(&self, channel: &str, text: &str, options: SendOptions) -> ApiResult<Value> {
        self.record(ClientCall::Send {
            channel: channel.into(),
            text: text.into(),
            options,
        })
    }

    async fn send_scheduled(
        &self,
        post_at: DateTime<Utc>,
        channel: &str,
        text: &str,
        _options: SendOptions,
    ) -> ApiResult<Value> {
        self.record(ClientCall::SendScheduled {
            post_at,
            channel: channel.into(),
            text: text.into(),
        })
    }

    async fn send_dm(&self, user_id: &str, text: &str, _options: SendOptions) -> ApiResult<Value> {
        self.record(ClientCall::SendDm {
            user_id: user_id.into(),
            text: text.into(),
        })
    }

    async fn react(&self, channel: &str, ts: &str, emoji: &str) -> ApiResult<Value> {
        self.record(ClientCall::React {
            channel: channel.into(),
            ts: ts.into(),
            emoji: emoji.into(),
        })
    }

    async fn update(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
        _options: SendOptions,
    ) -> ApiResult<Value> {
        self.record(ClientCall::Update {
            channel: channel.into(),
            ts: ts.into(),
            text: text.into(),
        })
    }

    async fn delete(&self, channel: &str, ts: &str) -> ApiResult<Value> {
        self.record(ClientCall::Delete {
            channel: channel.into(),
            ts: ts.into(),
        })
    }

    async fn open_modal(&self, trigger_id: &str, _view: Value) -> ApiResult<Value> {
        self.record(ClientCall::OpenModal {
            trigger_id: trigger_id.into(),
        })
    }

    async fn push_modal(&self, trigger_id: &str, _view: Value) -> ApiResult<Value> {
        self.record(ClientCall::PushModal {
            trigger_id: trigger_id.into(),
        })
    }

    async fn update_modal(
        &self,
        view_id: &str,
        _view: Value,
        _hash: Option<&str>,
    ) -> ApiResult<Value> {
        self.record(ClientCall::UpdateModal {
            view_id: view_id.into(),
        })
    }

    async fn publish_home_tab(&self, user_id: &str, _view: Value) -> ApiResult<Value> {
        self.record(ClientCall::PublishHomeTab {
            user_id: user_id.into(),
        })
    }
}

/// A connection recording acknowledgements.
#[derive(Debug, Default)]
pub struct RecordingConnection {
    acks: Mutex<Vec<Acknowledgement>>,
}

impl RecordingConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn acks(&self) -> Vec<Acknowledgement> {
        self.acks.lock().clone()
    }
}

#[async_trait]
impl SocketConnection for RecordingConnection {
    async fn acknowledge(&self, ack: Acknowledgement) -> TransportResult<()> {
        self.acks.lock().push(ack);
        Ok(())
    }
}
