//! Handler contexts.
//!
//! Each handler category receives its own context type, built fresh for every
//! invocation:
//!
//! - [`Message`] for `listen_to` / `respond_to` handlers
//! - [`RawEvent`] for `process` handlers
//! - [`Command`] for slash commands
//! - [`BlockAction`] for block actions, one per triggered action
//! - [`ModalSubmission`] and [`ModalClosure`] for the view lifecycle
//!
//! Every context carries a [`ScopedLogger`] bound to the invoked handler and
//! the user who triggered it, and a handle to the outbound [`SlackClient`].
//!
//! Streaming handlers (commands and modal submissions declared with
//! `.streaming()`) hold an acknowledgement slot: the first call to
//! `acknowledge` supplies the payload of the envelope acknowledgement, after
//! which the handler keeps running.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{Span, debug, error, info, info_span, warn};

use machina_core::payload::{Action, BlockActionsPayload, StateValue, User, View};
use machina_core::{
    AckPayload, ApiError, ApiResult, MessageEvent, SendOptions, SlackClient, SlashCommand,
    ViewClosedPayload, ViewSubmissionPayload, event_type,
};

// =============================================================================
// ScopedLogger
// =============================================================================

/// A logger bound to one handler invocation.
///
/// The underlying span carries the plugin, the handler and the triggering
/// user; the handler future itself runs inside it, so plain `tracing` macros
/// called from a handler are attributed as well.
#[derive(Debug, Clone)]
pub struct ScopedLogger {
    span: Span,
}

impl ScopedLogger {
    pub(crate) fn new(
        plugin: &str,
        handler: &str,
        user_id: Option<&str>,
        user_name: Option<&str>,
    ) -> Self {
        Self {
            span: info_span!(
                "handler",
                plugin = %plugin,
                handler = %handler,
                user_id = user_id.unwrap_or("-"),
                user_name = user_name.unwrap_or("-"),
            ),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn debug(&self, message: impl fmt::Display) {
        self.span.in_scope(|| debug!("{message}"));
    }

    pub fn info(&self, message: impl fmt::Display) {
        self.span.in_scope(|| info!("{message}"));
    }

    pub fn warn(&self, message: impl fmt::Display) {
        self.span.in_scope(|| warn!("{message}"));
    }

    pub fn error(&self, message: impl fmt::Display) {
        self.span.in_scope(|| error!("{message}"));
    }
}

// =============================================================================
// AckSlot
// =============================================================================

/// One-shot slot carrying the payload of a streaming acknowledgement.
///
/// Clones share the slot: the first send wins.
#[derive(Clone, Default)]
pub(crate) struct AckSlot(Option<Arc<Mutex<Option<oneshot::Sender<AckPayload>>>>>);

impl AckSlot {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<AckPayload>) {
        let (tx, rx) = oneshot::channel();
        (Self(Some(Arc::new(Mutex::new(Some(tx))))), rx)
    }

    /// A slot for handlers that do not stream.
    pub(crate) fn none() -> Self {
        Self(None)
    }

    fn send(&self, payload: AckPayload, logger: &ScopedLogger) -> bool {
        let Some(slot) = &self.0 else {
            logger.warn("Handler is not streaming; acknowledgement payload discarded");
            return false;
        };
        let Some(sender) = slot.lock().take() else {
            logger.warn("Request already acknowledged; acknowledgement payload discarded");
            return false;
        };
        sender.send(payload).is_ok()
    }
}

// =============================================================================
// Message
// =============================================================================

/// Context of a message handler.
pub struct Message {
    client: Arc<dyn SlackClient>,
    event: Arc<MessageEvent>,
    text: String,
    captures: HashMap<String, String>,
    logger: ScopedLogger,
}

impl Message {
    pub(crate) fn new(
        client: Arc<dyn SlackClient>,
        event: Arc<MessageEvent>,
        text: String,
        captures: HashMap<String, String>,
        logger: ScopedLogger,
    ) -> Self {
        Self {
            client,
            event,
            text,
            captures,
            logger,
        }
    }

    /// The message text, with the bot-addressing prefix removed.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The event as received (after edit normalisation).
    pub fn event(&self) -> &MessageEvent {
        &self.event
    }

    pub fn user_id(&self) -> &str {
        self.event.user.as_deref().unwrap_or_default()
    }

    pub fn channel(&self) -> &str {
        self.event.channel.as_deref().unwrap_or_default()
    }

    pub fn ts(&self) -> Option<&str> {
        self.event.ts.as_deref()
    }

    /// Whether the message was posted outside a channel or private group.
    pub fn is_dm(&self) -> bool {
        !self.event.channel_type.requires_mention()
    }

    pub fn is_edit(&self) -> bool {
        self.event.is_edit()
    }

    /// Named capture groups of the pattern that selected this handler.
    pub fn captures(&self) -> &HashMap<String, String> {
        &self.captures
    }

    pub fn capture(&self, name: &str) -> Option<&str> {
        self.captures.get(name).map(String::as_str)
    }

    /// Mention markup for the sender.
    pub fn at_sender(&self) -> String {
        format!("<@{}>", self.user_id())
    }

    pub fn logger(&self) -> &ScopedLogger {
        &self.logger
    }

    pub fn client(&self) -> &Arc<dyn SlackClient> {
        &self.client
    }

    /// Sends a message to the channel the message came from.
    pub async fn say(&self, text: &str) -> ApiResult<Value> {
        self.say_with(text, SendOptions::new()).await
    }

    pub async fn say_with(&self, text: &str, options: SendOptions) -> ApiResult<Value> {
        self.client.send(self.channel(), text, options).await
    }

    /// Replies in the message's thread, starting one if needed.
    pub async fn say_in_thread(&self, text: &str) -> ApiResult<Value> {
        let mut options = SendOptions::new();
        if let Some(root) = self.event.thread_root() {
            options = options.in_thread(root);
        }
        self.say_with(text, options).await
    }

    /// Sends a message only the sender can see.
    pub async fn say_ephemeral(&self, text: &str) -> ApiResult<Value> {
        self.say_with(text, SendOptions::new().ephemeral_to(self.user_id()))
            .await
    }

    /// Schedules a message to the channel.
    pub async fn say_scheduled(&self, post_at: DateTime<Utc>, text: &str) -> ApiResult<Value> {
        self.client
            .send_scheduled(post_at, self.channel(), text, SendOptions::new())
            .await
    }

    /// Answers the sender, mentioning them unless the conversation is direct.
    pub async fn reply(&self, text: &str) -> ApiResult<Value> {
        let text = if self.is_dm() {
            text.to_owned()
        } else {
            format!("{}: {}", self.at_sender(), text)
        };
        self.say(&text).await
    }

    pub async fn reply_dm(&self, text: &str) -> ApiResult<Value> {
        self.client
            .send_dm(self.user_id(), text, SendOptions::new())
            .await
    }

    pub async fn react(&self, emoji: &str) -> ApiResult<Value> {
        let ts = self
            .ts()
            .ok_or_else(|| ApiError::InvalidRequest("message has no timestamp".into()))?;
        self.client.react(self.channel(), ts, emoji).await
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("text", &self.text)
            .field("user", &self.event.user)
            .field("channel", &self.event.channel)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// RawEvent
// =============================================================================

/// Context of a `process` handler: the event object as received.
pub struct RawEvent {
    client: Arc<dyn SlackClient>,
    event: Arc<Value>,
    logger: ScopedLogger,
}

impl RawEvent {
    pub(crate) fn new(client: Arc<dyn SlackClient>, event: Arc<Value>, logger: ScopedLogger) -> Self {
        Self {
            client,
            event,
            logger,
        }
    }

    pub fn event_type(&self) -> &str {
        event_type(&self.event).unwrap_or_default()
    }

    pub fn data(&self) -> &Value {
        &self.event
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.event.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn logger(&self) -> &ScopedLogger {
        &self.logger
    }

    pub fn client(&self) -> &Arc<dyn SlackClient> {
        &self.client
    }
}

impl fmt::Debug for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawEvent")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Command
// =============================================================================

/// Context of a slash-command handler.
pub struct Command {
    client: Arc<dyn SlackClient>,
    command: SlashCommand,
    ack: AckSlot,
    logger: ScopedLogger,
}

impl Command {
    pub(crate) fn new(
        client: Arc<dyn SlackClient>,
        command: SlashCommand,
        ack: AckSlot,
        logger: ScopedLogger,
    ) -> Self {
        Self {
            client,
            command,
            ack,
            logger,
        }
    }

    /// The command, including its leading slash.
    pub fn command(&self) -> &str {
        &self.command.command
    }

    /// Everything typed after the command.
    pub fn text(&self) -> &str {
        &self.command.text
    }

    pub fn user_id(&self) -> &str {
        &self.command.user_id
    }

    pub fn user_name(&self) -> &str {
        &self.command.user_name
    }

    pub fn channel_id(&self) -> &str {
        &self.command.channel_id
    }

    pub fn trigger_id(&self) -> &str {
        &self.command.trigger_id
    }

    pub fn response_url(&self) -> &str {
        &self.command.response_url
    }

    pub fn raw(&self) -> &SlashCommand {
        &self.command
    }

    pub fn logger(&self) -> &ScopedLogger {
        &self.logger
    }

    pub fn client(&self) -> &Arc<dyn SlackClient> {
        &self.client
    }

    /// Supplies the payload of the acknowledgement.
    ///
    /// Only streaming handlers can acknowledge, and only once. Returns whether
    /// the payload was accepted.
    pub fn acknowledge(&self, payload: impl Into<AckPayload>) -> bool {
        self.ack.send(payload.into(), &self.logger)
    }

    pub async fn say(&self, text: &str) -> ApiResult<Value> {
        self.client
            .send(self.channel_id(), text, SendOptions::new())
            .await
    }

    pub async fn say_ephemeral(&self, text: &str) -> ApiResult<Value> {
        self.client
            .send(
                self.channel_id(),
                text,
                SendOptions::new().ephemeral_to(self.user_id()),
            )
            .await
    }

    pub async fn open_modal(&self, view: Value) -> ApiResult<Value> {
        self.client.open_modal(self.trigger_id(), view).await
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("command", &self.command)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// BlockAction
// =============================================================================

/// Context of a block-action handler, for one triggered action.
pub struct BlockAction {
    client: Arc<dyn SlackClient>,
    payload: Arc<BlockActionsPayload>,
    action: Action,
    logger: ScopedLogger,
}

impl BlockAction {
    pub(crate) fn new(
        client: Arc<dyn SlackClient>,
        payload: Arc<BlockActionsPayload>,
        action: Action,
        logger: ScopedLogger,
    ) -> Self {
        Self {
            client,
            payload,
            action,
            logger,
        }
    }

    /// The action that selected this handler.
    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn payload(&self) -> &BlockActionsPayload {
        &self.payload
    }

    pub fn user(&self) -> &User {
        &self.payload.user
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.payload.channel_id()
    }

    pub fn trigger_id(&self) -> Option<&str> {
        self.payload.trigger_id.as_deref()
    }

    pub fn response_url(&self) -> Option<&str> {
        self.payload.response_url.as_deref()
    }

    pub fn view(&self) -> Option<&View> {
        self.payload.view.as_ref()
    }

    pub fn state_value(&self, block_id: &str, action_id: &str) -> Option<&StateValue> {
        self.payload.state_value(block_id, action_id)
    }

    pub fn logger(&self) -> &ScopedLogger {
        &self.logger
    }

    pub fn client(&self) -> &Arc<dyn SlackClient> {
        &self.client
    }

    /// Sends a message to the channel of the interaction.
    pub async fn say(&self, text: &str) -> ApiResult<Value> {
        let channel = self
            .channel_id()
            .ok_or_else(|| ApiError::InvalidRequest("interaction has no channel".into()))?;
        self.client.send(channel, text, SendOptions::new()).await
    }

    pub async fn send_dm(&self, text: &str) -> ApiResult<Value> {
        self.client
            .send_dm(&self.payload.user.id, text, SendOptions::new())
            .await
    }

    pub async fn open_modal(&self, view: Value) -> ApiResult<Value> {
        let trigger_id = self
            .trigger_id()
            .ok_or_else(|| ApiError::InvalidRequest("interaction has no trigger_id".into()))?;
        self.client.open_modal(trigger_id, view).await
    }

    pub async fn push_modal(&self, view: Value) -> ApiResult<Value> {
        let trigger_id = self
            .trigger_id()
            .ok_or_else(|| ApiError::InvalidRequest("interaction has no trigger_id".into()))?;
        self.client.push_modal(trigger_id, view).await
    }

    /// Replaces the view the action happened in.
    pub async fn update_modal(&self, view: Value) -> ApiResult<Value> {
        let current = self
            .view()
            .ok_or_else(|| ApiError::InvalidRequest("interaction has no view".into()))?;
        self.client
            .update_modal(&current.id, view, current.hash.as_deref())
            .await
    }
}

impl fmt::Debug for BlockAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockAction")
            .field("action", &self.action)
            .field("user", &self.payload.user.id)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// ModalSubmission / ModalClosure
// =============================================================================

/// Context of a modal-submission handler.
pub struct ModalSubmission {
    client: Arc<dyn SlackClient>,
    payload: Arc<ViewSubmissionPayload>,
    ack: AckSlot,
    logger: ScopedLogger,
}

impl ModalSubmission {
    pub(crate) fn new(
        client: Arc<dyn SlackClient>,
        payload: Arc<ViewSubmissionPayload>,
        ack: AckSlot,
        logger: ScopedLogger,
    ) -> Self {
        Self {
            client,
            payload,
            ack,
            logger,
        }
    }

    pub fn view(&self) -> &View {
        &self.payload.view
    }

    pub fn user(&self) -> &User {
        &self.payload.user
    }

    pub fn callback_id(&self) -> &str {
        &self.payload.view.callback_id
    }

    pub fn private_metadata(&self) -> &str {
        &self.payload.view.private_metadata
    }

    pub fn state_value(&self, block_id: &str, action_id: &str) -> Option<&StateValue> {
        self.payload.view.state.get(block_id, action_id)
    }

    pub fn payload(&self) -> &ViewSubmissionPayload {
        &self.payload
    }

    pub fn logger(&self) -> &ScopedLogger {
        &self.logger
    }

    pub fn client(&self) -> &Arc<dyn SlackClient> {
        &self.client
    }

    /// Supplies the payload of the acknowledgement, e.g. a `response_action`.
    ///
    /// Only streaming handlers can acknowledge. When several streaming
    /// handlers match, the first to acknowledge wins. Returns whether the
    /// payload was accepted.
    pub fn acknowledge(&self, payload: impl Into<AckPayload>) -> bool {
        self.ack.send(payload.into(), &self.logger)
    }

    pub async fn send_dm(&self, text: &str) -> ApiResult<Value> {
        self.client
            .send_dm(&self.payload.user.id, text, SendOptions::new())
            .await
    }

    pub async fn push_modal(&self, view: Value) -> ApiResult<Value> {
        let trigger_id = self
            .payload
            .trigger_id
            .as_deref()
            .ok_or_else(|| ApiError::InvalidRequest("submission has no trigger_id".into()))?;
        self.client.push_modal(trigger_id, view).await
    }

    pub async fn update_modal(&self, view: Value) -> ApiResult<Value> {
        let current = &self.payload.view;
        self.client
            .update_modal(&current.id, view, current.hash.as_deref())
            .await
    }
}

impl fmt::Debug for ModalSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalSubmission")
            .field("callback_id", &self.payload.view.callback_id)
            .field("user", &self.payload.user.id)
            .finish_non_exhaustive()
    }
}

/// Context of a modal-closure handler.
pub struct ModalClosure {
    client: Arc<dyn SlackClient>,
    payload: Arc<ViewClosedPayload>,
    logger: ScopedLogger,
}

impl ModalClosure {
    pub(crate) fn new(
        client: Arc<dyn SlackClient>,
        payload: Arc<ViewClosedPayload>,
        logger: ScopedLogger,
    ) -> Self {
        Self {
            client,
            payload,
            logger,
        }
    }

    pub fn view(&self) -> &View {
        &self.payload.view
    }

    pub fn user(&self) -> &User {
        &self.payload.user
    }

    pub fn callback_id(&self) -> &str {
        &self.payload.view.callback_id
    }

    pub fn is_cleared(&self) -> bool {
        self.payload.is_cleared
    }

    pub fn payload(&self) -> &ViewClosedPayload {
        &self.payload
    }

    pub fn logger(&self) -> &ScopedLogger {
        &self.logger
    }

    pub fn client(&self) -> &Arc<dyn SlackClient> {
        &self.client
    }

    pub async fn send_dm(&self, text: &str) -> ApiResult<Value> {
        self.client
            .send_dm(&self.payload.user.id, text, SendOptions::new())
            .await
    }
}

impl fmt::Debug for ModalClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalClosure")
            .field("callback_id", &self.payload.view.callback_id)
            .field("user", &self.payload.user.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ClientCall, RecordingClient};
    use machina_core::ChannelType;
    use serde_json::json;

    fn logger() -> ScopedLogger {
        ScopedLogger::new("test", "test.handler", Some("U1"), None)
    }

    fn message(channel_type: ChannelType) -> (Message, Arc<RecordingClient>) {
        let client = Arc::new(RecordingClient::default());
        let event = MessageEvent {
            channel_type,
            ..MessageEvent::from_value(&json!({
                "text": "<@BOT> hi",
                "user": "U1",
                "channel": "C1",
                "ts": "2.0",
                "thread_ts": "1.0"
            }))
            .unwrap()
        };
        let msg = Message::new(
            client.clone(),
            Arc::new(event),
            "hi".into(),
            HashMap::new(),
            logger(),
        );
        (msg, client)
    }

    #[tokio::test]
    async fn test_reply_mentions_sender_in_channel() {
        let (msg, client) = message(ChannelType::Channel);
        msg.reply("done").await.unwrap();
        assert_eq!(
            client.calls(),
            vec![ClientCall::Send {
                channel: "C1".into(),
                text: "<@U1>: done".into(),
                options: SendOptions::new(),
            }]
        );
    }

    #[tokio::test]
    async fn test_reply_in_dm_has_no_mention() {
        let (msg, client) = message(ChannelType::Im);
        msg.reply("done").await.unwrap();
        assert!(matches!(&client.calls()[0], ClientCall::Send { text, .. } if text == "done"));
    }

    #[tokio::test]
    async fn test_say_in_thread_and_ephemeral() {
        let (msg, client) = message(ChannelType::Channel);
        msg.say_in_thread("threaded").await.unwrap();
        msg.say_ephemeral("psst").await.unwrap();
        msg.react("tada").await.unwrap();

        let calls = client.calls();
        assert!(matches!(
            &calls[0],
            ClientCall::Send { options, .. } if options.thread_ts.as_deref() == Some("1.0")
        ));
        assert!(matches!(
            &calls[1],
            ClientCall::Send { options, .. } if options.ephemeral_user.as_deref() == Some("U1")
        ));
        assert_eq!(
            calls[2],
            ClientCall::React {
                channel: "C1".into(),
                ts: "2.0".into(),
                emoji: "tada".into()
            }
        );
    }

    #[test]
    fn test_ack_slot_first_send_wins() {
        let (slot, mut rx) = AckSlot::channel();
        let other = slot.clone();
        assert!(slot.send(AckPayload::from("first"), &logger()));
        assert!(!other.send(AckPayload::from("second"), &logger()));
        assert_eq!(rx.try_recv().unwrap(), AckPayload::from("first"));
    }

    #[test]
    fn test_non_streaming_slot_rejects_payload() {
        assert!(!AckSlot::none().send(AckPayload::from("x"), &logger()));
    }
}
