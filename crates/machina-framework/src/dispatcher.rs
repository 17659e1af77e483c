//! The dispatch engine.
//!
//! [`Dispatcher`] handles one inbound [`SocketModeRequest`] at a time:
//!
//! 1. classifies it by request type,
//! 2. acknowledges the envelope (exactly once per request),
//! 3. looks up every matching handler in the [`RegisteredActions`],
//! 4. builds a fresh context per invocation and runs all matches concurrently,
//! 5. joins them and tallies the outcome in a [`DispatchReport`].
//!
//! Handler errors and panics are logged with the plugin, handler and user that
//! triggered them, counted, and go no further: they never abort a sibling
//! and never reach the transport.
//!
//! # Acknowledgement
//!
//! Events, block actions and modal closures are acknowledged before any
//! handler runs. Slash commands and modal submissions may be answered by a
//! streaming handler: the handler runs on its own task, the engine waits
//! until it calls `acknowledge` (or finishes), sends the ack with that
//! payload, then waits for the rest of the handler.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::join_all;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use machina_core::payload::{BlockActionsPayload, InteractivePayload, decode_interactive};
use machina_core::{
    Acknowledgement, MESSAGE_EVENT, MessageEvent, RequestType, SendOptions,
    SlackClient, SlashCommand, SocketConnection, SocketModeRequest, ViewClosedPayload,
    ViewSubmissionPayload, event_type,
};

use crate::bus::{BotEvent, EventBus, UnauthorizedAccess};
use crate::context::{
    AckSlot, BlockAction, Command, Message, ModalClosure, ModalSubmission, RawEvent, ScopedLogger,
};
use crate::error::MatcherError;
use crate::handler::HandlerFn;
use crate::matcher::RoleRequirement;
use crate::mention::MentionResolver;
use crate::plugin::Services;
use crate::registry::{MessageHandler, RegisteredActions};
use crate::roles::RoleStore;
use crate::settings::LOG_HANDLED_MESSAGES;

/// Who the bot is on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    /// The bot's user id, as it appears in `<@…>` mentions.
    pub id: String,
    /// The bot's user name, accepted as a `name:` prefix.
    pub name: String,
}

impl BotIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Tally of one dispatched request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers whose body ran, whatever the outcome.
    pub invoked: usize,
    /// Handlers that returned an error.
    pub failed: usize,
    /// Handlers that panicked.
    pub panicked: usize,
    /// Handlers skipped because the sender lacked the required roles.
    pub denied: usize,
}

impl DispatchReport {
    fn tally(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Completed => report.invoked += 1,
                Outcome::Failed => {
                    report.invoked += 1;
                    report.failed += 1;
                }
                Outcome::Panicked => {
                    report.invoked += 1;
                    report.panicked += 1;
                }
                Outcome::Denied => report.denied += 1,
            }
        }
        report
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            invoked: self.invoked + other.invoked,
            failed: self.failed + other.failed,
            panicked: self.panicked + other.panicked,
            denied: self.denied + other.denied,
        }
    }

    /// Whether every invoked handler completed successfully.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.panicked == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed,
    Panicked,
    Denied,
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Runs one handler inside its span, recovering errors and panics.
fn guarded<C>(
    handler: HandlerFn<C>,
    ctx: C,
    logger: ScopedLogger,
) -> impl Future<Output = Outcome> + Send + 'static
where
    C: Send + 'static,
{
    let span = logger.span().clone();
    let body = async move { handler(ctx).await };
    async move {
        match AssertUnwindSafe(body.instrument(span)).catch_unwind().await {
            Ok(Ok(())) => Outcome::Completed,
            Ok(Err(e)) => {
                error!(parent: logger.span(), error = %format_args!("{e:#}"), "Handler failed");
                Outcome::Failed
            }
            Err(panic) => {
                error!(
                    parent: logger.span(),
                    panic = panic_message(panic.as_ref()),
                    "Handler panicked"
                );
                Outcome::Panicked
            }
        }
    }
}

/// Waits for a spawned streaming handler.
async fn join_task(task: JoinHandle<Outcome>) -> Outcome {
    match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "Streaming handler task did not complete");
            Outcome::Panicked
        }
    }
}

/// Routes inbound requests to the registered handlers.
pub struct Dispatcher {
    registry: Arc<RegisteredActions>,
    client: Arc<dyn SlackClient>,
    bus: EventBus,
    roles: RoleStore,
    mentions: MentionResolver,
    log_handled_messages: bool,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<RegisteredActions>,
        services: &Services,
        bot: BotIdentity,
    ) -> Result<Self, MatcherError> {
        let mentions = MentionResolver::new(bot.id, bot.name, services.settings.aliases())?;
        Ok(Self {
            registry,
            client: Arc::clone(&services.client),
            bus: services.bus.clone(),
            roles: services.roles(),
            mentions,
            log_handled_messages: services
                .settings
                .get_bool(LOG_HANDLED_MESSAGES)
                .unwrap_or(false),
        })
    }

    pub fn registry(&self) -> &Arc<RegisteredActions> {
        &self.registry
    }

    /// Handles one request from acknowledgement to the last handler.
    pub async fn handle_request(
        &self,
        connection: &dyn SocketConnection,
        request: SocketModeRequest,
    ) -> DispatchReport {
        let span = info_span!(
            "dispatch",
            envelope_id = %request.envelope_id,
            request_type = %request.request_type,
        );
        async {
            if let Some(attempt) = request.retry_attempt {
                debug!(
                    attempt,
                    reason = request.retry_reason.as_deref().unwrap_or_default(),
                    "Request is a retry"
                );
            }
            match request.request_type {
                RequestType::EventsApi => self.on_events_api(connection, &request).await,
                RequestType::SlashCommands => self.on_slash_command(connection, &request).await,
                RequestType::Interactive => self.on_interactive(connection, &request).await,
                RequestType::Unknown => {
                    if !request.envelope_id.is_empty() {
                        self.ack(connection, Acknowledgement::new(&request.envelope_id))
                            .await;
                    }
                    debug!("Ignoring request of unknown type");
                    DispatchReport::default()
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn ack(&self, connection: &dyn SocketConnection, ack: Acknowledgement) {
        if let Err(e) = connection.acknowledge(ack).await {
            error!(error = %e, "Failed to acknowledge request");
        }
    }

    // ─── Events API ───────────────────────────────────────────────────────────

    async fn on_events_api(
        &self,
        connection: &dyn SocketConnection,
        request: &SocketModeRequest,
    ) -> DispatchReport {
        self.ack(connection, Acknowledgement::new(&request.envelope_id))
            .await;

        let event = Arc::new(request.event().clone());
        let Some(kind) = event_type(&event) else {
            warn!("Dropping event without a type");
            return DispatchReport::default();
        };

        if kind == MESSAGE_EVENT {
            let (raw, messages) = tokio::join!(self.on_raw_event(kind, &event), self.on_message(&event));
            raw.merge(messages)
        } else {
            self.on_raw_event(kind, &event).await
        }
    }

    async fn on_raw_event(&self, kind: &str, event: &Arc<Value>) -> DispatchReport {
        let Some(handlers) = self.registry.process(kind) else {
            return DispatchReport::default();
        };
        let user_id = event.get("user").and_then(Value::as_str);
        let invocations = handlers.values().map(|handler| {
            let logger = ScopedLogger::new(&handler.plugin, &handler.qualified_name, user_id, None);
            let ctx = RawEvent::new(Arc::clone(&self.client), Arc::clone(event), logger.clone());
            guarded(Arc::clone(&handler.handler), ctx, logger)
        });
        DispatchReport::tally(join_all(invocations).await)
    }

    async fn on_message(&self, raw: &Value) -> DispatchReport {
        let event = match MessageEvent::from_value(raw) {
            Ok(event) => event.normalize_edit(),
            Err(e) => {
                warn!(error = %e, "Dropping malformed message event");
                return DispatchReport::default();
            }
        };
        let Some(user_id) = event.user.clone() else {
            debug!("Ignoring message without a user");
            return DispatchReport::default();
        };
        if user_id == self.mentions.bot_id() {
            return DispatchReport::default();
        }

        let addressing = self.mentions.resolve(&event.text, event.channel_type);
        let is_edit = event.is_edit();
        let event = Arc::new(event);

        let respond = addressing
            .addressed
            .then(|| self.registry.respond_to().values())
            .into_iter()
            .flatten();
        let invocations = self
            .registry
            .listen_to()
            .values()
            .chain(respond)
            .filter(|handler| !is_edit || handler.matcher.handles_message_changed())
            .filter_map(|handler| {
                let captures = handler.matcher.search(&addressing.text)?;
                Some(self.run_message_handler(
                    handler,
                    Arc::clone(&event),
                    addressing.text.clone(),
                    captures,
                    &user_id,
                ))
            });
        DispatchReport::tally(join_all(invocations).await)
    }

    async fn run_message_handler(
        &self,
        handler: &MessageHandler,
        event: Arc<MessageEvent>,
        text: String,
        captures: HashMap<String, String>,
        user_id: &str,
    ) -> Outcome {
        let logger = ScopedLogger::new(&handler.plugin, &handler.qualified_name, Some(user_id), None);

        if let Some(required) = &handler.roles {
            let allowed = match self.roles.satisfies(user_id, required).await {
                Ok(allowed) => allowed,
                Err(e) => {
                    error!(parent: logger.span(), error = %e, "Role lookup failed; access denied");
                    false
                }
            };
            if !allowed {
                self.deny(handler, &event, user_id, required, &logger).await;
                return Outcome::Denied;
            }
        }

        if self.log_handled_messages {
            info!(parent: logger.span(), text = %text, "Handling message");
        }
        let ctx = Message::new(Arc::clone(&self.client), event, text, captures, logger.clone());
        guarded(Arc::clone(&handler.handler), ctx, logger).await
    }

    async fn deny(
        &self,
        handler: &MessageHandler,
        event: &MessageEvent,
        user_id: &str,
        required: &RoleRequirement,
        logger: &ScopedLogger,
    ) {
        warn!(parent: logger.span(), required = %required, "Unauthorized access");
        self.bus.emit(BotEvent::UnauthorizedAccess(UnauthorizedAccess {
            plugin: handler.plugin.clone(),
            handler: handler.qualified_name.clone(),
            user_id: user_id.to_owned(),
            channel: event.channel.clone(),
            required: required.clone(),
        }));

        let Some(channel) = event.channel.as_deref() else {
            return;
        };
        let text = format!("Sorry <@{user_id}>, this requires {required}.");
        if let Err(e) = self
            .client
            .send(channel, &text, SendOptions::new().ephemeral_to(user_id))
            .await
        {
            warn!(parent: logger.span(), error = %e, "Failed to send access denial");
        }
    }

    // ─── Slash commands ───────────────────────────────────────────────────────

    async fn on_slash_command(
        &self,
        connection: &dyn SocketConnection,
        request: &SocketModeRequest,
    ) -> DispatchReport {
        let ack = Acknowledgement::new(&request.envelope_id);
        let command = match SlashCommand::from_value(&request.payload) {
            Ok(command) => command,
            Err(e) => {
                self.ack(connection, ack).await;
                warn!(error = %e, "Dropping malformed slash command");
                return DispatchReport::default();
            }
        };
        let Some(handler) = self.registry.command(&command.command) else {
            self.ack(connection, ack).await;
            debug!(command = %command.command, "No handler for command");
            return DispatchReport::default();
        };

        let logger = ScopedLogger::new(
            &handler.plugin,
            &handler.qualified_name,
            Some(&command.user_id),
            Some(&command.user_name),
        );

        if !handler.is_streaming {
            self.ack(connection, ack).await;
            let ctx = Command::new(Arc::clone(&self.client), command, AckSlot::none(), logger.clone());
            return DispatchReport::tally([guarded(Arc::clone(&handler.handler), ctx, logger).await]);
        }

        let (slot, acknowledged) = AckSlot::channel();
        let ctx = Command::new(Arc::clone(&self.client), command, slot, logger.clone());
        let task = tokio::spawn(guarded(Arc::clone(&handler.handler), ctx, logger));

        let ack = match acknowledged.await {
            Ok(payload) => ack.with_payload(payload),
            Err(_) => ack,
        };
        self.ack(connection, ack).await;
        DispatchReport::tally([join_task(task).await])
    }

    // ─── Interactive payloads ─────────────────────────────────────────────────

    async fn on_interactive(
        &self,
        connection: &dyn SocketConnection,
        request: &SocketModeRequest,
    ) -> DispatchReport {
        let ack = Acknowledgement::new(&request.envelope_id);
        let payload = match decode_interactive(&request.payload) {
            Ok(payload) => payload,
            Err(e) => {
                self.ack(connection, ack).await;
                warn!(error = %e, "Dropping malformed interactive payload");
                return DispatchReport::default();
            }
        };

        match payload {
            InteractivePayload::BlockActions(payload) => {
                self.ack(connection, ack).await;
                self.on_block_actions(Arc::from(payload)).await
            }
            InteractivePayload::ViewSubmission(payload) => {
                self.on_view_submission(connection, ack, Arc::from(payload))
                    .await
            }
            InteractivePayload::ViewClosed(payload) => {
                self.ack(connection, ack).await;
                self.on_view_closed(Arc::from(payload)).await
            }
        }
    }

    async fn on_block_actions(&self, payload: Arc<BlockActionsPayload>) -> DispatchReport {
        let user = &payload.user;
        let mut invocations = Vec::new();
        for action in &payload.actions {
            for handler in self.registry.block_actions().values() {
                if !handler.matches(&action.action_id, &action.block_id) {
                    continue;
                }
                let logger = ScopedLogger::new(
                    &handler.plugin,
                    &handler.qualified_name,
                    Some(&user.id),
                    Some(user.display_name()),
                );
                let ctx = BlockAction::new(
                    Arc::clone(&self.client),
                    Arc::clone(&payload),
                    action.clone(),
                    logger.clone(),
                );
                invocations.push(guarded(Arc::clone(&handler.handler), ctx, logger));
            }
        }
        DispatchReport::tally(join_all(invocations).await)
    }

    async fn on_view_submission(
        &self,
        connection: &dyn SocketConnection,
        ack: Acknowledgement,
        payload: Arc<ViewSubmissionPayload>,
    ) -> DispatchReport {
        let callback_id = &payload.view.callback_id;
        let user = &payload.user;
        let (streaming, plain): (Vec<_>, Vec<_>) = self
            .registry
            .modal_submissions()
            .values()
            .filter(|handler| handler.callback_id.matches(callback_id))
            .partition(|handler| handler.is_streaming);

        let (slot, acknowledged) = AckSlot::channel();
        let tasks: Vec<_> = streaming
            .into_iter()
            .map(|handler| {
                let logger = ScopedLogger::new(
                    &handler.plugin,
                    &handler.qualified_name,
                    Some(&user.id),
                    Some(user.display_name()),
                );
                let ctx = ModalSubmission::new(
                    Arc::clone(&self.client),
                    Arc::clone(&payload),
                    slot.clone(),
                    logger.clone(),
                );
                tokio::spawn(guarded(Arc::clone(&handler.handler), ctx, logger))
            })
            .collect();
        drop(slot);

        // Resolves once a handler acknowledges or every streaming context is gone.
        let ack = match acknowledged.await {
            Ok(payload) => ack.with_payload(payload),
            Err(_) => ack,
        };
        self.ack(connection, ack).await;

        let plain = plain.into_iter().map(|handler| {
            let logger = ScopedLogger::new(
                &handler.plugin,
                &handler.qualified_name,
                Some(&user.id),
                Some(user.display_name()),
            );
            let ctx = ModalSubmission::new(
                Arc::clone(&self.client),
                Arc::clone(&payload),
                AckSlot::none(),
                logger.clone(),
            );
            guarded(Arc::clone(&handler.handler), ctx, logger)
        });
        let (mut outcomes, streamed) =
            tokio::join!(join_all(plain), join_all(tasks.into_iter().map(join_task)));
        outcomes.extend(streamed);
        DispatchReport::tally(outcomes)
    }

    async fn on_view_closed(&self, payload: Arc<ViewClosedPayload>) -> DispatchReport {
        let callback_id = &payload.view.callback_id;
        let user = &payload.user;
        let invocations = self
            .registry
            .modal_closures()
            .values()
            .filter(|handler| handler.callback_id.matches(callback_id))
            .map(|handler| {
                let logger = ScopedLogger::new(
                    &handler.plugin,
                    &handler.qualified_name,
                    Some(&user.id),
                    Some(user.display_name()),
                );
                let ctx =
                    ModalClosure::new(Arc::clone(&self.client), Arc::clone(&payload), logger.clone());
                guarded(Arc::clone(&handler.handler), ctx, logger)
            });
        DispatchReport::tally(join_all(invocations).await)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("bot_id", &self.mentions.bot_id())
            .field("handlers", &self.registry.len())
            .finish_non_exhaustive()
    }
}
