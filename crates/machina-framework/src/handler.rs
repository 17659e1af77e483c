//! Handler declarations.
//!
//! A plugin declares its handlers on a [`HandlerSet`]. Each call names a
//! handler, binds its function, and returns a builder on which routing rules
//! are attached; one handler may carry several rules of its category.
//!
//! Rules are stored as declared. Patterns are compiled, and declarations
//! validated, when the plugin is registered.
//!
//! # Example
//!
//! ```rust,ignore
//! impl Plugin for Deployer {
//!     fn declare(self: Arc<Self>, handlers: &mut HandlerSet) {
//!         handlers
//!             .message("deploy", bind(&self, Self::deploy))
//!             .respond_to(r"deploy (?P<env>\w+)")
//!             .respond_to(MessageRule::new("ship (?P<env>\\w+)").case_insensitive())
//!             .require_any_role(["ops"]);
//!
//!         handlers
//!             .command("status", bind(&self, Self::status))
//!             .command("/status")
//!             .streaming();
//!
//!         handlers
//!             .block_action("approve", bind(&self, Self::approve))
//!             .action(ActionSelector::new().action_id_pattern("approve_"));
//!     }
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::context::{BlockAction, Command, Message, ModalClosure, ModalSubmission, RawEvent};
use crate::matcher::{IdSelector, RoleRequirement};

/// What a handler returns. Errors are logged by the dispatcher and go no further.
pub type HandlerResult = anyhow::Result<()>;

/// A type-erased handler taking the context `C`.
pub type HandlerFn<C> = Arc<dyn Fn(C) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

fn erase<C, F, Fut>(handler: F) -> HandlerFn<C>
where
    F: Fn(C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx| handler(ctx).boxed())
}

/// Binds a method taking `self: Arc<Self>` to a plugin instance.
///
/// ```rust,ignore
/// handlers.message("greet", bind(&self, Self::greet)).listen_to("hello");
/// ```
pub fn bind<P, C, F, Fut>(plugin: &Arc<P>, method: F) -> impl Fn(C) -> Fut + Send + Sync + 'static
where
    P: Send + Sync + 'static,
    C: 'static,
    F: Fn(Arc<P>, C) -> Fut + Send + Sync + 'static,
    Fut: 'static,
{
    let plugin = Arc::clone(plugin);
    move |ctx| method(Arc::clone(&plugin), ctx)
}

// =============================================================================
// Message rules
// =============================================================================

/// Whether a message rule fires on every message or only on those addressed to the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageCategory {
    Listen,
    Respond,
}

/// A message rule as declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRule {
    pub(crate) pattern: String,
    pub(crate) case_sensitive: bool,
    pub(crate) handle_message_changed: bool,
}

impl MessageRule {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            case_sensitive: true,
            handle_message_changed: false,
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    /// Also fire on edited messages.
    pub fn handle_message_changed(mut self) -> Self {
        self.handle_message_changed = true;
        self
    }
}

impl From<&str> for MessageRule {
    fn from(pattern: &str) -> Self {
        Self::new(pattern)
    }
}

impl From<String> for MessageRule {
    fn from(pattern: String) -> Self {
        Self::new(pattern)
    }
}

/// Selects block actions by action id and block id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionSelector {
    pub(crate) action_id: IdSelector,
    pub(crate) block_id: IdSelector,
}

impl ActionSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action_id(mut self, id: impl Into<String>) -> Self {
        self.action_id = IdSelector::Literal(id.into());
        self
    }

    /// Matches action ids the pattern matches from their first character.
    pub fn action_id_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.action_id = IdSelector::Pattern(pattern.into());
        self
    }

    pub fn block_id(mut self, id: impl Into<String>) -> Self {
        self.block_id = IdSelector::Literal(id.into());
        self
    }

    /// Matches block ids the pattern matches from their first character.
    pub fn block_id_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.block_id = IdSelector::Pattern(pattern.into());
        self
    }
}

// =============================================================================
// Declarations
// =============================================================================

pub struct MessageDeclaration {
    pub(crate) name: String,
    pub(crate) handler: HandlerFn<Message>,
    pub(crate) rules: Vec<(MessageCategory, MessageRule)>,
    pub(crate) roles: Option<RoleRequirement>,
}

impl MessageDeclaration {
    /// Fires on every message matching the rule.
    pub fn listen_to(&mut self, rule: impl Into<MessageRule>) -> &mut Self {
        self.rules.push((MessageCategory::Listen, rule.into()));
        self
    }

    /// Fires on messages addressed to the bot matching the rule.
    pub fn respond_to(&mut self, rule: impl Into<MessageRule>) -> &mut Self {
        self.rules.push((MessageCategory::Respond, rule.into()));
        self
    }

    pub fn require_any_role<I, S>(&mut self, roles: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(RoleRequirement::any(roles));
        self
    }

    pub fn require_all_roles<I, S>(&mut self, roles: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = Some(RoleRequirement::all(roles));
        self
    }
}

pub struct EventDeclaration {
    pub(crate) name: String,
    pub(crate) handler: HandlerFn<RawEvent>,
    pub(crate) event_types: Vec<String>,
}

impl EventDeclaration {
    /// Fires on every event of this type.
    pub fn process(&mut self, event_type: impl Into<String>) -> &mut Self {
        self.event_types.push(event_type.into());
        self
    }
}

pub struct CommandDeclaration {
    pub(crate) name: String,
    pub(crate) handler: HandlerFn<Command>,
    pub(crate) commands: Vec<String>,
    pub(crate) streaming: bool,
}

impl CommandDeclaration {
    /// Handles a slash command. A missing leading `/` is added.
    pub fn command(&mut self, command: impl Into<String>) -> &mut Self {
        let command = command.into();
        let command = if command.starts_with('/') {
            command
        } else {
            format!("/{command}")
        };
        self.commands.push(command);
        self
    }

    /// The handler supplies the acknowledgement payload through `Command::acknowledge`.
    pub fn streaming(&mut self) -> &mut Self {
        self.streaming = true;
        self
    }
}

pub struct BlockActionDeclaration {
    pub(crate) name: String,
    pub(crate) handler: HandlerFn<BlockAction>,
    pub(crate) selectors: Vec<ActionSelector>,
}

impl BlockActionDeclaration {
    pub fn action(&mut self, selector: ActionSelector) -> &mut Self {
        self.selectors.push(selector);
        self
    }
}

pub struct ModalDeclaration<C> {
    pub(crate) name: String,
    pub(crate) handler: HandlerFn<C>,
    pub(crate) callbacks: Vec<IdSelector>,
    pub(crate) streaming: bool,
}

impl<C> ModalDeclaration<C> {
    pub fn callback_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.callbacks.push(IdSelector::Literal(id.into()));
        self
    }

    /// Matches callback ids the pattern matches from their first character.
    pub fn callback_id_pattern(&mut self, pattern: impl Into<String>) -> &mut Self {
        self.callbacks.push(IdSelector::Pattern(pattern.into()));
        self
    }

    /// The handler supplies the acknowledgement payload.
    ///
    /// Only submissions can stream; a streaming closure rejects its plugin.
    pub fn streaming(&mut self) -> &mut Self {
        self.streaming = true;
        self
    }
}

// =============================================================================
// HandlerSet
// =============================================================================

/// The handlers declared by one plugin.
#[derive(Default)]
pub struct HandlerSet {
    pub(crate) messages: Vec<MessageDeclaration>,
    pub(crate) events: Vec<EventDeclaration>,
    pub(crate) commands: Vec<CommandDeclaration>,
    pub(crate) block_actions: Vec<BlockActionDeclaration>,
    pub(crate) modal_submissions: Vec<ModalDeclaration<ModalSubmission>>,
    pub(crate) modal_closures: Vec<ModalDeclaration<ModalClosure>>,
}

fn push<T>(list: &mut Vec<T>, item: T) -> &mut T {
    let index = list.len();
    list.push(item);
    &mut list[index]
}

impl HandlerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message<F, Fut>(&mut self, name: impl Into<String>, handler: F) -> &mut MessageDeclaration
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        push(
            &mut self.messages,
            MessageDeclaration {
                name: name.into(),
                handler: erase(handler),
                rules: Vec::new(),
                roles: None,
            },
        )
    }

    pub fn event<F, Fut>(&mut self, name: impl Into<String>, handler: F) -> &mut EventDeclaration
    where
        F: Fn(RawEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        push(
            &mut self.events,
            EventDeclaration {
                name: name.into(),
                handler: erase(handler),
                event_types: Vec::new(),
            },
        )
    }

    pub fn command<F, Fut>(&mut self, name: impl Into<String>, handler: F) -> &mut CommandDeclaration
    where
        F: Fn(Command) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        push(
            &mut self.commands,
            CommandDeclaration {
                name: name.into(),
                handler: erase(handler),
                commands: Vec::new(),
                streaming: false,
            },
        )
    }

    pub fn block_action<F, Fut>(
        &mut self,
        name: impl Into<String>,
        handler: F,
    ) -> &mut BlockActionDeclaration
    where
        F: Fn(BlockAction) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        push(
            &mut self.block_actions,
            BlockActionDeclaration {
                name: name.into(),
                handler: erase(handler),
                selectors: Vec::new(),
            },
        )
    }

    pub fn modal_submission<F, Fut>(
        &mut self,
        name: impl Into<String>,
        handler: F,
    ) -> &mut ModalDeclaration<ModalSubmission>
    where
        F: Fn(ModalSubmission) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        push(
            &mut self.modal_submissions,
            ModalDeclaration {
                name: name.into(),
                handler: erase(handler),
                callbacks: Vec::new(),
                streaming: false,
            },
        )
    }

    pub fn modal_closure<F, Fut>(
        &mut self,
        name: impl Into<String>,
        handler: F,
    ) -> &mut ModalDeclaration<ModalClosure>
    where
        F: Fn(ModalClosure) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        push(
            &mut self.modal_closures,
            ModalDeclaration {
                name: name.into(),
                handler: erase(handler),
                callbacks: Vec::new(),
                streaming: false,
            },
        )
    }

    /// Number of declared handlers, across categories.
    pub fn len(&self) -> usize {
        self.messages.len()
            + self.events.len()
            + self.commands.len()
            + self.block_actions.len()
            + self.modal_submissions.len()
            + self.modal_closures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
