//! The handler registry.
//!
//! [`RegisteredActions`] indexes every declared rule by category. It is built
//! once at startup, plugin by plugin, and is read-only afterwards.
//!
//! Each rule produces one entry keyed `"<plugin>.<handler>-<discriminant>"`,
//! where the discriminant is the regex source, event type, command,
//! `action_id-block_id` pair or callback id. A handler declared with two
//! patterns therefore yields two independently routable entries.
//!
//! Registration is atomic per plugin: [`RegisteredActions::stage`] compiles
//! and validates all of a plugin's declarations into a separate registry,
//! which is merged only if nothing failed.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;

use crate::context::{BlockAction, Command, Message, ModalClosure, ModalSubmission, RawEvent};
use crate::error::{RegistrationError, RegistrationResult};
use crate::handler::{HandlerFn, HandlerSet, MessageCategory, ModalDeclaration};
use crate::matcher::{IdMatcher, MatcherConfig, RoleRequirement};

// =============================================================================
// Handler descriptors
// =============================================================================

/// A `listen_to` or `respond_to` rule.
pub struct MessageHandler {
    pub plugin: String,
    pub qualified_name: String,
    pub matcher: MatcherConfig,
    pub roles: Option<RoleRequirement>,
    pub(crate) handler: HandlerFn<Message>,
}

/// A `process` rule.
pub struct EventHandler {
    pub plugin: String,
    pub qualified_name: String,
    pub event_type: String,
    pub(crate) handler: HandlerFn<RawEvent>,
}

/// A slash-command rule.
pub struct CommandHandler {
    pub plugin: String,
    pub qualified_name: String,
    pub command: String,
    pub is_streaming: bool,
    pub(crate) handler: HandlerFn<Command>,
}

/// A block-action rule. At least one of the two matchers is not `Any`.
pub struct BlockActionHandler {
    pub plugin: String,
    pub qualified_name: String,
    pub action_id: IdMatcher,
    pub block_id: IdMatcher,
    pub(crate) handler: HandlerFn<BlockAction>,
}

impl BlockActionHandler {
    pub fn matches(&self, action_id: &str, block_id: &str) -> bool {
        self.action_id.matches(action_id) && self.block_id.matches(block_id)
    }
}

/// A modal submission or closure rule.
pub struct ModalHandler<C> {
    pub plugin: String,
    pub qualified_name: String,
    pub callback_id: IdMatcher,
    pub is_streaming: bool,
    pub(crate) handler: HandlerFn<C>,
}

macro_rules! debug_descriptor {
    ($ty:ty, $($field:ident),+) => {
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($ty))
                    $(.field(stringify!($field), &self.$field))+
                    .finish_non_exhaustive()
            }
        }
    };
}

debug_descriptor!(MessageHandler, qualified_name, matcher, roles);
debug_descriptor!(EventHandler, qualified_name, event_type);
debug_descriptor!(CommandHandler, qualified_name, command, is_streaming);
debug_descriptor!(BlockActionHandler, qualified_name, action_id, block_id);

impl<C> fmt::Debug for ModalHandler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalHandler")
            .field("qualified_name", &self.qualified_name)
            .field("callback_id", &self.callback_id)
            .field("is_streaming", &self.is_streaming)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// RegisteredActions
// =============================================================================

/// The registry: rule category to handler descriptors.
///
/// Maps are ordered so that scans are deterministic.
#[derive(Default)]
pub struct RegisteredActions {
    listen_to: BTreeMap<String, MessageHandler>,
    respond_to: BTreeMap<String, MessageHandler>,
    process: BTreeMap<String, BTreeMap<String, EventHandler>>,
    command: BTreeMap<String, CommandHandler>,
    block_actions: BTreeMap<String, BlockActionHandler>,
    modal_submissions: BTreeMap<String, ModalHandler<ModalSubmission>>,
    modal_closures: BTreeMap<String, ModalHandler<ModalClosure>>,
}

fn insert_unique<V>(map: &mut BTreeMap<String, V>, key: String, value: V) -> RegistrationResult<()> {
    match map.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(value);
            Ok(())
        }
        Entry::Occupied(slot) => Err(RegistrationError::DuplicateKey(slot.key().clone())),
    }
}

impl RegisteredActions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen_to(&self) -> &BTreeMap<String, MessageHandler> {
        &self.listen_to
    }

    pub fn respond_to(&self) -> &BTreeMap<String, MessageHandler> {
        &self.respond_to
    }

    /// Handlers registered for one event type.
    pub fn process(&self, event_type: &str) -> Option<&BTreeMap<String, EventHandler>> {
        self.process.get(event_type)
    }

    pub fn command(&self, command: &str) -> Option<&CommandHandler> {
        self.command.get(command)
    }

    pub fn commands(&self) -> &BTreeMap<String, CommandHandler> {
        &self.command
    }

    pub fn block_actions(&self) -> &BTreeMap<String, BlockActionHandler> {
        &self.block_actions
    }

    pub fn modal_submissions(&self) -> &BTreeMap<String, ModalHandler<ModalSubmission>> {
        &self.modal_submissions
    }

    pub fn modal_closures(&self) -> &BTreeMap<String, ModalHandler<ModalClosure>> {
        &self.modal_closures
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.listen_to.len()
            + self.respond_to.len()
            + self.process.values().map(BTreeMap::len).sum::<usize>()
            + self.command.len()
            + self.block_actions.len()
            + self.modal_submissions.len()
            + self.modal_closures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ─── Registration ─────────────────────────────────────────────────────────

    /// Compiles and validates one plugin's declarations into a separate registry.
    pub fn stage(plugin: &str, handlers: HandlerSet) -> RegistrationResult<Self> {
        let mut staged = Self::new();
        let qualify = |name: &str| format!("{plugin}.{name}");

        for decl in handlers.messages {
            let qualified_name = qualify(&decl.name);
            require_rules(&qualified_name, decl.rules.is_empty())?;
            for (category, rule) in decl.rules {
                let matcher =
                    MatcherConfig::new(&rule.pattern, rule.case_sensitive, rule.handle_message_changed)
                        .map_err(|source| RegistrationError::InvalidPattern {
                            handler: qualified_name.clone(),
                            source,
                        })?;
                let key = format!("{qualified_name}-{}", rule.pattern);
                let entry = MessageHandler {
                    plugin: plugin.to_owned(),
                    qualified_name: qualified_name.clone(),
                    matcher,
                    roles: decl.roles.clone(),
                    handler: decl.handler.clone(),
                };
                let map = match category {
                    MessageCategory::Listen => &mut staged.listen_to,
                    MessageCategory::Respond => &mut staged.respond_to,
                };
                insert_unique(map, key, entry)?;
            }
        }

        for decl in handlers.events {
            let qualified_name = qualify(&decl.name);
            require_rules(&qualified_name, decl.event_types.is_empty())?;
            for event_type in decl.event_types {
                let key = format!("{qualified_name}-{event_type}");
                let entry = EventHandler {
                    plugin: plugin.to_owned(),
                    qualified_name: qualified_name.clone(),
                    event_type: event_type.clone(),
                    handler: decl.handler.clone(),
                };
                insert_unique(staged.process.entry(event_type).or_default(), key, entry)?;
            }
        }

        for decl in handlers.commands {
            let qualified_name = qualify(&decl.name);
            require_rules(&qualified_name, decl.commands.is_empty())?;
            for command in decl.commands {
                if let Some(existing) = staged.command.get(&command) {
                    return Err(RegistrationError::DuplicateCommand {
                        command,
                        existing: existing.qualified_name.clone(),
                    });
                }
                let entry = CommandHandler {
                    plugin: plugin.to_owned(),
                    qualified_name: qualified_name.clone(),
                    command: command.clone(),
                    is_streaming: decl.streaming,
                    handler: decl.handler.clone(),
                };
                staged.command.insert(command, entry);
            }
        }

        for decl in handlers.block_actions {
            let qualified_name = qualify(&decl.name);
            require_rules(&qualified_name, decl.selectors.is_empty())?;
            for selector in decl.selectors {
                if selector.action_id.is_any() && selector.block_id.is_any() {
                    return Err(RegistrationError::EmptyBlockActionSelector {
                        handler: qualified_name,
                    });
                }
                let invalid = |source| RegistrationError::InvalidPattern {
                    handler: qualified_name.clone(),
                    source,
                };
                let action_id = selector.action_id.compile().map_err(invalid)?;
                let block_id = selector.block_id.compile().map_err(invalid)?;
                let key = format!(
                    "{qualified_name}-{}-{}",
                    action_id.discriminant(),
                    block_id.discriminant()
                );
                let entry = BlockActionHandler {
                    plugin: plugin.to_owned(),
                    qualified_name: qualified_name.clone(),
                    action_id,
                    block_id,
                    handler: decl.handler.clone(),
                };
                insert_unique(&mut staged.block_actions, key, entry)?;
            }
        }

        for decl in handlers.modal_submissions {
            stage_modal(plugin, qualify(&decl.name), decl, &mut staged.modal_submissions)?;
        }

        for decl in handlers.modal_closures {
            let qualified_name = qualify(&decl.name);
            if decl.streaming {
                return Err(RegistrationError::StreamingClosure {
                    handler: qualified_name,
                });
            }
            stage_modal(plugin, qualified_name, decl, &mut staged.modal_closures)?;
        }

        Ok(staged)
    }

    /// Fails if merging `staged` would break a registry invariant.
    pub fn check_merge(&self, staged: &Self) -> RegistrationResult<()> {
        for command in staged.command.keys() {
            if let Some(existing) = self.command.get(command) {
                return Err(RegistrationError::DuplicateCommand {
                    command: command.clone(),
                    existing: existing.qualified_name.clone(),
                });
            }
        }

        let duplicate = staged
            .listen_to
            .keys()
            .find(|key| self.listen_to.contains_key(*key))
            .or_else(|| {
                staged
                    .respond_to
                    .keys()
                    .find(|key| self.respond_to.contains_key(*key))
            })
            .or_else(|| {
                staged
                    .block_actions
                    .keys()
                    .find(|key| self.block_actions.contains_key(*key))
            })
            .or_else(|| {
                staged
                    .modal_submissions
                    .keys()
                    .find(|key| self.modal_submissions.contains_key(*key))
            })
            .or_else(|| {
                staged
                    .modal_closures
                    .keys()
                    .find(|key| self.modal_closures.contains_key(*key))
            })
            .or_else(|| {
                staged.process.iter().find_map(|(event_type, handlers)| {
                    let existing = self.process.get(event_type)?;
                    handlers.keys().find(|key| existing.contains_key(*key))
                })
            });
        match duplicate {
            Some(key) => Err(RegistrationError::DuplicateKey(key.clone())),
            None => Ok(()),
        }
    }

    /// Merges a staged plugin registry.
    pub fn merge(&mut self, staged: Self) -> RegistrationResult<()> {
        self.check_merge(&staged)?;
        self.listen_to.extend(staged.listen_to);
        self.respond_to.extend(staged.respond_to);
        for (event_type, handlers) in staged.process {
            self.process.entry(event_type).or_default().extend(handlers);
        }
        self.command.extend(staged.command);
        self.block_actions.extend(staged.block_actions);
        self.modal_submissions.extend(staged.modal_submissions);
        self.modal_closures.extend(staged.modal_closures);
        Ok(())
    }
}

fn stage_modal<C>(
    plugin: &str,
    qualified_name: String,
    decl: ModalDeclaration<C>,
    map: &mut BTreeMap<String, ModalHandler<C>>,
) -> RegistrationResult<()> {
    require_rules(&qualified_name, decl.callbacks.is_empty())?;
    for selector in decl.callbacks {
        let callback_id = selector
            .compile()
            .map_err(|source| RegistrationError::InvalidPattern {
                handler: qualified_name.clone(),
                source,
            })?;
        let key = format!("{qualified_name}-{}", callback_id.discriminant());
        let entry = ModalHandler {
            plugin: plugin.to_owned(),
            qualified_name: qualified_name.clone(),
            callback_id,
            is_streaming: decl.streaming,
            handler: decl.handler.clone(),
        };
        insert_unique(map, key, entry)?;
    }
    Ok(())
}

fn require_rules(handler: &str, empty: bool) -> RegistrationResult<()> {
    if empty {
        return Err(RegistrationError::NoRules {
            handler: handler.to_owned(),
        });
    }
    Ok(())
}

impl fmt::Debug for RegisteredActions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredActions")
            .field("listen_to", &self.listen_to.keys())
            .field("respond_to", &self.respond_to.keys())
            .field("process", &self.process.keys())
            .field("command", &self.command.keys())
            .field("block_actions", &self.block_actions.keys())
            .field("modal_submissions", &self.modal_submissions.keys())
            .field("modal_closures", &self.modal_closures.keys())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{ActionSelector, HandlerResult};

    async fn on_message(_: Message) -> HandlerResult {
        Ok(())
    }

    async fn on_command(_: Command) -> HandlerResult {
        Ok(())
    }

    async fn on_action(_: BlockAction) -> HandlerResult {
        Ok(())
    }

    async fn on_closure(_: ModalClosure) -> HandlerResult {
        Ok(())
    }

    async fn on_event(_: RawEvent) -> HandlerResult {
        Ok(())
    }

    #[test]
    fn test_two_rules_yield_two_entries() {
        let mut set = HandlerSet::new();
        set.message("deploy", on_message)
            .respond_to("deploy (?P<env>\\w+)")
            .respond_to("ship (?P<env>\\w+)");

        let staged = RegisteredActions::stage("ops", set).unwrap();
        let keys: Vec<_> = staged.respond_to().keys().cloned().collect();
        assert_eq!(
            keys,
            ["ops.deploy-deploy (?P<env>\\w+)", "ops.deploy-ship (?P<env>\\w+)"]
        );
        assert!(staged.listen_to().is_empty());
    }

    #[test]
    fn test_block_action_without_ids_is_rejected() {
        let mut set = HandlerSet::new();
        set.block_action("click", on_action)
            .action(ActionSelector::new());
        assert!(matches!(
            RegisteredActions::stage("ui", set),
            Err(RegistrationError::EmptyBlockActionSelector { handler }) if handler == "ui.click"
        ));
    }

    #[test]
    fn test_handler_without_rules_is_rejected() {
        let mut set = HandlerSet::new();
        set.block_action("click", on_action);
        assert!(matches!(
            RegisteredActions::stage("ui", set),
            Err(RegistrationError::NoRules { handler }) if handler == "ui.click"
        ));

        let mut set = HandlerSet::new();
        set.message("deploy", on_message).respond_to("deploy");
        set.message("idle", on_message);
        assert!(matches!(
            RegisteredActions::stage("ops", set),
            Err(RegistrationError::NoRules { handler }) if handler == "ops.idle"
        ));

        let mut set = HandlerSet::new();
        set.modal_closure("closed", on_closure);
        assert!(matches!(
            RegisteredActions::stage("ui", set),
            Err(RegistrationError::NoRules { handler }) if handler == "ui.closed"
        ));

        let mut set = HandlerSet::new();
        set.event("joined", on_event);
        set.command("deploy", on_command);
        assert!(matches!(
            RegisteredActions::stage("p", set),
            Err(RegistrationError::NoRules { handler }) if handler == "p.joined"
        ));
    }

    #[test]
    fn test_block_action_key() {
        let mut set = HandlerSet::new();
        set.block_action("click", on_action)
            .action(ActionSelector::new().action_id("approve"));
        let staged = RegisteredActions::stage("ui", set).unwrap();
        assert!(staged.block_actions().contains_key("ui.click-approve-*"));
    }

    #[test]
    fn test_streaming_closure_is_rejected() {
        let mut set = HandlerSet::new();
        set.modal_closure("closed", on_closure)
            .callback_id("form")
            .streaming();
        assert!(matches!(
            RegisteredActions::stage("ui", set),
            Err(RegistrationError::StreamingClosure { .. })
        ));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let mut set = HandlerSet::new();
        set.message("broken", on_message).listen_to("(oops");
        assert!(matches!(
            RegisteredActions::stage("p", set),
            Err(RegistrationError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_duplicate_rule_is_rejected() {
        let mut set = HandlerSet::new();
        set.message("echo", on_message).listen_to("x").listen_to("x");
        assert!(matches!(
            RegisteredActions::stage("p", set),
            Err(RegistrationError::DuplicateKey(key)) if key == "p.echo-x"
        ));
    }

    #[test]
    fn test_command_first_registration_wins() {
        let mut first = HandlerSet::new();
        first.command("deploy", on_command).command("/deploy");
        let mut second = HandlerSet::new();
        second.command("ship", on_command).command("deploy");

        let mut registry = RegisteredActions::new();
        registry
            .merge(RegisteredActions::stage("a", first).unwrap())
            .unwrap();
        let err = registry
            .merge(RegisteredActions::stage("b", second).unwrap())
            .unwrap_err();

        assert!(matches!(
            err,
            RegistrationError::DuplicateCommand { command, existing }
                if command == "/deploy" && existing == "a.deploy"
        ));
        assert_eq!(
            registry.command("/deploy").map(|h| h.qualified_name.as_str()),
            Some("a.deploy")
        );
    }

    #[test]
    fn test_failed_merge_leaves_registry_untouched() {
        let mut first = HandlerSet::new();
        first.command("deploy", on_command).command("/deploy");
        let mut second = HandlerSet::new();
        second.message("hello", on_message).listen_to("hello");
        second.command("deploy", on_command).command("/deploy");

        let mut registry = RegisteredActions::new();
        registry
            .merge(RegisteredActions::stage("a", first).unwrap())
            .unwrap();
        assert!(
            registry
                .merge(RegisteredActions::stage("b", second).unwrap())
                .is_err()
        );
        assert!(registry.listen_to().is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_process_entries_grouped_by_event_type() {
        let mut set = HandlerSet::new();
        set.event("reactions", on_event)
            .process("reaction_added")
            .process("reaction_removed");
        let staged = RegisteredActions::stage("p", set).unwrap();
        assert!(
            staged
                .process("reaction_added")
                .is_some_and(|handlers| handlers.contains_key("p.reactions-reaction_added"))
        );
        assert_eq!(staged.len(), 2);
    }
}
