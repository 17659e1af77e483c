//! In-process event bus shared by plugins.

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

use crate::matcher::RoleRequirement;

/// Default number of buffered events per subscriber.
pub const DEFAULT_BUS_CAPACITY: usize = 64;

/// A sender lacked the roles a handler requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnauthorizedAccess {
    pub plugin: String,
    pub handler: String,
    pub user_id: String,
    pub channel: Option<String>,
    pub required: RoleRequirement,
}

/// Events published on the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum BotEvent {
    UnauthorizedAccess(UnauthorizedAccess),
    /// An application-defined event.
    Custom { name: String, data: Value },
}

impl BotEvent {
    pub fn custom(name: impl Into<String>, data: Value) -> Self {
        Self::Custom {
            name: name.into(),
            data,
        }
    }
}

/// Broadcast bus handed to every plugin.
///
/// Emitting never blocks; subscribers that fall behind lose the oldest events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BotEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event and returns the number of subscribers reached.
    pub fn emit(&self, event: BotEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!("Event emitted with no subscriber");
                0
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_emit_reaches_subscribers() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        assert_eq!(bus.emit(BotEvent::custom("deployed", json!({"env": "prod"}))), 1);
        assert_eq!(
            rx.recv().await.unwrap(),
            BotEvent::custom("deployed", json!({"env": "prod"}))
        );
    }

    #[test]
    fn test_emit_without_subscribers() {
        assert_eq!(EventBus::new(4).emit(BotEvent::custom("x", Value::Null)), 0);
    }
}
