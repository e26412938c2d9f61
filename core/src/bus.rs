//! The message bus: in-process publish/subscribe between components.
//!
//! RULE: Messages are queued on send and delivered by the scene at fixed
//! points of its update (before and after the component pass), never
//! from inside the sender's callback.

use crate::{
    query::Condition,
    types::{ComponentId, EntityId},
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub key:    String,
    pub data:   serde_json::Value,
    /// The entity that sent the message, if any. Filters need it.
    pub origin: Option<EntityId>,
}

#[derive(Debug, Clone)]
struct Subscription {
    component: ComponentId,
    filter:    Option<Condition>,
}

#[derive(Debug, Default)]
pub struct MessageBus {
    subscriptions: HashMap<String, Vec<Subscription>>,
    queue:         VecDeque<Message>,
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `component` to `key`. Subscribing again replaces the
    /// filter instead of adding a second subscription.
    pub fn subscribe(&mut self, key: &str, component: ComponentId, filter: Option<Condition>) {
        let subs = self.subscriptions.entry(key.to_string()).or_default();
        match subs.iter_mut().find(|s| s.component == component) {
            Some(existing) => existing.filter = filter,
            None => subs.push(Subscription { component, filter }),
        }
    }

    pub fn unsubscribe(&mut self, key: &str, component: ComponentId) {
        if let Some(subs) = self.subscriptions.get_mut(key) {
            subs.retain(|s| s.component != component);
            if subs.is_empty() {
                self.subscriptions.remove(key);
            }
        }
    }

    /// Drop every subscription held by `component`.
    pub fn unsubscribe_all(&mut self, component: ComponentId) {
        self.subscriptions.retain(|_, subs| {
            subs.retain(|s| s.component != component);
            !subs.is_empty()
        });
    }

    pub fn is_subscribed(&self, key: &str, component: ComponentId) -> bool {
        self.subscriptions
            .get(key)
            .is_some_and(|subs| subs.iter().any(|s| s.component == component))
    }

    pub fn send(&mut self, message: Message) {
        self.queue.push_back(message);
    }

    pub(crate) fn pop(&mut self) -> Option<Message> {
        self.queue.pop_front()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Subscribers of `key` in subscription order, with their filters.
    pub(crate) fn subscribers(&self, key: &str) -> Vec<(ComponentId, Option<Condition>)> {
        self.subscriptions
            .get(key)
            .map(|subs| subs.iter().map(|s| (s.component, s.filter.clone())).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_is_not_duplicated() {
        let mut bus = MessageBus::new();
        bus.subscribe("MOJO", ComponentId(1), None);
        bus.subscribe("MOJO", ComponentId(1), Some(Condition::any().tag("x")));
        let subs = bus.subscribers("MOJO");
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].1, Some(Condition::any().tag("x")));
    }

    #[test]
    fn unsubscribe_all_clears_every_key() {
        let mut bus = MessageBus::new();
        bus.subscribe("A", ComponentId(1), None);
        bus.subscribe("B", ComponentId(1), None);
        bus.subscribe("B", ComponentId(2), None);
        bus.unsubscribe_all(ComponentId(1));
        assert!(!bus.is_subscribed("A", ComponentId(1)));
        assert!(!bus.is_subscribed("B", ComponentId(1)));
        assert!(bus.is_subscribed("B", ComponentId(2)));
    }

    #[test]
    fn queue_is_fifo() {
        let mut bus = MessageBus::new();
        for key in ["first", "second"] {
            bus.send(Message { key: key.into(), data: serde_json::Value::Null, origin: None });
        }
        assert_eq!(bus.pending(), 2);
        assert_eq!(bus.pop().map(|m| m.key), Some("first".to_string()));
        assert_eq!(bus.pop().map(|m| m.key), Some("second".to_string()));
        assert!(bus.pop().is_none());
    }
}
