//! Subscription registry and the single emission primitive.
//!
//! Every emission goes through [`EventBus::dispatch`]: it feeds the broadcast
//! tap first, then calls the synchronous observers, then awaits the async
//! handlers (listener chains, bubbling) one at a time. Each group runs in
//! subscription order, so observers see an event before anything it triggers,
//! and a chain finishes (or fails) before the next handler starts.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use chrono::Utc;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use shared::{domain::ComponentKey, protocol::EventEnvelope};
use tokio::sync::broadcast;

use crate::error::{ComponentError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub payload: Value,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    pub fn envelope(&self, key: Option<ComponentKey>) -> EventEnvelope {
        EventEnvelope {
            key,
            event: self.name.clone(),
            payload: self.payload.clone(),
            emitted_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

pub(crate) type HandlerFuture = BoxFuture<'static, Result<()>>;

#[derive(Clone)]
pub(crate) enum Handler {
    Observer(Arc<dyn Fn(&Event) + Send + Sync>),
    Async(Arc<dyn Fn(Event) -> HandlerFuture + Send + Sync>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Filter {
    Named(String),
    Any,
}

impl Filter {
    fn matches(&self, name: &str) -> bool {
        match self {
            Filter::Named(expected) => expected == name,
            Filter::Any => true,
        }
    }
}

/// Who registered a subscription. Rewiring tears down only its own entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    External,
    Wiring,
    DefaultMilestone,
    Bubble,
}

struct Subscription {
    id: SubscriptionId,
    filter: Filter,
    origin: Origin,
    handler: Handler,
}

pub(crate) struct EventBus {
    subscriptions: Mutex<Vec<Subscription>>,
    next_id: AtomicU64,
    tap: broadcast::Sender<Event>,
}

impl EventBus {
    pub(crate) fn new(buffer: usize) -> Self {
        let (tap, _) = broadcast::channel(buffer.max(1));
        Self {
            subscriptions: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            tap,
        }
    }

    pub(crate) fn subscribe(&self, filter: Filter, origin: Origin, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions.lock().push(Subscription {
            id,
            filter,
            origin,
            handler,
        });
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.lock();
        let before = subscriptions.len();
        subscriptions.retain(|subscription| subscription.id != id);
        subscriptions.len() != before
    }

    pub(crate) fn remove_origin(&self, origin: Origin) -> usize {
        let mut subscriptions = self.subscriptions.lock();
        let before = subscriptions.len();
        subscriptions.retain(|subscription| subscription.origin != origin);
        before - subscriptions.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub(crate) fn tap(&self) -> broadcast::Receiver<Event> {
        self.tap.subscribe()
    }

    /// Runs every handler subscribed to `event.name` (or to everything). All
    /// handlers run even when one fails; the first failure is returned.
    pub(crate) async fn dispatch(&self, event: Event) -> Result<()> {
        let _ = self.tap.send(event.clone());

        let handlers: Vec<Handler> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|subscription| subscription.filter.matches(&event.name))
            .map(|subscription| subscription.handler.clone())
            .collect();

        for handler in &handlers {
            if let Handler::Observer(observe) = handler {
                observe(&event);
            }
        }

        let mut first_error: Option<ComponentError> = None;
        for handler in handlers {
            if let Handler::Async(run) = handler {
                if let Err(err) = run(event.clone()).await {
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[path = "tests/event_tests.rs"]
mod tests;
