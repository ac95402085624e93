//! Declared listeners and the subscriptions compiled from them.
//!
//! Wiring is rebuilt from scratch whenever `listeners` is set. Listeners on
//! `create` and `load` are folded into one gate per event which emits the
//! matching milestone only after every declared chain resolved. Events with no
//! declared listener keep a pass-through that emits the milestone right away.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{json, Value};
use shared::domain::{CREATE, CREATED, LOAD, LOADED};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::{
    component::{Component, WeakComponent},
    error::{ComponentError, Result},
    event::{Event, Filter, Handler, Origin},
    settings::FiringPolicy,
};

/// An injected unit of work run as one step of a listener chain.
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &str {
        "action"
    }

    async fn run(&self, ctx: ActionContext) -> anyhow::Result<Value>;
}

#[derive(Clone)]
pub struct ActionContext {
    pub event: String,
    pub component: Component,
    /// The component's `passed` property, read once when the firing starts.
    pub if_data: Value,
    /// The previous action's result, or the event payload for the first action.
    pub arguments: Value,
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("event", &self.event)
            .field("component", &self.component.key())
            .field("if_data", &self.if_data)
            .field("arguments", &self.arguments)
            .finish()
    }
}

#[derive(Clone)]
pub struct Listener {
    event: String,
    actions: Vec<Arc<dyn Action>>,
}

impl Listener {
    pub fn new(event: impl Into<String>, actions: Vec<Arc<dyn Action>>) -> Self {
        Self {
            event: event.into(),
            actions,
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    pub(crate) fn same_as(&self, other: &Listener) -> bool {
        self.event == other.event
            && self.actions.len() == other.actions.len()
            && self
                .actions
                .iter()
                .zip(&other.actions)
                .all(|(a, b)| Arc::ptr_eq(a, b))
    }

    pub(crate) fn describe(&self) -> Value {
        let actions: Vec<&str> = self.actions.iter().map(|action| action.name()).collect();
        json!({ "event": self.event, "actions": actions })
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actions: Vec<&str> = self.actions.iter().map(|action| action.name()).collect();
        f.debug_struct("Listener")
            .field("event", &self.event)
            .field("actions", &actions)
            .finish()
    }
}

struct Chain {
    event: String,
    actions: Vec<Arc<dyn Action>>,
    gate: Option<AsyncMutex<()>>,
}

impl Chain {
    fn new(listener: &Listener, policy: FiringPolicy) -> Self {
        Self {
            event: listener.event.clone(),
            actions: listener.actions.clone(),
            gate: match policy {
                FiringPolicy::Serialized => Some(AsyncMutex::new(())),
                FiringPolicy::Concurrent => None,
            },
        }
    }

    async fn run(&self, component: &Component, payload: Value) -> Result<Value> {
        let _serialized = match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        };

        let if_data = component.passed();
        let mut arguments = payload;
        for (index, action) in self.actions.iter().enumerate() {
            let ctx = ActionContext {
                event: self.event.clone(),
                component: component.clone(),
                if_data: if_data.clone(),
                arguments,
            };
            arguments = action.run(ctx).await.map_err(|source| {
                warn!(
                    key = ?component.key(),
                    event = %self.event,
                    index,
                    action = action.name(),
                    "listener chain aborted: {source:#}"
                );
                ComponentError::ActionFailure {
                    event: self.event.clone(),
                    index,
                    action: action.name().to_string(),
                    source,
                }
            })?;
        }
        Ok(arguments)
    }
}

pub(crate) fn wire(component: &Component, listeners: &[Listener], policy: FiringPolicy) {
    let bus = component.bus();
    let cleared = bus.remove_origin(Origin::DefaultMilestone) + bus.remove_origin(Origin::Wiring);
    let weak = component.downgrade();

    for (base, milestone) in [(CREATE, CREATED), (LOAD, LOADED)] {
        let chains: Vec<Chain> = listeners
            .iter()
            .filter(|listener| listener.event == base)
            .map(|listener| Chain::new(listener, policy))
            .collect();
        let origin = if chains.is_empty() {
            Origin::DefaultMilestone
        } else {
            Origin::Wiring
        };
        bus.subscribe(
            Filter::Named(base.to_string()),
            origin,
            milestone_gate(weak.clone(), milestone, chains),
        );
    }

    for listener in listeners
        .iter()
        .filter(|listener| listener.event != CREATE && listener.event != LOAD)
    {
        if !component.emits(&listener.event) {
            debug!(
                key = ?component.key(),
                event = %listener.event,
                "listener waits on an event this component never emits by itself"
            );
        }
        let chain = Arc::new(Chain::new(listener, policy));
        let weak = weak.clone();
        bus.subscribe(
            Filter::Named(listener.event.clone()),
            Origin::Wiring,
            Handler::Async(Arc::new(move |event: Event| {
                let weak = weak.clone();
                let chain = Arc::clone(&chain);
                async move {
                    let Some(component) = weak.upgrade() else {
                        return Ok(());
                    };
                    chain.run(&component, event.payload).await.map(|_| ())
                }
                .boxed()
            })),
        );
    }

    debug!(
        key = ?component.key(),
        cleared,
        listeners = listeners.len(),
        "listener wiring rebuilt"
    );
}

fn milestone_gate(weak: WeakComponent, milestone: &'static str, chains: Vec<Chain>) -> Handler {
    let chains = Arc::new(chains);
    Handler::Async(Arc::new(move |event: Event| {
        let weak = weak.clone();
        let chains = Arc::clone(&chains);
        async move {
            let Some(component) = weak.upgrade() else {
                return Ok(());
            };

            let mut first_error: Option<ComponentError> = None;
            for chain in chains.iter() {
                if let Err(err) = chain.run(&component, event.payload.clone()).await {
                    first_error.get_or_insert(err);
                }
            }
            if let Some(err) = first_error {
                warn!(key = ?component.key(), milestone, "milestone skipped for this firing");
                return Err(err);
            }

            if !chains.is_empty() {
                info!(key = ?component.key(), milestone, chains = chains.len(), "listener chains settled");
            }
            component
                .broadcast(Event::new(milestone, event.payload))
                .await
        }
        .boxed()
    }))
}

#[cfg(test)]
#[path = "tests/listener_tests.rs"]
mod tests;
