//! The generic component handle.

use std::sync::{Arc, OnceLock, Weak};

use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use shared::{
    domain::{is_lifecycle_event, CHANGE, CREATE, LOAD},
    protocol::ComponentSnapshot,
};
use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    error::{ComponentError, Result},
    event::{Event, EventBus, Filter, Handler, Origin, SubscriptionId},
    identity::{ComponentKey, KeyGenerator},
    listener::{self, Listener},
    property::{PropertyStore, Props, LISTENERS, NAME, PASSED, SCHEMA},
    schema::ComponentType,
    settings::Settings,
};

/// Shared handle to one component instance. Cloning the handle does not copy
/// the component; use [`Component::duplicate`] for that.
#[derive(Clone)]
pub struct Component {
    inner: Arc<ComponentInner>,
}

struct ComponentInner {
    kind: ComponentType,
    keys: KeyGenerator,
    key: OnceLock<ComponentKey>,
    store: RwLock<PropertyStore>,
    events: EventBus,
    settings: Settings,
}

#[derive(Clone)]
pub(crate) struct WeakComponent(Weak<ComponentInner>);

impl WeakComponent {
    pub(crate) fn upgrade(&self) -> Option<Component> {
        self.0.upgrade().map(|inner| Component { inner })
    }
}

pub struct ComponentBuilder {
    keys: KeyGenerator,
    kind: ComponentType,
    settings: Settings,
    name: Option<String>,
    props: Props,
}

impl ComponentBuilder {
    pub fn kind(mut self, kind: ComponentType) -> Self {
        self.kind = kind;
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    /// Sets the name, stacks the type's schema fragments base-first, applies
    /// the supplied props, fires `create` and only then issues the key.
    pub async fn build(self) -> Result<Component> {
        let store = PropertyStore::new(self.kind.properties().iter().map(String::as_str));
        let component = Component {
            inner: Arc::new(ComponentInner {
                events: EventBus::new(self.settings.event_buffer),
                keys: self.keys,
                key: OnceLock::new(),
                store: RwLock::new(store),
                kind: self.kind,
                settings: self.settings,
            }),
        };
        listener::wire(&component, &[], component.inner.settings.firing_policy);

        if let Some(name) = self.name {
            component.set(Props::new().with(NAME, name)).await?;
        }
        for fragment in component.inner.kind.fragments().to_vec() {
            component.append_schema(fragment).await?;
        }
        component.set(self.props).await?;
        component.broadcast(Event::new(CREATE, Value::Null)).await?;

        let key = component.inner.keys.issue();
        let _ = component.inner.key.set(key);
        debug!(key = %key, kind = component.inner.kind.name(), "component created");
        Ok(component)
    }
}

impl Component {
    pub fn builder(keys: &KeyGenerator) -> ComponentBuilder {
        ComponentBuilder {
            keys: keys.clone(),
            kind: ComponentType::base(),
            settings: Settings::default(),
            name: None,
            props: Props::new(),
        }
    }

    /// Builds a base component from constructor props.
    pub async fn new(keys: &KeyGenerator, props: Props) -> Result<Self> {
        Self::builder(keys).props(props).build().await
    }

    /// `None` only while construction is still settling `create`.
    pub fn key(&self) -> Option<ComponentKey> {
        self.inner.key.get().copied()
    }

    pub fn kind(&self) -> &ComponentType {
        &self.inner.kind
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub fn ptr_eq(&self, other: &Component) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakComponent {
        WeakComponent(Arc::downgrade(&self.inner))
    }

    pub(crate) fn bus(&self) -> &EventBus {
        &self.inner.events
    }

    /// Whether the component itself has an emission path for `event`.
    pub(crate) fn emits(&self, event: &str) -> bool {
        is_lifecycle_event(event) || event == CHANGE || self.inner.store.read().recognizes(event)
    }

    pub async fn set(&self, props: Props) -> Result<()> {
        let (entries, listeners) = props.into_parts();

        for (name, value) in entries {
            let changed = {
                let mut store = self.inner.store.write();
                if !store.recognizes(&name) {
                    debug!(key = ?self.key(), property = %name, "ignoring unrecognized property");
                    continue;
                }
                store.assign(&name, value)
            };
            match changed {
                Some(value) => self.emit_change(&name, value).await?,
                None => debug!(key = ?self.key(), property = %name, "unchanged, nothing emitted"),
            }
        }

        if let Some(listeners) = listeners {
            let changed = self.inner.store.write().replace_listeners(listeners.clone());
            listener::wire(self, &listeners, self.inner.settings.firing_policy);
            match changed {
                Some(described) => self.emit_change(LISTENERS, described).await?,
                None => debug!(key = ?self.key(), "listeners rewired, declaration unchanged"),
            }
        }
        Ok(())
    }

    /// Generic setter for untyped input; anything but a JSON object is rejected
    /// before any mutation.
    pub async fn set_json(&self, props: Value) -> Result<()> {
        self.set(Props::try_from(props)?).await
    }

    /// Allow-listed snapshot: `name`, `listeners`, `passed` and `schema`.
    pub fn get(&self) -> Value {
        self.inner.store.read().snapshot()
    }

    /// One allow-listed value, `None` for any other name.
    pub fn get_one(&self, name: &str) -> Option<Value> {
        self.inner.store.read().allow_listed(name)
    }

    pub fn get_many(&self, names: &[&str]) -> Map<String, Value> {
        self.inner.store.read().partial(names.iter().copied())
    }

    /// Any recognized property, including ones declared by the component type.
    pub fn value(&self, name: &str) -> Option<Value> {
        self.inner.store.read().value(name)
    }

    pub fn name(&self) -> Option<String> {
        match self.inner.store.read().value(NAME) {
            Some(Value::String(name)) => Some(name),
            _ => None,
        }
    }

    pub async fn set_name(&self, name: impl Into<String>) -> Result<()> {
        self.set(Props::new().with(NAME, name.into())).await
    }

    pub fn passed(&self) -> Value {
        self.inner.store.read().value(PASSED).unwrap_or(Value::Null)
    }

    pub async fn set_passed(&self, passed: Value) -> Result<()> {
        self.set(Props::new().with(PASSED, passed)).await
    }

    pub fn schema(&self) -> Vec<Value> {
        self.inner.store.read().schema().to_vec()
    }

    pub async fn append_schema(&self, fragment: Value) -> Result<()> {
        self.set(Props::new().with(SCHEMA, fragment)).await
    }

    pub fn listeners(&self) -> Vec<Listener> {
        self.inner.store.read().listeners().to_vec()
    }

    pub async fn set_listeners(&self, listeners: Vec<Listener>) -> Result<()> {
        self.set(Props::new().listeners(listeners)).await
    }

    pub fn snapshot(&self) -> ComponentSnapshot {
        ComponentSnapshot {
            key: self.key(),
            kind: self.inner.kind.name().to_string(),
            state: self.get(),
        }
    }

    pub fn on<F>(&self, event: impl Into<String>, observer: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(
            Filter::Named(event.into()),
            Origin::External,
            Handler::Observer(Arc::new(observer)),
        )
    }

    pub fn on_any<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.inner
            .events
            .subscribe(Filter::Any, Origin::External, Handler::Observer(Arc::new(observer)))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.events.len()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.inner.events.tap()
    }

    /// Fires a user event. Lifecycle events have their own triggers.
    pub async fn emit(&self, name: &str, payload: Value) -> Result<()> {
        if is_lifecycle_event(name) {
            return Err(ComponentError::invalid(format!(
                "'{name}' is a lifecycle event and cannot be emitted directly"
            )));
        }
        self.broadcast(Event::new(name, payload)).await
    }

    /// Marks initial data population as complete.
    pub async fn emit_load(&self) -> Result<()> {
        self.broadcast(Event::new(LOAD, Value::Null)).await
    }

    /// Re-emits the chosen child events as this component's own. The child
    /// keeps only a weak reference back to this component. `create` and
    /// `load` are refused: they would run this component's own lifecycle
    /// chains, which only construction and `emit_load` may start.
    pub fn bubble(&self, child: &Component, events: &[&str]) -> Result<Vec<SubscriptionId>> {
        if let Some(event) = events.iter().find(|event| matches!(**event, CREATE | LOAD)) {
            return Err(ComponentError::invalid(format!(
                "'{event}' cannot be bubbled; only its milestone can"
            )));
        }
        Ok(events
            .iter()
            .map(|event| {
                let parent = self.downgrade();
                child.inner.events.subscribe(
                    Filter::Named(event.to_string()),
                    Origin::Bubble,
                    Handler::Async(Arc::new(move |event: Event| {
                        let parent = parent.clone();
                        async move {
                            match parent.upgrade() {
                                Some(parent) => parent.broadcast(event).await,
                                None => Ok(()),
                            }
                        }
                        .boxed()
                    })),
                )
            })
            .collect())
    }

    /// Deep copy of the current property state under a freshly issued key.
    /// The copy has no subscribers and no wiring; declared listeners are kept
    /// as data and take effect once passed back through `set_listeners`.
    pub fn duplicate(&self) -> Component {
        let store = self.inner.store.read().clone();
        let key = OnceLock::new();
        let _ = key.set(self.inner.keys.issue());
        Component {
            inner: Arc::new(ComponentInner {
                kind: self.inner.kind.clone(),
                keys: self.inner.keys.clone(),
                key,
                store: RwLock::new(store),
                events: EventBus::new(self.inner.settings.event_buffer),
                settings: self.inner.settings.clone(),
            }),
        }
    }

    pub(crate) async fn broadcast(&self, event: Event) -> Result<()> {
        self.inner.events.dispatch(event).await
    }

    async fn emit_change(&self, name: &str, value: Value) -> Result<()> {
        let specific = self.broadcast(Event::new(name, value.clone())).await;
        let aggregate = self
            .broadcast(Event::new(CHANGE, json!({ "name": name, "value": value })))
            .await;
        specific.and(aggregate)
    }
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("key", &self.key())
            .field("kind", &self.inner.kind.name())
            .field("state", &self.get())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests/component_tests.rs"]
mod tests;
