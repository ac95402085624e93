//! Named-value storage with change detection.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{
    error::{ComponentError, Result},
    listener::Listener,
};

pub const NAME: &str = "name";
pub const LISTENERS: &str = "listeners";
pub const PASSED: &str = "passed";
pub const SCHEMA: &str = "schema";

/// The only names surfaced by the generic getters.
pub const ALLOW_LIST: [&str; 4] = [NAME, LISTENERS, PASSED, SCHEMA];

/// Ordered property intake for [`crate::Component::set`].
#[derive(Debug, Clone, Default)]
pub struct Props {
    entries: Vec<(String, Value)>,
    listeners: Option<Vec<Listener>>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    pub fn listeners(mut self, listeners: Vec<Listener>) -> Self {
        self.listeners = Some(listeners);
        self
    }

    pub(crate) fn into_parts(self) -> (Vec<(String, Value)>, Option<Vec<Listener>>) {
        (self.entries, self.listeners)
    }
}

impl TryFrom<Value> for Props {
    type Error = ComponentError;

    fn try_from(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(ComponentError::invalid(format!(
                "set expects a keyed mapping, got {}",
                json_kind(&value)
            )));
        };
        Props::try_from(map)
    }
}

impl TryFrom<Map<String, Value>> for Props {
    type Error = ComponentError;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        if map.contains_key(LISTENERS) {
            return Err(ComponentError::invalid(
                "listeners carry live actions and must be supplied with Props::listeners",
            ));
        }
        Ok(Self {
            entries: map.into_iter().collect(),
            listeners: None,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// `Unset` is "never touched"; `Set(Value::Null)` is "explicitly cleared".
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Unset,
    Set(Value),
}

impl Slot {
    fn read(&self) -> Value {
        match self {
            Slot::Unset => Value::Null,
            Slot::Set(value) => value.clone(),
        }
    }

    fn changes_to(&self, next: &Value) -> bool {
        match self {
            Slot::Unset => !next.is_null(),
            Slot::Set(current) => current != next,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct PropertyStore {
    slots: BTreeMap<String, Slot>,
    schema: Vec<Value>,
    listeners: Vec<Listener>,
}

impl PropertyStore {
    pub(crate) fn new<'a>(extra: impl IntoIterator<Item = &'a str>) -> Self {
        let slots = [NAME, PASSED]
            .into_iter()
            .chain(extra)
            .filter(|name| *name != LISTENERS && *name != SCHEMA)
            .map(|name| (name.to_string(), Slot::Unset))
            .collect();
        Self {
            slots,
            schema: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub(crate) fn recognizes(&self, name: &str) -> bool {
        name == LISTENERS || name == SCHEMA || self.slots.contains_key(name)
    }

    /// Stores `value` under `name` and returns the value to broadcast when the
    /// write is a real change. Schema writes always append.
    pub(crate) fn assign(&mut self, name: &str, value: Value) -> Option<Value> {
        if name == SCHEMA {
            self.schema.push(value);
            return Some(self.schema_value());
        }
        let slot = self.slots.get_mut(name)?;
        if !slot.changes_to(&value) {
            return None;
        }
        *slot = Slot::Set(value.clone());
        Some(value)
    }

    /// Returns the new description only when the declaration differs: same
    /// events in the same order, each with the very same action instances,
    /// counts as unchanged.
    pub(crate) fn replace_listeners(&mut self, listeners: Vec<Listener>) -> Option<Value> {
        let unchanged = self.listeners.len() == listeners.len()
            && self
                .listeners
                .iter()
                .zip(&listeners)
                .all(|(current, next)| current.same_as(next));
        self.listeners = listeners;
        if unchanged {
            None
        } else {
            Some(self.listeners_value())
        }
    }

    pub(crate) fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    pub(crate) fn schema(&self) -> &[Value] {
        &self.schema
    }

    /// Reads any recognized property, allow-listed or declared by the type.
    pub(crate) fn value(&self, name: &str) -> Option<Value> {
        match name {
            LISTENERS => Some(self.listeners_value()),
            SCHEMA => Some(self.schema_value()),
            _ => self.slots.get(name).map(Slot::read),
        }
    }

    pub(crate) fn allow_listed(&self, name: &str) -> Option<Value> {
        if ALLOW_LIST.contains(&name) {
            self.value(name)
        } else {
            None
        }
    }

    pub(crate) fn partial<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Map<String, Value> {
        names
            .into_iter()
            .filter_map(|name| Some((name.to_string(), self.allow_listed(name)?)))
            .collect()
    }

    pub(crate) fn snapshot(&self) -> Value {
        Value::Object(self.partial(ALLOW_LIST))
    }

    fn schema_value(&self) -> Value {
        Value::Array(self.schema.clone())
    }

    fn listeners_value(&self) -> Value {
        Value::Array(self.listeners.iter().map(Listener::describe).collect())
    }
}

#[cfg(test)]
#[path = "tests/property_tests.rs"]
mod tests;
