//! Self-describing schema fragments and their materialization into a form.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    component::Component,
    error::{ComponentError, Result},
};

/// A component type: its own schema fragments (base-first) plus any
/// properties it recognizes beyond the allow-listed ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentType {
    name: String,
    fragments: Vec<Value>,
    properties: Vec<String>,
}

impl ComponentType {
    pub const BASE: &'static str = "Component";

    /// A type with no fragments of its own.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fragments: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn base() -> Self {
        Self::new(Self::BASE).with_fragment(base_fragment())
    }

    /// A new type layered on top of this one. Fragments added to the derived
    /// type come after every fragment inherited from `self`.
    pub fn derive(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fragments: self.fragments.clone(),
            properties: self.properties.clone(),
        }
    }

    pub fn with_fragment(mut self, fragment: Value) -> Self {
        self.fragments.push(fragment);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.properties.contains(&name) {
            self.properties.push(name);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fragments(&self) -> &[Value] {
        &self.fragments
    }

    pub fn properties(&self) -> &[String] {
        &self.properties
    }
}

impl Default for ComponentType {
    fn default() -> Self {
        Self::base()
    }
}

/// Fragment every component starts with: a form editing its own name.
pub fn base_fragment() -> Value {
    json!({
        "component": "Form",
        "fields": [
            {
                "name": "name",
                "component": "TextField",
                "label": "Name",
                "required": true
            }
        ]
    })
}

/// Materializes a runtime component from one schema fragment.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn new_component(&self, fragment: &Value) -> anyhow::Result<Component>;
}

/// The consumer that receives materialized fields.
pub trait Form: Send + Sync {
    fn copy_fields(&self, other: &Component) -> anyhow::Result<()>;
}

impl Component {
    /// Compiles every accumulated fragment in order and merges each result
    /// into `form`. Returns the number of fragments consumed.
    pub async fn build_schema_form(&self, form: &dyn Form, compiler: &dyn Compiler) -> Result<usize> {
        let fragments = self.schema();
        for (index, fragment) in fragments.iter().enumerate() {
            let sub = compiler
                .new_component(fragment)
                .await
                .map_err(ComponentError::Collaborator)?;
            form.copy_fields(&sub).map_err(ComponentError::Collaborator)?;
            debug!(key = ?self.key(), index, "schema fragment merged into form");
        }
        Ok(fragments.len())
    }
}

#[cfg(test)]
#[path = "tests/schema_tests.rs"]
mod tests;
