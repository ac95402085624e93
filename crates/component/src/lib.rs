//! Base object model for declarative components: a property store with change
//! detection, dual event emission, listener/action chains triggered by events,
//! and additive schema fragments.

mod component;
pub mod error;
pub mod event;
pub mod identity;
pub mod listener;
pub mod property;
pub mod schema;
pub mod settings;

pub use component::{Component, ComponentBuilder};
pub use error::{ComponentError, Result};
pub use event::{Event, SubscriptionId};
pub use identity::{ComponentKey, KeyGenerator};
pub use listener::{Action, ActionContext, Listener};
pub use property::Props;
pub use schema::{Compiler, ComponentType, Form};
pub use settings::{load_settings, load_settings_from, FiringPolicy, Settings};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
