use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

id_newtype!(ComponentKey, "c");

/// Lifecycle events that only the component itself may emit.
pub const CREATE: &str = "create";
pub const CREATED: &str = "created";
pub const LOAD: &str = "load";
pub const LOADED: &str = "loaded";

/// Aggregate event fired after every property-specific change event.
pub const CHANGE: &str = "change";

pub fn is_lifecycle_event(name: &str) -> bool {
    matches!(name, CREATE | CREATED | LOAD | LOADED)
}
