use std::{fs, path::Path, str::FromStr};

use serde::Deserialize;

pub const SETTINGS_FILE: &str = "component.toml";

/// Largest accepted event tap capacity; the channel allocates it up front.
pub const MAX_EVENT_BUFFER: usize = 65_536;

fn valid_buffer(buffer: usize) -> Option<usize> {
    (1..=MAX_EVENT_BUFFER).contains(&buffer).then_some(buffer)
}

/// Whether two firings of one listener may interleave at action boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiringPolicy {
    #[default]
    Concurrent,
    Serialized,
}

impl FromStr for FiringPolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "concurrent" => Ok(Self::Concurrent),
            "serialized" | "serialised" => Ok(Self::Serialized),
            other => Err(format!("unknown firing policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub firing_policy: FiringPolicy,
    pub event_buffer: usize,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            firing_policy: FiringPolicy::Concurrent,
            event_buffer: 1024,
            log_filter: "info".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    firing_policy: Option<FiringPolicy>,
    event_buffer: Option<usize>,
    log_filter: Option<String>,
}

pub fn load_settings() -> Settings {
    load_settings_from(SETTINGS_FILE)
}

/// Defaults, then the TOML file at `path` if it parses, then env overrides.
pub fn load_settings_from(path: impl AsRef<Path>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path.as_ref()) {
        if let Ok(file_cfg) = toml::from_str::<FileSettings>(&raw) {
            apply_file(&mut settings, file_cfg);
        }
    }

    apply_env(&mut settings, |name| std::env::var(name).ok());
    settings
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.firing_policy {
        settings.firing_policy = v;
    }
    if let Some(v) = file_cfg.event_buffer.and_then(valid_buffer) {
        settings.event_buffer = v;
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    for name in ["COMPONENT_FIRING_POLICY", "APP__FIRING_POLICY"] {
        if let Some(policy) = var(name).and_then(|v| v.parse().ok()) {
            settings.firing_policy = policy;
        }
    }
    for name in ["COMPONENT_EVENT_BUFFER", "APP__EVENT_BUFFER"] {
        if let Some(buffer) = var(name)
            .and_then(|v| v.parse().ok())
            .and_then(valid_buffer)
        {
            settings.event_buffer = buffer;
        }
    }
    if let Some(filter) = var("RUST_LOG") {
        settings.log_filter = filter;
    }
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
