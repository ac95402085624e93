use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

use super::*;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name: &str| vars.get(name).cloned()
}

#[test]
fn parses_firing_policy_names() {
    assert_eq!("Serialized".parse::<FiringPolicy>(), Ok(FiringPolicy::Serialized));
    assert_eq!(" concurrent ".parse::<FiringPolicy>(), Ok(FiringPolicy::Concurrent));
    assert!("sometimes".parse::<FiringPolicy>().is_err());
}

#[test]
fn env_overrides_later_names_win() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env_from(&[
            ("COMPONENT_FIRING_POLICY", "concurrent"),
            ("APP__FIRING_POLICY", "serialized"),
            ("COMPONENT_EVENT_BUFFER", "64"),
            ("RUST_LOG", "component=debug"),
        ]),
    );
    assert_eq!(settings.firing_policy, FiringPolicy::Serialized);
    assert_eq!(settings.event_buffer, 64);
    assert_eq!(settings.log_filter, "component=debug");
}

#[test]
fn unparseable_env_values_keep_defaults() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env_from(&[
            ("COMPONENT_FIRING_POLICY", "whenever"),
            ("APP__EVENT_BUFFER", "lots"),
        ]),
    );
    assert_eq!(settings, Settings::default());
}

#[test]
fn out_of_range_event_buffers_are_ignored() {
    let mut settings = Settings::default();
    apply_env(
        &mut settings,
        env_from(&[
            ("COMPONENT_EVENT_BUFFER", "18446744073709551615"),
            ("APP__EVENT_BUFFER", "0"),
        ]),
    );
    assert_eq!(settings.event_buffer, 1024);

    let file_cfg: FileSettings = toml::from_str("event_buffer = 10000000\n").expect("toml");
    apply_file(&mut settings, file_cfg);
    assert_eq!(settings.event_buffer, 1024);

    let max = MAX_EVENT_BUFFER.to_string();
    apply_env(&mut settings, env_from(&[("COMPONENT_EVENT_BUFFER", max.as_str())]));
    assert_eq!(settings.event_buffer, MAX_EVENT_BUFFER);
}

#[test]
fn file_values_apply_over_defaults() {
    let file_cfg: FileSettings =
        toml::from_str("firing_policy = \"serialized\"\nlog_filter = \"warn\"\n").expect("toml");
    let mut settings = Settings::default();
    apply_file(&mut settings, file_cfg);
    assert_eq!(settings.firing_policy, FiringPolicy::Serialized);
    assert_eq!(settings.event_buffer, 1024);
    assert_eq!(settings.log_filter, "warn");
}

#[test]
fn reads_settings_file_from_disk() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("component_settings_test_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp root");
    let path = temp_root.join(SETTINGS_FILE);
    fs::write(&path, "event_buffer = 16\n").expect("write settings");

    let settings = load_settings_from(&path);
    if env::var("COMPONENT_EVENT_BUFFER").is_err() && env::var("APP__EVENT_BUFFER").is_err() {
        assert_eq!(settings.event_buffer, 16);
    }

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[test]
fn missing_or_broken_file_falls_back_to_defaults() {
    let missing = env::temp_dir().join("component_settings_definitely_missing.toml");
    let settings = load_settings_from(&missing);
    if env::var("COMPONENT_EVENT_BUFFER").is_err() && env::var("APP__EVENT_BUFFER").is_err() {
        assert_eq!(settings.event_buffer, Settings::default().event_buffer);
    }
}
