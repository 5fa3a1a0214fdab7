use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use shared::domain::GeoPoint;
use store::{settings::DEFAULT_HOSPITAL_OFFSET, StoreSettings, TransitionPolicy};
use tracing::warn;

pub const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_bind: String,
    pub transition_policy: TransitionPolicy,
    pub simulated_latency_ms: u64,
    pub hospital_offset_degrees: f64,
    pub seed_mock_data: bool,
    pub event_buffer: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let store = StoreSettings::default();
        Self {
            server_bind: "127.0.0.1:8080".into(),
            transition_policy: store.transition_policy,
            simulated_latency_ms: store.simulated_latency.as_millis() as u64,
            hospital_offset_degrees: DEFAULT_HOSPITAL_OFFSET.latitude,
            seed_mock_data: true,
            event_buffer: store.event_capacity,
        }
    }
}

impl Settings {
    pub fn store_settings(&self) -> StoreSettings {
        StoreSettings {
            transition_policy: self.transition_policy,
            simulated_latency: Duration::from_millis(self.simulated_latency_ms),
            hospital_offset: GeoPoint::new(
                self.hospital_offset_degrees,
                self.hospital_offset_degrees,
            ),
            event_capacity: self.event_buffer,
        }
    }
}

/// Keys accepted in the settings file, paired with the environment variables that
/// override them. Later variables win.
const KEYS: &[(&str, &[&str])] = &[
    ("bind_addr", &["SERVER_BIND", "APP__BIND_ADDR"]),
    ("transition_policy", &["APP__TRANSITION_POLICY"]),
    ("simulated_latency_ms", &["APP__SIMULATED_LATENCY_MS"]),
    ("hospital_offset_degrees", &["APP__HOSPITAL_OFFSET_DEGREES"]),
    ("seed_mock_data", &["APP__SEED_MOCK_DATA"]),
    ("event_buffer", &["APP__EVENT_BUFFER"]),
];

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |name| std::env::var(name).ok())
}

pub(crate) fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match parse_file(&raw) {
            Ok(file_cfg) => {
                for (key, _) in KEYS {
                    if let Some(value) = file_cfg.get(*key) {
                        apply_or_warn(&mut settings, key, value);
                    }
                }
            }
            Err(error) => warn!(path = %path.display(), %error, "ignoring unreadable settings file"),
        }
    }

    for (key, variables) in KEYS {
        for variable in *variables {
            if let Some(value) = env(*variable) {
                apply_or_warn(&mut settings, key, &value);
            }
        }
    }

    settings
}

fn parse_file(raw: &str) -> anyhow::Result<HashMap<String, String>> {
    let table = toml::from_str::<toml::Table>(raw).context("invalid TOML")?;
    Ok(table
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                _ => return None,
            };
            Some((key, value))
        })
        .collect())
}

fn apply_or_warn(settings: &mut Settings, key: &str, value: &str) {
    if let Err(error) = apply(settings, key, value) {
        warn!(key, value, %error, "ignoring invalid setting");
    }
}

fn apply(settings: &mut Settings, key: &str, value: &str) -> anyhow::Result<()> {
    let value = value.trim();
    match key {
        "bind_addr" => settings.server_bind = value.to_string(),
        "transition_policy" => {
            settings.transition_policy = value.parse().map_err(|e: String| anyhow!(e))?
        }
        "simulated_latency_ms" => settings.simulated_latency_ms = value.parse()?,
        "hospital_offset_degrees" => {
            let degrees: f64 = value.parse()?;
            if !degrees.is_finite() {
                return Err(anyhow!("offset must be finite"));
            }
            settings.hospital_offset_degrees = degrees;
        }
        "seed_mock_data" => settings.seed_mock_data = value.parse()?,
        "event_buffer" => {
            let buffer: usize = value.parse()?;
            if buffer == 0 {
                return Err(anyhow!("event buffer must be positive"));
            }
            settings.event_buffer = buffer;
        }
        other => return Err(anyhow!("unknown setting '{other}'")),
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
