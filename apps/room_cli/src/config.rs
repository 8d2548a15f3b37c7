use std::{fs, path::PathBuf};

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub broadcast: bool,
    pub log_filter: String,
    pub script_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            broadcast: false,
            log_filter: "info".into(),
            script_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    broadcast: Option<bool>,
    log_filter: Option<String>,
    script: Option<PathBuf>,
}

/// Command-line values; `None` keeps whatever the file and environment set.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub broadcast: Option<bool>,
    pub log_filter: Option<String>,
    pub script_path: Option<PathBuf>,
}

pub fn load_settings(config_path: &str, overrides: Overrides) -> anyhow::Result<Settings> {
    let raw = match fs::read_to_string(config_path) {
        Ok(raw) => Some(raw),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read config '{config_path}'"))
        }
    };

    let settings = resolve_settings(raw.as_deref(), |key| std::env::var(key).ok())
        .with_context(|| format!("invalid config '{config_path}'"))?;
    Ok(apply_overrides(settings, overrides))
}

/// Defaults, then the TOML file, then environment variables.
pub fn resolve_settings(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        let file_cfg: FileSettings = toml::from_str(raw)?;
        if let Some(v) = file_cfg.broadcast {
            settings.broadcast = v;
        }
        if let Some(v) = file_cfg.log_filter {
            settings.log_filter = v;
        }
        if let Some(v) = file_cfg.script {
            settings.script_path = Some(v);
        }
    }

    for key in ["ROOM_BROADCAST", "APP__BROADCAST"] {
        if let Some(v) = env(key).as_deref().and_then(parse_flag) {
            settings.broadcast = v;
        }
    }

    for key in ["ROOM_LOG", "APP__LOG_FILTER"] {
        if let Some(v) = env(key).filter(|v| !v.trim().is_empty()) {
            settings.log_filter = v;
        }
    }

    if let Some(v) = env("APP__SCRIPT").filter(|v| !v.trim().is_empty()) {
        settings.script_path = Some(PathBuf::from(v));
    }

    Ok(settings)
}

pub fn apply_overrides(mut settings: Settings, overrides: Overrides) -> Settings {
    if let Some(v) = overrides.broadcast {
        settings.broadcast = v;
    }
    if let Some(v) = overrides.log_filter {
        settings.log_filter = v;
    }
    if let Some(v) = overrides.script_path {
        settings.script_path = Some(v);
    }
    settings
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
