use std::{collections::BTreeMap, fs, path::PathBuf};

use eyre::Context;
use serde::Deserialize;
use serde_json::Value;

use crate::{logger::DEFAULT_QUEUE_CAPACITY, Logger};

/// Application level settings, read from a JSON file.
///
/// `engines` maps an engine name to that engine's own config document, which
/// is handed to [`Logger::activate_engine`] unchanged.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub level: String,
    pub queue_capacity: usize,
    pub call_site: bool,
    pub call_site_skip_frames: usize,
    pub console: bool,
    pub engines: BTreeMap<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            level: "trace".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            call_site: false,
            call_site_skip_frames: 0,
            console: true,
            engines: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn from_json(contents: &str) -> eyre::Result<Self> {
        serde_json::from_str(contents).context("Malformed settings file")
    }

    /// Builds a logger and activates every configured engine.
    ///
    /// The default console engine is dropped when `console` is `false`, or
    /// reconfigured when `engines` has an entry for it.
    pub fn build_logger(&self) -> eyre::Result<Logger> {
        let logger = Logger::new(self.queue_capacity);
        logger
            .set_level(&self.level)
            .set_call_site_tracking(self.call_site)
            .set_call_site_skip_frames(self.call_site_skip_frames);

        if !self.console || self.engines.contains_key("console") {
            logger.deactivate_engine("console")?;
        }

        for (name, config) in &self.engines {
            if name == "console" && !self.console {
                continue;
            }

            let config = match config {
                Value::Null => String::new(),
                Value::String(raw) => raw.clone(),
                other => other.to_string(),
            };

            logger
                .activate_engine(name, &config)
                .with_context(|| format!("Failed activating engine {}", name))?;
        }

        Ok(logger)
    }
}

pub trait ConfigManager: Sized + Clone + Send + Sync {
    fn get_settings_path(&self) -> eyre::Result<PathBuf>;

    fn load(&self) -> eyre::Result<Settings>;
}

/// Resolves settings from an explicit path, or from the per-user config
/// directory when none is given.
#[derive(Default, Clone, Debug)]
pub struct LocalConfigManager {
    path: Option<PathBuf>,
}

impl LocalConfigManager {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

// NOTE: HOME is expected to be set; without it the per-user location is
// skipped and defaults apply.
#[cfg(not(target_os = "windows"))]
pub fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(target_os = "windows")]
pub fn home_dir() -> Option<PathBuf> {
    std::env::var("USERPROFILE").ok().map(PathBuf::from)
}

pub fn config_dir() -> Option<PathBuf> {
    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .ok()
        .or_else(|| home_dir().map(|home| home.join(".config")))?;

    Some(config_dir.join("fanlog"))
}

impl ConfigManager for LocalConfigManager {
    fn get_settings_path(&self) -> eyre::Result<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }

        config_dir()
            .map(|dir| dir.join("config.json"))
            .ok_or_else(|| eyre::eyre!("Can't locate a config directory, HOME is not set"))
    }

    fn load(&self) -> eyre::Result<Settings> {
        let path = match self.get_settings_path() {
            Ok(path) => path,
            Err(_) if self.path.is_none() => return Ok(Settings::default()),
            Err(err) => return Err(err),
        };

        if !path.exists() && self.path.is_none() {
            tracing::debug!(target: "fanlog", "no settings at {}, using defaults", path.display());
            return Ok(Settings::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed reading settings file {}", path.display()))?;

        Settings::from_json(&contents)
    }
}
