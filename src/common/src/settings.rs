//! Persisted record-page settings: recently used applications and event
//! types, per-application parameters, and the last chosen unwind method.

use crate::constants::{MAX_RECENT_ENTRIES, SETTINGS_DIR, SETTINGS_FILE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RecordSettings {
    #[serde(default)]
    pub recent_applications: Vec<String>,
    #[serde(default)]
    pub recent_event_types: Vec<String>,
    #[serde(default)]
    pub unwind_method: Option<String>,
    /// Remembered parameters keyed by application path.
    #[serde(default)]
    pub applications: HashMap<String, ApplicationSettings>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSettings {
    #[serde(default)]
    pub params: String,
    #[serde(default)]
    pub working_dir: String,
}

/// TOML-backed store. Every mutation is written through to disk so a crash
/// of the front-end never loses history.
pub struct SettingsStore {
    path: PathBuf,
    settings: RecordSettings,
}

impl SettingsStore {
    /// Opens the store at `path`, starting from defaults when the file does
    /// not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let settings = match fs::read_to_string(&path) {
            Ok(content) => toml::from_str(&content)
                .with_context(|| format!("malformed settings file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RecordSettings::default(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read settings file {}", path.display()))
            }
        };
        Ok(SettingsStore { path, settings })
    }

    /// Default location under the user's configuration directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(SETTINGS_DIR)
            .join(SETTINGS_FILE)
    }

    pub fn settings(&self) -> &RecordSettings {
        &self.settings
    }

    pub fn recent_applications(&self) -> &[String] {
        &self.settings.recent_applications
    }

    pub fn recent_event_types(&self) -> &[String] {
        &self.settings.recent_event_types
    }

    pub fn unwind_method(&self) -> Option<&str> {
        self.settings.unwind_method.as_deref()
    }

    pub fn application(&self, application: &str) -> Option<&ApplicationSettings> {
        self.settings.applications.get(application)
    }

    /// Moves `application` to the front of the recent list and remembers its
    /// parameters and working directory for the next launch.
    pub fn remember_application(
        &mut self,
        application: &str,
        params: &str,
        working_dir: &str,
    ) -> Result<()> {
        self.settings.applications.insert(
            application.to_string(),
            ApplicationSettings {
                params: params.to_string(),
                working_dir: working_dir.to_string(),
            },
        );
        remember(&mut self.settings.recent_applications, application);
        self.save()
    }

    pub fn remember_event_type(&mut self, event_type: &str) -> Result<()> {
        remember(&mut self.settings.recent_event_types, event_type);
        self.save()
    }

    pub fn set_unwind_method(&mut self, method: &str) -> Result<()> {
        self.settings.unwind_method = Some(method.to_string());
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create settings dir {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(&self.settings)?;
        fs::write(&self.path, content)
            .with_context(|| format!("failed to write settings file {}", self.path.display()))?;
        debug!("settings saved to {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Most-recently-used insert: removes an existing occurrence, prepends the
/// value and drops the oldest entries past the cap.
fn remember(list: &mut Vec<String>, value: &str) {
    if let Some(idx) = list.iter().position(|entry| entry == value) {
        list.remove(idx);
    }
    list.insert(0, value.to_string());
    list.truncate(MAX_RECENT_ENTRIES);
}
