//! Persisted user preferences.
//!
//! A small JSON file under `.cache/`, read once at startup and written
//! on explicit user change only.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

const SETTINGS_FILE: &str = ".cache/settings.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub background_enabled: bool,
    pub volume: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            background_enabled: true,
            volume: 1.0,
        }
    }
}

impl Settings {
    pub fn default_path() -> PathBuf {
        PathBuf::from(SETTINGS_FILE)
    }

    /// Loads settings, falling back to defaults when the file is
    /// missing or unreadable (first run, corrupt file).
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Settings>(&content) {
                Ok(mut settings) => {
                    settings.volume = settings.volume.clamp(0.0, 1.0);
                    settings
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Settings file corrupt, using defaults");
                    Settings::default()
                }
            },
            Err(_) => Settings::default(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let content = serde_json::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
