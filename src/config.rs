//! Settings management for ptyhub.
//!
//! Loads TOML settings from `~/.ptyhub/config.toml`. Every field has a
//! default, so a partial (or missing) file is fine.
//!
//! ```toml
//! # Shell override (optional); defaults to the platform shell
//! shell = "/bin/zsh"
//!
//! # Modal (vim-style) input
//! vim_mode = true
//! initial_mode = "insert"   # or "normal"
//!
//! # Copy the selection to the clipboard as soon as it is made
//! copy_on_select = false
//! ```

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::input::Mode;

/// User-facing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Shell command override.
    pub shell: Option<String>,
    /// Whether modal input is enabled.
    pub vim_mode: bool,
    /// Router mode at session start.
    pub initial_mode: Mode,
    /// Copy-on-select behavior.
    pub copy_on_select: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shell: None,
            vim_mode: false,
            initial_mode: Mode::Insert,
            copy_on_select: false,
        }
    }
}

impl Settings {
    /// Load settings from the config file, falling back to defaults.
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    if let Ok(settings) = toml::from_str(&content) {
                        return settings;
                    }
                }
            }
        }
        Self::default()
    }

    /// Save settings to the config file.
    #[allow(dead_code)]
    pub fn save(&self) -> Result<(), String> {
        if let Some(path) = Self::config_path() {
            let content = toml::to_string_pretty(self)
                .map_err(|e| format!("Failed to serialize settings: {}", e))?;
            fs::write(&path, content).map_err(|e| format!("Failed to write settings: {}", e))?;
            Ok(())
        } else {
            Err("Could not determine config path".to_string())
        }
    }

    fn config_path() -> Option<PathBuf> {
        let dir = home_dir()?.join(".ptyhub");
        if !dir.exists() {
            let _ = fs::create_dir_all(&dir);
        }
        Some(dir.join("config.toml"))
    }
}

/// Home directory, resolved from the environment.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert!(!settings.vim_mode);
        assert_eq!(settings.initial_mode, Mode::Insert);
        assert!(!settings.copy_on_select);
        assert!(settings.shell.is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let settings: Settings = toml::from_str("vim_mode = true").expect("parse");
        assert!(settings.vim_mode);
        assert_eq!(settings.initial_mode, Mode::Insert);
    }

    #[test]
    fn initial_mode_parses_lowercase() {
        let settings: Settings =
            toml::from_str("vim_mode = true\ninitial_mode = \"normal\"").expect("parse");
        assert_eq!(settings.initial_mode, Mode::Normal);
    }

    #[test]
    fn round_trips_through_toml() {
        let mut settings = Settings::default();
        settings.shell = Some("/bin/zsh".to_string());
        settings.vim_mode = true;
        let text = toml::to_string(&settings).expect("serialize");
        let parsed: Settings = toml::from_str(&text).expect("parse");
        assert_eq!(parsed.shell.as_deref(), Some("/bin/zsh"));
        assert!(parsed.vim_mode);
    }
}
