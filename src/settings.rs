//! User settings file
//!
//! Optional `settings.toml` next to the profile directories. Anything not
//! set falls back to the built-in defaults; command-line flags override the
//! file.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::profiles;

const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Option names ignored when comparing, saving and applying layouts
    #[serde(default)]
    pub skip_options: Vec<String>,
    /// Profile to fall back to when detection finds nothing
    #[serde(default)]
    pub default_profile: Option<String>,
}

impl Settings {
    fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(profiles::PROFILE_DIR_NAME).join(SETTINGS_FILE))
    }

    /// Load the settings file, or defaults when there is none
    pub fn load() -> Result<Settings> {
        let Some(path) = Settings::settings_path() else {
            return Ok(Settings::default());
        };
        let Ok(contents) = fs::read_to_string(&path) else {
            return Ok(Settings::default());
        };
        debug!(path = %path.display(), "loading settings");
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))
    }
}

/// Normalize a list of option names: trim whitespace, drop a leading `--`
pub fn normalize_skip_options(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|option| {
            let option = option.trim();
            option.strip_prefix("--").unwrap_or(option).to_string()
        })
        .filter(|option| !option.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_parse_with_missing_fields() {
        let settings: Settings = toml::from_str("").unwrap();
        assert!(settings.skip_options.is_empty());
        assert!(settings.default_profile.is_none());

        let settings: Settings =
            toml::from_str("skip_options = [\"gamma\"]\ndefault_profile = \"mobile\"").unwrap();
        assert_eq!(settings.skip_options, vec!["gamma"]);
        assert_eq!(settings.default_profile.as_deref(), Some("mobile"));
    }

    #[test]
    fn skip_options_are_normalized() {
        let raw = vec![
            "--gamma".to_string(),
            " pos ".to_string(),
            String::new(),
        ];
        assert_eq!(normalize_skip_options(&raw), vec!["gamma", "pos"]);
    }
}
