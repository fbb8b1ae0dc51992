// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::{Path, PathBuf};

use crate::error::Result;

use super::Settings;

impl Settings {
    /// Get the default settings file path.
    pub fn default_path() -> PathBuf {
        Self::home().join("settings.json")
    }

    /// Load settings from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load settings from a specific path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(
                target: "travel.config",
                path = %path.display(),
                "settings file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Get the home directory (~/.travel-assistant or $TRAVEL_ASSISTANT_HOME).
    pub fn home() -> PathBuf {
        if let Ok(home) = std::env::var("TRAVEL_ASSISTANT_HOME") {
            return PathBuf::from(home);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".travel-assistant")
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Unparseable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("TRAVEL_ASSISTANT_MODEL").filter(|m| !m.trim().is_empty()) {
            self.provider.model = model;
        }
        if let Some(host) = lookup("TRAVEL_ASSISTANT_HOST").filter(|h| !h.trim().is_empty()) {
            self.server.host = host;
        }
        if let Some(port) = lookup("TRAVEL_ASSISTANT_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(
                    target: "travel.config",
                    value = %port,
                    "ignoring invalid TRAVEL_ASSISTANT_PORT"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_from(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings.provider.model, Settings::default().provider.model);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"agent": {"max_iterations": 4}, "weather": {"timeout_secs": 5}}"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.agent.max_iterations, 4);
        assert_eq!(settings.weather.timeout_secs, 5);
        assert_eq!(settings.resilience.model_max_attempts, 3);
    }

    #[test]
    fn test_load_invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let env: HashMap<&str, &str> = [
            ("TRAVEL_ASSISTANT_MODEL", "openai/gpt-4o-mini"),
            ("TRAVEL_ASSISTANT_PORT", "9001"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.provider.model, "openai/gpt-4o-mini");
        assert_eq!(settings.server.port, 9001);
        assert_eq!(settings.server.host, "127.0.0.1");
    }

    #[test]
    fn test_apply_overrides_ignores_bad_port() {
        let mut settings = Settings::default();
        settings.apply_overrides(|k| (k == "TRAVEL_ASSISTANT_PORT").then(|| "eighty".to_string()));
        assert_eq!(settings.server.port, 8000);
    }
}
