// SPDX-License-Identifier: GPL-3.0-only

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use storage_orchestrator::OrchestratorConfig;

pub const CONFIG_FILE: &str = "storage-admin.toml";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LoggingLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LoggingLevel {
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct Config {
    pub log_to_disk: bool,
    pub log_level: LoggingLevel,
    pub orchestrator: OrchestratorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_to_disk: true,
            log_level: LoggingLevel::Info,
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl Config {
    /// An explicit path must exist; the default location may be absent
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (default_path(), false),
        };
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        Self::from_toml_str(&contents).with_context(|| format!("loading {}", path.display()))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.orchestrator.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn default_path() -> PathBuf {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(dir).join("storage-admin").join(CONFIG_FILE);
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("storage-admin")
            .join(CONFIG_FILE);
    }
    PathBuf::from(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::from_toml_str("").unwrap(), Config::default());
    }

    #[test]
    fn orchestrator_table_is_embedded() {
        let config = Config::from_toml_str(
            r#"
            log_level = "debug"
            log_to_disk = false

            [orchestrator]
            poll_interval_secs = 30

            [orchestrator.status_cache]
            ttl_secs = 60
            "#,
        )
        .unwrap();
        assert_eq!(config.log_level, LoggingLevel::Debug);
        assert!(!config.log_to_disk);
        assert_eq!(config.orchestrator.poll_interval_secs, 30);
        assert_eq!(config.orchestrator.status_cache.ttl_secs, 60);
        assert_eq!(config.orchestrator.status_cache.throttle_ms, 2000);
    }

    #[test]
    fn invalid_orchestrator_section_is_rejected() {
        let err = Config::from_toml_str(
            r#"
            [orchestrator]
            primary_destination = "attic"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("attic"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/storage-admin.toml"))).is_err());
    }

    #[test]
    fn rendered_config_parses_back() {
        let rendered = Config::default().to_toml().unwrap();
        assert_eq!(Config::from_toml_str(&rendered).unwrap(), Config::default());
    }
}
