// SPDX-License-Identifier: GPL-3.0-only

//! Orchestrator configuration, loaded from TOML

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use storage_contracts::NotificationLevel;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A named place a device can be mounted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    pub mount_point: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl Destination {
    pub fn new(id: &str, mount_point: &str) -> Self {
        Self {
            id: id.to_string(),
            mount_point: mount_point.to_string(),
            label: None,
        }
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    pub fn matches_mount_point(&self, mount_point: &str) -> bool {
        same_mount_point(&self.mount_point, mount_point)
    }
}

/// Mount points compare equal regardless of a trailing slash
pub fn same_mount_point(left: &str, right: &str) -> bool {
    let trim = |mp: &str| -> String {
        let trimmed = mp.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            trimmed.to_string()
        }
    };
    trim(left) == trim(right)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusCacheConfig {
    /// How long a key-slot lookup stays valid
    pub ttl_secs: u64,
    /// Minimum gap between two lookups of the same device
    pub throttle_ms: u64,
    /// Delay between staggered lookups of different devices
    pub stagger_ms: u64,
}

impl Default for StatusCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30,
            throttle_ms: 2_000,
            stagger_ms: 300,
        }
    }
}

impl StatusCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationDurations {
    pub success_ms: u64,
    pub info_ms: u64,
    pub warning_ms: u64,
    pub error_ms: u64,
}

impl Default for NotificationDurations {
    fn default() -> Self {
        Self {
            success_ms: 3_000,
            info_ms: 4_000,
            warning_ms: 5_000,
            error_ms: 6_000,
        }
    }
}

impl NotificationDurations {
    pub fn for_level(&self, level: NotificationLevel) -> Duration {
        let ms = match level {
            NotificationLevel::Success => self.success_ms,
            NotificationLevel::Info => self.info_ms,
            NotificationLevel::Warning => self.warning_ms,
            NotificationLevel::Error => self.error_ms,
        };
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub destinations: Vec<Destination>,
    /// Shared primary mount point; unmounting it negotiates dependent services
    pub primary_destination: String,
    /// Sync target for the primary destination
    pub secondary_destination: String,
    pub status_cache: StatusCacheConfig,
    /// Fallback polling of sync and drive-test status
    pub poll_interval_secs: u64,
    pub notifications: NotificationDurations,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            destinations: vec![
                Destination {
                    id: "nas".to_string(),
                    mount_point: "/mnt/nas".to_string(),
                    label: Some("NAS".to_string()),
                },
                Destination {
                    id: "nas_backup".to_string(),
                    mount_point: "/mnt/nas_backup".to_string(),
                    label: Some("NAS Backup".to_string()),
                },
            ],
            primary_destination: "nas".to_string(),
            secondary_destination: "nas_backup".to_string(),
            status_cache: StatusCacheConfig::default(),
            poll_interval_secs: 10,
            notifications: NotificationDurations::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Load from `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(?path, "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for destination in &self.destinations {
            if destination.id.trim().is_empty() || destination.mount_point.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "destinations need a non-empty id and mount_point".to_string(),
                ));
            }
            if !seen.insert(destination.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate destination id '{}'",
                    destination.id
                )));
            }
        }
        for (role, id) in [
            ("primary_destination", &self.primary_destination),
            ("secondary_destination", &self.secondary_destination),
        ] {
            if self.destination(id).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{role} '{id}' is not a configured destination"
                )));
            }
        }
        if self.primary_destination == self.secondary_destination {
            return Err(ConfigError::Invalid(
                "primary and secondary destinations must differ".to_string(),
            ));
        }
        if self.status_cache.throttle() >= self.status_cache.ttl() {
            return Err(ConfigError::Invalid(
                "status_cache.throttle_ms must be shorter than status_cache.ttl_secs".to_string(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn destination(&self, id: &str) -> Option<&Destination> {
        self.destinations.iter().find(|d| d.id == id)
    }

    pub fn destination_for_mount_point(&self, mount_point: &str) -> Option<&Destination> {
        self.destinations
            .iter()
            .find(|d| d.matches_mount_point(mount_point))
    }

    pub fn primary(&self) -> Option<&Destination> {
        self.destination(&self.primary_destination)
    }

    pub fn secondary(&self) -> Option<&Destination> {
        self.destination(&self.secondary_destination)
    }

    pub fn is_primary_mount_point(&self, mount_point: &str) -> bool {
        self.primary()
            .is_some_and(|primary| primary.matches_mount_point(mount_point))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
