//! Configuration Management
//!
//! Persistent CLI configuration and the tunables of the reconcile loop.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default location for global resources
pub const DEFAULT_LOCATION: &str = "global";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default project ID
    #[serde(default)]
    pub project_id: Option<String>,
    /// Default location (region or `global`)
    #[serde(default)]
    pub location: Option<String>,
    /// API base URL override, e.g. for a local emulator
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub reconcile: ReconcileSettings,
}

/// Bounds and timeouts of the reconcile loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    /// Restarts of the apply cycle after a 409 conflict
    pub conflict_retries: u32,
    pub conflict_backoff_ms: u64,
    /// Wall-clock ceiling on the conflict retry loop; unset means only
    /// `conflict_retries` bounds it
    pub max_conflict_elapsed_secs: Option<u64>,
    /// Timeout of each suspension point (get, create, patch, delete, list)
    pub call_timeout_secs: u64,
    /// Interval between long-running operation status checks
    pub operation_poll_ms: u64,
    /// Existence checks after a delete before giving up
    pub delete_poll_attempts: u32,
    pub delete_poll_interval_ms: u64,
    pub page_size: u32,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            conflict_retries: 5,
            conflict_backoff_ms: 1000,
            max_conflict_elapsed_secs: None,
            call_timeout_secs: 20 * 60,
            operation_poll_ms: 1000,
            delete_poll_attempts: 10,
            delete_poll_interval_ms: 1000,
            page_size: 500,
        }
    }
}

impl ReconcileSettings {
    pub fn conflict_backoff(&self) -> Duration {
        Duration::from_millis(self.conflict_backoff_ms)
    }

    pub fn max_conflict_elapsed(&self) -> Option<Duration> {
        self.max_conflict_elapsed_secs.map(Duration::from_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn operation_poll(&self) -> Duration {
        Duration::from_millis(self.operation_poll_ms)
    }

    pub fn delete_poll_interval(&self) -> Duration {
        Duration::from_millis(self.delete_poll_interval_ms)
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gdcl").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Get effective project (config > environment)
    pub fn effective_project(&self) -> Option<String> {
        self.project_id.clone().or_else(default_project)
    }

    /// Get effective location (config > global)
    pub fn effective_location(&self) -> String {
        self.location
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string())
    }
}

/// Validate a GCP project ID format
/// Project IDs must be 6-30 characters, lowercase letters, digits, and hyphens
/// Must start with a letter and cannot end with a hyphen
pub fn validate_project_id(project: &str) -> bool {
    if project.len() < 6 || project.len() > 30 || project.ends_with('-') {
        return false;
    }
    let mut chars = project.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Project from the gcloud environment variables, first valid one wins
pub fn default_project() -> Option<String> {
    for var in ["CLOUDSDK_CORE_PROJECT", "GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"] {
        if let Ok(project) = std::env::var(var) {
            if validate_project_id(&project) {
                return Some(project);
            }
            tracing::warn!("Invalid project ID format in {}", var);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_project_id() {
        assert!(validate_project_id("my-project-1"));
        assert!(!validate_project_id("short"));
        assert!(!validate_project_id("1-starts-with-digit"));
        assert!(!validate_project_id("ends-with-hyphen-"));
        assert!(!validate_project_id("Has-Upper-Case"));
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"project_id": "my-project", "reconcile": {"conflict_retries": 2}}"#)
                .unwrap();
        assert_eq!(config.reconcile.conflict_retries, 2);
        assert_eq!(config.reconcile.delete_poll_attempts, 10);
        assert_eq!(config.effective_location(), "global");
    }
}
