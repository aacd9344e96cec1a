// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Propagation Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) covering:
// - which ambient facets are propagated onto worker threads
// - the executor adapter's blocking pool
// - logging level and output format

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "ambient.dev/v1";
pub const KIND: &str = "PropagationConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationConfigManifest {
    /// API version (must be "ambient.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "PropagationConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: PropagationConfigSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropagationConfigSpec {
    #[serde(default)]
    pub propagation: PropagationPolicy,

    #[serde(default)]
    pub executor: ExecutorSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Which ambient facets travel with a task.
///
/// A facet that is not propagated is left unchanged on the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationPolicy {
    #[serde(default = "default_true")]
    pub security: bool,

    #[serde(default = "default_true")]
    pub frames: bool,

    #[serde(default = "default_true")]
    pub resource_scope: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSettings {
    /// Name used in logs for tasks submitted through this executor
    #[serde(default = "default_executor_name")]
    pub name: String,

    /// Upper bound on blocking-pool threads
    #[serde(default = "default_max_blocking_threads")]
    pub max_blocking_threads: usize,

    /// Name given to runtime worker threads
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "compact" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_true() -> bool {
    true
}

fn default_executor_name() -> String {
    "default".to_string()
}

fn default_max_blocking_threads() -> usize {
    64
}

fn default_thread_name() -> String {
    "ambient-worker".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for PropagationPolicy {
    fn default() -> Self {
        Self {
            security: true,
            frames: true,
            resource_scope: true,
        }
    }
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            name: default_executor_name(),
            max_blocking_threads: default_max_blocking_threads(),
            thread_name: default_thread_name(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for PropagationConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "default".to_string(),
                labels: None,
            },
            spec: PropagationConfigSpec::default(),
        }
    }
}

impl PropagationConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path.as_ref(), yaml)?;
        Ok(())
    }

    /// Parse configuration from a YAML string and validate it
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let manifest: Self = serde_yaml::from_str(yaml)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Discover a configuration file in the standard locations:
    /// 1. AMBIENT_CONFIG_PATH
    /// 2. ./ambient-config.yaml
    /// 3. ~/.ambient/config.yaml
    /// 4. /etc/ambient/config.yaml
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("AMBIENT_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("./ambient-config.yaml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user = home.join(".ambient").join("config.yaml");
            if user.exists() {
                return Some(user);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/ambient/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Ambient\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = match Self::discover_config() {
            Some(path) => {
                tracing::info!("Loading configuration from discovered path: {:?}", path);
                Self::from_yaml_file(path)?
            }
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("AMBIENT_LOG_LEVEL") {
            tracing::info!("Environment override: AMBIENT_LOG_LEVEL={}", level);
            self.spec.logging.level = level;
        }

        if let Ok(format) = std::env::var("AMBIENT_LOG_FORMAT") {
            match format.to_lowercase().as_str() {
                "compact" | "json" => {
                    tracing::info!("Environment override: AMBIENT_LOG_FORMAT={}", format);
                    self.spec.logging.format = format.to_lowercase();
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for AMBIENT_LOG_FORMAT: '{}'. Expected compact/json. Ignoring.",
                        format
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.executor.max_blocking_threads == 0 {
            anyhow::bail!("spec.executor.max_blocking_threads must be greater than zero");
        }

        if self.spec.executor.thread_name.is_empty() {
            anyhow::bail!("spec.executor.thread_name cannot be empty");
        }

        if !matches!(self.spec.logging.format.as_str(), "compact" | "json") {
            anyhow::bail!(
                "Invalid spec.logging.format: '{}'. Must be 'compact' or 'json'",
                self.spec.logging.format
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = PropagationConfigManifest::default();
        assert_eq!(manifest.api_version, "ambient.dev/v1");
        assert_eq!(manifest.kind, "PropagationConfig");
        assert_eq!(manifest.spec.propagation, PropagationPolicy::default());
        assert_eq!(manifest.spec.executor.max_blocking_threads, 64);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_partial_spec_uses_defaults() {
        let yaml = r#"
apiVersion: ambient.dev/v1
kind: PropagationConfig
metadata:
  name: batch-workers
spec:
  propagation:
    frames: false
  executor:
    max_blocking_threads: 8
"#;
        let manifest = PropagationConfigManifest::from_yaml_str(yaml).unwrap();

        assert_eq!(manifest.metadata.name, "batch-workers");
        assert!(manifest.spec.propagation.security);
        assert!(!manifest.spec.propagation.frames);
        assert!(manifest.spec.propagation.resource_scope);
        assert_eq!(manifest.spec.executor.max_blocking_threads, 8);
        assert_eq!(manifest.spec.executor.thread_name, "ambient-worker");
        assert_eq!(manifest.spec.logging.level, "info");
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ambient-config.yaml");

        let mut manifest = PropagationConfigManifest::default();
        manifest.metadata.name = "edge".to_string();
        manifest.spec.logging.format = "json".to_string();
        manifest.to_yaml_file(&path).unwrap();

        let loaded = PropagationConfigManifest::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.metadata.name, "edge");
        assert_eq!(loaded.spec.executor, ExecutorSettings::default());
    }

    #[test]
    fn test_missing_explicit_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = PropagationConfigManifest::load_or_default(Some(dir.path().join("absent.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_validation() {
        let mut manifest = PropagationConfigManifest::default();
        assert!(manifest.validate().is_ok());

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.kind = "NodeConfig".to_string();
        assert!(manifest.validate().is_err());
        manifest.kind = KIND.to_string();

        manifest.metadata.name = "".to_string();
        assert!(manifest.validate().is_err());
        manifest.metadata.name = "default".to_string();

        manifest.spec.executor.max_blocking_threads = 0;
        assert!(manifest.validate().is_err());
        manifest.spec.executor.max_blocking_threads = 4;

        manifest.spec.logging.format = "xml".to_string();
        assert!(manifest.validate().is_err());
    }
}
