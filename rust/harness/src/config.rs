//! Configuration parsing for the regression harness.

use std::path::{Path, PathBuf};

use bamboo_config::SchedulerSettings;
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from `bamboo.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    #[serde(default)]
    pub sweep: SweepSettings,
}

/// Model sweep settings. Relative paths are resolved against the repository root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Directory tree searched for model files.
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,
    /// Directory holding the `data_reader_*.prototext` files.
    #[serde(default = "default_data_readers_dir")]
    pub data_readers_dir: PathBuf,
    /// Optimizer configuration used for every setup check.
    #[serde(default = "default_optimizer")]
    pub optimizer: PathBuf,
    /// Who to ask about models without a known data reader.
    #[serde(default = "default_contact")]
    pub contact: String,
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("model_zoo/models")
}

fn default_data_readers_dir() -> PathBuf {
    PathBuf::from("model_zoo/data_readers")
}

fn default_optimizer() -> PathBuf {
    PathBuf::from("model_zoo/optimizers/opt_adagrad.prototext")
}

fn default_contact() -> String {
    "Dylan".to_string()
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            data_readers_dir: default_data_readers_dir(),
            optimizer: default_optimizer(),
            contact: default_contact(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().display().to_string(), e))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load `path` if it exists, otherwise fall back to the built-in defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            tracing::debug!(
                "No config at {}, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use bamboo_config::Cluster;
    use tempfile::tempdir;

    use super::*;

    fn parse_config(toml_str: &str) -> HarnessConfig {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bamboo.toml");
        std::fs::write(&path, toml_str).unwrap();
        HarnessConfig::load(&path).unwrap()
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("");
        assert_eq!(config.scheduler.partition, "pdebug");
        assert_eq!(config.scheduler.time_limit_minutes, 60);
        assert_eq!(config.sweep.models_dir, PathBuf::from("model_zoo/models"));
        assert_eq!(config.sweep.contact, "Dylan");
    }

    #[test]
    fn test_overrides_applied() {
        let config = parse_config(
            r#"
[scheduler]
partition = "pbatch"
setup_time_limit_minutes = 5

[scheduler.partitions]
ray = "pdebug"

[sweep]
contact = "the model zoo owners"
optimizer = "model_zoo/optimizers/opt_sgd.prototext"
"#,
        );
        assert_eq!(config.scheduler.partition, "pbatch");
        assert_eq!(config.scheduler.setup_time_limit_minutes, 5);
        assert_eq!(
            config.scheduler.partition_for(&Cluster::from("ray")),
            "pdebug"
        );
        assert_eq!(config.sweep.contact, "the model zoo owners");
        assert_eq!(
            config.sweep.optimizer,
            PathBuf::from("model_zoo/optimizers/opt_sgd.prototext")
        );
        // Untouched keys keep their defaults
        assert_eq!(config.scheduler.allocator, "salloc");
        assert_eq!(
            config.sweep.data_readers_dir,
            PathBuf::from("model_zoo/data_readers")
        );
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempdir().unwrap();
        let config = HarnessConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.scheduler.launcher, "srun");
    }

    #[test]
    fn test_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bamboo.toml");
        std::fs::write(&path, "[scheduler\npartition = ").unwrap();
        assert!(matches!(
            HarnessConfig::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
