//! Runtime configuration: platform defaults, overridden by a TOML file, overridden by the command line.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::MissingSamplePolicy;
use crate::error::ConfigError;
use crate::evaluator::PROGRESS_INTERVAL;
use crate::metadata::SchemaVersion;
use crate::stats::FailurePolicy;

const ANDROID_ROOT: &str = "/data/local/tmp/mnist_onnx";
const DESKTOP_ROOT: &str = "..";
const MODEL_FILE: &str = "models/mnist_model.onnx";
const DATASET_DIR: &str = "test_data";
const RESULTS_DIR: &str = "results";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Desktop,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "android") {
            Platform::Android
        } else {
            Platform::Desktop
        }
    }

    pub fn root(&self) -> &'static Path {
        match self {
            Platform::Android => Path::new(ANDROID_ROOT),
            Platform::Desktop => Path::new(DESKTOP_ROOT),
        }
    }

    pub fn default_label(&self) -> String {
        match self {
            Platform::Android => "android".to_string(),
            Platform::Desktop => std::env::consts::OS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaChoice {
    #[default]
    Auto,
    Mnist,
    Common,
}

impl SchemaChoice {
    pub fn version(&self) -> Option<SchemaVersion> {
        match self {
            SchemaChoice::Auto => None,
            SchemaChoice::Mnist => Some(SchemaVersion::Mnist),
            SchemaChoice::Common => Some(SchemaVersion::Common),
        }
    }
}

/// Graph optimization level requested from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimization {
    Disabled,
    Basic,
    #[default]
    Extended,
    All,
}

#[cfg(feature = "onnx")]
impl From<Optimization> for onnx::OptimizationLevel {
    fn from(optimization: Optimization) -> Self {
        match optimization {
            Optimization::Disabled => onnx::OptimizationLevel::Disabled,
            Optimization::Basic => onnx::OptimizationLevel::EnableBasic,
            Optimization::Extended => onnx::OptimizationLevel::EnableExtended,
            Optimization::All => onnx::OptimizationLevel::EnableAll,
        }
    }
}

/// Partial configuration, as found in a TOML file or on the command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigLayer {
    pub platform: Option<Platform>,
    pub platform_label: Option<String>,
    pub model_path: Option<PathBuf>,
    pub model_in_memory: Option<bool>,
    pub dataset_root: Option<PathBuf>,
    pub schema: Option<SchemaChoice>,
    pub failure_policy: Option<FailurePolicy>,
    pub missing_sample_policy: Option<MissingSamplePolicy>,
    pub optimization: Option<Optimization>,
    pub progress_interval: Option<usize>,
    pub results_path: Option<PathBuf>,
    pub json_results_path: Option<PathBuf>,
    pub details: Option<bool>,
    pub log_dir: Option<PathBuf>,
}

impl ConfigLayer {
    pub fn load_toml(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse_toml(&content)
    }

    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Fields set in `other` win.
    pub fn merge(self, other: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            platform: other.platform.or(self.platform),
            platform_label: other.platform_label.or(self.platform_label),
            model_path: other.model_path.or(self.model_path),
            model_in_memory: other.model_in_memory.or(self.model_in_memory),
            dataset_root: other.dataset_root.or(self.dataset_root),
            schema: other.schema.or(self.schema),
            failure_policy: other.failure_policy.or(self.failure_policy),
            missing_sample_policy: other.missing_sample_policy.or(self.missing_sample_policy),
            optimization: other.optimization.or(self.optimization),
            progress_interval: other.progress_interval.or(self.progress_interval),
            results_path: other.results_path.or(self.results_path),
            json_results_path: other.json_results_path.or(self.json_results_path),
            details: other.details.or(self.details),
            log_dir: other.log_dir.or(self.log_dir),
        }
    }
}

/// Fully resolved configuration of one evaluation run.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalConfig {
    pub platform: Platform,
    pub platform_label: String,
    pub model_path: PathBuf,
    pub model_in_memory: bool,
    pub dataset_root: PathBuf,
    pub schema: SchemaChoice,
    pub failure_policy: FailurePolicy,
    pub missing_sample_policy: MissingSamplePolicy,
    pub optimization: Optimization,
    pub progress_interval: usize,
    pub results_path: Option<PathBuf>,
    pub json_results_path: Option<PathBuf>,
    pub details: bool,
    pub log_dir: Option<PathBuf>,
}

impl EvalConfig {
    pub fn for_platform(platform: Platform) -> Self {
        let root = platform.root();
        let label = platform.default_label();
        EvalConfig {
            platform,
            model_path: root.join(MODEL_FILE),
            model_in_memory: false,
            dataset_root: root.join(DATASET_DIR),
            schema: SchemaChoice::Auto,
            failure_policy: FailurePolicy::Exclude,
            missing_sample_policy: MissingSamplePolicy::Skip,
            optimization: Optimization::Extended,
            progress_interval: PROGRESS_INTERVAL,
            results_path: Some(root.join(RESULTS_DIR).join(format!("{}_rust_results.txt", label))),
            json_results_path: Some(
                root.join(RESULTS_DIR)
                    .join(format!("{}_rust_results.json", label)),
            ),
            details: false,
            log_dir: None,
            platform_label: label,
        }
    }

    /// Apply a layer on top of the defaults of its platform (or the current one).
    pub fn resolve(layer: ConfigLayer) -> Result<Self, ConfigError> {
        let defaults = Self::for_platform(layer.platform.unwrap_or_else(Platform::current));

        let progress_interval = layer.progress_interval.unwrap_or(defaults.progress_interval);
        if progress_interval == 0 {
            return Err(ConfigError::Invalid(
                "progress_interval must be at least 1".to_string(),
            ));
        }

        let platform_label = layer.platform_label.unwrap_or(defaults.platform_label);
        if platform_label.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "platform_label must not be empty".to_string(),
            ));
        }

        Ok(EvalConfig {
            platform: defaults.platform,
            platform_label,
            model_path: layer.model_path.unwrap_or(defaults.model_path),
            model_in_memory: layer.model_in_memory.unwrap_or(defaults.model_in_memory),
            dataset_root: layer.dataset_root.unwrap_or(defaults.dataset_root),
            schema: layer.schema.unwrap_or(defaults.schema),
            failure_policy: layer.failure_policy.unwrap_or(defaults.failure_policy),
            missing_sample_policy: layer
                .missing_sample_policy
                .unwrap_or(defaults.missing_sample_policy),
            optimization: layer.optimization.unwrap_or(defaults.optimization),
            progress_interval,
            results_path: layer.results_path.or(defaults.results_path),
            json_results_path: layer.json_results_path.or(defaults.json_results_path),
            details: layer.details.unwrap_or(defaults.details),
            log_dir: layer.log_dir.or(defaults.log_dir),
        })
    }
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self::for_platform(Platform::current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_android_defaults() {
        let config = EvalConfig::for_platform(Platform::Android);
        assert_eq!(
            config.model_path,
            PathBuf::from("/data/local/tmp/mnist_onnx/models/mnist_model.onnx")
        );
        assert_eq!(
            config.dataset_root,
            PathBuf::from("/data/local/tmp/mnist_onnx/test_data")
        );
        assert_eq!(config.platform_label, "android");
    }

    #[test]
    fn test_desktop_defaults() {
        let config = EvalConfig::for_platform(Platform::Desktop);
        assert_eq!(config.model_path, PathBuf::from("../models/mnist_model.onnx"));
        assert_eq!(config.dataset_root, PathBuf::from("../test_data"));
        assert_eq!(config.progress_interval, 10);
    }
}
