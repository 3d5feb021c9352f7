//! Configuration for the classification pipeline.
//!
//! [`PipelineConfig`] holds the numeric contract fixed at construction
//! (input side, normalisation, ranking limits). [`ClassifierConfig`] is the
//! on-disk TOML document that also names the model and label files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ClassifierError;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "sightline.toml";

/// Largest accepted model input side, in pixels.
pub const MAX_INPUT_SIDE: u32 = 4096;

/// Options fixed when a pipeline is constructed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Side length of the square model input, in pixels.
    pub input_side: u32,
    /// Subtracted from every 8-bit channel value.
    #[serde(default = "default_mean_offset")]
    pub mean_offset: f32,
    /// Divisor applied after the mean offset.
    #[serde(default = "default_std_scale")]
    pub std_scale: f32,
    /// Upper bound on the number of recognitions returned.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Scores must be strictly greater than this to be reported.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// Advisory intra-op thread count for the engine.
    #[serde(default = "default_inference_threads")]
    pub inference_threads: usize,
    /// Advisory hint asking the engine for hardware acceleration.
    #[serde(default = "default_use_accelerator")]
    pub use_accelerator: bool,
}

fn default_mean_offset() -> f32 {
    0.0
}

fn default_std_scale() -> f32 {
    255.0
}

fn default_max_results() -> usize {
    3
}

fn default_confidence_threshold() -> f32 {
    0.1
}

fn default_inference_threads() -> usize {
    5
}

fn default_use_accelerator() -> bool {
    true
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(224)
    }
}

impl PipelineConfig {
    /// Defaults for everything except the required input side.
    pub fn new(input_side: u32) -> Self {
        Self {
            input_side,
            mean_offset: default_mean_offset(),
            std_scale: default_std_scale(),
            max_results: default_max_results(),
            confidence_threshold: default_confidence_threshold(),
            inference_threads: default_inference_threads(),
            use_accelerator: default_use_accelerator(),
        }
    }

    pub fn with_normalization(mut self, mean_offset: f32, std_scale: f32) -> Self {
        self.mean_offset = mean_offset;
        self.std_scale = std_scale;
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_inference_threads(mut self, threads: usize) -> Self {
        self.inference_threads = threads;
        self
    }

    pub fn with_accelerator(mut self, enabled: bool) -> Self {
        self.use_accelerator = enabled;
        self
    }

    /// Number of floats in one input tensor.
    pub fn tensor_len(&self) -> usize {
        let side = self.input_side as usize;
        3 * side * side
    }

    /// Reject options that would make preprocessing or ranking meaningless.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.input_side == 0 {
            return Err(ClassifierError::InvalidConfig(
                "input_side must be greater than zero".to_string(),
            ));
        }
        if self.input_side > MAX_INPUT_SIDE {
            return Err(ClassifierError::InvalidConfig(format!(
                "input_side must be at most {}, got {}",
                MAX_INPUT_SIDE, self.input_side
            )));
        }
        if !self.std_scale.is_finite() || self.std_scale == 0.0 {
            return Err(ClassifierError::InvalidConfig(format!(
                "std_scale must be finite and non-zero, got {}",
                self.std_scale
            )));
        }
        if !self.mean_offset.is_finite() {
            return Err(ClassifierError::InvalidConfig(format!(
                "mean_offset must be finite, got {}",
                self.mean_offset
            )));
        }
        if !self.confidence_threshold.is_finite() {
            return Err(ClassifierError::InvalidConfig(format!(
                "confidence_threshold must be finite, got {}",
                self.confidence_threshold
            )));
        }
        if self.inference_threads == 0 {
            return Err(ClassifierError::InvalidConfig(
                "inference_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Root configuration document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Base directory for relative model and label paths (default: .vendor/models)
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Model file (relative to `models_dir` or absolute)
    #[serde(default = "default_model")]
    pub model: PathBuf,

    /// Label file (relative to `models_dir` or absolute)
    #[serde(default = "default_labels")]
    pub labels: PathBuf,

    /// Path to the ONNX Runtime library
    #[serde(default = "default_ort_lib")]
    pub ort_library: PathBuf,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_models_dir() -> PathBuf {
    PathBuf::from(".vendor/models")
}

fn default_model() -> PathBuf {
    PathBuf::from("mobilenet_v1_1.0_224.onnx")
}

fn default_labels() -> PathBuf {
    PathBuf::from("labels.txt")
}

fn default_ort_lib() -> PathBuf {
    #[cfg(windows)]
    {
        PathBuf::from(".vendor/onnxruntime/lib/onnxruntime.dll")
    }
    #[cfg(target_os = "macos")]
    {
        PathBuf::from(".vendor/onnxruntime/lib/libonnxruntime.dylib")
    }
    #[cfg(not(any(windows, target_os = "macos")))]
    {
        PathBuf::from(".vendor/onnxruntime/lib/libonnxruntime.so")
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            model: default_model(),
            labels: default_labels(),
            ort_library: default_ort_lib(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ClassifierConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ClassifierError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ClassifierError::Config(format!("failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ClassifierError::Config(format!("invalid config TOML: {}", e)))
    }

    /// Load configuration from the first default location that parses,
    /// falling back to built-in defaults.
    ///
    /// Searched in order: `./sightline.toml`, `./.vendor/sightline.toml`,
    /// then the platform config directory (`<config_dir>/sightline/`).
    pub fn load_or_default() -> Self {
        let mut candidates = vec![
            PathBuf::from(DEFAULT_CONFIG_FILE),
            PathBuf::from(".vendor").join(DEFAULT_CONFIG_FILE),
        ];
        candidates.extend(default_config_path());

        for candidate in candidates {
            match Self::load(&candidate) {
                Ok(config) => {
                    tracing::debug!(path = %candidate.display(), "loaded classifier config");
                    return config;
                }
                Err(e) if candidate.exists() => {
                    tracing::warn!(path = %candidate.display(), error = %e, "ignoring unreadable config");
                }
                Err(_) => {}
            }
        }

        Self::default()
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ClassifierError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| ClassifierError::Config(format!("failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ClassifierError::Config(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        std::fs::write(path, content)
            .map_err(|e| ClassifierError::Config(format!("failed to write config: {}", e)))
    }

    /// Full path to the model file.
    pub fn model_path(&self) -> PathBuf {
        self.resolve(&self.model)
    }

    /// Full path to the label file.
    pub fn labels_path(&self) -> PathBuf {
        self.resolve(&self.labels)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.models_dir.join(path)
        }
    }
}

/// Per-user configuration file location, if the platform has one.
pub fn default_config_path() -> Option<PathBuf> {
    let mut dir = dirs::config_dir()?;
    dir.push("sightline");
    dir.push(DEFAULT_CONFIG_FILE);
    Some(dir)
}
