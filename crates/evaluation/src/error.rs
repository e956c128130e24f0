//! Error types for the evaluation pipeline.
//!
//! Each stage has its own error so the evaluator can decide, per failure,
//! whether the pass continues or aborts.

use std::path::PathBuf;

use thiserror::Error;

use crate::evaluator::EvaluatorState;
use crate::tensor::TensorError;

/// The model could not be loaded. Always fatal.
#[derive(Error, Debug)]
pub enum SessionInitError {
    #[error("model file not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("failed to read model {path}: {source}")]
    ModelUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("engine initialization failed: {0}")]
    Engine(String),

    #[error("model declares {inputs} inputs and {outputs} outputs")]
    Bindings { inputs: usize, outputs: usize },

    #[error("unsupported model binding: {0}")]
    UnsupportedBinding(String),
}

/// A sample, or the whole sample source, could not be acquired.
#[derive(Error, Debug)]
pub enum SampleError {
    #[error("dataset root not found: {0}")]
    RootNotFound(PathBuf),

    #[error("metadata unavailable at {path}: {source}")]
    MetadataUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("sample {sample_id}: file {path} is missing")]
    MissingFile { sample_id: usize, path: PathBuf },

    #[error("sample {sample_id}: failed to read {path}: {source}")]
    Unreadable {
        sample_id: usize,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sample {sample_id}: expected {expected} bytes, found {found}")]
    Truncated {
        sample_id: usize,
        expected: usize,
        found: usize,
    },

    #[error("sample {sample_id}: {reason}")]
    Malformed { sample_id: usize, reason: String },
}

impl SampleError {
    /// Whether the source as a whole is unusable, as opposed to a single sample.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SampleError::RootNotFound(_)
                | SampleError::MetadataUnavailable { .. }
                | SampleError::InvalidMetadata(_)
        )
    }

    pub fn sample_id(&self) -> Option<usize> {
        match self {
            SampleError::MissingFile { sample_id, .. }
            | SampleError::Unreadable { sample_id, .. }
            | SampleError::Truncated { sample_id, .. }
            | SampleError::Malformed { sample_id, .. } => Some(*sample_id),
            _ => None,
        }
    }
}

/// A single inference call failed.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("input has {got} elements, session expects {expected}")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("engine error: {0}")]
    Engine(String),

    #[error("invalid output: {0}")]
    InvalidOutput(String),

    #[error("session lost: {0}")]
    SessionLost(String),
}

impl InferenceError {
    /// Only a lost session stops the pass; everything else is per sample.
    pub fn is_fatal(&self) -> bool {
        matches!(self, InferenceError::SessionLost(_))
    }
}

impl From<TensorError> for InferenceError {
    fn from(error: TensorError) -> Self {
        match error {
            TensorError::ShapeMismatch { expected, got } => {
                InferenceError::ShapeMismatch { expected, got }
            }
            TensorError::ShapeOverflow => InferenceError::InvalidOutput(error.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StatsError {
    #[error("no samples were evaluated")]
    NoSamplesEvaluated,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Umbrella error for callers that drive the whole pipeline.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error(transparent)]
    SessionInit(#[from] SessionInitError),

    #[error(transparent)]
    Sample(#[from] SampleError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Stats(#[from] StatsError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("evaluator is {0:?}, expected Idle")]
    InvalidState(EvaluatorState),
}

impl EvalError {
    /// Whether a batch pass must stop on this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            EvalError::Sample(error) => error.is_fatal(),
            EvalError::Inference(error) => error.is_fatal(),
            _ => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_error_fatality() {
        assert!(SampleError::RootNotFound(PathBuf::from("/nope")).is_fatal());
        assert!(SampleError::InvalidMetadata("bad".into()).is_fatal());
        let missing = SampleError::MissingFile {
            sample_id: 3,
            path: PathBuf::from("image_003.bin"),
        };
        assert!(!missing.is_fatal());
        assert_eq!(missing.sample_id(), Some(3));
    }

    #[test]
    fn test_inference_error_fatality() {
        assert!(InferenceError::SessionLost("gone".into()).is_fatal());
        assert!(!InferenceError::Engine("boom".into()).is_fatal());
        assert!(!InferenceError::ShapeMismatch { expected: 784, got: 10 }.is_fatal());
    }

    #[test]
    fn test_tensor_error_conversion() {
        let error: InferenceError = TensorError::ShapeMismatch {
            expected: 10,
            got: 9,
        }
        .into();
        assert!(matches!(
            error,
            InferenceError::ShapeMismatch {
                expected: 10,
                got: 9
            }
        ));
    }

    #[test]
    fn test_umbrella_display_is_transparent() {
        let error: EvalError = StatsError::NoSamplesEvaluated.into();
        assert_eq!(error.to_string(), "no samples were evaluated");
    }
}
