use std::path::PathBuf;

use crate::error::{InferenceError, SessionInitError};
use crate::tensor::Tensor;

/// Where the serialized model comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    File(PathBuf),
    Memory(Vec<u8>),
}

impl ModelSource {
    /// Read a model file up front and keep the bytes.
    pub fn read_into_memory(path: impl Into<PathBuf>) -> Result<Self, SessionInitError> {
        let path = path.into();
        if !path.is_file() {
            return Err(SessionInitError::ModelNotFound(path));
        }
        let bytes = std::fs::read(&path)
            .map_err(|source| SessionInitError::ModelUnreadable { path, source })?;
        Ok(ModelSource::Memory(bytes))
    }

    pub fn describe(&self) -> String {
        match self {
            ModelSource::File(path) => format!("file {}", path.display()),
            ModelSource::Memory(bytes) => format!("memory ({} bytes)", bytes.len()),
        }
    }
}

/// One loaded model with a single input and a single output binding.
///
/// `run` borrows the input only for the duration of the call and returns an
/// owned copy of the output.
pub trait InferenceSession {
    fn input_name(&self) -> &str;
    fn output_name(&self) -> &str;

    /// Declared input shape with dynamic dimensions resolved to 1.
    fn input_shape(&self) -> &[usize];

    /// Declared output shape with dynamic dimensions resolved to 1.
    fn output_shape(&self) -> &[usize];

    fn run(&mut self, input: &Tensor<f32>) -> Result<Tensor<f32>, InferenceError>;
}

/// Resolve engine dimensions, where dynamic (negative) entries become 1.
pub fn resolve_dimensions(dims: &[i64]) -> Vec<usize> {
    dims.iter()
        .map(|&d| if d < 0 { 1 } else { d as usize })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_dynamic_batch() {
        assert_eq!(resolve_dimensions(&[-1, 1, 28, 28]), vec![1, 1, 28, 28]);
        assert_eq!(resolve_dimensions(&[1, 10]), vec![1, 10]);
    }

    #[test]
    fn test_read_missing_model() {
        let result = ModelSource::read_into_memory("/definitely/not/here.onnx");
        assert!(matches!(result, Err(SessionInitError::ModelNotFound(_))));
    }

    #[test]
    fn test_describe() {
        assert_eq!(ModelSource::Memory(vec![0; 4]).describe(), "memory (4 bytes)");
    }
}
