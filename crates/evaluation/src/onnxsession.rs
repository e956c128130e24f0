use std::sync::Arc;

use base::{log_info, log_warn};
use onnx::{
    Onnx, OnnxError, OptimizationLevel, SessionConfig, ffi::ONNXTensorElementDataType,
    ffi::OrtErrorCode,
};

use crate::error::{InferenceError, SessionInitError};
use crate::session::{InferenceSession, ModelSource, resolve_dimensions};
use crate::tensor::Tensor;

fn init_error(error: OnnxError) -> SessionInitError {
    SessionInitError::Engine(error.to_string())
}

fn run_error(error: OnnxError) -> InferenceError {
    match error.code() {
        OrtErrorCode::NoModel => InferenceError::SessionLost(error.to_string()),
        _ => InferenceError::Engine(error.to_string()),
    }
}

/// Engine settings every evaluation session runs with: one intra-op thread,
/// one inter-op thread, sequential execution. Only the optimization level varies.
pub fn session_config(optimization_level: OptimizationLevel) -> SessionConfig {
    SessionConfig {
        optimization_level,
        intra_op_threads: 1,
        inter_op_threads: 1,
        sequential: true,
    }
}

/// [`InferenceSession`] backed by an ONNX Runtime session.
pub struct OnnxSession {
    session: onnx::Session,
    input_name: String,
    output_name: String,
    input_shape: Vec<usize>,
    output_shape: Vec<usize>,
}

impl OnnxSession {
    /// Load the model and discover its bindings. The first input and first output are used.
    pub fn open(
        onnx: &Arc<Onnx>,
        source: &ModelSource,
        optimization_level: OptimizationLevel,
    ) -> Result<Self, SessionInitError> {
        let config = &session_config(optimization_level);
        let session = match source {
            ModelSource::File(path) => {
                if !path.is_file() {
                    return Err(SessionInitError::ModelNotFound(path.clone()));
                }
                onnx.create_session(config, path)
            }
            ModelSource::Memory(bytes) => onnx.create_session_from_memory(config, bytes),
        }
        .map_err(init_error)?;

        let inputs = session.input_names().len();
        let outputs = session.output_names().len();
        if inputs == 0 || outputs == 0 {
            return Err(SessionInitError::Bindings { inputs, outputs });
        }
        if inputs > 1 || outputs > 1 {
            log_warn!(
                "Model declares {} inputs and {} outputs, using the first of each",
                inputs,
                outputs
            );
        }

        for (kind, element_type) in [
            ("input", session.input_element_type(0).map_err(init_error)?),
            ("output", session.output_element_type(0).map_err(init_error)?),
        ] {
            if element_type != ONNXTensorElementDataType::Float {
                return Err(SessionInitError::UnsupportedBinding(format!(
                    "{} element type {:?}, expected Float",
                    kind, element_type
                )));
            }
        }

        let input_name = session.input_names()[0].clone();
        let output_name = session.output_names()[0].clone();
        let input_shape = resolve_dimensions(&session.input_shape(0).map_err(init_error)?);
        let output_shape = resolve_dimensions(&session.output_shape(0).map_err(init_error)?);

        log_info!(
            "Loaded model from {}: {} {:?} -> {} {:?}",
            source.describe(),
            input_name,
            input_shape,
            output_name,
            output_shape
        );

        Ok(OnnxSession {
            session,
            input_name,
            output_name,
            input_shape,
            output_shape,
        })
    }
}

impl InferenceSession for OnnxSession {
    fn input_name(&self) -> &str {
        &self.input_name
    }

    fn output_name(&self) -> &str {
        &self.output_name
    }

    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    fn run(&mut self, input: &Tensor<f32>) -> Result<Tensor<f32>, InferenceError> {
        let expected: usize = self.input_shape.iter().product();
        if input.len() != expected {
            return Err(InferenceError::ShapeMismatch {
                expected,
                got: input.len(),
            });
        }

        let value = self
            .session
            .tensor(&self.input_shape, &input.data)
            .map_err(run_error)?;
        let outputs = self
            .session
            .run(
                &[(self.input_name.as_str(), &value)],
                &[self.output_name.as_str()],
            )
            .map_err(run_error)?;
        let output = outputs
            .first()
            .ok_or_else(|| InferenceError::InvalidOutput("no output produced".into()))?;

        // copy out before the engine-owned buffer goes away with `outputs`
        let shape = resolve_dimensions(&output.tensor_shape().map_err(run_error)?);
        let data = output.extract_tensor::<f32>().map_err(run_error)?.to_vec();
        Ok(Tensor::new(shape, data)?)
    }
}
