//! Safe wrapper over the ONNX Runtime C API.
//!
//! There is no global runtime state: create an [`Onnx`] context and pass it around.

pub mod error;
pub mod ffi;
mod onnx;
pub mod session;
pub mod value;

pub use error::{OnnxError, Result};
pub use onnx::{ORT_API_VERSION, Onnx, OptimizationLevel, SessionConfig};
pub use session::Session;
pub use value::{MemoryInfo, TensorElement, Value};
