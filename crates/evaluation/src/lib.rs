pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod metadata;
#[cfg(feature = "onnx")]
pub mod onnxsession;
pub mod report;
pub mod sample;
pub mod session;
pub mod stats;
pub mod tensor;
pub mod transform;

pub use config::{ConfigLayer, EvalConfig, Optimization, Platform, SchemaChoice};
pub use dataset::{DirectorySource, MissingSamplePolicy};
pub use error::{
    ConfigError, EvalError, InferenceError, ReportError, Result, SampleError, SessionInitError,
    StatsError,
};
pub use evaluator::{
    BatchEvaluator, Evaluation, EvaluatorState, NoProgress, Progress, ProgressObserver,
    SampleOutcome, evaluate_one,
};
pub use metadata::{Metadata, SampleRecord, SchemaVersion};
#[cfg(feature = "onnx")]
pub use onnxsession::{OnnxSession, session_config};
pub use report::{JsonReporter, Reporter, RunReport, TextReporter};
pub use sample::{MemorySource, Sample, SampleSource};
pub use session::{InferenceSession, ModelSource};
pub use stats::{FailedSample, FailurePolicy, InferenceResult, RunStatistics, Summary};
pub use tensor::{Tensor, TensorError};
