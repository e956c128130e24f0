use std::time::Instant;

use base::{log_error, log_warn};

use crate::error::{EvalError, InferenceError, Result, StatsError};
use crate::sample::{Sample, SampleSource};
use crate::session::InferenceSession;
use crate::stats::{FailedSample, FailurePolicy, InferenceResult, RunStatistics, Summary};
use crate::tensor::Tensor;
use crate::transform::{argmax_with_confidence, normalize, softmax};

/// Samples between two progress notifications.
pub const PROGRESS_INTERVAL: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// Snapshot handed to a [`ProgressObserver`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Evaluated plus failed samples so far.
    pub processed: usize,
    /// Length of the source.
    pub expected: usize,
    pub correct: usize,
    pub failed: usize,
    pub running_accuracy: f64,
}

pub trait ProgressObserver {
    fn on_progress(&mut self, progress: &Progress);
}

impl<F: FnMut(&Progress)> ProgressObserver for F {
    fn on_progress(&mut self, progress: &Progress) {
        self(progress)
    }
}

/// Observer that ignores every notification.
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _progress: &Progress) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum SampleOutcome {
    Evaluated(InferenceResult),
    Failed(FailedSample),
}

/// Result of one pass over a sample source.
#[derive(Debug)]
pub struct Evaluation {
    /// `Completed` or `Aborted`.
    pub state: EvaluatorState,
    pub statistics: RunStatistics,
    /// Every processed sample, in source order.
    pub outcomes: Vec<SampleOutcome>,
    pub abort_reason: Option<String>,
}

impl Evaluation {
    pub fn is_completed(&self) -> bool {
        self.state == EvaluatorState::Completed
    }

    pub fn summary(&self) -> std::result::Result<Summary, StatsError> {
        self.statistics.finalize()
    }
}

/// Run one sample through preprocess, inference and postprocess, and score it.
///
/// Latency covers all three steps.
pub fn evaluate_one(
    session: &mut dyn InferenceSession,
    sample: &Sample,
) -> Result<InferenceResult> {
    sample.validate()?;

    let start = Instant::now();
    let input = Tensor::new(session.input_shape().to_vec(), normalize(&sample.pixels))
        .map_err(InferenceError::from)?;
    let output = session.run(&input)?;

    if output.is_empty() {
        return Err(InferenceError::InvalidOutput("empty output tensor".into()).into());
    }
    if let Some(bad) = output.data.iter().position(|x| !x.is_finite()) {
        return Err(InferenceError::InvalidOutput(format!(
            "non-finite logit {} at index {}",
            output.data[bad], bad
        ))
        .into());
    }

    let probabilities = softmax(&output.data);
    let (predicted_class, confidence) = argmax_with_confidence(&probabilities)
        .ok_or_else(|| InferenceError::InvalidOutput("no probabilities".into()))?;
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

    Ok(InferenceResult {
        sample_id: sample.sample_id,
        original_index: sample.original_index,
        true_label: sample.true_label,
        predicted_class,
        confidence,
        probabilities,
        latency_ms,
        is_correct: predicted_class == usize::from(sample.true_label),
        synthetic: sample.synthetic,
    })
}

/// Drives a session over a sample source: `Idle -> Running -> {Completed, Aborted}`.
///
/// Per-sample failures are recorded and the pass continues; fatal errors
/// (lost session, unusable source) stop it.
pub struct BatchEvaluator {
    state: EvaluatorState,
    policy: FailurePolicy,
    progress_interval: usize,
}

impl BatchEvaluator {
    pub fn new(policy: FailurePolicy) -> Self {
        BatchEvaluator {
            state: EvaluatorState::Idle,
            policy,
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    pub fn state(&self) -> EvaluatorState {
        self.state
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Back to `Idle` after a finished pass.
    pub fn reset(&mut self) {
        self.state = EvaluatorState::Idle;
    }

    pub fn evaluate(
        &mut self,
        session: &mut dyn InferenceSession,
        source: &dyn SampleSource,
        observer: &mut dyn ProgressObserver,
    ) -> Result<Evaluation> {
        if self.state != EvaluatorState::Idle {
            return Err(EvalError::InvalidState(self.state));
        }
        self.state = EvaluatorState::Running;

        let expected = source.len();
        let mut statistics = RunStatistics::new(self.policy);
        let mut outcomes = Vec::with_capacity(expected);
        let mut abort_reason = None;

        for (position, item) in source.samples().enumerate() {
            let outcome = match item {
                Ok(sample) => match evaluate_one(session, &sample) {
                    Ok(result) => SampleOutcome::Evaluated(result),
                    Err(error) if error.is_fatal() => {
                        log_error!("Sample {}: {}, aborting", sample.sample_id, error);
                        abort_reason = Some(error.to_string());
                        break;
                    }
                    Err(error) => SampleOutcome::Failed(FailedSample {
                        sample_id: sample.sample_id,
                        original_index: Some(sample.original_index),
                        true_label: Some(sample.true_label),
                        reason: error.to_string(),
                    }),
                },
                Err(error) if error.is_fatal() => {
                    log_error!("Sample source failed: {}, aborting", error);
                    abort_reason = Some(error.to_string());
                    break;
                }
                Err(error) => SampleOutcome::Failed(FailedSample {
                    sample_id: error.sample_id().unwrap_or(position),
                    original_index: None,
                    true_label: None,
                    reason: error.to_string(),
                }),
            };

            match &outcome {
                SampleOutcome::Evaluated(result) => statistics.record(result),
                SampleOutcome::Failed(failure) => {
                    log_warn!("Sample {} failed: {}", failure.sample_id, failure.reason);
                    statistics.record_failure(failure.clone());
                }
            }
            outcomes.push(outcome);

            let processed = statistics.processed();
            if processed % self.progress_interval == 0 {
                observer.on_progress(&Progress {
                    processed,
                    expected,
                    correct: statistics.correct(),
                    failed: statistics.failed(),
                    running_accuracy: statistics.running_accuracy().unwrap_or(0.0),
                });
            }
        }

        self.state = if abort_reason.is_some() {
            EvaluatorState::Aborted
        } else {
            EvaluatorState::Completed
        };

        Ok(Evaluation {
            state: self.state,
            statistics,
            outcomes,
            abort_reason,
        })
    }
}
