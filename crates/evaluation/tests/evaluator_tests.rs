use std::collections::VecDeque;

use evaluation::sample::{IMAGE_PIXELS, INPUT_SHAPE, NUM_CLASSES};
use evaluation::{
    BatchEvaluator, EvalError, EvaluatorState, FailurePolicy, InferenceError, InferenceSession,
    MemorySource, NoProgress, Progress, Sample, SampleError, SampleOutcome, SampleSource, Tensor,
    evaluate_one,
};

/// Session that answers each call with the next scripted response.
struct ScriptedSession {
    responses: VecDeque<Result<Vec<f32>, InferenceError>>,
    input_shape: Vec<usize>,
    output_shape: Vec<usize>,
    calls: usize,
}

impl ScriptedSession {
    fn new(responses: Vec<Result<Vec<f32>, InferenceError>>) -> Self {
        ScriptedSession {
            responses: responses.into(),
            input_shape: INPUT_SHAPE.to_vec(),
            output_shape: vec![1, NUM_CLASSES],
            calls: 0,
        }
    }
}

impl InferenceSession for ScriptedSession {
    fn input_name(&self) -> &str {
        "input"
    }

    fn output_name(&self) -> &str {
        "output"
    }

    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    fn run(&mut self, input: &Tensor<f32>) -> Result<Tensor<f32>, InferenceError> {
        assert_eq!(input.shape, INPUT_SHAPE.to_vec());
        self.calls += 1;
        let logits = self
            .responses
            .pop_front()
            .unwrap_or_else(|| Ok(logits_for(0)))?;
        Ok(Tensor::new(vec![1, logits.len()], logits).unwrap())
    }
}

fn logits_for(class: usize) -> Vec<f32> {
    let mut logits = vec![0.0; NUM_CLASSES];
    logits[class] = 5.0;
    logits
}

fn sample(sample_id: usize, label: u8) -> Sample {
    Sample::new(sample_id, 1000 + sample_id, label, vec![0.5; IMAGE_PIXELS]).unwrap()
}

#[test]
fn test_failing_middle_sample_is_excluded() {
    let source = MemorySource::new(vec![sample(1, 3), sample(2, 4), sample(3, 5)]);
    let mut session = ScriptedSession::new(vec![
        Ok(logits_for(3)),
        Err(InferenceError::Engine("bad input".into())),
        Ok(logits_for(5)),
    ]);
    let mut evaluator = BatchEvaluator::new(FailurePolicy::Exclude);

    let evaluation = evaluator
        .evaluate(&mut session, &source, &mut NoProgress)
        .unwrap();

    assert_eq!(evaluation.state, EvaluatorState::Completed);
    assert_eq!(session.calls, 3);
    let summary = evaluation.summary().unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.correct, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.accuracy, 1.0);
    assert_eq!(evaluation.statistics.failures().len(), 1);
    assert_eq!(evaluation.statistics.failures()[0].sample_id, 2);
    assert!(matches!(evaluation.outcomes[1], SampleOutcome::Failed(_)));
}

#[test]
fn test_failure_counted_as_incorrect() {
    let source = MemorySource::new(vec![sample(1, 3), sample(2, 4), sample(3, 5)]);
    let mut session = ScriptedSession::new(vec![
        Ok(logits_for(3)),
        Err(InferenceError::Engine("bad input".into())),
        Ok(logits_for(5)),
    ]);
    let mut evaluator = BatchEvaluator::new(FailurePolicy::CountAsIncorrect);

    let evaluation = evaluator
        .evaluate(&mut session, &source, &mut NoProgress)
        .unwrap();

    let summary = evaluation.summary().unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.correct, 2);
    assert_eq!(summary.wrong, 1);
    assert!((summary.accuracy - 2.0 / 3.0).abs() < 1e-12);
}

#[test]
fn test_session_lost_aborts() {
    let source = MemorySource::new(vec![sample(0, 1), sample(1, 1), sample(2, 1)]);
    let mut session = ScriptedSession::new(vec![
        Ok(logits_for(1)),
        Err(InferenceError::SessionLost("handle invalid".into())),
        Ok(logits_for(1)),
    ]);
    let mut evaluator = BatchEvaluator::new(FailurePolicy::Exclude);

    let evaluation = evaluator
        .evaluate(&mut session, &source, &mut NoProgress)
        .unwrap();

    assert_eq!(evaluation.state, EvaluatorState::Aborted);
    assert_eq!(evaluator.state(), EvaluatorState::Aborted);
    assert_eq!(session.calls, 2);
    assert_eq!(evaluation.outcomes.len(), 1);
    assert!(evaluation.abort_reason.unwrap().contains("handle invalid"));
    assert_eq!(evaluation.statistics.total(), 1);
}

#[test]
fn test_progress_every_tenth_sample() {
    let samples = (0..35).map(|i| sample(i, 0)).collect();
    let source = MemorySource::new(samples);
    let mut session = ScriptedSession::new(Vec::new());
    let mut evaluator = BatchEvaluator::new(FailurePolicy::Exclude);

    let mut seen = Vec::new();
    let mut observer = |progress: &Progress| seen.push(progress.processed);
    evaluator
        .evaluate(&mut session, &source, &mut observer)
        .unwrap();

    assert_eq!(seen, vec![10, 20, 30]);
}

#[test]
fn test_progress_counts_failures_and_reports_running_accuracy() {
    let samples = (0..10).map(|i| sample(i, 1)).collect();
    let source = MemorySource::new(samples);
    let mut responses: Vec<Result<Vec<f32>, InferenceError>> = (0..8).map(|_| Ok(logits_for(1))).collect();
    responses.push(Ok(logits_for(2)));
    responses.push(Err(InferenceError::Engine("oops".into())));
    let mut session = ScriptedSession::new(responses);
    let mut evaluator = BatchEvaluator::new(FailurePolicy::Exclude);

    let mut seen: Vec<Progress> = Vec::new();
    let mut observer = |progress: &Progress| seen.push(*progress);
    evaluator
        .evaluate(&mut session, &source, &mut observer)
        .unwrap();

    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].processed, 10);
    assert_eq!(seen[0].expected, 10);
    assert_eq!(seen[0].failed, 1);
    assert!((seen[0].running_accuracy - 8.0 / 9.0).abs() < 1e-12);
}

#[test]
fn test_progress_is_deterministic() {
    let run = || {
        let samples = (0..20).map(|i| sample(i, (i % 10) as u8)).collect();
        let source = MemorySource::new(samples);
        let responses = (0..20).map(|i| Ok(logits_for((i * 3) % 10))).collect();
        let mut session = ScriptedSession::new(responses);
        let mut evaluator = BatchEvaluator::new(FailurePolicy::Exclude);
        let mut seen: Vec<Progress> = Vec::new();
        let mut observer = |progress: &Progress| seen.push(*progress);
        evaluator
            .evaluate(&mut session, &source, &mut observer)
            .unwrap();
        seen
    };
    assert_eq!(run(), run());
}

#[test]
fn test_evaluate_requires_idle() {
    let source = MemorySource::new(vec![sample(0, 0)]);
    let mut session = ScriptedSession::new(Vec::new());
    let mut evaluator = BatchEvaluator::new(FailurePolicy::Exclude);

    evaluator
        .evaluate(&mut session, &source, &mut NoProgress)
        .unwrap();
    assert_eq!(evaluator.state(), EvaluatorState::Completed);

    let second = evaluator.evaluate(&mut session, &source, &mut NoProgress);
    assert!(matches!(
        second,
        Err(EvalError::InvalidState(EvaluatorState::Completed))
    ));

    evaluator.reset();
    assert_eq!(evaluator.state(), EvaluatorState::Idle);
    assert!(
        evaluator
            .evaluate(&mut session, &source, &mut NoProgress)
            .is_ok()
    );
}

#[test]
fn test_empty_source_completes_without_statistics() {
    let source = MemorySource::new(Vec::new());
    let mut session = ScriptedSession::new(Vec::new());
    let mut evaluator = BatchEvaluator::new(FailurePolicy::Exclude);

    let evaluation = evaluator
        .evaluate(&mut session, &source, &mut NoProgress)
        .unwrap();

    assert!(evaluation.is_completed());
    assert!(evaluation.summary().is_err());
}

#[test]
fn test_non_finite_output_is_recoverable() {
    let source = MemorySource::new(vec![sample(0, 0), sample(1, 0)]);
    let mut nan = logits_for(0);
    nan[4] = f32::NAN;
    let mut session = ScriptedSession::new(vec![Ok(nan), Ok(logits_for(0))]);
    let mut evaluator = BatchEvaluator::new(FailurePolicy::Exclude);

    let evaluation = evaluator
        .evaluate(&mut session, &source, &mut NoProgress)
        .unwrap();

    assert!(evaluation.is_completed());
    assert_eq!(evaluation.statistics.failed(), 1);
    assert!(evaluation.statistics.failures()[0].reason.contains("non-finite"));
    assert_eq!(evaluation.statistics.correct(), 1);
}

#[test]
fn test_malformed_sample_is_recoverable() {
    let mut short = sample(0, 2);
    short.pixels.truncate(10);
    let source = MemorySource::new(vec![short, sample(1, 2)]);
    let mut session = ScriptedSession::new(vec![Ok(logits_for(2))]);
    let mut evaluator = BatchEvaluator::new(FailurePolicy::Exclude);

    let evaluation = evaluator
        .evaluate(&mut session, &source, &mut NoProgress)
        .unwrap();

    assert_eq!(session.calls, 1);
    assert_eq!(evaluation.statistics.failed(), 1);
    assert_eq!(evaluation.statistics.correct(), 1);
}

/// Source whose second element is a missing file and third a fatal error.
struct BrokenSource;

impl SampleSource for BrokenSource {
    fn len(&self) -> usize {
        4
    }

    fn samples(&self) -> Box<dyn Iterator<Item = Result<Sample, SampleError>> + '_> {
        Box::new(
            vec![
                Ok(sample(0, 0)),
                Err(SampleError::MissingFile {
                    sample_id: 1,
                    path: "image_001.bin".into(),
                }),
                Err(SampleError::InvalidMetadata("gone".into())),
                Ok(sample(3, 0)),
            ]
            .into_iter(),
        )
    }
}

#[test]
fn test_sample_errors_recoverable_then_fatal() {
    let mut session = ScriptedSession::new(Vec::new());
    let mut evaluator = BatchEvaluator::new(FailurePolicy::Exclude);

    let evaluation = evaluator
        .evaluate(&mut session, &BrokenSource, &mut NoProgress)
        .unwrap();

    assert_eq!(evaluation.state, EvaluatorState::Aborted);
    assert_eq!(session.calls, 1);
    assert_eq!(evaluation.statistics.failed(), 1);
    assert_eq!(evaluation.statistics.failures()[0].sample_id, 1);
    assert_eq!(evaluation.statistics.failures()[0].original_index, None);
    let summary = evaluation.summary().unwrap();
    assert_eq!(summary.total, 1);
}

#[test]
fn test_evaluate_one_scores_sample() {
    let mut session = ScriptedSession::new(vec![Ok(logits_for(7))]);
    let result = evaluate_one(&mut session, &sample(9, 7)).unwrap();

    assert_eq!(result.sample_id, 9);
    assert_eq!(result.original_index, 1009);
    assert_eq!(result.predicted_class, 7);
    assert!(result.is_correct);
    let sum: f32 = result.probabilities.iter().sum();
    assert!((sum - 1.0).abs() < 1e-5);
    let max = result
        .probabilities
        .iter()
        .copied()
        .fold(f32::NEG_INFINITY, f32::max);
    assert_eq!(result.confidence, max);
    assert!(result.latency_ms >= 0.0);
}

#[test]
fn test_evaluate_one_input_shape_mismatch() {
    let mut session = ScriptedSession::new(Vec::new());
    session.input_shape = vec![1, 1, 32, 32];
    let error = evaluate_one(&mut session, &sample(0, 0)).unwrap_err();

    assert!(matches!(
        error,
        EvalError::Inference(InferenceError::ShapeMismatch {
            expected: 1024,
            got: 784
        })
    ));
    assert!(!error.is_fatal());
    assert_eq!(session.calls, 0);
}
