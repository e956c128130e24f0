use evaluation::stats::MISCLASSIFIED_LIMIT;
use evaluation::{FailedSample, FailurePolicy, InferenceResult, RunStatistics, StatsError};

fn result(sample_id: usize, is_correct: bool) -> InferenceResult {
    InferenceResult {
        sample_id,
        original_index: sample_id * 7,
        true_label: 4,
        predicted_class: if is_correct { 4 } else { 9 },
        confidence: 0.8,
        probabilities: vec![0.0, 0.0, 0.0, 0.0, 0.8, 0.0, 0.0, 0.0, 0.0, 0.2],
        latency_ms: 1.5,
        is_correct,
        synthetic: false,
    }
}

fn failure(sample_id: usize) -> FailedSample {
    FailedSample {
        sample_id,
        original_index: None,
        true_label: None,
        reason: "engine error".to_string(),
    }
}

#[test]
fn test_accuracy_and_misclassified_bound() {
    for (n, k) in [(10, 10), (10, 7), (10, 5), (10, 0), (23, 11), (1, 0)] {
        let mut stats = RunStatistics::new(FailurePolicy::Exclude);
        for i in 0..n {
            stats.record(&result(i, i < k));
        }
        let summary = stats.finalize().unwrap();
        assert!((summary.accuracy - k as f64 / n as f64).abs() < 1e-12);
        assert!(stats.misclassified().len() <= MISCLASSIFIED_LIMIT);
        assert_eq!(stats.misclassified().len(), (n - k).min(MISCLASSIFIED_LIMIT));
        assert_eq!(stats.misclassified_overflow(), (n - k).saturating_sub(5));
        assert_eq!(summary.correct + summary.wrong, summary.total);
    }
}

#[test]
fn test_misclassified_keeps_first_in_order() {
    let mut stats = RunStatistics::new(FailurePolicy::Exclude);
    for i in 0..8 {
        stats.record(&result(i, false));
    }
    let ids: Vec<usize> = stats.misclassified().iter().map(|r| r.sample_id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    assert_eq!(stats.misclassified_overflow(), 3);
}

#[test]
fn test_no_samples_evaluated() {
    let stats = RunStatistics::new(FailurePolicy::Exclude);
    assert_eq!(stats.finalize().unwrap_err(), StatsError::NoSamplesEvaluated);
    assert_eq!(stats.running_accuracy(), None);
}

#[test]
fn test_only_failures_excluded() {
    let mut stats = RunStatistics::new(FailurePolicy::Exclude);
    stats.record_failure(failure(0));
    assert_eq!(stats.failed(), 1);
    assert_eq!(stats.finalize().unwrap_err(), StatsError::NoSamplesEvaluated);
}

#[test]
fn test_only_failures_counted_as_incorrect() {
    let mut stats = RunStatistics::new(FailurePolicy::CountAsIncorrect);
    stats.record_failure(failure(0));
    stats.record_failure(failure(1));
    let summary = stats.finalize().unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.accuracy, 0.0);
    assert_eq!(summary.avg_latency_ms, 0.0);
    assert_eq!(summary.fps, 0.0);
}

#[test]
fn test_latency_averaged_over_timed_samples() {
    let mut stats = RunStatistics::new(FailurePolicy::CountAsIncorrect);
    stats.record(&result(0, true));
    stats.record(&result(1, true));
    stats.record_failure(failure(2));
    let summary = stats.finalize().unwrap();
    assert_eq!(summary.total, 3);
    assert!((summary.avg_latency_ms - 1.5).abs() < 1e-12);
    assert!((summary.fps - 1000.0 / 1.5).abs() < 1e-9);
    assert_eq!(stats.sum_latency_ms(), 3.0);
}

#[test]
fn test_failure_list_bounded() {
    let mut stats = RunStatistics::new(FailurePolicy::Exclude);
    for i in 0..7 {
        stats.record_failure(failure(i));
    }
    assert_eq!(stats.failures().len(), 5);
    assert_eq!(stats.failures_overflow(), 2);
    assert_eq!(stats.processed(), 7);
}
