use serde::{Deserialize, Serialize};

use crate::error::StatsError;

/// Misclassified samples kept for reporting; the rest are only counted.
pub const MISCLASSIFIED_LIMIT: usize = 5;

/// Failed samples kept for reporting; the rest are only counted.
pub const FAILURE_LIMIT: usize = 5;

/// How samples that could not be evaluated enter the accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Left out of the accuracy denominator.
    #[default]
    Exclude,
    /// Counted as wrong predictions.
    CountAsIncorrect,
}

/// Outcome of one successfully evaluated sample.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    pub sample_id: usize,
    pub original_index: usize,
    pub true_label: u8,
    pub predicted_class: usize,
    pub confidence: f32,
    pub probabilities: Vec<f32>,
    pub latency_ms: f64,
    pub is_correct: bool,
    pub synthetic: bool,
}

/// A sample that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedSample {
    pub sample_id: usize,
    pub original_index: Option<usize>,
    pub true_label: Option<u8>,
    pub reason: String,
}

/// Final figures of a pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub total: usize,
    pub correct: usize,
    pub wrong: usize,
    pub failed: usize,
    pub accuracy: f64,
    pub avg_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub std_latency_ms: f64,
    pub fps: f64,
}

/// Running accumulator, fed one sample at a time in source order.
#[derive(Debug, Clone)]
pub struct RunStatistics {
    policy: FailurePolicy,
    evaluated: usize,
    correct: usize,
    failed: usize,
    sum_latency_ms: f64,
    sum_sq_latency_ms: f64,
    min_latency_ms: f64,
    max_latency_ms: f64,
    misclassified: Vec<InferenceResult>,
    misclassified_overflow: usize,
    failures: Vec<FailedSample>,
    failures_overflow: usize,
}

impl RunStatistics {
    pub fn new(policy: FailurePolicy) -> Self {
        RunStatistics {
            policy,
            evaluated: 0,
            correct: 0,
            failed: 0,
            sum_latency_ms: 0.0,
            sum_sq_latency_ms: 0.0,
            min_latency_ms: f64::INFINITY,
            max_latency_ms: 0.0,
            misclassified: Vec::new(),
            misclassified_overflow: 0,
            failures: Vec::new(),
            failures_overflow: 0,
        }
    }

    pub fn record(&mut self, result: &InferenceResult) {
        self.evaluated += 1;
        self.sum_latency_ms += result.latency_ms;
        self.sum_sq_latency_ms += result.latency_ms * result.latency_ms;
        self.min_latency_ms = self.min_latency_ms.min(result.latency_ms);
        self.max_latency_ms = self.max_latency_ms.max(result.latency_ms);
        if result.is_correct {
            self.correct += 1;
        } else if self.misclassified.len() < MISCLASSIFIED_LIMIT {
            self.misclassified.push(result.clone());
        } else {
            self.misclassified_overflow += 1;
        }
    }

    pub fn record_failure(&mut self, failure: FailedSample) {
        self.failed += 1;
        if self.failures.len() < FAILURE_LIMIT {
            self.failures.push(failure);
        } else {
            self.failures_overflow += 1;
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Accuracy denominator under the failure policy.
    pub fn total(&self) -> usize {
        match self.policy {
            FailurePolicy::Exclude => self.evaluated,
            FailurePolicy::CountAsIncorrect => self.evaluated + self.failed,
        }
    }

    /// Samples that went through inference and were scored.
    pub fn evaluated(&self) -> usize {
        self.evaluated
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Evaluated plus failed.
    pub fn processed(&self) -> usize {
        self.evaluated + self.failed
    }

    pub fn sum_latency_ms(&self) -> f64 {
        self.sum_latency_ms
    }

    pub fn misclassified(&self) -> &[InferenceResult] {
        &self.misclassified
    }

    pub fn misclassified_overflow(&self) -> usize {
        self.misclassified_overflow
    }

    pub fn failures(&self) -> &[FailedSample] {
        &self.failures
    }

    pub fn failures_overflow(&self) -> usize {
        self.failures_overflow
    }

    pub fn running_accuracy(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.correct as f64 / total as f64),
        }
    }

    pub fn finalize(&self) -> Result<Summary, StatsError> {
        let total = self.total();
        if total == 0 {
            return Err(StatsError::NoSamplesEvaluated);
        }

        let (avg, min, max, std) = if self.evaluated == 0 {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            let n = self.evaluated as f64;
            let avg = self.sum_latency_ms / n;
            let variance = (self.sum_sq_latency_ms / n - avg * avg).max(0.0);
            (avg, self.min_latency_ms, self.max_latency_ms, variance.sqrt())
        };

        Ok(Summary {
            total,
            correct: self.correct,
            wrong: total - self.correct,
            failed: self.failed,
            accuracy: self.correct as f64 / total as f64,
            avg_latency_ms: avg,
            min_latency_ms: min,
            max_latency_ms: max,
            std_latency_ms: std,
            fps: if avg > 0.0 { 1000.0 / avg } else { 0.0 },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(sample_id: usize, is_correct: bool, latency_ms: f64) -> InferenceResult {
        InferenceResult {
            sample_id,
            original_index: sample_id,
            true_label: 1,
            predicted_class: if is_correct { 1 } else { 2 },
            confidence: 0.9,
            probabilities: vec![],
            latency_ms,
            is_correct,
            synthetic: false,
        }
    }

    #[test]
    fn test_latency_spread() {
        let mut stats = RunStatistics::new(FailurePolicy::Exclude);
        stats.record(&result(0, true, 1.0));
        stats.record(&result(1, true, 3.0));
        let summary = stats.finalize().unwrap();
        assert_eq!(summary.avg_latency_ms, 2.0);
        assert_eq!(summary.min_latency_ms, 1.0);
        assert_eq!(summary.max_latency_ms, 3.0);
        assert!((summary.std_latency_ms - 1.0).abs() < 1e-9);
        assert!((summary.fps - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_latency_gives_zero_fps() {
        let mut stats = RunStatistics::new(FailurePolicy::Exclude);
        stats.record(&result(0, true, 0.0));
        assert_eq!(stats.finalize().unwrap().fps, 0.0);
    }
}
