//! Rendering of a finished pass: plain text for people, JSON for comparison tooling.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ReportError;
use crate::evaluator::{Evaluation, EvaluatorState, SampleOutcome};

/// Everything a reporter needs about a pass.
pub struct RunReport<'a> {
    pub platform: &'a str,
    pub framework: &'a str,
    pub evaluation: &'a Evaluation,
}

pub trait Reporter {
    fn name(&self) -> &str;
    fn report(&self, run: &RunReport<'_>) -> Result<(), ReportError>;
}

fn write_file(path: &Path, contents: &str) -> Result<(), ReportError> {
    let io_error = |source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    std::fs::write(path, contents).map_err(io_error)
}

fn synthetic_marker(synthetic: bool) -> &'static str {
    if synthetic { " (synthetic)" } else { "" }
}

/// Summary block with the bounded misclassified and failed lists.
pub fn render_summary(run: &RunReport<'_>) -> String {
    let evaluation = run.evaluation;
    let statistics = &evaluation.statistics;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "=== Evaluation results ({}, {}) ===",
        run.platform, run.framework
    );

    match evaluation.summary() {
        Ok(summary) => {
            let _ = writeln!(out, "Total samples: {}", summary.total);
            let _ = writeln!(out, "Correct predictions: {}", summary.correct);
            let _ = writeln!(out, "Failed samples: {}", summary.failed);
            let _ = writeln!(out, "Accuracy: {:.2}%", summary.accuracy * 100.0);
            let _ = writeln!(
                out,
                "Average inference time: {:.2} ms",
                summary.avg_latency_ms
            );
            let _ = writeln!(
                out,
                "Latency min/max/std: {:.2} / {:.2} / {:.2} ms",
                summary.min_latency_ms, summary.max_latency_ms, summary.std_latency_ms
            );
            let _ = writeln!(out, "Throughput: {:.1} FPS", summary.fps);
        }
        Err(error) => {
            let _ = writeln!(out, "Failed samples: {}", statistics.failed());
            let _ = writeln!(out, "{}", error);
        }
    }

    let misclassified = statistics.misclassified();
    if !misclassified.is_empty() {
        let _ = writeln!(
            out,
            "\nMisclassified samples ({}):",
            misclassified.len() + statistics.misclassified_overflow()
        );
        for result in misclassified {
            let _ = writeln!(
                out,
                "  Sample {:3}: true={}, predicted={}, confidence={:.3}, latency={:.2} ms{}",
                result.sample_id,
                result.true_label,
                result.predicted_class,
                result.confidence,
                result.latency_ms,
                synthetic_marker(result.synthetic)
            );
        }
        if statistics.misclassified_overflow() > 0 {
            let _ = writeln!(
                out,
                "  ... {} more not shown",
                statistics.misclassified_overflow()
            );
        }
    }

    let failures = statistics.failures();
    if !failures.is_empty() {
        let _ = writeln!(
            out,
            "\nFailed samples ({}):",
            failures.len() + statistics.failures_overflow()
        );
        for failure in failures {
            let _ = writeln!(out, "  Sample {:3}: {}", failure.sample_id, failure.reason);
        }
        if statistics.failures_overflow() > 0 {
            let _ = writeln!(
                out,
                "  ... {} more not shown",
                statistics.failures_overflow()
            );
        }
    }

    if evaluation.state == EvaluatorState::Aborted {
        let _ = writeln!(
            out,
            "\nPass aborted: {}",
            evaluation.abort_reason.as_deref().unwrap_or("unknown reason")
        );
    }

    out
}

/// One line per processed sample, in source order.
pub fn render_details(evaluation: &Evaluation) -> String {
    let mut out = String::from("Per-sample results:\n");
    for outcome in &evaluation.outcomes {
        match outcome {
            SampleOutcome::Evaluated(result) => {
                let _ = writeln!(
                    out,
                    "  Sample {:3} (index {:5}): true={}, predicted={}, confidence={:.4}, latency={:.2} ms, {}{}",
                    result.sample_id,
                    result.original_index,
                    result.true_label,
                    result.predicted_class,
                    result.confidence,
                    result.latency_ms,
                    if result.is_correct { "correct" } else { "WRONG" },
                    synthetic_marker(result.synthetic)
                );
            }
            SampleOutcome::Failed(failure) => {
                let _ = writeln!(
                    out,
                    "  Sample {:3}: FAILED, {}",
                    failure.sample_id, failure.reason
                );
            }
        }
    }
    out
}

/// Text report to stdout, or to a file when a path is given.
pub struct TextReporter {
    path: Option<PathBuf>,
    details: bool,
}

impl TextReporter {
    pub fn stdout() -> Self {
        TextReporter {
            path: None,
            details: false,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        TextReporter {
            path: Some(path.into()),
            details: false,
        }
    }

    pub fn with_details(mut self, details: bool) -> Self {
        self.details = details;
        self
    }

    pub fn render(&self, run: &RunReport<'_>) -> String {
        let mut text = render_summary(run);
        if self.details {
            text.push('\n');
            text.push_str(&render_details(run.evaluation));
        }
        text
    }
}

impl Reporter for TextReporter {
    fn name(&self) -> &str {
        "text"
    }

    fn report(&self, run: &RunReport<'_>) -> Result<(), ReportError> {
        let text = self.render(run);
        match &self.path {
            None => {
                print!("{}", text);
                Ok(())
            }
            Some(path) => write_file(path, &text),
        }
    }
}

#[derive(Serialize)]
struct JsonSummary {
    accuracy: f64,
    average_inference_time_ms: f64,
    std_inference_time_ms: f64,
    min_inference_time_ms: f64,
    max_inference_time_ms: f64,
    fps: f64,
    total_samples: usize,
    correct_predictions: usize,
    wrong_predictions: usize,
    failed_samples: usize,
}

#[derive(Serialize)]
struct JsonResult<'a> {
    sample_id: usize,
    original_mnist_index: usize,
    true_label: u8,
    predicted_class: usize,
    confidence: f32,
    probabilities: &'a [f32],
    inference_time_ms: f64,
    is_correct: bool,
    synthetic: bool,
}

#[derive(Serialize)]
struct JsonFailure<'a> {
    sample_id: usize,
    original_mnist_index: Option<usize>,
    true_label: Option<u8>,
    reason: &'a str,
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    platform: &'a str,
    framework: &'a str,
    completed: bool,
    summary: Option<JsonSummary>,
    results: Vec<JsonResult<'a>>,
    failures: Vec<JsonFailure<'a>>,
}

/// JSON results document for cross-platform comparison.
pub fn render_json(run: &RunReport<'_>) -> Result<String, ReportError> {
    let evaluation = run.evaluation;
    let summary = evaluation.summary().ok().map(|summary| JsonSummary {
        accuracy: summary.accuracy,
        average_inference_time_ms: summary.avg_latency_ms,
        std_inference_time_ms: summary.std_latency_ms,
        min_inference_time_ms: summary.min_latency_ms,
        max_inference_time_ms: summary.max_latency_ms,
        fps: summary.fps,
        total_samples: summary.total,
        correct_predictions: summary.correct,
        wrong_predictions: summary.wrong,
        failed_samples: summary.failed,
    });

    let mut results = Vec::new();
    let mut failures = Vec::new();
    for outcome in &evaluation.outcomes {
        match outcome {
            SampleOutcome::Evaluated(result) => results.push(JsonResult {
                sample_id: result.sample_id,
                original_mnist_index: result.original_index,
                true_label: result.true_label,
                predicted_class: result.predicted_class,
                confidence: result.confidence,
                probabilities: &result.probabilities,
                inference_time_ms: result.latency_ms,
                is_correct: result.is_correct,
                synthetic: result.synthetic,
            }),
            SampleOutcome::Failed(failure) => failures.push(JsonFailure {
                sample_id: failure.sample_id,
                original_mnist_index: failure.original_index,
                true_label: failure.true_label,
                reason: &failure.reason,
            }),
        }
    }

    let document = JsonDocument {
        platform: run.platform,
        framework: run.framework,
        completed: evaluation.is_completed(),
        summary,
        results,
        failures,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

pub struct JsonReporter {
    path: PathBuf,
}

impl JsonReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonReporter { path: path.into() }
    }
}

impl Reporter for JsonReporter {
    fn name(&self) -> &str {
        "json"
    }

    fn report(&self, run: &RunReport<'_>) -> Result<(), ReportError> {
        let text = render_json(run)?;
        write_file(&self.path, &text)
    }
}
