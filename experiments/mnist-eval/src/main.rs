use {
    anyhow::Context,
    base::*,
    clap::{Parser, ValueEnum},
    evaluation::*,
    onnx::{ORT_API_VERSION, Onnx},
    std::{path::PathBuf, process::ExitCode},
};

const FRAMEWORK: &str = "ONNX Runtime";

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SchemaArg {
    Auto,
    Mnist,
    Common,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FailureArg {
    Exclude,
    CountAsIncorrect,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MissingArg {
    Skip,
    Placeholder,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PlatformArg {
    Android,
    Desktop,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OptimizationArg {
    Disabled,
    Basic,
    Extended,
    All,
}

/// Evaluate an MNIST classifier on a directory of test samples.
#[derive(Parser, Debug)]
#[command(name = "mnist-eval")]
#[command(about = "Accuracy and latency of an ONNX MNIST model on a fixed test set")]
struct Cli {
    /// TOML config file; command line options override it
    #[arg(short, long, env = "MNIST_EVAL_CONFIG")]
    config: Option<PathBuf>,

    /// Model file
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Dataset directory containing metadata.json
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// Platform whose default paths are used
    #[arg(long, value_enum)]
    platform: Option<PlatformArg>,

    /// Label written into reports and result file names
    #[arg(long)]
    label: Option<String>,

    #[arg(long, value_enum)]
    schema: Option<SchemaArg>,

    /// How failed samples count toward accuracy
    #[arg(long, value_enum)]
    failure_policy: Option<FailureArg>,

    /// What to do when a sample file is missing
    #[arg(long, value_enum)]
    missing: Option<MissingArg>,

    #[arg(long, value_enum)]
    optimization: Option<OptimizationArg>,

    /// Read the model into memory before creating the session
    #[arg(long)]
    memory: bool,

    /// Text results file
    #[arg(long)]
    results: Option<PathBuf>,

    /// JSON results file
    #[arg(long)]
    json: Option<PathBuf>,

    /// Include one line per sample in the text report
    #[arg(long)]
    details: bool,

    /// Also write logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Samples between progress lines
    #[arg(long)]
    progress: Option<usize>,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn layer(&self) -> ConfigLayer {
        ConfigLayer {
            platform: self.platform.map(|platform| match platform {
                PlatformArg::Android => Platform::Android,
                PlatformArg::Desktop => Platform::Desktop,
            }),
            platform_label: self.label.clone(),
            model_path: self.model.clone(),
            model_in_memory: self.memory.then_some(true),
            dataset_root: self.dataset.clone(),
            schema: self.schema.map(|schema| match schema {
                SchemaArg::Auto => SchemaChoice::Auto,
                SchemaArg::Mnist => SchemaChoice::Mnist,
                SchemaArg::Common => SchemaChoice::Common,
            }),
            failure_policy: self.failure_policy.map(|policy| match policy {
                FailureArg::Exclude => FailurePolicy::Exclude,
                FailureArg::CountAsIncorrect => FailurePolicy::CountAsIncorrect,
            }),
            missing_sample_policy: self.missing.map(|policy| match policy {
                MissingArg::Skip => MissingSamplePolicy::Skip,
                MissingArg::Placeholder => MissingSamplePolicy::Placeholder,
            }),
            optimization: self.optimization.map(|level| match level {
                OptimizationArg::Disabled => Optimization::Disabled,
                OptimizationArg::Basic => Optimization::Basic,
                OptimizationArg::Extended => Optimization::Extended,
                OptimizationArg::All => Optimization::All,
            }),
            progress_interval: self.progress,
            results_path: self.results.clone(),
            json_results_path: self.json.clone(),
            details: self.details.then_some(true),
            log_dir: self.log_dir.clone(),
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<EvalConfig> {
    let file = match &cli.config {
        Some(path) => ConfigLayer::load_toml(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ConfigLayer::default(),
    };
    Ok(EvalConfig::resolve(file.merge(cli.layer()))?)
}

fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = load_config(&cli)?;

    if let Some(dir) = &config.log_dir {
        init_tee_logger(dir)?;
    }
    if cli.verbose {
        set_max_level(Level::Debug);
    }

    log_info!(
        "Platform {} ({:?}), model {}, dataset {}",
        config.platform_label,
        config.platform,
        config.model_path.display(),
        config.dataset_root.display()
    );

    let onnx = Onnx::new(ORT_API_VERSION).context("initializing ONNX Runtime")?;
    log_info!("ONNX Runtime {}", onnx.version());

    let model = if config.model_in_memory {
        ModelSource::read_into_memory(&config.model_path)?
    } else {
        ModelSource::File(config.model_path.clone())
    };
    let mut session = OnnxSession::open(&onnx, &model, config.optimization.into())?;

    let source = DirectorySource::open(
        &config.dataset_root,
        config.schema.version(),
        config.missing_sample_policy,
    )?;

    // single sample first, so a broken pipeline shows up before the pass
    if let Some(Ok(first)) = source.samples().next() {
        match evaluate_one(&mut session, &first) {
            Ok(result) => log_info!(
                "Sample {}: true={}, predicted={}, confidence={:.3}, {:.2} ms",
                result.sample_id,
                result.true_label,
                result.predicted_class,
                result.confidence,
                result.latency_ms
            ),
            Err(error) => log_warn!("Sample {}: {}", first.sample_id, error),
        }
    }

    let mut evaluator =
        BatchEvaluator::new(config.failure_policy).with_progress_interval(config.progress_interval);
    let mut observer = |progress: &Progress| {
        log_info!(
            "Processed {}/{}, running accuracy {:.2}%",
            progress.processed,
            progress.expected,
            progress.running_accuracy * 100.0
        );
    };
    let evaluation = evaluator.evaluate(&mut session, &source, &mut observer)?;

    let report = RunReport {
        platform: &config.platform_label,
        framework: FRAMEWORK,
        evaluation: &evaluation,
    };
    let mut reporters: Vec<Box<dyn Reporter>> =
        vec![Box::new(TextReporter::stdout().with_details(config.details))];
    if let Some(path) = &config.results_path {
        reporters.push(Box::new(TextReporter::file(path).with_details(config.details)));
    }
    if let Some(path) = &config.json_results_path {
        reporters.push(Box::new(JsonReporter::new(path)));
    }
    for reporter in &reporters {
        if let Err(error) = reporter.report(&report) {
            log_error!("{} report failed: {}", reporter.name(), error);
        }
    }
    if let Some(path) = &config.results_path {
        log_info!("Results saved to {}", path.display());
    }

    Ok(evaluation.is_completed())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    base::init_stdout_logger();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            log_fatal!("{:#}", error);
            ExitCode::FAILURE
        }
    }
}
