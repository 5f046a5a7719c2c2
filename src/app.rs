//! Main application orchestration and execution

use crate::{
    cli::{AnalyzeArgs, Cli, Command},
    client::{retry::RetryPolicy, HttpTransport, Transport},
    config::{display_config_summary, load_config},
    error::{AppError, Result},
    executor::{CollectionSummary, PairedSampler, ProbeTarget, WarmupDriver},
    logging::Logger,
    models::{Config, Slot},
    output::{ConsoleProgress, ReportFormatter},
    platform::PlatformTuner,
    stats::{AnalysisReport, Column, RankSumAnalyzer, SampleSelector},
    store::{JsonLinesStore, SampleStore},
};
use std::sync::Arc;

/// How a collection run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    Completed(CollectionSummary),
    /// Stopped by a signal; records stored before it are kept
    Interrupted { signal: &'static str, kept: usize },
}

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    /// Create a new application instance with CLI configuration
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the selected subcommand
    pub async fn run(self) -> Result<()> {
        let config = load_config(self.cli.clone())?;

        if config.debug {
            eprintln!("{} v{} ({}, built {})", crate::PKG_NAME, crate::VERSION, crate::GIT_COMMIT, crate::BUILD_TIME);
            eprintln!("{}", display_config_summary(&config));
            eprintln!();
        }

        let logger = Logger::with_config("APP", &config);
        logger.start_session();

        match &self.cli.command {
            Command::Collect { label } => {
                let tuner = config
                    .enable_tuning
                    .then(|| PlatformTuner::from_config(&config, logger.clone()));
                let outcome = run_collect(&config, label, &logger, tuner, shutdown_signal()).await?;
                if let CollectOutcome::Interrupted { .. } = outcome {
                    logger.warn("Collection interrupted").log();
                }
                Ok(())
            }
            Command::Analyze(args) => run_analyze(&config, args, &logger),
        }
    }
}

/// Tune, warm up and collect `config.sample_count` records under `label`.
///
/// `tuner`, when given, is applied before warm-up. `interrupt` resolves when
/// the operator asks to stop. Platform settings are restored on every path
/// out of this function.
pub async fn run_collect<F>(
    config: &Config,
    label: &str,
    logger: &Logger,
    tuner: Option<PlatformTuner>,
    interrupt: F,
) -> Result<CollectOutcome>
where
    F: std::future::Future<Output = &'static str>,
{
    if label.is_empty() {
        return Err(AppError::invalid_input("Label cannot be empty"));
    }
    logger.add_context_field("label", label);

    let formatter = ReportFormatter::new(config.enable_color);
    let mut store = JsonLinesStore::open_or_create(&config.store_path, logger)?;
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::with_options(
        config.timeout(),
        RetryPolicy::default(),
        logger.clone(),
    )?);
    let target = ProbeTarget::from(config);

    let success = config.success_char.to_string();
    let fail = config.fail_char.to_string();
    let tokens = [
        target.forge.forge(&config.valid_prefix, &success, config.missing_length)?,
        target.forge.forge(&config.valid_prefix, &fail, config.missing_length)?,
    ];
    println!("{}", formatter.collection_banner(label, [&tokens[0], &tokens[1]], config.sample_count));
    println!();

    let guard = tuner.map(|tuner| tuner.acquire());

    let kept_before = store.count(label);
    let collection = async {
        if config.warmup_count > 0 {
            let report = WarmupDriver::new(transport.clone(), target.clone(), logger.clone())
                .run(&config.valid_prefix, &success, &fail, config.missing_length, config.warmup_count)
                .await?;
            if config.verbose {
                println!("Warm-up: {} requests, {} failed", report.sent, report.failed);
            }
        }

        let mut sampler = PairedSampler::new(transport.clone(), target.clone(), logger.clone())
            .with_progress(Box::new(ConsoleProgress::new(config.enable_color)));
        sampler
            .collect(
                &mut store,
                label,
                &config.valid_prefix,
                &success,
                &fail,
                config.missing_length,
                config.sample_count,
            )
            .await
    };

    let finished = tokio::select! {
        result = collection => Ok(result),
        signal = interrupt => Err(signal),
    };
    let outcome = match finished {
        Ok(result) => CollectOutcome::Completed(result?),
        Err(signal) => CollectOutcome::Interrupted {
            signal,
            kept: store.count(label).saturating_sub(kept_before),
        },
    };

    if let Some(guard) = guard {
        guard.release();
    }

    match outcome {
        CollectOutcome::Completed(summary) => {
            println!("{}", formatter.collection_summary(label, &summary));
        }
        CollectOutcome::Interrupted { signal, kept } => {
            eprintln!();
            if signal == "SIGINT" {
                println!("User pressed Ctrl+C.");
            } else {
                println!("Received {}.", signal);
            }
            println!("Kept {} records under '{}'", kept, label);
        }
    }

    Ok(outcome)
}

/// Print the label listing or a rank-sum comparison
pub fn run_analyze(config: &Config, args: &AnalyzeArgs, logger: &Logger) -> Result<()> {
    let store = JsonLinesStore::open_existing(&config.store_path, logger)?;
    println!("{}", analyze_store(&store, args, config.enable_color)?);
    Ok(())
}

/// Build the `analyze` output for `args` from any store
pub fn analyze_store<S: SampleStore + ?Sized>(store: &S, args: &AnalyzeArgs, use_color: bool) -> Result<String> {
    let formatter = ReportFormatter::new(use_color);
    if args.list {
        return Ok(formatter.label_listing(&store.labels()));
    }

    let label_a = args
        .label
        .as_deref()
        .ok_or_else(|| AppError::invalid_input("A label is required"))?;
    ensure_label(store, label_a)?;

    let analyzer = if args.tie_correction {
        RankSumAnalyzer::new().with_tie_correction()
    } else {
        RankSumAnalyzer::new()
    };

    let report = match args.label_b.as_deref() {
        None => {
            let (zero, one) = Column::extract_pair(store.query_by_label(label_a)?, args.metric)?;
            AnalysisReport::build(
                &analyzer,
                args.metric,
                (format!("{} {}", label_a, SampleSelector::Slot(Slot::Zero)), &zero),
                (format!("{} {}", label_a, SampleSelector::Slot(Slot::One)), &one),
            )?
        }
        Some(label_b) => {
            ensure_label(store, label_b)?;
            let selector = match &args.token {
                Some(token) => SampleSelector::Token(token.clone()),
                None => SampleSelector::Slot(args.slot),
            };
            let a = Column::extract(store.query_by_label(label_a)?, &selector, args.metric)?;
            let b = Column::extract(store.query_by_label(label_b)?, &selector, args.metric)?;
            AnalysisReport::build(
                &analyzer,
                args.metric,
                (format!("{} {}", label_a, selector), &a),
                (format!("{} {}", label_b, selector), &b),
            )?
        }
    };

    Ok(formatter.analysis(&report))
}

fn ensure_label<S: SampleStore + ?Sized>(store: &S, label: &str) -> Result<()> {
    if store.count(label) == 0 {
        return Err(AppError::invalid_input(format!("No records under label '{}'", label)));
    }
    Ok(())
}

/// Resolves with the signal name on Ctrl+C, or SIGTERM on Unix
pub async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut term) = signal(SignalKind::terminate()) {
            return tokio::select! {
                _ = ctrl_c() => "SIGINT",
                _ = term.recv() => "SIGTERM",
            };
        }
    }

    ctrl_c().await;
    "SIGINT"
}

async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No handler could be installed; never fire
        std::future::pending::<()>().await;
    }
}
