use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use phl_viewer_core::alphabet::domain::alphabet_transcoder::{render, Notation};
use phl_viewer_core::analysis::domain::analysis_collection::AnalysisCollection;
use phl_viewer_core::analysis::domain::analyzer::{Analyzer, AnalyzerFactory};
use phl_viewer_core::analysis::domain::diff_step::DiffAction;
use phl_viewer_core::analysis::domain::group_report::{group_report, GroupBy, RateStatistics};
use phl_viewer_core::analysis::infrastructure::http_analyzer::HttpAnalyzer;
use phl_viewer_core::pipeline::analyzer_adapter::{AnalyzerAdapter, ProgressFn};
use phl_viewer_core::pipeline::batch_executor::BatchExecutor;
use phl_viewer_core::pipeline::infrastructure::sequential_batch_executor::SequentialBatchExecutor;
use phl_viewer_core::pipeline::infrastructure::threaded_batch_executor::ThreadedBatchExecutor;
use phl_viewer_core::pipeline::pipeline_logger::LogPipelineLogger;
use phl_viewer_core::report::report_writer::write_reports;
use phl_viewer_core::report::result_table::ResultTable;
use phl_viewer_core::shared::settings::Settings;
use phl_viewer_core::transcript::infrastructure::transcript_file_reader::parse_file;

/// Progress lines are logged every this many utterances.
const PROGRESS_LOG_INTERVAL: usize = 25;

/// Phonological error rates for pairs of phoneme transcripts.
#[derive(Parser)]
#[command(name = "phl-viewer")]
struct Cli {
    /// Transcript file: tab-separated, or comma-separated if it ends in .csv.
    input: PathBuf,

    /// Notation for phoneme tokens: ipa or arpabet.
    #[arg(long)]
    alphabet: Option<String>,

    /// Base URL of the analysis service.
    #[arg(long)]
    endpoint: Option<String>,

    /// Feature system used by the analyzer.
    #[arg(long)]
    system: Option<String>,

    /// Maximum number of utterances analyzed at once.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Per-call analyzer timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// How long a call may wait for a busy non-reentrant analyzer, in
    /// milliseconds.
    #[arg(long)]
    queue_timeout_ms: Option<u64>,

    /// Settings file to use instead of the per-user one.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Write the analysis JSON and grouped CSV reports to this directory.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Print feature deltas for each substitution in this utterance.
    #[arg(long)]
    deltas: Option<String>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let settings = resolve_settings(&cli)?;
    settings.validate()?;

    let transcripts = parse_file(&cli.input)?;
    log::info!(
        "Loaded {} transcript pairs from {}",
        transcripts.rows.len(),
        cli.input.display()
    );

    let adapter = build_adapter(&settings);
    let progress: ProgressFn = Box::new(|current, total| {
        eprint!("\rAnalyzing utterance {current}/{total}");
        true
    });
    let collection = adapter.analyze_all(&transcripts.rows, Some(progress))?;
    eprintln!();

    let labels = [transcripts.label_left(), transcripts.label_right()];
    print!(
        "{}",
        ResultTable::new(&collection, labels, settings.alphabet).render()
    );
    log_group_statistics(&collection);

    if let Some(out_dir) = &cli.out_dir {
        let written = write_reports(&collection, &cli.input, out_dir)?;
        log::info!("Wrote {} report files to {}", written.len(), out_dir.display());
    }

    if let Some(id) = &cli.deltas {
        print_deltas(&adapter, &collection, id, settings.alphabet)?;
    }

    Ok(())
}

fn resolve_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = match &cli.settings {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load(),
    };

    if let Some(alphabet) = &cli.alphabet {
        settings.alphabet = alphabet.parse()?;
    }
    if let Some(endpoint) = &cli.endpoint {
        settings.endpoint = endpoint.clone();
    }
    if let Some(system) = &cli.system {
        settings.system = system.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        settings.concurrency = concurrency;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        settings.call_timeout_ms = timeout_ms;
    }
    if let Some(queue_timeout_ms) = cli.queue_timeout_ms {
        settings.queue_timeout_ms = queue_timeout_ms;
    }

    Ok(settings)
}

fn build_adapter(settings: &Settings) -> AnalyzerAdapter {
    let endpoint = settings.endpoint.clone();
    let system = settings.system.clone();
    let reentrant = settings.analyzer_reentrant;
    let request_timeout = settings.call_timeout();
    let factory: AnalyzerFactory = Box::new(move || {
        let analyzer = HttpAnalyzer::connect(&endpoint, &system, reentrant, request_timeout)?;
        Ok(Arc::new(analyzer) as Arc<dyn Analyzer>)
    });

    let executor: Box<dyn BatchExecutor> = if settings.concurrency > 1 {
        Box::new(ThreadedBatchExecutor::new(settings.concurrency))
    } else {
        Box::new(SequentialBatchExecutor::new())
    };

    AnalyzerAdapter::new(factory, executor, settings.call_timeout())
        .with_queue_timeout(settings.queue_timeout())
        .with_logger(Box::new(LogPipelineLogger::new(PROGRESS_LOG_INTERVAL)))
}

fn log_group_statistics(collection: &AnalysisCollection) {
    for &by in GroupBy::ALL {
        let rows = group_report(collection, by);
        let fer = RateStatistics::from_rates(rows.iter().map(|r| r.fer));
        let per = RateStatistics::from_rates(rows.iter().map(|r| r.per));
        for (name, stats) in [("FER", fer), ("PER", per)] {
            if let Some(stats) = stats {
                log::info!(
                    "{name} by {}: mean {:.1}%, median {:.1}%, std {} over {} groups",
                    by.file_suffix(),
                    stats.mean * 100.0,
                    stats.median * 100.0,
                    stats
                        .std
                        .map(|s| format!("{:.1}%", s * 100.0))
                        .unwrap_or_else(|| "n/a".to_string()),
                    stats.count
                );
            }
        }
    }
}

fn print_deltas(
    adapter: &AnalyzerAdapter,
    collection: &AnalysisCollection,
    id: &str,
    notation: Notation,
) -> Result<(), Box<dyn std::error::Error>> {
    let analysis = collection
        .get(id)
        .ok_or_else(|| format!("No analyzed utterance with id '{id}'"))?;

    let substitutions: Vec<_> = analysis
        .phonemes
        .steps()
        .iter()
        .filter(|s| s.action() == DiffAction::Sub)
        .collect();
    if substitutions.is_empty() {
        println!("{id}: no substitutions");
        return Ok(());
    }

    println!("{id}:");
    for step in substitutions {
        let left = step.left().unwrap_or_default();
        let right = step.right().unwrap_or_default();
        let changes: Vec<String> = adapter
            .get_deltas(left, right)?
            .iter()
            .map(|d| d.to_string())
            .collect();
        println!(
            "  {} \u{2192} {}: {}",
            render(left, notation),
            render(right, notation),
            changes.join(", ")
        );
    }
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if let Some(alphabet) = &cli.alphabet {
        if !Notation::ALL.iter().any(|n| n.as_str() == alphabet.as_str()) {
            return Err(format!("Alphabet must be 'ipa' or 'arpabet', got '{alphabet}'").into());
        }
    }
    if cli.concurrency == Some(0) {
        return Err("Concurrency must be at least 1".into());
    }
    if cli.timeout_ms == Some(0) {
        return Err("Timeout must be greater than 0 ms".into());
    }
    if cli.queue_timeout_ms == Some(0) {
        return Err("Queue timeout must be greater than 0 ms".into());
    }
    if let Some(out_dir) = &cli.out_dir {
        if out_dir.is_file() {
            return Err(format!("Output path is a file: {}", out_dir.display()).into());
        }
    }
    if let Some(settings) = &cli.settings {
        if !settings.exists() {
            return Err(format!("Settings file not found: {}", settings.display()).into());
        }
    }
    Ok(())
}
