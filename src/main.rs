//! jamprep command line
//!
//! Usage:
//!   jamprep [--config <file>] [--verbose] [--report <file>] <COMMAND>
//!
//! Commands mirror the pipeline stages: `tempo`, `histo`, `indexroll` and
//! `chords` run a single stage between two trees, `all` runs the full chain
//! under the configured output root.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use jamprep_lib::config::{get_config_path, Config};
use jamprep_lib::dataset::CancelToken;
use jamprep_lib::pipeline::{preprocess, preview_index_roll, run_stage, stage_root, StageKind};

#[derive(Parser)]
#[command(name = "jamprep")]
#[command(about = "Preprocess a Lakh-style MIDI corpus into melody and chord training data")]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Extra debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write the run report as JSON to this file
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    /// Worker threads (0 = available CPUs minus one, at least one)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Per-file timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Exit with status 2 when any file failed
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rewrite every tempo event to the configured value
    Tempo(StageArgs),
    /// Build pitch-class histograms from MIDI files
    Histo(StageArgs),
    /// Extract chords from histogram artifacts
    Chords(StageArgs),
    /// Extract melody index-rolls from MIDI files
    Indexroll(StageArgs),
    /// Run tempo, histogram, index-roll and chord stages in sequence
    All {
        /// Raw corpus root (overrides the config)
        #[arg(long)]
        source: Option<PathBuf>,
        /// Output root (overrides the config)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Render an index-roll artifact as a MIDI file
    Preview {
        input: PathBuf,
        output: PathBuf,
        /// Seconds per index-roll step
        #[arg(long, default_value_t = 0.25)]
        step: f64,
    },
    /// Write the default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct StageArgs {
    /// Source tree (defaults to the stage's configured input tree)
    #[arg(long)]
    source: Option<PathBuf>,
    /// Destination tree (defaults to the stage's tree under the output root)
    #[arg(long)]
    dest: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            log::error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut config = Config::load_or_default(cli.config.as_deref());
    if let Some(workers) = cli.workers {
        config.runner.workers = workers;
    }
    if cli.timeout.is_some() {
        config.runner.file_timeout_secs = cli.timeout;
    }

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            log::warn!("Interrupted, finishing files in progress");
            cancel.cancel();
        }) {
            log::warn!("Cannot install interrupt handler: {}", e);
        }
    }

    let failures = match cli.command {
        Command::Tempo(args) => single_stage(StageKind::Tempo, args, &config, &cancel, cli.report.as_deref())?,
        Command::Histo(args) => single_stage(StageKind::Histogram, args, &config, &cancel, cli.report.as_deref())?,
        Command::Chords(args) => single_stage(StageKind::Chords, args, &config, &cancel, cli.report.as_deref())?,
        Command::Indexroll(args) => {
            single_stage(StageKind::IndexRoll, args, &config, &cancel, cli.report.as_deref())?
        }
        Command::All { source, output } => {
            if let Some(source) = source {
                config.dataset.source_root = source;
            }
            if let Some(output) = output {
                config.dataset.output_root = output;
            }
            let report = preprocess(&config, &cancel)?;
            if let Some(path) = cli.report.as_deref() {
                write_report(path, &report)?;
            }
            report.total_failures()
        }
        Command::Preview { input, output, step } => {
            anyhow::ensure!(step > 0.0, "step must be positive");
            let notes = preview_index_roll(&input, &output, step)
                .with_context(|| format!("cannot preview {}", input.display()))?;
            log::info!("Wrote {} ({} notes)", output.display(), notes);
            0
        }
        Command::InitConfig { force } => {
            let path = cli.config.clone().unwrap_or_else(get_config_path);
            anyhow::ensure!(
                force || !path.exists(),
                "{} already exists (use --force to overwrite)",
                path.display()
            );
            let written = config.save(Some(&path))?;
            println!("{}", written.display());
            0
        }
    };

    if cancel.is_cancelled() {
        return Ok(130);
    }
    if cli.strict && failures > 0 {
        return Ok(2);
    }
    Ok(0)
}

fn single_stage(
    kind: StageKind,
    args: StageArgs,
    config: &Config,
    cancel: &CancelToken,
    report_path: Option<&Path>,
) -> anyhow::Result<usize> {
    let source = args.source.unwrap_or_else(|| default_stage_input(kind, config));
    let destination = args.dest.unwrap_or_else(|| stage_root(config, kind));

    let report = run_stage(kind, &source, &destination, config, cancel)
        .with_context(|| format!("stage {} failed on {}", kind.name(), source.display()))?;
    if let Some(path) = report_path {
        write_report(path, &report)?;
    }
    Ok(report.failure_count())
}

/// Input tree a stage reads when run as part of the full chain
fn default_stage_input(kind: StageKind, config: &Config) -> PathBuf {
    match kind {
        StageKind::Tempo => config.dataset.source_root.clone(),
        StageKind::Histogram | StageKind::IndexRoll => stage_root(config, StageKind::Tempo),
        StageKind::Chords => stage_root(config, StageKind::Histogram),
    }
}

fn write_report<T: Serialize>(path: &Path, report: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("cannot write report {}", path.display()))?;
    log::info!("Report written to {}", path.display());
    Ok(())
}
