//! Proctor CLI
//!
//! The `proctor` command runs scripted proctoring sessions against the
//! policy engine.
//!
//! ## Commands
//!
//! - `simulate`: run an interview session from a signal timeline
//! - `enroll`: run a biometric enrollment from a signal timeline
//! - `policy`: print a named policy as JSON
//! - `score`: score an answer sheet against the configured rubric
//!
//! Simulations run on tokio's paused clock, so a 45 minute session finishes
//! immediately while every rule still sees its real timing. Pass
//! `--realtime` to run against the wall clock.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

use proctor_core::telemetry::{init_tracing, verbosity_level, LogFormat};
use proctor_core::{
    run_enrollment, score, ChannelSource, FsOutcomeStore, MemoryOutcomeStore, OutcomeStore,
    PolicySet, ProctorConfig, SessionController, Signal,
};

#[derive(Parser)]
#[command(name = "proctor")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Proctoring violation detection and disqualification engine", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "PROCTOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interview session driven by a signal timeline
    Simulate {
        /// Timeline file: JSON array of signals, each with an optional `hold_ms`
        #[arg(short, long)]
        signals: PathBuf,

        /// Answer sheet: JSON object mapping question index to answer text
        #[arg(short, long)]
        answers: Option<PathBuf>,

        /// Override the interview duration
        #[arg(long)]
        duration_secs: Option<u64>,

        /// Submit this many seconds after monitoring starts
        #[arg(long)]
        submit_after_secs: Option<u64>,

        /// Directory for outcome records (overrides persistence.dir)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Run against the wall clock instead of virtual time
        #[arg(long)]
        realtime: bool,
    },

    /// Run a biometric enrollment driven by a signal timeline
    Enroll {
        #[arg(short, long)]
        signals: PathBuf,

        /// Subject identifier embedded in the biometric id
        #[arg(long)]
        subject: String,

        #[arg(long)]
        out_dir: Option<PathBuf>,

        #[arg(long)]
        realtime: bool,
    },

    /// Print a named policy (`live_interview` or `enrollment`)
    Policy {
        #[arg(default_value = "live_interview")]
        name: String,
    },

    /// Score an answer sheet
    Score {
        #[arg(short, long)]
        answers: PathBuf,
    },
}

/// One timeline step: a signal held for `hold_ms`.
#[derive(Debug, Clone, Deserialize)]
struct TimelineStep {
    #[serde(flatten)]
    signal: Signal,
    #[serde(default = "default_hold_ms")]
    hold_ms: u64,
}

fn default_hold_ms() -> u64 {
    2000
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(
        LogFormat::from_json_flag(cli.json),
        verbosity_level(cli.verbose),
    );

    let config = match &cli.config {
        Some(path) => ProctorConfig::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => ProctorConfig::default(),
    };

    match cli.command {
        Commands::Simulate {
            signals,
            answers,
            duration_secs,
            submit_after_secs,
            out_dir,
            realtime,
        } => {
            let mut config = config;
            if let Some(secs) = duration_secs {
                config.interview.duration_secs = secs;
            }
            if !realtime {
                tokio::time::pause();
            }
            cmd_simulate(
                &config,
                &signals,
                answers.as_deref(),
                submit_after_secs,
                out_dir.as_deref(),
            )
            .await
        }
        Commands::Enroll {
            signals,
            subject,
            out_dir,
            realtime,
        } => {
            if !realtime {
                tokio::time::pause();
            }
            cmd_enroll(&config, &signals, &subject, out_dir.as_deref()).await
        }
        Commands::Policy { name } => cmd_policy(&name),
        Commands::Score { answers } => cmd_score(&config, &answers),
    }
}

async fn cmd_simulate(
    config: &ProctorConfig,
    signals: &Path,
    answers: Option<&Path>,
    submit_after_secs: Option<u64>,
    out_dir: Option<&Path>,
) -> Result<()> {
    let timeline = load_timeline(signals)?;
    let answers = match answers {
        Some(path) => load_answers(path)?,
        None => BTreeMap::new(),
    };
    let store = open_store(config, out_dir)?;

    let controller = SessionController::new(config, store)?;
    info!(session_id = %controller.id(), steps = timeline.len(), "simulating interview");

    let (tx, mut source) = ChannelSource::new(timeline.len());
    controller.acknowledge().await?;
    controller.start(&mut source).await?;
    let player = tokio::spawn(play(tx, timeline));

    for (index, text) in answers {
        controller
            .record_answer(index, text)
            .await
            .with_context(|| format!("Failed to record answer {}", index))?;
    }

    if let Some(secs) = submit_after_secs {
        tokio::time::sleep(Duration::from_secs(secs)).await;
        if let Err(err) = controller.submit().await {
            info!(error = %err, "submit skipped; session already finished");
        }
    }
    controller.wait().await;
    player.abort();

    let snapshot = controller.snapshot().await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn cmd_enroll(
    config: &ProctorConfig,
    signals: &Path,
    subject: &str,
    out_dir: Option<&Path>,
) -> Result<()> {
    let timeline = load_timeline(signals)?;
    let store = open_store(config, out_dir)?;

    let (tx, mut source) = ChannelSource::new(timeline.len());
    let player = tokio::spawn(play(tx, timeline));

    // At most 100 samples are needed; a feed that stalls for ten times that fails.
    let limit = config.timing.sample_interval() * 1000;
    let status = tokio::time::timeout(
        limit,
        run_enrollment(&mut source, subject, config, store),
    )
    .await
    .context("Enrollment did not finish")??;
    player.abort();

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn cmd_policy(name: &str) -> Result<()> {
    let policy = PolicySet::named(name)?;
    println!("{}", serde_json::to_string_pretty(&policy)?);
    Ok(())
}

fn cmd_score(config: &ProctorConfig, answers: &Path) -> Result<()> {
    let answers = load_answers(answers)?;
    let card = score(&answers, &config.rubric);
    println!("{}", serde_json::to_string_pretty(&card)?);
    println!("{}/{} ({}%)", card.raw_score, card.max_score, card.percentage());
    Ok(())
}

/// Push each step's signal, then hold it. The last signal holds until the
/// task is aborted; a dropped sender reads as a lost detector.
async fn play(tx: mpsc::Sender<Signal>, timeline: Vec<TimelineStep>) {
    for step in timeline {
        if tx.send(step.signal).await.is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(step.hold_ms)).await;
    }
    std::future::pending::<()>().await;
}

fn load_timeline(path: &Path) -> Result<Vec<TimelineStep>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read signal timeline {:?}", path))?;
    let timeline: Vec<TimelineStep> =
        serde_json::from_str(&text).context("Signal timeline is not valid JSON")?;
    if timeline.is_empty() {
        bail!("Signal timeline {:?} is empty", path);
    }
    Ok(timeline)
}

fn load_answers(path: &Path) -> Result<BTreeMap<usize, String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read answers {:?}", path))?;
    serde_json::from_str(&text).context("Answer sheet must map question index to text")
}

fn open_store(config: &ProctorConfig, out_dir: Option<&Path>) -> Result<Arc<dyn OutcomeStore>> {
    match out_dir.or(config.persistence.dir.as_deref()) {
        Some(dir) => {
            let store = FsOutcomeStore::new(dir)
                .with_context(|| format!("Failed to open outcome directory {:?}", dir))?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryOutcomeStore::new())),
    }
}
