//! Trialscope CLI - Command-line interface for the extraction pipeline
//!
//! Commands:
//! - extract: Process raw log files into the participant table
//! - aggregate: Compute per-stimulus statistics from a table snapshot
//! - moderate: Flag disqualified participants on the panel provider

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use trialscope::export;
use trialscope::panel::{FlaggedWorker, PanelClient};
use trialscope::{
    ExtractError, LogExtractor, StimulusCatalogue, StudyConfig, TRIALSCOPE_VERSION,
};

/// Trialscope - turn crowdsourced experiment logs into analysis-ready tables
#[derive(Parser)]
#[command(name = "trialscope")]
#[command(version = TRIALSCOPE_VERSION)]
#[command(about = "Extract and aggregate experiment event logs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process raw log files into the participant table
    Extract {
        /// Input NDJSON log files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Stimulus mapping CSV
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Question list CSV
        #[arg(long)]
        questions: Option<PathBuf>,

        /// Output CSV path for the participant table
        #[arg(short, long, default_value = "participants.csv")]
        output: PathBuf,

        /// Save a JSON snapshot of the table for fast reload
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Maximum repeated presentations per stimulus
        #[arg(long, default_value = "2")]
        num_repeat: usize,

        /// Treat single-stimulus cells with an immediate response as inline
        /// post-trial answers
        #[arg(long)]
        inline_responses: bool,
    },

    /// Compute per-stimulus statistics from a table snapshot
    Aggregate {
        /// Table snapshot produced by `extract --snapshot`
        #[arg(long)]
        snapshot: PathBuf,

        /// Stimulus mapping CSV
        #[arg(long)]
        mapping: PathBuf,

        /// Question list CSV
        #[arg(long)]
        questions: PathBuf,

        /// Output CSV path for the stimulus mapping table
        #[arg(short, long, default_value = "mapping.csv")]
        output: PathBuf,

        /// Maximum repeated presentations per stimulus
        #[arg(long, default_value = "2")]
        num_repeat: usize,
    },

    /// Flag disqualified participants on the panel provider
    Moderate {
        /// CSV of flagged participants (columns: worker_id, worker_code)
        #[arg(long)]
        flagged: PathBuf,

        /// Panel job ID
        #[arg(long)]
        job_id: u64,

        /// Also reject the flagged submissions
        #[arg(long)]
        reject: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ExtractError> {
    match cli.command {
        Commands::Extract {
            inputs,
            mapping,
            questions,
            output,
            snapshot,
            num_repeat,
            inline_responses,
        } => {
            let mut config = StudyConfig::default();
            config.num_repeat = num_repeat;
            config.inline_responses = inline_responses;
            let catalogue = load_catalogue(mapping.as_deref(), questions.as_deref())?;

            let mut extractor = LogExtractor::new(config, catalogue);
            for input in &inputs {
                extractor.process_file(input)?;
            }
            let table = extractor.finish();
            export::write_participants_csv(&table, &output)?;
            if let Some(snapshot) = snapshot {
                export::save_table_snapshot(&table, snapshot)?;
            }
            Ok(())
        }

        Commands::Aggregate {
            snapshot,
            mapping,
            questions,
            output,
            num_repeat,
        } => {
            let mut config = StudyConfig::default();
            config.num_repeat = num_repeat;
            let catalogue = load_catalogue(Some(&mapping), Some(&questions))?;

            let table = export::load_table_snapshot(&snapshot)?;
            let extractor = LogExtractor::new(config, catalogue);
            let stats = extractor.aggregate(&table);
            export::write_stimuli_csv(&stats, extractor.catalogue(), &output)?;
            Ok(())
        }

        Commands::Moderate {
            flagged,
            job_id,
            reject,
        } => {
            let api_key = std::env::var("PANEL_API_KEY").map_err(|_| {
                ExtractError::MissingSecret(
                    "PANEL_API_KEY environment variable is not set".to_string(),
                )
            })?;
            let workers = read_flagged_csv(&flagged)?;
            let client = PanelClient::new(job_id, api_key);
            client.ban_workers(&workers);
            if reject {
                client.reject_workers(&workers);
            }
            Ok(())
        }
    }
}

fn load_catalogue(
    mapping: Option<&Path>,
    questions: Option<&Path>,
) -> Result<StimulusCatalogue, ExtractError> {
    let mut catalogue = StimulusCatalogue::default();
    if let Some(mapping) = mapping {
        catalogue.read_mapping(mapping)?;
    }
    if let Some(questions) = questions {
        catalogue.read_questions(questions)?;
    }
    Ok(catalogue)
}

fn read_flagged_csv(path: &Path) -> Result<Vec<FlaggedWorker>, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let id_idx = headers
        .iter()
        .position(|h| h == "worker_id")
        .ok_or_else(|| ExtractError::MissingColumn {
            column: "worker_id".to_string(),
            path: path.display().to_string(),
        })?;
    let code_idx = headers.iter().position(|h| h == "worker_code");

    let mut workers = Vec::new();
    for row in reader.records() {
        let row = row?;
        let Some(id) = row.get(id_idx).and_then(|v| v.parse::<u64>().ok()) else {
            continue;
        };
        let worker_code = code_idx
            .and_then(|i| row.get(i))
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        workers.push(FlaggedWorker {
            worker_id: id,
            worker_code,
        });
    }
    Ok(workers)
}
