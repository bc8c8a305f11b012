//! Marine Core - operator CLI
//!
//! Every subcommand prints JSON on stdout; logs go to stderr (`RUST_LOG`).

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use marine_core::{MarineService, PolicyName, ServiceConfig};

#[derive(Parser)]
#[command(author, version, about = "Marine pollution image classifier", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a local image file
    Classify {
        path: PathBuf,
        /// Decision policy (sequential, confidence_gated, margin_balanced)
        #[arg(long, value_parser = parse_policy)]
        policy: Option<PolicyName>,
    },
    /// Fetch an image by URL or CID, then classify it
    ClassifyUrl {
        source: String,
    },
    /// Classify several URLs/CIDs, results in input order
    Batch {
        sources: Vec<String>,
        /// File with one source per line
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Write cached bytes for a URL or CID to a file
    Cached {
        key: String,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Persist a label for a report
    Save {
        report_id: String,
        label: String,
        #[arg(long)]
        force: bool,
    },
    /// Show the persisted label for a report
    Get {
        report_id: String,
    },
    /// Prediction counts per label
    Summary,
    /// Detector mode, thresholds, paths
    Status,
    /// Try every configured gateway for a CID
    Probe {
        cid: String,
    },
}

fn parse_policy(raw: &str) -> Result<PolicyName, String> {
    PolicyName::parse(raw).ok_or_else(|| format!("unknown policy: {}", raw))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let service = MarineService::new(ServiceConfig::from_env()).context("failed to start service")?;

    match cli.command {
        Commands::Classify { path, policy } => {
            let bytes = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
            let policy = policy.unwrap_or(service.config().policy);
            print_json(&service.classify_with_policy(&bytes, policy)?)
        }
        Commands::ClassifyUrl { source } => print_json(&service.classify_from_source(&source)?),
        Commands::Batch { mut sources, file } => {
            if let Some(file) = file {
                let list = fs::read_to_string(&file)
                    .with_context(|| format!("failed to read {}", file.display()))?;
                sources.extend(
                    list.lines()
                        .map(str::trim)
                        .filter(|line| !line.is_empty() && !line.starts_with('#'))
                        .map(str::to_string),
                );
            }
            print_json(&service.classify_batch(&sources)?)
        }
        Commands::Cached { key, output } => {
            let cached = service.get_cached_bytes(&key)?;
            fs::write(&output, &cached.bytes)
                .with_context(|| format!("failed to write {}", output.display()))?;
            print_json(&cached.entry)
        }
        Commands::Save { report_id, label, force } => {
            print_json(&service.save_prediction(&report_id, &label, force)?)
        }
        Commands::Get { report_id } => print_json(&service.get_prediction(&report_id)?),
        Commands::Summary => print_json(&service.prediction_summary()),
        Commands::Status => print_json(&service.status()),
        Commands::Probe { cid } => print_json(&service.probe_gateways(&cid)),
    }
}
