//
// cli.rs
// Dicom-Pseudonymizer-rs
//
// Defines the CLI surface with Clap and dispatches user-selected commands to the pipeline and table generators.
//

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

use crate::config::{PipelineConfig, UnmappedPolicy};
use crate::generate;
use crate::models::PipelineReport;
use crate::pipeline::Pipeline;

/// Command-line interface glue code: defines the available verbs and dispatches to modules.
#[derive(Parser)]
#[command(name = "dicom-pseudonymizer")]
#[command(about = "Pseudonimização de datasets DICOM", long_about = None)]
pub struct Cli {
    /// Log every rename and record rewrite
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy a dataset into the work area and pseudonymize it there
    Pseudonymize {
        #[arg(default_value = "prm/incisive2")]
        source: PathBuf,
        /// Global table: old provider code -> new provider id
        #[arg(long, default_value = "prm/id_mapping.json")]
        mapping: PathBuf,
        /// Lookup table: provider name -> old provider code
        #[arg(long, default_value = "prm/original.json")]
        original: PathBuf,
        /// TOML file with taxonomy, work area, and policy
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        work_dir: Option<PathBuf>,
        /// What to do with patients missing from the category table
        #[arg(long, value_enum)]
        unmapped: Option<UnmappedMode>,
        /// Hash the source tree before and after the run
        #[arg(long)]
        verify_source: bool,
        /// Write the run report as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },
    /// Generate the global provider tables from the provider lookup table
    ProviderIds {
        #[arg(long, default_value = "prm/original.json")]
        original: PathBuf,
        #[arg(long, default_value = "prm/new_data.json")]
        new_data: PathBuf,
        #[arg(long, default_value = "prm/id_mapping.json")]
        mapping: PathBuf,
    },
    /// Generate the per-category patient tables inside each provider's data directory
    PatientIds {
        #[arg(default_value = "prm/incisive2")]
        root: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum UnmappedMode {
    Degenerate,
    Skip,
}

impl From<UnmappedMode> for UnmappedPolicy {
    fn from(value: UnmappedMode) -> Self {
        match value {
            UnmappedMode::Degenerate => UnmappedPolicy::Degenerate,
            UnmappedMode::Skip => UnmappedPolicy::Skip,
        }
    }
}

pub fn run() -> anyhow::Result<()> {
    // Parse the raw CLI arguments once and dispatch to a subcommand handler.
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Pseudonymize {
            source,
            mapping,
            original,
            config,
            work_dir,
            unmapped,
            verify_source,
            report,
        } => {
            let mut config = load_config(config.as_deref())?;
            // Flags given on the command line win over the config file.
            if let Some(work_dir) = work_dir {
                config.work_dir = work_dir;
            }
            if let Some(mode) = unmapped {
                config.unmapped_patients = mode.into();
            }
            config.verify_source |= verify_source;

            let summary = Pipeline::new(config)
                .run(&source, &mapping, &original)
                .context("Pseudonymization failed")?;
            print_summary(&summary);
            if let Some(path) = report {
                let json = serde_json::to_string_pretty(&summary)?;
                fs::write(&path, json).context("Failed to write run report")?;
                println!("Report saved to {:?}", path);
            }
            let failed = summary.failed_providers().count();
            if failed > 0 {
                bail!("{} provider(s) were not fully pseudonymized", failed);
            }
            if summary.source_unchanged == Some(false) {
                bail!("Source tree changed during the run");
            }
        }
        Commands::ProviderIds {
            original,
            new_data,
            mapping,
        } => {
            let tables = generate::generate_provider_tables(
                &original,
                &new_data,
                &mapping,
                StdRng::from_entropy(),
            )
            .context("Failed to generate provider tables")?;
            println!(
                "{} provider(s) mapped -> {:?}, {:?}",
                tables.new_data.len(),
                new_data,
                mapping
            );
        }
        Commands::PatientIds { root, config } => {
            let config = load_config(config.as_deref())?;
            let written =
                generate::generate_patient_tables(&root, &config.taxonomy, StdRng::from_entropy())
                    .context("Failed to generate patient tables")?;
            for path in written {
                println!("Patient table saved to {:?}", path);
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    // RUST_LOG takes precedence over --verbose.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {:?}", path)),
        None => Ok(PipelineConfig::default()),
    }
}

fn print_summary(report: &PipelineReport) {
    println!("Work area: {:?}", report.work_dir);
    for provider in &report.providers {
        let status = match &provider.error {
            Some(err) => format!("stopped: {}", err),
            None if !provider.failed_patients.is_empty() => {
                format!("{} patient(s) failed", provider.failed_patients.len())
            }
            None => "ok".to_string(),
        };
        println!(
            "  {}/{} -> {:<4} | patients: {} | records: {} | skipped: {} | {}",
            provider.category,
            provider.provider,
            provider.provider_id,
            provider.patients_renamed,
            provider.records_anonymized,
            provider.records_skipped.len(),
            status
        );
    }
    println!(
        "Total: {} record(s) anonymized, {} skipped",
        report.records_anonymized(),
        report.records_skipped()
    );
}
