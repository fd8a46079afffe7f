//! doc2json: convert TXT/PDF documents into chaptered JSON, Markdown or plain text

use anyhow::{bail, Context, Result};
use clap::Parser;
use doc2json::cli::{Cli, Commands, ConfigAction, ConvertArgs};
use doc2json::config::{BatchConfig, Config};
use doc2json::input::InputManager;
use doc2json::output::archive::write_archive;
use doc2json::output::formatter::{save_payloads, ExportGenerator};
use doc2json::output::report::BatchReport;
use doc2json::processing::metadata::MetadataInput;
use doc2json::processing::pipeline::{BatchItem, Pipeline};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::path::Path;
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    if let Err(e) = run_command(cli.command, cli.config.as_deref()).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run_command(command: Commands, config_path: Option<&Path>) -> Result<()> {
    match command {
        Commands::Convert(args) => convert(args, config_path).await,
        Commands::Config { action } => manage_config(action, config_path),
    }
}

async fn convert(args: ConvertArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = Config::load(config_path).context("Failed to load configuration")?;
    args.apply_to(&mut config).context("Invalid command line options")?;
    let batch = BatchConfig::from_config(&config).context("Invalid conversion settings")?;

    let input = InputManager::new();
    let mut items = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let metadata = if config.metadata.sidecar_files {
            input.load_sidecar(path).await?
        } else {
            MetadataInput::default()
        };
        items.push(BatchItem::new(path).with_metadata(metadata));
    }

    info!("Converting {} file(s)", items.len());
    let pipeline = Pipeline::new(&batch);

    let progress = ProgressBar::new(items.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    let outcomes = pipeline
        .convert_batch(&items, |outcome| {
            progress.set_message(outcome.display_name());
            progress.inc(1);
        })
        .await;
    progress.finish_and_clear();

    let generator = ExportGenerator::new(&batch.export);
    let (payloads, export_failures) =
        generator.export_batch(outcomes.iter().filter_map(|outcome| outcome.result()));

    if !payloads.is_empty() {
        match &args.archive {
            Some(archive) => {
                write_archive(archive, &payloads)
                    .with_context(|| format!("Failed to write archive {}", archive.display()))?;
                println!("Archive written to {}", archive.display());
            }
            None => {
                let dir = &config.output.output_dir;
                let written = save_payloads(dir, &payloads)
                    .with_context(|| format!("Failed to write exports to {}", dir.display()))?;
                println!("{} file(s) written to {}", written.len(), dir.display());
            }
        }
    }

    let report = BatchReport::from_outcomes(&outcomes, &export_failures);
    print!("{}", report.render(config.output.color_output));

    if report.all_failed() {
        bail!("All {} file(s) failed to convert", report.total_files);
    }
    Ok(())
}

fn manage_config(action: Option<ConfigAction>, config_path: Option<&Path>) -> Result<()> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_path);

    match action {
        Some(ConfigAction::Show) | None => {
            let config = Config::load(config_path).context("Failed to load configuration")?;
            print!("{}", config.to_toml()?);
        }
        Some(ConfigAction::Path) => {
            println!("{}", path.display());
        }
        Some(ConfigAction::Init) => {
            if path.exists() {
                println!("Configuration already exists at {}", path.display());
            } else {
                Config::default().save(&path)?;
                println!("Configuration written to {}", path.display());
            }
        }
        Some(ConfigAction::Reset) => {
            Config::default().save(&path)?;
            println!("Configuration reset to defaults at {}", path.display());
        }
    }

    Ok(())
}
