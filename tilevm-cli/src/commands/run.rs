//! `tilevm run`: process the input directory.

use clap::Args;
use tilevm::pipeline::{ExchangeBackend, TilePipeline};
use tracing::{info, warn};

use super::common::{format_stats, PipelineArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

pub fn run(runner: &CliRunner, args: RunArgs) -> Result<(), CliError> {
    let config = args.pipeline.apply(runner.pipeline_config().clone());
    let logger = runner.logger();

    println!(
        "Processing {} -> {}",
        config.input_dir().display(),
        config.output_dir().display()
    );
    println!(
        "  Strategy: {} | Policy: {} | Tile size: {} | Workers: {}",
        config.exchange(),
        config.failure_policy(),
        config.tile_size(),
        config.workers()
    );
    println!();

    let mut backend = ExchangeBackend::from_config(&config, logger.clone())?;
    let pipeline = TilePipeline::new(config, logger)?;
    let reports = pipeline.process_directory(&mut backend)?;

    if reports.is_empty() {
        println!("No PNG files found.");
        return Ok(());
    }

    let mut partial = 0;
    for report in &reports {
        let name = report
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        println!("✓ {}: {}", name, format_stats(&report.stats));
        if !report.failed.is_empty() {
            partial += 1;
            let coords: Vec<String> = report.failed.iter().map(|c| c.to_string()).collect();
            println!("  {} tiles failed: {}", coords.len(), coords.join(" "));
            warn!(file = %report.input.display(), failed = coords.len(), "partial output");
        }
    }

    println!();
    println!("Processed {} images ({} partial)", reports.len(), partial);
    info!(images = reports.len(), partial, "run complete");
    Ok(())
}
