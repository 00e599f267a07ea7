//! `tilevm bench`: compare exchange strategies on one image.

use clap::Args;
use std::path::PathBuf;
use tilevm::bench::{run_benchmark, BenchmarkReport};
use tilevm::exchange::ExchangeKind;

use super::common::PipelineArgs;
use crate::error::CliError;
use crate::runner::CliRunner;

#[derive(Debug, Args)]
pub struct BenchArgs {
    /// Image to process
    pub image: PathBuf,

    /// Timed runs per strategy
    #[arg(long, default_value = "3")]
    pub iterations: usize,

    /// Strategies to compare, in order; the first is the baseline.
    /// Defaults to staged-disk, streamed-pipe, zero-copy.
    #[arg(long = "only", value_delimiter = ',')]
    pub exchanges: Vec<ExchangeKind>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

pub fn run(runner: &CliRunner, args: BenchArgs) -> Result<(), CliError> {
    let config = args.pipeline.apply(runner.pipeline_config().clone());
    let image = image::open(&args.image)
        .map_err(|error| CliError::ImageRead {
            path: args.image.clone(),
            error,
        })?
        .to_rgba8();
    let kinds = if args.exchanges.is_empty() {
        ExchangeKind::ALL.to_vec()
    } else {
        args.exchanges.clone()
    };

    println!(
        "Benchmarking {} ({}x{}), tile size {}, {} workers, {} iterations",
        args.image.display(),
        image.width(),
        image.height(),
        config.tile_size(),
        config.workers(),
        args.iterations
    );
    println!();

    let reports = run_benchmark(&config, &image, &kinds, args.iterations, runner.logger())?;
    print!("{}", format_table(&reports));

    let mismatched: Vec<String> = reports
        .iter()
        .filter(|r| !r.matches_baseline)
        .map(|r| r.exchange.to_string())
        .collect();
    if !mismatched.is_empty() {
        return Err(CliError::BaselineMismatch(mismatched));
    }
    Ok(())
}

fn format_table(reports: &[BenchmarkReport]) -> String {
    let mut out = format!(
        "{:<14} {:>10} {:>10} {:>10} {:>10}\n",
        "strategy", "setup", "mean", "best", "tiles/s"
    );
    for r in reports {
        out.push_str(&format!(
            "{:<14} {:>9.1}ms {:>9.1}ms {:>9.1}ms {:>10.1}\n",
            r.exchange.as_str(),
            r.setup.as_secs_f64() * 1000.0,
            r.mean().as_secs_f64() * 1000.0,
            r.best().as_secs_f64() * 1000.0,
            r.tiles_per_second()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_table_has_row_per_strategy() {
        let report = BenchmarkReport {
            exchange: ExchangeKind::StreamedPipe,
            setup: Duration::from_millis(2),
            runs: vec![Duration::from_millis(10), Duration::from_millis(30)],
            tiles: 6,
            workers: 2,
            matches_baseline: true,
        };
        let table = format_table(&[report]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("strategy"));
        assert!(lines[1].starts_with("streamed-pipe"));
        assert!(lines[1].contains("20.0ms"));
        assert!(lines[1].ends_with("300.0"));
    }
}
