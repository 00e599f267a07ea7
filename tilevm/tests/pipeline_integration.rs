//! End-to-end tests: config file to processed directory.
//!
//! These tests verify:
//! - A config file written to disk drives a full directory run
//! - Environment overrides on top of the file
//! - Output naming and clearing of stale outputs
//! - Cancellation from outside the pipeline

use image::{Rgba, RgbaImage};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tilevm::config::{apply_env_overrides, ConfigFile, PipelineConfig};
use tilevm::exchange::ExchangeKind;
use tilevm::log::{MemoryLogger, NoOpLogger};
use tilevm::pipeline::{ExchangeBackend, TilePipeline};
use tilevm::PipelineError;
use tokio_util::sync::CancellationToken;

const IDENTITY: &str = include_str!("fixtures/identity.wat");

// =============================================================================
// Test Helpers
// =============================================================================

fn gradient(width: u32, height: u32, seed: u8) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([x as u8 ^ seed, y as u8, seed, 255])
    })
}

/// `shared/` with the identity module and two input images.
fn shared_dir() -> TempDir {
    let temp = TempDir::new().unwrap();
    let shared = temp.path();
    fs::create_dir_all(shared.join("input")).unwrap();
    fs::write(shared.join("filter.wasm"), IDENTITY).unwrap();
    gradient(70, 45, 1).save(shared.join("input/first.png")).unwrap();
    gradient(33, 64, 2).save(shared.join("input/second.png")).unwrap();
    temp
}

// =============================================================================
// Directory Runs
// =============================================================================

#[test]
fn test_config_file_drives_directory_run() {
    let temp = shared_dir();
    let shared = temp.path();
    let ini = format!(
        "[pipeline]\ntile_size = 32\nworkers = 3\nexchange = zero-copy\ncodec = raw\n\n\
         [guest]\nmodule = {module}\n\n\
         [paths]\ninput = {input}\noutput = {output}\n",
        module = shared.join("filter.wasm").display(),
        input = shared.join("input").display(),
        output = shared.join("results").display(),
    );
    let config_path = shared.join("config.ini");
    fs::write(&config_path, ini).unwrap();

    let file = ConfigFile::load_from(&config_path).unwrap();
    assert_eq!(file.pipeline.tile_size(), 32);
    assert_eq!(file.pipeline.workers(), 3);

    let logger = Arc::new(MemoryLogger::new());
    let mut backend = ExchangeBackend::from_config(&file.pipeline, logger.clone()).unwrap();
    let pipeline = TilePipeline::new(file.pipeline, logger.clone()).unwrap();
    let reports = pipeline.process_directory(&mut backend).unwrap();

    assert_eq!(reports.len(), 2);
    assert!(reports[0].input.ends_with("first.png"));
    assert!(reports[0].output.ends_with("first_final.png"));
    assert!(reports.iter().all(|r| r.failed.is_empty()));
    assert_eq!(reports[0].stats.tiles, 6);

    let first = image::open(shared.join("results/first_final.png")).unwrap().to_rgba8();
    assert_eq!(first, gradient(70, 45, 1));
    let second = image::open(shared.join("results/second_final.png")).unwrap().to_rgba8();
    assert_eq!(second, gradient(33, 64, 2));
    assert!(logger.contains("guest pool ready"));
}

#[test]
fn test_env_overrides_shared_dir_and_tile_size() {
    let temp = shared_dir();
    let shared = temp.path().to_path_buf();
    let config = apply_env_overrides(PipelineConfig::default(), |key| match key {
        "SHARED_DIR" => Some(shared.display().to_string()),
        "TILE_SIZE" => Some("20".to_string()),
        "MAX_WORKERS" => Some("2".to_string()),
        _ => None,
    });
    assert_eq!(config.module_path(), shared.join("filter.wasm"));

    let mut backend = ExchangeBackend::from_config(&config, Arc::new(NoOpLogger)).unwrap();
    assert_eq!(backend.workers(), 2);
    let pipeline = TilePipeline::new(config, Arc::new(NoOpLogger)).unwrap();
    let reports = pipeline.process_directory(&mut backend).unwrap();

    // 70x45 at 20px: 4 columns, 3 rows
    assert_eq!(reports[0].stats.tiles, 12);
    assert!(shared.join("output/first_final.png").exists());
}

#[test]
fn test_missing_input_directory() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("filter.wasm"), IDENTITY).unwrap();
    let config = PipelineConfig::default().with_shared_dir(temp.path());

    let mut backend = ExchangeBackend::from_config(&config, Arc::new(NoOpLogger)).unwrap();
    let pipeline = TilePipeline::new(config, Arc::new(NoOpLogger)).unwrap();

    assert!(matches!(
        pipeline.process_directory(&mut backend),
        Err(PipelineError::Io { action: "read input directory", .. })
    ));
}

#[test]
fn test_unreadable_image_is_reported() {
    let temp = shared_dir();
    fs::write(temp.path().join("input/broken.png"), b"not a png").unwrap();
    let config = PipelineConfig::default().with_shared_dir(temp.path());

    let mut backend = ExchangeBackend::from_config(&config, Arc::new(NoOpLogger)).unwrap();
    let pipeline = TilePipeline::new(config, Arc::new(NoOpLogger)).unwrap();

    let err = pipeline.process_directory(&mut backend).unwrap_err();
    match err {
        PipelineError::ImageRead { path, .. } => assert!(path.ends_with("broken.png")),
        other => panic!("unexpected error: {other}"),
    }
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn test_cancelled_token_stops_run() {
    let temp = shared_dir();
    let config = PipelineConfig::default()
        .with_shared_dir(temp.path())
        .with_tile_size(8);
    let token = CancellationToken::new();
    token.cancel();

    let mut backend = ExchangeBackend::from_config(&config, Arc::new(NoOpLogger)).unwrap();
    assert_eq!(backend.kind(), ExchangeKind::ZeroCopy);
    let pipeline = TilePipeline::new(config, Arc::new(NoOpLogger))
        .unwrap()
        .with_cancellation(token);

    let result = pipeline.process_image(&gradient(32, 32, 0), &mut backend);
    assert!(matches!(result, Err(PipelineError::Cancelled)));
}
