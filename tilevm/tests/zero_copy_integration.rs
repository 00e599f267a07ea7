//! Integration tests for the zero-copy exchange through the full pipeline.
//!
//! These tests verify:
//! - Identity guests reproduce the input for any worker count and tile size
//! - Guest memory stays flat across many runs on the same pool
//! - Filter failures carry the failing tile's coordinates
//! - Partial results under the continue policy
//! - Slot degradation after repeated release failures

use image::{Rgba, RgbaImage};
use std::sync::Arc;
use tilevm::codec::{PngCodec, RawCodec, TileCodec};
use tilevm::config::PipelineConfig;
use tilevm::dispatch::{DispatchError, FailurePolicy};
use tilevm::exchange::InvocationStage;
use tilevm::guest::{GuestError, GuestOptions, GuestRuntimePool};
use tilevm::log::{MemoryLogger, NoOpLogger};
use tilevm::pipeline::{ExchangeBackend, TilePipeline};
use tilevm::tile::TileCoord;
use tilevm::PipelineError;

const IDENTITY: &str = include_str!("fixtures/identity.wat");
const ALWAYS_FAILS: &str = include_str!("fixtures/always_fails.wat");
const NARROW_FAILS: &str = include_str!("fixtures/narrow_fails.wat");
const TRAPPING_DEALLOC: &str = include_str!("fixtures/trapping_dealloc.wat");
const MISSING_DEALLOC: &str = include_str!("fixtures/missing_dealloc.wat");

// =============================================================================
// Test Helpers
// =============================================================================

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x * 3 + y) % 256) as u8, 255])
    })
}

fn backend(wat: &str, workers: usize, codec: Arc<dyn TileCodec>) -> ExchangeBackend {
    let pool = GuestRuntimePool::from_bytes(
        wat.as_bytes(),
        GuestOptions::new("fixture.wasm", workers),
        Arc::new(NoOpLogger),
    )
    .expect("fixture should instantiate");
    ExchangeBackend::zero_copy(pool, codec)
}

fn pipeline(tile_size: u32, policy: FailurePolicy) -> TilePipeline {
    let config = PipelineConfig::default()
        .with_tile_size(tile_size)
        .with_failure_policy(policy);
    TilePipeline::new(config, Arc::new(NoOpLogger)).unwrap()
}

// =============================================================================
// Round Trips
// =============================================================================

#[test]
fn test_identity_for_worker_counts_and_tile_sizes() {
    let image = gradient(97, 61);
    for workers in [1, 2, 5, 8] {
        let mut backend = backend(IDENTITY, workers, Arc::new(RawCodec));
        for tile_size in [1, 16, 50, 97, 256] {
            if tile_size == 1 && workers > 2 {
                // one-pixel tiles are slow; covered by the smaller pools
                continue;
            }
            let output = pipeline(tile_size, FailurePolicy::FailFast)
                .process_image(&image, &mut backend)
                .unwrap();
            assert_eq!(
                output.image, image,
                "workers={} tile_size={}",
                workers, tile_size
            );
        }
    }
}

#[test]
fn test_768x512_with_png_codec() {
    let image = gradient(768, 512);
    let mut backend = backend(IDENTITY, 4, Arc::new(PngCodec));

    let output = pipeline(256, FailurePolicy::FailFast)
        .process_image(&image, &mut backend)
        .unwrap();

    assert_eq!(output.stats.tiles, 6);
    assert_eq!(output.stats.processed, 6);
    assert_eq!(output.image, image);
}

#[test]
fn test_single_pixel_image() {
    let image = gradient(1, 1);
    let mut backend = backend(IDENTITY, 3, Arc::new(RawCodec));

    let output = pipeline(256, FailurePolicy::FailFast)
        .process_image(&image, &mut backend)
        .unwrap();

    assert_eq!(output.stats.tiles, 1);
    assert_eq!(output.image, image);
}

#[test]
fn test_memory_is_stable_across_runs() {
    let image = gradient(128, 96);
    let mut backend = backend(IDENTITY, 1, Arc::new(RawCodec));
    let pipeline = pipeline(32, FailurePolicy::FailFast);

    pipeline.process_image(&image, &mut backend).unwrap();
    let footprint: Vec<usize> = backend
        .pool()
        .unwrap()
        .slots()
        .iter()
        .map(|s| s.memory_size())
        .collect();

    for _ in 0..10 {
        pipeline.process_image(&image, &mut backend).unwrap();
    }

    let pool = backend.pool().unwrap();
    for (slot, before) in pool.slots().iter().zip(footprint) {
        assert_eq!(slot.outstanding_allocations(), 0);
        assert_eq!(slot.memory_size(), before);
    }
    let invocations: u64 = pool.slots().iter().map(|s| s.invocations()).sum();
    assert_eq!(invocations, 11 * 12);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_filter_failure_names_tile() {
    let mut backend = backend(ALWAYS_FAILS, 1, Arc::new(RawCodec));

    let err = pipeline(64, FailurePolicy::FailFast)
        .process_image(&gradient(64, 64), &mut backend)
        .unwrap_err();

    let PipelineError::Tile(failure) = err else {
        panic!("expected a tile failure, got {err}");
    };
    assert_eq!(failure.coord, TileCoord::new(0, 0));
    assert_eq!(failure.stage, InvocationStage::Invoke);
    assert!(matches!(
        failure.exchange_error().and_then(|e| e.guest_error()),
        Some(GuestError::FilterFailed { .. })
    ));
}

#[test]
fn test_continue_policy_returns_partial_image() {
    // 7-pixel-wide tiles only occur in the last column: 23 = 16 + 7
    let image = gradient(23, 40);
    let mut backend = backend(NARROW_FAILS, 2, Arc::new(RawCodec));

    let output = pipeline(16, FailurePolicy::Continue)
        .process_image(&image, &mut backend)
        .unwrap();

    let mut failed = output.failed_coords();
    failed.sort();
    assert_eq!(
        failed,
        vec![TileCoord::new(1, 0), TileCoord::new(1, 1), TileCoord::new(1, 2)]
    );
    assert_eq!(output.stats.processed, 3);
    assert_eq!(output.image.get_pixel(5, 30), image.get_pixel(5, 30));
    assert_eq!(*output.image.get_pixel(20, 5), Rgba([0, 0, 0, 0]));
}

#[test]
fn test_fail_fast_stops_at_first_narrow_tile() {
    let mut backend = backend(NARROW_FAILS, 2, Arc::new(RawCodec));

    let err = pipeline(16, FailurePolicy::FailFast)
        .process_image(&gradient(23, 40), &mut backend)
        .unwrap_err();

    match err {
        PipelineError::Tile(failure) => assert_eq!(failure.coord.col, 1),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_degraded_slots_retire_workers() {
    let logger = Arc::new(MemoryLogger::new());
    let pool = GuestRuntimePool::from_bytes(
        TRAPPING_DEALLOC.as_bytes(),
        GuestOptions::new("fixture.wasm", 1),
        logger.clone(),
    )
    .unwrap();
    let mut backend = ExchangeBackend::zero_copy(pool, Arc::new(RawCodec));
    let config = PipelineConfig::default()
        .with_tile_size(8)
        .with_failure_policy(FailurePolicy::Continue);
    let pipeline = TilePipeline::new(config, logger.clone()).unwrap();

    // five tiles; the only slot degrades after three
    let output = pipeline
        .process_image(&gradient(40, 8), &mut backend)
        .unwrap();

    assert_eq!(output.stats.processed, 3);
    assert_eq!(output.failed.len(), 2);
    assert!(output
        .failed
        .iter()
        .all(|f| matches!(f.error, DispatchError::NoHealthyWorkers)));
    assert_eq!(backend.pool().unwrap().healthy_slots(), 0);
    assert!(logger.contains("no longer healthy"));
}

#[test]
fn test_missing_export_rejected_before_any_tile() {
    let result = GuestRuntimePool::from_bytes(
        MISSING_DEALLOC.as_bytes(),
        GuestOptions::new("fixture.wasm", 2),
        Arc::new(NoOpLogger),
    );
    assert!(matches!(
        result,
        Err(GuestError::Validation { ref export, .. }) if export == "dealloc"
    ));
}

#[test]
fn test_missing_module_file() {
    let config = PipelineConfig::default().with_module_path("/nonexistent/filter.wasm");
    let err = ExchangeBackend::from_config(&config, Arc::new(NoOpLogger))
        .err()
        .expect("missing module should fail");
    assert!(matches!(err, PipelineError::Guest(GuestError::ModuleLoad { .. })));
}
