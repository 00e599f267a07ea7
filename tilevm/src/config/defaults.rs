//! Default values and limits.

/// Tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Worker threads, and therefore guest slots.
pub const DEFAULT_WORKERS: usize = 8;

/// Upper bound on workers; every zero-copy worker owns a full wasm instance.
pub const MAX_WORKERS: usize = 256;

/// Root of the input/output/module layout.
pub const DEFAULT_SHARED_DIR: &str = "shared";

pub const DEFAULT_MODULE_FILE: &str = "filter.wasm";
pub const DEFAULT_INPUT_SUBDIR: &str = "input";
pub const DEFAULT_OUTPUT_SUBDIR: &str = "output";

/// Guest export that runs the filter over one tile.
pub const DEFAULT_ENTRY_POINT: &str = "grayscale";

/// Largest encoded tile the host will copy into a guest (64 MiB).
pub const DEFAULT_MAX_GUEST_INPUT_LEN: u32 = 64 * 1024 * 1024;

/// Runtime launched by the process-based exchanges.
pub const DEFAULT_RUNNER_PROGRAM: &str = "wasmedge";

/// Arguments for [`DEFAULT_RUNNER_PROGRAM`]; `{module}` is substituted.
pub const DEFAULT_RUNNER_ARGS: &[&str] = &["{module}", "process_stdin"];

/// Staging directory name under the system temp dir.
pub const DEFAULT_STAGING_SUBDIR: &str = "tilevm-staging";

/// Queued tasks per worker in the dispatcher's bounded queue.
pub const TASK_QUEUE_DEPTH_PER_WORKER: usize = 2;

/// Default log file path, relative to the working directory.
pub const DEFAULT_LOG_FILE: &str = "logs/tilevm.log";

