//! CLI error handling with user-friendly messages.

use std::fmt;
use std::path::PathBuf;
use std::process;
use tilevm::config::ConfigError;
use tilevm::guest::GuestError;
use tilevm::PipelineError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(ConfigError),
    /// A pipeline run failed
    Pipeline(PipelineError),
    /// Benchmark input could not be read
    ImageRead { path: PathBuf, error: image::ImageError },
    /// Strategies produced different images
    BaselineMismatch(Vec<String>),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Pipeline(PipelineError::Guest(GuestError::ModuleLoad { .. })) => {
                eprintln!();
                eprintln!("Check that the guest module exists and was built for WASI:");
                eprintln!("  cargo build -p tilevm-guest --target wasm32-wasip1 --release");
                eprintln!("Point [guest] module in the config file (or --module) at the .wasm file.");
            }
            CliError::Pipeline(PipelineError::Guest(GuestError::Validation { .. })) => {
                eprintln!();
                eprintln!("A guest module must export memory, alloc, dealloc and the entry point.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Pipeline(e) => write!(f, "{}", e),
            CliError::ImageRead { path, error } => {
                write!(f, "Failed to read image '{}': {}", path.display(), error)
            }
            CliError::BaselineMismatch(kinds) => write!(
                f,
                "Output of {} differs from the baseline strategy",
                kinds.join(", ")
            ),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
            CliError::ImageRead { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}
