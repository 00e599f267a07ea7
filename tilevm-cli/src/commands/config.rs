//! Configuration management CLI commands.

use clap::Subcommand;
use std::path::Path;
use tilevm::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration as INI
    Show,

    /// Write a configuration file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand. `path` overrides the default file location.
pub fn run(command: ConfigCommands, path: Option<&Path>) -> Result<(), CliError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);
    match command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let config = ConfigFile::load_from(&path)?;
            print!("{}", config.to_ini_string());
            Ok(())
        }
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                println!("Configuration already exists at {}", path.display());
                println!("Use --force to overwrite it with defaults.");
                return Ok(());
            }
            ConfigFile::default().save_to(&path)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}
