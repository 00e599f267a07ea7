//! Exchange through staged files.

use super::{ensure_tile_dimensions, ExchangeError, InvocationStage, ProcessCommand, TileExchange};
use crate::codec::TileCodec;
use crate::guest::GuestError;
use crate::tile::{Tile, TileCoord};
use image::RgbaImage;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

/// Name of the staged input file for `coord`.
pub fn staged_input_name(coord: TileCoord, extension: &str) -> String {
    format!("tile_c{}_r{}.in.{}", coord.col, coord.row, extension)
}

/// Name of the staged output file for `coord`.
pub fn staged_output_name(coord: TileCoord, extension: &str) -> String {
    format!("tile_c{}_r{}.out.{}", coord.col, coord.row, extension)
}

/// Writes each tile to a file, runs the runtime on it, reads the result
/// file back.
///
/// Unless the argument template references `{output}`, the runtime reads
/// the input file on stdin and its stdout is redirected into the output
/// file. Staged files are removed when the exchange is dropped, unless
/// `keep_files` was set.
pub struct StagedDiskExchange {
    command: ProcessCommand,
    module_path: PathBuf,
    codec: Arc<dyn TileCodec>,
    staging_dir: PathBuf,
    keep_files: bool,
    staged: Vec<PathBuf>,
}

impl StagedDiskExchange {
    /// Create the exchange, creating `staging_dir` if needed.
    pub fn new(
        command: ProcessCommand,
        module_path: impl Into<PathBuf>,
        codec: Arc<dyn TileCodec>,
        staging_dir: impl Into<PathBuf>,
        keep_files: bool,
    ) -> std::io::Result<Self> {
        let staging_dir = staging_dir.into();
        fs::create_dir_all(&staging_dir)?;
        Ok(Self {
            command,
            module_path: module_path.into(),
            codec,
            staging_dir,
            keep_files,
            staged: Vec::new(),
        })
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Files written so far by this exchange.
    pub fn staged_files(&self) -> &[PathBuf] {
        &self.staged
    }
}

impl TileExchange for StagedDiskExchange {
    fn invoke(&mut self, tile: &Tile) -> Result<RgbaImage, ExchangeError> {
        use InvocationStage::*;

        let encoded = self.codec.encode(&tile.pixels).map_err(ExchangeError::Encode)?;
        let extension = self.codec.extension();
        let input = self.staging_dir.join(staged_input_name(tile.coord, extension));
        let output = self.staging_dir.join(staged_output_name(tile.coord, extension));

        fs::write(&input, &encoded).map_err(|e| ExchangeError::io(Write, e))?;
        self.staged.push(input.clone());
        self.staged.push(output.clone());

        let mut command = self.command.command(&self.module_path, Some(&input), Some(&output));
        if self.command.references_output() {
            command.stdin(Stdio::null()).stdout(Stdio::null());
        } else {
            let stdin = File::open(&input).map_err(|e| ExchangeError::io(Write, e))?;
            let stdout = File::create(&output).map_err(|e| ExchangeError::io(Write, e))?;
            command.stdin(stdin).stdout(stdout);
        }
        command.stderr(Stdio::piped());

        let result = command.output().map_err(|e| ExchangeError::io(Invoke, e))?;
        if !result.status.success() {
            return Err(ExchangeError::Process {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        let bytes = fs::read(&output).map_err(|e| ExchangeError::io(Read, e))?;
        if bytes.is_empty() {
            return Err(ExchangeError::guest(
                Read,
                GuestError::FilterFailed {
                    entry_point: self.command.to_string(),
                    reason: format!("{} is empty", output.display()),
                },
            ));
        }

        let image = self.codec.decode(&bytes).map_err(ExchangeError::Decode)?;
        tracing::trace!(
            col = tile.coord.col,
            row = tile.coord.row,
            input = %input.display(),
            "tile staged"
        );
        ensure_tile_dimensions(tile, image)
    }

    fn name(&self) -> &'static str {
        "staged-disk"
    }
}

impl Drop for StagedDiskExchange {
    fn drop(&mut self) {
        if self.keep_files {
            return;
        }
        for path in self.staged.drain(..) {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(path = %path.display(), error = %e, "could not remove staged file");
                }
            }
        }
    }
}
