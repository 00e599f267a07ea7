//! Exchange through a child process's stdin and stdout.

use super::{ensure_tile_dimensions, ExchangeError, InvocationStage, ProcessCommand, TileExchange};
use crate::codec::TileCodec;
use crate::guest::GuestError;
use crate::tile::Tile;
use image::RgbaImage;
use std::io::{ErrorKind, Write as _};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::thread;

/// Launches one runtime process per tile and streams the encoded tile
/// through its standard streams. Nothing touches the filesystem.
pub struct StreamedPipeExchange {
    command: ProcessCommand,
    module_path: PathBuf,
    codec: Arc<dyn TileCodec>,
}

impl StreamedPipeExchange {
    pub fn new(
        command: ProcessCommand,
        module_path: impl Into<PathBuf>,
        codec: Arc<dyn TileCodec>,
    ) -> Self {
        Self {
            command,
            module_path: module_path.into(),
            codec,
        }
    }
}

impl TileExchange for StreamedPipeExchange {
    fn invoke(&mut self, tile: &Tile) -> Result<RgbaImage, ExchangeError> {
        let encoded = self.codec.encode(&tile.pixels).map_err(ExchangeError::Encode)?;

        let mut child = self
            .command
            .command(&self.module_path, None, None)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExchangeError::io(InvocationStage::Invoke, e))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExchangeError::io(InvocationStage::Write, ErrorKind::BrokenPipe.into()))?;

        // Feed stdin from a second thread so a child that writes before it
        // finishes reading cannot fill its stdout pipe and stall us both.
        let (written, output) = thread::scope(|scope| {
            let data = &encoded;
            let writer = scope.spawn(move || {
                let mut stdin = stdin;
                stdin.write_all(data)
            });
            let output = child.wait_with_output();
            (writer.join(), output)
        });
        let output = output.map_err(|e| ExchangeError::io(InvocationStage::Read, e))?;

        if !output.status.success() {
            return Err(ExchangeError::Process {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        match written {
            Ok(Ok(())) => {}
            // The child exited successfully without draining stdin.
            Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(ExchangeError::io(InvocationStage::Write, e)),
            Err(_) => {
                return Err(ExchangeError::io(
                    InvocationStage::Write,
                    std::io::Error::other("stdin writer panicked"),
                ))
            }
        }

        if output.stdout.is_empty() {
            return Err(ExchangeError::guest(
                InvocationStage::Read,
                GuestError::FilterFailed {
                    entry_point: self.command.to_string(),
                    reason: "runtime produced no output".to_string(),
                },
            ));
        }

        let image = self.codec.decode(&output.stdout).map_err(ExchangeError::Decode)?;
        tracing::trace!(
            col = tile.coord.col,
            row = tile.coord.row,
            bytes_in = encoded.len(),
            bytes_out = output.stdout.len(),
            "tile streamed"
        );
        ensure_tile_dimensions(tile, image)
    }

    fn name(&self) -> &'static str {
        "streamed-pipe"
    }
}
