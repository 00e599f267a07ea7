//! Distributed exchange: upload the tile, run one remote job, download the
//! result.
//!
//! Only the seams are defined here. [`TileSink`] stands in for an object
//! store and [`JobLauncher`] for a cluster scheduler; [`MemoryTileSink`] and
//! [`InlineJobLauncher`] implement them in-process. Failures are reported
//! as-is and never retried.

use super::{ensure_tile_dimensions, ExchangeError, TileExchange};
use crate::codec::TileCodec;
use crate::tile::{Tile, TileCoord};
use image::RgbaImage;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Longest DNS-1123 label, the limit on job names.
pub const MAX_JOB_NAME_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("object '{0}' not found")]
    NotFound(String),

    #[error("upload of '{key}' failed: {reason}")]
    Upload { key: String, reason: String },

    #[error("job '{name}' failed: {reason}")]
    Job { name: String, reason: String },
}

/// Address of an object in the tile store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileReference(String);

impl TileReference {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn key(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Object storage for tile bytes.
pub trait TileSink: Send + Sync {
    fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<TileReference, RemoteError>;
    fn fetch(&self, reference: &TileReference) -> Result<Vec<u8>, RemoteError>;
}

/// One remote job: process `input`, store the result under `output_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub name: String,
    pub coord: TileCoord,
    pub input: TileReference,
    pub output_key: String,
}

/// Awaitable result of a submitted job.
pub trait CompletionHandle: Send {
    /// Block until the job finishes; returns the processed tile's reference.
    fn wait(self: Box<Self>) -> Result<TileReference, RemoteError>;
}

/// Schedules remote jobs.
pub trait JobLauncher: Send + Sync {
    fn submit(&self, request: JobRequest) -> Result<Box<dyn CompletionHandle>, RemoteError>;
}

/// DNS-1123 compliant job name for one tile.
///
/// Lowercase alphanumerics and `-` only, no leading or trailing dash, at
/// most [`MAX_JOB_NAME_LEN`] characters. The prefix is shortened first so
/// the coordinates and nonce survive.
pub fn job_name(prefix: &str, coord: TileCoord, nonce: &str) -> String {
    let suffix = sanitize(&format!("c{}-r{}-{}", coord.col, coord.row, nonce));
    let suffix: String = suffix.chars().take(MAX_JOB_NAME_LEN).collect();
    let room = MAX_JOB_NAME_LEN.saturating_sub(suffix.len() + 1);
    let prefix: String = sanitize(prefix).chars().take(room).collect();
    let prefix = prefix.trim_matches('-');

    let name = if prefix.is_empty() {
        suffix
    } else {
        format!("{}-{}", prefix, suffix)
    };
    let name = name.trim_matches('-');
    if name.is_empty() {
        "tile".to_string()
    } else {
        name.to_string()
    }
}

fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = c.to_ascii_lowercase();
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' };
        if !(c == '-' && out.ends_with('-')) {
            out.push(c);
        }
    }
    out
}

/// Runs every tile as a separate remote job.
pub struct RemoteExchange<S, L> {
    sink: Arc<S>,
    launcher: Arc<L>,
    codec: Arc<dyn TileCodec>,
    prefix: String,
    nonce: String,
}

impl<S: TileSink, L: JobLauncher> RemoteExchange<S, L> {
    pub fn new(
        sink: Arc<S>,
        launcher: Arc<L>,
        codec: Arc<dyn TileCodec>,
        prefix: impl Into<String>,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            sink,
            launcher,
            codec,
            prefix: prefix.into(),
            nonce: nonce.into(),
        }
    }
}

impl<S: TileSink, L: JobLauncher> TileExchange for RemoteExchange<S, L> {
    fn invoke(&mut self, tile: &Tile) -> Result<RgbaImage, ExchangeError> {
        let encoded = self.codec.encode(&tile.pixels).map_err(ExchangeError::Encode)?;
        let name = job_name(&self.prefix, tile.coord, &self.nonce);
        let extension = self.codec.extension();

        let input = self
            .sink
            .upload(&format!("{}/input.{}", name, extension), encoded)?;
        let request = JobRequest {
            name: name.clone(),
            coord: tile.coord,
            input,
            output_key: format!("{}/output.{}", name, extension),
        };
        let output = self.launcher.submit(request)?.wait()?;
        let bytes = self.sink.fetch(&output)?;

        let image = self.codec.decode(&bytes).map_err(ExchangeError::Decode)?;
        tracing::trace!(col = tile.coord.col, row = tile.coord.row, job = %name, "remote tile done");
        ensure_tile_dimensions(tile, image)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

/// In-memory [`TileSink`].
#[derive(Debug, Default)]
pub struct MemoryTileSink {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryTileSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl TileSink for MemoryTileSink {
    fn upload(&self, key: &str, bytes: Vec<u8>) -> Result<TileReference, RemoteError> {
        self.objects().insert(key.to_string(), bytes);
        Ok(TileReference::new(key))
    }

    fn fetch(&self, reference: &TileReference) -> Result<Vec<u8>, RemoteError> {
        self.objects()
            .get(reference.key())
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(reference.key().to_string()))
    }
}

/// Runs each job synchronously against a [`TileSink`] using a local
/// byte-level filter.
pub struct InlineJobLauncher<S, F> {
    sink: Arc<S>,
    filter: F,
}

impl<S, F> InlineJobLauncher<S, F>
where
    S: TileSink,
    F: Fn(&[u8]) -> Result<Vec<u8>, String> + Send + Sync,
{
    pub fn new(sink: Arc<S>, filter: F) -> Self {
        Self { sink, filter }
    }
}

struct Ready(Result<TileReference, RemoteError>);

impl CompletionHandle for Ready {
    fn wait(self: Box<Self>) -> Result<TileReference, RemoteError> {
        self.0
    }
}

impl<S, F> JobLauncher for InlineJobLauncher<S, F>
where
    S: TileSink,
    F: Fn(&[u8]) -> Result<Vec<u8>, String> + Send + Sync,
{
    fn submit(&self, request: JobRequest) -> Result<Box<dyn CompletionHandle>, RemoteError> {
        let input = self.sink.fetch(&request.input)?;
        let outcome = (self.filter)(&input)
            .map_err(|reason| RemoteError::Job {
                name: request.name.clone(),
                reason,
            })
            .and_then(|bytes| self.sink.upload(&request.output_key, bytes));
        Ok(Box::new(Ready(outcome)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RawCodec;
    use crate::tile::split;
    use image::Rgba;

    #[test]
    fn test_job_name_is_dns_label() {
        let name = job_name("Tile_Filter", TileCoord::new(3, 12), "AB12");
        assert_eq!(name, "tile-filter-c3-r12-ab12");
    }

    #[test]
    fn test_job_name_truncates_prefix_first() {
        let prefix = "x".repeat(100);
        let name = job_name(&prefix, TileCoord::new(10, 20), "run7");
        assert!(name.len() <= MAX_JOB_NAME_LEN);
        assert!(name.ends_with("-c10-r20-run7"));
        assert!(!name.starts_with('-'));
    }

    #[test]
    fn test_job_name_trims_dashes() {
        assert_eq!(job_name("--", TileCoord::new(0, 0), "__"), "c0-r0");
        assert!(job_name("", TileCoord::new(0, 0), "").chars().all(|c| c != '_'));
    }

    fn tile() -> Tile {
        let image = RgbaImage::from_fn(8, 8, |x, y| Rgba([x as u8, y as u8, 1, 255]));
        split(&image, 8).unwrap().remove(0)
    }

    #[test]
    fn test_remote_identity_round_trip() {
        let sink = Arc::new(MemoryTileSink::new());
        let launcher = Arc::new(InlineJobLauncher::new(sink.clone(), |b: &[u8]| Ok(b.to_vec())));
        let mut exchange =
            RemoteExchange::new(sink.clone(), launcher, Arc::new(RawCodec), "bench", "n1");

        let tile = tile();
        assert_eq!(exchange.invoke(&tile).unwrap(), tile.pixels);
        assert_eq!(
            sink.keys(),
            vec!["bench-c0-r0-n1/input.raw", "bench-c0-r0-n1/output.raw"]
        );
    }

    #[test]
    fn test_failed_job_surfaces_as_remote_error() {
        let sink = Arc::new(MemoryTileSink::new());
        let launcher = Arc::new(InlineJobLauncher::new(sink.clone(), |_: &[u8]| {
            Err("pod evicted".to_string())
        }));
        let mut exchange = RemoteExchange::new(sink, launcher, Arc::new(RawCodec), "bench", "n1");

        let err = exchange.invoke(&tile()).unwrap_err();
        assert!(matches!(err, ExchangeError::Remote(RemoteError::Job { .. })));
        assert!(err.to_string().contains("pod evicted"));
    }
}
