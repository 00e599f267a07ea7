//! Per-invocation errors, tagged with the step that failed.

use super::remote::RemoteError;
use crate::codec::CodecError;
use crate::guest::GuestError;
use std::fmt;
use std::io;
use thiserror::Error;

/// Step of a tile invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationStage {
    Encode,
    Allocate,
    Write,
    Invoke,
    Read,
    Decode,
    Release,
}

impl InvocationStage {
    pub fn as_str(self) -> &'static str {
        match self {
            InvocationStage::Encode => "encode",
            InvocationStage::Allocate => "allocate",
            InvocationStage::Write => "write",
            InvocationStage::Invoke => "invoke",
            InvocationStage::Read => "read",
            InvocationStage::Decode => "decode",
            InvocationStage::Release => "release",
        }
    }
}

impl fmt::Display for InvocationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single tile invocation failed.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Encode(CodecError),

    #[error(transparent)]
    Decode(CodecError),

    #[error("{source}")]
    Guest {
        stage: InvocationStage,
        #[source]
        source: GuestError,
    },

    #[error("{stage} I/O failed: {source}")]
    Io {
        stage: InvocationStage,
        #[source]
        source: io::Error,
    },

    /// The runtime process exited unsuccessfully.
    #[error("runtime process exited with {status}: {stderr}")]
    Process { status: String, stderr: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("guest returned a {actual_width}x{actual_height} tile, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
}

impl ExchangeError {
    pub(crate) fn guest(stage: InvocationStage, source: GuestError) -> Self {
        ExchangeError::Guest { stage, source }
    }

    pub(crate) fn io(stage: InvocationStage, source: io::Error) -> Self {
        ExchangeError::Io { stage, source }
    }

    /// The step this error belongs to.
    pub fn stage(&self) -> InvocationStage {
        match self {
            ExchangeError::Encode(_) => InvocationStage::Encode,
            ExchangeError::Decode(_) | ExchangeError::DimensionMismatch { .. } => {
                InvocationStage::Decode
            }
            ExchangeError::Guest { stage, .. } | ExchangeError::Io { stage, .. } => *stage,
            ExchangeError::Process { .. } | ExchangeError::Remote(_) => InvocationStage::Invoke,
        }
    }

    /// The guest error, if this failure came from the guest.
    pub fn guest_error(&self) -> Option<&GuestError> {
        match self {
            ExchangeError::Guest { source, .. } => Some(source),
            _ => None,
        }
    }
}
