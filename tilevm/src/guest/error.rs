//! Guest module and slot errors.

use thiserror::Error;

/// Failures loading, validating or calling a guest module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuestError {
    /// The module file is missing, too large, or not valid WebAssembly.
    #[error("failed to load guest module {source_name}: {reason}")]
    ModuleLoad { source_name: String, reason: String },

    /// A required export is absent or has the wrong type.
    #[error("guest module export '{export}' is invalid: {reason}")]
    Validation { export: String, reason: String },

    /// A pool was requested with no slots.
    #[error("a guest runtime pool needs at least one slot")]
    NoSlots,

    /// `alloc` returned 0, or the request exceeded the input limit.
    #[error("guest allocation of {requested} bytes failed: {reason}")]
    AllocFailure { requested: u64, reason: String },

    /// A host read or write would leave guest memory.
    #[error("guest memory access [{offset}, {offset}+{len}) exceeds memory size {memory_size}")]
    MemoryBounds {
        offset: u64,
        len: u64,
        memory_size: usize,
    },

    /// The filter reported failure (zero-length result).
    #[error("guest filter '{entry_point}' failed: {reason}")]
    FilterFailed { entry_point: String, reason: String },

    /// The descriptor length disagrees with the entry point's return value.
    #[error("output descriptor length {descriptor} does not match returned length {returned}")]
    DescriptorMismatch { returned: u32, descriptor: u32 },

    /// The guest trapped inside an export.
    #[error("guest trapped in '{export}': {message}")]
    Trap { export: String, message: String },

    /// The slot failed too many releases and no longer accepts work.
    #[error("guest slot {slot} is degraded after {failed_releases} failed releases")]
    SlotDegraded { slot: usize, failed_releases: u32 },
}

impl GuestError {
    pub(crate) fn trap(export: &str, err: wasmtime::Error) -> Self {
        GuestError::Trap {
            export: export.to_string(),
            message: format!("{:#}", err),
        }
    }
}
