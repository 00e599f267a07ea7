//! Names and layouts shared with guest modules.

/// Guest allocator export.
pub const ALLOC_EXPORT: &str = "alloc";

/// Guest deallocator export.
pub const DEALLOC_EXPORT: &str = "dealloc";

/// Linear memory export.
pub const MEMORY_EXPORT: &str = "memory";

/// Reactor initialiser emitted by WASI toolchains; called once if present.
pub const INITIALIZE_EXPORT: &str = "_initialize";

/// Size of the output descriptor the guest fills in.
pub const OUTPUT_DESCRIPTOR_LEN: u32 = 8;

/// Largest module accepted for compilation (64 MiB).
pub const MAX_MODULE_SIZE: usize = 64 * 1024 * 1024;

/// A region handed out by the guest's `alloc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuestAllocation {
    pub ptr: u32,
    pub len: u32,
}

impl GuestAllocation {
    pub fn new(ptr: u32, len: u32) -> Self {
        Self { ptr, len }
    }
}

/// `(out_ptr, out_len)` written by the guest at `out_params_ptr`.
///
/// Two little-endian `u32` fields, pointer first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputDescriptor {
    pub ptr: u32,
    pub len: u32,
}

impl OutputDescriptor {
    pub fn from_le_bytes(bytes: [u8; 8]) -> Self {
        Self {
            ptr: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            len: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }

    pub fn to_le_bytes(self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.ptr.to_le_bytes());
        out[4..].copy_from_slice(&self.len.to_le_bytes());
        out
    }

    /// The result buffer as an allocation the host must release.
    pub fn allocation(self) -> GuestAllocation {
        GuestAllocation::new(self.ptr, self.len)
    }
}
