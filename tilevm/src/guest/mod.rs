//! In-process WebAssembly guests.
//!
//! A [`GuestRuntimePool`] compiles one filter module and instantiates a fixed
//! number of [`GuestSlot`]s from it. Each slot has its own `wasmtime::Store`
//! and is handed to exactly one worker for the duration of a run.
//!
//! Guests implement a small ABI (see [`abi`]):
//!
//! | Export        | Signature                                  |
//! |---------------|--------------------------------------------|
//! | `alloc`       | `(len: u32) -> ptr: u32`, 0 on failure       |
//! | `dealloc`     | `(ptr: u32, len: u32)`                      |
//! | entry point   | `(in_ptr, in_len, out_params_ptr) -> out_len` |
//! | `memory`      | linear memory                               |
//!
//! All host access to guest memory goes through [`GuestMemoryView`], which
//! rejects out-of-range offsets instead of reading past the end.

pub mod abi;
mod error;
mod memory;
mod pool;
mod slot;

pub use abi::{GuestAllocation, OutputDescriptor};
pub use error::GuestError;
pub use memory::GuestMemoryView;
pub use pool::{GuestOptions, GuestRuntimePool};
pub use slot::{GuestSlot, DEGRADE_AFTER_FAILED_RELEASES};
