//! One instantiated guest module.

use super::abi::{
    GuestAllocation, OutputDescriptor, ALLOC_EXPORT, DEALLOC_EXPORT, INITIALIZE_EXPORT,
    MEMORY_EXPORT,
};
use super::{GuestError, GuestMemoryView};
use std::fmt;
use wasmtime::{Engine, Instance, Linker, Memory, Module, Store, TypedFunc, WasmParams, WasmResults};

/// Consecutive invocations with a failed release before a slot is retired.
pub const DEGRADE_AFTER_FAILED_RELEASES: u32 = 3;

/// A guest instance with its own store.
///
/// Every operation takes `&mut self`, so a slot can only ever serve one
/// invocation at a time.
pub struct GuestSlot {
    index: usize,
    store: Store<()>,
    memory: Memory,
    alloc: TypedFunc<u32, u32>,
    dealloc: TypedFunc<(u32, u32), ()>,
    entry: TypedFunc<(u32, u32, u32), u32>,
    entry_point: String,
    live: Vec<GuestAllocation>,
    failed_release_streak: u32,
    degraded: bool,
    invocations: u64,
}

impl GuestSlot {
    /// Instantiate `module` and resolve the ABI exports.
    pub(crate) fn instantiate(
        index: usize,
        engine: &Engine,
        module: &Module,
        entry_point: &str,
    ) -> Result<Self, GuestError> {
        let load_err = |err: wasmtime::Error| GuestError::ModuleLoad {
            source_name: format!("slot {}", index),
            reason: format!("{:#}", err),
        };

        let mut store = Store::new(engine, ());
        let mut linker: Linker<()> = Linker::new(engine);
        // WASI reactors import host functions the filter never calls.
        linker
            .define_unknown_imports_as_traps(module)
            .map_err(load_err)?;
        let instance = linker.instantiate(&mut store, module).map_err(load_err)?;

        if let Some(init) = instance.get_func(&mut store, INITIALIZE_EXPORT) {
            init.typed::<(), ()>(&store)
                .map_err(|e| validation(INITIALIZE_EXPORT, e))?
                .call(&mut store, ())
                .map_err(|e| GuestError::trap(INITIALIZE_EXPORT, e))?;
        }

        let alloc = typed_export::<u32, u32>(&instance, &mut store, ALLOC_EXPORT)?;
        let dealloc = typed_export::<(u32, u32), ()>(&instance, &mut store, DEALLOC_EXPORT)?;
        let entry = typed_export::<(u32, u32, u32), u32>(&instance, &mut store, entry_point)?;
        let memory = instance
            .get_memory(&mut store, MEMORY_EXPORT)
            .ok_or_else(|| GuestError::Validation {
                export: MEMORY_EXPORT.to_string(),
                reason: "missing memory export".to_string(),
            })?;

        Ok(Self {
            index,
            store,
            memory,
            alloc,
            dealloc,
            entry,
            entry_point: entry_point.to_string(),
            live: Vec::new(),
            failed_release_streak: 0,
            degraded: false,
            invocations: 0,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// Current linear memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.memory.data_size(&self.store)
    }

    /// Host-requested allocations not yet released.
    pub fn outstanding_allocations(&self) -> usize {
        self.live.len()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Completed invocations on this slot.
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Fails with `SlotDegraded` once the slot has been retired.
    pub fn ensure_usable(&self) -> Result<(), GuestError> {
        if self.degraded {
            return Err(GuestError::SlotDegraded {
                slot: self.index,
                failed_releases: self.failed_release_streak,
            });
        }
        Ok(())
    }

    pub fn alloc(&mut self, len: u32) -> Result<GuestAllocation, GuestError> {
        let ptr = self
            .alloc
            .call(&mut self.store, len)
            .map_err(|e| GuestError::trap(ALLOC_EXPORT, e))?;
        if ptr == 0 {
            return Err(GuestError::AllocFailure {
                requested: len as u64,
                reason: "guest alloc returned a null pointer".to_string(),
            });
        }
        let allocation = GuestAllocation::new(ptr, len);
        self.live.push(allocation);
        Ok(allocation)
    }

    /// Release `allocation`. The guest-made result buffer is released here
    /// as well, even though the host never allocated it.
    ///
    /// The allocation stops being tracked even if `dealloc` traps; the
    /// failure counts towards degrading the slot instead.
    pub fn dealloc(&mut self, allocation: GuestAllocation) -> Result<(), GuestError> {
        if let Some(pos) = self.live.iter().position(|a| *a == allocation) {
            self.live.swap_remove(pos);
        }
        self.dealloc
            .call(&mut self.store, (allocation.ptr, allocation.len))
            .map_err(|e| GuestError::trap(DEALLOC_EXPORT, e))?;
        Ok(())
    }

    fn view(&mut self) -> GuestMemoryView<'_> {
        GuestMemoryView::new(self.memory.data_mut(&mut self.store))
    }

    pub fn write(&mut self, ptr: u32, data: &[u8]) -> Result<(), GuestError> {
        self.view().write(ptr, data)
    }

    /// Copy `len` bytes at `ptr` into host memory.
    pub fn read(&mut self, ptr: u32, len: u32) -> Result<Vec<u8>, GuestError> {
        self.view().read(ptr, len).map(<[u8]>::to_vec)
    }

    pub fn read_descriptor(&mut self, ptr: u32) -> Result<OutputDescriptor, GuestError> {
        self.view().read_descriptor(ptr)
    }

    /// Call the filter entry point; returns the result length.
    pub fn call_filter(
        &mut self,
        in_ptr: u32,
        in_len: u32,
        out_params_ptr: u32,
    ) -> Result<u32, GuestError> {
        self.entry
            .call(&mut self.store, (in_ptr, in_len, out_params_ptr))
            .map_err(|e| GuestError::trap(&self.entry_point, e))
    }

    /// Close out one invocation. Returns `true` if this call degraded the slot.
    pub fn record_invocation(&mut self, releases_ok: bool) -> bool {
        self.invocations += 1;
        if releases_ok {
            self.failed_release_streak = 0;
            return false;
        }
        self.failed_release_streak += 1;
        if !self.degraded && self.failed_release_streak >= DEGRADE_AFTER_FAILED_RELEASES {
            self.degraded = true;
            return true;
        }
        false
    }
}

impl fmt::Debug for GuestSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestSlot")
            .field("index", &self.index)
            .field("entry_point", &self.entry_point)
            .field("memory_size", &self.memory_size())
            .field("outstanding", &self.live.len())
            .field("degraded", &self.degraded)
            .field("invocations", &self.invocations)
            .finish()
    }
}

fn validation(export: &str, err: wasmtime::Error) -> GuestError {
    GuestError::Validation {
        export: export.to_string(),
        reason: format!("{:#}", err),
    }
}

fn typed_export<P, R>(
    instance: &Instance,
    store: &mut Store<()>,
    name: &str,
) -> Result<TypedFunc<P, R>, GuestError>
where
    P: WasmParams,
    R: WasmResults,
{
    let func = instance
        .get_func(&mut *store, name)
        .ok_or_else(|| GuestError::Validation {
            export: name.to_string(),
            reason: "missing function export".to_string(),
        })?;
    func.typed::<P, R>(&*store).map_err(|e| validation(name, e))
}
