//! Fixed-size pool of guest slots sharing one compiled module.

use super::abi::MAX_MODULE_SIZE;
use super::{GuestError, GuestSlot};
use crate::config::{PipelineConfig, DEFAULT_ENTRY_POINT, DEFAULT_MAX_GUEST_INPUT_LEN};
use crate::log::Logger;
use crate::{log_debug, log_info};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use wasmtime::{Engine, Module};

/// What to load and how many instances to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestOptions {
    pub module_path: PathBuf,
    pub entry_point: String,
    pub slots: usize,
    pub max_input_len: u32,
}

impl GuestOptions {
    pub fn new(module_path: impl Into<PathBuf>, slots: usize) -> Self {
        Self {
            module_path: module_path.into(),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            slots,
            max_input_len: DEFAULT_MAX_GUEST_INPUT_LEN,
        }
    }

    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = name.into();
        self
    }

    pub fn with_max_input_len(mut self, len: u32) -> Self {
        self.max_input_len = len;
        self
    }

    /// One slot per configured worker.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.module_path(), config.workers())
            .with_entry_point(config.entry_point())
            .with_max_input_len(config.max_input_len())
    }
}

/// Owns every guest slot for the lifetime of a run (or several runs).
///
/// Slots are created in index order and torn down in reverse order when the
/// pool is dropped. Workers borrow them through [`slots_mut`](Self::slots_mut),
/// so the pool cannot be dropped while any worker still holds a slot.
pub struct GuestRuntimePool {
    engine: Engine,
    module: Module,
    slots: Vec<GuestSlot>,
    options: GuestOptions,
    logger: Arc<dyn Logger>,
}

impl GuestRuntimePool {
    /// Load the module at `options.module_path` and instantiate every slot.
    pub fn new(options: GuestOptions, logger: Arc<dyn Logger>) -> Result<Self, GuestError> {
        let bytes = read_module(&options.module_path)?;
        Self::build(&bytes, &options.module_path.display().to_string(), options, logger)
    }

    /// Build from in-memory module bytes (binary or WAT text).
    /// `options.module_path` is ignored.
    pub fn from_bytes(
        bytes: &[u8],
        options: GuestOptions,
        logger: Arc<dyn Logger>,
    ) -> Result<Self, GuestError> {
        Self::build(bytes, "<memory>", options, logger)
    }

    fn build(
        bytes: &[u8],
        source_name: &str,
        options: GuestOptions,
        logger: Arc<dyn Logger>,
    ) -> Result<Self, GuestError> {
        if options.slots == 0 {
            return Err(GuestError::NoSlots);
        }
        if bytes.len() > MAX_MODULE_SIZE {
            return Err(GuestError::ModuleLoad {
                source_name: source_name.to_string(),
                reason: format!(
                    "module is {} bytes, limit is {}",
                    bytes.len(),
                    MAX_MODULE_SIZE
                ),
            });
        }

        let started = Instant::now();
        let engine = Engine::default();
        let module = Module::new(&engine, bytes).map_err(|e| GuestError::ModuleLoad {
            source_name: source_name.to_string(),
            reason: format!("{:#}", e),
        })?;

        let mut slots = Vec::with_capacity(options.slots);
        for index in 0..options.slots {
            slots.push(GuestSlot::instantiate(
                index,
                &engine,
                &module,
                &options.entry_point,
            )?);
        }

        log_info!(
            logger,
            "guest pool ready: {} slots of {} (entry '{}') in {:?}",
            slots.len(),
            source_name,
            options.entry_point,
            started.elapsed()
        );

        Ok(Self {
            engine,
            module,
            slots,
            options,
            logger,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn options(&self) -> &GuestOptions {
        &self.options
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn slot(&mut self, index: usize) -> Option<&mut GuestSlot> {
        self.slots.get_mut(index)
    }

    pub fn slots(&self) -> &[GuestSlot] {
        &self.slots
    }

    /// Exclusive access to every slot, one per worker.
    pub fn slots_mut(&mut self) -> &mut [GuestSlot] {
        &mut self.slots
    }

    /// Slots that still accept work.
    pub fn healthy_slots(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_degraded()).count()
    }

    /// Tear down every slot now instead of at end of scope.
    pub fn shutdown(self) {
        log_info!(self.logger, "shutting down guest pool ({} slots)", self.slots.len());
        drop(self);
    }
}

impl Drop for GuestRuntimePool {
    fn drop(&mut self) {
        while let Some(slot) = self.slots.pop() {
            let index = slot.index();
            drop(slot);
            log_debug!(self.logger, "released guest slot {}", index);
        }
    }
}

impl fmt::Debug for GuestRuntimePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestRuntimePool")
            .field("options", &self.options)
            .field("slots", &self.slots)
            .finish()
    }
}

fn read_module(path: &Path) -> Result<Vec<u8>, GuestError> {
    let load_err = |reason: String| GuestError::ModuleLoad {
        source_name: path.display().to_string(),
        reason,
    };
    let metadata = std::fs::metadata(path).map_err(|e| load_err(e.to_string()))?;
    if metadata.len() > MAX_MODULE_SIZE as u64 {
        return Err(load_err(format!(
            "module is {} bytes, limit is {}",
            metadata.len(),
            MAX_MODULE_SIZE
        )));
    }
    std::fs::read(path).map_err(|e| load_err(e.to_string()))
}
