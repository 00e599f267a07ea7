//! Bounds-checked access to a guest's linear memory.

use super::abi::OutputDescriptor;
use super::GuestError;
use std::ops::Range;

/// A borrowed view of guest linear memory.
///
/// Created fresh for every access so the size always reflects any
/// `memory.grow` the guest performed in between.
#[derive(Debug)]
pub struct GuestMemoryView<'a> {
    bytes: &'a mut [u8],
}

impl<'a> GuestMemoryView<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    fn range(&self, ptr: u32, len: usize) -> Result<Range<usize>, GuestError> {
        let start = ptr as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(start..end),
            _ => Err(GuestError::MemoryBounds {
                offset: ptr as u64,
                len: len as u64,
                memory_size: self.bytes.len(),
            }),
        }
    }

    pub fn read(&self, ptr: u32, len: u32) -> Result<&[u8], GuestError> {
        let range = self.range(ptr, len as usize)?;
        Ok(&self.bytes[range])
    }

    pub fn write(&mut self, ptr: u32, data: &[u8]) -> Result<(), GuestError> {
        let range = self.range(ptr, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    pub fn read_descriptor(&self, ptr: u32) -> Result<OutputDescriptor, GuestError> {
        let raw = self.read(ptr, 8)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(raw);
        Ok(OutputDescriptor::from_le_bytes(bytes))
    }
}
