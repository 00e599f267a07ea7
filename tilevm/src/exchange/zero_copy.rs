//! In-process exchange over shared guest memory.

use super::{ensure_tile_dimensions, ExchangeError, InvocationStage, TileExchange};
use crate::codec::TileCodec;
use crate::guest::abi::OUTPUT_DESCRIPTOR_LEN;
use crate::guest::{GuestAllocation, GuestError, GuestSlot};
use crate::tile::{Tile, TileCoord};
use image::RgbaImage;
use std::sync::Arc;

/// Allocations made during one invocation, released in field order.
#[derive(Debug, Default)]
struct Held {
    input: Option<GuestAllocation>,
    output: Option<GuestAllocation>,
    params: Option<GuestAllocation>,
}

/// Drives the alloc / write / call / read / dealloc protocol on one slot.
pub struct ZeroCopyExchange<'a> {
    slot: &'a mut GuestSlot,
    codec: Arc<dyn TileCodec>,
    max_input_len: u32,
}

impl<'a> ZeroCopyExchange<'a> {
    pub fn new(slot: &'a mut GuestSlot, codec: Arc<dyn TileCodec>, max_input_len: u32) -> Self {
        Self {
            slot,
            codec,
            max_input_len,
        }
    }

    pub fn slot(&self) -> &GuestSlot {
        &*self.slot
    }

    fn exchange(&mut self, tile: &Tile, held: &mut Held) -> Result<RgbaImage, ExchangeError> {
        use InvocationStage::*;

        let encoded = self.codec.encode(&tile.pixels).map_err(ExchangeError::Encode)?;

        let in_len = u32::try_from(encoded.len())
            .ok()
            .filter(|len| *len <= self.max_input_len)
            .ok_or_else(|| {
                ExchangeError::guest(
                    Allocate,
                    GuestError::AllocFailure {
                        requested: encoded.len() as u64,
                        reason: format!("exceeds the {}-byte input limit", self.max_input_len),
                    },
                )
            })?;

        let input = self
            .slot
            .alloc(in_len)
            .map_err(|e| ExchangeError::guest(Allocate, e))?;
        held.input = Some(input);

        self.slot
            .write(input.ptr, &encoded)
            .map_err(|e| ExchangeError::guest(Write, e))?;

        let params = self
            .slot
            .alloc(OUTPUT_DESCRIPTOR_LEN)
            .map_err(|e| ExchangeError::guest(Allocate, e))?;
        held.params = Some(params);

        let returned = self
            .slot
            .call_filter(input.ptr, in_len, params.ptr)
            .map_err(|e| ExchangeError::guest(Invoke, e))?;
        if returned == 0 {
            return Err(ExchangeError::guest(
                Invoke,
                GuestError::FilterFailed {
                    entry_point: self.slot.entry_point().to_string(),
                    reason: "zero-length result".to_string(),
                },
            ));
        }

        let descriptor = self
            .slot
            .read_descriptor(params.ptr)
            .map_err(|e| ExchangeError::guest(Read, e))?;
        if descriptor.len != returned {
            // No (ptr, len) pair is known to match the guest's alloc, so the
            // output buffer is left to the guest.
            tracing::warn!(
                slot = self.slot.index(),
                ptr = descriptor.ptr,
                returned,
                descriptor = descriptor.len,
                "output descriptor disagrees with returned length, output not released"
            );
            return Err(ExchangeError::guest(
                Read,
                GuestError::DescriptorMismatch {
                    returned,
                    descriptor: descriptor.len,
                },
            ));
        }

        if descriptor.ptr != 0 {
            held.output = Some(descriptor.allocation());
        }

        let bytes = self
            .slot
            .read(descriptor.ptr, descriptor.len)
            .map_err(|e| ExchangeError::guest(Read, e))?;
        let image = self.codec.decode(&bytes).map_err(ExchangeError::Decode)?;
        ensure_tile_dimensions(tile, image)
    }

    /// Release input, output, then params. Returns `false` if any failed.
    fn release(&mut self, coord: TileCoord, held: Held) -> bool {
        let mut ok = true;
        for allocation in [held.input, held.output, held.params].into_iter().flatten() {
            if let Err(e) = self.slot.dealloc(allocation) {
                ok = false;
                tracing::warn!(
                    col = coord.col,
                    row = coord.row,
                    stage = %InvocationStage::Release,
                    slot = self.slot.index(),
                    ptr = allocation.ptr,
                    len = allocation.len,
                    error = %e,
                    "guest dealloc failed"
                );
            }
        }
        ok
    }
}

impl TileExchange for ZeroCopyExchange<'_> {
    fn invoke(&mut self, tile: &Tile) -> Result<RgbaImage, ExchangeError> {
        self.slot
            .ensure_usable()
            .map_err(|e| ExchangeError::guest(InvocationStage::Allocate, e))?;

        let mut held = Held::default();
        let result = self.exchange(tile, &mut held);
        let released = self.release(tile.coord, held);

        if self.slot.record_invocation(released) {
            tracing::error!(
                slot = self.slot.index(),
                "guest slot degraded after repeated release failures"
            );
        }

        match &result {
            Ok(_) => tracing::trace!(
                col = tile.coord.col,
                row = tile.coord.row,
                slot = self.slot.index(),
                "tile exchanged"
            ),
            Err(e) => tracing::debug!(
                col = tile.coord.col,
                row = tile.coord.row,
                stage = %e.stage(),
                slot = self.slot.index(),
                error = %e,
                "tile exchange failed"
            ),
        }
        result
    }

    fn is_healthy(&self) -> bool {
        !self.slot.is_degraded()
    }

    fn name(&self) -> &'static str {
        "zero-copy"
    }
}
