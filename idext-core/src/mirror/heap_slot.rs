use std::sync::{Arc, Mutex};

use crate::codec::fixed;
use crate::codec::vanilla::{self, LegacyLayout};
use crate::config::LegacyRangePolicy;
use crate::coord::cell_index;
use crate::error::Result;
use crate::nibble;
use crate::storage::chunk::{NIBBLE_ARRAY_LEN, SECTION_BLOCK_COUNT};
use crate::storage::chunk::section::ZeroFill;

use super::{SharedSlot, Slot, SlotAllocator, SlotCapabilities};

/// Slot that keeps everything in plain arrays
#[derive(Clone, Debug, PartialEq)]
pub struct HeapSlot {
    capabilities: SlotCapabilities,
    block_ids: [u16; SECTION_BLOCK_COUNT],
    block_metas: [u16; SECTION_BLOCK_COUNT],
    block_light: [u8; NIBBLE_ARRAY_LEN],
    sky_light: [u8; NIBBLE_ARRAY_LEN]
}

impl HeapSlot {
    /// Everything but its own serializer
    pub fn new() -> Self {
        HeapSlot::with_capabilities(SlotCapabilities::all() - SlotCapabilities::OWN_SERIALIZER)
    }

    /// Behaves like a slot that the host serializes itself
    pub fn serializing() -> Self {
        HeapSlot::with_capabilities(SlotCapabilities::all())
    }

    pub fn with_capabilities(capabilities: SlotCapabilities) -> Self {
        HeapSlot {
            capabilities,
            block_ids: [0; SECTION_BLOCK_COUNT],
            block_metas: [0; SECTION_BLOCK_COUNT],
            block_light: [0; NIBBLE_ARRAY_LEN],
            sky_light: [0; NIBBLE_ARRAY_LEN]
        }
    }

    pub fn block_light_array(&self) -> &[u8; NIBBLE_ARRAY_LEN] {
        &self.block_light
    }

    pub fn sky_light_array(&self) -> &[u8; NIBBLE_ARRAY_LEN] {
        &self.sky_light
    }
}

impl Default for HeapSlot {
    fn default() -> Self {
        HeapSlot::new()
    }
}

impl Slot for HeapSlot {
    fn capabilities(&self) -> SlotCapabilities {
        self.capabilities
    }

    fn block_id(&self, x: u8, y: u8, z: u8) -> u16 {
        self.block_ids[cell_index(x, y, z)]
    }

    fn set_block_id(&mut self, x: u8, y: u8, z: u8, id: u16) {
        self.block_ids[cell_index(x, y, z)] = id;
    }

    fn metadata(&self, x: u8, y: u8, z: u8) -> u16 {
        self.block_metas[cell_index(x, y, z)]
    }

    fn set_metadata(&mut self, x: u8, y: u8, z: u8, meta: u16) {
        self.block_metas[cell_index(x, y, z)] = meta;
    }

    fn block_light(&self, x: u8, y: u8, z: u8) -> u8 {
        nibble::get(&self.block_light, cell_index(x, y, z))
    }

    fn set_block_light(&mut self, x: u8, y: u8, z: u8, value: u8) {
        nibble::set(&mut self.block_light, cell_index(x, y, z), value);
    }

    fn sky_light(&self, x: u8, y: u8, z: u8) -> u8 {
        nibble::get(&self.sky_light, cell_index(x, y, z))
    }

    fn set_sky_light(&mut self, x: u8, y: u8, z: u8, value: u8) {
        nibble::set(&mut self.sky_light, cell_index(x, y, z), value);
    }

    fn set_legacy(&mut self, layout: &LegacyLayout, block_light: &[u8], sky_light: Option<&[u8]>) -> Result<()> {
        let block_light = fixed::<NIBBLE_ARRAY_LEN>("block_light", block_light)?;
        let sky_light = sky_light.map(|x| fixed::<NIBBLE_ARRAY_LEN>("sky_light", x)).transpose()?;

        vanilla::decode_lsb(&layout.lsb, &mut self.block_ids);
        if let Some(msb) = &layout.msb {
            vanilla::decode_msb(msb, &mut self.block_ids);
        }

        vanilla::decode_meta(&layout.meta, &mut self.block_metas);
        self.block_light = *block_light;
        match sky_light {
            Some(v) => self.sky_light = *v,
            None => self.sky_light.fill(0)
        }

        Ok(())
    }

    fn copy_legacy(&self, policy: LegacyRangePolicy) -> Result<LegacyLayout> {
        vanilla::encode_arrays(&self.block_ids, &self.block_metas, policy)
    }

    fn zero_fill(&mut self, fill: ZeroFill) -> Result<()> {
        match fill {
            ZeroFill::All => {
                self.block_ids.fill(0);
                self.block_metas.fill(0);
                self.block_light.fill(0);
                self.sky_light.fill(0);
            }
            ZeroFill::MsbOnly => {
                for id in self.block_ids.iter_mut() {
                    *id &= 0x00ff;
                }
            }
            ZeroFill::SkylightOnly => self.sky_light.fill(0)
        }

        Ok(())
    }

    fn copy(&self) -> Result<SharedSlot> {
        Ok(Arc::new(Mutex::new(self.clone())))
    }
}

/// Allocates a `HeapSlot` per section, nothing lives off heap
#[derive(Copy, Clone, Debug)]
pub struct HeapSlotAllocator {
    capabilities: SlotCapabilities
}

impl HeapSlotAllocator {
    pub fn new() -> Self {
        HeapSlotAllocator {
            capabilities: SlotCapabilities::all() - SlotCapabilities::OWN_SERIALIZER
        }
    }

    pub fn with_capabilities(capabilities: SlotCapabilities) -> Self {
        HeapSlotAllocator { capabilities }
    }
}

impl Default for HeapSlotAllocator {
    fn default() -> Self {
        HeapSlotAllocator::new()
    }
}

impl SlotAllocator for HeapSlotAllocator {
    fn allocate_slot(&self) -> SharedSlot {
        Arc::new(Mutex::new(HeapSlot::with_capabilities(self.capabilities)))
    }
}
