//! Optional per-section mirror kept in a host provided slot

pub mod heap_slot;

use std::sync::{Arc, Mutex};

use bitflags::bitflags;

use crate::codec::vanilla::LegacyLayout;
use crate::config::LegacyRangePolicy;
use crate::coord::cell_pos;
use crate::error::{Error, Result};
use crate::nibble;
use crate::storage::chunk::SECTION_BLOCK_COUNT;
use crate::storage::chunk::section::{Section, ZeroFill};

bitflags! {
    pub struct SlotCapabilities: u8 {
        /// Per cell id and metadata access, required
        const CELL_DATA = 0x01;
        /// Per cell block and sky light access
        const CELL_LIGHT = 0x02;
        /// `set_legacy` and `copy_legacy`
        const BULK_LEGACY = 0x04;
        const ZERO_FILL = 0x08;
        const DEEP_COPY = 0x10;

        /// The host serializes the slot itself, packets use the grouped layout
        const OWN_SERIALIZER = 0x20;
    }
}

/// Storage slot the host keeps its own copy of a section in.
///
/// Coordinates are section relative and always in 0..16.
pub trait Slot: Send {
    fn capabilities(&self) -> SlotCapabilities;

    fn block_id(&self, x: u8, y: u8, z: u8) -> u16;
    fn set_block_id(&mut self, x: u8, y: u8, z: u8, id: u16);

    fn metadata(&self, x: u8, y: u8, z: u8) -> u16;
    fn set_metadata(&mut self, x: u8, y: u8, z: u8, meta: u16);

    fn block_light(&self, _x: u8, _y: u8, _z: u8) -> u8 {
        0
    }

    fn set_block_light(&mut self, _x: u8, _y: u8, _z: u8, _value: u8) {}

    fn sky_light(&self, _x: u8, _y: u8, _z: u8) -> u8 {
        0
    }

    fn set_sky_light(&mut self, _x: u8, _y: u8, _z: u8, _value: u8) {}

    /// Replaces ids, metadata and light with the legacy arrays.
    /// Sky light is zeroed when absent.
    fn set_legacy(&mut self, _layout: &LegacyLayout, _block_light: &[u8], _sky_light: Option<&[u8]>) -> Result<()> {
        Err(Error::MirrorUnavailable("slot has no bulk legacy access"))
    }

    fn copy_legacy(&self, _policy: LegacyRangePolicy) -> Result<LegacyLayout> {
        Err(Error::MirrorUnavailable("slot has no bulk legacy access"))
    }

    fn zero_fill(&mut self, _fill: ZeroFill) -> Result<()> {
        Err(Error::MirrorUnavailable("slot can't be zero filled"))
    }

    fn copy(&self) -> Result<SharedSlot> {
        Err(Error::MirrorUnavailable("slot can't be copied"))
    }
}

pub type SharedSlot = Arc<Mutex<dyn Slot>>;

/// Hands out slots for new sections
pub trait SlotAllocator: Send + Sync {
    fn allocate_slot(&self) -> SharedSlot;

    fn off_heap_total_memory(&self) -> u64 {
        0
    }

    fn off_heap_used_memory(&self) -> u64 {
        0
    }
}

/// Dense transfers between a section and a slot with a fixed capability set
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MirrorSync {
    capabilities: SlotCapabilities
}

impl MirrorSync {
    /// Reads the capabilities of `slot`, a slot without per cell access can't mirror anything
    pub fn detect(slot: &dyn Slot) -> Result<MirrorSync> {
        let capabilities = slot.capabilities();
        if !capabilities.contains(SlotCapabilities::CELL_DATA) {
            return Err(Error::MirrorUnavailable("slot has no per cell access"));
        }

        Ok(MirrorSync { capabilities })
    }

    pub fn capabilities(&self) -> SlotCapabilities {
        self.capabilities
    }

    pub fn push(&self, section: &Section, slot: &mut dyn Slot) {
        let light = self.capabilities.contains(SlotCapabilities::CELL_LIGHT);
        let ids = section.block_ids();
        let metas = section.block_metas();
        for index in 0..SECTION_BLOCK_COUNT {
            let (x, y, z) = cell_pos(index);
            slot.set_block_id(x, y, z, ids[index]);
            slot.set_metadata(x, y, z, metas[index]);
            if light {
                slot.set_block_light(x, y, z, nibble::get(section.block_light_array(), index));
                slot.set_sky_light(x, y, z, nibble::get(section.sky_light_array(), index));
            }
        }
    }

    pub fn pull(&self, section: &mut Section, slot: &dyn Slot) {
        for index in 0..SECTION_BLOCK_COUNT {
            let (x, y, z) = cell_pos(index);
            section.block_ids_mut()[index] = slot.block_id(x, y, z);
            section.block_metas_mut()[index] = slot.metadata(x, y, z);
        }

        if self.capabilities.contains(SlotCapabilities::CELL_LIGHT) {
            for index in 0..SECTION_BLOCK_COUNT {
                let (x, y, z) = cell_pos(index);
                nibble::set(section.block_light_array_mut(), index, slot.block_light(x, y, z));
                nibble::set(section.sky_light_array_mut(), index, slot.sky_light(x, y, z));
            }
        }
    }
}

/// Handle and capabilities of the mirror attached to a section
pub(crate) struct Mirror {
    pub slot: SharedSlot,
    pub sync: MirrorSync
}

/// Writes every cell of `section` into `slot`
pub fn push_to_mirror(section: &Section, slot: &mut dyn Slot) -> Result<()> {
    MirrorSync::detect(&*slot)?.push(section, slot);
    Ok(())
}

/// Reads every cell of `slot` into `section`
pub fn pull_from_mirror(section: &mut Section, slot: &dyn Slot) -> Result<()> {
    MirrorSync::detect(slot)?.pull(section, slot);
    Ok(())
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;
    use super::heap_slot::HeapSlot;
    use crate::coord::Coord;

    fn agree(section: &Section, slot: &dyn Slot) -> bool {
        (0..SECTION_BLOCK_COUNT).all(|index| {
            let (x, y, z) = cell_pos(index);
            let pos = Coord::new(x as i32, y as i32, z as i32);
            section.block_id(pos).unwrap() == slot.block_id(x, y, z)
                && section.metadata(pos).unwrap() == slot.metadata(x, y, z)
                && section.block_light(pos).unwrap() == slot.block_light(x, y, z)
                && section.sky_light(pos).unwrap() == slot.sky_light(x, y, z)
        })
    }

    #[quickcheck]
    fn push_then_agree(section: Section) -> bool {
        let mut slot = HeapSlot::new();
        push_to_mirror(&section, &mut slot).unwrap();
        agree(&section, &slot)
    }

    #[quickcheck]
    fn pull_then_agree(source: Section) -> bool {
        let mut slot = HeapSlot::new();
        push_to_mirror(&source, &mut slot).unwrap();

        let mut section = Section::new();
        pull_from_mirror(&mut section, &slot).unwrap();
        agree(&section, &slot) && section == source
    }

    #[test]
    fn light_needs_capability() {
        let mut section = Section::new();
        section.set_sky_light(Coord::new(3, 3, 3), 15).unwrap();

        let mut slot = HeapSlot::with_capabilities(SlotCapabilities::CELL_DATA);
        push_to_mirror(&section, &mut slot).unwrap();
        assert_eq!(slot.sky_light(3, 3, 3), 0);
    }

    #[test]
    fn rejects_slot_without_cell_access() {
        let slot = HeapSlot::with_capabilities(SlotCapabilities::BULK_LEGACY);
        assert!(matches!(MirrorSync::detect(&slot), Err(Error::MirrorUnavailable(_))));

        let mut section = Section::new();
        let shared: SharedSlot = Arc::new(Mutex::new(slot));
        assert!(section.attach_mirror(shared).is_err());
        assert!(section.mirror().is_none());
    }
}
