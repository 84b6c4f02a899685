use std::fmt;

use log::*;

use crate::blocks::BlockRegistry;
use crate::config::UnregisteredPolicy;
use crate::coord::{cell_pos, checked_cell_index, Coord};
use crate::error::{Error, Result};
use crate::mirror::{Mirror, MirrorSync, SharedSlot, Slot, SlotCapabilities};
use crate::nibble;

use super::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ZeroFill {
    /// Ids, metadata and both light arrays
    All,
    /// Bits 8..15 of every block id
    MsbOnly,
    SkylightOnly
}

/// Canonical storage of one 16^3 section.
///
/// The arrays are the source of truth. An attached mirror receives every
/// single cell change on a best-effort basis and has to be resynced with
/// `sync_to_mirror` before anything reads it on its own.
pub struct Section {
    block_ids: [u16; SECTION_BLOCK_COUNT],
    block_metas: [u16; SECTION_BLOCK_COUNT],
    block_light: [u8; NIBBLE_ARRAY_LEN],
    block_sky_light: [u8; NIBBLE_ARRAY_LEN],

    non_empty_count: u32,
    ticking_count: u32,

    mirror: Option<Mirror>
}

impl Section {
    pub fn new() -> Section {
        Section {
            block_ids: [0; SECTION_BLOCK_COUNT],
            block_metas: [0; SECTION_BLOCK_COUNT],
            block_light: [0; NIBBLE_ARRAY_LEN],
            block_sky_light: [0; NIBBLE_ARRAY_LEN],
            non_empty_count: 0,
            ticking_count: 0,
            mirror: None
        }
    }

    pub fn block_id(&self, pos: Coord<i32>) -> Result<u16> {
        Ok(self.block_ids[checked_cell_index(pos)?])
    }

    pub fn set_block_id(&mut self, pos: Coord<i32>, id: u16) -> Result<()> {
        let index = checked_cell_index(pos)?;
        self.block_ids[index] = id;
        self.write_through(index, |slot, (x, y, z)| slot.set_block_id(x, y, z, id));
        Ok(())
    }

    pub fn metadata(&self, pos: Coord<i32>) -> Result<u16> {
        Ok(self.block_metas[checked_cell_index(pos)?])
    }

    pub fn set_metadata(&mut self, pos: Coord<i32>, meta: u16) -> Result<()> {
        let index = checked_cell_index(pos)?;
        self.block_metas[index] = meta;
        self.write_through(index, |slot, (x, y, z)| slot.set_metadata(x, y, z, meta));
        Ok(())
    }

    pub fn block_light(&self, pos: Coord<i32>) -> Result<u8> {
        Ok(nibble::get(&self.block_light, checked_cell_index(pos)?))
    }

    pub fn set_block_light(&mut self, pos: Coord<i32>, value: u8) -> Result<()> {
        let index = checked_cell_index(pos)?;
        nibble::set(&mut self.block_light, index, value);
        if self.mirror_has(SlotCapabilities::CELL_LIGHT) {
            self.write_through(index, |slot, (x, y, z)| slot.set_block_light(x, y, z, value & 0x0f));
        }

        Ok(())
    }

    pub fn sky_light(&self, pos: Coord<i32>) -> Result<u8> {
        Ok(nibble::get(&self.block_sky_light, checked_cell_index(pos)?))
    }

    pub fn set_sky_light(&mut self, pos: Coord<i32>, value: u8) -> Result<()> {
        let index = checked_cell_index(pos)?;
        nibble::set(&mut self.block_sky_light, index, value);
        if self.mirror_has(SlotCapabilities::CELL_LIGHT) {
            self.write_through(index, |slot, (x, y, z)| slot.set_sky_light(x, y, z, value & 0x0f));
        }

        Ok(())
    }

    pub fn zero_fill(&mut self, fill: ZeroFill) {
        match fill {
            ZeroFill::All => {
                self.block_ids.fill(0);
                self.block_metas.fill(0);
                self.block_light.fill(0);
                self.block_sky_light.fill(0);
                self.non_empty_count = 0;
                self.ticking_count = 0;
            }
            ZeroFill::MsbOnly => {
                for id in self.block_ids.iter_mut() {
                    *id &= 0x00ff;
                }
            }
            ZeroFill::SkylightOnly => self.block_sky_light.fill(0)
        }

        if let Some(mirror) = &self.mirror {
            if !mirror.sync.capabilities().contains(SlotCapabilities::ZERO_FILL) {
                return;
            }

            match mirror.slot.try_lock() {
                Ok(mut slot) => {
                    if let Err(e) = slot.zero_fill(fill) {
                        debug!("Mirror zero fill failed: {}", e);
                    }
                }
                Err(_) => debug!("Mirror busy, zero fill deferred to the next resync")
            }
        }
    }

    /// Copies the cell data and counters.
    /// An attached mirror is resynced and copied through the slot's own copy.
    pub fn deep_copy(&self) -> Section {
        let mut copy = Section {
            block_ids: self.block_ids,
            block_metas: self.block_metas,
            block_light: self.block_light,
            block_sky_light: self.block_sky_light,
            non_empty_count: self.non_empty_count,
            ticking_count: self.ticking_count,
            mirror: None
        };

        if let Some(mirror) = &self.mirror {
            match self.copy_mirror(mirror) {
                Ok(v) => copy.mirror = Some(v),
                Err(e) => warn!("Copied section without its mirror: {}", e)
            }
        }

        copy
    }

    fn copy_mirror(&self, mirror: &Mirror) -> Result<Mirror> {
        if !mirror.sync.capabilities().contains(SlotCapabilities::DEEP_COPY) {
            return Err(Error::MirrorUnavailable("slot can't be copied"));
        }

        let mut slot = mirror.slot.lock().map_err(|_| Error::MirrorUnavailable("mirror lock poisoned"))?;
        mirror.sync.push(self, &mut *slot);
        Ok(Mirror {
            slot: slot.copy()?,
            sync: mirror.sync
        })
    }

    /// Takes over the cells and counters of `other`, keeping this section's mirror.
    /// The mirror isn't updated, call `sync_to_mirror` afterwards.
    pub(crate) fn replace_cells(&mut self, other: Section) {
        self.block_ids = other.block_ids;
        self.block_metas = other.block_metas;
        self.block_light = other.block_light;
        self.block_sky_light = other.block_sky_light;
        self.non_empty_count = other.non_empty_count;
        self.ticking_count = other.ticking_count;
    }

    /// Recomputes the block counters, dealing with ids the registry doesn't know according to `policy`.
    /// The counters stay zero if the sweep fails.
    pub fn sweep_invalid_ids<R>(&mut self, registry: &R, policy: UnregisteredPolicy) -> Result<()>
        where R: BlockRegistry + ?Sized {

        self.non_empty_count = 0;
        self.ticking_count = 0;

        let mut non_empty_count = 0;
        let mut ticking_count = 0;
        for index in 0..SECTION_BLOCK_COUNT {
            let id = self.block_ids[index];
            if id == 0 {
                continue;
            }

            match registry.block(id) {
                Some(info) => {
                    if !info.air {
                        non_empty_count += 1;
                        if info.ticks_randomly {
                            ticking_count += 1;
                        }
                    }
                }
                None => match policy {
                    UnregisteredPolicy::Remove => {
                        self.block_ids[index] = 0;
                        self.write_through(index, |slot, (x, y, z)| slot.set_block_id(x, y, z, 0));
                    }
                    UnregisteredPolicy::Keep => {}
                    UnregisteredPolicy::Raise => return Err(Error::UnregisteredBlock { id, index })
                }
            }
        }

        self.non_empty_count = non_empty_count;
        self.ticking_count = ticking_count;
        Ok(())
    }

    /// Number of non-air blocks as of the last sweep
    pub fn non_empty_count(&self) -> u32 {
        self.non_empty_count
    }

    /// Number of randomly ticking blocks as of the last sweep
    pub fn ticking_count(&self) -> u32 {
        self.ticking_count
    }

    pub fn is_empty(&self) -> bool {
        self.non_empty_count == 0
    }

    pub fn block_ids(&self) -> &[u16; SECTION_BLOCK_COUNT] {
        &self.block_ids
    }

    pub fn block_metas(&self) -> &[u16; SECTION_BLOCK_COUNT] {
        &self.block_metas
    }

    pub fn block_light_array(&self) -> &[u8; NIBBLE_ARRAY_LEN] {
        &self.block_light
    }

    pub fn sky_light_array(&self) -> &[u8; NIBBLE_ARRAY_LEN] {
        &self.block_sky_light
    }

    // Bulk writes through these don't reach the mirror, call `sync_to_mirror` afterwards

    pub fn block_ids_mut(&mut self) -> &mut [u16; SECTION_BLOCK_COUNT] {
        &mut self.block_ids
    }

    pub fn block_metas_mut(&mut self) -> &mut [u16; SECTION_BLOCK_COUNT] {
        &mut self.block_metas
    }

    pub fn block_light_array_mut(&mut self) -> &mut [u8; NIBBLE_ARRAY_LEN] {
        &mut self.block_light
    }

    pub fn sky_light_array_mut(&mut self) -> &mut [u8; NIBBLE_ARRAY_LEN] {
        &mut self.block_sky_light
    }

    /// Starts mirroring changes into `slot`. Its capabilities are resolved once, here.
    /// The slot isn't synced, call `sync_to_mirror` or `sync_from_mirror` depending on which side is current.
    pub fn attach_mirror(&mut self, slot: SharedSlot) -> Result<()> {
        let sync = {
            let guard = slot.lock().map_err(|_| Error::MirrorUnavailable("mirror lock poisoned"))?;
            MirrorSync::detect(&*guard)?
        };

        self.mirror = Some(Mirror { slot, sync });
        Ok(())
    }

    pub fn detach_mirror(&mut self) -> Option<SharedSlot> {
        self.mirror.take().map(|x| x.slot)
    }

    pub fn mirror(&self) -> Option<&SharedSlot> {
        self.mirror.as_ref().map(|x| &x.slot)
    }

    /// Capabilities of the attached mirror, empty if there is none
    pub fn mirror_capabilities(&self) -> SlotCapabilities {
        self.mirror.as_ref().map_or(SlotCapabilities::empty(), |x| x.sync.capabilities())
    }

    /// Dense push of every cell into the attached mirror
    pub fn sync_to_mirror(&self) -> Result<()> {
        let mirror = self.mirror.as_ref().ok_or(Error::MirrorUnavailable("no mirror attached"))?;
        let mut slot = mirror.slot.lock().map_err(|_| Error::MirrorUnavailable("mirror lock poisoned"))?;
        mirror.sync.push(self, &mut *slot);
        Ok(())
    }

    /// Dense pull of every cell from the attached mirror, used after something wrote to the slot directly
    pub fn sync_from_mirror(&mut self) -> Result<()> {
        let (slot, sync) = match &self.mirror {
            Some(v) => (v.slot.clone(), v.sync),
            None => return Err(Error::MirrorUnavailable("no mirror attached"))
        };

        let guard = slot.lock().map_err(|_| Error::MirrorUnavailable("mirror lock poisoned"))?;
        sync.pull(self, &*guard);
        Ok(())
    }

    fn mirror_has(&self, caps: SlotCapabilities) -> bool {
        self.mirror_capabilities().contains(caps)
    }

    /// Best-effort single cell update of the mirror, never blocks
    fn write_through<F>(&self, index: usize, f: F)
        where F: FnOnce(&mut dyn Slot, (u8, u8, u8)) {

        if let Some(mirror) = &self.mirror {
            match mirror.slot.try_lock() {
                Ok(mut slot) => f(&mut *slot, cell_pos(index)),
                Err(_) => debug!("Mirror unavailable for cell {}, deferring to the next resync", index)
            }
        }
    }
}

impl Default for Section {
    fn default() -> Self {
        Section::new()
    }
}

impl Clone for Section {
    fn clone(&self) -> Self {
        self.deep_copy()
    }
}

/// Compares cell data only
impl PartialEq for Section {
    fn eq(&self, other: &Self) -> bool {
        self.block_ids == other.block_ids
            && self.block_metas == other.block_metas
            && self.block_light == other.block_light
            && self.block_sky_light == other.block_sky_light
    }
}

impl fmt::Debug for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Section")
            .field("non_empty_count", &self.non_empty_count)
            .field("ticking_count", &self.ticking_count)
            .field("max_block_id", &self.block_ids.iter().max())
            .field("mirror", &self.mirror_capabilities())
            .finish()
    }
}
