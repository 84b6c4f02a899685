pub mod section;

use std::array;
use std::sync::Arc;

use crate::coord::{cell_index, ChunkCoord, Coord};
use crate::error::{Error, Result};
use crate::mirror::SlotAllocator;

use self::section::Section;

pub const HEIGHT: i32 = WIDTH * SECTION_COUNT as i32;
pub const WIDTH: i32 = 16;
pub const AREA: i32 = WIDTH * WIDTH;
pub const SECTION_COUNT: usize = 16;
pub const SECTION_BLOCK_COUNT: usize = (AREA * WIDTH) as usize;
pub const NIBBLE_ARRAY_LEN: usize = SECTION_BLOCK_COUNT / 2;

/// Largest block id the legacy format can hold
pub const LEGACY_MAX_BLOCK_ID: u16 = 0x0fff;

pub struct ChunkColumn {
    pub sections: [Option<Box<Section>>; SECTION_COUNT],
    allocator: Option<Arc<dyn SlotAllocator>>
}

impl ChunkColumn {
    pub fn new() -> Self {
        ChunkColumn {
            sections: array::from_fn(|_| None),
            allocator: None
        }
    }

    /// Every section this column allocates gets a fresh slot from `allocator` as its mirror
    pub fn with_allocator(allocator: Arc<dyn SlotAllocator>) -> Self {
        ChunkColumn {
            sections: array::from_fn(|_| None),
            allocator: Some(allocator)
        }
    }

    pub fn allocator(&self) -> Option<&Arc<dyn SlotAllocator>> {
        self.allocator.as_ref()
    }

    /// Bitmask with 1 for every 16^3 section that is present
    pub fn get_primary_bit_mask(&self) -> u16 {
        let mut bit = 0u16;
        for i in 0..SECTION_COUNT {
            if self.sections[i].is_some() {
                bit |= 1 << i;
            }
        }
        bit
    }

    pub fn get_num_sections(&self) -> usize {
        self.sections.iter().filter(|x| x.is_some()).count()
    }

    pub fn section(&self, y: usize) -> Option<&Section> {
        self.sections.get(y)?.as_deref()
    }

    pub fn section_mut(&mut self, y: usize) -> Option<&mut Section> {
        self.sections.get_mut(y)?.as_deref_mut()
    }

    /// Returns the section at height `y`, allocating an empty one if there is none
    pub fn get_or_create_section(&mut self, y: usize) -> Result<&mut Section> {
        if y >= SECTION_COUNT {
            return Err(Error::IndexOutOfRange { x: 0, y: y as i32 * WIDTH, z: 0 });
        }

        if self.sections[y].is_none() {
            let section = self.new_section()?;
            self.sections[y] = Some(Box::new(section));
        }

        self.section_mut(y).ok_or(Error::IndexOutOfRange { x: 0, y: y as i32 * WIDTH, z: 0 })
    }

    pub fn remove_section(&mut self, y: usize) -> Option<Box<Section>> {
        self.sections.get_mut(y)?.take()
    }

    pub fn block(&self, rel_pos: Coord<i32>) -> Result<u16> {
        let (section, index) = ChunkColumn::get_indices_from_rel_pos(rel_pos)?;

        match &self.sections[section] {
            Some(v) => Ok(v.block_ids()[index]),
            None => Ok(0)
        }
    }

    pub fn set_block(&mut self, rel_pos: Coord<i32>, id: u16) -> Result<()> {
        let (section, _) = ChunkColumn::get_indices_from_rel_pos(rel_pos)?;

        if self.sections[section].is_none() && id == 0 {
            return Ok(());
        }

        self.get_or_create_section(section)?
            .set_block_id(ChunkColumn::section_pos(rel_pos), id)
    }

    pub fn metadata(&self, rel_pos: Coord<i32>) -> Result<u16> {
        let (section, index) = ChunkColumn::get_indices_from_rel_pos(rel_pos)?;

        match &self.sections[section] {
            Some(v) => Ok(v.block_metas()[index]),
            None => Ok(0)
        }
    }

    pub fn set_metadata(&mut self, rel_pos: Coord<i32>, meta: u16) -> Result<()> {
        let (section, _) = ChunkColumn::get_indices_from_rel_pos(rel_pos)?;

        if self.sections[section].is_none() && meta == 0 {
            return Ok(());
        }

        self.get_or_create_section(section)?
            .set_metadata(ChunkColumn::section_pos(rel_pos), meta)
    }

    fn new_section(&self) -> Result<Section> {
        let mut section = Section::new();
        section.sky_light_array_mut().fill(0xff);

        if let Some(allocator) = &self.allocator {
            section.attach_mirror(allocator.allocate_slot())?;
            section.sync_to_mirror()?;
        }

        Ok(section)
    }

    fn get_indices_from_rel_pos(rel_pos: Coord<i32>) -> Result<(usize, usize)> {
        if !Chunk::is_valid_rel_pos(rel_pos) {
            return Err(Error::IndexOutOfRange { x: rel_pos.x, y: rel_pos.y, z: rel_pos.z });
        }

        Ok(((rel_pos.y / WIDTH) as usize,
            cell_index(rel_pos.x as u8, (rel_pos.y % WIDTH) as u8, rel_pos.z as u8)))
    }

    #[inline]
    fn section_pos(rel_pos: Coord<i32>) -> Coord<i32> {
        Coord::new(rel_pos.x, rel_pos.y % WIDTH, rel_pos.z)
    }
}

impl Default for ChunkColumn {
    fn default() -> Self {
        ChunkColumn::new()
    }
}

pub struct Chunk {
    pub coord: ChunkCoord,
    pub data: ChunkColumn,
    pub biome_map: [u8; AREA as usize]
}

impl Chunk {
    pub fn new(coord: ChunkCoord) -> Self {
        Chunk {
            coord,
            data: ChunkColumn::new(),
            biome_map: [0; AREA as usize]
        }
    }

    pub fn with_column(coord: ChunkCoord, data: ChunkColumn) -> Self {
        Chunk {
            coord,
            data,
            biome_map: [0; AREA as usize]
        }
    }

    #[inline]
    pub const fn is_valid_width(x: i32) -> bool {
        x >= 0 && x < WIDTH
    }

    #[inline]
    pub const fn is_valid_height(y: i32) -> bool {
        y >= 0 && y < HEIGHT
    }

    #[inline]
    pub const fn is_valid_rel_pos(rel_pos: Coord<i32>) -> bool {
        Chunk::is_valid_width(rel_pos.x)
            && Chunk::is_valid_height(rel_pos.y)
            && Chunk::is_valid_width(rel_pos.z)
    }
}
