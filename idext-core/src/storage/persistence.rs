//! Section and chunk records in the NBT format.
//!
//! Block data is always written as `Blocks16`/`Data16`, two big endian bytes per cell.
//! The 12 bit `Blocks`/`Add`/`Data` tags are optionally written next to them for older readers.

use log::*;

use idext_nbt::{Compound, Tag, TagType};

use crate::blocks::BlockRegistry;
use crate::codec::{canonical, fixed, vanilla};
use crate::codec::canonical::CANONICAL_LEN;
use crate::codec::vanilla::LegacyLayout;
use crate::config::Config;
use crate::coord::ChunkCoord;
use crate::error::{Error, Result, SectionFailure};
use crate::mirror::SlotCapabilities;
use crate::storage::chunk::{AREA, Chunk, NIBBLE_ARRAY_LEN, SECTION_BLOCK_COUNT, SECTION_COUNT};
use crate::storage::chunk::section::{Section, ZeroFill};

static EMPTY_NIBBLES: [u8; NIBBLE_ARRAY_LEN] = [0; NIBBLE_ARRAY_LEN];

/// Which side of a mirrored section the save pipeline reads
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Staging {
    /// Records are built from the section arrays only
    Direct,
    /// The host serializes through the slot, so the slot is brought up to date around every record
    ThroughMirror
}

/// A loaded chunk together with the sections that couldn't be loaded
pub struct LoadedChunk {
    pub chunk: Chunk,
    pub failures: Vec<SectionFailure>
}

pub struct PersistenceAdapter<'a, R: BlockRegistry + ?Sized> {
    config: Config,
    registry: &'a R,
    staging: Staging
}

impl<'a, R: BlockRegistry + ?Sized> PersistenceAdapter<'a, R> {
    pub fn new(config: Config, registry: &'a R, staging: Staging) -> Self {
        PersistenceAdapter { config, registry, staging }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn save_section(&self, section: &Section) -> Compound {
        let through_mirror = self.staging == Staging::ThroughMirror && section.mirror().is_some();
        if through_mirror {
            if let Err(e) = section.sync_to_mirror() {
                debug!("Saving from the section arrays: {}", e);
            }
        }

        let mut tag = Compound::new();
        let (ids, metas) = canonical::encode(section);
        tag.insert("Blocks16", Tag::ByteArray(ids.to_vec()));
        tag.insert("Data16", Tag::ByteArray(metas.to_vec()));

        if self.config.legacy_tags {
            let layout = if through_mirror {
                self.legacy_through_mirror(section)
            }
            else {
                vanilla::encode(section, self.config.legacy_range_policy)
            };

            match layout {
                Ok(v) => {
                    tag.insert("Blocks", Tag::ByteArray(v.lsb.to_vec()));
                    if let Some(msb) = v.msb {
                        tag.insert("Add", Tag::ByteArray(msb.to_vec()));
                    }

                    tag.insert("Data", Tag::ByteArray(v.meta.to_vec()));
                }
                Err(e) => warn!("Skipping legacy block tags: {}", e)
            }
        }

        tag.insert("BlockLight", Tag::ByteArray(section.block_light_array().to_vec()));
        if self.config.has_sky {
            tag.insert("SkyLight", Tag::ByteArray(section.sky_light_array().to_vec()));
        }

        tag
    }

    fn legacy_through_mirror(&self, section: &Section) -> Result<LegacyLayout> {
        let policy = self.config.legacy_range_policy;
        if !section.mirror_capabilities().contains(SlotCapabilities::BULK_LEGACY) {
            return vanilla::encode(section, policy);
        }

        match section.mirror().map(|x| x.lock()) {
            Some(Ok(slot)) => slot.copy_legacy(policy),
            _ => vanilla::encode(section, policy)
        }
    }

    pub fn load_section(&self, tag: &Compound) -> Result<Section> {
        let mut section = Section::new();
        self.load_section_into(tag, &mut section)?;
        Ok(section)
    }

    /// Replaces the contents of `section` with the record in `tag`.
    /// Ids and metadata each come from the 16 bit tag if present, else from the legacy tags, else zero.
    /// On failure `section` and its mirror are left as they were.
    pub fn load_section_into(&self, tag: &Compound, section: &mut Section) -> Result<()> {
        let loaded = self.read_section(tag)?;

        if self.staging == Staging::ThroughMirror {
            ingest_legacy(section, tag, &loaded);
        }

        section.replace_cells(loaded);

        if section.mirror().is_some() {
            if let Err(e) = section.sync_to_mirror() {
                debug!("Loaded section not pushed to its mirror: {}", e);
            }
        }

        Ok(())
    }

    /// Decodes and sweeps `tag` into a fresh section.
    /// Legacy tags are only read for the arrays the 16 bit tags don't cover.
    fn read_section(&self, tag: &Compound) -> Result<Section> {
        let mut section = Section::new();

        match byte_array(tag, "Blocks16")? {
            Some(ids) => canonical::decode_ids_into(fixed::<CANONICAL_LEN>("Blocks16", ids)?, &mut section)?,
            None => match byte_array(tag, "Blocks")? {
                Some(lsb) => {
                    vanilla::decode_lsb(fixed::<SECTION_BLOCK_COUNT>("Blocks", lsb)?, section.block_ids_mut());
                    if let Some(msb) = byte_array(tag, "Add")? {
                        vanilla::decode_msb(fixed::<NIBBLE_ARRAY_LEN>("Add", msb)?, section.block_ids_mut());
                    }
                }
                None => debug!("Section record without block ids")
            }
        }

        match byte_array(tag, "Data16")? {
            Some(metas) => canonical::decode_metas_into(fixed::<CANONICAL_LEN>("Data16", metas)?, &mut section)?,
            None => {
                if let Some(data) = byte_array(tag, "Data")? {
                    vanilla::decode_meta(fixed::<NIBBLE_ARRAY_LEN>("Data", data)?, section.block_metas_mut());
                }
            }
        }

        if let Some(block_light) = byte_array(tag, "BlockLight")? {
            *section.block_light_array_mut() = *fixed::<NIBBLE_ARRAY_LEN>("BlockLight", block_light)?;
        }

        if let Some(sky_light) = byte_array(tag, "SkyLight")? {
            *section.sky_light_array_mut() = *fixed::<NIBBLE_ARRAY_LEN>("SkyLight", sky_light)?;
        }

        section.sweep_invalid_ids(self.registry, self.config.unregistered_policy)?;
        Ok(section)
    }

    pub fn save_chunk(&self, chunk: &Chunk) -> Compound {
        let mut sections = Vec::with_capacity(chunk.data.get_num_sections());
        for (y, section) in chunk.data.sections.iter().enumerate() {
            if let Some(section) = section {
                let mut tag = self.save_section(section);
                tag.insert("Y", Tag::Byte(y as i8));
                sections.push(Tag::Compound(tag));
            }
        }

        let mut level = Compound::new();
        level.insert("xPos", Tag::Int(chunk.coord.x));
        level.insert("zPos", Tag::Int(chunk.coord.z));
        level.insert("Sections", Tag::List(TagType::Compound, sections));
        level.insert("Biomes", Tag::ByteArray(chunk.biome_map.to_vec()));

        let mut root = Compound::new();
        root.insert("Level", Tag::Compound(level));
        root
    }

    pub fn load_chunk(&self, root: &Compound) -> Result<LoadedChunk> {
        let level = level(root)?;
        let coord = ChunkCoord::new(int(level, "xPos")?, int(level, "zPos")?);

        let mut chunk = Chunk::new(coord);
        let failures = self.load_chunk_into(root, &mut chunk)?;
        Ok(LoadedChunk { chunk, failures })
    }

    /// Loads every section of the record into `chunk`, sections are allocated through the column.
    /// A section that fails to load is cleared and reported, its siblings still load.
    pub fn load_chunk_into(&self, root: &Compound, chunk: &mut Chunk) -> Result<Vec<SectionFailure>> {
        let level = level(root)?;

        if let Some(biomes) = byte_array(level, "Biomes")? {
            chunk.biome_map = *fixed::<{ AREA as usize }>("Biomes", biomes)?;
        }

        let sections = match level.get("Sections") {
            Some(v) => v.as_list().ok_or_else(|| malformed("Sections", "expected a list"))?,
            None => &[]
        };

        let mut failures = Vec::new();
        for tag in sections {
            let tag = match tag.as_compound() {
                Some(v) => v,
                None => {
                    warn!("Skipping section record that isn't a compound");
                    continue;
                }
            };

            let y = match tag.get("Y").and_then(Tag::as_byte) {
                Some(v) if (v as usize) < SECTION_COUNT && v >= 0 => v as usize,
                other => {
                    warn!("Skipping section record with invalid height {:?}", other);
                    continue;
                }
            };

            let section = chunk.data.get_or_create_section(y)?;
            if let Err(error) = self.load_section_into(tag, section) {
                warn!("Failed to load section {} of chunk ({}, {}): {}", y, chunk.coord.x, chunk.coord.z, error);
                section.zero_fill(ZeroFill::All);
                failures.push(SectionFailure { y: y as u8, error });
            }
        }

        Ok(failures)
    }
}

/// Lets the slot read the legacy tags itself before the canonical data is decoded.
/// Legacy tags the slot can't use are skipped, the record was already loaded without them.
fn ingest_legacy(section: &Section, tag: &Compound, loaded: &Section) {
    if !section.mirror_capabilities().contains(SlotCapabilities::BULK_LEGACY) {
        return;
    }

    let legacy = match legacy_tags(tag) {
        Ok(Some(v)) => v,
        Ok(None) => return,
        Err(e) => {
            debug!("Slot skips malformed legacy tags: {}", e);
            return;
        }
    };

    let sky_light = if tag.contains_key("SkyLight") { Some(&loaded.sky_light_array()[..]) } else { None };
    if let Some(Ok(mut slot)) = section.mirror().map(|x| x.lock()) {
        if let Err(e) = slot.set_legacy(&legacy, loaded.block_light_array(), sky_light) {
            debug!("Slot rejected the legacy tags: {}", e);
        }
    }
}

fn legacy_tags(tag: &Compound) -> Result<Option<LegacyLayout>> {
    let lsb = match byte_array(tag, "Blocks")? {
        Some(v) => v,
        None => return Ok(None)
    };

    let meta = byte_array(tag, "Data")?.unwrap_or(&EMPTY_NIBBLES[..]);
    LegacyLayout::from_slices(lsb, byte_array(tag, "Add")?, meta).map(Some)
}

fn malformed(name: &str, reason: &'static str) -> Error {
    Error::MalformedTag { name: name.to_owned(), reason }
}

fn byte_array<'a>(tag: &'a Compound, name: &str) -> Result<Option<&'a [u8]>> {
    match tag.get(name) {
        Some(v) => v.as_byte_array().map(Some).ok_or_else(|| malformed(name, "expected a byte array")),
        None => Ok(None)
    }
}

fn int(tag: &Compound, name: &str) -> Result<i32> {
    tag.get(name)
        .and_then(Tag::as_int)
        .ok_or_else(|| malformed(name, "expected an int"))
}

fn level(root: &Compound) -> Result<&Compound> {
    root.get("Level")
        .and_then(Tag::as_compound)
        .ok_or_else(|| malformed("Level", "expected a compound"))
}
