use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use log::*;
use mcrw::{MCReadExt, MCWriteExt};

use crate::blocks::BlockRegistry;
use crate::codec::{canonical, fixed, vanilla};
use crate::codec::canonical::CANONICAL_LEN;
use crate::codec::vanilla::LegacyLayout;
use crate::config::{Config, LegacyRangePolicy, UnregisteredPolicy};
use crate::coord::ChunkCoord;
use crate::error::{Error, Result, SectionFailure};
use crate::mirror::{push_to_mirror, SlotCapabilities};
use crate::storage::chunk::{AREA, Chunk, NIBBLE_ARRAY_LEN, SECTION_BLOCK_COUNT, SECTION_COUNT};
use crate::storage::chunk::section::{Section, ZeroFill};

const BIOME_LEN: usize = AREA as usize;

/// Largest body any layout can produce: 16 interleaved sections with sky light and biomes
pub const MAX_BODY_LEN: usize = SECTION_COUNT * (2 * CANONICAL_LEN + 2 * NIBBLE_ARRAY_LEN) + BIOME_LEN;

/// Upper bound for a zlib stream of `MAX_BODY_LEN` bytes, stored blocks included
const MAX_COMPRESSED_LEN: usize = MAX_BODY_LEN + MAX_BODY_LEN / 1000 + 64;

/// How block data is arranged in a chunk data body
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LayoutVariant {
    /// Per section: 16 bit ids then 16 bit metadata, light for all sections after that
    Interleaved,
    /// Per field: all low bytes, all metadata, all block light, all sky light, then all high nibbles
    Grouped
}

impl LayoutVariant {
    pub fn detect(capabilities: SlotCapabilities) -> LayoutVariant {
        if capabilities.contains(SlotCapabilities::OWN_SERIALIZER) {
            LayoutVariant::Grouped
        }
        else {
            LayoutVariant::Interleaved
        }
    }
}

/// Chunk data packet, `body` is kept uncompressed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkData {
    pub coord: ChunkCoord,
    /// The receiver has no previous state for this chunk, biomes are included
    pub first_sync: bool,
    pub primary_mask: u16,
    /// Sections with high id nibbles, only used by the grouped layout
    pub add_mask: u16,
    pub body: Vec<u8>
}

impl ChunkData {
    pub fn write_to<W>(&self, mut buf: W) -> io::Result<()>
        where W: Write {

        let mut zen = ZlibEncoder::new(Vec::with_capacity(self.body.len() / 4), Compression::default());
        zen.write_all(&self.body)?;
        let comp_buf = zen.finish()?;

        buf.write_int(self.coord.x)?;
        buf.write_int(self.coord.z)?;
        buf.write_bool(self.first_sync)?;
        buf.write_ushort(self.primary_mask)?;
        buf.write_ushort(self.add_mask)?;
        buf.write_int(comp_buf.len() as i32)?;
        buf.write_all(&comp_buf)
    }

    pub fn read_from<R>(mut buf: R) -> io::Result<ChunkData>
        where R: Read {

        let x = buf.read_int()?;
        let z = buf.read_int()?;
        let first_sync = buf.read_bool()?;
        let primary_mask = buf.read_ushort()?;
        let add_mask = buf.read_ushort()?;

        let length = buf.read_int()?;
        if length < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Negative compressed length"));
        }

        if length as usize > MAX_COMPRESSED_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Compressed chunk data too large"));
        }

        let mut comp_buf = Vec::new();
        buf.by_ref().take(length as u64).read_to_end(&mut comp_buf)?;
        if comp_buf.len() != length as usize {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Truncated chunk data"));
        }

        let mut body = Vec::new();
        ZlibDecoder::new(&comp_buf[..])
            .take(MAX_BODY_LEN as u64 + 1)
            .read_to_end(&mut body)?;
        if body.len() > MAX_BODY_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Chunk data body too large"));
        }

        Ok(ChunkData {
            coord: ChunkCoord::new(x, z),
            first_sync,
            primary_mask,
            add_mask,
            body
        })
    }
}

/// Offset of one field of the grouped layout, advanced once per selected section
struct FieldCursor {
    field: &'static str,
    base: usize,
    stride: usize,
    consumed: usize
}

impl FieldCursor {
    fn new(field: &'static str, base: usize, stride: usize) -> Self {
        FieldCursor { field, base, stride, consumed: 0 }
    }

    fn next<'a>(&mut self, body: &'a [u8]) -> Result<&'a [u8]> {
        let start = self.base + self.consumed * self.stride;
        self.consumed += 1;
        body.get(start..start + self.stride)
            .ok_or_else(|| Error::size_mismatch(self.field, start + self.stride, body.len()))
    }
}

/// Builds and reads chunk data bodies in one fixed layout
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkDataCodec {
    variant: LayoutVariant,
    has_sky: bool
}

impl ChunkDataCodec {
    pub fn new(variant: LayoutVariant, has_sky: bool) -> Self {
        ChunkDataCodec { variant, has_sky }
    }

    /// Uses the configured layout, or the one matching `capabilities` if there is none
    pub fn from_config(config: &Config, capabilities: SlotCapabilities) -> Self {
        let variant = config.layout.unwrap_or_else(|| LayoutVariant::detect(capabilities));
        ChunkDataCodec::new(variant, config.has_sky)
    }

    pub fn variant(&self) -> LayoutVariant {
        self.variant
    }

    pub fn has_sky(&self) -> bool {
        self.has_sky
    }

    /// Body bytes per emitted section
    pub fn section_len(&self) -> usize {
        let sky_len = if self.has_sky { NIBBLE_ARRAY_LEN } else { 0 };
        match self.variant {
            LayoutVariant::Interleaved => 2 * CANONICAL_LEN + NIBBLE_ARRAY_LEN + sky_len,
            LayoutVariant::Grouped => SECTION_BLOCK_COUNT + 3 * NIBBLE_ARRAY_LEN + sky_len
        }
    }

    pub fn body_len(&self, sections: usize, first_sync: bool) -> usize {
        sections * self.section_len() + if first_sync { BIOME_LEN } else { 0 }
    }

    /// Builds the packet for the sections of `chunk` selected by `mask`.
    /// Sections the grouped layout can't express are left out and returned next to the packet.
    pub fn encode(&self, chunk: &Chunk, mask: u16, first_sync: bool, policy: LegacyRangePolicy) -> Result<(ChunkData, Vec<SectionFailure>)> {
        let selected: Vec<(usize, &Section)> = chunk.data.sections.iter()
            .enumerate()
            .filter(|&(i, _)| mask & (1 << i) != 0)
            .filter_map(|(i, x)| x.as_deref().map(|x| (i, x)))
            .filter(|(_, x)| !first_sync || !x.is_empty())
            .collect();

        let mut failures = Vec::new();
        let mut data = match self.variant {
            LayoutVariant::Interleaved => self.encode_interleaved(chunk.coord, &selected),
            LayoutVariant::Grouped => self.encode_grouped(chunk.coord, &selected, policy, &mut failures)
        };

        data.first_sync = first_sync;
        if first_sync {
            data.body.extend_from_slice(&chunk.biome_map);
        }

        Ok((data, failures))
    }

    fn encode_interleaved(&self, coord: ChunkCoord, selected: &[(usize, &Section)]) -> ChunkData {
        let mut body = Vec::with_capacity(self.body_len(selected.len(), true));
        let mut primary_mask = 0u16;
        for &(i, section) in selected {
            primary_mask |= 1 << i;
            body.extend_from_slice(&canonical::encode_ids(section));
            body.extend_from_slice(&canonical::encode_metas(section));
        }

        for (_, section) in selected {
            body.extend_from_slice(section.block_light_array());
        }

        if self.has_sky {
            for (_, section) in selected {
                body.extend_from_slice(section.sky_light_array());
            }
        }

        ChunkData {
            coord,
            first_sync: false,
            primary_mask,
            add_mask: 0,
            body
        }
    }

    fn encode_grouped(&self, coord: ChunkCoord, selected: &[(usize, &Section)], policy: LegacyRangePolicy, failures: &mut Vec<SectionFailure>) -> ChunkData {
        let mut layouts = Vec::with_capacity(selected.len());
        for &(i, section) in selected {
            match legacy_layout(section, policy) {
                Ok(v) => layouts.push((i, section, v)),
                Err(error) => {
                    warn!("Leaving section {} of chunk ({}, {}) out of the packet: {}", i, coord.x, coord.z, error);
                    failures.push(SectionFailure { y: i as u8, error });
                }
            }
        }

        let mut body = Vec::with_capacity(self.body_len(layouts.len(), true));
        let mut primary_mask = 0u16;
        let mut add_mask = 0u16;

        for &(i, _, ref layout) in &layouts {
            primary_mask |= 1 << i;
            body.extend_from_slice(&layout.lsb);
        }

        for (_, _, layout) in &layouts {
            body.extend_from_slice(&layout.meta);
        }

        for (_, section, _) in &layouts {
            body.extend_from_slice(section.block_light_array());
        }

        if self.has_sky {
            for (_, section, _) in &layouts {
                body.extend_from_slice(section.sky_light_array());
            }
        }

        for &(i, _, ref layout) in &layouts {
            match &layout.msb {
                Some(msb) => {
                    add_mask |= 1 << i;
                    body.extend_from_slice(msb);
                }
                None => body.extend_from_slice(&[0u8; NIBBLE_ARRAY_LEN])
            }
        }

        ChunkData {
            coord,
            first_sync: false,
            primary_mask,
            add_mask,
            body
        }
    }

    /// Replaces the sections of `chunk` selected by `data.primary_mask`.
    /// Sections that fail their sweep are cleared and reported, the rest are still decoded.
    pub fn decode<R>(&self, data: &ChunkData, chunk: &mut Chunk, registry: &R, policy: UnregisteredPolicy) -> Result<Vec<SectionFailure>>
        where R: BlockRegistry + ?Sized {

        let count = data.primary_mask.count_ones() as usize;
        let expected = self.body_len(count, data.first_sync);
        if data.body.len() != expected {
            return Err(Error::size_mismatch("body", expected, data.body.len()));
        }

        let body = &data.body[..];
        let mut failures = Vec::new();
        match self.variant {
            LayoutVariant::Interleaved => {
                let light_base = count * 2 * CANONICAL_LEN;
                let mut block_light = FieldCursor::new("block_light", light_base, NIBBLE_ARRAY_LEN);
                let mut sky_light = FieldCursor::new("sky_light", light_base + count * NIBBLE_ARRAY_LEN, NIBBLE_ARRAY_LEN);
                let mut blocks = FieldCursor::new("blocks", 0, 2 * CANONICAL_LEN);

                for i in selected_sections(data.primary_mask) {
                    let section = chunk.data.get_or_create_section(i)?;
                    let section_blocks = blocks.next(body)?;
                    canonical::decode_ids_into(&section_blocks[..CANONICAL_LEN], section)?;
                    canonical::decode_metas_into(&section_blocks[CANONICAL_LEN..], section)?;

                    section.block_light_array_mut().copy_from_slice(block_light.next(body)?);
                    if self.has_sky {
                        section.sky_light_array_mut().copy_from_slice(sky_light.next(body)?);
                    }

                    finish_section(i, section, registry, policy, &mut failures);
                }
            }
            LayoutVariant::Grouped => {
                let mut lsb = FieldCursor::new("lsb", 0, SECTION_BLOCK_COUNT);
                let mut meta = FieldCursor::new("meta", count * SECTION_BLOCK_COUNT, NIBBLE_ARRAY_LEN);
                let light_base = count * (SECTION_BLOCK_COUNT + NIBBLE_ARRAY_LEN);
                let mut block_light = FieldCursor::new("block_light", light_base, NIBBLE_ARRAY_LEN);
                let mut sky_light = FieldCursor::new("sky_light", light_base + count * NIBBLE_ARRAY_LEN, NIBBLE_ARRAY_LEN);
                let msb_base = light_base + count * NIBBLE_ARRAY_LEN * if self.has_sky { 2 } else { 1 };
                let mut msb = FieldCursor::new("msb", msb_base, NIBBLE_ARRAY_LEN);

                for i in selected_sections(data.primary_mask) {
                    let section = chunk.data.get_or_create_section(i)?;

                    let section_lsb = fixed::<SECTION_BLOCK_COUNT>("lsb", lsb.next(body)?)?;
                    vanilla::decode_lsb(section_lsb, section.block_ids_mut());

                    // every section has its msb region, only the flagged ones are meaningful
                    let section_msb = fixed::<NIBBLE_ARRAY_LEN>("msb", msb.next(body)?)?;
                    if data.add_mask & (1 << i) != 0 {
                        vanilla::decode_msb(section_msb, section.block_ids_mut());
                    }

                    let section_meta = fixed::<NIBBLE_ARRAY_LEN>("meta", meta.next(body)?)?;
                    vanilla::decode_meta(section_meta, section.block_metas_mut());

                    section.block_light_array_mut().copy_from_slice(block_light.next(body)?);
                    if self.has_sky {
                        section.sky_light_array_mut().copy_from_slice(sky_light.next(body)?);
                    }

                    finish_section(i, section, registry, policy, &mut failures);
                }
            }
        }

        if data.first_sync {
            for i in 0..SECTION_COUNT {
                if data.primary_mask & (1 << i) == 0 {
                    chunk.data.remove_section(i);
                }
            }

            chunk.biome_map.copy_from_slice(&body[body.len() - BIOME_LEN..]);
        }

        Ok(failures)
    }
}

fn selected_sections(mask: u16) -> impl Iterator<Item = usize> {
    (0..SECTION_COUNT).filter(move |&i| mask & (1 << i) != 0)
}

/// Legacy arrays of `section`, read through its slot when the slot serializes itself
fn legacy_layout(section: &Section, policy: LegacyRangePolicy) -> Result<LegacyLayout> {
    if section.mirror_capabilities().contains(SlotCapabilities::BULK_LEGACY) {
        if let Some(slot) = section.mirror() {
            match slot.lock() {
                Ok(mut slot) => {
                    push_to_mirror(section, &mut *slot)?;
                    return slot.copy_legacy(policy);
                }
                Err(_) => debug!("Mirror lock poisoned, encoding from the section arrays")
            }
        }
    }

    vanilla::encode(section, policy)
}

fn finish_section<R>(y: usize, section: &mut Section, registry: &R, policy: UnregisteredPolicy, failures: &mut Vec<SectionFailure>)
    where R: BlockRegistry + ?Sized {

    if let Err(error) = section.sweep_invalid_ids(registry, policy) {
        warn!("Clearing section {}: {}", y, error);
        section.zero_fill(ZeroFill::All);
        failures.push(SectionFailure { y: y as u8, error });
    }

    if section.mirror().is_some() {
        if let Err(e) = section.sync_to_mirror() {
            debug!("Section {} not pushed to its mirror: {}", y, e);
        }
    }
}
