//! The lossless format: every id and metadata value as a big endian u16

use crate::error::Result;
use crate::storage::chunk::SECTION_BLOCK_COUNT;
use crate::storage::chunk::section::Section;

use super::fixed;

/// Size of one encoded array
pub const CANONICAL_LEN: usize = SECTION_BLOCK_COUNT * 2;

pub fn encode(section: &Section) -> ([u8; CANONICAL_LEN], [u8; CANONICAL_LEN]) {
    (encode_ids(section), encode_metas(section))
}

pub fn encode_ids(section: &Section) -> [u8; CANONICAL_LEN] {
    encode_array(section.block_ids())
}

pub fn encode_metas(section: &Section) -> [u8; CANONICAL_LEN] {
    encode_array(section.block_metas())
}

/// Both buffers are validated before the section is created
pub fn decode(ids: &[u8], metas: &[u8]) -> Result<Section> {
    let ids = fixed::<CANONICAL_LEN>("ids", ids)?;
    let metas = fixed::<CANONICAL_LEN>("metas", metas)?;

    let mut section = Section::new();
    decode_array(ids, section.block_ids_mut());
    decode_array(metas, section.block_metas_mut());
    Ok(section)
}

pub fn decode_ids_into(ids: &[u8], section: &mut Section) -> Result<()> {
    let ids = fixed::<CANONICAL_LEN>("ids", ids)?;
    decode_array(ids, section.block_ids_mut());
    Ok(())
}

pub fn decode_metas_into(metas: &[u8], section: &mut Section) -> Result<()> {
    let metas = fixed::<CANONICAL_LEN>("metas", metas)?;
    decode_array(metas, section.block_metas_mut());
    Ok(())
}

fn encode_array(values: &[u16; SECTION_BLOCK_COUNT]) -> [u8; CANONICAL_LEN] {
    let mut out = [0u8; CANONICAL_LEN];
    for (chunk, v) in out.chunks_exact_mut(2).zip(values.iter()) {
        chunk.copy_from_slice(&v.to_be_bytes());
    }

    out
}

fn decode_array(bytes: &[u8; CANONICAL_LEN], values: &mut [u16; SECTION_BLOCK_COUNT]) {
    for (v, chunk) in values.iter_mut().zip(bytes.chunks_exact(2)) {
        *v = u16::from_be_bytes([chunk[0], chunk[1]]);
    }
}
