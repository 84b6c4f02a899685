//! The legacy 12 bit format: a byte array with the low byte of every id,
//! an optional nibble array with bits 8..11, and a nibble array with the metadata.

use crate::config::LegacyRangePolicy;
use crate::error::{Error, Result};
use crate::nibble;
use crate::storage::chunk::{LEGACY_MAX_BLOCK_ID, NIBBLE_ARRAY_LEN, SECTION_BLOCK_COUNT};
use crate::storage::chunk::section::Section;

use super::fixed;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyLayout {
    /// Low byte of every block id
    pub lsb: [u8; SECTION_BLOCK_COUNT],
    /// Bits 8..11 of every block id, only present if any id is above 255
    pub msb: Option<[u8; NIBBLE_ARRAY_LEN]>,
    /// Low 4 bits of every metadata value
    pub meta: [u8; NIBBLE_ARRAY_LEN]
}

impl LegacyLayout {
    /// Validates the sizes of all arrays before copying any of them
    pub fn from_slices(lsb: &[u8], msb: Option<&[u8]>, meta: &[u8]) -> Result<LegacyLayout> {
        let lsb = fixed::<SECTION_BLOCK_COUNT>("lsb", lsb)?;
        let msb = msb.map(|x| fixed::<NIBBLE_ARRAY_LEN>("msb", x)).transpose()?;
        let meta = fixed::<NIBBLE_ARRAY_LEN>("meta", meta)?;

        Ok(LegacyLayout {
            lsb: *lsb,
            msb: msb.copied(),
            meta: *meta
        })
    }

    #[inline]
    pub fn block_id(&self, index: usize) -> u16 {
        let high = match &self.msb {
            Some(msb) => nibble::get(msb, index) as u16,
            None => 0
        };

        self.lsb[index] as u16 | high << 8
    }

    #[inline]
    pub fn metadata(&self, index: usize) -> u8 {
        nibble::get(&self.meta, index)
    }
}

/// Encodes the block ids and metadata of `section`.
/// Ids above 4095 are handled according to `policy`, on failure nothing is returned.
pub fn encode(section: &Section, policy: LegacyRangePolicy) -> Result<LegacyLayout> {
    encode_arrays(section.block_ids(), section.block_metas(), policy)
}

pub(crate) fn encode_arrays(
    ids: &[u16; SECTION_BLOCK_COUNT],
    metas: &[u16; SECTION_BLOCK_COUNT],
    policy: LegacyRangePolicy) -> Result<LegacyLayout> {

    let mut lsb = [0u8; SECTION_BLOCK_COUNT];
    let mut msb: Option<[u8; NIBBLE_ARRAY_LEN]> = None;

    for (index, &id) in ids.iter().enumerate() {
        let id = policy.resolve(id)
            .ok_or(Error::OutOfRange { id, index, max: LEGACY_MAX_BLOCK_ID })?;

        lsb[index] = id as u8;
        if id > 0xff {
            let msb = msb.get_or_insert([0u8; NIBBLE_ARRAY_LEN]);
            nibble::set(msb, index, (id >> 8) as u8);
        }
    }

    let mut meta = [0u8; NIBBLE_ARRAY_LEN];
    nibble::pack(metas.iter().map(|&x| x as u8), &mut meta);

    Ok(LegacyLayout { lsb, msb, meta })
}

pub fn decode(layout: &LegacyLayout) -> Section {
    let mut section = Section::new();
    decode_into(layout, &mut section);
    section
}

/// Overwrites the block ids and metadata of `section`, light is left alone
pub fn decode_into(layout: &LegacyLayout, section: &mut Section) {
    decode_lsb(&layout.lsb, section.block_ids_mut());
    if let Some(msb) = &layout.msb {
        decode_msb(msb, section.block_ids_mut());
    }

    decode_meta(&layout.meta, section.block_metas_mut());
}

/// Replaces every id with its low byte
pub(crate) fn decode_lsb(lsb: &[u8; SECTION_BLOCK_COUNT], ids: &mut [u16; SECTION_BLOCK_COUNT]) {
    for (id, &b) in ids.iter_mut().zip(lsb.iter()) {
        *id = b as u16;
    }
}

/// Adds bits 8..11 to ids that were set by `decode_lsb`
pub(crate) fn decode_msb(msb: &[u8; NIBBLE_ARRAY_LEN], ids: &mut [u16; SECTION_BLOCK_COUNT]) {
    for (id, high) in ids.iter_mut().zip(nibble::unpack(msb)) {
        *id = (*id & 0x00ff) | (high as u16) << 8;
    }
}

pub(crate) fn decode_meta(meta: &[u8; NIBBLE_ARRAY_LEN], metas: &mut [u16; SECTION_BLOCK_COUNT]) {
    for (m, v) in metas.iter_mut().zip(nibble::unpack(meta)) {
        *m = v as u16;
    }
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;
    use crate::coord::Coord;

    #[quickcheck]
    fn decode_inverts_encode(section: Section) -> bool {
        let mut section = section;
        for id in section.block_ids_mut().iter_mut() {
            *id &= LEGACY_MAX_BLOCK_ID;
        }

        for meta in section.block_metas_mut().iter_mut() {
            *meta &= 0x0f;
        }

        let layout = encode(&section, LegacyRangePolicy::Raise).unwrap();
        let decoded = decode(&layout);
        decoded.block_ids() == section.block_ids() && decoded.block_metas() == section.block_metas()
    }

    #[test]
    fn max_legacy_id() {
        let mut section = Section::new();
        section.block_ids_mut().fill(4095);

        let layout = encode(&section, LegacyRangePolicy::Raise).unwrap();
        assert!(layout.lsb.iter().all(|&x| x == 0xff));
        assert!(layout.msb.unwrap().iter().all(|&x| x == 0xff));
    }

    #[test]
    fn no_msb_below_256() {
        let mut section = Section::new();
        section.block_ids_mut().fill(255);

        let layout = encode(&section, LegacyRangePolicy::Raise).unwrap();
        assert!(layout.msb.is_none());
        assert_eq!(decode(&layout).block_ids(), section.block_ids());
    }

    #[test]
    fn msb_nibble_order() {
        let mut section = Section::new();
        section.set_block_id(Coord::new(0, 0, 0), 0x123).unwrap();
        section.set_block_id(Coord::new(1, 0, 0), 0xabc).unwrap();

        let layout = encode(&section, LegacyRangePolicy::Raise).unwrap();
        assert_eq!(layout.lsb[0], 0x23);
        assert_eq!(layout.lsb[1], 0xbc);
        assert_eq!(layout.msb.unwrap()[0], 0xa1);
        assert_eq!(layout.block_id(0), 0x123);
        assert_eq!(layout.block_id(1), 0xabc);
    }

    #[test]
    fn metadata_nibble_order() {
        let mut section = Section::new();
        section.set_metadata(Coord::new(0, 0, 0), 0x5).unwrap();
        section.set_metadata(Coord::new(1, 0, 0), 0x1c).unwrap();

        let layout = encode(&section, LegacyRangePolicy::Raise).unwrap();
        assert_eq!(layout.meta[0], 0xc5);
        assert_eq!(layout.metadata(1), 0xc);
    }

    #[test]
    fn out_of_range_policies() {
        let mut section = Section::new();
        section.set_block_id(Coord::new(15, 15, 15), 4096).unwrap();
        section.set_block_id(Coord::new(0, 0, 0), 7).unwrap();

        let clamped = encode(&section, LegacyRangePolicy::Clamp).unwrap();
        assert_eq!(clamped.block_id(4095), 4095);
        assert_eq!(clamped.block_id(0), 7);

        let dropped = encode(&section, LegacyRangePolicy::Drop).unwrap();
        assert_eq!(dropped.block_id(4095), 0);
        assert!(dropped.msb.is_none());

        match encode(&section, LegacyRangePolicy::Raise) {
            Err(Error::OutOfRange { id: 4096, index: 4095, max: 4095 }) => {}
            other => panic!("unexpected result {:?}", other)
        }
    }

    #[test]
    fn wide_id_never_wraps() {
        let mut section = Section::new();
        // 0x1001 would wrap to 1
        section.block_ids_mut()[10] = 0x1001;

        let layout = encode(&section, LegacyRangePolicy::Clamp).unwrap();
        assert_eq!(layout.block_id(10), 4095);
    }

    #[test]
    fn from_slices_sizes() {
        let lsb = [1u8; 4096];
        let meta = [0u8; 2048];

        assert!(LegacyLayout::from_slices(&lsb, None, &meta).is_ok());
        assert!(matches!(
            LegacyLayout::from_slices(&lsb[..4095], None, &meta),
            Err(Error::SizeMismatch { field: "lsb", expected: 4096, actual: 4095 })));
        assert!(matches!(
            LegacyLayout::from_slices(&lsb, Some(&[0u8; 10]), &meta),
            Err(Error::SizeMismatch { field: "msb", .. })));
        assert!(matches!(
            LegacyLayout::from_slices(&lsb, None, &[]),
            Err(Error::SizeMismatch { field: "meta", .. })));
    }

    #[test]
    fn decode_keeps_light() {
        let mut section = Section::new();
        section.set_block_light(Coord::new(2, 3, 4), 9).unwrap();

        let layout = LegacyLayout::from_slices(&[3u8; 4096], None, &[0x21u8; 2048]).unwrap();
        decode_into(&layout, &mut section);

        assert_eq!(section.block_id(Coord::new(2, 3, 4)).unwrap(), 3);
        assert_eq!(section.metadata(Coord::new(0, 0, 0)).unwrap(), 1);
        assert_eq!(section.metadata(Coord::new(1, 0, 0)).unwrap(), 2);
        assert_eq!(section.block_light(Coord::new(2, 3, 4)).unwrap(), 9);
    }
}
