use crate::protocol::chunk_data::LayoutVariant;

/// What to do with a nonzero block id the registry doesn't know
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnregisteredPolicy {
    /// Replace the block with air
    Remove,
    /// Leave the id in place, it doesn't count as a block
    Keep,
    /// Fail the sweep
    Raise
}

/// What to do with a block id above 4095 when writing the legacy format
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LegacyRangePolicy {
    /// Write 4095 instead
    Clamp,
    /// Write air instead
    Drop,
    /// Fail the encode
    Raise
}

impl LegacyRangePolicy {
    /// The legacy id to write for `id`, `None` if the encode must fail
    #[inline]
    pub fn resolve(self, id: u16) -> Option<u16> {
        if id <= crate::LEGACY_MAX_BLOCK_ID {
            return Some(id);
        }

        match self {
            LegacyRangePolicy::Clamp => Some(crate::LEGACY_MAX_BLOCK_ID),
            LegacyRangePolicy::Drop => Some(0),
            LegacyRangePolicy::Raise => None
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Config {
    pub unregistered_policy: UnregisteredPolicy,
    /// Also write Blocks/Add/Data next to the 16 bit tags
    pub legacy_tags: bool,
    pub legacy_range_policy: LegacyRangePolicy,
    /// `None` detects the layout from the mirror's capabilities
    pub layout: Option<LayoutVariant>,
    pub has_sky: bool
}

impl Default for Config {
    fn default() -> Self {
        Config {
            unregistered_policy: UnregisteredPolicy::Keep,
            legacy_tags: true,
            legacy_range_policy: LegacyRangePolicy::Raise,
            layout: None,
            has_sky: true
        }
    }
}
