//! Block storage with 16 bit block ids for a voxel world split into 16^3 sections,
//! with conversions to and from the legacy 12 bit format.

pub mod blocks;
pub mod codec;
pub mod config;
pub mod coord;
pub mod error;
pub mod mirror;
pub mod nibble;
pub mod protocol;
pub mod storage;

pub use crate::config::Config;
pub use crate::error::{Error, Result, SectionFailure};
pub use crate::storage::chunk::{
    AREA, HEIGHT, LEGACY_MAX_BLOCK_ID, NIBBLE_ARRAY_LEN, SECTION_BLOCK_COUNT, SECTION_COUNT, WIDTH
};
pub use crate::storage::chunk::section::{Section, ZeroFill};
