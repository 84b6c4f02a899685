use std::io;
use std::result;

use thiserror::Error;

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Input buffer doesn't have the fixed size of its format
    #[error("{field}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        field: &'static str,
        expected: usize,
        actual: usize
    },

    /// Block id doesn't fit the target format
    #[error("block id {id} at index {index} is larger than {max}")]
    OutOfRange {
        id: u16,
        index: usize,
        max: u16
    },

    #[error("position ({x}, {y}, {z}) is outside of the section")]
    IndexOutOfRange {
        x: i32,
        y: i32,
        z: i32
    },

    #[error("block id {id} at index {index} is not registered")]
    UnregisteredBlock {
        id: u16,
        index: usize
    },

    /// Never fatal, the section stays authoritative
    #[error("mirror unavailable: {0}")]
    MirrorUnavailable(&'static str),

    #[error("malformed tag '{name}': {reason}")]
    MalformedTag {
        name: String,
        reason: &'static str
    },

    #[error(transparent)]
    Io(#[from] io::Error)
}

impl Error {
    /// Whether the section data is still intact after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::MirrorUnavailable(_))
    }

    pub(crate) fn size_mismatch(field: &'static str, expected: usize, actual: usize) -> Error {
        Error::SizeMismatch { field, expected, actual }
    }
}

/// A section that couldn't be loaded, its siblings are unaffected
#[derive(Debug)]
pub struct SectionFailure {
    /// Section height in the column
    pub y: u8,
    pub error: Error
}
