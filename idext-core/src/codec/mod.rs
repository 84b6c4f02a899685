//! Conversions between `Section` and its byte formats

pub mod canonical;
pub mod vanilla;

use crate::error::{Error, Result};

/// Takes the first `N` bytes of `bytes`, fails if there are fewer
pub(crate) fn fixed<'a, const N: usize>(field: &'static str, bytes: &'a [u8]) -> Result<&'a [u8; N]> {
    bytes.get(..N)
        .and_then(|x| x.try_into().ok())
        .ok_or_else(|| Error::size_mismatch(field, N, bytes.len()))
}
