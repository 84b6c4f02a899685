//! Arrays of 4 bit values, two per byte, even index in the low nibble

#[inline]
pub fn get(arr: &[u8], index: usize) -> u8 {
    arr[index / 2] >> ((index & 1) * 4) & 0x0f
}

#[inline]
pub fn set(arr: &mut [u8], index: usize, value: u8) {
    arr[index / 2] = (arr[index / 2] & (0xf0 >> ((index & 1) * 4)))
                        | (value & 0x0f) << ((index & 1) * 4)
}

/// Packs the low 4 bits of every value, `values.len()` must be `2 * out.len()`
#[inline]
pub fn pack<I>(values: I, out: &mut [u8])
    where I: IntoIterator<Item = u8> {

    let mut values = values.into_iter();
    for b in out.iter_mut() {
        let low = values.next().unwrap_or(0) & 0x0f;
        let high = values.next().unwrap_or(0) & 0x0f;
        *b = high << 4 | low;
    }
}

/// Unpacks every nibble of `arr` in index order
#[inline]
pub fn unpack(arr: &[u8]) -> impl Iterator<Item = u8> + '_ {
    arr.iter().flat_map(|&b| [b & 0x0f, b >> 4])
}
