use num_traits::Num;

use crate::error::{Error, Result};
use crate::WIDTH;

#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug, Default)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32
}

impl ChunkCoord {
    pub const fn new(x: i32, z: i32) -> Self {
        ChunkCoord { x, z }
    }
}

#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub struct Coord<T: Num + PartialOrd + Copy> {
    pub x: T,
    pub y: T,
    pub z: T
}

impl<T: Num + PartialOrd + Copy> Coord<T> {
    pub fn new(x: T, y: T, z: T) -> Self {
        Coord { x, y, z }
    }
}

/// Index of a cell inside a 16^3 section: `y << 8 | z << 4 | x`
#[inline]
pub const fn cell_index(x: u8, y: u8, z: u8) -> usize {
    (y as usize) << 8 | (z as usize) << 4 | (x as usize)
}

/// Inverse of `cell_index`, returns (x, y, z)
#[inline]
pub const fn cell_pos(index: usize) -> (u8, u8, u8) {
    ((index & 0xf) as u8, (index >> 8 & 0xf) as u8, (index >> 4 & 0xf) as u8)
}

/// Validates a section relative position and returns its cell index
pub fn checked_cell_index(pos: Coord<i32>) -> Result<usize> {
    let valid = |v: i32| v >= 0 && v < WIDTH;
    if !(valid(pos.x) && valid(pos.y) && valid(pos.z)) {
        return Err(Error::IndexOutOfRange { x: pos.x, y: pos.y, z: pos.z });
    }

    Ok(cell_index(pos.x as u8, pos.y as u8, pos.z as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_cell() {
        assert_eq!(checked_cell_index(Coord::new(15, 15, 15)).unwrap(), 4095);
        assert_eq!(cell_pos(4095), (15, 15, 15));
    }

    #[test]
    fn axis_order() {
        assert_eq!(cell_index(1, 0, 0), 1);
        assert_eq!(cell_index(0, 0, 1), 16);
        assert_eq!(cell_index(0, 1, 0), 256);
        assert_eq!(cell_pos(cell_index(3, 9, 14)), (3, 9, 14));
    }

    #[test]
    fn out_of_range() {
        for pos in [Coord::new(16, 0, 0), Coord::new(0, -1, 0), Coord::new(0, 0, 16)] {
            assert!(matches!(checked_cell_index(pos), Err(Error::IndexOutOfRange { .. })));
        }
    }
}
