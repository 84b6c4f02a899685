use std::io::{self, Read, Write};

use mcrw::{MCReadExt, MCWriteExt};

use crate::coord::{ChunkCoord, Coord};
use crate::error::Result;
use crate::storage::chunk::Chunk;

/// Bytes per record on the wire
pub const RECORD_LEN: usize = 5;

/// One changed block, coordinates are column relative
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockChangeRecord {
    pub x: u8,
    pub y: u8,
    pub z: u8,
    pub id: u16,
    pub meta: u8
}

impl BlockChangeRecord {
    #[inline]
    fn position(&self) -> u16 {
        (self.x as u16 & 0x0f) << 12 | (self.z as u16 & 0x0f) << 8 | self.y as u16
    }

    fn write_to<W>(&self, mut buf: W) -> io::Result<()>
        where W: Write {

        buf.write_ushort(self.position())?;
        buf.write_ushort(self.id)?;
        buf.write_ubyte(self.meta)
    }

    fn read_from<R>(mut buf: R) -> io::Result<BlockChangeRecord>
        where R: Read {

        let position = buf.read_ushort()?;
        let id = buf.read_ushort()?;
        let meta = buf.read_ubyte()? & 0x0f;
        Ok(BlockChangeRecord {
            x: (position >> 12) as u8,
            y: position as u8,
            z: (position >> 8 & 0x0f) as u8,
            id,
            meta
        })
    }
}

/// Several block changes inside one chunk with full 16 bit ids
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiBlockChange {
    pub coord: ChunkCoord,
    pub records: Vec<BlockChangeRecord>
}

impl MultiBlockChange {
    /// Reads the current block at every position of `positions` from `chunk`
    pub fn collect(chunk: &Chunk, positions: &[Coord<i32>]) -> Result<MultiBlockChange> {
        let mut records = Vec::with_capacity(positions.len());
        for &pos in positions {
            records.push(BlockChangeRecord {
                x: pos.x as u8,
                y: pos.y as u8,
                z: pos.z as u8,
                id: chunk.data.block(pos)?,
                meta: chunk.data.metadata(pos)? as u8 & 0x0f
            });
        }

        Ok(MultiBlockChange {
            coord: chunk.coord,
            records
        })
    }

    /// Writes every record into `chunk`, attached mirrors see the changes too
    pub fn apply(&self, chunk: &mut Chunk) -> Result<()> {
        for record in &self.records {
            let pos = Coord::new(record.x as i32, record.y as i32, record.z as i32);
            chunk.data.set_block(pos, record.id)?;
            chunk.data.set_metadata(pos, record.meta as u16)?;
        }

        Ok(())
    }

    pub fn write_to<W>(&self, mut buf: W) -> io::Result<()>
        where W: Write {

        if self.records.len() > u16::MAX as usize {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "Too many block changes"));
        }

        buf.write_int(self.coord.x)?;
        buf.write_int(self.coord.z)?;
        buf.write_ushort(self.records.len() as u16)?;
        buf.write_int((self.records.len() * RECORD_LEN) as i32)?;
        for record in &self.records {
            record.write_to(&mut buf)?;
        }

        Ok(())
    }

    pub fn read_from<R>(mut buf: R) -> io::Result<MultiBlockChange>
        where R: Read {

        let x = buf.read_int()?;
        let z = buf.read_int()?;
        let count = buf.read_ushort()? as usize;
        let length = buf.read_int()?;
        if length < 0 || length as usize != count * RECORD_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "Block change length doesn't match the record count"));
        }

        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            records.push(BlockChangeRecord::read_from(&mut buf)?);
        }

        Ok(MultiBlockChange {
            coord: ChunkCoord::new(x, z),
            records
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::mirror::Slot;
    use crate::mirror::heap_slot::HeapSlot;

    #[test]
    fn record_layout() {
        let change = MultiBlockChange {
            coord: ChunkCoord::new(1, 2),
            records: vec![BlockChangeRecord { x: 15, y: 200, z: 3, id: 0xabcd, meta: 7 }]
        };

        let mut buf = Vec::new();
        change.write_to(&mut buf).unwrap();
        assert_eq!(buf.len(), 4 + 4 + 2 + 4 + RECORD_LEN);
        assert_eq!(&buf[14..], &[0xf3, 200, 0xab, 0xcd, 7]);

        assert_eq!(MultiBlockChange::read_from(&buf[..]).unwrap(), change);
    }

    #[test]
    fn meta_keeps_low_bits() {
        let buf = [0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 5, 0x10, 0x01, 0x12, 0x34, 0xf9];
        let change = MultiBlockChange::read_from(&buf[..]).unwrap();
        assert_eq!(change.records[0], BlockChangeRecord { x: 1, y: 1, z: 0, id: 0x1234, meta: 9 });
    }

    #[test]
    fn length_must_match() {
        let buf = [0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 4, 0, 0, 0, 0, 0];
        assert!(MultiBlockChange::read_from(&buf[..]).is_err());
    }

    #[test]
    fn apply_writes_through() {
        let mut source = Chunk::new(ChunkCoord::new(0, 0));
        source.data.set_block(Coord::new(2, 70, 9), 40000).unwrap();
        source.data.set_metadata(Coord::new(2, 70, 9), 3).unwrap();
        let change = MultiBlockChange::collect(&source, &[Coord::new(2, 70, 9)]).unwrap();

        let slot = Arc::new(Mutex::new(HeapSlot::new()));
        let mut target = Chunk::new(ChunkCoord::new(0, 0));
        target.data.get_or_create_section(4).unwrap().attach_mirror(slot.clone()).unwrap();

        change.apply(&mut target).unwrap();
        assert_eq!(target.data.block(Coord::new(2, 70, 9)).unwrap(), 40000);
        assert_eq!(target.data.metadata(Coord::new(2, 70, 9)).unwrap(), 3);
        assert_eq!(slot.lock().unwrap().block_id(2, 6, 9), 40000);
    }
}
