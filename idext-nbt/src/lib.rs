mod tag;

use std::io::{Error, ErrorKind, Read, Result, Write};

use mcrw::{MCReadExt, MCWriteExt};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

pub use tag::{Compound, Tag};

/// Maximum nesting of lists and compounds accepted by the reader
pub const MAX_DEPTH: usize = 512;

/// Maximum element count of a single array or list accepted by the reader
pub const MAX_LEN: usize = 16 * 1024 * 1024;

#[repr(u8)]
#[derive(Copy, Clone, Debug, FromPrimitive, PartialEq, Eq)]
pub enum TagType {
    End = 0,
    Byte = 1,
    Short = 2,
    Int = 3,
    Long = 4,
    Float = 5,
    Double = 6,
    ByteArray = 7,
    String = 8,
    List = 9,
    Compound = 10,
    IntArray = 11
}

pub trait NBTRead: Read {
    fn read_tag(&mut self) -> Result<(TagType, String)> {
        let tag_type = read_tag_type(self)?;
        if tag_type == TagType::End {
            return Ok((tag_type, String::new()));
        }

        let name = self.read_nbt_string()?;

        Ok((tag_type, name))
    }

    fn read_nbt_string(&mut self) -> Result<String> {
        let len = self.read_ushort()?;
        if len == 0 {
            return Ok(String::new());
        }

        let mut bytes = vec![0; len as usize];
        self.read_exact(&mut bytes)?;
        String::from_utf8(bytes).map_err(|_| Error::new(ErrorKind::InvalidInput, "Couldn't create string"))
    }

    fn read_payload(&mut self, tag_type: TagType) -> Result<Tag> {
        read_payload(self, tag_type, 0)
    }

    /// Reads a complete record, which is always a named compound
    fn read_root(&mut self) -> Result<(String, Compound)> {
        let (tag_type, name) = self.read_tag()?;
        if tag_type != TagType::Compound {
            return Err(Error::new(ErrorKind::InvalidData, "Root tag is not a compound"));
        }

        Ok((name, read_compound(self, 0)?))
    }
}

impl<R: Read + ?Sized> NBTRead for R {}

pub trait NBTWrite: Write {
    fn write_tag(&mut self, tag_type: TagType, name: &str) -> Result<()> {
        self.write_ubyte(tag_type as u8)?;
        self.write_nbt_string(name)
    }

    fn write_nbt_string(&mut self, value: &str) -> Result<()> {
        if value.len() > u16::MAX as usize {
            return Err(Error::new(ErrorKind::InvalidInput, "String too long"));
        }

        self.write_ushort(value.len() as u16)?;
        self.write_all(value.as_bytes())
    }

    fn write_payload(&mut self, tag: &Tag) -> Result<()> {
        match tag {
            Tag::Byte(v) => self.write_ubyte(*v as u8),
            Tag::Short(v) => self.write_ushort(*v as u16),
            Tag::Int(v) => self.write_int(*v),
            Tag::Long(v) => self.write_long(*v),
            Tag::Float(v) => self.write_float(*v),
            Tag::Double(v) => self.write_double(*v),
            Tag::ByteArray(v) => {
                write_len(self, v.len())?;
                self.write_all(v)
            }
            Tag::String(v) => self.write_nbt_string(v),
            Tag::List(elem_type, items) => {
                if items.iter().any(|x| x.tag_type() != *elem_type) {
                    return Err(Error::new(ErrorKind::InvalidInput, "List element type mismatch"));
                }

                self.write_ubyte(*elem_type as u8)?;
                write_len(self, items.len())?;
                for item in items {
                    self.write_payload(item)?;
                }

                Ok(())
            }
            Tag::Compound(v) => {
                for (name, tag) in v.iter() {
                    self.write_tag(tag.tag_type(), name)?;
                    self.write_payload(tag)?;
                }

                self.write_ubyte(TagType::End as u8)
            }
            Tag::IntArray(v) => {
                write_len(self, v.len())?;
                for &i in v {
                    self.write_int(i)?;
                }

                Ok(())
            }
        }
    }

    fn write_root(&mut self, name: &str, root: &Compound) -> Result<()> {
        self.write_tag(TagType::Compound, name)?;
        for (name, tag) in root.iter() {
            self.write_tag(tag.tag_type(), name)?;
            self.write_payload(tag)?;
        }

        self.write_ubyte(TagType::End as u8)
    }
}

impl<W: Write + ?Sized> NBTWrite for W {}

fn write_len<W: Write + ?Sized>(w: &mut W, len: usize) -> Result<()> {
    if len > i32::MAX as usize {
        return Err(Error::new(ErrorKind::InvalidInput, "Array too long"));
    }

    w.write_int(len as i32)
}

fn read_len<R: Read + ?Sized>(r: &mut R) -> Result<usize> {
    let len = r.read_int()?;
    if len < 0 || len as usize > MAX_LEN {
        return Err(Error::new(ErrorKind::InvalidData, "Invalid array length"));
    }

    Ok(len as usize)
}

fn read_tag_type<R: Read + ?Sized>(r: &mut R) -> Result<TagType> {
    TagType::from_u8(r.read_ubyte()?).ok_or_else(|| Error::new(ErrorKind::InvalidInput, "Unknown Tag Type"))
}

fn read_compound<R: Read + ?Sized>(r: &mut R, depth: usize) -> Result<Compound> {
    let mut compound = Compound::new();
    loop {
        let (tag_type, name) = r.read_tag()?;
        if tag_type == TagType::End {
            return Ok(compound);
        }

        let tag = read_payload(r, tag_type, depth + 1)?;
        compound.insert(name, tag);
    }
}

fn read_payload<R: Read + ?Sized>(r: &mut R, tag_type: TagType, depth: usize) -> Result<Tag> {
    if depth > MAX_DEPTH {
        return Err(Error::new(ErrorKind::InvalidData, "Nesting too deep"));
    }

    Ok(match tag_type {
        TagType::End => return Err(Error::new(ErrorKind::InvalidData, "Unexpected end tag")),
        TagType::Byte => Tag::Byte(r.read_ubyte()? as i8),
        TagType::Short => Tag::Short(r.read_ushort()? as i16),
        TagType::Int => Tag::Int(r.read_int()?),
        TagType::Long => Tag::Long(r.read_long()?),
        TagType::Float => Tag::Float(r.read_float()?),
        TagType::Double => Tag::Double(r.read_double()?),
        TagType::ByteArray => {
            let len = read_len(r)?;
            let mut bytes = vec![0u8; len];
            r.read_exact(&mut bytes)?;
            Tag::ByteArray(bytes)
        }
        TagType::String => Tag::String(r.read_nbt_string()?),
        TagType::List => {
            let elem_type = read_tag_type(r)?;
            let len = read_len(r)?;
            if elem_type == TagType::End && len != 0 {
                return Err(Error::new(ErrorKind::InvalidData, "Non-empty list of end tags"));
            }

            // Don't trust the declared length for the allocation
            let mut items = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                items.push(read_payload(r, elem_type, depth + 1)?);
            }

            Tag::List(elem_type, items)
        }
        TagType::Compound => Tag::Compound(read_compound(r, depth)?),
        TagType::IntArray => {
            let len = read_len(r)?;
            let mut ints = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                ints.push(r.read_int()?);
            }

            Tag::IntArray(ints)
        }
    })
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;

    fn level() -> Compound {
        let mut section = Compound::new();
        section.insert("Y", Tag::Byte(3));
        section.insert("Blocks", Tag::ByteArray(vec![7; 4096]));

        let mut level = Compound::new();
        level.insert("xPos", Tag::Int(-12));
        level.insert("zPos", Tag::Int(40));
        level.insert("LastUpdate", Tag::Long(1 << 40));
        level.insert("Sections", Tag::List(TagType::Compound, vec![Tag::Compound(section)]));
        level.insert("HeightMap", Tag::IntArray(vec![64; 256]));
        level.insert("Name", Tag::String("overworld".to_owned()));
        level
    }

    #[test]
    fn read_back_written_record() {
        let mut root = Compound::new();
        root.insert("Level", Tag::Compound(level()));

        let mut buf = Vec::new();
        buf.write_root("", &root).unwrap();

        let (name, read) = buf.as_slice().read_root().unwrap();
        assert_eq!(name, "");
        assert_eq!(read, root);
    }

    #[test]
    fn byte_array_layout() {
        let mut buf = Vec::new();
        buf.write_tag(TagType::ByteArray, "Add").unwrap();
        buf.write_payload(&Tag::ByteArray(vec![1, 2])).unwrap();

        assert_eq!(buf, [7, 0, 3, b'A', b'd', b'd', 0, 0, 0, 2, 1, 2]);
    }

    #[test]
    fn insert_replaces_existing() {
        let mut c = Compound::new();
        c.insert("Data", Tag::Byte(1));
        c.insert("Blocks", Tag::Byte(2));
        c.insert("Data", Tag::Byte(3));

        assert_eq!(c.len(), 2);
        assert_eq!(c.get("Data"), Some(&Tag::Byte(3)));
        assert_eq!(c.iter().next().map(|(n, _)| n), Some("Data"));
    }

    #[test]
    fn reject_mixed_list() {
        let tag = Tag::List(TagType::Byte, vec![Tag::Byte(1), Tag::Int(2)]);
        let mut buf = Vec::new();
        assert_eq!(buf.write_payload(&tag).unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn reject_negative_length() {
        let data = [7u8, 0, 1, b'B', 0xff, 0xff, 0xff, 0xff];
        let mut compound = vec![10u8, 0, 0];
        compound.extend_from_slice(&data);
        assert_eq!(compound.as_slice().read_root().unwrap_err().kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn reject_deep_nesting() {
        let mut data = vec![10u8, 0, 0];
        for _ in 0..(MAX_DEPTH + 2) {
            data.extend_from_slice(&[10, 0, 0]);
        }

        assert!(data.as_slice().read_root().is_err());
    }

    #[test]
    fn reject_non_compound_root() {
        let data = [1u8, 0, 0, 5];
        assert_eq!(data.as_slice().read_root().unwrap_err().kind(), ErrorKind::InvalidData);
    }

    #[quickcheck]
    fn arbitrary_bytes_never_panic(data: Vec<u8>) -> bool {
        let _ = data.as_slice().read_root();
        true
    }

    #[quickcheck]
    fn byte_arrays_survive(bytes: Vec<u8>, name: String) -> bool {
        if name.len() > u16::MAX as usize {
            return true;
        }

        let mut root = Compound::new();
        root.insert(name.clone(), Tag::ByteArray(bytes));

        let mut buf = Vec::new();
        buf.write_root("root", &root).unwrap();
        buf.as_slice().read_root().unwrap() == ("root".to_owned(), root)
    }
}
