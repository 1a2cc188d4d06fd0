use crate::jvm::Error;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Result;

/// Utility trait for serializing data inside class files
///
/// Java class files have some peculiarities that make it useful to define an extra trait (instead
/// of just using `serde`):
///
///   - tags are always `u8`
///   - when serializing a sequence, the length of the sequence is usually `u16`
///
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;

    /// Serialize construct into a fresh byte vector
    ///
    /// Writing to memory only fails if the construct cannot be encoded.
    fn to_bytes(&self) -> std::result::Result<Vec<u8>, Error> {
        let mut bytes = vec![];
        self.serialize(&mut bytes)
            .map_err(|err| Error::UnsupportedConstruct(err.to_string()))?;
        Ok(bytes)
    }
}

/// Counterpart of [`Serialize`]
///
/// Running out of input is reported as [`Error::MalformedInput`], never as an IO error, since the
/// input is always an in-memory buffer.
pub trait Deserialize: Sized {
    /// Deserialize construct from a binary input stream
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error>;

    /// Deserialize from a byte slice, requiring that all of the bytes get used
    fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, Error> {
        let mut reader = bytes;
        let value = Self::deserialize(&mut reader)?;
        if reader.is_empty() {
            Ok(value)
        } else {
            Err(Error::MalformedInput(format!(
                "{} trailing bytes after structure",
                reader.len()
            )))
        }
    }
}

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Serialize for u16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(*self)
    }
}

impl Serialize for u32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(*self)
    }
}

impl Serialize for i32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i32::<BigEndian>(*self)
    }
}

impl Serialize for i64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i64::<BigEndian>(*self)
    }
}

impl Serialize for f32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_f32::<BigEndian>(*self)
    }
}

impl Serialize for f64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_f64::<BigEndian>(*self)
    }
}

/// Size in `u16` is the first thing serialized/deserialized
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        serialize_len::<u16, W>(self.len(), writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}

impl Deserialize for u8 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        reader.read_u8().map_err(Error::from_read)
    }
}

impl Deserialize for u16 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        reader.read_u16::<BigEndian>().map_err(Error::from_read)
    }
}

impl Deserialize for u32 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        reader.read_u32::<BigEndian>().map_err(Error::from_read)
    }
}

impl Deserialize for i32 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        reader.read_i32::<BigEndian>().map_err(Error::from_read)
    }
}

impl Deserialize for i64 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        reader.read_i64::<BigEndian>().map_err(Error::from_read)
    }
}

impl Deserialize for f32 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        reader.read_f32::<BigEndian>().map_err(Error::from_read)
    }
}

impl Deserialize for f64 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        reader.read_f64::<BigEndian>().map_err(Error::from_read)
    }
}

impl<A: Deserialize> Deserialize for Vec<A> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let len = u16::deserialize(reader)?;
        let mut elems = Vec::with_capacity(len as usize);
        for _ in 0..len {
            elems.push(A::deserialize(reader)?);
        }
        Ok(elems)
    }
}

/// Write a length prefix, failing if the length does not fit in `L`
pub fn serialize_len<L, W>(len: usize, writer: &mut W) -> Result<()>
where
    L: TryFrom<usize> + Serialize,
    W: WriteBytesExt,
{
    match L::try_from(len) {
        Ok(prefix) => prefix.serialize(writer),
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "{} entries do not fit in a {}-byte length prefix",
                len,
                std::mem::size_of::<L>()
            ),
        )),
    }
}

/// Read exactly `len` raw bytes
pub fn read_bytes<R: ReadBytesExt>(reader: &mut R, len: usize) -> std::result::Result<Vec<u8>, Error> {
    let mut bytes = vec![0; len];
    reader.read_exact(&mut bytes).map_err(Error::from_read)?;
    Ok(bytes)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn vectors_are_length_prefixed() {
        let elems: Vec<u16> = vec![1, 0x203, 0xFFFF];
        assert_eq!(elems.to_bytes().unwrap(), vec![0, 3, 0, 1, 2, 3, 0xFF, 0xFF]);
        assert_eq!(Vec::<u16>::from_bytes(&elems.to_bytes().unwrap()).unwrap(), elems);
    }

    #[test]
    fn vector_length_limit() {
        let longest: Vec<u8> = vec![7; u16::MAX as usize];
        let bytes = longest.to_bytes().unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xFF]);
        assert_eq!(bytes.len(), 2 + u16::MAX as usize);

        let too_long: Vec<u8> = vec![7; u16::MAX as usize + 1];
        match too_long.to_bytes() {
            Err(Error::UnsupportedConstruct(_)) => (),
            other => panic!("expected unsupported construct, got {:?}", other),
        }
    }

    #[test]
    fn narrow_length_prefix() {
        let mut bytes = vec![];
        serialize_len::<u8, _>(255, &mut bytes).unwrap();
        assert_eq!(bytes, vec![0xFF]);
        let err = serialize_len::<u8, _>(256, &mut bytes).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
        assert_eq!(bytes, vec![0xFF]);
    }

    #[test]
    fn truncated_input_is_malformed() {
        match u32::from_bytes(&[0, 1, 2]) {
            Err(Error::MalformedInput(_)) => (),
            other => panic!("expected malformed input, got {:?}", other),
        }
    }

    #[test]
    fn trailing_input_is_malformed() {
        match u16::from_bytes(&[0, 1, 2]) {
            Err(Error::MalformedInput(_)) => (),
            other => panic!("expected malformed input, got {:?}", other),
        }
    }
}
