//! Primitive little-endian reads and writes.
//!
//! Besides fixed width numbers, the format stores strings as a byte count encoded seven bits at a
//! time (least significant group first, high bit set while more bytes follow) and then the UTF-8
//! bytes themselves.

use binrw::BinResult;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::error::{Error, Result};

/// A 32 bit value never needs more than five 7-bit groups
const MAX_7BIT_GROUPS: usize = 5;

/// Read a 7-bit encoded unsigned integer
pub fn read_7bit_encoded_int<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut value = 0u32;
    for group in 0..MAX_7BIT_GROUPS {
        let byte = reader.read_u8()?;
        if group == MAX_7BIT_GROUPS - 1 && byte > 0x0F {
            break;
        }

        value |= u32::from(byte & 0x7F) << (7 * group);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }

    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        "7-bit encoded integer does not fit in 32 bits",
    ))
}

/// Write a 7-bit encoded unsigned integer
pub fn write_7bit_encoded_int<W: Write>(writer: &mut W, mut value: u32) -> io::Result<()> {
    while value >= 0x80 {
        writer.write_u8((value as u8) | 0x80)?;
        value >>= 7;
    }
    writer.write_u8(value as u8)
}

/// Number of bytes [`write_string`] produces for `value`
pub fn string_size(value: &str) -> u64 {
    let mut len = value.len() as u64;
    let mut prefix = 1;
    while len >= 0x80 {
        prefix += 1;
        len >>= 7;
    }
    prefix + value.len() as u64
}

/// Read a length prefixed UTF-8 string
pub fn read_string<R: Read>(reader: &mut R) -> io::Result<String> {
    let len = read_7bit_encoded_int(reader)? as u64;

    // Don't trust the prefix for the allocation, a corrupt length would otherwise reserve gigabytes
    let mut buffer = Vec::new();
    reader.take(len).read_to_end(&mut buffer)?;
    if (buffer.len() as u64) < len {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }

    String::from_utf8(buffer).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write a length prefixed UTF-8 string
pub fn write_string<W: Write>(writer: &mut W, value: &str) -> io::Result<()> {
    let len = u32::try_from(value.len())
        .ok()
        .filter(|len| *len <= i32::MAX as u32)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "string is too long"))?;

    write_7bit_encoded_int(writer, len)?;
    writer.write_all(value.as_bytes())
}

/// [`binrw`] adapter for [`read_string`]
#[binrw::parser(reader)]
pub fn parse_var_string() -> BinResult<String> {
    Ok(read_string(reader)?)
}

/// [`binrw`] adapter for [`write_string`]
#[binrw::writer(writer)]
pub fn write_var_string(value: &String) -> BinResult<()> {
    Ok(write_string(writer, value)?)
}

fn map_eof(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => Error::UnexpectedEndOfStream,
        _ => Error::IOError(err),
    }
}

/// Sequential little-endian reader
///
/// Whether the underlying stream is owned is decided by the caller: [`ByteReader::new`] takes the
/// stream and drops it together with the reader, [`ByteReader::borrowed`] only holds a mutable
/// borrow and leaves the stream usable once the reader is gone.
///
/// ```
/// # fn doit() -> tmod_archive::error::Result<()> {
/// use tmod_archive::binary::ByteReader;
///
/// let mut stream = std::io::Cursor::new(vec![0x05, b'h', b'e', b'l', b'l', b'o', 0x2A]);
/// {
///     let mut reader = ByteReader::borrowed(&mut stream);
///     assert_eq!(reader.read_string()?, "hello");
/// }
/// assert_eq!(stream.position(), 6);
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
#[derive(Debug)]
pub struct ByteReader<R> {
    inner: R,
}

impl<R: Read> ByteReader<R> {
    /// Take ownership of `inner`
    pub fn new(inner: R) -> Self {
        ByteReader { inner }
    }

    /// Unwrap and return the inner reader object
    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.inner.read_u8().map_err(map_eof)
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        self.inner.read_i8().map_err(map_eof)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.inner.read_u16::<LittleEndian>().map_err(map_eof)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        self.inner.read_i16::<LittleEndian>().map_err(map_eof)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.inner.read_u32::<LittleEndian>().map_err(map_eof)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        self.inner.read_i32::<LittleEndian>().map_err(map_eof)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        self.inner.read_u64::<LittleEndian>().map_err(map_eof)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        self.inner.read_i64::<LittleEndian>().map_err(map_eof)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        self.inner.read_f32::<LittleEndian>().map_err(map_eof)
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.inner.read_f64::<LittleEndian>().map_err(map_eof)
    }

    /// Read exactly `count` bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        (&mut self.inner)
            .take(count as u64)
            .read_to_end(&mut buffer)?;
        if buffer.len() < count {
            return Err(Error::UnexpectedEndOfStream);
        }
        Ok(buffer)
    }

    pub fn read_7bit_encoded_int(&mut self) -> Result<u32> {
        read_7bit_encoded_int(&mut self.inner).map_err(map_eof)
    }

    pub fn read_string(&mut self) -> Result<String> {
        read_string(&mut self.inner).map_err(map_eof)
    }
}

impl<'a, R: Read> ByteReader<&'a mut R> {
    /// Borrow `inner` for the lifetime of the reader
    pub fn borrowed(inner: &'a mut R) -> Self {
        ByteReader { inner }
    }
}

/// Sequential little-endian writer, the inverse of [`ByteReader`]
#[derive(Debug)]
pub struct ByteWriter<W> {
    inner: W,
}

impl<W: Write> ByteWriter<W> {
    /// Take ownership of `inner`
    pub fn new(inner: W) -> Self {
        ByteWriter { inner }
    }

    /// Unwrap and return the inner writer object
    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        Ok(self.inner.write_u8(value)?)
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        Ok(self.inner.write_i8(value)?)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        Ok(self.inner.write_u16::<LittleEndian>(value)?)
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        Ok(self.inner.write_i16::<LittleEndian>(value)?)
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        Ok(self.inner.write_u32::<LittleEndian>(value)?)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        Ok(self.inner.write_i32::<LittleEndian>(value)?)
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        Ok(self.inner.write_u64::<LittleEndian>(value)?)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        Ok(self.inner.write_i64::<LittleEndian>(value)?)
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        Ok(self.inner.write_f32::<LittleEndian>(value)?)
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        Ok(self.inner.write_f64::<LittleEndian>(value)?)
    }

    pub fn write_bytes(&mut self, value: &[u8]) -> Result<()> {
        Ok(self.inner.write_all(value)?)
    }

    pub fn write_7bit_encoded_int(&mut self, value: u32) -> Result<()> {
        Ok(write_7bit_encoded_int(&mut self.inner, value)?)
    }

    pub fn write_string(&mut self, value: &str) -> Result<()> {
        Ok(write_string(&mut self.inner, value)?)
    }
}

impl<'a, W: Write> ByteWriter<&'a mut W> {
    /// Borrow `inner` for the lifetime of the writer
    pub fn borrowed(inner: &'a mut W) -> Self {
        ByteWriter { inner }
    }
}
