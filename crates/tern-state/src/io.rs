use std::io::{self, Write};

use crate::error::{Result, StateError};

/// Little-endian helpers for anything implementing [`Write`].
pub trait WriteLeExt: Write {
    fn write_u8(&mut self, v: u8) -> Result<()> {
        self.write_all(&[v])?;
        Ok(())
    }

    fn write_u32_le(&mut self, v: u32) -> Result<()> {
        self.write_all(&v.to_le_bytes())?;
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_all(bytes)?;
        Ok(())
    }

    /// Writes `s` followed by a single NUL terminator.
    fn write_cstr(&mut self, s: &str) -> Result<()> {
        if s.as_bytes().contains(&0) {
            return Err(StateError::Corrupt("string contains an interior NUL"));
        }
        self.write_bytes(s.as_bytes())?;
        self.write_u8(0)
    }
}

impl<T: Write + ?Sized> WriteLeExt for T {}

/// Owned, growable output buffer.
///
/// When a write does not fit, the capacity doubles (repeatedly, if one doubling is not enough).
/// Bytes already written and the write position are preserved across growth.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    fn grow_for(&mut self, additional: usize) -> io::Result<()> {
        let needed = self
            .buf
            .len()
            .checked_add(additional)
            .ok_or_else(|| io::Error::new(io::ErrorKind::OutOfMemory, "writer length overflow"))?;
        if needed <= self.buf.capacity() {
            return Ok(());
        }
        let mut capacity = self.buf.capacity().max(1);
        while capacity < needed {
            capacity = capacity.saturating_mul(2);
        }
        self.buf
            .try_reserve_exact(capacity - self.buf.len())
            .map_err(|_| io::Error::new(io::ErrorKind::OutOfMemory, "writer growth failed"))
    }
}

impl Write for ByteWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.grow_for(data.len())?;
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Non-owning read cursor over a fully loaded buffer.
///
/// Slices handed out by [`ByteReader::read_bytes`] and [`ByteReader::read_cstr`] borrow from the
/// underlying buffer; nothing is copied.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek_u8(&self) -> Result<u8> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or(StateError::Corrupt("unexpected end of data"))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let v = self.peek_u8()?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u32_le(&mut self) -> Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(StateError::Corrupt("truncated byte range"));
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.buf[start..self.pos])
    }

    /// Reads a NUL-terminated UTF-8 string. The terminator is consumed but not returned.
    pub fn read_cstr(&mut self) -> Result<&'a str> {
        let rest = &self.buf[self.pos..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(StateError::Corrupt("unterminated string"))?;
        let s = std::str::from_utf8(&rest[..len])
            .map_err(|_| StateError::Corrupt("string is not valid utf-8"))?;
        self.pos += len + 1;
        Ok(s)
    }
}
