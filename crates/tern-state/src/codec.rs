use std::borrow::Cow;
use std::io::Write;

use crate::error::{Result, StateError};
use crate::format::{
    StateHeader, Tag, MAX_NESTING_DEPTH, STATE_HEADER_LEN, STATE_MAGIC, STATE_VERSION,
};
use crate::io::{ByteReader, ByteWriter, WriteLeExt};
use crate::tree::{Entry, Payload, TreeObject};

/// Writes the file header followed by `root`.
pub fn encode_state<W: Write + ?Sized>(w: &mut W, root: &TreeObject<'_>) -> Result<()> {
    w.write_u32_le(STATE_MAGIC)?;
    w.write_u32_le(STATE_VERSION)?;
    encode_object(w, root)
}

/// Encodes into a fresh [`ByteWriter`] that starts at `initial_capacity` bytes.
pub fn encode_to_vec(root: &TreeObject<'_>, initial_capacity: usize) -> Result<Vec<u8>> {
    let mut w = ByteWriter::with_capacity(initial_capacity);
    encode_state(&mut w, root)?;
    Ok(w.into_inner())
}

fn encode_object<W: Write + ?Sized>(w: &mut W, obj: &TreeObject<'_>) -> Result<()> {
    let count: u8 = obj
        .len()
        .try_into()
        .map_err(|_| StateError::ObjectTooLarge { entries: obj.len() })?;
    w.write_u8(Tag::OBJECT.0)?;
    w.write_u8(count)?;
    for entry in obj.iter() {
        w.write_cstr(&entry.key)?;
        match &entry.payload {
            Payload::Object(child) => encode_object(w, child)?,
            Payload::Blob(bytes) => {
                let len: u32 = bytes
                    .len()
                    .try_into()
                    .map_err(|_| StateError::Corrupt("blob length does not fit in u32"))?;
                w.write_u8(Tag::BLOB.0)?;
                w.write_u32_le(len)?;
                w.write_bytes(bytes)?;
            }
        }
    }
    Ok(())
}

/// Validates the magic and version fields without looking at the body.
pub fn read_header(bytes: &[u8]) -> Result<StateHeader> {
    if bytes.len() < STATE_HEADER_LEN {
        return Err(StateError::Corrupt("truncated header"));
    }
    let mut r = ByteReader::new(bytes);
    let magic = r.read_u32_le()?;
    if magic != STATE_MAGIC {
        return Err(StateError::InvalidMagic(magic));
    }
    let version = r.read_u32_le()?;
    if version != STATE_VERSION {
        return Err(StateError::UnsupportedVersion(version));
    }
    Ok(StateHeader { magic, version })
}

/// Parses a complete state file.
///
/// Keys and blob payloads in the returned tree borrow from `bytes`.
pub fn decode_state(bytes: &[u8]) -> Result<TreeObject<'_>> {
    read_header(bytes)?;
    let mut r = ByteReader::new(&bytes[STATE_HEADER_LEN..]);
    let root = decode_object(&mut r, 0)?;
    if !r.is_empty() {
        return Err(StateError::Corrupt("trailing bytes after root object"));
    }
    Ok(root)
}

fn decode_object<'a>(r: &mut ByteReader<'a>, depth: usize) -> Result<TreeObject<'a>> {
    if depth > MAX_NESTING_DEPTH {
        return Err(StateError::Corrupt("objects nested too deeply"));
    }
    let tag = r.read_u8()?;
    if Tag(tag) != Tag::OBJECT {
        return Err(StateError::UnexpectedTag(tag));
    }
    let count = usize::from(r.read_u8()?);

    let mut entries: Vec<Entry<'a>> = Vec::with_capacity(count);
    for _ in 0..count {
        let key = r.read_cstr()?;
        if entries.iter().any(|entry| entry.key == key) {
            return Err(StateError::DuplicateKey(key.to_string()));
        }
        let payload = match Tag(r.peek_u8()?) {
            Tag::OBJECT => Payload::Object(decode_object(r, depth + 1)?),
            Tag::BLOB => {
                r.read_u8()?;
                let len = r.read_u32_le()? as usize;
                Payload::Blob(Cow::Borrowed(r.read_bytes(len)?))
            }
            Tag(other) => return Err(StateError::UnexpectedTag(other)),
        };
        entries.push(Entry {
            key: Cow::Borrowed(key),
            payload,
        });
    }
    Ok(TreeObject::from_entries(entries))
}
