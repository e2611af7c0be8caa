/// Leading `u32` of every state file (`F0 0F C7 C8` on disk).
pub const STATE_MAGIC: u32 = 0xC8C7_0FF0;
/// The only body layout this crate reads or writes.
pub const STATE_VERSION: u32 = 0;
/// Size of the `magic` + `version` header.
pub const STATE_HEADER_LEN: usize = 8;

/// Entry counts are stored in a single byte.
pub const MAX_OBJECT_ENTRIES: usize = u8::MAX as usize;
/// Decoder recursion guard. Handler-described trees are only a few levels deep.
pub const MAX_NESTING_DEPTH: usize = 128;

pub const DEFAULT_STATE_FILE_NAME: &str = "state.bin";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(pub u8);

impl Tag {
    /// UBJSON object marker.
    pub const OBJECT: Tag = Tag(b'{');
    /// Length-prefixed opaque bytes (UBJSON's array marker).
    pub const BLOB: Tag = Tag(b'[');

    pub fn name(self) -> Option<&'static str> {
        match self {
            Tag::OBJECT => Some("OBJECT"),
            Tag::BLOB => Some("BLOB"),
            _ => None,
        }
    }
}

impl core::fmt::Display for Tag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if let Some(name) = self.name() {
            write!(f, "{name}({:#04x})", self.0)
        } else {
            write!(f, "Tag({:#04x})", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHeader {
    pub magic: u32,
    pub version: u32,
}

impl Default for StateHeader {
    fn default() -> Self {
        Self {
            magic: STATE_MAGIC,
            version: STATE_VERSION,
        }
    }
}
