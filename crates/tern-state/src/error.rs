use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid state magic {0:#010x}")]
    InvalidMagic(u32),

    #[error("unsupported state version {0}")]
    UnsupportedVersion(u32),

    #[error("unexpected entry tag {0:#04x}")]
    UnexpectedTag(u8),

    #[error("corrupt state: {0}")]
    Corrupt(&'static str),

    #[error("object capacity {capacity} exceeds the 255 entry limit")]
    CapacityTooLarge { capacity: usize },

    #[error("no room for key {key:?} in object of capacity {capacity}")]
    CapacityExhausted { key: String, capacity: usize },

    #[error("key {0:?} already present in object")]
    DuplicateKey(String),

    #[error("object holds {entries} entries; at most 255 can be encoded")]
    ObjectTooLarge { entries: usize },

    #[error("missing object {0:?}")]
    MissingObject(String),

    #[error("missing field {0:?}")]
    MissingField(String),

    #[error("invalid string literal in field {0:?}")]
    InvalidString(String),

    #[error("unbalanced begin_object/end_object")]
    UnbalancedObject,

    #[error("too many state handlers (limit {limit})")]
    TooManyHandlers { limit: usize },

    #[error("state handler {name:?} failed: {source}")]
    Handler {
        name: &'static str,
        #[source]
        source: Box<StateError>,
    },
}

impl StateError {
    /// Strips any [`StateError::Handler`] wrappers, returning the error a handler raised.
    pub fn root_cause(&self) -> &StateError {
        match self {
            StateError::Handler { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
