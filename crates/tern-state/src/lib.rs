//! Save and restore program state as a small self-describing binary tree.
//!
//! Components register a handler with a [`HandlerRegistry`]. The same handler describes its
//! fields for both directions through a [`StateVisitor`]; [`HandlerRegistry::store`] turns the
//! descriptions into `<dir>/state.bin` and [`HandlerRegistry::load`] copies the stored values back.
//!
//! ```
//! use tern_state::{HandlerRegistry, MemStorage, StateVisitor};
//!
//! #[derive(Default)]
//! struct Pit {
//!     counter: u16,
//!     mode: u8,
//! }
//!
//! let mut registry = HandlerRegistry::<Pit>::new();
//! registry
//!     .register("pit", |pit: &mut Pit, v: &mut dyn StateVisitor| {
//!         v.object("pit", 2, |v| {
//!             v.scalar("counter", &mut pit.counter)?;
//!             v.scalar("mode", &mut pit.mode)
//!         })
//!     })
//!     .unwrap();
//!
//! let mut storage = MemStorage::new();
//! registry
//!     .store(&mut Pit { counter: 0x1234, mode: 3 }, &mut storage, "snap")
//!     .unwrap();
//!
//! let mut restored = Pit::default();
//! registry.load(&mut restored, &mut storage, "snap").unwrap();
//! assert_eq!((restored.counter, restored.mode), (0x1234, 3));
//! ```

#![forbid(unsafe_code)]

mod codec;
mod error;
mod format;
mod inspect;
mod io;
mod registry;
mod session;
mod storage;
mod tree;
mod visitor;

pub use crate::codec::{decode_state, encode_state, encode_to_vec, read_header};
pub use crate::error::{Result, StateError};
pub use crate::format::{
    StateHeader, Tag, DEFAULT_STATE_FILE_NAME, MAX_NESTING_DEPTH, MAX_OBJECT_ENTRIES,
    STATE_HEADER_LEN, STATE_MAGIC, STATE_VERSION,
};
pub use crate::inspect::{inspect_state, lookup, EntryKind, StateSummary, SummaryEntry};
pub use crate::io::{ByteReader, ByteWriter, WriteLeExt};
pub use crate::registry::{HandlerRegistry, MAX_STATE_HANDLERS};
pub use crate::session::SessionOptions;
pub use crate::storage::{
    join_path, normalize_dir, FsStorage, MemStorage, StateStorage, PATH_SEPARATOR,
};
pub use crate::tree::{Entry, Payload, TreeObject};
pub use crate::visitor::{Mode, RestoreVisitor, SaveVisitor, Scalar, StateVisitor};
