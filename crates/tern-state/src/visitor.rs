//! Field description API shared by save and restore.
//!
//! Handlers describe the shape of their state once against [`StateVisitor`]. A [`SaveVisitor`]
//! turns those calls into a tree; a [`RestoreVisitor`] walks a decoded tree with the same calls
//! and copies values back out.

use std::ffi::CStr;

use crate::error::{Result, StateError};
use crate::storage::{join_path, StateStorage};
use crate::tree::TreeObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Saving,
    Restoring,
}

pub trait StateVisitor {
    fn mode(&self) -> Mode;

    fn is_restoring(&self) -> bool {
        self.mode() == Mode::Restoring
    }

    /// Normalized snapshot directory of this session.
    fn base_path(&self) -> &str;

    /// Number of objects currently open below the root.
    fn depth(&self) -> usize;

    /// Makes the child object `name` current.
    ///
    /// While saving, a new object accepting up to `capacity` entries is created and will be
    /// inserted into its parent by [`StateVisitor::end_object`]. While restoring, the object must
    /// already exist.
    fn begin_object(&mut self, name: &str, capacity: usize) -> Result<()>;

    /// Returns to the parent of the current object.
    fn end_object(&mut self) -> Result<()>;

    /// Saves or restores `data` as an opaque blob.
    ///
    /// Restoring a missing blob zero-fills `data`. A stored blob of a different size copies only
    /// the common prefix.
    fn field(&mut self, name: &str, data: &mut [u8]) -> Result<()>;

    /// Saves or restores a string, stored with a trailing NUL.
    ///
    /// Restoring fails with [`StateError::InvalidString`] unless the stored blob ends in its only
    /// NUL and the bytes before it are valid UTF-8. A missing key is [`StateError::MissingField`].
    fn string_field(&mut self, name: &str, value: &mut String) -> Result<()>;

    /// Transfers `data` to or from `<base_path>/<name>`, outside of the tree.
    fn auxiliary_file(&mut self, name: &str, data: &mut [u8]) -> Result<()>;

    /// Creates a directory (already existing is fine).
    fn make_directory(&mut self, path: &str) -> Result<()>;
}

impl<'v> dyn StateVisitor + 'v {
    /// Runs `f` with `name` as the current object.
    pub fn object<F>(&mut self, name: &str, capacity: usize, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.begin_object(name, capacity)?;
        f(&mut *self)?;
        self.end_object()
    }

    /// Fixed-width little-endian field. A missing field restores as zero.
    pub fn scalar<T: Scalar>(&mut self, name: &str, value: &mut T) -> Result<()> {
        let mut bytes = T::to_le_bytes(*value);
        self.field(name, bytes.as_mut())?;
        *value = T::from_le_bytes(bytes);
        Ok(())
    }
}

/// Plain values with a fixed little-endian byte representation.
pub trait Scalar: Copy {
    type Bytes: AsMut<[u8]>;

    fn to_le_bytes(self) -> Self::Bytes;
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Scalar for $ty {
                type Bytes = [u8; core::mem::size_of::<$ty>()];

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_scalar!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

impl Scalar for bool {
    type Bytes = [u8; 1];

    fn to_le_bytes(self) -> Self::Bytes {
        [u8::from(self)]
    }

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        bytes[0] != 0
    }
}

/// Builds a fresh tree from handler calls.
pub struct SaveVisitor<'s, S: StateStorage + ?Sized> {
    storage: &'s mut S,
    base: String,
    root: TreeObject<'static>,
    open: Vec<(String, TreeObject<'static>)>,
}

impl<'s, S: StateStorage + ?Sized> SaveVisitor<'s, S> {
    pub fn new(storage: &'s mut S, base: &str, root_capacity: usize) -> Result<Self> {
        Ok(Self {
            storage,
            base: base.to_string(),
            root: TreeObject::with_capacity(root_capacity)?,
            open: Vec::new(),
        })
    }

    /// Returns the finished tree. Every begun object must have been ended.
    pub fn finish(self) -> Result<TreeObject<'static>> {
        if !self.open.is_empty() {
            return Err(StateError::UnbalancedObject);
        }
        Ok(self.root)
    }

    fn current(&mut self) -> &mut TreeObject<'static> {
        match self.open.last_mut() {
            Some((_, obj)) => obj,
            None => &mut self.root,
        }
    }
}

impl<S: StateStorage + ?Sized> StateVisitor for SaveVisitor<'_, S> {
    fn mode(&self) -> Mode {
        Mode::Saving
    }

    fn base_path(&self) -> &str {
        &self.base
    }

    fn depth(&self) -> usize {
        self.open.len()
    }

    fn begin_object(&mut self, name: &str, capacity: usize) -> Result<()> {
        let child = TreeObject::with_capacity(capacity)?;
        self.current().check_insert(name)?;
        self.open.push((name.to_string(), child));
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        let (name, obj) = self.open.pop().ok_or(StateError::UnbalancedObject)?;
        self.current().insert_object(name, obj)
    }

    fn field(&mut self, name: &str, data: &mut [u8]) -> Result<()> {
        let bytes = data.to_vec();
        self.current().insert_blob(name.to_string(), bytes)
    }

    fn string_field(&mut self, name: &str, value: &mut String) -> Result<()> {
        if value.as_bytes().contains(&0) {
            return Err(StateError::InvalidString(name.to_string()));
        }
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        self.current().insert_blob(name.to_string(), bytes)
    }

    fn auxiliary_file(&mut self, name: &str, data: &mut [u8]) -> Result<()> {
        let path = join_path(&self.base, name);
        tracing::debug!(path = %path, len = data.len(), "writing auxiliary file");
        self.storage
            .write_file(&path, data)
            .map_err(|source| StateError::File { path, source })
    }

    fn make_directory(&mut self, path: &str) -> Result<()> {
        self.storage
            .create_dir(path)
            .map_err(|source| StateError::File {
                path: path.to_string(),
                source,
            })
    }
}

/// Reads handler fields back out of a decoded tree.
pub struct RestoreVisitor<'a, 'buf, S: StateStorage + ?Sized> {
    storage: &'a mut S,
    base: String,
    root: &'a TreeObject<'buf>,
    open: Vec<&'a TreeObject<'buf>>,
}

impl<'a, 'buf, S: StateStorage + ?Sized> RestoreVisitor<'a, 'buf, S> {
    pub fn new(storage: &'a mut S, base: &str, root: &'a TreeObject<'buf>) -> Self {
        Self {
            storage,
            base: base.to_string(),
            root,
            open: Vec::new(),
        }
    }

    fn current(&self) -> &'a TreeObject<'buf> {
        self.open.last().copied().unwrap_or(self.root)
    }
}

impl<S: StateStorage + ?Sized> StateVisitor for RestoreVisitor<'_, '_, S> {
    fn mode(&self) -> Mode {
        Mode::Restoring
    }

    fn base_path(&self) -> &str {
        &self.base
    }

    fn depth(&self) -> usize {
        self.open.len()
    }

    fn begin_object(&mut self, name: &str, _capacity: usize) -> Result<()> {
        let child = self
            .current()
            .get_object(name)
            .ok_or_else(|| StateError::MissingObject(name.to_string()))?;
        self.open.push(child);
        Ok(())
    }

    fn end_object(&mut self) -> Result<()> {
        self.open.pop().ok_or(StateError::UnbalancedObject)?;
        Ok(())
    }

    fn field(&mut self, name: &str, data: &mut [u8]) -> Result<()> {
        match self.current().get_blob(name) {
            None => {
                tracing::debug!(field = name, len = data.len(), "field not in state, zero-filling");
                data.fill(0);
            }
            Some(stored) => {
                if stored.len() != data.len() {
                    tracing::trace!(
                        field = name,
                        stored = stored.len(),
                        wanted = data.len(),
                        "field size differs from stored blob"
                    );
                }
                let len = data.len().min(stored.len());
                data[..len].copy_from_slice(&stored[..len]);
            }
        }
        Ok(())
    }

    fn string_field(&mut self, name: &str, value: &mut String) -> Result<()> {
        let stored = self
            .current()
            .get_blob(name)
            .ok_or_else(|| StateError::MissingField(name.to_string()))?;
        let s = CStr::from_bytes_with_nul(stored)
            .ok()
            .and_then(|cstr| cstr.to_str().ok())
            .ok_or_else(|| StateError::InvalidString(name.to_string()))?;
        *value = s.to_owned();
        Ok(())
    }

    fn auxiliary_file(&mut self, name: &str, data: &mut [u8]) -> Result<()> {
        let path = join_path(&self.base, name);
        tracing::debug!(path = %path, len = data.len(), "reading auxiliary file");
        self.storage
            .read_file_exact(&path, data)
            .map_err(|source| StateError::File { path, source })
    }

    fn make_directory(&mut self, path: &str) -> Result<()> {
        self.storage
            .create_dir(path)
            .map_err(|source| StateError::File {
                path: path.to_string(),
                source,
            })
    }
}
