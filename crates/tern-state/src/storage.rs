//! Host storage used by save/restore sessions.
//!
//! Sessions only ever need whole-file operations addressed by path, which is also what a
//! browser-hosted storage bridge can offer. [`FsStorage`] maps them onto `std::fs`;
//! [`MemStorage`] keeps everything in process.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};

#[cfg(windows)]
pub const PATH_SEPARATOR: char = '\\';
#[cfg(not(windows))]
pub const PATH_SEPARATOR: char = '/';

pub trait StateStorage {
    /// Reads an entire file.
    fn read_file(&mut self, path: &str) -> io::Result<Vec<u8>>;

    /// Fills `buf` from the start of a file. Files shorter than `buf` are an error.
    fn read_file_exact(&mut self, path: &str, buf: &mut [u8]) -> io::Result<()>;

    /// Creates or truncates a file and writes all of `data` to it.
    fn write_file(&mut self, path: &str, data: &[u8]) -> io::Result<()>;

    /// Creates a directory. An already existing directory is not an error.
    fn create_dir(&mut self, path: &str) -> io::Result<()>;
}

/// Strips a single trailing path separator (`/`, or the platform separator).
pub fn normalize_dir(dir: &str) -> &str {
    dir.strip_suffix(|c: char| c == '/' || c == PATH_SEPARATOR)
        .unwrap_or(dir)
}

/// Joins a normalized directory and a file name with the platform separator.
pub fn join_path(dir: &str, name: &str) -> String {
    format!("{dir}{PATH_SEPARATOR}{name}")
}

/// `std::fs` backed storage.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStorage;

impl FsStorage {
    pub fn new() -> Self {
        Self
    }
}

impl StateStorage for FsStorage {
    fn read_file(&mut self, path: &str) -> io::Result<Vec<u8>> {
        let mut file = File::open(path)?;
        let len = file.seek(SeekFrom::End(0))?;
        file.seek(SeekFrom::Start(0))?;
        let len: usize = len
            .try_into()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "file too large"))?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| io::Error::new(io::ErrorKind::OutOfMemory, "file too large"))?;
        buf.resize(len, 0);
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_file_exact(&mut self, path: &str, buf: &mut [u8]) -> io::Result<()> {
        File::open(path)?.read_exact(buf)
    }

    fn write_file(&mut self, path: &str, data: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.write_all(data)?;
        file.flush()
    }

    fn create_dir(&mut self, path: &str) -> io::Result<()> {
        match fs::create_dir(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// In-memory storage keyed by full path.
#[derive(Debug, Default, Clone)]
pub struct MemStorage {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Vec<u8>> {
        self.files.get_mut(path)
    }

    pub fn insert(&mut self, path: impl Into<String>, data: Vec<u8>) -> Option<Vec<u8>> {
        self.files.insert(path.into(), data)
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    fn not_found(path: &str) -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, format!("{path} does not exist"))
    }
}

impl StateStorage for MemStorage {
    fn read_file(&mut self, path: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }

    fn read_file_exact(&mut self, path: &str, buf: &mut [u8]) -> io::Result<()> {
        let data = self.files.get(path).ok_or_else(|| Self::not_found(path))?;
        if data.len() < buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{path}: wanted {} bytes, found {}", buf.len(), data.len()),
            ));
        }
        buf.copy_from_slice(&data[..buf.len()]);
        Ok(())
    }

    fn write_file(&mut self, path: &str, data: &[u8]) -> io::Result<()> {
        self.files.insert(path.to_string(), data.to_vec());
        Ok(())
    }

    fn create_dir(&mut self, path: &str) -> io::Result<()> {
        self.dirs.insert(path.to_string());
        Ok(())
    }
}
