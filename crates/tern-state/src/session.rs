use crate::codec::{decode_state, encode_to_vec};
use crate::error::{Result, StateError};
use crate::format::DEFAULT_STATE_FILE_NAME;
use crate::registry::HandlerRegistry;
use crate::storage::{join_path, normalize_dir, StateStorage};
use crate::tree::TreeObject;
use crate::visitor::{RestoreVisitor, SaveVisitor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Capacity of the root object handlers add their top-level entries to.
    pub root_capacity: usize,
    /// Initial size of the encode buffer; it doubles as needed.
    pub writer_capacity: usize,
    /// File name of the encoded tree inside the snapshot directory.
    pub state_file_name: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            root_capacity: 64,
            writer_capacity: 64 * 1024,
            state_file_name: DEFAULT_STATE_FILE_NAME.to_string(),
        }
    }
}

impl<C> HandlerRegistry<C> {
    /// Saves the state of every handler to `<dir>/state.bin`.
    pub fn store(&mut self, ctx: &mut C, storage: &mut dyn StateStorage, dir: &str) -> Result<()> {
        let base = normalize_dir(dir);
        let bytes = self.encode_pass(ctx, storage, base)?;
        let path = join_path(base, &self.options.state_file_name);
        storage
            .write_file(&path, &bytes)
            .map_err(|source| StateError::File {
                path: path.clone(),
                source,
            })?;
        tracing::info!(path = %path, bytes = bytes.len(), "stored state");
        Ok(())
    }

    /// Runs a save pass and returns the encoded tree instead of writing `state.bin`.
    ///
    /// Auxiliary files written by handlers still go to `storage` under `dir`.
    pub fn store_to_vec(
        &mut self,
        ctx: &mut C,
        storage: &mut dyn StateStorage,
        dir: &str,
    ) -> Result<Vec<u8>> {
        self.encode_pass(ctx, storage, normalize_dir(dir))
    }

    /// Runs a save pass and returns the tree without encoding it.
    pub fn capture(
        &mut self,
        ctx: &mut C,
        storage: &mut dyn StateStorage,
        dir: &str,
    ) -> Result<TreeObject<'static>> {
        self.save_pass(ctx, storage, normalize_dir(dir))
    }

    /// Restores the state of every handler from `<dir>/state.bin`.
    pub fn load(&mut self, ctx: &mut C, storage: &mut dyn StateStorage, dir: &str) -> Result<()> {
        let base = normalize_dir(dir);
        let path = join_path(base, &self.options.state_file_name);
        let buf = storage
            .read_file(&path)
            .map_err(|source| StateError::File {
                path: path.clone(),
                source,
            })?;
        self.restore_pass(ctx, storage, base, &buf)?;
        tracing::info!(path = %path, bytes = buf.len(), "loaded state");
        // The decoded tree borrowed from `buf`; it is gone by now.
        drop(buf);
        Ok(())
    }

    /// Restores from an already loaded state file image.
    pub fn load_from_slice(
        &mut self,
        ctx: &mut C,
        storage: &mut dyn StateStorage,
        dir: &str,
        bytes: &[u8],
    ) -> Result<()> {
        self.restore_pass(ctx, storage, normalize_dir(dir), bytes)
    }

    fn save_pass(
        &mut self,
        ctx: &mut C,
        storage: &mut dyn StateStorage,
        base: &str,
    ) -> Result<TreeObject<'static>> {
        let mut visitor = SaveVisitor::new(storage, base, self.options.root_capacity)?;
        self.run_all(ctx, &mut visitor)?;
        visitor.finish()
    }

    fn encode_pass(
        &mut self,
        ctx: &mut C,
        storage: &mut dyn StateStorage,
        base: &str,
    ) -> Result<Vec<u8>> {
        let tree = self.save_pass(ctx, storage, base)?;
        encode_to_vec(&tree, self.options.writer_capacity)
    }

    fn restore_pass(
        &mut self,
        ctx: &mut C,
        storage: &mut dyn StateStorage,
        base: &str,
        bytes: &[u8],
    ) -> Result<()> {
        // Header problems surface here, before any handler runs.
        let tree = decode_state(bytes)?;
        let mut visitor = RestoreVisitor::new(storage, base, &tree);
        self.run_all(ctx, &mut visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemStorage;
    use crate::visitor::StateVisitor;

    #[derive(Default)]
    struct Counter {
        ticks: u64,
    }

    fn registry() -> HandlerRegistry<Counter> {
        let mut registry = HandlerRegistry::new();
        registry
            .register("counter", |c: &mut Counter, v: &mut dyn StateVisitor| {
                v.scalar("ticks", &mut c.ticks)
            })
            .unwrap();
        registry
    }

    #[test]
    fn store_writes_state_file_under_normalized_dir() {
        let mut storage = MemStorage::new();
        let mut counter = Counter { ticks: 5 };
        registry()
            .store(&mut counter, &mut storage, &format!("snap{}", crate::storage::PATH_SEPARATOR))
            .unwrap();
        assert!(storage.contains(&join_path("snap", "state.bin")));
        assert_eq!(storage.paths().count(), 1);
    }

    #[test]
    fn custom_state_file_name_is_honoured() {
        let options = SessionOptions {
            state_file_name: "machine.state".to_string(),
            writer_capacity: 1,
            ..SessionOptions::default()
        };
        let mut registry = registry().with_options(options);
        let mut storage = MemStorage::new();
        registry
            .store(&mut Counter { ticks: 9 }, &mut storage, "snap")
            .unwrap();
        assert!(storage.contains(&join_path("snap", "machine.state")));

        let mut restored = Counter::default();
        registry.load(&mut restored, &mut storage, "snap").unwrap();
        assert_eq!(restored.ticks, 9);
    }

    #[test]
    fn store_to_vec_matches_stored_file() {
        let mut storage = MemStorage::new();
        let mut registry = registry();
        let mut counter = Counter { ticks: 77 };
        let bytes = registry
            .store_to_vec(&mut counter, &mut storage, "snap")
            .unwrap();
        registry.store(&mut counter, &mut storage, "snap").unwrap();
        assert_eq!(storage.get(&join_path("snap", "state.bin")), Some(&bytes[..]));
    }

    #[test]
    fn root_capacity_limits_top_level_entries() {
        let options = SessionOptions {
            root_capacity: 1,
            ..SessionOptions::default()
        };
        let mut registry = HandlerRegistry::<Counter>::new().with_options(options);
        registry
            .register("two-fields", |c: &mut Counter, v: &mut dyn StateVisitor| {
                v.scalar("a", &mut c.ticks)?;
                v.scalar("b", &mut c.ticks)
            })
            .unwrap();

        let err = registry
            .store(&mut Counter::default(), &mut MemStorage::new(), "snap")
            .unwrap_err();
        assert!(matches!(
            err,
            StateError::Handler { name: "two-fields", .. }
        ));
        assert!(matches!(
            err.root_cause(),
            StateError::CapacityExhausted { capacity: 1, .. }
        ));
    }

    fn labelled() -> HandlerRegistry<(u32, String, usize)> {
        let mut registry = HandlerRegistry::new();
        registry
            .register("dev", |s: &mut (u32, String, usize), v: &mut dyn StateVisitor| {
                s.2 += 1;
                v.object("dev", 2, |v| {
                    v.scalar("value", &mut s.0)?;
                    v.string_field("label", &mut s.1)
                })
            })
            .unwrap();
        registry
    }

    #[test]
    fn load_from_slice_restores_store_to_vec_output() {
        let sep = crate::storage::PATH_SEPARATOR;
        let mut registry = labelled();
        let mut storage = MemStorage::new();
        let bytes = registry
            .store_to_vec(&mut (5, "x".to_string(), 0), &mut storage, &format!("d{sep}"))
            .unwrap();
        assert_eq!(storage.paths().count(), 0);

        let mut restored = (0, String::new(), 0);
        registry
            .load_from_slice(&mut restored, &mut storage, &format!("d{sep}"), &bytes)
            .unwrap();
        assert_eq!(restored, (5, "x".to_string(), 1));
    }

    #[test]
    fn load_from_slice_rejects_corrupt_header_before_handlers() {
        let mut registry = labelled();
        let mut storage = MemStorage::new();
        let mut bytes = registry
            .store_to_vec(&mut (5, "x".to_string(), 0), &mut storage, "d")
            .unwrap();
        bytes[1] ^= 0xFF;

        let mut restored = (0, String::new(), 0);
        let err = registry
            .load_from_slice(&mut restored, &mut storage, "d", &bytes)
            .unwrap_err();
        assert!(matches!(err, StateError::InvalidMagic(_)));
        assert_eq!(restored.2, 0);
    }

    #[test]
    fn capture_matches_decoded_store_to_vec() {
        let mut registry = labelled();
        let mut storage = MemStorage::new();
        let mut state = (0xABCD, "tern".to_string(), 0);

        let captured = registry.capture(&mut state, &mut storage, "d").unwrap();
        let bytes = registry.store_to_vec(&mut state, &mut storage, "d").unwrap();
        let decoded = crate::codec::decode_state(&bytes).unwrap();

        // Decoded objects report capacity == len, so compare entries rather than whole roots.
        assert_eq!(captured.capacity(), SessionOptions::default().root_capacity);
        assert_eq!(captured.entries(), decoded.entries());
        assert_eq!(encode_to_vec(&captured, 0).unwrap(), bytes);
    }
}
