//! # Movement persistence
//!
//! Movement sequences are expensive to compute, so they can be kept on disk between runs. The
//! on-disk format is a 32-bit little-endian entry count followed by `dx, dy` pairs of
//! little-endian `f32` values. It is not meant to be portable across versions.

use crate::prelude::v1::*;
use log::*;
use std::convert::Infallible;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::PathBuf;

/// Keyed storage of movement sequences.
pub trait MovementStore {
    /// Load a stored sequence.
    ///
    /// Returns `Ok(None)` if nothing is stored under `key`.
    fn load(&self, key: &str) -> Result<Option<Vec<Movement>>>;

    /// Store a sequence, replacing any previous entry under `key`.
    fn store(&self, key: &str, movement: &[Movement]) -> Result<()>;
}

/// Load from the store, or compute and store the result.
///
/// Any storage failure is logged and treated as if the cache did not exist. A stored sequence
/// whose length differs from `frames` is considered stale and recomputed.
///
/// # Arguments
///
/// * `store` - persistence backend.
/// * `key` - name of the entry within the store.
/// * `frames` - number of frames the sequence must cover.
/// * `compute` - produces the sequence on a cache miss.
pub fn get_or_compute(
    store: &dyn MovementStore,
    key: &str,
    frames: usize,
    compute: impl FnOnce() -> Vec<Movement>,
) -> Vec<Movement> {
    match try_get_or_compute(store, key, frames, || Ok::<_, Infallible>(compute())) {
        Ok(movement) => movement,
        Err(e) => match e {},
    }
}

/// Like [`get_or_compute`], but with fallible computation.
///
/// Errors of `compute` are returned as-is, and nothing is stored in that case.
pub fn try_get_or_compute<E>(
    store: &dyn MovementStore,
    key: &str,
    frames: usize,
    compute: impl FnOnce() -> std::result::Result<Vec<Movement>, E>,
) -> std::result::Result<Vec<Movement>, E> {
    match store.load(key) {
        Ok(Some(movement)) if movement.len() == frames => {
            info!("Loaded camera movement from cache: {} frames", movement.len());
            return Ok(movement);
        }
        Ok(Some(movement)) => warn!(
            "Cached camera movement holds {} frames instead of {frames}. Regenerating...",
            movement.len()
        ),
        Ok(None) => {}
        Err(e) => warn!("Error loading camera movement cache: {e}. Regenerating..."),
    }

    let movement = compute()?;

    match store.store(key, &movement) {
        Ok(()) => info!("Saved camera movement to cache: {} frames", movement.len()),
        Err(e) => warn!("Error saving camera movement cache: {e}"),
    }

    Ok(movement)
}

/// File based movement store.
///
/// Keys are interpreted as paths relative to the root directory. Absolute keys are used as-is.
pub struct FileStore {
    root: PathBuf,
}

impl Default for FileStore {
    /// Store rooted in the user's cache directory.
    fn default() -> Self {
        let root = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("panflow");
        Self { root }
    }
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the file path of a key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl MovementStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<Vec<Movement>>> {
        let file = match File::open(self.path(key)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        read_movement(BufReader::new(file)).map(Some)
    }

    fn store(&self, key: &str, movement: &[Movement]) -> Result<()> {
        let path = self.path(key);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut out = BufWriter::new(File::create(path)?);
        write_movement(&mut out, movement)?;
        out.flush()?;

        Ok(())
    }
}

/// Serialise a movement sequence.
pub fn write_movement(mut out: impl Write, movement: &[Movement]) -> Result<()> {
    let len = u32::try_from(movement.len()).map_err(|_| anyhow!("Too many frames to store"))?;

    out.write_all(&len.to_le_bytes())?;

    for v in movement.iter().flat_map(|m| [m.dx, m.dy]) {
        out.write_all(&v.to_le_bytes())?;
    }

    Ok(())
}

/// Deserialise a movement sequence.
pub fn read_movement(mut input: impl Read) -> Result<Vec<Movement>> {
    let mut len = [0u8; std::mem::size_of::<u32>()];
    input.read_exact(&mut len)?;

    (0..u32::from_le_bytes(len))
        .map(|_| {
            let mut data = [[0u8; std::mem::size_of::<f32>()]; 2];
            for b in &mut data {
                input.read_exact(&mut *b)?;
            }
            Ok(Movement::new(
                f32::from_le_bytes(data[0]),
                f32::from_le_bytes(data[1]),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("panflow-cache-{}-{name}", std::process::id()))
    }

    #[test]
    fn file_store_creates_parents() {
        let root = temp_root("parents");
        let store = FileStore::new(&root);
        let movement = vec![Movement::ZERO, Movement::new(3.5, -1.25), Movement::new(0.0, 7.0)];

        store.store("nested/dir/clip.mov", &movement).unwrap();
        let loaded = store.load("nested/dir/clip.mov").unwrap();

        assert_eq!(loaded, Some(movement));

        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn file_store_missing_entry() {
        let store = FileStore::new(temp_root("missing"));
        assert_eq!(store.load("nothing-here").unwrap(), None);
    }

    #[test]
    fn truncated_data_is_an_error() {
        let mut buf = vec![];
        write_movement(&mut buf, &[Movement::new(1.0, 2.0), Movement::new(3.0, 4.0)]).unwrap();
        buf.truncate(buf.len() - 3);
        assert!(read_movement(buf.as_slice()).is_err());
    }

    struct BrokenStore {
        stores: Cell<usize>,
    }

    impl MovementStore for BrokenStore {
        fn load(&self, _: &str) -> Result<Option<Vec<Movement>>> {
            Err(anyhow!("unreadable"))
        }

        fn store(&self, _: &str, _: &[Movement]) -> Result<()> {
            self.stores.set(self.stores.get() + 1);
            Err(anyhow!("read-only"))
        }
    }

    #[test]
    fn failures_are_not_fatal() {
        let store = BrokenStore {
            stores: Cell::new(0),
        };
        let movement = get_or_compute(&store, "key", 4, || vec![Movement::ZERO; 4]);
        assert_eq!(movement.len(), 4);
        assert_eq!(store.stores.get(), 1);
    }

    #[derive(Default)]
    struct MemoryStore {
        entry: RefCell<Option<Vec<Movement>>>,
    }

    impl MovementStore for MemoryStore {
        fn load(&self, _: &str) -> Result<Option<Vec<Movement>>> {
            Ok(self.entry.borrow().clone())
        }

        fn store(&self, _: &str, movement: &[Movement]) -> Result<()> {
            *self.entry.borrow_mut() = Some(movement.to_vec());
            Ok(())
        }
    }

    #[test]
    fn cached_entry_skips_computation() {
        let store = MemoryStore::default();
        let first = get_or_compute(&store, "key", 2, || {
            vec![Movement::ZERO, Movement::new(6.0, 0.0)]
        });

        let second = get_or_compute(&store, "key", 2, || unreachable!("should be cached"));

        assert_eq!(first, second);
    }

    #[test]
    fn stale_length_is_recomputed() {
        let store = MemoryStore::default();
        store.store("key", &[Movement::ZERO; 3]).unwrap();

        let movement = get_or_compute(&store, "key", 2, || vec![Movement::new(1.0, 1.0); 2]);

        assert_eq!(movement, vec![Movement::new(1.0, 1.0); 2]);
        assert_eq!(store.entry.borrow().as_deref(), Some(&movement[..]));
    }

    #[test]
    fn failed_computation_is_not_stored() {
        let store = MemoryStore::default();

        let out = try_get_or_compute(&store, "key", 1, || Err(anyhow!("no frames")));

        assert!(out.is_err());
        assert_eq!(*store.entry.borrow(), None);
    }
}
