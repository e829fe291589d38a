//! Key-value store adapters.
//!
//! - [`InMemoryKVStore`]: process-local map, for tests and ephemeral sessions
//! - [`FileBackedKVStore`]: whole-map snapshot rewritten through a temp file
//!   on every write, so a crash leaves either the old or the new snapshot

use crate::domain::KVStoreError;
use crate::ports::{BatchOperation, KeyValueStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

fn apply(map: &mut Map, operations: Vec<BatchOperation>) {
    for op in operations {
        match op {
            BatchOperation::Put { key, value } => {
                map.insert(key, value);
            }
            BatchOperation::Delete { key } => {
                map.remove(&key);
            }
        }
    }
}

fn scan(map: &Map, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
    map.range(prefix.to_vec()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// In-memory key-value store.
#[derive(Default)]
pub struct InMemoryKVStore {
    data: RwLock<Map>,
}

impl InMemoryKVStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True when no key is held.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        apply(&mut self.data.write(), operations);
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.read().contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        Ok(scan(&self.data.read(), prefix))
    }
}

/// File-backed key-value store.
///
/// Snapshot format: repeated `[key_len:u32 LE][key][value_len:u32 LE][value]`.
pub struct FileBackedKVStore {
    data: RwLock<Map>,
    path: PathBuf,
}

impl FileBackedKVStore {
    /// Open the store at `path`, loading an existing snapshot if present.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, KVStoreError> {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::read(&path) {
            Ok(bytes) => {
                let data = decode_snapshot(&bytes)?;
                info!("[storage] loaded {} keys from {}", data.len(), path.display());
                data
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("[storage] no snapshot at {}, starting empty", path.display());
                Map::new()
            }
            Err(e) => {
                return Err(KVStoreError::IOError {
                    message: e.to_string(),
                })
            }
        };
        Ok(Self {
            data: RwLock::new(data),
            path,
        })
    }

    /// Snapshot location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, map: &Map) -> Result<(), KVStoreError> {
        let io = |e: std::io::Error| KVStoreError::IOError {
            message: e.to_string(),
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }

        let bytes = encode_snapshot(map)?;
        let temp_path = self.path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(io)?;
        file.write_all(&bytes).map_err(io)?;
        file.sync_all().map_err(io)?;
        std::fs::rename(&temp_path, &self.path).map_err(io)?;

        debug!("[storage] wrote {} keys to {}", map.len(), self.path.display());
        Ok(())
    }

    /// Apply `change` to a copy, persist the copy, then swap it in.
    fn write_with<F: FnOnce(&mut Map)>(&self, change: F) -> Result<(), KVStoreError> {
        let mut guard = self.data.write();
        let mut next = guard.clone();
        change(&mut next);
        self.persist(&next)?;
        *guard = next;
        Ok(())
    }
}

impl KeyValueStore for FileBackedKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.write_with(|map| {
            map.insert(key.to_vec(), value.to_vec());
        })
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        self.write_with(|map| apply(map, operations))
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.read().contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError> {
        Ok(scan(&self.data.read(), prefix))
    }
}

fn encode_snapshot(map: &Map) -> Result<Vec<u8>, KVStoreError> {
    let too_large = || KVStoreError::IOError {
        message: "entry larger than 4 GiB".into(),
    };
    let mut bytes = Vec::new();
    for (key, value) in map {
        let key_len = u32::try_from(key.len()).map_err(|_| too_large())?;
        let value_len = u32::try_from(value.len()).map_err(|_| too_large())?;
        bytes.extend_from_slice(&key_len.to_le_bytes());
        bytes.extend_from_slice(key);
        bytes.extend_from_slice(&value_len.to_le_bytes());
        bytes.extend_from_slice(value);
    }
    Ok(bytes)
}

fn decode_snapshot(bytes: &[u8]) -> Result<Map, KVStoreError> {
    let mut map = Map::new();
    let mut rest = bytes;
    while !rest.is_empty() {
        let key = take_field(&mut rest)?;
        let value = take_field(&mut rest)?;
        map.insert(key, value);
    }
    Ok(map)
}

fn take_field(rest: &mut &[u8]) -> Result<Vec<u8>, KVStoreError> {
    let truncated = || KVStoreError::CorruptionError {
        message: "snapshot truncated".into(),
    };
    if rest.len() < 4 {
        return Err(truncated());
    }
    let (len_bytes, tail) = rest.split_at(4);
    let mut len = [0u8; 4];
    len.copy_from_slice(len_bytes);
    let len = u32::from_le_bytes(len) as usize;
    if tail.len() < len {
        return Err(truncated());
    }
    let (field, tail) = tail.split_at(len);
    *rest = tail;
    Ok(field.to_vec())
}
