//! # Paired-Peer Registry
//!
//! Records live under `px:peer:<hex key>`; the ordered index lives under
//! `px:index`. Both are JSON and are only ever written together in one
//! atomic batch.

use crate::domain::{
    MasterKey, PairedPeerIndex, PairedPeerRecord, PairedPeers, PairingKey, PeerIndexEntry,
    PublicKey, RegistryError,
};
use crate::ports::{BatchOperation, CryptoCapability, KeyValueStore};
use link_telemetry::log_peer_event;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

const RECORD_PREFIX: &[u8] = b"px:peer:";
const INDEX_KEY: &[u8] = b"px:index";

fn record_key(key: &PublicKey) -> Vec<u8> {
    let mut storage_key = RECORD_PREFIX.to_vec();
    storage_key.extend_from_slice(key.to_hex().as_bytes());
    storage_key
}

/// Persistent map of remote public key to pairing record.
pub struct PairedPeerRegistry {
    store: Arc<dyn KeyValueStore>,
    crypto: Arc<dyn CryptoCapability>,
    master: Arc<MasterKey>,
    /// Serializes the read-modify-write of the index.
    write_lock: Mutex<()>,
}

impl PairedPeerRegistry {
    /// Registry over `store`, deriving pairing keys from `master`.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        crypto: Arc<dyn CryptoCapability>,
        master: Arc<MasterKey>,
    ) -> Self {
        Self {
            store,
            crypto,
            master,
            write_lock: Mutex::new(()),
        }
    }

    /// Store a new record and its index entry in one batch.
    ///
    /// # Errors
    ///
    /// - `RegistryError::AlreadyPaired` - a record for this key exists
    /// - `RegistryError::Storage` - the batch could not be written
    pub fn add(&self, record: &PairedPeerRecord) -> Result<(), RegistryError> {
        let _guard = self.write_lock.lock();

        let storage_key = record_key(&record.public_key);
        if self.store.exists(&storage_key)? {
            return Err(RegistryError::AlreadyPaired(record.public_key));
        }

        let mut index = self.index()?;
        index.push(PeerIndexEntry {
            public_key: record.public_key,
            service: record.service.clone(),
        });

        self.store.atomic_batch_write(vec![
            BatchOperation::put(storage_key, encode(record)?),
            BatchOperation::put(INDEX_KEY.to_vec(), encode(&index)?),
        ])?;

        log_peer_event!(
            info,
            "[registry] paired wallet stored",
            record.public_key,
            service = %record.service,
            total = index.len()
        );
        Ok(())
    }

    /// Whether a record exists for `key`.
    pub fn contains(&self, key: &PublicKey) -> Result<bool, RegistryError> {
        Ok(self.store.exists(&record_key(key))?)
    }

    /// Record for `key`, if paired.
    pub fn lookup(&self, key: &PublicKey) -> Result<Option<PairedPeerRecord>, RegistryError> {
        self.store
            .get(&record_key(key))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Record for `key` plus our pairing key towards it.
    pub fn pairing_key_for(
        &self,
        key: &PublicKey,
    ) -> Result<Option<(PairedPeerRecord, PairingKey)>, RegistryError> {
        let Some(record) = self.lookup(key)? else {
            return Ok(None);
        };
        let pairing_key = self
            .crypto
            .derive_pairing_key(&self.master, &record.identifier)?;
        Ok(Some((record, pairing_key)))
    }

    /// Current index.
    pub fn index(&self) -> Result<PairedPeerIndex, RegistryError> {
        match self.store.get(INDEX_KEY)? {
            Some(bytes) => decode(&bytes),
            None => Ok(PairedPeerIndex::default()),
        }
    }

    /// Summary for the host.
    pub fn paired_peers(&self) -> Result<PairedPeers, RegistryError> {
        Ok(PairedPeers::from(&self.index()?))
    }

    /// True when at least one wallet is paired.
    pub fn has_peers(&self) -> Result<bool, RegistryError> {
        Ok(!self.index()?.is_empty())
    }

    /// Rebuild the index from the records.
    ///
    /// Keeps the order of entries that have a record, drops entries that do
    /// not, and appends records missing from the index. Returns the number of
    /// entries added or removed.
    pub fn reconcile(&self) -> Result<usize, RegistryError> {
        let _guard = self.write_lock.lock();

        let mut records: Vec<PairedPeerRecord> = self
            .store
            .prefix_scan(RECORD_PREFIX)?
            .into_iter()
            .map(|(_, bytes)| decode(&bytes))
            .collect::<Result<_, _>>()?;
        records.sort_by_key(|r| r.public_key);

        let current = self.index()?;
        let known: HashSet<PublicKey> = records.iter().map(|r| r.public_key).collect();

        let mut rebuilt = PairedPeerIndex::default();
        for entry in current.entries() {
            if known.contains(&entry.public_key) {
                rebuilt.push(entry.clone());
            }
        }
        let dropped = current.len() - rebuilt.len();

        let mut added = 0;
        for record in &records {
            if rebuilt.push(PeerIndexEntry {
                public_key: record.public_key,
                service: record.service.clone(),
            }) {
                added += 1;
            }
        }

        let changes = dropped + added;
        if changes > 0 {
            warn!(dropped, added, "[registry] index out of step with records, rewriting");
            self.store
                .atomic_batch_write(vec![BatchOperation::put(INDEX_KEY.to_vec(), encode(&rebuilt)?)])?;
        } else {
            info!(peers = rebuilt.len(), "[registry] index consistent");
        }
        Ok(changes)
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, RegistryError> {
    serde_json::to_vec(value).map_err(|e| RegistryError::Corrupt(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, RegistryError> {
    serde_json::from_slice(bytes).map_err(|e| RegistryError::Corrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{DalekCrypto, InMemoryKVStore};

    fn registry() -> (PairedPeerRegistry, Arc<InMemoryKVStore>) {
        let store = Arc::new(InMemoryKVStore::new());
        let registry = PairedPeerRegistry::new(
            store.clone(),
            Arc::new(DalekCrypto::new()),
            Arc::new(MasterKey::new([4; 32])),
        );
        (registry, store)
    }

    fn record(byte: u8, identifier: &str) -> PairedPeerRecord {
        PairedPeerRecord {
            public_key: PublicKey::new([byte; 32]),
            identifier: identifier.to_string(),
            service: "dapp".to_string(),
        }
    }

    #[test]
    fn test_add_and_lookup() {
        let (registry, _) = registry();
        let peer = record(1, "shop");
        registry.add(&peer).unwrap();

        assert!(registry.contains(&peer.public_key).unwrap());
        assert_eq!(registry.lookup(&peer.public_key).unwrap(), Some(peer.clone()));

        let summary = registry.paired_peers().unwrap();
        assert!(summary.has_paired_wallets);
        assert_eq!(summary.pub_keys, vec![peer.public_key]);
    }

    #[test]
    fn test_re_pair_rejected() {
        let (registry, _) = registry();
        registry.add(&record(1, "shop")).unwrap();

        let err = registry.add(&record(1, "other")).unwrap_err();
        assert_eq!(err, RegistryError::AlreadyPaired(PublicKey::new([1; 32])));
        assert_eq!(registry.index().unwrap().len(), 1);
    }

    #[test]
    fn test_pairing_key_is_rederived() {
        let (registry, _) = registry();
        let peer = record(1, "shop");
        registry.add(&peer).unwrap();

        let (found, key) = registry.pairing_key_for(&peer.public_key).unwrap().unwrap();
        let expected = DalekCrypto::new()
            .derive_pairing_key(&MasterKey::new([4; 32]), "shop")
            .unwrap();

        assert_eq!(found, peer);
        assert_eq!(key.public_key(), expected.public_key());
        assert!(registry
            .pairing_key_for(&PublicKey::new([9; 32]))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_reconcile_repairs_index() {
        let (registry, store) = registry();
        registry.add(&record(1, "a")).unwrap();

        // Record written without its index entry, plus a stale index entry.
        let orphan = record(2, "b");
        store
            .put(&record_key(&orphan.public_key), &serde_json::to_vec(&orphan).unwrap())
            .unwrap();
        let mut index = registry.index().unwrap();
        index.push(PeerIndexEntry {
            public_key: PublicKey::new([3; 32]),
            service: "gone".into(),
        });
        store.put(INDEX_KEY, &serde_json::to_vec(&index).unwrap()).unwrap();

        assert_eq!(registry.reconcile().unwrap(), 2);
        let keys = registry.paired_peers().unwrap().pub_keys;
        assert_eq!(keys, vec![PublicKey::new([1; 32]), PublicKey::new([2; 32])]);
        assert_eq!(registry.reconcile().unwrap(), 0);
    }

    #[test]
    fn test_corrupt_record_reported() {
        let (registry, store) = registry();
        let key = PublicKey::new([5; 32]);
        store.put(&record_key(&key), b"not json").unwrap();

        assert!(matches!(registry.lookup(&key), Err(RegistryError::Corrupt(_))));
    }
}
