//! # Domain Entities

use super::value_objects::{Cursor, PublicKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Per-peer key pair derived from (master key, remote identifier).
///
/// Never persisted. The secret seed is zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PairingKey {
    #[zeroize(skip)]
    public_key: PublicKey,
    seed: [u8; 32],
}

impl PairingKey {
    /// Assemble from a public key and the secret seed it was derived from.
    pub fn new(public_key: PublicKey, seed: [u8; 32]) -> Self {
        Self { public_key, seed }
    }

    /// Public half, used as our address towards this peer.
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// Secret seed. Only crypto adapters should read this.
    pub fn seed(&self) -> &[u8; 32] {
        &self.seed
    }
}

impl fmt::Debug for PairingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairingKey")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// A wallet we completed a handshake with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedPeerRecord {
    /// Remote pairing public key. Unique across records.
    pub public_key: PublicKey,
    /// Identifier our pairing key towards this peer is derived from.
    pub identifier: String,
    /// Application label for the connection.
    pub service: String,
}

/// One row of the paired-peer index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerIndexEntry {
    /// Remote pairing public key.
    pub public_key: PublicKey,
    /// Application label for the connection.
    pub service: String,
}

/// Ordered list of every paired key, kept in step with the records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedPeerIndex {
    entries: Vec<PeerIndexEntry>,
}

impl PairedPeerIndex {
    /// Build from existing entries, preserving order.
    pub fn from_entries(entries: Vec<PeerIndexEntry>) -> Self {
        Self { entries }
    }

    /// Whether the key is listed.
    pub fn contains(&self, key: &PublicKey) -> bool {
        self.entries.iter().any(|e| &e.public_key == key)
    }

    /// Append an entry. Returns false if the key was already listed.
    pub fn push(&mut self, entry: PeerIndexEntry) -> bool {
        if self.contains(&entry.public_key) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Entries in pairing order.
    pub fn entries(&self) -> &[PeerIndexEntry] {
        &self.entries
    }

    /// Number of paired peers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is paired.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Summary returned to the host.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairedPeers {
    /// At least one peer is paired.
    pub has_paired_wallets: bool,
    /// Remote keys in pairing order.
    pub pub_keys: Vec<PublicKey>,
    /// Service tags, parallel to `pub_keys`.
    pub services: Vec<String>,
}

impl From<&PairedPeerIndex> for PairedPeers {
    fn from(index: &PairedPeerIndex) -> Self {
        Self {
            has_paired_wallets: !index.is_empty(),
            pub_keys: index.entries().iter().map(|e| e.public_key).collect(),
            services: index.entries().iter().map(|e| e.service.clone()).collect(),
        }
    }
}

/// One undelivered relay entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboxEntry {
    /// Token used to acknowledge this entry.
    pub cursor: Cursor,
    /// Encoded envelope.
    pub payload: Vec<u8>,
    /// Relay-side acknowledgment flag.
    pub acknowledged: bool,
}

/// One page of an inbox fetch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InboxPage {
    /// Entries in delivery order.
    pub entries: Vec<InboxEntry>,
    /// Cursor to pass to the next fetch, if more entries are waiting.
    pub next: Option<Cursor>,
}

/// Counts from one steady-state fetch cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Pages requested from the relay.
    pub pages: usize,
    /// Unacknowledged entries examined.
    pub examined: usize,
    /// Entries dispatched to a handler.
    pub dispatched: usize,
    /// Entries acknowledged to the relay.
    pub acknowledged: usize,
    /// Entries left for a later cycle.
    pub retained: usize,
    /// Entries that failed to parse.
    pub malformed: usize,
    /// Redelivered entries absorbed by the seen cache.
    pub duplicates: usize,
}

/// Result of a successful pairing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairingOutcome {
    /// The paired wallet.
    pub peer: PairedPeerRecord,
    /// The key was already in the registry; nothing was written.
    pub already_paired: bool,
    /// The record reached the store.
    pub persisted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(byte: u8, service: &str) -> PeerIndexEntry {
        PeerIndexEntry {
            public_key: PublicKey::new([byte; 32]),
            service: service.to_string(),
        }
    }

    #[test]
    fn test_index_rejects_duplicates() {
        let mut index = PairedPeerIndex::default();
        assert!(index.push(entry(1, "dapp")));
        assert!(!index.push(entry(1, "other")));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_summary_keeps_order() {
        let mut index = PairedPeerIndex::default();
        index.push(entry(3, "c"));
        index.push(entry(1, "a"));

        let summary = PairedPeers::from(&index);
        assert!(summary.has_paired_wallets);
        assert_eq!(summary.pub_keys, vec![PublicKey::new([3; 32]), PublicKey::new([1; 32])]);
        assert_eq!(summary.services, vec!["c", "a"]);
    }

    #[test]
    fn test_empty_summary() {
        let summary = PairedPeers::from(&PairedPeerIndex::default());
        assert!(!summary.has_paired_wallets);
        assert!(summary.pub_keys.is_empty());
    }

    #[test]
    fn test_pairing_key_debug_hides_seed() {
        let key = PairingKey::new(PublicKey::new([9; 32]), [0x55; 32]);
        let rendered = format!("{:?}", key);
        assert!(!rendered.contains("seed"));
        assert!(rendered.contains("public_key"));
    }
}
