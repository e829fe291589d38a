//! In-process store-and-forward relay.
//!
//! A [`RelayHub`] holds one mailbox per endpoint. Each [`InMemoryRelay`]
//! client is bound to one endpoint and receives every envelope addressed to
//! a public key it registered. Entries stay in the mailbox until
//! acknowledged; acknowledging twice is harmless.

use crate::domain::{Cursor, InboxEntry, InboxPage, PublicKey, RelayError};
use crate::ports::RelayClient;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Entries returned per fetch unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 16;

struct StoredEntry {
    seq: u64,
    cursor: Cursor,
    payload: Vec<u8>,
    acknowledged: bool,
}

#[derive(Default)]
struct RelayState {
    next_seq: u64,
    mailboxes: HashMap<String, Vec<StoredEntry>>,
    routes: HashMap<PublicKey, String>,
}

impl RelayState {
    fn enqueue(&mut self, endpoint: &str, payload: Vec<u8>) -> Cursor {
        self.next_seq += 1;
        let seq = self.next_seq;
        let cursor = Cursor::new(format!("c-{:016x}", seq));
        self.mailboxes
            .entry(endpoint.to_string())
            .or_default()
            .push(StoredEntry {
                seq,
                cursor: cursor.clone(),
                payload,
                acknowledged: false,
            });
        cursor
    }
}

/// Shared relay backend.
#[derive(Clone)]
pub struct RelayHub {
    state: Arc<Mutex<RelayState>>,
    page_size: usize,
}

impl RelayHub {
    /// Relay with the default page size.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Relay returning at most `page_size` entries per fetch.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(RelayState::default())),
            page_size: page_size.max(1),
        }
    }

    /// Client bound to the mailbox called `name`.
    pub fn endpoint(&self, name: impl Into<String>) -> InMemoryRelay {
        let owner = name.into();
        self.state.lock().mailboxes.entry(owner.clone()).or_default();
        InMemoryRelay {
            state: Arc::clone(&self.state),
            owner,
            page_size: self.page_size,
            fetches: Arc::new(AtomicUsize::new(0)),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Relay client for one endpoint.
#[derive(Clone)]
pub struct InMemoryRelay {
    state: Arc<Mutex<RelayState>>,
    owner: String,
    page_size: usize,
    fetches: Arc<AtomicUsize>,
    offline: Arc<AtomicBool>,
}

impl InMemoryRelay {
    /// Mailbox name.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Number of `fetch_inbox` calls made through this client.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Simulate losing the connection. Every call fails while offline.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Unacknowledged entries in this mailbox.
    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .mailboxes
            .get(&self.owner)
            .map(|entries| entries.iter().filter(|e| !e.acknowledged).count())
            .unwrap_or(0)
    }

    /// Put raw bytes straight into this mailbox.
    pub fn inject(&self, payload: Vec<u8>) -> Cursor {
        self.state.lock().enqueue(&self.owner, payload)
    }

    /// Forget every acknowledgment, as a relay that lost its ack log would.
    pub fn redeliver_all(&self) {
        if let Some(entries) = self.state.lock().mailboxes.get_mut(&self.owner) {
            for entry in entries.iter_mut() {
                entry.acknowledged = false;
            }
        }
    }

    fn ensure_online(&self) -> Result<(), RelayError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RelayError::Unavailable("relay offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RelayClient for InMemoryRelay {
    async fn send(&self, recipient: &PublicKey, envelope: Vec<u8>) -> Result<(), RelayError> {
        self.ensure_online()?;
        let mut state = self.state.lock();
        let Some(endpoint) = state.routes.get(recipient).cloned() else {
            return Err(RelayError::Rejected(format!(
                "no inbox registered for {}",
                recipient
            )));
        };
        let cursor = state.enqueue(&endpoint, envelope);
        debug!(from = %self.owner, to = %endpoint, %cursor, "[relay] queued envelope");
        Ok(())
    }

    async fn fetch_inbox(&self, after: Option<Cursor>) -> Result<InboxPage, RelayError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.ensure_online()?;

        let state = self.state.lock();
        let Some(entries) = state.mailboxes.get(&self.owner) else {
            return Ok(InboxPage::default());
        };

        let after_seq = match after {
            Some(cursor) => entries
                .iter()
                .find(|e| e.cursor == cursor)
                .map(|e| e.seq)
                .ok_or_else(|| RelayError::UnknownCursor(cursor.to_string()))?,
            None => 0,
        };

        let mut waiting = entries
            .iter()
            .filter(|e| e.seq > after_seq && !e.acknowledged);
        let page: Vec<InboxEntry> = waiting
            .by_ref()
            .take(self.page_size)
            .map(|e| InboxEntry {
                cursor: e.cursor.clone(),
                payload: e.payload.clone(),
                acknowledged: e.acknowledged,
            })
            .collect();
        let next = match (waiting.next(), page.last()) {
            (Some(_), Some(last)) => Some(last.cursor.clone()),
            _ => None,
        };

        Ok(InboxPage {
            entries: page,
            next,
        })
    }

    async fn send_ack(&self, cursor: &Cursor) -> Result<(), RelayError> {
        self.ensure_online()?;
        let mut state = self.state.lock();
        let entry = state
            .mailboxes
            .get_mut(&self.owner)
            .and_then(|entries| entries.iter_mut().find(|e| &e.cursor == cursor))
            .ok_or_else(|| RelayError::UnknownCursor(cursor.to_string()))?;
        entry.acknowledged = true;
        Ok(())
    }

    async fn register_public_key(&self, key: &PublicKey) -> Result<(), RelayError> {
        self.ensure_online()?;
        let mut state = self.state.lock();
        match state.routes.get(key) {
            Some(owner) if owner != &self.owner => Err(RelayError::Rejected(format!(
                "{} is registered to another inbox",
                key
            ))),
            Some(_) => Ok(()),
            None => {
                state.routes.insert(*key, self.owner.clone());
                debug!(owner = %self.owner, %key, "[relay] registered recipient");
                Ok(())
            }
        }
    }
}
