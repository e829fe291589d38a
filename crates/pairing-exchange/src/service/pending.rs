//! Payment and call requests waiting for the host's answer.

use crate::domain::{IncomingRequest, PairedPeerRecord, RequestId};
use crate::envelope::MessageEnvelope;
use link_telemetry::PENDING_REQUESTS;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// A request presented to the host and not yet answered.
#[derive(Clone, Debug)]
pub struct PendingRequest {
    /// Handle given to the host.
    pub id: RequestId,
    /// Wallet that sent the request.
    pub peer: PairedPeerRecord,
    /// Envelope the reply will answer.
    pub envelope: MessageEnvelope,
    /// Decrypted request.
    pub request: IncomingRequest,
    received_at: Instant,
}

impl PendingRequest {
    /// New entry stamped with the current time.
    pub fn new(peer: PairedPeerRecord, envelope: MessageEnvelope, request: IncomingRequest) -> Self {
        Self {
            id: RequestId::generate(),
            peer,
            envelope,
            request,
            received_at: Instant::now(),
        }
    }
}

/// Pending requests keyed by id, expiring after a TTL.
pub struct PendingRequests {
    entries: Mutex<HashMap<RequestId, PendingRequest>>,
    ttl: Duration,
}

impl PendingRequests {
    /// Empty registry.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Store a request.
    pub fn insert(&self, request: PendingRequest) {
        let mut entries = self.entries.lock();
        entries.insert(request.id, request);
        PENDING_REQUESTS.set(entries.len() as f64);
    }

    /// Remove and return a request.
    pub fn take(&self, id: &RequestId) -> Option<PendingRequest> {
        let mut entries = self.entries.lock();
        let taken = entries.remove(id);
        PENDING_REQUESTS.set(entries.len() as f64);
        taken
    }

    /// Drop requests older than the TTL. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, pending| pending.received_at.elapsed() < self.ttl);
        PENDING_REQUESTS.set(entries.len() as f64);
        before - entries.len()
    }

    /// Number of waiting requests.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
