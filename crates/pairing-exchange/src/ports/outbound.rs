//! # Outbound Ports
//!
//! Traits for the collaborators the exchange drives: relay transport,
//! crypto primitives, persistent storage, the host application and timers.

use crate::domain::{
    CallRequest, CryptoError, Cursor, InboxPage, IncomingRequest, KVStoreError, MasterKey, Nonce,
    PairedPeerRecord, PairingKey, PublicKey, RelayError, RequestId,
};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Store-and-forward relay - outbound port.
///
/// Envelopes are opaque to the relay; it only routes by recipient key.
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Queue an encoded envelope for `recipient`.
    async fn send(&self, recipient: &PublicKey, envelope: Vec<u8>) -> Result<(), RelayError>;

    /// Fetch one page of entries addressed to any key this client registered.
    ///
    /// `after` is the continuation cursor of the previous page.
    async fn fetch_inbox(&self, after: Option<Cursor>) -> Result<InboxPage, RelayError>;

    /// Mark an entry consumed. Acknowledging twice is not an error.
    async fn send_ack(&self, cursor: &Cursor) -> Result<(), RelayError>;

    /// Route envelopes addressed to `key` to this client's inbox.
    async fn register_public_key(&self, key: &PublicKey) -> Result<(), RelayError>;
}

/// Crypto primitives - outbound port.
pub trait CryptoCapability: Send + Sync {
    /// Deterministically derive the pairing key for one remote identifier.
    fn derive_pairing_key(
        &self,
        master: &MasterKey,
        identifier: &str,
    ) -> Result<PairingKey, CryptoError>;

    /// Fresh random nonce.
    fn generate_nonce(&self) -> Nonce;

    /// Authenticated encryption towards `recipient`.
    fn encrypt(
        &self,
        key: &PairingKey,
        plaintext: &[u8],
        nonce: &Nonce,
        recipient: &PublicKey,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Authenticated decryption of a ciphertext from `sender`.
    fn decrypt(
        &self,
        key: &PairingKey,
        ciphertext: &[u8],
        nonce: &Nonce,
        sender: &PublicKey,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Detached signature over `message`.
    fn sign(&self, key: &PairingKey, message: &[u8]) -> Vec<u8>;

    /// Check a detached signature.
    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &[u8]) -> bool;
}

/// Abstract interface for key-value storage - outbound port.
///
/// Implementations use interior mutability so one store can be shared
/// behind an `Arc`.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either every operation is applied or none is.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError>;

    /// Scan keys with a given prefix.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, KVStoreError>;
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put {
        /// Key bytes
        key: Vec<u8>,
        /// Value bytes
        value: Vec<u8>,
    },
    /// Delete a key.
    Delete {
        /// Key bytes
        key: Vec<u8>,
    },
}

impl BatchOperation {
    /// Create a put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Host application - outbound port.
#[async_trait]
pub trait HostApplication: Send + Sync {
    /// Whether push delivery replaces steady-state polling.
    fn is_push_enabled(&self) -> bool;

    /// Show a payment or call request to the user. The answer comes back
    /// later through `PairingExchangeApi::respond` with the same id.
    async fn present_request(
        &self,
        request_id: RequestId,
        peer: &PairedPeerRecord,
        request: IncomingRequest,
    );

    /// Receive address for a currency scope, if the wallet has one.
    async fn current_receive_address(&self, scope: &str) -> Option<String>;

    /// Called after a contract call was broadcast on the user's behalf.
    async fn register_derived_asset(&self, call: &CallRequest, transaction_id: &str);
}

/// Whether a periodic task wants another tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// Keep running.
    Continue,
    /// End the loop.
    Stop,
}

/// Future returned by one tick of a periodic task.
pub type TickFuture = Pin<Box<dyn Future<Output = Tick> + Send + 'static>>;

/// Body of a periodic task.
pub type TickFn = Box<dyn FnMut() -> TickFuture + Send + 'static>;

/// Timer service - outbound port.
pub trait Scheduler: Send + Sync {
    /// Run `task` every `period`, first after one period.
    ///
    /// Each tick is awaited before the next one can fire.
    fn every(&self, period: Duration, task: TickFn) -> TaskHandle;
}

/// Cancellation handle for a scheduled task.
#[derive(Clone, Debug)]
pub struct TaskHandle {
    cancel: Arc<watch::Sender<bool>>,
    finished: Arc<AtomicBool>,
}

impl TaskHandle {
    /// Handle for a task that has not been cancelled.
    pub fn new() -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            cancel: Arc::new(cancel),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Returns true only for the first call.
    pub fn cancel(&self) -> bool {
        !self.cancel.send_replace(true)
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Completes once cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel.subscribe();
        loop {
            let cancelled = *rx.borrow_and_update();
            if cancelled {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Record that the task loop has exited.
    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }

    /// Whether the task loop has exited.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_idempotent() {
        let handle = TaskHandle::new();
        assert!(!handle.is_cancelled());
        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let handle = TaskHandle::new();
        let waiter = handle.clone();
        let join = tokio::spawn(async move { waiter.cancelled().await });

        handle.cancel();
        join.await.unwrap();
    }

    #[test]
    fn test_batch_operation_constructors() {
        assert_eq!(
            BatchOperation::put(b"k".to_vec(), b"v".to_vec()),
            BatchOperation::Put {
                key: b"k".to_vec(),
                value: b"v".to_vec()
            }
        );
        assert_eq!(
            BatchOperation::delete(b"k".to_vec()),
            BatchOperation::Delete { key: b"k".to_vec() }
        );
    }
}
