//! Host application that records every callback.
//!
//! Useful for headless deployments that poll for presented requests, and
//! for tests.

use crate::domain::{CallRequest, IncomingRequest, PairedPeerRecord, RequestId};
use crate::ports::HostApplication;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Request handed to [`RecordingHost::present_request`].
#[derive(Clone, Debug, PartialEq)]
pub struct PresentedRequest {
    /// Id to pass back to `respond`.
    pub id: RequestId,
    /// Sending wallet.
    pub peer: PairedPeerRecord,
    /// The request itself.
    pub request: IncomingRequest,
}

/// In-memory host with configurable receive addresses.
#[derive(Default)]
pub struct RecordingHost {
    push_enabled: AtomicBool,
    addresses: Mutex<HashMap<String, String>>,
    presented: Mutex<Vec<PresentedRequest>>,
    derived_assets: Mutex<Vec<(CallRequest, String)>>,
}

impl RecordingHost {
    /// Host with push disabled and no addresses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style receive address for `scope`.
    pub fn with_address(self, scope: impl Into<String>, address: impl Into<String>) -> Self {
        self.addresses.lock().insert(scope.into(), address.into());
        self
    }

    /// Toggle the push preference reported to the exchange.
    pub fn set_push_enabled(&self, enabled: bool) {
        self.push_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Requests presented so far, oldest first.
    pub fn presented(&self) -> Vec<PresentedRequest> {
        self.presented.lock().clone()
    }

    /// Derived assets registered so far.
    pub fn derived_assets(&self) -> Vec<(CallRequest, String)> {
        self.derived_assets.lock().clone()
    }
}

#[async_trait]
impl HostApplication for RecordingHost {
    fn is_push_enabled(&self) -> bool {
        self.push_enabled.load(Ordering::SeqCst)
    }

    async fn present_request(
        &self,
        request_id: RequestId,
        peer: &PairedPeerRecord,
        request: IncomingRequest,
    ) {
        self.presented.lock().push(PresentedRequest {
            id: request_id,
            peer: peer.clone(),
            request,
        });
    }

    async fn current_receive_address(&self, scope: &str) -> Option<String> {
        self.addresses.lock().get(scope).cloned()
    }

    async fn register_derived_asset(&self, call: &CallRequest, transaction_id: &str) {
        self.derived_assets
            .lock()
            .push((call.clone(), transaction_id.to_string()));
    }
}
