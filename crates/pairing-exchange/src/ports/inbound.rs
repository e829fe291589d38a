//! # Inbound Ports
//!
//! API the host application drives.

use crate::domain::{
    ExchangeError, FetchReport, PairedPeers, PairingOutcome, PublicKey, RequestId, SendResult,
};
use async_trait::async_trait;
use uuid::Uuid;

/// Pairing exchange API - inbound port.
#[async_trait]
pub trait PairingExchangeApi: Send + Sync {
    /// Send a LINK request to `remote_public_key_hex` and wait for the answer.
    ///
    /// Resolves exactly once: on approval, rejection, mismatch, malformed
    /// response, or when the poll budget runs out.
    async fn initiate_pairing(
        &self,
        remote_public_key_hex: &str,
        identifier: &str,
        service: &str,
    ) -> Result<PairingOutcome, ExchangeError>;

    /// Decline a pairing request without waiting for anything.
    async fn reject_pairing(
        &self,
        remote_public_key_hex: &str,
        identifier: &str,
        service: &str,
    ) -> Result<(), ExchangeError>;

    /// Run one steady-state fetch cycle now.
    async fn fetch_inbox_now(&self) -> Result<FetchReport, ExchangeError>;

    /// Start periodic polling. Returns whether a poll loop is running afterwards.
    fn start_polling(&self) -> bool;

    /// Stop periodic polling. Always safe.
    fn stop_polling(&self);

    /// Push preference changed: enabled stops polling, disabled restarts it.
    fn set_push_enabled(&self, enabled: bool);

    /// Keys and service tags of every paired wallet.
    fn paired_peers(&self) -> Result<PairedPeers, ExchangeError>;

    /// Send a ping to a paired wallet. Returns the envelope id.
    async fn send_ping(&self, remote: &PublicKey, message: &str) -> Result<Uuid, ExchangeError>;

    /// Answer a payment or call request previously handed to the host.
    async fn respond(&self, request_id: RequestId, result: SendResult)
        -> Result<(), ExchangeError>;
}
