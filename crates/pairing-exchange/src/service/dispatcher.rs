//! # Message Dispatcher
//!
//! Routes one parsed envelope to its handler and decides whether the inbox
//! entry it came from is acknowledged or left for a later cycle.
//!
//! | Situation | Disposition |
//! |-----------|-------------|
//! | `link` envelope | retain (belongs to a running handshake) |
//! | sender not paired | acknowledge, no reply |
//! | registry unreadable | retain |
//! | signature or receiver check fails | acknowledge |
//! | decryption fails | retain |
//! | payload malformed | acknowledge |
//! | handled | acknowledge, even if the reply could not be sent |

use super::deliver;
use super::pending::{PendingRequest, PendingRequests};
use super::registry::PairedPeerRegistry;
use crate::domain::{
    AccountRequest, AccountResponse, CallRequest, CallResponse, ErrorCode, ExchangeError,
    IncomingRequest, MessageType, PairedPeerRecord, PairingKey, Payload, PaymentRequest,
    PaymentResponse, PingMessage, PongMessage, RequestId, SendResult,
};
use crate::envelope::{EnvelopeCodec, MessageEnvelope};
use crate::ports::{HostApplication, RelayClient};
use link_telemetry::{log_peer_event, metric_inc, VERIFICATION_FAILURES};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What to do with the inbox entry after dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Consume the entry.
    Acknowledge,
    /// Leave the entry for a later fetch.
    Retain,
}

/// Per-type handlers for inbound envelopes.
pub struct MessageDispatcher {
    codec: EnvelopeCodec,
    relay: Arc<dyn RelayClient>,
    registry: Arc<PairedPeerRegistry>,
    host: Arc<dyn HostApplication>,
    pending: PendingRequests,
}

impl MessageDispatcher {
    /// Dispatcher replying through `relay`.
    pub fn new(
        codec: EnvelopeCodec,
        relay: Arc<dyn RelayClient>,
        registry: Arc<PairedPeerRegistry>,
        host: Arc<dyn HostApplication>,
        pending_ttl: Duration,
    ) -> Self {
        Self {
            codec,
            relay,
            registry,
            host,
            pending: PendingRequests::new(pending_ttl),
        }
    }

    /// Handle one envelope.
    pub async fn process(&self, envelope: &MessageEnvelope) -> Disposition {
        if envelope.message_type() == MessageType::Link {
            debug!(id = %envelope.id(), "[dispatch] leaving link envelope for the handshake");
            return Disposition::Retain;
        }

        let sender = *envelope.sender();
        let (peer, key) = match self.registry.pairing_key_for(&sender) {
            Ok(Some(found)) => found,
            Ok(None) => {
                let err = ExchangeError::UnknownPeer(sender);
                log_peer_event!(
                    warn,
                    "[dispatch] dropping envelope from unpaired wallet",
                    sender,
                    message_type = %envelope.message_type(),
                    error = %err
                );
                return Disposition::Acknowledge;
            }
            Err(e) => {
                warn!(error = %e, "[dispatch] registry unavailable, retrying later");
                return Disposition::Retain;
            }
        };

        if !self.codec.verify(envelope, &key) {
            metric_inc!(VERIFICATION_FAILURES);
            log_peer_event!(
                warn,
                "[dispatch] discarding envelope that failed verification",
                sender,
                id = %envelope.id()
            );
            return Disposition::Acknowledge;
        }

        let plaintext = match self.codec.decrypt(envelope, &key) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                log_peer_event!(warn, "[dispatch] decryption failed", sender, error = %e);
                return Disposition::Retain;
            }
        };

        match envelope.message_type() {
            MessageType::Link => Disposition::Retain,
            MessageType::Ping => match parse::<PingMessage>(&plaintext) {
                Some(ping) => {
                    let pong = PongMessage {
                        message: ping.message,
                    };
                    self.reply(envelope, &key, &pong).await;
                    Disposition::Acknowledge
                }
                None => Disposition::Acknowledge,
            },
            MessageType::Pong => {
                if let Some(pong) = parse::<PongMessage>(&plaintext) {
                    log_peer_event!(info, "[dispatch] pong received", sender, text = %pong.message);
                }
                Disposition::Acknowledge
            }
            MessageType::AccountRequest => {
                if let Some(request) = parse::<AccountRequest>(&plaintext) {
                    let address = self.host.current_receive_address(&request.scope).await;
                    let response = match address {
                        Some(address) => AccountResponse::accepted(request.scope, address),
                        None => {
                            AccountResponse::rejected(request.scope, ErrorCode::UnsupportedScope)
                        }
                    };
                    self.reply(envelope, &key, &response).await;
                }
                Disposition::Acknowledge
            }
            MessageType::PaymentRequest => {
                if let Some(request) = parse::<PaymentRequest>(&plaintext) {
                    self.present(peer, envelope, IncomingRequest::Payment(request))
                        .await;
                }
                Disposition::Acknowledge
            }
            MessageType::CallRequest => {
                if let Some(request) = parse::<CallRequest>(&plaintext) {
                    self.present(peer, envelope, IncomingRequest::Call(request))
                        .await;
                }
                Disposition::Acknowledge
            }
            MessageType::AccountResponse => {
                if let Some(response) = parse::<AccountResponse>(&plaintext) {
                    log_peer_event!(
                        info,
                        "[dispatch] account response received",
                        sender,
                        scope = %response.scope,
                        status = ?response.status
                    );
                }
                Disposition::Acknowledge
            }
            MessageType::PaymentResponse => {
                if let Some(response) = parse::<PaymentResponse>(&plaintext) {
                    log_peer_event!(info, "[dispatch] payment response received", sender, status = ?response.status);
                }
                Disposition::Acknowledge
            }
            MessageType::CallResponse => {
                if let Some(response) = parse::<CallResponse>(&plaintext) {
                    log_peer_event!(info, "[dispatch] call response received", sender, status = ?response.status);
                }
                Disposition::Acknowledge
            }
        }
    }

    /// Answer a pending payment or call request.
    ///
    /// # Errors
    ///
    /// - `InvalidParameters` - no pending request with this id
    /// - `UnknownPeer` - the requesting wallet is no longer paired
    /// - `PersistenceWarning` - the registry could not be read
    /// - `ConstructionError` / `SendFailed` - the reply could not be delivered
    ///
    /// On any error but the first the request stays pending so the host can retry.
    pub async fn respond(&self, id: RequestId, result: SendResult) -> Result<(), ExchangeError> {
        let pending = self.pending.take(&id).ok_or_else(|| {
            ExchangeError::InvalidParameters(format!("no pending request with id {}", id))
        })?;

        let key = match self.registry.pairing_key_for(&pending.peer.public_key) {
            Ok(Some((_, key))) => key,
            Ok(None) => {
                let err = ExchangeError::UnknownPeer(pending.peer.public_key);
                self.pending.insert(pending);
                return Err(err);
            }
            Err(e) => {
                self.pending.insert(pending);
                return Err(e.into());
            }
        };

        let sent = match &pending.request {
            IncomingRequest::Payment(_) => {
                let response = PaymentResponse::from_result(&result);
                self.send_reply(&pending.envelope, &key, &response).await
            }
            IncomingRequest::Call(_) => {
                let response = CallResponse::from_result(&result);
                self.send_reply(&pending.envelope, &key, &response).await
            }
        };

        if let Err(e) = sent {
            self.pending.insert(pending);
            return Err(e);
        }

        if let (IncomingRequest::Call(call), Some(transaction_id)) =
            (&pending.request, result.transaction_id())
        {
            self.host.register_derived_asset(call, transaction_id).await;
        }

        log_peer_event!(
            info,
            "[dispatch] request answered",
            pending.peer.public_key,
            request_id = %id,
            accepted = result.transaction_id().is_some()
        );
        Ok(())
    }

    /// Drop pending requests past their TTL.
    pub fn purge_expired(&self) -> usize {
        let purged = self.pending.purge_expired();
        if purged > 0 {
            info!(purged, "[dispatch] expired unanswered requests");
        }
        purged
    }

    /// Requests waiting on the host.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    async fn present(
        &self,
        peer: PairedPeerRecord,
        envelope: &MessageEnvelope,
        request: IncomingRequest,
    ) {
        let pending = PendingRequest::new(peer.clone(), envelope.clone(), request.clone());
        let id = pending.id;
        self.pending.insert(pending);

        log_peer_event!(
            info,
            "[dispatch] presenting request to host",
            peer.public_key,
            request_id = %id,
            message_type = %request.message_type()
        );
        self.host.present_request(id, &peer, request).await;
    }

    async fn reply<P: Payload>(&self, original: &MessageEnvelope, key: &PairingKey, payload: &P) {
        if let Err(e) = self.send_reply(original, key, payload).await {
            log_peer_event!(
                warn,
                "[dispatch] reply not delivered",
                original.sender(),
                message_type = %P::MESSAGE_TYPE,
                error = %e
            );
        }
    }

    async fn send_reply<P: Payload>(
        &self,
        original: &MessageEnvelope,
        key: &PairingKey,
        payload: &P,
    ) -> Result<(), ExchangeError> {
        let reply = self.codec.build_reply(original, key, payload)?;
        deliver(&self.codec, self.relay.as_ref(), &reply).await
    }
}

fn parse<P: Payload>(plaintext: &[u8]) -> Option<P> {
    match serde_json::from_slice(plaintext) {
        Ok(payload) => Some(payload),
        Err(e) => {
            warn!(
                message_type = %P::MESSAGE_TYPE,
                error = %e,
                "[dispatch] discarding malformed payload"
            );
            None
        }
    }
}
