//! # Service Layer
//!
//! The handshake, the steady-state poller, the dispatcher and the facade that
//! wires them over the outbound ports.

mod dispatcher;
mod exchange;
mod handshake;
mod pending;
mod poller;
mod registry;

pub use dispatcher::{Disposition, MessageDispatcher};
pub use exchange::{ExchangeDependencies, PairingExchange};
pub use handshake::PairingHandshake;
pub use pending::{PendingRequest, PendingRequests};
pub use poller::InboxPoller;
pub use registry::PairedPeerRegistry;

use crate::domain::{Cursor, ExchangeError};
use crate::envelope::{EnvelopeCodec, MessageEnvelope};
use crate::ports::RelayClient;
use link_telemetry::{metric_inc, ACKS_SENT, ENVELOPES_SENT};
use tracing::{debug, warn};

/// Encode `envelope` and hand it to the relay, addressed to its receiver.
pub(crate) async fn deliver(
    codec: &EnvelopeCodec,
    relay: &dyn RelayClient,
    envelope: &MessageEnvelope,
) -> Result<(), ExchangeError> {
    let bytes = codec.encode(envelope)?;
    relay
        .send(envelope.receiver(), bytes)
        .await
        .map_err(|e| ExchangeError::SendFailed(e.to_string()))?;

    metric_inc!(ENVELOPES_SENT, &[envelope.message_type().as_str()]);
    debug!(
        id = %envelope.id(),
        message_type = %envelope.message_type(),
        "[relay] envelope sent"
    );
    Ok(())
}

/// Best-effort acknowledgment. Returns whether the relay accepted it.
pub(crate) async fn acknowledge(relay: &dyn RelayClient, cursor: &Cursor) -> bool {
    match relay.send_ack(cursor).await {
        Ok(()) => {
            metric_inc!(ACKS_SENT);
            true
        }
        Err(e) => {
            warn!(%cursor, error = %e, "[relay] acknowledgment failed");
            false
        }
    }
}
