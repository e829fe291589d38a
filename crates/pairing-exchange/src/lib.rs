//! # Pairing Exchange
//!
//! Lets two wallets pair over a store-and-forward relay and then exchange
//! typed, signed and encrypted messages: account queries, payment and call
//! requests with their responses, and liveness pings.
//!
//! ## Protocol Guarantees
//!
//! | Guarantee | Enforcement Location |
//! |-----------|---------------------|
//! | Envelope signed over every header field and the payload | `envelope/message.rs` - `signing_bytes()` |
//! | Receiver must be the verifying pairing key | `envelope/codec.rs` - `verify()` |
//! | Handshake resolves once, its loop is cancelled once | `service/handshake.rs` - `LinkWait::resolve()` |
//! | Record and index written in one batch | `service/registry.rs` - `add()` |
//! | Redelivered envelopes are not dispatched twice | `service/poller.rs` - seen cache |
//! | No lock held across `.await` | all of `service/` |
//!
//! ## Pairing Flow
//!
//! ```text
//! [Idle] ──derive──→ [AwaitingLinkSend] ──send LINK──→ [AwaitingLinkResponse]
//!                                                            │
//!              ┌───────────────┬──────────────┬──────────────┤
//!              ↓               ↓              ↓              ↓
//!          [Paired]       [Rejected]     [TimedOut]      [Failed]
//! ```
//!
//! ## Steady State
//!
//! | Envelope | Handling |
//! |----------|----------|
//! | `ping` | Reply `pong` echoing the text |
//! | `accountRequest` | Reply with the host's receive address, or `unsupported_scope` |
//! | `paymentRequest` / `callRequest` | Present to the host, answer later via `respond()` |
//! | responses / `pong` | Logged |
//! | `link` | Left for a running handshake |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/ - in-memory relay, dalek crypto, KV stores, tokio    │
//! │              scheduler, recording host                          │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - PairingExchangeApi trait                   │
//! │  ports/outbound.rs - RelayClient, CryptoCapability,             │
//! │                      KeyValueStore, HostApplication, Scheduler  │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/   - keys, records, payloads, handshake state machine   │
//! │  envelope/ - MessageEnvelope and its codec                      │
//! │  service/  - handshake, poller, dispatcher, registry, facade    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! let exchange = PairingExchange::new(ExchangeConfig::from_env()?, master, deps)?;
//! let outcome = exchange.initiate_pairing(&remote_hex, "shop", "checkout").await?;
//! exchange.send_ping(&outcome.peer.public_key, "hello").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod envelope;
pub mod ports;
pub mod service;

pub use config::{ConfigError, ExchangeConfig};
pub use domain::*;
pub use envelope::{EnvelopeCodec, MessageEnvelope, OpenError};
pub use ports::*;
pub use service::{ExchangeDependencies, PairingExchange};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
