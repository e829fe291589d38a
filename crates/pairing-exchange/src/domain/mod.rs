//! # Domain Layer
//!
//! Keys, records, payloads and the handshake state machine. Nothing here
//! performs I/O.

pub mod entities;
pub mod errors;
pub mod handshake;
pub mod messages;
pub mod seen_cache;
pub mod value_objects;

pub use entities::{
    FetchReport, InboxEntry, InboxPage, PairedPeerIndex, PairedPeerRecord, PairedPeers,
    PairingKey, PairingOutcome, PeerIndexEntry,
};
pub use errors::{CryptoError, ExchangeError, KVStoreError, RegistryError, RelayError};
pub use handshake::{HandshakeProgress, HandshakeState, InvalidTransition};
pub use messages::{
    AccountRequest, AccountResponse, CallRequest, CallResponse, ErrorCode, IncomingRequest,
    LinkMessage, MessageType, PaymentRequest, PaymentResponse, Payload, PingMessage, PongMessage,
    ResponseStatus, SendResult,
};
pub use seen_cache::SeenEnvelopes;
pub use value_objects::{Cursor, MasterKey, Nonce, PublicKey, RequestId};
