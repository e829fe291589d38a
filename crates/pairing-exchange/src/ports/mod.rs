//! # Ports Layer
//!
//! Inbound API and outbound collaborator traits.

pub mod inbound;
pub mod outbound;

pub use inbound::PairingExchangeApi;
pub use outbound::{
    BatchOperation, CryptoCapability, HostApplication, KeyValueStore, RelayClient, Scheduler,
    TaskHandle, Tick, TickFn, TickFuture,
};
