//! # Adapters Layer
//!
//! Reference implementations of the outbound ports.

pub mod crypto;
pub mod host;
pub mod relay;
pub mod scheduler;
pub mod storage;

pub use crypto::DalekCrypto;
pub use host::{PresentedRequest, RecordingHost};
pub use relay::{InMemoryRelay, RelayHub};
pub use scheduler::TokioScheduler;
pub use storage::{FileBackedKVStore, InMemoryKVStore};
