//! # Pairing Exchange Facade
//!
//! Single entry point for the host. Owns the registry, dispatcher, poller
//! and handshake driver and wires them over the injected ports.

use super::deliver;
use super::dispatcher::MessageDispatcher;
use super::handshake::PairingHandshake;
use super::poller::InboxPoller;
use super::registry::PairedPeerRegistry;
use crate::config::ExchangeConfig;
use crate::domain::{
    ExchangeError, FetchReport, MasterKey, PairedPeers, PairingOutcome, PingMessage, PublicKey,
    RequestId, SendResult,
};
use crate::envelope::EnvelopeCodec;
use crate::ports::{
    CryptoCapability, HostApplication, KeyValueStore, PairingExchangeApi, RelayClient, Scheduler,
};
use async_trait::async_trait;
use link_telemetry::log_peer_event;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Outbound collaborators of a [`PairingExchange`].
#[derive(Clone)]
pub struct ExchangeDependencies {
    /// Store-and-forward transport
    pub relay: Arc<dyn RelayClient>,
    /// Key derivation, encryption and signatures
    pub crypto: Arc<dyn CryptoCapability>,
    /// Paired-peer persistence
    pub store: Arc<dyn KeyValueStore>,
    /// Host application callbacks
    pub host: Arc<dyn HostApplication>,
    /// Timer source for both poll loops
    pub scheduler: Arc<dyn Scheduler>,
}

/// Pairing exchange service.
pub struct PairingExchange {
    codec: EnvelopeCodec,
    relay: Arc<dyn RelayClient>,
    registry: Arc<PairedPeerRegistry>,
    dispatcher: Arc<MessageDispatcher>,
    poller: Arc<InboxPoller>,
    handshake: PairingHandshake,
}

impl PairingExchange {
    /// Wire the exchange and bring the paired-peer index in line with the
    /// stored records.
    ///
    /// # Errors
    ///
    /// `InvalidParameters` if `config` fails validation.
    pub fn new(
        config: ExchangeConfig,
        master: MasterKey,
        deps: ExchangeDependencies,
    ) -> Result<Self, ExchangeError> {
        config
            .validate()
            .map_err(|e| ExchangeError::InvalidParameters(e.to_string()))?;

        let master = Arc::new(master);
        let codec = EnvelopeCodec::new(Arc::clone(&deps.crypto));
        let registry = Arc::new(PairedPeerRegistry::new(
            Arc::clone(&deps.store),
            Arc::clone(&deps.crypto),
            Arc::clone(&master),
        ));

        match registry.reconcile() {
            Ok(0) => {}
            Ok(changes) => info!(changes, "[exchange] paired-peer index repaired"),
            Err(e) => warn!(error = %e, "[exchange] could not reconcile paired-peer index"),
        }

        let dispatcher = Arc::new(MessageDispatcher::new(
            codec.clone(),
            Arc::clone(&deps.relay),
            Arc::clone(&registry),
            Arc::clone(&deps.host),
            config.pending_request_ttl(),
        ));
        let poller = Arc::new(InboxPoller::new(
            Arc::clone(&deps.relay),
            codec.clone(),
            Arc::clone(&dispatcher),
            Arc::clone(&registry),
            Arc::clone(&deps.scheduler),
            config.clone(),
        ));
        let handshake = PairingHandshake::new(
            config,
            master,
            deps.crypto,
            codec.clone(),
            Arc::clone(&deps.relay),
            Arc::clone(&registry),
            deps.host,
            deps.scheduler,
            Arc::clone(&poller),
        );

        Ok(Self {
            codec,
            relay: deps.relay,
            registry,
            dispatcher,
            poller,
            handshake,
        })
    }

    /// Whether the steady-state loop is running.
    pub fn is_polling(&self) -> bool {
        self.poller.is_running()
    }

    /// Payment and call requests still waiting on the host.
    pub fn pending_requests(&self) -> usize {
        self.dispatcher.pending_len()
    }
}

#[async_trait]
impl PairingExchangeApi for PairingExchange {
    async fn initiate_pairing(
        &self,
        remote_public_key_hex: &str,
        identifier: &str,
        service: &str,
    ) -> Result<PairingOutcome, ExchangeError> {
        self.handshake
            .initiate(remote_public_key_hex, identifier, service)
            .await
    }

    async fn reject_pairing(
        &self,
        remote_public_key_hex: &str,
        identifier: &str,
        service: &str,
    ) -> Result<(), ExchangeError> {
        self.handshake
            .reject(remote_public_key_hex, identifier, service)
            .await
    }

    async fn fetch_inbox_now(&self) -> Result<FetchReport, ExchangeError> {
        self.poller.fetch_once().await
    }

    fn start_polling(&self) -> bool {
        self.poller.start()
    }

    fn stop_polling(&self) {
        self.poller.stop();
    }

    fn set_push_enabled(&self, enabled: bool) {
        self.poller.on_push_preference_changed(enabled);
    }

    fn paired_peers(&self) -> Result<PairedPeers, ExchangeError> {
        Ok(self.registry.paired_peers()?)
    }

    async fn send_ping(&self, remote: &PublicKey, message: &str) -> Result<Uuid, ExchangeError> {
        let (_, key) = self
            .registry
            .pairing_key_for(remote)?
            .ok_or(ExchangeError::UnknownPeer(*remote))?;

        let ping = PingMessage {
            message: message.to_string(),
        };
        let envelope = self.codec.build(remote, &key, &ping)?;
        deliver(&self.codec, self.relay.as_ref(), &envelope).await?;

        log_peer_event!(debug, "[exchange] ping sent", remote, id = %envelope.id());
        Ok(envelope.id())
    }

    async fn respond(&self, request_id: RequestId, result: SendResult) -> Result<(), ExchangeError> {
        self.dispatcher.respond(request_id, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{DalekCrypto, InMemoryKVStore, RecordingHost, RelayHub, TokioScheduler};

    fn deps(hub: &RelayHub) -> ExchangeDependencies {
        ExchangeDependencies {
            relay: Arc::new(hub.endpoint("wallet")),
            crypto: Arc::new(DalekCrypto::new()),
            store: Arc::new(InMemoryKVStore::new()),
            host: Arc::new(RecordingHost::new()),
            scheduler: Arc::new(TokioScheduler::new()),
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ExchangeConfig {
            poll_interval_secs: 0,
            ..ExchangeConfig::default()
        };
        let result = PairingExchange::new(config, MasterKey::new([1; 32]), deps(&RelayHub::new()));
        assert!(matches!(result, Err(ExchangeError::InvalidParameters(_))));
    }

    #[tokio::test]
    async fn test_fresh_exchange_has_no_peers() {
        let exchange = PairingExchange::new(
            ExchangeConfig::default(),
            MasterKey::new([1; 32]),
            deps(&RelayHub::new()),
        )
        .unwrap();

        let peers = exchange.paired_peers().unwrap();
        assert!(!peers.has_paired_wallets);
        assert!(!exchange.start_polling());
        assert!(!exchange.is_polling());
        exchange.stop_polling();
    }

    #[tokio::test]
    async fn test_ping_to_unpaired_wallet() {
        let exchange = PairingExchange::new(
            ExchangeConfig::default(),
            MasterKey::new([1; 32]),
            deps(&RelayHub::new()),
        )
        .unwrap();

        let stranger = PublicKey::new([7; 32]);
        let err = exchange.send_ping(&stranger, "hello").await.unwrap_err();
        assert_eq!(err, ExchangeError::UnknownPeer(stranger));
    }

    #[tokio::test]
    async fn test_initiate_with_bad_key() {
        let exchange = PairingExchange::new(
            ExchangeConfig::default(),
            MasterKey::new([1; 32]),
            deps(&RelayHub::new()),
        )
        .unwrap();

        let err = exchange
            .initiate_pairing("zz", "shop", "checkout")
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidParameters(_)));

        let err = exchange
            .initiate_pairing(&"ab".repeat(32), "  ", "checkout")
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidParameters(_)));
    }
}
