//! Shared fixtures: a wallet running the full exchange and a scripted remote
//! wallet driving the other end by hand over the same relay.

#![allow(dead_code)]

use pairing_exchange::adapters::{
    DalekCrypto, InMemoryKVStore, InMemoryRelay, RecordingHost, RelayHub, TokioScheduler,
};
use pairing_exchange::{
    CryptoCapability, EnvelopeCodec, ExchangeConfig, ExchangeDependencies, KeyValueStore,
    LinkMessage, MasterKey, MessageEnvelope, MessageType, PairingExchange, PairingExchangeApi,
    PairingKey, PairingOutcome, Payload, PublicKey, RelayClient,
};
use std::sync::Arc;
use std::time::Duration;

pub const IDENTIFIER: &str = "shop.example";
pub const SERVICE: &str = "checkout";

/// The wallet under test.
pub struct Wallet {
    pub exchange: Arc<PairingExchange>,
    pub relay: InMemoryRelay,
    pub host: Arc<RecordingHost>,
}

impl Wallet {
    pub fn new(hub: &RelayHub, host: RecordingHost) -> Self {
        Self::with_store(hub, host, Arc::new(InMemoryKVStore::new()))
    }

    pub fn with_store(hub: &RelayHub, host: RecordingHost, store: Arc<dyn KeyValueStore>) -> Self {
        let relay = hub.endpoint("wallet");
        let host = Arc::new(host);
        let deps = ExchangeDependencies {
            relay: Arc::new(relay.clone()),
            crypto: Arc::new(DalekCrypto::new()),
            store,
            host: host.clone(),
            scheduler: Arc::new(TokioScheduler::new()),
        };
        let exchange =
            PairingExchange::new(ExchangeConfig::default(), MasterKey::new([0xA1; 32]), deps)
                .unwrap();

        Self {
            exchange: Arc::new(exchange),
            relay,
            host,
        }
    }

    /// Start a handshake towards `remote` in the background.
    pub fn pair_with(
        &self,
        remote: PublicKey,
    ) -> tokio::task::JoinHandle<Result<PairingOutcome, pairing_exchange::ExchangeError>> {
        let exchange = Arc::clone(&self.exchange);
        tokio::spawn(async move {
            exchange
                .initiate_pairing(&remote.to_hex(), IDENTIFIER, SERVICE)
                .await
        })
    }
}

/// Remote wallet scripted by the test.
pub struct Remote {
    pub relay: InMemoryRelay,
    pub codec: EnvelopeCodec,
    pub key: PairingKey,
}

impl Remote {
    pub async fn new(hub: &RelayHub, name: &str, master: [u8; 32]) -> Self {
        let crypto: Arc<dyn CryptoCapability> = Arc::new(DalekCrypto::new());
        let key = crypto
            .derive_pairing_key(&MasterKey::new(master), IDENTIFIER)
            .unwrap();
        let relay = hub.endpoint(name);
        relay.register_public_key(&key.public_key()).await.unwrap();

        Self {
            relay,
            codec: EnvelopeCodec::new(crypto),
            key,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.key.public_key()
    }

    /// Wait for the next LINK request, acknowledging it.
    pub async fn next_link(&self) -> (MessageEnvelope, LinkMessage) {
        for _ in 0..200 {
            let page = self.relay.fetch_inbox(None).await.unwrap();
            for entry in page.entries {
                let envelope = self.codec.parse(&entry.payload).unwrap();
                if envelope.message_type() == MessageType::Link {
                    self.relay.send_ack(&entry.cursor).await.unwrap();
                    let link = self.codec.open(&envelope, &self.key).unwrap();
                    return (envelope, link);
                }
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        panic!("no LINK request arrived");
    }

    /// Answer the next LINK request with `answer`. Returns the wallet's key.
    pub async fn answer_link(&self, answer: LinkMessage) -> PublicKey {
        let (request, _) = self.next_link().await;
        let reply = self.codec.build_reply(&request, &self.key, &answer).unwrap();
        self.relay
            .send(request.sender(), self.codec.encode(&reply).unwrap())
            .await
            .unwrap();
        *request.sender()
    }

    /// Approve the next LINK request.
    pub async fn approve(&self) -> PublicKey {
        self.answer_link(LinkMessage::accepted(IDENTIFIER, self.public_key()))
            .await
    }

    /// Send `payload` to `wallet`.
    pub async fn send<P: Payload>(&self, wallet: &PublicKey, payload: &P) -> MessageEnvelope {
        let envelope = self.codec.build(wallet, &self.key, payload).unwrap();
        self.relay
            .send(wallet, self.codec.encode(&envelope).unwrap())
            .await
            .unwrap();
        envelope
    }

    /// Acknowledge and open every waiting envelope of type `P`.
    pub async fn drain<P: Payload>(&self) -> Vec<(MessageEnvelope, P)> {
        let page = self.relay.fetch_inbox(None).await.unwrap();
        let mut opened = Vec::new();
        for entry in page.entries {
            let envelope = self.codec.parse(&entry.payload).unwrap();
            self.relay.send_ack(&entry.cursor).await.unwrap();
            if envelope.message_type() == P::MESSAGE_TYPE {
                let payload = self.codec.open(&envelope, &self.key).unwrap();
                opened.push((envelope, payload));
            }
        }
        opened
    }
}

/// A wallet with push enabled (no background poller) paired to a remote.
pub async fn paired(host: RecordingHost) -> (RelayHub, Wallet, Remote, PublicKey) {
    host.set_push_enabled(true);
    let hub = RelayHub::new();
    let remote = Remote::new(&hub, "remote", [0xB2; 32]).await;
    let wallet = Wallet::new(&hub, host);

    let pairing = wallet.pair_with(remote.public_key());
    let wallet_key = remote.approve().await;
    let outcome = pairing.await.unwrap().unwrap();
    assert!(outcome.persisted);

    (hub, wallet, remote, wallet_key)
}
