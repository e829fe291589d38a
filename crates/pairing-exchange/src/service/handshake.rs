//! # Pairing Handshake
//!
//! First contact between two wallets:
//!
//! 1. Derive our pairing key from the remote identifier
//! 2. Register its public half with the relay and send a LINK envelope
//! 3. Poll the inbox until a verified LINK answer arrives or the budget runs out
//! 4. Store the peer and switch to steady-state polling
//!
//! The wait loop resolves at most once and its task is cancelled exactly once.

use super::poller::InboxPoller;
use super::registry::PairedPeerRegistry;
use super::{acknowledge, deliver};
use crate::config::ExchangeConfig;
use crate::domain::{
    ExchangeError, HandshakeProgress, HandshakeState, LinkMessage, MasterKey, MessageType,
    PairedPeerRecord, PairingKey, PairingOutcome, PublicKey, RegistryError, ResponseStatus,
};
use crate::envelope::{EnvelopeCodec, MessageEnvelope};
use crate::ports::{CryptoCapability, HostApplication, RelayClient, Scheduler, Tick, TickFn, TickFuture};
use link_telemetry::{log_peer_event, metric_inc, HANDSHAKES, VERIFICATION_FAILURES};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// How the wait loop ended.
enum LinkResolution {
    Approved { sender: PublicKey, link: LinkMessage },
    Failed { error: ExchangeError, state: HandshakeState },
}

/// State shared between `initiate` and the ticks of its wait loop.
struct LinkWait {
    relay: Arc<dyn RelayClient>,
    codec: EnvelopeCodec,
    local: PairingKey,
    /// Id of the LINK request a genuine answer replies to.
    request_id: Uuid,
    expected_identifier: String,
    max_pages: usize,
    max_attempts: u32,
    progress: Arc<Mutex<HandshakeProgress>>,
    resolver: Mutex<Option<oneshot::Sender<LinkResolution>>>,
}

impl LinkWait {
    async fn tick(&self) -> Tick {
        let attempt = {
            let mut progress = self.progress.lock();
            progress.record_attempt().then(|| progress.attempts())
        };
        let Some(attempt) = attempt else {
            return self.timeout();
        };

        debug!(attempt, "[handshake] polling for LINK answer");
        if let Some(resolution) = self.scan().await {
            self.resolve(resolution);
            return Tick::Stop;
        }

        if attempt >= self.max_attempts {
            return self.timeout();
        }
        Tick::Continue
    }

    fn timeout(&self) -> Tick {
        let attempts = self.progress.lock().attempts();
        self.resolve(LinkResolution::Failed {
            error: ExchangeError::Timeout { attempts },
            state: HandshakeState::TimedOut,
        });
        Tick::Stop
    }

    fn resolve(&self, resolution: LinkResolution) {
        if let Some(sender) = self.resolver.lock().take() {
            // The receiver only disappears when `initiate` itself was dropped.
            let _ = sender.send(resolution);
        }
    }

    /// Walk the inbox for the verified LINK answering our request.
    async fn scan(&self) -> Option<LinkResolution> {
        let mut after = None;
        for _ in 0..self.max_pages {
            let page = match self.relay.fetch_inbox(after.clone()).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(error = %e, "[handshake] inbox fetch failed, retrying next tick");
                    return None;
                }
            };

            for entry in page.entries {
                if entry.acknowledged {
                    continue;
                }
                let envelope = match self.codec.parse(&entry.payload) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        debug!(cursor = %entry.cursor, error = %e, "[handshake] discarding undecodable entry");
                        acknowledge(self.relay.as_ref(), &entry.cursor).await;
                        continue;
                    }
                };
                if envelope.message_type() != MessageType::Link {
                    continue;
                }
                if !self.codec.verify(&envelope, &self.local) {
                    metric_inc!(VERIFICATION_FAILURES);
                    log_peer_event!(
                        warn,
                        "[handshake] discarding LINK that failed verification",
                        envelope.sender()
                    );
                    acknowledge(self.relay.as_ref(), &entry.cursor).await;
                    continue;
                }
                if envelope.reply_to() != Some(self.request_id) {
                    log_peer_event!(
                        debug,
                        "[handshake] discarding LINK that answers an earlier request",
                        envelope.sender(),
                        id = %envelope.id()
                    );
                    acknowledge(self.relay.as_ref(), &entry.cursor).await;
                    continue;
                }

                acknowledge(self.relay.as_ref(), &entry.cursor).await;
                return Some(self.judge(&envelope));
            }

            match page.next {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }
        None
    }

    fn judge(&self, envelope: &MessageEnvelope) -> LinkResolution {
        let link: LinkMessage = match self.codec.open(envelope, &self.local) {
            Ok(link) => link,
            Err(e) => {
                return LinkResolution::Failed {
                    error: ExchangeError::DecodeError(format!("LINK answer: {}", e)),
                    state: HandshakeState::Failed,
                }
            }
        };

        if link.status == ResponseStatus::Rejected {
            return LinkResolution::Failed {
                error: ExchangeError::RemoteRejected { code: link.error },
                state: HandshakeState::Rejected,
            };
        }
        if link.identifier != self.expected_identifier {
            return LinkResolution::Failed {
                error: ExchangeError::IdentifierMismatch {
                    expected: self.expected_identifier.clone(),
                    received: link.identifier,
                },
                state: HandshakeState::Failed,
            };
        }

        LinkResolution::Approved {
            sender: *envelope.sender(),
            link,
        }
    }
}

/// Runs LINK handshakes and rejections.
#[derive(Clone)]
pub struct PairingHandshake {
    config: ExchangeConfig,
    master: Arc<MasterKey>,
    crypto: Arc<dyn CryptoCapability>,
    codec: EnvelopeCodec,
    relay: Arc<dyn RelayClient>,
    registry: Arc<PairedPeerRegistry>,
    host: Arc<dyn HostApplication>,
    scheduler: Arc<dyn Scheduler>,
    poller: Arc<InboxPoller>,
}

impl PairingHandshake {
    /// Handshake driver over the given collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ExchangeConfig,
        master: Arc<MasterKey>,
        crypto: Arc<dyn CryptoCapability>,
        codec: EnvelopeCodec,
        relay: Arc<dyn RelayClient>,
        registry: Arc<PairedPeerRegistry>,
        host: Arc<dyn HostApplication>,
        scheduler: Arc<dyn Scheduler>,
        poller: Arc<InboxPoller>,
    ) -> Self {
        Self {
            config,
            master,
            crypto,
            codec,
            relay,
            registry,
            host,
            scheduler,
            poller,
        }
    }

    /// Pair with the wallet at `remote_public_key_hex`.
    ///
    /// # Errors
    ///
    /// - `InvalidParameters` - bad key, empty identifier or derivation failure
    /// - `ConstructionError` - the LINK envelope could not be built
    /// - `RegistrationFailed` - the relay refused our public key
    /// - `SendFailed` - the LINK envelope was not accepted by the relay
    /// - `DecodeError` / `RemoteRejected` / `IdentifierMismatch` - bad answer
    /// - `Timeout` - no answer within the poll budget
    pub async fn initiate(
        &self,
        remote_public_key_hex: &str,
        identifier: &str,
        service: &str,
    ) -> Result<PairingOutcome, ExchangeError> {
        let progress = Arc::new(Mutex::new(HandshakeProgress::new(
            self.config.handshake_max_attempts,
        )));

        match self
            .wait_for_answer(remote_public_key_hex, identifier, &progress)
            .await
        {
            Ok((sender, link)) => {
                advance(&progress, HandshakeState::Paired);
                metric_inc!(HANDSHAKES, &[HandshakeState::Paired.outcome_label()]);
                let outcome = self.complete(sender, link, service);
                self.start_steady_state();
                Ok(outcome)
            }
            Err((error, state)) => {
                advance(&progress, state);
                metric_inc!(HANDSHAKES, &[state.outcome_label()]);
                warn!(
                    identifier,
                    %error,
                    attempts = progress.lock().attempts(),
                    "[handshake] pairing failed"
                );
                Err(error)
            }
        }
    }

    async fn wait_for_answer(
        &self,
        remote_public_key_hex: &str,
        identifier: &str,
        progress: &Arc<Mutex<HandshakeProgress>>,
    ) -> Result<(PublicKey, LinkMessage), (ExchangeError, HandshakeState)> {
        let failed = |error: ExchangeError| (error, HandshakeState::Failed);

        let (remote, local) = self
            .derive(remote_public_key_hex, identifier)
            .map_err(failed)?;
        advance(progress, HandshakeState::AwaitingLinkSend);

        let request = LinkMessage::accepted(identifier, local.public_key());
        let envelope = self.codec.build(&remote, &local, &request).map_err(failed)?;

        self.relay
            .register_public_key(&local.public_key())
            .await
            .map_err(|e| failed(ExchangeError::RegistrationFailed(e.to_string())))?;

        deliver(&self.codec, self.relay.as_ref(), &envelope)
            .await
            .map_err(failed)?;
        advance(progress, HandshakeState::AwaitingLinkResponse);
        log_peer_event!(
            info,
            "[handshake] LINK request sent",
            remote,
            identifier,
            correlation_id = %request.correlation_id
        );

        let (resolver, resolved) = oneshot::channel();
        let wait = Arc::new(LinkWait {
            relay: Arc::clone(&self.relay),
            codec: self.codec.clone(),
            local,
            request_id: envelope.id(),
            expected_identifier: identifier.to_string(),
            max_pages: self.config.max_pages_per_fetch,
            max_attempts: self.config.handshake_max_attempts,
            progress: Arc::clone(progress),
            resolver: Mutex::new(Some(resolver)),
        });

        let tick: TickFn = Box::new(move || -> TickFuture {
            let wait = Arc::clone(&wait);
            Box::pin(async move { wait.tick().await })
        });
        let handle = self.scheduler.every(self.config.poll_interval(), tick);

        let resolution = resolved.await;
        handle.cancel();

        match resolution {
            Ok(LinkResolution::Approved { sender, link }) => Ok((sender, link)),
            Ok(LinkResolution::Failed { error, state }) => Err((error, state)),
            Err(_) => {
                let attempts = progress.lock().attempts();
                Err((ExchangeError::Timeout { attempts }, HandshakeState::TimedOut))
            }
        }
    }

    /// Persist the new peer.
    fn complete(&self, sender: PublicKey, link: LinkMessage, service: &str) -> PairingOutcome {
        let peer = PairedPeerRecord {
            public_key: sender,
            identifier: link.identifier,
            service: service.to_string(),
        };

        let (already_paired, persisted) = match self.registry.add(&peer) {
            Ok(()) => (false, true),
            Err(RegistryError::AlreadyPaired(_)) => {
                log_peer_event!(info, "[handshake] wallet was already paired", sender);
                (true, true)
            }
            Err(e) => {
                let warning = ExchangeError::PersistenceWarning(e.to_string());
                log_peer_event!(warn, "[handshake] paired but not saved", sender, error = %warning);
                (false, false)
            }
        };

        log_peer_event!(
            info,
            "[handshake] pairing complete",
            sender,
            service = %peer.service,
            already_paired,
            persisted
        );
        PairingOutcome {
            peer,
            already_paired,
            persisted,
        }
    }

    fn start_steady_state(&self) {
        if self.host.is_push_enabled() {
            debug!("[handshake] push enabled, not starting the poller");
            return;
        }
        self.poller.start();
    }

    /// Decline a pairing request from `remote_public_key_hex`. No polling.
    ///
    /// # Errors
    ///
    /// - `InvalidParameters` - bad key, empty identifier or derivation failure
    /// - `ConstructionError` - the envelope could not be built
    /// - `SendFailed` - the relay did not accept it
    pub async fn reject(
        &self,
        remote_public_key_hex: &str,
        identifier: &str,
        service: &str,
    ) -> Result<(), ExchangeError> {
        let (remote, local) = self.derive(remote_public_key_hex, identifier)?;
        let refusal = LinkMessage::rejected(identifier, local.public_key());
        let envelope = self.codec.build(&remote, &local, &refusal)?;
        deliver(&self.codec, self.relay.as_ref(), &envelope).await?;

        log_peer_event!(info, "[handshake] pairing request declined", remote, identifier, service);
        Ok(())
    }

    fn derive(
        &self,
        remote_public_key_hex: &str,
        identifier: &str,
    ) -> Result<(PublicKey, PairingKey), ExchangeError> {
        let remote = PublicKey::from_hex(remote_public_key_hex)?;
        if identifier.trim().is_empty() {
            return Err(ExchangeError::InvalidParameters(
                "identifier must not be empty".into(),
            ));
        }
        let local = self
            .crypto
            .derive_pairing_key(&self.master, identifier)
            .map_err(|e| ExchangeError::InvalidParameters(e.to_string()))?;
        Ok((remote, local))
    }
}

fn advance(progress: &Mutex<HandshakeProgress>, next: HandshakeState) {
    if let Err(e) = progress.lock().advance(next) {
        error!(error = %e, "[handshake] state machine violated");
    }
}
