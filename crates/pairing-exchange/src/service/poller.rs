//! # Inbox Poller
//!
//! Steady-state fetch-and-acknowledge loop. One cycle walks every page the
//! relay offers (up to `max_pages_per_fetch`), hands each unacknowledged
//! envelope to the dispatcher and acknowledges it if the dispatcher says so.
//! Cycles never overlap, whether started by the timer or by the host.

use super::acknowledge;
use super::dispatcher::{Disposition, MessageDispatcher};
use super::registry::PairedPeerRegistry;
use crate::config::ExchangeConfig;
use crate::domain::{ExchangeError, FetchReport, InboxEntry, SeenEnvelopes};
use crate::envelope::EnvelopeCodec;
use crate::ports::{RelayClient, Scheduler, TaskHandle, Tick, TickFn, TickFuture};
use link_telemetry::{metric_inc, ENVELOPES_RECEIVED};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Periodic inbox consumer.
pub struct InboxPoller {
    relay: Arc<dyn RelayClient>,
    codec: EnvelopeCodec,
    dispatcher: Arc<MessageDispatcher>,
    registry: Arc<PairedPeerRegistry>,
    scheduler: Arc<dyn Scheduler>,
    config: ExchangeConfig,
    seen: Mutex<SeenEnvelopes>,
    task: Mutex<Option<TaskHandle>>,
    /// Held for the duration of one fetch cycle.
    cycle: tokio::sync::Mutex<()>,
}

impl InboxPoller {
    /// Poller feeding `dispatcher`.
    pub fn new(
        relay: Arc<dyn RelayClient>,
        codec: EnvelopeCodec,
        dispatcher: Arc<MessageDispatcher>,
        registry: Arc<PairedPeerRegistry>,
        scheduler: Arc<dyn Scheduler>,
        config: ExchangeConfig,
    ) -> Self {
        Self {
            seen: Mutex::new(SeenEnvelopes::with_capacity(config.seen_cache_capacity)),
            relay,
            codec,
            dispatcher,
            registry,
            scheduler,
            config,
            task: Mutex::new(None),
            cycle: tokio::sync::Mutex::new(()),
        }
    }

    /// Run one fetch cycle.
    ///
    /// Per-entry failures are counted in the report and never abort the
    /// cycle. Fails only if the first page cannot be fetched.
    pub async fn fetch_once(&self) -> Result<FetchReport, ExchangeError> {
        let _cycle = self.cycle.lock().await;
        self.dispatcher.purge_expired();

        let mut report = FetchReport::default();
        let mut after = None;

        while report.pages < self.config.max_pages_per_fetch {
            let page = match self.relay.fetch_inbox(after.clone()).await {
                Ok(page) => page,
                Err(e) if report.pages == 0 => {
                    return Err(ExchangeError::SendFailed(format!("inbox fetch: {}", e)));
                }
                Err(e) => {
                    warn!(error = %e, pages = report.pages, "[poller] stopping cycle early");
                    break;
                }
            };
            report.pages += 1;

            for entry in page.entries {
                if entry.acknowledged {
                    continue;
                }
                report.examined += 1;
                self.consume(entry, &mut report).await;
            }

            match page.next {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }

        if report.examined > 0 {
            debug!(
                pages = report.pages,
                examined = report.examined,
                acknowledged = report.acknowledged,
                retained = report.retained,
                "[poller] cycle complete"
            );
        }
        Ok(report)
    }

    async fn consume(&self, entry: InboxEntry, report: &mut FetchReport) {
        let envelope = match self.codec.parse(&entry.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(cursor = %entry.cursor, error = %e, "[poller] leaving malformed entry");
                report.malformed += 1;
                report.retained += 1;
                return;
            }
        };

        if self.seen.lock().contains(&envelope.id()) {
            debug!(id = %envelope.id(), "[poller] redelivered envelope, acknowledging again");
            report.duplicates += 1;
            if acknowledge(self.relay.as_ref(), &entry.cursor).await {
                report.acknowledged += 1;
            }
            return;
        }

        metric_inc!(ENVELOPES_RECEIVED, &[envelope.message_type().as_str()]);
        report.dispatched += 1;

        match self.dispatcher.process(&envelope).await {
            Disposition::Acknowledge => {
                self.seen.lock().insert(envelope.id());
                if acknowledge(self.relay.as_ref(), &entry.cursor).await {
                    report.acknowledged += 1;
                }
            }
            Disposition::Retain => report.retained += 1,
        }
    }

    /// Start the periodic loop. No-op while running or with nothing paired.
    ///
    /// Returns whether a loop is running afterwards.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut task = self.task.lock();
        if let Some(handle) = task.as_ref() {
            if !handle.is_cancelled() && !handle.is_finished() {
                return true;
            }
        }

        match self.registry.has_peers() {
            Ok(true) => {}
            Ok(false) => {
                debug!("[poller] nothing paired, not polling");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "[poller] registry unavailable, not polling");
                return false;
            }
        }

        let poller: Weak<Self> = Arc::downgrade(self);
        let tick: TickFn = Box::new(move || -> TickFuture {
            let poller = poller.clone();
            Box::pin(async move {
                let Some(poller) = poller.upgrade() else {
                    return Tick::Stop;
                };
                if let Err(e) = poller.fetch_once().await {
                    warn!(error = %e, "[poller] fetch cycle failed");
                }
                Tick::Continue
            })
        });

        *task = Some(self.scheduler.every(self.config.poll_interval(), tick));
        info!(
            interval_secs = self.config.poll_interval_secs,
            "[poller] polling started"
        );
        true
    }

    /// Stop the periodic loop. Safe to call at any time.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            if handle.cancel() {
                info!("[poller] polling stopped");
            }
        }
    }

    /// Whether a periodic loop is active.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|h| !h.is_cancelled() && !h.is_finished())
            .unwrap_or(false)
    }

    /// Push on replaces polling; push off brings it back.
    pub fn on_push_preference_changed(self: &Arc<Self>, enabled: bool) {
        if enabled {
            self.stop();
        } else {
            self.start();
        }
    }
}

impl Drop for InboxPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.cancel();
        }
    }
}
