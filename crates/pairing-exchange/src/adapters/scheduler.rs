//! Tokio-backed scheduler.

use crate::ports::{Scheduler, TaskHandle, Tick, TickFn};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::trace;

/// Runs periodic tasks on the current tokio runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioScheduler;

impl TokioScheduler {
    /// Create the scheduler.
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for TokioScheduler {
    fn every(&self, period: Duration, mut task: TickFn) -> TaskHandle {
        let handle = TaskHandle::new();
        let worker = handle.clone();

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = worker.cancelled() => break,
                    _ = ticker.tick() => {
                        if worker.is_cancelled() {
                            break;
                        }
                        if task().await == Tick::Stop {
                            break;
                        }
                    }
                }
            }

            trace!("[scheduler] periodic task finished");
            worker.mark_finished();
        });

        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::TickFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(counter: Arc<AtomicUsize>, stop_after: usize) -> TickFn {
        Box::new(move || -> TickFuture {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n >= stop_after {
                    Tick::Stop
                } else {
                    Tick::Continue
                }
            })
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_stop() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = TokioScheduler::new().every(
            Duration::from_secs(3),
            counting_task(Arc::clone(&counter), 4),
        );

        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let counter = Arc::new(AtomicUsize::new(0));
        let _handle = TokioScheduler::new().every(
            Duration::from_secs(3),
            counting_task(Arc::clone(&counter), usize::MAX),
        );

        tokio::time::sleep(Duration::from_millis(2_900)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = TokioScheduler::new().every(
            Duration::from_secs(1),
            counting_task(Arc::clone(&counter), usize::MAX),
        );

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(handle.is_finished());
    }
}
