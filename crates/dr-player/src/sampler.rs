//! Periodic metrics sampling for adaptive sessions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::abr::BitrateSelector;
use crate::pipeline::AdaptiveEngine;
use crate::session::MetricsSample;

/// Sampling cadence.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// What the sampler publishes each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Telemetry {
    pub sample: MetricsSample,
    pub active_variant: Option<usize>,
}

/// A running sampling task bound to one pipeline attachment.
///
/// Each attachment gets a generation number; a tick that observes a newer
/// generation publishes nothing. [`MetricsSampler::stop`] cancels and joins
/// the task, then resets the published value to zero.
pub struct MetricsSampler {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    tx: Arc<watch::Sender<Telemetry>>,
}

impl MetricsSampler {
    pub fn start(
        engine: Arc<dyn AdaptiveEngine>,
        selector: Option<BitrateSelector>,
        tx: Arc<watch::Sender<Telemetry>>,
        generation: Arc<AtomicU64>,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let my_generation = generation.load(Ordering::Acquire);
        let handle = tokio::spawn(sample_loop(
            engine,
            selector,
            tx.clone(),
            generation,
            my_generation,
            interval,
            cancel.clone(),
        ));
        Self { cancel, handle, tx }
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                tracing::warn!(error = %e, "Metrics sampler panicked");
            }
        }
        self.tx.send_replace(Telemetry::default());
    }
}

async fn sample_loop(
    engine: Arc<dyn AdaptiveEngine>,
    mut selector: Option<BitrateSelector>,
    tx: Arc<watch::Sender<Telemetry>>,
    generation: Arc<AtomicU64>,
    my_generation: u64,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let sample = engine.sample().unwrap_or_default();

        if cancel.is_cancelled() || generation.load(Ordering::Acquire) != my_generation {
            break;
        }

        if let Some(selector) = selector.as_mut() {
            if let Some(index) = selector.select(&sample) {
                tracing::debug!(variant = index, throughput = sample.average_throughput, "Switching variant");
                engine.set_variant(index);
            }
        }

        let active_variant = selector.as_ref().and_then(BitrateSelector::current);
        tx.send_replace(Telemetry {
            sample,
            active_variant,
        });
    }

    tracing::trace!(generation = my_generation, "Metrics sampler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_core::{Ladder, ManifestRef};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    use crate::error::PlaybackError;

    #[derive(Default)]
    struct ScriptedEngine {
        samples: Mutex<Vec<Option<MetricsSample>>>,
        polls: AtomicUsize,
        variants: Mutex<Vec<usize>>,
    }

    impl AdaptiveEngine for ScriptedEngine {
        fn load(&self, _manifest: &ManifestRef) -> Result<(), PlaybackError> {
            Ok(())
        }
        fn sample(&self) -> Option<MetricsSample> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let mut samples = self.samples.lock();
            if samples.len() > 1 {
                samples.remove(0)
            } else {
                samples.first().copied().flatten()
            }
        }
        fn set_variant(&self, index: usize) {
            self.variants.lock().push(index);
        }
        fn reset(&self) {}
    }

    fn good() -> MetricsSample {
        MetricsSample {
            current_bitrate: 1_596_000.0,
            average_throughput: 20_000_000.0,
            buffer_length: 12.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_each_second() {
        let engine = Arc::new(ScriptedEngine::default());
        *engine.samples.lock() = vec![Some(good())];
        let tx = Arc::new(watch::channel(Telemetry::default()).0);
        let rx = tx.subscribe();

        let sampler = MetricsSampler::start(
            engine.clone(),
            None,
            tx.clone(),
            Arc::new(AtomicU64::new(0)),
            SAMPLE_INTERVAL,
        );

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(engine.polls.load(Ordering::SeqCst), 3);
        assert_eq!(rx.borrow().sample, good());

        sampler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn missing_sample_publishes_zeroes() {
        let engine = Arc::new(ScriptedEngine::default());
        *engine.samples.lock() = vec![Some(good()), None];
        let tx = Arc::new(watch::channel(Telemetry::default()).0);
        let rx = tx.subscribe();

        let sampler = MetricsSampler::start(
            engine,
            None,
            tx.clone(),
            Arc::new(AtomicU64::new(0)),
            SAMPLE_INTERVAL,
        );

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(rx.borrow().sample, good());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.borrow().sample.is_zeroed());

        sampler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_silences_and_zeroes() {
        let engine = Arc::new(ScriptedEngine::default());
        *engine.samples.lock() = vec![Some(good())];
        let tx = Arc::new(watch::channel(Telemetry::default()).0);
        let rx = tx.subscribe();

        let sampler = MetricsSampler::start(
            engine.clone(),
            None,
            tx.clone(),
            Arc::new(AtomicU64::new(0)),
            SAMPLE_INTERVAL,
        );
        tokio::time::sleep(Duration::from_millis(2500)).await;
        sampler.stop().await;

        let polls = engine.polls.load(Ordering::SeqCst);
        assert!(rx.borrow().sample.is_zeroed());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(engine.polls.load(Ordering::SeqCst), polls);
        assert!(rx.borrow().sample.is_zeroed());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_publishes_nothing() {
        let engine = Arc::new(ScriptedEngine::default());
        *engine.samples.lock() = vec![Some(good())];
        let tx = Arc::new(watch::channel(Telemetry::default()).0);
        let rx = tx.subscribe();
        let generation = Arc::new(AtomicU64::new(0));

        let sampler = MetricsSampler::start(engine, None, tx.clone(), generation.clone(), SAMPLE_INTERVAL);
        generation.fetch_add(1, Ordering::AcqRel);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(rx.borrow().sample.is_zeroed());
        sampler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn selector_pins_variants() {
        let engine = Arc::new(ScriptedEngine::default());
        *engine.samples.lock() = vec![Some(good())];
        let tx = Arc::new(watch::channel(Telemetry::default()).0);
        let rx = tx.subscribe();
        let selector = BitrateSelector::new(Ladder::default().variants(), 4);

        let sampler = MetricsSampler::start(
            engine.clone(),
            Some(selector),
            tx.clone(),
            Arc::new(AtomicU64::new(0)),
            SAMPLE_INTERVAL,
        );
        tokio::time::sleep(Duration::from_millis(3500)).await;
        sampler.stop().await;

        // Lowest rung first, then one rung per tick.
        assert_eq!(*engine.variants.lock(), vec![2, 1, 0]);
        assert_eq!(rx.borrow().active_variant, None);
    }
}
