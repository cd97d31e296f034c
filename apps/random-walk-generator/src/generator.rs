use crate::clock::{Clock, Sleeper};
use crate::store::DocumentStore;
use crate::walk::{format_timestamp, RandomWalk, Sample};
use rand::Rng;
use std::time::Duration;

const SUMMARY_EVERY_TICKS: u64 = 300;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    Indexed,
    Dropped,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GeneratorStats {
    pub ticks: u64,
    pub indexed: u64,
    pub dropped: u64,
}

pub struct Generator<'a, S, R, C, Z> {
    store: &'a S,
    walk: RandomWalk<R>,
    clock: C,
    sleeper: Z,
    interval: Duration,
    stats: GeneratorStats,
}

impl<'a, S, R, C, Z> Generator<'a, S, R, C, Z>
where
    S: DocumentStore,
    R: Rng,
    C: Clock,
    Z: Sleeper,
{
    pub fn new(
        store: &'a S,
        walk: RandomWalk<R>,
        clock: C,
        sleeper: Z,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            walk,
            clock,
            sleeper,
            interval,
            stats: GeneratorStats::default(),
        }
    }

    pub fn stats(&self) -> GeneratorStats {
        self.stats
    }

    pub fn current_value(&self) -> f64 {
        self.walk.value()
    }

    /// Samples forever; there is no exit path short of process termination.
    pub async fn run(&mut self) {
        tracing::info!(
            index = %self.store.index(),
            interval = ?self.interval,
            "random walk generator started"
        );
        loop {
            self.tick().await;
            if self.stats.ticks % SUMMARY_EVERY_TICKS == 0 {
                let stats = self.stats();
                tracing::info!(
                    ticks = stats.ticks,
                    indexed = stats.indexed,
                    dropped = stats.dropped,
                    value = self.current_value(),
                    "random walk progress"
                );
            }
            self.sleeper.sleep(self.interval).await;
        }
    }

    /// One step: advance the walk, stamp it, publish it.
    pub async fn tick(&mut self) -> (Sample, PublishOutcome) {
        let raw = self.walk.step();
        let sample = Sample::new(self.clock.now(), raw);
        let outcome = self.publish(&sample).await;

        self.stats.ticks += 1;
        match outcome {
            PublishOutcome::Indexed => self.stats.indexed += 1,
            PublishOutcome::Dropped => self.stats.dropped += 1,
        }
        (sample, outcome)
    }

    /// Sends the sample once. Failures are logged and the sample is discarded.
    async fn publish(&self, sample: &Sample) -> PublishOutcome {
        match self.store.index_document(sample).await {
            Ok(()) => {
                tracing::debug!(
                    timestamp = %format_timestamp(&sample.timestamp),
                    value = sample.value,
                    "sample indexed"
                );
                PublishOutcome::Indexed
            }
            Err(err) => {
                tracing::warn!(
                    index = %self.store.index(),
                    status = ?err.status().map(|s| s.as_u16()),
                    error = %err,
                    value = sample.value,
                    "failed to index sample (dropped)"
                );
                PublishOutcome::Dropped
            }
        }
    }
}
