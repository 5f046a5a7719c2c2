//! Paired, order-randomized sample collection
//!
//! Each iteration sends one request per candidate token, in a freshly
//! shuffled order, over the shared pooled connection. The two samples are
//! stored by slot, never by send order, so slot 0 always holds candidate A.

use super::ProbeTarget;
use crate::{
    client::Transport,
    error::Result,
    logging::Logger,
    models::{PairedRecord, Slot, TimingSample},
    output::{NoProgress, ProgressReporter},
    store::SampleStore,
    token::Token,
};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a collection run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionSummary {
    /// Records appended
    pub records: u64,
    /// Iterations that sent slot 0 first
    pub slot_0_first: u64,
    /// Iterations that sent slot 1 first
    pub slot_1_first: u64,
    pub elapsed: Duration,
}

/// Collects labeled pairs into a store
pub struct PairedSampler<R = StdRng> {
    transport: Arc<dyn Transport>,
    target: ProbeTarget,
    rng: R,
    progress: Box<dyn ProgressReporter>,
    logger: Logger,
}

impl PairedSampler<StdRng> {
    /// Sampler with an OS-seeded RNG and no progress output
    pub fn new(transport: Arc<dyn Transport>, target: ProbeTarget, logger: Logger) -> Self {
        Self {
            transport,
            target,
            rng: StdRng::from_os_rng(),
            progress: Box::new(NoProgress),
            logger: logger.named("SAMPLER"),
        }
    }
}

impl<R: Rng> PairedSampler<R> {
    /// Replace the order-shuffling RNG
    pub fn with_rng<R2: Rng>(self, rng: R2) -> PairedSampler<R2> {
        PairedSampler {
            transport: self.transport,
            target: self.target,
            rng,
            progress: self.progress,
            logger: self.logger,
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Collect `count` pairs for candidates `case_a` (slot 0) and `case_b`
    /// (slot 1) under `label`.
    ///
    /// Any transport failure left after the transport's own retries ends the
    /// run; records appended before it stay in the store.
    #[allow(clippy::too_many_arguments)]
    pub async fn collect<S: SampleStore + ?Sized>(
        &mut self,
        store: &mut S,
        label: &str,
        prefix: &str,
        case_a: &str,
        case_b: &str,
        missing_length: usize,
        count: u64,
    ) -> Result<CollectionSummary> {
        let tokens = [
            self.target.forge.forge(prefix, case_a, missing_length)?,
            self.target.forge.forge(prefix, case_b, missing_length)?,
        ];

        self.logger.info("Collection started")
            .field("label", label)
            .field("count", count)
            .field("token_0", tokens[0].as_str())
            .field("token_1", tokens[1].as_str())
            .log();

        let report_every = (count / 1000).max(1);
        let started = Instant::now();
        let mut summary = CollectionSummary::default();
        self.progress.start("collect", count);

        for i in 0..count {
            let mut order = Slot::BOTH;
            order.shuffle(&mut self.rng);

            let first = self.probe(order[0], &tokens[order[0].index()]).await?;
            let second = self.probe(order[1], &tokens[order[1].index()]).await?;
            let (sample_0, sample_1) = match order[0] {
                Slot::Zero => (first, second),
                Slot::One => (second, first),
            };

            store.append(&PairedRecord::new(label, sample_0, sample_1, order[0]))?;

            summary.records += 1;
            match order[0] {
                Slot::Zero => summary.slot_0_first += 1,
                Slot::One => summary.slot_1_first += 1,
            }

            if i % report_every == 0 {
                self.progress.update(i, count);
            }
        }

        summary.elapsed = started.elapsed();
        self.progress.update(count, count);
        self.progress.finish(&format!("{} records collected", summary.records));

        self.logger.info("Collection finished")
            .field("records", summary.records)
            .field("slot_0_first", summary.slot_0_first)
            .field("slot_1_first", summary.slot_1_first)
            .field("elapsed_ms", summary.elapsed.as_millis() as u64)
            .log();

        Ok(summary)
    }

    async fn probe(&self, slot: Slot, token: &Token) -> Result<TimingSample> {
        let response = self.transport.send(&self.target.request(token)).await?;

        self.logger.trace("Probe")
            .field("slot", u8::from(slot))
            .field("status", response.status)
            .field("elapsed_us", response.elapsed_microseconds)
            .log();

        Ok(self.target.sample(slot, token, &response))
    }
}
