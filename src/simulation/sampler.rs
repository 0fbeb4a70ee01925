//! Turns joined telemetry into ride loop ticks.

use crate::sensors::CapabilityKind;
use crate::simulation::types::SamplingMode;
use crate::telemetry::{TelemetryHub, TelemetrySample};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};

/// Capabilities the ride loop reads.
pub(crate) const JOINED: [CapabilityKind; 2] = [CapabilityKind::Power, CapabilityKind::Cadence];

/// Source of the samples the ride loop steps on.
pub(crate) enum Sampler {
    /// Every joined sample is a tick
    EventDriven(TelemetryHub),
    /// One tick per period, carrying the newest sample
    FixedInterval(LatestSample),
}

impl Sampler {
    /// Must be called from within a tokio runtime.
    pub(crate) fn new(hub: TelemetryHub, mode: SamplingMode) -> Self {
        match mode {
            SamplingMode::EventDriven => Sampler::EventDriven(hub),
            SamplingMode::FixedInterval(period) => {
                Sampler::FixedInterval(LatestSample::spawn(hub, period))
            }
        }
    }

    /// Next sample to step on. `None` once telemetry has ended.
    pub(crate) async fn next(&mut self) -> Option<TelemetrySample> {
        match self {
            Sampler::EventDriven(hub) => hub.join(&JOINED).await,
            Sampler::FixedInterval(latest) => latest.next().await,
        }
    }
}

/// Keeps the hub drained in the background and hands out the newest
/// joined sample on every tick.
pub(crate) struct LatestSample {
    interval: Interval,
    latest: watch::Receiver<Option<TelemetrySample>>,
    reader: JoinHandle<()>,
}

impl LatestSample {
    fn spawn(mut hub: TelemetryHub, period: Duration) -> Self {
        let (tx, latest) = watch::channel(None);

        let reader = tokio::spawn(async move {
            while let Some(sample) = hub.join(&JOINED).await {
                if tx.send(Some(sample)).is_err() {
                    break;
                }
            }
            tracing::debug!("Telemetry reader stopped");
        });

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            interval,
            latest,
            reader,
        }
    }

    async fn next(&mut self) -> Option<TelemetrySample> {
        self.interval.tick().await;

        // Nothing new since the last tick: step on the next arrival
        loop {
            self.latest.changed().await.ok()?;
            if let Some(sample) = *self.latest.borrow_and_update() {
                return Some(sample);
            }
        }
    }
}

impl Drop for LatestSample {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
