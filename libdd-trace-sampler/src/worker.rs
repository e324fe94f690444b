// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Background task adjusting the sampling rates every decay period.

use crate::rate_controller::RateAdjustment;
use crate::sampler::Sampler;
use crate::signature::SignatureKeyer;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::runtime::Handle;
use tokio::select;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Worker calling [`Sampler::update_rates`] every [`crate::SamplerConfig::decay_period`].
///
/// [`RateUpdater::trigger`] waits for the next adjustment and [`RateUpdater::run`] performs it.
/// The loop alternating both, until cancellation, is owned by [`spawn_rate_updater`].
///
/// The first adjustment happens one period after the first trigger. Ticks missed because the
/// runtime was busy are not caught up, the next adjustment is delayed instead.
#[derive(Debug)]
pub struct RateUpdater<K = crate::SpanSignatureKeyer> {
    sampler: Arc<Sampler<K>>,
    interval: Option<Interval>,
}

impl<K: SignatureKeyer> RateUpdater<K> {
    /// Return a worker adjusting the rates of `sampler`.
    pub fn new(sampler: Arc<Sampler<K>>) -> Self {
        Self {
            sampler,
            interval: None,
        }
    }

    /// Wait for the next adjustment.
    pub async fn trigger(&mut self) {
        let period = self.sampler.config().decay_period();
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        interval.tick().await;
    }

    /// Adjust the rates once.
    pub fn run(&mut self) -> RateAdjustment {
        self.sampler.update_rates(SystemTime::now())
    }
}

/// Alternate `trigger` and `run` until `cancellation_token` is cancelled.
async fn run_until_cancelled<K: SignatureKeyer>(
    mut updater: RateUpdater<K>,
    cancellation_token: CancellationToken,
) {
    debug!(
        period = ?updater.sampler.config().decay_period(),
        "Starting sample rates updater"
    );
    loop {
        select! {
            _ = updater.trigger() => {
                updater.run();
            }
            _ = cancellation_token.cancelled() => {
                break;
            }
        }
    }
    debug!("Sample rates updater stopped");
}

/// Handle on a [`RateUpdater`] spawned with [`spawn_rate_updater`].
///
/// Dropping the handle stops the updater.
#[derive(Debug)]
pub struct RateUpdaterHandle {
    cancellation_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RateUpdaterHandle {
    /// Stop the updater and wait for its task to exit.
    pub async fn stop(mut self) {
        self.cancellation_token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                debug!(?err, "Sample rates updater task failed");
            }
        }
    }

    /// Return true once the updater task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for RateUpdaterHandle {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

/// Spawn a [`RateUpdater`] for `sampler` on `runtime`.
pub fn spawn_rate_updater<K>(sampler: &Arc<Sampler<K>>, runtime: &Handle) -> RateUpdaterHandle
where
    K: SignatureKeyer + Send + Sync + 'static,
{
    let cancellation_token = CancellationToken::new();
    let updater = RateUpdater::new(sampler.clone());
    let handle = runtime.spawn(run_until_cancelled(updater, cancellation_token.clone()));
    RateUpdaterHandle {
        cancellation_token,
        handle: Some(handle),
    }
}
