// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Global scores across all signatures, used to measure the achieved throughput.

use crate::decay::{system_time_to_unix_nanos, DecayedCounter};
use parking_lot::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug)]
struct BackendScores {
    seen: DecayedCounter,
    sampled: DecayedCounter,
    /// Timestamp of the first observation in nanoseconds since the unix epoch
    first_observation: Option<u64>,
}

/// Aggregated decayed scores of seen and kept traces.
///
/// Scores are reported in traces per second. A decayed score accumulated over `elapsed` seconds
/// with a half-life `τ` covers an effective window of `τ * (1 - exp(-elapsed / τ))` seconds. The
/// score is divided by this window so the estimate is also correct right after the first
/// observation, before the counters reach their steady state.
#[derive(Debug)]
pub struct Backend {
    scores: Mutex<BackendScores>,
    half_life: f64,
}

impl Backend {
    /// Return an empty backend whose scores decay with `half_life`.
    pub fn new(half_life: Duration) -> Self {
        Self {
            scores: Mutex::new(BackendScores {
                seen: DecayedCounter::new(half_life),
                sampled: DecayedCounter::new(half_life),
                first_observation: None,
            }),
            half_life: half_life.as_secs_f64(),
        }
    }

    /// Count `amount` traces seen by the sampler.
    pub fn record_seen(&self, now: SystemTime, amount: f64) {
        let mut scores = self.scores.lock();
        scores
            .first_observation
            .get_or_insert(system_time_to_unix_nanos(now));
        scores.seen.increment(now, amount);
    }

    /// Count `amount` traces kept by the sampler.
    pub fn record_sampled(&self, now: SystemTime, amount: f64) {
        let mut scores = self.scores.lock();
        scores
            .first_observation
            .get_or_insert(system_time_to_unix_nanos(now));
        scores.sampled.increment(now, amount);
    }

    /// Return the recent throughput of kept traces, in traces per second.
    pub fn sampled_score(&self, now: SystemTime) -> f64 {
        let mut scores = self.scores.lock();
        let score = scores.sampled.get(now);
        self.normalize(score, scores.first_observation, now)
    }

    /// Return the recent throughput of seen traces, in traces per second.
    pub fn seen_score(&self, now: SystemTime) -> f64 {
        let mut scores = self.scores.lock();
        let score = scores.seen.get(now);
        self.normalize(score, scores.first_observation, now)
    }

    /// Return the time of the first seen or kept trace.
    pub fn first_observation(&self) -> Option<SystemTime> {
        self.scores
            .lock()
            .first_observation
            .map(|nanos| UNIX_EPOCH + Duration::from_nanos(nanos))
    }

    /// Return the throughput of kept traces that brings [`Backend::sampled_score`] to
    /// `target_tps` once `horizon` has elapsed.
    ///
    /// The result is negative when the traces already kept are enough to stay above the target
    /// for the whole horizon.
    pub fn required_sampled_tps(
        &self,
        now: SystemTime,
        horizon: Duration,
        target_tps: f64,
    ) -> f64 {
        let mut scores = self.scores.lock();
        let score = scores.sampled.get(now);
        let Some(first_observation) = scores.first_observation else {
            return target_tps;
        };
        let horizon = horizon.as_secs_f64();
        let retained = (-horizon / self.half_life).exp();
        let horizon_window = self.half_life * (1.0 - retained);
        if horizon_window <= 0.0 {
            return target_tps;
        }
        let window = self.window(elapsed_secs(first_observation, now) + horizon);
        (target_tps * window - score * retained) / horizon_window
    }

    fn normalize(&self, score: f64, first_observation: Option<u64>, now: SystemTime) -> f64 {
        let Some(first_observation) = first_observation else {
            return 0.0;
        };
        let window = self.window(elapsed_secs(first_observation, now));
        if window > 0.0 {
            score / window
        } else {
            // Everything observed so far happened at this very instant
            0.0
        }
    }

    /// Effective duration covered by a score accumulated during `elapsed` seconds
    fn window(&self, elapsed: f64) -> f64 {
        self.half_life * (1.0 - (-elapsed / self.half_life).exp())
    }
}

fn elapsed_secs(first_observation: u64, now: SystemTime) -> f64 {
    system_time_to_unix_nanos(now).saturating_sub(first_observation) as f64
        / Duration::from_secs(1).as_nanos() as f64
}
