// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Continuously decaying counters used to score recent activity without time buckets.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Return the number of nanoseconds between t and the unix epoch
/// If t is before the unix epoch return 0
pub(crate) fn system_time_to_unix_nanos(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_nanos(0))
        .as_nanos() as u64
}

/// A score which is continuously attenuated toward zero.
///
/// Before any read or increment the value is multiplied by `exp(-Δt / half_life)` where `Δt` is
/// the time elapsed since the previous update. A stream of `r` events per second therefore settles
/// around `r * half_life`, which makes the score an exponentially weighted count of the last
/// `half_life` seconds rather than a raw count.
///
/// Timestamps older than the last update apply no decay and do not move the counter back in time,
/// so updating twice with the same timestamp is a no-op.
#[derive(Debug, Clone, PartialEq)]
pub struct DecayedCounter {
    value: f64,
    /// Timestamp of the last update in nanoseconds since the unix epoch
    last_update: u64,
    /// Decay time constant in seconds
    half_life: f64,
}

impl DecayedCounter {
    /// Return an empty counter decaying with the given half-life.
    pub fn new(half_life: Duration) -> Self {
        Self {
            value: 0.0,
            last_update: 0,
            half_life: half_life.as_secs_f64(),
        }
    }

    /// Return the decay half-life of the counter.
    pub fn half_life(&self) -> Duration {
        Duration::from_secs_f64(self.half_life)
    }

    /// Attenuate the value for the time elapsed since the last update.
    pub fn update(&mut self, now: SystemTime) {
        let now = system_time_to_unix_nanos(now);
        if now <= self.last_update {
            return;
        }
        let elapsed = (now - self.last_update) as f64 / NANOS_PER_SECOND;
        self.value *= (-elapsed / self.half_life).exp();
        self.last_update = now;
    }

    /// Decay the counter to `now` and add `amount` to it. Negative or NaN amounts are ignored.
    pub fn increment(&mut self, now: SystemTime, amount: f64) {
        self.update(now);
        self.value += amount.max(0.0);
    }

    /// Decay the counter to `now` and return its value.
    pub fn get(&mut self, now: SystemTime) -> f64 {
        self.update(now);
        self.value
    }
}
