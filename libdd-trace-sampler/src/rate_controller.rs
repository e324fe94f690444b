// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodic feedback loop bringing the achieved throughput to the target TPS.

use crate::backend::Backend;
use crate::table::{clamp_rate, SignatureTable};
use parking_lot::Mutex;
use std::time::{Duration, SystemTime};

/// Below this throughput the backend is considered to have no data.
const NEGLIGIBLE_TPS: f64 = 1e-9;

/// Bounds of the kept throughput aimed at during the next period, relative to the target TPS.
const MIN_WANTED_TPS_RATIO: f64 = 0.25;
const MAX_WANTED_TPS_RATIO: f64 = 2.0;

/// Outcome of a rate adjustment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RateAdjustment {
    /// The target TPS is zero, every rate has been set to zero.
    Disabled,
    /// Nothing has been seen or kept recently, rates are left unchanged.
    NoData,
    /// Every rate has been multiplied by `factor` then clamped to [0, 1].
    Scaled {
        /// Ratio between the wanted and the expected throughput of kept traces.
        factor: f64,
        /// Throughput of kept traces measured by the backend.
        achieved_tps: f64,
        /// Throughput of seen traces measured by the backend, kept or not.
        seen_tps: f64,
        /// Throughput of kept traces expected at the previous rates, from the traces seen since
        /// the previous adjustment.
        expected_tps: f64,
    },
}

/// Proportional rate controller.
///
/// Each adjustment multiplies the rate of every signature by the same factor. All the signatures
/// get the same relative correction, so signatures contributing most of the traffic are throttled
/// the most in absolute terms while the relative representation of the signatures is preserved.
///
/// The factor is `wanted_tps / expected_tps`:
/// - `expected_tps` is the throughput the current rates keep out of the traces seen since the
///   previous adjustment. Unlike the decayed scores it reacts to traffic changes within a period.
/// - `wanted_tps` is the throughput which brings the backend's sampled score to the target by the
///   next adjustment, see [`Backend::required_sampled_tps`]. It is bounded to
///   `[0.25, 2] * target_tps` so a burst of kept traces never stops sampling altogether.
#[derive(Debug)]
pub struct RateController {
    target_tps: f64,
    period: Duration,
    last_adjustment: Mutex<Option<SystemTime>>,
}

impl RateController {
    /// Return a controller aiming for `target_tps` kept traces per second, adjusted every
    /// `period`.
    pub fn new(target_tps: f64, period: Duration) -> Self {
        Self {
            target_tps,
            period,
            last_adjustment: Mutex::new(None),
        }
    }

    /// Return the targeted throughput of kept traces.
    pub fn target_tps(&self) -> f64 {
        self.target_tps
    }

    /// Recompute the rate of every signature of `table` from the traffic seen since the previous
    /// adjustment and the throughput measured by `backend`.
    ///
    /// `extra_sample_rate` is the multiplier applied to the rates at decision time.
    pub fn adjust(
        &self,
        now: SystemTime,
        table: &SignatureTable,
        backend: &Backend,
        extra_sample_rate: f64,
    ) -> RateAdjustment {
        if self.target_tps == 0.0 {
            for (_, entry) in table.entries() {
                entry.set_rate(0.0);
            }
            return RateAdjustment::Disabled;
        }

        let mut last_adjustment = self.last_adjustment.lock();
        let Some(elapsed) = last_adjustment
            .or_else(|| backend.first_observation())
            .and_then(|start| now.duration_since(start).ok())
            .map(|elapsed| elapsed.as_secs_f64())
            .filter(|elapsed| *elapsed > 0.0)
        else {
            return RateAdjustment::NoData;
        };
        *last_adjustment = Some(now);

        let entries: Vec<_> = table.entries().collect();
        let expected_kept: f64 = entries
            .iter()
            .map(|(_, entry)| {
                entry.take_recent_seen() * clamp_rate(entry.rate() * extra_sample_rate)
            })
            .sum();
        let expected_tps = expected_kept / elapsed;

        let seen_tps = backend.seen_score(now);
        let achieved_tps = backend.sampled_score(now);
        if achieved_tps <= NEGLIGIBLE_TPS || expected_tps <= NEGLIGIBLE_TPS {
            return RateAdjustment::NoData;
        }

        let wanted_tps = backend
            .required_sampled_tps(now, self.period, self.target_tps)
            .clamp(
                MIN_WANTED_TPS_RATIO * self.target_tps,
                MAX_WANTED_TPS_RATIO * self.target_tps,
            );
        let factor = wanted_tps / expected_tps;
        for (_, entry) in entries {
            entry.set_rate(entry.rate() * factor);
        }
        RateAdjustment::Scaled {
            factor,
            achieved_tps,
            seen_tps,
            expected_tps,
        }
    }
}
