// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The sampler deciding which traces are kept.

use crate::backend::Backend;
use crate::config::SamplerConfig;
use crate::rate_controller::{RateAdjustment, RateController};
use crate::signature::{Signature, SignatureKeyer, SpanSignatureKeyer};
use crate::span::Span;
use crate::table::{clamp_rate, SignatureTable, INITIAL_SIGNATURE_RATE};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::debug;

// Knuth multiplicative hashing spreads trace ids uniformly over the u64 range
const SAMPLER_HASHER: u64 = 1111111111111111111;
const MAX_TRACE_ID_FLOAT: f64 = u64::MAX as f64;

/// Seen score under which a signature is forgotten
const STALE_SIGNATURE_SCORE: f64 = 0.01;

/// High bit marking the signatures of the shared buckets
const SHARED_BUCKET_TAG: u64 = 1 << 63;

/// Return whether to keep a trace, based on its id and a sampling rate.
///
/// The verdict only depends on its inputs so every process sampling the same trace with the same
/// rate reaches the same decision. This assumes that trace ids are nearly uniformly distributed.
pub fn sample_by_rate(trace_id: u64, rate: f64) -> bool {
    if rate >= 1.0 {
        true
    } else if rate > 0.0 {
        trace_id.wrapping_mul(SAMPLER_HASHER) < (rate * MAX_TRACE_ID_FLOAT) as u64
    } else {
        false
    }
}

/// Adaptive sampler keeping around `target_tps` traces per second.
///
/// Every trace is counted for its signature, then kept with the rate of the signature multiplied
/// by the extra sample rate. [`Sampler::update_rates`] must be called every
/// [`SamplerConfig::decay_period`] to bring the throughput of kept traces to the target, which is
/// what the [`crate::RateUpdater`] does.
///
/// The sampler is disabled when the target TPS is zero: traces are still counted, but none is
/// kept.
#[derive(Debug)]
pub struct Sampler<K = SpanSignatureKeyer> {
    config: SamplerConfig,
    keyer: K,
    table: SignatureTable,
    backend: Backend,
    controller: RateController,
    /// `f64` bits of the extra sample rate
    extra_sample_rate: AtomicU64,
}

impl Sampler<SpanSignatureKeyer> {
    /// Return a sampler computing signatures with [`SpanSignatureKeyer`].
    pub fn new(config: SamplerConfig) -> Self {
        Self::with_keyer(config, SpanSignatureKeyer)
    }
}

impl<K: SignatureKeyer> Sampler<K> {
    /// Return a sampler computing signatures with `keyer`.
    pub fn with_keyer(config: SamplerConfig, keyer: K) -> Self {
        Self {
            table: SignatureTable::new(config.decay_half_life()),
            backend: Backend::new(config.decay_half_life()),
            controller: RateController::new(config.target_tps(), config.decay_period()),
            extra_sample_rate: AtomicU64::new(config.extra_sample_rate().to_bits()),
            keyer,
            config,
        }
    }

    /// Count a trace and return true if it should be kept.
    ///
    /// `root` is the root span of `trace` and `env` the environment the trace comes from.
    pub fn sample(&self, now: SystemTime, trace: &[Span], root: &Span, env: &str) -> bool {
        let signature = self.compute_signature(trace, root, env);
        let entry = self.table.get_or_create(signature);
        entry.count_seen(now, 1.0);
        self.backend.record_seen(now, 1.0);

        if self.is_disabled() {
            return false;
        }

        let rate = self.apply_extra_sample_rate(entry.rate());
        if !sample_by_rate(root.trace_id, rate) {
            return false;
        }

        entry.count_sampled(now, 1.0);
        self.backend.record_sampled(now, 1.0);
        true
    }

    /// Recompute the rate of every signature and forget signatures without recent traffic.
    pub fn update_rates(&self, now: SystemTime) -> RateAdjustment {
        let adjustment = self
            .controller
            .adjust(now, &self.table, &self.backend, self.extra_sample_rate());
        let removed = self.table.remove_stale(now, STALE_SIGNATURE_SCORE);
        match adjustment {
            RateAdjustment::Scaled {
                factor,
                achieved_tps,
                seen_tps,
                expected_tps,
            } => debug!(
                factor,
                achieved_tps,
                seen_tps,
                expected_tps,
                target_tps = self.controller.target_tps(),
                signatures = self.table.len(),
                removed,
                "Adjusted signature sample rates"
            ),
            RateAdjustment::NoData => {
                debug!(removed, "No recent traffic, sample rates left unchanged")
            }
            RateAdjustment::Disabled => debug!(removed, "Sampling disabled, dropping every trace"),
        }
        adjustment
    }

    /// Return the signature `sample` would use for this trace.
    ///
    /// Once half of [`SamplerConfig::max_signatures`] signatures are tracked, signatures which
    /// are not tracked yet are folded into `max_signatures / 2` shared buckets. Tracked signatures
    /// keep their own rate. Shared buckets have the high bit set.
    pub fn compute_signature(&self, trace: &[Span], root: &Span, env: &str) -> Signature {
        let signature = self.keyer.signature(trace, root, env);
        let shared_buckets = self.config.max_signatures() / 2;
        if self.table.len() < shared_buckets || self.table.contains(&signature) {
            return signature;
        }
        Signature(SHARED_BUCKET_TAG | (signature.0 % shared_buckets as u64))
    }

    fn apply_extra_sample_rate(&self, rate: f64) -> f64 {
        clamp_rate(rate * self.extra_sample_rate())
    }

    /// Return the backend measuring the throughput of seen and kept traces.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Return the configuration the sampler was created with.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Return true if the sampler drops every trace.
    pub fn is_disabled(&self) -> bool {
        self.controller.target_tps() == 0.0
    }

    /// Return the multiplier currently applied to every rate.
    pub fn extra_sample_rate(&self) -> f64 {
        f64::from_bits(self.extra_sample_rate.load(Ordering::Relaxed))
    }

    /// Change the multiplier applied to every rate, effective for the next sampled trace.
    ///
    /// Negative rates are treated as zero and NaN is ignored.
    pub fn set_extra_sample_rate(&self, rate: f64) {
        if rate.is_nan() {
            return;
        }
        self.extra_sample_rate
            .store(rate.max(0.0).to_bits(), Ordering::Relaxed);
    }

    /// Return the stored rate of a tracked signature, without the extra sample rate.
    pub fn signature_rate(&self, signature: &Signature) -> Option<f64> {
        self.table.get(signature).map(|entry| entry.rate())
    }

    /// Return the probability of keeping a trace with this signature.
    ///
    /// Signatures which are not tracked yet get the rate of a new signature.
    pub fn effective_rate(&self, signature: &Signature) -> f64 {
        if self.is_disabled() {
            return 0.0;
        }
        let rate = self
            .signature_rate(signature)
            .unwrap_or(INITIAL_SIGNATURE_RATE);
        self.apply_extra_sample_rate(rate)
    }

    /// Return the number of tracked signatures.
    pub fn signature_count(&self) -> usize {
        self.table.len()
    }
}
