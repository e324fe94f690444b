// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-signature sampling state.

use crate::decay::DecayedCounter;
use crate::signature::Signature;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Rate given to signatures seen for the first time.
pub const INITIAL_SIGNATURE_RATE: f64 = 1.0;

/// Clamp a sampling rate to [0, 1], mapping NaN to 0.
pub(crate) fn clamp_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        0.0
    } else {
        rate.clamp(0.0, 1.0)
    }
}

#[derive(Debug)]
struct EntryScores {
    seen: DecayedCounter,
    sampled: DecayedCounter,
    /// Traces seen since the last call to `take_recent_seen`
    recent_seen: f64,
}

/// Sampling state of a single signature.
///
/// Scores are protected by an entry-level lock while the rate is stored as atomic `f64` bits so
/// that the keep decision never waits on the rate controller.
#[derive(Debug)]
pub struct SignatureEntry {
    scores: Mutex<EntryScores>,
    rate: AtomicU64,
}

impl SignatureEntry {
    fn new(half_life: Duration) -> Self {
        Self {
            scores: Mutex::new(EntryScores {
                seen: DecayedCounter::new(half_life),
                sampled: DecayedCounter::new(half_life),
                recent_seen: 0.0,
            }),
            rate: AtomicU64::new(INITIAL_SIGNATURE_RATE.to_bits()),
        }
    }

    /// Return the stored sampling rate, always in [0, 1].
    pub fn rate(&self) -> f64 {
        f64::from_bits(self.rate.load(Ordering::Relaxed))
    }

    /// Store a new sampling rate, clamped to [0, 1].
    pub fn set_rate(&self, rate: f64) {
        self.rate.store(clamp_rate(rate).to_bits(), Ordering::Relaxed);
    }

    /// Count `amount` traces seen for this signature.
    pub fn count_seen(&self, now: SystemTime, amount: f64) {
        let mut scores = self.scores.lock();
        scores.seen.increment(now, amount);
        scores.recent_seen += amount;
    }

    /// Return the number of traces seen since the previous call and reset it.
    pub fn take_recent_seen(&self) -> f64 {
        std::mem::take(&mut self.scores.lock().recent_seen)
    }

    /// Count `amount` traces kept for this signature.
    pub fn count_sampled(&self, now: SystemTime, amount: f64) {
        self.scores.lock().sampled.increment(now, amount);
    }

    /// Return the decayed score of traces seen for this signature.
    pub fn seen_score(&self, now: SystemTime) -> f64 {
        self.scores.lock().seen.get(now)
    }

    /// Return the decayed score of traces kept for this signature.
    pub fn sampled_score(&self, now: SystemTime) -> f64 {
        self.scores.lock().sampled.get(now)
    }
}

/// Table of the signatures known to a sampler.
///
/// Entries are created lazily on first observation and removed by [`SignatureTable::remove_stale`]
/// once their activity decayed to a negligible score.
#[derive(Debug)]
pub struct SignatureTable {
    entries: RwLock<HashMap<Signature, Arc<SignatureEntry>>>,
    half_life: Duration,
}

impl SignatureTable {
    /// Return an empty table whose entries' scores decay with `half_life`.
    pub fn new(half_life: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            half_life,
        }
    }

    /// Return the entry of `signature`, creating it with a rate of 1 if it doesn't exist.
    ///
    /// Concurrent calls for the same unknown signature all get the same entry.
    pub fn get_or_create(&self, signature: Signature) -> Arc<SignatureEntry> {
        if let Some(entry) = self.entries.read().get(&signature) {
            return entry.clone();
        }
        self.entries
            .write()
            .entry(signature)
            .or_insert_with(|| Arc::new(SignatureEntry::new(self.half_life)))
            .clone()
    }

    /// Return the entry of `signature` if it exists.
    pub fn get(&self, signature: &Signature) -> Option<Arc<SignatureEntry>> {
        self.entries.read().get(signature).cloned()
    }

    /// Return true if `signature` has an entry.
    pub fn contains(&self, signature: &Signature) -> bool {
        self.entries.read().contains_key(signature)
    }

    /// Return the number of signatures in the table.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Return true if the table has no signature.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Return a snapshot of the entries of the table.
    ///
    /// Signatures inserted while iterating are not visited. Call it again to restart from a fresh
    /// snapshot.
    pub fn entries(&self) -> impl Iterator<Item = (Signature, Arc<SignatureEntry>)> {
        let snapshot: Vec<(Signature, Arc<SignatureEntry>)> = self
            .entries
            .read()
            .iter()
            .map(|(signature, entry)| (*signature, entry.clone()))
            .collect();
        snapshot.into_iter()
    }

    /// Remove the signatures whose seen score is below `threshold` and return how many were
    /// removed.
    pub fn remove_stale(&self, now: SystemTime, threshold: f64) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.seen_score(now) >= threshold);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Removed stale signatures");
        }
        removed
    }
}
