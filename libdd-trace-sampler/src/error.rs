// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for `libdd-trace-sampler`.

use thiserror::Error;

/// Errors raised when building a sampler from an invalid configuration.
///
/// Sampling itself never fails: every outcome of [`crate::Sampler::sample`] is a keep or drop
/// verdict.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplerError {
    /// The target TPS is negative, infinite or NaN.
    #[error("target TPS must be a finite, non-negative number, got {0}")]
    InvalidTargetTps(f64),

    /// The extra sample rate is negative, infinite or NaN.
    #[error("extra sample rate must be a finite, non-negative number, got {0}")]
    InvalidExtraSampleRate(f64),

    /// The decay period is zero.
    #[error("decay period must be greater than zero")]
    InvalidDecayPeriod,

    /// The decay half-life is zero.
    #[error("decay half-life must be greater than zero")]
    InvalidDecayHalfLife,

    /// The signature cardinality limit cannot hold a single shared bucket.
    #[error("signature cardinality limit must be at least 2, got {0}")]
    InvalidMaxSignatures(usize),
}
