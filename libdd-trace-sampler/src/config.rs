// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Configuration types for `libdd-trace-sampler`.

use crate::error::SamplerError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Kept traces per second targeted by default.
pub const DEFAULT_TARGET_TPS: f64 = 10.0;
/// Multiplier applied to every rate by default.
pub const DEFAULT_EXTRA_SAMPLE_RATE: f64 = 1.0;
/// Interval between two rate adjustments.
pub const DEFAULT_DECAY_PERIOD: Duration = Duration::from_secs(5);
/// Memory of the decayed scores: six decay periods, scores approximate a trailing 30 seconds
/// average.
pub const DEFAULT_DECAY_HALF_LIFE: Duration = Duration::from_secs(30);
/// Number of signatures tracked before new signatures start sharing buckets.
pub const DEFAULT_MAX_SIGNATURES: usize = 200;

const ENV_TARGET_TPS: &str = "DD_APM_ERROR_TPS";
const ENV_EXTRA_SAMPLE_RATE: &str = "DD_APM_EXTRA_SAMPLE_RATE";
const ENV_DECAY_PERIOD: &str = "DD_APM_ERROR_DECAY_PERIOD";
const ENV_DECAY_HALF_LIFE: &str = "DD_APM_ERROR_DECAY_HALF_LIFE";

mod parse_env {
    use std::{env, str::FromStr, time::Duration};
    use tracing::warn;

    pub fn parse<T: FromStr>(name: &str) -> Option<T> {
        let value = env::var(name).ok()?;
        match value.trim().parse::<T>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                warn!(name, value = %value, "Ignoring unparsable environment variable");
                None
            }
        }
    }

    pub fn duration(name: &str) -> Option<Duration> {
        let secs = parse::<f64>(name)?;
        match Duration::try_from_secs_f64(secs) {
            Ok(duration) => Some(duration),
            Err(_) => {
                warn!(name, secs, "Ignoring invalid duration in environment variable");
                None
            }
        }
    }
}

/// (De)serialize a duration as a floating point number of seconds.
mod duration_secs {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        duration: &Duration,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

/// Validated configuration of a [`crate::Sampler`].
///
/// Constructed via [`SamplerConfig::builder`], [`SamplerConfig::default`] or deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SamplerConfigBuilder", into = "SamplerConfigBuilder")]
pub struct SamplerConfig {
    extra_sample_rate: f64,
    target_tps: f64,
    decay_period: Duration,
    decay_half_life: Duration,
    max_signatures: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            extra_sample_rate: DEFAULT_EXTRA_SAMPLE_RATE,
            target_tps: DEFAULT_TARGET_TPS,
            decay_period: DEFAULT_DECAY_PERIOD,
            decay_half_life: DEFAULT_DECAY_HALF_LIFE,
            max_signatures: DEFAULT_MAX_SIGNATURES,
        }
    }
}

impl SamplerConfig {
    /// Return a builder initialized with the default configuration.
    pub fn builder() -> SamplerConfigBuilder {
        SamplerConfigBuilder::new()
    }

    /// Multiplier applied to every rate when deciding to keep a trace.
    pub fn extra_sample_rate(&self) -> f64 {
        self.extra_sample_rate
    }

    /// Targeted kept traces per second. Zero disables sampling: every trace is dropped.
    pub fn target_tps(&self) -> f64 {
        self.target_tps
    }

    /// Interval between two rate adjustments.
    pub fn decay_period(&self) -> Duration {
        self.decay_period
    }

    /// Time constant of the decayed scores.
    pub fn decay_half_life(&self) -> Duration {
        self.decay_half_life
    }

    /// Number of tracked signatures above which new signatures share buckets.
    pub fn max_signatures(&self) -> usize {
        self.max_signatures
    }
}

/// Builder for [`SamplerConfig`].
///
/// Also the serialized form of the configuration, where every field is optional and `error_tps`
/// is accepted as an alias of `target_tps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfigBuilder {
    extra_sample_rate: f64,
    #[serde(alias = "error_tps")]
    target_tps: f64,
    #[serde(with = "duration_secs")]
    decay_period: Duration,
    #[serde(with = "duration_secs")]
    decay_half_life: Duration,
    max_signatures: usize,
}

impl Default for SamplerConfigBuilder {
    fn default() -> Self {
        SamplerConfig::default().into()
    }
}

impl From<SamplerConfig> for SamplerConfigBuilder {
    fn from(config: SamplerConfig) -> Self {
        Self {
            extra_sample_rate: config.extra_sample_rate,
            target_tps: config.target_tps,
            decay_period: config.decay_period,
            decay_half_life: config.decay_half_life,
            max_signatures: config.max_signatures,
        }
    }
}

impl TryFrom<SamplerConfigBuilder> for SamplerConfig {
    type Error = SamplerError;

    fn try_from(builder: SamplerConfigBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

impl SamplerConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with default settings overridden by the environment.
    ///
    /// Reads `DD_APM_ERROR_TPS`, `DD_APM_EXTRA_SAMPLE_RATE`, `DD_APM_ERROR_DECAY_PERIOD` and
    /// `DD_APM_ERROR_DECAY_HALF_LIFE`, durations being expressed in seconds. Values which can't
    /// be parsed are ignored.
    pub fn from_env() -> Self {
        let mut builder = Self::new();
        if let Some(target_tps) = parse_env::parse(ENV_TARGET_TPS) {
            builder.target_tps = target_tps;
        }
        if let Some(extra_sample_rate) = parse_env::parse(ENV_EXTRA_SAMPLE_RATE) {
            builder.extra_sample_rate = extra_sample_rate;
        }
        if let Some(decay_period) = parse_env::duration(ENV_DECAY_PERIOD) {
            builder.decay_period = decay_period;
        }
        if let Some(decay_half_life) = parse_env::duration(ENV_DECAY_HALF_LIFE) {
            builder.decay_half_life = decay_half_life;
        }
        builder
    }

    /// Set the multiplier applied to every rate.
    pub fn extra_sample_rate(mut self, rate: f64) -> Self {
        self.extra_sample_rate = rate;
        self
    }

    /// Set the targeted kept traces per second. Zero disables sampling.
    pub fn target_tps(mut self, tps: f64) -> Self {
        self.target_tps = tps;
        self
    }

    /// Set the interval between two rate adjustments.
    pub fn decay_period(mut self, period: Duration) -> Self {
        self.decay_period = period;
        self
    }

    /// Set the time constant of the decayed scores.
    pub fn decay_half_life(mut self, half_life: Duration) -> Self {
        self.decay_half_life = half_life;
        self
    }

    /// Set the number of tracked signatures above which new signatures share buckets.
    pub fn max_signatures(mut self, max_signatures: usize) -> Self {
        self.max_signatures = max_signatures;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    /// Returns an error if a rate is negative or not finite, if a duration is zero or if
    /// `max_signatures` is lower than 2.
    pub fn build(self) -> Result<SamplerConfig, SamplerError> {
        if !self.target_tps.is_finite() || self.target_tps < 0.0 {
            return Err(SamplerError::InvalidTargetTps(self.target_tps));
        }
        if !self.extra_sample_rate.is_finite() || self.extra_sample_rate < 0.0 {
            return Err(SamplerError::InvalidExtraSampleRate(self.extra_sample_rate));
        }
        if self.decay_period.is_zero() {
            return Err(SamplerError::InvalidDecayPeriod);
        }
        if self.decay_half_life.is_zero() {
            return Err(SamplerError::InvalidDecayHalfLife);
        }
        if self.max_signatures < 2 {
            return Err(SamplerError::InvalidMaxSignatures(self.max_signatures));
        }
        Ok(SamplerConfig {
            extra_sample_rate: self.extra_sample_rate,
            target_tps: self.target_tps,
            decay_period: self.decay_period,
            decay_half_life: self.decay_half_life,
            max_signatures: self.max_signatures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SamplerConfig::default();
        assert_eq!(config.target_tps(), 10.0);
        assert_eq!(config.extra_sample_rate(), 1.0);
        assert_eq!(config.decay_period(), Duration::from_secs(5));
        assert_eq!(config.decay_half_life(), Duration::from_secs(30));
        assert_eq!(config.max_signatures(), 200);
        assert_eq!(SamplerConfig::builder().build(), Ok(config));
    }

    #[test]
    fn test_builder() {
        let config = SamplerConfig::builder()
            .target_tps(0.0)
            .extra_sample_rate(0.5)
            .decay_period(Duration::from_secs(1))
            .decay_half_life(Duration::from_secs(4))
            .max_signatures(10)
            .build()
            .unwrap();
        assert_eq!(config.target_tps(), 0.0);
        assert_eq!(config.extra_sample_rate(), 0.5);
        assert_eq!(config.decay_period(), Duration::from_secs(1));
        assert_eq!(config.decay_half_life(), Duration::from_secs(4));
        assert_eq!(config.max_signatures(), 10);
    }

    #[test]
    fn test_invalid_config() {
        let invalid = [
            (
                SamplerConfig::builder().target_tps(-1.0),
                SamplerError::InvalidTargetTps(-1.0),
            ),
            (
                SamplerConfig::builder().target_tps(f64::INFINITY),
                SamplerError::InvalidTargetTps(f64::INFINITY),
            ),
            (
                SamplerConfig::builder().extra_sample_rate(-0.1),
                SamplerError::InvalidExtraSampleRate(-0.1),
            ),
            (
                SamplerConfig::builder().decay_period(Duration::ZERO),
                SamplerError::InvalidDecayPeriod,
            ),
            (
                SamplerConfig::builder().decay_half_life(Duration::ZERO),
                SamplerError::InvalidDecayHalfLife,
            ),
            (
                SamplerConfig::builder().max_signatures(1),
                SamplerError::InvalidMaxSignatures(1),
            ),
        ];
        for (builder, expected) in invalid {
            assert_eq!(builder.build(), Err(expected));
        }
        assert!(matches!(
            SamplerConfig::builder().target_tps(f64::NAN).build(),
            Err(SamplerError::InvalidTargetTps(_))
        ));
    }

    #[test]
    fn test_deserialize() {
        let config: SamplerConfig = serde_json::from_str(
            r#"{"error_tps": 5, "extra_sample_rate": 0.5, "decay_period": 2.5}"#,
        )
        .unwrap();
        assert_eq!(config.target_tps(), 5.0);
        assert_eq!(config.extra_sample_rate(), 0.5);
        assert_eq!(config.decay_period(), Duration::from_millis(2500));
        assert_eq!(config.decay_half_life(), DEFAULT_DECAY_HALF_LIFE);

        let config: SamplerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SamplerConfig::default());
    }

    #[test]
    fn test_deserialize_invalid() {
        assert!(serde_json::from_str::<SamplerConfig>(r#"{"target_tps": -3}"#).is_err());
        assert!(serde_json::from_str::<SamplerConfig>(r#"{"decay_period": -1}"#).is_err());
        assert!(serde_json::from_str::<SamplerConfig>(r#"{"decay_period": 0}"#).is_err());
    }

    #[test]
    fn test_serialize_round_trip() {
        let config = SamplerConfig::builder().target_tps(3.0).build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"target_tps\":3.0"), "{json}");
        assert_eq!(serde_json::from_str::<SamplerConfig>(&json).unwrap(), config);
    }

    #[test]
    fn test_from_env() {
        std::env::set_var(ENV_TARGET_TPS, "25");
        std::env::set_var(ENV_EXTRA_SAMPLE_RATE, " 0.75 ");
        std::env::set_var(ENV_DECAY_PERIOD, "not a number");
        std::env::set_var(ENV_DECAY_HALF_LIFE, "-4");

        let config = SamplerConfigBuilder::from_env().build().unwrap();

        std::env::remove_var(ENV_TARGET_TPS);
        std::env::remove_var(ENV_EXTRA_SAMPLE_RATE);
        std::env::remove_var(ENV_DECAY_PERIOD);
        std::env::remove_var(ENV_DECAY_HALF_LIFE);

        assert_eq!(config.target_tps(), 25.0);
        assert_eq!(config.extra_sample_rate(), 0.75);
        assert_eq!(config.decay_period(), DEFAULT_DECAY_PERIOD);
        assert_eq!(config.decay_half_life(), DEFAULT_DECAY_HALF_LIFE);
    }
}
