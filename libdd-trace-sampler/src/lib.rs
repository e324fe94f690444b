// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! `libdd-trace-sampler` decides, for every incoming trace, whether it should be kept so that the
//! throughput of kept traces converges to a configured number of traces per second (TPS).
//!
//! Traces are grouped by [`Signature`]. Each signature gets its own sampling rate, and a periodic
//! proportional controller scales all rates by the ratio between the throughput wanted for the
//! next period and the throughput the current rates would keep. Rates of signatures seen for the
//! first time start at `1.0`, which favors rare traces until the controller has data about them.
//!
//! The keep decision is derived from the trace id, so every process sampling the same trace with
//! the same rate reaches the same verdict.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), libdd_trace_sampler::SamplerError> {
//! use libdd_trace_sampler::{spawn_rate_updater, Sampler, SamplerConfig, Span};
//! use std::sync::Arc;
//! use std::time::SystemTime;
//!
//! let config = SamplerConfig::builder().target_tps(10.0).build()?;
//! let sampler = Arc::new(Sampler::new(config));
//! let updater = spawn_rate_updater(&sampler, &tokio::runtime::Handle::current());
//!
//! let root = Span {
//!     trace_id: 42,
//!     span_id: 1,
//!     service: "mcnulty".to_owned(),
//!     r#type: "web".to_owned(),
//!     ..Default::default()
//! };
//! let trace = vec![root.clone()];
//! let keep = sampler.sample(SystemTime::now(), &trace, &root, "prod");
//! # let _ = keep;
//!
//! updater.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod decay;
mod error;
pub mod rate_controller;
pub mod sampler;
pub mod signature;
pub mod span;
pub mod table;
pub mod worker;

pub use backend::Backend;
pub use config::{SamplerConfig, SamplerConfigBuilder};
pub use decay::DecayedCounter;
pub use error::SamplerError;
pub use rate_controller::{RateAdjustment, RateController};
pub use sampler::{sample_by_rate, Sampler};
pub use signature::{Signature, SignatureKeyer, SpanSignatureKeyer};
pub use span::Span;
pub use table::{SignatureEntry, SignatureTable};
pub use worker::{spawn_rate_updater, RateUpdater, RateUpdaterHandle};
