// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Span model consumed by the sampler.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The subset of a v0.4 span the sampler and the default signature keyer look at.
///
/// A trace is a slice of spans sharing the same `trace_id`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Span {
    /// Name of the service emitting the span.
    pub service: String,
    /// Operation name.
    pub name: String,
    /// Resource the operation acts on (endpoint, query, ...).
    pub resource: String,
    /// Span type (`web`, `sql`, ...).
    #[serde(rename = "type")]
    pub r#type: String,
    /// Identifier shared by all the spans of a trace.
    pub trace_id: u64,
    /// Identifier of the span within its trace.
    pub span_id: u64,
    /// `span_id` of the parent span, `0` for a root span.
    pub parent_id: u64,
    /// Start time in nanoseconds since the unix epoch.
    pub start: i64,
    /// Duration in nanoseconds.
    pub duration: i64,
    /// Non-zero when the span is an error.
    pub error: i32,
    /// String tags.
    pub meta: HashMap<String, String>,
    /// Numeric tags.
    pub metrics: HashMap<String, f64>,
}

impl Span {
    /// Return true if the span is flagged as an error.
    pub fn is_error(&self) -> bool {
        self.error != 0
    }
}
