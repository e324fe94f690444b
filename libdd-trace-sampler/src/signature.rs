// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Trace signatures grouping traces considered interchangeable for sampling purposes.
//!
//! The sampler only needs a [`SignatureKeyer`]. [`SpanSignatureKeyer`] is the default one and
//! hashes the fields of the spans that make two traces "the same kind" of trace.

use crate::span::Span;
use std::fmt;

const OFFSET_32: u32 = 2166136261;
const PRIME_32: u32 = 16777619;
const TAG_STATUS_CODE: &str = "http.status_code";
const TAG_ERROR_TYPE: &str = "error.type";

/// Opaque identifier of a group of traces sharing the same sampling rate.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Signature(pub u64);

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Maps a trace to its signature.
///
/// Implementations must be stable: semantically equivalent traces get the same signature, in this
/// process and after a restart.
///
/// Any `Fn(&[Span], &Span, &str) -> Signature` is a keyer, which is convenient for hosts with
/// their own notion of trace groups.
pub trait SignatureKeyer {
    /// Return the signature of `trace`, whose root span is `root`, received from `env`.
    fn signature(&self, trace: &[Span], root: &Span, env: &str) -> Signature;
}

impl<F> SignatureKeyer for F
where
    F: Fn(&[Span], &Span, &str) -> Signature,
{
    fn signature(&self, trace: &[Span], root: &Span, env: &str) -> Signature {
        self(trace, root, env)
    }
}

/// Default keyer hashing (env, service, name, error, resource, http status, error type).
///
/// The root span contributes with its resource, every span of the trace contributes without it.
/// Span hashes are deduplicated so that a trace repeating the same call many times has the
/// signature of a trace making it once, and the result doesn't depend on the order of the spans.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpanSignatureKeyer;

impl SignatureKeyer for SpanSignatureKeyer {
    fn signature(&self, trace: &[Span], root: &Span, env: &str) -> Signature {
        compute_signature_with_root_and_env(trace, root, env)
    }
}

fn write_hash(mut hash: u32, bytes: &[u8]) -> u32 {
    for &b in bytes {
        hash ^= b as u32;
        hash = hash.wrapping_mul(PRIME_32);
    }
    hash
}

fn compute_span_hash(span: &Span, env: &str, with_resource: bool) -> u32 {
    let mut h = OFFSET_32;
    h = write_hash(h, env.as_bytes());
    h = write_hash(h, span.service.as_bytes());
    h = write_hash(h, span.name.as_bytes());
    h = write_hash(h, &[span.is_error() as u8]);
    if with_resource {
        h = write_hash(h, span.resource.as_bytes());
    }
    if let Some(code) = span.meta.get(TAG_STATUS_CODE) {
        h = write_hash(h, code.as_bytes());
    }
    if let Some(error_type) = span.meta.get(TAG_ERROR_TYPE) {
        h = write_hash(h, error_type.as_bytes());
    }
    h
}

/// Compute the signature of a trace from its root span and the environment it comes from.
pub fn compute_signature_with_root_and_env(trace: &[Span], root: &Span, env: &str) -> Signature {
    let root_hash = compute_span_hash(root, env, true);
    let mut span_hashes: Vec<u32> = trace
        .iter()
        .map(|span| compute_span_hash(span, env, false))
        .collect();
    span_hashes.sort_unstable();
    span_hashes.dedup();

    let trace_hash = span_hashes.iter().fold(root_hash, |acc, h| acc ^ h);
    Signature(trace_hash as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_trace(trace_id: u64) -> Vec<Span> {
        vec![
            Span {
                trace_id,
                span_id: 1,
                parent_id: 0,
                start: 42,
                duration: 1000000,
                service: "mcnulty".to_owned(),
                name: "http.request".to_owned(),
                resource: "GET /users".to_owned(),
                r#type: "web".to_owned(),
                ..Default::default()
            },
            Span {
                trace_id,
                span_id: 2,
                parent_id: 1,
                start: 100,
                duration: 200000,
                service: "mcnulty".to_owned(),
                name: "sql.query".to_owned(),
                resource: "SELECT * FROM users".to_owned(),
                r#type: "sql".to_owned(),
                ..Default::default()
            },
        ]
    }

    fn signature_of(trace: &[Span], env: &str) -> Signature {
        SpanSignatureKeyer.signature(trace, &trace[0], env)
    }

    #[test]
    fn test_signature_ignores_ids_and_timing() {
        let trace_a = get_test_trace(1);
        let mut trace_b = get_test_trace(2);
        trace_b[1].span_id = 12;
        trace_b[1].start = 5000;
        trace_b[1].duration = 1;
        assert_eq!(signature_of(&trace_a, "prod"), signature_of(&trace_b, "prod"));
    }

    #[test]
    fn test_signature_depends_on_env() {
        let trace = get_test_trace(1);
        assert_ne!(signature_of(&trace, "prod"), signature_of(&trace, "staging"));
    }

    #[test]
    fn test_signature_depends_on_root_resource_only() {
        let trace = get_test_trace(1);
        let mut other_root = trace.clone();
        other_root[0].resource = "GET /orders".to_owned();
        assert_ne!(signature_of(&trace, ""), signature_of(&other_root, ""));

        let mut other_child = trace.clone();
        other_child[1].resource = "SELECT * FROM orders".to_owned();
        assert_eq!(signature_of(&trace, ""), signature_of(&other_child, ""));
    }

    #[test]
    fn test_signature_depends_on_errors() {
        let trace = get_test_trace(1);
        let mut error_trace = trace.clone();
        error_trace[1].error = 1;
        assert_ne!(signature_of(&trace, ""), signature_of(&error_trace, ""));

        let mut typed_error = error_trace.clone();
        typed_error[1]
            .meta
            .insert(TAG_ERROR_TYPE.to_owned(), "TimeoutError".to_owned());
        assert_ne!(signature_of(&error_trace, ""), signature_of(&typed_error, ""));

        let mut status_error = error_trace.clone();
        status_error[0]
            .meta
            .insert(TAG_STATUS_CODE.to_owned(), "500".to_owned());
        assert_ne!(signature_of(&error_trace, ""), signature_of(&status_error, ""));
    }

    #[test]
    fn test_signature_is_order_and_repetition_independent() {
        let trace = get_test_trace(1);
        let mut reversed = trace.clone();
        reversed.reverse();
        assert_eq!(
            signature_of(&trace, ""),
            SpanSignatureKeyer.signature(&reversed, &trace[0], "")
        );

        let mut repeated = trace.clone();
        repeated.push(trace[1].clone());
        repeated.push(trace[1].clone());
        assert_eq!(signature_of(&trace, ""), signature_of(&repeated, ""));
    }

    #[test]
    fn test_signature_of_deserialized_trace() {
        let trace: Vec<Span> = serde_json::from_str(
            r#"[
                {"trace_id": 7, "span_id": 1, "service": "mcnulty", "name": "http.request",
                 "resource": "GET /users", "type": "web", "start": 42, "duration": 1000000},
                {"trace_id": 7, "span_id": 2, "parent_id": 1, "service": "mcnulty",
                 "name": "sql.query", "resource": "SELECT 1", "type": "sql"}
            ]"#,
        )
        .unwrap();
        assert_eq!(trace[0].r#type, "web");
        assert_eq!(signature_of(&trace, "prod"), signature_of(&get_test_trace(3), "prod"));
    }

    #[test]
    fn test_closure_keyer() {
        let keyer = |_: &[Span], root: &Span, _: &str| Signature(root.service.len() as u64);
        let trace = get_test_trace(1);
        assert_eq!(keyer.signature(&trace, &trace[0], "prod"), Signature(7));
    }

    #[test]
    fn test_signature_display() {
        assert_eq!(Signature(0xabc).to_string(), "0000000000000abc");
    }
}
