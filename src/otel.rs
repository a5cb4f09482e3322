// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # OpenTelemetry Integration
//!
//! Trace context travels in message headers: the publisher injects the
//! current context and the drainer extracts it from the matched message so
//! the consuming side can be stitched to the producing side.

use crate::message::{HeaderValue, Headers};
use opentelemetry::{
    global::{BoxedSpan, BoxedTracer},
    propagation::{Extractor, Injector},
    trace::{SpanKind, Tracer},
    Context, KeyValue,
};
use std::borrow::Cow;

pub(crate) const TRACER_NAME: &str = "rabbitmq connectors";

/// Writes trace context entries into a header map.
pub(crate) struct HeaderInjector<'a> {
    headers: &'a mut Headers,
}

impl<'a> HeaderInjector<'a> {
    pub(crate) fn new(headers: &'a mut Headers) -> Self {
        Self { headers }
    }
}

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.headers
            .insert(key.to_lowercase(), HeaderValue::Text(value));
    }
}

/// Reads trace context entries from a header map. Only text headers can carry
/// a context entry.
pub(crate) struct HeaderExtractor<'a> {
    headers: &'a Headers,
}

impl<'a> HeaderExtractor<'a> {
    pub(crate) fn new(headers: &'a Headers) -> Self {
        Self { headers }
    }
}

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        match self.headers.get(key) {
            Some(HeaderValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    fn keys(&self) -> Vec<&str> {
        self.headers.keys().map(String::as_str).collect()
    }
}

pub(crate) fn inject_context(ctx: &Context, headers: &mut Headers) {
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(ctx, &mut HeaderInjector::new(headers))
    });
}

pub(crate) fn extract_context(headers: Option<&Headers>) -> Context {
    let empty = Headers::default();
    let headers = headers.unwrap_or(&empty);

    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.extract(&HeaderExtractor::new(headers))
    })
}

/// Starts a consumer span for work on `queue`, parented on `ctx`.
pub(crate) fn new_span(tracer: &BoxedTracer, ctx: &Context, name: &str, queue: &str) -> BoxedSpan {
    tracer
        .span_builder(Cow::from(name.to_owned()))
        .with_kind(SpanKind::Consumer)
        .with_attributes(vec![KeyValue::new(
            "messaging.destination.name",
            queue.to_owned(),
        )])
        .start_with_context(tracer, ctx)
}
