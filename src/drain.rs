// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Drainer
//!
//! Scans a queue for a message satisfying a [`Matcher`] with explicit
//! fetch-one-at-a-time pulls, so the scan is synchronous and ends as soon as
//! the broker reports the queue empty.
//!
//! The scan:
//! 1. passively checks the queue; an empty or missing queue ends the drain
//!    without a single fetch,
//! 2. pulls messages one by one (no auto-ack) until the broker has none left,
//! 3. acknowledges a match and, depending on [`StopAt`], stops or keeps going,
//! 4. acknowledges or leaves a non-match, depending on [`OnMismatch`].
//!
//! Every delivery tag is acknowledged at most once. A failed ack is logged
//! and counted but never aborts the scan.

use crate::{
    broker::QueueBroker,
    errors::{BrokerError, ConnectorError},
    matcher::Matcher,
    message::Message,
    otel::{self, TRACER_NAME},
};
use opentelemetry::{
    global::{self, BoxedTracer},
    trace::{Span, Status},
    Context, KeyValue,
};
use std::{borrow::Cow, fmt, str::FromStr};
use tracing::{debug, error, info, warn};

/// When the scan ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopAt {
    /// Stop right after the first match; later messages are never fetched.
    #[default]
    FirstMatch,
    /// Keep pulling until the queue is empty. The first match is the result;
    /// later matches are still acknowledged and counted.
    FullDrain,
}

/// What happens to a fetched message that does not match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnMismatch {
    /// Acknowledge it, removing it from the queue for good.
    #[default]
    Acknowledge,
    /// Leave it unacknowledged; the broker redelivers it once the channel
    /// closes.
    Leave,
}

impl FromStr for StopAt {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "firstMatch" => Ok(StopAt::FirstMatch),
            "fullDrain" => Ok(StopAt::FullDrain),
            other => Err(format!(
                "unknown drain mode `{other}`, expected one of: firstMatch, fullDrain"
            )),
        }
    }
}

impl fmt::Display for StopAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopAt::FirstMatch => "firstMatch",
            StopAt::FullDrain => "fullDrain",
        })
    }
}

impl FromStr for OnMismatch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "acknowledge" => Ok(OnMismatch::Acknowledge),
            "leave" => Ok(OnMismatch::Leave),
            other => Err(format!(
                "unknown non-matching policy `{other}`, expected one of: acknowledge, leave"
            )),
        }
    }
}

impl fmt::Display for OnMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OnMismatch::Acknowledge => "acknowledge",
            OnMismatch::Leave => "leave",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainPolicy {
    pub stop: StopAt,
    pub on_mismatch: OnMismatch,
}

/// Result of one drain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainOutcome {
    pub matched: Option<Message>,
    pub fetched: usize,
    pub acknowledged: usize,
    pub ack_failures: usize,
    pub extra_matches: usize,
}

pub struct QueueDrainer<'d, B: QueueBroker + ?Sized> {
    broker: &'d B,
    matcher: &'d Matcher,
    policy: DrainPolicy,
}

impl<'d, B: QueueBroker + ?Sized> QueueDrainer<'d, B> {
    pub fn new(broker: &'d B, matcher: &'d Matcher, policy: DrainPolicy) -> Self {
        QueueDrainer {
            broker,
            matcher,
            policy,
        }
    }

    /// Scans `queue` from its head.
    ///
    /// # Returns
    /// The outcome of the scan, or an error when the passive check fails for a
    /// reason other than a missing queue or when a fetch fails.
    pub async fn drain(&self, queue: &str) -> Result<DrainOutcome, ConnectorError> {
        let tracer = global::tracer(TRACER_NAME);
        let mut span = otel::new_span(&tracer, &Context::current(), "queue drain", queue);

        let result = self.scan(&tracer, queue).await;

        match &result {
            Ok(outcome) => {
                span.set_attribute(KeyValue::new("drain.fetched", outcome.fetched as i64));
                span.set_attribute(KeyValue::new("drain.matched", outcome.matched.is_some()));
                span.set_status(Status::Ok);
            }
            Err(err) => {
                span.record_error(err);
                span.set_status(Status::Error {
                    description: Cow::from(err.to_string()),
                });
            }
        }
        span.end();

        result
    }

    async fn scan(&self, tracer: &BoxedTracer, queue: &str) -> Result<DrainOutcome, ConnectorError> {
        let mut outcome = DrainOutcome::default();

        match self.broker.message_count(queue).await {
            Ok(0) => {
                info!(queue = queue, "queue is empty");
                return Ok(outcome);
            }
            Ok(count) => debug!(queue = queue, count = count, "queue has messages"),
            Err(BrokerError::QueueNotFound(_)) => {
                warn!(queue = queue, "queue not found, treating it as empty");
                return Ok(outcome);
            }
            Err(BrokerError::Channel(err)) => return Err(ConnectorError::Channel(err)),
        }

        while let Some(msg) = self.fetch(queue).await? {
            outcome.fetched += 1;

            if !self.matcher.matches(&msg) {
                match self.policy.on_mismatch {
                    OnMismatch::Acknowledge => {
                        debug!(tag = msg.delivery_tag, "no match, discarding message");
                        self.acknowledge(&msg, &mut outcome).await;
                    }
                    OnMismatch::Leave => {
                        debug!(tag = msg.delivery_tag, "no match, leaving message");
                    }
                }
                continue;
            }

            self.acknowledge(&msg, &mut outcome).await;

            if outcome.matched.is_some() {
                outcome.extra_matches += 1;
                warn!(
                    tag = msg.delivery_tag,
                    "another message matched the same target, it was consumed"
                );
            } else {
                info!(tag = msg.delivery_tag, queue = queue, "matching message found");
                let ctx = otel::extract_context(msg.headers.as_ref());
                let mut span = otel::new_span(tracer, &ctx, "message matched", queue);
                span.set_status(Status::Ok);
                span.end();

                outcome.matched = Some(msg);
            }

            if self.policy.stop == StopAt::FirstMatch {
                break;
            }
        }

        debug!(
            fetched = outcome.fetched,
            acknowledged = outcome.acknowledged,
            "drain finished"
        );

        Ok(outcome)
    }

    async fn fetch(&self, queue: &str) -> Result<Option<Message>, ConnectorError> {
        self.broker.fetch(queue).await.map_err(|err| {
            error!(error = err.to_string(), queue = queue, "failure to fetch");
            ConnectorError::Fetch(queue.to_owned())
        })
    }

    async fn acknowledge(&self, msg: &Message, outcome: &mut DrainOutcome) {
        match self.broker.ack(msg.delivery_tag).await {
            Ok(()) => outcome.acknowledged += 1,
            Err(err) => {
                outcome.ack_failures += 1;
                error!(
                    error = err.to_string(),
                    tag = msg.delivery_tag,
                    "failure to ack message, its state in the queue is unknown"
                );
            }
        }
    }
}
