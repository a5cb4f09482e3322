// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! RabbitMQ connectors and actor filters for a workflow engine.
//!
//! Connectors publish to or drain a RabbitMQ queue once per invocation;
//! actor filters compute the candidate users of a human task. Both take an
//! untyped parameter map from the host and validate it before doing any work.

mod otel;

pub mod broker;
pub mod channel;
pub mod config;
pub mod connector;
pub mod consumer;
pub mod drain;
pub mod errors;
pub mod filter;
pub mod matcher;
pub mod message;
pub mod params;
pub mod publisher;
pub mod queue;
