// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Definitions
//!
//! Builder for the queue declarations the connectors issue: an active durable
//! declaration before publishing and a passive existence check before draining.

use lapin::options::QueueDeclareOptions;

/// Definition of a RabbitMQ queue with its declaration flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) durable: bool,
    pub(crate) passive: bool,
}

impl QueueDefinition {
    /// Creates a new, non-durable queue definition. Connector queues are
    /// never exclusive nor auto-deleted.
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Makes the queue durable, persisting across broker restarts.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Only checks that the queue exists. The broker closes the channel
    /// with a 404 if it does not.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    pub(crate) fn declare_options(&self) -> QueueDeclareOptions {
        QueueDeclareOptions {
            passive: self.passive,
            durable: self.durable,
            exclusive: false,
            auto_delete: false,
            nowait: false,
        }
    }
}
