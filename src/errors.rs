// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Connectors
//!
//! `ConnectorError` is what a connector or actor filter hands back to the
//! workflow engine. `BrokerError` is narrower: it is produced by the broker
//! seam and lets the drainer tell a missing queue apart from a real failure.

use thiserror::Error;

/// Represents every failure a connector or actor filter can report to the host.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConnectorError {
    /// One or more input parameters are missing or have the wrong shape.
    /// All violations are collected before this is returned.
    #[error("{}", .0.join("\n"))]
    Validation(Vec<String>),

    /// Error establishing a connection or opening a channel
    #[error("failure to connect to rabbitmq on host `{host}`")]
    Connection { host: String },

    /// The channel was shut down for a reason other than a missing queue
    #[error("channel failure `{0}`")]
    Channel(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueue(String),

    /// Error publishing to the given queue
    #[error("failure to publish to queue `{0}`")]
    Publish(String),

    /// Error pulling a message from the given queue
    #[error("failure to fetch from queue `{0}`")]
    Fetch(String),

    /// The match target can't be read as the number the strategy needs
    #[error("match target `{0}` is not a valid 64-bit integer")]
    TargetFormat(String),

    /// An actor filter could not compute its candidate list
    #[error("filter failure `{0}`")]
    Filter(String),
}

/// Errors raised by a [`crate::broker::QueueBroker`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Passive declaration found no queue with this name (AMQP 404)
    #[error("queue `{0}` not found")]
    QueueNotFound(String),

    /// Any other channel level failure
    #[error("channel error `{0}`")]
    Channel(String),
}

/// Errors raised by the engine services an actor filter calls into.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("process instance `{0}` not found")]
    ProcessInstanceNotFound(i64),

    #[error("search failure `{0}`")]
    Search(String),

    #[error("internal error `{0}`")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_lists_every_violation() {
        let err = ConnectorError::Validation(vec![
            "host is missing".to_owned(),
            "queueName should be a String but was Integer".to_owned(),
        ]);

        assert_eq!(
            err.to_string(),
            "host is missing\nqueueName should be a String but was Integer"
        );
    }

    #[test]
    fn connection_error_names_the_host() {
        let err = ConnectorError::Connection {
            host: "broker.local".to_owned(),
        };

        assert!(err.to_string().contains("broker.local"));
    }
}
