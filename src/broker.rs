// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Broker Operations
//!
//! The handful of queue operations the connectors need, behind a trait so the
//! drain and publish logic can be exercised without a running broker.
//! `AmqpBroker` is the lapin backed implementation.

use crate::{
    channel::{close_amqp_channel, new_amqp_channel},
    config::RabbitMQConfigs,
    errors::{BrokerError, ConnectorError},
    message::{headers_to_table, Headers, Message},
    queue::QueueDefinition,
};
use async_trait::async_trait;
use lapin::{
    options::{BasicAckOptions, BasicGetOptions, BasicPublishOptions},
    protocol::{AMQPErrorKind, AMQPSoftError},
    types::{FieldTable, ShortString},
    BasicProperties, Channel, Connection,
};
use tracing::{debug, error};
use uuid::Uuid;

/// Content type set on every published message
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Queue operations used by the connectors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueBroker: Send + Sync {
    /// Passively checks the queue and returns its current message count.
    /// A queue that does not exist yields `BrokerError::QueueNotFound`.
    async fn message_count(&self, queue: &str) -> Result<u32, BrokerError>;

    /// Pulls one message without auto-ack. `None` when the queue is empty.
    async fn fetch(&self, queue: &str) -> Result<Option<Message>, BrokerError>;

    /// Acknowledges a single delivery.
    async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError>;

    /// Declares (or, for passive definitions, checks) a queue.
    async fn declare(&self, def: &QueueDefinition) -> Result<(), BrokerError>;

    /// Publishes to the default exchange with the queue name as routing key.
    async fn publish(&self, queue: &str, body: &[u8], headers: &Headers)
        -> Result<(), BrokerError>;

    /// Releases the underlying resources. Never fails.
    async fn close(&self);
}

/// `QueueBroker` over a lapin connection and a single channel.
pub struct AmqpBroker {
    conn: Connection,
    channel: Channel,
}

impl AmqpBroker {
    /// Opens a connection and a channel to the configured broker.
    pub async fn connect(cfg: &RabbitMQConfigs) -> Result<AmqpBroker, ConnectorError> {
        let (conn, channel) = new_amqp_channel(cfg).await?;
        Ok(AmqpBroker { conn, channel })
    }
}

fn is_not_found(err: &lapin::Error) -> bool {
    match err {
        lapin::Error::ProtocolError(amqp_err) => matches!(
            amqp_err.kind(),
            AMQPErrorKind::Soft(AMQPSoftError::NOTFOUND)
        ),
        _ => false,
    }
}

#[async_trait]
impl QueueBroker for AmqpBroker {
    async fn message_count(&self, queue: &str) -> Result<u32, BrokerError> {
        let def = QueueDefinition::new(queue).passive();

        match self
            .channel
            .queue_declare(queue, def.declare_options(), FieldTable::default())
            .await
        {
            Ok(q) => Ok(q.message_count()),
            Err(err) if is_not_found(&err) => {
                debug!(queue = queue, "queue does not exist");
                Err(BrokerError::QueueNotFound(queue.to_owned()))
            }
            Err(err) => {
                error!(error = err.to_string(), queue = queue, "passive declare failed");
                Err(BrokerError::Channel(err.to_string()))
            }
        }
    }

    async fn fetch(&self, queue: &str) -> Result<Option<Message>, BrokerError> {
        match self
            .channel
            .basic_get(queue, BasicGetOptions { no_ack: false })
            .await
        {
            Ok(Some(get)) => Ok(Some(Message::from(get.delivery))),
            Ok(None) => Ok(None),
            Err(err) => {
                error!(error = err.to_string(), queue = queue, "error fetching message");
                Err(BrokerError::Channel(err.to_string()))
            }
        }
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions { multiple: false })
            .await
            .map_err(|err| BrokerError::Channel(err.to_string()))
    }

    async fn declare(&self, def: &QueueDefinition) -> Result<(), BrokerError> {
        match self
            .channel
            .queue_declare(&def.name, def.declare_options(), FieldTable::default())
            .await
        {
            Ok(_) => {
                debug!("queue: {} was declared", def.name);
                Ok(())
            }
            Err(err) if is_not_found(&err) => Err(BrokerError::QueueNotFound(def.name.clone())),
            Err(err) => {
                error!(error = err.to_string(), queue = def.name, "error declaring queue");
                Err(BrokerError::Channel(err.to_string()))
            }
        }
    }

    async fn publish(
        &self,
        queue: &str,
        body: &[u8],
        headers: &Headers,
    ) -> Result<(), BrokerError> {
        match self
            .channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                body,
                BasicProperties::default()
                    .with_content_type(ShortString::from(TEXT_CONTENT_TYPE))
                    .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
                    .with_headers(FieldTable::from(headers_to_table(headers))),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), queue = queue, "error publishing message");
                Err(BrokerError::Channel(err.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn close(&self) {
        close_amqp_channel(&self.conn, &self.channel).await;
    }
}
