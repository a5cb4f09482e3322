// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! Opens the single connection/channel pair a connector invocation works with,
//! and closes it again on the way out.

use crate::{config::RabbitMQConfigs, errors::ConnectorError};
use lapin::{types::LongString, Channel, Connection, ConnectionProperties};
use tracing::{debug, error};

const CONNECTION_NAME: &str = "rabbitmq-connectors";

/// Creates a new AMQP connection and a channel on it.
///
/// # Parameters
/// * `cfg` - Broker host, port, credentials and vhost
///
/// # Returns
/// * `Result<(Connection, Channel), ConnectorError>` -
///   The open pair, or `ConnectorError::Connection` naming the host.
pub async fn new_amqp_channel(
    cfg: &RabbitMQConfigs,
) -> Result<(Connection, Channel), ConnectorError> {
    debug!(host = cfg.host, "creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(CONNECTION_NAME));

    let conn = match Connection::connect_uri(cfg.amqp_uri(), options).await {
        Ok(c) => Ok(c),
        Err(err) => {
            error!(
                error = err.to_string(),
                host = cfg.host,
                "failure to connect"
            );
            Err(ConnectorError::Connection {
                host: cfg.host.clone(),
            })
        }
    }?;
    debug!("amqp connected");

    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(c) => {
            debug!("channel created");
            Ok((conn, c))
        }
        Err(err) => {
            error!(
                error = err.to_string(),
                host = cfg.host,
                "error to create the channel"
            );
            close_connection(&conn).await;
            Err(ConnectorError::Connection {
                host: cfg.host.clone(),
            })
        }
    }
}

/// Closes the channel and then the connection.
///
/// Failures are logged and swallowed so they never hide the result of the
/// work done on the channel.
pub async fn close_amqp_channel(conn: &Connection, channel: &Channel) {
    debug!("closing channel and connection...");

    if channel.status().connected() {
        if let Err(err) = channel.close(200, "OK").await {
            error!(error = err.to_string(), "error closing the channel");
        }
    }

    close_connection(conn).await;
}

async fn close_connection(conn: &Connection) {
    if conn.status().connected() {
        if let Err(err) = conn.close(200, "OK").await {
            error!(error = err.to_string(), "error closing the connection");
        }
    }
}
