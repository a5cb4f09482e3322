// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Broker Connection Configuration
//!
//! Typed connection settings for one connector invocation, built from the
//! validated host parameters.

use crate::params::InputParameters;
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const HOST_INPUT_PARAMETER: &str = "host";
pub const PORT_INPUT_PARAMETER: &str = "port";
pub const USERNAME_INPUT_PARAMETER: &str = "username";
pub const PASSWORD_INPUT_PARAMETER: &str = "password";
pub const QUEUENAME_INPUT_PARAMETER: &str = "queueName";

pub const DEFAULT_PORT: u16 = 5672;
pub const DEFAULT_VHOST: &str = "/";

/// Connection settings for a RabbitMQ broker.
#[derive(Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RabbitMQConfigs {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(default = "default_vhost")]
    pub vhost: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_vhost() -> String {
    DEFAULT_VHOST.to_owned()
}

impl RabbitMQConfigs {
    /// Reads the connection settings from parameters that already passed
    /// validation. Missing values fall back to empty strings or defaults;
    /// a port outside the `u16` range falls back to the AMQP default.
    pub fn from_parameters(params: &InputParameters) -> RabbitMQConfigs {
        let port = params
            .integer(PORT_INPUT_PARAMETER)
            .and_then(|p| u16::try_from(p).ok())
            .unwrap_or(DEFAULT_PORT);

        RabbitMQConfigs {
            host: params
                .string(HOST_INPUT_PARAMETER)
                .unwrap_or_default()
                .to_owned(),
            port,
            user: params
                .string(USERNAME_INPUT_PARAMETER)
                .unwrap_or_default()
                .to_owned(),
            password: params
                .string(PASSWORD_INPUT_PARAMETER)
                .unwrap_or_default()
                .to_owned(),
            vhost: default_vhost(),
        }
    }

    /// AMQP URI for lapin, built field by field so credentials containing
    /// URI delimiters reach the broker unchanged.
    pub fn amqp_uri(&self) -> AMQPUri {
        AMQPUri {
            authority: AMQPAuthority {
                userinfo: AMQPUserInfo {
                    username: self.user.clone(),
                    password: self.password.clone(),
                },
                host: self.host.clone(),
                port: self.port,
            },
            vhost: self.vhost.clone(),
            ..Default::default()
        }
    }
}

// Keeps the password out of logs.
impl fmt::Debug for RabbitMQConfigs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RabbitMQConfigs")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"********")
            .field("vhost", &self.vhost)
            .finish()
    }
}
