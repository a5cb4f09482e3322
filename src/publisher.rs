// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Publish Connector
//!
//! Declares a durable queue and publishes a text message to it through the
//! default exchange, with the queue name as routing key. The current trace
//! context travels in the message headers next to any caller-supplied ones.

use crate::{
    broker::{AmqpBroker, QueueBroker},
    config::{
        RabbitMQConfigs, HOST_INPUT_PARAMETER, PASSWORD_INPUT_PARAMETER, PORT_INPUT_PARAMETER,
        QUEUENAME_INPUT_PARAMETER, USERNAME_INPUT_PARAMETER,
    },
    connector::Connector,
    errors::ConnectorError,
    message::{HeaderValue, Headers},
    otel,
    params::{InputParameters, OutputParameters, ParamRule, ParamSpec},
    queue::QueueDefinition,
};
use async_trait::async_trait;
use opentelemetry::Context;
use tracing::{error, info};

pub const MESSAGE_INPUT_PARAMETER: &str = "message";
pub const HEADERS_INPUT_PARAMETER: &str = "headers";
pub const RECEIVEDMESSAGE_OUTPUT_PARAMETER: &str = "receivedMessage";

/// Publishes one message per invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishConnector {
    configs: RabbitMQConfigs,
    queue: String,
    message: String,
    headers: Headers,
}

impl PublishConnector {
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Declares the queue, publishes and builds the outputs.
    pub async fn publish<B: QueueBroker + ?Sized>(
        &self,
        broker: &B,
    ) -> Result<OutputParameters, ConnectorError> {
        let def = QueueDefinition::new(&self.queue).durable();
        broker.declare(&def).await.map_err(|err| {
            error!(error = err.to_string(), queue = self.queue, "failure to declare queue");
            ConnectorError::DeclareQueue(self.queue.clone())
        })?;
        info!(queue = self.queue, "queue declared");

        let mut headers = self.headers.clone();
        otel::inject_context(&Context::current(), &mut headers);

        broker
            .publish(&self.queue, self.message.as_bytes(), &headers)
            .await
            .map_err(|err| {
                error!(
                    error = err.to_string(),
                    queue = self.queue,
                    host = self.configs.host,
                    "failure to publish"
                );
                ConnectorError::Publish(self.queue.clone())
            })?;
        info!(queue = self.queue, "message published");

        let mut outputs = OutputParameters::new();
        outputs.set(
            RECEIVEDMESSAGE_OUTPUT_PARAMETER,
            format!(
                "Message '{}' sent to queue {} on host {}",
                self.message, self.queue, self.configs.host
            ),
        );

        Ok(outputs)
    }
}

#[async_trait]
impl Connector for PublishConnector {
    const PARAMETERS: &'static [ParamSpec] = &[
        ParamSpec::new(HOST_INPUT_PARAMETER, ParamRule::RequiredString),
        ParamSpec::new(PORT_INPUT_PARAMETER, ParamRule::OptionalInteger),
        ParamSpec::new(QUEUENAME_INPUT_PARAMETER, ParamRule::RequiredString),
        ParamSpec::new(MESSAGE_INPUT_PARAMETER, ParamRule::RequiredString),
        ParamSpec::new(USERNAME_INPUT_PARAMETER, ParamRule::RequiredString),
        ParamSpec::new(PASSWORD_INPUT_PARAMETER, ParamRule::RequiredString),
        ParamSpec::new(HEADERS_INPUT_PARAMETER, ParamRule::OptionalMap),
    ];

    fn validate_input_parameters(params: &InputParameters) -> Result<(), ConnectorError> {
        let mut errors = params.violations(Self::PARAMETERS);

        if let Some(headers) = params.map(HEADERS_INPUT_PARAMETER) {
            for (key, value) in headers {
                if HeaderValue::from_param(value).is_none() {
                    errors.push(format!(
                        "headers.{} should be a String, Integer, Long or Boolean but was {}",
                        key,
                        value.type_name()
                    ));
                }
            }
        }

        if !errors.is_empty() {
            return Err(ConnectorError::Validation(errors));
        }

        Ok(())
    }

    fn from_validated(params: &InputParameters) -> Result<Self, ConnectorError> {
        let headers = params
            .map(HEADERS_INPUT_PARAMETER)
            .map(|h| {
                h.iter()
                    .filter_map(|(k, v)| HeaderValue::from_param(v).map(|v| (k.clone(), v)))
                    .collect()
            })
            .unwrap_or_default();

        let connector = PublishConnector {
            configs: RabbitMQConfigs::from_parameters(params),
            queue: params
                .string(QUEUENAME_INPUT_PARAMETER)
                .unwrap_or_default()
                .to_owned(),
            message: params
                .string(MESSAGE_INPUT_PARAMETER)
                .unwrap_or_default()
                .to_owned(),
            headers,
        };

        info!(
            host = connector.configs.host,
            queue = connector.queue,
            username = connector.configs.user,
            "input parameters validated"
        );

        Ok(connector)
    }

    async fn execute_business_logic(&self) -> Result<OutputParameters, ConnectorError> {
        info!("starting rabbitmq message publication");

        let broker = AmqpBroker::connect(&self.configs).await?;
        let result = self.publish(&broker).await;
        broker.close().await;

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{broker::MockQueueBroker, errors::BrokerError, params::ParamValue};
    use std::collections::BTreeMap;

    fn params() -> InputParameters {
        InputParameters::new()
            .with("host", "localhost")
            .with("queueName", "BonitaQueue")
            .with("message", "Hello, World!")
            .with("username", "admin")
            .with("password", "password")
    }

    #[test]
    fn accepts_valid_parameters() {
        assert!(PublishConnector::validate_input_parameters(&params()).is_ok());
    }

    #[test]
    fn rejects_wrong_types() {
        let params = params().with("host", 123_i32).with("message", true);

        assert_eq!(
            PublishConnector::validate_input_parameters(&params),
            Err(ConnectorError::Validation(vec![
                "host should be a String but was Integer".to_owned(),
                "message should be a String but was Boolean".to_owned(),
            ]))
        );
    }

    #[test]
    fn rejects_missing_and_null_values() {
        let params = InputParameters::new()
            .with("host", ParamValue::Null)
            .with("queueName", ParamValue::Null);

        let Err(ConnectorError::Validation(errors)) =
            PublishConnector::validate_input_parameters(&params)
        else {
            panic!("validation should fail");
        };

        assert_eq!(errors.len(), 5);
        assert!(errors.contains(&"host is missing".to_owned()));
        assert!(errors.contains(&"password is missing".to_owned()));
    }

    #[test]
    fn rejects_nested_header_values() {
        let mut nested = BTreeMap::new();
        nested.insert("deep".to_owned(), ParamValue::List(vec![]));
        let params = params().with("headers", ParamValue::Map(nested));

        let err = PublishConnector::from_parameters(&params).unwrap_err();

        assert!(err.to_string().contains("headers.deep"));
    }

    #[tokio::test]
    async fn declares_and_publishes() {
        let mut headers = BTreeMap::new();
        headers.insert("type".to_owned(), ParamValue::from("RESPONSE"));
        headers.insert("persistenceId".to_owned(), ParamValue::Long(42));
        let connector =
            PublishConnector::from_parameters(&params().with("headers", ParamValue::Map(headers)))
                .unwrap();

        let mut broker = MockQueueBroker::new();
        broker
            .expect_declare()
            .withf(|def| def.name() == "BonitaQueue" && def.durable)
            .times(1)
            .returning(|_| Ok(()));
        broker
            .expect_publish()
            .withf(|queue, body, headers| {
                queue == "BonitaQueue"
                    && body == b"Hello, World!"
                    && headers.get("type") == Some(&HeaderValue::from("RESPONSE"))
                    && headers.get("persistenceId") == Some(&HeaderValue::Int(42))
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let outputs = connector.publish(&broker).await.unwrap();

        assert_eq!(
            outputs.get(RECEIVEDMESSAGE_OUTPUT_PARAMETER),
            Some(&ParamValue::from(
                "Message 'Hello, World!' sent to queue BonitaQueue on host localhost"
            ))
        );
    }

    #[tokio::test]
    async fn declare_failure_skips_publish() {
        let connector = PublishConnector::from_parameters(&params()).unwrap();

        let mut broker = MockQueueBroker::new();
        broker
            .expect_declare()
            .returning(|_| Err(BrokerError::Channel("PRECONDITION_FAILED".to_owned())));
        broker.expect_publish().never();

        assert_eq!(
            connector.publish(&broker).await,
            Err(ConnectorError::DeclareQueue("BonitaQueue".to_owned()))
        );
    }

    #[tokio::test]
    async fn publish_failure_is_reported() {
        let connector = PublishConnector::from_parameters(&params()).unwrap();

        let mut broker = MockQueueBroker::new();
        broker.expect_declare().returning(|_| Ok(()));
        broker
            .expect_publish()
            .returning(|_, _, _| Err(BrokerError::Channel("closed".to_owned())));

        assert_eq!(
            connector.publish(&broker).await,
            Err(ConnectorError::Publish("BonitaQueue".to_owned()))
        );
    }
}
