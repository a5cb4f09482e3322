// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Consume Connector
//!
//! Looks for the reply a process is waiting for: drains the queue with the
//! configured [`MatchStrategy`] and [`DrainPolicy`] and returns the matching
//! message, if any, as output parameters.

use crate::{
    broker::{AmqpBroker, QueueBroker},
    config::{
        RabbitMQConfigs, HOST_INPUT_PARAMETER, PASSWORD_INPUT_PARAMETER, PORT_INPUT_PARAMETER,
        QUEUENAME_INPUT_PARAMETER, USERNAME_INPUT_PARAMETER,
    },
    connector::Connector,
    drain::{DrainPolicy, OnMismatch, QueueDrainer, StopAt},
    errors::ConnectorError,
    matcher::{MatchStrategy, Matcher, PERSISTENCE_ID_FIELD},
    params::{InputParameters, OutputParameters, ParamRule, ParamSpec, ParamValue},
    publisher::{MESSAGE_INPUT_PARAMETER, RECEIVEDMESSAGE_OUTPUT_PARAMETER},
};
use async_trait::async_trait;
use std::{collections::BTreeMap, str::FromStr};
use tracing::info;

pub const PERSISTENCE_ID_INPUT_PARAMETER: &str = PERSISTENCE_ID_FIELD;
pub const MATCH_STRATEGY_INPUT_PARAMETER: &str = "matchStrategy";
pub const DRAIN_MODE_INPUT_PARAMETER: &str = "drainMode";
pub const NON_MATCHING_INPUT_PARAMETER: &str = "nonMatching";

pub const BODY_OUTPUT_PARAMETER: &str = "body";
pub const HEADERS_OUTPUT_PARAMETER: &str = "headers";

/// Drains one queue per invocation looking for a single message.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumeConnector {
    configs: RabbitMQConfigs,
    queue: String,
    matcher: Matcher,
    policy: DrainPolicy,
}

// Parses an optional enum-valued parameter, recording a violation for
// unknown names.
fn parse_choice<T: FromStr<Err = String> + Default>(
    params: &InputParameters,
    name: &str,
    errors: &mut Vec<String>,
) -> T {
    match params.string(name) {
        Some(raw) => raw.parse().unwrap_or_else(|err| {
            errors.push(format!("{name}: {err}"));
            T::default()
        }),
        None => T::default(),
    }
}

fn target(params: &InputParameters) -> Option<&str> {
    params
        .string(PERSISTENCE_ID_INPUT_PARAMETER)
        .or_else(|| params.string(MESSAGE_INPUT_PARAMETER))
}

impl ConsumeConnector {
    pub fn policy(&self) -> DrainPolicy {
        self.policy
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Drains the queue and turns the outcome into output parameters.
    pub async fn consume<B: QueueBroker + ?Sized>(
        &self,
        broker: &B,
    ) -> Result<OutputParameters, ConnectorError> {
        let outcome = QueueDrainer::new(broker, &self.matcher, self.policy)
            .drain(&self.queue)
            .await?;

        info!(
            queue = self.queue,
            fetched = outcome.fetched,
            found = outcome.matched.is_some(),
            "queue drained"
        );

        let mut outputs = OutputParameters::new();
        match outcome.matched {
            Some(msg) => {
                let body = msg.text().into_owned();
                let headers: BTreeMap<String, ParamValue> = msg
                    .headers
                    .unwrap_or_default()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_param()))
                    .collect();

                outputs.set(RECEIVEDMESSAGE_OUTPUT_PARAMETER, body.clone());
                outputs.set(BODY_OUTPUT_PARAMETER, body);
                outputs.set(HEADERS_OUTPUT_PARAMETER, ParamValue::Map(headers));
            }
            None => {
                outputs.set(RECEIVEDMESSAGE_OUTPUT_PARAMETER, ParamValue::Null);
                outputs.set(BODY_OUTPUT_PARAMETER, ParamValue::Null);
                outputs.set(HEADERS_OUTPUT_PARAMETER, ParamValue::Map(BTreeMap::new()));
            }
        }

        Ok(outputs)
    }
}

#[async_trait]
impl Connector for ConsumeConnector {
    const PARAMETERS: &'static [ParamSpec] = &[
        ParamSpec::new(HOST_INPUT_PARAMETER, ParamRule::RequiredString),
        ParamSpec::new(PORT_INPUT_PARAMETER, ParamRule::OptionalInteger),
        ParamSpec::new(QUEUENAME_INPUT_PARAMETER, ParamRule::RequiredString),
        ParamSpec::new(USERNAME_INPUT_PARAMETER, ParamRule::RequiredString),
        ParamSpec::new(PASSWORD_INPUT_PARAMETER, ParamRule::RequiredString),
        ParamSpec::new(PERSISTENCE_ID_INPUT_PARAMETER, ParamRule::OptionalString),
        ParamSpec::new(MESSAGE_INPUT_PARAMETER, ParamRule::OptionalString),
        ParamSpec::new(MATCH_STRATEGY_INPUT_PARAMETER, ParamRule::OptionalString),
        ParamSpec::new(DRAIN_MODE_INPUT_PARAMETER, ParamRule::OptionalString),
        ParamSpec::new(NON_MATCHING_INPUT_PARAMETER, ParamRule::OptionalString),
    ];

    fn validate_input_parameters(params: &InputParameters) -> Result<(), ConnectorError> {
        let mut errors = params.violations(Self::PARAMETERS);

        let has_target = [PERSISTENCE_ID_INPUT_PARAMETER, MESSAGE_INPUT_PARAMETER]
            .iter()
            .any(|name| params.get(name).is_some_and(|v| !v.is_null()));
        if !has_target {
            errors.push(format!("{PERSISTENCE_ID_INPUT_PARAMETER} is missing"));
        }

        parse_choice::<MatchStrategy>(params, MATCH_STRATEGY_INPUT_PARAMETER, &mut errors);
        parse_choice::<StopAt>(params, DRAIN_MODE_INPUT_PARAMETER, &mut errors);
        parse_choice::<OnMismatch>(params, NON_MATCHING_INPUT_PARAMETER, &mut errors);

        if !errors.is_empty() {
            return Err(ConnectorError::Validation(errors));
        }

        Ok(())
    }

    fn from_validated(params: &InputParameters) -> Result<Self, ConnectorError> {
        let mut errors = vec![];
        let strategy = parse_choice(params, MATCH_STRATEGY_INPUT_PARAMETER, &mut errors);
        let policy = DrainPolicy {
            stop: parse_choice(params, DRAIN_MODE_INPUT_PARAMETER, &mut errors),
            on_mismatch: parse_choice(params, NON_MATCHING_INPUT_PARAMETER, &mut errors),
        };
        if !errors.is_empty() {
            return Err(ConnectorError::Validation(errors));
        }

        let matcher = Matcher::new(strategy, target(params).unwrap_or_default())?;
        let connector = ConsumeConnector {
            configs: RabbitMQConfigs::from_parameters(params),
            queue: params
                .string(QUEUENAME_INPUT_PARAMETER)
                .unwrap_or_default()
                .to_owned(),
            matcher,
            policy,
        };

        info!(
            host = connector.configs.host,
            queue = connector.queue,
            target = connector.matcher.target(),
            strategy = %strategy,
            drain_mode = %policy.stop,
            non_matching = %policy.on_mismatch,
            "input parameters validated"
        );

        Ok(connector)
    }

    async fn execute_business_logic(&self) -> Result<OutputParameters, ConnectorError> {
        info!("starting rabbitmq message consumption");

        let broker = AmqpBroker::connect(&self.configs).await?;
        let result = self.consume(&broker).await;
        broker.close().await;

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{broker::MockQueueBroker, message::Message};
    use std::collections::VecDeque;

    fn params() -> InputParameters {
        InputParameters::new()
            .with("host", "localhost")
            .with("queueName", "BonitaQueue")
            .with("persistenceId", "42")
            .with("username", "admin")
            .with("password", "password")
    }

    #[test]
    fn accepts_valid_parameters() {
        assert!(ConsumeConnector::validate_input_parameters(&params()).is_ok());

        let connector = ConsumeConnector::from_parameters(&params()).unwrap();
        assert_eq!(connector.policy(), DrainPolicy::default());
        assert_eq!(connector.matcher().strategy(), MatchStrategy::BodyOrHeader);
    }

    #[test]
    fn message_is_accepted_as_target() {
        let params = InputParameters::new()
            .with("host", "localhost")
            .with("queueName", "BonitaQueue")
            .with("message", "Test Bonita Message")
            .with("username", "admin")
            .with("password", "password")
            .with("matchStrategy", "text");

        let connector = ConsumeConnector::from_parameters(&params).unwrap();

        assert_eq!(connector.matcher().target(), "Test Bonita Message");
    }

    #[test]
    fn reports_every_violation() {
        let params = InputParameters::new()
            .with("host", 123_i32)
            .with("queueName", "BonitaQueue")
            .with("drainMode", "eventually");

        let Err(ConnectorError::Validation(errors)) =
            ConsumeConnector::validate_input_parameters(&params)
        else {
            panic!("validation should fail");
        };

        assert!(errors.contains(&"host should be a String but was Integer".to_owned()));
        assert!(errors.contains(&"username is missing".to_owned()));
        assert!(errors.contains(&"password is missing".to_owned()));
        assert!(errors.contains(&"persistenceId is missing".to_owned()));
        assert!(errors.iter().any(|e| e.starts_with("drainMode:")));
    }

    #[test]
    fn non_numeric_target_is_a_configuration_error() {
        let params = params().with("persistenceId", "forty-two");

        assert_eq!(
            ConsumeConnector::from_parameters(&params),
            Err(ConnectorError::TargetFormat("forty-two".to_owned()))
        );
    }

    #[tokio::test]
    async fn returns_matching_message() {
        let connector = ConsumeConnector::from_parameters(&params()).unwrap();
        let mut pending = VecDeque::from(vec![
            Message::new(1, r#"{"persistenceId": 7}"#).header("type", "RESPONSE"),
            Message::new(2, "approved")
                .header("type", "RESPONSE")
                .header("persistenceId", 42_i64),
        ]);

        let mut broker = MockQueueBroker::new();
        broker.expect_message_count().returning(|_| Ok(2));
        broker
            .expect_fetch()
            .times(2)
            .returning(move |_| Ok(pending.pop_front()));
        broker.expect_ack().times(2).returning(|_| Ok(()));

        let outputs = connector.consume(&broker).await.unwrap();

        assert_eq!(
            outputs.get(RECEIVEDMESSAGE_OUTPUT_PARAMETER),
            Some(&ParamValue::from("approved"))
        );
        assert_eq!(outputs.get(BODY_OUTPUT_PARAMETER), Some(&ParamValue::from("approved")));

        let Some(ParamValue::Map(headers)) = outputs.get(HEADERS_OUTPUT_PARAMETER) else {
            panic!("headers output should be a map");
        };
        assert_eq!(headers.get("persistenceId"), Some(&ParamValue::Long(42)));
        assert_eq!(headers.get("type"), Some(&ParamValue::from("RESPONSE")));
    }

    #[tokio::test]
    async fn empty_queue_yields_null_outputs() {
        let connector = ConsumeConnector::from_parameters(&params()).unwrap();

        let mut broker = MockQueueBroker::new();
        broker.expect_message_count().returning(|_| Ok(0));
        broker.expect_fetch().never();

        let outputs = connector.consume(&broker).await.unwrap();

        assert_eq!(outputs.get(RECEIVEDMESSAGE_OUTPUT_PARAMETER), Some(&ParamValue::Null));
        assert_eq!(
            outputs.get(HEADERS_OUTPUT_PARAMETER),
            Some(&ParamValue::Map(BTreeMap::new()))
        );
    }

    #[tokio::test]
    async fn leave_policy_only_acks_the_match() {
        let params = params()
            .with("matchStrategy", "persistenceId")
            .with("nonMatching", "leave");
        let connector = ConsumeConnector::from_parameters(&params).unwrap();
        let mut pending = VecDeque::from(vec![
            Message::new(1, r#"{"persistenceId": 1}"#),
            Message::new(2, r#"{"persistenceId": 42}"#),
        ]);

        let mut broker = MockQueueBroker::new();
        broker.expect_message_count().returning(|_| Ok(2));
        broker
            .expect_fetch()
            .times(2)
            .returning(move |_| Ok(pending.pop_front()));
        broker
            .expect_ack()
            .withf(|tag| *tag == 2)
            .times(1)
            .returning(|_| Ok(()));

        let outputs = connector.consume(&broker).await.unwrap();

        assert_eq!(
            outputs.get(BODY_OUTPUT_PARAMETER),
            Some(&ParamValue::from(r#"{"persistenceId": 42}"#))
        );
    }
}
