// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Matching
//!
//! Decides whether a fetched message is the one the caller is waiting for.
//! Three strategies are supported and the caller picks one explicitly:
//!
//! - `PlainText`: the body contains the target as a literal substring.
//! - `PersistenceIdInBody`: the body is JSON with a `persistenceId` equal to
//!   the numeric target; bodies that are not JSON fall back to a substring
//!   check.
//! - `BodyOrHeader`: the body check above or a `persistenceId` header equal to
//!   the target, and in both cases a `type` header equal to `RESPONSE`
//!   (ignoring case). Only text and integer headers can carry the id.

use crate::{
    errors::ConnectorError,
    message::{HeaderValue, Message},
    params::json_as_long,
};
use serde_json::Value;
use std::{fmt, str::FromStr};
use tracing::debug;

pub const PERSISTENCE_ID_FIELD: &str = "persistenceId";
pub const TYPE_HEADER: &str = "type";
pub const RESPONSE_TYPE: &str = "RESPONSE";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchStrategy {
    PlainText,
    PersistenceIdInBody,
    #[default]
    BodyOrHeader,
}

impl MatchStrategy {
    fn needs_numeric_target(&self) -> bool {
        !matches!(self, MatchStrategy::PlainText)
    }
}

impl FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MatchStrategy::PlainText),
            "persistenceId" => Ok(MatchStrategy::PersistenceIdInBody),
            "bodyOrHeader" => Ok(MatchStrategy::BodyOrHeader),
            other => Err(format!(
                "unknown match strategy `{other}`, expected one of: text, persistenceId, bodyOrHeader"
            )),
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MatchStrategy::PlainText => "text",
            MatchStrategy::PersistenceIdInBody => "persistenceId",
            MatchStrategy::BodyOrHeader => "bodyOrHeader",
        })
    }
}

/// An immutable match criterion: a strategy plus its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matcher {
    strategy: MatchStrategy,
    target: String,
    target_id: Option<i64>,
}

impl Matcher {
    /// Builds the criterion. Strategies that compare identifiers need a target
    /// that parses as an `i64`; anything else is a configuration error.
    pub fn new(strategy: MatchStrategy, target: &str) -> Result<Matcher, ConnectorError> {
        let target_id = if strategy.needs_numeric_target() {
            let id = target
                .parse::<i64>()
                .map_err(|_| ConnectorError::TargetFormat(target.to_owned()))?;
            Some(id)
        } else {
            None
        };

        Ok(Matcher {
            strategy,
            target: target.to_owned(),
            target_id,
        })
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn matches(&self, msg: &Message) -> bool {
        let text = msg.text();

        match self.strategy {
            MatchStrategy::PlainText => text.contains(self.target.as_str()),
            MatchStrategy::PersistenceIdInBody => self.body_match(&text),
            MatchStrategy::BodyOrHeader => {
                let found = self.body_match(&text) || self.header_match(msg);
                found && is_response(msg)
            }
        }
    }

    fn body_match(&self, text: &str) -> bool {
        match serde_json::from_str::<Value>(text) {
            Ok(json) => match json.get(PERSISTENCE_ID_FIELD) {
                Some(id) => Some(json_as_long(id)) == self.target_id,
                None => {
                    debug!("json body has no persistenceId");
                    false
                }
            },
            Err(_) => {
                debug!("body is not json, searching text");
                text.contains(self.target.as_str())
            }
        }
    }

    fn header_match(&self, msg: &Message) -> bool {
        match msg.header_value(PERSISTENCE_ID_FIELD) {
            Some(HeaderValue::Text(id)) => *id == self.target,
            Some(HeaderValue::Int(id)) => Some(*id) == self.target_id,
            _ => false,
        }
    }
}

fn is_response(msg: &Message) -> bool {
    msg.header_value(TYPE_HEADER)
        .is_some_and(|v| v.to_string().eq_ignore_ascii_case(RESPONSE_TYPE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &str) -> Message {
        Message::new(1, body).header(TYPE_HEADER, "RESPONSE")
    }

    #[test]
    fn numeric_strategies_reject_non_numeric_targets() {
        assert_eq!(
            Matcher::new(MatchStrategy::PersistenceIdInBody, "abc"),
            Err(ConnectorError::TargetFormat("abc".to_owned()))
        );
        assert!(Matcher::new(MatchStrategy::BodyOrHeader, "4 2").is_err());
        assert!(Matcher::new(MatchStrategy::PlainText, "abc").is_ok());
    }

    #[test]
    fn plain_text_is_a_substring_check() {
        let matcher = Matcher::new(MatchStrategy::PlainText, "Bonita").unwrap();

        assert!(matcher.matches(&Message::new(1, "Test Bonita Message")));
        assert!(!matcher.matches(&Message::new(1, "{\"persistenceId\": 1}")));
    }

    #[test]
    fn json_body_compares_persistence_id() {
        let matcher = Matcher::new(MatchStrategy::PersistenceIdInBody, "42").unwrap();

        assert!(matcher.matches(&Message::new(1, r#"{"persistenceId": 42}"#)));
        assert!(matcher.matches(&Message::new(1, r#"{"persistenceId": "42"}"#)));
        assert!(!matcher.matches(&Message::new(1, r#"{"persistenceId": 420}"#)));
        assert!(!matcher.matches(&Message::new(1, r#"{"other": 42}"#)));
    }

    #[test]
    fn non_json_body_falls_back_to_text() {
        let matcher = Matcher::new(MatchStrategy::PersistenceIdInBody, "42").unwrap();

        assert!(matcher.matches(&Message::new(1, "case 42 closed")));
        assert!(!matcher.matches(&Message::new(1, "case 7 closed")));
    }

    #[test]
    fn body_or_header_matches_json_body() {
        let matcher = Matcher::new(MatchStrategy::BodyOrHeader, "42").unwrap();

        assert!(matcher.matches(&response(r#"{"persistenceId": 42}"#)));
    }

    #[test]
    fn body_or_header_falls_back_to_text() {
        let matcher = Matcher::new(MatchStrategy::BodyOrHeader, "42").unwrap();

        assert!(matcher.matches(&response("not json but 42")));
    }

    #[test]
    fn header_id_is_enough_with_response_type() {
        let matcher = Matcher::new(MatchStrategy::BodyOrHeader, "42").unwrap();
        let msg = Message::new(1, "unrelated")
            .header(TYPE_HEADER, "response")
            .header(PERSISTENCE_ID_FIELD, 42_i64);

        assert!(matcher.matches(&msg));
    }

    #[test]
    fn float_header_id_never_matches() {
        let matcher = Matcher::new(MatchStrategy::BodyOrHeader, "42").unwrap();
        let msg = Message::new(1, "unrelated")
            .header(TYPE_HEADER, "RESPONSE")
            .header(PERSISTENCE_ID_FIELD, HeaderValue::Float(42.0));

        assert!(!matcher.matches(&msg));
    }

    #[test]
    fn text_header_id_matches() {
        let matcher = Matcher::new(MatchStrategy::BodyOrHeader, "42").unwrap();
        let msg = Message::new(1, "unrelated")
            .header(TYPE_HEADER, "RESPONSE")
            .header(PERSISTENCE_ID_FIELD, "42");

        assert!(matcher.matches(&msg));
    }

    #[test]
    fn missing_type_never_matches() {
        let matcher = Matcher::new(MatchStrategy::BodyOrHeader, "42").unwrap();

        assert!(!matcher.matches(&Message::new(1, r#"{"persistenceId": 42}"#)));
        assert!(!matcher.matches(
            &Message::new(1, r#"{"persistenceId": 42}"#).header(PERSISTENCE_ID_FIELD, "42")
        ));
    }

    #[test]
    fn other_type_never_matches() {
        let matcher = Matcher::new(MatchStrategy::BodyOrHeader, "42").unwrap();
        let msg = Message::new(1, r#"{"persistenceId": 42}"#).header(TYPE_HEADER, "REQUEST");

        assert!(!matcher.matches(&msg));
    }

    #[test]
    fn parses_strategy_names() {
        assert_eq!("text".parse::<MatchStrategy>(), Ok(MatchStrategy::PlainText));
        assert_eq!("persistenceId".parse::<MatchStrategy>(), Ok(MatchStrategy::PersistenceIdInBody));
        assert_eq!("bodyOrHeader".parse::<MatchStrategy>(), Ok(MatchStrategy::BodyOrHeader));
        assert!("regex".parse::<MatchStrategy>().is_err());
    }
}
