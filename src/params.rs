// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Host Parameters
//!
//! The workflow engine hands a plugin an untyped map of named values and reads
//! back another untyped map. This module models both maps and the closed set of
//! rules used to check the inputs before anything is parsed into a typed
//! connector configuration.

use crate::errors::ConnectorError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A value as the host engine passes it to a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Boolean(bool),
    Integer(i32),
    Long(i64),
    Text(String),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Host-facing name of the value's type, used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Null => "null",
            ParamValue::Boolean(_) => "Boolean",
            ParamValue::Integer(_) => "Integer",
            ParamValue::Long(_) => "Long",
            ParamValue::Text(_) => "String",
            ParamValue::List(_) => "List",
            ParamValue::Map(_) => "Map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Integer or Long values widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Integer(v) => Some(i64::from(*v)),
            ParamValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, ParamValue>> {
        match self {
            ParamValue::Map(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ParamValue::Null)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_owned())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Integer(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Long(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Boolean(value)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ParamValue::Null, Into::into)
    }
}

/// Reads a JSON value as a long the way the host's JSON layer does:
/// numbers keep their integer part, numeric strings are parsed, booleans
/// become 1/0 and everything else is 0.
pub fn json_as_long(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Value::String(s) => s.trim().parse::<i64>().unwrap_or_default(),
        Value::Bool(b) => i64::from(*b),
        _ => 0,
    }
}

/// How a single input parameter must look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamRule {
    RequiredString,
    OptionalString,
    OptionalInteger,
    RequiredMap,
    OptionalMap,
}

impl ParamRule {
    fn required(&self) -> bool {
        matches!(self, ParamRule::RequiredString | ParamRule::RequiredMap)
    }

    fn expected(&self) -> &'static str {
        match self {
            ParamRule::RequiredString | ParamRule::OptionalString => "a String",
            ParamRule::OptionalInteger => "an Integer",
            ParamRule::RequiredMap | ParamRule::OptionalMap => "a Map",
        }
    }

    fn accepts(&self, value: &ParamValue) -> bool {
        match self {
            ParamRule::RequiredString | ParamRule::OptionalString => {
                matches!(value, ParamValue::Text(_))
            }
            ParamRule::OptionalInteger => {
                matches!(value, ParamValue::Integer(_) | ParamValue::Long(_))
            }
            ParamRule::RequiredMap | ParamRule::OptionalMap => matches!(value, ParamValue::Map(_)),
        }
    }
}

/// A named parameter and the rule it has to satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub rule: ParamRule,
}

impl ParamSpec {
    pub const fn new(name: &'static str, rule: ParamRule) -> ParamSpec {
        ParamSpec { name, rule }
    }
}

/// The input map of a single connector or filter invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputParameters(BTreeMap<String, ParamValue>);

impl InputParameters {
    pub fn new() -> InputParameters {
        InputParameters::default()
    }

    /// Adds a parameter.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.to_owned(), value.into());
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.0.insert(name.to_owned(), value.into());
    }

    /// Raw lookup. A key explicitly set to null returns `Some(ParamValue::Null)`.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ParamValue::as_str)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(ParamValue::as_i64)
    }

    pub fn map(&self, name: &str) -> Option<&BTreeMap<String, ParamValue>> {
        self.get(name).and_then(ParamValue::as_map)
    }

    /// Checks every parameter rule and returns the violations found, in order.
    pub fn violations(&self, specs: &[ParamSpec]) -> Vec<String> {
        let mut errors = vec![];

        for param in specs {
            match self.get(param.name) {
                None | Some(ParamValue::Null) => {
                    if param.rule.required() {
                        errors.push(format!("{} is missing", param.name));
                    }
                }
                Some(value) if !param.rule.accepts(value) => errors.push(format!(
                    "{} should be {} but was {}",
                    param.name,
                    param.rule.expected(),
                    value.type_name()
                )),
                _ => {}
            }
        }

        errors
    }

    /// Validates the map against `specs`, reporting all violations at once.
    pub fn validate(&self, specs: &[ParamSpec]) -> Result<(), ConnectorError> {
        let errors = self.violations(specs);
        if errors.is_empty() {
            return Ok(());
        }

        Err(ConnectorError::Validation(errors))
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for InputParameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        InputParameters(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The output map written by a connector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputParameters(BTreeMap<String, ParamValue>);

impl OutputParameters {
    pub fn new() -> OutputParameters {
        OutputParameters::default()
    }

    pub fn set(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.0.insert(name.to_owned(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn into_inner(self) -> BTreeMap<String, ParamValue> {
        self.0
    }
}
