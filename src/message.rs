// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Fetched Messages
//!
//! Broker-independent view of a message pulled from a queue: its payload, its
//! headers and the delivery tag used to acknowledge it.

use crate::params::ParamValue;
use lapin::{
    message::Delivery,
    types::{AMQPValue, FieldTable, LongString, ShortString},
};
use serde::{Deserialize, Serialize};
use std::{borrow::Cow, collections::BTreeMap, fmt};

/// A header value. Header kinds other than strings, numbers and booleans
/// are not carried over from the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

pub type Headers = BTreeMap<String, HeaderValue>;

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeaderValue::Bool(v) => write!(f, "{v}"),
            HeaderValue::Int(v) => write!(f, "{v}"),
            HeaderValue::Float(v) => write!(f, "{v}"),
            HeaderValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Text(value.to_owned())
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Int(value)
    }
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        HeaderValue::Bool(value)
    }
}

impl HeaderValue {
    pub(crate) fn from_amqp(value: &AMQPValue) -> Option<HeaderValue> {
        let value = match value {
            AMQPValue::Boolean(v) => HeaderValue::Bool(*v),
            AMQPValue::ShortShortInt(v) => HeaderValue::Int(i64::from(*v)),
            AMQPValue::ShortShortUInt(v) => HeaderValue::Int(i64::from(*v)),
            AMQPValue::ShortInt(v) => HeaderValue::Int(i64::from(*v)),
            AMQPValue::ShortUInt(v) => HeaderValue::Int(i64::from(*v)),
            AMQPValue::LongInt(v) => HeaderValue::Int(i64::from(*v)),
            AMQPValue::LongUInt(v) => HeaderValue::Int(i64::from(*v)),
            AMQPValue::LongLongInt(v) => HeaderValue::Int(*v),
            AMQPValue::Float(v) => HeaderValue::Float(f64::from(*v)),
            AMQPValue::Double(v) => HeaderValue::Float(*v),
            AMQPValue::ShortString(v) => HeaderValue::Text(v.as_str().to_owned()),
            AMQPValue::LongString(v) => {
                HeaderValue::Text(String::from_utf8_lossy(v.as_bytes()).into_owned())
            }
            _ => return None,
        };

        Some(value)
    }

    pub(crate) fn to_amqp(&self) -> AMQPValue {
        match self {
            HeaderValue::Bool(v) => AMQPValue::Boolean(*v),
            HeaderValue::Int(v) => AMQPValue::LongLongInt(*v),
            HeaderValue::Float(v) => AMQPValue::Double(*v),
            HeaderValue::Text(v) => AMQPValue::LongString(LongString::from(v.as_str())),
        }
    }

    /// Converts a host parameter into a header value; lists, maps and nulls
    /// have no header form.
    pub fn from_param(value: &ParamValue) -> Option<HeaderValue> {
        match value {
            ParamValue::Boolean(v) => Some(HeaderValue::Bool(*v)),
            ParamValue::Integer(v) => Some(HeaderValue::Int(i64::from(*v))),
            ParamValue::Long(v) => Some(HeaderValue::Int(*v)),
            ParamValue::Text(v) => Some(HeaderValue::Text(v.clone())),
            _ => None,
        }
    }

    pub fn to_param(&self) -> ParamValue {
        match self {
            HeaderValue::Bool(v) => ParamValue::Boolean(*v),
            HeaderValue::Int(v) => ParamValue::Long(*v),
            HeaderValue::Float(v) => ParamValue::Text(v.to_string()),
            HeaderValue::Text(v) => ParamValue::Text(v.clone()),
        }
    }
}

pub(crate) fn headers_from_table(table: &FieldTable) -> Headers {
    table
        .inner()
        .iter()
        .filter_map(|(k, v)| HeaderValue::from_amqp(v).map(|v| (k.to_string(), v)))
        .collect()
}

pub(crate) fn headers_to_table(headers: &Headers) -> BTreeMap<ShortString, AMQPValue> {
    headers
        .iter()
        .map(|(k, v)| (ShortString::from(k.as_str()), v.to_amqp()))
        .collect()
}

/// A message pulled from a queue and not yet acknowledged.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub body: Vec<u8>,
    pub headers: Option<Headers>,
    pub delivery_tag: u64,
}

impl Message {
    pub fn new(delivery_tag: u64, body: impl Into<Vec<u8>>) -> Message {
        Message {
            body: body.into(),
            headers: None,
            delivery_tag,
        }
    }

    /// Adds a header.
    ///
    /// # Returns
    /// Self for method chaining
    pub fn header(mut self, key: &str, value: impl Into<HeaderValue>) -> Self {
        self.headers
            .get_or_insert_with(Headers::default)
            .insert(key.to_owned(), value.into());
        self
    }

    /// Body decoded as UTF-8, invalid sequences replaced.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn header_value(&self, key: &str) -> Option<&HeaderValue> {
        self.headers.as_ref().and_then(|h| h.get(key))
    }
}

impl From<Delivery> for Message {
    fn from(mut delivery: Delivery) -> Self {
        let headers = delivery.properties.headers().as_ref().map(headers_from_table);

        Message {
            body: std::mem::take(&mut delivery.data),
            headers,
            delivery_tag: delivery.delivery_tag,
        }
    }
}
