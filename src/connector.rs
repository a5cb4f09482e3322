// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Connector Contract
//!
//! A connector receives an untyped parameter map from the workflow engine,
//! validates it, parses it into its own typed configuration and performs one
//! bounded unit of work. Validation errors never reach the business logic.

use crate::{
    errors::ConnectorError,
    params::{InputParameters, OutputParameters, ParamSpec},
};
use async_trait::async_trait;

#[async_trait]
pub trait Connector: Sized + Send + Sync {
    /// Parameters the connector expects and the rule each one follows.
    const PARAMETERS: &'static [ParamSpec];

    /// Checks the raw inputs, reporting every violation at once.
    fn validate_input_parameters(params: &InputParameters) -> Result<(), ConnectorError> {
        params.validate(Self::PARAMETERS)
    }

    /// Builds the typed connector from inputs that passed validation.
    fn from_validated(params: &InputParameters) -> Result<Self, ConnectorError>;

    /// Validates and parses the raw inputs.
    fn from_parameters(params: &InputParameters) -> Result<Self, ConnectorError> {
        Self::validate_input_parameters(params)?;
        Self::from_validated(params)
    }

    /// Runs the connector against a live broker.
    async fn execute_business_logic(&self) -> Result<OutputParameters, ConnectorError>;
}
