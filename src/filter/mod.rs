// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Actor Filters
//!
//! An actor filter computes the user ids allowed to execute a human task.
//! Filters read their inputs from the same untyped parameter map as the
//! connectors and reach the engine through the [`ProcessApi`] and
//! [`IdentityApi`] traits, which the embedding application implements.

mod action_based;
mod multiple_user_ids;
mod search;

pub use action_based::{ActionBasedTaskAssignationFilter, InvolvedUsers, Membership, USERS_INPUT};
pub use multiple_user_ids::{MultipleUserIdsActorFilter, USERS_LIST_INPUT};
pub use search::{MembershipTerm, UserSearchQuery};

use crate::{
    errors::{ApiError, ConnectorError},
    params::InputParameters,
};
use async_trait::async_trait;

/// Process instance lookups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessApi: Send + Sync {
    /// Id of the user who started the given process instance.
    async fn process_initiator(&self, root_process_instance_id: i64) -> Result<i64, ApiError>;
}

/// User directory lookups.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityApi: Send + Sync {
    /// Ids of the users matching the query.
    async fn search_users(&self, query: &UserSearchQuery) -> Result<Vec<i64>, ApiError>;
}

/// What the engine exposes to a filter while it runs.
pub struct FilterContext<'a> {
    pub root_process_instance_id: i64,
    pub process_api: &'a dyn ProcessApi,
    pub identity_api: &'a dyn IdentityApi,
}

#[async_trait]
pub trait UserFilter: Sized + Send + Sync {
    /// Checks the raw inputs.
    fn validate_input_parameters(params: &InputParameters) -> Result<(), ConnectorError>;

    /// Builds the typed filter from inputs that passed validation.
    fn from_validated(params: &InputParameters) -> Result<Self, ConnectorError>;

    /// Validates and parses the raw inputs.
    fn from_parameters(params: &InputParameters) -> Result<Self, ConnectorError> {
        Self::validate_input_parameters(params)?;
        Self::from_validated(params)
    }

    /// Candidate user ids for the task owned by `actor_name`.
    async fn filter(
        &self,
        actor_name: &str,
        ctx: &FilterContext<'_>,
    ) -> Result<Vec<i64>, ConnectorError>;
}
