// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Multiple User Ids Filter
//!
//! Assigns a task to an explicit list of user ids.

use super::{FilterContext, UserFilter};
use crate::{
    errors::ConnectorError,
    params::{InputParameters, ParamValue},
};
use async_trait::async_trait;
use tracing::{info, warn};

/// Input holding the user ids, as a list of longs.
pub const USERS_LIST_INPUT: &str = "usersList";

/// Returns the user ids it was given, unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipleUserIdsActorFilter {
    user_ids: Vec<i64>,
}

#[async_trait]
impl UserFilter for MultipleUserIdsActorFilter {
    // Each check needs the previous one to hold, so the first failure wins.
    fn validate_input_parameters(params: &InputParameters) -> Result<(), ConnectorError> {
        let fail = |msg: String| Err(ConnectorError::Validation(vec![msg]));

        let list = match params.get(USERS_LIST_INPUT) {
            None | Some(ParamValue::Null) => {
                return fail(format!(
                    "Input parameter '{USERS_LIST_INPUT}' cannot be null. At least one user ID must be provided."
                ))
            }
            Some(ParamValue::List(list)) => list,
            Some(other) => {
                return fail(format!(
                    "Input parameter '{USERS_LIST_INPUT}' must be a List<Long>. Found type {}.",
                    other.type_name()
                ))
            }
        };

        match list.first() {
            None => fail(format!(
                "Input parameter '{USERS_LIST_INPUT}' cannot be empty. At least one user ID must be provided."
            )),
            Some(ParamValue::Long(_)) => Ok(()),
            Some(other) => fail(format!(
                "Input parameter '{USERS_LIST_INPUT}' must be a List<Long>. Found a List with elements of type {}.",
                other.type_name()
            )),
        }
    }

    fn from_validated(params: &InputParameters) -> Result<Self, ConnectorError> {
        let Some(ParamValue::List(list)) = params.get(USERS_LIST_INPUT) else {
            return Err(ConnectorError::Filter(format!(
                "'{USERS_LIST_INPUT}' is not a list"
            )));
        };

        let user_ids = list
            .iter()
            .filter_map(|v| {
                let id = v.as_i64();
                if id.is_none() {
                    warn!(value = ?v, "skipping a non numeric user id");
                }
                id
            })
            .collect();

        Ok(MultipleUserIdsActorFilter { user_ids })
    }

    async fn filter(
        &self,
        actor_name: &str,
        _ctx: &FilterContext<'_>,
    ) -> Result<Vec<i64>, ConnectorError> {
        info!(
            actor = actor_name,
            count = self.user_ids.len(),
            "returning user ids from {}",
            USERS_LIST_INPUT
        );

        Ok(self.user_ids.clone())
    }
}
