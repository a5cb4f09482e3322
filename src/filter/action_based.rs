// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Assigns a task to the users described by a JSON document:
//!
//! ```json
//! {"initiator": true, "users": [4, 8], "memberShips": [{"groupId": 1, "roleId": 2}]}
//! ```
//!
//! The candidates are the process initiator (when requested), the listed
//! users and every enabled user holding one of the memberships.

use super::{FilterContext, UserFilter, UserSearchQuery};
use crate::{
    errors::ConnectorError,
    params::{json_as_long, InputParameters, ParamValue},
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{error, info};

pub const USERS_INPUT: &str = "users";

const INITIATOR_FIELD: &str = "initiator";
const USERS_FIELD: &str = "users";
const MEMBERSHIPS_FIELD: &str = "memberShips";
const GROUP_ID_FIELD: &str = "groupId";
const ROLE_ID_FIELD: &str = "roleId";
const MEMBERSHIP_REF_FIELD: &str = "memberShipsRef";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub group_id: Option<i64>,
    pub role_id: Option<i64>,
    pub reference: Option<String>,
}

/// Parsed form of the `users` input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvolvedUsers {
    pub initiator: bool,
    pub users: Vec<i64>,
    pub memberships: Vec<Membership>,
}

fn optional_long(node: &Value, field: &str) -> Option<i64> {
    node.get(field)
        .filter(|v| !v.is_null())
        .map(json_as_long)
}

impl InvolvedUsers {
    /// Lenient parse: absent or mistyped fields fall back to empty values.
    pub fn parse(json: &str) -> Result<InvolvedUsers, String> {
        if json.is_empty() {
            return Err("input JSON string cannot be empty".to_owned());
        }

        let root: Value = serde_json::from_str(json)
            .map_err(|err| format!("failed to parse JSON string: {err}"))?;

        let initiator = root
            .get(INITIATOR_FIELD)
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let users = root
            .get(USERS_FIELD)
            .and_then(Value::as_array)
            .map(|ids| ids.iter().map(json_as_long).collect())
            .unwrap_or_default();

        let memberships = root
            .get(MEMBERSHIPS_FIELD)
            .and_then(Value::as_array)
            .map(|nodes| {
                nodes
                    .iter()
                    .map(|node| Membership {
                        group_id: optional_long(node, GROUP_ID_FIELD),
                        role_id: optional_long(node, ROLE_ID_FIELD),
                        reference: node.get(MEMBERSHIP_REF_FIELD).map(|v| match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        }),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(InvolvedUsers {
            initiator,
            users,
            memberships,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionBasedTaskAssignationFilter {
    involved: InvolvedUsers,
}

impl ActionBasedTaskAssignationFilter {
    pub fn involved_users(&self) -> &InvolvedUsers {
        &self.involved
    }
}

#[async_trait]
impl UserFilter for ActionBasedTaskAssignationFilter {
    fn validate_input_parameters(params: &InputParameters) -> Result<(), ConnectorError> {
        let json = match params.get(USERS_INPUT) {
            Some(ParamValue::Text(json)) if !json.is_empty() => json,
            None | Some(ParamValue::Null) | Some(ParamValue::Text(_)) => {
                return Err(ConnectorError::Validation(vec![format!(
                    "Mandatory parameter '{USERS_INPUT}' must be a non-empty string."
                )]))
            }
            Some(_) => {
                return Err(ConnectorError::Validation(vec![format!(
                    "Parameter '{USERS_INPUT}' must be a String."
                )]))
            }
        };

        let Ok(root) = serde_json::from_str::<Value>(json) else {
            return Err(ConnectorError::Validation(vec![format!(
                "Invalid JSON structure for parameter '{USERS_INPUT}'."
            )]));
        };

        if !root.is_object() {
            return Err(ConnectorError::Validation(vec![format!(
                "Parameter '{USERS_INPUT}' must be a JSON object."
            )]));
        }

        let checks: [(&str, fn(&Value) -> bool); 3] = [
            (INITIATOR_FIELD, Value::is_boolean),
            (USERS_FIELD, Value::is_array),
            (MEMBERSHIPS_FIELD, Value::is_array),
        ];

        let errors: Vec<String> = checks
            .iter()
            .filter(|(field, check)| !root.get(*field).is_some_and(check))
            .map(|(field, _)| {
                format!("Mandatory field '{field}' is missing or has an invalid type.")
            })
            .collect();

        if !errors.is_empty() {
            return Err(ConnectorError::Validation(errors));
        }

        Ok(())
    }

    fn from_validated(params: &InputParameters) -> Result<Self, ConnectorError> {
        let json = params.string(USERS_INPUT).unwrap_or_default();
        info!(input = json, "{} input", USERS_INPUT);

        let involved = InvolvedUsers::parse(json).map_err(|err| {
            error!(error = err, "failure to read involved users");
            ConnectorError::Filter(err)
        })?;

        Ok(ActionBasedTaskAssignationFilter { involved })
    }

    async fn filter(
        &self,
        actor_name: &str,
        ctx: &FilterContext<'_>,
    ) -> Result<Vec<i64>, ConnectorError> {
        let mut ids = BTreeSet::new();

        if self.involved.initiator {
            match ctx
                .process_api
                .process_initiator(ctx.root_process_instance_id)
                .await
            {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(err) => error!(
                    error = err.to_string(),
                    "failure to resolve the process initiator, skipping it"
                ),
            }
        }

        ids.extend(self.involved.users.iter().copied());

        if let Some(query) = UserSearchQuery::for_memberships(&self.involved.memberships) {
            match ctx.identity_api.search_users(&query).await {
                Ok(found) => {
                    info!(count = found.len(), "users found from memberships");
                    ids.extend(found);
                }
                Err(err) => error!(
                    error = err.to_string(),
                    query = %query,
                    "failure to search users by membership"
                ),
            }
        }

        info!(
            actor = actor_name,
            count = ids.len(),
            "final user list contains unique users"
        );

        Ok(ids.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::ApiError,
        filter::{MembershipTerm, MockIdentityApi, MockProcessApi},
    };

    fn params(json: &str) -> InputParameters {
        InputParameters::new().with(USERS_INPUT, json)
    }

    fn validation_errors(params: &InputParameters) -> Vec<String> {
        match ActionBasedTaskAssignationFilter::validate_input_parameters(params) {
            Err(ConnectorError::Validation(errors)) => errors,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn accepts_complete_document() {
        let json = r#"{"initiator": true, "users": [1, 2], "memberShips": []}"#;

        assert!(ActionBasedTaskAssignationFilter::validate_input_parameters(&params(json)).is_ok());
    }

    #[test]
    fn rejects_missing_or_non_string_input() {
        assert_eq!(
            validation_errors(&InputParameters::new()),
            vec!["Mandatory parameter 'users' must be a non-empty string.".to_owned()]
        );
        assert_eq!(
            validation_errors(&params("")),
            vec!["Mandatory parameter 'users' must be a non-empty string.".to_owned()]
        );
        assert_eq!(
            validation_errors(&InputParameters::new().with(USERS_INPUT, 12_i64)),
            vec!["Parameter 'users' must be a String.".to_owned()]
        );
    }

    #[test]
    fn rejects_malformed_json_and_non_objects() {
        assert_eq!(
            validation_errors(&params("{not json")),
            vec!["Invalid JSON structure for parameter 'users'.".to_owned()]
        );
        assert_eq!(
            validation_errors(&params("[1, 2]")),
            vec!["Parameter 'users' must be a JSON object.".to_owned()]
        );
    }

    #[test]
    fn reports_every_bad_field() {
        let errors = validation_errors(&params(r#"{"initiator": "yes", "users": []}"#));

        assert_eq!(
            errors,
            vec![
                "Mandatory field 'initiator' is missing or has an invalid type.".to_owned(),
                "Mandatory field 'memberShips' is missing or has an invalid type.".to_owned(),
            ]
        );
    }

    #[test]
    fn parses_memberships() {
        let parsed = InvolvedUsers::parse(
            r#"{"initiator": false, "users": [3, "4"],
                "memberShips": [{"groupId": 1, "roleId": 2, "memberShipsRef": "ref-1"},
                                {"roleId": 9}]}"#,
        )
        .unwrap();

        assert!(!parsed.initiator);
        assert_eq!(parsed.users, vec![3, 4]);
        assert_eq!(
            parsed.memberships,
            vec![
                Membership {
                    group_id: Some(1),
                    role_id: Some(2),
                    reference: Some("ref-1".to_owned()),
                },
                Membership {
                    group_id: None,
                    role_id: Some(9),
                    reference: None,
                },
            ]
        );
    }

    #[test]
    fn parse_defaults_missing_fields() {
        assert_eq!(InvolvedUsers::parse("{}"), Ok(InvolvedUsers::default()));
        assert!(InvolvedUsers::parse("").is_err());
    }

    #[tokio::test]
    async fn unions_all_sources_without_duplicates() {
        let filter = ActionBasedTaskAssignationFilter::from_parameters(&params(
            r#"{"initiator": true, "users": [5, 7], "memberShips": [{"groupId": 1}]}"#,
        ))
        .unwrap();

        let mut process_api = MockProcessApi::new();
        process_api
            .expect_process_initiator()
            .withf(|id| *id == 100)
            .times(1)
            .returning(|_| Ok(7));

        let mut identity_api = MockIdentityApi::new();
        identity_api
            .expect_search_users()
            .withf(|q| q.enabled_only && q.terms == vec![MembershipTerm::Group(1)])
            .times(1)
            .returning(|_| Ok(vec![9, 5, 3]));

        let ctx = FilterContext {
            root_process_instance_id: 100,
            process_api: &process_api,
            identity_api: &identity_api,
        };

        let ids = filter.filter("Reviewer", &ctx).await.unwrap();

        assert_eq!(ids, vec![3, 5, 7, 9]);
    }

    #[tokio::test]
    async fn engine_failures_are_skipped() {
        let filter = ActionBasedTaskAssignationFilter::from_parameters(&params(
            r#"{"initiator": true, "users": [5], "memberShips": [{"roleId": 2}]}"#,
        ))
        .unwrap();

        let mut process_api = MockProcessApi::new();
        process_api
            .expect_process_initiator()
            .returning(|id| Err(ApiError::ProcessInstanceNotFound(id)));

        let mut identity_api = MockIdentityApi::new();
        identity_api
            .expect_search_users()
            .returning(|_| Err(ApiError::Search("timeout".to_owned())));

        let ctx = FilterContext {
            root_process_instance_id: 1,
            process_api: &process_api,
            identity_api: &identity_api,
        };

        assert_eq!(filter.filter("Reviewer", &ctx).await, Ok(vec![5]));
    }

    #[tokio::test]
    async fn no_lookups_when_not_requested() {
        let filter = ActionBasedTaskAssignationFilter::from_parameters(&params(
            r#"{"initiator": false, "users": [2, 2, 1], "memberShips": [{}]}"#,
        ))
        .unwrap();

        let mut process_api = MockProcessApi::new();
        process_api.expect_process_initiator().never();
        let mut identity_api = MockIdentityApi::new();
        identity_api.expect_search_users().never();

        let ctx = FilterContext {
            root_process_instance_id: 1,
            process_api: &process_api,
            identity_api: &identity_api,
        };

        assert_eq!(filter.filter("Reviewer", &ctx).await, Ok(vec![1, 2]));
    }
}
