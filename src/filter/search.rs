// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Membership Search
//!
//! Turns the memberships of an action based assignment into a single user
//! search over enabled users.

use super::Membership;
use std::fmt;

/// One membership clause of a user search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipTerm {
    Group(i64),
    Role(i64),
    GroupAndRole { group_id: i64, role_id: i64 },
}

impl MembershipTerm {
    /// `None` when the membership names neither a group nor a role.
    pub fn from_membership(membership: &Membership) -> Option<MembershipTerm> {
        match (membership.group_id, membership.role_id) {
            (Some(group_id), Some(role_id)) => {
                Some(MembershipTerm::GroupAndRole { group_id, role_id })
            }
            (Some(group_id), None) => Some(MembershipTerm::Group(group_id)),
            (None, Some(role_id)) => Some(MembershipTerm::Role(role_id)),
            (None, None) => None,
        }
    }
}

impl fmt::Display for MembershipTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipTerm::Group(id) => write!(f, "groupId = {id}"),
            MembershipTerm::Role(id) => write!(f, "roleId = {id}"),
            MembershipTerm::GroupAndRole { group_id, role_id } => {
                write!(f, "(groupId = {group_id} AND roleId = {role_id})")
            }
        }
    }
}

/// A single user search: enabled users matching any of the membership terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSearchQuery {
    pub start: usize,
    pub max_results: usize,
    pub enabled_only: bool,
    pub terms: Vec<MembershipTerm>,
}

impl UserSearchQuery {
    /// OR-combines all usable memberships into one query. Returns `None` when
    /// there is nothing to search for.
    pub fn for_memberships(memberships: &[Membership]) -> Option<UserSearchQuery> {
        let terms: Vec<MembershipTerm> = memberships
            .iter()
            .filter_map(MembershipTerm::from_membership)
            .collect();

        if terms.is_empty() {
            return None;
        }

        Some(UserSearchQuery {
            start: 0,
            max_results: i32::MAX as usize,
            enabled_only: true,
            terms,
        })
    }
}

impl fmt::Display for UserSearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.enabled_only {
            f.write_str("enabled = true AND ")?;
        }

        f.write_str("(")?;
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(" OR ")?;
            }
            write!(f, "{term}")?;
        }
        f.write_str(")")
    }
}
