// SPDX-License-Identifier: MIT

//! Teams, memberships, and the fine-grained permission set scoped to them.

use crate::define_id;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

define_id! {
    pub struct TeamId("tm-");
}

define_id! {
    pub struct UserId("us-");
}

/// Fine-grained permission, always scoped to `analyses` within a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Upload,
    View,
    Run,
    Edit,
    Delete,
    Download,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub color: String,
    pub order_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: UserId,
    pub team_id: TeamId,
    pub permissions: HashSet<Permission>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub display_name: String,
    pub is_admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_permission_set_contains() {
        let m = Membership {
            user_id: UserId::new(),
            team_id: TeamId::new(),
            permissions: HashSet::from([Permission::View, Permission::Run]),
        };
        assert!(m.permissions.contains(&Permission::View));
        assert!(!m.permissions.contains(&Permission::Delete));
    }
}
