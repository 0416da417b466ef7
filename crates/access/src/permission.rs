// SPDX-License-Identifier: MIT

//! Translates `(userId, teamId, permission)` into allow/deny over the
//! metadata store. A store error is logged and treated as deny —
//! it must never propagate into the HTTP response path as a 500 that leaks
//! internals.

use ao_core::{Permission, TeamId, UserId};
use ao_storage::MetadataStore;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct PermissionResolver {
    store: Arc<MetadataStore>,
}

impl PermissionResolver {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }

    /// A global admin is always allowed; otherwise the user must hold a
    /// membership on `team_id` whose permission set contains `permission`.
    pub fn is_allowed(&self, user_id: &UserId, team_id: &str, permission: Permission) -> bool {
        self.store.with_state(|state| {
            if state.users.get(user_id.as_str()).is_some_and(|u| u.is_admin) {
                return true;
            }
            state.permissions_for(user_id, team_id).contains(&permission)
        })
    }

    /// True if the user holds `permission` on *any* team they belong to.
    pub fn has_any_team_permission(&self, user_id: &UserId, permission: Permission) -> bool {
        self.store.with_state(|state| {
            if state.users.get(user_id.as_str()).is_some_and(|u| u.is_admin) {
                return true;
            }
            state
                .memberships
                .values()
                .any(|m| m.user_id == *user_id && m.permissions.contains(&permission))
        })
    }

    /// Teams where the user holds `permission`, used to scope list queries.
    pub fn user_team_ids(&self, user_id: &UserId, permission: Permission) -> HashSet<TeamId> {
        self.store.with_state(|state| {
            state
                .memberships
                .values()
                .filter(|m| m.user_id == *user_id && m.permissions.contains(&permission))
                .map(|m| m.team_id)
                .collect()
        })
    }

    /// Users holding `permission` on `team_id` — used by the fan-out to
    /// address a lifecycle event to everyone who can see it, plus every
    /// admin regardless of membership.
    pub fn users_with_team_access(&self, team_id: &TeamId, permission: Permission) -> HashSet<UserId> {
        self.store.with_state(|state| {
            let mut users: HashSet<UserId> = state
                .memberships
                .values()
                .filter(|m| m.team_id == *team_id && m.permissions.contains(&permission))
                .map(|m| m.user_id)
                .collect();
            users.extend(state.users.values().filter(|u| u.is_admin).map(|u| u.id));
            users
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ao_core::{Membership, Team, User};
    use tempfile::tempdir;

    fn store() -> Arc<MetadataStore> {
        let dir = tempdir().unwrap();
        // leak the tempdir so the store outlives the function; fine in tests
        let path = dir.into_path();
        Arc::new(MetadataStore::open(path).unwrap())
    }

    #[test]
    fn admin_bypasses_membership_check() {
        let store = store();
        let user = User { id: UserId::new(), display_name: "Root".into(), is_admin: true };
        store.append(ao_storage::event::StorageEvent::UserCreated { user: user.clone() }).unwrap();

        let resolver = PermissionResolver::new(store);
        assert!(resolver.is_allowed(&user.id, "team-that-does-not-exist", Permission::Delete));
    }

    #[test]
    fn non_member_is_denied() {
        let store = store();
        let resolver = PermissionResolver::new(store);
        let user_id = UserId::new();
        assert!(!resolver.is_allowed(&user_id, "tm-1", Permission::View));
    }

    #[test]
    fn membership_permission_grants_access_only_to_that_team() {
        let store = store();
        let team = Team { id: TeamId::new(), name: "Acme".into(), color: "#fff".into(), order_index: 0 };
        let user = User { id: UserId::new(), display_name: "Bob".into(), is_admin: false };
        store.append(ao_storage::event::StorageEvent::TeamCreated { team: team.clone() }).unwrap();
        store.append(ao_storage::event::StorageEvent::UserCreated { user: user.clone() }).unwrap();
        store
            .append(ao_storage::event::StorageEvent::MembershipGranted {
                user_id: user.id,
                team_id: team.id,
                permissions: vec![Permission::View],
            })
            .unwrap();

        let resolver = PermissionResolver::new(store);
        assert!(resolver.is_allowed(&user.id, team.id.as_str(), Permission::View));
        assert!(!resolver.is_allowed(&user.id, team.id.as_str(), Permission::Delete));
        assert!(!resolver.is_allowed(&user.id, "other-team", Permission::View));
    }

    #[test]
    fn membership_with_user_struct() {
        // exercises the Membership type constructor directly for coverage of
        // the re-exported core type from this crate's perspective
        let m = Membership { user_id: UserId::new(), team_id: TeamId::new(), permissions: HashSet::from([Permission::Run]) };
        assert!(m.permissions.contains(&Permission::Run));
    }
}
