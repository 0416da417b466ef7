// SPDX-License-Identifier: MIT

//! Permission resolver + rate limiter wired together over a shared store —
//! cross-team denial and rate-limit exhaustion, exercised at the component
//! seam rather than through HTTP.

use crate::prelude::Harness;
use ao_core::{LimiterClass, Permission, Team, TeamId, User, UserId};
use ao_storage::event::StorageEvent;

#[test]
fn cross_team_member_denied_admin_allowed() {
    let h = Harness::new();

    let team_1 = TeamId::new();
    let team_2 = TeamId::new();
    h.store.append(StorageEvent::TeamCreated { team: Team { id: team_1, name: "team-1".into(), color: "#111".into(), order_index: 0 } }).unwrap();
    h.store.append(StorageEvent::TeamCreated { team: Team { id: team_2, name: "team-2".into(), color: "#222".into(), order_index: 1 } }).unwrap();

    let member = User { id: UserId::new(), display_name: "U".into(), is_admin: false };
    let admin = User { id: UserId::new(), display_name: "A".into(), is_admin: true };
    h.store.append(StorageEvent::UserCreated { user: member.clone() }).unwrap();
    h.store.append(StorageEvent::UserCreated { user: admin.clone() }).unwrap();
    h.store
        .append(StorageEvent::MembershipGranted { user_id: member.id, team_id: team_2, permissions: vec![Permission::View] })
        .unwrap();

    let analysis_id = h.register_analysis("true", Some(team_1));
    let analysis = h.store.with_state(|s| s.get_analysis(&analysis_id).cloned()).unwrap();
    let team = analysis.effective_team_id();

    assert!(!h.permissions.is_allowed(&member.id, team, Permission::View));
    assert!(h.permissions.is_allowed(&admin.id, team, Permission::View));
}

#[test]
fn file_operation_rate_limit_exhaustion_lets_first_fifty_through() {
    // TEST_RATE_LIMIT env overrides aren't in play here, so this exercises
    // the real default (50 per 15 min window).
    std::env::remove_var(LimiterClass::FileOperation.env_override_var());
    let h = Harness::new();

    let mut allowed = 0;
    let mut limited = 0;
    for _ in 0..60 {
        match h.rate_limiter.check(LimiterClass::FileOperation, "session-under-test") {
            ao_access::RateLimitDecision::Allowed => allowed += 1,
            ao_access::RateLimitDecision::Limited { .. } => limited += 1,
        }
    }
    assert_eq!(allowed, 50);
    assert_eq!(limited, 10);
}

#[test]
fn deleted_team_falls_back_to_uncategorized_for_permission_checks() {
    let h = Harness::new();
    let team = TeamId::new();
    h.store.append(StorageEvent::TeamCreated { team: Team { id: team, name: "doomed".into(), color: "#000".into(), order_index: 0 } }).unwrap();
    let analysis_id = h.register_analysis("true", Some(team));

    h.store.append(StorageEvent::TeamDeleted { team_id: team }).unwrap();
    let analysis = h.store.with_state(|s| s.get_analysis(&analysis_id).cloned()).unwrap();

    // TeamDeleted clears the analysis's team_id, so effective_team_id()
    // falls back to the reserved uncategorized team.
    assert_eq!(analysis.effective_team_id(), ao_core::UNCATEGORIZED_TEAM);

    let admin = User { id: UserId::new(), display_name: "Root".into(), is_admin: true };
    h.store.append(StorageEvent::UserCreated { user: admin.clone() }).unwrap();
    assert!(h.permissions.is_allowed(&admin.id, analysis.effective_team_id(), Permission::View));
}
