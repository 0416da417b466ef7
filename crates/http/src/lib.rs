// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ao-http: the thin axum handler layer that dispatches HTTP
//! requests into the Supervisor, DNS service, fan-out hub, permission
//! resolver, and rate limiter. Handlers validate, rate-limit, authorize,
//! and delegate — they never contain business logic of their own.

pub mod auth;
pub mod error;
pub mod router;
pub mod routes;
pub mod state;

pub use auth::{AdminUser, AuthedUser, SessionOracle};
pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;

#[cfg(test)]
mod tests {
    use super::*;
    use ao_access::RateLimiter;
    use ao_core::{Analysis, AnalysisId, Clock, FakeClock, Permission, User, UserId};
    use ao_dns::{DnsService, SsrfPolicy};
    use ao_fanout::FanoutHub;
    use ao_storage::event::StorageEvent;
    use ao_storage::MetadataStore;
    use ao_supervisor::{AnalysisSupervisor, DefaultLauncher};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex as TokioMutex;
    use tower::ServiceExt;

    /// A fixed map of session token -> user, standing in for whatever real
    /// session store the daemon wires up in production.
    struct FixedSessionOracle(TokioMutex<HashMap<String, AuthedUser>>);

    #[async_trait::async_trait]
    impl SessionOracle for FixedSessionOracle {
        async fn resolve(&self, token: &str) -> Option<AuthedUser> {
            self.0.lock().await.get(token).cloned()
        }
    }

    fn test_state(tmp: &std::path::Path, sessions: HashMap<String, AuthedUser>) -> AppState<FakeClock> {
        let clock = FakeClock::new();
        let store = Arc::new(MetadataStore::open(tmp.join("meta")).unwrap());
        let fanout = Arc::new(FanoutHub::new());
        let dns = Arc::new(DnsService::new(clock.clone(), ao_core::DnsConfig::default(), SsrfPolicy::default()).unwrap());
        let launcher = Arc::new(DefaultLauncher);
        let supervisor = Arc::new(AnalysisSupervisor::new(clock.clone(), tmp.join("analyses"), tmp.join("dns.sock"), Arc::clone(&fanout), Arc::clone(&store), launcher));
        let rate_limiter = Arc::new(RateLimiter::new(clock.clone()));
        let oracle = Arc::new(FixedSessionOracle(TokioMutex::new(sessions)));
        AppState::new(clock, store, supervisor, dns, fanout, rate_limiter, oracle, tmp.join("analyses"), tmp.join("config"))
    }

    #[tokio::test]
    async fn healthz_requires_no_session() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), HashMap::new());
        let app = build_router(state);

        let response = app.oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn analyses_list_without_cookie_is_unauthenticated() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(tmp.path(), HashMap::new());
        let app = build_router(state);

        let response = app.oneshot(Request::builder().uri("/api/analyses").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn cross_team_denial_then_admin_allowed() {
        let tmp = tempfile::tempdir().unwrap();
        let admin_id = UserId::new();
        let member_id = UserId::new();

        let mut sessions = HashMap::new();
        sessions.insert("admin-token".to_string(), AuthedUser { user_id: admin_id, is_admin: true });
        sessions.insert("member-token".to_string(), AuthedUser { user_id: member_id, is_admin: false });

        let state = test_state(tmp.path(), sessions);
        state.store.append(StorageEvent::UserCreated { user: User { id: admin_id, display_name: "Admin".into(), is_admin: true } }).unwrap();
        state.store.append(StorageEvent::UserCreated { user: User { id: member_id, display_name: "Member".into(), is_admin: false } }).unwrap();

        let other_team = ao_core::TeamId::new();
        state.store.append(StorageEvent::TeamCreated { team: ao_core::Team { id: other_team, name: "team-2".into(), color: "#000".into(), order_index: 0 } }).unwrap();
        state
            .store
            .append(StorageEvent::MembershipGranted { user_id: member_id, team_id: other_team, permissions: vec![Permission::View] })
            .unwrap();

        let analysis_id = AnalysisId::new();
        let mut analysis = Analysis::new("demo", None);
        analysis.id = analysis_id;
        ao_storage::source_store::write_initial(&tmp.path().join("analyses"), analysis_id.as_str(), "index.js", "1").unwrap();
        state.store.append(StorageEvent::AnalysisCreated { analysis }).unwrap();

        let app = build_router(state);

        let member_request = Request::builder()
            .uri(format!("/api/analyses/{}/content", analysis_id.as_str()))
            .header("cookie", "ao_session=member-token")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(member_request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let admin_request = Request::builder()
            .uri(format!("/api/analyses/{}/content", analysis_id.as_str()))
            .header("cookie", "ao_session=admin-token")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(admin_request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
