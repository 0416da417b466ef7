// SPDX-License-Identifier: MIT

//! Assembles the axum [`Router`] for the orchestrator's HTTP surface (spec
//! §6). Route handlers are generic over the [`Clock`] so the same router
//! builder serves both `SystemClock` in production and `FakeClock` in
//! integration tests.

use ao_core::Clock;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::routes::{admin, analyses, dns_admin, sse, teams, users};
use crate::state::AppState;

pub fn build_router<C: Clock>(state: AppState<C>) -> Router {
    let analyses_routes = Router::new()
        .route("/", get(analyses::list::<C>))
        .route("/upload", post(analyses::upload::<C>))
        .route("/:id/content", get(analyses::content::<C>))
        .route("/:id", put(analyses::update::<C>).delete(analyses::delete::<C>))
        .route("/:id/rename", put(analyses::rename::<C>))
        .route("/:id/run", post(analyses::run::<C>))
        .route("/:id/stop", post(analyses::stop::<C>))
        .route("/:id/logs", get(analyses::logs::<C>).delete(analyses::clear_logs::<C>))
        .route("/:id/logs/download", get(analyses::logs_download::<C>))
        .route("/:id/versions", get(analyses::versions::<C>))
        .route("/:id/rollback", post(analyses::rollback::<C>))
        .route("/:id/environment", get(analyses::get_environment::<C>).put(analyses::put_environment::<C>));

    let dns_routes = Router::new()
        .route("/config", get(dns_admin::get_config::<C>).put(dns_admin::update_config::<C>))
        .route("/stats", get(dns_admin::stats::<C>))
        .route("/entries", get(dns_admin::entries::<C>))
        .route("/cache", delete(dns_admin::clear_cache::<C>));

    let team_routes = Router::new()
        .route("/", get(teams::list::<C>).post(teams::create::<C>))
        .route("/:id", put(teams::rename::<C>).delete(teams::delete::<C>));

    let user_routes = Router::new()
        .route("/", get(users::list::<C>))
        .route("/:id", delete(users::delete::<C>))
        .route("/:id/role", put(users::update_role::<C>))
        .route("/:id/teams", post(users::grant_membership::<C>))
        .route("/:id/teams/:team_id", delete(users::revoke_membership::<C>));

    let api = Router::new()
        .nest("/analyses", analyses_routes)
        .nest("/dns", dns_routes)
        .nest("/teams", team_routes)
        .nest("/users", user_routes)
        .route("/sse/events", get(sse::events::<C>))
        .route("/admin/metrics", get(admin::metrics::<C>));

    Router::new()
        .route("/healthz", get(admin::healthz))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
