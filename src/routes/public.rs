use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Catalog listings only ever expose the public
/// tier of a site; the detail route upgrades to the member tier when a valid session is
/// presented.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register, POST /auth/login
        // Account creation and session issue.
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        // GET /sites?search=&difficulty=&diveType=&page=&limit=
        // Active sites, newest first, paginated.
        .route("/sites", get(handlers::get_sites))
        // GET /sites/{slug}
        // Tiered site detail.
        .route("/sites/{slug}", get(handlers::get_site_detail))
        // GET /sites/{slug}/marine-life
        .route("/sites/{slug}/marine-life", get(handlers::get_site_marine_life))
        // GET /marine-life
        // Taxa reference table.
        .route("/marine-life", get(handlers::list_marine_life))
}
