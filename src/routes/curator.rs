use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Curator Router Module
///
/// Catalog writes. The router sits behind the same authentication layer as the
/// authenticated routes; the GUIDE/ADMIN check is made by the catalog and marine-life
/// services so that a plain USER gets 403 rather than 401.
pub fn curator_routes() -> Router<AppState> {
    Router::new()
        // POST /sites
        .route("/sites", post(handlers::create_site))
        // POST /sites/{slug}/marine-life
        // Replaces the site's full taxa set in one transaction.
        .route(
            "/sites/{slug}/marine-life",
            post(handlers::replace_site_marine_life),
        )
}
