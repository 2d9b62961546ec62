use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Endpoints for any signed-in user. Review writes are keyed by the caller's own id, so
/// a user can only ever touch their own review of a site.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        .route("/me", get(handlers::get_me))
        // POST/PUT/DELETE /sites/{slug}/reviews
        // Create, overwrite or remove the caller's review. One review per user and site.
        .route(
            "/sites/{slug}/reviews",
            post(handlers::create_review)
                .put(handlers::update_review)
                .delete(handlers::delete_review),
        )
}
